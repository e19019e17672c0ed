use bytes::{Buf, BufMut, Bytes, BytesMut};
use postgres_types::Oid;

use super::codec;
use super::{DecodeContext, Message};
use crate::charset::Charset;
use crate::error::{PgStreamError, PgStreamResult};

pub(crate) const FORMAT_CODE_TEXT: i16 = 0;
pub(crate) const FORMAT_CODE_BINARY: i16 = 1;

/// Encoding of a single value on the wire.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Default)]
pub enum FieldFormat {
    #[default]
    Text,
    Binary,
}

impl FieldFormat {
    /// Wire format code for the encoding.
    pub fn code(&self) -> i16 {
        match self {
            Self::Text => FORMAT_CODE_TEXT,
            Self::Binary => FORMAT_CODE_BINARY,
        }
    }
}

impl TryFrom<i16> for FieldFormat {
    type Error = PgStreamError;

    fn try_from(code: i16) -> PgStreamResult<Self> {
        match code {
            FORMAT_CODE_TEXT => Ok(FieldFormat::Text),
            FORMAT_CODE_BINARY => Ok(FieldFormat::Binary),
            _ => Err(PgStreamError::UnsupportedFormatType(code)),
        }
    }
}

/// Result-column format block of `Bind`.
///
/// The wire encoding is a format-code count followed by that many codes:
/// zero codes leave every column at the default, a single code applies to
/// all columns, otherwise one code per column.
#[derive(PartialEq, Eq, Debug, Clone, Default)]
pub enum FieldFormats {
    #[default]
    Default,
    Uniform(FieldFormat),
    PerColumn(Vec<FieldFormat>),
}

impl FieldFormats {
    pub(crate) fn encoded_len(&self) -> usize {
        2 + match self {
            FieldFormats::Default => 0,
            FieldFormats::Uniform(_) => 2,
            FieldFormats::PerColumn(formats) => 2 * formats.len(),
        }
    }

    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        match self {
            FieldFormats::Default => buf.put_i16(0),
            FieldFormats::Uniform(format) => {
                buf.put_i16(1);
                buf.put_i16(format.code());
            }
            FieldFormats::PerColumn(formats) => {
                buf.put_i16(formats.len() as i16);
                for format in formats {
                    buf.put_i16(format.code());
                }
            }
        }
    }

    pub(crate) fn decode(buf: &mut BytesMut) -> PgStreamResult<FieldFormats> {
        let count = buf.get_i16();
        match count {
            0 => Ok(FieldFormats::Default),
            1 => Ok(FieldFormats::Uniform(FieldFormat::try_from(buf.get_i16())?)),
            n if n < 0 => Err(PgStreamError::InvalidValueLength(n as i32)),
            n => {
                let mut formats = Vec::with_capacity(n as usize);
                for _ in 0..n {
                    formats.push(FieldFormat::try_from(buf.get_i16())?);
                }
                Ok(FieldFormats::PerColumn(formats))
            }
        }
    }
}

#[non_exhaustive]
#[derive(PartialEq, Eq, Debug, Default, new)]
pub struct FieldDescription {
    // the field name
    pub name: String,
    // the object ID of table, default to 0 if not a table
    pub table_id: i32,
    // the attribute number of the column, default to 0 if not a column from table
    pub column_id: i16,
    // the object ID of the data type
    pub type_id: Oid,
    // the size of data type, negative values denote variable-width types
    pub type_size: i16,
    // the type modifier
    pub type_modifier: i32,
    // the format code being used for the field, 0 for text and 1 for binary.
    // In a RowDescription returned from the statement variant of Describe the
    // format is not yet known and will always be 0, so the raw code is kept
    // instead of an eager `FieldFormat` conversion.
    pub format_code: i16,
}

#[non_exhaustive]
#[derive(PartialEq, Eq, Debug, Default, new)]
pub struct RowDescription {
    pub fields: Vec<FieldDescription>,
}

pub const MESSAGE_TYPE_BYTE_ROW_DESCRIPTION: u8 = b'T';

impl Message for RowDescription {
    fn message_type() -> Option<u8> {
        Some(MESSAGE_TYPE_BYTE_ROW_DESCRIPTION)
    }

    fn message_length(&self, charset: Charset) -> usize {
        4 + 2
            + self
                .fields
                .iter()
                .map(|f| codec::cstring_len(&f.name, charset) + 4 + 2 + 4 + 2 + 4 + 2)
                .sum::<usize>()
    }

    fn encode_body(&self, buf: &mut BytesMut, charset: Charset) -> PgStreamResult<()> {
        buf.put_i16(self.fields.len() as i16);

        for field in &self.fields {
            codec::put_cstring(buf, &field.name, charset)?;
            buf.put_i32(field.table_id);
            buf.put_i16(field.column_id);
            buf.put_u32(field.type_id);
            buf.put_i16(field.type_size);
            buf.put_i32(field.type_modifier);
            buf.put_i16(field.format_code);
        }

        Ok(())
    }

    fn decode_body(buf: &mut BytesMut, _: usize, ctx: &DecodeContext) -> PgStreamResult<Self> {
        let fields_len = buf.get_i16();
        let mut fields = Vec::with_capacity(fields_len as usize);

        for _ in 0..fields_len {
            let field = FieldDescription {
                name: codec::get_cstring(buf, ctx.charset)?.unwrap_or_default(),
                table_id: buf.get_i32(),
                column_id: buf.get_i16(),
                type_id: buf.get_u32(),
                type_size: buf.get_i16(),
                type_modifier: buf.get_i32(),
                format_code: buf.get_i16(),
            };

            fields.push(field);
        }

        Ok(RowDescription { fields })
    }
}

/// Data structure returned when frontend describes a statement.
#[non_exhaustive]
#[derive(PartialEq, Eq, Debug, Default, new, Clone)]
pub struct ParameterDescription {
    /// parameter types
    pub types: Vec<Oid>,
}

pub const MESSAGE_TYPE_BYTE_PARAMETER_DESCRIPTION: u8 = b't';

impl Message for ParameterDescription {
    fn message_type() -> Option<u8> {
        Some(MESSAGE_TYPE_BYTE_PARAMETER_DESCRIPTION)
    }

    fn message_length(&self, _charset: Charset) -> usize {
        4 + 2 + self.types.len() * 4
    }

    fn encode_body(&self, buf: &mut BytesMut, _charset: Charset) -> PgStreamResult<()> {
        buf.put_i16(self.types.len() as i16);

        for t in &self.types {
            buf.put_u32(*t);
        }

        Ok(())
    }

    fn decode_body(buf: &mut BytesMut, _: usize, _ctx: &DecodeContext) -> PgStreamResult<Self> {
        let types_len = buf.get_i16();
        let mut types = Vec::with_capacity(types_len as usize);

        for _ in 0..types_len {
            types.push(buf.get_u32());
        }

        Ok(ParameterDescription { types })
    }
}

/// Data structure for the postgresql wire protocol `DataRow` message.
///
/// Values are raw bytes in text or binary format as announced by the
/// preceding `RowDescription`; `None` marks a NULL column. Interpreting the
/// bytes is the job of [`crate::types::ColumnDecoder`].
#[non_exhaustive]
#[derive(PartialEq, Eq, Debug, Default, new, Clone)]
pub struct DataRow {
    pub fields: Vec<Option<Bytes>>,
}

pub const MESSAGE_TYPE_BYTE_DATA_ROW: u8 = b'D';

impl Message for DataRow {
    #[inline]
    fn message_type() -> Option<u8> {
        Some(MESSAGE_TYPE_BYTE_DATA_ROW)
    }

    fn message_length(&self, _charset: Charset) -> usize {
        4 + 2
            + self
                .fields
                .iter()
                .map(codec::length_prefixed_len)
                .sum::<usize>()
    }

    fn encode_body(&self, buf: &mut BytesMut, _charset: Charset) -> PgStreamResult<()> {
        buf.put_i16(self.fields.len() as i16);
        for field in &self.fields {
            codec::put_length_prefixed(buf, field);
        }

        Ok(())
    }

    fn decode_body(buf: &mut BytesMut, _: usize, _ctx: &DecodeContext) -> PgStreamResult<Self> {
        let field_count = buf.get_i16() as usize;

        let mut fields = Vec::with_capacity(field_count);
        for _ in 0..field_count {
            fields.push(codec::get_length_prefixed(buf)?);
        }

        Ok(DataRow { fields })
    }
}

/// Postgres response when a statement returns no data, sent from backend to
/// frontend in extended query.
#[non_exhaustive]
#[derive(PartialEq, Eq, Debug, Default, new)]
pub struct NoData;

pub const MESSAGE_TYPE_BYTE_NO_DATA: u8 = b'n';

impl NoData {
    const ENCODED: [u8; 5] = [MESSAGE_TYPE_BYTE_NO_DATA, 0, 0, 0, 4];
}

impl Message for NoData {
    #[inline]
    fn message_type() -> Option<u8> {
        Some(MESSAGE_TYPE_BYTE_NO_DATA)
    }

    #[inline]
    fn message_length(&self, _charset: Charset) -> usize {
        4
    }

    fn encode(&self, buf: &mut BytesMut, _charset: Charset) -> PgStreamResult<()> {
        buf.put_slice(&Self::ENCODED);
        Ok(())
    }

    fn encode_body(&self, _buf: &mut BytesMut, _charset: Charset) -> PgStreamResult<()> {
        Ok(())
    }

    fn decode_body(_buf: &mut BytesMut, _: usize, _ctx: &DecodeContext) -> PgStreamResult<Self> {
        Ok(NoData::new())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_data_row_null_is_minus_one_only() {
        // column count 2: one NULL, one with an ill-formed negative length
        let mut buf = BytesMut::new();
        buf.put_u8(MESSAGE_TYPE_BYTE_DATA_ROW);
        buf.put_i32(4 + 2 + 4 + 4);
        buf.put_i16(2);
        buf.put_i32(-1);
        buf.put_i32(-3);

        let ctx = DecodeContext::default();
        let result = DataRow::decode(&mut buf, &ctx);
        assert!(matches!(result, Err(PgStreamError::InvalidValueLength(-3))));
    }

    #[test]
    fn test_field_formats_encoding() {
        let mut buf = BytesMut::new();
        FieldFormats::Default.encode(&mut buf);
        assert_eq!(buf.as_ref(), &[0, 0]);

        let mut buf = BytesMut::new();
        FieldFormats::Uniform(FieldFormat::Binary).encode(&mut buf);
        assert_eq!(buf.as_ref(), &[0, 1, 0, 1]);

        let mut buf = BytesMut::new();
        FieldFormats::PerColumn(vec![FieldFormat::Text, FieldFormat::Binary]).encode(&mut buf);
        assert_eq!(buf.as_ref(), &[0, 2, 0, 0, 0, 1]);
    }

    #[test]
    fn test_field_format_unknown_code() {
        assert!(matches!(
            FieldFormat::try_from(2),
            Err(PgStreamError::UnsupportedFormatType(2))
        ));
    }
}
