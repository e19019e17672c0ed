use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::data::FieldFormat;
use super::{codec, DecodeContext, Message};
use crate::charset::Charset;
use crate::error::{PgStreamError, PgStreamResult};

pub const MESSAGE_TYPE_BYTE_COPY_DATA: u8 = b'd';

/// One chunk of COPY payload, flowing in either direction.
#[non_exhaustive]
#[derive(PartialEq, Eq, Debug, Default, new)]
pub struct CopyData {
    pub data: Bytes,
}

impl Message for CopyData {
    #[inline]
    fn message_type() -> Option<u8> {
        Some(MESSAGE_TYPE_BYTE_COPY_DATA)
    }

    fn message_length(&self, _charset: Charset) -> usize {
        4 + self.data.len()
    }

    fn encode_body(&self, buf: &mut BytesMut, _charset: Charset) -> PgStreamResult<()> {
        buf.put(self.data.as_ref());
        Ok(())
    }

    fn decode_body(
        buf: &mut BytesMut,
        full_len: usize,
        _ctx: &DecodeContext,
    ) -> PgStreamResult<Self> {
        let data = buf.split_to(full_len - 4).freeze();
        Ok(Self::new(data))
    }
}

pub const MESSAGE_TYPE_BYTE_COPY_DONE: u8 = b'c';

#[non_exhaustive]
#[derive(PartialEq, Eq, Debug, Default, new)]
pub struct CopyDone;

impl CopyDone {
    const ENCODED: [u8; 5] = [MESSAGE_TYPE_BYTE_COPY_DONE, 0, 0, 0, 4];
}

impl Message for CopyDone {
    #[inline]
    fn message_type() -> Option<u8> {
        Some(MESSAGE_TYPE_BYTE_COPY_DONE)
    }

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
        Ok(Self::new())
    }
}

pub const MESSAGE_TYPE_BYTE_COPY_FAIL: u8 = b'f';

/// Frontend aborts a COPY-in transfer, with a reason.
#[non_exhaustive]
#[derive(PartialEq, Eq, Debug, Default, new)]
pub struct CopyFail {
    pub message: String,
}

impl Message for CopyFail {
    #[inline]
    fn message_type() -> Option<u8> {
        Some(MESSAGE_TYPE_BYTE_COPY_FAIL)
    }

    fn message_length(&self, charset: Charset) -> usize {
        4 + codec::cstring_len(&self.message, charset)
    }

    fn encode_body(&self, buf: &mut BytesMut, charset: Charset) -> PgStreamResult<()> {
        codec::put_cstring(buf, &self.message, charset)
    }

    fn decode_body(buf: &mut BytesMut, _: usize, ctx: &DecodeContext) -> PgStreamResult<Self> {
        let message = codec::get_cstring(buf, ctx.charset)?.unwrap_or_default();
        Ok(Self::new(message))
    }
}

fn copy_response_length(column_formats: &[FieldFormat]) -> usize {
    4 + 1 + 2 + column_formats.len() * 2
}

fn encode_copy_response_body(
    buf: &mut BytesMut,
    format: FieldFormat,
    column_formats: &[FieldFormat],
) {
    buf.put_i8(format.code() as i8);
    buf.put_i16(column_formats.len() as i16);
    for column_format in column_formats {
        buf.put_i16(column_format.code());
    }
}

/// Shared body decode of the three copy-response messages.
///
/// An overall text format forbids any per-column binary format; the error
/// reports every offending column index.
fn decode_copy_response_body(
    buf: &mut BytesMut,
) -> PgStreamResult<(FieldFormat, Vec<FieldFormat>)> {
    let format = FieldFormat::try_from(buf.get_i8() as i16)?;

    let columns = buf.get_i16();
    let mut column_formats = Vec::with_capacity(columns as usize);
    for _ in 0..columns {
        column_formats.push(FieldFormat::try_from(buf.get_i16())?);
    }

    if format == FieldFormat::Text {
        let binary_columns: Vec<usize> = column_formats
            .iter()
            .enumerate()
            .filter(|(_, f)| **f == FieldFormat::Binary)
            .map(|(i, _)| i)
            .collect();
        if !binary_columns.is_empty() {
            return Err(PgStreamError::UnexpectedBinaryColumnFormat(binary_columns));
        }
    }

    Ok((format, column_formats))
}

pub const MESSAGE_TYPE_BYTE_COPY_IN_RESPONSE: u8 = b'G';

/// Backend is ready to receive COPY data.
#[non_exhaustive]
#[derive(PartialEq, Eq, Debug, Default, new)]
pub struct CopyInResponse {
    pub format: FieldFormat,
    pub column_formats: Vec<FieldFormat>,
}

impl Message for CopyInResponse {
    #[inline]
    fn message_type() -> Option<u8> {
        Some(MESSAGE_TYPE_BYTE_COPY_IN_RESPONSE)
    }

    fn message_length(&self, _charset: Charset) -> usize {
        copy_response_length(&self.column_formats)
    }

    fn encode_body(&self, buf: &mut BytesMut, _charset: Charset) -> PgStreamResult<()> {
        encode_copy_response_body(buf, self.format, &self.column_formats);
        Ok(())
    }

    fn decode_body(buf: &mut BytesMut, _: usize, _ctx: &DecodeContext) -> PgStreamResult<Self> {
        let (format, column_formats) = decode_copy_response_body(buf)?;
        Ok(Self::new(format, column_formats))
    }
}

pub const MESSAGE_TYPE_BYTE_COPY_OUT_RESPONSE: u8 = b'H';

/// Backend is about to send COPY data.
#[non_exhaustive]
#[derive(PartialEq, Eq, Debug, Default, new)]
pub struct CopyOutResponse {
    pub format: FieldFormat,
    pub column_formats: Vec<FieldFormat>,
}

impl Message for CopyOutResponse {
    #[inline]
    fn message_type() -> Option<u8> {
        Some(MESSAGE_TYPE_BYTE_COPY_OUT_RESPONSE)
    }

    fn message_length(&self, _charset: Charset) -> usize {
        copy_response_length(&self.column_formats)
    }

    fn encode_body(&self, buf: &mut BytesMut, _charset: Charset) -> PgStreamResult<()> {
        encode_copy_response_body(buf, self.format, &self.column_formats);
        Ok(())
    }

    fn decode_body(buf: &mut BytesMut, _: usize, _ctx: &DecodeContext) -> PgStreamResult<Self> {
        let (format, column_formats) = decode_copy_response_body(buf)?;
        Ok(Self::new(format, column_formats))
    }
}

pub const MESSAGE_TYPE_BYTE_COPY_BOTH_RESPONSE: u8 = b'W';

/// Copy transfer in both directions, used by streaming replication.
#[non_exhaustive]
#[derive(PartialEq, Eq, Debug, Default, new)]
pub struct CopyBothResponse {
    pub format: FieldFormat,
    pub column_formats: Vec<FieldFormat>,
}

impl Message for CopyBothResponse {
    #[inline]
    fn message_type() -> Option<u8> {
        Some(MESSAGE_TYPE_BYTE_COPY_BOTH_RESPONSE)
    }

    fn message_length(&self, _charset: Charset) -> usize {
        copy_response_length(&self.column_formats)
    }

    fn encode_body(&self, buf: &mut BytesMut, _charset: Charset) -> PgStreamResult<()> {
        encode_copy_response_body(buf, self.format, &self.column_formats);
        Ok(())
    }

    fn decode_body(buf: &mut BytesMut, _: usize, _ctx: &DecodeContext) -> PgStreamResult<Self> {
        let (format, column_formats) = decode_copy_response_body(buf)?;
        Ok(Self::new(format, column_formats))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_copy_in_text_with_binary_columns() {
        let mut buf = BytesMut::new();
        buf.put_u8(MESSAGE_TYPE_BYTE_COPY_IN_RESPONSE);
        buf.put_i32(4 + 1 + 2 + 6);
        buf.put_i8(0); // overall text
        buf.put_i16(3);
        buf.put_i16(0);
        buf.put_i16(1);
        buf.put_i16(1);

        let ctx = DecodeContext::default();
        let result = CopyInResponse::decode(&mut buf, &ctx);
        match result {
            Err(PgStreamError::UnexpectedBinaryColumnFormat(columns)) => {
                assert_eq!(columns, vec![1, 2]);
            }
            other => panic!("expected UnexpectedBinaryColumnFormat, got {:?}", other),
        }
    }

    #[test]
    fn test_copy_response_binary_overall_allows_mixed() {
        let copy = CopyBothResponse::new(
            FieldFormat::Binary,
            vec![FieldFormat::Text, FieldFormat::Binary],
        );

        let mut buf = BytesMut::new();
        copy.encode(&mut buf, Charset::Utf8).unwrap();

        let ctx = DecodeContext::default();
        let decoded = CopyBothResponse::decode(&mut buf, &ctx).unwrap().unwrap();
        assert_eq!(copy, decoded);
    }
}
