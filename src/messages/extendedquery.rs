use bytes::{Buf, BufMut, Bytes, BytesMut};
use postgres_types::Oid;

use super::data::{FieldFormat, FieldFormats};
use super::{codec, DecodeContext, Message};
use crate::charset::Charset;
use crate::error::{PgStreamError, PgStreamResult};

pub const TARGET_TYPE_BYTE_PORTAL: u8 = b'P';
pub const TARGET_TYPE_BYTE_STATEMENT: u8 = b'S';

/// Descriptor of what `Close` and `Describe` act on: a portal or a prepared
/// statement. `None` names the unnamed portal/statement.
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum Target {
    Portal(Option<String>),
    Statement(Option<String>),
}

impl Target {
    pub fn name(&self) -> Option<&str> {
        match self {
            Target::Portal(name) | Target::Statement(name) => name.as_deref(),
        }
    }

    fn kind_byte(&self) -> u8 {
        match self {
            Target::Portal(_) => TARGET_TYPE_BYTE_PORTAL,
            Target::Statement(_) => TARGET_TYPE_BYTE_STATEMENT,
        }
    }

    fn encoded_len(&self, charset: Charset) -> usize {
        let name = match self {
            Target::Portal(name) | Target::Statement(name) => name,
        };
        1 + codec::option_cstring_len(name, charset)
    }

    fn encode(&self, buf: &mut BytesMut, charset: Charset) -> PgStreamResult<()> {
        buf.put_u8(self.kind_byte());
        match self {
            Target::Portal(name) | Target::Statement(name) => {
                codec::put_option_cstring(buf, name, charset)
            }
        }
    }

    fn decode(buf: &mut BytesMut, ctx: &DecodeContext) -> PgStreamResult<Target> {
        let kind = buf.get_u8();
        let name = codec::get_cstring(buf, ctx.charset)?;
        match kind {
            TARGET_TYPE_BYTE_PORTAL => Ok(Target::Portal(name)),
            TARGET_TYPE_BYTE_STATEMENT => Ok(Target::Statement(name)),
            _ => Err(PgStreamError::UnsupportedTargetType(kind)),
        }
    }
}

/// A bound parameter value: its wire format tag and the encoded bytes,
/// `None` for NULL.
#[derive(PartialEq, Eq, Debug, Clone, new)]
pub struct Parameter {
    pub format: FieldFormat,
    pub value: Option<Bytes>,
}

impl Parameter {
    pub fn text(value: impl Into<Bytes>) -> Parameter {
        Parameter::new(FieldFormat::Text, Some(value.into()))
    }

    pub fn null() -> Parameter {
        Parameter::new(FieldFormat::Text, None)
    }
}

pub(crate) fn parameters_len(parameters: &[Parameter]) -> usize {
    // format count + formats, value count + length-prefixed values
    2 + 2 * parameters.len()
        + 2
        + parameters
            .iter()
            .map(|p| codec::length_prefixed_len(&p.value))
            .sum::<usize>()
}

pub(crate) fn put_parameters(buf: &mut BytesMut, parameters: &[Parameter]) {
    buf.put_i16(parameters.len() as i16);
    for parameter in parameters {
        buf.put_i16(parameter.format.code());
    }

    buf.put_i16(parameters.len() as i16);
    for parameter in parameters {
        codec::put_length_prefixed(buf, &parameter.value);
    }
}

pub(crate) fn get_parameters(buf: &mut BytesMut) -> PgStreamResult<Vec<Parameter>> {
    let format_count = buf.get_i16() as usize;
    let mut formats = Vec::with_capacity(format_count);
    for _ in 0..format_count {
        formats.push(FieldFormat::try_from(buf.get_i16())?);
    }

    let value_count = buf.get_i16() as usize;
    if format_count > 1 && format_count != value_count {
        return Err(PgStreamError::ParameterFormatCountMismatch(
            format_count,
            value_count,
        ));
    }

    let mut parameters = Vec::with_capacity(value_count);
    for i in 0..value_count {
        // zero formats leave every value at the text default, a single
        // format applies to all values
        let format = match format_count {
            0 => FieldFormat::Text,
            1 => formats[0],
            _ => formats[i],
        };
        parameters.push(Parameter::new(format, codec::get_length_prefixed(buf)?));
    }

    Ok(parameters)
}

/// Request from frontend to parse a prepared query string.
#[non_exhaustive]
#[derive(PartialEq, Eq, Debug, new)]
pub struct Parse {
    pub name: Option<String>,
    pub query: String,
    pub type_oids: Vec<Oid>,
}

pub const MESSAGE_TYPE_BYTE_PARSE: u8 = b'P';

impl Message for Parse {
    #[inline]
    fn message_type() -> Option<u8> {
        Some(MESSAGE_TYPE_BYTE_PARSE)
    }

    fn message_length(&self, charset: Charset) -> usize {
        4 + codec::option_cstring_len(&self.name, charset)
            + codec::cstring_len(&self.query, charset)
            + 2
            + 4 * self.type_oids.len()
    }

    fn encode_body(&self, buf: &mut BytesMut, charset: Charset) -> PgStreamResult<()> {
        codec::put_option_cstring(buf, &self.name, charset)?;
        codec::put_cstring(buf, &self.query, charset)?;

        buf.put_i16(self.type_oids.len() as i16);
        for oid in &self.type_oids {
            buf.put_u32(*oid);
        }

        Ok(())
    }

    fn decode_body(buf: &mut BytesMut, _: usize, ctx: &DecodeContext) -> PgStreamResult<Self> {
        let name = codec::get_cstring(buf, ctx.charset)?;
        let query = codec::get_cstring(buf, ctx.charset)?.unwrap_or_default();

        let type_oid_count = buf.get_i16();
        let mut type_oids = Vec::with_capacity(type_oid_count as usize);
        for _ in 0..type_oid_count {
            type_oids.push(buf.get_u32());
        }

        Ok(Parse {
            name,
            query,
            type_oids,
        })
    }
}

/// Response for Parse command, sent from backend to frontend.
#[non_exhaustive]
#[derive(PartialEq, Eq, Debug, new)]
pub struct ParseComplete;

pub const MESSAGE_TYPE_BYTE_PARSE_COMPLETE: u8 = b'1';

impl ParseComplete {
    const ENCODED: [u8; 5] = [MESSAGE_TYPE_BYTE_PARSE_COMPLETE, 0, 0, 0, 4];
}

impl Message for ParseComplete {
    #[inline]
    fn message_type() -> Option<u8> {
        Some(MESSAGE_TYPE_BYTE_PARSE_COMPLETE)
    }

    #[inline]
    fn message_length(&self, _charset: Charset) -> usize {
        4
    }

    fn encode(&self, buf: &mut BytesMut, _charset: Charset) -> PgStreamResult<()> {
        buf.put_slice(&Self::ENCODED);
        Ok(())
    }

    #[inline]
    fn encode_body(&self, _buf: &mut BytesMut, _charset: Charset) -> PgStreamResult<()> {
        Ok(())
    }

    #[inline]
    fn decode_body(_buf: &mut BytesMut, _: usize, _ctx: &DecodeContext) -> PgStreamResult<Self> {
        Ok(ParseComplete)
    }
}

/// Closing a prepared statement or portal.
#[non_exhaustive]
#[derive(PartialEq, Eq, Debug, new)]
pub struct Close {
    pub target: Target,
}

pub const MESSAGE_TYPE_BYTE_CLOSE: u8 = b'C';

impl Message for Close {
    #[inline]
    fn message_type() -> Option<u8> {
        Some(MESSAGE_TYPE_BYTE_CLOSE)
    }

    fn message_length(&self, charset: Charset) -> usize {
        4 + self.target.encoded_len(charset)
    }

    fn encode_body(&self, buf: &mut BytesMut, charset: Charset) -> PgStreamResult<()> {
        self.target.encode(buf, charset)
    }

    fn decode_body(buf: &mut BytesMut, _: usize, ctx: &DecodeContext) -> PgStreamResult<Self> {
        Ok(Close {
            target: Target::decode(buf, ctx)?,
        })
    }
}

/// Response for Close command, sent from backend to frontend.
#[non_exhaustive]
#[derive(PartialEq, Eq, Debug, new)]
pub struct CloseComplete;

pub const MESSAGE_TYPE_BYTE_CLOSE_COMPLETE: u8 = b'3';

impl CloseComplete {
    const ENCODED: [u8; 5] = [MESSAGE_TYPE_BYTE_CLOSE_COMPLETE, 0, 0, 0, 4];
}

impl Message for CloseComplete {
    #[inline]
    fn message_type() -> Option<u8> {
        Some(MESSAGE_TYPE_BYTE_CLOSE_COMPLETE)
    }

    #[inline]
    fn message_length(&self, _charset: Charset) -> usize {
        4
    }

    fn encode(&self, buf: &mut BytesMut, _charset: Charset) -> PgStreamResult<()> {
        buf.put_slice(&Self::ENCODED);
        Ok(())
    }

    #[inline]
    fn encode_body(&self, _buf: &mut BytesMut, _charset: Charset) -> PgStreamResult<()> {
        Ok(())
    }

    #[inline]
    fn decode_body(_buf: &mut BytesMut, _: usize, _ctx: &DecodeContext) -> PgStreamResult<Self> {
        Ok(CloseComplete)
    }
}

/// Bind command, for executing a prepared statement with concrete
/// parameter values.
#[non_exhaustive]
#[derive(PartialEq, Eq, Debug, new)]
pub struct Bind {
    pub portal_name: Option<String>,
    pub statement_name: Option<String>,
    pub parameters: Vec<Parameter>,
    pub result_formats: FieldFormats,
}

pub const MESSAGE_TYPE_BYTE_BIND: u8 = b'B';

impl Message for Bind {
    #[inline]
    fn message_type() -> Option<u8> {
        Some(MESSAGE_TYPE_BYTE_BIND)
    }

    fn message_length(&self, charset: Charset) -> usize {
        4 + codec::option_cstring_len(&self.portal_name, charset)
            + codec::option_cstring_len(&self.statement_name, charset)
            + parameters_len(&self.parameters)
            + self.result_formats.encoded_len()
    }

    fn encode_body(&self, buf: &mut BytesMut, charset: Charset) -> PgStreamResult<()> {
        codec::put_option_cstring(buf, &self.portal_name, charset)?;
        codec::put_option_cstring(buf, &self.statement_name, charset)?;

        put_parameters(buf, &self.parameters);
        self.result_formats.encode(buf);

        Ok(())
    }

    fn decode_body(buf: &mut BytesMut, _: usize, ctx: &DecodeContext) -> PgStreamResult<Self> {
        let portal_name = codec::get_cstring(buf, ctx.charset)?;
        let statement_name = codec::get_cstring(buf, ctx.charset)?;

        let parameters = get_parameters(buf)?;
        let result_formats = FieldFormats::decode(buf)?;

        Ok(Bind {
            portal_name,
            statement_name,
            parameters,
            result_formats,
        })
    }
}

/// Success response for `Bind`.
#[non_exhaustive]
#[derive(PartialEq, Eq, Debug, new)]
pub struct BindComplete;

pub const MESSAGE_TYPE_BYTE_BIND_COMPLETE: u8 = b'2';

impl BindComplete {
    const ENCODED: [u8; 5] = [MESSAGE_TYPE_BYTE_BIND_COMPLETE, 0, 0, 0, 4];
}

impl Message for BindComplete {
    #[inline]
    fn message_type() -> Option<u8> {
        Some(MESSAGE_TYPE_BYTE_BIND_COMPLETE)
    }

    #[inline]
    fn message_length(&self, _charset: Charset) -> usize {
        4
    }

    fn encode(&self, buf: &mut BytesMut, _charset: Charset) -> PgStreamResult<()> {
        buf.put_slice(&Self::ENCODED);
        Ok(())
    }

    #[inline]
    fn encode_body(&self, _buf: &mut BytesMut, _charset: Charset) -> PgStreamResult<()> {
        Ok(())
    }

    #[inline]
    fn decode_body(_buf: &mut BytesMut, _: usize, _ctx: &DecodeContext) -> PgStreamResult<Self> {
        Ok(BindComplete)
    }
}

/// Describe command from frontend to backend, for getting metadata of a
/// particular portal or statement.
#[non_exhaustive]
#[derive(PartialEq, Eq, Debug, new)]
pub struct Describe {
    pub target: Target,
}

pub const MESSAGE_TYPE_BYTE_DESCRIBE: u8 = b'D';

impl Message for Describe {
    #[inline]
    fn message_type() -> Option<u8> {
        Some(MESSAGE_TYPE_BYTE_DESCRIBE)
    }

    fn message_length(&self, charset: Charset) -> usize {
        4 + self.target.encoded_len(charset)
    }

    fn encode_body(&self, buf: &mut BytesMut, charset: Charset) -> PgStreamResult<()> {
        self.target.encode(buf, charset)
    }

    fn decode_body(buf: &mut BytesMut, _: usize, ctx: &DecodeContext) -> PgStreamResult<Self> {
        Ok(Describe {
            target: Target::decode(buf, ctx)?,
        })
    }
}

/// Execute a portal by its name. `max_rows` of zero means unlimited.
#[non_exhaustive]
#[derive(PartialEq, Eq, Debug, new)]
pub struct Execute {
    pub name: Option<String>,
    pub max_rows: i32,
}

pub const MESSAGE_TYPE_BYTE_EXECUTE: u8 = b'E';

impl Message for Execute {
    #[inline]
    fn message_type() -> Option<u8> {
        Some(MESSAGE_TYPE_BYTE_EXECUTE)
    }

    fn message_length(&self, charset: Charset) -> usize {
        4 + codec::option_cstring_len(&self.name, charset) + 4
    }

    fn encode_body(&self, buf: &mut BytesMut, charset: Charset) -> PgStreamResult<()> {
        codec::put_option_cstring(buf, &self.name, charset)?;
        buf.put_i32(self.max_rows);
        Ok(())
    }

    fn decode_body(buf: &mut BytesMut, _: usize, ctx: &DecodeContext) -> PgStreamResult<Self> {
        let name = codec::get_cstring(buf, ctx.charset)?;
        let max_rows = buf.get_i32();

        Ok(Execute { name, max_rows })
    }
}

/// Ask the backend to deliver pending response data without waiting for a
/// sync point.
#[non_exhaustive]
#[derive(PartialEq, Eq, Debug, new)]
pub struct Flush;

pub const MESSAGE_TYPE_BYTE_FLUSH: u8 = b'H';

impl Flush {
    const ENCODED: [u8; 5] = [MESSAGE_TYPE_BYTE_FLUSH, 0, 0, 0, 4];
}

impl Message for Flush {
    #[inline]
    fn message_type() -> Option<u8> {
        Some(MESSAGE_TYPE_BYTE_FLUSH)
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
        Ok(Flush)
    }
}

/// End of an extended-query cycle.
#[non_exhaustive]
#[derive(PartialEq, Eq, Debug, new)]
pub struct Sync;

pub const MESSAGE_TYPE_BYTE_SYNC: u8 = b'S';

impl Sync {
    const ENCODED: [u8; 5] = [MESSAGE_TYPE_BYTE_SYNC, 0, 0, 0, 4];
}

impl Message for Sync {
    #[inline]
    fn message_type() -> Option<u8> {
        Some(MESSAGE_TYPE_BYTE_SYNC)
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
        Ok(Sync)
    }
}

/// Sent instead of `CommandComplete` when an `Execute` row limit was
/// reached before the portal ran dry.
#[non_exhaustive]
#[derive(PartialEq, Eq, Debug, new)]
pub struct PortalSuspended;

pub const MESSAGE_TYPE_BYTE_PORTAL_SUSPENDED: u8 = b's';

impl PortalSuspended {
    const ENCODED: [u8; 5] = [MESSAGE_TYPE_BYTE_PORTAL_SUSPENDED, 0, 0, 0, 4];
}

impl Message for PortalSuspended {
    #[inline]
    fn message_type() -> Option<u8> {
        Some(MESSAGE_TYPE_BYTE_PORTAL_SUSPENDED)
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
        Ok(PortalSuspended)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_target_unknown_kind() {
        let mut buf = BytesMut::from(&b"Xcursor0\0"[..]);
        let ctx = DecodeContext::default();
        assert!(matches!(
            Target::decode(&mut buf, &ctx),
            Err(PgStreamError::UnsupportedTargetType(b'X'))
        ));
    }

    #[test]
    fn test_parameters_single_format_applies_to_all() {
        let mut buf = BytesMut::new();
        buf.put_i16(1);
        buf.put_i16(FieldFormat::Binary.code());
        buf.put_i16(2);
        buf.put_i32(1);
        buf.put_u8(0xAA);
        buf.put_i32(-1);

        let parameters = get_parameters(&mut buf).unwrap();
        assert_eq!(parameters.len(), 2);
        assert_eq!(parameters[0].format, FieldFormat::Binary);
        assert_eq!(parameters[1].format, FieldFormat::Binary);
        assert_eq!(parameters[1].value, None);
    }

    #[test]
    fn test_parameters_count_mismatch() {
        let mut buf = BytesMut::new();
        buf.put_i16(2);
        buf.put_i16(0);
        buf.put_i16(0);
        buf.put_i16(3);

        assert!(matches!(
            get_parameters(&mut buf),
            Err(PgStreamError::ParameterFormatCountMismatch(2, 3))
        ));
    }
}
