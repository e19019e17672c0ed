use bytes::{Buf, BufMut, Bytes, BytesMut};
use postgres_types::Oid;

use super::data::FieldFormat;
use super::extendedquery::{get_parameters, parameters_len, put_parameters, Parameter};
use super::{codec, DecodeContext, Message};
use crate::charset::Charset;
use crate::error::PgStreamResult;

/// Direct invocation of a backend function by OID, the legacy fast-path
/// subprotocol.
#[non_exhaustive]
#[derive(PartialEq, Eq, Debug, new)]
pub struct FunctionCall {
    pub object_id: Oid,
    pub arguments: Vec<Parameter>,
    pub result_format: FieldFormat,
}

pub const MESSAGE_TYPE_BYTE_FUNCTION_CALL: u8 = b'F';

impl Message for FunctionCall {
    #[inline]
    fn message_type() -> Option<u8> {
        Some(MESSAGE_TYPE_BYTE_FUNCTION_CALL)
    }

    fn message_length(&self, _charset: Charset) -> usize {
        4 + 4 + parameters_len(&self.arguments) + 2
    }

    fn encode_body(&self, buf: &mut BytesMut, _charset: Charset) -> PgStreamResult<()> {
        buf.put_u32(self.object_id);
        put_parameters(buf, &self.arguments);
        buf.put_i16(self.result_format.code());
        Ok(())
    }

    fn decode_body(buf: &mut BytesMut, _: usize, _ctx: &DecodeContext) -> PgStreamResult<Self> {
        let object_id = buf.get_u32();
        let arguments = get_parameters(buf)?;
        let result_format = FieldFormat::try_from(buf.get_i16())?;

        Ok(FunctionCall {
            object_id,
            arguments,
            result_format,
        })
    }
}

/// Result value of a `FunctionCall`, `None` when the function returned
/// NULL.
#[non_exhaustive]
#[derive(PartialEq, Eq, Debug, new)]
pub struct FunctionCallResponse {
    pub value: Option<Bytes>,
}

pub const MESSAGE_TYPE_BYTE_FUNCTION_CALL_RESPONSE: u8 = b'V';

impl Message for FunctionCallResponse {
    #[inline]
    fn message_type() -> Option<u8> {
        Some(MESSAGE_TYPE_BYTE_FUNCTION_CALL_RESPONSE)
    }

    fn message_length(&self, _charset: Charset) -> usize {
        4 + codec::length_prefixed_len(&self.value)
    }

    fn encode_body(&self, buf: &mut BytesMut, _charset: Charset) -> PgStreamResult<()> {
        codec::put_length_prefixed(buf, &self.value);
        Ok(())
    }

    fn decode_body(buf: &mut BytesMut, _: usize, _ctx: &DecodeContext) -> PgStreamResult<Self> {
        let value = codec::get_length_prefixed(buf)?;
        Ok(FunctionCallResponse { value })
    }
}
