use bytes::{BufMut, BytesMut};

use super::{DecodeContext, Message};
use crate::charset::Charset;
use crate::error::PgStreamResult;

pub const MESSAGE_TYPE_BYTE_TERMINATE: u8 = b'X';

/// Graceful connection shutdown, sent by the frontend. No payload.
#[non_exhaustive]
#[derive(Default, PartialEq, Eq, Debug, new)]
pub struct Terminate;

impl Terminate {
    const ENCODED: [u8; 5] = [MESSAGE_TYPE_BYTE_TERMINATE, 0, 0, 0, 4];
}

impl Message for Terminate {
    #[inline]
    fn message_type() -> Option<u8> {
        Some(MESSAGE_TYPE_BYTE_TERMINATE)
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
        Ok(Terminate)
    }
}
