use bytes::{Buf, BufMut, BytesMut};

use super::{DecodeContext, Message};
use crate::charset::Charset;
use crate::error::PgStreamResult;

/// Request to cancel a query running on another connection, identified by
/// the process id and secret key from that connection's `BackendKeyData`.
///
/// Like `SslRequest` this is a version-zero message: no type byte, the
/// payload starts with a magic number.
#[non_exhaustive]
#[derive(PartialEq, Eq, Debug, new)]
pub struct CancelRequest {
    pub process_id: i32,
    pub secret_key: i32,
}

impl CancelRequest {
    pub const BODY_MAGIC_NUMBER: i32 = 80877102;
    pub const BODY_SIZE: usize = 16;
}

impl Message for CancelRequest {
    #[inline]
    fn message_type() -> Option<u8> {
        None
    }

    #[inline]
    fn message_length(&self, _charset: Charset) -> usize {
        Self::BODY_SIZE
    }

    fn encode_body(&self, buf: &mut BytesMut, _charset: Charset) -> PgStreamResult<()> {
        buf.put_i32(Self::BODY_MAGIC_NUMBER);
        buf.put_i32(self.process_id);
        buf.put_i32(self.secret_key);
        Ok(())
    }

    fn decode_body(
        _buf: &mut BytesMut,
        _full_len: usize,
        _ctx: &DecodeContext,
    ) -> PgStreamResult<Self> {
        unreachable!();
    }

    /// Try to decode and check if the packet is a `CancelRequest`.
    fn decode(buf: &mut BytesMut, _ctx: &DecodeContext) -> PgStreamResult<Option<Self>> {
        if buf.remaining() >= Self::BODY_SIZE
            && (&buf[4..8]).get_i32() == Self::BODY_MAGIC_NUMBER
        {
            buf.advance(8);
            let process_id = buf.get_i32();
            let secret_key = buf.get_i32();
            Ok(Some(CancelRequest::new(process_id, secret_key)))
        } else {
            Ok(None)
        }
    }
}
