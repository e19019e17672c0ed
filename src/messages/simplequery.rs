use bytes::BytesMut;

use super::{codec, DecodeContext, Message};
use crate::charset::Charset;
use crate::error::PgStreamResult;

/// A sql query sent from frontend to backend.
#[non_exhaustive]
#[derive(PartialEq, Eq, Debug, new)]
pub struct Query {
    pub query: String,
}

pub const MESSAGE_TYPE_BYTE_QUERY: u8 = b'Q';

impl Message for Query {
    #[inline]
    fn message_type() -> Option<u8> {
        Some(MESSAGE_TYPE_BYTE_QUERY)
    }

    fn message_length(&self, charset: Charset) -> usize {
        4 + codec::cstring_len(&self.query, charset)
    }

    fn encode_body(&self, buf: &mut BytesMut, charset: Charset) -> PgStreamResult<()> {
        codec::put_cstring(buf, &self.query, charset)
    }

    fn decode_body(buf: &mut BytesMut, _: usize, ctx: &DecodeContext) -> PgStreamResult<Self> {
        let query = codec::get_cstring(buf, ctx.charset)?.unwrap_or_default();

        Ok(Query::new(query))
    }
}
