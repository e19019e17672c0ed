//! Streaming decoder stage on top of `tokio-util`'s codec framework.
//!
//! [`PgStreamClientCodec`] turns a raw byte stream into backend messages
//! and frontend messages into bytes. Wrapped in a
//! [`Framed`](tokio_util::codec::Framed) transport it gives the two
//! consumer-facing halves of the codec: a `Sink` to submit frontend
//! messages and a lazy, non-restartable `Stream` of backend messages.
//!
//! The emitted message sequence is a function of the concatenated input
//! bytes only; chunk boundaries never matter. Any decode failure is fatal
//! to the stage, since the byte position after a bad frame is ambiguous.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Decoder, Encoder, Framed};

use crate::charset::Charset;
use crate::error::PgStreamError;
use crate::messages::response::SslResponse;
use crate::messages::{
    DecodeContext, PgStreamBackendMessage, PgStreamFrontendMessage,
};

#[non_exhaustive]
#[derive(Debug, Default)]
pub struct PgStreamClientCodec {
    decode_context: DecodeContext,
}

impl PgStreamClientCodec {
    pub fn new(charset: Charset, max_message_length: usize) -> PgStreamClientCodec {
        PgStreamClientCodec {
            decode_context: DecodeContext::new(charset, max_message_length),
        }
    }

    pub fn decode_context(&self) -> &DecodeContext {
        &self.decode_context
    }
}

impl Decoder for PgStreamClientCodec {
    type Item = PgStreamBackendMessage;
    type Error = PgStreamError;

    fn decode(&mut self, src: &mut bytes::BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // the reply to SslRequest is a bare byte, not a framed message
        if self.decode_context.awaiting_ssl_response {
            return match SslResponse::decode(src)? {
                Some(reply) => {
                    self.decode_context.awaiting_ssl_response = false;
                    Ok(Some(PgStreamBackendMessage::SslResponse(reply)))
                }
                None => Ok(None),
            };
        }

        let message = PgStreamBackendMessage::decode(src, &self.decode_context)?;
        if let Some(ref message) = message {
            tracing::trace!(?message, "decoded backend message");
        }
        Ok(message)
    }
}

impl Encoder<PgStreamFrontendMessage> for PgStreamClientCodec {
    type Error = PgStreamError;

    fn encode(
        &mut self,
        item: PgStreamFrontendMessage,
        dst: &mut bytes::BytesMut,
    ) -> Result<(), Self::Error> {
        // an SslRequest switches the decoder into single-byte reply mode
        self.decode_context.awaiting_ssl_response =
            matches!(item, PgStreamFrontendMessage::SslRequest(_));

        item.encode(dst, self.decode_context.charset)
    }
}

/// Wire the codec onto any duplex byte transport.
pub fn framed<S>(transport: S, codec: PgStreamClientCodec) -> Framed<S, PgStreamClientCodec>
where
    S: AsyncRead + AsyncWrite,
{
    Framed::new(transport, codec)
}

#[cfg(test)]
mod test {
    use bytes::{BufMut, BytesMut};
    use futures::{SinkExt, StreamExt};

    use super::*;
    use crate::messages::response::{ReadyForQuery, TransactionStatus};
    use crate::messages::startup::{ParameterStatus, SslRequest};
    use crate::messages::{Message, DEFAULT_MAX_MESSAGE_LENGTH};

    #[test]
    fn test_decode_ready_for_query() {
        let mut codec = PgStreamClientCodec::default();
        let mut buf = BytesMut::from(&[0x5A, 0x00, 0x00, 0x00, 0x05, 0x49][..]);

        let message = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(
            message,
            PgStreamBackendMessage::ReadyForQuery(ReadyForQuery::new(TransactionStatus::Idle))
        );
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_decode_across_chunk_boundary() {
        let mut codec = PgStreamClientCodec::default();

        // first chunk carries only the type byte
        let mut buf = BytesMut::from(&[0x5A][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 1);

        // rest of the frame arrives
        buf.put_slice(&[0x00, 0x00, 0x00, 0x05, 0x49]);
        let message = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(
            message,
            PgStreamBackendMessage::ReadyForQuery(ReadyForQuery::new(TransactionStatus::Idle))
        );
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_chunking_invariance() {
        // two messages, split at every possible position
        let mut wire = BytesMut::new();
        ParameterStatus::new("server_version".to_owned(), "16.1".to_owned())
            .encode(&mut wire, Charset::Utf8)
            .unwrap();
        ReadyForQuery::new(TransactionStatus::Idle)
            .encode(&mut wire, Charset::Utf8)
            .unwrap();
        let wire = wire.freeze();

        for split in 0..=wire.len() {
            let mut codec = PgStreamClientCodec::default();
            let mut buf = BytesMut::new();
            let mut decoded = Vec::new();

            for chunk in [&wire[..split], &wire[split..]] {
                buf.put_slice(chunk);
                while let Some(message) = codec.decode(&mut buf).unwrap() {
                    decoded.push(message);
                }
            }

            assert_eq!(decoded.len(), 2, "split at {}", split);
            assert_eq!(
                decoded[0],
                PgStreamBackendMessage::ParameterStatus(ParameterStatus::new(
                    "server_version".to_owned(),
                    "16.1".to_owned()
                ))
            );
            assert_eq!(
                decoded[1],
                PgStreamBackendMessage::ReadyForQuery(ReadyForQuery::new(TransactionStatus::Idle))
            );
        }
    }

    #[test]
    fn test_message_too_long() {
        let mut codec = PgStreamClientCodec::new(Charset::Utf8, 16);

        let mut buf = BytesMut::new();
        buf.put_u8(b'D');
        buf.put_i32(1024 + 4);

        let result = codec.decode(&mut buf);
        assert!(matches!(
            result,
            Err(PgStreamError::MessageTooLong(b'D', 1024, 16))
        ));
    }

    #[test]
    fn test_unknown_message_type() {
        let mut codec = PgStreamClientCodec::default();
        let mut buf = BytesMut::from(&[b'x', 0, 0, 0, 4][..]);

        let result = codec.decode(&mut buf);
        assert!(matches!(
            result,
            Err(PgStreamError::UnsupportedMessageType(b'x'))
        ));
    }

    #[test]
    fn test_ssl_reply_after_ssl_request() {
        let mut codec = PgStreamClientCodec::default();

        let mut out = BytesMut::new();
        codec
            .encode(
                PgStreamFrontendMessage::SslRequest(SslRequest::new()),
                &mut out,
            )
            .unwrap();
        assert!(codec.decode_context().awaiting_ssl_response);

        let mut buf = BytesMut::from(&b"S"[..]);
        let message = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(
            message,
            PgStreamBackendMessage::SslResponse(SslResponse::Accept)
        );
        assert!(!codec.decode_context().awaiting_ssl_response);
    }

    #[test]
    fn test_unsupported_ssl_reply() {
        let mut codec = PgStreamClientCodec::default();
        let mut out = BytesMut::new();
        codec
            .encode(
                PgStreamFrontendMessage::SslRequest(SslRequest::new()),
                &mut out,
            )
            .unwrap();

        let mut buf = BytesMut::from(&b"E"[..]);
        let result = codec.decode(&mut buf);
        assert!(matches!(
            result,
            Err(PgStreamError::UnsupportedSslReply(b'E'))
        ));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_framed_subscription() {
        let (client, mut server) = tokio::io::duplex(64);

        let mut framed = framed(
            client,
            PgStreamClientCodec::new(Charset::Utf8, DEFAULT_MAX_MESSAGE_LENGTH),
        );

        // server side: read one Sync frame, answer with ReadyForQuery in
        // two chunks
        framed
            .send(PgStreamFrontendMessage::Sync(
                crate::messages::extendedquery::Sync::new(),
            ))
            .await
            .unwrap();

        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        let mut request = [0u8; 5];
        server.read_exact(&mut request).await.unwrap();
        assert_eq!(request, [b'S', 0, 0, 0, 4]);

        server.write_all(&[0x5A]).await.unwrap();
        server.write_all(&[0x00, 0x00, 0x00, 0x05, 0x49]).await.unwrap();
        drop(server);

        let message = framed.next().await.unwrap().unwrap();
        assert_eq!(
            message,
            PgStreamBackendMessage::ReadyForQuery(ReadyForQuery::new(TransactionStatus::Idle))
        );

        // transport closed: the sequence is finite
        assert!(framed.next().await.is_none());
    }
}
