//! `messages` module contains postgresql wire protocol message definitions
//! and codecs.
//!
//! `PgStreamFrontendMessage` and `PgStreamBackendMessage` are enums that
//! define all types of supported messages. The `Message` trait allows you
//! to encode/decode them on a `BytesMut` buffer.

use bytes::{Buf, BufMut, BytesMut};

use crate::charset::Charset;
use crate::error::{PgStreamError, PgStreamResult};

/// Default cap on a single message's content length, in bytes.
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 8 * 1024 * 1024;

/// Everything the decode path needs besides the bytes: the connection
/// charset, the framing limit, and whether the next inbound byte is the
/// single-byte reply to an `SslRequest`.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct DecodeContext {
    pub charset: Charset,
    pub max_message_length: usize,
    pub awaiting_ssl_response: bool,
}

impl DecodeContext {
    pub fn new(charset: Charset, max_message_length: usize) -> DecodeContext {
        DecodeContext {
            charset,
            max_message_length,
            awaiting_ssl_response: false,
        }
    }
}

impl Default for DecodeContext {
    fn default() -> DecodeContext {
        DecodeContext::new(Charset::default(), DEFAULT_MAX_MESSAGE_LENGTH)
    }
}

/// Define how a message is encoded and decoded.
pub trait Message: Sized {
    /// Return the type code of the message. In order to maintain backward
    /// compatibility, the version-zero startup family has no message type.
    #[inline]
    fn message_type() -> Option<u8> {
        None
    }

    /// Return the length of the message, including the length integer
    /// itself.
    fn message_length(&self, charset: Charset) -> usize;

    /// Encode body part of the message.
    fn encode_body(&self, buf: &mut BytesMut, charset: Charset) -> PgStreamResult<()>;

    /// Decode body part of the message.
    fn decode_body(
        buf: &mut BytesMut,
        full_len: usize,
        ctx: &DecodeContext,
    ) -> PgStreamResult<Self>;

    /// Default implementation for encoding a message.
    ///
    /// Message type and length are encoded in this implementation and it
    /// calls `encode_body` for the remaining parts.
    fn encode(&self, buf: &mut BytesMut, charset: Charset) -> PgStreamResult<()> {
        if let Some(mt) = Self::message_type() {
            buf.put_u8(mt);
        }

        buf.put_i32(self.message_length(charset) as i32);
        self.encode_body(buf, charset)
    }

    /// Default implementation for decoding a message.
    ///
    /// Message type and length are decoded in this implementation and it
    /// calls `decode_body` for the remaining parts. Returns `None` when the
    /// buffer does not yet hold a complete frame.
    fn decode(buf: &mut BytesMut, ctx: &DecodeContext) -> PgStreamResult<Option<Self>> {
        let offset = Self::message_type().is_some().into();

        codec::decode_packet(buf, offset, ctx.max_message_length, |buf, full_len| {
            Self::decode_body(buf, full_len, ctx)
        })
    }
}

mod codec;
/// Cancel request
pub mod cancel;
/// Copy messages
pub mod copy;
/// Data related messages
pub mod data;
/// Extended query messages, including request/response for parse, bind and etc.
pub mod extendedquery;
/// Function call subprotocol messages
pub mod function;
/// General response messages
pub mod response;
/// Simple query messages
pub mod simplequery;
/// Startup messages
pub mod startup;
/// Termination messages
pub mod terminate;

/// Messages sent from the frontend.
#[derive(Debug, PartialEq)]
pub enum PgStreamFrontendMessage {
    Startup(startup::Startup),
    SslRequest(startup::SslRequest),
    CancelRequest(cancel::CancelRequest),
    Password(startup::Password),

    Query(simplequery::Query),

    Parse(extendedquery::Parse),
    Close(extendedquery::Close),
    Bind(extendedquery::Bind),
    Describe(extendedquery::Describe),
    Execute(extendedquery::Execute),
    Flush(extendedquery::Flush),
    Sync(extendedquery::Sync),

    FunctionCall(function::FunctionCall),

    Terminate(terminate::Terminate),

    CopyData(copy::CopyData),
    CopyFail(copy::CopyFail),
    CopyDone(copy::CopyDone),
}

impl PgStreamFrontendMessage {
    pub fn encode(&self, buf: &mut BytesMut, charset: Charset) -> PgStreamResult<()> {
        match self {
            Self::Startup(msg) => msg.encode(buf, charset),
            Self::SslRequest(msg) => msg.encode(buf, charset),
            Self::CancelRequest(msg) => msg.encode(buf, charset),
            Self::Password(msg) => msg.encode(buf, charset),

            Self::Query(msg) => msg.encode(buf, charset),

            Self::Parse(msg) => msg.encode(buf, charset),
            Self::Bind(msg) => msg.encode(buf, charset),
            Self::Close(msg) => msg.encode(buf, charset),
            Self::Describe(msg) => msg.encode(buf, charset),
            Self::Execute(msg) => msg.encode(buf, charset),
            Self::Flush(msg) => msg.encode(buf, charset),
            Self::Sync(msg) => msg.encode(buf, charset),

            Self::FunctionCall(msg) => msg.encode(buf, charset),

            Self::Terminate(msg) => msg.encode(buf, charset),

            Self::CopyData(msg) => msg.encode(buf, charset),
            Self::CopyFail(msg) => msg.encode(buf, charset),
            Self::CopyDone(msg) => msg.encode(buf, charset),
        }
    }
}

/// Messages sent from the backend.
#[derive(Debug, PartialEq)]
pub enum PgStreamBackendMessage {
    // startup
    Authentication(startup::Authentication),
    ParameterStatus(startup::ParameterStatus),
    BackendKeyData(startup::BackendKeyData),
    SslResponse(response::SslResponse),

    // extended query
    ParseComplete(extendedquery::ParseComplete),
    CloseComplete(extendedquery::CloseComplete),
    BindComplete(extendedquery::BindComplete),
    PortalSuspended(extendedquery::PortalSuspended),

    // command response
    CommandComplete(response::CommandComplete),
    EmptyQueryResponse(response::EmptyQueryResponse),
    ReadyForQuery(response::ReadyForQuery),
    ErrorResponse(response::ErrorResponse),
    NoticeResponse(response::NoticeResponse),
    NotificationResponse(response::NotificationResponse),

    // function call
    FunctionCallResponse(function::FunctionCallResponse),

    // data
    ParameterDescription(data::ParameterDescription),
    RowDescription(data::RowDescription),
    DataRow(data::DataRow),
    NoData(data::NoData),

    // copy
    CopyData(copy::CopyData),
    CopyDone(copy::CopyDone),
    CopyInResponse(copy::CopyInResponse),
    CopyOutResponse(copy::CopyOutResponse),
    CopyBothResponse(copy::CopyBothResponse),
}

impl PgStreamBackendMessage {
    pub fn decode(buf: &mut BytesMut, ctx: &DecodeContext) -> PgStreamResult<Option<Self>> {
        if buf.remaining() > 1 {
            let first_byte = buf[0];
            match first_byte {
                startup::MESSAGE_TYPE_BYTE_AUTHENTICATION => {
                    startup::Authentication::decode(buf, ctx).map(|v| v.map(Self::Authentication))
                }
                startup::MESSAGE_TYPE_BYTE_PARAMETER_STATUS => {
                    startup::ParameterStatus::decode(buf, ctx).map(|v| v.map(Self::ParameterStatus))
                }
                startup::MESSAGE_TYPE_BYTE_BACKEND_KEY_DATA => {
                    startup::BackendKeyData::decode(buf, ctx).map(|v| v.map(Self::BackendKeyData))
                }

                extendedquery::MESSAGE_TYPE_BYTE_PARSE_COMPLETE => {
                    extendedquery::ParseComplete::decode(buf, ctx)
                        .map(|v| v.map(Self::ParseComplete))
                }
                extendedquery::MESSAGE_TYPE_BYTE_BIND_COMPLETE => {
                    extendedquery::BindComplete::decode(buf, ctx).map(|v| v.map(Self::BindComplete))
                }
                extendedquery::MESSAGE_TYPE_BYTE_CLOSE_COMPLETE => {
                    extendedquery::CloseComplete::decode(buf, ctx)
                        .map(|v| v.map(Self::CloseComplete))
                }
                extendedquery::MESSAGE_TYPE_BYTE_PORTAL_SUSPENDED => {
                    extendedquery::PortalSuspended::decode(buf, ctx)
                        .map(|v| v.map(Self::PortalSuspended))
                }

                response::MESSAGE_TYPE_BYTE_COMMAND_COMPLETE => {
                    response::CommandComplete::decode(buf, ctx)
                        .map(|v| v.map(Self::CommandComplete))
                }
                response::MESSAGE_TYPE_BYTE_EMPTY_QUERY_RESPONSE => {
                    response::EmptyQueryResponse::decode(buf, ctx)
                        .map(|v| v.map(Self::EmptyQueryResponse))
                }
                response::MESSAGE_TYPE_BYTE_READY_FOR_QUERY => {
                    response::ReadyForQuery::decode(buf, ctx).map(|v| v.map(Self::ReadyForQuery))
                }
                response::MESSAGE_TYPE_BYTE_ERROR_RESPONSE => {
                    response::ErrorResponse::decode(buf, ctx).map(|v| v.map(Self::ErrorResponse))
                }
                response::MESSAGE_TYPE_BYTE_NOTICE_RESPONSE => {
                    response::NoticeResponse::decode(buf, ctx).map(|v| v.map(Self::NoticeResponse))
                }
                response::MESSAGE_TYPE_BYTE_NOTIFICATION_RESPONSE => {
                    response::NotificationResponse::decode(buf, ctx)
                        .map(|v| v.map(Self::NotificationResponse))
                }

                function::MESSAGE_TYPE_BYTE_FUNCTION_CALL_RESPONSE => {
                    function::FunctionCallResponse::decode(buf, ctx)
                        .map(|v| v.map(Self::FunctionCallResponse))
                }

                data::MESSAGE_TYPE_BYTE_PARAMETER_DESCRIPTION => {
                    data::ParameterDescription::decode(buf, ctx)
                        .map(|v| v.map(Self::ParameterDescription))
                }
                data::MESSAGE_TYPE_BYTE_ROW_DESCRIPTION => {
                    data::RowDescription::decode(buf, ctx).map(|v| v.map(Self::RowDescription))
                }
                data::MESSAGE_TYPE_BYTE_DATA_ROW => {
                    data::DataRow::decode(buf, ctx).map(|v| v.map(Self::DataRow))
                }
                data::MESSAGE_TYPE_BYTE_NO_DATA => {
                    data::NoData::decode(buf, ctx).map(|v| v.map(Self::NoData))
                }

                copy::MESSAGE_TYPE_BYTE_COPY_DATA => {
                    copy::CopyData::decode(buf, ctx).map(|v| v.map(Self::CopyData))
                }
                copy::MESSAGE_TYPE_BYTE_COPY_DONE => {
                    copy::CopyDone::decode(buf, ctx).map(|v| v.map(Self::CopyDone))
                }
                copy::MESSAGE_TYPE_BYTE_COPY_IN_RESPONSE => {
                    copy::CopyInResponse::decode(buf, ctx).map(|v| v.map(Self::CopyInResponse))
                }
                copy::MESSAGE_TYPE_BYTE_COPY_OUT_RESPONSE => {
                    copy::CopyOutResponse::decode(buf, ctx).map(|v| v.map(Self::CopyOutResponse))
                }
                copy::MESSAGE_TYPE_BYTE_COPY_BOTH_RESPONSE => {
                    copy::CopyBothResponse::decode(buf, ctx).map(|v| v.map(Self::CopyBothResponse))
                }
                _ => Err(PgStreamError::UnsupportedMessageType(first_byte)),
            }
        } else {
            Ok(None)
        }
    }
}
