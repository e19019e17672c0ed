use std::fmt;

use bytes::{Buf, BufMut, BytesMut};
use postgres_types::Oid;

use super::{codec, DecodeContext, Message};
use crate::charset::Charset;
use crate::error::{PgStreamError, PgStreamResult};

/// Completion tag of a command, split into its space-separated parts.
///
/// `INSERT 1234 5` reports the inserted row's OID next to the row count;
/// most data commands report only a count; DDL and transaction commands
/// report a bare name.
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum CommandTag {
    NameOnly(String),
    RowsAffected(String, u64),
    OidWithRows(String, Oid, u64),
}

impl CommandTag {
    pub fn parse(tag: &str) -> CommandTag {
        let parts: Vec<&str> = tag.split(' ').collect();

        if parts.len() >= 2 {
            if let Ok(rows) = parts[parts.len() - 1].parse::<u64>() {
                if parts.len() >= 3 {
                    if let Ok(oid) = parts[parts.len() - 2].parse::<Oid>() {
                        let name = parts[..parts.len() - 2].join(" ");
                        return CommandTag::OidWithRows(name, oid, rows);
                    }
                }
                let name = parts[..parts.len() - 1].join(" ");
                return CommandTag::RowsAffected(name, rows);
            }
        }

        CommandTag::NameOnly(tag.to_owned())
    }

    pub fn name(&self) -> &str {
        match self {
            CommandTag::NameOnly(name)
            | CommandTag::RowsAffected(name, _)
            | CommandTag::OidWithRows(name, _, _) => name,
        }
    }

    pub fn rows(&self) -> Option<u64> {
        match self {
            CommandTag::NameOnly(_) => None,
            CommandTag::RowsAffected(_, rows) | CommandTag::OidWithRows(_, _, rows) => Some(*rows),
        }
    }
}

impl fmt::Display for CommandTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandTag::NameOnly(name) => write!(f, "{}", name),
            CommandTag::RowsAffected(name, rows) => write!(f, "{} {}", name, rows),
            CommandTag::OidWithRows(name, oid, rows) => write!(f, "{} {} {}", name, oid, rows),
        }
    }
}

/// Command execution finished, reporting its completion tag.
#[non_exhaustive]
#[derive(PartialEq, Eq, Debug, new)]
pub struct CommandComplete {
    pub tag: CommandTag,
}

pub const MESSAGE_TYPE_BYTE_COMMAND_COMPLETE: u8 = b'C';

impl Message for CommandComplete {
    #[inline]
    fn message_type() -> Option<u8> {
        Some(MESSAGE_TYPE_BYTE_COMMAND_COMPLETE)
    }

    fn message_length(&self, charset: Charset) -> usize {
        4 + codec::cstring_len(&self.tag.to_string(), charset)
    }

    fn encode_body(&self, buf: &mut BytesMut, charset: Charset) -> PgStreamResult<()> {
        codec::put_cstring(buf, &self.tag.to_string(), charset)
    }

    fn decode_body(buf: &mut BytesMut, _: usize, ctx: &DecodeContext) -> PgStreamResult<Self> {
        let tag = codec::get_cstring(buf, ctx.charset)?.unwrap_or_default();

        Ok(CommandComplete::new(CommandTag::parse(&tag)))
    }
}

/// Response to an empty query string, taking the place of
/// `CommandComplete`.
#[non_exhaustive]
#[derive(PartialEq, Eq, Debug, new)]
pub struct EmptyQueryResponse;

pub const MESSAGE_TYPE_BYTE_EMPTY_QUERY_RESPONSE: u8 = b'I';

impl EmptyQueryResponse {
    const ENCODED: [u8; 5] = [MESSAGE_TYPE_BYTE_EMPTY_QUERY_RESPONSE, 0, 0, 0, 4];
}

impl Message for EmptyQueryResponse {
    #[inline]
    fn message_type() -> Option<u8> {
        Some(MESSAGE_TYPE_BYTE_EMPTY_QUERY_RESPONSE)
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
        Ok(EmptyQueryResponse)
    }
}

/// Transaction state reported by `ReadyForQuery`.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum TransactionStatus {
    /// not in a transaction block
    Idle,
    /// in a transaction block
    InTransaction,
    /// in a failed transaction block, queries rejected until the block ends
    Failed,
}

impl TransactionStatus {
    pub fn code(&self) -> u8 {
        match self {
            TransactionStatus::Idle => b'I',
            TransactionStatus::InTransaction => b'T',
            TransactionStatus::Failed => b'E',
        }
    }
}

impl TryFrom<u8> for TransactionStatus {
    type Error = PgStreamError;

    fn try_from(code: u8) -> PgStreamResult<Self> {
        match code {
            b'I' => Ok(TransactionStatus::Idle),
            b'T' => Ok(TransactionStatus::InTransaction),
            b'E' => Ok(TransactionStatus::Failed),
            _ => Err(PgStreamError::UnsupportedTransactionStatus(code)),
        }
    }
}

/// Backend is ready for the next query cycle.
#[non_exhaustive]
#[derive(PartialEq, Eq, Debug, new)]
pub struct ReadyForQuery {
    pub status: TransactionStatus,
}

pub const MESSAGE_TYPE_BYTE_READY_FOR_QUERY: u8 = b'Z';

impl Message for ReadyForQuery {
    #[inline]
    fn message_type() -> Option<u8> {
        Some(MESSAGE_TYPE_BYTE_READY_FOR_QUERY)
    }

    #[inline]
    fn message_length(&self, _charset: Charset) -> usize {
        5
    }

    fn encode_body(&self, buf: &mut BytesMut, _charset: Charset) -> PgStreamResult<()> {
        buf.put_u8(self.status.code());

        Ok(())
    }

    fn decode_body(buf: &mut BytesMut, _: usize, _ctx: &DecodeContext) -> PgStreamResult<Self> {
        let status = TransactionStatus::try_from(buf.get_u8())?;
        Ok(ReadyForQuery::new(status))
    }
}

fn put_response_fields(
    buf: &mut BytesMut,
    fields: &[(u8, String)],
    charset: Charset,
) -> PgStreamResult<()> {
    for (tag, value) in fields {
        buf.put_u8(*tag);
        codec::put_cstring(buf, value, charset)?;
    }
    // an extra \0 ends the field list
    buf.put_u8(b'\0');
    Ok(())
}

fn get_response_fields(
    buf: &mut BytesMut,
    charset: Charset,
) -> PgStreamResult<Vec<(u8, String)>> {
    let mut fields = Vec::new();
    loop {
        if !buf.has_remaining() {
            // field list must end with a \0 tag
            return Err(PgStreamError::MissingNullTerminator);
        }

        let tag = buf.get_u8();
        if tag == b'\0' {
            return Ok(fields);
        }

        let value = codec::get_cstring(buf, charset)?.unwrap_or_default();
        fields.push((tag, value));
    }
}

fn response_fields_len(fields: &[(u8, String)], charset: Charset) -> usize {
    1 + fields
        .iter()
        .map(|(_, value)| 1 + codec::cstring_len(value, charset))
        .sum::<usize>()
}

/// Error reported by the backend, as ordered tagged fields.
///
/// The raw field list is kept as decoded for round-trip fidelity; use
/// [`crate::error::ErrorInfo`] for the typed view that understands the
/// standard tags.
#[non_exhaustive]
#[derive(PartialEq, Eq, Debug, Default, new)]
pub struct ErrorResponse {
    pub fields: Vec<(u8, String)>,
}

pub const MESSAGE_TYPE_BYTE_ERROR_RESPONSE: u8 = b'E';

impl Message for ErrorResponse {
    #[inline]
    fn message_type() -> Option<u8> {
        Some(MESSAGE_TYPE_BYTE_ERROR_RESPONSE)
    }

    fn message_length(&self, charset: Charset) -> usize {
        4 + response_fields_len(&self.fields, charset)
    }

    fn encode_body(&self, buf: &mut BytesMut, charset: Charset) -> PgStreamResult<()> {
        put_response_fields(buf, &self.fields, charset)
    }

    fn decode_body(buf: &mut BytesMut, _: usize, ctx: &DecodeContext) -> PgStreamResult<Self> {
        let fields = get_response_fields(buf, ctx.charset)?;
        Ok(ErrorResponse::new(fields))
    }
}

/// Warning or informational message from the backend; same field structure
/// as [`ErrorResponse`] but never terminates the current operation.
#[non_exhaustive]
#[derive(PartialEq, Eq, Debug, Default, new)]
pub struct NoticeResponse {
    pub fields: Vec<(u8, String)>,
}

pub const MESSAGE_TYPE_BYTE_NOTICE_RESPONSE: u8 = b'N';

impl Message for NoticeResponse {
    #[inline]
    fn message_type() -> Option<u8> {
        Some(MESSAGE_TYPE_BYTE_NOTICE_RESPONSE)
    }

    fn message_length(&self, charset: Charset) -> usize {
        4 + response_fields_len(&self.fields, charset)
    }

    fn encode_body(&self, buf: &mut BytesMut, charset: Charset) -> PgStreamResult<()> {
        put_response_fields(buf, &self.fields, charset)
    }

    fn decode_body(buf: &mut BytesMut, _: usize, ctx: &DecodeContext) -> PgStreamResult<Self> {
        let fields = get_response_fields(buf, ctx.charset)?;
        Ok(NoticeResponse::new(fields))
    }
}

/// Asynchronous notification delivered for a `LISTEN`ed channel.
#[non_exhaustive]
#[derive(PartialEq, Eq, Debug, new)]
pub struct NotificationResponse {
    pub process_id: i32,
    pub channel: String,
    pub payload: String,
}

pub const MESSAGE_TYPE_BYTE_NOTIFICATION_RESPONSE: u8 = b'A';

impl Message for NotificationResponse {
    #[inline]
    fn message_type() -> Option<u8> {
        Some(MESSAGE_TYPE_BYTE_NOTIFICATION_RESPONSE)
    }

    fn message_length(&self, charset: Charset) -> usize {
        4 + 4 + codec::cstring_len(&self.channel, charset)
            + codec::cstring_len(&self.payload, charset)
    }

    fn encode_body(&self, buf: &mut BytesMut, charset: Charset) -> PgStreamResult<()> {
        buf.put_i32(self.process_id);
        codec::put_cstring(buf, &self.channel, charset)?;
        codec::put_cstring(buf, &self.payload, charset)?;
        Ok(())
    }

    fn decode_body(buf: &mut BytesMut, _: usize, ctx: &DecodeContext) -> PgStreamResult<Self> {
        let process_id = buf.get_i32();
        let channel = codec::get_cstring(buf, ctx.charset)?.unwrap_or_default();
        let payload = codec::get_cstring(buf, ctx.charset)?.unwrap_or_default();

        Ok(NotificationResponse::new(process_id, channel, payload))
    }
}

/// Single-byte reply to `SslRequest`, sent before any framed message.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum SslResponse {
    Accept,
    Refuse,
}

impl SslResponse {
    pub const BYTE_ACCEPT: u8 = b'S';
    pub const BYTE_REFUSE: u8 = b'N';

    pub fn decode(buf: &mut BytesMut) -> PgStreamResult<Option<SslResponse>> {
        if buf.remaining() >= 1 {
            match buf.get_u8() {
                Self::BYTE_ACCEPT => Ok(Some(SslResponse::Accept)),
                Self::BYTE_REFUSE => Ok(Some(SslResponse::Refuse)),
                other => Err(PgStreamError::UnsupportedSslReply(other)),
            }
        } else {
            Ok(None)
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            SslResponse::Accept => buf.put_u8(Self::BYTE_ACCEPT),
            SslResponse::Refuse => buf.put_u8(Self::BYTE_REFUSE),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_command_tag_parse() {
        assert_eq!(
            CommandTag::parse("INSERT 1234 5"),
            CommandTag::OidWithRows("INSERT".to_owned(), 1234, 5)
        );
        assert_eq!(
            CommandTag::parse("SELECT 7"),
            CommandTag::RowsAffected("SELECT".to_owned(), 7)
        );
        assert_eq!(
            CommandTag::parse("BEGIN"),
            CommandTag::NameOnly("BEGIN".to_owned())
        );
        assert_eq!(
            CommandTag::parse("ALTER TABLE"),
            CommandTag::NameOnly("ALTER TABLE".to_owned())
        );
        assert_eq!(
            CommandTag::parse("COPY 21"),
            CommandTag::RowsAffected("COPY".to_owned(), 21)
        );
    }

    #[test]
    fn test_command_tag_render() {
        assert_eq!(
            CommandTag::OidWithRows("INSERT".to_owned(), 0, 1).to_string(),
            "INSERT 0 1"
        );
        assert_eq!(
            CommandTag::RowsAffected("UPDATE".to_owned(), 9).to_string(),
            "UPDATE 9"
        );
        assert_eq!(CommandTag::NameOnly("ROLLBACK".to_owned()).to_string(), "ROLLBACK");
    }

    #[test]
    fn test_transaction_status_unknown() {
        assert!(matches!(
            TransactionStatus::try_from(b'X'),
            Err(PgStreamError::UnsupportedTransactionStatus(b'X'))
        ));
    }

    #[test]
    fn test_ssl_response() {
        let mut buf = BytesMut::from(&b"S"[..]);
        assert_eq!(
            SslResponse::decode(&mut buf).unwrap(),
            Some(SslResponse::Accept)
        );

        let mut buf = BytesMut::from(&b"N"[..]);
        assert_eq!(
            SslResponse::decode(&mut buf).unwrap(),
            Some(SslResponse::Refuse)
        );

        let mut buf = BytesMut::from(&b"E"[..]);
        assert!(matches!(
            SslResponse::decode(&mut buf),
            Err(PgStreamError::UnsupportedSslReply(b'E'))
        ));

        let mut buf = BytesMut::new();
        assert_eq!(SslResponse::decode(&mut buf).unwrap(), None);
    }
}
