use std::io::{Error as IOError, ErrorKind};

use thiserror::Error;

use crate::charset::Charset;
use crate::messages::response::{ErrorResponse, NoticeResponse};

#[derive(Error, Debug)]
pub enum PgStreamError {
    #[error("Message content of {1} bytes for type {0:?} exceeds limit of {2} bytes")]
    MessageTooLong(u8, usize, usize),
    #[error("Unsupported message type: {0}")]
    UnsupportedMessageType(u8),
    #[error("Unsupported authentication method: {0}")]
    UnsupportedAuthenticationMethod(i32),
    #[error("Unsupported ssl reply: {0}")]
    UnsupportedSslReply(u8),
    #[error("Unsupported format type: {0}")]
    UnsupportedFormatType(i16),
    #[error("Unsupported transaction status: {0}")]
    UnsupportedTransactionStatus(u8),
    #[error("Unsupported close/describe target: {0}")]
    UnsupportedTargetType(u8),
    #[error("Copy response declares text format but columns {0:?} are binary")]
    UnexpectedBinaryColumnFormat(Vec<usize>),
    #[error("String field is missing its null terminator")]
    MissingNullTerminator,
    #[error("Invalid message length: {0}")]
    InvalidMessageLength(i32),
    #[error("Invalid value length: {0}")]
    InvalidValueLength(i32),
    #[error("Parameter format count {0} does not match parameter count {1}")]
    ParameterFormatCountMismatch(usize, usize),
    #[error("Invalid protocol version, received {0}")]
    InvalidProtocolVersion(i32),
    #[error("Invalid startup message")]
    InvalidStartupMessage,
    #[error("Cannot decode bytes as {0} string")]
    CharsetDecode(Charset),
    #[error("Character {1:?} is not representable in {0}")]
    CharsetEncode(Charset, char),
    #[error("Data row read index out of bounds")]
    DataRowIndexOutOfBounds,
    #[error("Failed to decode column value: {0}")]
    ColumnDecode(Box<dyn std::error::Error + Send + Sync>),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

impl From<PgStreamError> for IOError {
    fn from(e: PgStreamError) -> Self {
        IOError::new(ErrorKind::Other, e)
    }
}

pub type PgStreamResult<T> = Result<T, PgStreamError>;

// Error and notice message fields, shared by `ErrorResponse` and
// `NoticeResponse`. This part of the protocol is defined in
// https://www.postgresql.org/docs/current/protocol-error-fields.html
#[derive(new, Setters, Getters, Debug, Default)]
#[getset(get = "pub", set = "pub", get_mut = "pub")]
pub struct ErrorInfo {
    // severity can be one of `ERROR`, `FATAL`, or `PANIC` (in an error
    // message), or `WARNING`, `NOTICE`, `DEBUG`, `INFO`, or `LOG` (in a
    // notice message), or a localized translation of one of these.
    severity: String,
    // error code defined in
    // https://www.postgresql.org/docs/current/errcodes-appendix.html
    code: String,
    // readable message
    message: String,
    // optional secondary message
    #[new(default)]
    detail: Option<String>,
    // optional suggestion for fixing the issue
    #[new(default)]
    hint: Option<String>,
    // a decimal ASCII integer, indicating an error cursor position as an
    // index into the original query string
    #[new(default)]
    position: Option<i32>,
    // same as position, but for a cursor into an internally generated
    // command rather than the one submitted by the client
    #[new(default)]
    internal_position: Option<i32>,
    // the text of a failed internally-generated command
    #[new(default)]
    internal_query: Option<String>,
    // call stack traceback, one line per entry, most recent first
    #[new(default)]
    where_context: Option<Vec<String>>,
    // schema name, when the error is associated with a specific object
    #[new(default)]
    schema_name: Option<String>,
    #[new(default)]
    table_name: Option<String>,
    #[new(default)]
    column_name: Option<String>,
    #[new(default)]
    data_type_name: Option<String>,
    #[new(default)]
    constraint_name: Option<String>,
    // source-code location where the error was reported
    #[new(default)]
    file_name: Option<String>,
    #[new(default)]
    line: Option<i32>,
    #[new(default)]
    routine: Option<String>,
}

impl ErrorInfo {
    fn into_fields(self) -> Vec<(u8, String)> {
        let mut fields = Vec::with_capacity(17);

        fields.push((b'S', self.severity));
        fields.push((b'C', self.code));
        fields.push((b'M', self.message));
        if let Some(value) = self.detail {
            fields.push((b'D', value));
        }
        if let Some(value) = self.hint {
            fields.push((b'H', value));
        }
        if let Some(value) = self.position {
            fields.push((b'P', value.to_string()));
        }
        if let Some(value) = self.internal_position {
            fields.push((b'p', value.to_string()));
        }
        if let Some(value) = self.internal_query {
            fields.push((b'q', value));
        }
        if let Some(value) = self.where_context {
            fields.push((b'W', value.join("\n")));
        }
        if let Some(value) = self.schema_name {
            fields.push((b's', value));
        }
        if let Some(value) = self.table_name {
            fields.push((b't', value));
        }
        if let Some(value) = self.column_name {
            fields.push((b'c', value));
        }
        if let Some(value) = self.data_type_name {
            fields.push((b'd', value));
        }
        if let Some(value) = self.constraint_name {
            fields.push((b'n', value));
        }
        if let Some(value) = self.file_name {
            fields.push((b'F', value));
        }
        if let Some(value) = self.line {
            fields.push((b'L', value.to_string()));
        }
        if let Some(value) = self.routine {
            fields.push((b'R', value));
        }

        fields
    }

    /// Build the typed view from raw tagged fields. Unrecognized tags are
    /// silently ignored.
    fn from_fields(fields: &[(u8, String)]) -> ErrorInfo {
        let mut info = ErrorInfo::default();

        for (tag, value) in fields {
            match tag {
                b'S' => info.severity = value.clone(),
                b'C' => info.code = value.clone(),
                b'M' => info.message = value.clone(),
                b'D' => info.detail = Some(value.clone()),
                b'H' => info.hint = Some(value.clone()),
                b'P' => info.position = value.parse().ok(),
                b'p' => info.internal_position = value.parse().ok(),
                b'q' => info.internal_query = Some(value.clone()),
                b'W' => {
                    info.where_context = Some(value.split('\n').map(|l| l.to_owned()).collect())
                }
                b's' => info.schema_name = Some(value.clone()),
                b't' => info.table_name = Some(value.clone()),
                b'c' => info.column_name = Some(value.clone()),
                b'd' => info.data_type_name = Some(value.clone()),
                b'n' => info.constraint_name = Some(value.clone()),
                b'F' => info.file_name = Some(value.clone()),
                b'L' => info.line = value.parse().ok(),
                b'R' => info.routine = Some(value.clone()),
                _ => {}
            }
        }

        info
    }
}

impl From<ErrorInfo> for ErrorResponse {
    fn from(ei: ErrorInfo) -> ErrorResponse {
        ErrorResponse::new(ei.into_fields())
    }
}

impl From<ErrorInfo> for NoticeResponse {
    fn from(ei: ErrorInfo) -> NoticeResponse {
        NoticeResponse::new(ei.into_fields())
    }
}

impl From<&ErrorResponse> for ErrorInfo {
    fn from(response: &ErrorResponse) -> ErrorInfo {
        ErrorInfo::from_fields(&response.fields)
    }
}

impl From<&NoticeResponse> for ErrorInfo {
    fn from(response: &NoticeResponse) -> ErrorInfo {
        ErrorInfo::from_fields(&response.fields)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_error_notice_info() {
        let error_info = ErrorInfo::new(
            "FATAL".to_owned(),
            "28P01".to_owned(),
            "Password authentication failed".to_owned(),
        );
        assert_eq!("FATAL", error_info.severity());
        assert_eq!("28P01", error_info.code());
        assert_eq!("Password authentication failed", error_info.message());
        assert!(error_info.file_name().is_none());
    }

    #[test]
    fn test_error_info_from_fields() {
        let response = ErrorResponse::new(vec![
            (b'S', "ERROR".to_owned()),
            (b'C', "42P01".to_owned()),
            (b'M', "relation does not exist".to_owned()),
            (b'P', "15".to_owned()),
            (b'W', "line one\nline two".to_owned()),
            (b'Z', "unknown tag, skipped".to_owned()),
        ]);

        let info = ErrorInfo::from(&response);
        assert_eq!("ERROR", info.severity());
        assert_eq!("42P01", info.code());
        assert_eq!(Some(15), *info.position());
        assert_eq!(
            Some(vec!["line one".to_owned(), "line two".to_owned()]),
            *info.where_context()
        );
        assert!(info.detail().is_none());
    }

    #[test]
    fn test_error_info_roundtrip() {
        let mut info = ErrorInfo::new(
            "ERROR".to_owned(),
            "23505".to_owned(),
            "duplicate key".to_owned(),
        );
        info.set_table_name(Some("users".to_owned()));
        info.set_constraint_name(Some("users_pkey".to_owned()));
        info.set_line(Some(42));

        let response = ErrorResponse::from(info);
        let parsed = ErrorInfo::from(&response);
        assert_eq!(Some("users".to_owned()), *parsed.table_name());
        assert_eq!(Some("users_pkey".to_owned()), *parsed.constraint_name());
        assert_eq!(Some(42), *parsed.line());
    }
}
