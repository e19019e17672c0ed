use std::collections::BTreeMap;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::codec;
use super::{DecodeContext, Message};
use crate::charset::Charset;
use crate::error::{PgStreamError, PgStreamResult};

pub const PROTOCOL_VERSION_3: i32 = 196608;

/// Postgresql wire protocol startup message.
///
/// The `user` parameter is always present; constructing the message with
/// [`Startup::with_user`] overrides any duplicate supplied in the extra
/// parameters.
#[non_exhaustive]
#[derive(PartialEq, Eq, Debug, new)]
pub struct Startup {
    #[new(value = "3")]
    pub protocol_number_major: u16,
    #[new(value = "0")]
    pub protocol_number_minor: u16,
    #[new(default)]
    pub parameters: BTreeMap<String, String>,
}

impl Default for Startup {
    fn default() -> Startup {
        Startup::new()
    }
}

impl Startup {
    const MINIMUM_STARTUP_MESSAGE_LEN: usize = 8;

    pub fn with_user(
        user: impl Into<String>,
        mut parameters: BTreeMap<String, String>,
    ) -> Startup {
        parameters.insert("user".to_owned(), user.into());

        Startup {
            protocol_number_major: 3,
            protocol_number_minor: 0,
            parameters,
        }
    }

    fn is_protocol_version_supported(version: i32) -> bool {
        version == PROTOCOL_VERSION_3
    }
}

impl Message for Startup {
    fn message_length(&self, charset: Charset) -> usize {
        let param_length = self
            .parameters
            .iter()
            .map(|(k, v)| codec::cstring_len(k, charset) + codec::cstring_len(v, charset))
            .sum::<usize>();
        // length:4 + protocol_number:4 + params + nullbyte:1
        9 + param_length
    }

    fn encode_body(&self, buf: &mut BytesMut, charset: Charset) -> PgStreamResult<()> {
        // version number
        buf.put_u16(self.protocol_number_major);
        buf.put_u16(self.protocol_number_minor);

        // parameters
        for (k, v) in self.parameters.iter() {
            codec::put_cstring(buf, k, charset)?;
            codec::put_cstring(buf, v, charset)?;
        }
        // ends with an empty cstring, a \0
        buf.put_u8(b'\0');

        Ok(())
    }

    fn decode(buf: &mut BytesMut, ctx: &DecodeContext) -> PgStreamResult<Option<Self>> {
        // check protocol version before the frame is complete
        if buf.remaining() >= Self::MINIMUM_STARTUP_MESSAGE_LEN {
            let packet_version = (&buf[4..8]).get_i32();
            if !Self::is_protocol_version_supported(packet_version) {
                return Err(PgStreamError::InvalidProtocolVersion(packet_version));
            }
        }

        codec::decode_packet(buf, 0, ctx.max_message_length, |buf, full_len| {
            Self::decode_body(buf, full_len, ctx)
        })
    }

    fn decode_body(
        buf: &mut BytesMut,
        full_len: usize,
        ctx: &DecodeContext,
    ) -> PgStreamResult<Self> {
        if full_len <= Self::MINIMUM_STARTUP_MESSAGE_LEN {
            return Err(PgStreamError::InvalidStartupMessage);
        }

        let protocol_number_major = buf.get_u16();
        let protocol_number_minor = buf.get_u16();

        // key/value pairs terminated by an extra \0
        let mut parameters = BTreeMap::new();
        while let Some(key) = codec::get_cstring(buf, ctx.charset)? {
            let value = codec::get_cstring(buf, ctx.charset)?.unwrap_or_default();
            parameters.insert(key, value);
        }

        Ok(Startup {
            protocol_number_major,
            protocol_number_minor,
            parameters,
        })
    }
}

/// Authentication request family, sent by the backend.
///
/// The accepted sub-kind codes form a closed set; any other code fails
/// decoding with `UnsupportedAuthenticationMethod`.
#[non_exhaustive]
#[derive(PartialEq, Eq, Debug)]
pub enum Authentication {
    Ok,                     // code 0
    KerberosV5,             // code 2
    CleartextPassword,      // code 3
    MD5Password([u8; 4]),   // code 5, with 4 bytes of md5 salt
    ScmCredential,          // code 6
    Gss,                    // code 7
    GssContinue(Bytes),     // code 8, with continuation data
    Sspi,                   // code 9
}

pub const MESSAGE_TYPE_BYTE_AUTHENTICATION: u8 = b'R';

impl Message for Authentication {
    #[inline]
    fn message_type() -> Option<u8> {
        Some(MESSAGE_TYPE_BYTE_AUTHENTICATION)
    }

    #[inline]
    fn message_length(&self, _charset: Charset) -> usize {
        match self {
            Authentication::MD5Password(_) => 12,
            Authentication::GssContinue(data) => 8 + data.len(),
            _ => 8,
        }
    }

    fn encode_body(&self, buf: &mut BytesMut, _charset: Charset) -> PgStreamResult<()> {
        match self {
            Authentication::Ok => buf.put_i32(0),
            Authentication::KerberosV5 => buf.put_i32(2),
            Authentication::CleartextPassword => buf.put_i32(3),
            Authentication::MD5Password(salt) => {
                buf.put_i32(5);
                buf.put_slice(salt.as_ref());
            }
            Authentication::ScmCredential => buf.put_i32(6),
            Authentication::Gss => buf.put_i32(7),
            Authentication::GssContinue(data) => {
                buf.put_i32(8);
                buf.put_slice(data.as_ref());
            }
            Authentication::Sspi => buf.put_i32(9),
        }
        Ok(())
    }

    fn decode_body(
        buf: &mut BytesMut,
        full_len: usize,
        _ctx: &DecodeContext,
    ) -> PgStreamResult<Self> {
        let code = buf.get_i32();
        let msg = match code {
            0 => Authentication::Ok,
            2 => Authentication::KerberosV5,
            3 => Authentication::CleartextPassword,
            5 => {
                let mut salt = [0u8; 4];
                buf.copy_to_slice(&mut salt);
                Authentication::MD5Password(salt)
            }
            6 => Authentication::ScmCredential,
            7 => Authentication::Gss,
            8 => Authentication::GssContinue(buf.split_to(full_len - 8).freeze()),
            9 => Authentication::Sspi,
            _ => {
                return Err(PgStreamError::UnsupportedAuthenticationMethod(code));
            }
        };

        Ok(msg)
    }
}

pub const MESSAGE_TYPE_BYTE_PASSWORD: u8 = b'p';

/// Password packet sent from the frontend in response to an
/// authentication request.
#[non_exhaustive]
#[derive(PartialEq, Eq, Debug, new)]
pub struct Password {
    pub password: String,
}

impl Password {
    /// Cleartext password response.
    pub fn cleartext(password: impl Into<String>) -> Password {
        Password::new(password.into())
    }

    /// Postgres standard md5 hashed password response:
    ///
    /// concat('md5', md5(concat(md5(concat(password, username)), salt)))
    pub fn md5(user: &str, password: &str, salt: &[u8; 4]) -> Password {
        let inner = format!("{:x}", md5::compute(format!("{}{}", password, user)));

        let mut salted = Vec::with_capacity(inner.len() + 4);
        salted.extend_from_slice(inner.as_bytes());
        salted.extend_from_slice(salt);

        Password::new(format!("md5{:x}", md5::compute(salted)))
    }
}

impl Message for Password {
    #[inline]
    fn message_type() -> Option<u8> {
        Some(MESSAGE_TYPE_BYTE_PASSWORD)
    }

    fn message_length(&self, charset: Charset) -> usize {
        4 + codec::cstring_len(&self.password, charset)
    }

    fn encode_body(&self, buf: &mut BytesMut, charset: Charset) -> PgStreamResult<()> {
        codec::put_cstring(buf, &self.password, charset)
    }

    fn decode_body(buf: &mut BytesMut, _: usize, ctx: &DecodeContext) -> PgStreamResult<Self> {
        let password = codec::get_cstring(buf, ctx.charset)?.unwrap_or_default();

        Ok(Password::new(password))
    }
}

/// Parameter ack sent from the backend after authentication success.
#[non_exhaustive]
#[derive(PartialEq, Eq, Debug, new)]
pub struct ParameterStatus {
    pub name: String,
    pub value: String,
}

pub const MESSAGE_TYPE_BYTE_PARAMETER_STATUS: u8 = b'S';

impl Message for ParameterStatus {
    #[inline]
    fn message_type() -> Option<u8> {
        Some(MESSAGE_TYPE_BYTE_PARAMETER_STATUS)
    }

    fn message_length(&self, charset: Charset) -> usize {
        4 + codec::cstring_len(&self.name, charset) + codec::cstring_len(&self.value, charset)
    }

    fn encode_body(&self, buf: &mut BytesMut, charset: Charset) -> PgStreamResult<()> {
        codec::put_cstring(buf, &self.name, charset)?;
        codec::put_cstring(buf, &self.value, charset)?;

        Ok(())
    }

    fn decode_body(buf: &mut BytesMut, _: usize, ctx: &DecodeContext) -> PgStreamResult<Self> {
        let name = codec::get_cstring(buf, ctx.charset)?.unwrap_or_default();
        let value = codec::get_cstring(buf, ctx.charset)?.unwrap_or_default();

        Ok(ParameterStatus::new(name, value))
    }
}

/// `BackendKeyData` message, sent from backend to frontend for issuing
/// `CancelRequest` later.
#[non_exhaustive]
#[derive(PartialEq, Eq, Debug, new)]
pub struct BackendKeyData {
    pub process_id: i32,
    pub secret_key: i32,
}

pub const MESSAGE_TYPE_BYTE_BACKEND_KEY_DATA: u8 = b'K';

impl Message for BackendKeyData {
    #[inline]
    fn message_type() -> Option<u8> {
        Some(MESSAGE_TYPE_BYTE_BACKEND_KEY_DATA)
    }

    #[inline]
    fn message_length(&self, _charset: Charset) -> usize {
        12
    }

    fn encode_body(&self, buf: &mut BytesMut, _charset: Charset) -> PgStreamResult<()> {
        buf.put_i32(self.process_id);
        buf.put_i32(self.secret_key);

        Ok(())
    }

    fn decode_body(buf: &mut BytesMut, _: usize, _ctx: &DecodeContext) -> PgStreamResult<Self> {
        let process_id = buf.get_i32();
        let secret_key = buf.get_i32();

        Ok(BackendKeyData {
            process_id,
            secret_key,
        })
    }
}

/// `SslRequest` sent from frontend to check whether the backend supports
/// secure connections. The packet has no message type and contains only a
/// length(4) and an i32 magic value.
///
/// The backend replies with a single byte 'S' or 'N'; see
/// [`SslResponse`](crate::messages::response::SslResponse).
#[non_exhaustive]
#[derive(PartialEq, Eq, Debug, new)]
pub struct SslRequest;

impl SslRequest {
    pub const BODY_MAGIC_NUMBER: i32 = 80877103;
    pub const BODY_SIZE: usize = 8;
}

impl Message for SslRequest {
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
        Ok(())
    }

    fn decode_body(
        _buf: &mut BytesMut,
        _full_len: usize,
        _ctx: &DecodeContext,
    ) -> PgStreamResult<Self> {
        unreachable!();
    }

    /// Try to decode and check if the packet is a `SslRequest`.
    fn decode(buf: &mut BytesMut, _ctx: &DecodeContext) -> PgStreamResult<Option<Self>> {
        if buf.remaining() >= Self::BODY_SIZE
            && (&buf[4..8]).get_i32() == Self::BODY_MAGIC_NUMBER
        {
            buf.advance(Self::BODY_SIZE);
            Ok(Some(SslRequest))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_with_user_overrides_duplicate() {
        let mut extra = BTreeMap::new();
        extra.insert("user".to_owned(), "impostor".to_owned());
        extra.insert("database".to_owned(), "db0".to_owned());

        let startup = Startup::with_user("alice", extra);
        assert_eq!(startup.parameters.get("user"), Some(&"alice".to_owned()));
        assert_eq!(startup.parameters.get("database"), Some(&"db0".to_owned()));
    }

    #[test]
    fn test_startup_wire_layout() {
        let startup = Startup::with_user("alice", BTreeMap::new());

        let mut buf = BytesMut::new();
        startup.encode(&mut buf, Charset::Utf8).unwrap();

        let mut expected = BytesMut::new();
        expected.put_i32(4 + 4 + 5 + 6 + 1);
        expected.put_slice(&[0x00, 0x03, 0x00, 0x00]);
        expected.put_slice(b"user\0alice\0\0");

        assert_eq!(buf, expected);
    }

    #[test]
    fn test_md5_password() {
        let password = Password::md5("u", "p", &[0x01, 0x02, 0x03, 0x04]);

        let inner = format!("{:x}", md5::compute("pu"));
        let mut salted = inner.as_bytes().to_vec();
        salted.extend_from_slice(&[0x01, 0x02, 0x03, 0x04]);
        let expected = format!("md5{:x}", md5::compute(salted));

        assert_eq!(expected, password.password);
        assert!(password.password.starts_with("md5"));
        assert_eq!(password.password.len(), 35);
    }

    #[test]
    fn test_ssl_request_wire_layout() {
        let mut buf = BytesMut::new();
        SslRequest::new().encode(&mut buf, Charset::Utf8).unwrap();
        assert_eq!(buf.as_ref(), &[0, 0, 0, 8, 0x04, 0xD2, 0x16, 0x2F]);
    }
}
