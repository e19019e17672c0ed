use std::fmt;

use bytes::{BufMut, BytesMut};

use crate::error::{PgStreamError, PgStreamResult};

/// Character encoding applied to every string field on the wire.
///
/// The charset is always passed as a parameter; the crate keeps no global
/// encoding state. `Utf8` matches the `client_encoding` default of modern
/// servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    #[default]
    Utf8,
    Ascii,
    Latin1,
}

impl Charset {
    /// Number of bytes `s` occupies once encoded, excluding any terminator.
    pub fn encoded_len(&self, s: &str) -> usize {
        match self {
            Charset::Utf8 => s.len(),
            // single byte per character
            Charset::Ascii | Charset::Latin1 => s.chars().count(),
        }
    }

    pub fn encode_into(&self, s: &str, buf: &mut BytesMut) -> PgStreamResult<()> {
        match self {
            Charset::Utf8 => {
                buf.put_slice(s.as_bytes());
                Ok(())
            }
            Charset::Ascii => {
                for ch in s.chars() {
                    if !ch.is_ascii() {
                        return Err(PgStreamError::CharsetEncode(*self, ch));
                    }
                    buf.put_u8(ch as u8);
                }
                Ok(())
            }
            Charset::Latin1 => {
                for ch in s.chars() {
                    let code_point = ch as u32;
                    if code_point > 0xFF {
                        return Err(PgStreamError::CharsetEncode(*self, ch));
                    }
                    buf.put_u8(code_point as u8);
                }
                Ok(())
            }
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> PgStreamResult<String> {
        match self {
            Charset::Utf8 => std::str::from_utf8(bytes)
                .map(|s| s.to_owned())
                .map_err(|_| PgStreamError::CharsetDecode(*self)),
            Charset::Ascii => {
                if !bytes.is_ascii() {
                    return Err(PgStreamError::CharsetDecode(*self));
                }
                std::str::from_utf8(bytes)
                    .map(|s| s.to_owned())
                    .map_err(|_| PgStreamError::CharsetDecode(*self))
            }
            // every byte maps to the code point of the same value
            Charset::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Charset::Utf8 => write!(f, "UTF8"),
            Charset::Ascii => write!(f, "SQL_ASCII"),
            Charset::Latin1 => write!(f, "LATIN1"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_latin1_roundtrip() {
        let mut buf = BytesMut::new();
        Charset::Latin1.encode_into("héllo", &mut buf).unwrap();
        assert_eq!(buf.as_ref(), &[b'h', 0xE9, b'l', b'l', b'o']);
        assert_eq!(Charset::Latin1.decode(buf.as_ref()).unwrap(), "héllo");
    }

    #[test]
    fn test_ascii_rejects_non_ascii() {
        let mut buf = BytesMut::new();
        let result = Charset::Ascii.encode_into("héllo", &mut buf);
        assert!(matches!(
            result,
            Err(PgStreamError::CharsetEncode(Charset::Ascii, 'é'))
        ));

        let result = Charset::Ascii.decode(&[b'h', 0xE9]);
        assert!(matches!(
            result,
            Err(PgStreamError::CharsetDecode(Charset::Ascii))
        ));
    }

    #[test]
    fn test_utf8_invalid_sequence() {
        let result = Charset::Utf8.decode(&[0xFF, 0xFE]);
        assert!(matches!(
            result,
            Err(PgStreamError::CharsetDecode(Charset::Utf8))
        ));
    }

    #[test]
    fn test_encoded_len() {
        assert_eq!(Charset::Utf8.encoded_len("héllo"), 6);
        assert_eq!(Charset::Latin1.encoded_len("héllo"), 5);
    }
}
