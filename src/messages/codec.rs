use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::charset::Charset;
use crate::error::{PgStreamError, PgStreamResult};

/// Read a null-terminated string and consume its terminator.
///
/// `None` is the canonical form of the empty string, used for unnamed
/// portals and statements. A buffer that ends before a null byte is a
/// framing error.
pub(crate) fn get_cstring(buf: &mut BytesMut, charset: Charset) -> PgStreamResult<Option<String>> {
    let mut i = 0;

    // with bound check to prevent invalid format
    while i < buf.remaining() && buf[i] != b'\0' {
        i += 1;
    }

    if i == buf.remaining() {
        return Err(PgStreamError::MissingNullTerminator);
    }

    // i+1: include the '\0'
    // move cursor to the end of cstring
    let string_buf = buf.split_to(i + 1);

    if i == 0 {
        Ok(None)
    } else {
        charset.decode(&string_buf[..i]).map(Some)
    }
}

pub(crate) fn put_cstring(buf: &mut BytesMut, s: &str, charset: Charset) -> PgStreamResult<()> {
    charset.encode_into(s, buf)?;
    buf.put_u8(b'\0');
    Ok(())
}

pub(crate) fn put_option_cstring(
    buf: &mut BytesMut,
    s: &Option<String>,
    charset: Charset,
) -> PgStreamResult<()> {
    match s {
        Some(s) => put_cstring(buf, s, charset),
        None => {
            buf.put_u8(b'\0');
            Ok(())
        }
    }
}

#[inline]
pub(crate) fn cstring_len(s: &str, charset: Charset) -> usize {
    charset.encoded_len(s) + 1
}

#[inline]
pub(crate) fn option_cstring_len(s: &Option<String>, charset: Charset) -> usize {
    s.as_deref().map(|s| charset.encoded_len(s)).unwrap_or(0) + 1
}

/// Write a value with its i32 byte-length prefix, `-1` for NULL.
pub(crate) fn put_length_prefixed(buf: &mut BytesMut, value: &Option<Bytes>) {
    match value {
        Some(value) => {
            buf.put_i32(value.len() as i32);
            buf.put_slice(value.as_ref());
        }
        None => buf.put_i32(-1),
    }
}

/// Read a length-prefixed value. Exactly `-1` means NULL; any other
/// negative length is ill-formed.
pub(crate) fn get_length_prefixed(buf: &mut BytesMut) -> PgStreamResult<Option<Bytes>> {
    let len = buf.get_i32();
    match len {
        -1 => Ok(None),
        n if n < 0 => Err(PgStreamError::InvalidValueLength(n)),
        n => Ok(Some(buf.split_to(n as usize).freeze())),
    }
}

#[inline]
pub(crate) fn length_prefixed_len(value: &Option<Bytes>) -> usize {
    4 + value.as_ref().map(|v| v.len()).unwrap_or(0)
}

/// Attempt to slice one complete frame off the front of `buf` and decode it
/// with `decode_fn`.
///
/// The header is only peeked: when the buffer holds fewer bytes than the
/// declared frame, the cursor is left untouched so the caller can retry
/// once more bytes arrive. `offset` is the width of the leading type byte
/// (0 for the version-zero startup family). `decode_fn` receives the frame
/// payload and the declared length (which counts the length field itself).
pub(crate) fn decode_packet<T, F>(
    buf: &mut BytesMut,
    offset: usize,
    max_content_length: usize,
    decode_fn: F,
) -> PgStreamResult<Option<T>>
where
    F: Fn(&mut BytesMut, usize) -> PgStreamResult<T>,
{
    if buf.remaining() < offset + 4 {
        return Ok(None);
    }

    let declared_length = (&buf[offset..offset + 4]).get_i32();
    if declared_length < 4 {
        return Err(PgStreamError::InvalidMessageLength(declared_length));
    }

    let content_length = declared_length as usize - 4;
    if content_length > max_content_length {
        let code = if offset == 1 { buf[0] } else { 0 };
        return Err(PgStreamError::MessageTooLong(
            code,
            content_length,
            max_content_length,
        ));
    }

    if buf.remaining() < offset + declared_length as usize {
        return Ok(None);
    }

    buf.advance(offset + 4);
    let mut body = buf.split_to(content_length);
    decode_fn(&mut body, declared_length as usize).map(Some)
}
