//! Decoding of raw result columns into Rust values.
//!
//! Result columns arrive as untyped byte runs inside a
//! [`DataRow`](crate::messages::data::DataRow). [`ColumnDecoder`] is the
//! capability contract for turning one column into a value of a concrete
//! type: `None` stands for a NULL column, parse failures surface as
//! recoverable errors that do not invalidate subsequent rows. The built-in
//! implementations cover the standard scalar categories in their text
//! representation.

use bytes::Bytes;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::charset::Charset;
use crate::error::{PgStreamError, PgStreamResult};
use crate::messages::data::DataRow;

/// Decode one raw column value into `Self`.
pub trait ColumnDecoder: Sized {
    fn decode_column(value: Option<&[u8]>, charset: Charset) -> PgStreamResult<Option<Self>>;
}

impl ColumnDecoder for String {
    fn decode_column(value: Option<&[u8]>, charset: Charset) -> PgStreamResult<Option<Self>> {
        value.map(|bytes| charset.decode(bytes)).transpose()
    }
}

// derived by chaining the string decoder with the type's FromStr
macro_rules! impl_parsed_column_decoder {
    ($t:ty) => {
        impl ColumnDecoder for $t {
            fn decode_column(
                value: Option<&[u8]>,
                charset: Charset,
            ) -> PgStreamResult<Option<Self>> {
                match String::decode_column(value, charset)? {
                    Some(text) => text
                        .parse::<$t>()
                        .map(Some)
                        .map_err(|e| PgStreamError::ColumnDecode(Box::new(e))),
                    None => Ok(None),
                }
            }
        }
    };
}

impl_parsed_column_decoder!(i16);
impl_parsed_column_decoder!(i32);
impl_parsed_column_decoder!(i64);
impl_parsed_column_decoder!(i128);
impl_parsed_column_decoder!(f32);
impl_parsed_column_decoder!(f64);
impl_parsed_column_decoder!(Decimal);

impl ColumnDecoder for bool {
    fn decode_column(value: Option<&[u8]>, _charset: Charset) -> PgStreamResult<Option<Self>> {
        match value {
            Some(b"t") => Ok(Some(true)),
            Some(b"f") => Ok(Some(false)),
            Some(other) => Err(PgStreamError::ColumnDecode(
                format!("invalid bool value: {:?}", other).into(),
            )),
            None => Ok(None),
        }
    }
}

impl ColumnDecoder for Vec<u8> {
    fn decode_column(value: Option<&[u8]>, _charset: Charset) -> PgStreamResult<Option<Self>> {
        match value {
            Some(bytes) => {
                let hex_digits = bytes
                    .strip_prefix(b"\\x")
                    .ok_or_else(|| PgStreamError::ColumnDecode("\\x prefix expected for bytea".into()))?;
                hex::decode(hex_digits)
                    .map(Some)
                    .map_err(|e| PgStreamError::ColumnDecode(Box::new(e)))
            }
            None => Ok(None),
        }
    }
}

impl ColumnDecoder for u8 {
    fn decode_column(value: Option<&[u8]>, _charset: Charset) -> PgStreamResult<Option<Self>> {
        match value {
            Some([byte]) => Ok(Some(*byte)),
            Some(other) => Err(PgStreamError::ColumnDecode(
                format!("expected a single byte, got {}", other.len()).into(),
            )),
            None => Ok(None),
        }
    }
}

impl ColumnDecoder for char {
    fn decode_column(value: Option<&[u8]>, charset: Charset) -> PgStreamResult<Option<Self>> {
        match String::decode_column(value, charset)? {
            Some(text) => {
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(ch), None) => Ok(Some(ch)),
                    _ => Err(PgStreamError::ColumnDecode(
                        format!("expected a single character, got {:?}", text).into(),
                    )),
                }
            }
            None => Ok(None),
        }
    }
}

impl ColumnDecoder for NaiveDate {
    fn decode_column(value: Option<&[u8]>, charset: Charset) -> PgStreamResult<Option<Self>> {
        match String::decode_column(value, charset)? {
            Some(text) => NaiveDate::parse_from_str(&text, "%Y-%m-%d")
                .map(Some)
                .map_err(|e| PgStreamError::ColumnDecode(Box::new(e))),
            None => Ok(None),
        }
    }
}

/// Cursor over the columns of a single [`DataRow`].
#[derive(new, Debug)]
pub struct DataRowReader<'a> {
    row: &'a DataRow,
    charset: Charset,
    #[new(default)]
    read_index: usize,
}

impl DataRowReader<'_> {
    /// Decode the next column of the row. `Ok(None)` is a NULL column.
    pub fn next_value<T>(&mut self) -> PgStreamResult<Option<T>>
    where
        T: ColumnDecoder,
    {
        let field: &Option<Bytes> = self
            .row
            .fields
            .get(self.read_index)
            .ok_or(PgStreamError::DataRowIndexOutOfBounds)?;
        self.read_index += 1;

        T::decode_column(field.as_ref().map(|b| b.as_ref()), self.charset)
    }

    pub fn len(&self) -> usize {
        self.row.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row.fields.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn decode<T: ColumnDecoder>(value: &[u8]) -> PgStreamResult<Option<T>> {
        T::decode_column(Some(value), Charset::Utf8)
    }

    #[test]
    fn test_decode_string() {
        assert_eq!(
            decode::<String>(b"hello").unwrap(),
            Some("hello".to_owned())
        );
        assert_eq!(String::decode_column(None, Charset::Utf8).unwrap(), None);
    }

    #[test]
    fn test_decode_integers() {
        assert_eq!(decode::<i16>(b"-7").unwrap(), Some(-7));
        assert_eq!(decode::<i32>(b"42").unwrap(), Some(42));
        assert_eq!(decode::<i64>(b"9000000000").unwrap(), Some(9_000_000_000));
        assert_eq!(
            decode::<i128>(b"170141183460469231731687303715884105727").unwrap(),
            Some(i128::MAX)
        );
        assert!(decode::<i32>(b"not_a_number").is_err());
    }

    #[test]
    fn test_decode_floats() {
        assert_eq!(decode::<f32>(b"1.5").unwrap(), Some(1.5));
        assert_eq!(decode::<f64>(b"-2.25").unwrap(), Some(-2.25));
    }

    #[test]
    fn test_decode_decimal() {
        assert_eq!(
            decode::<Decimal>(b"12345.6789").unwrap(),
            Some("12345.6789".parse().unwrap())
        );
        assert!(decode::<Decimal>(b"twelve").is_err());
    }

    #[test]
    fn test_decode_bool() {
        assert_eq!(decode::<bool>(b"t").unwrap(), Some(true));
        assert_eq!(decode::<bool>(b"f").unwrap(), Some(false));
        assert!(decode::<bool>(b"true").is_err());
        assert_eq!(bool::decode_column(None, Charset::Utf8).unwrap(), None);
    }

    #[test]
    fn test_decode_bytea() {
        assert_eq!(
            decode::<Vec<u8>>(b"\\x0102ff").unwrap(),
            Some(vec![0x01, 0x02, 0xFF])
        );
        assert!(decode::<Vec<u8>>(b"0102ff").is_err());
        assert!(decode::<Vec<u8>>(b"\\x010g").is_err());
    }

    #[test]
    fn test_decode_single_byte_and_char() {
        assert_eq!(decode::<u8>(b"A").unwrap(), Some(b'A'));
        assert!(decode::<u8>(b"AB").is_err());

        assert_eq!(decode::<char>(b"A").unwrap(), Some('A'));
        assert!(decode::<char>(b"AB").is_err());
    }

    #[test]
    fn test_decode_date() {
        assert_eq!(
            decode::<NaiveDate>(b"2024-06-20").unwrap(),
            Some(NaiveDate::from_ymd_opt(2024, 6, 20).unwrap())
        );
        assert!(decode::<NaiveDate>(b"06/20/2024").is_err());
    }

    #[test]
    fn test_data_row_reader() {
        let row = DataRow::new(vec![
            Some(Bytes::from_static(b"42")),
            None,
            Some(Bytes::from_static(b"t")),
        ]);

        let mut reader = DataRowReader::new(&row, Charset::Utf8);
        assert_eq!(reader.len(), 3);
        assert_eq!(reader.next_value::<i32>().unwrap(), Some(42));
        assert_eq!(reader.next_value::<String>().unwrap(), None);
        assert_eq!(reader.next_value::<bool>().unwrap(), Some(true));
        assert!(matches!(
            reader.next_value::<String>(),
            Err(PgStreamError::DataRowIndexOutOfBounds)
        ));
    }

    #[test]
    fn test_parse_failure_does_not_poison_reader() {
        let row = DataRow::new(vec![
            Some(Bytes::from_static(b"oops")),
            Some(Bytes::from_static(b"7")),
        ]);

        let mut reader = DataRowReader::new(&row, Charset::Utf8);
        assert!(reader.next_value::<i32>().is_err());
        assert_eq!(reader.next_value::<i32>().unwrap(), Some(7));
    }
}
