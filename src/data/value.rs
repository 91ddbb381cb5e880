//! Values and parsed values
//!
//! A [`Value`] is a [`Slice`] paired with the [`Encoding`] that governs how
//! its bytes are interpreted. A [`ParseValue`] additionally records the
//! scoped name under which it was parsed and the [`Token`] that produced it.
//!
//! Deriving new values never copies bytes that already live in a slice;
//! clones share the underlying source and cache.

use std::fmt::{Debug, Display};
use std::ops::Deref;
use std::sync::Arc;

use num_bigint::{BigInt, Sign as BigSign};
use num_traits::Signed;
#[cfg(feature = "serde_impls")]
use serde::Serialize;

use crate::data::slice::Slice;
use crate::encoding::{Encoding, Sign};
use crate::error::MetalResult;
use crate::token::Token;

/// Separator between the components of a scoped name
pub const SEPARATOR: char = '.';

/// Byte content with an interpretation.
#[derive(Clone, PartialEq, Eq)]
pub struct Value {
    pub slice: Slice,
    pub encoding: Encoding,
}

impl Value {
    #[must_use]
    pub const fn new(slice: Slice, encoding: Encoding) -> Self {
        Self { slice, encoding }
    }

    /// Constant value over `bytes`.
    #[must_use]
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>, encoding: Encoding) -> Self {
        Self::new(Slice::from_bytes(bytes), encoding)
    }

    /// Constant value holding the compact representation of `number`.
    ///
    /// Signed encodings use minimal two's complement. Unsigned encodings drop
    /// the sign byte of non-negative numbers; negative numbers keep their two's
    /// complement form. The byte order of `encoding` is applied last.
    #[must_use]
    pub fn from_numeric(number: &BigInt, encoding: Encoding) -> Self {
        let mut bytes = number.to_signed_bytes_be();
        if !encoding.is_signed() && bytes.len() > 1 && bytes[0] == 0 {
            bytes.remove(0);
        }
        Self::from_bytes(encoding.byte_order.apply(&bytes), encoding)
    }

    /// Constant value holding `s` encoded with the charset of `encoding`.
    #[must_use]
    pub fn from_string(s: &str, encoding: Encoding) -> Self {
        Self::from_bytes(encoding.charset.encode(s), encoding)
    }

    /// Number of bytes in this value. Never reads the bytes.
    #[must_use]
    pub fn length(&self) -> u64 {
        self.slice.length
    }

    /// Offset of this value within its source.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.slice.offset
    }

    /// Returns the bytes of this value, reading them if necessary.
    pub fn bytes(&self) -> MetalResult<Arc<[u8]>> {
        self.slice.data()
    }

    /// Interprets the bytes as an integer according to the sign and byte
    /// order of this value's encoding. An empty value is zero.
    pub fn as_numeric(&self) -> MetalResult<BigInt> {
        let bytes = self.bytes()?;
        let big_endian = self.encoding.byte_order.apply(&bytes);
        Ok(match self.encoding.sign {
            Sign::Signed => BigInt::from_signed_bytes_be(&big_endian),
            Sign::Unsigned => BigInt::from_bytes_be(BigSign::Plus, &big_endian),
        })
    }

    /// Interprets the bytes as a string in this value's charset.
    pub fn as_string(&self) -> MetalResult<String> {
        Ok(self.encoding.charset.decode(&self.bytes()?))
    }

    /// Returns the bytes in big-endian order, regardless of encoding.
    pub(crate) fn big_endian_bytes(&self) -> MetalResult<Vec<u8>> {
        Ok(self.encoding.byte_order.apply(&self.bytes()?))
    }

    /// Interprets the value as a non-negative `u64`, if it fits.
    pub fn as_u64(&self) -> MetalResult<Option<u64>> {
        let number = self.as_numeric()?;
        if number.is_negative() {
            return Ok(None);
        }
        Ok(u64::try_from(&number).ok())
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.slice.data() {
            Ok(data) => write_hex(f, &data),
            Err(_) => write!(f, "{:?}", self.slice),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self, f)
    }
}

fn write_hex(f: &mut std::fmt::Formatter<'_>, bytes: &[u8]) -> std::fmt::Result {
    f.write_str("0x")?;
    for byte in bytes {
        write!(f, "{byte:02x}")?;
    }
    Ok(())
}

/// A [`Value`] produced by parsing, with its name and defining token.
#[derive(Clone)]
pub struct ParseValue {
    name: Arc<str>,
    definition: Token,
    value: Value,
}

impl ParseValue {
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>, definition: Token, slice: Slice, encoding: Encoding) -> Self {
        Self {
            name: name.into(),
            definition,
            value: Value::new(slice, encoding),
        }
    }

    /// Fully scoped name of this value
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn definition(&self) -> &Token {
        &self.definition
    }

    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Returns `true` if `name` is this value's full name or a trailing
    /// scope-aligned part of it.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        match self.name.strip_suffix(name) {
            Some("") => true,
            Some(prefix) => prefix.ends_with(SEPARATOR) && !name.is_empty(),
            None => false,
        }
    }
}

impl Deref for ParseValue {
    type Target = Value;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl From<ParseValue> for Value {
    fn from(value: ParseValue) -> Self {
        value.value
    }
}

impl PartialEq for ParseValue {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.definition == other.definition && self.value == other.value
    }
}

impl Eq for ParseValue {}

impl Debug for ParseValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pval({}:{:?})", self.name, self.value)
    }
}

#[cfg(feature = "serde_impls")]
impl Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::{Error, SerializeStruct};
        let data = self.bytes().map_err(S::Error::custom)?;
        let mut state = serializer.serialize_struct("Value", 3)?;
        state.serialize_field("offset", &self.offset())?;
        state.serialize_field("data", &*data)?;
        state.serialize_field("encoding", &self.encoding)?;
        state.end()
    }
}

#[cfg(feature = "serde_impls")]
impl Serialize for ParseValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("ParseValue", 2)?;
        state.serialize_field("name", &*self.name)?;
        state.serialize_field("value", &self.value)?;
        state.end()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::encoding::Charset;

    #[test]
    fn numeric_interpretation() {
        let bytes = vec![0xff, 0xfe];
        assert_eq!(
            Value::from_bytes(bytes.clone(), Encoding::default()).as_numeric().unwrap(),
            BigInt::from(0xfffe)
        );
        assert_eq!(
            Value::from_bytes(bytes.clone(), Encoding::signed()).as_numeric().unwrap(),
            BigInt::from(-2)
        );
        assert_eq!(
            Value::from_bytes(bytes, Encoding::little_endian()).as_numeric().unwrap(),
            BigInt::from(0xfeff)
        );
        assert_eq!(
            Value::from_bytes(Vec::new(), Encoding::signed()).as_numeric().unwrap(),
            BigInt::from(0)
        );
    }

    #[test]
    fn compact_numeric_construction() {
        let check = |n: i64, enc: Encoding, expected: &[u8]| {
            let value = Value::from_numeric(&BigInt::from(n), enc);
            assert_eq!(&*value.bytes().unwrap(), expected);
            assert_eq!(value.as_numeric().unwrap(), BigInt::from(n));
        };
        check(0, Encoding::default(), &[0x00]);
        check(255, Encoding::default(), &[0xff]);
        check(255, Encoding::signed(), &[0x00, 0xff]);
        check(-1, Encoding::signed(), &[0xff]);
        check(0x0102, Encoding::little_endian(), &[0x02, 0x01]);
    }

    #[test]
    fn strings() {
        let enc = Encoding::default().with_charset(Charset::Utf8);
        let value = Value::from_string("h\u{e9}", enc);
        assert_eq!(value.length(), 3);
        assert_eq!(value.as_string().unwrap(), "h\u{e9}");
    }

    #[test]
    fn as_u64_rejects_negative() {
        let value = Value::from_bytes(vec![0xff], Encoding::signed());
        assert_eq!(value.as_u64().unwrap(), None);
        let value = Value::from_bytes(vec![0xff], Encoding::default());
        assert_eq!(value.as_u64().unwrap(), Some(255));
    }

    #[test]
    fn scoped_name_matching() {
        let token = Token::def("c", crate::ValueExpression::con_int(1)).unwrap();
        let value = ParseValue::new("a.b.c", token, Slice::from_bytes(vec![1]), Encoding::default());
        assert!(value.matches("c"));
        assert!(value.matches("b.c"));
        assert!(value.matches("a.b.c"));
        assert!(!value.matches("bc"));
        assert!(!value.matches("b"));
        assert!(!value.matches(""));
        assert_eq!(format!("{value:?}"), "pval(a.b.c:0x01)");
    }
}
