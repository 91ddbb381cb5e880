//! Interpretation settings for parsed bytes
//!
//! An [`Encoding`] determines how the bytes of a [`Value`](crate::Value)
//! are read as a number or as a string. It is plain configuration data:
//! it is attached to values when they are created and may be overridden
//! per token, but it is never mutated.

use std::fmt::Display;

/// Whether numeric interpretations use two's complement.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum Sign {
    Signed,
    #[default]
    Unsigned,
}

/// Character set used for string interpretation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum Charset {
    /// 7-bit ASCII; bytes outside of the range decode to U+FFFD
    #[default]
    UsAscii,
    /// ISO-8859-1, mapping every byte to the code point of the same value
    Latin1,
    /// UTF-8, decoded lossily
    Utf8,
}

impl Charset {
    /// Decodes `bytes` according to this character set.
    ///
    /// Decoding never fails; invalid sequences are replaced.
    #[must_use]
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Charset::UsAscii => bytes
                .iter()
                .map(|&b| if b.is_ascii() { b as char } else { '\u{FFFD}' })
                .collect(),
            Charset::Latin1 => bytes.iter().map(|&b| b as char).collect(),
            Charset::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        }
    }

    /// Encodes `s` according to this character set.
    ///
    /// Characters that cannot be represented are written as `?`.
    #[must_use]
    pub fn encode(self, s: &str) -> Vec<u8> {
        match self {
            Charset::UsAscii => s
                .chars()
                .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                .collect(),
            Charset::Latin1 => s
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect(),
            Charset::Utf8 => s.as_bytes().to_vec(),
        }
    }
}

impl Display for Charset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Charset::UsAscii => "US-ASCII",
            Charset::Latin1 => "ISO-8859-1",
            Charset::Utf8 => "UTF-8",
        })
    }
}

/// Order in which the bytes of a numeric value are stored.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum ByteOrder {
    #[default]
    BigEndian,
    LittleEndian,
}

impl ByteOrder {
    /// Converts between this byte order and big-endian order.
    ///
    /// The conversion is its own inverse.
    #[must_use]
    pub fn apply(self, bytes: &[u8]) -> Vec<u8> {
        match self {
            ByteOrder::BigEndian => bytes.to_vec(),
            ByteOrder::LittleEndian => bytes.iter().rev().copied().collect(),
        }
    }
}

/// Combination of sign, charset and byte order.
///
/// The default is unsigned, US-ASCII, big-endian.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct Encoding {
    pub sign: Sign,
    pub charset: Charset,
    pub byte_order: ByteOrder,
}

impl Encoding {
    #[must_use]
    pub const fn new(sign: Sign, charset: Charset, byte_order: ByteOrder) -> Self {
        Self {
            sign,
            charset,
            byte_order,
        }
    }

    /// Signed, US-ASCII, big-endian
    #[must_use]
    pub const fn signed() -> Self {
        Self::new(Sign::Signed, Charset::UsAscii, ByteOrder::BigEndian)
    }

    /// Unsigned, US-ASCII, little-endian
    #[must_use]
    pub const fn little_endian() -> Self {
        Self::new(Sign::Unsigned, Charset::UsAscii, ByteOrder::LittleEndian)
    }

    #[must_use]
    pub const fn with_sign(self, sign: Sign) -> Self {
        Self { sign, ..self }
    }

    #[must_use]
    pub const fn with_charset(self, charset: Charset) -> Self {
        Self { charset, ..self }
    }

    #[must_use]
    pub const fn with_byte_order(self, byte_order: ByteOrder) -> Self {
        Self { byte_order, ..self }
    }

    #[must_use]
    pub const fn is_signed(&self) -> bool {
        matches!(self.sign, Sign::Signed)
    }
}

impl Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = match self.sign {
            Sign::Signed => "SIGNED",
            Sign::Unsigned => "UNSIGNED",
        };
        let order = match self.byte_order {
            ByteOrder::BigEndian => "BIG_ENDIAN",
            ByteOrder::LittleEndian => "LITTLE_ENDIAN",
        };
        write!(f, "Encoding({sign},{},{order})", self.charset)
    }
}

#[cfg(feature = "serde_impls")]
impl serde::Serialize for Encoding {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(
            Encoding::default().to_string(),
            "Encoding(UNSIGNED,US-ASCII,BIG_ENDIAN)"
        );
        assert_eq!(
            Encoding::signed().to_string(),
            "Encoding(SIGNED,US-ASCII,BIG_ENDIAN)"
        );
        assert_eq!(
            Encoding::default().with_charset(Charset::Utf8).to_string(),
            "Encoding(UNSIGNED,UTF-8,BIG_ENDIAN)"
        );
        assert_eq!(
            Encoding::little_endian().to_string(),
            "Encoding(UNSIGNED,US-ASCII,LITTLE_ENDIAN)"
        );
    }

    #[test]
    fn charsets() {
        assert_eq!(Charset::UsAscii.decode(b"abc\xff"), "abc\u{FFFD}");
        assert_eq!(Charset::Latin1.decode(&[0x41, 0xe9]), "A\u{e9}");
        assert_eq!(Charset::Latin1.encode("A\u{e9}"), vec![0x41, 0xe9]);
        assert_eq!(Charset::Utf8.encode("\u{e9}"), vec![0xc3, 0xa9]);
    }
}
