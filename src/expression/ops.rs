//! Operators on concrete values
//!
//! Each operator maps present operands to a result value, or to `None` where
//! the operation has no meaningful result (division by zero, for instance).
//! Numeric operators read their operands through
//! [`Value::as_numeric`] and encode the result compactly in the encoding the
//! expression is evaluated with.

use std::fmt::Display;

use num_bigint::{BigInt, Sign as BigSign};
use num_integer::Integer;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::data::list::PersistentList;
use crate::data::slice::Slice;
use crate::data::source::Source;
use crate::data::value::Value;
use crate::encoding::Encoding;
use crate::error::MetalResult;

/// Operators over a single value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Length of the value in bytes
    Len,
    /// Offset of the value within its source
    Offset,
    /// Arithmetic negation
    Neg,
    /// Bitwise complement of every byte
    Not,
}

impl UnaryOp {
    pub fn apply(self, operand: &Value, encoding: Encoding) -> MetalResult<Option<Value>> {
        let number = match self {
            UnaryOp::Len => BigInt::from(operand.length()),
            UnaryOp::Offset => BigInt::from(operand.offset()),
            UnaryOp::Neg => -operand.as_numeric()?,
            UnaryOp::Not => {
                let bytes: Vec<u8> = operand.big_endian_bytes()?.iter().map(|byte| !byte).collect();
                return Ok(Some(from_big_endian(&bytes, encoding)));
            }
        };
        Ok(Some(Value::from_numeric(&number, encoding)))
    }
}

impl Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            UnaryOp::Len => "len",
            UnaryOp::Offset => "offset",
            UnaryOp::Neg => "neg",
            UnaryOp::Not => "not",
        })
    }
}

/// Operators over a pair of values.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    /// Truncating division; absent when dividing by zero
    Div,
    /// Non-negative remainder; absent for a non-positive divisor
    Mod,
    /// Bitwise and, with operands right-aligned
    And,
    /// Bitwise or, with operands right-aligned
    Or,
    ShiftLeft,
    ShiftRight,
    /// Byte concatenation
    Cat,
}

impl BinaryOp {
    pub fn apply(self, left: &Value, right: &Value, encoding: Encoding) -> MetalResult<Option<Value>> {
        let number = match self {
            BinaryOp::Add => left.as_numeric()? + right.as_numeric()?,
            BinaryOp::Sub => left.as_numeric()? - right.as_numeric()?,
            BinaryOp::Mul => left.as_numeric()? * right.as_numeric()?,
            BinaryOp::Div => {
                let divisor = right.as_numeric()?;
                if divisor.is_zero() {
                    return Ok(None);
                }
                left.as_numeric()? / divisor
            }
            BinaryOp::Mod => {
                let divisor = right.as_numeric()?;
                if !divisor.is_positive() {
                    return Ok(None);
                }
                left.as_numeric()?.mod_floor(&divisor)
            }
            BinaryOp::And => return bitwise(left, right, encoding, |a, b| a & b).map(Some),
            BinaryOp::Or => return bitwise(left, right, encoding, |a, b| a | b).map(Some),
            BinaryOp::ShiftLeft | BinaryOp::ShiftRight => {
                let Some(amount) = right.as_numeric()?.to_i64() else {
                    return Ok(None);
                };
                let base = BigInt::from_bytes_be(BigSign::Plus, &left.big_endian_bytes()?);
                shift(base, if self == BinaryOp::ShiftLeft { amount } else { -amount })
            }
            BinaryOp::Cat => return concatenate(left, right, encoding),
        };
        Ok(Some(Value::from_numeric(&number, encoding)))
    }
}

impl Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Mod => "mod",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::ShiftLeft => "shl",
            BinaryOp::ShiftRight => "shr",
            BinaryOp::Cat => "cat",
        })
    }
}

/// Shifts left for positive `amount`, right for negative.
fn shift(base: BigInt, amount: i64) -> BigInt {
    let magnitude = amount.unsigned_abs() as usize;
    if amount >= 0 {
        base << magnitude
    } else {
        base >> magnitude
    }
}

fn from_big_endian(bytes: &[u8], encoding: Encoding) -> Value {
    Value::from_bytes(encoding.byte_order.apply(bytes), encoding)
}

fn bitwise<F>(left: &Value, right: &Value, encoding: Encoding, op: F) -> MetalResult<Value>
where
    F: Fn(u8, u8) -> u8,
{
    let (left, right) = (left.big_endian_bytes()?, right.big_endian_bytes()?);
    let length = left.len().max(right.len());
    let byte_at = |bytes: &[u8], index: usize| -> u8 {
        // right-aligned: missing leading bytes read as zero
        let padding = length - bytes.len();
        index.checked_sub(padding).map_or(0, |i| bytes[i])
    };
    let result: Vec<u8> = (0..length)
        .map(|index| op(byte_at(&left, index), byte_at(&right, index)))
        .collect();
    Ok(from_big_endian(&result, encoding))
}

/// Concatenates a list of values into a single value over a concatenated
/// source. The list is in result order: its head is the last constituent.
///
/// Returns `None` if the concatenation holds no bytes.
pub(crate) fn concatenate_all(
    values: &PersistentList<Option<Value>>,
    encoding: Encoding,
) -> MetalResult<Option<Value>> {
    let Some(source) = Source::concatenate(values) else {
        return Ok(None);
    };
    let length = source.as_concatenated().map_or(0, |concatenated| concatenated.length);
    Ok(Slice::create(source, 0, length)?.map(|slice| Value::new(slice, encoding)))
}

fn concatenate(left: &Value, right: &Value, encoding: Encoding) -> MetalResult<Option<Value>> {
    let values = PersistentList::new()
        .add(Some(left.clone()))
        .add(Some(right.clone()));
    concatenate_all(&values, encoding)
}

#[cfg(test)]
mod test {
    use super::*;

    fn val(bytes: &[u8]) -> Value {
        Value::from_bytes(bytes.to_vec(), Encoding::default())
    }

    fn num(value: &Option<Value>) -> i64 {
        value.as_ref().unwrap().as_numeric().unwrap().to_i64().unwrap()
    }

    fn binary(op: BinaryOp, left: &[u8], right: &[u8]) -> Option<Value> {
        op.apply(&val(left), &val(right), Encoding::default()).unwrap()
    }

    #[test]
    fn arithmetic() {
        assert_eq!(num(&binary(BinaryOp::Add, &[0xff], &[0x01])), 256);
        assert_eq!(num(&binary(BinaryOp::Mul, &[0x10], &[0x10])), 256);
        assert_eq!(num(&binary(BinaryOp::Div, &[0x07], &[0x02])), 3);
        assert!(binary(BinaryOp::Div, &[0x07], &[0x00]).is_none());
        assert_eq!(num(&binary(BinaryOp::Mod, &[0x07], &[0x03])), 1);
        assert!(binary(BinaryOp::Mod, &[0x07], &[0x00]).is_none());
        let signed = BinaryOp::Sub
            .apply(&val(&[0x01]), &val(&[0x03]), Encoding::signed())
            .unwrap();
        assert_eq!(&*signed.unwrap().bytes().unwrap(), &[0xfe]);
    }

    #[test]
    fn modulo_is_non_negative() {
        let minus_seven = Value::from_bytes(vec![0xf9], Encoding::signed());
        let result = BinaryOp::Mod
            .apply(&minus_seven, &val(&[0x03]), Encoding::default())
            .unwrap();
        assert_eq!(num(&result), 2);
    }

    #[test]
    fn bitwise_operands_are_right_aligned() {
        let and = binary(BinaryOp::And, &[0x12, 0xf0], &[0x3c]).unwrap();
        assert_eq!(&*and.bytes().unwrap(), &[0x00, 0x30]);
        let or = binary(BinaryOp::Or, &[0x12, 0xf0], &[0x0f]).unwrap();
        assert_eq!(&*or.bytes().unwrap(), &[0x12, 0xff]);
        let not = UnaryOp::Not
            .apply(&val(&[0x0f, 0xf0]), Encoding::default())
            .unwrap()
            .unwrap();
        assert_eq!(&*not.bytes().unwrap(), &[0xf0, 0x0f]);
    }

    #[test]
    fn shifts() {
        assert_eq!(num(&binary(BinaryOp::ShiftLeft, &[0x01], &[0x04])), 16);
        assert_eq!(num(&binary(BinaryOp::ShiftRight, &[0x80], &[0x07])), 1);
        let signed = Value::from_bytes(vec![0x80], Encoding::signed());
        let shifted = BinaryOp::ShiftRight
            .apply(&signed, &val(&[0x01]), Encoding::default())
            .unwrap();
        assert_eq!(num(&shifted), 0x40);
    }

    #[test]
    fn unary() {
        let source = Source::constant(vec![0u8; 8]);
        let value = Value::new(
            Slice::create(source, 3, 2).unwrap().unwrap(),
            Encoding::default(),
        );
        let len = UnaryOp::Len.apply(&value, Encoding::default()).unwrap();
        let offset = UnaryOp::Offset.apply(&value, Encoding::default()).unwrap();
        assert_eq!(num(&len), 2);
        assert_eq!(num(&offset), 3);
        let neg = UnaryOp::Neg.apply(&val(&[0x05]), Encoding::signed()).unwrap();
        assert_eq!(&*neg.unwrap().bytes().unwrap(), &[0xfb]);
    }

    #[test]
    fn cat() {
        let joined = binary(BinaryOp::Cat, &[0x01, 0x02], &[0x03]).unwrap();
        assert_eq!(&*joined.bytes().unwrap(), &[0x01, 0x02, 0x03]);
        assert!(binary(BinaryOp::Cat, &[], &[]).is_none());
    }
}
