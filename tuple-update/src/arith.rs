//! Arithmetic kernel for `+` and `-` update operations.
//!
//! Operands are ranked `Decimal < Double < Float < Int`, most precise
//! first, and the operation is carried out in the lowest rank present:
//! adding a double to an integer field produces a double, adding an integer
//! to a float field stays float-sized. Integer arithmetic runs in `i128`,
//! wide enough that no pair of 64-bit operands can overflow the
//! intermediate; only the final result is range-checked against
//! `[-2^63, 2^64)` and encoded as uint exactly when non-negative.

use bigdecimal::num_bigint::BigInt;
use bigdecimal::BigDecimal;
use tuple_mp::decimal::{encode_decimal, sizeof_decimal};
use tuple_mp::encode::{
    encode_double, encode_float, encode_int, encode_uint, sizeof_double, sizeof_float, sizeof_int,
    sizeof_uint,
};
use tuple_mp::{Cursor, MpError, MpType};

/// A numeric operand or result.
#[derive(Debug, Clone, PartialEq)]
pub enum ArithValue {
    Decimal(BigDecimal),
    Double(f64),
    Float(f32),
    Int(i128),
}

/// Failures local to the arithmetic itself; the caller attaches the opcode
/// and field context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithError {
    /// Integer result outside `[-2^63, 2^64)`.
    Overflow,
    /// A NaN or infinite double met a decimal operand.
    NonFiniteDouble,
}

const INT_MIN: i128 = i64::MIN as i128;
const INT_MAX: i128 = u64::MAX as i128;

impl ArithValue {
    fn rank(&self) -> u8 {
        match self {
            ArithValue::Decimal(_) => 0,
            ArithValue::Double(_) => 1,
            ArithValue::Float(_) => 2,
            ArithValue::Int(_) => 3,
        }
    }

    /// Read a numeric value; `None` when the next value is not a number.
    pub fn read(cur: &mut Cursor<'_>) -> Result<Option<ArithValue>, MpError> {
        Ok(match cur.peek_type()? {
            MpType::Uint => Some(ArithValue::Int(cur.decode_uint()? as i128)),
            MpType::Int => Some(ArithValue::Int(cur.decode_int()? as i128)),
            MpType::Float => Some(ArithValue::Float(cur.decode_float()?)),
            MpType::Double => Some(ArithValue::Double(cur.decode_double()?)),
            MpType::Ext => {
                // Only the decimal extension is numeric.
                let mut probe = *cur;
                match probe.decode_decimal() {
                    Ok(d) => {
                        *cur = probe;
                        Some(ArithValue::Decimal(d))
                    }
                    Err(MpError::BadDecimal) => None,
                    Err(e) => return Err(e),
                }
            }
            _ => None,
        })
    }

    fn to_double(&self) -> f64 {
        match self {
            ArithValue::Double(v) => *v,
            ArithValue::Float(v) => *v as f64,
            ArithValue::Int(v) => *v as f64,
            ArithValue::Decimal(_) => unreachable!("decimal operands use decimal arithmetic"),
        }
    }

    fn to_decimal(&self) -> Result<BigDecimal, ArithError> {
        match self {
            ArithValue::Decimal(d) => Ok(d.clone()),
            ArithValue::Int(v) => Ok(BigDecimal::from(BigInt::from(*v))),
            ArithValue::Float(v) => {
                BigDecimal::try_from(*v as f64).map_err(|_| ArithError::NonFiniteDouble)
            }
            ArithValue::Double(v) => {
                BigDecimal::try_from(*v).map_err(|_| ArithError::NonFiniteDouble)
            }
        }
    }

    /// Encoded size of the value.
    pub fn sizeof(&self) -> u32 {
        match self {
            ArithValue::Decimal(d) => sizeof_decimal(d),
            ArithValue::Double(_) => sizeof_double(),
            ArithValue::Float(_) => sizeof_float(),
            ArithValue::Int(v) => {
                if *v >= 0 {
                    sizeof_uint(*v as u64)
                } else {
                    sizeof_int(*v as i64)
                }
            }
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            ArithValue::Decimal(d) => encode_decimal(out, d),
            ArithValue::Double(v) => encode_double(out, *v),
            ArithValue::Float(v) => encode_float(out, *v),
            ArithValue::Int(v) => {
                if *v >= 0 {
                    encode_uint(out, *v as u64)
                } else {
                    encode_int(out, *v as i64)
                }
            }
        }
    }
}

/// Compute `lhs op rhs` where `op` is `'+'` or `'-'`.
pub fn perform(lhs: &ArithValue, rhs: &ArithValue, opcode: char) -> Result<ArithValue, ArithError> {
    debug_assert!(opcode == '+' || opcode == '-');
    let lowest = lhs.rank().min(rhs.rank());
    match lowest {
        3 => {
            let (ArithValue::Int(a), ArithValue::Int(b)) = (lhs, rhs) else {
                unreachable!("rank 3 means both operands are integers");
            };
            let result = if opcode == '+' { a + b } else { a - b };
            if (INT_MIN..=INT_MAX).contains(&result) {
                Ok(ArithValue::Int(result))
            } else {
                Err(ArithError::Overflow)
            }
        }
        0 => {
            let a = lhs.to_decimal()?;
            let b = rhs.to_decimal()?;
            Ok(ArithValue::Decimal(if opcode == '+' { a + b } else { a - b }))
        }
        lowest => {
            let a = lhs.to_double();
            let b = rhs.to_double();
            let c = if opcode == '+' { a + b } else { a - b };
            if lowest == 1 {
                Ok(ArithValue::Double(c))
            } else {
                Ok(ArithValue::Float(c as f32))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn integer_stays_integer() {
        let r = perform(&ArithValue::Int(1), &ArithValue::Int(2), '+').unwrap();
        assert_eq!(r, ArithValue::Int(3));
        let r = perform(&ArithValue::Int(1), &ArithValue::Int(2), '-').unwrap();
        assert_eq!(r, ArithValue::Int(-1));
    }

    #[test]
    fn uint_range_is_fully_usable() {
        let r = perform(
            &ArithValue::Int(u64::MAX as i128 - 1),
            &ArithValue::Int(1),
            '+',
        )
        .unwrap();
        assert_eq!(r, ArithValue::Int(u64::MAX as i128));
        assert_eq!(r.sizeof(), 9);
    }

    #[test]
    fn overflow_at_both_ends() {
        assert_eq!(
            perform(&ArithValue::Int(u64::MAX as i128), &ArithValue::Int(1), '+'),
            Err(ArithError::Overflow)
        );
        assert_eq!(
            perform(&ArithValue::Int(i64::MIN as i128), &ArithValue::Int(1), '-'),
            Err(ArithError::Overflow)
        );
        // The intermediate never overflows even for extreme operands.
        assert_eq!(
            perform(
                &ArithValue::Int(u64::MAX as i128),
                &ArithValue::Int(u64::MAX as i128),
                '-'
            )
            .unwrap(),
            ArithValue::Int(0)
        );
    }

    #[test]
    fn double_wins_over_int() {
        let r = perform(&ArithValue::Int(1), &ArithValue::Double(0.5), '+').unwrap();
        assert_eq!(r, ArithValue::Double(1.5));
        let r = perform(&ArithValue::Double(0.5), &ArithValue::Int(1), '-').unwrap();
        assert_eq!(r, ArithValue::Double(-0.5));
    }

    #[test]
    fn float_narrows_unless_double_present() {
        let r = perform(&ArithValue::Float(1.5), &ArithValue::Int(1), '+').unwrap();
        assert_eq!(r, ArithValue::Float(2.5));
        let r = perform(&ArithValue::Float(1.5), &ArithValue::Double(1.0), '+').unwrap();
        assert_eq!(r, ArithValue::Double(2.5));
    }

    #[test]
    fn decimal_wins_over_everything() {
        let d = BigDecimal::from_str("1.10").unwrap();
        let r = perform(&ArithValue::Decimal(d.clone()), &ArithValue::Int(1), '+').unwrap();
        assert_eq!(r, ArithValue::Decimal(BigDecimal::from_str("2.10").unwrap()));
        let r = perform(&ArithValue::Double(0.5), &ArithValue::Decimal(d), '-').unwrap();
        assert_eq!(
            r,
            ArithValue::Decimal(BigDecimal::from_str("-0.60").unwrap())
        );
    }

    #[test]
    fn non_finite_double_cannot_meet_decimal() {
        let d = BigDecimal::from_str("1").unwrap();
        assert_eq!(
            perform(&ArithValue::Double(f64::NAN), &ArithValue::Decimal(d), '+'),
            Err(ArithError::NonFiniteDouble)
        );
    }
}
