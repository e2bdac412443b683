//! Arbitrary-precision decimal extension codec.
//!
//! Wire form: an extension value tagged [`DECIMAL_EXT_TAG`] whose payload is
//! a MessagePack integer `scale` followed by packed BCD digits, most
//! significant first, with the final nibble holding the sign. The value is
//! `digits * 10^(-scale)`.

use crate::decode::Cursor;
use crate::encode::{encode_ext_header, encode_int, encode_uint, sizeof_ext, sizeof_int, sizeof_uint};
use crate::MpError;
use bigdecimal::num_bigint::{BigInt, Sign};
use bigdecimal::BigDecimal;

/// Extension tag reserved for decimal values.
pub const DECIMAL_EXT_TAG: i8 = 1;

const SIGN_MINUS: u8 = 0x0d;
const SIGN_MINUS_ALT: u8 = 0x0b;
const SIGN_PLUS: u8 = 0x0c;

impl<'a> Cursor<'a> {
    /// Decode a decimal extension value.
    pub fn decode_decimal(&mut self) -> Result<BigDecimal, MpError> {
        let (tag, len) = self.decode_ext_header()?;
        if tag != DECIMAL_EXT_TAG {
            return Err(MpError::BadDecimal);
        }
        let payload = self.take_payload(len)?;
        let mut body = Cursor::new(payload);
        let scale = match body.peek_type()? {
            crate::MpType::Uint => {
                let v = body.decode_uint()?;
                i64::try_from(v).map_err(|_| MpError::BadDecimal)?
            }
            crate::MpType::Int => body.decode_int()?,
            _ => return Err(MpError::BadDecimal),
        };
        let bcd = body.rest();
        if bcd.is_empty() {
            return Err(MpError::BadDecimal);
        }
        let mut digits = String::with_capacity(bcd.len() * 2);
        let nibbles = bcd.iter().flat_map(|&b| [b >> 4, b & 0x0f]);
        let mut sign = None;
        // Every nibble before the last is a digit; the last is the sign.
        let total = bcd.len() * 2;
        for (i, n) in nibbles.enumerate() {
            if i + 1 == total {
                sign = Some(n);
            } else if n <= 9 {
                digits.push((b'0' + n) as char);
            } else {
                return Err(MpError::BadDecimal);
            }
        }
        let negative = match sign {
            Some(SIGN_MINUS) | Some(SIGN_MINUS_ALT) => true,
            Some(n) if n >= 0x0a => false,
            _ => return Err(MpError::BadDecimal),
        };
        if digits.is_empty() {
            digits.push('0');
        }
        let unsigned = BigInt::parse_bytes(digits.as_bytes(), 10).ok_or(MpError::BadDecimal)?;
        let int = if negative { -unsigned } else { unsigned };
        Ok(BigDecimal::new(int, scale))
    }
}

fn digit_string(d: &BigDecimal) -> (bool, String, i64) {
    let (int, scale) = d.as_bigint_and_exponent();
    let negative = int.sign() == Sign::Minus;
    let mut digits = int.to_string();
    if negative {
        digits.remove(0);
    }
    (negative, digits, scale)
}

fn bcd_len(ndigits: u32) -> u32 {
    ndigits / 2 + 1
}

/// Byte size of the encoded decimal, extension header included.
pub fn sizeof_decimal(d: &BigDecimal) -> u32 {
    let (_, digits, scale) = digit_string(d);
    let scale_len = if scale >= 0 {
        sizeof_uint(scale as u64)
    } else {
        sizeof_int(scale)
    };
    sizeof_ext(scale_len + bcd_len(digits.len() as u32))
}

/// Encode a decimal extension value.
pub fn encode_decimal(out: &mut Vec<u8>, d: &BigDecimal) {
    let (negative, digits, scale) = digit_string(d);
    let mut payload = Vec::with_capacity(digits.len() / 2 + 10);
    if scale >= 0 {
        encode_uint(&mut payload, scale as u64);
    } else {
        encode_int(&mut payload, scale);
    }
    let sign = if negative { SIGN_MINUS } else { SIGN_PLUS };
    let mut nibbles: Vec<u8> = Vec::with_capacity(digits.len() + 2);
    if digits.len() % 2 == 0 {
        // Digit count plus sign nibble must fill whole bytes.
        nibbles.push(0);
    }
    nibbles.extend(digits.bytes().map(|b| b - b'0'));
    nibbles.push(sign);
    for pair in nibbles.chunks(2) {
        payload.push(pair[0] << 4 | pair[1]);
    }
    encode_ext_header(out, DECIMAL_EXT_TAG, payload.len() as u32);
    out.extend_from_slice(&payload);
}
