//! Write-side encoders and their size calculators.
//!
//! Every `encode_*` appends the canonical (shortest) wire form to the output
//! buffer, and the matching `sizeof_*` returns exactly the byte count the
//! encoder will produce. The update engine relies on that equality to fill a
//! pre-sized buffer without reallocation.

/// Byte size of an unsigned integer value.
pub fn sizeof_uint(v: u64) -> u32 {
    match v {
        0..=0x7f => 1,
        0x80..=0xff => 2,
        0x100..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

/// Byte size of a negative integer value.
pub fn sizeof_int(v: i64) -> u32 {
    debug_assert!(v < 0);
    match v {
        -32..=-1 => 1,
        -128..=-33 => 2,
        -32768..=-129 => 3,
        -2_147_483_648..=-32769 => 5,
        _ => 9,
    }
}

pub fn sizeof_float() -> u32 {
    5
}

pub fn sizeof_double() -> u32 {
    9
}

/// Byte size of a string value of `len` bytes, header included.
pub fn sizeof_str(len: u32) -> u32 {
    str_header_len(len) + len
}

fn str_header_len(len: u32) -> u32 {
    match len {
        0..=31 => 1,
        32..=0xff => 2,
        0x100..=0xffff => 3,
        _ => 5,
    }
}

/// Byte size of an array header for `len` elements.
pub fn sizeof_array(len: u32) -> u32 {
    match len {
        0..=15 => 1,
        16..=0xffff => 3,
        _ => 5,
    }
}

/// Byte size of a map header for `len` pairs.
pub fn sizeof_map(len: u32) -> u32 {
    sizeof_array(len)
}

/// Byte size of an extension value with a `payload`-byte body, header and
/// tag included.
pub fn sizeof_ext(payload: u32) -> u32 {
    match payload {
        1 | 2 | 4 | 8 | 16 => 2 + payload,
        0..=0xff => 3 + payload,
        0x100..=0xffff => 4 + payload,
        _ => 6 + payload,
    }
}

pub fn encode_nil(out: &mut Vec<u8>) {
    out.push(0xc0);
}

pub fn encode_bool(out: &mut Vec<u8>, v: bool) {
    out.push(if v { 0xc3 } else { 0xc2 });
}

pub fn encode_uint(out: &mut Vec<u8>, v: u64) {
    match v {
        0..=0x7f => out.push(v as u8),
        0x80..=0xff => {
            out.push(0xcc);
            out.push(v as u8);
        }
        0x100..=0xffff => {
            out.push(0xcd);
            out.extend_from_slice(&(v as u16).to_be_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push(0xce);
            out.extend_from_slice(&(v as u32).to_be_bytes());
        }
        _ => {
            out.push(0xcf);
            out.extend_from_slice(&v.to_be_bytes());
        }
    }
}

/// Encode a negative integer. Non-negative values belong to
/// [`encode_uint`].
pub fn encode_int(out: &mut Vec<u8>, v: i64) {
    debug_assert!(v < 0);
    match v {
        -32..=-1 => out.push(v as u8),
        -128..=-33 => {
            out.push(0xd0);
            out.push(v as u8);
        }
        -32768..=-129 => {
            out.push(0xd1);
            out.extend_from_slice(&(v as i16).to_be_bytes());
        }
        -2_147_483_648..=-32769 => {
            out.push(0xd2);
            out.extend_from_slice(&(v as i32).to_be_bytes());
        }
        _ => {
            out.push(0xd3);
            out.extend_from_slice(&v.to_be_bytes());
        }
    }
}

pub fn encode_float(out: &mut Vec<u8>, v: f32) {
    out.push(0xca);
    out.extend_from_slice(&v.to_bits().to_be_bytes());
}

pub fn encode_double(out: &mut Vec<u8>, v: f64) {
    out.push(0xcb);
    out.extend_from_slice(&v.to_bits().to_be_bytes());
}

/// Encode a string header for `len` bytes of content; the caller appends
/// the content itself.
pub fn encode_str_header(out: &mut Vec<u8>, len: u32) {
    match len {
        0..=31 => out.push(0xa0 | len as u8),
        32..=0xff => {
            out.push(0xd9);
            out.push(len as u8);
        }
        0x100..=0xffff => {
            out.push(0xda);
            out.extend_from_slice(&(len as u16).to_be_bytes());
        }
        _ => {
            out.push(0xdb);
            out.extend_from_slice(&len.to_be_bytes());
        }
    }
}

pub fn encode_str(out: &mut Vec<u8>, s: &[u8]) {
    encode_str_header(out, s.len() as u32);
    out.extend_from_slice(s);
}

pub fn encode_array_header(out: &mut Vec<u8>, len: u32) {
    match len {
        0..=15 => out.push(0x90 | len as u8),
        16..=0xffff => {
            out.push(0xdc);
            out.extend_from_slice(&(len as u16).to_be_bytes());
        }
        _ => {
            out.push(0xdd);
            out.extend_from_slice(&len.to_be_bytes());
        }
    }
}

pub fn encode_map_header(out: &mut Vec<u8>, len: u32) {
    match len {
        0..=15 => out.push(0x80 | len as u8),
        16..=0xffff => {
            out.push(0xde);
            out.extend_from_slice(&(len as u16).to_be_bytes());
        }
        _ => {
            out.push(0xdf);
            out.extend_from_slice(&len.to_be_bytes());
        }
    }
}

/// Encode an extension header (marker, length, tag); the caller appends the
/// payload.
pub fn encode_ext_header(out: &mut Vec<u8>, tag: i8, payload: u32) {
    match payload {
        1 => out.push(0xd4),
        2 => out.push(0xd5),
        4 => out.push(0xd6),
        8 => out.push(0xd7),
        16 => out.push(0xd8),
        0..=0xff => {
            out.push(0xc7);
            out.push(payload as u8);
        }
        0x100..=0xffff => {
            out.push(0xc8);
            out.extend_from_slice(&(payload as u16).to_be_bytes());
        }
        _ => {
            out.push(0xc9);
            out.extend_from_slice(&payload.to_be_bytes());
        }
    }
    out.push(tag as u8);
}
