//! Msgpack value builder shared by the integration tests.
#![allow(dead_code)]

use bigdecimal::BigDecimal;
use std::str::FromStr;
use tuple_mp::decimal::encode_decimal;
use tuple_mp::encode::*;

#[derive(Debug, Clone)]
pub enum Val {
    U(u64),
    I(i64),
    F(f32),
    D(f64),
    S(String),
    Dec(&'static str),
    A(Vec<Val>),
    M(Vec<(&'static str, Val)>),
    Nil,
    B(bool),
}

pub fn u(v: u64) -> Val {
    Val::U(v)
}

pub fn i(v: i64) -> Val {
    Val::I(v)
}

pub fn d(v: f64) -> Val {
    Val::D(v)
}

pub fn s(v: &str) -> Val {
    Val::S(v.to_owned())
}

pub fn a(items: Vec<Val>) -> Val {
    Val::A(items)
}

pub fn m(pairs: Vec<(&'static str, Val)>) -> Val {
    Val::M(pairs)
}

impl Val {
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Val::U(v) => encode_uint(out, *v),
            Val::I(v) => {
                if *v >= 0 {
                    encode_uint(out, *v as u64);
                } else {
                    encode_int(out, *v);
                }
            }
            Val::F(v) => encode_float(out, *v),
            Val::D(v) => encode_double(out, *v),
            Val::S(v) => encode_str(out, v.as_bytes()),
            Val::Dec(v) => encode_decimal(out, &BigDecimal::from_str(v).unwrap()),
            Val::A(items) => {
                encode_array_header(out, items.len() as u32);
                for item in items {
                    item.encode_into(out);
                }
            }
            Val::M(pairs) => {
                encode_map_header(out, pairs.len() as u32);
                for (k, v) in pairs {
                    encode_str(out, k.as_bytes());
                    v.encode_into(out);
                }
            }
            Val::Nil => encode_nil(out),
            Val::B(v) => encode_bool(out, *v),
        }
    }
}

pub fn enc(v: &Val) -> Vec<u8> {
    let mut out = Vec::new();
    v.encode_into(&mut out);
    out
}

/// Encode a tuple from its fields.
pub fn tuple(fields: Vec<Val>) -> Vec<u8> {
    enc(&Val::A(fields))
}

/// Encode an operation list.
pub fn ops(list: Vec<Val>) -> Vec<u8> {
    enc(&Val::A(list))
}
