//! A single update operation: decoding, argument reading, scalar execution
//! and result storage.
//!
//! The wire form is an array `[opcode, target, args...]`. Decoding borrows
//! everything from the expression buffer; nothing is copied until the
//! serializer writes the new tuple.

use crate::arith::{self, ArithError, ArithValue};
use crate::dict::FieldDictionary;
use crate::error::{FieldRef, UpdateError};
use crate::path::{unescape, Lexer, Token};
use tuple_mp::encode::{encode_str_header, encode_uint, sizeof_uint};
use tuple_mp::{Cursor, MpType};

pub(crate) const WILDCARD_IN_UPDATE: &str = "wildcard is not applicable to update operations";

/// Behavior family of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpGroup {
    Set,
    Insert,
    Delete,
    Arith,
    Bit,
    Splice,
}

/// Typed operation argument; arithmetic and bitwise arguments are replaced
/// by the computed result when the operation executes.
#[derive(Debug, PartialEq)]
pub(crate) enum OpArg<'a> {
    Value { value: &'a [u8] },
    Delete { count: u32 },
    Arith { value: ArithValue },
    Bit { value: u64 },
    Splice(SpliceArg<'a>),
}

#[derive(Debug, PartialEq)]
pub(crate) struct SpliceArg<'a> {
    pub offset: i32,
    pub cut_length: i32,
    pub paste: &'a [u8],
    /// Bytes of the old string before the cut; filled in by execution.
    pub head: &'a [u8],
    /// Bytes of the old string after the cut; filled in by execution.
    pub tail: &'a [u8],
}

/// The path step the operation is currently positioned at, kept for
/// diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum CurrentToken<'a> {
    FieldNo(i32),
    Key(&'a str),
}

#[derive(Debug, PartialEq)]
pub(crate) struct Op<'a> {
    pub opcode: char,
    pub group: OpGroup,
    /// Top-level target; negative means from the end of the tuple.
    pub field_no: i32,
    /// Remaining path below the top-level field.
    pub lexer: Lexer<'a>,
    pub current: CurrentToken<'a>,
    pub arg: OpArg<'a>,
    /// Encoded size of the field after this operation; set by decoding for
    /// set/insert, by execution for the scalar families.
    pub new_field_len: u32,
}

fn field_ref_of(current: CurrentToken<'_>, base: i32) -> FieldRef {
    match current {
        CurrentToken::FieldNo(n) if n >= 0 => FieldRef::No(n + base),
        CurrentToken::FieldNo(n) => FieldRef::No(n),
        CurrentToken::Key(k) => FieldRef::Name(unescape(k).into_owned()),
    }
}

impl<'a> Op<'a> {
    /// True when the path is exhausted and the op applies at the current
    /// position.
    pub fn is_term(&self) -> bool {
        self.lexer.is_eof()
    }

    pub fn set_current_no(&mut self, n: i32) {
        self.current = CurrentToken::FieldNo(n);
    }

    /// Pull the next path token, remembering it for diagnostics.
    pub fn consume_token(&mut self, base: i32) -> Result<Token<'a>, UpdateError> {
        match self.lexer.next_token() {
            Ok(Some((token, _))) => {
                match token {
                    Token::Num(i) => self.current = CurrentToken::FieldNo(i as i32),
                    Token::Key(k) => self.current = CurrentToken::Key(k),
                    Token::Any => {}
                }
                Ok(token)
            }
            Ok(None) => unreachable!("token requested past the end of the path"),
            Err(pos) => Err(UpdateError::BadJson {
                opcode: self.opcode,
                field: self.field_ref(base),
                pos,
            }),
        }
    }

    /// User-visible reference to the field this op is positioned at.
    pub fn field_ref(&self, base: i32) -> FieldRef {
        field_ref_of(self.current, base)
    }

    pub fn err_no_such_field(&self, base: i32) -> UpdateError {
        match self.current {
            CurrentToken::Key(k) => UpdateError::NoSuchFieldName(unescape(k).into_owned()),
            CurrentToken::FieldNo(n) if n >= 0 => UpdateError::NoSuchFieldNo(n + base),
            CurrentToken::FieldNo(n) => UpdateError::NoSuchFieldNo(n),
        }
    }

    pub fn err_double(&self, base: i32) -> UpdateError {
        UpdateError::DoubleUpdate {
            opcode: self.opcode,
            field: self.field_ref(base),
        }
    }

    pub fn err_arg_type(&self, base: i32, expected: &'static str) -> UpdateError {
        UpdateError::ArgType {
            opcode: self.opcode,
            field: self.field_ref(base),
            expected,
        }
    }

    pub fn err_bad_type(&self, base: i32, expected: &'static str) -> UpdateError {
        UpdateError::BadType {
            opcode: self.opcode,
            field: self.field_ref(base),
            expected,
        }
    }

    pub fn err_field(&self, base: i32, reason: &'static str) -> UpdateError {
        UpdateError::Field {
            opcode: self.opcode,
            field: self.field_ref(base),
            reason,
        }
    }

    /// Decode one operation from the expression buffer.
    pub fn decode<D: FieldDictionary>(
        cur: &mut Cursor<'a>,
        base: i32,
        dict: &D,
    ) -> Result<Op<'a>, UpdateError> {
        if cur.peek_type()? != MpType::Array {
            return Err(UpdateError::IllegalParams(
                "update operation must be an array {op,..}".into(),
            ));
        }
        let arg_count = cur.decode_array_len()?;
        if arg_count == 0 {
            return Err(UpdateError::IllegalParams(
                "update operation must be an array {op,..}, got empty array".into(),
            ));
        }
        if cur.peek_type()? != MpType::Str {
            return Err(UpdateError::IllegalParams(
                "update operation name must be a string".into(),
            ));
        }
        let name = cur.decode_str()?;
        let &[opcode] = name else {
            return Err(UpdateError::UnknownUpdateOp);
        };
        let opcode = opcode as char;
        let group = match opcode {
            '=' => OpGroup::Set,
            '!' => OpGroup::Insert,
            '#' => OpGroup::Delete,
            '+' | '-' => OpGroup::Arith,
            '&' | '|' | '^' => OpGroup::Bit,
            ':' => OpGroup::Splice,
            _ => return Err(UpdateError::UnknownUpdateOp),
        };
        let expected_args = if group == OpGroup::Splice { 5 } else { 3 };
        if arg_count != expected_args {
            return Err(UpdateError::UnknownUpdateOp);
        }

        let (field_no, lexer) = Self::decode_target(cur, opcode, base, dict)?;
        let current = CurrentToken::FieldNo(field_no);
        let mut op = Op {
            opcode,
            group,
            field_no,
            lexer,
            current,
            arg: OpArg::Delete { count: 0 },
            new_field_len: 0,
        };
        op.read_arg(cur, base)?;
        Ok(op)
    }

    fn decode_target<D: FieldDictionary>(
        cur: &mut Cursor<'a>,
        opcode: char,
        base: i32,
        dict: &D,
    ) -> Result<(i32, Lexer<'a>), UpdateError> {
        let arg_err = |expected| UpdateError::ArgType {
            opcode,
            field: FieldRef::No(base),
            expected,
        };
        match cur.peek_type()? {
            MpType::Uint => {
                let raw = cur.decode_uint()?;
                let raw = i64::try_from(raw).map_err(|_| arg_err("an integer"))?;
                Self::adjust_raw_target(raw, base).map(|n| (n, Lexer::empty(base)))
            }
            MpType::Int => {
                let raw = cur.decode_int()?;
                Self::adjust_raw_target(raw, base).map(|n| (n, Lexer::empty(base)))
            }
            MpType::Str => {
                let bytes = cur.decode_str()?;
                let target = core::str::from_utf8(bytes).map_err(|_| {
                    UpdateError::NoSuchFieldName(String::from_utf8_lossy(bytes).into_owned())
                })?;
                // A field may be named with dots and brackets in it; the
                // whole string wins over its interpretation as a path.
                if let Some(n) = dict.field_no(target) {
                    return Ok((n as i32, Lexer::empty(base)));
                }
                let mut lexer = Lexer::new(target, base);
                match lexer.next_token() {
                    Ok(Some((Token::Num(i), _))) => Ok((i as i32, lexer)),
                    Ok(Some((Token::Key(key), _))) => match dict.field_no(&unescape(key)) {
                        Some(n) => Ok((n as i32, lexer)),
                        None => Err(UpdateError::NoSuchFieldName(target.to_owned())),
                    },
                    Ok(Some((Token::Any, _))) => Err(UpdateError::Field {
                        opcode,
                        field: FieldRef::Name(target.to_owned()),
                        reason: WILDCARD_IN_UPDATE,
                    }),
                    Ok(None) | Err(_) => Err(UpdateError::NoSuchFieldName(target.to_owned())),
                }
            }
            _ => Err(UpdateError::IllegalParams(
                "field id must be a number or a string".into(),
            )),
        }
    }

    fn adjust_raw_target(raw: i64, base: i32) -> Result<i32, UpdateError> {
        let adjusted = raw - base as i64;
        if adjusted >= 0 {
            i32::try_from(adjusted).map_err(|_| UpdateError::NoSuchFieldNo(i32::MAX))
        } else if raw < 0 {
            i32::try_from(raw).map_err(|_| UpdateError::NoSuchFieldNo(i32::MIN))
        } else {
            // 0 with a 1-based client: no such field.
            Err(UpdateError::NoSuchFieldNo(raw as i32))
        }
    }

    fn read_arg(&mut self, cur: &mut Cursor<'a>, base: i32) -> Result<(), UpdateError> {
        match self.group {
            OpGroup::Set | OpGroup::Insert => {
                let mark = cur.pos();
                cur.skip_value()?;
                let value = cur.slice_since(mark);
                self.new_field_len = value.len() as u32;
                self.arg = OpArg::Value { value };
            }
            OpGroup::Delete => {
                if cur.peek_type()? != MpType::Uint {
                    return Err(self.err_arg_type(base, "a number of fields to delete"));
                }
                let count = cur.decode_uint()?;
                if count == 0 || count > u32::MAX as u64 {
                    return Err(self.err_arg_type(base, "a number of fields to delete"));
                }
                self.arg = OpArg::Delete {
                    count: count as u32,
                };
            }
            OpGroup::Arith => {
                let value =
                    ArithValue::read(cur)?.ok_or_else(|| self.err_arg_type(base, "a number"))?;
                self.arg = OpArg::Arith { value };
            }
            OpGroup::Bit => {
                if cur.peek_type()? != MpType::Uint {
                    return Err(self.err_arg_type(base, "a positive integer"));
                }
                let value = cur.decode_uint()?;
                self.arg = OpArg::Bit { value };
            }
            OpGroup::Splice => {
                let offset = self.read_i32(cur, base)?;
                let cut_length = self.read_i32(cur, base)?;
                if cur.peek_type()? != MpType::Str {
                    return Err(self.err_arg_type(base, "a string"));
                }
                let paste = cur.decode_str()?;
                self.arg = OpArg::Splice(SpliceArg {
                    offset,
                    cut_length,
                    paste,
                    head: &[],
                    tail: &[],
                });
            }
        }
        Ok(())
    }

    fn read_i32(&self, cur: &mut Cursor<'a>, base: i32) -> Result<i32, UpdateError> {
        let raw = match cur.peek_type()? {
            MpType::Uint => i64::try_from(cur.decode_uint()?).unwrap_or(i64::MAX),
            MpType::Int => cur.decode_int()?,
            _ => return Err(self.err_arg_type(base, "an integer")),
        };
        i32::try_from(raw).map_err(|_| self.err_arg_type(base, "an integer"))
    }

    /// Execute a scalar-family op against the old field bytes, computing the
    /// result and the new field size.
    pub fn execute_scalar(&mut self, old: &'a [u8], base: i32) -> Result<(), UpdateError> {
        match self.group {
            // The new value is the argument itself; nothing to compute.
            OpGroup::Set | OpGroup::Insert => Ok(()),
            OpGroup::Delete => unreachable!("delete is handled by the enclosing container"),
            OpGroup::Arith => {
                let mut cur = Cursor::new(old);
                let lhs = ArithValue::read(&mut cur)?
                    .ok_or_else(|| self.err_arg_type(base, "a number"))?;
                let OpArg::Arith { value: rhs } = &self.arg else {
                    unreachable!()
                };
                let result = arith::perform(&lhs, rhs, self.opcode).map_err(|e| match e {
                    ArithError::Overflow => UpdateError::IntegerOverflow {
                        opcode: self.opcode,
                        field: self.field_ref(base),
                    },
                    ArithError::NonFiniteDouble => {
                        self.err_arg_type(base, "a number convertible to a decimal")
                    }
                })?;
                self.new_field_len = result.sizeof();
                self.arg = OpArg::Arith { value: result };
                Ok(())
            }
            OpGroup::Bit => {
                let mut cur = Cursor::new(old);
                if cur.peek_type()? != MpType::Uint {
                    return Err(self.err_arg_type(base, "a positive integer"));
                }
                let old_value = cur.decode_uint()?;
                let OpArg::Bit { value } = &mut self.arg else {
                    unreachable!()
                };
                *value = match self.opcode {
                    '&' => old_value & *value,
                    '|' => old_value | *value,
                    '^' => old_value ^ *value,
                    _ => unreachable!(),
                };
                self.new_field_len = sizeof_uint(*value);
                Ok(())
            }
            OpGroup::Splice => {
                let field = self.field_ref(base);
                let opcode = self.opcode;
                let mut cur = Cursor::new(old);
                if cur.peek_type()? != MpType::Str {
                    return Err(UpdateError::ArgType {
                        opcode,
                        field,
                        expected: "a string",
                    });
                }
                let s = cur.decode_str()?;
                let str_len = s.len() as i64;
                let OpArg::Splice(arg) = &mut self.arg else {
                    unreachable!()
                };
                let mut offset = arg.offset as i64;
                if offset < 0 {
                    if -offset > str_len + 1 {
                        return Err(UpdateError::Splice {
                            field,
                            reason: "offset is out of bound",
                        });
                    }
                    offset += str_len + 1;
                } else if offset - base as i64 >= 0 {
                    offset -= base as i64;
                    if offset > str_len {
                        offset = str_len;
                    }
                } else {
                    return Err(UpdateError::Splice {
                        field,
                        reason: "offset is out of bound",
                    });
                }
                let mut cut = arg.cut_length as i64;
                if cut < 0 {
                    if -cut > str_len - offset {
                        cut = 0;
                    } else {
                        cut += str_len - offset;
                    }
                } else if cut > str_len - offset {
                    cut = str_len - offset;
                }
                arg.head = &s[..offset as usize];
                arg.tail = &s[(offset + cut) as usize..];
                self.new_field_len = tuple_mp::encode::sizeof_str(
                    (arg.head.len() + arg.paste.len() + arg.tail.len()) as u32,
                );
                Ok(())
            }
        }
    }

    /// Write the executed result; `execute_scalar` must have run for the
    /// arith/bit/splice families.
    pub fn store_scalar(&self, out: &mut Vec<u8>) {
        match &self.arg {
            OpArg::Value { value } => out.extend_from_slice(value),
            OpArg::Arith { value } => value.encode(out),
            OpArg::Bit { value } => encode_uint(out, *value),
            OpArg::Splice(arg) => {
                let len = arg.head.len() + arg.paste.len() + arg.tail.len();
                encode_str_header(out, len as u32);
                out.extend_from_slice(arg.head);
                out.extend_from_slice(arg.paste);
                out.extend_from_slice(arg.tail);
            }
            OpArg::Delete { .. } => unreachable!("delete stores nothing"),
        }
    }
}
