//! Parser for the textual type grammar embedded in every HFA file.
//!
//! The dictionary section is a character stream of `{fieldList}typeName,`
//! groups terminated by `.` (or NUL). Each field spec follows
//! `itemCount ':' ['*'|'p'] itemTypeChar [enumSpec|nestedName] fieldName ','`:
//!
//! - `*` marks a count-prefixed array pointer, `p` a simple/string pointer
//! - `o` is followed by the comma-terminated name of a nested type
//! - `x` is followed by an anonymous nested type defined inline in braces
//! - `e` is followed by a label count, `:`, and that many comma-terminated
//!   labels

use super::{Dictionary, Field, PointerKind, TypeDef};
use crate::hfa::error::{HfaError, Result};

struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Scanner { bytes, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn expect(&mut self, expected: u8) -> Result<()> {
        match self.bump() {
            Some(b) if b == expected => Ok(()),
            Some(b) => Err(self.error(format!(
                "expected {:?}, got {:?}",
                expected as char, b as char
            ))),
            None => Err(self.error(format!(
                "expected {:?}, got end of dictionary",
                expected as char
            ))),
        }
    }

    /// Read a decimal number; at least one digit is required.
    fn number(&mut self) -> Result<u32> {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected a number".to_string()));
        }
        let mut value: u32 = 0;
        for &b in &self.bytes[start..self.pos] {
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add((b - b'0') as u32))
                .ok_or_else(|| self.error("number out of range".to_string()))?;
        }
        Ok(value)
    }

    /// Read a token terminated by `,`, consuming the terminator.
    fn token(&mut self) -> Result<String> {
        let start = self.pos;
        loop {
            match self.peek() {
                Some(b',') => {
                    let token = self.bytes[start..self.pos]
                        .iter()
                        .map(|&b| b as char)
                        .collect();
                    self.pos += 1;
                    return Ok(token);
                }
                Some(b'}') | Some(b'{') | None => {
                    return Err(self.error("unterminated token".to_string()));
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    fn error(&self, message: String) -> HfaError {
        HfaError::DictionaryParse {
            position: self.pos,
            message,
        }
    }
}

/// Parse the full dictionary section into `dict`.
pub fn parse_dictionary(text: &[u8], dict: &mut Dictionary) -> Result<()> {
    let mut scanner = Scanner::new(text);
    loop {
        match scanner.peek() {
            Some(b'.') | Some(0) | None => return Ok(()),
            Some(b'{') => {}
            Some(b) => {
                return Err(scanner.error(format!("expected '{{' or '.', got {:?}", b as char)))
            }
        }
        let fields = parse_fields(&mut scanner, dict)?;
        let name = scanner.token()?;
        dict.insert(TypeDef {
            name,
            fields,
            byte_count: None,
        });
    }
}

/// Parse a standalone brace-enclosed field list (used for the built-in
/// type table).
pub fn parse_standalone_field_list(text: &[u8], dict: &mut Dictionary) -> Result<Vec<Field>> {
    let mut scanner = Scanner::new(text);
    parse_fields(&mut scanner, dict)
}

/// Parse `{ field* }`, including recursion into inline `x{...}` types.
fn parse_fields(scanner: &mut Scanner, dict: &mut Dictionary) -> Result<Vec<Field>> {
    scanner.expect(b'{')?;
    let mut fields = Vec::new();
    loop {
        match scanner.peek() {
            Some(b'}') => {
                scanner.pos += 1;
                return Ok(fields);
            }
            None => return Err(scanner.error("unterminated field list".to_string())),
            Some(_) => fields.push(parse_field(scanner, dict)?),
        }
    }
}

fn parse_field(scanner: &mut Scanner, dict: &mut Dictionary) -> Result<Field> {
    let item_count = scanner.number()?;
    scanner.expect(b':')?;

    let pointer = match scanner.peek() {
        Some(b'*') => {
            scanner.pos += 1;
            PointerKind::Array
        }
        Some(b'p') => {
            scanner.pos += 1;
            PointerKind::Pointer
        }
        _ => PointerKind::None,
    };

    let item_type = match scanner.bump() {
        Some(b) if b.is_ascii_graphic() && !matches!(b, b'{' | b'}' | b',' | b':') => b as char,
        Some(b) => {
            return Err(scanner.error(format!("malformed item type character {:?}", b as char)))
        }
        None => return Err(scanner.error("expected an item type character".to_string())),
    };

    let mut nested_type = None;
    let mut enum_labels = None;
    match item_type {
        'o' => {
            nested_type = Some(scanner.token()?);
        }
        'x' => {
            // Anonymous inline type; register it under a generated name so
            // the field can reference it like any named type.
            let inline_fields = parse_fields(scanner, dict)?;
            let name = dict.next_inline_name();
            dict.insert(TypeDef {
                name: name.clone(),
                fields: inline_fields,
                byte_count: None,
            });
            nested_type = Some(name);
        }
        'e' => {
            let label_count = scanner.number()?;
            scanner.expect(b':')?;
            let mut labels = Vec::with_capacity(label_count as usize);
            for _ in 0..label_count {
                labels.push(scanner.token()?);
            }
            enum_labels = Some(labels);
        }
        _ => {}
    }

    let name = scanner.token()?;
    Ok(Field {
        item_count,
        item_type,
        pointer,
        nested_type,
        enum_labels,
        name,
        byte_count: None,
    })
}
