//! On-demand decoding of field values against resolved types.
//!
//! An entry's data blob is decoded field-by-field in declared order into a
//! name → [`Value`] mapping. Values are scalars, strings, nested mappings,
//! ordered lists, or 2-D raster data blocks; anything the format can
//! express but this reader does not decode comes back as [`Value::Null`].

use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};

use log::warn;

use super::{Dictionary, Field, PointerKind, item_size};
use crate::hfa::cursor;
use crate::hfa::error::{HfaError, Result};

/// A decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
    Block(RasterData),
}

/// A decoded 2-D data block (`b` fields: bin limits, excluded values, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct RasterData {
    pub width: u32,
    pub height: u32,
    /// Base element type code as stored on disk.
    pub base_type: u16,
    /// Row-major cells, widened to f64.
    pub cells: Vec<f64>,
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Map(v) => Some(v),
            _ => None,
        }
    }
}

/// Decoded field values of one entry.
pub type FieldValues = HashMap<String, Value>;

/// Resolve a dotted/indexed path like `"pixelSize.width"` or
/// `"blockinfo[2].offset"` through a decoded value mapping.
pub fn lookup<'a>(values: &'a FieldValues, path: &str) -> Option<&'a Value> {
    let mut current: Option<&Value> = None;
    for segment in path.split('.') {
        let (name, index) = match segment.find('[') {
            Some(open) => {
                let close = segment.rfind(']')?;
                let idx: usize = segment[open + 1..close].parse().ok()?;
                (&segment[..open], Some(idx))
            }
            None => (segment, None),
        };
        let map = match current {
            None => values,
            Some(Value::Map(map)) => map,
            Some(_) => return None,
        };
        let mut value = map.get(name)?;
        if let Some(idx) = index {
            value = value.as_list()?.get(idx)?;
        }
        current = Some(value);
    }
    current
}

/// Decode every field of `type_name` in declared order from the cursor's
/// current position.
pub fn decode_type<R: Read + Seek>(
    cur: &mut R,
    dict: &mut Dictionary,
    type_name: &str,
) -> Result<FieldValues> {
    let def = match dict.find_type(type_name) {
        Some(def) => def.clone(),
        None => {
            warn!("Unknown type {:?}; no fields decoded", type_name);
            return Ok(FieldValues::new());
        }
    };
    let mut values = FieldValues::with_capacity(def.fields.len());
    for field in &def.fields {
        let value = read_value(field, cur, dict)?;
        values.insert(field.name.clone(), value);
    }
    Ok(values)
}

/// Decode one field value from the cursor's current position.
pub fn read_value<R: Read + Seek>(
    field: &Field,
    cur: &mut R,
    dict: &mut Dictionary,
) -> Result<Value> {
    // Pointer-kind fields carry two leading control words; the first is an
    // element count (or byte length for strings), the second a file offset
    // that in-line data never uses.
    let pointer_count = match field.pointer {
        PointerKind::None => None,
        PointerKind::Array | PointerKind::Pointer => {
            let count = cursor::read_u32(cur)?;
            let _offset = cursor::read_u32(cur)?;
            Some(count)
        }
    };
    let repeat = pointer_count.unwrap_or(field.item_count);

    match field.item_type {
        'c' | 'C' => Ok(Value::Str(cursor::read_fixed_string(cur, repeat as usize)?)),
        'e' => {
            let labels = field.enum_labels.as_deref().unwrap_or(&[]);
            read_repeated(repeat, || {
                let index = cursor::read_u16(cur)? as usize;
                // An out-of-range index is data we cannot label, not an error.
                Ok(match labels.get(index) {
                    Some(label) => Value::Str(label.clone()),
                    None => Value::Null,
                })
            })
        }
        's' => read_repeated(repeat, || Ok(Value::Int(cursor::read_u16(cur)? as i64))),
        'S' => read_repeated(repeat, || Ok(Value::Int(cursor::read_i16(cur)? as i64))),
        't' | 'l' => read_repeated(repeat, || Ok(Value::Int(cursor::read_u32(cur)? as i64))),
        'L' => read_repeated(repeat, || Ok(Value::Int(cursor::read_i32(cur)? as i64))),
        'f' => read_repeated(repeat, || Ok(Value::Float(cursor::read_f32(cur)? as f64))),
        'd' => read_repeated(repeat, || Ok(Value::Float(cursor::read_f64(cur)?))),
        'b' => read_block(cur),
        'o' | 'x' => {
            let Some(nested) = field.nested_type.as_deref() else {
                return Ok(Value::Null);
            };
            if dict.find_type(nested).is_none() {
                warn!("Field {:?} references unknown type {:?}", field.name, nested);
                return Ok(Value::Null);
            }
            let nested = nested.to_string();
            match field.pointer {
                // An array pointer holds exactly one in-line instance.
                PointerKind::Array => Ok(Value::Map(decode_type(cur, dict, &nested)?)),
                // A repeat-count pointer holds `count` consecutive instances.
                PointerKind::Pointer => {
                    let mut items = Vec::with_capacity(repeat as usize);
                    for _ in 0..repeat {
                        items.push(Value::Map(decode_type(cur, dict, &nested)?));
                    }
                    Ok(Value::List(items))
                }
                PointerKind::None => {
                    let mut items = Vec::with_capacity(field.item_count as usize);
                    for _ in 0..field.item_count {
                        items.push(Value::Map(decode_type(cur, dict, &nested)?));
                    }
                    Ok(collapse_single(items))
                }
            }
        }
        code => {
            // Recognized-but-undecoded and unknown codes yield null; skip
            // their declared width to keep subsequent fields aligned.
            let skip = repeat as i64 * item_size(code) as i64;
            if skip > 0 {
                cur.seek(SeekFrom::Current(skip))?;
            }
            Ok(Value::Null)
        }
    }
}

fn read_repeated(
    repeat: u32,
    mut read_one: impl FnMut() -> Result<Value>,
) -> Result<Value> {
    let mut items = Vec::with_capacity(repeat as usize);
    for _ in 0..repeat {
        items.push(read_one()?);
    }
    Ok(collapse_single(items))
}

fn collapse_single(mut items: Vec<Value>) -> Value {
    match items.len() {
        0 => Value::Null,
        1 => items.pop().unwrap_or(Value::Null),
        _ => Value::List(items),
    }
}

/// Base element type codes of data blocks.
const BASE_U1: u16 = 0;
const BASE_U2: u16 = 1;
const BASE_U4: u16 = 2;

fn read_block<R: Read + Seek>(cur: &mut R) -> Result<Value> {
    let height = cursor::read_i32(cur)?;
    let width = cursor::read_i32(cur)?;
    let base_type = cursor::read_u16(cur)?;
    let _reserved = cursor::read_u16(cur)?;

    if height < 0 || width < 0 {
        return Err(HfaError::InvalidFormat(format!(
            "Data block with negative dimensions {}x{}",
            width, height
        )));
    }
    let (width, height) = (width as u32, height as u32);
    let count = (width as usize) * (height as usize);

    let mut cells = Vec::with_capacity(count);
    for _ in 0..count {
        let cell = match base_type {
            BASE_U1 => return Err(HfaError::UnsupportedPixelType("u1".to_string())),
            BASE_U2 => return Err(HfaError::UnsupportedPixelType("u2".to_string())),
            BASE_U4 => return Err(HfaError::UnsupportedPixelType("u4".to_string())),
            3 => {
                let mut b = [0u8; 1];
                cur.read_exact(&mut b)?;
                b[0] as f64
            }
            4 => {
                let mut b = [0u8; 1];
                cur.read_exact(&mut b)?;
                b[0] as i8 as f64
            }
            5 => cursor::read_u16(cur)? as f64,
            6 => cursor::read_i16(cur)? as f64,
            7 => cursor::read_u32(cur)? as f64,
            8 => cursor::read_i32(cur)? as f64,
            9 => cursor::read_f32(cur)? as f64,
            10 => cursor::read_f64(cur)?,
            other => {
                return Err(HfaError::InvalidFormat(format!(
                    "Unknown data block base type code {}",
                    other
                )))
            }
        };
        cells.push(cell);
    }
    Ok(Value::Block(RasterData {
        width,
        height,
        base_type,
        cells,
    }))
}
