//! The embedded type dictionary of an HFA file.
//!
//! Every HFA file carries a textual grammar defining the structural types
//! used by its object tree. This module owns the parsed result: an arena of
//! [`TypeDef`]s keyed by name, supplemented by a fixed table of well-known
//! built-in types that writers commonly omit from the embedded grammar.
//!
//! # Submodules
//!
//! - [`grammar`]: parses the textual `{fields}name,` grammar
//! - [`value`]: decodes field values against a resolved type

pub mod grammar;
pub mod value;

use std::collections::HashMap;

use log::{debug, warn};

use super::error::Result;

/// Pointer marker on a field spec.
///
/// Pointer-kind fields are preceded at read time by two 32-bit control
/// words (element count and file offset).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    /// No pointer marker.
    None,
    /// `*`: count-prefixed array pointer.
    Array,
    /// `p`: simple/string pointer.
    Pointer,
}

/// One member of a [`TypeDef`].
#[derive(Debug, Clone)]
pub struct Field {
    pub item_count: u32,
    /// One of the ~18 primitive/composite item-type codes.
    pub item_type: char,
    pub pointer: PointerKind,
    /// Name of the nested type for `o`/`x` fields, resolved through the
    /// dictionary by name (the field never owns the referenced type).
    pub nested_type: Option<String>,
    /// Label list for `e` fields.
    pub enum_labels: Option<Vec<String>>,
    pub name: String,
    /// Fixed byte width, or `None` when the width is unknown/variable.
    /// Filled in by [`Dictionary::complete_all`].
    pub byte_count: Option<u32>,
}

/// A named, ordered list of fields.
#[derive(Debug, Clone)]
pub struct TypeDef {
    pub name: String,
    pub fields: Vec<Field>,
    /// Total fixed byte width, or `None` when any field width is
    /// unknown/variable or the sum overflows.
    pub byte_count: Option<u32>,
}

/// Width in bytes of one item of a primitive type code.
///
/// Returns 0 for variable-width codes (strings, raster blocks, nested
/// objects) and, permissively, for unknown codes.
pub fn item_size(code: char) -> u32 {
    match code {
        'c' | 'C' => 1,
        'e' | 's' | 'S' => 2,
        't' | 'l' | 'L' | 'f' => 4,
        'd' | 'm' => 8,
        'M' => 16,
        _ => 0,
    }
}

/// Field-list grammars for the well-known standard types, instantiated
/// into the dictionary on first lookup when the embedded grammar does not
/// define them.
const BUILTIN_TYPES: &[(&str, &str)] = &[
    ("Edsc_Table", "{1:lnumrows,}"),
    (
        "Edsc_Column",
        "{1:lnumRows,1:LcolumnDataPtr,1:e4:integer,real,complex,string,dataType,1:lmaxNumChars,}",
    ),
    (
        "Edsc_BinFunction",
        "{1:lnumBins,1:e4:direct,linear,logarithmic,explicit,binFunctionType,1:dminLimit,1:dmaxLimit,1:*bbinLimits,}",
    ),
    (
        "Eimg_StatisticsParameters830",
        "{1:*oEmif_String,LayerNames,1:*bExcludedValues,1:oEmif_String,AOIname,1:lSkipFactorX,1:lSkipFactorY,1:*oEdsc_BinFunction,BinFunction,}",
    ),
    (
        "Esta_Statistics",
        "{1:dminimum,1:dmaximum,1:dmean,1:dmedian,1:dmode,1:dstddev,}",
    ),
    ("Emif_String", "{0:pcstring,}"),
    (
        "Eprj_MapInfo",
        "{0:pcproName,1:*oEprj_Coordinate,upperLeftCenter,1:*oEprj_Coordinate,lowerRightCenter,1:*oEprj_Size,pixelSize,0:pcunits,}",
    ),
    ("Eprj_Coordinate", "{1:dx,1:dy,}"),
    ("Eprj_Size", "{1:dwidth,1:dheight,}"),
    (
        "Eprj_Spheroid",
        "{0:pcsphereName,1:da,1:db,1:deSquared,1:dradius,}",
    ),
    (
        "Eprj_Datum",
        "{0:pcdatumname,1:e3:EPRJ_DATUM_PARAMETRIC,EPRJ_DATUM_GRID,EPRJ_DATUM_REGRESSION,type,0:pdparams,0:pcgridname,}",
    ),
    (
        "Eprj_ProParameters",
        "{1:e2:EPRJ_INTERNAL,EPRJ_EXTERNAL,proType,1:lproNumber,0:pcproExeName,0:pcproName,1:lproZone,0:pdproParams,1:*oEprj_Spheroid,proSpheroid,}",
    ),
];

/// Size-completion state for one type, keyed by name.
///
/// `InProgress` is the explicit cycle guard: re-entering a type that is
/// still being completed resolves to "not yet resolvable" instead of
/// recursing.
enum SizeState {
    InProgress,
    Done(Option<u32>),
}

/// Ordered set of [`TypeDef`]s keyed by name, parsed once per file.
#[derive(Debug, Default)]
pub struct Dictionary {
    types: HashMap<String, TypeDef>,
    /// Counter for naming anonymous inline (`x`) types.
    inline_counter: u32,
}

impl Dictionary {
    /// Parse the embedded dictionary grammar and complete all byte sizes.
    pub fn parse(text: &[u8]) -> Result<Self> {
        let mut dict = Dictionary::default();
        grammar::parse_dictionary(text, &mut dict)?;
        dict.complete_all();
        debug!("Dictionary parsed: {} types", dict.types.len());
        Ok(dict)
    }

    pub fn insert(&mut self, def: TypeDef) {
        self.types.insert(def.name.clone(), def);
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub(crate) fn next_inline_name(&mut self) -> String {
        self.inline_counter += 1;
        format!("__inline_{}", self.inline_counter)
    }

    /// Look up a type by name, instantiating it from the built-in table on
    /// first use if the embedded grammar did not define it.
    pub fn find_type(&mut self, name: &str) -> Option<&TypeDef> {
        if !self.types.contains_key(name) {
            if !self.instantiate_builtin(name) {
                return None;
            }
            self.complete_all();
        }
        self.types.get(name)
    }

    /// Look up a type without triggering built-in instantiation.
    pub fn get(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    fn instantiate_builtin(&mut self, name: &str) -> bool {
        let Some((_, field_grammar)) = BUILTIN_TYPES.iter().find(|(n, _)| *n == name) else {
            return false;
        };
        match grammar::parse_standalone_field_list(field_grammar.as_bytes(), self) {
            Ok(fields) => {
                debug!("Instantiated built-in type {}", name);
                self.insert(TypeDef {
                    name: name.to_string(),
                    fields,
                    byte_count: None,
                });
                true
            }
            Err(e) => {
                // Built-in grammars are static; a failure here is a bug,
                // but lookup degrades to "type unknown" rather than aborting.
                warn!("Failed to instantiate built-in type {}: {}", name, e);
                false
            }
        }
    }

    /// Resolve every nested-type reference and compute byte sizes.
    ///
    /// Nested references to well-known names pull the built-in definition
    /// into the dictionary first. A type participating in a reference cycle
    /// completes with an unknown size.
    pub fn complete_all(&mut self) {
        // Pull in built-in dependencies until no reference is left dangling.
        loop {
            let missing: Vec<String> = self
                .types
                .values()
                .flat_map(|t| t.fields.iter().filter_map(|f| f.nested_type.clone()))
                .filter(|n| !self.types.contains_key(n.as_str()))
                .collect();
            let mut inserted = false;
            for name in missing {
                if self.instantiate_builtin(&name) {
                    inserted = true;
                }
            }
            if !inserted {
                break;
            }
        }

        let names: Vec<String> = self.types.keys().cloned().collect();
        let mut memo: HashMap<String, SizeState> = HashMap::new();
        for name in &names {
            size_of(&self.types, name, &mut memo);
        }

        // Write the computed sizes back onto the stored definitions.
        let sizes: HashMap<String, Option<u32>> = memo
            .into_iter()
            .map(|(name, state)| match state {
                SizeState::Done(s) => (name, s),
                SizeState::InProgress => (name, None),
            })
            .collect();
        for def in self.types.values_mut() {
            let mut total: Option<u32> = Some(0);
            for field in def.fields.iter_mut() {
                field.byte_count = field_size_with(field, &sizes);
                total = match (total, field.byte_count) {
                    (Some(a), Some(b)) => a.checked_add(b),
                    _ => None,
                };
            }
            def.byte_count = total;
        }
    }
}

/// Compute one type's total byte size with an explicit in-progress marker
/// guarding against self-referential type graphs.
fn size_of(
    types: &HashMap<String, TypeDef>,
    name: &str,
    memo: &mut HashMap<String, SizeState>,
) -> Option<u32> {
    match memo.get(name) {
        Some(SizeState::Done(s)) => return *s,
        Some(SizeState::InProgress) => {
            warn!("Type {} participates in a reference cycle", name);
            return None;
        }
        None => {}
    }
    memo.insert(name.to_string(), SizeState::InProgress);

    let size = match types.get(name) {
        None => None,
        Some(def) => {
            let mut total: Option<u32> = Some(0);
            for field in &def.fields {
                let fsize = field_size(field, types, memo);
                total = match (total, fsize) {
                    (Some(a), Some(b)) => a.checked_add(b),
                    _ => None,
                };
            }
            total
        }
    };
    memo.insert(name.to_string(), SizeState::Done(size));
    size
}

fn field_size(
    field: &Field,
    types: &HashMap<String, TypeDef>,
    memo: &mut HashMap<String, SizeState>,
) -> Option<u32> {
    if field.pointer != PointerKind::None {
        // Variable payload behind two control words.
        return None;
    }
    match field.item_type {
        'o' | 'x' => {
            let nested = field.nested_type.as_deref()?;
            let inner = size_of(types, nested, memo)?;
            field.item_count.checked_mul(inner)
        }
        'b' => None,
        code => field.item_count.checked_mul(item_size(code)),
    }
}

/// Same computation as [`field_size`], against already-finalized sizes.
fn field_size_with(field: &Field, sizes: &HashMap<String, Option<u32>>) -> Option<u32> {
    if field.pointer != PointerKind::None {
        return None;
    }
    match field.item_type {
        'o' | 'x' => {
            let nested = field.nested_type.as_deref()?;
            let inner = (*sizes.get(nested)?)?;
            field.item_count.checked_mul(inner)
        }
        'b' => None,
        code => field.item_count.checked_mul(item_size(code)),
    }
}
