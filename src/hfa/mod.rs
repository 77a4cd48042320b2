//! Core HFA/IMG reader module

pub mod band;
mod container;
mod cursor;
pub mod dictionary;
pub mod entry;
pub mod error;
pub mod georef;
pub mod projection;
pub mod reader;

use std::path::Path;

pub use error::{HfaError, Result};
pub use georef::BoundingBox;
pub use projection::Crs;
pub use reader::{GriddedElevationModel, HfaReader};

/// Open an HFA/IMG raster, unwrapping `.zip`/`.gz` containers and picking
/// up a sibling `.prj` file when present.
pub fn open(path: impl AsRef<Path>) -> Result<HfaReader> {
    HfaReader::open(path)
}

/// An explicit compute-once cell.
///
/// Distinguishes "not yet computed" from every computed value, so lazily
/// memoized state (child links, field values, block indices, grids) is
/// never confused with an absent result.
#[derive(Debug)]
pub(crate) enum Lazy<T> {
    Unresolved,
    Resolved(T),
}

impl<T> Lazy<T> {
    pub(crate) fn get(&self) -> Option<&T> {
        match self {
            Lazy::Resolved(value) => Some(value),
            Lazy::Unresolved => None,
        }
    }

    /// Store `value` and return a reference to it.
    pub(crate) fn set(&mut self, value: T) -> &T {
        *self = Lazy::Resolved(value);
        match self {
            Lazy::Resolved(value) => value,
            Lazy::Unresolved => unreachable!(),
        }
    }
}
