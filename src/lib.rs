//! # hfa-reader
//!
//! A reader for Erdas Imagine HFA/IMG raster containers, decoding the
//! first raster band into an in-memory gridded elevation model.
//!
//! The format is self-describing: a textual dictionary of structured types
//! is embedded in the file and used to interpret its tree of dynamically
//! typed entries. This crate parses that dictionary, walks the entry tree,
//! and reassembles block-tiled cell data into a full grid, along with
//! georeferencing (map info or a restricted affine transform) and a
//! narrow NAD83 projection whitelist.
//!
//! **Note:** compressed raster blocks, sub-byte packed pixel types, and
//! datums other than NAD83 are explicit unsupported-feature errors.
pub mod hfa;

// Re-export the main types for convenience
pub use hfa::{
    band::{Band, BlockInfo, PixelType},
    dictionary::value::{lookup, Value},
    open, BoundingBox, Crs, GriddedElevationModel, HfaError, HfaReader, Result,
};
