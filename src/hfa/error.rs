//! Custom error types for the hfa-reader crate.

use thiserror::Error;

/// The primary error type for all operations in this crate.
#[derive(Debug, Error)]
pub enum HfaError {
    /// An error originating from I/O operations.
    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    /// An error originating from the zip container layer.
    #[error("Zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// The file does not start with the HFA magic tag.
    #[error("Bad magic tag: expected \"EHFA_HEADER_TAG\", got {found:?}")]
    BadMagic { found: String },

    /// The embedded type dictionary could not be parsed.
    #[error("Dictionary grammar error at byte {position}: {message}")]
    DictionaryParse { position: usize, message: String },

    /// The file is structurally invalid or does not conform to the HFA format.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// A required entry is missing from the file's object tree.
    #[error("Missing required entry: {0}")]
    MissingEntry(&'static str),

    /// A band declares grid dimensions that differ from the first band's.
    #[error("Band {band} grid {found_width}x{found_height} does not match {expected_width}x{expected_height}")]
    GridMismatch {
        band: usize,
        expected_width: u32,
        expected_height: u32,
        found_width: u32,
        found_height: u32,
    },

    /// A raster block uses a compression scheme this reader does not decode.
    #[error("Unsupported block compression: {0:?}")]
    UnsupportedCompression(String),

    /// A pixel type this reader does not decode (sub-byte packed variants).
    #[error("Unsupported pixel type: {0:?}")]
    UnsupportedPixelType(String),

    /// A datum/projection combination outside the supported whitelist.
    #[error("Unsupported projection: datum {datum:?}, projection number {projection}")]
    UnsupportedProjection { datum: String, projection: i64 },

    /// The layer stores its raster in an external file (ExternalRasterDMS).
    #[error("Externally stored raster data (ExternalRasterDMS) is not supported")]
    ExternalRaster,

    /// The expected raster member was not found inside a zip container.
    #[error("No raster member {0:?} in zip archive")]
    MissingArchiveMember(String),

    /// The file declares no raster bands.
    #[error("No raster bands found")]
    NoBands,

    /// An operation was attempted on a closed reader.
    #[error("Reader is closed")]
    Closed,
}

/// A convenience `Result` type alias using the crate's [`HfaError`] type.
pub type Result<T> = std::result::Result<T, HfaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HfaError::BadMagic {
            found: "GARBAGE".to_string(),
        };
        assert!(err.to_string().contains("EHFA_HEADER_TAG"));

        let err = HfaError::GridMismatch {
            band: 2,
            expected_width: 64,
            expected_height: 64,
            found_width: 32,
            found_height: 64,
        };
        assert!(err.to_string().contains("32x64"));

        let err = HfaError::UnsupportedCompression("ESRI GRID compression".to_string());
        assert!(err.to_string().contains("ESRI GRID"));
    }
}
