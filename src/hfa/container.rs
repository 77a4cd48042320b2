//! Container unwrapping: zip/gzip membership and sibling `.prj` lookup.
//!
//! The decode core works over an already-fetched byte buffer; this layer
//! resolves a filesystem path into that buffer plus the optional WKT
//! projection text found alongside it.

use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::bufread::GzDecoder;
use log::info;
use zip::ZipArchive;

use super::error::{HfaError, Result};

/// An unwrapped raster plus the sibling projection text, if any.
#[derive(Debug)]
pub struct RasterSource {
    pub data: Vec<u8>,
    pub projection_wkt: Option<String>,
}

/// Resolve `path` by extension: `.zip` and `.gz` containers are unwrapped,
/// anything else is read directly. In every case a `<basename>.prj` WKT
/// sibling is consulted.
pub fn resolve(path: &Path) -> Result<RasterSource> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("zip") => from_zip(path),
        Some("gz") => from_gzip(path),
        _ => from_plain(path),
    }
}

fn from_plain(path: &Path) -> Result<RasterSource> {
    info!("Opening raster file: {}", path.display());
    let data = fs::read(path)?;
    let projection_wkt = sibling_prj(&path.with_extension("prj"));
    Ok(RasterSource {
        data,
        projection_wkt,
    })
}

fn from_gzip(path: &Path) -> Result<RasterSource> {
    info!("Opening gzip-wrapped raster: {}", path.display());
    let file = File::open(path)?;
    let mut decoder = GzDecoder::new(BufReader::new(file));
    let mut data = Vec::new();
    decoder.read_to_end(&mut data)?;

    // Sibling lookup against the decompressed base name:
    // dem.img.gz -> dem.img -> dem.prj
    let base = path.with_extension("");
    let projection_wkt = sibling_prj(&base.with_extension("prj"));
    Ok(RasterSource {
        data,
        projection_wkt,
    })
}

fn from_zip(path: &Path) -> Result<RasterSource> {
    info!("Opening zip-wrapped raster: {}", path.display());
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file)?;
    let names: Vec<String> = archive.file_names().map(String::from).collect();

    // The raster member shares the archive's base name; fall back to the
    // first non-.prj member.
    let raster_name = names
        .iter()
        .find(|n| {
            let lower = n.to_ascii_lowercase();
            lower == format!("{}.img", stem) || lower == stem
        })
        .or_else(|| {
            names
                .iter()
                .find(|n| !n.to_ascii_lowercase().ends_with(".prj"))
        })
        .cloned()
        .ok_or_else(|| HfaError::MissingArchiveMember(format!("{}.img", stem)))?;
    let mut data = Vec::new();
    archive.by_name(&raster_name)?.read_to_end(&mut data)?;

    let prj_name = names
        .iter()
        .find(|n| {
            let lower = n.to_ascii_lowercase();
            lower == format!("{}.prj", stem) || lower.ends_with(".prj")
        })
        .cloned();
    let projection_wkt = match prj_name {
        Some(name) => {
            let mut wkt = String::new();
            archive.by_name(&name)?.read_to_string(&mut wkt)?;
            info!("Found projection member {:?}", name);
            Some(wkt.trim().to_string())
        }
        None => None,
    };
    Ok(RasterSource {
        data,
        projection_wkt,
    })
}

fn sibling_prj(path: &Path) -> Option<String> {
    let wkt = fs::read_to_string(path).ok()?;
    info!("Found projection sibling {}", path.display());
    Some(wkt.trim().to_string())
}
