//! The main reader for HFA/IMG raster files.
//!
//! Orchestrates container unwrapping, header and dictionary parsing, band
//! discovery, georeferencing, and projection resolution. Parsing is lazy:
//! opening a reader only resolves the container; the first call to
//! [`HfaReader::read`], [`HfaReader::bounding_box`] or a metadata accessor
//! decodes the header, dictionary, entry tree, and band list.

use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use log::{debug, info};

use super::band::Band;
use super::container;
use super::cursor;
use super::dictionary::value::Value;
use super::dictionary::Dictionary;
use super::entry::EntryTree;
use super::error::{HfaError, Result};
use super::georef::{self, BoundingBox, Georef};
use super::projection::{self, Crs};
use super::Lazy;

const MAGIC: &[u8; 16] = b"EHFA_HEADER_TAG\0";

/// A fully assembled elevation grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GriddedElevationModel {
    pub width: u32,
    pub height: u32,
    pub cell_size: (f64, f64),
    pub bounding_box: BoundingBox,
    /// Row-major cells, top row first.
    pub cells: Vec<f32>,
}

/// Everything decoded from the header on first access.
#[derive(Debug)]
struct Decoded {
    dictionary: Dictionary,
    tree: EntryTree,
    bands: Vec<Band>,
    georef: Option<Georef>,
    crs: Option<Crs>,
}

/// The main reader for HFA/IMG raster files.
#[derive(Debug)]
pub struct HfaReader {
    /// `None` once the reader has been closed.
    cursor: Option<Cursor<Vec<u8>>>,
    projection_wkt: Option<String>,
    decoded: Lazy<Decoded>,
}

impl HfaReader {
    /// Open a raster from the filesystem, unwrapping `.zip`/`.gz`
    /// containers and picking up a sibling `.prj` WKT file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let source = container::resolve(path.as_ref())?;
        Ok(Self::from_bytes(source.data, source.projection_wkt))
    }

    /// Decode an already-fetched byte buffer, optionally with external
    /// projection WKT that takes priority over internal metadata.
    pub fn from_bytes(data: Vec<u8>, projection_wkt: Option<String>) -> Self {
        HfaReader {
            cursor: Some(Cursor::new(data)),
            projection_wkt,
            decoded: Lazy::Unresolved,
        }
    }

    /// Assemble the first band into a full elevation grid.
    pub fn read(&mut self) -> Result<GriddedElevationModel> {
        self.ensure_ready()?;
        let (cur, decoded) = self.parts()?;
        let Some(band) = decoded.bands.first_mut() else {
            return Err(HfaError::NoBands);
        };
        let cells = band
            .gridded_cells(cur, &mut decoded.tree, &mut decoded.dictionary)?
            .to_vec();
        let (width, height) = (band.grid_width, band.grid_height);
        Ok(GriddedElevationModel {
            width,
            height,
            cell_size: cell_size_of(decoded.georef.as_ref()),
            bounding_box: bounding_box_of(decoded.georef.as_ref(), width, height),
            cells,
        })
    }

    /// The georeferenced extent, or the raw pixel-space extent when no
    /// georeferencing was found.
    pub fn bounding_box(&mut self) -> Result<BoundingBox> {
        self.ensure_ready()?;
        let (_, decoded) = self.parts()?;
        let (width, height) = match decoded.bands.first() {
            Some(band) => (band.grid_width, band.grid_height),
            None => (0, 0),
        };
        Ok(bounding_box_of(decoded.georef.as_ref(), width, height))
    }

    pub fn coordinate_reference_system(&mut self) -> Result<Option<Crs>> {
        self.ensure_ready()?;
        Ok(self.parts()?.1.crs.clone())
    }

    pub fn pixel_size_width(&mut self) -> Result<f64> {
        self.ensure_ready()?;
        Ok(cell_size_of(self.parts()?.1.georef.as_ref()).0)
    }

    pub fn pixel_size_height(&mut self) -> Result<f64> {
        self.ensure_ready()?;
        Ok(cell_size_of(self.parts()?.1.georef.as_ref()).1)
    }

    pub fn num_bands(&mut self) -> Result<usize> {
        self.ensure_ready()?;
        Ok(self.parts()?.1.bands.len())
    }

    /// Metadata of one discovered band.
    pub fn band(&mut self, index: usize) -> Result<Option<&Band>> {
        self.ensure_ready()?;
        Ok(self.parts()?.1.bands.get(index))
    }

    /// Release the underlying cursor. Idempotent; any later decode call
    /// fails with [`HfaError::Closed`].
    pub fn close(&mut self) {
        if self.cursor.take().is_some() {
            debug!("Reader closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.cursor.is_none()
    }

    fn parts(&mut self) -> Result<(&mut Cursor<Vec<u8>>, &mut Decoded)> {
        let Some(cur) = self.cursor.as_mut() else {
            return Err(HfaError::Closed);
        };
        let Lazy::Resolved(decoded) = &mut self.decoded else {
            return Err(HfaError::InvalidFormat("Reader state not decoded".into()));
        };
        Ok((cur, decoded))
    }

    fn ensure_ready(&mut self) -> Result<()> {
        if self.decoded.get().is_some() {
            return Ok(());
        }
        let Some(cur) = self.cursor.as_mut() else {
            return Err(HfaError::Closed);
        };
        let decoded = decode_header(cur, self.projection_wkt.as_deref())?;
        self.decoded.set(decoded);
        Ok(())
    }
}

/// Parse magic, header words, dictionary, entry tree, band list, and
/// georeferencing.
fn decode_header(cur: &mut Cursor<Vec<u8>>, projection_wkt: Option<&str>) -> Result<Decoded> {
    cur.seek(SeekFrom::Start(0))?;
    let mut magic = [0u8; 16];
    cur.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(HfaError::BadMagic {
            found: String::from_utf8_lossy(&magic).into_owned(),
        });
    }

    // The magic is followed by the offset of the real header block.
    let header_pos = cursor::read_u32(cur)? as u64;
    cur.seek(SeekFrom::Start(header_pos))?;
    let version = cursor::read_i32(cur)?;
    let _free_list = cursor::read_i32(cur)?;
    let root_offset = cursor::read_u32(cur)? as u64;
    // Entry headers have a fixed width; the stored length is informational.
    let _entry_header_length = cursor::read_i16(cur)?;
    let dictionary_offset = cursor::read_u32(cur)? as u64;
    info!(
        "HFA header: version={}, root entry at {}, dictionary at {}",
        version, root_offset, dictionary_offset
    );

    cur.seek(SeekFrom::Start(dictionary_offset))?;
    let mut dictionary_text = Vec::new();
    cur.read_to_end(&mut dictionary_text)?;
    let mut dictionary = Dictionary::parse(&dictionary_text)?;

    let mut tree = EntryTree::read(cur, root_offset)?;
    let bands = discover_bands(cur, &mut tree, &mut dictionary)?;
    info!("Discovered {} band(s)", bands.len());

    let (georef, crs) = match bands.first() {
        Some(band) => {
            let georef = georef::resolve(
                cur,
                &mut tree,
                &mut dictionary,
                band.entry,
                band.grid_width,
                band.grid_height,
            )?;
            // External .prj WKT takes priority over internal metadata.
            let crs = match projection_wkt {
                Some(wkt) => Some(Crs::from_wkt(wkt)),
                None => projection::resolve(cur, &mut tree, &mut dictionary, band.entry)?,
            };
            (georef, crs)
        }
        None => (None, projection_wkt.map(Crs::from_wkt)),
    };

    Ok(Decoded {
        dictionary,
        tree,
        bands,
        georef,
        crs,
    })
}

/// Walk the root's children collecting every `Eimg_Layer` with a positive
/// grid. The first band fixes the grid dimensions; a later mismatch is
/// fatal.
fn discover_bands(
    cur: &mut Cursor<Vec<u8>>,
    tree: &mut EntryTree,
    dictionary: &mut Dictionary,
) -> Result<Vec<Band>> {
    let mut bands: Vec<Band> = Vec::new();
    for child in tree.children(cur, tree.root())? {
        if tree.node(child)?.type_name != "Eimg_Layer" {
            continue;
        }
        // A positive grid is the membership test; empty placeholder
        // layers are skipped before any further validation runs.
        {
            let values = tree.field_values(cur, dictionary, child)?;
            let dim = |name: &str| values.get(name).and_then(Value::as_int).unwrap_or(0);
            if dim("width") <= 0 || dim("height") <= 0 {
                debug!("Skipping empty layer at {}", child);
                continue;
            }
        }
        let band = Band::from_entry(cur, tree, dictionary, child, bands.len())?;
        if let Some(first) = bands.first() {
            if band.grid_width != first.grid_width || band.grid_height != first.grid_height {
                return Err(HfaError::GridMismatch {
                    band: band.index,
                    expected_width: first.grid_width,
                    expected_height: first.grid_height,
                    found_width: band.grid_width,
                    found_height: band.grid_height,
                });
            }
        }
        bands.push(band);
    }
    Ok(bands)
}

fn cell_size_of(georef: Option<&Georef>) -> (f64, f64) {
    match georef {
        Some(g) => (g.pixel_width, g.pixel_height),
        None => (1.0, 1.0),
    }
}

fn bounding_box_of(georef: Option<&Georef>, width: u32, height: u32) -> BoundingBox {
    match georef {
        Some(g) => g.bounding_box(),
        // No georeferencing: raw pixel space.
        None => BoundingBox {
            min_x: 0.0,
            min_y: 0.0,
            max_x: width as f64,
            max_y: height as f64,
        },
    }
}
