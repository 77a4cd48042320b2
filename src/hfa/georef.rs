//! Georeferencing: map info, transform fallback, and the bounding box.
//!
//! Corner coordinates follow the pixel-center convention: the stored
//! upper-left and lower-right points are the centers of the corner cells,
//! so the georeferenced rectangle extends half a pixel outward on every
//! side.

use std::io::{Read, Seek};

use log::{debug, info};

use super::dictionary::value::{lookup, Value};
use super::dictionary::Dictionary;
use super::entry::EntryTree;
use super::error::Result;

/// Axis-aligned georeferenced rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

/// Resolved georeferencing of a raster grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Georef {
    /// Map coordinate of the center of the upper-left cell.
    pub upper_left_center: (f64, f64),
    /// Map coordinate of the center of the lower-right cell.
    pub lower_right_center: (f64, f64),
    pub pixel_width: f64,
    pub pixel_height: f64,
}

impl Georef {
    /// The georeferenced rectangle, expanded half a pixel outward on every
    /// side of the corner cell centers.
    pub fn bounding_box(&self) -> BoundingBox {
        let (ulx, uly) = self.upper_left_center;
        let (lrx, lry) = self.lower_right_center;
        BoundingBox {
            min_x: ulx.min(lrx) - self.pixel_width / 2.0,
            min_y: uly.min(lry) - self.pixel_height / 2.0,
            max_x: ulx.max(lrx) + self.pixel_width / 2.0,
            max_y: uly.max(lry) + self.pixel_height / 2.0,
        }
    }
}

/// Resolve georeferencing for the band rooted at `band_entry`.
///
/// An explicit `Eprj_MapInfo` entry wins; otherwise the restricted
/// `MapToPixelXForm.XForm0` polynomial case is tried. Anything else yields
/// no georeferencing (null transform), never an error.
pub fn resolve<R: Read + Seek>(
    cur: &mut R,
    tree: &mut EntryTree,
    dict: &mut Dictionary,
    band_entry: u64,
    grid_width: u32,
    grid_height: u32,
) -> Result<Option<Georef>> {
    if let Some(georef) = from_map_info(cur, tree, dict, band_entry)? {
        return Ok(Some(georef));
    }
    from_xform(cur, tree, dict, band_entry, grid_width, grid_height)
}

/// Find a `Map_Info`-named or `Eprj_MapInfo`-typed child of the band entry
/// and read corner centers, pixel size, and units from it.
fn from_map_info<R: Read + Seek>(
    cur: &mut R,
    tree: &mut EntryTree,
    dict: &mut Dictionary,
    band_entry: u64,
) -> Result<Option<Georef>> {
    let mut map_info = tree.named_child(cur, band_entry, "Map_Info")?;
    if map_info.is_none() {
        for child in tree.children(cur, band_entry)? {
            if tree.node(child)?.type_name == "Eprj_MapInfo" {
                map_info = Some(child);
                break;
            }
        }
    }
    let Some(map_info) = map_info else {
        return Ok(None);
    };

    let values = tree.field_values(cur, dict, map_info)?;
    let coord = |path: &str| lookup(values, path).and_then(Value::as_f64);
    let (Some(ulx), Some(uly), Some(lrx), Some(lry), Some(px), Some(py)) = (
        coord("upperLeftCenter.x"),
        coord("upperLeftCenter.y"),
        coord("lowerRightCenter.x"),
        coord("lowerRightCenter.y"),
        coord("pixelSize.width"),
        coord("pixelSize.height"),
    ) else {
        debug!("Map info entry is missing coordinate fields");
        return Ok(None);
    };

    // "ds" units store decimal seconds of arc; scale down to degrees.
    let scale = match values.get("units").and_then(Value::as_str) {
        Some("ds") => 1.0 / 3600.0,
        _ => 1.0,
    };
    info!(
        "Georeferencing from map info: ul=({}, {}), lr=({}, {}), pixel {}x{}",
        ulx, uly, lrx, lry, px, py
    );
    Ok(Some(Georef {
        upper_left_center: (ulx * scale, uly * scale),
        lower_right_center: (lrx * scale, lry * scale),
        pixel_width: (px * scale).abs(),
        pixel_height: (py * scale).abs(),
    }))
}

/// Fall back to `MapToPixelXForm.XForm0`, accepted only in the
/// degree-1, 2-dimensional, 3-term, axis-aligned case. A transform chain
/// (`XForm1` present) or any other polynomial shape resolves to no
/// georeferencing.
fn from_xform<R: Read + Seek>(
    cur: &mut R,
    tree: &mut EntryTree,
    dict: &mut Dictionary,
    band_entry: u64,
    grid_width: u32,
    grid_height: u32,
) -> Result<Option<Georef>> {
    let Some(xform_header) = tree.named_child(cur, band_entry, "MapToPixelXForm")? else {
        return Ok(None);
    };
    let Some(xform0) = tree.named_child(cur, xform_header, "XForm0")? else {
        return Ok(None);
    };
    if tree.named_child(cur, xform_header, "XForm1")?.is_some() {
        debug!("Multi-step transform chain; treating as null transform");
        return Ok(None);
    }

    let values = tree.field_values(cur, dict, xform0)?;
    let int_field = |name: &str| values.get(name).and_then(Value::as_int);
    if int_field("order") != Some(1)
        || int_field("numdimtransform") != Some(2)
        || int_field("termcount") != Some(3)
    {
        debug!("Higher-order polynomial transform; treating as null transform");
        return Ok(None);
    }
    let vector = |path: &str| lookup(values, path).and_then(Value::as_f64);
    let (Some(x0), Some(y0), Some(dx), Some(xy), Some(yx), Some(dy)) = (
        vector("polycoefvector[0]"),
        vector("polycoefvector[1]"),
        vector("polycoefmtx[0]"),
        vector("polycoefmtx[1]"),
        vector("polycoefmtx[2]"),
        vector("polycoefmtx[3]"),
    ) else {
        return Ok(None);
    };
    if xy != 0.0 || yx != 0.0 || dx == 0.0 || dy == 0.0 {
        debug!("Rotational or degenerate transform; treating as null transform");
        return Ok(None);
    }

    info!(
        "Georeferencing from XForm0: origin=({}, {}), pixel {}x{}",
        x0, y0, dx, dy
    );
    Ok(Some(Georef {
        upper_left_center: (x0, y0),
        lower_right_center: (
            x0 + (grid_width.saturating_sub(1)) as f64 * dx,
            y0 + (grid_height.saturating_sub(1)) as f64 * dy,
        ),
        pixel_width: dx.abs(),
        pixel_height: dy.abs(),
    }))
}
