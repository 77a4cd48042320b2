//! Raster bands and block-tiled grid assembly.
//!
//! A band is one `Eimg_Layer` entry. Its cell data is stored as a row-major
//! sequence of fixed-size rectangular blocks indexed by the `RasterDMS`
//! child entry; assembly scatters each block into a full-size f32 grid.

use std::io::{Read, Seek, SeekFrom};

use log::{debug, info, warn};

use super::cursor;
use super::dictionary::value::Value;
use super::dictionary::Dictionary;
use super::entry::EntryTree;
use super::error::{HfaError, Result};
use super::Lazy;

/// The only block compression this reader decodes.
pub const NO_COMPRESSION: &str = "no compression";

/// Per-cell storage type of a band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelType {
    U1,
    U2,
    U4,
    U8,
    S8,
    U16,
    S16,
    U32,
    S32,
    F32,
    F64,
    C64,
    C128,
}

impl PixelType {
    pub fn from_label(label: &str) -> Option<Self> {
        Some(match label {
            "u1" => PixelType::U1,
            "u2" => PixelType::U2,
            "u4" => PixelType::U4,
            "u8" => PixelType::U8,
            "s8" => PixelType::S8,
            "u16" => PixelType::U16,
            "s16" => PixelType::S16,
            "u32" => PixelType::U32,
            "s32" => PixelType::S32,
            "f32" => PixelType::F32,
            "f64" => PixelType::F64,
            "c64" => PixelType::C64,
            "c128" => PixelType::C128,
            _ => return None,
        })
    }

    pub fn label(&self) -> &'static str {
        match self {
            PixelType::U1 => "u1",
            PixelType::U2 => "u2",
            PixelType::U4 => "u4",
            PixelType::U8 => "u8",
            PixelType::S8 => "s8",
            PixelType::U16 => "u16",
            PixelType::S16 => "s16",
            PixelType::U32 => "u32",
            PixelType::S32 => "s32",
            PixelType::F32 => "f32",
            PixelType::F64 => "f64",
            PixelType::C64 => "c64",
            PixelType::C128 => "c128",
        }
    }

    /// Read one cell, widened to f32.
    ///
    /// Sub-byte packed and complex variants are recognized but not decoded.
    fn read_cell<R: Read + Seek>(&self, cur: &mut R) -> Result<f32> {
        Ok(match self {
            PixelType::U1 | PixelType::U2 | PixelType::U4 | PixelType::C64 | PixelType::C128 => {
                return Err(HfaError::UnsupportedPixelType(self.label().to_string()))
            }
            PixelType::U8 => {
                let mut b = [0u8; 1];
                cur.read_exact(&mut b)?;
                b[0] as f32
            }
            PixelType::S8 => {
                let mut b = [0u8; 1];
                cur.read_exact(&mut b)?;
                b[0] as i8 as f32
            }
            PixelType::U16 => cursor::read_u16(cur)? as f32,
            PixelType::S16 => cursor::read_i16(cur)? as f32,
            PixelType::U32 => cursor::read_u32(cur)? as f32,
            PixelType::S32 => cursor::read_i32(cur)? as f32,
            PixelType::F32 => cursor::read_f32(cur)?,
            PixelType::F64 => cursor::read_f64(cur)? as f32,
        })
    }
}

/// Location and storage scheme of one raster block.
#[derive(Debug, Clone)]
pub struct BlockInfo {
    pub offset: u64,
    pub compression: String,
}

/// One raster layer.
#[derive(Debug)]
pub struct Band {
    /// Offset of the owning `Eimg_Layer` entry.
    pub entry: u64,
    pub index: usize,
    pub pixel_type: PixelType,
    pub block_width: u32,
    pub block_height: u32,
    pub grid_width: u32,
    pub grid_height: u32,
    pub block_rows: u32,
    pub block_cols: u32,
    block_info: Lazy<Vec<BlockInfo>>,
    grid: Lazy<Vec<f32>>,
}

impl Band {
    /// Build a band from the field values of an `Eimg_Layer` entry.
    pub fn from_entry<R: Read + Seek>(
        cur: &mut R,
        tree: &mut EntryTree,
        dict: &mut Dictionary,
        entry: u64,
        index: usize,
    ) -> Result<Self> {
        let values = tree.field_values(cur, dict, entry)?;
        let field = |name: &str| -> Result<i64> {
            values
                .get(name)
                .and_then(Value::as_int)
                .ok_or_else(|| HfaError::InvalidFormat(format!("Layer missing field {:?}", name)))
        };
        let grid_width = field("width")? as u32;
        let grid_height = field("height")? as u32;
        let block_width = field("blockWidth")? as u32;
        let block_height = field("blockHeight")? as u32;
        let pixel_label = values
            .get("pixelType")
            .and_then(Value::as_str)
            .ok_or_else(|| HfaError::InvalidFormat("Layer missing field \"pixelType\"".into()))?;
        let pixel_type = PixelType::from_label(pixel_label)
            .ok_or_else(|| HfaError::UnsupportedPixelType(pixel_label.to_string()))?;

        if block_width == 0 || block_height == 0 {
            return Err(HfaError::InvalidFormat(format!(
                "Layer declares zero block dimensions {}x{}",
                block_width, block_height
            )));
        }
        // Ceiling division: a trailing partial row/column still occupies a
        // full block on disk.
        let block_cols = grid_width.div_ceil(block_width);
        let block_rows = grid_height.div_ceil(block_height);
        info!(
            "Band {}: {}x{} {} cells in {}x{} blocks of {}x{}",
            index,
            grid_width,
            grid_height,
            pixel_type.label(),
            block_cols,
            block_rows,
            block_width,
            block_height
        );

        Ok(Band {
            entry,
            index,
            pixel_type,
            block_width,
            block_height,
            grid_width,
            grid_height,
            block_rows,
            block_cols,
            block_info: Lazy::Unresolved,
            grid: Lazy::Unresolved,
        })
    }

    pub fn block_count(&self) -> usize {
        self.block_rows as usize * self.block_cols as usize
    }

    /// Lazily load the per-block index from the `RasterDMS` child entry.
    pub fn block_info<R: Read + Seek>(
        &mut self,
        cur: &mut R,
        tree: &mut EntryTree,
        dict: &mut Dictionary,
    ) -> Result<&[BlockInfo]> {
        if self.block_info.get().is_none() {
            let info = self.load_block_info(cur, tree, dict)?;
            debug!("Band {}: block index with {} entries", self.index, info.len());
            self.block_info.set(info);
        }
        match self.block_info.get() {
            Some(info) => Ok(info),
            None => Err(HfaError::InvalidFormat(
                "Block index cache did not resolve".into(),
            )),
        }
    }

    fn load_block_info<R: Read + Seek>(
        &mut self,
        cur: &mut R,
        tree: &mut EntryTree,
        dict: &mut Dictionary,
    ) -> Result<Vec<BlockInfo>> {
        let dms = match tree.named_child(cur, self.entry, "RasterDMS")? {
            Some(dms) => dms,
            None => {
                if tree.named_child(cur, self.entry, "ExternalRasterDMS")?.is_some() {
                    return Err(HfaError::ExternalRaster);
                }
                return Err(HfaError::MissingEntry("RasterDMS"));
            }
        };
        let values = tree.field_values(cur, dict, dms)?;
        let entries: Vec<&Value> = match values.get("blockinfo") {
            Some(Value::List(items)) => items.iter().collect(),
            Some(map @ Value::Map(_)) => vec![map],
            _ => {
                return Err(HfaError::InvalidFormat(
                    "RasterDMS entry has no blockinfo field".into(),
                ))
            }
        };
        let mut info = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            let map = entry.as_map().ok_or_else(|| {
                HfaError::InvalidFormat(format!("blockinfo[{}] is not a structure", i))
            })?;
            let offset = map.get("offset").and_then(Value::as_int).ok_or_else(|| {
                HfaError::InvalidFormat(format!("blockinfo[{}] missing offset", i))
            })?;
            let compression = map
                .get("compressionType")
                .and_then(Value::as_str)
                .unwrap_or(NO_COMPRESSION)
                .to_string();
            info.push(BlockInfo {
                offset: offset as u64,
                compression,
            });
        }
        Ok(info)
    }

    /// Reassemble the block-tiled cell data into a full row-major f32 grid.
    ///
    /// The result is computed once and cached.
    pub fn gridded_cells<R: Read + Seek>(
        &mut self,
        cur: &mut R,
        tree: &mut EntryTree,
        dict: &mut Dictionary,
    ) -> Result<&[f32]> {
        if self.grid.get().is_none() {
            let grid = self.assemble(cur, tree, dict)?;
            self.grid.set(grid);
        }
        match self.grid.get() {
            Some(grid) => Ok(grid),
            None => Err(HfaError::InvalidFormat(
                "Grid cache did not resolve".into(),
            )),
        }
    }

    fn assemble<R: Read + Seek>(
        &mut self,
        cur: &mut R,
        tree: &mut EntryTree,
        dict: &mut Dictionary,
    ) -> Result<Vec<f32>> {
        let info = self.block_info(cur, tree, dict)?.to_vec();
        let expected = self.block_count();
        if info.len() < expected {
            return Err(HfaError::InvalidFormat(format!(
                "Block index has {} entries, {} blocks required",
                info.len(),
                expected
            )));
        }
        if info.len() > expected {
            warn!(
                "Block index has {} entries, only {} used",
                info.len(),
                expected
            );
        }

        let cells_per_block = (self.block_width * self.block_height) as usize;
        let mut grid = vec![0f32; self.grid_width as usize * self.grid_height as usize];
        for block_row in 0..self.block_rows {
            for block_col in 0..self.block_cols {
                let i = (block_row * self.block_cols + block_col) as usize;
                let block = &info[i];
                if block.compression != NO_COMPRESSION {
                    return Err(HfaError::UnsupportedCompression(block.compression.clone()));
                }
                cur.seek(SeekFrom::Start(block.offset))?;
                let mut cells = Vec::with_capacity(cells_per_block);
                for _ in 0..cells_per_block {
                    cells.push(self.pixel_type.read_cell(cur)?);
                }
                self.scatter(&mut grid, &cells, block_row, block_col);
            }
        }
        Ok(grid)
    }

    /// Copy one block's cells into the grid, clipping cells that fall past
    /// the grid edge (trailing partial blocks).
    fn scatter(&self, grid: &mut [f32], cells: &[f32], block_row: u32, block_col: u32) {
        for local_row in 0..self.block_height {
            let grid_row = block_row * self.block_height + local_row;
            if grid_row >= self.grid_height {
                break;
            }
            for local_col in 0..self.block_width {
                let grid_col = block_col * self.block_width + local_col;
                if grid_col >= self.grid_width {
                    break;
                }
                let cell_index = (grid_row * self.grid_width + grid_col) as usize;
                grid[cell_index] = cells[(local_row * self.block_width + local_col) as usize];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_type_labels_round_trip() {
        for label in ["u8", "s8", "u16", "s16", "u32", "s32", "f32", "f64"] {
            assert_eq!(PixelType::from_label(label).unwrap().label(), label);
        }
        assert!(PixelType::from_label("f16").is_none());
    }

    #[test]
    fn packed_pixel_types_do_not_decode() {
        let mut cur = std::io::Cursor::new(vec![0u8; 8]);
        for pt in [PixelType::U1, PixelType::U2, PixelType::U4, PixelType::C64] {
            assert!(matches!(
                pt.read_cell(&mut cur),
                Err(HfaError::UnsupportedPixelType(_))
            ));
        }
    }
}
