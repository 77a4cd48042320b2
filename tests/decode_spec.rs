use std::fs;
use std::io::Write;

use hfa_reader::{HfaError, HfaReader};

const ENTRY_LEN: u32 = 24 + 64 + 32;

/// Embedded dictionary used by the synthetic files. The Eprj_* types are
/// deliberately omitted so their built-in definitions get exercised.
const DICT: &str = concat!(
    "{1:lwidth,1:lheight,",
    "1:e3:thematic,athematic,fft of real-valued data,layerType,",
    "1:e13:u1,u2,u4,u8,s8,u16,s16,u32,s32,f32,f64,c64,c128,pixelType,",
    "1:lblockWidth,1:lblockHeight,}Eimg_Layer,",
    "{1:lnumvirtualblocks,1:lnumobjectsperblock,1:lnextobjectnum,",
    "1:e2:no compression,RLC compression,compressionType,",
    "0:poEdms_VirtualBlockInfo,blockinfo,}Edms_State,",
    "{1:SfileCode,1:Loffset,1:Lsize,1:e2:false,true,logvalid,",
    "1:e2:no compression,RLC compression,compressionType,}Edms_VirtualBlockInfo,",
    "{1:lorder,1:lnumdimtransform,1:lnumdimpolynomial,1:ltermcount,",
    "0:plexponentlist,0:pdpolycoefmtx,0:pdpolycoefvector,}Efga_Polynomial,",
    "."
);

/// Builds a complete synthetic HFA byte stream: magic, header, entry tree,
/// data blobs, block data, and the trailing dictionary.
struct HfaBuilder {
    buf: Vec<u8>,
}

impl HfaBuilder {
    const ROOT_OFFSET_PATCH: usize = 28;
    const DICT_OFFSET_PATCH: usize = 34;

    fn new() -> Self {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"EHFA_HEADER_TAG\0");
        buf.extend_from_slice(&20u32.to_le_bytes()); // header block position
        buf.extend_from_slice(&1i32.to_le_bytes()); // version
        buf.extend_from_slice(&0i32.to_le_bytes()); // free list
        buf.extend_from_slice(&0u32.to_le_bytes()); // root offset, patched
        buf.extend_from_slice(&(ENTRY_LEN as i16).to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes()); // dict offset, patched
        HfaBuilder { buf }
    }

    fn patch_u32(&mut self, at: usize, value: u32) {
        self.buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn push_entry(&mut self, name: &str, type_name: &str) -> u32 {
        let pos = self.buf.len() as u32;
        self.buf.extend_from_slice(&[0u8; 24]); // next/res/res/child/data/size
        let mut padded = [0u8; 64];
        padded[..name.len()].copy_from_slice(name.as_bytes());
        self.buf.extend_from_slice(&padded);
        let mut padded = [0u8; 32];
        padded[..type_name.len()].copy_from_slice(type_name.as_bytes());
        self.buf.extend_from_slice(&padded);
        pos
    }

    fn link_next(&mut self, entry: u32, next: u32) {
        self.patch_u32(entry as usize, next);
    }

    fn link_child(&mut self, entry: u32, child: u32) {
        self.patch_u32(entry as usize + 12, child);
    }

    /// Append a data blob and wire it to `entry`.
    fn set_data(&mut self, entry: u32, bytes: &[u8]) {
        let offset = self.buf.len() as u32;
        self.patch_u32(entry as usize + 16, offset);
        self.patch_u32(entry as usize + 20, bytes.len() as u32);
        self.buf.extend_from_slice(bytes);
    }

    /// Append raw bytes (raster block data), returning their offset.
    fn append(&mut self, bytes: &[u8]) -> u32 {
        let offset = self.buf.len() as u32;
        self.buf.extend_from_slice(bytes);
        offset
    }

    fn finish(mut self, root: u32) -> Vec<u8> {
        let dict_offset = self.buf.len() as u32;
        self.buf.extend_from_slice(DICT.as_bytes());
        self.patch_u32(Self::ROOT_OFFSET_PATCH, root);
        self.patch_u32(Self::DICT_OFFSET_PATCH, dict_offset);
        self.buf
    }
}

fn layer_blob(width: u32, height: u32, block_width: u32, block_height: u32) -> Vec<u8> {
    let mut blob = Vec::new();
    blob.extend_from_slice(&width.to_le_bytes());
    blob.extend_from_slice(&height.to_le_bytes());
    blob.extend_from_slice(&1u16.to_le_bytes()); // layerType: athematic
    blob.extend_from_slice(&9u16.to_le_bytes()); // pixelType: f32
    blob.extend_from_slice(&block_width.to_le_bytes());
    blob.extend_from_slice(&block_height.to_le_bytes());
    blob
}

/// Edms_State blob indexing `blocks`, each (file offset, compression enum
/// index: 0 = "no compression").
fn dms_blob(blocks: &[(u32, u16)]) -> Vec<u8> {
    let mut blob = Vec::new();
    blob.extend_from_slice(&(blocks.len() as u32).to_le_bytes());
    blob.extend_from_slice(&16u32.to_le_bytes()); // objects per block
    blob.extend_from_slice(&0u32.to_le_bytes()); // next object number
    blob.extend_from_slice(&0u16.to_le_bytes()); // state compression
    blob.extend_from_slice(&(blocks.len() as u32).to_le_bytes()); // pointer count
    blob.extend_from_slice(&0u32.to_le_bytes()); // pointer offset
    for &(offset, compression) in blocks {
        blob.extend_from_slice(&0i16.to_le_bytes()); // fileCode
        blob.extend_from_slice(&(offset as i32).to_le_bytes());
        blob.extend_from_slice(&0i32.to_le_bytes()); // size
        blob.extend_from_slice(&1u16.to_le_bytes()); // logvalid: true
        blob.extend_from_slice(&compression.to_le_bytes());
    }
    blob
}

fn pointer_string(text: &str) -> Vec<u8> {
    let mut blob = Vec::new();
    blob.extend_from_slice(&(text.len() as u32 + 1).to_le_bytes());
    blob.extend_from_slice(&0u32.to_le_bytes());
    blob.extend_from_slice(text.as_bytes());
    blob.push(0);
    blob
}

fn empty_pointer() -> Vec<u8> {
    let mut blob = Vec::new();
    blob.extend_from_slice(&0u32.to_le_bytes());
    blob.extend_from_slice(&0u32.to_le_bytes());
    blob
}

fn coordinate_pair(x: f64, y: f64) -> Vec<u8> {
    let mut blob = Vec::new();
    blob.extend_from_slice(&1u32.to_le_bytes()); // array pointer: one instance
    blob.extend_from_slice(&0u32.to_le_bytes());
    blob.extend_from_slice(&x.to_le_bytes());
    blob.extend_from_slice(&y.to_le_bytes());
    blob
}

fn map_info_blob(ul: (f64, f64), lr: (f64, f64), pixel: (f64, f64), units: &str) -> Vec<u8> {
    let mut blob = Vec::new();
    blob.extend_from_slice(&pointer_string("Geographic (Latitude/Longitude)"));
    blob.extend_from_slice(&coordinate_pair(ul.0, ul.1));
    blob.extend_from_slice(&coordinate_pair(lr.0, lr.1));
    blob.extend_from_slice(&coordinate_pair(pixel.0, pixel.1));
    blob.extend_from_slice(&pointer_string(units));
    blob
}

fn projection_blob(pro_number: u32, pro_zone: u32) -> Vec<u8> {
    let mut blob = Vec::new();
    blob.extend_from_slice(&0u16.to_le_bytes()); // proType: EPRJ_INTERNAL
    blob.extend_from_slice(&pro_number.to_le_bytes());
    blob.extend_from_slice(&empty_pointer()); // proExeName
    blob.extend_from_slice(&empty_pointer()); // proName
    blob.extend_from_slice(&pro_zone.to_le_bytes());
    blob.extend_from_slice(&empty_pointer()); // proParams
    blob.extend_from_slice(&1u32.to_le_bytes()); // proSpheroid: one instance
    blob.extend_from_slice(&0u32.to_le_bytes());
    blob.extend_from_slice(&pointer_string("GRS 1980"));
    for v in [6378137.0f64, 6356752.3, 0.0066943800229, 6371000.0] {
        blob.extend_from_slice(&v.to_le_bytes());
    }
    blob
}

fn datum_blob(name: &str) -> Vec<u8> {
    let mut blob = Vec::new();
    blob.extend_from_slice(&pointer_string(name));
    blob.extend_from_slice(&0u16.to_le_bytes()); // type: parametric
    blob.extend_from_slice(&empty_pointer()); // params
    blob.extend_from_slice(&empty_pointer()); // gridname
    blob
}

fn f32_cells(values: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(values.len() * 4);
    for v in values {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// One 4x4 f32 band in a single uncompressed block, with map info and a
/// geographic NAD83 projection.
fn build_minimal(cells: &[f32]) -> Vec<u8> {
    assert_eq!(cells.len(), 16);
    let mut b = HfaBuilder::new();
    let root = b.push_entry("root", "Ehfa_Entry");
    let layer = b.push_entry("Layer_1", "Eimg_Layer");
    let dms = b.push_entry("RasterDMS", "Edms_State");
    let map_info = b.push_entry("Map_Info", "Eprj_MapInfo");
    let projection = b.push_entry("Projection", "Eprj_ProParameters");
    let datum = b.push_entry("Datum", "Eprj_Datum");
    b.link_child(root, layer);
    b.link_child(layer, dms);
    b.link_next(dms, map_info);
    b.link_next(map_info, projection);
    b.link_child(projection, datum);

    b.set_data(layer, &layer_blob(4, 4, 4, 4));
    let block = b.append(&f32_cells(cells));
    b.set_data(dms, &dms_blob(&[(block, 0)]));
    b.set_data(
        map_info,
        &map_info_blob((100.0, 200.0), (130.0, 170.0), (10.0, 10.0), "dd"),
    );
    b.set_data(projection, &projection_blob(0, 0));
    b.set_data(datum, &datum_blob("NAD83"));
    b.finish(root)
}

fn sample_cells() -> Vec<f32> {
    (0..16).map(|i| i as f32 * 1.25 - 3.5).collect()
}

#[test]
fn minimal_file_decodes_end_to_end() {
    let cells = sample_cells();
    let mut reader = HfaReader::from_bytes(build_minimal(&cells), None);

    let model = reader.read().expect("read model");
    assert_eq!(model.width, 4);
    assert_eq!(model.height, 4);
    assert_eq!(model.cells, cells, "cells must round-trip bit-for-bit");
    assert_eq!(model.cell_size, (10.0, 10.0));
    assert_eq!(model.bounding_box.min_x, 95.0);
    assert_eq!(model.bounding_box.min_y, 165.0);
    assert_eq!(model.bounding_box.max_x, 135.0);
    assert_eq!(model.bounding_box.max_y, 205.0);

    assert_eq!(reader.num_bands().unwrap(), 1);
    let band = reader.band(0).unwrap().expect("first band");
    assert_eq!(band.pixel_type, hfa_reader::PixelType::F32);
    assert_eq!(band.block_count(), 1);
    assert!(reader.band(1).unwrap().is_none());
    assert_eq!(reader.pixel_size_width().unwrap(), 10.0);
    assert_eq!(reader.pixel_size_height().unwrap(), 10.0);
    let crs = reader
        .coordinate_reference_system()
        .unwrap()
        .expect("geographic NAD83");
    assert_eq!(crs.epsg, Some(4269));

    // Repeated reads serve the memoized grid.
    let again = reader.read().expect("second read");
    assert_eq!(again.cells, cells);
}

#[test]
fn four_block_grid_reassembles_by_block() {
    // 4x4 grid of 2x2 blocks with distinct filler values.
    let mut b = HfaBuilder::new();
    let root = b.push_entry("root", "Ehfa_Entry");
    let layer = b.push_entry("Layer_1", "Eimg_Layer");
    let dms = b.push_entry("RasterDMS", "Edms_State");
    b.link_child(root, layer);
    b.link_child(layer, dms);
    b.set_data(layer, &layer_blob(4, 4, 2, 2));
    let blocks: Vec<(u32, u16)> = (1..=4)
        .map(|filler| (b.append(&f32_cells(&[filler as f32; 4])), 0))
        .collect();
    b.set_data(dms, &dms_blob(&blocks));

    let mut reader = HfaReader::from_bytes(b.finish(root), None);
    let model = reader.read().expect("read model");
    for y in 0..4usize {
        for x in 0..4usize {
            let expected = match (y < 2, x < 2) {
                (true, true) => 1.0,
                (true, false) => 2.0,
                (false, true) => 3.0,
                (false, false) => 4.0,
            };
            assert_eq!(
                model.cells[y * 4 + x],
                expected,
                "cell ({}, {}) belongs to the wrong block",
                x,
                y
            );
        }
    }
}

#[test]
fn trailing_partial_blocks_are_clipped() {
    // 3x3 grid over 2x2 blocks: four full blocks on disk, edge cells clipped.
    let mut b = HfaBuilder::new();
    let root = b.push_entry("root", "Ehfa_Entry");
    let layer = b.push_entry("Layer_1", "Eimg_Layer");
    let dms = b.push_entry("RasterDMS", "Edms_State");
    b.link_child(root, layer);
    b.link_child(layer, dms);
    b.set_data(layer, &layer_blob(3, 3, 2, 2));
    let blocks: Vec<(u32, u16)> = (1..=4)
        .map(|filler| (b.append(&f32_cells(&[filler as f32; 4])), 0))
        .collect();
    b.set_data(dms, &dms_blob(&blocks));

    let mut reader = HfaReader::from_bytes(b.finish(root), None);
    let model = reader.read().expect("read model");
    assert_eq!(model.width, 3);
    assert_eq!(
        model.cells,
        vec![1.0, 1.0, 2.0, 1.0, 1.0, 2.0, 3.0, 3.0, 4.0]
    );
}

#[test]
fn compressed_block_is_fatal() {
    let mut b = HfaBuilder::new();
    let root = b.push_entry("root", "Ehfa_Entry");
    let layer = b.push_entry("Layer_1", "Eimg_Layer");
    let dms = b.push_entry("RasterDMS", "Edms_State");
    b.link_child(root, layer);
    b.link_child(layer, dms);
    b.set_data(layer, &layer_blob(4, 4, 4, 4));
    let block = b.append(&f32_cells(&[0.0; 16]));
    b.set_data(dms, &dms_blob(&[(block, 1)])); // RLC compression

    let mut reader = HfaReader::from_bytes(b.finish(root), None);
    match reader.read() {
        Err(HfaError::UnsupportedCompression(label)) => {
            assert_eq!(label, "RLC compression");
        }
        other => panic!("expected unsupported compression, got {:?}", other),
    }
}

#[test]
fn external_raster_storage_is_unsupported() {
    let mut b = HfaBuilder::new();
    let root = b.push_entry("root", "Ehfa_Entry");
    let layer = b.push_entry("Layer_1", "Eimg_Layer");
    let external = b.push_entry("ExternalRasterDMS", "Eimg_ExternalRaster");
    b.link_child(root, layer);
    b.link_child(layer, external);
    b.set_data(layer, &layer_blob(4, 4, 4, 4));

    let mut reader = HfaReader::from_bytes(b.finish(root), None);
    assert!(matches!(reader.read(), Err(HfaError::ExternalRaster)));
}

#[test]
fn missing_raster_dms_is_fatal() {
    let mut b = HfaBuilder::new();
    let root = b.push_entry("root", "Ehfa_Entry");
    let layer = b.push_entry("Layer_1", "Eimg_Layer");
    b.link_child(root, layer);
    b.set_data(layer, &layer_blob(4, 4, 4, 4));

    let mut reader = HfaReader::from_bytes(b.finish(root), None);
    assert!(matches!(
        reader.read(),
        Err(HfaError::MissingEntry("RasterDMS"))
    ));
}

#[test]
fn degenerate_empty_layer_is_skipped() {
    // A 0x0 placeholder layer (zero block dimensions included) ahead of a
    // valid band is excluded, not validated.
    let cells = sample_cells();
    let mut b = HfaBuilder::new();
    let root = b.push_entry("root", "Ehfa_Entry");
    let empty = b.push_entry("Layer_0", "Eimg_Layer");
    let layer = b.push_entry("Layer_1", "Eimg_Layer");
    let dms = b.push_entry("RasterDMS", "Edms_State");
    b.link_child(root, empty);
    b.link_next(empty, layer);
    b.link_child(layer, dms);
    b.set_data(empty, &layer_blob(0, 0, 0, 0));
    b.set_data(layer, &layer_blob(4, 4, 4, 4));
    let block = b.append(&f32_cells(&cells));
    b.set_data(dms, &dms_blob(&[(block, 0)]));

    let mut reader = HfaReader::from_bytes(b.finish(root), None);
    let model = reader.read().expect("read model");
    assert_eq!(reader.num_bands().unwrap(), 1);
    assert_eq!(model.width, 4);
    assert_eq!(model.cells, cells);
}

#[test]
fn mismatched_band_grids_are_fatal() {
    let mut b = HfaBuilder::new();
    let root = b.push_entry("root", "Ehfa_Entry");
    let first = b.push_entry("Layer_1", "Eimg_Layer");
    let second = b.push_entry("Layer_2", "Eimg_Layer");
    b.link_child(root, first);
    b.link_next(first, second);
    b.set_data(first, &layer_blob(4, 4, 4, 4));
    b.set_data(second, &layer_blob(8, 8, 4, 4));

    let mut reader = HfaReader::from_bytes(b.finish(root), None);
    match reader.read() {
        Err(HfaError::GridMismatch {
            band,
            expected_width,
            found_width,
            ..
        }) => {
            assert_eq!(band, 1);
            assert_eq!(expected_width, 4);
            assert_eq!(found_width, 8);
        }
        other => panic!("expected grid mismatch, got {:?}", other),
    }
}

#[test]
fn no_bands_is_fatal() {
    let mut b = HfaBuilder::new();
    let root = b.push_entry("root", "Ehfa_Entry");
    let mut reader = HfaReader::from_bytes(b.finish(root), None);
    assert!(matches!(reader.read(), Err(HfaError::NoBands)));
}

#[test]
fn bad_magic_is_fatal() {
    let mut reader = HfaReader::from_bytes(b"NOT_AN_HFA_FILE_AT_ALL!!".to_vec(), None);
    assert!(matches!(reader.read(), Err(HfaError::BadMagic { .. })));
}

#[test]
fn unsupported_datum_is_fatal() {
    let cells = sample_cells();
    let mut data = build_minimal(&cells);
    // Rewrite the NAD83 datum name in place.
    let at = data
        .windows(5)
        .position(|w| w == b"NAD83")
        .expect("datum bytes present");
    data[at..at + 5].copy_from_slice(b"WGS84");

    let mut reader = HfaReader::from_bytes(data, None);
    match reader.read() {
        Err(HfaError::UnsupportedProjection { datum, .. }) => assert_eq!(datum, "WGS84"),
        other => panic!("expected unsupported projection, got {:?}", other),
    }
}

#[test]
fn utm_zone_resolves_to_epsg() {
    let mut b = HfaBuilder::new();
    let root = b.push_entry("root", "Ehfa_Entry");
    let layer = b.push_entry("Layer_1", "Eimg_Layer");
    let dms = b.push_entry("RasterDMS", "Edms_State");
    let projection = b.push_entry("Projection", "Eprj_ProParameters");
    let datum = b.push_entry("Datum", "Eprj_Datum");
    b.link_child(root, layer);
    b.link_child(layer, dms);
    b.link_next(dms, projection);
    b.link_child(projection, datum);
    b.set_data(layer, &layer_blob(4, 4, 4, 4));
    let block = b.append(&f32_cells(&[0.0; 16]));
    b.set_data(dms, &dms_blob(&[(block, 0)]));
    b.set_data(projection, &projection_blob(1, 13)); // UTM zone 13
    b.set_data(datum, &datum_blob("NAD83"));

    let mut reader = HfaReader::from_bytes(b.finish(root), None);
    let crs = reader
        .coordinate_reference_system()
        .unwrap()
        .expect("UTM NAD83");
    assert_eq!(crs.epsg, Some(26913));
    assert!(crs.name.contains("zone 13"));
}

#[test]
fn ds_units_scale_to_degrees() {
    let cells = sample_cells();
    let mut b = HfaBuilder::new();
    let root = b.push_entry("root", "Ehfa_Entry");
    let layer = b.push_entry("Layer_1", "Eimg_Layer");
    let dms = b.push_entry("RasterDMS", "Edms_State");
    let map_info = b.push_entry("Map_Info", "Eprj_MapInfo");
    b.link_child(root, layer);
    b.link_child(layer, dms);
    b.link_next(dms, map_info);
    b.set_data(layer, &layer_blob(4, 4, 4, 4));
    let block = b.append(&f32_cells(&cells));
    b.set_data(dms, &dms_blob(&[(block, 0)]));
    b.set_data(
        map_info,
        &map_info_blob(
            (360_000.0, 720_000.0),
            (1_080_000.0, 180_000.0),
            (36_000.0, 36_000.0),
            "ds",
        ),
    );

    let mut reader = HfaReader::from_bytes(b.finish(root), None);
    let bbox = reader.bounding_box().expect("bounding box");
    assert_eq!(bbox.min_x, 95.0);
    assert_eq!(bbox.min_y, 45.0);
    assert_eq!(bbox.max_x, 305.0);
    assert_eq!(bbox.max_y, 205.0);
    assert_eq!(reader.pixel_size_width().unwrap(), 10.0);
}

#[test]
fn xform_fallback_applies_without_map_info() {
    let cells = sample_cells();
    let mut b = HfaBuilder::new();
    let root = b.push_entry("root", "Ehfa_Entry");
    let layer = b.push_entry("Layer_1", "Eimg_Layer");
    let dms = b.push_entry("RasterDMS", "Edms_State");
    let xform_header = b.push_entry("MapToPixelXForm", "Exfr_GenericXFormHeader");
    let xform0 = b.push_entry("XForm0", "Efga_Polynomial");
    b.link_child(root, layer);
    b.link_child(layer, dms);
    b.link_next(dms, xform_header);
    b.link_child(xform_header, xform0);
    b.set_data(layer, &layer_blob(4, 4, 4, 4));
    let block = b.append(&f32_cells(&cells));
    b.set_data(dms, &dms_blob(&[(block, 0)]));

    let mut blob = Vec::new();
    for word in [1u32, 2, 2, 3] {
        blob.extend_from_slice(&word.to_le_bytes());
    }
    blob.extend_from_slice(&empty_pointer()); // exponentlist
    blob.extend_from_slice(&4u32.to_le_bytes()); // polycoefmtx
    blob.extend_from_slice(&0u32.to_le_bytes());
    for v in [10.0f64, 0.0, 0.0, -10.0] {
        blob.extend_from_slice(&v.to_le_bytes());
    }
    blob.extend_from_slice(&2u32.to_le_bytes()); // polycoefvector
    blob.extend_from_slice(&0u32.to_le_bytes());
    for v in [1000.0f64, 2000.0] {
        blob.extend_from_slice(&v.to_le_bytes());
    }
    b.set_data(xform0, &blob);

    let mut reader = HfaReader::from_bytes(b.finish(root), None);
    let bbox = reader.bounding_box().expect("bounding box");
    assert_eq!(bbox.min_x, 995.0);
    assert_eq!(bbox.min_y, 1965.0);
    assert_eq!(bbox.max_x, 1035.0);
    assert_eq!(bbox.max_y, 2005.0);
}

#[test]
fn missing_georeferencing_falls_back_to_pixel_space() {
    let mut b = HfaBuilder::new();
    let root = b.push_entry("root", "Ehfa_Entry");
    let layer = b.push_entry("Layer_1", "Eimg_Layer");
    let dms = b.push_entry("RasterDMS", "Edms_State");
    b.link_child(root, layer);
    b.link_child(layer, dms);
    b.set_data(layer, &layer_blob(4, 4, 4, 4));
    let block = b.append(&f32_cells(&[0.0; 16]));
    b.set_data(dms, &dms_blob(&[(block, 0)]));

    let mut reader = HfaReader::from_bytes(b.finish(root), None);
    let bbox = reader.bounding_box().expect("bounding box");
    assert_eq!((bbox.min_x, bbox.min_y), (0.0, 0.0));
    assert_eq!((bbox.max_x, bbox.max_y), (4.0, 4.0));
    assert_eq!(reader.pixel_size_width().unwrap(), 1.0);
    assert!(reader.coordinate_reference_system().unwrap().is_none());
}

#[test]
fn external_wkt_overrides_internal_projection() {
    let cells = sample_cells();
    let wkt = "PROJCS[\"Custom Grid\",GEOGCS[\"NAD83\"]]";
    let mut reader = HfaReader::from_bytes(build_minimal(&cells), Some(wkt.to_string()));
    let crs = reader
        .coordinate_reference_system()
        .unwrap()
        .expect("wkt handle");
    assert_eq!(crs.name, "Custom Grid");
    assert_eq!(crs.epsg, None);
    assert_eq!(crs.wkt.as_deref(), Some(wkt));
}

#[test]
fn close_is_idempotent_and_blocks_reads() {
    let cells = sample_cells();
    let mut reader = HfaReader::from_bytes(build_minimal(&cells), None);
    reader.read().expect("read before close");

    reader.close();
    assert!(reader.is_closed());
    reader.close(); // second close is a no-op
    assert!(matches!(reader.read(), Err(HfaError::Closed)));
}

#[test]
fn gzip_container_with_prj_sibling() {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    let cells = sample_cells();
    let dir = tempfile::tempdir().expect("tempdir");
    let img_gz = dir.path().join("dem.img.gz");
    let mut encoder = GzEncoder::new(
        fs::File::create(&img_gz).expect("create gz"),
        Compression::default(),
    );
    encoder
        .write_all(&build_minimal(&cells))
        .expect("write gz member");
    encoder.finish().expect("finish gz");
    fs::write(
        dir.path().join("dem.prj"),
        "GEOGCS[\"Sibling CRS\"]\n",
    )
    .expect("write prj");

    let mut reader = hfa_reader::open(&img_gz).expect("open gz");
    let model = reader.read().expect("read model");
    assert_eq!(model.cells, cells);
    let crs = reader
        .coordinate_reference_system()
        .unwrap()
        .expect("sibling wkt wins");
    assert_eq!(crs.name, "Sibling CRS");
}

#[test]
fn zip_container_with_prj_member() {
    use zip::write::SimpleFileOptions;

    let cells = sample_cells();
    let dir = tempfile::tempdir().expect("tempdir");
    let zip_path = dir.path().join("dem.zip");
    let mut writer = zip::ZipWriter::new(fs::File::create(&zip_path).expect("create zip"));
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    writer.start_file("dem.img", options).expect("start img");
    writer
        .write_all(&build_minimal(&cells))
        .expect("write img member");
    writer.start_file("dem.prj", options).expect("start prj");
    writer
        .write_all(b"GEOGCS[\"Archive CRS\"]")
        .expect("write prj member");
    writer.finish().expect("finish zip");

    let mut reader = hfa_reader::open(&zip_path).expect("open zip");
    let model = reader.read().expect("read model");
    assert_eq!(model.cells, cells);
    let crs = reader
        .coordinate_reference_system()
        .unwrap()
        .expect("archive wkt wins");
    assert_eq!(crs.name, "Archive CRS");
}

#[test]
fn plain_file_without_containers() {
    let cells = sample_cells();
    let dir = tempfile::tempdir().expect("tempdir");
    let img = dir.path().join("dem.img");
    fs::write(&img, build_minimal(&cells)).expect("write img");

    let mut reader = hfa_reader::open(&img).expect("open plain file");
    let model = reader.read().expect("read model");
    assert_eq!(model.width, 4);
    // No sibling .prj: internal metadata resolves.
    let crs = reader
        .coordinate_reference_system()
        .unwrap()
        .expect("internal NAD83");
    assert_eq!(crs.epsg, Some(4269));
}
