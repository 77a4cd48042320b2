//! Low-level byte reading utilities
//!
//! All multi-byte numeric fields in an HFA file are little-endian. These
//! helpers wrap [`byteorder::ReadBytesExt`] so the rest of the crate never
//! touches raw byte order.

use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};

use super::error::Result;

pub fn read_i16(reader: &mut impl Read) -> Result<i16> {
    Ok(reader.read_i16::<LittleEndian>()?)
}

pub fn read_u16(reader: &mut impl Read) -> Result<u16> {
    Ok(reader.read_u16::<LittleEndian>()?)
}

pub fn read_i32(reader: &mut impl Read) -> Result<i32> {
    Ok(reader.read_i32::<LittleEndian>()?)
}

pub fn read_u32(reader: &mut impl Read) -> Result<u32> {
    Ok(reader.read_u32::<LittleEndian>()?)
}

pub fn read_f32(reader: &mut impl Read) -> Result<f32> {
    Ok(reader.read_f32::<LittleEndian>()?)
}

pub fn read_f64(reader: &mut impl Read) -> Result<f64> {
    Ok(reader.read_f64::<LittleEndian>()?)
}

/// Read exactly `len` bytes and decode them as ASCII, trimming trailing NULs.
///
/// Used for the fixed-width name fields of entry headers and for
/// pointer-sized string values.
pub fn read_fixed_string(reader: &mut impl Read, len: usize) -> Result<String> {
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    Ok(buf[..end].iter().map(|&b| b as char).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_little_endian() {
        let mut cur = Cursor::new(vec![0x01, 0x00, 0x00, 0x00]);
        assert_eq!(read_i32(&mut cur).unwrap(), 1);

        let mut cur = Cursor::new(42.5f64.to_le_bytes().to_vec());
        assert_eq!(read_f64(&mut cur).unwrap(), 42.5);
    }

    #[test]
    fn fixed_string_trims_nul_padding() {
        let mut cur = Cursor::new(b"Eimg_Layer\0\0\0\0\0\0".to_vec());
        assert_eq!(read_fixed_string(&mut cur, 16).unwrap(), "Eimg_Layer");
    }

    #[test]
    fn fixed_string_without_nul_uses_full_width() {
        let mut cur = Cursor::new(b"abcd".to_vec());
        assert_eq!(read_fixed_string(&mut cur, 4).unwrap(), "abcd");
    }
}
