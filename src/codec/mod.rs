//! Binary file format.
//!
//! The format follows MFC archive conventions: little-endian integers,
//! rectangles as four `i32` edges, element counts as `u16` with a `u32`
//! escape, strings with a `u8`/`u16`/`u32` escaped length prefix. Every
//! ordered container is written as a count followed by its elements.
//!
//! The version tag comes from the enclosing file header; it selects between
//! the legacy (1.0, 1.0.2) and current (1.5 and later) layouts. Writing
//! always produces the current layout.

mod entities;
mod system;

pub use system::{decode_system, encode_system};

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{CodecError, CodecResult};
use crate::system::Rect;

/// File format version, as stored in the file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FileVersion {
    V1_0 = 1,
    V1_0_2 = 2,
    V1_5 = 3,
    V1_7 = 4,
}

impl FileVersion {
    /// The version every write produces.
    pub const CURRENT: FileVersion = FileVersion::V1_7;

    pub fn from_tag(tag: u16) -> CodecResult<Self> {
        match tag {
            1 => Ok(FileVersion::V1_0),
            2 => Ok(FileVersion::V1_0_2),
            3 => Ok(FileVersion::V1_5),
            4 => Ok(FileVersion::V1_7),
            _ => Err(CodecError::UnsupportedVersion(tag)),
        }
    }

    pub fn tag(self) -> u16 {
        self as u16
    }

    /// 1.0 and 1.0.2 store the start bar as a bare key byte and the end bar
    /// in two bytes.
    pub fn is_legacy(self) -> bool {
        self < FileVersion::V1_5
    }
}

/// An entity with a fixed wire layout.
pub trait Serializable: Sized {
    fn serialize<W: Write>(&self, w: &mut W) -> CodecResult<()>;
    fn deserialize<R: Read>(r: &mut R, version: FileVersion) -> CodecResult<Self>;
}

// ═══════════════════════════════════════════════════════════════════════
// Primitives
// ═══════════════════════════════════════════════════════════════════════

/// Upper bound on pre-allocation from an untrusted count.
const MAX_PREALLOCATED: usize = 1024;

pub(crate) fn write_count<W: Write>(w: &mut W, count: usize) -> CodecResult<()> {
    if count < 0xFFFF {
        w.write_u16::<LittleEndian>(count as u16)?;
    } else {
        let count = u32::try_from(count).map_err(|_| CodecError::ValueOutOfRange {
            field: "element count",
            value: count as u64,
        })?;
        w.write_u16::<LittleEndian>(0xFFFF)?;
        w.write_u32::<LittleEndian>(count)?;
    }
    Ok(())
}

pub(crate) fn read_count<R: Read>(r: &mut R) -> CodecResult<usize> {
    let short = r.read_u16::<LittleEndian>()?;
    if short != 0xFFFF {
        return Ok(short as usize);
    }
    Ok(r.read_u32::<LittleEndian>()? as usize)
}

pub(crate) fn write_string<W: Write>(w: &mut W, s: &str) -> CodecResult<()> {
    let len = s.len();
    if len < 0xFF {
        w.write_u8(len as u8)?;
    } else if len < 0xFFFF {
        w.write_u8(0xFF)?;
        w.write_u16::<LittleEndian>(len as u16)?;
    } else {
        let len = u32::try_from(len).map_err(|_| CodecError::ValueOutOfRange {
            field: "string length",
            value: len as u64,
        })?;
        w.write_u8(0xFF)?;
        w.write_u16::<LittleEndian>(0xFFFF)?;
        w.write_u32::<LittleEndian>(len)?;
    }
    w.write_all(s.as_bytes())?;
    Ok(())
}

pub(crate) fn read_string<R: Read>(r: &mut R) -> CodecResult<String> {
    let mut len = r.read_u8()? as u64;
    if len == 0xFF {
        len = r.read_u16::<LittleEndian>()? as u64;
        if len == 0xFFFF {
            len = r.read_u32::<LittleEndian>()? as u64;
        }
    }

    let mut bytes = Vec::with_capacity((len as usize).min(MAX_PREALLOCATED));
    r.by_ref().take(len).read_to_end(&mut bytes)?;
    if bytes.len() as u64 != len {
        return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
    }
    String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)
}

/// Rectangles are stored as left, top, right, bottom.
pub(crate) fn write_rect<W: Write>(w: &mut W, rect: &Rect) -> CodecResult<()> {
    w.write_i32::<LittleEndian>(rect.left)?;
    w.write_i32::<LittleEndian>(rect.top)?;
    w.write_i32::<LittleEndian>(rect.right())?;
    w.write_i32::<LittleEndian>(rect.bottom())?;
    Ok(())
}

pub(crate) fn read_rect<R: Read>(r: &mut R) -> CodecResult<Rect> {
    let left = r.read_i32::<LittleEndian>()?;
    let top = r.read_i32::<LittleEndian>()?;
    let right = r.read_i32::<LittleEndian>()?;
    let bottom = r.read_i32::<LittleEndian>()?;
    Ok(Rect::new(
        left,
        top,
        right.wrapping_sub(left),
        bottom.wrapping_sub(top),
    ))
}

pub(crate) fn write_vec<W: Write, T: Serializable>(w: &mut W, items: &[T]) -> CodecResult<()> {
    write_count(w, items.len())?;
    for item in items {
        item.serialize(w)?;
    }
    Ok(())
}

pub(crate) fn read_vec<R: Read, T: Serializable>(
    r: &mut R,
    version: FileVersion,
) -> CodecResult<Vec<T>> {
    let count = read_count(r)?;
    let mut items = Vec::with_capacity(count.min(MAX_PREALLOCATED));
    for _ in 0..count {
        items.push(T::deserialize(r, version)?);
    }
    Ok(items)
}

/// Timeline positions are stored in one byte.
pub(crate) fn write_position<W: Write>(w: &mut W, position: u32) -> CodecResult<()> {
    let byte = u8::try_from(position).map_err(|_| CodecError::ValueOutOfRange {
        field: "position",
        value: position as u64,
    })?;
    w.write_u8(byte)?;
    Ok(())
}

pub(crate) fn read_position<R: Read>(r: &mut R) -> CodecResult<u32> {
    Ok(r.read_u8()? as u32)
}

/// Packs up to eight flags, first flag in the lowest bit.
pub(crate) fn pack_flags(flags: &[bool]) -> u8 {
    flags
        .iter()
        .enumerate()
        .fold(0u8, |acc, (i, &f)| if f { acc | (1 << i) } else { acc })
}

pub(crate) fn flag(byte: u8, bit: u8) -> bool {
    byte & (1 << bit) != 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn count_uses_escape_above_u16() {
        let mut buf = Vec::new();
        write_count(&mut buf, 3).unwrap();
        assert_eq!(buf, vec![0x03, 0x00]);

        buf.clear();
        write_count(&mut buf, 0x1_0000).unwrap();
        assert_eq!(buf, vec![0xFF, 0xFF, 0x00, 0x00, 0x01, 0x00]);
        assert_eq!(read_count(&mut Cursor::new(&buf)).unwrap(), 0x1_0000);
    }

    #[test]
    fn string_length_prefix() {
        let mut buf = Vec::new();
        write_string(&mut buf, "Am7").unwrap();
        assert_eq!(buf, vec![3, b'A', b'm', b'7']);

        let long = "x".repeat(300);
        buf.clear();
        write_string(&mut buf, &long).unwrap();
        assert_eq!(&buf[..3], &[0xFF, 0x2C, 0x01]);
        assert_eq!(read_string(&mut Cursor::new(&buf)).unwrap(), long);
    }

    #[test]
    fn truncated_string_is_an_error() {
        let buf = vec![5, b'a', b'b'];
        assert!(matches!(
            read_string(&mut Cursor::new(&buf)),
            Err(CodecError::Io(_))
        ));
    }

    #[test]
    fn rect_is_stored_as_edges() {
        let mut buf = Vec::new();
        write_rect(&mut buf, &Rect::new(50, 20, 750, 120)).unwrap();
        let edges: Vec<i32> = buf
            .chunks(4)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(edges, vec![50, 20, 800, 140]);
        assert_eq!(
            read_rect(&mut Cursor::new(&buf)).unwrap(),
            Rect::new(50, 20, 750, 120)
        );
    }

    #[test]
    fn versions() {
        assert!(FileVersion::from_tag(1).unwrap().is_legacy());
        assert!(FileVersion::from_tag(2).unwrap().is_legacy());
        assert!(!FileVersion::from_tag(3).unwrap().is_legacy());
        assert_eq!(FileVersion::CURRENT.tag(), 4);
        assert!(matches!(
            FileVersion::from_tag(9),
            Err(CodecError::UnsupportedVersion(9))
        ));
    }
}
