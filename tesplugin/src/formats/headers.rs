//! Record and group headers
//!
//! Every record and group in a TES4 plugin starts with a 24-byte header.
//! Records carry a type signature, size, flags and a raw form id; groups
//! carry the GRUP signature, a size that includes the header itself, a
//! label and a group type.

use std::fmt;
use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};

/// Size in bytes of record and group headers.
pub const HEADER_SIZE: u32 = 24;

/// Record flag: the record data is zlib-compressed.
pub const FLAG_COMPRESSED: u32 = 0x0004_0000;

/// TES4 header flag: the plugin is a master file.
pub const FLAG_MASTER: u32 = 0x0000_0001;

/// TES4 header flag: the plugin is a light (ESL) file.
pub const FLAG_LIGHT: u32 = 0x0000_0200;

/// Form version written into new records (Skyrim SE).
pub const FORM_VERSION: u16 = 44;

/// Group type: top-level group, label is a record signature.
pub const GROUP_TOP: i32 = 0;

/// Group type: children of a dialog topic, label is the topic's form id.
pub const GROUP_TOPIC_CHILDREN: i32 = 7;

/// A four-character record or subrecord signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    /// Build a signature from a 4-byte string literal.
    #[must_use]
    pub const fn new(s: &[u8; 4]) -> Self {
        Self(*s)
    }

    /// Read a signature from a stream.
    ///
    /// # Errors
    /// Returns [`Error::Io`] on a short read.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf)?;
        Ok(Self(buf))
    }

    /// Write the signature to a stream.
    ///
    /// # Errors
    /// Returns [`Error::Io`] on write failure.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.0)?;
        Ok(())
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            // Signatures are ASCII; anything else renders as an escape.
            if b.is_ascii_graphic() {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

pub const TES4: FourCc = FourCc::new(b"TES4");
pub const GRUP: FourCc = FourCc::new(b"GRUP");
pub const DIAL: FourCc = FourCc::new(b"DIAL");
pub const INFO: FourCc = FourCc::new(b"INFO");

/// The 24-byte header in front of every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Record type signature.
    pub record_type: FourCc,
    /// Size of the record data, excluding this header.
    pub data_size: u32,
    /// Record flags (see [`FLAG_COMPRESSED`] and friends).
    pub flags: u32,
    /// Raw form id, relative to the owning plugin's master table.
    pub form_id: u32,
    /// Version-control timestamp.
    pub timestamp: u16,
    /// Version-control info.
    pub vc_info: u16,
    /// Internal form version.
    pub version: u16,
    /// Unknown trailing field.
    pub unknown: u16,
}

impl RecordHeader {
    /// A fresh header for a record created by this library.
    #[must_use]
    pub fn new(record_type: FourCc, form_id: u32) -> Self {
        Self {
            record_type,
            data_size: 0,
            flags: 0,
            form_id,
            timestamp: 0,
            vc_info: 0,
            version: FORM_VERSION,
            unknown: 0,
        }
    }

    /// Whether the record data is zlib-compressed.
    #[must_use]
    pub fn is_compressed(&self) -> bool {
        self.flags & FLAG_COMPRESSED != 0
    }

    /// Read the fields following an already-consumed type signature.
    ///
    /// # Errors
    /// Returns [`Error::Io`] on a short read.
    pub fn read_after_type<R: Read>(record_type: FourCc, reader: &mut R) -> Result<Self> {
        Ok(Self {
            record_type,
            data_size: reader.read_u32::<LittleEndian>()?,
            flags: reader.read_u32::<LittleEndian>()?,
            form_id: reader.read_u32::<LittleEndian>()?,
            timestamp: reader.read_u16::<LittleEndian>()?,
            vc_info: reader.read_u16::<LittleEndian>()?,
            version: reader.read_u16::<LittleEndian>()?,
            unknown: reader.read_u16::<LittleEndian>()?,
        })
    }

    /// Write the full 24-byte header.
    ///
    /// # Errors
    /// Returns [`Error::Io`] on write failure.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.record_type.write(writer)?;
        writer.write_u32::<LittleEndian>(self.data_size)?;
        writer.write_u32::<LittleEndian>(self.flags)?;
        writer.write_u32::<LittleEndian>(self.form_id)?;
        writer.write_u16::<LittleEndian>(self.timestamp)?;
        writer.write_u16::<LittleEndian>(self.vc_info)?;
        writer.write_u16::<LittleEndian>(self.version)?;
        writer.write_u16::<LittleEndian>(self.unknown)?;
        Ok(())
    }
}

/// The 24-byte header in front of every group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupHeader {
    /// Total size of the group, including this header.
    pub size: u32,
    /// Label: a record signature for top groups, a raw form id for
    /// topic-children groups.
    pub label: [u8; 4],
    /// Group type (see [`GROUP_TOP`], [`GROUP_TOPIC_CHILDREN`]).
    pub group_type: i32,
    /// Version-control timestamp.
    pub timestamp: u16,
    /// Version-control info.
    pub vc_info: u16,
    /// Unknown trailing field.
    pub unknown: u32,
}

impl GroupHeader {
    /// Read the fields following an already-consumed GRUP signature.
    ///
    /// # Errors
    /// Returns [`Error::GroupSizeTooSmall`] if the declared size cannot
    /// even hold the header, [`Error::Io`] on a short read.
    pub fn read_after_type<R: Read>(reader: &mut R) -> Result<Self> {
        let size = reader.read_u32::<LittleEndian>()?;
        if size < HEADER_SIZE {
            return Err(Error::GroupSizeTooSmall { size });
        }
        let mut label = [0u8; 4];
        reader.read_exact(&mut label)?;
        Ok(Self {
            size,
            label,
            group_type: reader.read_i32::<LittleEndian>()?,
            timestamp: reader.read_u16::<LittleEndian>()?,
            vc_info: reader.read_u16::<LittleEndian>()?,
            unknown: reader.read_u32::<LittleEndian>()?,
        })
    }

    /// Write the full 24-byte header.
    ///
    /// # Errors
    /// Returns [`Error::Io`] on write failure.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        GRUP.write(writer)?;
        writer.write_u32::<LittleEndian>(self.size)?;
        writer.write_all(&self.label)?;
        writer.write_i32::<LittleEndian>(self.group_type)?;
        writer.write_u16::<LittleEndian>(self.timestamp)?;
        writer.write_u16::<LittleEndian>(self.vc_info)?;
        writer.write_u32::<LittleEndian>(self.unknown)?;
        Ok(())
    }

    /// Number of payload bytes after the header.
    #[must_use]
    pub fn content_size(&self) -> u32 {
        self.size - HEADER_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn record_header_round_trip() {
        let header = RecordHeader {
            record_type: DIAL,
            data_size: 64,
            flags: FLAG_COMPRESSED,
            form_id: 0x0102_0304,
            timestamp: 7,
            vc_info: 0,
            version: FORM_VERSION,
            unknown: 0,
        };
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        assert_eq!(buf.len() as u32, HEADER_SIZE);

        let mut cursor = Cursor::new(&buf);
        let fourcc = FourCc::read(&mut cursor).unwrap();
        let read = RecordHeader::read_after_type(fourcc, &mut cursor).unwrap();
        assert_eq!(read, header);
        assert!(read.is_compressed());
    }

    #[test]
    fn group_size_must_cover_header() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&8u32.to_le_bytes());
        buf.extend_from_slice(&[0u8; 12]);
        let mut cursor = Cursor::new(&buf);
        assert!(matches!(
            GroupHeader::read_after_type(&mut cursor),
            Err(Error::GroupSizeTooSmall { size: 8 })
        ));
    }

    #[test]
    fn fourcc_displays_ascii() {
        assert_eq!(DIAL.to_string(), "DIAL");
        assert_eq!(FourCc::new(&[0x00, b'A', b'B', b'C']).to_string(), "\\x00ABC");
    }
}
