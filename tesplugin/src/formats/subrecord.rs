//! Subrecord framing
//!
//! Record data is a packed sequence of subrecords: a four-character
//! signature, a u16 payload length, then the payload. The `XXXX` extension
//! subrecord carries a u32 length for the subrecord that follows it.

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::error::{Error, Result};
use crate::formats::headers::FourCc;

/// Extension subrecord overriding the next subrecord's length.
pub const XXXX: FourCc = FourCc::new(b"XXXX");

/// A decoded subrecord: signature plus raw payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subrecord {
    pub fourcc: FourCc,
    pub data: Vec<u8>,
}

impl Subrecord {
    #[must_use]
    pub fn new(fourcc: FourCc, data: Vec<u8>) -> Self {
        Self { fourcc, data }
    }

    /// A subrecord holding a null-terminated string.
    #[must_use]
    pub fn zstring(fourcc: FourCc, s: &str) -> Self {
        let mut data = Vec::with_capacity(s.len() + 1);
        data.extend_from_slice(s.as_bytes());
        data.push(0);
        Self { fourcc, data }
    }

    /// A subrecord holding a single little-endian u32.
    #[must_use]
    pub fn u32(fourcc: FourCc, value: u32) -> Self {
        Self {
            fourcc,
            data: value.to_le_bytes().to_vec(),
        }
    }

    /// Interpret the payload as a null-terminated string.
    #[must_use]
    pub fn as_zstring(&self) -> String {
        let end = self
            .data
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.data.len());
        String::from_utf8_lossy(&self.data[..end]).into_owned()
    }

    /// Interpret the payload as a single little-endian u32.
    ///
    /// # Errors
    /// Returns [`Error::SubrecordSize`] if the payload is not 4 bytes.
    pub fn as_u32(&self) -> Result<u32> {
        let bytes: [u8; 4] = self.data.as_slice().try_into().map_err(|_| {
            Error::SubrecordSize {
                fourcc: self.fourcc.to_string(),
                expected: 4,
                found: self.data.len(),
            }
        })?;
        Ok(u32::from_le_bytes(bytes))
    }

    /// Write the subrecord with its u16 length prefix.
    ///
    /// Payloads over 64 KiB get an `XXXX` extension in front, matching the
    /// game's own encoding.
    ///
    /// # Errors
    /// Returns [`Error::Io`] on write failure.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        if self.data.len() > usize::from(u16::MAX) {
            XXXX.write(writer)?;
            writer.write_u16::<LittleEndian>(4)?;
            writer.write_u32::<LittleEndian>(self.data.len() as u32)?;
            self.fourcc.write(writer)?;
            writer.write_u16::<LittleEndian>(0)?;
        } else {
            self.fourcc.write(writer)?;
            writer.write_u16::<LittleEndian>(self.data.len() as u16)?;
        }
        writer.write_all(&self.data)?;
        Ok(())
    }

    /// Encoded size on disk, including framing.
    #[must_use]
    pub fn encoded_size(&self) -> u32 {
        let base = 6 + self.data.len() as u32;
        if self.data.len() > usize::from(u16::MAX) {
            base + 10 // leading XXXX subrecord
        } else {
            base
        }
    }
}

/// Decode all subrecords in a record's data buffer, folding `XXXX`
/// extensions into the subrecord they describe.
///
/// # Errors
/// Returns [`Error::SubrecordOverrun`] if a declared length runs past the
/// end of the buffer.
pub fn parse_subrecords(data: &[u8]) -> Result<Vec<Subrecord>> {
    let mut subrecords = Vec::new();
    let mut pos = 0usize;
    let mut extended_size: Option<u32> = None;

    while pos + 6 <= data.len() {
        let fourcc = FourCc([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]);
        let declared = u16::from_le_bytes([data[pos + 4], data[pos + 5]]) as usize;
        pos += 6;

        let size = match extended_size.take() {
            Some(ext) => ext as usize,
            None => declared,
        };
        if pos + size > data.len() {
            return Err(Error::SubrecordOverrun {
                fourcc: fourcc.to_string(),
            });
        }
        let payload = data[pos..pos + size].to_vec();
        pos += size;

        if fourcc == XXXX {
            let bytes: [u8; 4] = payload.as_slice().try_into().map_err(|_| {
                Error::SubrecordSize {
                    fourcc: XXXX.to_string(),
                    expected: 4,
                    found: payload.len(),
                }
            })?;
            extended_size = Some(u32::from_le_bytes(bytes));
            continue;
        }
        subrecords.push(Subrecord::new(fourcc, payload));
    }

    if pos != data.len() {
        // Trailing bytes too short to frame a subrecord.
        return Err(Error::UnexpectedEof);
    }
    Ok(subrecords)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EDID: FourCc = FourCc::new(b"EDID");
    const PNAM: FourCc = FourCc::new(b"PNAM");

    #[test]
    fn parse_packed_subrecords() {
        let mut buf = Vec::new();
        Subrecord::zstring(EDID, "SomeTopic").write(&mut buf).unwrap();
        Subrecord::u32(PNAM, 0xDEAD).write(&mut buf).unwrap();

        let subrecords = parse_subrecords(&buf).unwrap();
        assert_eq!(subrecords.len(), 2);
        assert_eq!(subrecords[0].as_zstring(), "SomeTopic");
        assert_eq!(subrecords[1].as_u32().unwrap(), 0xDEAD);
    }

    #[test]
    fn overrun_is_an_error() {
        let mut buf = Vec::new();
        Subrecord::zstring(EDID, "Truncated").write(&mut buf).unwrap();
        buf.truncate(buf.len() - 2);
        assert!(parse_subrecords(&buf).is_err());
    }

    #[test]
    fn xxxx_extension_round_trip() {
        let big = vec![0xABu8; usize::from(u16::MAX) + 10];
        let sub = Subrecord::new(PNAM, big.clone());
        let mut buf = Vec::new();
        sub.write(&mut buf).unwrap();
        assert_eq!(buf.len() as u32, sub.encoded_size());

        let parsed = parse_subrecords(&buf).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].fourcc, PNAM);
        assert_eq!(parsed[0].data, big);
    }
}
