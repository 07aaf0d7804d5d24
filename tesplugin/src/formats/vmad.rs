//! VMAD script data
//!
//! The subset of the virtual machine adapter subrecord that dialog
//! patching touches: attached scripts with their properties, and the
//! OnBegin/OnEnd script fragments INFO records use to run quest code.
//! Property values of every documented type round-trip; the object format
//! is the v2 layout used by form version 44 plugins.

use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};
use crate::formats::masters::MasterTable;
use crate::formkey::FormKey;

/// VMAD version written for new script data.
pub const VMAD_VERSION: i16 = 5;
/// Object format written for new script data.
pub const OBJECT_FORMAT: i16 = 2;

/// Property status marking a locally edited value.
pub const PROPERTY_EDITED: u8 = 1;

const FRAGMENT_ON_BEGIN: u8 = 0x01;
const FRAGMENT_ON_END: u8 = 0x02;

/// A form reference inside script data, with its alias slot.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRef {
    pub form: Option<FormKey>,
    pub alias: i16,
}

impl ObjectRef {
    /// A plain reference to a record, no alias.
    #[must_use]
    pub fn form(key: FormKey) -> Self {
        Self {
            form: Some(key),
            alias: -1,
        }
    }

    fn parse<R: Read>(reader: &mut R, masters: &MasterTable) -> Result<Self> {
        let _unused = reader.read_u16::<LittleEndian>()?;
        let alias = reader.read_i16::<LittleEndian>()?;
        let raw = reader.read_u32::<LittleEndian>()?;
        let form = if raw == 0 {
            None
        } else {
            Some(masters.resolve(raw)?)
        };
        Ok(Self { form, alias })
    }

    fn encode<W: Write>(&self, writer: &mut W, masters: &MasterTable) -> Result<()> {
        writer.write_u16::<LittleEndian>(0)?;
        writer.write_i16::<LittleEndian>(self.alias)?;
        let raw = match &self.form {
            Some(key) => masters.encode(key)?,
            None => 0,
        };
        writer.write_u32::<LittleEndian>(raw)?;
        Ok(())
    }
}

/// A script property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Object(ObjectRef),
    String(String),
    Int(i32),
    Float(f32),
    Bool(bool),
    ObjectArray(Vec<ObjectRef>),
    StringArray(Vec<String>),
    IntArray(Vec<i32>),
    FloatArray(Vec<f32>),
    BoolArray(Vec<bool>),
}

impl PropertyValue {
    fn type_id(&self) -> u8 {
        match self {
            Self::Object(_) => 1,
            Self::String(_) => 2,
            Self::Int(_) => 3,
            Self::Float(_) => 4,
            Self::Bool(_) => 5,
            Self::ObjectArray(_) => 11,
            Self::StringArray(_) => 12,
            Self::IntArray(_) => 13,
            Self::FloatArray(_) => 14,
            Self::BoolArray(_) => 15,
        }
    }
}

/// A named script property.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub status: u8,
    pub value: PropertyValue,
}

impl Property {
    /// An edited object property pointing at a record, the shape quest
    /// properties on dialog fragments take.
    #[must_use]
    pub fn object(name: impl Into<String>, target: FormKey) -> Self {
        Self {
            name: name.into(),
            status: PROPERTY_EDITED,
            value: PropertyValue::Object(ObjectRef::form(target)),
        }
    }
}

/// One attached script.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub name: String,
    pub status: u8,
    pub properties: Vec<Property>,
}

/// One OnBegin/OnEnd fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub unknown: u8,
    pub script_name: String,
    pub fragment_name: String,
}

impl Fragment {
    #[must_use]
    pub fn new(script_name: impl Into<String>, fragment_name: impl Into<String>) -> Self {
        Self {
            unknown: 0,
            script_name: script_name.into(),
            fragment_name: fragment_name.into(),
        }
    }
}

/// The fragment section of an INFO's script data.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FragmentData {
    pub unknown: u8,
    pub file_name: String,
    pub on_begin: Option<Fragment>,
    pub on_end: Option<Fragment>,
}

/// Decoded VMAD payload for an INFO record.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptData {
    pub version: i16,
    pub obj_format: i16,
    pub scripts: Vec<Script>,
    pub fragments: Option<FragmentData>,
}

impl Default for ScriptData {
    fn default() -> Self {
        Self {
            version: VMAD_VERSION,
            obj_format: OBJECT_FORMAT,
            scripts: Vec::new(),
            fragments: None,
        }
    }
}

fn read_wstring<R: Read>(reader: &mut R) -> Result<String> {
    let len = reader.read_u16::<LittleEndian>()?;
    let mut buf = vec![0u8; usize::from(len)];
    reader.read_exact(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn write_wstring<W: Write>(writer: &mut W, s: &str) -> Result<()> {
    let bytes = s.as_bytes();
    let len = u16::try_from(bytes.len())
        .map_err(|_| Error::InvalidScriptData(format!("string too long: {} bytes", bytes.len())))?;
    writer.write_u16::<LittleEndian>(len)?;
    writer.write_all(bytes)?;
    Ok(())
}

fn parse_value<R: Read>(type_id: u8, reader: &mut R, masters: &MasterTable) -> Result<PropertyValue> {
    let value = match type_id {
        1 => PropertyValue::Object(ObjectRef::parse(reader, masters)?),
        2 => PropertyValue::String(read_wstring(reader)?),
        3 => PropertyValue::Int(reader.read_i32::<LittleEndian>()?),
        4 => PropertyValue::Float(reader.read_f32::<LittleEndian>()?),
        5 => PropertyValue::Bool(reader.read_u8()? != 0),
        11 => {
            let count = reader.read_u32::<LittleEndian>()?;
            let mut items = Vec::with_capacity(count as usize);
            for _ in 0..count {
                items.push(ObjectRef::parse(reader, masters)?);
            }
            PropertyValue::ObjectArray(items)
        }
        12 => {
            let count = reader.read_u32::<LittleEndian>()?;
            let mut items = Vec::with_capacity(count as usize);
            for _ in 0..count {
                items.push(read_wstring(reader)?);
            }
            PropertyValue::StringArray(items)
        }
        13 => {
            let count = reader.read_u32::<LittleEndian>()?;
            let mut items = Vec::with_capacity(count as usize);
            for _ in 0..count {
                items.push(reader.read_i32::<LittleEndian>()?);
            }
            PropertyValue::IntArray(items)
        }
        14 => {
            let count = reader.read_u32::<LittleEndian>()?;
            let mut items = Vec::with_capacity(count as usize);
            for _ in 0..count {
                items.push(reader.read_f32::<LittleEndian>()?);
            }
            PropertyValue::FloatArray(items)
        }
        15 => {
            let count = reader.read_u32::<LittleEndian>()?;
            let mut items = Vec::with_capacity(count as usize);
            for _ in 0..count {
                items.push(reader.read_u8()? != 0);
            }
            PropertyValue::BoolArray(items)
        }
        other => {
            return Err(Error::InvalidScriptData(format!(
                "unknown property type {other}"
            )))
        }
    };
    Ok(value)
}

fn encode_value<W: Write>(value: &PropertyValue, writer: &mut W, masters: &MasterTable) -> Result<()> {
    match value {
        PropertyValue::Object(obj) => obj.encode(writer, masters)?,
        PropertyValue::String(s) => write_wstring(writer, s)?,
        PropertyValue::Int(v) => writer.write_i32::<LittleEndian>(*v)?,
        PropertyValue::Float(v) => writer.write_f32::<LittleEndian>(*v)?,
        PropertyValue::Bool(v) => writer.write_u8(u8::from(*v))?,
        PropertyValue::ObjectArray(items) => {
            writer.write_u32::<LittleEndian>(items.len() as u32)?;
            for item in items {
                item.encode(writer, masters)?;
            }
        }
        PropertyValue::StringArray(items) => {
            writer.write_u32::<LittleEndian>(items.len() as u32)?;
            for item in items {
                write_wstring(writer, item)?;
            }
        }
        PropertyValue::IntArray(items) => {
            writer.write_u32::<LittleEndian>(items.len() as u32)?;
            for item in items {
                writer.write_i32::<LittleEndian>(*item)?;
            }
        }
        PropertyValue::FloatArray(items) => {
            writer.write_u32::<LittleEndian>(items.len() as u32)?;
            for item in items {
                writer.write_f32::<LittleEndian>(*item)?;
            }
        }
        PropertyValue::BoolArray(items) => {
            writer.write_u32::<LittleEndian>(items.len() as u32)?;
            for item in items {
                writer.write_u8(u8::from(*item))?;
            }
        }
    }
    Ok(())
}

fn parse_fragment<R: Read>(reader: &mut R) -> Result<Fragment> {
    Ok(Fragment {
        unknown: reader.read_u8()?,
        script_name: read_wstring(reader)?,
        fragment_name: read_wstring(reader)?,
    })
}

fn encode_fragment<W: Write>(fragment: &Fragment, writer: &mut W) -> Result<()> {
    writer.write_u8(fragment.unknown)?;
    write_wstring(writer, &fragment.script_name)?;
    write_wstring(writer, &fragment.fragment_name)?;
    Ok(())
}

impl ScriptData {
    /// Decode an INFO record's VMAD payload.
    ///
    /// # Errors
    /// Returns [`Error::InvalidScriptData`] on unknown property types and
    /// form resolution errors from the master table.
    pub fn parse(data: &[u8], masters: &MasterTable) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        let version = cursor.read_i16::<LittleEndian>()?;
        let obj_format = cursor.read_i16::<LittleEndian>()?;
        let script_count = cursor.read_u16::<LittleEndian>()?;

        let mut scripts = Vec::with_capacity(usize::from(script_count));
        for _ in 0..script_count {
            let name = read_wstring(&mut cursor)?;
            let status = cursor.read_u8()?;
            let property_count = cursor.read_u16::<LittleEndian>()?;
            let mut properties = Vec::with_capacity(usize::from(property_count));
            for _ in 0..property_count {
                let prop_name = read_wstring(&mut cursor)?;
                let type_id = cursor.read_u8()?;
                let prop_status = cursor.read_u8()?;
                properties.push(Property {
                    name: prop_name,
                    status: prop_status,
                    value: parse_value(type_id, &mut cursor, masters)?,
                });
            }
            scripts.push(Script {
                name,
                status,
                properties,
            });
        }

        // INFO records append a fragment section when any fragments exist.
        let fragments = if cursor.position() < data.len() as u64 {
            let unknown = cursor.read_u8()?;
            let flags = cursor.read_u8()?;
            let file_name = read_wstring(&mut cursor)?;
            let on_begin = if flags & FRAGMENT_ON_BEGIN != 0 {
                Some(parse_fragment(&mut cursor)?)
            } else {
                None
            };
            let on_end = if flags & FRAGMENT_ON_END != 0 {
                Some(parse_fragment(&mut cursor)?)
            } else {
                None
            };
            Some(FragmentData {
                unknown,
                file_name,
                on_begin,
                on_end,
            })
        } else {
            None
        };

        Ok(Self {
            version,
            obj_format,
            scripts,
            fragments,
        })
    }

    /// Encode the VMAD payload against a master table.
    ///
    /// # Errors
    /// Returns form encoding errors from the master table.
    pub fn encode(&self, masters: &MasterTable) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.write_i16::<LittleEndian>(self.version)?;
        buf.write_i16::<LittleEndian>(self.obj_format)?;
        buf.write_u16::<LittleEndian>(self.scripts.len() as u16)?;
        for script in &self.scripts {
            write_wstring(&mut buf, &script.name)?;
            buf.write_u8(script.status)?;
            buf.write_u16::<LittleEndian>(script.properties.len() as u16)?;
            for property in &script.properties {
                write_wstring(&mut buf, &property.name)?;
                buf.write_u8(property.value.type_id())?;
                buf.write_u8(property.status)?;
                encode_value(&property.value, &mut buf, masters)?;
            }
        }
        if let Some(fragments) = &self.fragments {
            let mut flags = 0u8;
            if fragments.on_begin.is_some() {
                flags |= FRAGMENT_ON_BEGIN;
            }
            if fragments.on_end.is_some() {
                flags |= FRAGMENT_ON_END;
            }
            buf.write_u8(fragments.unknown)?;
            buf.write_u8(flags)?;
            write_wstring(&mut buf, &fragments.file_name)?;
            if let Some(fragment) = &fragments.on_begin {
                encode_fragment(fragment, &mut buf)?;
            }
            if let Some(fragment) = &fragments.on_end {
                encode_fragment(fragment, &mut buf)?;
            }
        }
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn masters() -> MasterTable {
        MasterTable::new("HHITPC.esp", vec!["Skyrim.esm".to_string()])
    }

    #[test]
    fn scripts_and_fragments_round_trip() {
        let masters = masters();
        let data = ScriptData {
            scripts: vec![Script {
                name: "TIF__000D7933".to_string(),
                status: 0,
                properties: vec![
                    Property::object("pFDS", FormKey::new("Skyrim.esm", 0x034D31)),
                    Property {
                        name: "Count".to_string(),
                        status: PROPERTY_EDITED,
                        value: PropertyValue::Int(3),
                    },
                ],
            }],
            fragments: Some(FragmentData {
                unknown: 2,
                file_name: "TIF__000D7933".to_string(),
                on_begin: Some(Fragment::new("TIF__000D7933", "Fragment_1")),
                on_end: None,
            }),
            ..ScriptData::default()
        };

        let bytes = data.encode(&masters).unwrap();
        let read = ScriptData::parse(&bytes, &masters).unwrap();
        assert_eq!(read, data);
    }

    #[test]
    fn empty_script_data_has_no_fragment_section() {
        let masters = masters();
        let data = ScriptData::default();
        let bytes = data.encode(&masters).unwrap();
        assert_eq!(bytes.len(), 6);
        let read = ScriptData::parse(&bytes, &masters).unwrap();
        assert!(read.fragments.is_none());
    }

    #[test]
    fn array_properties_round_trip() {
        let masters = masters();
        let data = ScriptData {
            scripts: vec![Script {
                name: "WEPersuadeScript".to_string(),
                status: 0,
                properties: vec![Property {
                    name: "Stages".to_string(),
                    status: PROPERTY_EDITED,
                    value: PropertyValue::IntArray(vec![10, 20, 200]),
                }],
            }],
            ..ScriptData::default()
        };
        let bytes = data.encode(&masters).unwrap();
        assert_eq!(ScriptData::parse(&bytes, &masters).unwrap(), data);
    }
}
