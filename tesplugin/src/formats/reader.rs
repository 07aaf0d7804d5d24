//! Plugin file reading
//!
//! Parses a TES4 plugin into typed dialog topics plus an editor-id index
//! over every other record. Dialog groups are decoded in full; all other
//! top groups are skimmed only for EDID subrecords, since the patcher
//! resolves named vanilla records (globals, quests, form lists, placed
//! references) by editor id.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use flate2::read::ZlibDecoder;
use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::formats::dialog::{DialogResponse, DialogTopic};
use crate::formats::headers::{
    FourCc, GroupHeader, RecordHeader, DIAL, GROUP_TOPIC_CHILDREN, GRUP, HEADER_SIZE, INFO, TES4,
};
use crate::formats::masters::MasterTable;
use crate::formats::subrecord::{parse_subrecords, Subrecord};
use crate::formkey::FormKey;

const MAST: FourCc = FourCc::new(b"MAST");
const EDID: FourCc = FourCc::new(b"EDID");

/// A parsed plugin: its dialog topics plus the editor-id index.
#[derive(Debug, Clone)]
pub struct Plugin {
    /// File name, e.g. `Skyrim.esm`.
    pub name: String,
    /// Master table for form id translation.
    pub masters: MasterTable,
    /// DIAL records with their INFO children, in file order.
    pub topics: IndexMap<FormKey, DialogTopic>,
    /// Editor id to record identity, across every record type.
    pub editor_ids: HashMap<String, FormKey>,
}

/// Read and parse a plugin file.
///
/// # Errors
/// Returns [`Error::PluginNotFound`] for a missing file and parse errors
/// for malformed content.
pub fn read_plugin<P: AsRef<Path>>(path: P) -> Result<Plugin> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(Error::PluginNotFound {
            path: path.to_path_buf(),
        });
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut file = File::open(path)?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;
    parse_plugin_bytes(&name, &buffer)
}

/// Parse plugin data from bytes.
///
/// # Errors
/// Returns [`Error::InvalidPluginMagic`] if the data does not start with a
/// TES4 header record, and parse errors for malformed dialog groups.
pub fn parse_plugin_bytes(name: &str, data: &[u8]) -> Result<Plugin> {
    let mut walker = Walker::new(data);

    let (header, header_data) = walker.next_record()?;
    if header.record_type != TES4 {
        return Err(Error::InvalidPluginMagic(header.record_type.0));
    }
    let masters = read_master_table(name, &header_data)?;

    let mut plugin = Plugin {
        name: name.to_string(),
        masters,
        topics: IndexMap::new(),
        editor_ids: HashMap::new(),
    };

    while !walker.at_end() {
        let group = walker.next_group()?;
        if group.header.label == DIAL.0 {
            parse_dialog_group(group, &mut plugin)?;
        } else {
            skim_group(group, &mut plugin);
        }
    }

    tracing::debug!(
        plugin = plugin.name,
        topics = plugin.topics.len(),
        editor_ids = plugin.editor_ids.len(),
        "parsed plugin"
    );
    Ok(plugin)
}

fn read_master_table(name: &str, header_data: &[u8]) -> Result<MasterTable> {
    let subrecords = parse_subrecords(header_data)?;
    let masters = subrecords
        .iter()
        .filter(|sub| sub.fourcc == MAST)
        .map(Subrecord::as_zstring)
        .collect();
    Ok(MasterTable::new(name, masters))
}

/// A slice cursor over record and group framing.
struct Walker<'a> {
    data: &'a [u8],
    pos: usize,
}

/// One group's header plus a walker over its content.
struct Group<'a> {
    header: GroupHeader,
    content: Walker<'a>,
}

impl<'a> Walker<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn peek_fourcc(&self) -> Result<FourCc> {
        let end = self.pos + 4;
        if end > self.data.len() {
            return Err(Error::UnexpectedEof);
        }
        Ok(FourCc([
            self.data[self.pos],
            self.data[self.pos + 1],
            self.data[self.pos + 2],
            self.data[self.pos + 3],
        ]))
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos + len;
        if end > self.data.len() {
            return Err(Error::UnexpectedEof);
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Consume a record header plus its (decompressed) data.
    fn next_record(&mut self) -> Result<(RecordHeader, Vec<u8>)> {
        let mut header_bytes = self.take(HEADER_SIZE as usize)?;
        let fourcc = FourCc::read(&mut header_bytes)?;
        let header = RecordHeader::read_after_type(fourcc, &mut header_bytes)?;
        let raw = self.take(header.data_size as usize)?;
        let data = if header.is_compressed() {
            decompress_record(&header, raw)?
        } else {
            raw.to_vec()
        };
        Ok((header, data))
    }

    /// Consume a group header plus a walker over its content.
    fn next_group(&mut self) -> Result<Group<'a>> {
        let mut header_bytes = self.take(HEADER_SIZE as usize)?;
        let fourcc = FourCc::read(&mut header_bytes)?;
        if fourcc != GRUP {
            return Err(Error::InvalidGroupMagic(fourcc.0));
        }
        let header = GroupHeader::read_after_type(&mut header_bytes)?;
        let content = self.take(header.content_size() as usize)?;
        Ok(Group {
            header,
            content: Walker::new(content),
        })
    }
}

fn decompress_record(header: &RecordHeader, raw: &[u8]) -> Result<Vec<u8>> {
    if raw.len() < 4 {
        return Err(Error::UnexpectedEof);
    }
    let expected = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
    let mut decoder = ZlibDecoder::new(&raw[4..]);
    let mut data = Vec::with_capacity(expected);
    decoder
        .read_to_end(&mut data)
        .map_err(|e| Error::Decompression {
            form_id: header.form_id,
            message: e.to_string(),
        })?;
    Ok(data)
}

fn parse_dialog_group(mut group: Group<'_>, plugin: &mut Plugin) -> Result<()> {
    while !group.content.at_end() {
        let fourcc = group.content.peek_fourcc()?;
        if fourcc == GRUP {
            // Topic children arrive right after their DIAL record.
            let children = group.content.next_group()?;
            if children.header.group_type != GROUP_TOPIC_CHILDREN {
                continue;
            }
            let label_raw = u32::from_le_bytes(children.header.label);
            let owner = plugin.masters.resolve(label_raw)?;
            let responses = parse_topic_children(children, plugin)?;
            if let Some(topic) = plugin.topics.get_mut(&owner) {
                topic.responses = responses;
            } else {
                tracing::warn!(
                    plugin = plugin.name,
                    topic = %owner,
                    "topic children group without a preceding DIAL record"
                );
            }
            continue;
        }
        let (header, data) = group.content.next_record()?;
        if header.record_type != DIAL {
            continue;
        }
        let form_key = plugin.masters.resolve(header.form_id)?;
        let subrecords = parse_subrecords(&data)?;
        let topic = DialogTopic::parse(form_key.clone(), &subrecords, &plugin.masters)?;
        if let Some(editor_id) = &topic.editor_id {
            plugin
                .editor_ids
                .insert(editor_id.clone(), form_key.clone());
        }
        plugin.topics.insert(form_key, topic);
    }
    Ok(())
}

fn parse_topic_children(mut group: Group<'_>, plugin: &Plugin) -> Result<Vec<DialogResponse>> {
    let mut responses = Vec::new();
    while !group.content.at_end() {
        let (header, data) = group.content.next_record()?;
        if header.record_type != INFO {
            continue;
        }
        let form_key = plugin.masters.resolve(header.form_id)?;
        let subrecords = parse_subrecords(&data)?;
        responses.push(DialogResponse::parse(form_key, &subrecords, &plugin.masters)?);
    }
    Ok(responses)
}

/// Walk a non-dialog group, collecting editor ids. Nested groups recurse;
/// records that fail to decode are skipped rather than failing the load,
/// since only their EDID matters here.
fn skim_group(mut group: Group<'_>, plugin: &mut Plugin) {
    while !group.content.at_end() {
        let Ok(fourcc) = group.content.peek_fourcc() else {
            return;
        };
        if fourcc == GRUP {
            match group.content.next_group() {
                Ok(nested) => skim_group(nested, plugin),
                Err(_) => return,
            }
            continue;
        }
        let Ok((header, data)) = group.content.next_record() else {
            return;
        };
        let Ok(form_key) = plugin.masters.resolve(header.form_id) else {
            continue;
        };
        if let Some(editor_id) = skim_editor_id(&data) {
            plugin.editor_ids.insert(editor_id, form_key);
        }
    }
}

/// Pull the EDID out of raw record data without a full subrecord parse of
/// the whole record.
fn skim_editor_id(data: &[u8]) -> Option<String> {
    let mut pos = 0usize;
    while pos + 6 <= data.len() {
        let fourcc = FourCc([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]);
        let size = u16::from_le_bytes([data[pos + 4], data[pos + 5]]) as usize;
        pos += 6;
        if pos + size > data.len() {
            return None;
        }
        if fourcc == EDID {
            return Some(Subrecord::new(EDID, data[pos..pos + size].to_vec()).as_zstring());
        }
        pos += size;
    }
    None
}
