//! Patch plugin writing
//!
//! Builds a new plugin from override topics: collects the masters the
//! records actually reference, re-encodes every form key against that
//! table, and emits the TES4 header plus the DIAL top group with
//! topic-children groups for responses.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use indexmap::IndexMap;

use crate::error::Result;
use crate::formats::condition::{Condition, ConditionValue, Param};
use crate::formats::dialog::{DialogResponse, DialogTopic};
use crate::formats::headers::{
    FourCc, GroupHeader, RecordHeader, DIAL, GROUP_TOP, GROUP_TOPIC_CHILDREN, HEADER_SIZE, INFO,
    TES4,
};
use crate::formats::masters::MasterTable;
use crate::formats::subrecord::Subrecord;
use crate::formats::vmad::{PropertyValue, ScriptData};
use crate::formkey::FormKey;

const HEDR: FourCc = FourCc::new(b"HEDR");
const CNAM: FourCc = FourCc::new(b"CNAM");
const SNAM: FourCc = FourCc::new(b"SNAM");
const MAST: FourCc = FourCc::new(b"MAST");
const DATA: FourCc = FourCc::new(b"DATA");

/// Plugin header version for Skyrim SE.
const HEDR_VERSION: f32 = 1.7;

/// First object id handed out to records created in the patch.
const FIRST_OBJECT_ID: u32 = 0x800;

/// An in-memory patch plugin under construction.
#[derive(Debug, Clone)]
pub struct PatchMod {
    /// Output file name, e.g. `HHITPC.esp`.
    pub name: String,
    /// TES4 author field.
    pub author: String,
    /// TES4 description field.
    pub description: String,
    /// Load order used to sort the collected master list.
    master_order: Vec<String>,
    /// Override topics, keyed by identity, in insertion order.
    pub topics: IndexMap<FormKey, DialogTopic>,
    next_object_id: u32,
}

impl PatchMod {
    /// Create an empty patch. `master_order` is the load order the patch
    /// was built against; collected masters sort by their position in it.
    #[must_use]
    pub fn new(name: impl Into<String>, master_order: Vec<String>) -> Self {
        Self {
            name: name.into(),
            author: String::new(),
            description: String::new(),
            master_order,
            topics: IndexMap::new(),
            next_object_id: FIRST_OBJECT_ID,
        }
    }

    /// Get the override for a topic, inserting a deep copy on first use.
    pub fn get_or_add_override(&mut self, topic: &DialogTopic) -> &mut DialogTopic {
        self.topics
            .entry(topic.form_key.clone())
            .or_insert_with(|| topic.clone())
    }

    /// Allocate an identity for a record created by this patch.
    pub fn new_form_key(&mut self) -> FormKey {
        let key = FormKey::new(self.name.clone(), self.next_object_id);
        self.next_object_id += 1;
        key
    }

    /// A fresh response owned by this patch.
    pub fn new_response(&mut self) -> DialogResponse {
        DialogResponse::new(self.new_form_key())
    }

    /// The master table the written plugin will carry: every plugin any
    /// contained form key references, in load order.
    #[must_use]
    pub fn master_table(&self) -> MasterTable {
        let mut used: Vec<String> = Vec::new();
        let mut note = |key: &FormKey| {
            if key.plugin.eq_ignore_ascii_case(&self.name) {
                return;
            }
            if !used.iter().any(|m| m.eq_ignore_ascii_case(&key.plugin)) {
                used.push(key.plugin.clone());
            }
        };
        for topic in self.topics.values() {
            collect_topic_keys(topic, &mut note);
        }
        used.sort_by_key(|name| {
            self.master_order
                .iter()
                .position(|m| m.eq_ignore_ascii_case(name))
                .unwrap_or(usize::MAX)
        });
        MasterTable::new(self.name.clone(), used)
    }

    /// Serialize the plugin.
    ///
    /// # Errors
    /// Returns form encoding errors for keys that reference plugins
    /// outside the collected master table.
    pub fn write_bytes(&self) -> Result<Vec<u8>> {
        let masters = self.master_table();

        // Body first: the DIAL top group, then the TES4 header knows the
        // record count.
        let mut record_count = 0u32;
        let mut dial_content = Vec::new();
        for topic in self.topics.values() {
            encode_topic(topic, &masters, &mut dial_content, &mut record_count)?;
        }

        let mut out = Vec::new();
        self.write_header(&mut out, &masters, record_count)?;
        if !dial_content.is_empty() {
            let header = GroupHeader {
                size: HEADER_SIZE + dial_content.len() as u32,
                label: DIAL.0,
                group_type: GROUP_TOP,
                timestamp: 0,
                vc_info: 0,
                unknown: 0,
            };
            header.write(&mut out)?;
            out.write_all(&dial_content)?;
        }
        Ok(out)
    }

    /// Write the plugin to disk.
    ///
    /// # Errors
    /// Returns IO and form encoding errors.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = self.write_bytes()?;
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&bytes)?;
        writer.flush()?;
        tracing::info!(
            plugin = self.name,
            topics = self.topics.len(),
            bytes = bytes.len(),
            "wrote patch plugin"
        );
        Ok(())
    }

    fn write_header<W: Write>(
        &self,
        writer: &mut W,
        masters: &MasterTable,
        record_count: u32,
    ) -> Result<()> {
        let mut hedr = Vec::with_capacity(12);
        hedr.write_f32::<LittleEndian>(HEDR_VERSION)?;
        hedr.write_u32::<LittleEndian>(record_count)?;
        hedr.write_u32::<LittleEndian>(self.next_object_id)?;

        let mut subs = vec![Subrecord::new(HEDR, hedr)];
        if !self.author.is_empty() {
            subs.push(Subrecord::zstring(CNAM, &self.author));
        }
        if !self.description.is_empty() {
            subs.push(Subrecord::zstring(SNAM, &self.description));
        }
        for master in &masters.masters {
            subs.push(Subrecord::zstring(MAST, master));
            subs.push(Subrecord::new(DATA, vec![0u8; 8]));
        }

        write_record(TES4, 0, &subs, writer)
    }
}

fn encode_topic(
    topic: &DialogTopic,
    masters: &MasterTable,
    out: &mut Vec<u8>,
    record_count: &mut u32,
) -> Result<()> {
    let form_id = masters.encode(&topic.form_key)?;
    write_record(DIAL, form_id, &topic.encode_subrecords(masters)?, out)?;
    *record_count += 1;

    if topic.responses.is_empty() {
        return Ok(());
    }
    let mut children = Vec::new();
    for response in &topic.responses {
        let info_id = masters.encode(&response.form_key)?;
        write_record(INFO, info_id, &response.encode_subrecords(masters)?, &mut children)?;
        *record_count += 1;
    }
    let header = GroupHeader {
        size: HEADER_SIZE + children.len() as u32,
        label: form_id.to_le_bytes(),
        group_type: GROUP_TOPIC_CHILDREN,
        timestamp: 0,
        vc_info: 0,
        unknown: 0,
    };
    header.write(out)?;
    out.write_all(&children)?;
    Ok(())
}

fn write_record<W: Write>(
    record_type: FourCc,
    form_id: u32,
    subrecords: &[Subrecord],
    writer: &mut W,
) -> Result<()> {
    let mut data = Vec::new();
    for sub in subrecords {
        sub.write(&mut data)?;
    }
    let mut header = RecordHeader::new(record_type, form_id);
    header.data_size = data.len() as u32;
    header.write(writer)?;
    writer.write_all(&data)?;
    Ok(())
}

fn collect_condition_keys(condition: &Condition, note: &mut impl FnMut(&FormKey)) {
    if let ConditionValue::Global(key) = &condition.value {
        note(key);
    }
    for param in [&condition.param1, &condition.param2] {
        if let Param::Form(key) = param {
            note(key);
        }
    }
    if let Some(key) = &condition.reference {
        note(key);
    }
}

fn collect_script_keys(script_data: &ScriptData, note: &mut impl FnMut(&FormKey)) {
    for script in &script_data.scripts {
        for property in &script.properties {
            match &property.value {
                PropertyValue::Object(obj) => {
                    if let Some(key) = &obj.form {
                        note(key);
                    }
                }
                PropertyValue::ObjectArray(items) => {
                    for obj in items {
                        if let Some(key) = &obj.form {
                            note(key);
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

fn collect_response_keys(response: &DialogResponse, note: &mut impl FnMut(&FormKey)) {
    note(&response.form_key);
    if let Some(key) = &response.previous {
        note(key);
    }
    for key in &response.link_to {
        note(key);
    }
    if let Some(key) = &response.response_data {
        note(key);
    }
    if let Some(key) = &response.speaker {
        note(key);
    }
    for line in &response.lines {
        if let Some(key) = &line.sound {
            note(key);
        }
    }
    for condition in &response.conditions {
        collect_condition_keys(condition, note);
    }
    if let Some(script_data) = &response.script_data {
        collect_script_keys(script_data, note);
    }
}

fn collect_topic_keys(topic: &DialogTopic, note: &mut impl FnMut(&FormKey)) {
    note(&topic.form_key);
    if let Some(key) = &topic.branch {
        note(key);
    }
    if let Some(key) = &topic.quest {
        note(key);
    }
    for response in &topic.responses {
        collect_response_keys(response, note);
    }
}
