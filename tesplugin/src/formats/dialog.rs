//! Typed dialog records
//!
//! DIAL topics and their INFO responses, decoded to and from subrecords.
//! Only the fields dialog patching touches are typed; everything else is
//! carried as opaque subrecords so a read record can be written back
//! without losing data.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};
use crate::formats::condition::Condition;
use crate::formats::headers::FourCc;
use crate::formats::masters::MasterTable;
use crate::formats::subrecord::Subrecord;
use crate::formats::vmad::ScriptData;
use crate::formkey::FormKey;

pub const EDID: FourCc = FourCc::new(b"EDID");
pub const FULL: FourCc = FourCc::new(b"FULL");
pub const PNAM: FourCc = FourCc::new(b"PNAM");
pub const BNAM: FourCc = FourCc::new(b"BNAM");
pub const QNAM: FourCc = FourCc::new(b"QNAM");
pub const TIFC: FourCc = FourCc::new(b"TIFC");
pub const VMAD: FourCc = FourCc::new(b"VMAD");
pub const ENAM: FourCc = FourCc::new(b"ENAM");
pub const CNAM: FourCc = FourCc::new(b"CNAM");
pub const TCLT: FourCc = FourCc::new(b"TCLT");
pub const DNAM: FourCc = FourCc::new(b"DNAM");
pub const TRDT: FourCc = FourCc::new(b"TRDT");
pub const NAM1: FourCc = FourCc::new(b"NAM1");
pub const NAM2: FourCc = FourCc::new(b"NAM2");
pub const NAM3: FourCc = FourCc::new(b"NAM3");
pub const CTDA: FourCc = FourCc::new(b"CTDA");
pub const CIS1: FourCc = FourCc::new(b"CIS1");
pub const CIS2: FourCc = FourCc::new(b"CIS2");
pub const RNAM: FourCc = FourCc::new(b"RNAM");
pub const ANAM: FourCc = FourCc::new(b"ANAM");

/// Response flag: ends the conversation.
pub const RESPONSE_GOODBYE: u16 = 0x0001;
/// Response flag: pick randomly among flagged siblings.
pub const RESPONSE_RANDOM: u16 = 0x0002;
/// Response flag: only ever say this once.
pub const RESPONSE_SAY_ONCE: u16 = 0x0004;
/// Response flag: last of a random block.
pub const RESPONSE_RANDOM_END: u16 = 0x0020;
/// Response flag: continue without showing the option.
pub const RESPONSE_INVISIBLE_CONTINUE: u16 = 0x0040;

/// The ENAM payload: response flags plus the reset interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResponseFlags {
    pub flags: u16,
    pub reset_hours: u16,
}

impl ResponseFlags {
    #[must_use]
    pub fn new(flags: u16) -> Self {
        Self {
            flags,
            reset_hours: 0,
        }
    }

    #[must_use]
    pub fn has(&self, flag: u16) -> bool {
        self.flags & flag != 0
    }

    pub fn set(&mut self, flag: u16) {
        self.flags |= flag;
    }
}

/// Emotion played over a spoken line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Emotion {
    #[default]
    Neutral,
    Anger,
    Disgust,
    Fear,
    Sad,
    Happy,
    Surprise,
    Puzzled,
    Unknown(u32),
}

impl Emotion {
    fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::Neutral,
            1 => Self::Anger,
            2 => Self::Disgust,
            3 => Self::Fear,
            4 => Self::Sad,
            5 => Self::Happy,
            6 => Self::Surprise,
            7 => Self::Puzzled,
            other => Self::Unknown(other),
        }
    }

    fn to_raw(self) -> u32 {
        match self {
            Self::Neutral => 0,
            Self::Anger => 1,
            Self::Disgust => 2,
            Self::Fear => 3,
            Self::Sad => 4,
            Self::Happy => 5,
            Self::Surprise => 6,
            Self::Puzzled => 7,
            Self::Unknown(other) => other,
        }
    }
}

/// TRDT flag: animate the emotion while speaking.
pub const LINE_USE_EMOTION_ANIMATION: u8 = 0x01;

/// One spoken line of a response: the TRDT header plus its NAM1 text and
/// editor note subrecords.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResponseLine {
    pub emotion: Emotion,
    pub emotion_value: u32,
    pub response_number: u8,
    pub sound: Option<FormKey>,
    pub flags: u8,
    pub text: String,
    /// NAM2 script notes, preserved verbatim.
    pub notes: Option<String>,
    /// NAM3 edits, preserved verbatim.
    pub edits: Option<String>,
}

/// An INFO record: one response entry under a dialog topic.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DialogResponse {
    pub form_key: FormKey,
    pub script_data: Option<ScriptData>,
    pub flags: Option<ResponseFlags>,
    /// PNAM link to the previous INFO in the topic.
    pub previous: Option<FormKey>,
    /// CNAM favor level.
    pub favor_level: Option<u8>,
    /// TCLT links to follow-up topics.
    pub link_to: Vec<FormKey>,
    /// DNAM shared response data.
    pub response_data: Option<FormKey>,
    pub lines: Vec<ResponseLine>,
    pub conditions: Vec<Condition>,
    /// RNAM player prompt.
    pub prompt: Option<String>,
    /// ANAM speaker.
    pub speaker: Option<FormKey>,
    /// Unrecognized subrecords, written back after the typed fields.
    pub extra: Vec<Subrecord>,
}

impl DialogResponse {
    #[must_use]
    pub fn new(form_key: FormKey) -> Self {
        Self {
            form_key,
            ..Self::default()
        }
    }

    /// Reset every field except the identity, the way an override that
    /// blanks a record does.
    pub fn clear(&mut self) {
        *self = Self::new(self.form_key.clone());
    }

    /// Decode an INFO record's subrecords.
    ///
    /// # Errors
    /// Returns codec errors for malformed CTDA/VMAD/TRDT payloads.
    pub fn parse(form_key: FormKey, subrecords: &[Subrecord], masters: &MasterTable) -> Result<Self> {
        let mut response = Self::new(form_key);
        for sub in subrecords {
            match sub.fourcc {
                VMAD => response.script_data = Some(ScriptData::parse(&sub.data, masters)?),
                ENAM => {
                    let mut cursor = Cursor::new(sub.data.as_slice());
                    response.flags = Some(ResponseFlags {
                        flags: cursor.read_u16::<LittleEndian>()?,
                        reset_hours: cursor.read_u16::<LittleEndian>()?,
                    });
                }
                PNAM => response.previous = parse_form(sub, masters)?,
                CNAM => response.favor_level = sub.data.first().copied(),
                TCLT => {
                    if let Some(key) = parse_form(sub, masters)? {
                        response.link_to.push(key);
                    }
                }
                DNAM => response.response_data = parse_form(sub, masters)?,
                TRDT => response.lines.push(parse_line(sub, masters)?),
                NAM1 => {
                    if let Some(line) = response.lines.last_mut() {
                        line.text = sub.as_zstring();
                    }
                }
                NAM2 => {
                    if let Some(line) = response.lines.last_mut() {
                        line.notes = Some(sub.as_zstring());
                    }
                }
                NAM3 => {
                    if let Some(line) = response.lines.last_mut() {
                        line.edits = Some(sub.as_zstring());
                    }
                }
                CTDA => response.conditions.push(Condition::parse(&sub.data, masters)?),
                CIS1 => {
                    if let Some(condition) = response.conditions.last_mut() {
                        condition.cis1 = Some(sub.as_zstring());
                    }
                }
                CIS2 => {
                    if let Some(condition) = response.conditions.last_mut() {
                        condition.cis2 = Some(sub.as_zstring());
                    }
                }
                RNAM => response.prompt = Some(sub.as_zstring()),
                ANAM => response.speaker = parse_form(sub, masters)?,
                _ => response.extra.push(sub.clone()),
            }
        }
        Ok(response)
    }

    /// Encode back to subrecords in canonical order.
    ///
    /// # Errors
    /// Returns form encoding errors from the master table.
    pub fn encode_subrecords(&self, masters: &MasterTable) -> Result<Vec<Subrecord>> {
        let mut subs = Vec::new();
        if let Some(script_data) = &self.script_data {
            subs.push(Subrecord::new(VMAD, script_data.encode(masters)?));
        }
        if let Some(flags) = &self.flags {
            let mut data = Vec::with_capacity(4);
            data.write_u16::<LittleEndian>(flags.flags)?;
            data.write_u16::<LittleEndian>(flags.reset_hours)?;
            subs.push(Subrecord::new(ENAM, data));
        }
        if let Some(previous) = &self.previous {
            subs.push(Subrecord::u32(PNAM, masters.encode(previous)?));
        }
        if let Some(favor) = self.favor_level {
            subs.push(Subrecord::new(CNAM, vec![favor]));
        }
        for link in &self.link_to {
            subs.push(Subrecord::u32(TCLT, masters.encode(link)?));
        }
        if let Some(response_data) = &self.response_data {
            subs.push(Subrecord::u32(DNAM, masters.encode(response_data)?));
        }
        for line in &self.lines {
            subs.push(encode_line(line, masters)?);
            subs.push(Subrecord::zstring(NAM1, &line.text));
            if let Some(notes) = &line.notes {
                subs.push(Subrecord::zstring(NAM2, notes));
            }
            if let Some(edits) = &line.edits {
                subs.push(Subrecord::zstring(NAM3, edits));
            }
        }
        for condition in &self.conditions {
            let mut data = Vec::with_capacity(32);
            condition.encode(&mut data, masters)?;
            subs.push(Subrecord::new(CTDA, data));
            if let Some(cis1) = &condition.cis1 {
                subs.push(Subrecord::zstring(CIS1, cis1));
            }
            if let Some(cis2) = &condition.cis2 {
                subs.push(Subrecord::zstring(CIS2, cis2));
            }
        }
        if let Some(prompt) = &self.prompt {
            subs.push(Subrecord::zstring(RNAM, prompt));
        }
        if let Some(speaker) = &self.speaker {
            subs.push(Subrecord::u32(ANAM, masters.encode(speaker)?));
        }
        subs.extend(self.extra.iter().cloned());
        Ok(subs)
    }
}

/// A DIAL record with its child responses.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DialogTopic {
    pub form_key: FormKey,
    pub editor_id: Option<String>,
    /// FULL display name.
    pub name: Option<String>,
    /// PNAM priority.
    pub priority: Option<f32>,
    /// BNAM owning branch.
    pub branch: Option<FormKey>,
    /// QNAM owning quest.
    pub quest: Option<FormKey>,
    /// Unrecognized subrecords (DATA, SNAM, ...), written back verbatim.
    pub extra: Vec<Subrecord>,
    /// Child INFO records in group order.
    pub responses: Vec<DialogResponse>,
}

impl DialogTopic {
    #[must_use]
    pub fn new(form_key: FormKey) -> Self {
        Self {
            form_key,
            ..Self::default()
        }
    }

    /// Decode a DIAL record's own subrecords (children come separately).
    ///
    /// # Errors
    /// Returns codec errors on malformed fixed-size payloads.
    pub fn parse(form_key: FormKey, subrecords: &[Subrecord], masters: &MasterTable) -> Result<Self> {
        let mut topic = Self::new(form_key);
        for sub in subrecords {
            match sub.fourcc {
                EDID => topic.editor_id = Some(sub.as_zstring()),
                FULL => topic.name = Some(sub.as_zstring()),
                PNAM => topic.priority = Some(f32::from_le_bytes(
                    sub.data.as_slice().try_into().map_err(|_| Error::SubrecordSize {
                        fourcc: PNAM.to_string(),
                        expected: 4,
                        found: sub.data.len(),
                    })?,
                )),
                BNAM => topic.branch = parse_form(sub, masters)?,
                QNAM => topic.quest = parse_form(sub, masters)?,
                // Recomputed from the response list on write.
                TIFC => {}
                _ => topic.extra.push(sub.clone()),
            }
        }
        Ok(topic)
    }

    /// Encode the DIAL record's own subrecords, ending with a fresh TIFC.
    ///
    /// # Errors
    /// Returns form encoding errors from the master table.
    pub fn encode_subrecords(&self, masters: &MasterTable) -> Result<Vec<Subrecord>> {
        let mut subs = Vec::new();
        if let Some(editor_id) = &self.editor_id {
            subs.push(Subrecord::zstring(EDID, editor_id));
        }
        if let Some(name) = &self.name {
            subs.push(Subrecord::zstring(FULL, name));
        }
        if let Some(priority) = self.priority {
            subs.push(Subrecord::new(PNAM, priority.to_le_bytes().to_vec()));
        }
        if let Some(branch) = &self.branch {
            subs.push(Subrecord::u32(BNAM, masters.encode(branch)?));
        }
        if let Some(quest) = &self.quest {
            subs.push(Subrecord::u32(QNAM, masters.encode(quest)?));
        }
        subs.extend(self.extra.iter().cloned());
        subs.push(Subrecord::u32(TIFC, self.responses.len() as u32));
        Ok(subs)
    }

    /// Find a response by form key.
    #[must_use]
    pub fn response(&self, key: &FormKey) -> Option<&DialogResponse> {
        self.responses.iter().find(|r| r.form_key.same_record(key))
    }

    /// Find a response by form key, mutably.
    pub fn response_mut(&mut self, key: &FormKey) -> Option<&mut DialogResponse> {
        self.responses
            .iter_mut()
            .find(|r| r.form_key.same_record(key))
    }

    /// Index of a response by form key.
    #[must_use]
    pub fn response_index(&self, key: &FormKey) -> Option<usize> {
        self.responses
            .iter()
            .position(|r| r.form_key.same_record(key))
    }
}

fn parse_form(sub: &Subrecord, masters: &MasterTable) -> Result<Option<FormKey>> {
    let raw = sub.as_u32()?;
    if raw == 0 {
        return Ok(None);
    }
    Ok(Some(masters.resolve(raw)?))
}

fn parse_line(sub: &Subrecord, masters: &MasterTable) -> Result<ResponseLine> {
    if sub.data.len() != 24 {
        return Err(Error::SubrecordSize {
            fourcc: TRDT.to_string(),
            expected: 24,
            found: sub.data.len(),
        });
    }
    let mut cursor = Cursor::new(sub.data.as_slice());
    let emotion = Emotion::from_raw(cursor.read_u32::<LittleEndian>()?);
    let emotion_value = cursor.read_u32::<LittleEndian>()?;
    let _unknown = cursor.read_u32::<LittleEndian>()?;
    let response_number = cursor.read_u8()?;
    let mut pad = [0u8; 3];
    std::io::Read::read_exact(&mut cursor, &mut pad)?;
    let sound_raw = cursor.read_u32::<LittleEndian>()?;
    let flags = cursor.read_u8()?;
    let sound = if sound_raw == 0 {
        None
    } else {
        Some(masters.resolve(sound_raw)?)
    };
    Ok(ResponseLine {
        emotion,
        emotion_value,
        response_number,
        sound,
        flags,
        text: String::new(),
        notes: None,
        edits: None,
    })
}

fn encode_line(line: &ResponseLine, masters: &MasterTable) -> Result<Subrecord> {
    let mut data = Vec::with_capacity(24);
    data.write_u32::<LittleEndian>(line.emotion.to_raw())?;
    data.write_u32::<LittleEndian>(line.emotion_value)?;
    data.write_u32::<LittleEndian>(0)?;
    data.write_u8(line.response_number)?;
    data.extend_from_slice(&[0u8; 3]);
    let sound_raw = match &line.sound {
        Some(key) => masters.encode(key)?,
        None => 0,
    };
    data.write_u32::<LittleEndian>(sound_raw)?;
    data.write_u8(line.flags)?;
    data.extend_from_slice(&[0u8; 3]);
    Ok(Subrecord::new(TRDT, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::condition::{CompareOperator, ConditionValue, Function, Param, RunOn};

    fn masters() -> MasterTable {
        MasterTable::new("HHITPC.esp", vec!["Skyrim.esm".to_string()])
    }

    fn sample_response() -> DialogResponse {
        let mut response = DialogResponse::new(FormKey::new("Skyrim.esm", 0x0D1981));
        response.flags = Some(ResponseFlags::new(RESPONSE_GOODBYE | RESPONSE_SAY_ONCE));
        response.previous = Some(FormKey::new("Skyrim.esm", 0x0D197F));
        response.link_to = vec![
            FormKey::new("Skyrim.esm", 0x0D1982),
            FormKey::new("Skyrim.esm", 0x0D1983),
        ];
        response.response_data = Some(FormKey::new("Skyrim.esm", 0x0E0CC4));
        response.prompt = Some("Let me through. (Persuade)".to_string());
        response.lines.push(ResponseLine {
            emotion: Emotion::Anger,
            emotion_value: 50,
            response_number: 1,
            flags: LINE_USE_EMOTION_ANIMATION,
            text: "Fine, go on in.".to_string(),
            ..ResponseLine::default()
        });
        response.conditions.push(Condition {
            operator: CompareOperator::GreaterThanOrEqualTo,
            value: ConditionValue::Float(50.0),
            function: Function::GetActorValue,
            param1: Param::Raw(17),
            run_on: RunOn::Reference,
            reference: Some(FormKey::player_ref()),
            ..Condition::default()
        });
        response
    }

    #[test]
    fn response_round_trip() {
        let masters = masters();
        let response = sample_response();
        let subs = response.encode_subrecords(&masters).unwrap();
        let read = DialogResponse::parse(response.form_key.clone(), &subs, &masters).unwrap();
        assert_eq!(read, response);
    }

    #[test]
    fn topic_round_trip_recomputes_info_count() {
        let masters = masters();
        let mut topic = DialogTopic::new(FormKey::new("Skyrim.esm", 0x0D197A));
        topic.editor_id = Some("DialogueWhiterunGuardGateStop".to_string());
        topic.name = Some("Halt! (Persuade)".to_string());
        topic.priority = Some(50.0);
        topic.responses.push(sample_response());

        let subs = topic.encode_subrecords(&masters).unwrap();
        let tifc = subs.iter().find(|s| s.fourcc == TIFC).unwrap();
        assert_eq!(tifc.as_u32().unwrap(), 1);

        let mut read = DialogTopic::parse(topic.form_key.clone(), &subs, &masters).unwrap();
        read.responses = topic.responses.clone();
        assert_eq!(read, topic);
    }

    #[test]
    fn cis_params_stick_to_their_condition() {
        let masters = masters();
        let mut response = sample_response();
        response.conditions[0].cis1 = Some("::Speech_var".to_string());
        let subs = response.encode_subrecords(&masters).unwrap();
        let read = DialogResponse::parse(response.form_key.clone(), &subs, &masters).unwrap();
        assert_eq!(read.conditions[0].cis1.as_deref(), Some("::Speech_var"));
    }

    #[test]
    fn clear_keeps_identity_only() {
        let mut response = sample_response();
        let key = response.form_key.clone();
        response.clear();
        assert_eq!(response, DialogResponse::new(key));
    }
}
