//! CTDA condition codec
//!
//! Conditions are fixed 32-byte structures on INFO (and many other)
//! records: a compare operator packed with flags, a float or global
//! comparison value, a condition function with two parameters, and a
//! run-on target. Optional CIS1/CIS2 subrecords following a CTDA carry
//! string parameters; they are kept on the decoded condition so records
//! survive a rewrite.

use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};
use crate::formats::masters::MasterTable;
use crate::formkey::FormKey;

/// Encoded size of a CTDA payload.
pub const CTDA_SIZE: usize = 32;

/// Actor value index for the Speech skill.
pub const ACTOR_VALUE_SPEECH: u32 = 17;

/// Condition flag: OR this condition with the next one.
pub const FLAG_OR: u8 = 0x01;
/// Condition flag: the comparison value is a global's form id.
pub const FLAG_USE_GLOBAL: u8 = 0x04;
/// Mask covering the flag bits of the operator byte.
const FLAG_MASK: u8 = 0x1F;

/// Comparison operator, stored in the top three bits of the first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompareOperator {
    #[default]
    EqualTo,
    NotEqualTo,
    GreaterThan,
    GreaterThanOrEqualTo,
    LessThan,
    LessThanOrEqualTo,
}

impl CompareOperator {
    fn from_bits(bits: u8) -> Self {
        match bits {
            1 => Self::NotEqualTo,
            2 => Self::GreaterThan,
            3 => Self::GreaterThanOrEqualTo,
            4 => Self::LessThan,
            5 => Self::LessThanOrEqualTo,
            _ => Self::EqualTo,
        }
    }

    fn to_bits(self) -> u8 {
        match self {
            Self::EqualTo => 0,
            Self::NotEqualTo => 1,
            Self::GreaterThan => 2,
            Self::GreaterThanOrEqualTo => 3,
            Self::LessThan => 4,
            Self::LessThanOrEqualTo => 5,
        }
    }
}

/// What a condition runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunOn {
    #[default]
    Subject,
    Target,
    Reference,
    CombatTarget,
    LinkedRef,
    QuestAlias,
    PackageData,
    EventData,
    Unknown(u32),
}

impl RunOn {
    fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::Subject,
            1 => Self::Target,
            2 => Self::Reference,
            3 => Self::CombatTarget,
            4 => Self::LinkedRef,
            5 => Self::QuestAlias,
            6 => Self::PackageData,
            7 => Self::EventData,
            other => Self::Unknown(other),
        }
    }

    fn to_raw(self) -> u32 {
        match self {
            Self::Subject => 0,
            Self::Target => 1,
            Self::Reference => 2,
            Self::CombatTarget => 3,
            Self::LinkedRef => 4,
            Self::QuestAlias => 5,
            Self::PackageData => 6,
            Self::EventData => 7,
            Self::Unknown(other) => other,
        }
    }
}

/// Condition functions this library understands by name.
///
/// Stored indices follow the Creation Kit convention of function id minus
/// 4096. Everything else round-trips through [`Function::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    GetActorValue,
    GetStage,
    GetCrimeGold,
    GetEquipped,
    IsTrespassing,
    IsBribedbyPlayer,
    GetIsVoiceType,
    GetBribeSuccess,
    GetIntimidateSuccess,
    GetRelationshipRank,
    GetCrimeGoldViolent,
    Unknown(u16),
}

impl Function {
    #[must_use]
    pub fn from_index(index: u16) -> Self {
        match index {
            14 => Self::GetActorValue,
            58 => Self::GetStage,
            122 => Self::GetCrimeGold,
            182 => Self::GetEquipped,
            278 => Self::IsTrespassing,
            353 => Self::IsBribedbyPlayer,
            426 => Self::GetIsVoiceType,
            561 => Self::GetBribeSuccess,
            563 => Self::GetIntimidateSuccess,
            562 => Self::GetRelationshipRank,
            572 => Self::GetCrimeGoldViolent,
            other => Self::Unknown(other),
        }
    }

    #[must_use]
    pub fn index(self) -> u16 {
        match self {
            Self::GetActorValue => 14,
            Self::GetStage => 58,
            Self::GetCrimeGold => 122,
            Self::GetEquipped => 182,
            Self::IsTrespassing => 278,
            Self::IsBribedbyPlayer => 353,
            Self::GetIsVoiceType => 426,
            Self::GetBribeSuccess => 561,
            Self::GetRelationshipRank => 562,
            Self::GetIntimidateSuccess => 563,
            Self::GetCrimeGoldViolent => 572,
            Self::Unknown(other) => other,
        }
    }

    /// Whether the first parameter slot holds a form id.
    #[must_use]
    pub fn param1_is_form(self) -> bool {
        matches!(
            self,
            Self::GetStage | Self::GetEquipped | Self::GetIsVoiceType | Self::GetRelationshipRank
        )
    }
}

/// A function parameter: a form reference for functions that take one,
/// otherwise the raw slot value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Param {
    #[default]
    None,
    Form(FormKey),
    Raw(u32),
}

impl Param {
    /// The form key, when this parameter holds one.
    #[must_use]
    pub fn as_form(&self) -> Option<&FormKey> {
        match self {
            Self::Form(key) => Some(key),
            _ => None,
        }
    }
}

/// The comparison value: a literal float, or a global variable reference.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionValue {
    Float(f32),
    Global(FormKey),
}

impl Default for ConditionValue {
    fn default() -> Self {
        Self::Float(0.0)
    }
}

/// One decoded condition.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Condition {
    pub operator: CompareOperator,
    /// Flag bits other than use-global, which is derived from `value`.
    pub flags: u8,
    pub value: ConditionValue,
    pub function: Function,
    pub param1: Param,
    pub param2: Param,
    pub run_on: RunOn,
    /// Target reference, meaningful when `run_on` is [`RunOn::Reference`].
    pub reference: Option<FormKey>,
    /// Trailing CIS1 string parameter, preserved verbatim.
    pub cis1: Option<String>,
    /// Trailing CIS2 string parameter, preserved verbatim.
    pub cis2: Option<String>,
}

impl Default for Function {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl Condition {
    /// Whether the OR flag is set.
    #[must_use]
    pub fn is_or(&self) -> bool {
        self.flags & FLAG_OR != 0
    }

    /// Set or clear the OR flag.
    pub fn set_or(&mut self, or: bool) {
        if or {
            self.flags |= FLAG_OR;
        } else {
            self.flags &= !FLAG_OR;
        }
    }

    /// Decode a CTDA payload.
    ///
    /// # Errors
    /// Returns [`Error::SubrecordSize`] on a payload that is not 32 bytes
    /// and form resolution errors from the master table.
    pub fn parse(data: &[u8], masters: &MasterTable) -> Result<Self> {
        if data.len() != CTDA_SIZE {
            return Err(Error::SubrecordSize {
                fourcc: "CTDA".to_string(),
                expected: CTDA_SIZE,
                found: data.len(),
            });
        }
        let mut cursor = Cursor::new(data);
        let op_byte = cursor.read_u8()?;
        let mut unused = [0u8; 3];
        cursor.read_exact(&mut unused)?;
        let value_raw = cursor.read_u32::<LittleEndian>()?;
        let function = Function::from_index(cursor.read_u16::<LittleEndian>()?);
        let _padding = cursor.read_u16::<LittleEndian>()?;
        let param1_raw = cursor.read_u32::<LittleEndian>()?;
        let param2_raw = cursor.read_u32::<LittleEndian>()?;
        let run_on = RunOn::from_raw(cursor.read_u32::<LittleEndian>()?);
        let reference_raw = cursor.read_u32::<LittleEndian>()?;
        let _param3 = cursor.read_i32::<LittleEndian>()?;

        let flags = op_byte & FLAG_MASK;
        let value = if flags & FLAG_USE_GLOBAL != 0 {
            ConditionValue::Global(masters.resolve(value_raw)?)
        } else {
            ConditionValue::Float(f32::from_le_bytes(value_raw.to_le_bytes()))
        };
        let param1 = if function.param1_is_form() && param1_raw != 0 {
            Param::Form(masters.resolve(param1_raw)?)
        } else if param1_raw == 0 {
            Param::None
        } else {
            Param::Raw(param1_raw)
        };
        let param2 = if param2_raw == 0 {
            Param::None
        } else {
            Param::Raw(param2_raw)
        };
        let reference = if run_on == RunOn::Reference && reference_raw != 0 {
            Some(masters.resolve(reference_raw)?)
        } else {
            None
        };

        Ok(Self {
            operator: CompareOperator::from_bits(op_byte >> 5),
            flags: flags & !FLAG_USE_GLOBAL,
            value,
            function,
            param1,
            param2,
            run_on,
            reference,
            cis1: None,
            cis2: None,
        })
    }

    /// Encode the 32-byte CTDA payload against a master table.
    ///
    /// # Errors
    /// Returns form encoding errors from the master table.
    pub fn encode<W: Write>(&self, writer: &mut W, masters: &MasterTable) -> Result<()> {
        let mut flags = self.flags & FLAG_MASK & !FLAG_USE_GLOBAL;
        let value_raw = match &self.value {
            ConditionValue::Float(v) => u32::from_le_bytes(v.to_le_bytes()),
            ConditionValue::Global(key) => {
                flags |= FLAG_USE_GLOBAL;
                masters.encode(key)?
            }
        };
        let param1_raw = match &self.param1 {
            Param::None => 0,
            Param::Raw(raw) => *raw,
            Param::Form(key) => masters.encode(key)?,
        };
        let param2_raw = match &self.param2 {
            Param::None => 0,
            Param::Raw(raw) => *raw,
            Param::Form(key) => masters.encode(key)?,
        };
        let reference_raw = match &self.reference {
            Some(key) => masters.encode(key)?,
            None => 0,
        };

        writer.write_u8((self.operator.to_bits() << 5) | flags)?;
        writer.write_all(&[0u8; 3])?;
        writer.write_u32::<LittleEndian>(value_raw)?;
        writer.write_u16::<LittleEndian>(self.function.index())?;
        writer.write_u16::<LittleEndian>(0)?;
        writer.write_u32::<LittleEndian>(param1_raw)?;
        writer.write_u32::<LittleEndian>(param2_raw)?;
        writer.write_u32::<LittleEndian>(self.run_on.to_raw())?;
        writer.write_u32::<LittleEndian>(reference_raw)?;
        writer.write_i32::<LittleEndian>(-1)?;
        Ok(())
    }

    /// Compare everything that identifies what the condition *tests*,
    /// ignoring operator, value and flags. Two conditions with equal data
    /// check the same thing against different thresholds.
    #[must_use]
    pub fn data_eq(&self, other: &Condition) -> bool {
        self.function == other.function
            && self.param1 == other.param1
            && self.param2 == other.param2
            && self.run_on == other.run_on
            && self.reference == other.reference
    }
}
