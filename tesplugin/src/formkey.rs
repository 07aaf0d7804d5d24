//! Load-order-independent record identity
//!
//! A raw form id on disk is relative to the owning plugin's master table;
//! a [`FormKey`] pins the 24-bit object id to the master file that defines
//! the record, so identities survive across load orders.

use std::fmt;

use crate::error::{Error, Result};

/// Mask for the object id portion of a raw form id.
pub const OBJECT_ID_MASK: u32 = 0x00FF_FFFF;

/// A plugin-qualified record identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FormKey {
    /// Case-preserved name of the defining plugin, e.g. `Skyrim.esm`.
    pub plugin: String,
    /// 24-bit object id within the defining plugin.
    pub id: u32,
}

impl FormKey {
    /// Create a form key from a plugin name and an object id.
    ///
    /// The id is masked to 24 bits.
    #[must_use]
    pub fn new(plugin: impl Into<String>, id: u32) -> Self {
        Self {
            plugin: plugin.into(),
            id: id & OBJECT_ID_MASK,
        }
    }

    /// The player reference, `00000014:Skyrim.esm`.
    #[must_use]
    pub fn player_ref() -> Self {
        Self::new("Skyrim.esm", 0x000014)
    }

    /// Parse the `XXXXXX:Plugin.esm` notation.
    ///
    /// # Errors
    /// Returns [`Error::InvalidFormKey`] if the string is not a hex object
    /// id followed by a plugin name.
    pub fn parse(s: &str) -> Result<Self> {
        let (id_part, plugin) = s
            .split_once(':')
            .ok_or_else(|| Error::InvalidFormKey(s.to_string()))?;
        if plugin.is_empty() {
            return Err(Error::InvalidFormKey(s.to_string()));
        }
        let id = u32::from_str_radix(id_part, 16)
            .map_err(|_| Error::InvalidFormKey(s.to_string()))?;
        if id > OBJECT_ID_MASK {
            return Err(Error::InvalidFormKey(s.to_string()));
        }
        Ok(Self::new(plugin, id))
    }

    /// Whether two keys name the same record, comparing plugin names
    /// case-insensitively the way the game's loader does.
    #[must_use]
    pub fn same_record(&self, other: &FormKey) -> bool {
        self.id == other.id && self.plugin.eq_ignore_ascii_case(&other.plugin)
    }
}

impl fmt::Display for FormKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06X}:{}", self.id, self.plugin)
    }
}
