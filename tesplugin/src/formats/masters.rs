//! Master table form id resolution
//!
//! Raw form ids store a master index in their top byte. The index selects
//! a file from the plugin's master list; an index equal to the master
//! count refers to the plugin itself.

use crate::error::{Error, Result};
use crate::formkey::{FormKey, OBJECT_ID_MASK};

/// Prefix marking the light-master (ESL) form id space.
const LIGHT_PREFIX: u8 = 0xFE;

/// The master list of one plugin, used to translate between raw form ids
/// and [`FormKey`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterTable {
    /// File name of the plugin that owns this table.
    pub plugin_name: String,
    /// Master file names in declaration order.
    pub masters: Vec<String>,
}

impl MasterTable {
    #[must_use]
    pub fn new(plugin_name: impl Into<String>, masters: Vec<String>) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            masters,
        }
    }

    /// Translate a raw on-disk form id into a [`FormKey`].
    ///
    /// # Errors
    /// Returns [`Error::LightMasterUnsupported`] for 0xFE-prefixed ids and
    /// [`Error::MasterIndexOutOfRange`] for indexes past the self slot.
    pub fn resolve(&self, form_id: u32) -> Result<FormKey> {
        let index = (form_id >> 24) as u8;
        if index == LIGHT_PREFIX {
            return Err(Error::LightMasterUnsupported { form_id });
        }
        let plugin = match self.masters.get(usize::from(index)) {
            Some(master) => master.as_str(),
            None if usize::from(index) == self.masters.len() => self.plugin_name.as_str(),
            None => {
                return Err(Error::MasterIndexOutOfRange {
                    form_id,
                    index,
                    masters: self.masters.len(),
                })
            }
        };
        Ok(FormKey::new(plugin, form_id & OBJECT_ID_MASK))
    }

    /// Translate a [`FormKey`] back into a raw form id against this table.
    ///
    /// # Errors
    /// Returns [`Error::UnresolvedMaster`] if the key's plugin is neither a
    /// master nor the owning plugin.
    pub fn encode(&self, key: &FormKey) -> Result<u32> {
        let index = self
            .masters
            .iter()
            .position(|m| m.eq_ignore_ascii_case(&key.plugin))
            .or_else(|| {
                self.plugin_name
                    .eq_ignore_ascii_case(&key.plugin)
                    .then_some(self.masters.len())
            })
            .ok_or_else(|| Error::UnresolvedMaster {
                form_key: key.to_string(),
            })?;
        Ok(((index as u32) << 24) | key.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> MasterTable {
        MasterTable::new(
            "HHITPC.esp",
            vec!["Skyrim.esm".to_string(), "Dawnguard.esm".to_string()],
        )
    }

    #[test]
    fn resolve_master_and_self() {
        let t = table();
        assert_eq!(
            t.resolve(0x000556FA).unwrap(),
            FormKey::new("Skyrim.esm", 0x0556FA)
        );
        assert_eq!(
            t.resolve(0x01014035).unwrap(),
            FormKey::new("Dawnguard.esm", 0x014035)
        );
        assert_eq!(
            t.resolve(0x02000800).unwrap(),
            FormKey::new("HHITPC.esp", 0x000800)
        );
    }

    #[test]
    fn resolve_rejects_bad_indexes() {
        let t = table();
        assert!(matches!(
            t.resolve(0x05000800),
            Err(Error::MasterIndexOutOfRange { index: 5, .. })
        ));
        assert!(matches!(
            t.resolve(0xFE000800),
            Err(Error::LightMasterUnsupported { .. })
        ));
    }

    #[test]
    fn encode_round_trips_and_ignores_case() {
        let t = table();
        let key = FormKey::new("dawnguard.ESM", 0x014035);
        assert_eq!(t.encode(&key).unwrap(), 0x01014035);
        assert!(t.encode(&FormKey::new("Dragonborn.esm", 1)).is_err());
    }
}
