//! The persuasion-check patching pass.

pub mod difficulty;
pub mod fixes;
pub mod pipeline;
pub mod speech;
pub mod text;

use tracing::warn;

use tesplugin::load_order::LoadOrder;
use tesplugin::FormKey;

use crate::error::{Error, Result};
use crate::settings::Labels;

use difficulty::SpeechGlobals;

const AMULET_LIST_EDITOR_ID: &str = "TGAmuletofArticulationList";

/// Records the whole pass depends on, resolved once up front.
pub struct PatchContext<'a> {
    pub load_order: &'a LoadOrder,
    pub globals: SpeechGlobals,
    pub amulet_list: FormKey,
    pub labels: Labels,
}

impl<'a> PatchContext<'a> {
    /// Resolve the Speech globals and the Amulet of Articulation form
    /// list. Both are hard requirements; anything else a fix needs is
    /// resolved lazily and skipped with a warning when absent.
    pub fn new(load_order: &'a LoadOrder, labels: Labels) -> Result<Self> {
        let globals = SpeechGlobals::resolve(load_order)?;
        let amulet_list = load_order
            .resolve_editor_id(AMULET_LIST_EDITOR_ID)
            .ok_or_else(|| Error::MissingRecord {
                editor_id: AMULET_LIST_EDITOR_ID.to_string(),
            })?;
        Ok(Self {
            load_order,
            globals,
            amulet_list,
            labels,
        })
    }

    /// Resolve a record by editor id, warning when it is absent.
    pub fn resolve(&self, editor_id: &str) -> Option<FormKey> {
        let key = self.load_order.resolve_editor_id(editor_id);
        if key.is_none() {
            warn!(editor_id, "record not in load order, skipping the edit that needs it");
        }
        key
    }

    /// Resolve a list of editor ids, dropping any that are absent.
    pub fn resolve_all(&self, editor_ids: &[&str]) -> Vec<FormKey> {
        editor_ids.iter().filter_map(|id| self.resolve(id)).collect()
    }
}
