//! Speech-check difficulty tiers
//!
//! Vanilla persuasion checks compare the player's Speech skill against one
//! of five global variables. Unpatched records sometimes compare against a
//! bare float instead; the thresholds here map those back onto tiers.

use std::collections::HashMap;

use tesplugin::load_order::LoadOrder;
use tesplugin::FormKey;

use crate::error::{Error, Result};

/// The five speech-check tiers, easiest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Difficulty {
    VeryEasy,
    Easy,
    Average,
    Hard,
    VeryHard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 5] = [
        Difficulty::VeryEasy,
        Difficulty::Easy,
        Difficulty::Average,
        Difficulty::Hard,
        Difficulty::VeryHard,
    ];

    /// Display label appended to dialog text.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Difficulty::VeryEasy => "Novice",
            Difficulty::Easy => "Apprentice",
            Difficulty::Average => "Adept",
            Difficulty::Hard => "Expert",
            Difficulty::VeryHard => "Master",
        }
    }

    /// Editor id of the tier's global variable.
    #[must_use]
    pub fn global_editor_id(self) -> &'static str {
        match self {
            Difficulty::VeryEasy => "SpeechVeryEasy",
            Difficulty::Easy => "SpeechEasy",
            Difficulty::Average => "SpeechAverage",
            Difficulty::Hard => "SpeechHard",
            Difficulty::VeryHard => "SpeechVeryHard",
        }
    }

    /// Map a bare float comparison value onto a tier. Only the five
    /// vanilla thresholds qualify.
    #[must_use]
    pub fn from_threshold(value: f32) -> Option<Self> {
        match value as i32 {
            10 if value == 10.0 => Some(Difficulty::VeryEasy),
            25 if value == 25.0 => Some(Difficulty::Easy),
            50 if value == 50.0 => Some(Difficulty::Average),
            75 if value == 75.0 => Some(Difficulty::Hard),
            100 if value == 100.0 => Some(Difficulty::VeryHard),
            _ => None,
        }
    }
}

/// The five Speech globals, resolved from the load order by editor id and
/// indexed both ways.
#[derive(Debug, Clone)]
pub struct SpeechGlobals {
    by_tier: HashMap<Difficulty, FormKey>,
    by_key: HashMap<FormKey, Difficulty>,
}

impl SpeechGlobals {
    /// Resolve all five globals.
    ///
    /// # Errors
    /// Returns [`Error::MissingRecord`] if any tier's global is absent
    /// from the load order.
    pub fn resolve(load_order: &LoadOrder) -> Result<Self> {
        let mut by_tier = HashMap::new();
        let mut by_key = HashMap::new();
        for tier in Difficulty::ALL {
            let editor_id = tier.global_editor_id();
            let key = load_order
                .resolve_editor_id(editor_id)
                .ok_or_else(|| Error::MissingRecord {
                    editor_id: editor_id.to_string(),
                })?;
            by_key.insert(key.clone(), tier);
            by_tier.insert(tier, key);
        }
        Ok(Self { by_tier, by_key })
    }

    #[cfg(test)]
    pub(crate) fn from_parts(
        by_tier: HashMap<Difficulty, FormKey>,
        by_key: HashMap<FormKey, Difficulty>,
    ) -> Self {
        Self { by_tier, by_key }
    }

    /// The global for a tier.
    #[must_use]
    pub fn global(&self, tier: Difficulty) -> &FormKey {
        &self.by_tier[&tier]
    }

    /// The tier of a global, if it is one of the five.
    #[must_use]
    pub fn tier(&self, key: &FormKey) -> Option<Difficulty> {
        self.by_key.get(key).copied()
    }
}
