//! Optional TOML settings
//!
//! Everything here defaults to vanilla behavior; a settings file only
//! needs the keys it changes.
//!
//! ```toml
//! extra_topics = ["0D4FC2:Skyrim.esm"]
//!
//! [labels]
//! average = "Journeyman"
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;

use tesplugin::FormKey;

use crate::error::Result;
use crate::patch::difficulty::Difficulty;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Tier label overrides.
    pub labels: Labels,
    /// Topics to patch even when the selection predicate misses them,
    /// as `XXXXXX:Plugin.esm` form keys.
    pub extra_topics: Vec<String>,
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// The extra topics, parsed.
    pub fn extra_topic_keys(&self) -> tesplugin::Result<Vec<FormKey>> {
        self.extra_topics.iter().map(|s| FormKey::parse(s)).collect()
    }
}

/// Display labels per tier, falling back to the skill-level names.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Labels {
    pub very_easy: Option<String>,
    pub easy: Option<String>,
    pub average: Option<String>,
    pub hard: Option<String>,
    pub very_hard: Option<String>,
}

impl Labels {
    #[must_use]
    pub fn get(&self, tier: Difficulty) -> &str {
        let label = match tier {
            Difficulty::VeryEasy => &self.very_easy,
            Difficulty::Easy => &self.easy,
            Difficulty::Average => &self.average,
            Difficulty::Hard => &self.hard,
            Difficulty::VeryHard => &self.very_hard,
        };
        label.as_deref().unwrap_or_else(|| tier.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fall_back_to_skill_level_names() {
        let labels = Labels::default();
        assert_eq!(labels.get(Difficulty::Average), "Adept");
    }

    #[test]
    fn overrides_win() {
        let settings: Settings = toml::from_str(
            r#"
            [labels]
            average = "Journeyman"
            "#,
        )
        .unwrap();
        assert_eq!(settings.labels.get(Difficulty::Average), "Journeyman");
        assert_eq!(settings.labels.get(Difficulty::Hard), "Expert");
    }

    #[test]
    fn extra_topics_parse_as_form_keys() {
        let settings: Settings = toml::from_str(r#"extra_topics = ["0D4FC2:Skyrim.esm"]"#).unwrap();
        let keys = settings.extra_topic_keys().unwrap();
        assert_eq!(keys, vec![FormKey::new("Skyrim.esm", 0x0D4FC2)]);
    }

    #[test]
    fn top_level_keys_parse_alongside_the_labels_table() {
        let settings: Settings = toml::from_str(
            r#"
            extra_topics = ["0D4FC2:Skyrim.esm"]

            [labels]
            average = "Journeyman"
            "#,
        )
        .unwrap();
        assert_eq!(settings.extra_topics.len(), 1);
        assert_eq!(settings.labels.get(Difficulty::Average), "Journeyman");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: std::result::Result<Settings, _> = toml::from_str("unknown_key = 1");
        assert!(result.is_err());
    }
}
