//! Load order handling
//!
//! An ordered set of parsed plugins with the override semantics the game
//! applies: for a record defined in one plugin and overridden in later
//! ones, the last plugin in the order wins.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::formats::dialog::DialogTopic;
use crate::formats::reader::{read_plugin, Plugin};
use crate::formkey::FormKey;

/// Plugins parsed in load order, earliest first.
#[derive(Debug)]
pub struct LoadOrder {
    pub plugins: Vec<Plugin>,
}

impl LoadOrder {
    /// Parse the named plugins from a data directory, in order. Parsing
    /// runs in parallel; the resulting order matches `names`.
    ///
    /// # Errors
    /// Returns [`Error::EmptyLoadOrder`] for an empty name list and the
    /// first parse failure otherwise.
    pub fn load<P: AsRef<Path>>(data_dir: P, names: &[String]) -> Result<Self> {
        if names.is_empty() {
            return Err(Error::EmptyLoadOrder);
        }
        let data_dir = data_dir.as_ref();
        let plugins = names
            .par_iter()
            .map(|name| read_plugin(data_dir.join(name)))
            .collect::<Result<Vec<_>>>()?;
        tracing::info!(plugins = plugins.len(), "load order parsed");
        Ok(Self { plugins })
    }

    /// Plugin file names, in load order.
    #[must_use]
    pub fn plugin_names(&self) -> Vec<String> {
        self.plugins.iter().map(|p| p.name.clone()).collect()
    }

    /// The winning override of every dialog topic, keyed by identity.
    /// Iteration order is the order topics first appear in the load order.
    #[must_use]
    pub fn winning_topics(&self) -> IndexMap<FormKey, &DialogTopic> {
        let mut winning: IndexMap<FormKey, &DialogTopic> = IndexMap::new();
        for plugin in &self.plugins {
            for (key, topic) in &plugin.topics {
                winning.insert(key.clone(), topic);
            }
        }
        winning
    }

    /// Every version of one topic, in priority order (winning last).
    #[must_use]
    pub fn topic_versions(&self, key: &FormKey) -> Vec<&DialogTopic> {
        self.plugins
            .iter()
            .filter_map(|plugin| plugin.topics.get(key))
            .collect()
    }

    /// Resolve an editor id to a record identity. Later plugins win when
    /// an id appears more than once.
    #[must_use]
    pub fn resolve_editor_id(&self, editor_id: &str) -> Option<FormKey> {
        self.plugins
            .iter()
            .rev()
            .find_map(|plugin| plugin.editor_ids.get(editor_id).cloned())
    }
}

/// Read a plugins.txt-style load order file: one plugin per line, `#`
/// comments, an optional `*` active marker.
///
/// # Errors
/// Returns [`Error::Io`] if the file cannot be read and
/// [`Error::EmptyLoadOrder`] if no plugins remain after filtering.
pub fn read_load_order_file<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    let names: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.trim_start_matches('*').trim().to_string())
        .collect();
    if names.is_empty() {
        return Err(Error::EmptyLoadOrder);
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_order_file_filters_comments_and_markers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plugins.txt");
        fs::write(&path, "# load order\nSkyrim.esm\n*Dawnguard.esm\n\n*HHITPC.esp\n").unwrap();
        let names = read_load_order_file(&path).unwrap();
        assert_eq!(names, vec!["Skyrim.esm", "Dawnguard.esm", "HHITPC.esp"]);
    }

    #[test]
    fn empty_load_order_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plugins.txt");
        fs::write(&path, "# nothing active\n").unwrap();
        assert!(matches!(
            read_load_order_file(&path),
            Err(Error::EmptyLoadOrder)
        ));
    }
}
