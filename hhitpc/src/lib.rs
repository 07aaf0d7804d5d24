//! hhitpc - persuasion-check difficulty patcher for Skyrim SE
//!
//! Scans a load order's dialog topics for persuasion checks, rewrites
//! every speech check to compare against the vanilla difficulty
//! globals with an Amulet of Articulation bypass, labels the dialog
//! text with the check's difficulty, repairs the vanilla topics whose
//! persuasion plumbing is broken, and writes the result as a patch
//! plugin that overrides only what it changes.

// Re-export the plugin format engine
pub use tesplugin;

pub mod cli;
pub mod error;
pub mod patch;
pub mod settings;

pub use error::{Error, Result};
pub use patch::PatchContext;
