//! TES4 plugin format support
//!
//! A deliberately small slice of the format: record/group framing, the
//! dialog record types (DIAL/INFO) in full, and editor-id skimming over
//! everything else.

pub mod condition;
pub mod dialog;
pub mod headers;
pub mod masters;
pub mod reader;
pub mod subrecord;
pub mod vmad;
pub mod writer;

pub use masters::MasterTable;
pub use reader::{parse_plugin_bytes, read_plugin, Plugin};
pub use writer::PatchMod;
