//! Error types for `tesplugin`

use std::path::PathBuf;

use thiserror::Error;

/// The error type for `tesplugin` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file does not start with a TES4 header record.
    #[error("invalid plugin magic: expected TES4, found {0:?}")]
    InvalidPluginMagic([u8; 4]),

    /// A group header carried something other than the GRUP signature.
    #[error("invalid group magic: expected GRUP, found {0:?}")]
    InvalidGroupMagic([u8; 4]),

    /// A group's declared size is smaller than its own header.
    #[error("group size {size} too small for header")]
    GroupSizeTooSmall {
        /// Declared size including the 24-byte header.
        size: u32,
    },

    /// A subrecord extends past the end of its record.
    #[error("subrecord {fourcc} overruns record data")]
    SubrecordOverrun {
        /// The subrecord signature.
        fourcc: String,
    },

    /// A fixed-size subrecord payload had the wrong length.
    #[error("subrecord {fourcc}: expected {expected} bytes, found {found}")]
    SubrecordSize {
        /// The subrecord signature.
        fourcc: String,
        /// Expected payload length.
        expected: usize,
        /// Actual payload length.
        found: usize,
    },

    /// A raw form id referenced a master index past the master list.
    #[error("form id {form_id:08X} references master index {index} but plugin has {masters} masters")]
    MasterIndexOutOfRange {
        /// The raw on-disk form id.
        form_id: u32,
        /// The master index (top byte).
        index: u8,
        /// Number of masters declared in the TES4 header.
        masters: usize,
    },

    /// A form key could not be re-encoded because its plugin is not in the
    /// output's master table.
    #[error("unresolved master for form key {form_key}")]
    UnresolvedMaster {
        /// The offending form key, rendered as `XXXXXX:Plugin.esm`.
        form_key: String,
    },

    /// Light (ESL-flagged) plugins use the 0xFE form id space, which this
    /// library does not model.
    #[error("light master form id space is not supported: {form_id:08X}")]
    LightMasterUnsupported {
        /// The raw on-disk form id.
        form_id: u32,
    },

    /// Zlib decompression of a compressed record failed.
    #[error("record {form_id:08X}: zlib decompression failed: {message}")]
    Decompression {
        /// The raw on-disk form id of the record.
        form_id: u32,
        /// The underlying error message.
        message: String,
    },

    /// A form key string did not match the `XXXXXX:Plugin.esm` notation.
    #[error("invalid form key: {0}")]
    InvalidFormKey(String),

    /// The VMAD script data could not be decoded.
    #[error("invalid script data: {0}")]
    InvalidScriptData(String),

    /// A plugin file in the requested load order does not exist.
    #[error("plugin not found: {path}")]
    PluginNotFound {
        /// The missing plugin path.
        path: PathBuf,
    },

    /// The load order file listed no plugins.
    #[error("load order is empty")]
    EmptyLoadOrder,

    /// Unexpected end of file.
    #[error("unexpected end of file")]
    UnexpectedEof,
}

/// A specialized Result type for `tesplugin` operations.
pub type Result<T> = std::result::Result<T, Error>;
