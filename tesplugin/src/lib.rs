//! # tesplugin
//!
//! A pure-Rust library for the slice of the TES4 plugin format that
//! dialog patching needs: reading dialog topics and their responses out
//! of a load order, and writing an override patch plugin back.
//!
//! ## Reading a load order
//!
//! ```no_run
//! use tesplugin::load_order::LoadOrder;
//!
//! let names = vec!["Skyrim.esm".to_string(), "Dawnguard.esm".to_string()];
//! let load_order = LoadOrder::load("Data", &names)?;
//! for (key, topic) in load_order.winning_topics() {
//!     println!("{key}: {:?}", topic.editor_id);
//! }
//! # Ok::<(), tesplugin::Error>(())
//! ```
//!
//! ## Writing a patch
//!
//! ```no_run
//! use tesplugin::formats::PatchMod;
//!
//! let patch = PatchMod::new("HHITPC.esp", vec!["Skyrim.esm".to_string()]);
//! patch.write_to("Data/HHITPC.esp")?;
//! # Ok::<(), tesplugin::Error>(())
//! ```

pub mod error;
pub mod formats;
pub mod formkey;
pub mod load_order;

pub use error::{Error, Result};
pub use formkey::FormKey;

/// Convenient access to commonly used types.
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::formats::condition::{
        CompareOperator, Condition, ConditionValue, Function, Param, RunOn,
    };
    pub use crate::formats::dialog::{
        DialogResponse, DialogTopic, Emotion, ResponseFlags, ResponseLine,
    };
    pub use crate::formats::vmad::{Fragment, FragmentData, Property, Script, ScriptData};
    pub use crate::formats::{MasterTable, PatchMod, Plugin};
    pub use crate::formkey::FormKey;
    pub use crate::load_order::LoadOrder;
}
