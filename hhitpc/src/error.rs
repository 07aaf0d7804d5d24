use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("plugin error: {0}")]
    Plugin(#[from] tesplugin::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings error: {0}")]
    Settings(#[from] toml::de::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// A record the patch relies on could not be resolved by editor id.
    #[error("required record not found in load order: {editor_id}")]
    MissingRecord { editor_id: String },
}

pub type Result<T> = std::result::Result<T, Error>;
