use std::path::PathBuf;

/// Errors from the non-real-time edges of the engine (presets, control
/// lookup). Nothing on the audio path returns one.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid preset JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown control `{0}`")]
    UnknownControl(String),

    #[error("unknown variant `{0}` (expected dirt, burn or simple)")]
    InvalidVariant(String),
}

pub type Result<T> = std::result::Result<T, Error>;
