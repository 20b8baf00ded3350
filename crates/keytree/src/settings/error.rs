//! Error types for settings persistence.

use std::path::{Path, PathBuf};

/// Result type alias for settings operations.
pub type SettingsResult<T> = std::result::Result<T, SettingsError>;

/// Errors that can occur while loading or saving settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Reading or writing the file failed.
    #[error("failed to access settings file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file content is not valid for its format.
    #[error("invalid settings in '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    /// The settings could not be encoded.
    #[error("failed to encode settings: {0}")]
    Encode(String),

    /// The format could not be derived from the file extension.
    #[error("unknown settings format for '{0}'")]
    UnknownFormat(PathBuf),
}

impl SettingsError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn parse(path: impl AsRef<Path>, message: impl ToString) -> Self {
        Self::Parse {
            path: path.as_ref().to_path_buf(),
            message: message.to_string(),
        }
    }

    pub fn encode(message: impl ToString) -> Self {
        Self::Encode(message.to_string())
    }
}
