//! CLI error types.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;

/// CLI errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An explicitly requested config file does not exist.
    #[error("config file not found at {path}")]
    ConfigNotFound { path: PathBuf },

    /// Configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// `batch` was run without any prompts.
    #[error("no prompts given: pass them as arguments or with --file")]
    NoPrompts,

    /// The service returned a generation result without an image ID.
    #[error("no image ID in result: {text}")]
    MissingImageId { text: String },

    /// An error occurred talking to the image service.
    #[error(transparent)]
    Mcp(#[from] mcp::Error),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
