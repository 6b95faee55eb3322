//! Configuration and startup errors shared across the workspace

use thiserror::Error;

/// Errors raised while loading or validating service configuration.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    /// A required secret was neither in the environment nor in a fallback file.
    #[error("secret {name} is not set: export {name} or configure {fallback}")]
    MissingSecret {
        name: &'static str,
        fallback: &'static str,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result alias using the shared Error
pub type Result<T> = std::result::Result<T, Error>;
