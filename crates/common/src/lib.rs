//! Shared plumbing for the export gateway workspace

mod secret;
mod error;

pub use secret::Secret;
pub use error::{Error, Result};
