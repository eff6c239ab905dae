//! Shared building blocks for the profile crawler workspace

mod error;
pub mod fs;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
