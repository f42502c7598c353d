//! Common types for the calendar booking service

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
