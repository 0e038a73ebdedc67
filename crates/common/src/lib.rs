//! Common utilities and types shared across pingwatch components.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
