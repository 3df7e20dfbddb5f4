//! Core types: configuration, errors, logging and window matching

pub mod config;
pub mod errors;
pub mod logging;
pub mod window;

pub use config::{Config, ConfigArgs};
pub use errors::{DesktopError, DesktopResult, Limitation};
