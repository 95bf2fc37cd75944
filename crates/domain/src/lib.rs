//! `ari-domain`: types shared by every crate of the workspace: the TOML
//! configuration model and the common error type.

pub mod config;
pub mod error;

pub use config::Config;
pub use error::{Error, Result};
