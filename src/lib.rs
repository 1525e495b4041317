//! Bundle Configuration Library
//!
//! Root file discovery, include expansion, and cached deep merging for
//! workspaces configured through several YAML files.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{ConfigDocument, ConfigFileSet, FileSetOptions};
pub use error::{FileSetError, Result};
