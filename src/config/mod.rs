//! Multi-file bundle configuration.
//!
//! A workspace has one root file (by default `bundle.yml`, `bundle.yaml`,
//! `databricks.yml` or `databricks.yaml`) whose `include` list names further
//! files by glob. [`ConfigFileSet`] finds those files, deep-merges them in
//! order and caches the result until told otherwise.
//!
//! ## Merge Strategy
//! - Mappings: merged key by key, recursively
//! - Sequences: concatenated, earlier files first
//! - Everything else: the later file wins
//!
//! ## Environment Variables
//! - `BUNDLE_ROOT_FILE_PATTERN` - Root file glob
//! - `BUNDLE_INCLUDE_KEY` - Name of the include field
//! - `BUNDLE_CASE_INSENSITIVE` - Case-insensitive matching (`1`/`true`/`yes`)

mod cache;
mod files;
mod loader;
mod merge;
mod pattern;
mod types;

pub use cache::{CachedValue, LoadFuture};
pub use files::ConfigFileSet;
pub use loader::{load_document, parse_document};
pub use merge::{deep_merge, deep_merge_all};
pub use pattern::{PatternMatcher, PatternSet, compose_alternation, expand_braces};
pub use types::*;
