//! Configuration document and file set option types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// A parsed configuration file.
///
/// Documents have no fixed schema: mappings, sequences and scalars nest
/// freely. Only the include list gets a typed accessor.
pub type ConfigDocument = Value;

/// Default pattern locating the root configuration file.
pub const DEFAULT_ROOT_FILE_PATTERN: &str = "{bundle,databricks}.{yaml,yml}";

/// Default name of the field listing include patterns.
pub const DEFAULT_INCLUDE_KEY: &str = "include";

/// An empty document, the identity element for merging.
pub fn empty_document() -> ConfigDocument {
    Value::Object(serde_json::Map::new())
}

/// Read the include patterns of a document, in declaration order.
///
/// A missing or `null` field yields an empty list. A bare string is accepted
/// as a single pattern. Non-string sequence entries are skipped.
pub fn include_patterns(document: &ConfigDocument, key: &str) -> Vec<String> {
    match document.get(key) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(pattern)) => vec![pattern.clone()],
        Some(Value::Array(entries)) => entries
            .iter()
            .filter_map(|entry| match entry {
                Value::String(pattern) => Some(pattern.clone()),
                other => {
                    warn!("Ignoring non-string {} entry: {}", key, other);
                    None
                }
            })
            .collect(),
        Some(other) => {
            warn!("Ignoring {} field that is not a list: {}", key, other);
            Vec::new()
        }
    }
}

/// Options controlling how a file set locates its files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSetOptions {
    /// Glob locating the root file, relative to the workspace root.
    #[serde(default = "default_root_file_pattern")]
    pub root_file_pattern: String,

    /// Field of the root file holding include patterns.
    #[serde(default = "default_include_key")]
    pub include_key: String,

    /// Match patterns without regard to case.
    #[serde(default = "default_case_insensitive")]
    pub case_insensitive: bool,
}

impl Default for FileSetOptions {
    fn default() -> Self {
        Self {
            root_file_pattern: default_root_file_pattern(),
            include_key: default_include_key(),
            case_insensitive: default_case_insensitive(),
        }
    }
}

fn default_root_file_pattern() -> String {
    DEFAULT_ROOT_FILE_PATTERN.to_string()
}

fn default_include_key() -> String {
    DEFAULT_INCLUDE_KEY.to_string()
}

fn default_case_insensitive() -> bool {
    cfg!(windows)
}

impl FileSetOptions {
    /// Parse options from YAML. Missing fields take their defaults.
    pub fn from_yaml_str(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        options.apply_env_overrides();
        options
    }

    /// Apply `BUNDLE_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(pattern) = lookup("BUNDLE_ROOT_FILE_PATTERN")
            && !pattern.trim().is_empty()
        {
            self.root_file_pattern = pattern;
        }

        if let Some(key) = lookup("BUNDLE_INCLUDE_KEY")
            && !key.trim().is_empty()
        {
            self.include_key = key;
        }

        if let Some(flag) = lookup("BUNDLE_CASE_INSENSITIVE") {
            match flag.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => self.case_insensitive = true,
                "0" | "false" | "no" => self.case_insensitive = false,
                other => warn!("Ignoring BUNDLE_CASE_INSENSITIVE={}", other),
            }
        }
    }
}
