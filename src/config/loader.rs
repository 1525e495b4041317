//! Reading and parsing individual configuration files.

use super::types::{ConfigDocument, empty_document};
use crate::error::{FileSetError, Result};
use serde_json::Value;
use std::path::Path;
use tracing::debug;

/// Parse YAML text into a configuration document.
///
/// `path` only labels errors. Empty or comment-only text is an empty mapping.
pub fn parse_document(content: &str, path: &Path) -> Result<ConfigDocument> {
    let value: Value =
        serde_yaml::from_str(content).map_err(|e| FileSetError::parse(path, e))?;
    Ok(match value {
        Value::Null => empty_document(),
        other => other,
    })
}

/// Read and parse one configuration file.
pub async fn load_document(path: &Path) -> Result<ConfigDocument> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| FileSetError::io(path, e))?;
    debug!("Parsing config file {} ({} bytes)", path.display(), content.len());
    parse_document(&content, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_parse_nested_document() {
        let content = r#"
bundle:
  name: demo
include:
  - resources/*.yml
"#;
        let doc = parse_document(content, Path::new("bundle.yml")).unwrap();
        assert_eq!(
            doc,
            json!({"bundle": {"name": "demo"}, "include": ["resources/*.yml"]})
        );
    }

    #[test]
    fn test_parse_empty_is_empty_mapping() {
        assert_eq!(parse_document("", Path::new("a.yml")).unwrap(), json!({}));
        assert_eq!(
            parse_document("# only a comment\n", Path::new("a.yml")).unwrap(),
            json!({})
        );
    }

    #[test]
    fn test_parse_failure_names_file() {
        let err = parse_document("a: [1, 2", Path::new("broken.yml")).unwrap_err();
        assert!(err.is_parse());
        assert_eq!(err.path(), Some(Path::new("broken.yml")));
    }

    #[tokio::test]
    async fn test_load_missing_file_is_io_error() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope.yml");
        let err = load_document(&missing).await.unwrap_err();
        assert!(matches!(err, FileSetError::Io { .. }));
    }

    #[tokio::test]
    async fn test_load_reads_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bundle.yml");
        std::fs::write(&path, "targets:\n  dev:\n    default: true\n").unwrap();
        let doc = load_document(&path).await.unwrap();
        assert_eq!(doc, json!({"targets": {"dev": {"default": true}}}));
    }
}
