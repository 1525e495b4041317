//! The configuration file set of a workspace.
//!
//! Resolution runs in four steps:
//! 1. **Root** - exactly one file under the workspace root matching the root
//!    pattern. Zero or several matches mean "no configuration".
//! 2. **Includes** - the root file's include list, composed into one pattern
//!    anchored at the workspace root (not at the root file's directory).
//! 3. **Files** - the root file followed by every included file, sorted.
//! 4. **Merge** - every file deep-merged in that order, cached until
//!    [`ConfigFileSet::invalidate`].

use super::cache::CachedValue;
use super::loader::load_document;
use super::merge::deep_merge;
use super::pattern::{PatternMatcher, PatternSet};
use super::types::{
    ConfigDocument, DEFAULT_ROOT_FILE_PATTERN, FileSetOptions, empty_document, include_patterns,
};
use crate::error::{FileSetError, Result};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Discovery state shared between the file set and its cache loader.
#[derive(Debug)]
struct Discovery {
    workspace_root: PathBuf,
    options: FileSetOptions,
    root_patterns: PatternSet,
    root_matcher: PatternMatcher,
}

impl Discovery {
    async fn expand(&self, matcher: PatternMatcher) -> Result<Vec<PathBuf>> {
        let root = self.workspace_root.clone();
        tokio::task::spawn_blocking(move || matcher.expand(&root))
            .await
            .map_err(|e| FileSetError::Expansion(e.to_string()))
    }

    async fn root_file(&self) -> Result<Option<PathBuf>> {
        let mut matches = self.expand(self.root_matcher.clone()).await?;
        match matches.len() {
            1 => Ok(matches.pop()),
            0 => {
                debug!(
                    "No root file matching {} in {}",
                    self.root_patterns,
                    self.workspace_root.display()
                );
                Ok(None)
            }
            _ => {
                debug!(
                    "Ambiguous root file in {}: {:?}",
                    self.workspace_root.display(),
                    matches
                );
                Ok(None)
            }
        }
    }

    async fn included_files_glob(&self) -> Result<Option<PatternSet>> {
        let Some(root_file) = self.root_file().await? else {
            return Ok(None);
        };
        let document = load_document(&root_file).await?;
        Ok(PatternSet::new(include_patterns(
            &document,
            &self.options.include_key,
        )))
    }

    async fn included_files(&self) -> Result<Option<Vec<PathBuf>>> {
        let Some(patterns) = self.included_files_glob().await? else {
            return Ok(None);
        };
        let matcher = patterns.compile(self.options.case_insensitive)?;
        let files = self.expand(matcher).await?;
        debug!("Include {} matched {} file(s)", patterns, files.len());
        Ok(Some(files))
    }

    async fn all_files(&self) -> Result<Vec<PathBuf>> {
        let Some(root_file) = self.root_file().await? else {
            return Ok(Vec::new());
        };
        let mut files = vec![root_file];
        files.extend(self.included_files().await?.unwrap_or_default());
        Ok(files)
    }

    async fn compute_merged(&self) -> Result<Arc<ConfigDocument>> {
        let files = self.all_files().await?;
        info!(
            "Merging {} config file(s) under {}",
            files.len(),
            self.workspace_root.display()
        );

        let mut merged = empty_document();
        for path in &files {
            let document = load_document(path).await?;
            merged = deep_merge(merged, document);
        }
        Ok(Arc::new(merged))
    }
}

/// The root configuration file of a workspace plus everything it includes.
///
/// Cloning is cheap; clones share the merged configuration cache.
#[derive(Debug, Clone)]
pub struct ConfigFileSet {
    discovery: Arc<Discovery>,
    merged: CachedValue<Arc<ConfigDocument>>,
}

impl ConfigFileSet {
    /// Create a file set with default options.
    pub fn new(workspace_root: impl Into<PathBuf>) -> Result<Self> {
        Self::with_options(workspace_root, FileSetOptions::default())
    }

    /// Create a file set with explicit options.
    ///
    /// A relative workspace root is resolved against the current directory.
    pub fn with_options(workspace_root: impl Into<PathBuf>, options: FileSetOptions) -> Result<Self> {
        let workspace_root = absolute_root(workspace_root.into());

        let root_pattern = if options.root_file_pattern.trim().is_empty() {
            warn!("Empty root file pattern, using {}", DEFAULT_ROOT_FILE_PATTERN);
            DEFAULT_ROOT_FILE_PATTERN
        } else {
            options.root_file_pattern.as_str()
        };
        let root_patterns = PatternSet::single(root_pattern);
        let root_matcher = root_patterns.compile(options.case_insensitive)?;

        let discovery = Arc::new(Discovery {
            workspace_root,
            options,
            root_patterns,
            root_matcher,
        });

        let loader_discovery = Arc::clone(&discovery);
        let merged = CachedValue::new(move || {
            let discovery = Arc::clone(&loader_discovery);
            async move { discovery.compute_merged().await }
        });

        Ok(Self { discovery, merged })
    }

    /// The absolute workspace root.
    pub fn workspace_root(&self) -> &Path {
        &self.discovery.workspace_root
    }

    pub fn options(&self) -> &FileSetOptions {
        &self.discovery.options
    }

    /// The pattern locating the root file, relative to the workspace root.
    pub fn root_file_pattern(&self) -> &PatternSet {
        &self.discovery.root_patterns
    }

    /// The root file, if exactly one file matches the root pattern.
    pub async fn root_file(&self) -> Result<Option<PathBuf>> {
        self.discovery.root_file().await
    }

    /// The root file's include patterns as one alternation.
    ///
    /// `None` when there is no root file or it includes nothing.
    pub async fn included_files_glob(&self) -> Result<Option<PatternSet>> {
        self.discovery.included_files_glob().await
    }

    /// Files matched by the include patterns, sorted.
    ///
    /// `None` means includes are not configured; `Some(vec![])` means they
    /// matched nothing.
    pub async fn included_files(&self) -> Result<Option<Vec<PathBuf>>> {
        self.discovery.included_files().await
    }

    /// The root file followed by all included files. Empty without a root.
    pub async fn all_files(&self) -> Result<Vec<PathBuf>> {
        self.discovery.all_files().await
    }

    /// Files of the set for which `predicate` holds, in set order.
    pub async fn find_files_matching<F, Fut>(&self, mut predicate: F) -> Result<Vec<PathBuf>>
    where
        F: FnMut(PathBuf) -> Fut,
        Fut: Future<Output = bool>,
    {
        let mut matched = Vec::new();
        for file in self.all_files().await? {
            if predicate(file.clone()).await {
                matched.push(file);
            }
        }
        Ok(matched)
    }

    /// Parse each file of the set in order and hand it to `visitor`.
    ///
    /// Stops at the first read, parse, or visitor error.
    pub async fn for_each_file<F, Fut, E>(&self, mut visitor: F) -> std::result::Result<(), E>
    where
        F: FnMut(ConfigDocument, PathBuf) -> Fut,
        Fut: Future<Output = std::result::Result<(), E>>,
        E: From<FileSetError>,
    {
        for file in self.all_files().await? {
            let document = load_document(&file).await?;
            visitor(document, file).await?;
        }
        Ok(())
    }

    /// The merged configuration, computed on first access.
    pub async fn merged_config(&self) -> Result<Arc<ConfigDocument>> {
        self.merged.get().await
    }

    /// The merged configuration if it is already cached.
    pub fn cached_config(&self) -> Option<Arc<ConfigDocument>> {
        self.merged.peek()
    }

    /// Drop the cached merged configuration.
    pub fn invalidate(&self) {
        self.merged.invalidate();
    }

    /// Number of merge passes started since construction.
    pub fn merge_passes(&self) -> u64 {
        self.merged.computations()
    }

    /// Whether `path` matches the root file pattern. Does not touch the disk.
    pub fn is_root_file(&self, path: &Path) -> bool {
        self.discovery
            .root_matcher
            .is_match_under(&self.discovery.workspace_root, path)
    }

    /// Whether `path` matches the current root file's include patterns.
    pub async fn is_included_file(&self, path: &Path) -> Result<bool> {
        let Some(patterns) = self.included_files_glob().await? else {
            return Ok(false);
        };
        let matcher = patterns.compile(self.discovery.options.case_insensitive)?;
        Ok(matcher.is_match_under(&self.discovery.workspace_root, path))
    }

    /// Whether `path` is the root file or an included file.
    pub async fn is_config_file(&self, path: &Path) -> Result<bool> {
        if self.is_root_file(path) {
            return Ok(true);
        }
        self.is_included_file(path).await
    }

    /// Invalidate the cache if `path` belongs to the set.
    ///
    /// Meant to be called from a host's file watcher for every created,
    /// changed, or deleted path. Returns whether the cache was invalidated.
    pub async fn notify_changed(&self, path: &Path) -> Result<bool> {
        if self.is_config_file(path).await? {
            debug!("Config file changed: {}", path.display());
            self.invalidate();
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

fn absolute_root(root: PathBuf) -> PathBuf {
    if root.is_absolute() {
        root
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_relative_root_is_made_absolute() {
        let set = ConfigFileSet::new("some/project").unwrap();
        assert!(set.workspace_root().is_absolute());
        assert!(set.workspace_root().ends_with("some/project"));
    }

    #[test]
    fn test_blank_root_pattern_falls_back_to_default() {
        let options = FileSetOptions {
            root_file_pattern: "  ".to_string(),
            ..FileSetOptions::default()
        };
        let set = ConfigFileSet::with_options("/ws", options).unwrap();
        assert_eq!(set.root_file_pattern().composed(), DEFAULT_ROOT_FILE_PATTERN);
    }

    #[test]
    fn test_invalid_root_pattern_is_rejected() {
        let options = FileSetOptions {
            root_file_pattern: "[bundle.yml".to_string(),
            ..FileSetOptions::default()
        };
        let err = ConfigFileSet::with_options("/ws", options).unwrap_err();
        assert!(matches!(err, FileSetError::Pattern { .. }));
    }

    #[test]
    fn test_is_root_file_without_existence() {
        let temp = TempDir::new().unwrap();
        let set = ConfigFileSet::new(temp.path()).unwrap();
        assert!(set.is_root_file(&temp.path().join("bundle.yaml")));
        assert!(set.is_root_file(&temp.path().join("databricks.yml")));
        assert!(!set.is_root_file(&temp.path().join("nested/bundle.yml")));
        assert!(!set.is_root_file(Path::new("/other/bundle.yml")));
    }

    #[tokio::test]
    async fn test_custom_include_key() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("bundle.yml"), "extra: [more.yml]\n").unwrap();
        fs::write(temp.path().join("more.yml"), "x: 1\n").unwrap();

        let options = FileSetOptions {
            include_key: "extra".to_string(),
            ..FileSetOptions::default()
        };
        let set = ConfigFileSet::with_options(temp.path(), options).unwrap();
        assert_eq!(
            set.included_files().await.unwrap(),
            Some(vec![temp.path().join("more.yml")])
        );
    }
}
