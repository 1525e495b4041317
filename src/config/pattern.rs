//! Glob patterns anchored at a workspace root.
//!
//! A [`PatternSet`] is an ordered list of glob strings meaning "any of these".
//! Its composed form is a single brace alternation (`{a,b,c}`). For matching,
//! brace groups are expanded up front, so nested groups work too.
//!
//! Pattern syntax:
//! - `*` and `?` never cross a `/`
//! - `**` spans any number of directories
//! - `{a,b}` matches either alternative
//! - `[abc]` / `[!abc]` character classes
//!
//! A path part starting with `.` is only matched by a pattern part that also
//! starts with a literal `.`, so `*/*.yml` skips `.github/ci.yml` while
//! `.github/*.yml` finds it. Patterns that leave the root (a `..` part or an
//! absolute path) are ignored with a warning.

use crate::error::{FileSetError, Result};
use globset::{Glob, GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use std::ffi::OsStr;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Combine patterns into one brace alternation.
///
/// Returns `None` for an empty list and the pattern itself for a single one.
pub fn compose_alternation<S: AsRef<str>>(patterns: &[S]) -> Option<String> {
    match patterns {
        [] => None,
        [single] => Some(single.as_ref().to_string()),
        many => {
            let joined: Vec<&str> = many.iter().map(|p| p.as_ref()).collect();
            Some(format!("{{{}}}", joined.join(",")))
        }
    }
}

/// Expand every `{a,b}` group, nested or not, into plain alternatives.
///
/// Duplicates are dropped, first occurrence wins. An unbalanced `{` is left
/// alone for the glob compiler to reject.
pub fn expand_braces(pattern: &str) -> Vec<String> {
    let chars: Vec<char> = pattern.chars().collect();

    let mut open = None;
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            '{' => {
                open = Some(i);
                break;
            }
            _ => {}
        }
        i += 1;
    }
    let Some(open) = open else {
        return vec![pattern.to_string()];
    };

    let mut depth = 0usize;
    let mut bounds = vec![open];
    let mut close = None;
    let mut j = open;
    while j < chars.len() {
        match chars[j] {
            '\\' => j += 1,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(j);
                    break;
                }
            }
            ',' if depth == 1 => bounds.push(j),
            _ => {}
        }
        j += 1;
    }
    let Some(close) = close else {
        return vec![pattern.to_string()];
    };
    bounds.push(close);

    let prefix: String = chars[..open].iter().collect();
    let suffix: String = chars[close + 1..].iter().collect();

    let mut expanded = Vec::new();
    for window in bounds.windows(2) {
        let option: String = chars[window[0] + 1..window[1]].iter().collect();
        for alternative in expand_braces(&format!("{prefix}{option}{suffix}")) {
            if !expanded.contains(&alternative) {
                expanded.push(alternative);
            }
        }
    }
    expanded
}

/// Strip leading `./` so patterns are plain root-relative paths.
fn normalize_pattern(pattern: &str) -> &str {
    let mut pattern = pattern.trim();
    while let Some(rest) = pattern.strip_prefix("./") {
        pattern = rest;
    }
    pattern
}

fn leaves_root(pattern: &str) -> bool {
    pattern.starts_with('/')
        || Path::new(pattern).is_absolute()
        || pattern.split('/').any(|part| part == "..")
}

fn is_hidden(name: &OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

fn build_glob(pattern: &str, case_insensitive: bool) -> std::result::Result<Glob, globset::Error> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .case_insensitive(case_insensitive)
        .build()
}

/// An ordered set of root-relative glob patterns, combined with logical OR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternSet {
    patterns: Vec<String>,
}

impl PatternSet {
    /// Build a set from raw patterns. Blank patterns are dropped; returns
    /// `None` if nothing is left.
    pub fn new<I, S>(patterns: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns: Vec<String> = patterns
            .into_iter()
            .map(|p| normalize_pattern(p.as_ref()).to_string())
            .filter(|p| !p.is_empty())
            .collect();

        if patterns.is_empty() {
            None
        } else {
            Some(Self { patterns })
        }
    }

    /// A set holding one pattern.
    pub fn single(pattern: &str) -> Self {
        Self {
            patterns: vec![normalize_pattern(pattern).to_string()],
        }
    }

    /// The individual alternatives, in declaration order.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// The single brace-alternation form of this set.
    pub fn composed(&self) -> String {
        compose_alternation(&self.patterns).unwrap_or_default()
    }

    /// Compile into a matcher.
    pub fn compile(&self, case_insensitive: bool) -> Result<PatternMatcher> {
        let mut builder = GlobSetBuilder::new();
        let mut dot_parts = Vec::new();
        let mut depths = Vec::new();
        let mut recursive = false;

        for pattern in &self.patterns {
            for alternative in expand_braces(pattern) {
                let alternative = normalize_pattern(&alternative).to_string();
                if alternative.is_empty() {
                    continue;
                }
                if leaves_root(&alternative) {
                    warn!("Ignoring pattern outside the workspace root: {}", alternative);
                    continue;
                }

                let glob = build_glob(&alternative, case_insensitive)
                    .map_err(|e| FileSetError::pattern(pattern, e))?;
                builder.add(glob);

                let hidden = alternative
                    .split('/')
                    .filter(|part| part.starts_with('.'))
                    .map(|part| build_glob(part, case_insensitive).map(|g| g.compile_matcher()))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|e| FileSetError::pattern(pattern, e))?;
                dot_parts.push(hidden);

                if alternative.contains("**") {
                    recursive = true;
                } else {
                    depths.push(alternative.matches('/').count() + 1);
                }
            }
        }

        let set = builder
            .build()
            .map_err(|e| FileSetError::pattern(&self.composed(), e))?;
        let max_depth = if recursive {
            None
        } else {
            depths.into_iter().max()
        };

        Ok(PatternMatcher {
            set,
            dot_parts,
            max_depth,
            case_insensitive,
        })
    }
}

impl fmt::Display for PatternSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.composed())
    }
}

/// A compiled [`PatternSet`].
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    set: GlobSet,
    /// Per glob in `set`: matchers for its parts that start with `.`.
    dot_parts: Vec<Vec<GlobMatcher>>,
    /// Deepest directory level any alternative can reach; `None` with `**`.
    max_depth: Option<usize>,
    case_insensitive: bool,
}

impl PatternMatcher {
    /// Test a path relative to the pattern root.
    ///
    /// Paths with `..`, a root, or a drive prefix never match.
    pub fn is_match_relative(&self, relative: &Path) -> bool {
        let mut clean = PathBuf::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => clean.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return false,
            }
        }

        let hidden: Vec<&OsStr> = clean
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) if is_hidden(part) => Some(part),
                _ => None,
            })
            .collect();

        self.set.matches(&clean).into_iter().any(|index| {
            hidden
                .iter()
                .all(|part| self.dot_parts[index].iter().any(|g| g.is_match(part)))
        })
    }

    /// Test a path against the patterns anchored at `root`.
    ///
    /// Relative paths are taken as relative to `root`. Absolute paths outside
    /// `root` never match. The root prefix is compared with the same case
    /// rule as the patterns.
    pub fn is_match_under(&self, root: &Path, path: &Path) -> bool {
        if path.is_relative() {
            return self.is_match_relative(path);
        }
        match self.strip_root(root, path) {
            Some(relative) => self.is_match_relative(relative),
            None => false,
        }
    }

    fn strip_root<'a>(&self, root: &Path, path: &'a Path) -> Option<&'a Path> {
        let mut components = path.components();
        for expected in root.components() {
            let actual = components.next()?;
            let same = if self.case_insensitive {
                actual.as_os_str().to_string_lossy().to_lowercase()
                    == expected.as_os_str().to_string_lossy().to_lowercase()
            } else {
                actual == expected
            };
            if !same {
                return None;
            }
        }
        Some(components.as_path())
    }

    /// Whether some pattern part names this hidden directory.
    fn allows_hidden(&self, name: &OsStr) -> bool {
        self.dot_parts.iter().flatten().any(|g| g.is_match(name))
    }

    /// Scan `root` for regular files matching the patterns.
    ///
    /// Returns absolute paths in sorted order. Hidden directories no pattern
    /// names are not entered, unreadable ones are skipped. This walks the
    /// filesystem synchronously.
    pub fn expand(&self, root: &Path) -> Vec<PathBuf> {
        if self.set.is_empty() {
            return Vec::new();
        }

        let mut walker = WalkDir::new(root).min_depth(1);
        if let Some(depth) = self.max_depth {
            walker = walker.max_depth(depth);
        }

        let mut matches = Vec::new();
        let entries = walker.into_iter().filter_entry(|entry| {
            !(entry.depth() > 0
                && entry.file_type().is_dir()
                && is_hidden(entry.file_name())
                && !self.allows_hidden(entry.file_name()))
        });
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable path under {}: {}", root.display(), e);
                    continue;
                }
            };

            let is_file = entry.file_type().is_file()
                || (entry.path_is_symlink() && entry.path().is_file());
            if !is_file {
                continue;
            }

            if let Ok(relative) = entry.path().strip_prefix(root)
                && self.is_match_relative(relative)
            {
                matches.push(entry.path().to_path_buf());
            }
        }

        matches.sort();
        debug!("Expanded patterns under {}: {} match(es)", root.display(), matches.len());
        matches
    }
}
