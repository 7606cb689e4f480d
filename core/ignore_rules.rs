//! Ignore-rule parsing and matching.
//!
//! Rules come from the project's ignore file, then the built-in defaults, then
//! any extra patterns from configuration. Every rule is evaluated for every
//! path and the last matching rule decides, so order is the only precedence.
//!
//! Matching is deliberately looser than gitignore: wildcard and literal
//! patterns are also tried against each individual path segment.

use crate::config::Config;
use crate::error::Result;
use crate::output_formats::get_builtin_ignore_patterns;
use globset::{GlobBuilder, GlobMatcher};
use log;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone)]
pub struct IgnoreRule {
    pub pattern: String,
    pub is_negation: bool,
    pub is_directory_scoped: bool,
    kind: PatternKind,
}

#[derive(Debug, Clone)]
enum PatternKind {
    /// `prefix/**`
    DirectoryTree(String),
    Wildcard(GlobMatcher),
    Literal,
}

impl PatternKind {
    fn compile(pattern: &str) -> Self {
        if let Some(prefix) = pattern.strip_suffix("/**") {
            return PatternKind::DirectoryTree(prefix.to_string());
        }
        if pattern.contains(['*', '?']) {
            match GlobBuilder::new(pattern)
                .literal_separator(false)
                .backslash_escape(true)
                .build()
            {
                Ok(glob) => return PatternKind::Wildcard(glob.compile_matcher()),
                Err(e) => {
                    log::warn!(
                        "Invalid wildcard pattern \"{}\": {}. Matching it literally.",
                        pattern,
                        e
                    );
                }
            }
        }
        PatternKind::Literal
    }

    fn matches(&self, path: &str, pattern: &str) -> bool {
        match self {
            PatternKind::DirectoryTree(prefix) => {
                path == prefix
                    || path
                        .strip_prefix(prefix.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
                    || path.split('/').any(|segment| segment == prefix)
            }
            PatternKind::Wildcard(matcher) => {
                matcher.is_match(path)
                    || path.split('/').any(|segment| matcher.is_match(segment))
            }
            PatternKind::Literal => {
                path == pattern
                    || path
                        .strip_prefix(pattern)
                        .is_some_and(|rest| rest.starts_with('/'))
                    || path.split('/').any(|segment| segment == pattern)
            }
        }
    }
}

impl IgnoreRule {
    /// Parses one ignore-file line. Blank lines and `#` comments yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return None;
        }

        let (is_negation, rest) = match trimmed.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (is_directory_scoped, rest) = match rest.strip_suffix('/') {
            Some(rest) => (true, rest),
            None => (false, rest),
        };
        // Paths are matched root-relative, so an anchoring slash carries no information.
        let pattern = rest.trim_start_matches('/');
        if pattern.is_empty() {
            return None;
        }

        Some(Self {
            pattern: pattern.to_string(),
            is_negation,
            is_directory_scoped,
            kind: PatternKind::compile(pattern),
        })
    }

    pub fn matches(&self, normalized_path: &str) -> bool {
        self.kind.matches(normalized_path, &self.pattern)
    }
}

/// Standalone form of the rule matcher, for a pattern that has already had
/// its `!` and trailing `/` removed.
pub fn matches_pattern(normalized_path: &str, pattern: &str) -> bool {
    PatternKind::compile(pattern).matches(normalized_path, pattern)
}

#[derive(Debug, Clone)]
pub struct IgnoreRuleEngine {
    root: PathBuf,
    rules: Vec<IgnoreRule>,
}

impl IgnoreRuleEngine {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            rules: Vec::new(),
        }
    }

    /// Builds the rule list for `root` in evaluation order: ignore file,
    /// built-in defaults, configured extra patterns.
    pub fn from_config(root: &Path, config: &Config) -> Result<Self> {
        let mut engine = Self::new(root);

        if config.general.use_ignore_file {
            let ignore_path = root.join(&config.general.ignore_file);
            match fs::read_to_string(&ignore_path) {
                Ok(content) => {
                    let added = engine.add_ignore_file_content(&content);
                    log::debug!(
                        "Loaded {} rules from {}",
                        added,
                        ignore_path.display()
                    );
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    log::debug!("No ignore file at {}", ignore_path.display());
                }
                Err(e) => {
                    log::warn!(
                        "Could not read ignore file {}: {}. Continuing without it.",
                        ignore_path.display(),
                        e
                    );
                }
            }
        }

        if config.general.enable_builtin_ignore {
            engine.add_builtin_defaults();
        }

        for pattern in &config.scan.additional_exclude_patterns {
            match IgnoreRule::parse(pattern) {
                Some(mut rule) => {
                    rule.is_negation = false;
                    engine.push(rule);
                }
                None => log::trace!("Skipping empty extra exclude pattern {:?}", pattern),
            }
        }

        log::debug!("Ignore rule engine holds {} rules", engine.rules.len());
        Ok(engine)
    }

    /// Returns the number of rules added.
    pub fn add_ignore_file_content(&mut self, content: &str) -> usize {
        let before = self.rules.len();
        for rule in content.lines().filter_map(IgnoreRule::parse) {
            self.push(rule);
        }
        self.rules.len() - before
    }

    pub fn add_builtin_defaults(&mut self) {
        for pattern in &get_builtin_ignore_patterns().patterns {
            if let Some(rule) = IgnoreRule::parse(pattern) {
                self.push(rule);
            }
        }
    }

    pub fn add_rule(&mut self, line: &str) {
        if let Some(rule) = IgnoreRule::parse(line) {
            self.push(rule);
        }
    }

    fn push(&mut self, rule: IgnoreRule) {
        log::trace!(
            "Adding ignore rule {:?} (negation: {}, directory: {})",
            rule.pattern,
            rule.is_negation,
            rule.is_directory_scoped
        );
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[IgnoreRule] {
        &self.rules
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn should_ignore(&self, path: &Path) -> bool {
        let normalized = normalize_path(path, &self.root);
        self.should_ignore_normalized(&normalized)
    }

    pub fn should_ignore_normalized(&self, normalized_path: &str) -> bool {
        let mut ignored = false;
        for rule in &self.rules {
            if rule.matches(normalized_path) {
                ignored = !rule.is_negation;
                log::trace!(
                    "{} matched rule {}{:?} -> ignored = {}",
                    normalized_path,
                    if rule.is_negation { "!" } else { "" },
                    rule.pattern,
                    ignored
                );
            }
        }
        ignored
    }
}

/// Root-relative, `/`-separated form of `path`. The root is stripped whether
/// it is absolute or relative; paths outside `root` are normalized as given.
pub fn normalize_path(path: &Path, root: &Path) -> String {
    let relative = match path.strip_prefix(root) {
        Ok(stripped) => stripped.to_path_buf(),
        Err(_) if path.is_absolute() => {
            pathdiff::diff_paths(path, root).unwrap_or_else(|| path.to_path_buf())
        }
        Err(_) => path.to_path_buf(),
    };

    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

pub fn is_binary_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            get_builtin_ignore_patterns()
                .binary_extensions
                .iter()
                .any(|b| *b == ext)
        })
        .unwrap_or(false)
}
