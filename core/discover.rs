use crate::ignore_rules::{IgnoreRuleEngine, is_binary_file, normalize_path};
use log;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A directory (or entry) that could not be read during the walk. The
/// affected subtree is skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryError {
    pub path: Option<PathBuf>,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    /// Root-relative, `/`-separated paths in walk order.
    pub files: Vec<String>,
    pub errors: Vec<DirectoryError>,
}

/// Depth-first walk of `root`. Ignored directories are pruned without being
/// entered; files must pass both the ignore rules and the binary check.
///
/// With `follow_links`, symlink loops are reported as errors by `walkdir`
/// rather than followed forever.
pub fn discover(root: &Path, engine: &IgnoreRuleEngine, follow_links: bool) -> DiscoveryReport {
    log::info!("Walking project directory: {}", root.display());
    let mut report = DiscoveryReport::default();

    let walker = WalkDir::new(root)
        .follow_links(follow_links)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 || !entry.file_type().is_dir() {
                return true;
            }
            let relative = normalize_path(entry.path(), root);
            if engine.should_ignore_normalized(&relative) {
                log::trace!("Pruning ignored directory: {}", relative);
                false
            } else {
                true
            }
        });

    for entry_result in walker {
        let entry = match entry_result {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!(
                    "Error walking directory: {} (at {})",
                    e,
                    e.path()
                        .map_or_else(|| "unknown path".into(), |p| p.display().to_string())
                );
                report.errors.push(DirectoryError {
                    path: e.path().map(Path::to_path_buf),
                    message: e.to_string(),
                });
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let relative = normalize_path(entry.path(), root);
        if engine.should_ignore_normalized(&relative) {
            log::trace!("Excluding ignored file: {}", relative);
            continue;
        }
        if is_binary_file(entry.path()) {
            log::trace!("Excluding binary file: {}", relative);
            continue;
        }
        log::trace!("Including file: {}", relative);
        report.files.push(relative);
    }

    log::info!(
        "Directory walk complete. Accepted {} files ({} unreadable entries).",
        report.files.len(),
        report.errors.len()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn walk_applies_rules_and_binary_check() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "src/main.rs", "fn main() {}");
        write(root, "src/logo.png", "not really a png");
        write(root, "build/out.txt", "generated");
        write(root, "notes/todo.md", "- item");
        write(root, "notes/secret.txt", "shh");

        let mut engine = IgnoreRuleEngine::new(root);
        engine.add_rule("build/");
        engine.add_rule("secret.txt");

        let report = discover(root, &engine, false);
        assert_eq!(report.files, vec!["notes/todo.md", "src/main.rs"]);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn ignored_directories_are_not_entered() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "vendor/keep.rs", "");
        write(root, "lib.rs", "");

        let mut engine = IgnoreRuleEngine::new(root);
        engine.add_rule("vendor");
        // a later negation on the file alone cannot resurrect it: the
        // directory is pruned before its children are evaluated
        engine.add_rule("!keep.rs");

        let report = discover(root, &engine, false);
        assert_eq!(report.files, vec!["lib.rs"]);
    }

    #[test]
    fn empty_root_yields_nothing() {
        let dir = TempDir::new().unwrap();
        let engine = IgnoreRuleEngine::new(dir.path());
        let report = discover(dir.path(), &engine, false);
        assert!(report.files.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_loops_are_reported_not_followed() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "a/file.txt", "x");
        std::os::unix::fs::symlink(root.join("a"), root.join("a/loop")).unwrap();

        let engine = IgnoreRuleEngine::new(root);
        let report = discover(root, &engine, true);
        assert_eq!(report.files, vec!["a/file.txt"]);
        assert_eq!(report.errors.len(), 1);
    }
}
