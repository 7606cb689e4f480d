use pretty_assertions::assert_eq;
use projdoc_core::{
    AppError, CancellationToken, Config, Pipeline, ProjectType, SkipReason, Stage,
};
use std::fs;
use std::path::Path;
use std::sync::mpsc;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn node_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(
        root,
        "package.json",
        r#"{"name": "demo", "dependencies": {"express": "^4.18.0"}}"#,
    );
    write(root, "index.js", "run();\n// x");
    write(root, ".gitignore", "dist/\n");
    write(root, "dist/bundle.js", &"b".repeat(2000));
    dir
}

#[test]
fn node_project_end_to_end() {
    let dir = node_project();
    let output = Pipeline::new(Config::default()).run(dir.path(), None).unwrap();

    assert_eq!(output.discovery.files, vec!["index.js", "package.json"]);
    assert!(output.load.skipped.is_empty());

    assert_eq!(output.analysis.project_type, ProjectType::Node);
    assert_eq!(output.analysis.project_type.to_string(), "Node.js Application");
    assert_eq!(
        output.analysis.dependencies.iter().cloned().collect::<Vec<_>>(),
        vec!["express".to_string()]
    );
    assert_eq!(output.analysis.total_files, 2);
    assert!(output.analysis.directories.is_empty());

    assert_eq!(output.batches.len(), 1);
    let order: Vec<&str> = output.batches[0]
        .files
        .iter()
        .map(|f| f.relative_path.as_str())
        .collect();
    // both are entry files, so the larger manifest goes first
    assert_eq!(order, vec!["package.json", "index.js"]);
    assert_eq!(output.batches[0].index, 0);

    // loaded records live in the batches; discovery order is still recoverable
    assert!(output.load.records.is_empty());
    let loaded: Vec<&str> = output
        .records()
        .iter()
        .map(|r| r.relative_path.as_str())
        .collect();
    assert_eq!(loaded, vec!["index.js", "package.json"]);
}

#[test]
fn negated_ignore_file_rule_keeps_file_until_a_later_rule_matches() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, ".gitignore", "*.md\n!KEEP.md\n");
    write(root, "KEEP.md", "keep");
    write(root, "drop.md", "drop");
    write(root, "src/app.py", "print('hi')");

    let output = Pipeline::new(Config::default()).run(root, None).unwrap();
    assert_eq!(output.discovery.files, vec!["KEEP.md", "src/app.py"]);
}

#[test]
fn extra_excludes_and_size_limit_apply() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "main.go", "package main");
    write(root, "go.mod", "module demo");
    write(root, "fixtures/data.json", "{}");
    write(root, "huge.go", &"x".repeat(4096));

    let config = Config::from_toml_str(
        r#"
        [scan]
        max_file_size = "1 KiB"
        additional_exclude_patterns = ["fixtures/"]
        "#,
    )
    .unwrap();
    let output = Pipeline::new(config).run(root, None).unwrap();

    assert_eq!(output.discovery.files, vec!["go.mod", "huge.go", "main.go"]);
    assert_eq!(output.record_count(), 2);
    assert_eq!(output.load.skipped.len(), 1);
    assert_eq!(output.load.skipped[0].0, "huge.go");
    assert!(matches!(
        output.load.skipped[0].1,
        SkipReason::TooLarge { size: 4096, limit: 1024 }
    ));
    assert_eq!(output.analysis.project_type.to_string(), "Go Module");
}

#[test]
fn builtin_ignores_can_be_disabled() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "node_modules/pkg/index.js", "module.exports = 1;");
    write(root, "app.js", "require('pkg');");

    let mut config = Config::default();
    let with_defaults = Pipeline::new(config.clone()).run(root, None).unwrap();
    assert_eq!(with_defaults.discovery.files, vec!["app.js"]);

    config.general.enable_builtin_ignore = false;
    let without = Pipeline::new(config).run(root, None).unwrap();
    assert_eq!(
        without.discovery.files,
        vec!["app.js", "node_modules/pkg/index.js"]
    );
}

#[test]
fn progress_events_cover_scanning_loading_and_chunking() {
    let dir = node_project();
    let (tx, rx) = mpsc::channel();
    Pipeline::new(Config::default())
        .run(dir.path(), Some(&tx))
        .unwrap();
    drop(tx);
    let events: Vec<_> = rx.into_iter().collect();

    let stages: Vec<Stage> = events.iter().map(|e| e.stage).collect();
    assert_eq!(stages.first(), Some(&Stage::Scanning));
    assert!(stages.contains(&Stage::Analyzing));
    assert_eq!(stages.last(), Some(&Stage::Chunking));
    assert!(events.windows(2).all(|w| w[0].percentage <= w[1].percentage));
    assert_eq!(events.last().unwrap().percentage, 85);
}

#[test]
fn relative_root_yields_root_relative_paths() {
    // cwd-relative, and named like a default-ignored directory
    let scratch = TempDir::new_in(".").unwrap();
    let root = scratch.path().join("build");
    assert!(root.is_relative());
    write(&root, "main.rs", "fn main() {}");
    write(&root, "src/lib.rs", "pub fn lib() {}");
    write(&root, "target/debug/app.rs", "// generated");

    let output = Pipeline::new(Config::default()).run(&root, None).unwrap();

    assert_eq!(output.discovery.files, vec!["main.rs", "src/lib.rs"]);
    assert!(output.load.skipped.is_empty());
    assert_eq!(output.record_count(), 2);
    assert_eq!(output.analysis.total_files, 2);
    assert_eq!(
        output.analysis.directories.iter().cloned().collect::<Vec<_>>(),
        vec!["src".to_string()]
    );
}

#[test]
fn missing_root_is_fatal() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope");
    let err = Pipeline::new(Config::default()).run(&missing, None).unwrap_err();
    assert!(matches!(err, AppError::WorkspaceNotFound(_)));
}

#[test]
fn cancelled_pipeline_stops() {
    let dir = node_project();
    let token = CancellationToken::new();
    token.cancel();
    let err = Pipeline::new(Config::default())
        .with_cancellation(token)
        .run(dir.path(), None)
        .unwrap_err();
    assert!(matches!(err, AppError::Cancelled));
}
