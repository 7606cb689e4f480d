//! Path-only file classification: language label and file roles.

#[cfg(feature = "serde_support")]
use serde::Serialize;
use std::path::Path;

pub const UNKNOWN_LANGUAGE: &str = "Unknown";

const ENTRY_FILE_NAMES: &[&str] = &[
    "main.",
    "index.",
    "app.",
    "server.",
    "client.",
    "package.json",
    "requirements.txt",
    "setup.py",
    "dockerfile",
    "docker-compose.yml",
    "makefile",
    "readme.md",
    "readme.txt",
    "license",
    "changelog.md",
];

const CONFIG_FILE_PATTERNS: &[&str] = &[
    "package.json",
    "tsconfig.json",
    "jsconfig.json",
    "webpack.config",
    "vite.config",
    "rollup.config",
    "babel.config",
    ".babelrc",
    ".eslintrc",
    ".prettierrc",
    "next.config",
    "nuxt.config",
    "tailwind.config",
    "jest.config",
    "requirements.txt",
    "setup.py",
    "setup.cfg",
    "pyproject.toml",
    "pipfile",
    "cargo.toml",
    "go.mod",
    "pom.xml",
    "build.gradle",
    "settings.gradle",
    "pubspec.yaml",
    "composer.json",
    "gemfile",
    "dockerfile",
    "docker-compose",
    "makefile",
    ".editorconfig",
    ".env.example",
];

const TEST_PATH_PATTERNS: &[&str] = &[
    ".test.",
    ".spec.",
    "__tests__",
    "/test/",
    "/tests/",
    "_test.",
    "test_",
];

const DOC_EXTENSIONS: &[&str] = &["md", "markdown", "rst", "txt", "adoc", "org"];

const DOC_NAME_PATTERNS: &[&str] = &["readme", "changelog", "license", "contributing", "docs"];

/// Role of a file, resolved with fixed precedence
/// config > test > documentation > source > other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde_support", derive(Serialize))]
#[cfg_attr(feature = "serde_support", serde(rename_all = "lowercase"))]
pub enum FileRole {
    Config,
    Test,
    Documentation,
    Source,
    Other,
}

pub fn language_of(path: &str) -> &'static str {
    let Some(ext) = Path::new(path).extension().and_then(|e| e.to_str()) else {
        return UNKNOWN_LANGUAGE;
    };
    match ext.to_lowercase().as_str() {
        // Web
        "js" | "mjs" | "cjs" => "JavaScript",
        "jsx" => "React JSX",
        "ts" | "mts" | "cts" => "TypeScript",
        "tsx" => "React TSX",
        "vue" => "Vue",
        "svelte" => "Svelte",
        "html" | "htm" => "HTML",
        "css" => "CSS",
        "scss" | "sass" => "SCSS",
        "less" => "Less",
        // Systems
        "rs" => "Rust",
        "go" => "Go",
        "c" | "h" => "C",
        "cpp" | "cc" | "cxx" | "hpp" | "hh" => "C++",
        "cs" => "C#",
        "swift" => "Swift",
        "m" | "mm" => "Objective-C",
        "zig" => "Zig",
        // JVM
        "java" => "Java",
        "kt" | "kts" => "Kotlin",
        "scala" => "Scala",
        "groovy" | "gradle" => "Groovy",
        "clj" | "cljs" => "Clojure",
        // Scripting
        "py" | "pyw" => "Python",
        "rb" => "Ruby",
        "php" => "PHP",
        "pl" | "pm" => "Perl",
        "lua" => "Lua",
        "r" => "R",
        "dart" => "Dart",
        "sh" | "bash" | "zsh" | "fish" => "Shell",
        "ps1" => "PowerShell",
        // Functional
        "hs" => "Haskell",
        "ml" | "mli" => "OCaml",
        "fs" | "fsx" => "F#",
        "ex" | "exs" => "Elixir",
        "erl" => "Erlang",
        "elm" => "Elm",
        // Config and data
        "json" => "JSON",
        "yaml" | "yml" => "YAML",
        "toml" => "TOML",
        "xml" => "XML",
        "ini" | "cfg" => "INI",
        "env" => "Environment",
        // Docs
        "md" | "markdown" => "Markdown",
        "rst" => "reStructuredText",
        "txt" => "Text",
        "tex" => "LaTeX",
        // Database
        "sql" => "SQL",
        "graphql" | "gql" => "GraphQL",
        "prisma" => "Prisma",
        _ => UNKNOWN_LANGUAGE,
    }
}

fn lowercase_basename(path: &str) -> String {
    path.rsplit(['/', '\\'])
        .next()
        .unwrap_or(path)
        .to_lowercase()
}

pub fn is_entry_file(path: &str) -> bool {
    let name = lowercase_basename(path);
    ENTRY_FILE_NAMES
        .iter()
        .any(|entry| name == *entry || name.starts_with(entry))
}

pub fn is_config_file(path: &str) -> bool {
    let name = lowercase_basename(path);
    CONFIG_FILE_PATTERNS.iter().any(|p| name.contains(p))
}

pub fn is_test_file(path: &str) -> bool {
    let lower = format!("/{}", path.to_lowercase().replace('\\', "/"));
    let name = lowercase_basename(path);
    TEST_PATH_PATTERNS.iter().any(|p| {
        if p.starts_with('/') || *p == "__tests__" {
            lower.contains(p)
        } else {
            name.contains(p)
        }
    })
}

pub fn is_documentation_file(path: &str) -> bool {
    let name = lowercase_basename(path);
    let has_doc_ext = Path::new(&name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| DOC_EXTENSIONS.contains(&ext));
    has_doc_ext
        || DOC_NAME_PATTERNS.iter().any(|p| name.contains(p))
        || path.to_lowercase().starts_with("docs/")
}

pub fn role_of(path: &str) -> FileRole {
    if is_config_file(path) {
        FileRole::Config
    } else if is_test_file(path) {
        FileRole::Test
    } else if is_documentation_file(path) {
        FileRole::Documentation
    } else if language_of(path) != UNKNOWN_LANGUAGE {
        FileRole::Source
    } else {
        FileRole::Other
    }
}
