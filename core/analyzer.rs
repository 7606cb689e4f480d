use crate::classify::UNKNOWN_LANGUAGE;
use crate::loader::FileRecord;
use indexmap::IndexSet;
use log;
#[cfg(feature = "serde_support")]
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectType {
    React,
    Vue,
    NextJs,
    Node,
    Django,
    Python,
    Maven,
    Gradle,
    GoModule,
    Rust,
    Flutter,
    /// Fallback named after the first detected language.
    Language(String),
    Generic,
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectType::React => f.write_str("React Application"),
            ProjectType::Vue => f.write_str("Vue.js Application"),
            ProjectType::NextJs => f.write_str("Next.js Application"),
            ProjectType::Node => f.write_str("Node.js Application"),
            ProjectType::Django => f.write_str("Django Application"),
            ProjectType::Python => f.write_str("Python Project"),
            ProjectType::Maven => f.write_str("Maven Java Project"),
            ProjectType::Gradle => f.write_str("Gradle Java Project"),
            ProjectType::GoModule => f.write_str("Go Module"),
            ProjectType::Rust => f.write_str("Rust Project"),
            ProjectType::Flutter => f.write_str("Flutter Application"),
            ProjectType::Language(lang) => write!(f, "{} Project", lang),
            ProjectType::Generic => f.write_str("Software Project"),
        }
    }
}

#[cfg(feature = "serde_support")]
impl Serialize for ProjectType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde_support", derive(Serialize))]
#[cfg_attr(feature = "serde_support", serde(rename_all = "camelCase"))]
pub struct ProjectAnalysis {
    pub total_files: usize,
    pub total_size_bytes: u64,
    /// Detected languages in first-seen order, `Unknown` excluded.
    pub languages: IndexSet<String>,
    pub entry_files: Vec<String>,
    pub dependencies: BTreeSet<String>,
    pub project_type: ProjectType,
    pub directories: BTreeSet<String>,
    #[cfg_attr(
        feature = "serde_support",
        serde(skip_serializing_if = "Vec::is_empty")
    )]
    pub manifest_errors: Vec<(String, String)>,
}

pub fn analyze(records: &[FileRecord]) -> ProjectAnalysis {
    log::debug!("Analyzing {} file records...", records.len());
    let mut total_size_bytes = 0u64;
    let mut languages = IndexSet::new();
    let mut entry_files = Vec::new();
    let mut directories = BTreeSet::new();
    let mut dependencies = BTreeSet::new();
    let mut manifest_errors = Vec::new();

    for record in records {
        total_size_bytes = total_size_bytes.saturating_add(record.size_bytes);
        if record.language != UNKNOWN_LANGUAGE {
            languages.insert(record.language.to_string());
        }
        if record.is_entry_file {
            entry_files.push(record.relative_path.clone());
        }
        if let Some((dir, _)) = record.relative_path.rsplit_once('/') {
            if !dir.is_empty() {
                directories.insert(dir.to_string());
            }
        }

        if basename(&record.relative_path) == "package.json" {
            match package_json_dependencies(&record.content) {
                Ok(deps) => dependencies.extend(deps),
                Err(e) => {
                    log::warn!("Could not parse {}: {}", record.relative_path, e);
                    manifest_errors.push((record.relative_path.clone(), e));
                }
            }
        }
        if record.relative_path.contains("requirements.txt") {
            dependencies.extend(requirements_dependencies(&record.content));
        }
    }

    let project_type = detect_project_type(records, &languages);
    log::info!(
        "Analysis complete: {} ({} files, {} languages, {} dependencies)",
        project_type,
        records.len(),
        languages.len(),
        dependencies.len()
    );

    ProjectAnalysis {
        total_files: records.len(),
        total_size_bytes,
        languages,
        entry_files,
        dependencies,
        project_type,
        directories,
        manifest_errors,
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Keys of `dependencies` and `devDependencies`.
pub fn package_json_dependencies(content: &str) -> Result<BTreeSet<String>, String> {
    let manifest: Value = serde_json::from_str(content).map_err(|e| e.to_string())?;
    let Some(obj) = manifest.as_object() else {
        return Err("manifest is not a JSON object".to_string());
    };
    let mut deps = BTreeSet::new();
    for field in ["dependencies", "devDependencies"] {
        if let Some(map) = obj.get(field).and_then(Value::as_object) {
            deps.extend(map.keys().cloned());
        }
    }
    Ok(deps)
}

pub fn requirements_dependencies(content: &str) -> BTreeSet<String> {
    content
        .lines()
        .map(str::trim)
        // `-r other.txt` / `-e .` are pip options, not packages
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('-'))
        .filter_map(|line| {
            let end = ["==", ">=", "<="]
                .iter()
                .filter_map(|op| line.find(op))
                .min()
                .unwrap_or(line.len());
            let name = line[..end].trim();
            (!name.is_empty()).then(|| name.to_string())
        })
        .collect()
}

fn detect_project_type(records: &[FileRecord], languages: &IndexSet<String>) -> ProjectType {
    let names: HashSet<String> = records
        .iter()
        .map(|r| basename(&r.relative_path).to_lowercase())
        .collect();
    let has = |name: &str| names.contains(name);
    let has_ext = |ext: &str| names.iter().any(|n| n.ends_with(ext));

    if has("package.json") {
        if has_ext(".jsx") || has_ext(".tsx") {
            return ProjectType::React;
        }
        if has_ext(".vue") {
            return ProjectType::Vue;
        }
        if has("next.config.js") || has("next.config.ts") {
            return ProjectType::NextJs;
        }
        return ProjectType::Node;
    }

    if has("setup.py") || has("requirements.txt") {
        if has("manage.py") {
            return ProjectType::Django;
        }
        return ProjectType::Python;
    }

    if has("pom.xml") {
        return ProjectType::Maven;
    }
    if has("build.gradle") {
        return ProjectType::Gradle;
    }
    if has("go.mod") {
        return ProjectType::GoModule;
    }
    if has("cargo.toml") {
        return ProjectType::Rust;
    }
    if has("pubspec.yaml") {
        return ProjectType::Flutter;
    }

    match languages.first() {
        Some(lang) => ProjectType::Language(lang.clone()),
        None => ProjectType::Generic,
    }
}
