use crate::error::{AppError, Result};
use byte_unit::Byte;
use log;
use parse_duration::parse;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_CONFIG_DIR: &str = ".projdoc";
pub const DEFAULT_CONFIG_FILENAME: &str = "projdoc.toml";
pub const DEFAULT_IGNORE_FILE: &str = ".gitignore";
pub const DEFAULT_MAX_FILE_SIZE: &str = "1 MiB";
pub const DEFAULT_MAX_TOKENS_PER_CHUNK: usize = 5000;
pub const DEFAULT_API_KEY_ENV: &str = "PROJDOC_API_KEY";
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_REQUEST_DELAY: &str = "1s";
pub const DEFAULT_REQUEST_TIMEOUT: &str = "120s";
pub const DEFAULT_CONTENT_PREVIEW_CHARS: usize = 5000;
pub const DEFAULT_OUTPUT_FILE: &str = "README.md";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GeneralConfig {
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default = "default_true")]
    pub use_ignore_file: bool,
    #[serde(default = "default_ignore_file")]
    pub ignore_file: String,
    #[serde(default = "default_true")]
    pub enable_builtin_ignore: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScanConfig {
    /// Human-readable size, e.g. "1 MiB" or "512kb".
    #[serde(default = "default_max_file_size")]
    pub max_file_size: String,
    #[serde(default)]
    pub additional_exclude_patterns: Vec<String>,
    #[serde(default = "default_false")]
    pub follow_links: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TokenEstimatorKind {
    #[default]
    Chars,
    Cl100k,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens_per_chunk")]
    pub max_tokens_per_chunk: usize,
    #[serde(default)]
    pub token_estimator: TokenEstimatorKind,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GenerationConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_request_delay")]
    pub request_delay: String,
    #[serde(default = "default_request_timeout")]
    pub timeout: String,
    #[serde(default = "default_content_preview_chars")]
    pub content_preview_chars: usize,
    #[serde(default = "default_max_response_tokens")]
    pub max_response_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_output_file")]
    pub file_name: PathBuf,
    #[serde(default = "default_true")]
    pub backup_existing: bool,
}

fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_ignore_file() -> String {
    DEFAULT_IGNORE_FILE.to_string()
}
fn default_max_file_size() -> String {
    DEFAULT_MAX_FILE_SIZE.to_string()
}
fn default_max_tokens_per_chunk() -> usize {
    DEFAULT_MAX_TOKENS_PER_CHUNK
}
fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}
fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}
fn default_request_delay() -> String {
    DEFAULT_REQUEST_DELAY.to_string()
}
fn default_request_timeout() -> String {
    DEFAULT_REQUEST_TIMEOUT.to_string()
}
fn default_content_preview_chars() -> usize {
    DEFAULT_CONTENT_PREVIEW_CHARS
}
fn default_max_response_tokens() -> u32 {
    4096
}
fn default_output_file() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_FILE)
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            project_name: None,
            use_ignore_file: default_true(),
            ignore_file: default_ignore_file(),
            enable_builtin_ignore: default_true(),
        }
    }
}
impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            additional_exclude_patterns: Vec::new(),
            follow_links: default_false(),
        }
    }
}
impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_chunk: default_max_tokens_per_chunk(),
            token_estimator: TokenEstimatorKind::default(),
        }
    }
}
impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            api_key: None,
            request_delay: default_request_delay(),
            timeout: default_request_timeout(),
            content_preview_chars: default_content_preview_chars(),
            max_response_tokens: default_max_response_tokens(),
        }
    }
}
impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file_name: default_output_file(),
            backup_existing: default_true(),
        }
    }
}

impl Config {
    pub fn determine_project_root(cli_project_root: Option<&PathBuf>) -> Result<PathBuf> {
        let path_str_opt = cli_project_root
            .map(|p| p.to_string_lossy().to_string())
            .or_else(|| env::var("PROJECT_ROOT").ok().filter(|s| !s.is_empty()));

        let path_to_resolve = match path_str_opt {
            Some(p_str) => PathBuf::from(shellexpand::tilde(&p_str).as_ref()),
            None => env::current_dir().map_err(AppError::Io)?,
        };

        let canonical = path_to_resolve.canonicalize().map_err(|e| {
            log::debug!(
                "Failed to canonicalize project root '{}': {}",
                path_to_resolve.display(),
                e
            );
            AppError::WorkspaceNotFound(path_to_resolve.clone())
        })?;
        if !canonical.is_dir() {
            return Err(AppError::WorkspaceNotFound(canonical));
        }
        Ok(canonical)
    }

    pub fn resolve_config_path(
        project_root: &Path,
        cli_config_file: Option<&String>,
        cli_disable_config: bool,
    ) -> Result<Option<PathBuf>> {
        if cli_disable_config {
            log::debug!("Config file loading disabled via CLI flag.");
            return Ok(None);
        }

        match cli_config_file {
            Some(p_str) => {
                let mut path = PathBuf::from(shellexpand::tilde(p_str).as_ref());
                if path.is_relative() && !path.exists() {
                    path = project_root.join(DEFAULT_CONFIG_DIR).join(&path);
                }
                if !path.exists() && path.extension().is_none() {
                    path.set_extension("toml");
                }
                if !path.exists() {
                    return Err(AppError::Config(format!(
                        "Specified config file not found: {}",
                        path.display()
                    )));
                }
                log::debug!("Using specified config file path: {}", path.display());
                Ok(Some(path))
            }
            None => {
                let default_path = Self::default_config_path(project_root);
                if default_path.exists() {
                    log::debug!("Using default config file path: {}", default_path.display());
                    Ok(Some(default_path))
                } else {
                    log::debug!(
                        "No config file specified and default not found at: {}",
                        default_path.display()
                    );
                    Ok(None)
                }
            }
        }
    }

    pub fn default_config_path(project_root: &Path) -> PathBuf {
        project_root
            .join(DEFAULT_CONFIG_DIR)
            .join(DEFAULT_CONFIG_FILENAME)
    }

    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        log::info!("Loading configuration from: {}", config_path.display());
        let toml_content = fs::read_to_string(config_path).map_err(|e| AppError::FileRead {
            path: config_path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&toml_content).map_err(|e| {
            AppError::TomlParse(format!(
                "Error parsing config file '{}': {}. Check TOML syntax and structure.",
                config_path.display(),
                e
            ))
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| AppError::TomlParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks values that serde cannot, so bad settings fail at load time
    /// instead of mid-pipeline.
    pub fn validate(&self) -> Result<()> {
        self.max_file_size_bytes()?;
        self.request_delay()?;
        self.request_timeout()?;
        if self.chunking.max_tokens_per_chunk == 0 {
            return Err(AppError::Config(
                "[chunking].max_tokens_per_chunk must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn max_file_size_bytes(&self) -> Result<u64> {
        parse_size(&self.scan.max_file_size)
    }

    pub fn request_delay(&self) -> Result<Duration> {
        parse(&self.generation.request_delay).map_err(|e| {
            AppError::DurationParse(format!(
                "Invalid request delay '{}': {}. Use format like '500ms', '1s'.",
                self.generation.request_delay, e
            ))
        })
    }

    pub fn request_timeout(&self) -> Result<Duration> {
        parse(&self.generation.timeout).map_err(|e| {
            AppError::DurationParse(format!(
                "Invalid request timeout '{}': {}. Use format like '30s', '2m'.",
                self.generation.timeout, e
            ))
        })
    }

    /// Resolves the generation-service credential: inline value first, then
    /// the configured environment variable.
    pub fn resolve_api_key(&self) -> Result<String> {
        if let Some(key) = self
            .generation
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
        {
            log::debug!("Using API key from configuration file.");
            return Ok(key.to_string());
        }
        match env::var(&self.generation.api_key_env) {
            Ok(key) if !key.trim().is_empty() => {
                log::debug!(
                    "Using API key from environment variable {}.",
                    self.generation.api_key_env
                );
                Ok(key.trim().to_string())
            }
            _ => Err(AppError::MissingCredential {
                env_var: self.generation.api_key_env.clone(),
            }),
        }
    }

    pub fn get_effective_project_name(&self, project_root: &Path) -> String {
        self.general.project_name.clone().unwrap_or_else(|| {
            project_root
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "UnknownProject".to_string())
        })
    }
}

pub fn parse_size(size_str: &str) -> Result<u64> {
    let byte_value = Byte::from_str(size_str.trim()).map_err(|e| {
        AppError::Config(format!(
            "Invalid size format '{}': {}. Use KB, MiB, etc.",
            size_str, e
        ))
    })?;
    Ok(byte_value.as_u64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.max_file_size_bytes().unwrap(), 1_048_576);
        assert_eq!(config.chunking.max_tokens_per_chunk, 5000);
        assert_eq!(config.request_delay().unwrap(), Duration::from_secs(1));
        assert_eq!(config.generation.content_preview_chars, 5000);
        assert!(config.scan.additional_exclude_patterns.is_empty());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [scan]
            max_file_size = "2 MiB"
            additional_exclude_patterns = ["*.snap", "fixtures/"]

            [chunking]
            max_tokens_per_chunk = 1200
            token_estimator = "cl100k"
            "#,
        )
        .unwrap();
        assert_eq!(config.max_file_size_bytes().unwrap(), 2 * 1_048_576);
        assert_eq!(
            config.scan.additional_exclude_patterns,
            vec!["*.snap".to_string(), "fixtures/".to_string()]
        );
        assert_eq!(config.chunking.max_tokens_per_chunk, 1200);
        assert_eq!(config.chunking.token_estimator, TokenEstimatorKind::Cl100k);
        assert_eq!(config.general, GeneralConfig::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Config::from_toml_str("[scan]\nmax_size = 3\n").unwrap_err();
        assert!(matches!(err, AppError::TomlParse(_)));
    }

    #[test]
    fn invalid_values_fail_validation() {
        assert!(Config::from_toml_str("[scan]\nmax_file_size = \"lots\"\n").is_err());
        assert!(Config::from_toml_str("[chunking]\nmax_tokens_per_chunk = 0\n").is_err());
        assert!(Config::from_toml_str("[generation]\nrequest_delay = \"soon\"\n").is_err());
    }

    #[test]
    fn bad_durations_are_duration_errors() {
        let err = Config::from_toml_str("[generation]\nrequest_delay = \"soon\"\n").unwrap_err();
        assert!(matches!(err, AppError::DurationParse(ref msg) if msg.contains("request delay")));
        let err = Config::from_toml_str("[generation]\ntimeout = \"later\"\n").unwrap_err();
        assert!(matches!(err, AppError::DurationParse(ref msg) if msg.contains("request timeout")));
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = Config::default();
        let text = config.to_toml_string().unwrap();
        assert_eq!(Config::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn inline_api_key_wins() {
        let mut config = Config::default();
        config.generation.api_key = Some("  sk-inline ".to_string());
        assert_eq!(config.resolve_api_key().unwrap(), "sk-inline");
    }

    #[test]
    fn missing_api_key_is_a_credential_error() {
        let mut config = Config::default();
        config.generation.api_key_env = "PROJDOC_TEST_KEY_THAT_IS_NEVER_SET".to_string();
        let err = config.resolve_api_key().unwrap_err();
        assert!(matches!(
            err,
            AppError::MissingCredential { ref env_var } if env_var == "PROJDOC_TEST_KEY_THAT_IS_NEVER_SET"
        ));
    }

    #[test]
    fn missing_project_root_is_workspace_error() {
        let missing = PathBuf::from("/definitely/not/a/real/projdoc/root");
        let err = Config::determine_project_root(Some(&missing)).unwrap_err();
        assert!(matches!(err, AppError::WorkspaceNotFound(_)));
    }
}
