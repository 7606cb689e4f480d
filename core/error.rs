use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AppError {
    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("TOML Parsing Error: {0}")]
    TomlParse(String),

    #[error("TOML Serialization Error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON Serialization Error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    #[error("YAML Parsing/Serialization Error: {0}")]
    YamlError(#[from] serde_yml::Error),

    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File Read Error: Path '{path}', Error: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File Write Error: Path '{path}', Error: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Workspace Not Found: '{0}' does not exist or is not a directory")]
    WorkspaceNotFound(PathBuf),

    #[error("Missing Credential: no API key configured (set the {env_var} environment variable or [generation].api_key)")]
    MissingCredential { env_var: String },

    #[error("Invalid Argument: {0}")]
    InvalidArgument(String),

    #[error("TikToken Error: {0}")]
    TikToken(String),

    #[error("Duration Parsing Error: {0}")]
    DurationParse(String),

    #[error("Generation Error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Operation cancelled")]
    Cancelled,
}

/// Failure of a single call to the text-generation service, classified by
/// response status.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("invalid credentials (check the configured API key)")]
    InvalidCredentials,

    #[error("rate limited by the generation service")]
    RateLimited,

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("transport or unknown error: {0}")]
    Transport(String),
}

impl GenerationError {
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 | 403 => GenerationError::InvalidCredentials,
            429 => GenerationError::RateLimited,
            400 | 422 => GenerationError::MalformedRequest(body.trim().to_string()),
            _ => GenerationError::Transport(format!("HTTP {}: {}", status, body.trim())),
        }
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => GenerationError::from_status(status.as_u16(), &err.to_string()),
            None => GenerationError::Transport(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_are_classified() {
        assert_eq!(
            GenerationError::from_status(401, ""),
            GenerationError::InvalidCredentials
        );
        assert_eq!(
            GenerationError::from_status(403, "forbidden"),
            GenerationError::InvalidCredentials
        );
        assert_eq!(
            GenerationError::from_status(429, ""),
            GenerationError::RateLimited
        );
        assert_eq!(
            GenerationError::from_status(400, " bad field \n"),
            GenerationError::MalformedRequest("bad field".to_string())
        );
        assert!(matches!(
            GenerationError::from_status(503, "down"),
            GenerationError::Transport(_)
        ));
    }
}
