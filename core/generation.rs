//! Turning batches into one generated document.
//!
//! The remote service is reached through [`GenerationClient`]. Each batch is
//! sent once, in order, with a fixed pause between calls. A failed call never
//! stops the run: its section is replaced by deterministic fallback text.

use crate::analyzer::ProjectAnalysis;
use crate::chunking::Batch;
use crate::config::Config;
use crate::error::{AppError, GenerationError, Result};
use crate::progress::{self, CancellationToken, ProgressEvent, Stage};
use log;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

pub const GENERATION_PROGRESS_START: u8 = 85;
pub const GENERATION_PROGRESS_END: u8 = 100;
pub const TRUNCATION_MARKER: &str = "\n... [truncated]";

const SYSTEM_PROMPT: &str = "You are a senior technical writer. You write clear, accurate \
Markdown documentation for software projects based only on the source files you are shown. \
Do not invent features that the files do not support.";

#[derive(Debug, Clone, PartialEq)]
pub struct BatchFile {
    pub path: String,
    pub language: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchRequest {
    pub project_name: String,
    pub project_type: String,
    pub languages: Vec<String>,
    pub dependencies: Vec<String>,
    pub batch_index: usize,
    pub total_batches: usize,
    pub is_first_batch: bool,
    pub label: String,
    pub files: Vec<BatchFile>,
}

impl BatchRequest {
    pub fn from_batch(
        project_name: &str,
        analysis: &ProjectAnalysis,
        batch: &Batch,
        total_batches: usize,
        preview_chars: usize,
    ) -> Self {
        Self {
            project_name: project_name.to_string(),
            project_type: analysis.project_type.to_string(),
            languages: analysis.languages.iter().cloned().collect(),
            dependencies: analysis.dependencies.iter().cloned().collect(),
            batch_index: batch.index,
            total_batches,
            is_first_batch: batch.index == 0,
            label: batch.label.clone(),
            files: batch
                .files
                .iter()
                .map(|f| BatchFile {
                    path: f.relative_path.clone(),
                    language: f.language.to_string(),
                    content: truncate_content(&f.content, preview_chars),
                })
                .collect(),
        }
    }

    pub fn user_prompt(&self) -> String {
        let mut prompt = String::new();
        if self.is_first_batch {
            prompt.push_str(&format!(
                "Write a complete README.md for the project \"{}\".\n\
                 Include: a title, a short description, key features, installation, usage, \
                 project structure, dependencies and license sections where the files support them.\n\n",
                self.project_name
            ));
        } else {
            prompt.push_str(&format!(
                "Continue the documentation for \"{}\" (part {} of {}). Write additional \
                 sections covering the files below. Do not repeat the title or introduction.\n\n",
                self.project_name,
                self.batch_index + 1,
                self.total_batches
            ));
        }
        prompt.push_str(&format!("Project type: {}\n", self.project_type));
        if !self.languages.is_empty() {
            prompt.push_str(&format!("Languages: {}\n", self.languages.join(", ")));
        }
        if !self.dependencies.is_empty() {
            prompt.push_str(&format!("Dependencies: {}\n", self.dependencies.join(", ")));
        }
        prompt.push_str(&format!("\nFiles ({}):\n", self.label));
        for file in &self.files {
            prompt.push_str(&format!(
                "\n### {} ({})\n```\n{}\n```\n",
                file.path, file.language, file.content
            ));
        }
        prompt
    }
}

/// Keeps the first `max_chars` characters and appends a marker when cut.
pub fn truncate_content(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", &content[..byte_idx], TRUNCATION_MARKER),
        None => content.to_string(),
    }
}

pub trait GenerationClient {
    fn generate(&self, request: &BatchRequest) -> Result<String, GenerationError>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Client for an OpenAI-compatible chat-completions endpoint.
pub struct HttpGenerationClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    max_tokens: u32,
}

impl HttpGenerationClient {
    /// Fails with [`AppError::MissingCredential`] before any network or file
    /// activity when no key is configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.resolve_api_key()?;
        let timeout = config.request_timeout()?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: config.generation.endpoint.clone(),
            model: config.generation.model.clone(),
            api_key,
            max_tokens: config.generation.max_response_tokens,
        })
    }
}

impl GenerationClient for HttpGenerationClient {
    fn generate(&self, request: &BatchRequest) -> Result<String, GenerationError> {
        let user_prompt = request.user_prompt();
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user_prompt,
                },
            ],
            max_tokens: self.max_tokens,
            stream: false,
        };

        log::debug!(
            "Sending batch {} ({} files, {} prompt chars) to {}",
            request.batch_index,
            request.files.len(),
            user_prompt.len(),
            self.endpoint
        );
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().unwrap_or_default();
            return Err(GenerationError::from_status(status, &text));
        }

        let parsed: ChatResponse = response.json()?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| GenerationError::Transport("response contained no content".to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub request_delay: Duration,
    pub content_preview_chars: usize,
}

impl GenerationSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            request_delay: config.request_delay()?,
            content_preview_chars: config.generation.content_preview_chars,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub index: usize,
    pub label: String,
    pub error: Option<GenerationError>,
}

impl BatchOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedDocument {
    pub content: String,
    pub outcomes: Vec<BatchOutcome>,
}

impl GeneratedDocument {
    pub fn failed_batches(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.succeeded()).count()
    }
}

pub fn fallback_text(project_name: &str, analysis: &ProjectAnalysis, batch: &Batch) -> String {
    if batch.index == 0 {
        let mut text = format!(
            "# {}\n\n{}.\n\n## Files\n\n",
            project_name, analysis.project_type
        );
        for file in &batch.files {
            text.push_str(&format!("- `{}`\n", file.relative_path));
        }
        text
    } else {
        format!(
            "## {}\n\n_Documentation for this part could not be generated._\n",
            batch.label
        )
    }
}

pub fn generate_document(
    client: &dyn GenerationClient,
    project_name: &str,
    analysis: &ProjectAnalysis,
    batches: &[Batch],
    settings: &GenerationSettings,
    progress: Option<&Sender<ProgressEvent>>,
    cancel: Option<&CancellationToken>,
) -> Result<GeneratedDocument> {
    let total = batches.len();
    let mut sections = Vec::with_capacity(total);
    let mut outcomes = Vec::with_capacity(total);

    for (i, batch) in batches.iter().enumerate() {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            log::info!("Generation cancelled before batch {} of {}.", i + 1, total);
            return Err(AppError::Cancelled);
        }
        if i > 0 && !settings.request_delay.is_zero() {
            thread::sleep(settings.request_delay);
        }

        progress::report(
            progress,
            ProgressEvent::new(
                Stage::Generating,
                progress::scale(i, total, GENERATION_PROGRESS_START, GENERATION_PROGRESS_END),
                format!("Generating part {}/{}: {}", i + 1, total, batch.label),
            )
            .with_files(None, i, total),
        );

        let request = BatchRequest::from_batch(
            project_name,
            analysis,
            batch,
            total,
            settings.content_preview_chars,
        );
        match client.generate(&request) {
            Ok(text) => {
                log::info!("Batch {}/{} generated.", i + 1, total);
                sections.push(text.trim().to_string());
                outcomes.push(BatchOutcome {
                    index: batch.index,
                    label: batch.label.clone(),
                    error: None,
                });
            }
            Err(e) => {
                log::warn!(
                    "Batch {}/{} failed ({}); using fallback content.",
                    i + 1,
                    total,
                    e
                );
                sections.push(fallback_text(project_name, analysis, batch).trim().to_string());
                outcomes.push(BatchOutcome {
                    index: batch.index,
                    label: batch.label.clone(),
                    error: Some(e),
                });
            }
        }
    }

    progress::report(
        progress,
        ProgressEvent::new(
            Stage::Generating,
            GENERATION_PROGRESS_END,
            format!("Generated {} parts", total),
        )
        .with_files(None, total, total),
    );

    let mut content = sections.join("\n\n");
    content.push('\n');
    Ok(GeneratedDocument { content, outcomes })
}
