use anyhow::{Context, Result};
use byte_unit::{Byte, UnitType};
use chrono::Local;
use colored::*;
use comfy_table::{Cell, CellAlignment, Color, ContentArrangement, Table, presets::UTF8_FULL};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use projdoc_core::{AppError, Batch, LoadReport, ProgressEvent, ProjectAnalysis, output_formats};

use crate::cli_args::FormatOutputOpts;

/// Serializes `data` as JSON/YAML, or prints `plain_text` for the text format.
pub fn print_data_or_text<T: Serialize>(
    data: &T,
    plain_text: impl FnOnce() -> Result<()>,
    format_opts: &FormatOutputOpts,
) -> Result<()> {
    let format = format_opts
        .format
        .as_deref()
        .unwrap_or("text")
        .to_lowercase();

    match format.as_str() {
        "text" => plain_text(),
        "yaml" | "yml" => {
            let content = output_formats::serialize_to_yaml(data)?;
            write_to_stdout(&content)
        }
        _ => {
            let content = output_formats::serialize_to_json(data, format_opts.pretty)?;
            write_to_stdout(&content)
        }
    }
}

/// Writes `content` to `path`, copying an existing file aside first when
/// `backup` is set. Returns the backup path if one was made.
pub fn save_document(path: &Path, content: &str, backup: bool) -> Result<Option<PathBuf>> {
    let backup_path = if backup && path.is_file() {
        let target = backup_path_for(path, &Local::now().format("%Y%m%d%H%M%S").to_string());
        fs::copy(path, &target).map_err(|source| AppError::FileWrite {
            path: target.clone(),
            source,
        })?;
        log::info!("Existing output backed up to {}", target.display());
        Some(target)
    } else {
        None
    };
    write_to_file(path, content)?;
    Ok(backup_path)
}

/// `README.md` + `20260101120000` -> `README.md.20260101120000.bak`
pub fn backup_path_for(path: &Path, timestamp: &str) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    path.with_file_name(format!("{}.{}.bak", file_name, timestamp))
}

pub fn write_to_file(path: &Path, content: &str) -> Result<()> {
    let write_error = |source: std::io::Error| AppError::FileWrite {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(write_error)?;
        }
    }
    let mut file = File::create(path).map_err(write_error)?;
    file.write_all(content.as_bytes()).map_err(write_error)?;
    Ok(())
}

pub fn write_to_stdout(content: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(content.as_bytes())
        .context("Failed to write to stdout")?;
    if !content.ends_with('\n') {
        handle
            .write_all(b"\n")
            .context("Failed to write newline to stdout")?;
    }
    handle.flush().context("Failed to flush stdout")?;
    Ok(())
}

/// Drains progress events on a background thread and renders them to stderr.
/// The thread exits once every sender has been dropped.
pub fn spawn_progress_printer(quiet: bool) -> (Sender<ProgressEvent>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel::<ProgressEvent>();
    let handle = thread::spawn(move || {
        for event in rx {
            if quiet {
                continue;
            }
            let counts = match (event.processed_files, event.total_files) {
                (Some(done), Some(total)) => format!(" ({}/{})", done, total),
                _ => String::new(),
            };
            eprintln!(
                "{} {:>3}% {}{}",
                format!("[{}]", event.stage).blue(),
                event.percentage,
                event.message,
                counts.dimmed()
            );
        }
    });
    (tx, handle)
}

fn human_size(bytes: u64) -> String {
    Byte::from_u128(bytes as u128)
        .unwrap_or_default()
        .get_appropriate_unit(UnitType::Binary)
        .to_string()
}

fn join_or_none<'a>(items: impl Iterator<Item = &'a String>) -> String {
    let joined = items.map(String::as_str).collect::<Vec<_>>().join(", ");
    if joined.is_empty() {
        "(none)".to_string()
    } else {
        joined
    }
}

pub fn print_analysis_pretty(
    project_name: &str,
    analysis: &ProjectAnalysis,
    load: &LoadReport,
) -> Result<()> {
    println!();
    println!(
        "{}",
        format!(" {} ", project_name).green().bold().underline()
    );
    println!(
        "{:<16} {}",
        "Type:".green(),
        analysis.project_type.to_string().cyan()
    );
    println!(
        "{:<16} {}",
        "Files:".green(),
        analysis.total_files.to_string().cyan()
    );
    println!(
        "{:<16} {}",
        "Total Size:".green(),
        human_size(analysis.total_size_bytes).cyan()
    );
    println!(
        "{:<16} {}",
        "Languages:".green(),
        join_or_none(analysis.languages.iter()).cyan()
    );
    println!(
        "{:<16} {}",
        "Entry Files:".green(),
        join_or_none(analysis.entry_files.iter()).cyan()
    );
    println!(
        "{:<16} {}",
        "Dependencies:".green(),
        join_or_none(analysis.dependencies.iter()).cyan()
    );
    println!(
        "{:<16} {}",
        "Directories:".green(),
        analysis.directories.len().to_string().cyan()
    );

    for (manifest, error) in &analysis.manifest_errors {
        println!(
            "{} could not parse {}: {}",
            "Warning:".yellow(),
            manifest,
            error.dimmed()
        );
    }

    if !load.skipped.is_empty() {
        println!("\n{}", " Skipped Files ".yellow().bold().underline());
        for (path, reason) in &load.skipped {
            println!("  {} {}", path.cyan(), format!("({})", reason).dimmed());
        }
    }
    println!();
    Ok(())
}

pub fn print_batches_pretty(batches: &[Batch]) -> Result<()> {
    if batches.is_empty() {
        println!("\n{}", "(No files to batch)".yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("#").fg(Color::Green),
        Cell::new("Label").fg(Color::Green),
        Cell::new("Files").fg(Color::Green),
        Cell::new("Tokens").fg(Color::Green),
    ]);
    for batch in batches {
        let files = batch
            .files
            .iter()
            .map(|f| {
                if f.is_entry_file {
                    format!("{} *", f.relative_path)
                } else {
                    f.relative_path.clone()
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        table.add_row(vec![
            Cell::new(batch.index + 1).set_alignment(CellAlignment::Right),
            Cell::new(&batch.label).fg(Color::Cyan),
            Cell::new(files),
            Cell::new(batch.estimated_tokens).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("{table}");

    let total_tokens: usize = batches.iter().map(|b| b.estimated_tokens).sum();
    println!(
        "{} batches, ~{} tokens total ({} marks entry files)",
        batches.len().to_string().cyan(),
        total_tokens.to_string().cyan(),
        "*".bold()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn backup_name_keeps_original_file_name() {
        let path = Path::new("/tmp/project/README.md");
        assert_eq!(
            backup_path_for(path, "20260101120000"),
            PathBuf::from("/tmp/project/README.md.20260101120000.bak")
        );
    }

    #[test]
    fn save_document_backs_up_existing_file() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("README.md");
        fs::write(&target, "old").unwrap();

        let backup = save_document(&target, "new", true).unwrap();

        let backup = backup.expect("a backup should have been made");
        assert_eq!(fs::read_to_string(&backup).unwrap(), "old");
        assert_eq!(fs::read_to_string(&target).unwrap(), "new");
    }

    #[test]
    fn unwritable_target_is_a_file_write_error() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, "x").unwrap();
        let target = blocker.join("README.md");

        let err = write_to_file(&target, "doc").unwrap_err();
        match err.downcast_ref::<AppError>() {
            Some(AppError::FileWrite { path, .. }) => assert_eq!(path, &target),
            other => panic!("expected FileWrite, got {:?}", other),
        }
    }

    #[test]
    fn save_document_without_backup_overwrites() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("docs").join("OUT.md");

        assert_eq!(save_document(&target, "first", true).unwrap(), None);
        assert_eq!(save_document(&target, "second", false).unwrap(), None);
        assert_eq!(fs::read_to_string(&target).unwrap(), "second");
        assert_eq!(fs::read_dir(dir.path().join("docs")).unwrap().count(), 1);
    }
}
