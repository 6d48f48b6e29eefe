//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use std::path::Path;

use anyhow::{Context, Result};

use zettel_core::{Change, Entry, MetaKind};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
#[derive(Debug, Clone, Copy)]
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print a single entry
    pub fn print_entry(&self, entry: &Entry) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                println!("ID:         {}", entry.id);
                println!("Metadata:   {}", meta_label(entry.meta_kind));
                if let Some(ref path) = entry.meta_path {
                    println!("Meta file:  {}", path.display());
                }
                println!("Content:    {}", display_path(entry.content_path.as_deref()));
                if entry.duplicates {
                    println!("Duplicates: yes (more than one content extension)");
                }
            }
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(entry).context("Failed to encode entry")?;
                println!("{}", json);
            }
            OutputFormat::Quiet => {
                println!("{}", entry.id);
            }
        }
        Ok(())
    }

    /// Print a list of entries
    pub fn print_entries(&self, entries: &[Entry]) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                if entries.is_empty() {
                    println!("No notes found.");
                    return Ok(());
                }
                for entry in entries {
                    println!("{}", entry_line(entry));
                }
                println!("\n{} note(s)", entries.len());
            }
            OutputFormat::Json => {
                let json =
                    serde_json::to_string_pretty(entries).context("Failed to encode entries")?;
                println!("{}", json);
            }
            OutputFormat::Quiet => {
                for entry in entries {
                    println!("{}", entry.id);
                }
            }
        }
        Ok(())
    }

    /// Print one index change
    pub fn print_change(&self, change: Change) {
        match self.format {
            OutputFormat::Human => match change {
                Change::Reload => println!("reload"),
                Change::Entry(id) => println!("changed {}", id),
            },
            OutputFormat::Json => {
                let id = match change {
                    Change::Reload => None,
                    Change::Entry(id) => Some(id),
                };
                println!(
                    "{}",
                    serde_json::json!({
                        "full_refresh": change.is_full_refresh(),
                        "id": id
                    })
                );
            }
            OutputFormat::Quiet => {
                if let Change::Entry(id) = change {
                    println!("{}", id);
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

/// Short name of a metadata location
fn meta_label(kind: MetaKind) -> &'static str {
    match kind {
        MetaKind::Unknown => "unknown",
        MetaKind::None => "none",
        MetaKind::File => "file",
        MetaKind::Header => "header",
    }
}

/// One line of the human-readable listing
fn entry_line(entry: &Entry) -> String {
    let ext = entry.content_ext.as_deref().unwrap_or("-");
    let duplicates = if entry.duplicates { " [dup]" } else { "" };
    format!(
        "{} | {:<7} | {}{}",
        entry.id,
        meta_label(entry.meta_kind),
        ext,
        duplicates
    )
}

fn display_path(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| "(none)".to_string())
}
