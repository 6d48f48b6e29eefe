//! Command handlers

pub mod config;
pub mod note;
pub mod status;
pub mod watch;

use anyhow::{Context, Result};

use zettel_core::{Config, DirectoryService, NoteId};

/// Start the directory service and wait for the initial scan
pub async fn open_directory(config: &Config) -> Result<DirectoryService> {
    config.ensure_notes_dir()?;

    let mut directory = DirectoryService::new(config);
    directory
        .start()
        .await
        .with_context(|| format!("Failed to open notes directory {:?}", config.notes_dir))?;
    Ok(directory)
}

/// Parse a note id given on the command line
pub fn parse_note_id(s: &str) -> Result<NoteId> {
    NoteId::parse(s.trim()).with_context(|| format!("'{}' is not a note id", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_note_id() {
        assert_eq!(
            parse_note_id(" 20240101120000 ").unwrap().to_string(),
            "20240101120000"
        );
        assert!(parse_note_id("2024").is_err());
        assert!(parse_note_id("00000000000000").is_err());
    }
}
