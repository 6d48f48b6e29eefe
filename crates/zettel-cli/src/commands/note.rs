//! Note command handlers

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{debug, warn};

use zettel_core::{DirectoryService, Entry, NoteFile, NoteId, META_EXT};

use super::parse_note_id;
use crate::output::Output;

/// List all notes, sorted by id
pub async fn list(directory: &DirectoryService, duplicates: bool, output: &Output) -> Result<()> {
    let mut entries = directory.get_entries().await?;
    if duplicates {
        entries.retain(|entry| entry.duplicates);
    }
    entries.sort_by_key(|entry| entry.id);

    output.print_entries(&entries)
}

/// Show a single note
pub async fn show(directory: &DirectoryService, id: String, output: &Output) -> Result<()> {
    let id = parse_note_id(&id)?;
    let entry = directory.get_entry(id).await?;
    if !entry.is_valid() {
        bail!("Note not found: {}", id);
    }

    output.print_entry(&entry)
}

/// Allocate a new note and create its empty content file
pub async fn create(directory: &DirectoryService, ext: String, output: &Output) -> Result<()> {
    validate_ext(&ext)?;

    let reserved = directory
        .new_entry()
        .await
        .context("Failed to allocate a note id")?;
    let path = directory
        .notes_dir()
        .join(format!("{}.{}", reserved.id, ext));

    if let Err(err) = create_empty(&path) {
        directory.delete_entry(reserved.id).await?;
        return Err(err).with_context(|| format!("Failed to create {:?}", path));
    }

    let file = NoteFile::from_path(&path)
        .with_context(|| format!("Not a note file name: {:?}", path))?;
    let entry = Entry::from_file(&file);
    directory.update_entry(entry.clone()).await?;

    output.success(&format!("Created note: {}", entry.id));
    output.print_entry(&entry)
}

/// Give a note a new id, renaming its files
pub async fn rename(
    directory: &DirectoryService,
    old: String,
    new: String,
    output: &Output,
) -> Result<()> {
    let old_id = parse_note_id(&old)?;
    let new_id = parse_note_id(&new)?;

    let entry = directory.get_entry(old_id).await?;
    if !entry.is_valid() {
        bail!("Note not found: {}", old_id);
    }

    let renamed = renamed_entry(&entry, new_id);
    directory
        .rename_entry(old_id, renamed.clone())
        .await
        .with_context(|| format!("Cannot rename {} to {}", old_id, new_id))?;

    if let Err(err) = move_files(&file_moves(&entry, &renamed)) {
        directory
            .rename_entry(new_id, entry)
            .await
            .context("Failed to restore the index after a failed rename")?;
        return Err(err);
    }

    if entry.duplicates {
        warn!(%old_id, "untracked duplicate content files keep the old id");
    }
    output.success(&format!("Renamed {} to {}", old_id, new_id));
    Ok(())
}

/// Delete a note and its files
pub async fn delete(directory: &DirectoryService, id: String, output: &Output) -> Result<()> {
    let id = parse_note_id(&id)?;
    let entry = directory.get_entry(id).await?;
    if !entry.is_valid() {
        bail!("Note not found: {}", id);
    }

    remove_files(&entry)?;
    directory.delete_entry(id).await?;

    if entry.duplicates {
        output.message("Note had duplicate content files; only the tracked ones were removed.");
    }
    output.success(&format!("Deleted note: {}", id));
    Ok(())
}

/// Content extensions must form a `<id>.<ext>` note file name
fn validate_ext(ext: &str) -> Result<()> {
    if ext.is_empty() {
        bail!("Extension must not be empty");
    }
    if ext == META_EXT {
        bail!("'{}' is reserved for metadata files", META_EXT);
    }
    if ext.contains(['.', '/', '\\']) {
        bail!("Invalid extension '{}'", ext);
    }
    Ok(())
}

/// The entry as it will look once its files carry `id`
///
/// A content path without a recorded extension takes the one in its file
/// name. A content file with no extension at all keeps its name.
fn renamed_entry(entry: &Entry, id: NoteId) -> Entry {
    let rename = |path: &PathBuf, ext: &str| path.with_file_name(format!("{}.{}", id, ext));

    let content_path = entry.content_path.as_ref().map(|path| {
        let ext = entry
            .content_ext
            .clone()
            .or_else(|| path.extension().and_then(|e| e.to_str()).map(String::from));
        match ext {
            Some(ext) => rename(path, &ext),
            None => path.clone(),
        }
    });

    Entry {
        id,
        meta_path: entry.meta_path.as_ref().map(|p| rename(p, META_EXT)),
        content_path,
        ..entry.clone()
    }
}

/// File renames taking `entry` to `renamed`, paired field by field
fn file_moves(entry: &Entry, renamed: &Entry) -> Vec<(PathBuf, PathBuf)> {
    let meta = entry.meta_path.clone().zip(renamed.meta_path.clone());
    let content = entry.content_path.clone().zip(renamed.content_path.clone());
    meta.into_iter()
        .chain(content)
        .filter(|(from, to)| from != to)
        .collect()
}

fn create_empty(path: &Path) -> io::Result<()> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map(|_| ())
}

/// Move every file, undoing the completed moves if one fails
fn move_files(moves: &[(PathBuf, PathBuf)]) -> Result<()> {
    for (done, (from, to)) in moves.iter().enumerate() {
        if let Err(err) = move_file(from, to) {
            for (from, to) in moves[..done].iter().rev() {
                if let Err(undo) = std::fs::rename(to, from) {
                    warn!("Could not move {:?} back to {:?}: {}", to, from, undo);
                }
            }
            return Err(err).with_context(|| format!("Failed to rename {:?} to {:?}", from, to));
        }
        debug!(from = %from.display(), to = %to.display(), "moved note file");
    }
    Ok(())
}

fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if to.exists() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "target file already exists",
        ));
    }
    std::fs::rename(from, to)
}

fn remove_files(entry: &Entry) -> Result<()> {
    for path in entry.paths() {
        match std::fs::remove_file(path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err).with_context(|| format!("Failed to remove {:?}", path)),
        }
    }
    Ok(())
}
