//! Directory entries
//!
//! An [`Entry`] records where the files of one note live. Entries are built
//! up file by file: every note file observed for an identifier refines the
//! entry according to its extension.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::id::NoteId;

/// Extension of a companion metadata file
pub const META_EXT: &str = "meta";

/// Extension of a file carrying metadata header and content together
pub const ZETTEL_EXT: &str = "zettel";

/// Where the metadata of a note is stored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetaKind {
    /// Not yet classified
    #[default]
    Unknown,
    /// No metadata
    None,
    /// Metadata lives in a `.meta` companion file
    File,
    /// Metadata is the header of the content file
    Header,
}

/// Everything the directory knows about one note
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: NoteId,
    pub meta_kind: MetaKind,
    /// Set only when `meta_kind` is [`MetaKind::File`]
    pub meta_path: Option<PathBuf>,
    pub content_path: Option<PathBuf>,
    pub content_ext: Option<String>,
    /// More than one content extension was seen for this id
    pub duplicates: bool,
}

impl Entry {
    /// Entry reserved for an id before any file exists
    pub fn placeholder(id: NoteId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Sentinel returned for ids the directory does not know
    pub fn missing() -> Self {
        Self::placeholder(NoteId::INVALID)
    }

    /// Entry describing a single observed file
    pub fn from_file(file: &NoteFile) -> Self {
        let mut entry = Self::placeholder(file.id);
        entry.apply(file);
        entry
    }

    pub fn is_valid(&self) -> bool {
        self.id.is_valid()
    }

    /// Fold an observed file into this entry.
    ///
    /// The first content extension wins; a different one only raises the
    /// duplicates flag.
    pub fn apply(&mut self, file: &NoteFile) {
        if file.ext == META_EXT {
            self.meta_kind = MetaKind::File;
            self.meta_path = Some(file.path.clone());
            return;
        }
        if let Some(ext) = &self.content_ext {
            if *ext != file.ext {
                self.duplicates = true;
                return;
            }
        }
        if self.meta_kind != MetaKind::File {
            self.meta_kind = if file.ext == ZETTEL_EXT {
                MetaKind::Header
            } else {
                MetaKind::None
            };
        }
        self.content_path = Some(file.path.clone());
        self.content_ext = Some(file.ext.clone());
    }

    /// All files currently recorded for this entry
    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.meta_path.iter().chain(self.content_path.iter())
    }
}

/// A file whose name follows the `<14-digit-id>.<ext>` convention
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteFile {
    pub id: NoteId,
    pub path: PathBuf,
    pub ext: String,
}

impl NoteFile {
    /// Classify a path; `None` for files that are not note files
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let (stem, ext) = name.split_once('.')?;
        if ext.is_empty() || ext.contains('.') {
            return None;
        }
        let id = NoteId::parse(stem).ok()?;
        Some(Self {
            id,
            path: path.to_path_buf(),
            ext: ext.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> NoteFile {
        NoteFile::from_path(&Path::new("/notes").join(name)).unwrap()
    }

    #[test]
    fn test_note_file_parsing() {
        let f = file("20240101120000.md");
        assert_eq!(f.id.to_string(), "20240101120000");
        assert_eq!(f.ext, "md");
        assert_eq!(f.path, PathBuf::from("/notes/20240101120000.md"));
    }

    #[test]
    fn test_non_note_files_ignored() {
        for name in [
            "README.md",
            "20240101120000",
            "20240101120000.",
            "2024010112000.md",
            "00000000000000.md",
            "20240101120000.tar.gz",
            ".20240101120000.md",
        ] {
            assert!(
                NoteFile::from_path(Path::new(name)).is_none(),
                "{} should be ignored",
                name
            );
        }
    }

    #[test]
    fn test_meta_then_content() {
        let mut entry = Entry::from_file(&file("20240101120000.meta"));
        assert_eq!(entry.meta_kind, MetaKind::File);
        assert_eq!(
            entry.meta_path,
            Some(PathBuf::from("/notes/20240101120000.meta"))
        );

        entry.apply(&file("20240101120000.md"));
        assert_eq!(entry.meta_kind, MetaKind::File);
        assert_eq!(entry.content_ext.as_deref(), Some("md"));
        assert!(!entry.duplicates);
    }

    #[test]
    fn test_zettel_extension_means_header() {
        let entry = Entry::from_file(&file("20240101120000.zettel"));
        assert_eq!(entry.meta_kind, MetaKind::Header);
        assert!(entry.meta_path.is_none());
    }

    #[test]
    fn test_plain_content_has_no_meta() {
        let entry = Entry::from_file(&file("20240101120000.txt"));
        assert_eq!(entry.meta_kind, MetaKind::None);
    }

    #[test]
    fn test_content_then_meta_switches_to_file() {
        let mut entry = Entry::from_file(&file("20240101120000.zettel"));
        entry.apply(&file("20240101120000.meta"));
        assert_eq!(entry.meta_kind, MetaKind::File);
        assert_eq!(entry.content_ext.as_deref(), Some("zettel"));
    }

    #[test]
    fn test_first_extension_wins() {
        let mut entry = Entry::from_file(&file("20240101120000.md"));
        entry.apply(&file("20240101120000.txt"));

        assert!(entry.duplicates);
        assert_eq!(entry.content_ext.as_deref(), Some("md"));
        assert_eq!(
            entry.content_path,
            Some(PathBuf::from("/notes/20240101120000.md"))
        );
    }

    #[test]
    fn test_same_extension_is_not_duplicate() {
        let mut entry = Entry::from_file(&file("20240101120000.md"));
        entry.apply(&file("20240101120000.md"));
        assert!(!entry.duplicates);
    }

    #[test]
    fn test_placeholder_and_missing() {
        let id = NoteId::parse("20240101120000").unwrap();
        let placeholder = Entry::placeholder(id);
        assert!(placeholder.is_valid());
        assert_eq!(placeholder.meta_kind, MetaKind::Unknown);
        assert_eq!(placeholder.paths().count(), 0);

        assert!(!Entry::missing().is_valid());
    }

    #[test]
    fn test_paths() {
        let mut entry = Entry::from_file(&file("20240101120000.meta"));
        entry.apply(&file("20240101120000.md"));
        let paths: Vec<_> = entry.paths().collect();
        assert_eq!(paths.len(), 2);
    }
}
