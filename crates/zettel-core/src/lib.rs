//! Zettel Core Library
//!
//! This crate keeps a live, queryable index of a directory of notes. Every
//! note is stored as one or more files named `<14-digit-id>.<ext>`; the index
//! maps each id to the location of its content and metadata files.
//!
//! # Architecture
//!
//! - **Directory task**: sole owner of the index, serving commands and
//!   file-system events one at a time
//! - **Event pipeline**: file watcher and periodic rescan, normalized into
//!   reload, update, delete and error events
//! - **Observers**: callbacks invoked after each applied change
//!
//! The index is a cache. It is rebuilt from disk on start and on every
//! rescan, and is never persisted.
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let mut directory = DirectoryService::new(&config);
//! directory.start().await?;
//!
//! let entry = directory.new_entry().await?;
//! println!("allocated {}", entry.id);
//! ```
//!
//! # Modules
//!
//! - `directory`: The directory service (main entry point)
//! - `id`: Note identifiers and candidate sources
//! - `error`: Error types
//! - `config`: Application configuration

pub mod config;
pub mod directory;
pub mod error;
pub mod id;

pub use config::Config;
pub use directory::{Change, DirectoryService, Entry, MetaKind, NoteFile, META_EXT, ZETTEL_EXT};
pub use error::{DirectoryError, DirectoryResult, FsError};
pub use id::{IdError, IdSource, NoteId, SystemClock};
