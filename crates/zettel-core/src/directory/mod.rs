//! Note directory service
//!
//! [`DirectoryService`] keeps an in-memory index of the note files under a
//! directory tree. A single task owns the index; it is fed by a file watcher,
//! a periodic rescan and the commands issued through the service handle.
//!
//! # Usage
//!
//! ```text
//! let mut directory = DirectoryService::new(&config);
//! directory.subscribe(|change| println!("{:?}", change));
//! directory.start().await?;
//!
//! let entry = directory.new_entry().await?;
//! let all = directory.get_entries().await?;
//! ```

mod actor;
mod entry;
mod observers;
mod pipeline;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::RecommendedWatcher;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{DirectoryError, DirectoryResult};
use crate::id::{IdSource, NoteId, SystemClock};

use actor::{Command, DirectoryActor};
use pipeline::Signal;

pub use entry::{Entry, MetaKind, NoteFile, META_EXT, ZETTEL_EXT};
pub use observers::{Change, Observer, Observers};

/// Capacity of the command queue
const COMMAND_QUEUE: usize = 64;

/// Longest pause between two allocation attempts
const MAX_BACKOFF: Duration = Duration::from_secs(1);

/// Handle to the note directory
pub struct DirectoryService {
    notes_dir: PathBuf,
    rescan_interval: Duration,
    debounce: Duration,
    allocation_attempts: u32,
    allocation_backoff: Duration,
    ids: Arc<dyn IdSource>,
    observers: Observers,
    commands: Option<mpsc::Sender<Command>>,
    stop: watch::Sender<bool>,
    watcher: Option<RecommendedWatcher>,
}

impl DirectoryService {
    /// Create a service for the configured notes directory.
    ///
    /// Nothing runs until [`start`](Self::start) is called.
    pub fn new(config: &Config) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            notes_dir: config.notes_dir.clone(),
            rescan_interval: config.rescan_interval(),
            debounce: config.debounce(),
            allocation_attempts: config.allocation_attempts(),
            allocation_backoff: config.allocation_backoff(),
            ids: Arc::new(SystemClock::new()),
            observers: Observers::new(),
            commands: None,
            stop,
            watcher: None,
        }
    }

    /// Replace the source of candidate identifiers
    pub fn with_id_source(mut self, ids: Arc<dyn IdSource>) -> Self {
        self.ids = ids;
        self
    }

    pub fn notes_dir(&self) -> &Path {
        &self.notes_dir
    }

    /// Register a change callback.
    ///
    /// Callbacks run on the directory task, one at a time, after the change
    /// has been applied. They must not wait on the service.
    pub fn subscribe<F>(&self, observer: F)
    where
        F: Fn(Change) + Send + Sync + 'static,
    {
        self.observers.subscribe(observer);
    }

    /// Launch the watcher, rescan ticker, normalizer and directory task.
    ///
    /// Returns once the first full scan has been applied, with the number of
    /// entries found. A watcher that cannot be set up is logged; the index
    /// is then kept current by rescans alone.
    pub async fn start(&mut self) -> DirectoryResult<usize> {
        if self.commands.is_some() {
            return Err(DirectoryError::AlreadyStarted);
        }

        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE);
        let (ready_tx, ready_rx) = oneshot::channel();

        let actor = DirectoryActor::new(self.observers.clone()).with_ready(ready_tx);
        tokio::spawn(actor.run(event_rx, command_rx));
        tokio::spawn(pipeline::normalize(
            self.notes_dir.clone(),
            signal_rx,
            event_tx,
            self.debounce,
        ));

        match pipeline::watch_directory(&self.notes_dir, signal_tx.clone()) {
            Ok(watcher) => self.watcher = Some(watcher),
            Err(err) => warn!("File watching disabled, relying on rescans: {}", err),
        }

        signal_tx
            .send(Signal::Rescan)
            .map_err(|_| DirectoryError::Stopped)?;
        pipeline::spawn_rescan_ticker(self.rescan_interval, signal_tx, self.stop.subscribe());
        self.commands = Some(command_tx);

        let entries = ready_rx.await.map_err(|_| DirectoryError::Stopped)?;
        info!(
            entries,
            dir = %self.notes_dir.display(),
            "note directory ready"
        );
        Ok(entries)
    }

    /// Stop the periodic rescan.
    ///
    /// The index keeps serving commands and following the watcher. Dropping
    /// the service shuts everything down.
    pub fn stop(&self) {
        self.stop.send_replace(true);
        debug!("periodic rescan stopped");
    }

    pub fn is_running(&self) -> bool {
        self.commands
            .as_ref()
            .is_some_and(|commands| !commands.is_closed())
    }

    /// Snapshot of all entries, in no particular order
    pub async fn get_entries(&self) -> DirectoryResult<Vec<Entry>> {
        self.request(|reply| Command::GetEntries { reply }).await
    }

    /// Entry for `id`; an entry with [`NoteId::INVALID`] when unknown
    pub async fn get_entry(&self, id: NoteId) -> DirectoryResult<Entry> {
        self.request(|reply| Command::GetEntry { id, reply }).await
    }

    /// Allocate a fresh identifier and reserve a placeholder entry for it.
    ///
    /// The placeholder is in the index before this returns. Once the note's
    /// files exist, record them with [`update_entry`](Self::update_entry).
    pub async fn new_entry(&self) -> DirectoryResult<Entry> {
        let mut backoff = self.allocation_backoff;

        for attempt in 0..self.allocation_attempts {
            if attempt > 1 {
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
            let candidate = self.ids.candidate(attempt > 0);
            let reserved = self
                .request(|reply| Command::Reserve {
                    id: candidate,
                    reply,
                })
                .await?;
            if let Some(entry) = reserved {
                return Ok(entry);
            }
            debug!(%candidate, attempt, "note id taken, trying another");
        }

        Err(DirectoryError::AllocationExhausted {
            attempts: self.allocation_attempts,
        })
    }

    /// Insert or replace the entry under its id
    pub async fn update_entry(&self, entry: Entry) -> DirectoryResult<()> {
        self.request(|reply| Command::Update { entry, reply }).await
    }

    /// Move the entry at `old_id` to `entry.id`, replacing it with `entry`.
    ///
    /// Fails with [`DirectoryError::InvalidId`] without changing anything
    /// when the target id is already taken.
    ///
    /// Observers get one [`Change::Entry`] carrying `old_id`. The target id
    /// was free before the rename, so the only cached state that can be
    /// stale is the old entry; an observer that also tracks absent ids must
    /// re-read `entry.id` itself.
    pub async fn rename_entry(&self, old_id: NoteId, entry: Entry) -> DirectoryResult<()> {
        self.request(|reply| Command::Rename {
            old_id,
            entry,
            reply,
        })
        .await?
    }

    pub async fn delete_entry(&self, id: NoteId) -> DirectoryResult<()> {
        self.request(|reply| Command::Delete { id, reply }).await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> DirectoryResult<T> {
        let commands = self.commands.as_ref().ok_or(DirectoryError::NotStarted)?;
        let (reply, response) = oneshot::channel();
        commands
            .send(command(reply))
            .await
            .map_err(|_| DirectoryError::Stopped)?;
        response.await.map_err(|_| DirectoryError::Stopped)
    }
}

impl std::fmt::Debug for DirectoryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryService")
            .field("notes_dir", &self.notes_dir)
            .field("running", &self.is_running())
            .field("watching", &self.watcher.is_some())
            .field("observers", &self.observers)
            .finish()
    }
}
