//! Event pipeline
//!
//! Raw signals come from two sources: the `notify` watcher (one signal per
//! touched path) and the rescan ticker. The normalizer turns them into the
//! directory's event vocabulary:
//!
//! - a rescan becomes `ReloadStart`, one `Update` per note file, `ReloadEnd`
//! - touched note paths are debounced one by one, then classified by
//!   whether the file still exists (`Update`) or not (`Delete`)
//! - failures become `Error` events

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::error::SendError;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use super::entry::NoteFile;
use crate::error::FsError;
use crate::id::NoteId;

/// Events consumed by the directory task
#[derive(Debug)]
pub enum DirEvent {
    /// A full rescan begins; following updates build a fresh index
    ReloadStart,
    /// The rescan is complete
    ReloadEnd,
    /// A note file exists
    Update(NoteFile),
    /// A note file was removed
    Delete(NoteId),
    /// Scanning or watching failed for one item
    Error(FsError),
}

/// Raw input of the normalizer
#[derive(Debug)]
pub(crate) enum Signal {
    /// Rebuild the index from disk
    Rescan,
    /// Something happened to this path
    Touched(PathBuf),
    /// The watcher reported a failure
    Failed(FsError),
}

type SendResult = Result<(), SendError<DirEvent>>;

/// Start watching `dir` recursively, forwarding touched paths as signals.
///
/// The returned watcher must be kept alive; dropping it ends the watch.
pub(crate) fn watch_directory(
    dir: &Path,
    signals: UnboundedSender<Signal>,
) -> Result<RecommendedWatcher, FsError> {
    let root = dir.to_path_buf();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            if matches!(
                event.kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
            ) {
                for path in event.paths {
                    let _ = signals.send(Signal::Touched(path));
                }
            }
        }
        Err(source) => {
            let path = source.paths.first().cloned().unwrap_or_else(|| root.clone());
            let _ = signals.send(Signal::Failed(FsError::Watch { path, source }));
        }
    })
    .map_err(|source| FsError::Watch {
        path: dir.to_path_buf(),
        source,
    })?;

    watcher
        .watch(dir, RecursiveMode::Recursive)
        .map_err(|source| FsError::Watch {
            path: dir.to_path_buf(),
            source,
        })?;

    Ok(watcher)
}

/// Spawn the periodic rescan ticker.
///
/// The first tick fires one `period` from now. The ticker ends when `stop`
/// becomes true, when its sender is dropped, or when the normalizer is gone.
pub(crate) fn spawn_rescan_ticker(
    period: Duration,
    signals: UnboundedSender<Signal>,
    mut stop: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        if *stop.borrow() {
            return;
        }
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if signals.send(Signal::Rescan).is_err() {
                        break;
                    }
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("rescan ticker stopped");
    });
}

/// Most paths waiting for their debounce; beyond this a rescan is cheaper
const PENDING_CAP: usize = 1024;

/// Normalizer loop.
///
/// Each touched note path is reported once it has been quiet for
/// `debounce`; a busy path only delays itself. Runs until every signal
/// sender is gone (pending paths are flushed first) or until the directory
/// task stops listening.
pub(crate) async fn normalize(
    root: PathBuf,
    mut signals: UnboundedReceiver<Signal>,
    events: UnboundedSender<DirEvent>,
    debounce: Duration,
) {
    let mut pending: HashMap<PathBuf, Instant> = HashMap::new();

    loop {
        let next_due = pending.values().min().copied();
        let signal = match next_due {
            Some(at) => tokio::select! {
                signal = signals.recv() => signal,
                _ = tokio::time::sleep_until(at) => {
                    let due = take_due(&mut pending, Instant::now());
                    if flush(due, &events).await.is_err() {
                        break;
                    }
                    continue;
                }
            },
            None => signals.recv().await,
        };

        let sent = match signal {
            Some(Signal::Rescan) => {
                // The scan sees everything the pending paths would report
                pending.clear();
                scan_directory(&root, &events).await
            }
            Some(Signal::Touched(path)) => {
                if NoteFile::from_path(&path).is_none() {
                    Ok(())
                } else if pending.len() >= PENDING_CAP && !pending.contains_key(&path) {
                    warn!(
                        cap = PENDING_CAP,
                        "too many pending file changes, rescanning instead"
                    );
                    pending.clear();
                    scan_directory(&root, &events).await
                } else {
                    pending.insert(path, Instant::now() + debounce);
                    Ok(())
                }
            }
            Some(Signal::Failed(err)) => events.send(DirEvent::Error(err)),
            None => {
                let _ = flush(pending.drain().map(|(path, _)| path).collect(), &events).await;
                break;
            }
        };

        if sent.is_err() {
            break;
        }
    }
    debug!("event normalizer stopped");
}

/// Remove and return the pending paths whose quiet period has ended
fn take_due(pending: &mut HashMap<PathBuf, Instant>, now: Instant) -> Vec<PathBuf> {
    let due: Vec<PathBuf> = pending
        .iter()
        .filter(|(_, deadline)| **deadline <= now)
        .map(|(path, _)| path.clone())
        .collect();
    for path in &due {
        pending.remove(path);
    }
    due
}

/// Report the current state of each path
async fn flush(mut paths: Vec<PathBuf>, events: &UnboundedSender<DirEvent>) -> SendResult {
    paths.sort();

    for path in paths {
        let Some(file) = NoteFile::from_path(&path) else {
            continue;
        };
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => events.send(DirEvent::Update(file))?,
            Ok(_) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(id = %file.id, path = %path.display(), "note file removed");
                events.send(DirEvent::Delete(file.id))?
            }
            Err(err) => events.send(DirEvent::Error(FsError::from_io(err, path)))?,
        }
    }
    Ok(())
}

/// Emit a complete reload of the tree rooted at `root`.
///
/// Entries of each directory are visited in name order. Unreadable items
/// produce an `Error` event and are skipped; the reload always ends.
pub(crate) async fn scan_directory(root: &Path, events: &UnboundedSender<DirEvent>) -> SendResult {
    events.send(DirEvent::ReloadStart)?;

    let mut dirs = vec![root.to_path_buf()];
    let mut files = 0usize;

    while let Some(dir) = dirs.pop() {
        let mut paths = match list_directory(&dir).await {
            Ok(paths) => paths,
            Err(err) => {
                events.send(DirEvent::Error(err))?;
                continue;
            }
        };
        paths.sort();

        for path in paths {
            match tokio::fs::symlink_metadata(&path).await {
                Ok(meta) if meta.is_dir() => dirs.push(path),
                Ok(_) => {
                    let Some(file) = NoteFile::from_path(&path) else {
                        continue;
                    };
                    match tokio::fs::metadata(&path).await {
                        Ok(meta) if meta.is_file() => {
                            files += 1;
                            events.send(DirEvent::Update(file))?;
                        }
                        Ok(_) => {}
                        Err(err) => events.send(DirEvent::Error(FsError::from_io(err, path)))?,
                    }
                }
                Err(err) => events.send(DirEvent::Error(FsError::from_io(err, path)))?,
            }
        }
    }

    debug!(files, root = %root.display(), "directory scan finished");
    events.send(DirEvent::ReloadEnd)
}

async fn list_directory(dir: &Path) -> Result<Vec<PathBuf>, FsError> {
    let mut reader = tokio::fs::read_dir(dir)
        .await
        .map_err(|err| FsError::from_io(err, dir.to_path_buf()))?;

    let mut paths = Vec::new();
    while let Some(entry) = reader
        .next_entry()
        .await
        .map_err(|err| FsError::from_io(err, dir.to_path_buf()))?
    {
        paths.push(entry.path());
    }
    Ok(paths)
}
