//! The directory task
//!
//! One task owns the index. File-system events and client commands arrive on
//! two queues; whichever has an item ready is served, one item at a time, so
//! every state transition happens in a single total order.
//!
//! During a reload, events build a shadow index while commands keep reading
//! the current one. `ReloadEnd` swaps the shadow in as a whole.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::entry::{Entry, NoteFile};
use super::observers::{Change, Observers};
use super::pipeline::DirEvent;
use crate::error::{DirectoryError, DirectoryResult};
use crate::id::NoteId;

type Index = HashMap<NoteId, Entry>;

/// Requests served by the directory task, each with its reply channel
#[derive(Debug)]
pub(crate) enum Command {
    GetEntries {
        reply: oneshot::Sender<Vec<Entry>>,
    },
    GetEntry {
        id: NoteId,
        reply: oneshot::Sender<Entry>,
    },
    /// Insert a placeholder for `id` unless the id is taken
    Reserve {
        id: NoteId,
        reply: oneshot::Sender<Option<Entry>>,
    },
    Update {
        entry: Entry,
        reply: oneshot::Sender<()>,
    },
    Rename {
        old_id: NoteId,
        entry: Entry,
        reply: oneshot::Sender<DirectoryResult<()>>,
    },
    Delete {
        id: NoteId,
        reply: oneshot::Sender<()>,
    },
}

pub(crate) struct DirectoryActor {
    current: Index,
    shadow: Option<Index>,
    observers: Observers,
    ready: Option<oneshot::Sender<usize>>,
}

impl DirectoryActor {
    pub(crate) fn new(observers: Observers) -> Self {
        Self {
            current: Index::new(),
            shadow: None,
            observers,
            ready: None,
        }
    }

    /// Signal `ready` with the entry count once the first reload completes
    pub(crate) fn with_ready(mut self, ready: oneshot::Sender<usize>) -> Self {
        self.ready = Some(ready);
        self
    }

    /// Serve both queues until the event queue is closed
    pub(crate) async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<DirEvent>,
        mut commands: mpsc::Receiver<Command>,
    ) {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                Some(command) = commands.recv() => self.handle_command(command),
            }
        }
        debug!("directory task stopped");
    }

    pub(crate) fn handle_event(&mut self, event: DirEvent) {
        match event {
            DirEvent::ReloadStart => {
                if self.shadow.is_some() {
                    warn!("reload started while another was in progress; restarting it");
                }
                self.shadow = Some(Index::new());
            }
            DirEvent::ReloadEnd => {
                let Some(shadow) = self.shadow.take() else {
                    warn!("reload end without a matching start");
                    return;
                };
                self.current = shadow;
                info!(entries = self.current.len(), "directory reloaded");
                if let Some(ready) = self.ready.take() {
                    let _ = ready.send(self.current.len());
                }
                self.observers.notify(Change::Reload);
            }
            DirEvent::Update(file) => match self.shadow.as_mut() {
                Some(shadow) => upsert_file(shadow, &file),
                None => {
                    upsert_file(&mut self.current, &file);
                    self.observers.notify(Change::Entry(file.id));
                }
            },
            DirEvent::Delete(id) => match self.shadow.as_mut() {
                Some(shadow) => {
                    shadow.remove(&id);
                }
                None => {
                    if self.current.remove(&id).is_some() {
                        self.observers.notify(Change::Entry(id));
                    }
                }
            },
            DirEvent::Error(err) => {
                error!(path = %err.path().display(), "directory scan error: {}", err);
            }
        }
    }

    pub(crate) fn handle_command(&mut self, command: Command) {
        match command {
            Command::GetEntries { reply } => {
                let _ = reply.send(self.entries());
            }
            Command::GetEntry { id, reply } => {
                let _ = reply.send(self.entry(id));
            }
            Command::Reserve { id, reply } => {
                let _ = reply.send(self.reserve(id));
            }
            Command::Update { entry, reply } => {
                self.update(entry);
                let _ = reply.send(());
            }
            Command::Rename {
                old_id,
                entry,
                reply,
            } => {
                let _ = reply.send(self.rename(old_id, entry));
            }
            Command::Delete { id, reply } => {
                self.delete(id);
                let _ = reply.send(());
            }
        }
    }

    fn entries(&self) -> Vec<Entry> {
        self.current.values().cloned().collect()
    }

    fn entry(&self, id: NoteId) -> Entry {
        self.current.get(&id).cloned().unwrap_or_else(Entry::missing)
    }

    fn reserve(&mut self, id: NoteId) -> Option<Entry> {
        if !id.is_valid() || self.contains(id) {
            return None;
        }
        let entry = Entry::placeholder(id);
        for index in self.indexes_mut() {
            index.insert(id, entry.clone());
        }
        debug!(%id, "reserved note id");
        self.observers.notify(Change::Entry(id));
        Some(entry)
    }

    fn update(&mut self, entry: Entry) {
        if !entry.is_valid() {
            warn!("ignoring update for an entry without a valid id");
            return;
        }
        let id = entry.id;
        for index in self.indexes_mut() {
            index.insert(id, entry.clone());
        }
        self.observers.notify(Change::Entry(id));
    }

    fn rename(&mut self, old_id: NoteId, entry: Entry) -> DirectoryResult<()> {
        let new_id = entry.id;
        if !new_id.is_valid() || self.contains(new_id) {
            return Err(DirectoryError::InvalidId { id: new_id });
        }
        for index in self.indexes_mut() {
            index.remove(&old_id);
            index.insert(new_id, entry.clone());
        }
        debug!(%old_id, %new_id, "renamed entry");
        self.observers.notify(Change::Entry(old_id));
        Ok(())
    }

    fn delete(&mut self, id: NoteId) {
        let removed = self.current.remove(&id).is_some();
        if let Some(shadow) = self.shadow.as_mut() {
            shadow.remove(&id);
        }
        if removed {
            self.observers.notify(Change::Entry(id));
        }
    }

    fn contains(&self, id: NoteId) -> bool {
        self.current.contains_key(&id)
            || self
                .shadow
                .as_ref()
                .is_some_and(|shadow| shadow.contains_key(&id))
    }

    /// The visible index, plus the shadow index while a reload is open
    fn indexes_mut(&mut self) -> impl Iterator<Item = &mut Index> + '_ {
        std::iter::once(&mut self.current).chain(self.shadow.as_mut())
    }
}

fn upsert_file(index: &mut Index, file: &NoteFile) {
    index
        .entry(file.id)
        .and_modify(|entry| entry.apply(file))
        .or_insert_with(|| Entry::from_file(file));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::entry::MetaKind;
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    fn id(s: &str) -> NoteId {
        NoteId::parse(s).unwrap()
    }

    fn file(name: &str) -> NoteFile {
        NoteFile::from_path(&Path::new("/notes").join(name)).unwrap()
    }

    fn recording_actor() -> (DirectoryActor, Arc<Mutex<Vec<Change>>>) {
        let observers = Observers::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        observers.subscribe(move |change| sink.lock().unwrap().push(change));
        (DirectoryActor::new(observers), log)
    }

    fn ids(entries: &[Entry]) -> HashSet<NoteId> {
        entries.iter().map(|e| e.id).collect()
    }

    #[test]
    fn test_duplicate_detection() {
        let (mut actor, _) = recording_actor();
        let x = id("20240101120000");

        actor.handle_event(DirEvent::Update(file("20240101120000.meta")));
        actor.handle_event(DirEvent::Update(file("20240101120000.md")));

        let entry = actor.entry(x);
        assert_eq!(entry.meta_kind, MetaKind::File);
        assert_eq!(entry.content_ext.as_deref(), Some("md"));
        assert!(!entry.duplicates);

        actor.handle_event(DirEvent::Update(file("20240101120000.txt")));

        let entry = actor.entry(x);
        assert!(entry.duplicates);
        assert_eq!(entry.content_ext.as_deref(), Some("md"));
        assert!(entry
            .content_path
            .unwrap()
            .ends_with("20240101120000.md"));
    }

    #[test]
    fn test_missing_entry_is_sentinel() {
        let (actor, _) = recording_actor();
        let entry = actor.entry(id("20240101120000"));
        assert!(!entry.is_valid());
    }

    #[test]
    fn test_events_notify_once_each() {
        let (mut actor, log) = recording_actor();
        let x = id("20240101120000");

        actor.handle_event(DirEvent::Update(file("20240101120000.md")));
        actor.handle_event(DirEvent::Delete(x));
        // Nothing left to delete
        actor.handle_event(DirEvent::Delete(x));

        assert_eq!(*log.lock().unwrap(), vec![Change::Entry(x), Change::Entry(x)]);
    }

    #[test]
    fn test_reload_builds_shadow_and_swaps() {
        let (mut actor, log) = recording_actor();
        actor.handle_event(DirEvent::Update(file("20240101120000.md")));
        log.lock().unwrap().clear();

        actor.handle_event(DirEvent::ReloadStart);
        actor.handle_event(DirEvent::Update(file("20240202120000.md")));
        actor.handle_event(DirEvent::Update(file("20240303120000.md")));

        // Still the pre-reload view
        assert_eq!(ids(&actor.entries()), HashSet::from([id("20240101120000")]));

        actor.handle_event(DirEvent::ReloadEnd);

        assert_eq!(
            ids(&actor.entries()),
            HashSet::from([id("20240202120000"), id("20240303120000")])
        );
        assert_eq!(*log.lock().unwrap(), vec![Change::Reload]);
    }

    #[test]
    fn test_delete_during_reload_only_touches_shadow() {
        let (mut actor, log) = recording_actor();
        let x = id("20240101120000");
        actor.handle_event(DirEvent::Update(file("20240101120000.md")));
        log.lock().unwrap().clear();

        actor.handle_event(DirEvent::ReloadStart);
        actor.handle_event(DirEvent::Update(file("20240101120000.md")));
        actor.handle_event(DirEvent::Delete(x));

        assert!(actor.entry(x).is_valid());
        actor.handle_event(DirEvent::ReloadEnd);
        assert!(!actor.entry(x).is_valid());
        assert_eq!(*log.lock().unwrap(), vec![Change::Reload]);
    }

    #[test]
    fn test_first_reload_signals_ready() {
        let (tx, mut rx) = oneshot::channel();
        let mut actor = DirectoryActor::new(Observers::new()).with_ready(tx);

        actor.handle_event(DirEvent::ReloadStart);
        actor.handle_event(DirEvent::Update(file("20240101120000.md")));
        assert!(rx.try_recv().is_err());

        actor.handle_event(DirEvent::ReloadEnd);
        assert_eq!(rx.try_recv().unwrap(), 1);
    }

    #[test]
    fn test_unmatched_reload_end_is_ignored() {
        let (mut actor, log) = recording_actor();
        actor.handle_event(DirEvent::Update(file("20240101120000.md")));

        actor.handle_event(DirEvent::ReloadEnd);

        assert_eq!(actor.entries().len(), 1);
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_error_event_is_contained() {
        let (mut actor, log) = recording_actor();
        actor.handle_event(DirEvent::ReloadStart);
        actor.handle_event(DirEvent::Update(file("20240101120000.md")));
        actor.handle_event(DirEvent::Error(crate::error::FsError::NotFound {
            path: "/notes/20240101130000.md".into(),
        }));
        actor.handle_event(DirEvent::Update(file("20240101140000.md")));
        actor.handle_event(DirEvent::ReloadEnd);

        assert_eq!(actor.entries().len(), 2);
        assert_eq!(*log.lock().unwrap(), vec![Change::Reload]);
    }

    #[test]
    fn test_reserve_rejects_taken_ids() {
        let (mut actor, log) = recording_actor();
        let x = id("20240101120000");

        let entry = actor.reserve(x).unwrap();
        assert_eq!(entry.meta_kind, MetaKind::Unknown);
        assert!(actor.entry(x).is_valid());

        assert!(actor.reserve(x).is_none());
        assert!(actor.reserve(NoteId::INVALID).is_none());
        assert_eq!(*log.lock().unwrap(), vec![Change::Entry(x)]);
    }

    #[test]
    fn test_reserved_id_survives_reload() {
        let (mut actor, _) = recording_actor();
        let x = id("20240101120000");

        actor.handle_event(DirEvent::ReloadStart);
        actor.reserve(x).unwrap();
        actor.handle_event(DirEvent::ReloadEnd);

        assert!(actor.entry(x).is_valid());
    }

    #[test]
    fn test_reserve_checks_shadow() {
        let (mut actor, _) = recording_actor();
        actor.handle_event(DirEvent::ReloadStart);
        actor.handle_event(DirEvent::Update(file("20240101120000.md")));

        assert!(actor.reserve(id("20240101120000")).is_none());
    }

    #[test]
    fn test_update_is_upsert() {
        let (mut actor, log) = recording_actor();
        let x = id("20240101120000");

        let mut entry = Entry::from_file(&file("20240101120000.md"));
        actor.update(entry.clone());
        entry.duplicates = true;
        actor.update(entry.clone());

        assert_eq!(actor.entry(x), entry);
        assert_eq!(actor.entries().len(), 1);
        assert_eq!(log.lock().unwrap().len(), 2);

        actor.update(Entry::missing());
        assert_eq!(actor.entries().len(), 1);
    }

    #[test]
    fn test_rename_moves_entry() {
        let (mut actor, log) = recording_actor();
        let a = id("20240101120000");
        let b = id("20240202120000");
        actor.handle_event(DirEvent::Update(file("20240101120000.md")));
        log.lock().unwrap().clear();

        let renamed = Entry::from_file(&file("20240202120000.md"));
        actor.rename(a, renamed.clone()).unwrap();

        assert!(!actor.entry(a).is_valid());
        assert_eq!(actor.entry(b), renamed);
        assert_eq!(*log.lock().unwrap(), vec![Change::Entry(a)]);
    }

    #[test]
    fn test_rename_collision_changes_nothing() {
        let (mut actor, log) = recording_actor();
        let a = id("20240101120000");
        let b = id("20240202120000");
        actor.handle_event(DirEvent::Update(file("20240101120000.md")));
        actor.handle_event(DirEvent::Update(file("20240202120000.txt")));
        let before_a = actor.entry(a);
        let before_b = actor.entry(b);
        log.lock().unwrap().clear();

        let result = actor.rename(a, Entry::from_file(&file("20240202120000.md")));

        assert!(matches!(result, Err(DirectoryError::InvalidId { id }) if id == b));
        assert_eq!(actor.entry(a), before_a);
        assert_eq!(actor.entry(b), before_b);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_delete_command() {
        let (mut actor, log) = recording_actor();
        let x = id("20240101120000");
        actor.handle_event(DirEvent::Update(file("20240101120000.md")));
        log.lock().unwrap().clear();

        actor.delete(x);
        actor.delete(x);

        assert!(!actor.entry(x).is_valid());
        assert_eq!(*log.lock().unwrap(), vec![Change::Entry(x)]);
    }

    #[test]
    fn test_commands_reply_on_their_channel() {
        let (mut actor, _) = recording_actor();
        let x = id("20240101120000");

        let (reply, mut rx) = oneshot::channel();
        actor.handle_command(Command::Reserve { id: x, reply });
        assert!(rx.try_recv().unwrap().is_some());

        let (reply, mut rx) = oneshot::channel();
        actor.handle_command(Command::GetEntry { id: x, reply });
        assert_eq!(rx.try_recv().unwrap().id, x);

        let (reply, mut rx) = oneshot::channel();
        actor.handle_command(Command::GetEntries { reply });
        assert_eq!(rx.try_recv().unwrap().len(), 1);

        let (reply, mut rx) = oneshot::channel();
        actor.handle_command(Command::Delete { id: x, reply });
        rx.try_recv().unwrap();

        // A caller that went away does not upset the task
        let (reply, rx) = oneshot::channel();
        drop(rx);
        actor.handle_command(Command::GetEntries { reply });
    }

    #[tokio::test]
    async fn test_run_ends_when_events_close() {
        let actor = DirectoryActor::new(Observers::new());
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (_command_tx, command_rx) = mpsc::channel(8);

        let task = tokio::spawn(actor.run(event_rx, command_rx));
        drop(event_tx);

        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_snapshots_never_mix_reload_states() {
        let (changes_tx, mut changes_rx) = mpsc::unbounded_channel();
        let observers = Observers::new();
        observers.subscribe(move |change| {
            let _ = changes_tx.send(change);
        });
        let actor = DirectoryActor::new(observers);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::channel(8);
        tokio::spawn(actor.run(event_rx, command_rx));

        let old_names = ["20240101000001.md", "20240101000002.md"];
        let new_names = [
            "20240202000001.md",
            "20240202000002.md",
            "20240202000003.md",
        ];
        let to_ids = |names: &[&str]| -> HashSet<NoteId> {
            names.iter().map(|n| file(n).id).collect()
        };
        let old_ids = to_ids(&old_names[..]);
        let new_ids = to_ids(&new_names[..]);

        event_tx.send(DirEvent::ReloadStart).unwrap();
        for name in old_names {
            event_tx.send(DirEvent::Update(file(name))).unwrap();
        }
        event_tx.send(DirEvent::ReloadEnd).unwrap();
        assert_eq!(changes_rx.recv().await, Some(Change::Reload));

        let reader = {
            let command_tx = command_tx.clone();
            tokio::spawn(async move {
                let mut snapshots = Vec::new();
                for _ in 0..200 {
                    let (reply, rx) = oneshot::channel();
                    command_tx
                        .send(Command::GetEntries { reply })
                        .await
                        .unwrap();
                    snapshots.push(ids(&rx.await.unwrap()));
                    tokio::task::yield_now().await;
                }
                snapshots
            })
        };

        event_tx.send(DirEvent::ReloadStart).unwrap();
        for name in new_names {
            event_tx.send(DirEvent::Update(file(name))).unwrap();
            tokio::task::yield_now().await;
        }
        event_tx.send(DirEvent::ReloadEnd).unwrap();

        for snapshot in reader.await.unwrap() {
            assert!(
                snapshot == old_ids || snapshot == new_ids,
                "partial snapshot: {:?}",
                snapshot
            );
        }
    }
}
