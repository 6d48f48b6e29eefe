//! Change notification fan-out
//!
//! Observers are invoked from the directory task, one after another, after
//! a change has been applied. The observer list has its own lock; it is
//! copied before callbacks run so no callback executes while it is held.

use std::fmt;
use std::sync::{Arc, RwLock};

use crate::id::NoteId;

/// A change applied by the directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// A full rescan replaced the whole index
    Reload,
    /// A single entry was created, modified or removed
    Entry(NoteId),
}

impl Change {
    pub fn is_full_refresh(&self) -> bool {
        matches!(self, Change::Reload)
    }

    /// Affected id; [`NoteId::INVALID`] for a reload
    pub fn id(&self) -> NoteId {
        match self {
            Change::Reload => NoteId::INVALID,
            Change::Entry(id) => *id,
        }
    }
}

/// Callback registered with [`Observers::subscribe`]
pub type Observer = Arc<dyn Fn(Change) + Send + Sync>;

/// Registered change observers
#[derive(Clone, Default)]
pub struct Observers {
    inner: Arc<RwLock<Vec<Observer>>>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, observer: F)
    where
        F: Fn(Change) + Send + Sync + 'static,
    {
        let mut list = self.inner.write().unwrap_or_else(|e| e.into_inner());
        list.push(Arc::new(observer));
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every observer with `change`
    pub fn notify(&self, change: Change) {
        let snapshot: Vec<Observer> = self
            .inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for observer in &snapshot {
            observer(change);
        }
    }
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("count", &self.len())
            .finish()
    }
}
