//! In-memory reference host store.
//!
//! `MemStore` implements the transactional boundary over a plain quad set:
//! writes buffer until commit, a single-writer gate provides the write
//! exclusivity the facade relies on, and an optional coordinator drives
//! registered participants in lock-step with the store's own commit, which
//! is what puts the facade into delegated mode.

use crate::error::{TextError, TextResult};
use crate::store::TransactionalStore;
use crate::txn::TransactionMode;
use crate::txn::participant::{ComponentId, TxnCoordinator, TxnParticipant};
use dashmap::DashSet;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, ThreadId};
use tracing::warn;

/// One statement: optional named graph plus subject/predicate/object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Quad {
    pub graph: Option<String>,
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl Quad {
    pub fn new(graph: Option<&str>, subject: &str, predicate: &str, object: &str) -> Self {
        Self {
            graph: graph.map(str::to_owned),
            subject: subject.to_string(),
            predicate: predicate.to_string(),
            object: object.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
enum Change {
    Add(Quad),
    Delete(Quad),
}

#[derive(Default)]
struct Registry {
    participants: Mutex<Vec<(ComponentId, Arc<dyn TxnParticipant>)>>,
}

impl Registry {
    fn each(&self, f: impl Fn(&dyn TxnParticipant) -> TextResult<()>) -> TextResult<()> {
        for (_, participant) in self.participants.lock().iter() {
            f(participant.as_ref())?;
        }
        Ok(())
    }
}

impl TxnCoordinator for Registry {
    fn register(&self, id: ComponentId, participant: Arc<dyn TxnParticipant>) {
        self.participants.lock().push((id, participant));
    }
}

pub struct MemStore {
    quads: DashSet<Quad>,
    /// Buffered changes of the open write transaction.
    pending: Mutex<Option<Vec<Change>>>,
    /// Thread currently holding the write gate.
    writer: Mutex<Option<ThreadId>>,
    gate: Condvar,
    open_txns: AtomicUsize,
    coordinator: Option<Registry>,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            quads: DashSet::new(),
            pending: Mutex::new(None),
            writer: Mutex::new(None),
            gate: Condvar::new(),
            open_txns: AtomicUsize::new(0),
            coordinator: None,
        }
    }

    /// A store with a native multi-participant coordinator; wrapping it in
    /// a facade selects delegated mode.
    pub fn with_coordinator() -> Self {
        Self {
            coordinator: Some(Registry::default()),
            ..Self::new()
        }
    }

    /// Buffer a quad insertion in the open write transaction.
    pub fn insert(&self, quad: Quad) -> TextResult<()> {
        self.buffer(Change::Add(quad))
    }

    /// Buffer a quad deletion in the open write transaction.
    pub fn delete(&self, quad: Quad) -> TextResult<()> {
        self.buffer(Change::Delete(quad))
    }

    fn buffer(&self, change: Change) -> TextResult<()> {
        let mut pending = self.pending.lock();
        match pending.as_mut() {
            Some(changes) => {
                changes.push(change);
                Ok(())
            }
            None => Err(TextError::Protocol(
                "store mutation outside a write transaction".to_string(),
            )),
        }
    }

    /// Whether a quad is in the committed state.
    pub fn contains(&self, quad: &Quad) -> bool {
        self.quads.contains(quad)
    }

    pub fn len(&self) -> usize {
        self.quads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }

    fn release_writer(&self) {
        let mut writer = self.writer.lock();
        if *writer == Some(thread::current().id()) {
            *writer = None;
            self.gate.notify_one();
        }
    }

    fn abort_participants(&self) {
        if let Some(registry) = &self.coordinator {
            for (_, participant) in registry.participants.lock().iter() {
                participant.abort();
            }
        }
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionalStore for MemStore {
    fn begin(&self, mode: TransactionMode) -> TextResult<()> {
        if mode == TransactionMode::Write {
            // Single-writer gate: block until no other write is in flight.
            let mut writer = self.writer.lock();
            while writer.is_some() {
                self.gate.wait(&mut writer);
            }
            *writer = Some(thread::current().id());
            *self.pending.lock() = Some(Vec::new());
        }
        self.open_txns.fetch_add(1, Ordering::SeqCst);
        if let Some(registry) = &self.coordinator {
            for (_, participant) in registry.participants.lock().iter() {
                participant.begin(mode);
            }
        }
        Ok(())
    }

    fn commit(&self) -> TextResult<()> {
        let Some(changes) = self.pending.lock().take() else {
            // Read transaction: nothing to apply, but participants still
            // observe the commit.
            if let Some(registry) = &self.coordinator {
                registry.each(|p| p.prepare_commit())?;
                registry.each(|p| p.commit())?;
            }
            return Ok(());
        };

        if let Some(registry) = &self.coordinator {
            if let Err(e) = registry.each(|p| p.prepare_commit()) {
                self.abort_participants();
                self.release_writer();
                return Err(e);
            }
        }

        for change in changes {
            match change {
                Change::Add(quad) => {
                    self.quads.insert(quad);
                }
                Change::Delete(quad) => {
                    self.quads.remove(&quad);
                }
            }
        }

        if let Some(registry) = &self.coordinator {
            registry.each(|p| p.commit())?;
        }
        Ok(())
    }

    fn abort(&self) -> TextResult<()> {
        *self.pending.lock() = None;
        self.abort_participants();
        Ok(())
    }

    fn end(&self) {
        // An abandoned write still holding buffered changes is discarded.
        if self.pending.lock().take().is_some() {
            warn!("write transaction ended without commit, discarding changes");
            self.abort_participants();
        }
        self.release_writer();
        let _ = self
            .open_txns
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    /// Coarse: reports whether any transaction is open on the store. A
    /// real host tracks this per thread.
    fn is_in_transaction(&self) -> bool {
        self.open_txns.load(Ordering::SeqCst) > 0
    }

    fn coordinator(&self) -> Option<&dyn TxnCoordinator> {
        self.coordinator
            .as_ref()
            .map(|registry| registry as &dyn TxnCoordinator)
    }
}
