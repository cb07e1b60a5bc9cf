//! The store facade applications interact with.
//!
//! A [`TextDataset`] wraps a transactional host store and a [`TextIndex`]
//! and guarantees that index mutations become visible exactly when the
//! store transaction commits. How the two commits are sequenced is fixed
//! once, at construction: hosts exposing a participant coordinator get
//! delegated mode, everything else gets the facade's own non-delegated
//! sequencing under a private exit lock.

use crate::entity::Entity;
use crate::error::{TextError, TextResult};
use crate::index::{QueryRequest, SearchHit, TextIndex};
use crate::store::TransactionalStore;
use crate::txn::adapter::IndexTxnAdapter;
use crate::txn::participant::{IndexParticipant, TEXT_INDEX_COMPONENT};
use crate::txn::{TransactionMode, TxnType};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{error, warn};

/// Observer notified when a transaction starts and finishes. The
/// surrounding dataset layer uses this to scope its entity extraction to
/// one transaction.
pub trait ChangeMonitor: Send + Sync {
    fn start(&self) {}
    fn finish(&self) {}
}

/// Monitor that observes nothing.
pub struct NoopMonitor;

impl ChangeMonitor for NoopMonitor {}

/// How index and store commits are sequenced. Chosen once at construction,
/// never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coordination {
    /// The host coordinator drives the registered index participant; the
    /// facade's commit and abort only delegate to the store.
    Delegated,
    /// The facade sequences store and index commit itself under an
    /// exclusion lock, because the host offers no participant hook.
    NonDelegated,
}

pub struct TextDataset<S: TransactionalStore> {
    store: S,
    index: Arc<TextIndex>,
    adapter: Arc<IndexTxnAdapter>,
    coordination: Coordination,
    monitor: Box<dyn ChangeMonitor>,
    // Guards the paired store/index exit (commit or abort) of write
    // transactions in non-delegated mode. See commit_write.
    exit_lock: Mutex<()>,
}

impl<S: TransactionalStore> TextDataset<S> {
    /// Wrap a store and an index. If the store exposes a native
    /// transaction coordinator the index is registered as a participant
    /// and commit sequencing is delegated to the host; otherwise this
    /// facade sequences both commits itself.
    pub fn new(store: S, index: TextIndex) -> Self {
        let index = Arc::new(index);
        let adapter = Arc::new(IndexTxnAdapter::new(Arc::clone(&index)));
        let coordination = match store.coordinator() {
            Some(coordinator) => {
                let participant = IndexParticipant::new(Arc::clone(&adapter));
                coordinator.register(TEXT_INDEX_COMPONENT, Arc::new(participant));
                Coordination::Delegated
            }
            None => Coordination::NonDelegated,
        };
        Self {
            store,
            index,
            adapter,
            coordination,
            monitor: Box::new(NoopMonitor),
            exit_lock: Mutex::new(()),
        }
    }

    pub fn with_monitor(mut self, monitor: Box<dyn ChangeMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn coordination(&self) -> Coordination {
        self.coordination
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn index(&self) -> &TextIndex {
        &self.index
    }

    /// Start a transaction and return its context handle. Promotion
    /// variants are rejected up front with a distinguished error. The
    /// handle must be finished with `commit`, `abort` or `end`; dropping
    /// an unfinished write handle aborts it.
    pub fn begin(&self, txn_type: TxnType) -> TextResult<Txn<'_, S>> {
        let Some(mode) = txn_type.convert() else {
            return Err(TextError::UnsupportedTxnType(txn_type));
        };
        self.store.begin(mode)?;
        self.monitor.start();
        Ok(Txn {
            dataset: self,
            mode,
            completed: false,
        })
    }

    /// Whether the host store reports a live transaction. The authoritative
    /// per-thread answer is holding a live [`Txn`] handle.
    pub fn is_in_transaction(&self) -> bool {
        self.store.is_in_transaction()
    }

    /// Search the committed index state. Callable with or without a live
    /// transaction; never observes uncommitted writes.
    pub fn search(&self, request: &QueryRequest) -> TextResult<Vec<SearchHit>> {
        self.index.query(request)
    }

    /// Search the primary field for `text`, with the default result cap.
    pub fn search_text(&self, text: &str) -> TextResult<Vec<SearchHit>> {
        self.search(&QueryRequest::new(text))
    }

    fn commit_txn(&self, mode: TransactionMode) -> TextResult<()> {
        self.monitor.finish();
        match self.coordination {
            Coordination::Delegated => self.store.commit(),
            Coordination::NonDelegated => match mode {
                // The index is read-only in READ transactions; committing
                // the store is all there is to do.
                TransactionMode::Read => self.store.commit(),
                TransactionMode::Write => self.commit_write(),
            },
        }
    }

    fn commit_write(&self) -> TextResult<()> {
        let _guard = self.exit_lock.lock();
        // This guard covers only the sequencing of the store and index
        // exit calls, never the store's own locking. Holding it around a
        // store operation that needs store-wide exclusivity inverts lock
        // order against a writer that already owns that exclusivity and is
        // waiting here to commit, and the two deadlock. Hosts with a
        // native coordinator never enter this path. Do not remove the
        // guard either: without it a concurrent exit can interleave
        // between the store commit and the index commit and the two sides
        // desynchronize.

        // Close out whatever the previous write transaction left behind;
        // a leftover Prepared state means an earlier exit never resolved
        // and is refused rather than silently discarded.
        if let Err(e) = self.adapter.begin() {
            error!(error = %e, "index transaction in unexpected state, aborting");
            self.abort_write_locked();
            return Err(e);
        }

        // Phase 1: make the index writes durable but not visible.
        if let Err(e) = self.adapter.prepare() {
            error!(error = %e, "index prepare failed, aborting transaction");
            self.abort_write_locked();
            return Err(e);
        }

        // Phase 2: store first, then make the index state visible.
        let outcome = self.store.commit().and_then(|()| self.adapter.commit());
        if let Err(e) = outcome {
            error!(error = %e, "commit failed, aborting transaction");
            self.abort_write_locked();
            return Err(e);
        }
        Ok(())
    }

    fn abort_txn(&self, mode: TransactionMode) {
        self.monitor.finish();
        match self.coordination {
            Coordination::Delegated => {
                if let Err(e) = self.store.abort() {
                    warn!(error = %e, "exception in abort");
                }
            }
            Coordination::NonDelegated => match mode {
                TransactionMode::Read => {
                    if let Err(e) = self.store.abort() {
                        warn!(error = %e, "exception in abort");
                    }
                }
                TransactionMode::Write => {
                    let _guard = self.exit_lock.lock();
                    self.abort_write_locked();
                }
            },
        }
    }

    /// Close the index writer. Safe after commit or rollback; queries stay
    /// available against the committed state.
    pub fn close(&self) {
        self.adapter.close();
    }

    /// Roll back both sides, discarding failures: the caller is already
    /// handling the primary error and must not be blocked by the abort
    /// itself. Caller holds `exit_lock`.
    fn abort_write_locked(&self) {
        if let Err(e) = self.store.abort() {
            warn!(error = %e, "exception in store abort");
        }
        if let Err(e) = self.adapter.rollback() {
            warn!(error = %e, "exception in index rollback");
        }
    }
}

/// A live transaction against a [`TextDataset`].
///
/// Holding the handle is being in the transaction: the mode lives here,
/// not in ambient per-thread state, and every exit path consumes the
/// handle. Entity changes routed to the index go through the handle so
/// they land inside the write transaction they belong to.
pub struct Txn<'a, S: TransactionalStore> {
    dataset: &'a TextDataset<S>,
    mode: TransactionMode,
    completed: bool,
}

impl<S: TransactionalStore> Txn<'_, S> {
    pub fn mode(&self) -> TransactionMode {
        self.mode
    }

    fn require_write(&self) -> TextResult<()> {
        if self.mode != TransactionMode::Write {
            return Err(TextError::Protocol(
                "index mutation outside a write transaction".to_string(),
            ));
        }
        Ok(())
    }

    /// Index a new entity within this write transaction.
    pub fn add_entity(&self, entity: &Entity) -> TextResult<()> {
        self.require_write()?;
        self.dataset.index.add_entity(entity)
    }

    /// Replace the indexed documents for this entity's identifier.
    pub fn update_entity(&self, entity: &Entity) -> TextResult<()> {
        self.require_write()?;
        self.dataset.index.update_entity(entity)
    }

    /// Delete the document indexed for the given field/value pair.
    pub fn delete_entity(&self, entity: &Entity, field: &str, value: &str) -> TextResult<()> {
        self.require_write()?;
        self.dataset.index.delete_entity(entity, field, value)
    }

    /// Commit the transaction. On failure both sides have been rolled back
    /// best-effort and the primary error is returned; the caller never
    /// observes a partial commit.
    pub fn commit(mut self) -> TextResult<()> {
        self.completed = true;
        self.dataset.commit_txn(self.mode)
    }

    /// Roll back the transaction, discarding any secondary failures.
    pub fn abort(mut self) {
        self.completed = true;
        self.dataset.abort_txn(self.mode);
    }

    /// Finish the transaction. A write that was never committed is treated
    /// as abandoned and aborted first.
    pub fn end(self) {
        // Drop does the work.
    }
}

impl<S: TransactionalStore> Drop for Txn<'_, S> {
    fn drop(&mut self) {
        if !self.completed {
            if self.mode == TransactionMode::Write {
                self.dataset.abort_txn(TransactionMode::Write);
            } else {
                self.dataset.monitor.finish();
            }
        }
        self.dataset.store.end();
    }
}
