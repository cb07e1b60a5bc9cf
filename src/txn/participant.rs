//! Participant registration for hosts with a native multi-participant
//! transaction coordinator.
//!
//! When the host store can drive external participants through its own
//! commit protocol, the index registers an [`IndexParticipant`] and the
//! facade stays out of commit sequencing entirely (delegated mode).

use crate::error::TextResult;
use crate::txn::TransactionMode;
use crate::txn::adapter::IndexTxnAdapter;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Identifies a participant to the host coordinator. Ids must not collide
/// with component ids the host uses internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentId([u8; 4]);

impl ComponentId {
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> [u8; 4] {
        self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// The text index registers under this id.
pub const TEXT_INDEX_COMPONENT: ComponentId = ComponentId::new(*b"ftxi");

/// Callbacks a host coordinator drives in lock-step with its own
/// transaction. `prepare_commit` and `commit` failures propagate so the
/// host can abort; `abort` must never raise.
pub trait TxnParticipant: Send + Sync {
    fn begin(&self, mode: TransactionMode);
    fn prepare_commit(&self) -> TextResult<()>;
    fn commit(&self) -> TextResult<()>;
    fn abort(&self);
}

/// Registration hook exposed by hosts that have a coordinator.
pub trait TxnCoordinator {
    fn register(&self, id: ComponentId, participant: Arc<dyn TxnParticipant>);
}

/// Pushes the index's two-phase protocol into the host's transaction.
/// Read transactions need no index action, so every callback is a no-op
/// unless the current transaction is a write.
pub struct IndexParticipant {
    adapter: Arc<IndexTxnAdapter>,
    mode: Mutex<Option<TransactionMode>>,
}

impl IndexParticipant {
    pub fn new(adapter: Arc<IndexTxnAdapter>) -> Self {
        Self {
            adapter,
            mode: Mutex::new(None),
        }
    }

    fn in_write(&self) -> bool {
        matches!(*self.mode.lock(), Some(TransactionMode::Write))
    }
}

impl TxnParticipant for IndexParticipant {
    fn begin(&self, mode: TransactionMode) {
        *self.mode.lock() = Some(mode);
        if mode == TransactionMode::Write {
            if let Err(e) = self.adapter.begin() {
                warn!(error = %e, "index transaction left unresolved by previous attempt");
            }
        }
    }

    fn prepare_commit(&self) -> TextResult<()> {
        if self.in_write() {
            self.adapter.prepare()
        } else {
            Ok(())
        }
    }

    fn commit(&self) -> TextResult<()> {
        let result = if self.in_write() {
            self.adapter.commit()
        } else {
            Ok(())
        };
        *self.mode.lock() = None;
        result
    }

    fn abort(&self) {
        if self.in_write() {
            if let Err(e) = self.adapter.rollback() {
                warn!(error = %e, "exception in index rollback");
            }
        }
        *self.mode.lock() = None;
    }
}
