//! Two-phase transaction adapter over the index writer.
//!
//! One adapter instance lives for the facade's lifetime and sequences a
//! single logical index transaction at a time: `Idle -> Prepared ->
//! Committed`, with `Idle`/`Prepared` falling to `Aborted` on rollback.
//! `begin` resets a finished transaction so the instance can be reused.

use crate::error::{TextError, TextResult};
use crate::index::TextIndex;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::warn;

/// Lifecycle state of the current logical index transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    Idle,
    Prepared,
    Committed,
    Aborted,
}

pub struct IndexTxnAdapter {
    index: Arc<TextIndex>,
    state: Mutex<TxnState>,
}

impl IndexTxnAdapter {
    pub fn new(index: Arc<TextIndex>) -> Self {
        Self {
            index,
            state: Mutex::new(TxnState::Idle),
        }
    }

    pub fn state(&self) -> TxnState {
        *self.state.lock()
    }

    /// Reset a finished transaction before a new attempt. A transaction
    /// left in `Prepared` was never resolved and must not be discarded
    /// silently.
    pub fn begin(&self) -> TextResult<()> {
        let mut state = self.state.lock();
        match *state {
            TxnState::Prepared => Err(TextError::Protocol(
                "previous index transaction is still prepared".to_string(),
            )),
            _ => {
                *state = TxnState::Idle;
                Ok(())
            }
        }
    }

    /// Flush pending writes to durable-but-not-yet-visible state. On
    /// failure the pending writes are discarded; no partial recovery is
    /// attempted and the caller must abort the enclosing transaction.
    pub fn prepare(&self) -> TextResult<()> {
        let mut state = self.state.lock();
        if *state != TxnState::Idle {
            return Err(TextError::Protocol(format!(
                "prepare called in state {state:?}"
            )));
        }
        match self.index.prepare() {
            Ok(()) => {
                *state = TxnState::Prepared;
                Ok(())
            }
            Err(e) => {
                if let Err(rb) = self.index.rollback() {
                    warn!(error = %rb, "rollback after failed prepare also failed");
                }
                *state = TxnState::Aborted;
                Err(e)
            }
        }
    }

    /// Make the prepared state visible. Only legal after a successful
    /// `prepare`. If the engine's commit fails the writes are rolled back
    /// best-effort and the failure surfaces as fatal: past this point the
    /// dual-resource transaction cannot be considered atomic.
    pub fn commit(&self) -> TextResult<()> {
        let mut state = self.state.lock();
        if *state != TxnState::Prepared {
            return Err(TextError::Protocol(
                "commit without a successful prepare".to_string(),
            ));
        }
        match self.index.commit() {
            Ok(()) => {
                *state = TxnState::Committed;
                Ok(())
            }
            Err(e) => {
                if let Err(rb) = self.index.rollback() {
                    warn!(error = %rb, "rollback after failed commit also failed");
                }
                *state = TxnState::Aborted;
                Err(e)
            }
        }
    }

    /// Discard pending writes and restore a usable writer. Safe to call
    /// repeatedly: every call leaves a fresh writer installed, so a second
    /// rollback discards nothing and never raises.
    pub fn rollback(&self) -> TextResult<()> {
        let mut state = self.state.lock();
        let result = self.index.rollback();
        *state = TxnState::Aborted;
        result
    }

    /// Close the underlying writer. Safe after commit or rollback.
    pub fn close(&self) {
        self.index.close();
    }
}
