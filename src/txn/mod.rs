//! Transaction lifecycle: modes, the index-side two-phase adapter, the
//! participant hook for hosts with a native coordinator, and the store
//! facade that ties them together.

pub mod adapter;
pub mod facade;
pub mod participant;

pub use adapter::{IndexTxnAdapter, TxnState};
pub use facade::{ChangeMonitor, Coordination, NoopMonitor, TextDataset, Txn};
pub use participant::{ComponentId, IndexParticipant, TxnCoordinator, TxnParticipant};

use std::fmt;

/// Transaction type requested at `begin`.
///
/// The promotion variants exist so callers probing for them get a distinct
/// rejection rather than a generic failure; this layer does not support
/// promoting a read transaction to a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnType {
    Read,
    Write,
    ReadPromote,
    ReadCommittedPromote,
}

impl TxnType {
    /// Collapse to an execution mode; `None` for promotion variants.
    pub fn convert(self) -> Option<TransactionMode> {
        match self {
            TxnType::Read => Some(TransactionMode::Read),
            TxnType::Write => Some(TransactionMode::Write),
            TxnType::ReadPromote | TxnType::ReadCommittedPromote => None,
        }
    }
}

impl fmt::Display for TxnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TxnType::Read => "READ",
            TxnType::Write => "WRITE",
            TxnType::ReadPromote => "READ_PROMOTE",
            TxnType::ReadCommittedPromote => "READ_COMMITTED_PROMOTE",
        };
        f.write_str(name)
    }
}

/// Mode of a live transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    Read,
    Write,
}
