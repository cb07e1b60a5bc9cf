//! Transactional full-text search for graph stores.
//!
//! graphtext binds a tantivy index to a transactional host store so that
//! index mutations become visible exactly when, and only when, the store
//! transaction commits. Applications talk to a [`TextDataset`]:
//! begin a transaction, route entity changes through it, commit or abort,
//! and query the committed state with structured search requests.

pub mod config;
pub mod entity;
pub mod error;
pub mod index;
pub mod store;
pub mod txn;

// Explicit exports for better API clarity
pub use config::{EntityDefinition, Settings};
pub use entity::Entity;
pub use error::{TextError, TextResult};
pub use index::{HighlightOpts, Literal, QueryRequest, SearchHit, TextIndex, escape_query};
pub use store::{MemStore, Quad, TransactionalStore};
pub use txn::{
    ChangeMonitor, ComponentId, Coordination, IndexTxnAdapter, TextDataset, TransactionMode, Txn,
    TxnCoordinator, TxnParticipant, TxnType,
};
