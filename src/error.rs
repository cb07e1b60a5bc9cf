//! Error types for the text index layer.
//!
//! The taxonomy separates recoverable query-parse failures from fatal index
//! failures so callers can retry the former without tearing down the
//! enclosing transaction.

use crate::txn::TxnType;
use tantivy::TantivyError;
use thiserror::Error;

/// Main error type for index and transaction operations.
#[derive(Error, Debug)]
pub enum TextError {
    /// Engine-internal failure surfaced by tantivy.
    #[error("Tantivy error: {0}")]
    Engine(#[from] TantivyError),

    /// Malformed query text. Carries the offending string so callers can
    /// report it without re-deriving context.
    #[error("Cannot parse query '{query}': {message}")]
    QueryParse { query: String, message: String },

    /// A named index operation (add/update/delete/prepare/commit/rollback)
    /// failed. The enclosing transaction must be aborted.
    #[error("Index operation failed during {operation}: {cause}")]
    IndexOp {
        operation: &'static str,
        cause: String,
    },

    /// A lifecycle call arrived in a state that does not permit it, e.g.
    /// commit without a prior prepare, or a write outside a transaction.
    #[error("Transaction protocol violation: {0}")]
    Protocol(String),

    /// Explicit rejection of a transaction type this layer does not
    /// support. Checkable without interpreting generic fatal errors.
    #[error("Unsupported transaction type: begin({0})")]
    UnsupportedTxnType(TxnType),

    /// Failure reported by the host store at its transactional boundary.
    #[error("Store error during {operation}: {cause}")]
    Store {
        operation: &'static str,
        cause: String,
    },

    /// A field name that is not part of the index schema.
    #[error("Unknown index field: {0}")]
    UnknownField(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TextError {
    pub(crate) fn index_op(operation: &'static str, cause: impl std::fmt::Display) -> Self {
        Self::IndexOp {
            operation,
            cause: cause.to_string(),
        }
    }
}

pub type TextResult<T> = Result<T, TextError>;
