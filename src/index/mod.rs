//! The tantivy-backed search index: schema construction, writer lifecycle
//! with the two-phase durability protocol, query execution, highlighting.

pub mod highlight;
pub mod query;
pub mod schema;
pub mod writer;

pub use highlight::HighlightOpts;
pub use query::{LANG_NONE, Literal, QueryRequest, SearchHit, escape_query};
pub use schema::FieldSet;
pub use writer::TextIndex;
