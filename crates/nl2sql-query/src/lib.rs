//! Schema selection for nl2sql.
//!
//! [`SchemaSelector`] narrows the indexed schema down to the tables relevant
//! to one question: a similarity search for the top K entries, optionally
//! followed by a reranking model that keeps at most N of them.

pub mod rerank;
pub mod selector;

pub use rerank::{parse_rerank_output, Pick};
pub use selector::{SchemaSelector, SelectorConfig};
