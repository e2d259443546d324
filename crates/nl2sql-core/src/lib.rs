//! # nl2sql-core
//!
//! Core types and traits for the nl2sql pipeline: answering natural-language
//! questions over a relational schema by narrowing the schema to the relevant
//! tables, classifying the request, and generating a validated SQL statement.
//!
//! This crate provides the foundational abstractions used throughout nl2sql:
//!
//! - **Embedding**: [`Embedder`] trait for converting text to vector embeddings
//! - **Text Generation**: [`TextGenerator`] trait for language-model backends
//! - **Schema Index**: [`SchemaIndex`] trait for storing and searching table summaries
//! - **Database Access**: [`SchemaSource`], [`SyntaxValidator`] and [`StatementRunner`]
//! - **Sample Queries**: [`SampleSource`] trait for per-table example questions
//!
//! ## Architecture
//!
//! ```text
//! SchemaSource → TableChunk → summary (TextGenerator) → Embedder → SchemaIndex
//!                                                                      ↓
//!        request → Router → SchemaSelector → QueryGenerator → SyntaxValidator
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`TableChunk`] | One table's raw definition, keyed by its uppercase name |
//! | [`IndexEntry`] | A table summary embedding plus the chunk it describes |
//! | [`IndexHit`] | A similarity-search match |
//! | [`RestrictedSchema`] | The tables selected for one request |
//! | [`RouteLabel`] | Classification of a request |
//! | [`ChatMessage`] | One message in a conversation |
//!
//! ## Related Crates
//!
//! - `nl2sql-embed`: Embedding implementations
//! - `nl2sql-store`: Schema index backends (memory, SQLite)
//! - `nl2sql-llm`: Text-generation backends and the model roster
//! - `nl2sql-index`: Schema chunking and index rebuilds
//! - `nl2sql-query`: Two-stage schema selection
//! - `nl2sql-agent`: Routing, generation, caching and conversations

pub mod error;
pub mod text;
pub mod traits;
pub mod types;

pub use error::{DbError, EmbedError, Error, GenerateError, IndexError, Result, SampleError};
pub use traits::*;
pub use types::*;
