//! # nl2sql-embed
//!
//! Embedding backends for the nl2sql schema index.
//!
//! The index only ever embeds short table summaries and user questions, so
//! every backend here implements the same [`nl2sql_core::Embedder`] trait and
//! is chosen by configuration.
//!
//! ## Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`HashEmbedder`] | Offline feature-hashing embedder (default, no network) |
//! | [`OpenAiEmbedder`] | OpenAI-compatible `/embeddings` endpoint |
//! | [`OllamaEmbedder`] | Local Ollama `/api/embed` endpoint |
//! | [`CachedEmbedder`] | Content-hash cache wrapped around any embedder |
//! | [`NoopEmbedder`] | Zero vectors, for tests |
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nl2sql_embed::{CachedEmbedder, HashEmbedder};
//! use nl2sql_core::Embedder;
//! use std::sync::Arc;
//!
//! let embedder = CachedEmbedder::new(Arc::new(HashEmbedder::new(384)));
//! let query = embedder.embed_query("total sales by region").await?;
//! ```

pub mod cache;
pub mod hash;
pub mod noop;
pub mod remote;

pub use cache::{CacheStats, CachedEmbedder};
pub use hash::HashEmbedder;
pub use noop::NoopEmbedder;
pub use remote::{OllamaEmbedder, OpenAiEmbedder};
