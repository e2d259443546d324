//! # nl2sql-agent
//!
//! The request-handling half of nl2sql: everything that runs per question.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Router`] | Classifies a request into a [`RouteLabel`](nl2sql_core::RouteLabel) |
//! | [`QueryGenerator`] | Generate-and-validate loop over the generation roster |
//! | [`SqlParserValidator`] | Grammar check with `sqlparser`, no database needed |
//! | [`SqliteDatabase`] | Schema source, validator and runner for a SQLite file |
//! | [`MemoryRequestCache`] | Exact-match cache of generated SQL with statistics |
//! | [`MemoryConversationStore`] | Bounded per-conversation message history |
//! | [`DataAnalyzer`] | Answers analysis and clarification requests |
//! | [`Assistant`] | Dispatches one request through all of the above |

pub mod analyzer;
pub mod cache;
pub mod conversation;
pub mod dispatch;
pub mod generator;
pub mod router;
pub mod sqlite;
pub mod validate;

pub use analyzer::DataAnalyzer;
pub use cache::{CacheStats, MemoryRequestCache, RequestCache};
pub use conversation::{ConversationError, ConversationStore, MemoryConversationStore};
pub use dispatch::{Assistant, Request, Response, SqlOutcome, Status};
pub use generator::{postprocess, GeneratorOptions, QueryGenerator};
pub use router::Router;
pub use sqlite::SqliteDatabase;
pub use validate::SqlParserValidator;
