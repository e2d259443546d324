//! # nl2sql-index
//!
//! Builds and maintains the schema index.
//!
//! A raw schema dump is split into one [`TableChunk`](nl2sql_core::TableChunk)
//! per table, each table is summarized by the summary model using a few
//! example questions, and the summary is embedded and stored with the chunk.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`split_ddl`] | Raw schema text to table chunks |
//! | [`TableFilter`] | Which tables a rebuild covers |
//! | [`JsonSampleSource`], [`MemorySampleSource`] | Example questions per table |
//! | [`DdlFileSource`] | Schema read from a `.sql` file |
//! | [`SchemaIndexer`] | Full rebuild and selective update |

pub mod ddl;
pub mod filter;
pub mod indexer;
pub mod samples;
pub mod source;

pub use ddl::{split_ddl, table_name};
pub use filter::TableFilter;
pub use indexer::{IndexReport, SchemaIndexer};
pub use samples::{JsonSampleSource, MemorySampleSource};
pub use source::DdlFileSource;
