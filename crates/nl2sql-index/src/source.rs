//! Schema read from a DDL file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use nl2sql_core::{DbError, SchemaSource};

/// A [`SchemaSource`] backed by a `.sql` file of `CREATE TABLE` statements.
#[derive(Debug, Clone)]
pub struct DdlFileSource {
    path: PathBuf,
}

impl DdlFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SchemaSource for DdlFileSource {
    async fn raw_schema(&self) -> Result<String, DbError> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| DbError::Connection(format!("{}: {e}", self.path.display())))
    }
}
