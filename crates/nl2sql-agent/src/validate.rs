//! Grammar-only statement validation.

use async_trait::async_trait;
use nl2sql_core::{DbError, SyntaxValidator};
use sqlparser::ast::Statement;
use sqlparser::dialect::{dialect_from_str, Dialect, GenericDialect};
use sqlparser::parser::Parser;
use tracing::warn;

/// Validates statements with `sqlparser`, without touching a database.
///
/// Accepts exactly one statement. Unless built with
/// [`SqlParserValidator::allow_writes`], only queries pass.
#[derive(Debug, Clone)]
pub struct SqlParserValidator {
    dialect: String,
    read_only: bool,
}

impl SqlParserValidator {
    /// Validator for a dialect name such as `sqlite` or `postgres`.
    ///
    /// Names `sqlparser` does not know fall back to its generic dialect.
    pub fn new(dialect: &str) -> Self {
        let dialect = dialect.trim().to_lowercase();
        if dialect_from_str(&dialect).is_none() {
            warn!("Unknown SQL dialect {:?}, using the generic grammar", dialect);
        }
        Self {
            dialect,
            read_only: true,
        }
    }

    /// Also accept statements that are not queries.
    #[must_use]
    pub fn allow_writes(mut self) -> Self {
        self.read_only = false;
        self
    }

    fn grammar(&self) -> Box<dyn Dialect> {
        dialect_from_str(&self.dialect).unwrap_or_else(|| Box::new(GenericDialect {}))
    }
}

#[async_trait]
impl SyntaxValidator for SqlParserValidator {
    async fn check(&self, statement: &str) -> Result<(), DbError> {
        let dialect = self.grammar();
        let statements = Parser::parse_sql(dialect.as_ref(), statement)
            .map_err(|e| DbError::Syntax(e.to_string()))?;

        let [parsed] = statements.as_slice() else {
            return Err(DbError::Rejected(format!(
                "expected one statement, found {}",
                statements.len()
            )));
        };

        if self.read_only && !matches!(parsed, Statement::Query(_)) {
            return Err(DbError::Rejected("only queries are allowed".to_string()));
        }
        Ok(())
    }
}
