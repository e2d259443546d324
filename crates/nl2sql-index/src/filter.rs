//! Table selection for index rebuilds.

use nl2sql_core::normalize_table_id;

/// Which tables an index rebuild covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableFilter {
    /// Every table
    All,
    /// Tables whose uppercase id starts with the prefix
    Prefix(String),
    /// An explicit list of tables
    Tables(Vec<String>),
}

impl TableFilter {
    /// Filter from the `include_prefix` setting; `"ALL"` selects every table.
    #[must_use]
    pub fn from_prefix(prefix: &str) -> Self {
        let prefix = prefix.trim();
        if prefix.is_empty() || prefix.eq_ignore_ascii_case("ALL") {
            Self::All
        } else {
            Self::Prefix(prefix.to_uppercase())
        }
    }

    /// Filter for an explicit table list.
    pub fn tables<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::Tables(
            tables
                .into_iter()
                .map(|t| normalize_table_id(t.as_ref()))
                .collect(),
        )
    }

    /// Whether `table` (canonical uppercase id) passes the filter.
    #[must_use]
    pub fn matches(&self, table: &str) -> bool {
        match self {
            Self::All => true,
            Self::Prefix(prefix) => table.starts_with(prefix.as_str()),
            Self::Tables(tables) => tables.iter().any(|t| t == table),
        }
    }
}

impl Default for TableFilter {
    fn default() -> Self {
        Self::All
    }
}
