//! Configuration handling for nl2sql.
//!
//! Every field has a default, so an empty file (or no file) is valid.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use nl2sql_llm::RoleBindings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Schema selection
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Schema index
    #[serde(default)]
    pub index: IndexConfig,

    /// Embedding backend
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Ordered model roster
    #[serde(default)]
    pub models: Vec<ModelConfig>,

    /// Role → roster index bindings
    #[serde(default)]
    pub roles: RoleBindings,

    /// Target database
    #[serde(default)]
    pub database: DatabaseConfig,

    /// SQL generation
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Request cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Conversation store
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Schema selection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Candidates from the similarity search
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Tables kept after reranking (clamped to `top_k`)
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Run the reranking stage
    #[serde(default = "default_true")]
    pub enable_reranking: bool,
}

fn default_top_k() -> usize {
    6
}

fn default_top_n() -> usize {
    6
}

fn default_true() -> bool {
    true
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            top_n: default_top_n(),
            enable_reranking: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    Memory,
    #[default]
    Sqlite,
}

/// Schema index configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Storage backend
    #[serde(default)]
    pub backend: IndexBackend,

    /// Index file (default: `<data dir>/index.db`)
    pub path: Option<PathBuf>,

    /// Table name prefix to index, or `ALL`
    #[serde(default = "default_include_prefix")]
    pub include_prefix: String,

    /// JSON file of example questions per table
    pub samples_file: Option<PathBuf>,

    /// `.sql` file of `CREATE TABLE` statements, used when no database is set
    pub ddl_file: Option<PathBuf>,

    /// Sample rows appended to each table definition
    #[serde(default = "default_sample_rows")]
    pub sample_rows: usize,
}

fn default_include_prefix() -> String {
    "ALL".to_string()
}

fn default_sample_rows() -> usize {
    3
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: IndexBackend::default(),
            path: None,
            include_prefix: default_include_prefix(),
            samples_file: None,
            ddl_file: None,
            sample_rows: default_sample_rows(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    #[default]
    Hash,
    Noop,
    OpenAi,
    Ollama,
}

/// Embedding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProvider,

    /// Remote model name
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Remote endpoint (provider default when absent)
    pub endpoint: Option<String>,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Vector dimension
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_dimension() -> usize {
    384
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            model: default_embedding_model(),
            endpoint: None,
            api_key_env: default_api_key_env(),
            dimension: default_dimension(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    OpenAi,
    Ollama,
    /// Canned replies, for dry runs
    Scripted,
}

/// One roster entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,

    pub provider: ModelProvider,

    /// Endpoint (provider default when absent)
    pub endpoint: Option<String>,

    /// Environment variable holding the API key
    pub api_key_env: Option<String>,

    #[serde(default)]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Replies of a `scripted` model
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<String>,
}

fn default_max_tokens() -> u32 {
    4000
}

/// Target database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database for schema extraction, validation and execution
    pub path: Option<PathBuf>,

    /// `sqlparser` dialect used when no database is configured
    #[serde(default = "default_dialect")]
    pub dialect: String,

    /// Run generated SQL in `ask`
    #[serde(default = "default_true")]
    pub execute: bool,
}

fn default_dialect() -> String {
    "generic".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            dialect: default_dialect(),
            execute: true,
        }
    }
}

/// SQL generation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Reject candidates that skip the group filter
    #[serde(default)]
    pub enforce_group_filter: bool,

    /// Column holding the user group
    #[serde(default = "default_group_column")]
    pub group_column: String,
}

fn default_group_column() -> String {
    "USER_GROUP_ID".to_string()
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            enforce_group_filter: false,
            group_column: default_group_column(),
        }
    }
}

/// Request cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheConfig {
    /// Seconds before cached SQL stops being served
    pub ttl_secs: Option<u64>,
}

/// Conversation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Messages kept per conversation
    #[serde(default = "default_max_msgs")]
    pub max_msgs: usize,
}

fn default_max_msgs() -> usize {
    20
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_msgs: default_max_msgs(),
        }
    }
}

/// HTTP configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Timeout for every model and embedding call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load from the default location, or defaults if there is no file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load from `path`, falling back to the default location.
    ///
    /// An explicitly given path must exist.
    pub fn load_from(path: Option<PathBuf>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path, true),
            None => match Self::config_path() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };
        if !required && !path.exists() {
            return Ok(Self::default());
        }
        Self::from_file(&path)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("Invalid config in {}", path.display()))
    }

    /// Parse TOML text.
    pub fn parse(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<()> {
        if self.retrieval.top_k == 0 {
            anyhow::bail!("retrieval.top_k must be > 0");
        }
        if self.conversation.max_msgs == 0 {
            anyhow::bail!("conversation.max_msgs must be > 0");
        }
        Ok(())
    }

    /// Default config file location.
    pub fn config_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Where the index file lives.
    pub fn index_path(&self) -> Option<PathBuf> {
        self.index
            .path
            .clone()
            .or_else(|| data_dir().map(|dir| dir.join("index.db")))
    }

    /// Commented sample configuration.
    pub fn sample_toml() -> &'static str {
        SAMPLE_TOML
    }
}

const SAMPLE_TOML: &str = r#"# nl2sql configuration

[retrieval]
top_k = 6
top_n = 6
enable_reranking = true

[index]
backend = "sqlite"            # memory | sqlite
# path = "/var/lib/nl2sql/index.db"
include_prefix = "ALL"
# samples_file = "samples.json"
# ddl_file = "schema.sql"
sample_rows = 3

[embedding]
provider = "hash"             # hash | noop | openai | ollama
dimension = 384
# model = "text-embedding-3-small"
# endpoint = "https://api.openai.com/v1"
# api_key_env = "OPENAI_API_KEY"

[[models]]
name = "gpt-4o-mini"
provider = "openai"           # openai | ollama | scripted
api_key_env = "OPENAI_API_KEY"
temperature = 0.0
max_tokens = 4000

[[models]]
name = "llama3.1"
provider = "ollama"
# endpoint = "http://localhost:11434"

[roles]
routing = 0
summary = 0
reranking = 0
explanation = 0
generation = [0, 1]

[database]
# path = "warehouse.db"
dialect = "generic"
execute = true

[generation]
enforce_group_filter = false
group_column = "USER_GROUP_ID"

[cache]
# ttl_secs = 3600

[conversation]
max_msgs = 20

[http]
timeout_secs = 60

[logging]
level = "info"
"#;

/// Get the XDG data directory for nl2sql.
pub fn data_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("NL2SQL_DATA_DIR") {
        return Some(PathBuf::from(dir));
    }

    ProjectDirs::from("", "", "nl2sql").map(|dirs| dirs.data_dir().to_path_buf())
}

/// Get the XDG config directory for nl2sql.
pub fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("NL2SQL_CONFIG_DIR") {
        return Some(PathBuf::from(dir));
    }

    ProjectDirs::from("", "", "nl2sql").map(|dirs| dirs.config_dir().to_path_buf())
}
