//! Wiring configuration into pipeline components.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use nl2sql_agent::{
    Assistant, DataAnalyzer, GeneratorOptions, MemoryConversationStore, MemoryRequestCache,
    QueryGenerator, Router, SqlParserValidator, SqliteDatabase,
};
use nl2sql_core::{
    Embedder, SampleSource, SchemaIndex, SchemaSource, StatementRunner, SyntaxValidator,
    TextGenerator,
};
use nl2sql_embed::{CachedEmbedder, HashEmbedder, NoopEmbedder, OllamaEmbedder, OpenAiEmbedder};
use nl2sql_index::{DdlFileSource, JsonSampleSource, MemorySampleSource, SchemaIndexer, TableFilter};
use nl2sql_llm::{GenerationParams, ModelRoster, OllamaChat, OpenAiChat, ScriptedGenerator};
use nl2sql_query::{SchemaSelector, SelectorConfig};
use nl2sql_store::{MemoryIndex, SqliteIndex};
use tracing::{debug, info};

use crate::config::{Config, EmbeddingProvider, IndexBackend, ModelConfig, ModelProvider};

/// Database-facing capabilities.
pub struct Database {
    pub source: Option<Arc<dyn SchemaSource>>,
    pub validator: Arc<dyn SyntaxValidator>,
    pub runner: Option<Arc<dyn StatementRunner>>,
    /// Dialect named in generation prompts
    pub dialect: String,
}

/// Everything the commands need, built once per process.
pub struct Components {
    pub config: Config,
    pub index: Arc<dyn SchemaIndex>,
    pub embedder: Arc<dyn Embedder>,
    pub database: Database,
}

impl Components {
    /// Build the components that do not need a model roster.
    pub fn new(config: Config) -> Result<Self> {
        let index = build_index(&config)?;
        let embedder = build_embedder(&config)?;
        let database = build_database(&config)?;
        Ok(Self {
            config,
            index,
            embedder,
            database,
        })
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.http.timeout_secs)
    }

    /// The configured model roster.
    pub fn roster(&self) -> Result<ModelRoster> {
        if self.config.models.is_empty() {
            anyhow::bail!("No models configured. Add a [[models]] section (see 'nl2sql config init').");
        }
        let models = self
            .config
            .models
            .iter()
            .map(|m| build_model(m, self.timeout()))
            .collect::<Result<Vec<_>>>()?;
        ModelRoster::new(models, self.config.roles.clone()).context("Invalid [roles] bindings")
    }

    /// Indexer over the configured schema source.
    pub fn indexer(&self) -> Result<SchemaIndexer> {
        let source = self.database.source.clone().context(
            "No schema source configured. Set [database] path or [index] ddl_file.",
        )?;
        Ok(SchemaIndexer::new(
            source,
            build_samples(&self.config),
            self.roster()?,
            Arc::clone(&self.embedder),
            Arc::clone(&self.index),
        ))
    }

    /// Table filter from `[index] include_prefix`.
    pub fn filter(&self) -> TableFilter {
        TableFilter::from_prefix(&self.config.index.include_prefix)
    }

    /// An in-memory index starts empty every run, so build it first.
    pub async fn prepare_index(&self) -> Result<()> {
        if self.config.index.backend == IndexBackend::Memory {
            info!("Building in-memory index");
            self.indexer()?
                .rebuild(&self.filter())
                .await
                .context("Failed to build index")?;
        } else {
            self.index.init().await.context("Failed to open index")?;
        }
        Ok(())
    }

    pub fn selector(&self, roster: ModelRoster) -> SchemaSelector {
        let retrieval = &self.config.retrieval;
        SchemaSelector::new(
            Arc::clone(&self.index),
            Arc::clone(&self.embedder),
            roster,
            SelectorConfig {
                top_k: retrieval.top_k,
                top_n: retrieval.top_n,
                enable_reranking: retrieval.enable_reranking,
                ..SelectorConfig::default()
            },
        )
    }

    pub fn generator(&self, roster: ModelRoster) -> QueryGenerator {
        QueryGenerator::new(
            roster,
            Arc::clone(&self.database.validator),
            GeneratorOptions {
                dialect: self.database.dialect.clone(),
                group_column: self.config.generation.group_column.clone(),
                enforce_group_filter: self.config.generation.enforce_group_filter,
            },
        )
    }

    /// The full request dispatcher.
    pub fn assistant(&self) -> Result<Assistant> {
        let roster = self.roster()?;
        let mut cache = MemoryRequestCache::new();
        if let Some(ttl) = self.config.cache.ttl_secs {
            cache = cache.with_ttl(Duration::from_secs(ttl));
        }

        let assistant = Assistant::new(
            Router::new(roster.clone()),
            self.selector(roster.clone()),
            self.generator(roster.clone()),
            DataAnalyzer::new(roster),
            Arc::new(cache),
            Arc::new(MemoryConversationStore::new(self.config.conversation.max_msgs)),
        );
        Ok(match (&self.database.runner, self.config.database.execute) {
            (Some(runner), true) => assistant.with_runner(Arc::clone(runner)),
            _ => assistant,
        })
    }
}

fn api_key(var: &str) -> Result<String> {
    std::env::var(var).with_context(|| format!("Environment variable {var} is not set"))
}

fn build_model(model: &ModelConfig, timeout: Duration) -> Result<Arc<dyn TextGenerator>> {
    let params = GenerationParams {
        temperature: model.temperature,
        max_tokens: model.max_tokens,
        timeout,
    };
    debug!("Building {:?} model {}", model.provider, model.name);
    Ok(match model.provider {
        ModelProvider::OpenAi => {
            let key = model.api_key_env.as_deref().map(api_key).transpose()?;
            Arc::new(OpenAiChat::new(&model.name, model.endpoint.clone(), key, params)?)
        }
        ModelProvider::Ollama => {
            Arc::new(OllamaChat::new(&model.name, model.endpoint.clone(), params)?)
        }
        ModelProvider::Scripted => {
            Arc::new(ScriptedGenerator::new(&model.name, model.replies.iter().cloned()))
        }
    })
}

fn build_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    let embedding = &config.embedding;
    let timeout = Duration::from_secs(config.http.timeout_secs);
    Ok(match embedding.provider {
        EmbeddingProvider::Hash => Arc::new(HashEmbedder::new(embedding.dimension)),
        EmbeddingProvider::Noop => Arc::new(NoopEmbedder::with_dimension(embedding.dimension)),
        EmbeddingProvider::OpenAi => {
            let inner = OpenAiEmbedder::new(
                api_key(&embedding.api_key_env)?,
                embedding.model.clone(),
                embedding.endpoint.clone(),
                embedding.dimension,
                timeout,
            )?;
            Arc::new(CachedEmbedder::new(Arc::new(inner)))
        }
        EmbeddingProvider::Ollama => {
            let inner = OllamaEmbedder::new(
                embedding.model.clone(),
                embedding.endpoint.clone(),
                embedding.dimension,
                timeout,
            )?;
            Arc::new(CachedEmbedder::new(Arc::new(inner)))
        }
    })
}

fn build_index(config: &Config) -> Result<Arc<dyn SchemaIndex>> {
    Ok(match config.index.backend {
        IndexBackend::Memory => Arc::new(MemoryIndex::new()),
        IndexBackend::Sqlite => {
            let path = config
                .index_path()
                .context("Failed to determine index location")?;
            debug!("Index file: {}", path.display());
            Arc::new(SqliteIndex::open(&path).context("Failed to open index")?)
        }
    })
}

fn build_database(config: &Config) -> Result<Database> {
    if let Some(path) = &config.database.path {
        let db = SqliteDatabase::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?
            .with_sample_rows(config.index.sample_rows);
        let db = Arc::new(db);
        return Ok(Database {
            source: Some(db.clone() as Arc<dyn SchemaSource>),
            validator: db.clone() as Arc<dyn SyntaxValidator>,
            runner: Some(db as Arc<dyn StatementRunner>),
            dialect: "SQLite".to_string(),
        });
    }

    let source: Option<Arc<dyn SchemaSource>> = config
        .index
        .ddl_file
        .as_ref()
        .map(|path| Arc::new(DdlFileSource::new(path)) as Arc<dyn SchemaSource>);
    Ok(Database {
        source,
        validator: Arc::new(SqlParserValidator::new(&config.database.dialect)),
        runner: None,
        dialect: config.database.dialect.clone(),
    })
}

fn build_samples(config: &Config) -> Arc<dyn SampleSource> {
    match &config.index.samples_file {
        Some(path) => Arc::new(JsonSampleSource::load_or_empty(path)),
        None => Arc::new(MemorySampleSource::new()),
    }
}
