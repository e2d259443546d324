//! One request in, one response out.
//!
//! ```text
//! request → cache hit? ──yes──────────────────────────┐
//!              │ no                                   ↓
//!              └→ Router ─ generate_sql → SchemaSelector → QueryGenerator → [StatementRunner]
//!                        ├ analyze_data → DataAnalyzer::analyze
//!                        ├ not_defined  → DataAnalyzer::clarify
//!                        ├ not_allowed  → fixed refusal
//!                        └ None         → "not classified"
//! ```

use std::sync::Arc;
use std::time::Instant;

use nl2sql_core::{ChatMessage, RouteLabel, StatementRunner};
use nl2sql_llm::prompts;
use nl2sql_query::SchemaSelector;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::analyzer::DataAnalyzer;
use crate::cache::RequestCache;
use crate::conversation::ConversationStore;
use crate::generator::QueryGenerator;
use crate::router::Router;

const MSG_NOT_GENERATED: &str = "SQL not generated! Maybe we don't have the data you're requesting.";
const MSG_NO_SCHEMA: &str = "No tables relevant to your request were found.";
const MSG_NOT_CLASSIFIED: &str = "Request not correctly classified!";
const MSG_NO_ANSWER: &str = "The assistant could not produce an answer.";
const MSG_EMPTY_QUERY: &str = "Empty user query.";

/// A user request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub query: String,
    pub conv_id: String,
    #[serde(default)]
    pub group_id: Option<String>,
}

impl Request {
    pub fn new(query: impl Into<String>, conv_id: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            conv_id: conv_id.into(),
            group_id: None,
        }
    }

    #[must_use]
    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "KO")]
    Ko,
}

/// Answer to a [`Request`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,
    /// `data`, `analysis`, `not_allowed`, `not classified` or `invalid`
    #[serde(rename = "type")]
    pub kind: String,
    /// SQL text, result rows, or an answer
    pub content: Value,
    pub msg: String,
    /// Statement behind a `data` response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
}

impl Response {
    fn ok(kind: &str, content: Value) -> Self {
        Self {
            status: Status::Ok,
            kind: kind.to_string(),
            content,
            msg: String::new(),
            sql: None,
        }
    }

    fn ko(kind: &str, msg: &str) -> Self {
        Self {
            status: Status::Ko,
            kind: kind.to_string(),
            content: Value::String(String::new()),
            msg: msg.to_string(),
            sql: None,
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// Content as plain text, for conversation history and terminals.
    #[must_use]
    pub fn content_text(&self) -> String {
        match &self.content {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Result of the SQL path for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlOutcome {
    /// Served from the request cache
    Cached(String),
    /// Freshly generated and validated
    Generated(String),
    /// Schema selection found nothing relevant
    NoSchema,
    /// Every generation model failed
    NotGenerated,
}

impl SqlOutcome {
    #[must_use]
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::Cached(sql) | Self::Generated(sql) => Some(sql),
            Self::NoSchema | Self::NotGenerated => None,
        }
    }
}

/// Cache key for a request. Group-scoped requests never share SQL with
/// other groups.
fn cache_key(query: &str, group_id: Option<&str>) -> String {
    match group_id {
        Some(group) => format!("{} [group {}]", query.trim(), group),
        None => query.trim().to_string(),
    }
}

/// Wires routing, schema selection, generation, caching and history.
pub struct Assistant {
    router: Router,
    selector: SchemaSelector,
    generator: QueryGenerator,
    analyzer: DataAnalyzer,
    cache: Arc<dyn RequestCache>,
    conversations: Arc<dyn ConversationStore>,
    runner: Option<Arc<dyn StatementRunner>>,
}

impl Assistant {
    pub fn new(
        router: Router,
        selector: SchemaSelector,
        generator: QueryGenerator,
        analyzer: DataAnalyzer,
        cache: Arc<dyn RequestCache>,
        conversations: Arc<dyn ConversationStore>,
    ) -> Self {
        Self {
            router,
            selector,
            generator,
            analyzer,
            cache,
            conversations,
            runner: None,
        }
    }

    /// Execute generated SQL and return rows instead of statements.
    #[must_use]
    pub fn with_runner(mut self, runner: Arc<dyn StatementRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn selector(&self) -> &SchemaSelector {
        &self.selector
    }

    pub fn cache(&self) -> &Arc<dyn RequestCache> {
        &self.cache
    }

    pub fn conversations(&self) -> &Arc<dyn ConversationStore> {
        &self.conversations
    }

    /// SQL for `query`: from the cache, or selected-then-generated.
    ///
    /// Every non-cached attempt is recorded in the cache with its
    /// generation time.
    pub async fn generate_sql(&self, query: &str, group_id: Option<&str>) -> SqlOutcome {
        let key = cache_key(query, group_id);
        if let Some(sql) = self.cache.lookup(&key).await {
            info!("Cache hit");
            return SqlOutcome::Cached(sql);
        }

        let started = Instant::now();
        let schema = self.selector.select_schema(query).await;
        if schema.is_empty() {
            self.cache.record(&key, "", false, started.elapsed()).await;
            return SqlOutcome::NoSchema;
        }

        let sql = self.generator.generate(query, &schema, group_id).await;
        let elapsed = started.elapsed();
        self.cache.record(&key, &sql, !sql.is_empty(), elapsed).await;
        debug!("Generation took {:?}", elapsed);

        if sql.is_empty() {
            SqlOutcome::NotGenerated
        } else {
            SqlOutcome::Generated(sql)
        }
    }

    /// Handle one request end to end, updating the conversation.
    pub async fn handle(&self, request: &Request) -> Response {
        let query = request.query.trim();
        if query.is_empty() {
            return Response::ko("invalid", MSG_EMPTY_QUERY);
        }
        let group_id = request.group_id.as_deref();

        let label = if self.cache.lookup(&cache_key(query, group_id)).await.is_some() {
            Some(RouteLabel::GenerateSql)
        } else {
            self.router.classify(query).await
        };
        info!(
            conv_id = %request.conv_id,
            "Request classified as {:?}",
            label.map(RouteLabel::as_str)
        );

        let conv_id = request.conv_id.as_str();
        let response = match label {
            Some(RouteLabel::GenerateSql) => {
                self.conversations.append(conv_id, ChatMessage::user(query)).await;
                self.data_response(query, group_id).await
            }
            Some(RouteLabel::AnalyzeData) => {
                self.conversations.append(conv_id, ChatMessage::user(query)).await;
                let history = self.conversations.get(conv_id).await;
                Self::analysis(self.analyzer.analyze(&history).await)
            }
            Some(RouteLabel::NotDefined) => {
                self.conversations.append(conv_id, ChatMessage::user(query)).await;
                let history = self.conversations.get(conv_id).await;
                Self::analysis(self.analyzer.clarify(&history).await)
            }
            Some(RouteLabel::NotAllowed) => Response::ok(
                "not_allowed",
                Value::String(prompts::NOT_ALLOWED_ANSWER.to_string()),
            ),
            None => Response::ko("not classified", MSG_NOT_CLASSIFIED),
        };

        let content = response.content_text();
        if !content.is_empty() {
            let message = if label == Some(RouteLabel::GenerateSql) {
                ChatMessage::user(format!("{}{}", prompts::DATA_MESSAGE_PREFIX, content))
            } else {
                ChatMessage::assistant(content)
            };
            self.conversations.append(conv_id, message).await;
        }
        response
    }

    fn analysis(answer: Option<String>) -> Response {
        match answer {
            Some(answer) => Response::ok("analysis", Value::String(answer)),
            None => Response::ko("analysis", MSG_NO_ANSWER),
        }
    }

    async fn data_response(&self, query: &str, group_id: Option<&str>) -> Response {
        let sql = match self.generate_sql(query, group_id).await {
            SqlOutcome::Cached(sql) | SqlOutcome::Generated(sql) => sql,
            SqlOutcome::NoSchema => return Response::ko("data", MSG_NO_SCHEMA),
            SqlOutcome::NotGenerated => return Response::ko("data", MSG_NOT_GENERATED),
        };

        let mut response = match &self.runner {
            Some(runner) => match runner.run(&sql).await {
                Ok(rows) => Response::ok(
                    "data",
                    Value::Array(rows.into_iter().map(Value::Object).collect()),
                ),
                Err(e) => {
                    error!("Statement execution failed: {}", e);
                    Response::ko("data", &format!("SQL execution failed: {e}"))
                }
            },
            None => Response::ok("data", Value::String(sql.clone())),
        };
        response.sql = Some(sql);
        response
    }
}
