//! SQL generation with sequential model fallback.

use std::sync::Arc;

use nl2sql_core::text::{fenced_block, strip_language_tag};
use nl2sql_core::{ChatMessage, RestrictedSchema, SyntaxValidator};
use nl2sql_llm::{prompts, ModelRoster};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Knobs for [`QueryGenerator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorOptions {
    /// Dialect named in the generation prompt
    pub dialect: String,
    /// Column used for per-group row filtering
    pub group_column: String,
    /// Reject candidates that ignore the group column when it applies
    pub enforce_group_filter: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            dialect: "Oracle".to_string(),
            group_column: "USER_GROUP_ID".to_string(),
            enforce_group_filter: false,
        }
    }
}

/// Turns a request plus restricted schema into one validated statement.
pub struct QueryGenerator {
    roster: ModelRoster,
    validator: Arc<dyn SyntaxValidator>,
    options: GeneratorOptions,
}

impl QueryGenerator {
    pub fn new(
        roster: ModelRoster,
        validator: Arc<dyn SyntaxValidator>,
        options: GeneratorOptions,
    ) -> Self {
        Self {
            roster,
            validator,
            options,
        }
    }

    #[must_use]
    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    /// Generate SQL for `request`.
    ///
    /// Generation models are tried in roster order. The first candidate that
    /// survives postprocessing and validation wins and no later model is
    /// called. Returns an empty string when every model fails.
    pub async fn generate(
        &self,
        request: &str,
        schema: &RestrictedSchema,
        group_id: Option<&str>,
    ) -> String {
        let prompt = prompts::generation_prompt(
            &schema.text(),
            request,
            group_id,
            &self.options.group_column,
            &self.options.dialect,
        );
        let messages = [ChatMessage::user(prompt)];
        let needs_group_filter = self.options.enforce_group_filter
            && group_id.is_some()
            && schema.advertises_column(&self.options.group_column);

        for model in self.roster.generation_models() {
            let raw = match model.chat(&messages).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!("Model {} failed to generate SQL: {}", model.model_name(), e);
                    continue;
                }
            };

            let candidate = postprocess(&raw);
            if candidate.is_empty() {
                debug!("Model {} returned no statement", model.model_name());
                continue;
            }

            if needs_group_filter && !references_identifier(&candidate, &self.options.group_column)
            {
                warn!(
                    "Model {} ignored the {} filter",
                    model.model_name(),
                    self.options.group_column
                );
                continue;
            }

            if self.validator.validate(&candidate).await {
                info!("SQL generated by {}", model.model_name());
                debug!("SQL: {}", candidate);
                return candidate;
            }
            warn!("Model {} produced invalid SQL", model.model_name());
        }

        String::new()
    }
}

/// Extract a bare statement from model output.
///
/// Takes the first fenced block if there is one, drops a leading `sql`
/// language tag, surrounding whitespace and trailing semicolons. The inside
/// of the statement is never touched.
#[must_use]
pub fn postprocess(raw: &str) -> String {
    let body = fenced_block(raw).unwrap_or(raw);
    let mut statement = strip_language_tag(body, "sql").trim();
    while let Some(rest) = statement.strip_suffix(';') {
        statement = rest.trim_end();
    }
    statement.to_string()
}

/// Whether `identifier` appears as a whole word outside string literals.
fn references_identifier(sql: &str, identifier: &str) -> bool {
    let mut in_literal = false;
    let mut word = String::new();
    for c in sql.chars() {
        if in_literal {
            if c == '\'' {
                in_literal = false;
            }
            continue;
        }
        if c.is_alphanumeric() || c == '_' || c == '$' {
            word.push(c);
            continue;
        }
        if word.eq_ignore_ascii_case(identifier) {
            return true;
        }
        word.clear();
        if c == '\'' {
            in_literal = true;
        }
    }
    word.eq_ignore_ascii_case(identifier)
}
