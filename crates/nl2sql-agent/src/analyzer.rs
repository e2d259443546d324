//! Answers that come from the model rather than the database.

use nl2sql_core::{ChatMessage, ModelRole};
use nl2sql_llm::{prompts, ModelRoster};
use tracing::error;

/// Analyzes previously returned data and asks clarifying questions.
pub struct DataAnalyzer {
    roster: ModelRoster,
}

impl DataAnalyzer {
    pub fn new(roster: ModelRoster) -> Self {
        Self { roster }
    }

    /// Answer the latest question from the data already in `history`.
    ///
    /// Returns `None` if the explanation model fails.
    pub async fn analyze(&self, history: &[ChatMessage]) -> Option<String> {
        self.answer(prompts::ANALYZER_PREAMBLE, history).await
    }

    /// Ask the user to restate an ambiguous request.
    pub async fn clarify(&self, history: &[ChatMessage]) -> Option<String> {
        self.answer(prompts::CLARIFY_PREAMBLE, history).await
    }

    async fn answer(&self, preamble: &str, history: &[ChatMessage]) -> Option<String> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::system(preamble));
        messages.extend_from_slice(history);

        let model = match self.roster.for_role(ModelRole::Explanation) {
            Ok(model) => model,
            Err(e) => {
                error!("Error in DataAnalyzer: {}", e);
                return None;
            }
        };
        match model.chat(&messages).await {
            Ok(answer) => Some(answer.trim().to_string()),
            Err(e) => {
                error!("Error in DataAnalyzer: {}", e);
                None
            }
        }
    }
}
