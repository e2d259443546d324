//! Request classification.

use nl2sql_core::{ModelRole, RouteLabel};
use nl2sql_llm::{prompts, ModelRoster};
use serde_json::Value;
use tracing::{debug, error};

/// Classifies free-text requests with the routing model.
pub struct Router {
    roster: ModelRoster,
}

impl Router {
    pub fn new(roster: ModelRoster) -> Self {
        Self { roster }
    }

    /// Label for `request`, or `None` if the router malfunctioned.
    ///
    /// `None` covers invocation errors and answers outside the label set;
    /// it is never a stand-in for [`RouteLabel::NotDefined`].
    pub async fn classify(&self, request: &str) -> Option<RouteLabel> {
        let model = match self.roster.for_role(ModelRole::Routing) {
            Ok(model) => model,
            Err(e) => {
                error!("Error in Router::classify: {}", e);
                return None;
            }
        };

        let value = match model
            .generate_structured(&prompts::routing_prompt(request), &prompts::routing_schema())
            .await
        {
            Ok(value) => value,
            Err(e) => {
                error!("Error in Router::classify: {}", e);
                return None;
            }
        };
        debug!("Router output: {}", value);

        match value.get("classification").and_then(Value::as_str) {
            Some(raw) => match raw.parse::<RouteLabel>() {
                Ok(label) => Some(label),
                Err(e) => {
                    error!("Error in Router::classify: {}", e);
                    None
                }
            },
            None => {
                error!("Error in Router::classify: no classification in {}", value);
                None
            }
        }
    }
}
