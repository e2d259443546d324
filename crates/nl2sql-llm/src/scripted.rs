//! Generator that replays canned replies.
//!
//! Used by tests throughout the workspace and by dry runs where no model
//! endpoint is available.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use nl2sql_core::{ChatMessage, GenerateError, TextGenerator};

enum Reply {
    Text(String),
    Fail(String),
}

/// A [`TextGenerator`] returning pre-recorded replies in order.
///
/// Once the script runs out the last reply repeats. Every prompt received
/// is recorded and can be inspected with [`ScriptedGenerator::prompts`].
pub struct ScriptedGenerator {
    name: String,
    script: Mutex<VecDeque<Reply>>,
    last: Mutex<Option<Reply>>,
    prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedGenerator {
    /// Reply with each of `replies` in turn.
    pub fn new<I, S>(name: impl Into<String>, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_script(
            name,
            replies.into_iter().map(|r| Reply::Text(r.into())).collect(),
        )
    }

    /// Fail every call with a request error.
    pub fn failing(name: impl Into<String>) -> Self {
        let name = name.into();
        let message = format!("{name} is unavailable");
        Self::from_script(name, VecDeque::from([Reply::Fail(message)]))
    }

    fn from_script(name: impl Into<String>, script: VecDeque<Reply>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(script),
            last: Mutex::new(None),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Number of calls made so far.
    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Every conversation received, in call order.
    pub fn prompts(&self) -> Vec<Vec<ChatMessage>> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn next_reply(&self) -> Result<String, GenerateError> {
        let poisoned = || GenerateError::Request("scripted generator poisoned".to_string());
        let mut script = self.script.lock().map_err(|_| poisoned())?;
        let mut last = self.last.lock().map_err(|_| poisoned())?;
        if let Some(reply) = script.pop_front() {
            *last = Some(reply);
        }
        match last.as_ref() {
            Some(Reply::Text(text)) => Ok(text.clone()),
            Some(Reply::Fail(message)) => Err(GenerateError::Request(message.clone())),
            None => Ok(String::new()),
        }
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn model_name(&self) -> &str {
        &self.name
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, GenerateError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(messages.to_vec());
        }
        self.next_reply()
    }
}
