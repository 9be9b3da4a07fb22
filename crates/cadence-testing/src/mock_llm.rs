//! Scripted LLM handler.
//!
//! Replies are chosen in this order: the first rule whose pattern occurs in
//! the request transcript, then the next queued reply, then the fallback.
//! Every request is recorded.

use async_trait::async_trait;
use cadence_core::{
    CadenceResult, CompletionRequest, CompletionResponse, LlmHandler, RuntimeError, TokenUsage,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::lock;

/// One scripted answer.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedReply {
    /// Completion content
    Content(String),
    /// Transport failure
    Error(String),
}

impl ScriptedReply {
    fn into_result(self, model: &str) -> CadenceResult<CompletionResponse> {
        match self {
            ScriptedReply::Content(content) => Ok(CompletionResponse {
                usage: TokenUsage {
                    prompt_tokens: 0,
                    completion_tokens: content.split_whitespace().count() as u32,
                },
                content,
                model: model.to_string(),
            }),
            ScriptedReply::Error(message) => Err(RuntimeError::Llm(message)),
        }
    }
}

/// An [`LlmHandler`] that answers from a script.
#[derive(Debug, Clone)]
pub struct ScriptedLlm {
    rules: Vec<(String, ScriptedReply)>,
    queue: Arc<Mutex<VecDeque<ScriptedReply>>>,
    fallback: ScriptedReply,
    latency: Option<Duration>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl Default for ScriptedLlm {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            queue: Arc::new(Mutex::new(VecDeque::new())),
            fallback: ScriptedReply::Error("script exhausted".to_string()),
            latency: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Always answer with `content`.
    pub fn always(content: impl Into<String>) -> Self {
        Self::new().with_fallback(content)
    }

    /// Answer with each reply once, in order.
    pub fn with_replies<I, S>(self, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        lock(&self.queue).extend(replies.into_iter().map(|r| ScriptedReply::Content(r.into())));
        self
    }

    /// Queue a transport failure.
    pub fn with_error(self, message: impl Into<String>) -> Self {
        lock(&self.queue).push_back(ScriptedReply::Error(message.into()));
        self
    }

    /// Answer with `content` whenever `pattern` occurs in any request message.
    pub fn when(mut self, pattern: impl Into<String>, content: impl Into<String>) -> Self {
        self.rules
            .push((pattern.into(), ScriptedReply::Content(content.into())));
        self
    }

    /// Fail whenever `pattern` occurs in any request message.
    pub fn fail_when(mut self, pattern: impl Into<String>, message: impl Into<String>) -> Self {
        self.rules
            .push((pattern.into(), ScriptedReply::Error(message.into())));
        self
    }

    /// Answer with `content` once the queue is empty.
    pub fn with_fallback(mut self, content: impl Into<String>) -> Self {
        self.fallback = ScriptedReply::Content(content.into());
        self
    }

    /// Sleep this long before each answer.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Every request received, oldest first.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock(&self.requests).clone()
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        lock(&self.requests).last().cloned()
    }

    fn next_reply(&self, request: &CompletionRequest) -> ScriptedReply {
        let matched = self.rules.iter().find(|(pattern, _)| {
            request
                .messages
                .iter()
                .any(|m| m.content.contains(pattern.as_str()))
        });
        if let Some((_, reply)) = matched {
            return reply.clone();
        }
        lock(&self.queue)
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl LlmHandler for ScriptedLlm {
    async fn complete(&self, request: CompletionRequest) -> CadenceResult<CompletionResponse> {
        let reply = self.next_reply(&request);
        let model = request.model_config.model.clone();
        lock(&self.requests).push(request);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        reply.into_result(&model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{ChatMessage, ModelConfig};

    fn request(text: &str) -> CompletionRequest {
        CompletionRequest {
            messages: vec![ChatMessage::user(text)],
            model_config: ModelConfig::default(),
            expects_json_response: false,
        }
    }

    #[tokio::test]
    async fn test_replies_in_order_then_fallback() {
        let llm = ScriptedLlm::new()
            .with_replies(["one", "two"])
            .with_fallback("rest");

        assert_eq!(llm.complete(request("a")).await.unwrap().content, "one");
        assert_eq!(llm.complete(request("b")).await.unwrap().content, "two");
        assert_eq!(llm.complete(request("c")).await.unwrap().content, "rest");
        assert_eq!(llm.call_count(), 3);
    }

    #[tokio::test]
    async fn test_rules_take_priority() {
        let llm = ScriptedLlm::new()
            .with_replies(["queued"])
            .when("Summarize", "summary");

        assert_eq!(
            llm.complete(request("Summarize this")).await.unwrap().content,
            "summary"
        );
        assert_eq!(llm.complete(request("other")).await.unwrap().content, "queued");
    }

    #[tokio::test]
    async fn test_exhausted_script_is_an_llm_error() {
        let llm = ScriptedLlm::new();
        let err = llm.complete(request("anything")).await.unwrap_err();
        assert!(matches!(err, RuntimeError::Llm(_)));
        assert_eq!(llm.last_request().unwrap().messages[0].content, "anything");
    }
}
