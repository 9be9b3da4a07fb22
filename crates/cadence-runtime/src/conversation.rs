//! Conversation Engine
//!
//! An append-only turn log plus a state machine:
//!
//! ```text
//! initiated -> working -> [reflecting | adapting]* -> concluding -> completed
//!        \________ any non-terminal state ________/ -> error
//! ```
//!
//! `conclude` always leaves a final response and a final assistant turn, even
//! when summarization fails.

use cadence_core::{
    AgentConfig, CadenceResult, ChatMessage, ChatRole, CompletionRequest, LlmHandler,
    RuntimeError,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::guard::CallGuard;

/// Final response used when the summary cannot be produced.
pub const FALLBACK_RESPONSE: &str =
    "I was unable to produce a summary of this task. Please review the step results.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    Initiated,
    Working,
    Reflecting,
    Adapting,
    Concluding,
    Completed,
    Error,
}

impl ConversationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConversationState::Completed | ConversationState::Error)
    }

    pub fn can_transition_to(&self, next: ConversationState) -> bool {
        use ConversationState::*;
        match (self, next) {
            (Completed | Error, _) => false,
            (_, Error) => true,
            (Initiated, Working) => true,
            (Working, Reflecting | Adapting | Concluding) => true,
            (Reflecting, Working | Adapting | Concluding) => true,
            (Adapting, Working | Concluding) => true,
            (Concluding, Completed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConversationState::Initiated => "initiated",
            ConversationState::Working => "working",
            ConversationState::Reflecting => "reflecting",
            ConversationState::Adapting => "adapting",
            ConversationState::Concluding => "concluding",
            ConversationState::Completed => "completed",
            ConversationState::Error => "error",
        };
        write!(f, "{}", name)
    }
}

/// One immutable entry in the turn log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Value,
}

/// Turn log and state of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    id: String,
    original_task: String,
    turns: Vec<Turn>,
    state: ConversationState,
    final_response: Option<String>,
}

impl Conversation {
    fn new(id: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            original_task: task.into(),
            turns: Vec::new(),
            state: ConversationState::Initiated,
            final_response: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn original_task(&self) -> &str {
        &self.original_task
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    pub fn final_response(&self) -> Option<&str> {
        self.final_response.as_deref()
    }

    /// Append a turn.
    pub fn record_turn(&mut self, role: ChatRole, content: impl Into<String>, metadata: Value) {
        self.turns.push(Turn {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            metadata,
        });
    }

    /// Move to `next`, or fail leaving the state unchanged.
    pub fn transition(&mut self, next: ConversationState) -> CadenceResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(RuntimeError::Conversation(format!(
                "invalid transition from {} to {}",
                self.state, next
            )));
        }
        debug!(conversation.id = %self.id, from = %self.state, to = %next, "Conversation transition");
        self.state = next;
        Ok(())
    }

    /// Plain-text transcript, one `role: content` line per turn.
    pub fn transcript(&self) -> String {
        self.turns
            .iter()
            .map(|turn| {
                let role = match turn.role {
                    ChatRole::System => "system",
                    ChatRole::User => "user",
                    ChatRole::Assistant => "assistant",
                };
                format!("{}: {}", role, turn.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Opens and closes conversations.
#[derive(Clone)]
pub struct ConversationEngine {
    llm: Arc<dyn LlmHandler>,
}

impl std::fmt::Debug for ConversationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationEngine").finish_non_exhaustive()
    }
}

impl ConversationEngine {
    pub fn new(llm: Arc<dyn LlmHandler>) -> Self {
        Self { llm }
    }

    /// Open a conversation: the user's task, then an acknowledgement.
    pub fn initiate(&self, id: impl Into<String>, task: &str, agent: &AgentConfig) -> Conversation {
        let mut conversation = Conversation::new(id, task);
        conversation.record_turn(ChatRole::User, task, json!({}));
        conversation.record_turn(
            ChatRole::Assistant,
            format!("{} is working on your request.", agent.name),
            json!({"acknowledgement": true}),
        );
        conversation
    }

    /// Summarize the transcript into the final response.
    ///
    /// Ends `completed` only if both the run and the summary succeeded,
    /// otherwise `error`. Returns whether the summary came from the model.
    pub async fn conclude(
        &self,
        conversation: &mut Conversation,
        agent: &AgentConfig,
        run_succeeded: bool,
        guard: &CallGuard,
    ) -> bool {
        if conversation.state.is_terminal() {
            return false;
        }
        // Every non-terminal state except Initiated may conclude
        if conversation.transition(ConversationState::Concluding).is_err() {
            conversation.state = ConversationState::Concluding;
        }

        let request = CompletionRequest {
            messages: vec![
                ChatMessage::system(
                    "Summarize the following conversation into a concise final response \
                     for the user. Mention any step that failed.",
                ),
                ChatMessage::user(conversation.transcript()),
            ],
            model_config: agent.model.clone(),
            expects_json_response: false,
        };

        let summary = guard
            .run_result("conversation summary", self.llm.complete(request))
            .await
            .and_then(|response| {
                let content = response.content.trim().to_string();
                if content.is_empty() {
                    Err(RuntimeError::Llm("empty summary".to_string()))
                } else {
                    Ok(content)
                }
            });

        let (response, summarized) = match summary {
            Ok(content) => (content, true),
            Err(e) => {
                warn!(conversation.id = %conversation.id, error = %e, "Summarization failed");
                (FALLBACK_RESPONSE.to_string(), false)
            }
        };

        conversation.record_turn(
            ChatRole::Assistant,
            response.clone(),
            json!({"final": true, "fallback": !summarized}),
        );
        conversation.final_response = Some(response);
        conversation.state = if run_succeeded && summarized {
            ConversationState::Completed
        } else {
            ConversationState::Error
        };
        summarized
    }
}
