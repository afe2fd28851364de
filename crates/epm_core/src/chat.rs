use serde::{Deserialize, Serialize};

use crate::now_millis;

pub const SELF_SENDER_ID: &str = "me";
pub const ASSISTANT_SENDER_ID: &str = "ai";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub text: String,
    pub timestamp: i64,
    #[serde(default)]
    pub is_ai: bool,
}

/// Ordered transcript of one chat session. Messages are only ever appended;
/// the newest assistant message may grow while its reply streams in.
#[derive(Debug, Clone, Default)]
pub struct ChatTranscript {
    messages: Vec<ChatMessage>,
    user_name: String,
    assistant_name: String,
}

impl ChatTranscript {
    pub fn new(user_name: impl Into<String>, assistant_name: impl Into<String>) -> Self {
        Self {
            messages: Vec::new(),
            user_name: user_name.into(),
            assistant_name: assistant_name.into(),
        }
    }

    pub fn push_user(&mut self, text: impl Into<String>) -> &ChatMessage {
        let message = self.message(SELF_SENDER_ID, false, text.into());
        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }

    /// Opens an empty assistant message that deltas are appended to.
    pub fn begin_assistant(&mut self) -> &ChatMessage {
        let message = self.message(ASSISTANT_SENDER_ID, true, String::new());
        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }

    /// Appends a streamed delta to the newest message if it belongs to the
    /// assistant, otherwise opens a new assistant message first.
    pub fn append_to_last_assistant(&mut self, delta: &str) {
        match self.messages.last_mut() {
            Some(last) if last.is_ai => last.text.push_str(delta),
            _ => {
                let message = self.message(ASSISTANT_SENDER_ID, true, delta.to_string());
                self.messages.push(message);
            }
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn message(&self, sender_id: &str, is_ai: bool, text: String) -> ChatMessage {
        let sender_name = if is_ai { &self.assistant_name } else { &self.user_name };
        ChatMessage {
            id: uuid::Uuid::new_v4().to_string(),
            sender_id: sender_id.to_string(),
            sender_name: sender_name.clone(),
            text,
            timestamp: now_millis(),
            is_ai,
        }
    }
}
