use async_trait::async_trait;
use epm_core::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use super::{ChatOptions, ChatSession, GenerationRequest, GenerationResponse, GenerativeModel, TextStream};

#[derive(Debug, Clone)]
enum Scripted {
    Reply(String),
    Fail(String),
}

#[derive(Debug, Clone)]
enum ChatScript {
    Chunks(Vec<String>),
    FailOnOpen,
    FailOnSend,
    FailAfter(Vec<String>),
}

/// Scripted stand-in for a real backend.
///
/// Replies are configured per model id, with an optional reply for any other
/// model. Anything not scripted fails, so `DummyModel::new()` behaves like a
/// total outage. Every generation call is recorded.
pub struct DummyModel {
    replies: HashMap<String, Scripted>,
    any_model: Option<Scripted>,
    chat: ChatScript,
    calls: Mutex<Vec<GenerationRequest>>,
}

impl fmt::Debug for DummyModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DummyModel")
            .field("scripted_models", &self.replies.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for DummyModel {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyModel {
    pub fn new() -> Self {
        Self {
            replies: HashMap::new(),
            any_model: None,
            chat: ChatScript::FailOnOpen,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn reply(mut self, model: &str, text: impl Into<String>) -> Self {
        self.replies.insert(model.to_string(), Scripted::Reply(text.into()));
        self
    }

    pub fn fail(mut self, model: &str) -> Self {
        self.replies
            .insert(model.to_string(), Scripted::Fail(format!("{} unavailable", model)));
        self
    }

    /// Reply used for every model without its own script.
    pub fn reply_any(mut self, text: impl Into<String>) -> Self {
        self.any_model = Some(Scripted::Reply(text.into()));
        self
    }

    pub fn chat_chunks<I, S>(mut self, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.chat = ChatScript::Chunks(chunks.into_iter().map(Into::into).collect());
        self
    }

    pub fn chat_fails_on_open(mut self) -> Self {
        self.chat = ChatScript::FailOnOpen;
        self
    }

    pub fn chat_fails_on_send(mut self) -> Self {
        self.chat = ChatScript::FailOnSend;
        self
    }

    /// Streams `chunks`, then errors.
    pub fn chat_fails_after<I, S>(mut self, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.chat = ChatScript::FailAfter(chunks.into_iter().map(Into::into).collect());
        self
    }

    /// Model ids requested so far, in call order.
    pub fn called_models(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.iter().map(|c| c.model.clone()).collect())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<GenerationRequest> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl GenerativeModel for DummyModel {
    fn name(&self) -> &str {
        "Dummy"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.clone());
        }
        match self.replies.get(&request.model).or(self.any_model.as_ref()) {
            Some(Scripted::Reply(text)) => Ok(GenerationResponse { text: text.clone() }),
            Some(Scripted::Fail(reason)) => Err(Error::Inference(reason.clone())),
            None => Err(Error::Inference(format!("No scripted reply for {}", request.model))),
        }
    }

    async fn open_chat(&self, _options: &ChatOptions) -> Result<Box<dyn ChatSession>> {
        match &self.chat {
            ChatScript::FailOnOpen => Err(Error::Inference("Chat unavailable".to_string())),
            script => Ok(Box::new(DummyChatSession {
                script: script.clone(),
            })),
        }
    }
}

struct DummyChatSession {
    script: ChatScript,
}

#[async_trait]
impl ChatSession for DummyChatSession {
    async fn send_stream(&mut self, _message: &str) -> Result<TextStream> {
        let items: Vec<Result<String>> = match &self.script {
            ChatScript::Chunks(chunks) => chunks.iter().cloned().map(Ok).collect(),
            ChatScript::FailAfter(chunks) => chunks
                .iter()
                .cloned()
                .map(Ok)
                .chain(std::iter::once(Err(Error::Inference("Stream interrupted".to_string()))))
                .collect(),
            ChatScript::FailOnSend | ChatScript::FailOnOpen => {
                return Err(Error::Inference("Chat send failed".to_string()))
            }
        };
        Ok(Box::pin(futures_util::stream::iter(items)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GenerationOptions;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_dummy_model() {
        let model = DummyModel::new()
            .reply("primary", "{\"ok\":true}")
            .fail("secondary");

        let ok = model
            .generate(&GenerationRequest::new("primary", "p", GenerationOptions::json()))
            .await
            .unwrap();
        assert_eq!(ok.text, "{\"ok\":true}");

        assert!(model
            .generate(&GenerationRequest::new("secondary", "p", GenerationOptions::json()))
            .await
            .is_err());
        assert!(model
            .generate(&GenerationRequest::new("unknown", "p", GenerationOptions::json()))
            .await
            .is_err());
        assert_eq!(model.called_models(), vec!["primary", "secondary", "unknown"]);
    }

    #[tokio::test]
    async fn test_reply_any() {
        let model = DummyModel::new().reply_any("x").fail("down");
        let request = GenerationRequest::new("whatever", "p", GenerationOptions::default());
        assert_eq!(model.generate(&request).await.unwrap().text, "x");
        let request = GenerationRequest::new("down", "p", GenerationOptions::default());
        assert!(model.generate(&request).await.is_err());
    }

    #[tokio::test]
    async fn test_dummy_chat() {
        let options = ChatOptions {
            model: "m".to_string(),
            system_instruction: "s".to_string(),
        };
        assert!(DummyModel::new().open_chat(&options).await.is_err());

        let model = DummyModel::new().chat_chunks(["a", "b"]);
        let mut session = model.open_chat(&options).await.unwrap();
        let chunks: Vec<String> = session
            .send_stream("hi")
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;
        assert_eq!(chunks, vec!["a", "b"]);

        let model = DummyModel::new().chat_fails_after(["a"]);
        let mut session = model.open_chat(&options).await.unwrap();
        let items: Vec<Result<String>> = session.send_stream("hi").await.unwrap().collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[1].is_err());
    }
}
