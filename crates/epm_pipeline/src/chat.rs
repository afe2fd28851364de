use async_stream::stream;
use epm_core::Language;
use epm_inference::ChatOptions;
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::{debug, warn};

use crate::service::IntelligenceService;

/// The only chunk emitted when the chat backend cannot answer.
pub const OFFLINE_NOTICE: &str = "System: Intelligence Node overloaded or offline.";

pub fn analyst_instruction(language: Language) -> String {
    format!(
        "You are an expert financial analyst. Always answer in {}.",
        language.prompt_name()
    )
}

impl IntelligenceService {
    /// Streams the analyst's answer to `query` as text deltas.
    ///
    /// Each call opens a fresh conversation. Any failure ends the stream with
    /// [`OFFLINE_NOTICE`]; the stream itself never errors.
    pub fn ask_stream(&self, query: &str, language: Language) -> BoxStream<'static, String> {
        let model = self.handler.model().clone();
        let options = ChatOptions {
            model: self.config.chat_model.clone(),
            system_instruction: analyst_instruction(language),
        };
        let query = query.to_string();

        Box::pin(stream! {
            let mut session = match model.open_chat(&options).await {
                Ok(session) => session,
                Err(e) => {
                    warn!(error = %e, "Chat session could not be opened");
                    yield OFFLINE_NOTICE.to_string();
                    return;
                }
            };
            let mut deltas = match session.send_stream(&query).await {
                Ok(deltas) => deltas,
                Err(e) => {
                    warn!(error = %e, "Chat message failed");
                    yield OFFLINE_NOTICE.to_string();
                    return;
                }
            };
            while let Some(delta) = deltas.next().await {
                match delta {
                    Ok(text) => yield text,
                    Err(e) => {
                        warn!(error = %e, "Chat stream interrupted");
                        yield OFFLINE_NOTICE.to_string();
                        return;
                    }
                }
            }
            debug!("Chat stream finished");
        })
    }
}
