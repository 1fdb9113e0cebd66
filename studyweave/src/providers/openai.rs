//! OpenAI chat model through rig.

use async_trait::async_trait;
use futures_util::StreamExt;
use rig::agent::MultiTurnStreamItem;
use rig::client::CompletionClient;
use rig::completion::{AssistantContent, CompletionModel};
use rig::message::Text;
use rig::providers::openai;
use rig::streaming::{StreamedAssistantContent, StreamingChat};

use super::{ChatModel, TokenStream};
use crate::error::ProviderError;
use crate::message::Message;

/// Chat model backed by the OpenAI API.
pub struct OpenAiChat {
    client: openai::Client,
    model: String,
    temperature: f64,
}

impl OpenAiChat {
    pub fn new(api_key: &str, model: &str, temperature: f64) -> Self {
        Self {
            client: openai::Client::new(api_key),
            model: model.to_string(),
            temperature,
        }
    }

    fn history_to_rig(history: &[Message]) -> Vec<rig::completion::Message> {
        history
            .iter()
            .filter_map(|message| {
                if message.has_role(Message::USER) {
                    Some(rig::completion::Message::user(message.content.clone()))
                } else if message.has_role(Message::ASSISTANT) {
                    Some(rig::completion::Message::assistant(message.content.clone()))
                } else {
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, ProviderError> {
        let model = self.client.completion_model(&self.model);
        let request = model
            .completion_request(rig::completion::Message::user(prompt.to_string()))
            .preamble(system.to_string())
            .temperature(self.temperature)
            .build();

        let response = model
            .completion(request)
            .await
            .map_err(|err| ProviderError::Request(err.to_string()))?;

        let text = response
            .choice
            .into_iter()
            .filter_map(|content| match content {
                AssistantContent::Text(Text { text }) => Some(text),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(ProviderError::Malformed(
                "completion contained no text".to_string(),
            ));
        }
        Ok(text)
    }

    async fn stream(
        &self,
        system: &str,
        history: &[Message],
        prompt: &str,
    ) -> Result<TokenStream, ProviderError> {
        let agent = self
            .client
            .agent(&self.model)
            .preamble(system)
            .temperature(self.temperature)
            .build();

        let upstream = agent
            .stream_chat(prompt.to_string(), Self::history_to_rig(history))
            .await;

        let deltas = upstream.filter_map(|item| async move {
            match item {
                Ok(MultiTurnStreamItem::StreamItem(StreamedAssistantContent::Text(Text {
                    text,
                }))) => Some(Ok(text)),
                Ok(MultiTurnStreamItem::FinalResponse(_)) => None,
                Ok(_) => None,
                Err(err) => Some(Err(ProviderError::Request(err.to_string()))),
            }
        });

        Ok(Box::pin(deltas))
    }
}
