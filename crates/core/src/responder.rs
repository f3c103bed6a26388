//! Live Response Providers
//!
//! A responder produces the agent's reply for a conversational turn in place
//! of the fixed templates. It is optional: a session without one speaks the
//! canned lines, and a session whose responder fails speaks a fallback line.

use anyhow::{Context, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;

/// Persona prompt sent with every live request.
pub const SYSTEM_PROMPT: &str = "You are J.A.R.V.I.S. (Just A Rather Very Intelligent System), Tony Stark's AI assistant.

Personality traits:
- Speak with a refined British accent and formal tone
- Be witty, intelligent, and occasionally sarcastic
- Address the user as \"sir\" or \"ma'am\"
- Be helpful, efficient, and professional
- Keep responses concise but informative (2-3 sentences max for casual queries)
- For technical questions, be more detailed but still succinct

You are displayed in a 3D holographic interface. When users ask you to build, create, generate, or write code, acknowledge that you're initiating code generation protocols.";

/// Defines the contract for anything that can answer a user's message.
///
/// Errors are reported through `anyhow`; the session converts any failure
/// into its fallback line, so implementations need not retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Responder: Send + Sync {
    /// Produces the full reply text for `user_text`.
    async fn fetch_response(&self, user_text: &str) -> Result<String>;
}

/// A `Responder` backed by any OpenAI-compatible chat completion API.
pub struct OpenAIResponder {
    client: Client<OpenAIConfig>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAIResponder {
    /// Creates a responder for `model`.
    ///
    /// # Arguments
    ///
    /// * `config` - API key and base URL for the chat completion endpoint.
    /// * `model` - Model identifier (e.g., "gpt-4o-mini").
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
            max_tokens: 150,
            temperature: 0.8,
        }
    }
}

#[async_trait]
impl Responder for OpenAIResponder {
    async fn fetch_response(&self, user_text: &str) -> Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .max_completion_tokens(self.max_tokens)
            .temperature(self.temperature)
            .messages(vec![
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(SYSTEM_PROMPT)
                    .build()?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user_text)
                    .build()?
                    .into(),
            ])
            .build()?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .context("Chat completion request failed")?;

        let answer = response
            .choices
            .first()
            .context("No response choice from LLM")?
            .message
            .content
            .as_ref()
            .context("No content in LLM response")?
            .trim()
            .to_string();

        if answer.is_empty() {
            anyhow::bail!("LLM returned an empty response");
        }
        Ok(answer)
    }
}
