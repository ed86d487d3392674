//! FAQ assist — answers free-form questions that no intent rule matched.
//!
//! Supports:
//! - **Anthropic**: Direct API access via rig-core
//! - **OpenAI**: Direct API access via rig-core
//!
//! Every call is wrapped in a deadline; on timeout or failure the
//! dispatcher falls back to the static help menu, so a slow provider can
//! never wedge the conversation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use secrecy::ExposeSecret;
use tokio::time::timeout;
use tracing::warn;

use crate::error::FaqError;

/// System preamble for FAQ answers.
const FAQ_PREAMBLE: &str = "You are the assistant for a community group-buying \
co-op. Members pool orders over chat to get wholesale prices. Answer the \
member's question briefly and concretely. If you don't know, say so and \
suggest they send 'help' for the menu. Keep answers under 100 words.";

/// Answers a free-form member question.
#[async_trait]
pub trait FaqAssist: Send + Sync {
    async fn answer(&self, question: &str) -> Result<String, FaqError>;
}

/// Supported FAQ backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaqBackend {
    Anthropic,
    OpenAi,
}

/// Configuration for creating a FAQ assist.
#[derive(Debug, Clone)]
pub struct FaqConfig {
    pub backend: FaqBackend,
    pub api_key: secrecy::SecretString,
    pub model: String,
}

/// Create a FAQ assist from configuration.
pub fn create_assist(config: &FaqConfig) -> Result<Arc<dyn FaqAssist>, FaqError> {
    match config.backend {
        FaqBackend::Anthropic => {
            let client: rig::providers::anthropic::Client =
                rig::providers::anthropic::Client::new(config.api_key.expose_secret())
                .map_err(|e| {
                    FaqError::RequestFailed(format!("Failed to create Anthropic client: {e}"))
                })?;
            let agent = client
                .agent(&config.model)
                .preamble(FAQ_PREAMBLE)
                .build();
            tracing::info!("FAQ assist using Anthropic (model: {})", config.model);
            Ok(Arc::new(RigFaqAssist { agent }))
        }
        FaqBackend::OpenAi => {
            let client: rig::providers::openai::Client =
                rig::providers::openai::Client::new(config.api_key.expose_secret())
                .map_err(|e| {
                    FaqError::RequestFailed(format!("Failed to create OpenAI client: {e}"))
                })?;
            let agent = client
                .agent(&config.model)
                .preamble(FAQ_PREAMBLE)
                .build();
            tracing::info!("FAQ assist using OpenAI (model: {})", config.model);
            Ok(Arc::new(RigFaqAssist { agent }))
        }
    }
}

struct RigFaqAssist<M: rig::completion::CompletionModel> {
    agent: rig::agent::Agent<M>,
}

#[async_trait]
impl<M> FaqAssist for RigFaqAssist<M>
where
    M: rig::completion::CompletionModel + Send + Sync,
{
    async fn answer(&self, question: &str) -> Result<String, FaqError> {
        let text = self
            .agent
            .prompt(question)
            .await
            .map_err(|e| FaqError::RequestFailed(e.to_string()))?;
        if text.trim().is_empty() {
            return Err(FaqError::EmptyCompletion);
        }
        Ok(text)
    }
}

/// Ask with a deadline. `Err(FaqError::Timeout)` when the provider is too
/// slow; other errors pass through.
pub async fn answer_with_timeout(
    assist: &dyn FaqAssist,
    question: &str,
    deadline: Duration,
) -> Result<String, FaqError> {
    match timeout(deadline, assist.answer(question)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(timeout_secs = deadline.as_secs(), "FAQ assist timed out");
            Err(FaqError::Timeout { timeout: deadline })
        }
    }
}
