//! Text generation for chat replies.
//!
//! Replies come from an OpenAI-compatible chat-completions endpoint. Any failure is masked by
//! a canned reply chosen by failure kind so a borrower never sees a transport error.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::domain::AgentType;
use crate::config::AssistantConfig;

const MAX_TOKENS: u32 = 500;

/// Role-specific system instruction for each agent.
pub const fn system_instruction(agent: AgentType) -> &'static str {
    match agent {
        AgentType::Master => "You are a helpful NBFC loan assistant. Guide users through the personal loan process. Be professional, friendly, and concise. Ask for information step by step.",
        AgentType::Negotiation => "You are a loan negotiation specialist. Help users understand loan terms and amounts. Be helpful in explaining loan options.",
        AgentType::Kyc => "You are a KYC verification agent. Guide users through document upload and verification. Explain what documents are needed and verify extracted information.",
        AgentType::Underwriting => "You are an underwriting agent. Evaluate loan applications based on credit score, income, and risk factors. Provide clear explanations of decisions.",
        AgentType::Sanction => "You are a sanction agent. Congratulate approved applicants and explain next steps for loan disbursement.",
        AgentType::Compliance => "You are a compliance agent. Ensure all regulatory requirements are met and maintain audit trails.",
    }
}

/// A single generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub agent: AgentType,
    pub instruction: String,
    pub context: Option<String>,
}

impl Prompt {
    pub fn new(agent: AgentType, instruction: impl Into<String>) -> Self {
        Self {
            agent,
            instruction: instruction.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// System message sent upstream: the agent instruction plus optional context.
    pub fn system_message(&self) -> String {
        let base = system_instruction(self.agent);
        match self.context.as_deref() {
            Some(context) if !context.is_empty() => format!("{base}\n\nContext: {context}"),
            _ => base.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssistantError {
    #[error("assistant credentials are not configured")]
    MissingCredentials,
    #[error("assistant returned status {0}")]
    Status(u16),
    #[error("assistant returned an empty completion")]
    EmptyCompletion,
    #[error("assistant transport failed: {0}")]
    Transport(String),
}

impl AssistantError {
    /// Canned reply used in place of generated text.
    pub const fn fallback_reply(&self) -> &'static str {
        match self {
            AssistantError::MissingCredentials => {
                "I'm processing your request. How can I help you further?"
            }
            AssistantError::Status(_) => {
                "I'm here to help with your loan application. What would you like to know?"
            }
            AssistantError::EmptyCompletion => "How can I assist you?",
            AssistantError::Transport(_) => "I'm ready to help with your loan application.",
        }
    }
}

#[async_trait]
pub trait Assistant: Send + Sync {
    async fn generate(&self, prompt: &Prompt) -> Result<String, AssistantError>;
}

/// Generate a reply, substituting the fallback text when generation fails.
pub async fn reply_or_fallback<A>(assistant: &A, prompt: &Prompt) -> String
where
    A: Assistant + ?Sized,
{
    match assistant.generate(prompt).await {
        Ok(reply) => reply,
        Err(err) => {
            tracing::warn!(agent = prompt.agent.label(), error = %err, "assistant fallback reply");
            err.fallback_reply().to_string()
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: Option<CompletionMessage>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

/// `reqwest` client for an OpenAI-compatible `/v1/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct ChatCompletionsAssistant {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl ChatCompletionsAssistant {
    pub fn from_config(config: &AssistantConfig) -> Result<Self, AssistantError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| AssistantError::Transport(err.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone().filter(|key| !key.trim().is_empty()),
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }
}

#[async_trait]
impl Assistant for ChatCompletionsAssistant {
    async fn generate(&self, prompt: &Prompt) -> Result<String, AssistantError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(AssistantError::MissingCredentials)?;

        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": prompt.system_message() },
                { "role": "user", "content": prompt.instruction },
            ],
            "max_tokens": MAX_TOKENS,
        });

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| AssistantError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AssistantError::Status(status.as_u16()));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|err| AssistantError::Transport(err.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(AssistantError::EmptyCompletion)
    }
}
