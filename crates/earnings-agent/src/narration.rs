//! Language-model explanations for revenue/profit divergence
//!
//! Narration is optional. Callers treat any error from a [`Narrator`] as
//! "explanation unavailable" and carry on with the rest of the report. The
//! same seam answers questions about an earnings document.

use crate::config::AgentConfig;
use crate::document::QUESTION_CONTEXT_CHARS;
use crate::error::{EarningsError, Result};
use async_trait::async_trait;
use earnings_core::{AnomalyKind, DeltaResult};
use minijinja::{Environment, context};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Shown in place of an explanation when narration fails
pub const EXPLANATION_UNAVAILABLE: &str = "explanation unavailable";

/// Longest context excerpt passed to the model, in characters
const MAX_CONTEXT_CHARS: usize = 1500;

const PROMPT_TEMPLATE: &str = "\
You are a financial analyst. Analyze this company's quarterly results.

SITUATION:
- Revenue changed by {{ revenue_change_pct }}%
- Profit changed by {{ profit_change_pct }}%
- Pattern: {{ anomaly_kind }}
{% if context_text %}
CONTEXT:
{{ context_text }}
{% endif %}
TASK: Explain in 2-3 sentences WHY profit didn't follow revenue. Look for:
- Cost increases (raw materials, labor)
- One-time expenses or write-offs
- Tax changes or provisions
- Operational inefficiencies

Keep it concise and specific.";

const QUESTION_TEMPLATE: &str = "\
Based on this earnings report excerpt, answer the question concisely.

REPORT EXCERPT:
{{ excerpt }}

QUESTION: {{ question }}

ANSWER (2-3 sentences max):";

/// What the model is asked to explain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrationRequest {
    pub revenue_change_pct: f64,
    pub profit_change_pct: f64,
    pub anomaly_kind: AnomalyKind,
    pub context_text: String,
}

impl NarrationRequest {
    pub fn from_delta(delta: &DeltaResult, context_text: impl Into<String>) -> Self {
        Self {
            revenue_change_pct: delta.revenue_change_pct,
            profit_change_pct: delta.profit_change_pct,
            anomaly_kind: delta.anomaly_kind,
            context_text: context_text.into(),
        }
    }

    /// Render the chat prompt
    pub fn render_prompt(&self) -> Result<String> {
        let excerpt: String = self.context_text.chars().take(MAX_CONTEXT_CHARS).collect();
        Environment::new()
            .render_str(
                PROMPT_TEMPLATE,
                context! {
                    revenue_change_pct => self.revenue_change_pct,
                    profit_change_pct => self.profit_change_pct,
                    anomaly_kind => self.anomaly_kind.to_string(),
                    context_text => excerpt.trim(),
                },
            )
            .map_err(|e| EarningsError::NarrationError(format!("prompt rendering failed: {e}")))
    }
}

/// A question about an earnings document and the text to answer it from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRequest {
    pub question: String,
    pub excerpt: String,
}

impl QuestionRequest {
    pub fn new(question: impl Into<String>, document_text: &str) -> Self {
        Self {
            question: question.into(),
            excerpt: document_text.chars().take(QUESTION_CONTEXT_CHARS).collect(),
        }
    }

    pub fn render_prompt(&self) -> Result<String> {
        Environment::new()
            .render_str(
                QUESTION_TEMPLATE,
                context! {
                    excerpt => self.excerpt.trim(),
                    question => self.question.trim(),
                },
            )
            .map_err(|e| EarningsError::NarrationError(format!("prompt rendering failed: {e}")))
    }
}

/// Produces free-text explanations of a delta and answers about a document
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Narrator: Send + Sync {
    async fn explain(&self, request: &NarrationRequest) -> Result<String>;

    async fn answer(&self, request: &QuestionRequest) -> Result<String>;

    fn name(&self) -> &'static str;
}

/// Narrator backed by an OpenAI-compatible chat-completions endpoint
pub struct OpenAiNarrator {
    client: Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiNarrator {
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            api_base: config.llm_api_base.trim_end_matches('/').to_string(),
            api_key: config.llm_api_key.clone(),
            model: config.llm_model.clone(),
            max_tokens: config.llm_max_tokens,
            temperature: config.llm_temperature,
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

fn map_status(status: reqwest::StatusCode, body: &str, model: &str) -> EarningsError {
    match status.as_u16() {
        401 => EarningsError::NarrationError("authentication failed".to_string()),
        429 => EarningsError::RateLimitExceeded {
            provider: "language model".to_string(),
        },
        404 => EarningsError::NarrationError(format!("model not found: {model}")),
        _ => EarningsError::NarrationError(format!("HTTP {status}: {body}")),
    }
}

fn first_choice_text(response: ChatResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or_else(|| EarningsError::NarrationError("empty completion".to_string()))
}

impl OpenAiNarrator {
    /// Send one user prompt and return the first completion
    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let mut http = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .json(&body);
        if let Some(key) = &self.api_key {
            http = http.bearer_auth(key);
        }

        let response = http.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(map_status(status, &text, &self.model));
        }

        let parsed: ChatResponse = response.json().await?;
        first_choice_text(parsed)
    }
}

#[async_trait]
impl Narrator for OpenAiNarrator {
    #[instrument(skip(self, request), fields(model = %self.model, api_base = %self.api_base))]
    async fn explain(&self, request: &NarrationRequest) -> Result<String> {
        let prompt = request.render_prompt()?;
        debug!("Sending narration request");
        self.complete(&prompt).await
    }

    #[instrument(skip(self, request), fields(model = %self.model))]
    async fn answer(&self, request: &QuestionRequest) -> Result<String> {
        let prompt = request.render_prompt()?;
        debug!(question = %request.question, "Sending document question");
        self.complete(&prompt).await
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
