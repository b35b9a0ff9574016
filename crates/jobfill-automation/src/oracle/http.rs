//! OpenAI-compatible chat-completions client.

use std::time::Duration;

use async_trait::async_trait;
use jobfill_config::OracleConfig;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use super::{AnalysisRequest, DecisionOracle, JobContext, PageDecision};
use crate::error::OracleError;
use crate::extract::{PageSnapshot, truncate_chars};

const PAGE_SYSTEM_PROMPT: &str = "You fill job application forms. Given a page description and an applicant \
profile, reply with JSON only: {\"platform\", \"is_form_page\", \"page_type\" (job_listing, form_page, \
review_page, confirmation, login, unknown), \"confidence\", \"autofill_commands\": [{\"action\", \"selector\", \
\"selector_type\", \"value\", \"field_name\", \"confidence\"}], \"apply_button\", \"next_button\", \
\"submit_button\" (each {\"selector\", \"selector_type\", \"text\"} or null), \"needs_navigation\", \
\"unmapped_fields\"}. Use only selectors that exist on the page.";

const JOB_SYSTEM_PROMPT: &str = "You extract job details from a job listing page. Reply with JSON only: \
{\"job_title\", \"company_name\", \"job_description\", \"location\", \"job_type\", \"salary_range\", \
\"requirements\", \"responsibilities\", \"qualifications\", \"apply_button_selector\"}.";

/// HTML budget inside a prompt.
const PROMPT_HTML_CHARS: usize = 20_000;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Decision oracle backed by an HTTP LLM endpoint.
pub struct HttpOracle {
    api_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl HttpOracle {
    pub fn new(config: &OracleConfig, timeout_secs: u64) -> Result<Self, OracleError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| OracleError::NotConfigured("oracle.api_key is not set".to_string()))?;
        Ok(Self {
            api_url: config.api_url.clone(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_secs,
            client: reqwest::Client::new(),
        })
    }

    async fn complete(&self, system: &str, user: String) -> Result<String, OracleError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: system.to_string() },
                ChatMessage { role: "user", content: user },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let send = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send();
        let response = tokio::time::timeout(Duration::from_secs(self.timeout_secs), send)
            .await
            .map_err(|_| OracleError::Timeout(self.timeout_secs))??;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(OracleError::Api { status, message });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Malformed(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| OracleError::Malformed("response has no message content".to_string()))?;
        debug!(model = %self.model, chars = content.len(), "Oracle replied");
        Ok(content)
    }

    fn page_prompt(request: &AnalysisRequest) -> String {
        let snapshot = &request.snapshot;
        let mut prompt = format!(
            "URL: {}\nTitle: {}\n\nInputs:\n{}\n\nButtons:\n{}\n\nProfile:\n{}\n\nHTML:\n{}",
            snapshot.url,
            snapshot.title,
            json!(snapshot.inputs),
            json!(snapshot.buttons),
            request.profile,
            truncate_chars(&snapshot.filtered_html, PROMPT_HTML_CHARS),
        );
        if let Some(hint) = &request.hint {
            prompt.push_str("\n\nNotes:\n");
            prompt.push_str(hint);
        }
        prompt
    }
}

#[async_trait]
impl DecisionOracle for HttpOracle {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<PageDecision, OracleError> {
        info!(
            url = %request.snapshot.url,
            inputs = request.snapshot.inputs.len(),
            buttons = request.snapshot.buttons.len(),
            "Analyzing page"
        );
        let content = self.complete(PAGE_SYSTEM_PROMPT, Self::page_prompt(request)).await?;
        let decision = PageDecision::parse(&content)?;
        info!(
            page_type = %decision.page_type,
            commands = decision.autofill_commands.len(),
            next = decision.has_next(),
            submit = decision.has_submit(),
            "Page analyzed"
        );
        Ok(decision)
    }

    async fn describe_job(&self, snapshot: &PageSnapshot) -> Result<JobContext, OracleError> {
        let buttons: Vec<String> = snapshot
            .buttons
            .iter()
            .take(20)
            .map(|b| format!("text='{}' data-automation-id='{}'", b.text, b.automation_id))
            .collect();
        let prompt = format!(
            "URL: {}\nTitle: {}\n\nButtons:\n{}\n\nHTML:\n{}",
            snapshot.url,
            snapshot.title,
            buttons.join("\n"),
            truncate_chars(&snapshot.filtered_html, PROMPT_HTML_CHARS),
        );
        let content = self.complete(JOB_SYSTEM_PROMPT, prompt).await?;
        JobContext::parse(&content)
    }
}
