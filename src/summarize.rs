//! Topic clustering and summarization through the LLM gateway.
//!
//! The client sends every headline's index and title (never the summary or
//! link — clustering only needs titles, and this keeps the prompt bounded) to
//! an Azure-OpenAI-shaped deployment behind an authenticated gateway, with
//! deterministic sampling settings and a JSON response-format hint.
//!
//! Rate-limit rejections are retried with randomized exponential backoff;
//! every other failure class propagates immediately and fails the cycle.

use std::time::{Duration, Instant};

use itertools::Itertools;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::config::GatewayConfig;
use crate::error::{Error, Result};
use crate::models::{Headline, TokenUsage};
use crate::retry::{RetryPolicy, retry};

const SYSTEM_PROMPT: &str = "You are a helpful Traditional Chinese AI assistant that summarizes \
                             news headlines and responds only in JSON format.";
/// Fixed seed for deterministic-as-possible sampling.
const SEED: u32 = 2024;
const MAX_OUTPUT_TOKENS: u32 = 4096;

/// Supplies a short-lived bearer token for the gateway. Token management is a
/// collaborator concern; the summarization client only asks for the current
/// token before each request.
pub trait TokenProvider {
    async fn bearer_token(&self) -> Result<String>;
}

/// A fixed token, for gateways that accept a long-lived key.
pub struct StaticTokenProvider(pub String);

impl TokenProvider for StaticTokenProvider {
    async fn bearer_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// OAuth client-credentials exchange against the configured token endpoint.
pub struct ClientCredentialsTokenProvider {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl ClientCredentialsTokenProvider {
    pub fn new(gateway: &GatewayConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            token_url: gateway.token_url.clone(),
            client_id: gateway.client_id.clone(),
            client_secret: gateway.client_secret.clone(),
        })
    }
}

impl TokenProvider for ClientCredentialsTokenProvider {
    async fn bearer_token(&self) -> Result<String> {
        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
        }

        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Gateway {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.json::<TokenResponse>().await?.access_token)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: Vec<ChatMessage<'a>>,
    model: &'a str,
    temperature: f32,
    seed: u32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: Vec<TextBlock<'a>>,
}

#[derive(Serialize)]
struct TextBlock<'a> {
    #[serde(rename = "type")]
    block_type: &'a str,
    text: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    model: String,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: TokenUsage,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

/// Raw output of one summarization call, before enrichment.
#[derive(Debug)]
pub struct SummaryResponse {
    pub raw: String,
    pub model: String,
    pub usage: TokenUsage,
    pub duration_seconds: f64,
}

/// Build the clustering prompt: one `index: title` line per headline inside
/// the instruction block.
fn user_prompt(headlines: &[Headline]) -> String {
    let listing = headlines
        .iter()
        .enumerate()
        .map(|(idx, h)| format!("{idx}: {}", h.title))
        .join("\n");
    format!(
        r#"<新聞標題>
{listing}
</新聞標題>
以上新聞標題由不同來源發布，請找出五個最熱門的話題/關鍵字。
對於每個主題/關鍵字，請提供一個簡短的總結，並提供與之相關的新聞標題的索引。
請按以下JSON格式回答：
[
    "話題/關鍵字": {{
        "總結": "關於話題/關鍵字的簡短總結。",
        "標題索引": [0,2,3,...],
    }},
    "話題/關鍵字": {{
        "總結": "關於話題/關鍵字的簡短總結。",
        "標題索引": [5,10,11,...],
    }},
    …
]
"#
    )
}

fn chat_request<'a>(deployment: &'a str, prompt: &'a str) -> ChatRequest<'a> {
    ChatRequest {
        messages: vec![
            ChatMessage {
                role: "system",
                content: vec![TextBlock {
                    block_type: "text",
                    text: SYSTEM_PROMPT,
                }],
            },
            ChatMessage {
                role: "user",
                content: vec![TextBlock {
                    block_type: "text",
                    text: prompt,
                }],
            },
        ],
        model: deployment,
        temperature: 0.0,
        seed: SEED,
        max_tokens: MAX_OUTPUT_TOKENS,
        response_format: ResponseFormat {
            format_type: "json_object",
        },
    }
}

/// Client for the chat-completions deployment behind the gateway.
pub struct SummarizationClient<P: TokenProvider> {
    http: reqwest::Client,
    gateway: GatewayConfig,
    tokens: P,
}

impl<P: TokenProvider> SummarizationClient<P> {
    pub fn new(gateway: GatewayConfig, tokens: P) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            http,
            gateway,
            tokens,
        })
    }

    /// Ask the model for the five most prominent topics across `headlines`.
    ///
    /// Rate limits are retried up to 6 attempts with randomized exponential
    /// backoff between 1 and 60 seconds; the final rate-limit failure is
    /// re-raised, and any other failure class propagates immediately.
    #[instrument(level = "info", skip_all, fields(headlines = headlines.len()))]
    pub async fn summarize(&self, headlines: &[Headline]) -> Result<SummaryResponse> {
        let prompt = user_prompt(headlines);
        let policy = RetryPolicy::rate_limit();
        let started = Instant::now();
        let completion = retry(
            &policy,
            |e| matches!(e, Error::RateLimit(_)),
            || self.request_completion(&prompt),
        )
        .await?;
        let duration_seconds = started.elapsed().as_secs_f64();

        let raw = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::Format("completion contained no message content".to_string()))?;

        info!(
            model = %completion.model,
            duration_secs = duration_seconds,
            total_tokens = completion.usage.total_tokens,
            "summarization completed"
        );
        Ok(SummaryResponse {
            raw,
            model: completion.model,
            usage: completion.usage,
            duration_seconds,
        })
    }

    async fn request_completion(&self, prompt: &str) -> Result<ChatCompletion> {
        let token = self.tokens.bearer_token().await?;
        let url = format!(
            "{}/openai/deployments/{}/chat/completions",
            self.gateway.url.trim_end_matches('/'),
            self.gateway.deployment
        );
        let response = self
            .http
            .post(&url)
            .query(&[("api-version", self.gateway.api_version.as_str())])
            .bearer_auth(&token)
            .json(&chat_request(&self.gateway.deployment, prompt))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimit(response.text().await.unwrap_or_default()));
        }
        if !status.is_success() {
            return Err(Error::Gateway {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headline(title: &str) -> Headline {
        Headline {
            publisher: "HK Daily".to_string(),
            time: "08:00".to_string(),
            title: title.to_string(),
            summary: "teaser".to_string(),
            link: "https://hk.news.yahoo.com/a.html".to_string(),
        }
    }

    #[test]
    fn test_user_prompt_lists_indexed_titles_only() {
        let prompt = user_prompt(&[headline("颱風襲港"), headline("財政預算案")]);
        assert!(prompt.contains("0: 颱風襲港"));
        assert!(prompt.contains("1: 財政預算案"));
        assert!(prompt.starts_with("<新聞標題>"));
        assert!(prompt.contains("五個最熱門的話題"));
        // Summaries and links never reach the model.
        assert!(!prompt.contains("teaser"));
        assert!(!prompt.contains("yahoo.com"));
    }

    #[test]
    fn test_chat_request_wire_shape() {
        let request = chat_request("gpt-4o-deploy-gs", "prompt text");
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "gpt-4o-deploy-gs");
        assert_eq!(value["temperature"], 0.0);
        assert_eq!(value["seed"], 2024);
        assert_eq!(value["max_tokens"], 4096);
        assert_eq!(value["response_format"]["type"], "json_object");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["role"], "user");
        assert_eq!(value["messages"][1]["content"][0]["type"], "text");
        assert_eq!(value["messages"][1]["content"][0]["text"], "prompt text");
    }

    #[test]
    fn test_completion_parses_usage_and_content() {
        let body = r#"{
            "model": "gpt-4o-2024-05-13",
            "choices": [{"message": {"role": "assistant", "content": "{\"話題\": {}}"}}],
            "usage": {"prompt_tokens": 900, "completion_tokens": 120, "total_tokens": 1020}
        }"#;
        let completion: ChatCompletion = serde_json::from_str(body).unwrap();
        assert_eq!(completion.model, "gpt-4o-2024-05-13");
        assert_eq!(completion.usage.total_tokens, 1020);
        assert_eq!(
            completion.choices[0].message.content.as_deref(),
            Some("{\"話題\": {}}")
        );
    }

    #[tokio::test]
    async fn test_static_token_provider() {
        let provider = StaticTokenProvider("sekret".to_string());
        assert_eq!(provider.bearer_token().await.unwrap(), "sekret");
    }
}
