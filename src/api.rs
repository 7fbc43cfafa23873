use anyhow::Result;
use reqwest::{Client, ClientBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::Config;

// OpenRouter chat-completions response
#[derive(Debug, Deserialize)]
pub struct OpenRouterResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: Message,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct OpenRouterRequest {
    pub model: String,
    pub messages: Vec<RequestMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Serialize)]
pub struct RequestMessage {
    pub role: String,
    pub content: String,
}

impl OpenRouterRequest {
    pub fn user_prompt(model: &str, prompt: String, max_tokens: u32, temperature: f32) -> Self {
        OpenRouterRequest {
            model: model.to_string(),
            messages: vec![RequestMessage {
                role: "user".to_string(),
                content: prompt,
            }],
            max_tokens,
            temperature,
        }
    }
}

impl OpenRouterResponse {
    pub fn first_content(&self) -> Result<&str> {
        self.choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| anyhow::anyhow!("API response contained no choices"))
    }
}

pub struct ApiClient {
    client: Client,
    config: Config,
}

impl ApiClient {
    pub fn new(config: Config) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.processing.request_timeout_seconds))
            .build()?;

        Ok(ApiClient { client, config })
    }

    // POST with bounded retries and linear back-off
    pub async fn make_request_with_retry(
        &self,
        request: &OpenRouterRequest,
    ) -> Result<OpenRouterResponse> {
        if self.config.api.openrouter_key.trim().is_empty() {
            anyhow::bail!("no API key configured; set api.openrouter_key or OPENROUTER_API_KEY");
        }

        let max_retries = self.config.processing.max_retries;
        let mut last_error = None;

        for attempt in 0..=max_retries {
            if attempt > 0 {
                let delay = retry_delay(self.config.processing.request_delay_ms, attempt);
                info!("retry {}/{} after {:?}", attempt, max_retries, delay);
                sleep(delay).await;
            }

            match self.client
                .post(&self.config.api.base_url)
                .header("Authorization", format!("Bearer {}", self.config.api.openrouter_key))
                .header("Content-Type", "application/json")
                .json(request)
                .send()
                .await
            {
                Ok(response) => {
                    if response.status().is_success() {
                        match response.json::<OpenRouterResponse>().await {
                            Ok(api_response) => {
                                if attempt > 0 {
                                    info!("request succeeded after {} retries", attempt);
                                }
                                return Ok(api_response);
                            }
                            Err(e) => {
                                let error_msg = format!("failed to decode response JSON: {}", e);
                                warn!(attempt = attempt + 1, "{}", error_msg);
                                last_error = Some(anyhow::anyhow!(error_msg));
                            }
                        }
                    } else {
                        let status = response.status();
                        let error_msg = match response.text().await {
                            Ok(error_text) => {
                                format!("API request failed (status {}): {}", status, error_text)
                            }
                            Err(e) => {
                                format!("API request failed (status {}), body unreadable: {}", status, e)
                            }
                        };
                        warn!(attempt = attempt + 1, "{}", error_msg);
                        last_error = Some(anyhow::anyhow!(error_msg));
                    }
                }
                Err(e) => {
                    let error_msg = format!("network request failed: {}", e);
                    warn!(attempt = attempt + 1, "{}", error_msg);
                    last_error = Some(anyhow::anyhow!(error_msg));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("all retries failed")))
    }
}

fn retry_delay(base_ms: u64, attempt: u32) -> Duration {
    Duration::from_millis(base_ms * (attempt as u64 + 1))
}

/// Cuts the JSON object out of a model reply that may wrap it in prose or
/// code fences.
pub fn extract_json(content: &str) -> &str {
    let json_start = content.find('{').unwrap_or(0);
    let json_end = content.rfind('}').map(|i| i + 1).unwrap_or(content.len());
    if json_start >= json_end {
        return content;
    }
    &content[json_start..json_end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_strips_fences() {
        let reply = "Here you go:\n```json\n{\"overallScore\": 6.5}\n```\nGood luck!";
        assert_eq!(extract_json(reply), "{\"overallScore\": 6.5}");
    }

    #[test]
    fn test_extract_json_without_braces_returns_input() {
        assert_eq!(extract_json("no json here"), "no json here");
        assert_eq!(extract_json("} backwards {"), "} backwards {");
    }

    #[test]
    fn test_retry_delay_grows_linearly() {
        assert_eq!(retry_delay(100, 1), Duration::from_millis(200));
        assert_eq!(retry_delay(100, 3), Duration::from_millis(400));
    }

    #[test]
    fn test_request_shape() {
        let request = OpenRouterRequest::user_prompt("m", "hi".to_string(), 10, 0.2);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "m");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hi");
    }

    #[tokio::test]
    async fn test_missing_key_fails_fast() {
        let client = ApiClient::new(Config::default()).unwrap();
        let request = OpenRouterRequest::user_prompt("m", "hi".to_string(), 10, 0.2);
        let err = client.make_request_with_retry(&request).await.unwrap_err();
        assert!(err.to_string().contains("no API key"));
    }
}
