//! Single-shot chat-completions transport.
//!
//! One HTTP request per caller utterance. The request carries the full
//! system prompt assembled from business facts, so the model never needs
//! out-of-band context. Any failure mode here (non-2xx, timeout, malformed
//! body) is recoverable; the caller supplies the canned fallback sentence.

use std::time::Duration;

use serde_json::{Value, json};
use tracing::debug;

use super::base::{ModelError, ModelResult};

/// Default completions endpoint base.
const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Request time bound; treated identically to any other upstream failure.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for the single-shot transport.
#[derive(Debug, Clone)]
pub struct CompletionClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    api_base: String,
    system_prompt: String,
}

impl CompletionClient {
    /// Build a client.
    ///
    /// # Arguments
    /// * `api_key` - bearer key for the completion service
    /// * `model` - completions model id
    /// * `api_base` - endpoint override, None for the public API
    /// * `system_prompt` - business-facts prompt sent with every request
    pub fn new(
        api_key: String,
        model: String,
        api_base: Option<String>,
        system_prompt: String,
    ) -> ModelResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ModelError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            model,
            api_base: api_base.unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            system_prompt,
        })
    }

    /// Translate one utterance into one reply.
    pub async fn ask(&self, utterance: &str) -> ModelResult<String> {
        let url = format!("{}/chat/completions", self.api_base.trim_end_matches('/'));
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": self.system_prompt},
                {"role": "user", "content": utterance},
            ],
            "max_tokens": 120,
            "temperature": 0.4,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Timeout(e.to_string())
                } else {
                    ModelError::ConnectionFailed(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ModelError::MalformedBody(e.to_string()))?;

        let reply = payload
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ModelError::MalformedBody("no message content".to_string()))?;

        debug!(chars = reply.len(), "completion reply received");
        Ok(reply.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(api_base: &str) -> CompletionClient {
        CompletionClient::new(
            "test-key".to_string(),
            "gpt-4o-mini".to_string(),
            Some(api_base.to_string()),
            "You are a test assistant.".to_string(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_ask_happy_path() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/chat/completions"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "We close at 9 PM."}}]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let reply = client.ask("when do you close").await.unwrap();
        assert_eq!(reply, "We close at 9 PM.");
    }

    #[tokio::test]
    async fn test_ask_non_2xx_is_recoverable_error() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        match client.ask("hello").await {
            Err(ModelError::Http { status: 500, .. }) => {}
            other => panic!("expected Http error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ask_malformed_body_is_recoverable_error() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        assert!(matches!(
            client.ask("hello").await,
            Err(ModelError::MalformedBody(_))
        ));
    }

    #[tokio::test]
    async fn test_ask_unreachable_host_is_connection_error() {
        // Port 1 is essentially never listening
        let client = test_client("http://127.0.0.1:1");
        match client.ask("hello").await {
            Err(ModelError::ConnectionFailed(_)) | Err(ModelError::Timeout(_)) => {}
            other => panic!("expected connection failure, got {other:?}"),
        }
    }
}
