//! Live-call transfer collaborator.
//!
//! Redirects an in-progress call to the human-staffed number through the
//! telephony REST API. Failure here is always recoverable: the relay
//! session announces the spoken fallback number instead of stalling.

use std::time::Duration;

use thiserror::Error;
use tracing::info;

/// Telephony REST API base.
const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// Bound on the redirect REST call.
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from the transfer collaborator.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Request could not be sent or timed out
    #[error("Transfer request failed: {0}")]
    Request(String),

    /// Telephony API rejected the redirect
    #[error("Transfer rejected with status {0}")]
    Rejected(u16),
}

/// Client that redirects live calls to a human.
#[derive(Debug, Clone)]
pub struct TransferClient {
    client: reqwest::Client,
    account_sid: String,
    auth_token: String,
    transfer_number: String,
    api_base: String,
}

impl TransferClient {
    pub fn new(
        account_sid: String,
        auth_token: String,
        transfer_number: String,
    ) -> Result<Self, TransferError> {
        Self::with_api_base(
            account_sid,
            auth_token,
            transfer_number,
            TWILIO_API_BASE.to_string(),
        )
    }

    /// Constructor with an endpoint override for tests.
    pub fn with_api_base(
        account_sid: String,
        auth_token: String,
        transfer_number: String,
        api_base: String,
    ) -> Result<Self, TransferError> {
        let client = reqwest::Client::builder()
            .timeout(TRANSFER_TIMEOUT)
            .build()
            .map_err(|e| TransferError::Request(e.to_string()))?;
        Ok(Self {
            client,
            account_sid,
            auth_token,
            transfer_number,
            api_base,
        })
    }

    /// Redirect the live call identified by `call_sid` to the human number.
    pub async fn redirect(&self, call_sid: &str) -> Result<(), TransferError> {
        let url = format!(
            "{}/Accounts/{}/Calls/{}.json",
            self.api_base.trim_end_matches('/'),
            self.account_sid,
            call_sid
        );
        let twiml = format!("<Response><Dial>{}</Dial></Response>", self.transfer_number);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("Twiml", twiml.as_str())])
            .send()
            .await
            .map_err(|e| TransferError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::Rejected(status.as_u16()));
        }

        info!(call_sid, to = %self.transfer_number, "call redirected to human");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(api_base: &str) -> TransferClient {
        TransferClient::with_api_base(
            "AC123".to_string(),
            "token".to_string(),
            "+19165550100".to_string(),
            api_base.to_string(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_redirect_posts_dial_twiml() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/Accounts/AC123/Calls/CA42.json"))
            .and(wiremock::matchers::body_string_contains("Dial"))
            .and(wiremock::matchers::body_string_contains("19165550100"))
            .respond_with(wiremock::ResponseTemplate::new(200))
            .mount(&server)
            .await;

        test_client(&server.uri()).redirect("CA42").await.unwrap();
    }

    #[tokio::test]
    async fn test_redirect_rejection_is_recoverable() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        match test_client(&server.uri()).redirect("CA42").await {
            Err(TransferError::Rejected(404)) => {}
            other => panic!("expected Rejected(404), got {other:?}"),
        }
    }
}
