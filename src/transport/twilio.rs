//! Twilio WhatsApp gateway.
//!
//! Sends through the Messages API with form-encoded POSTs and basic auth.
//! WhatsApp numbers are prefixed with `whatsapp:` on the wire; the rest of
//! the system deals in bare E.164 numbers.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use crate::error::TransportError;

use super::{Transport, split_message};

/// Twilio caps message bodies at 1600 characters.
const TWILIO_MAX_MESSAGE_LENGTH: usize = 1600;

pub struct TwilioGateway {
    account_sid: String,
    auth_token: SecretString,
    /// Sender number, already `whatsapp:`-prefixed if needed.
    from: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct MessageResponse {
    sid: String,
}

impl TwilioGateway {
    pub fn new(account_sid: String, auth_token: SecretString, from: String) -> Self {
        let from = ensure_whatsapp_prefix(&from);
        Self {
            account_sid,
            auth_token,
            from,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self) -> String {
        format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.account_sid
        )
    }

    async fn send_chunk(&self, to: &str, body: &str) -> Result<String, TransportError> {
        let params = [("From", self.from.as_str()), ("To", to), ("Body", body)];
        let response = self
            .client
            .post(self.api_url())
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&params)
            .send()
            .await
            .map_err(|e| TransportError::SendFailed {
                to: to.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Rejected {
                to: to.to_string(),
                status: status.as_u16(),
            });
        }

        let parsed: MessageResponse =
            response
                .json()
                .await
                .map_err(|e| TransportError::SendFailed {
                    to: to.to_string(),
                    reason: format!("Unreadable response body: {e}"),
                })?;
        debug!(to, sid = %parsed.sid, "Message accepted by Twilio");
        Ok(parsed.sid)
    }
}

#[async_trait]
impl Transport for TwilioGateway {
    async fn send(&self, to: &str, body: &str) -> Result<String, TransportError> {
        if body.trim().is_empty() {
            return Err(TransportError::InvalidMessage(
                "Refusing to send an empty body".into(),
            ));
        }
        let to = ensure_whatsapp_prefix(to);
        let mut last_sid = String::new();
        for chunk in split_message(body, TWILIO_MAX_MESSAGE_LENGTH) {
            last_sid = self.send_chunk(&to, &chunk).await?;
        }
        Ok(last_sid)
    }
}

fn ensure_whatsapp_prefix(number: &str) -> String {
    if number.starts_with("whatsapp:") {
        number.to_string()
    } else {
        format!("whatsapp:{number}")
    }
}

/// Strip the `whatsapp:` channel prefix from an inbound sender.
pub fn strip_whatsapp_prefix(number: &str) -> &str {
    number.strip_prefix("whatsapp:").unwrap_or(number)
}
