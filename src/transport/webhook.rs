//! Inbound webhook — receives Twilio's form-encoded message callbacks.
//!
//! Replies go out through the transport, not the webhook response, so the
//! handler always returns an empty TwiML document. Handling errors are
//! logged and still answered with 200 to keep the provider from retrying
//! a message we already audited.

use std::sync::Arc;

use axum::extract::{Form, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use tracing::{debug, error};

use crate::dispatch::Dispatcher;

use super::twilio::strip_whatsapp_prefix;

const EMPTY_TWIML: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Response></Response>"#;

/// The fields we use from Twilio's inbound message callback.
#[derive(Debug, Deserialize)]
pub struct InboundForm {
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "Body", default)]
    pub body: String,
}

/// Build the webhook router.
pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/webhook", post(handle_webhook))
        .route("/healthz", get(healthz))
        .with_state(dispatcher)
}

async fn handle_webhook(
    State(dispatcher): State<Arc<Dispatcher>>,
    Form(form): Form<InboundForm>,
) -> impl IntoResponse {
    let from = strip_whatsapp_prefix(&form.from);
    debug!(from, "Inbound webhook message");
    if let Err(e) = dispatcher.handle_inbound(from, &form.body).await {
        error!(from, error = %e, "Failed to handle inbound message");
    }
    ([(header::CONTENT_TYPE, "application/xml")], EMPTY_TWIML)
}

async fn healthz() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_form_parses_twilio_fields() {
        let form: InboundForm =
            serde_urlencoded::from_str("From=whatsapp%3A%2B2348012345678&Body=hello").unwrap();
        assert_eq!(form.from, "whatsapp:+2348012345678");
        assert_eq!(form.body, "hello");
    }

    #[test]
    fn body_defaults_to_empty() {
        let form: InboundForm = serde_urlencoded::from_str("From=%2B100").unwrap();
        assert_eq!(form.body, "");
    }
}
