//! Outbound message transport.
//!
//! Everything that sends a message to a member goes through the
//! [`Transport`] trait: the dispatcher's replies, the admin broadcast
//! fan-out. Production uses [`twilio::TwilioGateway`]; tests and offline
//! runs use [`memory::MemoryGateway`].

pub mod memory;
pub mod twilio;
pub mod webhook;

use async_trait::async_trait;

use crate::error::TransportError;

/// A single delivery attempt's result, used by broadcast summaries.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub to: String,
    pub result: Result<(), TransportError>,
}

/// Sends messages to members over the messaging provider.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver `body` to `to` (an E.164 phone number). Returns the
    /// provider's message id on success.
    async fn send(&self, to: &str, body: &str) -> Result<String, TransportError>;
}

/// Split a message into chunks of at most `max_len` bytes, preferring
/// newline then space boundaries.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let chunk = &remaining[..max_len];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .unwrap_or(max_len);

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { max_len } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}
