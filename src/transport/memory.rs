//! In-memory transport for tests and offline runs.
//!
//! Records every send and can be scripted to fail for specific
//! recipients, which is how broadcast failure isolation gets tested.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::TransportError;

use super::Transport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub to: String,
    pub body: String,
}

#[derive(Default)]
pub struct MemoryGateway {
    sent: Mutex<Vec<SentMessage>>,
    failing: Mutex<HashSet<String>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send to `to` fail from now on.
    pub fn fail_for(&self, to: &str) {
        self.failing.lock().unwrap().insert(to.to_string());
    }

    /// All messages sent so far, in order.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Bodies of messages sent to one recipient, in order.
    pub fn sent_to(&self, to: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.to == to)
            .map(|m| m.body.clone())
            .collect()
    }

    /// Body of the most recent send, if any.
    pub fn last_body(&self) -> Option<String> {
        self.sent.lock().unwrap().last().map(|m| m.body.clone())
    }
}

#[async_trait]
impl Transport for MemoryGateway {
    async fn send(&self, to: &str, body: &str) -> Result<String, TransportError> {
        if self.failing.lock().unwrap().contains(to) {
            return Err(TransportError::SendFailed {
                to: to.to_string(),
                reason: "scripted failure".into(),
            });
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(SentMessage {
            to: to.to_string(),
            body: body.to_string(),
        });
        Ok(format!("mem-{}", sent.len()))
    }
}
