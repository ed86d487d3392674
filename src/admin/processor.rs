//! Admin command execution.
//!
//! Parses the message, runs the command against the stores, and returns
//! the reply text for the issuing admin. Parse failures become corrective
//! replies rather than errors. Broadcast fan-out runs with bounded
//! concurrency and isolates per-recipient failures.

use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use tracing::{info, warn};

use crate::config::BotConfig;
use crate::error::{CommandError, StoreError};
use crate::store::model::{MessageRecord, PaymentStatus, config_keys};
use crate::store::traits::{ConfigStore, MemberStore, MessageLog, OrderStore};
use crate::transport::{SendOutcome, Transport};

use super::command::{self, AdminCommand, BroadcastTarget};

/// Result of one broadcast fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastSummary {
    pub sent: usize,
    pub failed: usize,
    pub total: usize,
}

pub struct AdminProcessor {
    members: Arc<dyn MemberStore>,
    orders: Arc<dyn OrderStore>,
    log: Arc<dyn MessageLog>,
    config_store: Arc<dyn ConfigStore>,
    transport: Arc<dyn Transport>,
    config: BotConfig,
}

impl AdminProcessor {
    pub fn new(
        members: Arc<dyn MemberStore>,
        orders: Arc<dyn OrderStore>,
        log: Arc<dyn MessageLog>,
        config_store: Arc<dyn ConfigStore>,
        transport: Arc<dyn Transport>,
        config: BotConfig,
    ) -> Self {
        Self {
            members,
            orders,
            log,
            config_store,
            transport,
            config,
        }
    }

    /// Handle one admin message, returning the reply for the admin.
    pub async fn handle(&self, admin_phone: &str, text: &str) -> Result<String, StoreError> {
        let command = match command::parse(text) {
            Ok(command) => command,
            Err(e) => return Ok(corrective_reply(&e)),
        };
        info!(admin = %admin_phone, command = command_tag(&command), "Admin command");

        match command {
            AdminCommand::SetPriceSheet { url } => {
                self.config_store
                    .set(config_keys::PRICE_SHEET_URL, &url)
                    .await?;
                Ok(format!("Price sheet updated: {url}"))
            }
            AdminCommand::Orders => self.list_orders().await,
            AdminCommand::Members => self.list_members().await,
            AdminCommand::MarkPaid { phone } => self.mark_paid(&phone).await,
            AdminCommand::Broadcast { target, message } => {
                let summary = self.broadcast(&target, &message).await?;
                Ok(format!(
                    "Broadcast to {target}: sent {}, failed {}, total {}.",
                    summary.sent, summary.failed, summary.total
                ))
            }
        }
    }

    async fn list_orders(&self) -> Result<String, StoreError> {
        let orders = self.orders.list_recent(self.config.admin_list_limit).await?;
        if orders.is_empty() {
            return Ok("No orders yet.".into());
        }
        let lines: Vec<String> = orders
            .iter()
            .map(|o| {
                let short_id = &o.id.to_string()[..8];
                format!("{short_id} · {} · {} · {}", o.member_phone, o.body, o.status)
            })
            .collect();
        Ok(format!("Recent orders:\n{}", lines.join("\n")))
    }

    async fn list_members(&self) -> Result<String, StoreError> {
        let members = self
            .members
            .list_recent(self.config.admin_list_limit)
            .await?;
        if members.is_empty() {
            return Ok("No members yet.".into());
        }
        let lines: Vec<String> = members
            .iter()
            .map(|m| {
                format!(
                    "{} · {} · {} · {} · {}",
                    m.phone,
                    m.name.as_deref().unwrap_or("-"),
                    m.city.as_deref().unwrap_or("-"),
                    m.tier.map(|t| t.as_str()).unwrap_or("-"),
                    m.stage
                )
            })
            .collect();
        Ok(format!("Recent members:\n{}", lines.join("\n")))
    }

    async fn mark_paid(&self, phone: &str) -> Result<String, StoreError> {
        let Some(mut member) = self.members.get(phone).await? else {
            return Ok(format!("No member found with phone {phone}."));
        };
        member.payment_status = PaymentStatus::Paid;
        member.updated_at = Utc::now();
        self.members.upsert(&member).await?;
        info!(phone, "Payment confirmed");
        Ok(format!("Marked {phone} as paid."))
    }

    /// Fan a message out to every member in the target set. Individual
    /// failures are counted, never aborting the rest of the run.
    pub async fn broadcast(
        &self,
        target: &BroadcastTarget,
        message: &str,
    ) -> Result<BroadcastSummary, StoreError> {
        let city = match target {
            BroadcastTarget::All => None,
            BroadcastTarget::City(city) => Some(city.as_str()),
        };
        let recipients = self.members.list_by_city(city).await?;
        let total = recipients.len();

        let outcomes: Vec<SendOutcome> = futures::stream::iter(recipients)
            .map(|member| {
                let transport = self.transport.clone();
                let message = message.to_string();
                async move {
                    let result = transport.send(&member.phone, &message).await;
                    SendOutcome {
                        to: member.phone,
                        result: result.map(|_| ()),
                    }
                }
            })
            .buffer_unordered(self.config.broadcast_concurrency)
            .collect()
            .await;

        let mut sent = 0;
        let mut failed = 0;
        for outcome in &outcomes {
            match &outcome.result {
                Ok(()) => {
                    sent += 1;
                    let record = MessageRecord::outbound(&outcome.to, message, Utc::now())
                        .with_intent("broadcast");
                    if let Err(e) = self.log.append(&record).await {
                        warn!(to = %outcome.to, error = %e, "Failed to log broadcast delivery");
                    }
                }
                Err(e) => {
                    failed += 1;
                    warn!(to = %outcome.to, error = %e, "Broadcast delivery failed");
                }
            }
        }
        info!(target = %target, sent, failed, total, "Broadcast complete");

        Ok(BroadcastSummary {
            sent,
            failed,
            total,
        })
    }
}

fn corrective_reply(error: &CommandError) -> String {
    match error {
        CommandError::UnknownCommand { keyword } => {
            format!("Unknown command /{keyword}.\n{}", command::USAGE)
        }
        CommandError::MissingArgument { keyword, argument } => {
            format!("Usage: {keyword} <{argument}>")
        }
        CommandError::NotACommand => command::USAGE.to_string(),
    }
}

fn command_tag(command: &AdminCommand) -> &'static str {
    match command {
        AdminCommand::SetPriceSheet { .. } => "set_price_sheet",
        AdminCommand::Orders => "orders",
        AdminCommand::Members => "members",
        AdminCommand::MarkPaid { .. } => "mark_paid",
        AdminCommand::Broadcast { .. } => "broadcast",
    }
}
