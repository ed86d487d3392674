//! Conversation dispatcher — routes every inbound message.
//!
//! Per message: log it, load (or create) the member, then route by
//! precedence: admin slash-command, onboarding stage, steady-state
//! intent. Stage advancement is a compare-and-set against the stage read
//! at the start of handling; on conflict the member is re-read and the
//! message re-handled against the current stage.
//!
//! Failure posture, in order of strictness:
//! - message-log appends are advisory (warn and continue),
//! - reply sends are logged and dropped (the provider retries inbound),
//! - order writes surface to the member as an explicit failure reply.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::admin::AdminProcessor;
use crate::config::BotConfig;
use crate::error::{Error, StoreError};
use crate::faq::{self, FaqAssist};
use crate::intent::{self, Intent};
use crate::onboarding::{OnboardingFlow, OnboardingStage, prompts};
use crate::store::model::{Member, MessageRecord, Order, config_keys};
use crate::store::traits::{ConfigStore, MemberStore, MessageLog, OrderStore};
use crate::transport::Transport;

/// Conflict retries before giving up on a message.
const MAX_STAGE_RETRIES: usize = 3;

/// Reply when a store read fails mid-handling. The member always hears
/// back, never silence.
const TROUBLE_REPLY: &str =
    "Sorry, we're having trouble right now. Please try again in a moment.";

pub struct Dispatcher {
    members: Arc<dyn MemberStore>,
    orders: Arc<dyn OrderStore>,
    log: Arc<dyn MessageLog>,
    config_store: Arc<dyn ConfigStore>,
    transport: Arc<dyn Transport>,
    faq: Option<Arc<dyn FaqAssist>>,
    admin: AdminProcessor,
    flow: OnboardingFlow,
    config: BotConfig,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        members: Arc<dyn MemberStore>,
        orders: Arc<dyn OrderStore>,
        log: Arc<dyn MessageLog>,
        config_store: Arc<dyn ConfigStore>,
        transport: Arc<dyn Transport>,
        faq: Option<Arc<dyn FaqAssist>>,
        config: BotConfig,
    ) -> Self {
        let admin = AdminProcessor::new(
            members.clone(),
            orders.clone(),
            log.clone(),
            config_store.clone(),
            transport.clone(),
            config.clone(),
        );
        let flow = OnboardingFlow::new(members.clone(), config.founding_member_limit);
        Self {
            members,
            orders,
            log,
            config_store,
            transport,
            faq,
            admin,
            flow,
            config,
        }
    }

    /// Handle one inbound message from `from`.
    pub async fn handle_inbound(&self, from: &str, body: &str) -> Result<(), Error> {
        let now = Utc::now();
        let loaded = self.load_or_create(from, now).await;

        // Audit first: the inbound message is logged before any handling,
        // with the stage tag when the member loaded. Neither a log failure
        // nor a member-store failure skips the append.
        let stage_tag = loaded.as_ref().ok().map(|m| m.stage.as_str());
        let inbound = MessageRecord::inbound(from, body, now).with_stages(stage_tag, None);
        if let Err(e) = self.log.append(&inbound).await {
            warn!(phone = from, error = %e, "Failed to log inbound message");
        }

        let member = loaded?;
        let stage_before = member.stage;

        let is_admin_command = body.trim_start().starts_with('/') && self.config.is_admin(from);
        let (reply, intent_tag, stage_after) = if is_admin_command {
            let reply = self.admin.handle(from, body).await?;
            (reply, Some("admin".to_string()), stage_before)
        } else if !stage_before.is_terminal() {
            let (reply, stage_after) = self.run_onboarding(member, body).await?;
            (reply, Some("onboarding".to_string()), stage_after)
        } else {
            let (reply, intent) = self.handle_intent(&member, body).await?;
            (reply, Some(intent.tag().to_string()), stage_before)
        };

        // A failed reply send is logged and dropped; the member can resend.
        if let Err(e) = self.transport.send(from, &reply).await {
            warn!(phone = from, error = %e, "Failed to send reply");
            return Ok(());
        }

        let outbound = {
            let mut record = MessageRecord::outbound(from, &reply, Utc::now())
                .with_stages(Some(stage_before.as_str()), Some(stage_after.as_str()));
            if let Some(tag) = intent_tag {
                record = record.with_intent(&tag);
            }
            record
        };
        if let Err(e) = self.log.append(&outbound).await {
            warn!(phone = from, error = %e, "Failed to log outbound message");
        }
        Ok(())
    }

    async fn load_or_create(&self, phone: &str, now: chrono::DateTime<Utc>) -> Result<Member, Error> {
        if let Some(member) = self.members.get(phone).await? {
            return Ok(member);
        }
        let member = Member::new(phone, now);
        if self.members.insert_new(&member).await? {
            info!(phone, "New member registered");
            return Ok(member);
        }
        // Lost a duplicate-delivery race; the other handler's row wins.
        self.members
            .get(phone)
            .await?
            .ok_or_else(|| {
                StoreError::NotFound {
                    entity: "member".into(),
                    key: phone.into(),
                }
                .into()
            })
    }

    /// Run the onboarding flow with compare-and-set stage writes.
    async fn run_onboarding(
        &self,
        mut member: Member,
        body: &str,
    ) -> Result<(String, OnboardingStage), Error> {
        for _ in 0..MAX_STAGE_RETRIES {
            let expected = member.stage;
            let outcome = self.flow.handle(&member, body).await?;
            if !outcome.mutated {
                return Ok((outcome.reply, expected));
            }

            let mut updated = outcome.member;
            updated.updated_at = Utc::now();
            if self
                .members
                .update_stage_checked(expected, &updated)
                .await?
            {
                return Ok((outcome.reply, updated.stage));
            }

            // Conflict: a concurrent handler advanced the stage first.
            // Re-read and re-handle against the current stage.
            debug!(phone = %updated.phone, expected = %expected, "Stage conflict, re-handling");
            member = self.members.get(&updated.phone).await?.ok_or_else(|| {
                StoreError::NotFound {
                    entity: "member".into(),
                    key: updated.phone.clone(),
                }
            })?;
            if member.stage.is_terminal() {
                let (reply, _) = self.handle_intent(&member, body).await?;
                return Ok((reply, member.stage));
            }
        }
        Err(StoreError::StaleStage {
            phone: member.phone.clone(),
            expected: member.stage.to_string(),
        }
        .into())
    }

    /// Steady-state intent handling for onboarded members.
    async fn handle_intent(
        &self,
        member: &Member,
        body: &str,
    ) -> Result<(String, Intent), Error> {
        let intent = intent::classify(body);
        debug!(phone = %member.phone, intent = intent.tag(), "Classified message");

        let reply = match &intent {
            Intent::Price => match self.config_store.get(config_keys::PRICE_SHEET_URL).await {
                Ok(Some(entry)) => format!("Current price sheet: {}", entry.value),
                Ok(None) => "The price sheet isn't set yet — check back soon.".to_string(),
                Err(e) => {
                    error!(phone = %member.phone, error = %e, "Failed to read price sheet");
                    TROUBLE_REPLY.to_string()
                }
            },
            Intent::Order { body: order_body } => {
                if order_body.is_empty() {
                    "What would you like to order? For example: \"order 5 bags of rice\"."
                        .to_string()
                } else {
                    let order = Order::new(&member.phone, order_body, Utc::now());
                    match self.orders.insert(&order).await {
                        Ok(()) => {
                            info!(phone = %member.phone, order_id = %order.id, "Order received");
                            format!(
                                "Got it! Your order \"{order_body}\" is in. \
We'll confirm once the group buy closes."
                            )
                        }
                        Err(e) => {
                            // The member must know the order was NOT saved.
                            error!(phone = %member.phone, error = %e, "Failed to save order");
                            "Sorry, we couldn't save your order just now. \
Please try again in a moment."
                                .to_string()
                        }
                    }
                }
            }
            Intent::Referral => match &member.referral_code {
                Some(code) => match self.members.count_referred_by(code).await {
                    Ok(count) => format!(
                        "Your referral code is *{code}*. {count} member(s) have \
joined with it so far."
                    ),
                    Err(e) => {
                        error!(phone = %member.phone, error = %e, "Failed to count referrals");
                        TROUBLE_REPLY.to_string()
                    }
                },
                None => "You don't have a referral code yet.".to_string(),
            },
            Intent::Help => prompts::HELP_MENU.to_string(),
            Intent::Unknown => self.answer_faq(body).await,
        };
        Ok((reply, intent))
    }

    /// Free-form questions go to the FAQ assist; any failure or timeout
    /// falls back to the static menu.
    async fn answer_faq(&self, question: &str) -> String {
        let Some(assist) = &self.faq else {
            return prompts::HELP_MENU.to_string();
        };
        match faq::answer_with_timeout(assist.as_ref(), question, self.config.faq_timeout).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, "FAQ assist failed, falling back to help menu");
                prompts::HELP_MENU.to_string()
            }
        }
    }
}
