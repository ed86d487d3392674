//! Onboarding flow — turns (member, inbound text) into a stage outcome.
//!
//! The flow itself never writes to the store; it returns the updated
//! member plus the reply, and the dispatcher persists the result through
//! the conditional stage write. The only store access here is read-side:
//! the member count for the founding override and referral-code
//! uniqueness probes.

use std::sync::Arc;

#[cfg(test)]
use chrono::Utc;
use rand::Rng;
use tracing::debug;

use crate::error::StoreError;
use crate::store::model::{Member, MembershipTier, PaymentStatus};
use crate::store::traits::MemberStore;

use super::prompts;
use super::stage::OnboardingStage;

/// Characters used in referral codes. Ambiguous glyphs (0/O, 1/I/L)
/// are excluded so codes survive being read aloud.
const REFERRAL_CHARSET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const REFERRAL_CODE_LEN: usize = 6;
const REFERRAL_MAX_ATTEMPTS: usize = 8;

/// Result of handling one inbound message during onboarding.
#[derive(Debug, Clone)]
pub struct StageOutcome {
    /// The member with any mutations applied.
    pub member: Member,
    /// Whether the member record changed and needs a conditional write.
    pub mutated: bool,
    /// Reply to send back.
    pub reply: String,
}

/// The onboarding conversation flow.
pub struct OnboardingFlow {
    members: Arc<dyn MemberStore>,
    /// Members at or below this total count get the founding-free tier.
    founding_limit: u64,
}

impl OnboardingFlow {
    pub fn new(members: Arc<dyn MemberStore>, founding_limit: u64) -> Self {
        Self {
            members,
            founding_limit,
        }
    }

    /// Consume one inbound message as the answer to the member's current
    /// stage. Never called for `Complete` members.
    pub async fn handle(&self, member: &Member, body: &str) -> Result<StageOutcome, StoreError> {
        let mut member = member.clone();
        let mut text = body.trim().to_string();

        // "referred by <code>" can ride along with any onboarding answer;
        // record the code and strip the clause before handling the rest.
        if member.referred_by.is_none() {
            if let Some((code, remainder)) = extract_referred_by(&text) {
                member.referred_by = Some(code);
                text = remainder;
            }
        }
        let text = text.as_str();

        let outcome = match member.stage {
            OnboardingStage::New => {
                // First-ever message: greet and ask for the name. The
                // message that created the member is not consumed as an
                // answer.
                member.stage = OnboardingStage::AwaitingName;
                advance(member, prompts::WELCOME.to_string())
            }
            OnboardingStage::AwaitingName => {
                if text.is_empty() {
                    return Ok(reprompt(member, prompts::NAME_REPROMPT.to_string()));
                }
                let name = normalize_name(text);
                member.name = Some(name.clone());
                member.stage = OnboardingStage::AwaitingCity;
                advance(member, prompts::city_prompt(&name))
            }
            OnboardingStage::AwaitingCity => {
                if text.is_empty() {
                    return Ok(reprompt(member, prompts::CITY_REPROMPT.to_string()));
                }
                member.city = Some(normalize_city(text));
                member.stage = OnboardingStage::AwaitingMembershipChoice;
                advance(member, prompts::MEMBERSHIP_OPTIONS.to_string())
            }
            OnboardingStage::AwaitingMembershipChoice => {
                let Some(chosen) = MembershipTier::parse_choice(text) else {
                    // Unmatched input re-prompts without advancing and
                    // does not mutate state.
                    return Ok(reprompt(member, prompts::MEMBERSHIP_REPROMPT.to_string()));
                };

                let code = self.generate_referral_code().await?;

                // Early members get membership free regardless of choice.
                let total = self.members.count().await?;
                let founding = total <= self.founding_limit;
                let tier = if founding {
                    MembershipTier::FoundingFree
                } else {
                    chosen
                };
                debug!(
                    phone = %member.phone,
                    chosen = %chosen,
                    tier = %tier,
                    total_members = total,
                    "Membership tier selected"
                );

                member.tier = Some(tier);
                member.referral_code = Some(code.clone());
                member.stage = OnboardingStage::AwaitingPaymentProof;
                let reply = if founding {
                    prompts::founding_payment_prompt(&code)
                } else {
                    prompts::payment_prompt(&code)
                };
                advance(member, reply)
            }
            OnboardingStage::AwaitingPaymentProof => {
                // Any input advances; a human admin confirms later via
                // /mark_paid. The payment reference itself stays in the
                // message log.
                member.payment_status = PaymentStatus::Pending;
                member.stage = OnboardingStage::Complete;
                advance(member, prompts::ONBOARDING_DONE.to_string())
            }
            OnboardingStage::Complete => {
                // Control never reaches this machine for complete members;
                // answer with the menu if it somehow does.
                reprompt(member, prompts::HELP_MENU.to_string())
            }
        };

        Ok(outcome)
    }

    /// Generate a referral code that no existing member holds.
    ///
    /// The UNIQUE column constraint is the backstop for the (vanishing)
    /// chance of a concurrent collision after the probe.
    async fn generate_referral_code(&self) -> Result<String, StoreError> {
        for _ in 0..REFERRAL_MAX_ATTEMPTS {
            let code = random_code();
            if self.members.find_by_referral_code(&code).await?.is_none() {
                return Ok(code);
            }
        }
        Err(StoreError::Constraint(
            "Could not generate a unique referral code".into(),
        ))
    }
}

fn advance(member: Member, reply: String) -> StageOutcome {
    StageOutcome {
        member,
        mutated: true,
        reply,
    }
}

fn reprompt(member: Member, reply: String) -> StageOutcome {
    StageOutcome {
        member,
        mutated: false,
        reply,
    }
}

fn random_code() -> String {
    let mut rng = rand::thread_rng();
    (0..REFERRAL_CODE_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..REFERRAL_CHARSET.len());
            REFERRAL_CHARSET[idx] as char
        })
        .collect()
}

/// Strip conversational lead-ins ("my name is …", "i'm …") and title-case
/// the rest. Falls back to the raw input if stripping leaves nothing.
pub fn normalize_name(text: &str) -> String {
    let raw = text.trim();
    let lowered = raw.to_lowercase();
    let prefixes = [
        "my name is",
        "name is",
        "i am",
        "i'm",
        "call me",
        "you can call me",
    ];
    let mut stripped = raw;
    for prefix in prefixes {
        if lowered.starts_with(prefix) {
            stripped = raw[prefix.len()..].trim();
            break;
        }
    }
    let stripped = stripped.trim_matches(|c: char| ",.! ".contains(c));
    if stripped.is_empty() {
        return raw.to_string();
    }
    title_case(stripped)
}

/// Trim and canonicalize casing so "lagos", "LAGOS" and "Lagos" all land
/// on the same city value.
pub fn normalize_city(text: &str) -> String {
    title_case(text.trim())
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Pull a referral code out of a "referred by <code>" phrase. Returns the
/// uppercased code and the text with the clause removed.
fn extract_referred_by(text: &str) -> Option<(String, String)> {
    let lowered = text.to_lowercase();
    let idx = lowered.find("referred by")?;
    let after = &text[idx + "referred by".len()..];
    let code = after
        .trim()
        .split_whitespace()
        .next()?
        .trim_matches(|c: char| !c.is_ascii_alphanumeric());
    if code.is_empty() {
        return None;
    }
    let remainder = text[..idx]
        .trim_end_matches(|c: char| c.is_whitespace() || ",.;-".contains(c))
        .to_string();
    Some((code.to_uppercase(), remainder))
}
