//! Persistent data model: members, orders, message log entries, config.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::onboarding::OnboardingStage;

/// Membership tier chosen during onboarding.
///
/// `FoundingFree` is never chosen directly — it is the override applied to
/// early members regardless of their choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipTier {
    OneTime,
    Monthly,
    PerUse,
    FoundingFree,
}

impl MembershipTier {
    /// Parse a member's tier choice, case-insensitive, accepting the
    /// compact spellings people actually type.
    pub fn parse_choice(text: &str) -> Option<Self> {
        let normalized: String = text
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match normalized.as_str() {
            "onetime" | "one" | "once" => Some(Self::OneTime),
            "monthly" | "month" => Some(Self::Monthly),
            "peruse" | "per" => Some(Self::PerUse),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneTime => "one_time",
            Self::Monthly => "monthly",
            Self::PerUse => "per_use",
            Self::FoundingFree => "founding_free",
        }
    }
}

impl std::fmt::Display for MembershipTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment status of a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    None,
    Pending,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Pending => "pending",
            Self::Paid => "paid",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered participant in the buying community, keyed by phone number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    /// Canonical E.164-like phone number.
    pub phone: String,
    pub name: Option<String>,
    pub city: Option<String>,
    pub tier: Option<MembershipTier>,
    pub stage: OnboardingStage,
    pub payment_status: PaymentStatus,
    /// Unique code issued at registration; immutable once set.
    pub referral_code: Option<String>,
    /// Referral code of the member who referred this one, if any.
    pub referred_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Member {
    /// A brand-new member record for a first-ever inbound message.
    pub fn new(phone: &str, now: DateTime<Utc>) -> Self {
        Self {
            phone: phone.to_string(),
            name: None,
            city: None,
            tier: None,
            stage: OnboardingStage::New,
            payment_status: PaymentStatus::None,
            referral_code: None,
            referred_by: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Status of an order. Transitions are monotonic; `Invalid` is terminal
/// and reached only by admin action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Invalid,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Invalid => "invalid",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A free-text order submission linked to a member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub member_phone: String,
    pub body: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn new(member_phone: &str, body: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            member_phone: member_phone.to_string(),
            body: body.to_string(),
            status: OrderStatus::Pending,
            created_at: now,
        }
    }
}

/// Direction of a logged message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }
}

/// An append-only audit record of one message, inbound or outbound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: Uuid,
    pub direction: Direction,
    /// Counterparty phone number.
    pub phone: String,
    pub body: String,
    /// Classified intent tag, where one applies.
    pub intent: Option<String>,
    /// Member stage when handling started, for the audit trail.
    pub stage_before: Option<String>,
    /// Member stage after handling.
    pub stage_after: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl MessageRecord {
    pub fn inbound(phone: &str, body: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            direction: Direction::Inbound,
            phone: phone.to_string(),
            body: body.to_string(),
            intent: None,
            stage_before: None,
            stage_after: None,
            timestamp,
        }
    }

    pub fn outbound(phone: &str, body: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            direction: Direction::Outbound,
            phone: phone.to_string(),
            body: body.to_string(),
            intent: None,
            stage_before: None,
            stage_after: None,
            timestamp,
        }
    }

    pub fn with_intent(mut self, intent: &str) -> Self {
        self.intent = Some(intent.to_string());
        self
    }

    pub fn with_stages(mut self, before: Option<&str>, after: Option<&str>) -> Self {
        self.stage_before = before.map(String::from);
        self.stage_after = after.map(String::from);
        self
    }
}

/// A small key/value configuration entry. Last write wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

/// Well-known config keys.
pub mod config_keys {
    pub const PRICE_SHEET_URL: &str = "price_sheet_url";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_choice_parsing() {
        assert_eq!(
            MembershipTier::parse_choice("one-time"),
            Some(MembershipTier::OneTime)
        );
        assert_eq!(
            MembershipTier::parse_choice("ONE TIME"),
            Some(MembershipTier::OneTime)
        );
        assert_eq!(
            MembershipTier::parse_choice("Monthly"),
            Some(MembershipTier::Monthly)
        );
        assert_eq!(
            MembershipTier::parse_choice(" per-use "),
            Some(MembershipTier::PerUse)
        );
        assert_eq!(
            MembershipTier::parse_choice("per use"),
            Some(MembershipTier::PerUse)
        );
        assert_eq!(MembershipTier::parse_choice("gold"), None);
        assert_eq!(MembershipTier::parse_choice(""), None);
        // The override tier cannot be chosen
        assert_eq!(MembershipTier::parse_choice("founding-free"), None);
    }

    #[test]
    fn display_matches_serde() {
        for tier in [
            MembershipTier::OneTime,
            MembershipTier::Monthly,
            MembershipTier::PerUse,
            MembershipTier::FoundingFree,
        ] {
            let json = serde_json::to_string(&tier).unwrap();
            assert_eq!(format!("\"{tier}\""), json);
        }
        for status in [OrderStatus::Pending, OrderStatus::Paid, OrderStatus::Invalid] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(format!("\"{status}\""), json);
        }
    }

    #[test]
    fn new_member_starts_blank() {
        let member = Member::new("+2348012345678", Utc::now());
        assert_eq!(member.stage, OnboardingStage::New);
        assert_eq!(member.payment_status, PaymentStatus::None);
        assert!(member.name.is_none());
        assert!(member.referral_code.is_none());
    }
}
