//! Onboarding state machine — tracks which stage a member is in.

use serde::{Deserialize, Serialize};

/// The stages of the onboarding conversation.
///
/// Progresses linearly: New → AwaitingName → AwaitingCity →
/// AwaitingMembershipChoice → AwaitingPaymentProof → Complete.
/// Transitions are strictly sequential and cannot skip stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStage {
    New,
    AwaitingName,
    AwaitingCity,
    AwaitingMembershipChoice,
    AwaitingPaymentProof,
    Complete,
}

impl OnboardingStage {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: OnboardingStage) -> bool {
        use OnboardingStage::*;
        matches!(
            (self, target),
            (New, AwaitingName)
                | (AwaitingName, AwaitingCity)
                | (AwaitingCity, AwaitingMembershipChoice)
                | (AwaitingMembershipChoice, AwaitingPaymentProof)
                | (AwaitingPaymentProof, Complete)
        )
    }

    /// Whether this stage is terminal (onboarding is done).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Get the next stage in the linear progression, if any.
    pub fn next(&self) -> Option<OnboardingStage> {
        use OnboardingStage::*;
        match self {
            New => Some(AwaitingName),
            AwaitingName => Some(AwaitingCity),
            AwaitingCity => Some(AwaitingMembershipChoice),
            AwaitingMembershipChoice => Some(AwaitingPaymentProof),
            AwaitingPaymentProof => Some(Complete),
            Complete => None,
        }
    }

    /// Position in the stage order, for monotonicity checks.
    pub fn ordinal(&self) -> u8 {
        use OnboardingStage::*;
        match self {
            New => 0,
            AwaitingName => 1,
            AwaitingCity => 2,
            AwaitingMembershipChoice => 3,
            AwaitingPaymentProof => 4,
            Complete => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::AwaitingName => "awaiting_name",
            Self::AwaitingCity => "awaiting_city",
            Self::AwaitingMembershipChoice => "awaiting_membership_choice",
            Self::AwaitingPaymentProof => "awaiting_payment_proof",
            Self::Complete => "complete",
        }
    }

    /// Parse the DB string form. Unknown strings map to `New` so a
    /// corrupted row restarts onboarding rather than crashing handling.
    pub fn parse(s: &str) -> Self {
        match s {
            "awaiting_name" => Self::AwaitingName,
            "awaiting_city" => Self::AwaitingCity,
            "awaiting_membership_choice" => Self::AwaitingMembershipChoice,
            "awaiting_payment_proof" => Self::AwaitingPaymentProof,
            "complete" => Self::Complete,
            _ => Self::New,
        }
    }
}

impl Default for OnboardingStage {
    fn default() -> Self {
        Self::New
    }
}

impl std::fmt::Display for OnboardingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
