//! Member onboarding: the stage machine, the conversation flow, and the
//! canned prompt texts.

pub mod flow;
pub mod prompts;
pub mod stage;

pub use flow::{OnboardingFlow, StageOutcome};
pub use stage::OnboardingStage;
