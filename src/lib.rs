//! Coopbot — conversational assistant for a group-buying co-op.
//!
//! Members chat with the bot over WhatsApp: onboarding collects their
//! name, city, and membership tier; after that, keyword intents handle
//! prices, orders, and referrals, with an LLM-backed FAQ fallback.
//! Whitelisted admins drive the co-op through slash commands, including
//! broadcast fan-out.

pub mod admin;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod faq;
pub mod intent;
pub mod onboarding;
pub mod store;
pub mod transport;

pub use config::BotConfig;
pub use dispatch::Dispatcher;
pub use error::{Error, Result};
