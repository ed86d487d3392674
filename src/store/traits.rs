//! Narrow async repository interfaces over the document store.
//!
//! The core holds no long-lived in-memory copies: every inbound event
//! rehydrates the member by phone, mutates it, and writes it back. Stage
//! advancement goes through `update_stage_checked`, a compare-and-set on
//! the stage read at the start of handling.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::onboarding::OnboardingStage;
use crate::store::model::{ConfigEntry, Member, MessageRecord, Order, OrderStatus};

/// Member persistence, keyed by phone number.
#[async_trait]
pub trait MemberStore: Send + Sync {
    /// Get a member by phone.
    async fn get(&self, phone: &str) -> Result<Option<Member>, StoreError>;

    /// Insert a member only if no record exists for the phone yet.
    /// Returns `false` when the phone was already present (lost race with
    /// a duplicate delivery).
    async fn insert_new(&self, member: &Member) -> Result<bool, StoreError>;

    /// Unconditional write of the full member record.
    async fn upsert(&self, member: &Member) -> Result<(), StoreError>;

    /// Write the full member record only if the stored stage still equals
    /// `expected`. Returns `false` on conflict; the caller re-reads and
    /// re-handles against the now-current stage.
    async fn update_stage_checked(
        &self,
        expected: OnboardingStage,
        member: &Member,
    ) -> Result<bool, StoreError>;

    /// Total number of members.
    async fn count(&self) -> Result<u64, StoreError>;

    /// Number of members whose `referred_by` equals the given code.
    async fn count_referred_by(&self, code: &str) -> Result<u64, StoreError>;

    /// Look up a member by referral code (uniqueness checks).
    async fn find_by_referral_code(&self, code: &str) -> Result<Option<Member>, StoreError>;

    /// Most recently created members, newest first.
    async fn list_recent(&self, limit: usize) -> Result<Vec<Member>, StoreError>;

    /// Broadcast target resolution: all members, or those whose city
    /// matches case-insensitively.
    async fn list_by_city(&self, city: Option<&str>) -> Result<Vec<Member>, StoreError>;
}

/// Order persistence.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert(&self, order: &Order) -> Result<(), StoreError>;

    /// Most recent orders, newest first.
    async fn list_recent(&self, limit: usize) -> Result<Vec<Order>, StoreError>;

    /// Admin-driven status change (e.g. marking an order invalid).
    async fn update_status(&self, id: uuid::Uuid, status: OrderStatus) -> Result<(), StoreError>;
}

/// Append-only message log for audit and admin views.
#[async_trait]
pub trait MessageLog: Send + Sync {
    async fn append(&self, record: &MessageRecord) -> Result<(), StoreError>;

    /// Most recent records, newest first.
    async fn list_recent(&self, limit: usize) -> Result<Vec<MessageRecord>, StoreError>;
}

/// Small key/value configuration store. Last write wins.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<ConfigEntry>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}
