//! libSQL backend — implements the four repository traits over one
//! connection. Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::StoreError;
use crate::onboarding::OnboardingStage;
use crate::store::migrations;
use crate::store::model::{
    ConfigEntry, Direction, Member, MembershipTier, MessageRecord, Order, OrderStatus,
    PaymentStatus,
};
use crate::store::traits::{ConfigStore, MemberStore, MessageLog, OrderStore};

/// libSQL database backend.
///
/// Holds a single connection reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to open libSQL database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        migrations::run_migrations(&backend.conn).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests and offline runs).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                StoreError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;
        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        migrations::run_migrations(&backend.conn).await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

fn query_err(e: libsql::Error) -> StoreError {
    StoreError::Query(e.to_string())
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn tier_to_str(tier: &Option<MembershipTier>) -> libsql::Value {
    match tier {
        Some(t) => libsql::Value::Text(t.as_str().to_string()),
        None => libsql::Value::Null,
    }
}

fn str_to_tier(s: &str) -> Option<MembershipTier> {
    match s {
        "one_time" => Some(MembershipTier::OneTime),
        "monthly" => Some(MembershipTier::Monthly),
        "per_use" => Some(MembershipTier::PerUse),
        "founding_free" => Some(MembershipTier::FoundingFree),
        _ => None,
    }
}

fn str_to_payment(s: &str) -> PaymentStatus {
    match s {
        "pending" => PaymentStatus::Pending,
        "paid" => PaymentStatus::Paid,
        _ => PaymentStatus::None,
    }
}

fn str_to_order_status(s: &str) -> OrderStatus {
    match s {
        "paid" => OrderStatus::Paid,
        "invalid" => OrderStatus::Invalid,
        _ => OrderStatus::Pending,
    }
}

fn str_to_direction(s: &str) -> Direction {
    match s {
        "outbound" => Direction::Outbound,
        _ => Direction::Inbound,
    }
}

/// Convert `Option<&str>` to a libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

const MEMBER_COLUMNS: &str = "phone, name, city, tier, stage, payment_status, referral_code, \
                              referred_by, created_at, updated_at";

fn row_to_member(row: &libsql::Row) -> Result<Member, libsql::Error> {
    let tier_str: Option<String> = row.get(3).ok();
    let stage_str: String = row.get(4)?;
    let payment_str: String = row.get(5)?;
    let created_str: String = row.get(8)?;
    let updated_str: String = row.get(9)?;

    Ok(Member {
        phone: row.get(0)?,
        name: row.get(1).ok(),
        city: row.get(2).ok(),
        tier: tier_str.as_deref().and_then(str_to_tier),
        stage: OnboardingStage::parse(&stage_str),
        payment_status: str_to_payment(&payment_str),
        referral_code: row.get(6).ok(),
        referred_by: row.get(7).ok(),
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

fn row_to_order(row: &libsql::Row) -> Result<Order, libsql::Error> {
    let id_str: String = row.get(0)?;
    let status_str: String = row.get(3)?;
    let created_str: String = row.get(4)?;
    Ok(Order {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        member_phone: row.get(1)?,
        body: row.get(2)?,
        status: str_to_order_status(&status_str),
        created_at: parse_datetime(&created_str),
    })
}

fn row_to_record(row: &libsql::Row) -> Result<MessageRecord, libsql::Error> {
    let id_str: String = row.get(0)?;
    let direction_str: String = row.get(1)?;
    let timestamp_str: String = row.get(7)?;
    Ok(MessageRecord {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        direction: str_to_direction(&direction_str),
        phone: row.get(2)?,
        body: row.get(3)?,
        intent: row.get(4).ok(),
        stage_before: row.get(5).ok(),
        stage_after: row.get(6).ok(),
        timestamp: parse_datetime(&timestamp_str),
    })
}

/// The member column tuple used by insert/update statements.
fn member_values(member: &Member) -> [libsql::Value; 10] {
    [
        libsql::Value::Text(member.phone.clone()),
        opt_text(member.name.as_deref()),
        opt_text(member.city.as_deref()),
        tier_to_str(&member.tier),
        libsql::Value::Text(member.stage.as_str().to_string()),
        libsql::Value::Text(member.payment_status.as_str().to_string()),
        opt_text(member.referral_code.as_deref()),
        opt_text(member.referred_by.as_deref()),
        libsql::Value::Text(member.created_at.to_rfc3339()),
        libsql::Value::Text(member.updated_at.to_rfc3339()),
    ]
}

// ── Trait implementations ───────────────────────────────────────────

#[async_trait]
impl MemberStore for LibSqlBackend {
    async fn get(&self, phone: &str) -> Result<Option<Member>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {MEMBER_COLUMNS} FROM members WHERE phone = ?1"),
                params![phone],
            )
            .await
            .map_err(query_err)?;
        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row_to_member(&row).map_err(query_err)?)),
            None => Ok(None),
        }
    }

    async fn insert_new(&self, member: &Member) -> Result<bool, StoreError> {
        let affected = self
            .conn()
            .execute(
                "INSERT OR IGNORE INTO members (phone, name, city, tier, stage, payment_status, \
                 referral_code, referred_by, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                member_values(member).to_vec(),
            )
            .await
            .map_err(query_err)?;
        debug!(phone = %member.phone, created = affected > 0, "Member insert-if-absent");
        Ok(affected > 0)
    }

    async fn upsert(&self, member: &Member) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "INSERT INTO members (phone, name, city, tier, stage, payment_status, \
                 referral_code, referred_by, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
                 ON CONFLICT(phone) DO UPDATE SET \
                 name = excluded.name, city = excluded.city, tier = excluded.tier, \
                 stage = excluded.stage, payment_status = excluded.payment_status, \
                 referral_code = excluded.referral_code, referred_by = excluded.referred_by, \
                 updated_at = excluded.updated_at",
                member_values(member).to_vec(),
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn update_stage_checked(
        &self,
        expected: OnboardingStage,
        member: &Member,
    ) -> Result<bool, StoreError> {
        // Conditional write: only applies if the stored stage is still the
        // one read at the start of handling.
        let affected = self
            .conn()
            .execute(
                "UPDATE members SET name = ?2, city = ?3, tier = ?4, stage = ?5, \
                 payment_status = ?6, referral_code = ?7, referred_by = ?8, updated_at = ?10 \
                 WHERE phone = ?1 AND stage = ?11",
                {
                    let mut values = member_values(member).to_vec();
                    values.push(libsql::Value::Text(expected.as_str().to_string()));
                    values
                },
            )
            .await
            .map_err(query_err)?;
        if affected == 0 {
            debug!(
                phone = %member.phone,
                expected = %expected,
                "Stage update lost the race"
            );
        }
        Ok(affected > 0)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let mut rows = self
            .conn()
            .query("SELECT COUNT(*) FROM members", ())
            .await
            .map_err(query_err)?;
        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(query_err)? as u64),
            None => Ok(0),
        }
    }

    async fn count_referred_by(&self, code: &str) -> Result<u64, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*) FROM members WHERE referred_by = ?1",
                params![code],
            )
            .await
            .map_err(query_err)?;
        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(query_err)? as u64),
            None => Ok(0),
        }
    }

    async fn find_by_referral_code(&self, code: &str) -> Result<Option<Member>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {MEMBER_COLUMNS} FROM members WHERE referral_code = ?1"),
                params![code],
            )
            .await
            .map_err(query_err)?;
        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row_to_member(&row).map_err(query_err)?)),
            None => Ok(None),
        }
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Member>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {MEMBER_COLUMNS} FROM members \
                     ORDER BY created_at DESC LIMIT ?1"
                ),
                params![limit as i64],
            )
            .await
            .map_err(query_err)?;
        let mut members = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            members.push(row_to_member(&row).map_err(query_err)?);
        }
        Ok(members)
    }

    async fn list_by_city(&self, city: Option<&str>) -> Result<Vec<Member>, StoreError> {
        let mut rows = match city {
            Some(city) => self
                .conn()
                .query(
                    &format!(
                        "SELECT {MEMBER_COLUMNS} FROM members \
                         WHERE LOWER(city) = LOWER(?1) ORDER BY created_at ASC"
                    ),
                    params![city],
                )
                .await
                .map_err(query_err)?,
            None => self
                .conn()
                .query(
                    &format!("SELECT {MEMBER_COLUMNS} FROM members ORDER BY created_at ASC"),
                    (),
                )
                .await
                .map_err(query_err)?,
        };
        let mut members = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            members.push(row_to_member(&row).map_err(query_err)?);
        }
        Ok(members)
    }
}

#[async_trait]
impl OrderStore for LibSqlBackend {
    async fn insert(&self, order: &Order) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "INSERT INTO orders (id, member_phone, body, status, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    order.id.to_string(),
                    order.member_phone.as_str(),
                    order.body.as_str(),
                    order.status.as_str(),
                    order.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(query_err)?;
        debug!(id = %order.id, phone = %order.member_phone, "Order inserted");
        Ok(())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Order>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, member_phone, body, status, created_at FROM orders \
                 ORDER BY created_at DESC LIMIT ?1",
                params![limit as i64],
            )
            .await
            .map_err(query_err)?;
        let mut orders = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            orders.push(row_to_order(&row).map_err(query_err)?);
        }
        Ok(orders)
    }

    async fn update_status(&self, id: Uuid, status: OrderStatus) -> Result<(), StoreError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE orders SET status = ?1 WHERE id = ?2",
                params![status.as_str(), id.to_string()],
            )
            .await
            .map_err(query_err)?;
        if affected == 0 {
            return Err(StoreError::NotFound {
                entity: "order".into(),
                key: id.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MessageLog for LibSqlBackend {
    async fn append(&self, record: &MessageRecord) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "INSERT INTO message_log (id, direction, phone, body, intent, stage_before, \
                 stage_after, timestamp) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.id.to_string(),
                    record.direction.as_str(),
                    record.phone.as_str(),
                    record.body.as_str(),
                    opt_text(record.intent.as_deref()),
                    opt_text(record.stage_before.as_deref()),
                    opt_text(record.stage_after.as_deref()),
                    record.timestamp.to_rfc3339(),
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<MessageRecord>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, direction, phone, body, intent, stage_before, stage_after, timestamp \
                 FROM message_log ORDER BY timestamp DESC LIMIT ?1",
                params![limit as i64],
            )
            .await
            .map_err(query_err)?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            records.push(row_to_record(&row).map_err(query_err)?);
        }
        Ok(records)
    }
}

#[async_trait]
impl ConfigStore for LibSqlBackend {
    async fn get(&self, key: &str) -> Result<Option<ConfigEntry>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT key, value, updated_at FROM config WHERE key = ?1",
                params![key],
            )
            .await
            .map_err(query_err)?;
        match rows.next().await.map_err(query_err)? {
            Some(row) => {
                let updated_str: String = row.get(2).map_err(query_err)?;
                Ok(Some(ConfigEntry {
                    key: row.get(0).map_err(query_err)?,
                    value: row.get(1).map_err(query_err)?,
                    updated_at: parse_datetime(&updated_str),
                }))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "INSERT INTO config (key, value, updated_at) VALUES (?1, ?2, ?3) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, \
                 updated_at = excluded.updated_at",
                params![key, value, Utc::now().to_rfc3339()],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    async fn backend() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    fn member(phone: &str) -> Member {
        Member::new(phone, Utc::now())
    }

    #[tokio::test]
    async fn insert_new_then_get() {
        let db = backend().await;
        let m = member("+2348011111111");
        assert!(db.insert_new(&m).await.unwrap());

        let loaded = MemberStore::get(&db, "+2348011111111").await.unwrap().unwrap();
        assert_eq!(loaded.phone, "+2348011111111");
        assert_eq!(loaded.stage, OnboardingStage::New);
        assert_eq!(loaded.payment_status, PaymentStatus::None);
        assert!(loaded.name.is_none());
    }

    #[tokio::test]
    async fn insert_new_is_idempotent() {
        let db = backend().await;
        let m = member("+2348011111111");
        assert!(db.insert_new(&m).await.unwrap());
        // Duplicate delivery loses the race and must not clobber
        assert!(!db.insert_new(&m).await.unwrap());
    }

    #[tokio::test]
    async fn get_missing_member() {
        let db = backend().await;
        assert!(MemberStore::get(&db, "+2348099999999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stage_cas_succeeds_on_expected_stage() {
        let db = backend().await;
        let mut m = member("+2348011111111");
        db.insert_new(&m).await.unwrap();

        m.stage = OnboardingStage::AwaitingName;
        assert!(db
            .update_stage_checked(OnboardingStage::New, &m)
            .await
            .unwrap());

        let loaded = MemberStore::get(&db, &m.phone).await.unwrap().unwrap();
        assert_eq!(loaded.stage, OnboardingStage::AwaitingName);
    }

    #[tokio::test]
    async fn stage_cas_rejects_stale_write() {
        let db = backend().await;
        let mut m = member("+2348011111111");
        db.insert_new(&m).await.unwrap();

        m.stage = OnboardingStage::AwaitingName;
        assert!(db
            .update_stage_checked(OnboardingStage::New, &m)
            .await
            .unwrap());

        // A second handler that also read stage=new must lose
        let mut stale = member("+2348011111111");
        stale.stage = OnboardingStage::AwaitingName;
        stale.name = Some("Imposter".into());
        assert!(!db
            .update_stage_checked(OnboardingStage::New, &stale)
            .await
            .unwrap());

        let loaded = MemberStore::get(&db, &m.phone).await.unwrap().unwrap();
        assert!(loaded.name.is_none());
    }

    #[tokio::test]
    async fn count_and_referrals() {
        let db = backend().await;
        let mut alice = member("+2348011111111");
        alice.referral_code = Some("ALICE1".into());
        db.insert_new(&alice).await.unwrap();

        let mut bob = member("+2348022222222");
        bob.referred_by = Some("ALICE1".into());
        db.insert_new(&bob).await.unwrap();

        let mut carol = member("+2348033333333");
        carol.referred_by = Some("ALICE1".into());
        db.insert_new(&carol).await.unwrap();

        assert_eq!(db.count().await.unwrap(), 3);
        assert_eq!(db.count_referred_by("ALICE1").await.unwrap(), 2);
        assert_eq!(db.count_referred_by("NOBODY").await.unwrap(), 0);

        let found = db.find_by_referral_code("ALICE1").await.unwrap().unwrap();
        assert_eq!(found.phone, alice.phone);
        assert!(db.find_by_referral_code("ZZZ").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn referral_codes_are_unique_in_db() {
        let db = backend().await;
        let mut alice = member("+2348011111111");
        alice.referral_code = Some("SAME01".into());
        db.insert_new(&alice).await.unwrap();

        let mut bob = member("+2348022222222");
        bob.referral_code = Some("SAME01".into());
        // UNIQUE constraint: the duplicate insert is ignored, not applied
        assert!(!db.insert_new(&bob).await.unwrap());
    }

    #[tokio::test]
    async fn list_by_city_is_case_insensitive() {
        let db = backend().await;
        for (phone, city) in [
            ("+2348011111111", Some("Lagos")),
            ("+2348022222222", Some("lagos")),
            ("+2348033333333", Some("Abuja")),
            ("+2348044444444", None),
        ] {
            let mut m = member(phone);
            m.city = city.map(String::from);
            db.insert_new(&m).await.unwrap();
        }

        let lagos = db.list_by_city(Some("LAGOS")).await.unwrap();
        assert_eq!(lagos.len(), 2);

        let all = db.list_by_city(None).await.unwrap();
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn orders_insert_list_and_status() {
        let db = backend().await;
        let m = member("+2348011111111");
        db.insert_new(&m).await.unwrap();

        let order = Order::new(&m.phone, "5 bags of rice", Utc::now());
        db.insert(&order).await.unwrap();

        let recent = OrderStore::list_recent(&db, 10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].body, "5 bags of rice");
        assert_eq!(recent[0].status, OrderStatus::Pending);

        db.update_status(order.id, OrderStatus::Invalid).await.unwrap();
        let recent = OrderStore::list_recent(&db, 10).await.unwrap();
        assert_eq!(recent[0].status, OrderStatus::Invalid);

        let missing = db.update_status(Uuid::new_v4(), OrderStatus::Paid).await;
        assert!(matches!(missing, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn message_log_appends() {
        let db = backend().await;
        let inbound = MessageRecord::inbound("+2348011111111", "hello", Utc::now())
            .with_stages(Some("new"), Some("awaiting_name"));
        db.append(&inbound).await.unwrap();
        let outbound = MessageRecord::outbound("+2348011111111", "welcome", Utc::now())
            .with_intent("onboarding");
        db.append(&outbound).await.unwrap();

        let recent = MessageLog::list_recent(&db, 10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent.iter().any(|r| r.direction == Direction::Inbound
            && r.stage_after.as_deref() == Some("awaiting_name")));
        assert!(recent
            .iter()
            .any(|r| r.direction == Direction::Outbound
                && r.intent.as_deref() == Some("onboarding")));
    }

    #[tokio::test]
    async fn config_last_write_wins() {
        let db = backend().await;
        assert!(ConfigStore::get(&db, "price_sheet_url").await.unwrap().is_none());

        db.set("price_sheet_url", "https://x/y").await.unwrap();
        let entry = ConfigStore::get(&db, "price_sheet_url")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.value, "https://x/y");

        db.set("price_sheet_url", "https://x/z").await.unwrap();
        let entry = ConfigStore::get(&db, "price_sheet_url")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.value, "https://x/z");
    }

    #[tokio::test]
    async fn file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coopbot.db");
        {
            let db = LibSqlBackend::new_local(&path).await.unwrap();
            db.insert_new(&member("+2348011111111")).await.unwrap();
        }
        let db = LibSqlBackend::new_local(&path).await.unwrap();
        assert!(MemberStore::get(&db, "+2348011111111").await.unwrap().is_some());
    }
}
