use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use stayledger_core::domain::fx::{FxRate, FxSnapshot};
use stayledger_core::domain::ids::{BookingId, FxSnapshotId, RuleId, TenantId};
use stayledger_core::domain::money::Currency;
use stayledger_core::domain::rule::PricingRule;
use stayledger_core::domain::settlement::{EntryDirection, SettlementEntry, SettlementMonth};
use stayledger_core::domain::trace::PricingTrace;

pub mod fx;
pub mod rule;
pub mod settlement;
pub mod trace;

pub use fx::SqlFxRepository;
pub use rule::SqlRuleRepository;
pub use settlement::{PostOutcome, SqlSettlementRepository};
pub use trace::SqlTraceRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait RuleRepository: Send + Sync {
    async fn insert(&self, rule: &PricingRule) -> Result<(), RepositoryError>;
    async fn list_active(&self, tenant_id: &TenantId) -> Result<Vec<PricingRule>, RepositoryError>;
    /// Deliberately unscoped: the caller owns the tenant comparison so a
    /// foreign-tenant hit can be rejected loudly instead of silently
    /// filtered away.
    async fn find_by_id(&self, rule_id: &RuleId) -> Result<Option<PricingRule>, RepositoryError>;
    async fn update_status(&self, rule: &PricingRule) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait FxRepository: Send + Sync {
    async fn record_rate(&self, rate: &FxRate) -> Result<(), RepositoryError>;
    async fn latest_as_of(
        &self,
        tenant_id: &TenantId,
        base: &Currency,
        quote: &Currency,
        as_of: DateTime<Utc>,
    ) -> Result<Option<FxRate>, RepositoryError>;
    async fn insert_snapshot(&self, snapshot: &FxSnapshot) -> Result<(), RepositoryError>;
    async fn find_snapshot(
        &self,
        snapshot_id: &FxSnapshotId,
    ) -> Result<Option<FxSnapshot>, RepositoryError>;
    async fn find_snapshot_for_booking(
        &self,
        booking_id: &BookingId,
    ) -> Result<Option<FxSnapshot>, RepositoryError>;
}

#[async_trait]
pub trait SettlementRepository: Send + Sync {
    async fn insert(&self, entry: &SettlementEntry) -> Result<PostOutcome, RepositoryError>;
    async fn find_by_booking(
        &self,
        booking_id: &BookingId,
        direction: EntryDirection,
    ) -> Result<Option<SettlementEntry>, RepositoryError>;
    async fn list_for_month(
        &self,
        tenant_id: &TenantId,
        month: &SettlementMonth,
    ) -> Result<Vec<SettlementEntry>, RepositoryError>;
}

#[async_trait]
pub trait TraceRepository: Send + Sync {
    async fn append(&self, trace: &PricingTrace) -> Result<(), RepositoryError>;
    async fn latest_for_booking(
        &self,
        booking_id: &BookingId,
    ) -> Result<Option<PricingTrace>, RepositoryError>;
}

/// Timestamps are stored as fixed-precision RFC 3339 text so lexicographic
/// ordering in SQL matches chronological ordering.
pub(crate) fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

pub(crate) fn parse_decimal(
    field: &str,
    value: &str,
) -> Result<rust_decimal::Decimal, RepositoryError> {
    use std::str::FromStr;
    rust_decimal::Decimal::from_str(value)
        .map_err(|error| RepositoryError::Decode(format!("invalid decimal for {field}: {error}")))
}

pub(crate) fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("invalid timestamp for {field}: {error}")))
}

pub(crate) fn parse_date(
    field: &str,
    value: &str,
) -> Result<chrono::NaiveDate, RepositoryError> {
    chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|error| RepositoryError::Decode(format!("invalid date for {field}: {error}")))
}
