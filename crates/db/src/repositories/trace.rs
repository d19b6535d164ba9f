use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use stayledger_core::domain::booking::BookingContext;
use stayledger_core::domain::ids::{BookingId, FxSnapshotId, PricingTraceId, RuleId, TenantId};
use stayledger_core::domain::trace::PricingTrace;

use super::{parse_decimal, parse_timestamp, RepositoryError, TraceRepository};
use crate::DbPool;

pub struct SqlTraceRepository {
    pool: DbPool,
}

impl SqlTraceRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn trace_from_row(row: &SqliteRow) -> Result<PricingTrace, RepositoryError> {
    let context_json: String = row.try_get("context_json")?;
    let context: BookingContext = serde_json::from_str(&context_json).map_err(|error| {
        RepositoryError::Decode(format!("failed to decode context_json: {error}"))
    })?;

    let net_amount: String = row.try_get("net_amount")?;
    let sell_amount: String = row.try_get("sell_amount")?;
    let sell_ledger_amount: String = row.try_get("sell_ledger_amount")?;
    let markup_percent: String = row.try_get("markup_percent")?;
    let fallback: i64 = row.try_get("fallback")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(PricingTrace {
        id: PricingTraceId(row.try_get("id")?),
        tenant_id: TenantId(row.try_get("tenant_id")?),
        booking_id: BookingId(row.try_get("booking_id")?),
        matched_rule_id: row.try_get::<Option<String>, _>("matched_rule_id")?.map(RuleId),
        matched_priority: row.try_get("matched_priority")?,
        fallback: fallback != 0,
        context,
        net_amount: parse_decimal("net_amount", &net_amount)?,
        sell_amount: parse_decimal("sell_amount", &sell_amount)?,
        sell_ledger_amount: parse_decimal("sell_ledger_amount", &sell_ledger_amount)?,
        markup_percent: parse_decimal("markup_percent", &markup_percent)?,
        fx_snapshot_id: FxSnapshotId(row.try_get("fx_snapshot_id")?),
        content_hash: row.try_get("content_hash")?,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}

/// Traces are written inside the confirmation transaction; generic over the
/// executor for that reason. Rows are append-only: re-resolution adds a
/// new row and `latest_for_booking` surfaces the most recent one.
pub(crate) async fn insert_trace_with<'e, E>(
    executor: E,
    trace: &PricingTrace,
) -> Result<(), RepositoryError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let context_json = serde_json::to_string(&trace.context).map_err(|error| {
        RepositoryError::Decode(format!("failed to encode context snapshot: {error}"))
    })?;

    sqlx::query(
        r#"
        INSERT INTO pricing_traces (
            id, tenant_id, booking_id, matched_rule_id, matched_priority,
            fallback, context_json, net_amount, sell_amount,
            sell_ledger_amount, markup_percent, fx_snapshot_id,
            content_hash, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&trace.id.0)
    .bind(&trace.tenant_id.0)
    .bind(&trace.booking_id.0)
    .bind(trace.matched_rule_id.as_ref().map(|id| id.0.as_str()))
    .bind(trace.matched_priority)
    .bind(i64::from(trace.fallback))
    .bind(context_json)
    .bind(trace.net_amount.to_string())
    .bind(trace.sell_amount.to_string())
    .bind(trace.sell_ledger_amount.to_string())
    .bind(trace.markup_percent.to_string())
    .bind(&trace.fx_snapshot_id.0)
    .bind(&trace.content_hash)
    .bind(super::format_timestamp(&trace.created_at))
    .execute(executor)
    .await?;

    Ok(())
}

#[async_trait]
impl TraceRepository for SqlTraceRepository {
    async fn append(&self, trace: &PricingTrace) -> Result<(), RepositoryError> {
        insert_trace_with(&self.pool, trace).await
    }

    async fn latest_for_booking(
        &self,
        booking_id: &BookingId,
    ) -> Result<Option<PricingTrace>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, booking_id, matched_rule_id, matched_priority,
                   fallback, context_json, net_amount, sell_amount,
                   sell_ledger_amount, markup_percent, fx_snapshot_id,
                   content_hash, created_at
            FROM pricing_traces
            WHERE booking_id = ?
            ORDER BY rowid DESC
            LIMIT 1
            "#,
        )
        .bind(&booking_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(trace_from_row).transpose()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use stayledger_core::domain::booking::BookingContext;
    use stayledger_core::domain::fx::FxSnapshot;
    use stayledger_core::domain::ids::{
        AgencyId, BookingId, HotelId, ProductId, RuleId, TenantId,
    };
    use stayledger_core::domain::money::Currency;
    use stayledger_core::domain::trace::PricingTrace;
    use stayledger_core::resolver::PricingDecision;

    use super::{SqlTraceRepository, TraceRepository};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    fn context() -> BookingContext {
        BookingContext {
            tenant_id: TenantId("org-1".to_string()),
            agency_id: AgencyId("agency-x".to_string()),
            hotel_id: HotelId("hotel-1".to_string()),
            product_id: ProductId("room-std".to_string()),
            product_type: "hotel".to_string(),
            check_in: NaiveDate::from_ymd_opt(2026, 9, 14).expect("valid date"),
            net_amount: Decimal::new(10000, 2),
            sale_currency: Currency("EUR".to_string()),
        }
    }

    fn trace(booking_id: &str, markup: i64) -> PricingTrace {
        let decision = PricingDecision {
            rule_id: Some(RuleId("r-1".to_string())),
            priority: 200,
            fallback: false,
            markup_percent: Decimal::new(markup, 0),
            net_amount: Decimal::new(10000, 2),
            sell_amount: Decimal::new(10000 + markup * 100, 2),
            explain: Vec::new(),
        };
        let snapshot = FxSnapshot::identity(
            TenantId("org-1".to_string()),
            BookingId(booking_id.to_string()),
            Currency("EUR".to_string()),
        );
        PricingTrace::capture(BookingId(booking_id.to_string()), context(), &decision, &snapshot)
    }

    #[tokio::test]
    async fn append_and_fetch_round_trips_captured_state() {
        let pool = setup_pool().await;
        let repo = SqlTraceRepository::new(pool.clone());

        let written = trace("bk-1", 12);
        repo.append(&written).await.expect("append trace");

        let fetched = repo
            .latest_for_booking(&BookingId("bk-1".to_string()))
            .await
            .expect("fetch trace")
            .expect("trace exists");

        assert_eq!(fetched.matched_rule_id, written.matched_rule_id);
        assert_eq!(fetched.markup_percent, written.markup_percent);
        assert_eq!(fetched.context, written.context);
        assert_eq!(fetched.content_hash, written.content_hash);
        assert!(fetched.verify_content_hash());

        pool.close().await;
    }

    #[tokio::test]
    async fn re_resolution_appends_and_latest_wins() {
        let pool = setup_pool().await;
        let repo = SqlTraceRepository::new(pool.clone());

        repo.append(&trace("bk-2", 10)).await.expect("append first trace");
        let second = trace("bk-2", 12);
        repo.append(&second).await.expect("append second trace");

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM pricing_traces WHERE booking_id = 'bk-2'")
                .fetch_one(&pool)
                .await
                .expect("count traces");
        assert_eq!(count, 2, "re-resolution must append, never overwrite");

        let latest = repo
            .latest_for_booking(&BookingId("bk-2".to_string()))
            .await
            .expect("fetch trace")
            .expect("trace exists");
        assert_eq!(latest.markup_percent, second.markup_percent);

        pool.close().await;
    }

    #[tokio::test]
    async fn missing_booking_returns_none() {
        let pool = setup_pool().await;
        let repo = SqlTraceRepository::new(pool.clone());

        let fetched = repo
            .latest_for_booking(&BookingId("bk-none".to_string()))
            .await
            .expect("fetch trace");
        assert!(fetched.is_none());

        pool.close().await;
    }
}
