use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use stayledger_core::domain::fx::{FxRate, FxSnapshot};
use stayledger_core::domain::ids::{BookingId, FxSnapshotId, TenantId};
use stayledger_core::domain::money::Currency;

use super::{parse_decimal, parse_timestamp, FxRepository, RepositoryError};
use crate::DbPool;

pub struct SqlFxRepository {
    pool: DbPool,
}

impl SqlFxRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn rate_from_row(row: &SqliteRow) -> Result<FxRate, RepositoryError> {
        let rate: String = row.try_get("rate")?;
        let captured_at: String = row.try_get("captured_at")?;
        Ok(FxRate {
            tenant_id: TenantId(row.try_get("tenant_id")?),
            base: Currency(row.try_get("base_currency")?),
            quote: Currency(row.try_get("quote_currency")?),
            rate: parse_decimal("rate", &rate)?,
            rate_basis: row.try_get("rate_basis")?,
            captured_at: parse_timestamp("captured_at", &captured_at)?,
        })
    }

    fn snapshot_from_row(row: &SqliteRow) -> Result<FxSnapshot, RepositoryError> {
        let rate: String = row.try_get("rate")?;
        let captured_at: String = row.try_get("captured_at")?;
        let created_at: String = row.try_get("created_at")?;
        Ok(FxSnapshot {
            id: FxSnapshotId(row.try_get("id")?),
            tenant_id: TenantId(row.try_get("tenant_id")?),
            booking_id: BookingId(row.try_get("booking_id")?),
            base: Currency(row.try_get("base_currency")?),
            quote: Currency(row.try_get("quote_currency")?),
            rate: parse_decimal("rate", &rate)?,
            rate_basis: row.try_get("rate_basis")?,
            captured_at: parse_timestamp("captured_at", &captured_at)?,
            created_at: parse_timestamp("created_at", &created_at)?,
        })
    }
}

/// Snapshot inserts also run inside the confirmation transaction, so the
/// statement is generic over the executor.
pub(crate) async fn insert_snapshot_with<'e, E>(
    executor: E,
    snapshot: &FxSnapshot,
) -> Result<(), RepositoryError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO fx_snapshots (
            id, tenant_id, booking_id, base_currency, quote_currency,
            rate, rate_basis, captured_at, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&snapshot.id.0)
    .bind(&snapshot.tenant_id.0)
    .bind(&snapshot.booking_id.0)
    .bind(snapshot.base.as_str())
    .bind(snapshot.quote.as_str())
    .bind(snapshot.rate.to_string())
    .bind(&snapshot.rate_basis)
    .bind(super::format_timestamp(&snapshot.captured_at))
    .bind(super::format_timestamp(&snapshot.created_at))
    .execute(executor)
    .await?;

    Ok(())
}

#[async_trait]
impl FxRepository for SqlFxRepository {
    /// Each capture is a new catalog row; history stays queryable so
    /// "latest as of" stays stable under later corrections.
    async fn record_rate(&self, rate: &FxRate) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO fx_rates (
                id, tenant_id, base_currency, quote_currency, rate, rate_basis, captured_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&rate.tenant_id.0)
        .bind(rate.base.as_str())
        .bind(rate.quote.as_str())
        .bind(rate.rate.to_string())
        .bind(&rate.rate_basis)
        .bind(super::format_timestamp(&rate.captured_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn latest_as_of(
        &self,
        tenant_id: &TenantId,
        base: &Currency,
        quote: &Currency,
        as_of: DateTime<Utc>,
    ) -> Result<Option<FxRate>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT tenant_id, base_currency, quote_currency, rate, rate_basis, captured_at
            FROM fx_rates
            WHERE tenant_id = ? AND base_currency = ? AND quote_currency = ? AND captured_at <= ?
            ORDER BY captured_at DESC
            LIMIT 1
            "#,
        )
        .bind(&tenant_id.0)
        .bind(base.as_str())
        .bind(quote.as_str())
        .bind(super::format_timestamp(&as_of))
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::rate_from_row).transpose()
    }

    async fn insert_snapshot(&self, snapshot: &FxSnapshot) -> Result<(), RepositoryError> {
        insert_snapshot_with(&self.pool, snapshot).await
    }

    async fn find_snapshot(
        &self,
        snapshot_id: &FxSnapshotId,
    ) -> Result<Option<FxSnapshot>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, booking_id, base_currency, quote_currency,
                   rate, rate_basis, captured_at, created_at
            FROM fx_snapshots
            WHERE id = ?
            "#,
        )
        .bind(&snapshot_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::snapshot_from_row).transpose()
    }

    async fn find_snapshot_for_booking(
        &self,
        booking_id: &BookingId,
    ) -> Result<Option<FxSnapshot>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, booking_id, base_currency, quote_currency,
                   rate, rate_basis, captured_at, created_at
            FROM fx_snapshots
            WHERE booking_id = ?
            ORDER BY rowid DESC
            LIMIT 1
            "#,
        )
        .bind(&booking_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::snapshot_from_row).transpose()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use stayledger_core::domain::fx::{FxRate, FxSnapshot};
    use stayledger_core::domain::ids::{BookingId, TenantId};
    use stayledger_core::domain::money::Currency;

    use super::{FxRepository, SqlFxRepository};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    fn eur_try(rate: i64, age_hours: i64) -> FxRate {
        FxRate {
            tenant_id: TenantId("org-1".to_string()),
            base: Currency("EUR".to_string()),
            quote: Currency("TRY".to_string()),
            rate: Decimal::new(rate, 0),
            rate_basis: "central_bank".to_string(),
            captured_at: Utc::now() - Duration::hours(age_hours),
        }
    }

    #[tokio::test]
    async fn latest_as_of_picks_newest_capture_not_after_cutoff() {
        let pool = setup_pool().await;
        let repo = SqlFxRepository::new(pool.clone());

        repo.record_rate(&eur_try(34, 48)).await.expect("record older rate");
        repo.record_rate(&eur_try(35, 2)).await.expect("record newer rate");
        repo.record_rate(&eur_try(36, 1)).await.expect("record newest rate");

        let found = repo
            .latest_as_of(
                &TenantId("org-1".to_string()),
                &Currency("EUR".to_string()),
                &Currency("TRY".to_string()),
                Utc::now() - Duration::minutes(90),
            )
            .await
            .expect("lookup rate")
            .expect("rate exists");
        assert_eq!(found.rate, Decimal::new(35, 0));

        pool.close().await;
    }

    #[tokio::test]
    async fn latest_as_of_is_tenant_scoped() {
        let pool = setup_pool().await;
        let repo = SqlFxRepository::new(pool.clone());
        repo.record_rate(&eur_try(35, 1)).await.expect("record rate");

        let foreign = repo
            .latest_as_of(
                &TenantId("org-2".to_string()),
                &Currency("EUR".to_string()),
                &Currency("TRY".to_string()),
                Utc::now(),
            )
            .await
            .expect("lookup rate");
        assert!(foreign.is_none());

        pool.close().await;
    }

    #[tokio::test]
    async fn snapshot_round_trips_and_resolves_by_booking() {
        let pool = setup_pool().await;
        let repo = SqlFxRepository::new(pool.clone());

        let snapshot =
            FxSnapshot::from_rate(BookingId("bk-77".to_string()), &eur_try(35, 1));
        repo.insert_snapshot(&snapshot).await.expect("insert snapshot");

        let by_id = repo
            .find_snapshot(&snapshot.id)
            .await
            .expect("find snapshot")
            .expect("snapshot exists");
        assert_eq!(by_id.rate, snapshot.rate);
        assert_eq!(by_id.booking_id, snapshot.booking_id);

        let by_booking = repo
            .find_snapshot_for_booking(&BookingId("bk-77".to_string()))
            .await
            .expect("find snapshot by booking")
            .expect("snapshot exists");
        assert_eq!(by_booking.id, snapshot.id);

        pool.close().await;
    }

    #[tokio::test]
    async fn catalog_updates_do_not_touch_existing_snapshots() {
        let pool = setup_pool().await;
        let repo = SqlFxRepository::new(pool.clone());

        let rate = eur_try(35, 2);
        repo.record_rate(&rate).await.expect("record rate");
        let snapshot = FxSnapshot::from_rate(BookingId("bk-1".to_string()), &rate);
        repo.insert_snapshot(&snapshot).await.expect("insert snapshot");

        repo.record_rate(&eur_try(40, 0)).await.expect("record updated rate");

        let stored = repo
            .find_snapshot(&snapshot.id)
            .await
            .expect("find snapshot")
            .expect("snapshot exists");
        assert_eq!(stored.rate, Decimal::new(35, 0), "snapshot keeps the rate it captured");

        pool.close().await;
    }
}
