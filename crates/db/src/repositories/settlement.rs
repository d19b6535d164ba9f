use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use stayledger_core::domain::ids::{
    AgencyId, BookingId, HotelId, SettlementEntryId, TenantId,
};
use stayledger_core::domain::money::Currency;
use stayledger_core::domain::settlement::{
    EntryDirection, SettlementEntry, SettlementMonth,
};

use super::{parse_decimal, parse_timestamp, RepositoryError, SettlementRepository};
use crate::DbPool;

/// Result of posting an entry against the append-only ledger. A duplicate
/// confirmation or reversal is not an error: the loser observes the
/// winner's row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PostOutcome {
    Posted(SettlementEntry),
    AlreadyPosted(SettlementEntry),
}

impl PostOutcome {
    pub fn entry(&self) -> &SettlementEntry {
        match self {
            Self::Posted(entry) | Self::AlreadyPosted(entry) => entry,
        }
    }

    pub fn replayed(&self) -> bool {
        matches!(self, Self::AlreadyPosted(_))
    }
}

pub struct SqlSettlementRepository {
    pool: DbPool,
}

impl SqlSettlementRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn entry_from_row(row: &SqliteRow) -> Result<SettlementEntry, RepositoryError> {
    let direction: String = row.try_get("direction")?;
    let status: String = row.try_get("settlement_status")?;
    let gross: String = row.try_get("gross")?;
    let commission: String = row.try_get("commission")?;
    let net: String = row.try_get("net")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(SettlementEntry {
        id: SettlementEntryId(row.try_get("id")?),
        tenant_id: TenantId(row.try_get("tenant_id")?),
        booking_id: BookingId(row.try_get("booking_id")?),
        agency_id: AgencyId(row.try_get("agency_id")?),
        hotel_id: HotelId(row.try_get("hotel_id")?),
        direction: direction
            .parse::<EntryDirection>()
            .map_err(|error| RepositoryError::Decode(error.to_string()))?,
        gross: parse_decimal("gross", &gross)?,
        commission: parse_decimal("commission", &commission)?,
        net: parse_decimal("net", &net)?,
        currency: Currency(row.try_get("currency")?),
        sale_currency: Currency(row.try_get("sale_currency")?),
        status: status.parse().map_err(
            |error: stayledger_core::DomainError| RepositoryError::Decode(error.to_string()),
        )?,
        month: SettlementMonth(row.try_get("month")?),
        reversal_of: row.try_get::<Option<String>, _>("reversal_of")?.map(SettlementEntryId),
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}

const SELECT_COLUMNS: &str = "id, tenant_id, booking_id, agency_id, hotel_id, direction, \
     gross, commission, net, currency, sale_currency, settlement_status, month, reversal_of, \
     created_at";

/// Idempotent append: `(tenant_id, booking_id, direction)` is unique, so a
/// duplicate post affects zero rows and the caller fetches the winner.
/// Returns the number of rows written. Also used inside the confirmation
/// transaction, hence generic over the executor.
pub(crate) async fn insert_entry_with<'e, E>(
    executor: E,
    entry: &SettlementEntry,
) -> Result<u64, RepositoryError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO settlement_entries (
            id, tenant_id, booking_id, agency_id, hotel_id, direction,
            gross, commission, net, currency, sale_currency,
            settlement_status, month, reversal_of, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (tenant_id, booking_id, direction) DO NOTHING
        "#,
    )
    .bind(&entry.id.0)
    .bind(&entry.tenant_id.0)
    .bind(&entry.booking_id.0)
    .bind(&entry.agency_id.0)
    .bind(&entry.hotel_id.0)
    .bind(entry.direction.as_str())
    .bind(entry.gross.to_string())
    .bind(entry.commission.to_string())
    .bind(entry.net.to_string())
    .bind(entry.currency.as_str())
    .bind(entry.sale_currency.as_str())
    .bind(entry.status.as_str())
    .bind(&entry.month.0)
    .bind(entry.reversal_of.as_ref().map(|id| id.0.as_str()))
    .bind(super::format_timestamp(&entry.created_at))
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

pub(crate) async fn fetch_by_booking(
    pool: &DbPool,
    booking_id: &BookingId,
    direction: EntryDirection,
) -> Result<Option<SettlementEntry>, RepositoryError> {
    let row = sqlx::query(&format!(
        "SELECT {SELECT_COLUMNS} FROM settlement_entries WHERE booking_id = ? AND direction = ?"
    ))
    .bind(&booking_id.0)
    .bind(direction.as_str())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(entry_from_row).transpose()
}

#[async_trait]
impl SettlementRepository for SqlSettlementRepository {
    async fn insert(&self, entry: &SettlementEntry) -> Result<PostOutcome, RepositoryError> {
        let written = insert_entry_with(&self.pool, entry).await?;
        if written > 0 {
            return Ok(PostOutcome::Posted(entry.clone()));
        }

        let existing = fetch_by_booking(&self.pool, &entry.booking_id, entry.direction)
            .await?
            .ok_or_else(|| {
                RepositoryError::Decode(format!(
                    "settlement insert for booking {} affected no rows but no winner exists",
                    entry.booking_id.0
                ))
            })?;
        Ok(PostOutcome::AlreadyPosted(existing))
    }

    async fn find_by_booking(
        &self,
        booking_id: &BookingId,
        direction: EntryDirection,
    ) -> Result<Option<SettlementEntry>, RepositoryError> {
        fetch_by_booking(&self.pool, booking_id, direction).await
    }

    async fn list_for_month(
        &self,
        tenant_id: &TenantId,
        month: &SettlementMonth,
    ) -> Result<Vec<SettlementEntry>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM settlement_entries
             WHERE tenant_id = ? AND month = ?
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(&tenant_id.0)
        .bind(&month.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(entry_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use stayledger_core::domain::booking::{Booking, BookingAmounts};
    use stayledger_core::domain::ids::{
        AgencyId, BookingId, FxSnapshotId, HotelId, ProductId, TenantId,
    };
    use stayledger_core::domain::money::Currency;
    use stayledger_core::domain::settlement::{
        split_commission, EntryDirection, SettlementEntry, SettlementMonth,
    };

    use super::{PostOutcome, SettlementRepository, SqlSettlementRepository};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    fn original_entry(booking_id: &str) -> SettlementEntry {
        let booking = Booking {
            id: BookingId(booking_id.to_string()),
            tenant_id: TenantId("org-1".to_string()),
            agency_id: AgencyId("agency-x".to_string()),
            hotel_id: HotelId("hotel-1".to_string()),
            product_id: ProductId("room-std".to_string()),
            check_in: NaiveDate::from_ymd_opt(2026, 9, 14).expect("valid date"),
            sale_currency: Currency("TRY".to_string()),
            amounts: BookingAmounts {
                net: Decimal::new(220000, 2),
                sell: Decimal::new(246400, 2),
                sell_ledger: Decimal::new(7040, 2),
            },
            fx_snapshot_id: FxSnapshotId("snap-1".to_string()),
        };
        let split = split_commission(Decimal::new(7040, 2), Decimal::new(15, 2)).expect("split");
        SettlementEntry::original(&booking, split, Currency("EUR".to_string()))
    }

    #[tokio::test]
    async fn duplicate_post_returns_winner_entry_without_second_row() {
        let pool = setup_pool().await;
        let repo = SqlSettlementRepository::new(pool.clone());

        let first = repo.insert(&original_entry("bk-1")).await.expect("first post");
        assert!(matches!(first, PostOutcome::Posted(_)));

        let second = repo.insert(&original_entry("bk-1")).await.expect("second post");
        assert!(second.replayed());
        assert_eq!(second.entry().id, first.entry().id);

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM settlement_entries WHERE booking_id = 'bk-1'",
        )
        .fetch_one(&pool)
        .await
        .expect("count entries");
        assert_eq!(count, 1);

        pool.close().await;
    }

    #[tokio::test]
    async fn reversal_posts_alongside_original_exactly_once() {
        let pool = setup_pool().await;
        let repo = SqlSettlementRepository::new(pool.clone());

        let original = original_entry("bk-2");
        repo.insert(&original).await.expect("post original");

        let reversal = SettlementEntry::reversal_of(&original);
        let first = repo.insert(&reversal).await.expect("post reversal");
        assert!(!first.replayed());

        let replay = repo
            .insert(&SettlementEntry::reversal_of(&original))
            .await
            .expect("replay reversal");
        assert!(replay.replayed());
        assert_eq!(replay.entry().id, first.entry().id);

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM settlement_entries WHERE booking_id = 'bk-2'",
        )
        .fetch_one(&pool)
        .await
        .expect("count entries");
        assert_eq!(count, 2);

        pool.close().await;
    }

    #[tokio::test]
    async fn list_for_month_returns_both_directions_in_insert_order() {
        let pool = setup_pool().await;
        let repo = SqlSettlementRepository::new(pool.clone());

        let original = original_entry("bk-3");
        repo.insert(&original).await.expect("post original");
        repo.insert(&SettlementEntry::reversal_of(&original)).await.expect("post reversal");

        let listed = repo
            .list_for_month(
                &TenantId("org-1".to_string()),
                &SettlementMonth("2026-09".to_string()),
            )
            .await
            .expect("list month");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].direction, EntryDirection::Original);
        assert_eq!(listed[1].direction, EntryDirection::Reversal);
        assert_eq!(listed[0].gross + listed[1].gross, Decimal::ZERO);

        pool.close().await;
    }

    #[tokio::test]
    async fn list_for_month_excludes_foreign_tenants() {
        let pool = setup_pool().await;
        let repo = SqlSettlementRepository::new(pool.clone());

        let mut foreign = original_entry("bk-4");
        foreign.tenant_id = TenantId("org-2".to_string());
        repo.insert(&foreign).await.expect("post foreign entry");

        let listed = repo
            .list_for_month(
                &TenantId("org-1".to_string()),
                &SettlementMonth("2026-09".to_string()),
            )
            .await
            .expect("list month");
        assert!(listed.is_empty());

        pool.close().await;
    }
}
