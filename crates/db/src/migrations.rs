use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::{run_pending, MIGRATOR};
    use crate::connect_with_settings;

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &[
        "pricing_rules",
        "fx_rates",
        "fx_snapshots",
        "settlement_entries",
        "pricing_traces",
        "idx_pricing_rules_tenant_status",
        "idx_pricing_rules_priority",
        "idx_fx_rates_pair_captured",
        "idx_fx_snapshots_booking",
        "idx_settlement_entries_month",
        "idx_settlement_entries_booking",
        "idx_pricing_traces_booking",
    ];

    #[tokio::test]
    async fn migrations_create_pricing_and_settlement_tables() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for table in ["pricing_rules", "fx_rates", "fx_snapshots", "settlement_entries", "pricing_traces"]
        {
            let count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
            )
            .bind(table)
            .fetch_one(&pool)
            .await
            .expect("check table");
            assert_eq!(count, 1, "expected table `{table}` to exist");
        }
    }

    #[tokio::test]
    async fn duplicate_original_entries_are_rejected_by_schema() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let insert = "INSERT INTO settlement_entries (
                id, tenant_id, booking_id, agency_id, hotel_id, direction,
                gross, commission, net, currency, sale_currency,
                settlement_status, month, reversal_of, created_at
            ) VALUES (?, 'org-1', 'bk-1', 'ag-1', 'ho-1', 'original',
                '100', '10', '90', 'EUR', 'EUR', 'open', '2026-09', NULL,
                '2026-09-01T00:00:00Z')";

        sqlx::query(insert).bind("entry-1").execute(&pool).await.expect("first insert");
        let error = sqlx::query(insert).bind("entry-2").execute(&pool).await;
        assert!(error.is_err(), "second original for the same booking must violate uniqueness");
    }

    #[tokio::test]
    async fn migrations_are_reversible() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'settlement_entries'",
        )
        .fetch_one(&pool)
        .await
        .expect("check settlement_entries removed");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn migrations_up_down_up_preserves_schema_signature() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let initial_signature = managed_schema_signature(&pool).await;
        assert_eq!(
            initial_signature.len(),
            MANAGED_SCHEMA_OBJECTS.len(),
            "initial migration pass should create all managed schema objects",
        );

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");

        let after_down_signature = managed_schema_signature(&pool).await;
        assert!(
            after_down_signature.is_empty(),
            "managed schema objects should be removed after full undo",
        );

        run_pending(&pool).await.expect("re-run migrations");

        let after_second_up_signature = managed_schema_signature(&pool).await;
        assert_eq!(
            after_second_up_signature, initial_signature,
            "up/down/up should preserve migration-managed schema signature",
        );
    }

    async fn managed_schema_signature(pool: &sqlx::SqlitePool) -> Vec<(String, String, String)> {
        let mut signature: Vec<(String, String, String)> = sqlx::query(
            "SELECT type, name, IFNULL(sql, '') AS sql
             FROM sqlite_master
             WHERE type IN ('table', 'index')",
        )
        .fetch_all(pool)
        .await
        .expect("load schema objects")
        .into_iter()
        .filter_map(|row| {
            let name = row.get::<String, _>("name");
            if MANAGED_SCHEMA_OBJECTS.contains(&name.as_str()) {
                Some((row.get::<String, _>("type"), name, row.get::<String, _>("sql")))
            } else {
                None
            }
        })
        .collect();
        signature.sort();
        signature
    }
}
