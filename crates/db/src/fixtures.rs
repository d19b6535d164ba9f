//! Deterministic demo fixtures: one tenant, a rule pair covering the common
//! setup (agency-specific high-priority markup over a catalog-wide base
//! markup), and an fx catalog for the common sale currencies. Seeding is
//! idempotent: rows are keyed by fixed ids and re-applying is a no-op.

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

pub const SEED_TENANT_ID: &str = "org-aurora-travel";

struct SeedRule {
    id: &'static str,
    agency_id: Option<&'static str>,
    product_type: &'static str,
    priority: i32,
    markup_percent: &'static str,
    notes: &'static str,
}

const SEED_RULES: &[SeedRule] = &[
    SeedRule {
        id: "rule-nova-hotel-peak",
        agency_id: Some("agency-nova"),
        product_type: "hotel",
        priority: 200,
        markup_percent: "12",
        notes: "negotiated agency margin",
    },
    SeedRule {
        id: "rule-hotel-base",
        agency_id: None,
        product_type: "hotel",
        priority: 100,
        markup_percent: "10",
        notes: "catalog-wide base markup",
    },
];

struct SeedFxRate {
    id: &'static str,
    quote_currency: &'static str,
    rate: &'static str,
    captured_at: &'static str,
}

const SEED_BASE_CURRENCY: &str = "EUR";

const SEED_FX_RATES: &[SeedFxRate] = &[
    SeedFxRate {
        id: "fxr-eur-try-seed",
        quote_currency: "TRY",
        rate: "35",
        captured_at: "2026-08-01T06:00:00.000000Z",
    },
    SeedFxRate {
        id: "fxr-eur-usd-seed",
        quote_currency: "USD",
        rate: "1.08",
        captured_at: "2026-08-01T06:00:00.000000Z",
    },
    SeedFxRate {
        id: "fxr-eur-gbp-seed",
        quote_currency: "GBP",
        rate: "0.86",
        captured_at: "2026-08-01T06:00:00.000000Z",
    },
];

const SEED_CREATED_AT: &str = "2026-08-01T06:00:00.000000Z";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedResult {
    pub rules_seeded: usize,
    pub fx_rates_seeded: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationResult {
    pub rules_present: i64,
    pub fx_rates_present: i64,
    pub complete: bool,
}

pub struct SeedDataset;

impl SeedDataset {
    pub async fn apply(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut rules_seeded = 0;
        for rule in SEED_RULES {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO pricing_rules (
                    id, tenant_id, agency_id, product_id, product_type,
                    priority, valid_from, valid_to, action_type, action_value,
                    status, notes, created_at
                ) VALUES (?, ?, ?, NULL, ?, ?, NULL, NULL, 'markup_percent', ?, 'active', ?, ?)
                "#,
            )
            .bind(rule.id)
            .bind(SEED_TENANT_ID)
            .bind(rule.agency_id)
            .bind(rule.product_type)
            .bind(rule.priority)
            .bind(rule.markup_percent)
            .bind(rule.notes)
            .bind(SEED_CREATED_AT)
            .execute(pool)
            .await?;
            rules_seeded += result.rows_affected() as usize;
        }

        let mut fx_rates_seeded = 0;
        for rate in SEED_FX_RATES {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO fx_rates (
                    id, tenant_id, base_currency, quote_currency, rate, rate_basis, captured_at
                ) VALUES (?, ?, ?, ?, ?, 'seed', ?)
                "#,
            )
            .bind(rate.id)
            .bind(SEED_TENANT_ID)
            .bind(SEED_BASE_CURRENCY)
            .bind(rate.quote_currency)
            .bind(rate.rate)
            .bind(rate.captured_at)
            .execute(pool)
            .await?;
            fx_rates_seeded += result.rows_affected() as usize;
        }

        Ok(SeedResult { rules_seeded, fx_rates_seeded })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let rules_present: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM pricing_rules WHERE tenant_id = ? AND status = 'active'",
        )
        .bind(SEED_TENANT_ID)
        .fetch_one(pool)
        .await?;

        let fx_rates_present: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM fx_rates WHERE tenant_id = ?")
                .bind(SEED_TENANT_ID)
                .fetch_one(pool)
                .await?;

        Ok(VerificationResult {
            rules_present,
            fx_rates_present,
            complete: rules_present >= SEED_RULES.len() as i64
                && fx_rates_present >= SEED_FX_RATES.len() as i64,
        })
    }
}
