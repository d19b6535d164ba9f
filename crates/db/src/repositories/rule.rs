use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use stayledger_core::domain::ids::{AgencyId, ProductId, RuleId, TenantId};
use stayledger_core::domain::rule::{PricingRule, RuleAction, RuleScope, RuleValidity};

use super::{parse_date, parse_decimal, parse_timestamp, RepositoryError, RuleRepository};
use crate::DbPool;

pub struct SqlRuleRepository {
    pool: DbPool,
}

impl SqlRuleRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn rule_from_row(row: &SqliteRow) -> Result<PricingRule, RepositoryError> {
        let action_type: String = row.try_get("action_type")?;
        let action_value: String = row.try_get("action_value")?;
        let action = RuleAction::from_parts(&action_type, parse_decimal("action_value", &action_value)?)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        let status: String = row.try_get("status")?;
        let status = status
            .parse()
            .map_err(|error: stayledger_core::DomainError| RepositoryError::Decode(error.to_string()))?;

        let valid_from: Option<String> = row.try_get("valid_from")?;
        let valid_to: Option<String> = row.try_get("valid_to")?;
        let created_at: String = row.try_get("created_at")?;

        Ok(PricingRule {
            id: RuleId(row.try_get("id")?),
            tenant_id: TenantId(row.try_get("tenant_id")?),
            scope: RuleScope {
                agency_id: row.try_get::<Option<String>, _>("agency_id")?.map(AgencyId),
                product_id: row.try_get::<Option<String>, _>("product_id")?.map(ProductId),
                product_type: row.try_get("product_type")?,
            },
            priority: row.try_get("priority")?,
            validity: RuleValidity {
                from: valid_from.map(|value| parse_date("valid_from", &value)).transpose()?,
                to: valid_to.map(|value| parse_date("valid_to", &value)).transpose()?,
            },
            action,
            status,
            notes: row.try_get("notes")?,
            created_at: parse_timestamp("created_at", &created_at)?,
        })
    }
}

#[async_trait]
impl RuleRepository for SqlRuleRepository {
    async fn insert(&self, rule: &PricingRule) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO pricing_rules (
                id, tenant_id, agency_id, product_id, product_type,
                priority, valid_from, valid_to, action_type, action_value,
                status, notes, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&rule.id.0)
        .bind(&rule.tenant_id.0)
        .bind(rule.scope.agency_id.as_ref().map(|id| id.0.as_str()))
        .bind(rule.scope.product_id.as_ref().map(|id| id.0.as_str()))
        .bind(rule.scope.product_type.as_deref())
        .bind(rule.priority)
        .bind(rule.validity.from.map(|date| date.format("%Y-%m-%d").to_string()))
        .bind(rule.validity.to.map(|date| date.format("%Y-%m-%d").to_string()))
        .bind(rule.action.kind())
        .bind(rule.action.markup_percent().to_string())
        .bind(rule.status.as_str())
        .bind(rule.notes.as_deref())
        .bind(super::format_timestamp(&rule.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_active(&self, tenant_id: &TenantId) -> Result<Vec<PricingRule>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, agency_id, product_id, product_type,
                   priority, valid_from, valid_to, action_type, action_value,
                   status, notes, created_at
            FROM pricing_rules
            WHERE tenant_id = ? AND status = 'active'
            ORDER BY priority DESC, created_at ASC, id ASC
            "#,
        )
        .bind(&tenant_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::rule_from_row).collect()
    }

    async fn find_by_id(&self, rule_id: &RuleId) -> Result<Option<PricingRule>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, agency_id, product_id, product_type,
                   priority, valid_from, valid_to, action_type, action_value,
                   status, notes, created_at
            FROM pricing_rules
            WHERE id = ?
            "#,
        )
        .bind(&rule_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::rule_from_row).transpose()
    }

    async fn update_status(&self, rule: &PricingRule) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE pricing_rules SET status = ? WHERE id = ? AND tenant_id = ?")
            .bind(rule.status.as_str())
            .bind(&rule.id.0)
            .bind(&rule.tenant_id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
