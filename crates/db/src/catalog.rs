use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use stayledger_core::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use stayledger_core::domain::ids::{RuleId, TenantId};
use stayledger_core::domain::rule::{PricingRule, RuleAction, RuleScope, RuleStatus, RuleValidity};
use stayledger_core::errors::DomainError;

use crate::confirmation::ServiceError;
use crate::repositories::{RuleRepository, SqlRuleRepository};
use crate::DbPool;

#[derive(Clone, Debug)]
pub struct RuleDraft {
    pub tenant_id: TenantId,
    pub scope: RuleScope,
    pub priority: i32,
    pub validity: RuleValidity,
    pub action: RuleAction,
    pub notes: Option<String>,
}

/// Tenant-scoped storage and lookup of pricing rules. Rules are soft-retired
/// through status transitions; nothing is ever deleted.
pub struct RuleCatalog {
    rules: SqlRuleRepository,
    audit: Arc<dyn AuditSink>,
}

impl RuleCatalog {
    pub fn new(pool: DbPool, audit: Arc<dyn AuditSink>) -> Self {
        Self { rules: SqlRuleRepository::new(pool), audit }
    }

    /// Creates an active rule. A second active rule with the same priority
    /// and overlapping scope/validity is rejected here, at creation time,
    /// so match-time resolution never depends on a silent tie-break.
    pub async fn create_rule(&self, draft: RuleDraft) -> Result<PricingRule, ServiceError> {
        let rule = PricingRule {
            id: RuleId(Uuid::new_v4().to_string()),
            tenant_id: draft.tenant_id,
            scope: draft.scope,
            priority: draft.priority,
            validity: draft.validity,
            action: draft.action,
            status: RuleStatus::Active,
            notes: draft.notes,
            created_at: Utc::now(),
        };
        rule.validate()?;

        let existing = self.rules.list_active(&rule.tenant_id).await?;
        if let Some(conflict) = existing.iter().find(|other| rule.conflicts_with(other)) {
            return Err(DomainError::Validation(format!(
                "rule conflicts with active rule `{}`: same priority {} with overlapping scope and validity",
                conflict.id.0, rule.priority
            ))
            .into());
        }

        self.rules.insert(&rule).await?;

        self.audit.emit(
            AuditEvent::new(
                rule.tenant_id.0.clone(),
                None,
                Uuid::new_v4().to_string(),
                "pricing.rule_created",
                AuditCategory::Pricing,
                "rule-catalog",
                AuditOutcome::Success,
            )
            .with_metadata("rule_id", rule.id.0.clone())
            .with_metadata("priority", rule.priority.to_string()),
        );

        Ok(rule)
    }

    pub async fn list_active(&self, tenant_id: &TenantId) -> Result<Vec<PricingRule>, ServiceError> {
        Ok(self.rules.list_active(tenant_id).await?)
    }

    pub async fn archive_rule(
        &self,
        tenant_id: &TenantId,
        rule_id: &RuleId,
    ) -> Result<PricingRule, ServiceError> {
        let mut rule = self.rules.find_by_id(rule_id).await?.ok_or_else(|| {
            DomainError::NotFound { resource: format!("pricing rule {}", rule_id.0) }
        })?;

        if rule.tenant_id != *tenant_id {
            self.audit.emit(
                AuditEvent::new(
                    tenant_id.0.clone(),
                    None,
                    Uuid::new_v4().to_string(),
                    "security.tenant_scope_violation",
                    AuditCategory::Security,
                    "rule-catalog",
                    AuditOutcome::Rejected,
                )
                .with_metadata("rule_id", rule_id.0.clone())
                .with_metadata("owner_tenant", rule.tenant_id.0.clone()),
            );
            return Err(DomainError::TenantScopeViolation {
                resource: format!("pricing rule {}", rule_id.0),
            }
            .into());
        }

        rule.transition_to(RuleStatus::Archived)?;
        self.rules.update_status(&rule).await?;

        self.audit.emit(
            AuditEvent::new(
                tenant_id.0.clone(),
                None,
                Uuid::new_v4().to_string(),
                "pricing.rule_archived",
                AuditCategory::Pricing,
                "rule-catalog",
                AuditOutcome::Success,
            )
            .with_metadata("rule_id", rule.id.0.clone()),
        );

        Ok(rule)
    }
}
