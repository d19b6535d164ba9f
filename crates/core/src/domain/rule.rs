use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::booking::BookingContext;
use crate::domain::ids::{AgencyId, ProductId, RuleId, TenantId};
use crate::domain::money::round_money;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    Active,
    Inactive,
    Archived,
}

impl RuleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Archived => "archived",
        }
    }
}

impl std::str::FromStr for RuleStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "archived" => Ok(Self::Archived),
            other => Err(DomainError::Validation(format!(
                "unsupported rule status `{other}` (expected active|inactive|archived)"
            ))),
        }
    }
}

/// Scope fields are wildcards when absent; each one matches independently.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleScope {
    pub agency_id: Option<AgencyId>,
    pub product_id: Option<ProductId>,
    pub product_type: Option<String>,
}

impl RuleScope {
    pub fn matches(&self, context: &BookingContext) -> bool {
        field_matches(&self.agency_id, &context.agency_id)
            && field_matches(&self.product_id, &context.product_id)
            && field_matches(&self.product_type, &context.product_type)
    }

    /// Two scopes overlap when every field pair can match the same booking.
    pub fn overlaps(&self, other: &RuleScope) -> bool {
        fields_overlap(&self.agency_id, &other.agency_id)
            && fields_overlap(&self.product_id, &other.product_id)
            && fields_overlap(&self.product_type, &other.product_type)
    }
}

fn field_matches<T: PartialEq>(scope_field: &Option<T>, context_field: &T) -> bool {
    scope_field.as_ref().map_or(true, |expected| expected == context_field)
}

fn fields_overlap<T: PartialEq>(left: &Option<T>, right: &Option<T>) -> bool {
    match (left, right) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

/// Half-open interval on the check-in date: `from <= check_in < to`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleValidity {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl RuleValidity {
    pub fn contains(&self, check_in: NaiveDate) -> bool {
        self.from.map_or(true, |from| from <= check_in)
            && self.to.map_or(true, |to| check_in < to)
    }

    pub fn overlaps(&self, other: &RuleValidity) -> bool {
        let self_starts_before_other_ends = match (self.from, other.to) {
            (Some(from), Some(to)) => from < to,
            _ => true,
        };
        let other_starts_before_self_ends = match (other.from, self.to) {
            (Some(from), Some(to)) => from < to,
            _ => true,
        };
        self_starts_before_other_ends && other_starts_before_self_ends
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from >= to {
                return Err(DomainError::Validation(format!(
                    "validity interval is empty: from `{from}` must precede to `{to}`"
                )));
            }
        }
        Ok(())
    }
}

/// Tagged action variant so future kinds (fixed amount, discount) can be
/// added without touching the matching logic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleAction {
    MarkupPercent { value: Decimal },
}

impl RuleAction {
    pub fn apply(&self, net_amount: Decimal) -> Decimal {
        match self {
            Self::MarkupPercent { value } => {
                round_money(net_amount * (Decimal::ONE + value / Decimal::ONE_HUNDRED))
            }
        }
    }

    pub fn markup_percent(&self) -> Decimal {
        match self {
            Self::MarkupPercent { value } => *value,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::MarkupPercent { .. } => "markup_percent",
        }
    }

    pub fn from_parts(kind: &str, value: Decimal) -> Result<Self, DomainError> {
        match kind {
            "markup_percent" => Ok(Self::MarkupPercent { value }),
            other => {
                Err(DomainError::Validation(format!("unsupported rule action type `{other}`")))
            }
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        match self {
            Self::MarkupPercent { value } => {
                if *value < Decimal::ZERO || *value > Decimal::new(1000, 0) {
                    return Err(DomainError::Validation(format!(
                        "markup_percent value `{value}` must be within 0..=1000"
                    )));
                }
                Ok(())
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingRule {
    pub id: RuleId,
    pub tenant_id: TenantId,
    pub scope: RuleScope,
    pub priority: i32,
    pub validity: RuleValidity,
    pub action: RuleAction,
    pub status: RuleStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PricingRule {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.id.0.trim().is_empty() {
            return Err(DomainError::Validation("rule id must not be empty".to_owned()));
        }
        if self.tenant_id.0.trim().is_empty() {
            return Err(DomainError::Validation("rule tenant_id must not be empty".to_owned()));
        }
        self.validity.validate()?;
        self.action.validate()
    }

    /// Creation-time guard: a second active rule with the same priority that
    /// can match the same booking would make resolution order-dependent.
    pub fn conflicts_with(&self, other: &PricingRule) -> bool {
        self.tenant_id == other.tenant_id
            && self.id != other.id
            && self.status == RuleStatus::Active
            && other.status == RuleStatus::Active
            && self.priority == other.priority
            && self.scope.overlaps(&other.scope)
            && self.validity.overlaps(&other.validity)
    }

    pub fn can_transition_to(&self, next: RuleStatus) -> bool {
        matches!(
            (self.status, next),
            (RuleStatus::Active, RuleStatus::Inactive)
                | (RuleStatus::Inactive, RuleStatus::Active)
                | (RuleStatus::Active, RuleStatus::Archived)
                | (RuleStatus::Inactive, RuleStatus::Archived)
        )
    }

    /// Rules are retired through status transitions, never deleted, so
    /// historical traces stay resolvable. Archived is terminal.
    pub fn transition_to(&mut self, next: RuleStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidRuleTransition { from: self.status, to: next })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    use crate::domain::booking::BookingContext;
    use crate::domain::ids::{AgencyId, HotelId, ProductId, RuleId, TenantId};
    use crate::domain::money::Currency;

    use super::{PricingRule, RuleAction, RuleScope, RuleStatus, RuleValidity};

    fn context(agency: &str, product_type: &str) -> BookingContext {
        BookingContext {
            tenant_id: TenantId("org-1".to_string()),
            agency_id: AgencyId(agency.to_string()),
            hotel_id: HotelId("hotel-1".to_string()),
            product_id: ProductId("room-std".to_string()),
            product_type: product_type.to_string(),
            check_in: NaiveDate::from_ymd_opt(2026, 9, 14).expect("valid date"),
            net_amount: Decimal::new(10000, 2),
            sale_currency: Currency("EUR".to_string()),
        }
    }

    fn rule(id: &str, priority: i32, scope: RuleScope) -> PricingRule {
        PricingRule {
            id: RuleId(id.to_string()),
            tenant_id: TenantId("org-1".to_string()),
            scope,
            priority,
            validity: RuleValidity::default(),
            action: RuleAction::MarkupPercent { value: Decimal::new(12, 0) },
            status: RuleStatus::Active,
            notes: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn wildcard_scope_matches_any_context() {
        let rule = rule("r-1", 100, RuleScope::default());
        assert!(rule.scope.matches(&context("agency-x", "hotel")));
        assert!(rule.scope.matches(&context("agency-y", "transfer")));
    }

    #[test]
    fn scope_fields_match_independently() {
        let scope = RuleScope {
            agency_id: Some(AgencyId("agency-x".to_string())),
            product_id: None,
            product_type: Some("hotel".to_string()),
        };
        assert!(scope.matches(&context("agency-x", "hotel")));
        assert!(!scope.matches(&context("agency-y", "hotel")));
        assert!(!scope.matches(&context("agency-x", "transfer")));
    }

    #[test]
    fn validity_interval_is_half_open_on_check_in() {
        let validity = RuleValidity {
            from: NaiveDate::from_ymd_opt(2026, 9, 1),
            to: NaiveDate::from_ymd_opt(2026, 10, 1),
        };
        assert!(validity.contains(NaiveDate::from_ymd_opt(2026, 9, 1).expect("date")));
        assert!(validity.contains(NaiveDate::from_ymd_opt(2026, 9, 30).expect("date")));
        assert!(!validity.contains(NaiveDate::from_ymd_opt(2026, 10, 1).expect("date")));
        assert!(!validity.contains(NaiveDate::from_ymd_opt(2026, 8, 31).expect("date")));
    }

    #[test]
    fn markup_percent_applies_to_net_amount() {
        let action = RuleAction::MarkupPercent { value: Decimal::new(12, 0) };
        assert_eq!(action.apply(Decimal::new(10000, 2)), Decimal::new(11200, 2));
    }

    #[test]
    fn same_priority_overlapping_active_rules_conflict() {
        let first = rule("r-1", 200, RuleScope::default());
        let second = rule(
            "r-2",
            200,
            RuleScope { agency_id: Some(AgencyId("agency-x".to_string())), ..RuleScope::default() },
        );
        assert!(first.conflicts_with(&second));

        let disjoint = rule(
            "r-3",
            200,
            RuleScope {
                product_type: Some("transfer".to_string()),
                ..RuleScope::default()
            },
        );
        let hotel_only = rule(
            "r-4",
            200,
            RuleScope { product_type: Some("hotel".to_string()), ..RuleScope::default() },
        );
        assert!(!disjoint.conflicts_with(&hotel_only));
    }

    #[test]
    fn different_priority_never_conflicts() {
        let first = rule("r-1", 200, RuleScope::default());
        let second = rule("r-2", 100, RuleScope::default());
        assert!(!first.conflicts_with(&second));
    }

    #[test]
    fn archived_is_a_terminal_status() {
        let mut rule = rule("r-1", 100, RuleScope::default());
        rule.transition_to(RuleStatus::Archived).expect("active -> archived");
        let error =
            rule.transition_to(RuleStatus::Active).expect_err("archived rules cannot revive");
        assert!(matches!(error, crate::errors::DomainError::InvalidRuleTransition { .. }));
    }

    #[test]
    fn disjoint_validity_windows_do_not_conflict() {
        let mut september = rule("r-1", 150, RuleScope::default());
        september.validity = RuleValidity {
            from: NaiveDate::from_ymd_opt(2026, 9, 1),
            to: NaiveDate::from_ymd_opt(2026, 10, 1),
        };
        let mut october = rule("r-2", 150, RuleScope::default());
        october.validity = RuleValidity {
            from: NaiveDate::from_ymd_opt(2026, 10, 1),
            to: NaiveDate::from_ymd_opt(2026, 11, 1),
        };
        assert!(!september.conflicts_with(&october));
    }
}
