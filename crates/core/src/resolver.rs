use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::booking::BookingContext;
use crate::domain::ids::RuleId;
use crate::domain::rule::{PricingRule, RuleAction, RuleStatus};

/// Markup applied when no tenant rule matches a booking.
pub const FALLBACK_MARKUP_PERCENT: i64 = 10;

/// Priority recorded on a trace when the built-in default was used.
pub const FALLBACK_PRIORITY: i32 = 0;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainStep {
    pub stage: String,
    pub detail: String,
}

impl ExplainStep {
    fn new(stage: &str, detail: impl Into<String>) -> Self {
        Self { stage: stage.to_string(), detail: detail.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleMatch {
    pub rule_id: Option<RuleId>,
    pub priority: i32,
    pub action: RuleAction,
    pub fallback: bool,
    pub explain: Vec<ExplainStep>,
}

/// Selects the single applicable rule for a booking context.
///
/// Candidates are active rules whose validity window contains the check-in
/// date and whose scope matches the context. The highest priority wins; at
/// equal priority the earliest created_at and then the lexicographically
/// smallest id win, so resolution is deterministic even for catalogs seeded
/// before the creation-time conflict guard existed. Absence of a match is
/// normal and resolved via the built-in default, never an error.
pub fn resolve(
    rules: &[PricingRule],
    context: &BookingContext,
    default_markup_percent: Decimal,
) -> RuleMatch {
    let mut explain = Vec::new();

    let mut candidates: Vec<&PricingRule> = rules
        .iter()
        .filter(|rule| rule.tenant_id == context.tenant_id)
        .filter(|rule| rule.status == RuleStatus::Active)
        .filter(|rule| rule.validity.contains(context.check_in))
        .filter(|rule| rule.scope.matches(context))
        .collect();

    explain.push(ExplainStep::new(
        "filter",
        format!("{} of {} rules match status, validity, and scope", candidates.len(), rules.len()),
    ));

    candidates.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.0.cmp(&b.id.0))
    });

    match candidates.first() {
        Some(rule) => {
            explain.push(ExplainStep::new(
                "select",
                format!("rule `{}` wins at priority {}", rule.id.0, rule.priority),
            ));
            RuleMatch {
                rule_id: Some(rule.id.clone()),
                priority: rule.priority,
                action: rule.action.clone(),
                fallback: false,
                explain,
            }
        }
        None => {
            explain.push(ExplainStep::new(
                "fallback",
                format!("no rule matched, default markup {default_markup_percent}% applied"),
            ));
            RuleMatch {
                rule_id: None,
                priority: FALLBACK_PRIORITY,
                action: RuleAction::MarkupPercent { value: default_markup_percent },
                fallback: true,
                explain,
            }
        }
    }
}

/// Output of one full pricing resolution: the matched rule (or fallback)
/// plus the computed amounts in the sale currency.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingDecision {
    pub rule_id: Option<RuleId>,
    pub priority: i32,
    pub fallback: bool,
    pub markup_percent: Decimal,
    pub net_amount: Decimal,
    pub sell_amount: Decimal,
    pub explain: Vec<ExplainStep>,
}

pub fn price(
    rules: &[PricingRule],
    context: &BookingContext,
    default_markup_percent: Decimal,
) -> PricingDecision {
    let matched = resolve(rules, context, default_markup_percent);
    let sell_amount = matched.action.apply(context.net_amount);

    PricingDecision {
        rule_id: matched.rule_id,
        priority: matched.priority,
        fallback: matched.fallback,
        markup_percent: matched.action.markup_percent(),
        net_amount: context.net_amount,
        sell_amount,
        explain: matched.explain,
    }
}

pub trait PricingResolver: Send + Sync {
    fn price(&self, rules: &[PricingRule], context: &BookingContext) -> PricingDecision;
}

pub struct DeterministicResolver {
    pub default_markup_percent: Decimal,
}

impl Default for DeterministicResolver {
    fn default() -> Self {
        Self { default_markup_percent: Decimal::new(FALLBACK_MARKUP_PERCENT, 0) }
    }
}

impl PricingResolver for DeterministicResolver {
    fn price(&self, rules: &[PricingRule], context: &BookingContext) -> PricingDecision {
        price(rules, context, self.default_markup_percent)
    }
}
