use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::booking::BookingContext;
use crate::domain::fx::FxSnapshot;
use crate::domain::ids::{BookingId, FxSnapshotId, PricingTraceId, RuleId, TenantId};
use crate::domain::money::round_money;
use crate::resolver::PricingDecision;

/// Immutable explainability record for one pricing decision. Captures the
/// matched rule's attributes as they were at confirmation time; the rule
/// may be edited or archived later without affecting the trace. Appended,
/// never overwritten. A re-resolution adds a new row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTrace {
    pub id: PricingTraceId,
    pub tenant_id: TenantId,
    pub booking_id: BookingId,
    pub matched_rule_id: Option<RuleId>,
    pub matched_priority: i32,
    pub fallback: bool,
    pub context: BookingContext,
    pub net_amount: Decimal,
    pub sell_amount: Decimal,
    pub sell_ledger_amount: Decimal,
    pub markup_percent: Decimal,
    pub fx_snapshot_id: FxSnapshotId,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

impl PricingTrace {
    pub fn capture(
        booking_id: BookingId,
        context: BookingContext,
        decision: &PricingDecision,
        fx_snapshot: &FxSnapshot,
    ) -> Self {
        let sell_ledger_amount = round_money(fx_snapshot.to_ledger(decision.sell_amount));
        let content_hash = hash_trace_material(
            &booking_id,
            &context,
            decision,
            sell_ledger_amount,
            &fx_snapshot.id,
        );

        Self {
            id: PricingTraceId(Uuid::new_v4().to_string()),
            tenant_id: context.tenant_id.clone(),
            booking_id,
            matched_rule_id: decision.rule_id.clone(),
            matched_priority: decision.priority,
            fallback: decision.fallback,
            context,
            net_amount: decision.net_amount,
            sell_amount: decision.sell_amount,
            sell_ledger_amount,
            markup_percent: decision.markup_percent,
            fx_snapshot_id: fx_snapshot.id.clone(),
            content_hash,
            created_at: Utc::now(),
        }
    }

    pub fn verify_content_hash(&self) -> bool {
        let recomputed = hash_material_parts(
            &self.booking_id,
            &self.context,
            self.matched_rule_id.as_ref(),
            self.matched_priority,
            self.fallback,
            self.net_amount,
            self.sell_amount,
            self.sell_ledger_amount,
            self.markup_percent,
            &self.fx_snapshot_id,
        );
        recomputed == self.content_hash
    }
}

fn hash_trace_material(
    booking_id: &BookingId,
    context: &BookingContext,
    decision: &PricingDecision,
    sell_ledger_amount: Decimal,
    fx_snapshot_id: &FxSnapshotId,
) -> String {
    hash_material_parts(
        booking_id,
        context,
        decision.rule_id.as_ref(),
        decision.priority,
        decision.fallback,
        decision.net_amount,
        decision.sell_amount,
        sell_ledger_amount,
        decision.markup_percent,
        fx_snapshot_id,
    )
}

#[allow(clippy::too_many_arguments)]
fn hash_material_parts(
    booking_id: &BookingId,
    context: &BookingContext,
    matched_rule_id: Option<&RuleId>,
    matched_priority: i32,
    fallback: bool,
    net_amount: Decimal,
    sell_amount: Decimal,
    sell_ledger_amount: Decimal,
    markup_percent: Decimal,
    fx_snapshot_id: &FxSnapshotId,
) -> String {
    let context_payload = match serde_json::to_string(context) {
        Ok(payload) => payload,
        Err(_) => context.tenant_id.0.clone(),
    };
    let material = format!(
        "{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
        booking_id.0,
        context_payload,
        matched_rule_id.map(|id| id.0.as_str()).unwrap_or("default"),
        matched_priority,
        fallback,
        net_amount,
        sell_amount,
        sell_ledger_amount,
        markup_percent,
        fx_snapshot_id.0,
    );
    sha256_hex(material.as_bytes())
}

fn sha256_hex(payload: &[u8]) -> String {
    let digest = Sha256::digest(payload);
    let mut output = String::with_capacity(digest.len() * 2);
    for byte in digest {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}
