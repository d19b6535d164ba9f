//! Booking confirmation pipeline: rule resolution, fx snapshot, settlement
//! posting, and trace capture over a single transaction. This is the
//! critical section of the whole system: either every row lands or none
//! does, and a concurrent duplicate confirmation observes the winner's rows
//! instead of erroring.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use stayledger_core::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use stayledger_core::config::LedgerConfig;
use stayledger_core::domain::booking::{Booking, BookingAmounts, BookingContext};
use stayledger_core::domain::fx::FxSnapshot;
use stayledger_core::domain::ids::{BookingId, RuleId, TenantId};
use stayledger_core::domain::money::{round_money, Currency};
use stayledger_core::domain::settlement::{
    split_commission, EntryDirection, SettlementEntry, SettlementMonth,
};
use stayledger_core::domain::trace::PricingTrace;
use stayledger_core::errors::{ApplicationError, DomainError};
use stayledger_core::resolver::{self, ExplainStep};
use stayledger_core::settlement::{aggregate, SettlementStatement, StatementScope};

use crate::repositories::{
    fx, settlement, trace, FxRepository, RepositoryError, RuleRepository, SettlementRepository,
    SqlFxRepository, SqlRuleRepository, SqlSettlementRepository, SqlTraceRepository,
    TraceRepository,
};
use crate::DbPool;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<ServiceError> for ApplicationError {
    fn from(value: ServiceError) -> Self {
        match value {
            ServiceError::Domain(domain) => ApplicationError::Domain(domain),
            ServiceError::Repository(error) => ApplicationError::Persistence(error.to_string()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct LedgerSettings {
    pub currency: Currency,
    pub default_markup_percent: Decimal,
}

impl LedgerSettings {
    pub fn from_config(config: &LedgerConfig) -> Result<Self, DomainError> {
        Ok(Self {
            currency: Currency::parse(&config.currency)?,
            default_markup_percent: config.default_markup_percent,
        })
    }
}

#[derive(Clone, Debug)]
pub struct ConfirmBookingRequest {
    pub booking_id: BookingId,
    pub context: BookingContext,
    /// From the agency-hotel relationship configuration, maintained by an
    /// external CRUD surface.
    pub commission_rate: Decimal,
}

#[derive(Clone, Debug)]
pub struct BookingConfirmation {
    pub booking: Booking,
    pub entry: SettlementEntry,
    pub trace: PricingTrace,
    pub fx_snapshot: FxSnapshot,
    /// True when this call lost the uniqueness race (or retried) and the
    /// returned rows were written by an earlier confirmation.
    pub replayed: bool,
}

#[derive(Clone, Debug)]
pub struct ReversalOutcome {
    pub entry: SettlementEntry,
    pub replayed: bool,
}

#[derive(Clone, Debug)]
pub struct PricingResolution {
    pub rule_id: Option<RuleId>,
    pub priority: i32,
    pub fallback: bool,
    pub markup_percent: Decimal,
    pub sell_amount: Decimal,
    pub currency: Currency,
    pub explain: Vec<ExplainStep>,
}

pub struct ConfirmationService {
    pool: DbPool,
    settings: LedgerSettings,
    rules: SqlRuleRepository,
    fx: SqlFxRepository,
    settlements: SqlSettlementRepository,
    traces: SqlTraceRepository,
    audit: Arc<dyn AuditSink>,
}

impl ConfirmationService {
    pub fn new(pool: DbPool, settings: LedgerSettings, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            rules: SqlRuleRepository::new(pool.clone()),
            fx: SqlFxRepository::new(pool.clone()),
            settlements: SqlSettlementRepository::new(pool.clone()),
            traces: SqlTraceRepository::new(pool.clone()),
            pool,
            settings,
            audit,
        }
    }

    pub fn ledger_currency(&self) -> &Currency {
        &self.settings.currency
    }

    /// Read-only resolution: which rule would apply and at what sell price.
    pub async fn resolve_pricing(
        &self,
        context: &BookingContext,
    ) -> Result<PricingResolution, ServiceError> {
        context.validate()?;
        let rules = self.rules.list_active(&context.tenant_id).await?;
        let decision = resolver::price(&rules, context, self.settings.default_markup_percent);

        Ok(PricingResolution {
            rule_id: decision.rule_id,
            priority: decision.priority,
            fallback: decision.fallback,
            markup_percent: decision.markup_percent,
            sell_amount: decision.sell_amount,
            currency: context.sale_currency.clone(),
            explain: decision.explain,
        })
    }

    /// Confirms a booking: resolve → price → snapshot → settle → trace.
    /// All four persisted rows commit atomically; a validation error or a
    /// missing fx rate leaves nothing behind.
    pub async fn confirm_booking(
        &self,
        request: ConfirmBookingRequest,
    ) -> Result<BookingConfirmation, ServiceError> {
        let correlation_id = Uuid::new_v4().to_string();
        let ConfirmBookingRequest { booking_id, context, commission_rate } = request;

        if booking_id.0.trim().is_empty() {
            return Err(DomainError::Validation("booking_id must not be empty".to_owned()).into());
        }
        context.validate()?;

        // Retried confirmations short-circuit before any pricing work.
        if let Some(existing) =
            self.settlements.find_by_booking(&booking_id, EntryDirection::Original).await?
        {
            self.ensure_tenant(&context.tenant_id, &existing.tenant_id, &booking_id, &correlation_id)?;
            return self.replayed_confirmation(existing, &correlation_id).await;
        }

        // Point-in-time rule read; concurrent rule edits are acceptable.
        let rules = self.rules.list_active(&context.tenant_id).await?;
        let decision = resolver::price(&rules, &context, self.settings.default_markup_percent);

        let fx_snapshot = self.capture_fx_snapshot(&booking_id, &context).await?;
        let sell_ledger = round_money(fx_snapshot.to_ledger(decision.sell_amount));

        let booking = Booking {
            id: booking_id.clone(),
            tenant_id: context.tenant_id.clone(),
            agency_id: context.agency_id.clone(),
            hotel_id: context.hotel_id.clone(),
            product_id: context.product_id.clone(),
            check_in: context.check_in,
            sale_currency: context.sale_currency.clone(),
            amounts: BookingAmounts {
                net: decision.net_amount,
                sell: decision.sell_amount,
                sell_ledger,
            },
            fx_snapshot_id: fx_snapshot.id.clone(),
        };

        let split = split_commission(sell_ledger, commission_rate)?;
        let entry = SettlementEntry::original(&booking, split, self.settings.currency.clone());
        let trace =
            PricingTrace::capture(booking_id.clone(), context.clone(), &decision, &fx_snapshot);

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let written = settlement::insert_entry_with(&mut *tx, &entry).await?;
        if written == 0 {
            // Lost a concurrent race; drop everything from this attempt and
            // surface the winner's rows.
            tx.rollback().await.map_err(RepositoryError::from)?;
            let existing = self
                .settlements
                .find_by_booking(&booking_id, EntryDirection::Original)
                .await?
                .ok_or_else(|| {
                    RepositoryError::Decode(format!(
                        "confirmation race for booking {} left no winning entry",
                        booking_id.0
                    ))
                })?;
            self.ensure_tenant(&context.tenant_id, &existing.tenant_id, &booking_id, &correlation_id)?;
            return self.replayed_confirmation(existing, &correlation_id).await;
        }
        fx::insert_snapshot_with(&mut *tx, &fx_snapshot).await?;
        trace::insert_trace_with(&mut *tx, &trace).await?;
        tx.commit().await.map_err(RepositoryError::from)?;

        self.audit.emit(
            AuditEvent::new(
                context.tenant_id.0.clone(),
                Some(booking_id),
                correlation_id,
                "settlement.entry_posted",
                AuditCategory::Settlement,
                "confirmation-service",
                AuditOutcome::Success,
            )
            .with_metadata("direction", "original")
            .with_metadata("month", entry.month.0.clone())
            .with_metadata("fallback", decision.fallback.to_string()),
        );

        Ok(BookingConfirmation { booking, entry, trace, fx_snapshot, replayed: false })
    }

    /// Posts the offsetting entry for a cancelled booking. Exactly-once per
    /// booking id: a second cancel returns the existing reversal as success.
    pub async fn reverse_booking(
        &self,
        tenant_id: &TenantId,
        booking_id: &BookingId,
    ) -> Result<ReversalOutcome, ServiceError> {
        let correlation_id = Uuid::new_v4().to_string();

        let original = self
            .settlements
            .find_by_booking(booking_id, EntryDirection::Original)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                resource: format!("settlement entry for booking {}", booking_id.0),
            })?;
        self.ensure_tenant(tenant_id, &original.tenant_id, booking_id, &correlation_id)?;

        let reversal = SettlementEntry::reversal_of(&original);
        let outcome = self.settlements.insert(&reversal).await?;

        self.audit.emit(
            AuditEvent::new(
                tenant_id.0.clone(),
                Some(booking_id.clone()),
                correlation_id,
                if outcome.replayed() {
                    "settlement.reversal_replayed"
                } else {
                    "settlement.entry_reversed"
                },
                AuditCategory::Settlement,
                "confirmation-service",
                AuditOutcome::Success,
            )
            .with_metadata("month", outcome.entry().month.0.clone()),
        );

        Ok(ReversalOutcome { entry: outcome.entry().clone(), replayed: outcome.replayed() })
    }

    /// Read-only explainability lookup. Returns the captured decision, not
    /// the rule's current state.
    pub async fn pricing_trace(
        &self,
        tenant_id: &TenantId,
        booking_id: &BookingId,
    ) -> Result<PricingTrace, ServiceError> {
        let correlation_id = Uuid::new_v4().to_string();
        let trace =
            self.traces.latest_for_booking(booking_id).await?.ok_or_else(|| {
                DomainError::NotFound {
                    resource: format!("pricing trace for booking {}", booking_id.0),
                }
            })?;
        self.ensure_tenant(tenant_id, &trace.tenant_id, booking_id, &correlation_id)?;
        Ok(trace)
    }

    /// Month statement derived purely by summing original and reversal rows.
    pub async fn settlement_statement(
        &self,
        tenant_id: &TenantId,
        month: SettlementMonth,
        scope: StatementScope,
    ) -> Result<SettlementStatement, ServiceError> {
        let entries = self.settlements.list_for_month(tenant_id, &month).await?;
        Ok(aggregate(month, self.settings.currency.clone(), &entries, &scope))
    }

    async fn capture_fx_snapshot(
        &self,
        booking_id: &BookingId,
        context: &BookingContext,
    ) -> Result<FxSnapshot, ServiceError> {
        if context.sale_currency == self.settings.currency {
            return Ok(FxSnapshot::identity(
                context.tenant_id.clone(),
                booking_id.clone(),
                context.sale_currency.clone(),
            ));
        }

        let rate = self
            .fx
            .latest_as_of(
                &context.tenant_id,
                &self.settings.currency,
                &context.sale_currency,
                Utc::now(),
            )
            .await?
            .ok_or_else(|| DomainError::MissingFxRate {
                ledger_currency: self.settings.currency.0.clone(),
                sale_currency: context.sale_currency.0.clone(),
            })?;

        Ok(FxSnapshot::from_rate(booking_id.clone(), &rate))
    }

    async fn replayed_confirmation(
        &self,
        existing: SettlementEntry,
        correlation_id: &str,
    ) -> Result<BookingConfirmation, ServiceError> {
        let trace = self
            .traces
            .latest_for_booking(&existing.booking_id)
            .await?
            .ok_or_else(|| {
                RepositoryError::Decode(format!(
                    "settled booking {} has no pricing trace",
                    existing.booking_id.0
                ))
            })?;
        let fx_snapshot =
            self.fx.find_snapshot(&trace.fx_snapshot_id).await?.ok_or_else(|| {
                RepositoryError::Decode(format!(
                    "settled booking {} has no fx snapshot",
                    existing.booking_id.0
                ))
            })?;

        self.audit.emit(
            AuditEvent::new(
                existing.tenant_id.0.clone(),
                Some(existing.booking_id.clone()),
                correlation_id,
                "settlement.duplicate_confirmation_recovered",
                AuditCategory::Settlement,
                "confirmation-service",
                AuditOutcome::Success,
            )
            .with_metadata("entry_id", existing.id.0.clone()),
        );

        let booking = Booking {
            id: existing.booking_id.clone(),
            tenant_id: existing.tenant_id.clone(),
            agency_id: existing.agency_id.clone(),
            hotel_id: existing.hotel_id.clone(),
            product_id: trace.context.product_id.clone(),
            check_in: trace.context.check_in,
            sale_currency: existing.sale_currency.clone(),
            amounts: BookingAmounts {
                net: trace.net_amount,
                sell: trace.sell_amount,
                sell_ledger: trace.sell_ledger_amount,
            },
            fx_snapshot_id: fx_snapshot.id.clone(),
        };

        Ok(BookingConfirmation { booking, entry: existing, trace, fx_snapshot, replayed: true })
    }

    /// Cross-tenant access is rejected loudly and lands on the audit sink
    /// for security review, never silently filtered.
    fn ensure_tenant(
        &self,
        caller: &TenantId,
        owner: &TenantId,
        booking_id: &BookingId,
        correlation_id: &str,
    ) -> Result<(), ServiceError> {
        if caller == owner {
            return Ok(());
        }

        self.audit.emit(
            AuditEvent::new(
                caller.0.clone(),
                Some(booking_id.clone()),
                correlation_id,
                "security.tenant_scope_violation",
                AuditCategory::Security,
                "confirmation-service",
                AuditOutcome::Rejected,
            )
            .with_metadata("owner_tenant", owner.0.clone()),
        );

        Err(DomainError::TenantScopeViolation {
            resource: format!("booking {}", booking_id.0),
        }
        .into())
    }
}
