pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod resolver;
pub mod settlement;

pub use audit::{
    AuditCategory, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink, TracingAuditSink,
};
pub use domain::booking::{Booking, BookingAmounts, BookingContext};
pub use domain::fx::{FxRate, FxSnapshot, IDENTITY_RATE_BASIS};
pub use domain::ids::{
    AgencyId, BookingId, FxSnapshotId, HotelId, PricingTraceId, ProductId, RuleId,
    SettlementEntryId, TenantId,
};
pub use domain::money::{round_money, Currency};
pub use domain::rule::{PricingRule, RuleAction, RuleScope, RuleStatus, RuleValidity};
pub use domain::settlement::{
    split_commission, CommissionSplit, EntryDirection, SettlementEntry, SettlementMonth,
    SettlementStatus,
};
pub use domain::trace::PricingTrace;
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use resolver::{
    price, resolve, DeterministicResolver, ExplainStep, PricingDecision, PricingResolver,
    RuleMatch, FALLBACK_MARKUP_PERCENT, FALLBACK_PRIORITY,
};
pub use settlement::{
    aggregate, CounterpartTotals, CurrencyTotals, SettlementStatement, StatementScope,
    StatementTotals,
};
