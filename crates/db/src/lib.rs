pub mod catalog;
pub mod confirmation;
pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use catalog::{RuleCatalog, RuleDraft};
pub use confirmation::{
    BookingConfirmation, ConfirmBookingRequest, ConfirmationService, LedgerSettings,
    PricingResolution, ReversalOutcome, ServiceError,
};
pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{SeedDataset, SeedResult, VerificationResult, SEED_TENANT_ID};
pub use repositories::{
    FxRepository, PostOutcome, RepositoryError, RuleRepository, SettlementRepository,
    SqlFxRepository, SqlRuleRepository, SqlSettlementRepository, SqlTraceRepository,
    TraceRepository,
};
