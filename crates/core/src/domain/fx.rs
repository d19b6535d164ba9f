use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::ids::{BookingId, FxSnapshotId, TenantId};
use crate::domain::money::Currency;
use crate::errors::DomainError;

pub const IDENTITY_RATE_BASIS: &str = "identity";

/// Catalog record maintained by an external admin/seed process. Mutable,
/// and for that reason never referenced directly by a confirmed booking,
/// only through an [`FxSnapshot`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FxRate {
    pub tenant_id: TenantId,
    pub base: Currency,
    pub quote: Currency,
    /// Quote-currency units per one unit of base currency.
    pub rate: Decimal,
    pub rate_basis: String,
    pub captured_at: DateTime<Utc>,
}

impl FxRate {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.rate <= Decimal::ZERO {
            return Err(DomainError::Validation(format!(
                "fx rate `{}` for {}/{} must be positive",
                self.rate, self.base, self.quote
            )));
        }
        if self.base == self.quote {
            return Err(DomainError::Validation(format!(
                "fx rate base and quote currencies must differ (both `{}`)",
                self.base
            )));
        }
        Ok(())
    }
}

/// Immutable copy of the rate used for one booking. Once attached it never
/// changes, even if the underlying catalog rate is later updated. This is
/// what fixes a booking's accounting value at confirmation time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FxSnapshot {
    pub id: FxSnapshotId,
    pub tenant_id: TenantId,
    pub booking_id: BookingId,
    pub base: Currency,
    pub quote: Currency,
    pub rate: Decimal,
    pub rate_basis: String,
    pub captured_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl FxSnapshot {
    /// Same-currency sales skip the catalog entirely.
    pub fn identity(tenant_id: TenantId, booking_id: BookingId, currency: Currency) -> Self {
        let now = Utc::now();
        Self {
            id: FxSnapshotId(Uuid::new_v4().to_string()),
            tenant_id,
            booking_id,
            base: currency.clone(),
            quote: currency,
            rate: Decimal::ONE,
            rate_basis: IDENTITY_RATE_BASIS.to_string(),
            captured_at: now,
            created_at: now,
        }
    }

    pub fn from_rate(booking_id: BookingId, rate: &FxRate) -> Self {
        Self {
            id: FxSnapshotId(Uuid::new_v4().to_string()),
            tenant_id: rate.tenant_id.clone(),
            booking_id,
            base: rate.base.clone(),
            quote: rate.quote.clone(),
            rate: rate.rate,
            rate_basis: rate.rate_basis.clone(),
            captured_at: rate.captured_at,
            created_at: Utc::now(),
        }
    }

    /// `rate` is quote-per-base, so a sale amount divides down into the
    /// ledger currency. The quotient is returned at full precision; callers
    /// quantize with `round_money` at the point where an amount is
    /// persisted, so converting back reproduces the sale amount.
    pub fn to_ledger(&self, sale_amount: Decimal) -> Decimal {
        sale_amount / self.rate
    }

    pub fn to_sale(&self, ledger_amount: Decimal) -> Decimal {
        ledger_amount * self.rate
    }

    pub fn is_identity(&self) -> bool {
        self.base == self.quote
    }
}
