use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::ids::{AgencyId, BookingId, FxSnapshotId, HotelId, ProductId, TenantId};
use crate::domain::money::Currency;
use crate::errors::DomainError;

/// Input to one pricing resolution, supplied by the booking-confirmation
/// workflow. Constructed per call, never persisted as-is (the trace keeps
/// its own immutable copy).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingContext {
    pub tenant_id: TenantId,
    pub agency_id: AgencyId,
    pub hotel_id: HotelId,
    pub product_id: ProductId,
    pub product_type: String,
    pub check_in: NaiveDate,
    pub net_amount: Decimal,
    pub sale_currency: Currency,
}

impl BookingContext {
    pub fn validate(&self) -> Result<(), DomainError> {
        for (field, value) in [
            ("tenant_id", &self.tenant_id.0),
            ("agency_id", &self.agency_id.0),
            ("hotel_id", &self.hotel_id.0),
            ("product_id", &self.product_id.0),
            ("product_type", &self.product_type),
        ] {
            if value.trim().is_empty() {
                return Err(DomainError::Validation(format!("{field} must not be empty")));
            }
        }

        if self.net_amount <= Decimal::ZERO {
            return Err(DomainError::Validation(format!(
                "net_amount `{}` must be positive",
                self.net_amount
            )));
        }

        Currency::parse(&self.sale_currency.0)?;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingAmounts {
    pub net: Decimal,
    pub sell: Decimal,
    pub sell_ledger: Decimal,
}

/// Bookings are owned by the reservation workflow; this view carries only
/// what settlement needs. Amounts and the fx snapshot reference are computed
/// exactly once at confirmation and are immutable afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub tenant_id: TenantId,
    pub agency_id: AgencyId,
    pub hotel_id: HotelId,
    pub product_id: ProductId,
    pub check_in: NaiveDate,
    pub sale_currency: Currency,
    pub amounts: BookingAmounts,
    pub fx_snapshot_id: FxSnapshotId,
}
