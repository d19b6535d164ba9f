use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::booking::Booking;
use crate::domain::ids::{AgencyId, BookingId, HotelId, SettlementEntryId, TenantId};
use crate::domain::money::{round_money, Currency};
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryDirection {
    Original,
    Reversal,
}

impl EntryDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Reversal => "reversal",
        }
    }
}

impl std::str::FromStr for EntryDirection {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "original" => Ok(Self::Original),
            "reversal" => Ok(Self::Reversal),
            other => Err(DomainError::Validation(format!(
                "unsupported settlement direction `{other}`"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    Open,
    Settled,
}

impl SettlementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Settled => "settled",
        }
    }
}

impl std::str::FromStr for SettlementStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "open" => Ok(Self::Open),
            "settled" => Ok(Self::Settled),
            other => {
                Err(DomainError::Validation(format!("unsupported settlement status `{other}`")))
            }
        }
    }
}

/// Accounting month in `YYYY-MM` form, derived from the check-in date.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SettlementMonth(pub String);

impl SettlementMonth {
    pub fn from_check_in(check_in: NaiveDate) -> Self {
        Self(check_in.format("%Y-%m").to_string())
    }

    pub fn parse(value: impl AsRef<str>) -> Result<Self, DomainError> {
        let value = value.as_ref().trim();
        let valid = value.len() == 7
            && value.as_bytes()[4] == b'-'
            && value[..4].chars().all(|c| c.is_ascii_digit())
            && value[5..].chars().all(|c| c.is_ascii_digit())
            && matches!(value[5..].parse::<u8>(), Ok(1..=12));
        if !valid {
            return Err(DomainError::Validation(format!(
                "settlement month `{value}` must be formatted YYYY-MM"
            )));
        }
        Ok(Self(value.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionSplit {
    pub gross: Decimal,
    pub commission: Decimal,
    pub net: Decimal,
}

/// Commission comes from the agency-hotel relationship configuration and is
/// distinct from the pricing markup. Markup sets the buyer's price,
/// commission sets the hotel's payout split.
pub fn split_commission(
    gross: Decimal,
    commission_rate: Decimal,
) -> Result<CommissionSplit, DomainError> {
    if commission_rate < Decimal::ZERO || commission_rate > Decimal::ONE {
        return Err(DomainError::Validation(format!(
            "commission_rate `{commission_rate}` must be within 0..=1"
        )));
    }

    let commission = round_money(gross * commission_rate);
    Ok(CommissionSplit { gross, commission, net: gross - commission })
}

/// One ledger row representing money owed between agency and hotel for one
/// booking. The ledger is append-only: a reversal is a new row with negated
/// amounts referencing the original, never an in-place update.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementEntry {
    pub id: SettlementEntryId,
    pub tenant_id: TenantId,
    pub booking_id: BookingId,
    pub agency_id: AgencyId,
    pub hotel_id: HotelId,
    pub direction: EntryDirection,
    pub gross: Decimal,
    pub commission: Decimal,
    pub net: Decimal,
    /// Always the ledger currency.
    pub currency: Currency,
    pub sale_currency: Currency,
    pub status: SettlementStatus,
    pub month: SettlementMonth,
    pub reversal_of: Option<SettlementEntryId>,
    pub created_at: DateTime<Utc>,
}

impl SettlementEntry {
    pub fn original(booking: &Booking, split: CommissionSplit, ledger_currency: Currency) -> Self {
        Self {
            id: SettlementEntryId(Uuid::new_v4().to_string()),
            tenant_id: booking.tenant_id.clone(),
            booking_id: booking.id.clone(),
            agency_id: booking.agency_id.clone(),
            hotel_id: booking.hotel_id.clone(),
            direction: EntryDirection::Original,
            gross: split.gross,
            commission: split.commission,
            net: split.net,
            currency: ledger_currency,
            sale_currency: booking.sale_currency.clone(),
            status: SettlementStatus::Open,
            month: SettlementMonth::from_check_in(booking.check_in),
            reversal_of: None,
            created_at: Utc::now(),
        }
    }

    /// The reversal lands in the original's month so a cancelled booking
    /// nets to zero in that month's aggregate.
    pub fn reversal_of(original: &SettlementEntry) -> Self {
        Self {
            id: SettlementEntryId(Uuid::new_v4().to_string()),
            tenant_id: original.tenant_id.clone(),
            booking_id: original.booking_id.clone(),
            agency_id: original.agency_id.clone(),
            hotel_id: original.hotel_id.clone(),
            direction: EntryDirection::Reversal,
            gross: -original.gross,
            commission: -original.commission,
            net: -original.net,
            currency: original.currency.clone(),
            sale_currency: original.sale_currency.clone(),
            status: SettlementStatus::Open,
            month: original.month.clone(),
            reversal_of: Some(original.id.clone()),
            created_at: Utc::now(),
        }
    }
}
