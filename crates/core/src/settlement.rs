use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::ids::{AgencyId, HotelId};
use crate::domain::money::Currency;
use crate::domain::settlement::{SettlementEntry, SettlementMonth};

/// Optional counterpart filter for a statement. Absent fields match all.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementScope {
    pub agency_id: Option<AgencyId>,
    pub hotel_id: Option<HotelId>,
}

impl StatementScope {
    pub fn matches(&self, entry: &SettlementEntry) -> bool {
        self.agency_id.as_ref().map_or(true, |agency| agency == &entry.agency_id)
            && self.hotel_id.as_ref().map_or(true, |hotel| hotel == &entry.hotel_id)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementTotals {
    pub gross: Decimal,
    pub commission: Decimal,
    pub net: Decimal,
    pub entry_count: usize,
}

impl StatementTotals {
    fn accumulate(&mut self, entry: &SettlementEntry) {
        self.gross += entry.gross;
        self.commission += entry.commission;
        self.net += entry.net;
        self.entry_count += 1;
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterpartTotals {
    pub agency_id: AgencyId,
    pub hotel_id: HotelId,
    pub totals: StatementTotals,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyTotals {
    pub sale_currency: Currency,
    pub totals: StatementTotals,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementStatement {
    pub month: SettlementMonth,
    /// Ledger currency every amount below is denominated in.
    pub currency: Currency,
    pub totals: StatementTotals,
    pub counterparts: Vec<CounterpartTotals>,
    pub currency_breakdown: Vec<CurrencyTotals>,
}

/// Statement totals are always derived by summing original and reversal
/// rows. Historical rows are never mutated, so a cancelled booking nets to
/// exactly zero while both of its entries stay visible.
pub fn aggregate(
    month: SettlementMonth,
    ledger_currency: Currency,
    entries: &[SettlementEntry],
    scope: &StatementScope,
) -> SettlementStatement {
    let mut totals = StatementTotals::default();
    let mut by_counterpart: BTreeMap<(AgencyId, HotelId), StatementTotals> = BTreeMap::new();
    let mut by_sale_currency: BTreeMap<Currency, StatementTotals> = BTreeMap::new();

    for entry in entries.iter().filter(|entry| scope.matches(entry)) {
        totals.accumulate(entry);
        by_counterpart
            .entry((entry.agency_id.clone(), entry.hotel_id.clone()))
            .or_default()
            .accumulate(entry);
        by_sale_currency.entry(entry.sale_currency.clone()).or_default().accumulate(entry);
    }

    SettlementStatement {
        month,
        currency: ledger_currency,
        totals,
        counterparts: by_counterpart
            .into_iter()
            .map(|((agency_id, hotel_id), totals)| CounterpartTotals {
                agency_id,
                hotel_id,
                totals,
            })
            .collect(),
        currency_breakdown: by_sale_currency
            .into_iter()
            .map(|(sale_currency, totals)| CurrencyTotals { sale_currency, totals })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use crate::domain::booking::{Booking, BookingAmounts};
    use crate::domain::ids::{AgencyId, BookingId, FxSnapshotId, HotelId, ProductId, TenantId};
    use crate::domain::money::Currency;
    use crate::domain::settlement::{split_commission, SettlementEntry, SettlementMonth};

    use super::{aggregate, StatementScope};

    fn entry(booking_id: &str, agency: &str, gross: i64) -> SettlementEntry {
        let booking = Booking {
            id: BookingId(booking_id.to_string()),
            tenant_id: TenantId("org-1".to_string()),
            agency_id: AgencyId(agency.to_string()),
            hotel_id: HotelId("hotel-1".to_string()),
            product_id: ProductId("room-std".to_string()),
            check_in: NaiveDate::from_ymd_opt(2026, 9, 14).expect("valid date"),
            sale_currency: Currency("TRY".to_string()),
            amounts: BookingAmounts {
                net: Decimal::new(gross, 2),
                sell: Decimal::new(gross, 2),
                sell_ledger: Decimal::new(gross, 2),
            },
            fx_snapshot_id: FxSnapshotId("snap-1".to_string()),
        };
        let split =
            split_commission(Decimal::new(gross, 2), Decimal::new(10, 2)).expect("valid rate");
        SettlementEntry::original(&booking, split, Currency("EUR".to_string()))
    }

    #[test]
    fn cancelled_booking_nets_to_zero_but_stays_visible() {
        let original = entry("bk-1", "agency-x", 10000);
        let reversal = SettlementEntry::reversal_of(&original);
        let entries = vec![original, reversal];

        let statement = aggregate(
            SettlementMonth("2026-09".to_string()),
            Currency("EUR".to_string()),
            &entries,
            &StatementScope::default(),
        );

        assert_eq!(statement.totals.gross, Decimal::ZERO);
        assert_eq!(statement.totals.commission, Decimal::ZERO);
        assert_eq!(statement.totals.net, Decimal::ZERO);
        assert_eq!(statement.totals.entry_count, 2);
    }

    #[test]
    fn counterpart_and_currency_breakdowns_are_grouped() {
        let entries =
            vec![entry("bk-1", "agency-x", 10000), entry("bk-2", "agency-y", 20000)];

        let statement = aggregate(
            SettlementMonth("2026-09".to_string()),
            Currency("EUR".to_string()),
            &entries,
            &StatementScope::default(),
        );

        assert_eq!(statement.counterparts.len(), 2);
        assert_eq!(statement.counterparts[0].agency_id, AgencyId("agency-x".to_string()));
        assert_eq!(statement.counterparts[0].totals.gross, Decimal::new(10000, 2));
        assert_eq!(statement.currency_breakdown.len(), 1);
        assert_eq!(statement.currency_breakdown[0].sale_currency.as_str(), "TRY");
        assert_eq!(statement.currency_breakdown[0].totals.entry_count, 2);
    }

    #[test]
    fn scope_filter_restricts_to_one_counterpart() {
        let entries =
            vec![entry("bk-1", "agency-x", 10000), entry("bk-2", "agency-y", 20000)];

        let statement = aggregate(
            SettlementMonth("2026-09".to_string()),
            Currency("EUR".to_string()),
            &entries,
            &StatementScope { agency_id: Some(AgencyId("agency-y".to_string())), hotel_id: None },
        );

        assert_eq!(statement.totals.entry_count, 1);
        assert_eq!(statement.totals.gross, Decimal::new(20000, 2));
    }
}
