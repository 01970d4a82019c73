//! Social obligation and tax component calculations.
//!
//! Everything here is plain arithmetic over a [`RateTable`].  Monthly
//! amounts are kept unrounded; rounding to tiyn happens only once the
//! amount has been scaled to the months worked.

use crate::models::{ObligationAmounts, TaxAmounts};
use crate::rates::RateTable;

/// Bound `base` to `[min, max]`.
///
/// Callers must ensure `min <= max`; [`RateTable::validate`] does so
/// for every base derived from a rate table.
pub fn clamp_base(base: f64, min: f64, max: f64) -> f64 {
    min.max(base.min(max))
}

/// Round to two decimal places, halves away from zero.
pub fn round_to_tiyn(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Monthly income used to size the self-employed obligations.
///
/// Fixed at the minimum wage regardless of revenue; a proprietor may
/// legally declare more, which is not modelled.
pub fn declared_income(rates: &RateTable) -> f64 {
    rates.minimum_wage.max(0.0)
}

/// Unrounded obligation amounts for a single month.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthlyObligations {
    pub opv: f64,
    pub so: f64,
    pub vosms: f64,
}

impl MonthlyObligations {
    /// Scale to `months` and round each amount.
    pub fn for_months(&self, months: u8) -> ObligationAmounts {
        let months = f64::from(months);
        ObligationAmounts {
            opv: round_to_tiyn(self.opv * months),
            so: round_to_tiyn(self.so * months),
            vosms: round_to_tiyn(self.vosms * months),
        }
    }
}

/// Monthly bases after clamping to their minimum wage multiples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthlyBases {
    pub opv: f64,
    pub so: f64,
}

/// Computes pension, social and medical contributions.
#[derive(Debug, Clone, Copy)]
pub struct ObligationCalculator<'a> {
    rates: &'a RateTable,
}

impl<'a> ObligationCalculator<'a> {
    pub fn new(rates: &'a RateTable) -> Self {
        Self { rates }
    }

    /// Clamped monthly bases of the two income-linked contributions.
    pub fn bases(&self, declared_income: f64) -> MonthlyBases {
        let r = self.rates;
        let mzp = r.minimum_wage;
        MonthlyBases {
            opv: clamp_base(
                declared_income,
                r.opv.base_min_multiplier * mzp,
                r.opv.base_max_multiplier * mzp,
            ),
            so: clamp_base(
                declared_income,
                r.so.base_min_multiplier * mzp,
                r.so.base_max_multiplier * mzp,
            ),
        }
    }

    pub fn monthly(&self, declared_income: f64) -> MonthlyObligations {
        let r = self.rates;
        let bases = self.bases(declared_income);

        let opv = bases.opv * r.opv.rate;
        // The SO base is reduced by the monthly OPV amount before the SO
        // rate applies.
        let so = ((bases.so - opv) * r.so.rate).max(0.0);
        let vosms = r.vosms.base_multiplier * r.minimum_wage * r.vosms.rate;

        MonthlyObligations { opv, so, vosms }
    }

    /// Obligations for `months` worked, each rounded after scaling.
    pub fn for_period(&self, declared_income: f64, months: u8) -> ObligationAmounts {
        self.monthly(declared_income).for_months(months)
    }
}

impl ObligationAmounts {
    /// Rounded sum of the three contributions.
    pub fn total(&self) -> f64 {
        round_to_tiyn(self.opv + self.so + self.vosms)
    }
}

/// Computes the IPN and SN components of the simplified-regime tax.
#[derive(Debug, Clone, Copy)]
pub struct TaxCalculator<'a> {
    rates: &'a RateTable,
}

impl<'a> TaxCalculator<'a> {
    pub fn new(rates: &'a RateTable) -> Self {
        Self { rates }
    }

    /// `so` must be the period's scaled and rounded SO amount.
    pub fn calculate(&self, revenue: f64, so: f64) -> TaxAmounts {
        let ipn_calculated = revenue * self.rates.ipn_rate;
        let sn_calculated = revenue * self.rates.sn_rate;
        let sn_adjusted = (sn_calculated - so).max(0.0);

        let ipn = round_to_tiyn(ipn_calculated);
        let sn = round_to_tiyn(sn_adjusted);
        TaxAmounts {
            ipn,
            sn,
            total_tax: round_to_tiyn(ipn + sn),
        }
    }
}
