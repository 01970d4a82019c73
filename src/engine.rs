//! Tax computation engine.
//!
//! The `engine` module turns a validated [`TaxPeriodInput`] into a
//! [`CalculationResult`] using a single [`RateTable`].  Computation is
//! pure: no I/O, no shared mutable state, and identical arguments
//! always produce an identical result.  Batches are spread across CPU
//! cores with [`rayon`].

use crate::models::{CalculationResult, TaxPeriodInput};
use crate::rates::RateTable;
use crate::tax::{declared_income, ObligationCalculator, TaxCalculator};
use rayon::prelude::*;
use thiserror::Error;

/// Share of the revenue limit above which an approaching-limit
/// warning is raised.
pub const LIMIT_WARNING_THRESHOLD_PERCENT: f64 = 80.0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A computed value was NaN or infinite.  Validated inputs and
    /// validated rate tables never produce one.
    #[error("calculation produced a non-finite value for {field}")]
    NonFinite { field: &'static str },
}

/// Revenue limit warnings, in the order they are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitWarning {
    ExceedsLimit,
    ApproachingLimit,
}

impl LimitWarning {
    pub fn message(&self) -> &'static str {
        match self {
            LimitWarning::ExceedsLimit => {
                "WARNING: your revenue exceeds the limit for the simplified regime!"
            }
            LimitWarning::ApproachingLimit => {
                "NOTICE: your revenue is approaching the limit for the simplified regime."
            }
        }
    }
}

/// Revenue position relative to the regime limit.
#[derive(Debug, Clone, PartialEq)]
pub struct LimitStatus {
    pub revenue_limit_value: f64,
    pub limit_percentage: f64,
    pub warnings: Vec<LimitWarning>,
}

/// Compare revenue against the half-year limit.
///
/// At most one warning is raised: exceeding the limit takes priority
/// over approaching it.  Revenue exactly at the limit only approaches.
pub fn evaluate_limit(revenue: f64, rates: &RateTable) -> LimitStatus {
    let revenue_limit_value = rates.revenue_limit_value();
    let limit_percentage = revenue / revenue_limit_value * 100.0;

    let mut warnings = Vec::new();
    if revenue > revenue_limit_value {
        warnings.push(LimitWarning::ExceedsLimit);
    } else if limit_percentage > LIMIT_WARNING_THRESHOLD_PERCENT {
        warnings.push(LimitWarning::ApproachingLimit);
    }

    LimitStatus {
        revenue_limit_value,
        limit_percentage,
        warnings,
    }
}

/// Compute taxes and social obligations for one period.
pub fn compute(
    input: &TaxPeriodInput,
    rates: &RateTable,
) -> Result<CalculationResult, EngineError> {
    let limit = evaluate_limit(input.revenue(), rates);

    let obligations = ObligationCalculator::new(rates)
        .for_period(declared_income(rates), input.months_worked());
    let taxes = TaxCalculator::new(rates).calculate(input.revenue(), obligations.so);

    let result = CalculationResult {
        input: *input,
        year: rates.year,
        obligations,
        taxes,
        total_social: obligations.total(),
        limit_percentage: limit.limit_percentage,
        revenue_limit_value: limit.revenue_limit_value,
        warnings: limit
            .warnings
            .iter()
            .map(|warning| warning.message().to_string())
            .collect(),
    };
    ensure_finite(&result)?;
    Ok(result)
}

/// Compute every input against the same rate table in parallel.
///
/// Results keep the order of `inputs`.  The first failure aborts the
/// batch.
pub fn compute_batch(
    inputs: &[TaxPeriodInput],
    rates: &RateTable,
) -> Result<Vec<CalculationResult>, EngineError> {
    inputs
        .par_iter()
        .map(|input| compute(input, rates))
        .collect()
}

fn ensure_finite(result: &CalculationResult) -> Result<(), EngineError> {
    let fields = [
        ("opv", result.obligations.opv),
        ("so", result.obligations.so),
        ("vosms", result.obligations.vosms),
        ("total_social", result.total_social),
        ("ipn", result.taxes.ipn),
        ("sn", result.taxes.sn),
        ("total_tax", result.taxes.total_tax),
        ("limit_percentage", result.limit_percentage),
        ("revenue_limit_value", result.revenue_limit_value),
    ];
    match fields.iter().find(|(_, value)| !value.is_finite()) {
        Some((field, _)) => Err(EngineError::NonFinite { field: *field }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(revenue: f64, months: i64) -> TaxPeriodInput {
        TaxPeriodInput::new(revenue, months).unwrap()
    }

    #[test]
    fn zero_revenue_full_half_year() {
        let rates = RateTable::kz_2024();
        let result = compute(&input(0.0, 6), &rates).unwrap();

        assert_eq!(result.obligations.opv, 51_000.0);
        assert_eq!(result.obligations.so, 16_065.0);
        assert_eq!(result.obligations.vosms, 35_700.0);
        assert_eq!(result.total_social, 102_765.0);
        assert_eq!(result.taxes.ipn, 0.0);
        assert_eq!(result.taxes.sn, 0.0);
        assert_eq!(result.taxes.total_tax, 0.0);
        assert_eq!(result.limit_percentage, 0.0);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn revenue_at_limit_only_approaches() {
        let rates = RateTable::kz_2024();
        let limit = rates.revenue_limit_value();
        let result = compute(&input(limit, 6), &rates).unwrap();

        assert_eq!(result.limit_percentage, 100.0);
        assert_eq!(
            result.warnings,
            vec![LimitWarning::ApproachingLimit.message().to_string()]
        );
    }

    #[test]
    fn revenue_above_limit_only_exceeds() {
        let rates = RateTable::kz_2024();
        let limit = rates.revenue_limit_value();
        let result = compute(&input(limit * 1.01, 6), &rates).unwrap();

        assert_eq!(
            result.warnings,
            vec![LimitWarning::ExceedsLimit.message().to_string()]
        );
        assert!(result.limit_percentage > 100.0);
    }

    #[test]
    fn eighty_percent_is_not_yet_approaching() {
        let rates = RateTable::kz_2024();
        let status = evaluate_limit(rates.revenue_limit_value() * 0.8, &rates);
        assert!(status.warnings.is_empty());

        let status = evaluate_limit(rates.revenue_limit_value() * 0.81, &rates);
        assert_eq!(status.warnings, vec![LimitWarning::ApproachingLimit]);
    }

    #[test]
    fn typical_half_year() {
        let rates = RateTable::kz_2024();
        let result = compute(&input(12_000_000.0, 6), &rates).unwrap();

        assert_eq!(result.taxes.ipn, 180_000.0);
        assert_eq!(result.taxes.sn, 163_935.0);
        assert_eq!(result.taxes.total_tax, 343_935.0);
        assert_eq!(result.total_social, 102_765.0);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn single_month_obligations() {
        let rates = RateTable::kz_2024();
        let result = compute(&input(500_000.0, 1), &rates).unwrap();

        assert_eq!(result.obligations.opv, 8_500.0);
        assert_eq!(result.obligations.so, 2_677.5);
        assert_eq!(result.obligations.vosms, 5_950.0);
        assert_eq!(result.total_social, 17_127.5);
        assert_eq!(result.taxes.ipn, 7_500.0);
        assert_eq!(result.taxes.sn, 4_822.5);
    }

    #[test]
    fn non_finite_rates_are_caught() {
        let mut rates = RateTable::kz_2024();
        rates.ipn_rate = f64::NAN;
        assert_eq!(
            compute(&input(1_000.0, 1), &rates),
            Err(EngineError::NonFinite { field: "ipn" })
        );
    }

    #[test]
    fn batch_preserves_order() {
        let rates = RateTable::kz_2024();
        let inputs: Vec<_> = (1..=6).map(|m| input(1_000_000.0 * m as f64, m)).collect();
        let results = compute_batch(&inputs, &rates).unwrap();

        assert_eq!(results.len(), inputs.len());
        for (result, input) in results.iter().zip(&inputs) {
            assert_eq!(result.input, *input);
            assert_eq!(*result, compute(input, &rates).unwrap());
        }
    }
}
