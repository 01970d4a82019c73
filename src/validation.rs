//! Input validation.
//!
//! The engine assumes a well-formed [`TaxPeriodInput`]; this module is
//! the only place one can be built from untrusted values.

use crate::models::{
    BatchCalculationRequest, CalculationRequest, TaxPeriodInput, MAX_MONTHS_WORKED,
    MAX_REVENUE, MIN_MONTHS_WORKED,
};
use crate::rates::{RateBook, RateTable};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("revenue must not be negative, got {revenue}")]
    NegativeRevenue { revenue: f64 },
    #[error("revenue must be a finite number")]
    NonFiniteRevenue,
    #[error("revenue must not exceed 10000000000000, got {revenue}")]
    RevenueTooLarge { revenue: f64 },
    #[error("months_worked must be between 1 and 6, got {months}")]
    MonthsOutOfRange { months: i64 },
    #[error("no rate table is available for fiscal year {year}")]
    UnknownYear { year: u16 },
    #[error("no rate tables are loaded")]
    NoRateTables,
    #[error("period {index}: {source}")]
    InvalidPeriod {
        index: usize,
        #[source]
        source: Box<ValidationError>,
    },
}

/// Pick the rate table for `requested`, falling back to
/// `default_year` and then to the most recent table in `book`.
pub fn resolve_rate_table(
    book: &RateBook,
    requested: Option<u16>,
    default_year: Option<u16>,
) -> Result<&RateTable, ValidationError> {
    match requested.or(default_year) {
        Some(year) => book.get(year).ok_or(ValidationError::UnknownYear { year }),
        None => book.latest().ok_or(ValidationError::NoRateTables),
    }
}

impl TaxPeriodInput {
    pub fn new(revenue: f64, months_worked: i64) -> Result<Self, ValidationError> {
        if !revenue.is_finite() {
            return Err(ValidationError::NonFiniteRevenue);
        }
        if revenue < 0.0 {
            return Err(ValidationError::NegativeRevenue { revenue });
        }
        if revenue > MAX_REVENUE {
            return Err(ValidationError::RevenueTooLarge { revenue });
        }
        let months = u8::try_from(months_worked)
            .ok()
            .filter(|m| (MIN_MONTHS_WORKED..=MAX_MONTHS_WORKED).contains(m))
            .ok_or(ValidationError::MonthsOutOfRange {
                months: months_worked,
            })?;

        Ok(TaxPeriodInput {
            // Normalise -0.0 so it serialises as 0.
            revenue: revenue + 0.0,
            months_worked: months,
        })
    }
}

impl CalculationRequest {
    /// Validate the request and resolve the rate table it refers to.
    pub fn validate<'b>(
        &self,
        book: &'b RateBook,
        default_year: Option<u16>,
    ) -> Result<(TaxPeriodInput, &'b RateTable), ValidationError> {
        let input = TaxPeriodInput::new(self.revenue, self.months_worked)?;
        let rates = resolve_rate_table(book, self.year, default_year)?;
        Ok((input, rates))
    }
}

impl BatchCalculationRequest {
    /// Validate every period.  The first invalid period is reported
    /// with its position in the batch.
    pub fn validate<'b>(
        &self,
        book: &'b RateBook,
        default_year: Option<u16>,
    ) -> Result<(Vec<TaxPeriodInput>, &'b RateTable), ValidationError> {
        let rates = resolve_rate_table(book, self.year, default_year)?;
        let inputs = self
            .periods
            .iter()
            .enumerate()
            .map(|(index, period)| {
                TaxPeriodInput::new(period.revenue, period.months_worked).map_err(|source| {
                    ValidationError::InvalidPeriod {
                        index,
                        source: Box::new(source),
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok((inputs, rates))
    }
}
