//! Data models for the Salyq Engine.
//!
//! The `models` module defines the serialisable structs exchanged
//! between the validator, the calculation engine and the presentation
//! layer.  Currency amounts are carried as `f64` and are always rounded
//! to two decimal places (tiyn) before they leave the engine.

use serde::{Deserialize, Serialize};

/// Shortest and longest activity span inside one reporting half-year.
pub const MIN_MONTHS_WORKED: u8 = 1;
pub const MAX_MONTHS_WORKED: u8 = 6;

/// Largest accepted half-year revenue, in tenge.  Every amount derived
/// from a revenue up to this bound stays exact to the tiyn in an `f64`.
pub const MAX_REVENUE: f64 = 1e13;

/// A validated reporting period.
///
/// Values of this type can only be built through
/// [`TaxPeriodInput::new`](crate::validation), which guarantees that
/// `revenue` is finite, non-negative and at most [`MAX_REVENUE`], and
/// that `months_worked` lies in `1..=6`.  The engine relies on this
/// and never re-checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TaxPeriodInput {
    /// Total revenue for the half-year, in tenge.
    pub(crate) revenue: f64,
    /// Number of months the proprietor was active within the half-year.
    pub(crate) months_worked: u8,
}

impl TaxPeriodInput {
    pub fn revenue(&self) -> f64 {
        self.revenue
    }

    pub fn months_worked(&self) -> u8 {
        self.months_worked
    }
}

/// Raw calculation request as submitted by a client.
///
/// Nothing in this struct is trusted; it must be passed through
/// [`CalculationRequest::validate`](crate::validation) before the
/// engine sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculationRequest {
    pub revenue: f64,
    pub months_worked: i64,
    /// Fiscal year whose rate table should be applied.  When omitted
    /// the server's configured default year is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
}

/// One period inside a batch request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodRequest {
    pub revenue: f64,
    pub months_worked: i64,
}

/// Several periods computed against the same fiscal year.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchCalculationRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
    pub periods: Vec<PeriodRequest>,
}

/// Mandatory social obligations for the period, already scaled by
/// the number of months worked and rounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObligationAmounts {
    /// Pension contribution (ОПВ).
    pub opv: f64,
    /// Social contribution (СО).
    pub so: f64,
    /// Medical insurance contribution (ВОСМС).
    pub vosms: f64,
}

/// Tax components owed for the period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaxAmounts {
    /// Individual income tax component (ИПН).
    pub ipn: f64,
    /// Social tax component (СН), after the SO reduction.
    pub sn: f64,
    /// `ipn + sn`.
    pub total_tax: f64,
}

/// The result of a single calculation.
///
/// A result is built fresh for every call and owned by the caller.
/// Obligation and tax amounts are flattened into the top level of the
/// JSON representation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalculationResult {
    /// The input the result was computed from.
    pub input: TaxPeriodInput,
    /// Fiscal year of the rate table that was applied.
    pub year: u16,
    #[serde(flatten)]
    pub obligations: ObligationAmounts,
    #[serde(flatten)]
    pub taxes: TaxAmounts,
    /// `opv + so + vosms`.
    pub total_social: f64,
    /// Revenue as a percentage of the regime limit.  Not rounded and
    /// not capped at 100.
    pub limit_percentage: f64,
    /// Revenue limit for the half-year in tenge.
    pub revenue_limit_value: f64,
    /// Limit warnings in evaluation order.
    pub warnings: Vec<String>,
}

/// Response envelope returned by the HTTP API.
#[derive(Debug, Clone, Serialize)]
pub struct CalculationResponse {
    pub calculation: CalculationResult,
    pub explanation: String,
    pub disclaimer: String,
}

/// Response envelope for a batch of calculations.
#[derive(Debug, Clone, Serialize)]
pub struct BatchCalculationResponse {
    pub calculations: Vec<CalculationResult>,
    pub disclaimer: String,
}
