//! Plain-language explanations of a calculation.
//!
//! Explanations are produced outside the engine: an [`Explainer`]
//! only reads a finished [`CalculationResult`] and never feeds back
//! into it.  Which implementation is used is decided when the server
//! is assembled.

use crate::models::CalculationResult;
use crate::rates::RateTable;
use crate::tax::{declared_income, ObligationCalculator};
use std::fmt::Write;
use std::sync::Arc;

/// Produces a human-readable explanation of a result.
///
/// Implementations must be thread-safe (`Send + Sync`) because the
/// API calls them from many requests at once.
pub trait Explainer: Send + Sync {
    /// Short name used in logs and configuration.
    fn name(&self) -> &'static str;
    fn explain(&self, result: &CalculationResult, rates: &RateTable) -> String;
}

/// Explainer selection, as named in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplainerKind {
    Template,
    Disabled,
}

impl ExplainerKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "template" => Some(Self::Template),
            "disabled" | "off" | "none" => Some(Self::Disabled),
            _ => None,
        }
    }

    pub fn build(self) -> Arc<dyn Explainer> {
        match self {
            ExplainerKind::Template => Arc::new(TemplateExplainer),
            ExplainerKind::Disabled => Arc::new(DisabledExplainer),
        }
    }
}

/// Used when explanations are switched off.
pub struct DisabledExplainer;

pub const EXPLANATION_UNAVAILABLE: &str = "An explanation of this calculation is currently unavailable.";

impl Explainer for DisabledExplainer {
    fn name(&self) -> &'static str {
        "disabled"
    }

    fn explain(&self, _result: &CalculationResult, _rates: &RateTable) -> String {
        EXPLANATION_UNAVAILABLE.to_string()
    }
}

/// Deterministic explanation rendered from a fixed template.
///
/// Every amount in the result is restated together with the base it
/// was computed from, followed by the payment and filing deadlines
/// for the half-year.
pub struct TemplateExplainer;

fn percent(rate: f64) -> f64 {
    rate * 100.0
}

impl Explainer for TemplateExplainer {
    fn name(&self) -> &'static str {
        "template"
    }

    fn explain(&self, result: &CalculationResult, rates: &RateTable) -> String {
        let months = result.input.months_worked();
        let bases = ObligationCalculator::new(rates).bases(declared_income(rates));
        let mut out = String::new();

        // Writing into a String cannot fail.
        let _ = writeln!(
            out,
            "Revenue for the half-year: {:.2} KZT over {} month(s) of activity ({} rates).",
            result.input.revenue(),
            months,
            rates.year
        );
        let _ = writeln!(
            out,
            "Simplified regime tax ({:.1}%): {:.2} KZT in total.",
            percent(rates.simplified_rate),
            result.taxes.total_tax
        );
        let _ = writeln!(
            out,
            "  - IPN: {:.2} KZT ({:.1}% of revenue).",
            result.taxes.ipn,
            percent(rates.ipn_rate)
        );
        let _ = writeln!(
            out,
            "  - SN: {:.2} KZT ({:.1}% of revenue, reduced by the social contribution, never below zero).",
            result.taxes.sn,
            percent(rates.sn_rate)
        );
        if result.taxes.sn == 0.0 {
            let _ = writeln!(
                out,
                "    SN is zero because the social contribution for the period covers it in full."
            );
        }

        let _ = writeln!(
            out,
            "Social payments for {} month(s): {:.2} KZT. They are mandatory even with little or no revenue:",
            months, result.total_social
        );
        let _ = writeln!(
            out,
            "  - OPV: {:.2} KZT ({:.1}% of a monthly base of {:.0} KZT x {}).",
            result.obligations.opv,
            percent(rates.opv.rate),
            bases.opv,
            months
        );
        let _ = writeln!(
            out,
            "  - SO: {:.2} KZT ({:.1}% of ({:.0} KZT minus the monthly OPV) x {}).",
            result.obligations.so,
            percent(rates.so.rate),
            bases.so,
            months
        );
        let _ = writeln!(
            out,
            "  - VOSMS: {:.2} KZT ({:.1}% of a fixed base of {:.0} KZT x {}).",
            result.obligations.vosms,
            percent(rates.vosms.rate),
            rates.vosms.base_multiplier * rates.minimum_wage,
            months
        );

        let _ = writeln!(
            out,
            "Your revenue is {:.1}% of the simplified regime limit of {:.0} KZT.",
            result.limit_percentage, result.revenue_limit_value
        );
        for warning in &result.warnings {
            let _ = writeln!(out, "{warning}");
        }

        let _ = writeln!(out, "Deadlines:");
        let _ = writeln!(
            out,
            "  - OPV, SO and VOSMS: monthly, by the 25th of the following month."
        );
        let _ = writeln!(
            out,
            "  - IPN and SN: by 25 August (first half-year) or 25 February (second half-year)."
        );
        let _ = write!(
            out,
            "  - Form 910 declaration: by 15 August (first half-year) or 15 February (second half-year)."
        );
        out
    }
}
