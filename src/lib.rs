//! Salyq Engine library crate.
//!
//! This crate computes the simplified-regime tax and the mandatory
//! social payments a sole proprietor owes for a half-year.  The pure
//! calculation lives in [`engine`], [`tax`] and [`rates`]; validation,
//! explanations and the HTTP API sit around it.  External applications
//! may call [`engine::compute`] directly or embed the API via
//! [`api::build_router`].

pub mod api;
pub mod config;
pub mod engine;
pub mod explain;
pub mod models;
pub mod rates;
pub mod tax;
pub mod telemetry;
pub mod validation;

pub use engine::{compute, compute_batch, EngineError};
pub use models::{CalculationResult, TaxPeriodInput};
pub use rates::{RateBook, RateTable};
pub use validation::ValidationError;
