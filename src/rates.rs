//! Fiscal rate tables.
//!
//! A [`RateTable`] holds every constant the engine needs for one
//! jurisdiction and fiscal year.  Tables are grouped into a
//! [`RateBook`] keyed by year so that a new year only requires a new
//! JSON file under `rate_tables/`, never a code change.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Rate and base bounds of a contribution whose monthly base is
/// clamped between two multiples of the minimum wage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundedContribution {
    pub rate: f64,
    pub base_min_multiplier: f64,
    pub base_max_multiplier: f64,
}

/// Rate and base of a contribution levied on a fixed multiple of the
/// minimum wage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedBaseContribution {
    pub rate: f64,
    pub base_multiplier: f64,
}

/// Fiscal constants for one jurisdiction and year.
///
/// Tables are immutable once built and are shared between requests
/// behind an `Arc` without any locking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    /// Jurisdiction code, e.g. `"KZ"`.
    pub jurisdiction: String,
    pub year: u16,
    /// Monthly calculation index (МРП) in tenge.
    pub calculation_index: f64,
    /// Minimum monthly wage (МЗП) in tenge.
    pub minimum_wage: f64,
    /// Combined simplified-regime rate; must equal `ipn_rate + sn_rate`.
    pub simplified_rate: f64,
    pub ipn_rate: f64,
    pub sn_rate: f64,
    /// Half-year revenue limit expressed in calculation indexes.
    pub revenue_limit_index_units: f64,
    pub opv: BoundedContribution,
    pub so: BoundedContribution,
    pub vosms: FixedBaseContribution,
}

impl RateTable {
    /// Constants for Kazakhstan, fiscal year 2024.
    pub fn kz_2024() -> Self {
        RateTable {
            jurisdiction: "KZ".to_string(),
            year: 2024,
            calculation_index: 3692.0,
            minimum_wage: 85000.0,
            simplified_rate: 0.03,
            ipn_rate: 0.015,
            sn_rate: 0.015,
            revenue_limit_index_units: 24038.0,
            opv: BoundedContribution {
                rate: 0.10,
                base_min_multiplier: 1.0,
                base_max_multiplier: 50.0,
            },
            so: BoundedContribution {
                rate: 0.035,
                base_min_multiplier: 1.0,
                base_max_multiplier: 7.0,
            },
            vosms: FixedBaseContribution {
                rate: 0.05,
                base_multiplier: 1.4,
            },
        }
    }

    /// Half-year revenue limit in tenge.
    pub fn revenue_limit_value(&self) -> f64 {
        self.revenue_limit_index_units * self.calculation_index
    }

    /// Check the table for values the engine cannot work with.
    ///
    /// In particular this enforces `min <= max` on every clamped base,
    /// which the clamping function takes as a precondition.
    pub fn validate(&self) -> Result<(), RateTableError> {
        let invalid = |reason: String| RateTableError::Invalid {
            year: self.year,
            reason,
        };

        let constants = [
            ("calculation_index", self.calculation_index),
            ("minimum_wage", self.minimum_wage),
            ("revenue_limit_index_units", self.revenue_limit_index_units),
        ];
        for (name, value) in constants {
            if !value.is_finite() || value <= 0.0 {
                return Err(invalid(format!("{name} must be a positive number, got {value}")));
            }
        }

        let rates = [
            ("simplified_rate", self.simplified_rate),
            ("ipn_rate", self.ipn_rate),
            ("sn_rate", self.sn_rate),
            ("opv.rate", self.opv.rate),
            ("so.rate", self.so.rate),
            ("vosms.rate", self.vosms.rate),
        ];
        for (name, rate) in rates {
            if !rate.is_finite() || !(0.0..=1.0).contains(&rate) {
                return Err(invalid(format!("{name} must lie in [0, 1], got {rate}")));
            }
        }

        if (self.ipn_rate + self.sn_rate - self.simplified_rate).abs() > 1e-9 {
            return Err(invalid(format!(
                "ipn_rate + sn_rate ({}) does not match simplified_rate ({})",
                self.ipn_rate + self.sn_rate,
                self.simplified_rate
            )));
        }

        for (name, bounds) in [("opv", &self.opv), ("so", &self.so)] {
            let (min, max) = (bounds.base_min_multiplier, bounds.base_max_multiplier);
            if !min.is_finite() || !max.is_finite() || min <= 0.0 {
                return Err(invalid(format!("{name} base multipliers must be positive")));
            }
            if min > max {
                return Err(invalid(format!(
                    "{name} base minimum ({min}) exceeds its maximum ({max})"
                )));
            }
        }

        let vosms = self.vosms.base_multiplier;
        if !vosms.is_finite() || vosms <= 0.0 {
            return Err(invalid(format!(
                "vosms.base_multiplier must be a positive number, got {vosms}"
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum RateTableError {
    #[error("failed to read rate tables from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("rate table for {year} is invalid: {reason}")]
    Invalid { year: u16, reason: String },
}

/// Rate tables keyed by fiscal year.
#[derive(Debug, Clone, Default)]
pub struct RateBook {
    tables: BTreeMap<u16, RateTable>,
}

impl RateBook {
    /// A book holding only the tables compiled into the binary.
    pub fn builtin() -> Self {
        let mut book = RateBook::default();
        book.insert(RateTable::kz_2024());
        book
    }

    /// Add a table, replacing any table already held for its year.
    pub fn insert(&mut self, table: RateTable) -> Option<RateTable> {
        self.tables.insert(table.year, table)
    }

    pub fn get(&self, year: u16) -> Option<&RateTable> {
        self.tables.get(&year)
    }

    /// The table for the most recent fiscal year.
    pub fn latest(&self) -> Option<&RateTable> {
        self.tables.values().next_back()
    }

    pub fn years(&self) -> impl Iterator<Item = u16> + '_ {
        self.tables.keys().copied()
    }

    /// Overlay every `.json` rate table found in `path` on top of the
    /// built-in tables.
    ///
    /// Files that are not valid JSON rate tables are logged and
    /// skipped.  A file that parses but fails [`RateTable::validate`]
    /// is an error: a broken table must not silently fall back to an
    /// older year.
    pub fn load_dir(path: &Path) -> Result<Self, RateTableError> {
        let mut book = RateBook::builtin();
        for table in load_rate_tables_from_dir(path)? {
            table.validate()?;
            debug!(year = table.year, jurisdiction = %table.jurisdiction, "loaded rate table");
            book.insert(table);
        }
        Ok(book)
    }
}

/// Parse all rate tables stored as `.json` files directly under `path`.
///
/// A missing directory yields an empty list.
pub fn load_rate_tables_from_dir(path: &Path) -> Result<Vec<RateTable>, RateTableError> {
    let io_err = |source: std::io::Error| RateTableError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut tables = Vec::new();
    if !path.is_dir() {
        warn!(path = %path.display(), "rate table directory not found");
        return Ok(tables);
    }

    let mut entries = std::fs::read_dir(path)
        .map_err(io_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_err)?;
    // Later files win on duplicate years, so make the order stable.
    entries.sort_by_key(|entry| entry.path());

    for entry in entries {
        let file = entry.path();
        if !file.is_file() || file.extension().map_or(true, |ext| ext != "json") {
            continue;
        }
        let data = std::fs::read_to_string(&file).map_err(|source| RateTableError::Io {
            path: file.clone(),
            source,
        })?;
        match serde_json::from_str::<RateTable>(&data) {
            Ok(table) => tables.push(table),
            Err(err) => warn!(file = %file.display(), error = %err, "skipping unparsable rate table"),
        }
    }
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("salyq-rates-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn builtin_table_is_valid() {
        let table = RateTable::kz_2024();
        table.validate().unwrap();
        assert_eq!(table.revenue_limit_value(), 88_748_296.0);
    }

    #[test]
    fn shipped_json_matches_builtin() {
        let table: RateTable =
            serde_json::from_str(include_str!("../rate_tables/kz_2024.json")).unwrap();
        assert_eq!(table, RateTable::kz_2024());
    }

    #[test]
    fn rejects_inverted_base_bounds() {
        let mut table = RateTable::kz_2024();
        table.so.base_min_multiplier = 8.0;
        let err = table.validate().unwrap_err();
        assert!(err.to_string().contains("so base minimum"));
    }

    #[test]
    fn rejects_split_rates_that_do_not_add_up() {
        let mut table = RateTable::kz_2024();
        table.sn_rate = 0.02;
        assert!(matches!(
            table.validate(),
            Err(RateTableError::Invalid { year: 2024, .. })
        ));
    }

    #[test]
    fn rejects_rates_outside_unit_interval() {
        let mut table = RateTable::kz_2024();
        table.vosms.rate = 1.5;
        assert!(table.validate().is_err());
    }

    #[test]
    fn latest_picks_highest_year() {
        let mut book = RateBook::builtin();
        let mut next = RateTable::kz_2024();
        next.year = 2025;
        book.insert(next);
        assert_eq!(book.latest().map(|t| t.year), Some(2025));
        assert_eq!(book.years().collect::<Vec<_>>(), vec![2024, 2025]);
    }

    #[test]
    fn load_dir_overlays_json_tables_and_skips_garbage() {
        let dir = scratch_dir("overlay");
        let mut table = RateTable::kz_2024();
        table.year = 2025;
        table.calculation_index = 3932.0;
        fs::write(dir.join("kz_2025.json"), serde_json::to_string(&table).unwrap()).unwrap();
        fs::write(dir.join("broken.json"), "{ not json").unwrap();
        fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let book = RateBook::load_dir(&dir).unwrap();
        assert_eq!(book.get(2025).map(|t| t.calculation_index), Some(3932.0));
        assert!(book.get(2024).is_some());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn load_dir_rejects_invalid_table() {
        let dir = scratch_dir("invalid");
        let mut table = RateTable::kz_2024();
        table.minimum_wage = -1.0;
        fs::write(dir.join("bad.json"), serde_json::to_string(&table).unwrap()).unwrap();

        assert!(matches!(
            RateBook::load_dir(&dir),
            Err(RateTableError::Invalid { .. })
        ));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_dir_yields_builtin_book() {
        let book = RateBook::load_dir(Path::new("/nonexistent/salyq/rate_tables")).unwrap();
        assert_eq!(book.years().collect::<Vec<_>>(), vec![2024]);
    }
}
