//! Shipping fees
//!
//! Stores describe their shipping as a sparse table of `order size -> total fee`, e.g.
//! `{0: 0, 1: 500, 4: 0}` reads "nothing for no items, 5.00 for one to three items, free from
//! four". Before solving, each table is expanded into a dense [`FeeTable`] indexed by order size.

use std::{collections::BTreeMap, fs, path::Path};

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::stores::Store;

/// Flat fee (in minor units) charged by stores missing from the fee configuration.
pub const DEFAULT_FLAT_FEE: i64 = 500;

/// Fee configuration errors
#[derive(Debug, Error)]
pub enum FeeError {
    /// A schedule entry carries a negative fee.
    #[error("store {store} has a negative fee of {fee} for {count} items")]
    NegativeFee {
        /// Store identifier
        store: String,
        /// Order size of the offending entry
        count: usize,
        /// Fee in minor units
        fee: i64,
    },

    /// The configured default flat fee is negative.
    #[error("default flat fee must not be negative, got {0}")]
    NegativeDefaultFee(i64),

    /// IO error reading the configuration file
    #[error("failed to read fee configuration: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("failed to parse JSON fee configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("failed to parse YAML fee configuration: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// The file extension is neither JSON nor YAML.
    #[error("unsupported fee configuration format: {0}")]
    UnsupportedFormat(String),
}

/// Sparse mapping from order size to the total fee (in minor units) for an order of that size.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FeeSchedule {
    fees: BTreeMap<usize, i64>,
}

impl FeeSchedule {
    /// Create a schedule from `(order size, fee)` entries.
    ///
    /// # Errors
    ///
    /// Returns [`FeeError::NegativeFee`] if any fee is negative.
    pub fn new(
        store: &str,
        entries: impl IntoIterator<Item = (usize, i64)>,
    ) -> Result<Self, FeeError> {
        let fees: BTreeMap<usize, i64> = entries.into_iter().collect();

        if let Some((&count, &fee)) = fees.iter().find(|&(_, &fee)| fee < 0) {
            return Err(FeeError::NegativeFee {
                store: store.to_string(),
                count,
                fee,
            });
        }

        Ok(Self { fees })
    }

    /// Schedule charging `fee` once as soon as at least one item is ordered.
    ///
    /// # Errors
    ///
    /// Returns [`FeeError::NegativeDefaultFee`] if `fee` is negative.
    pub fn flat(fee: i64) -> Result<Self, FeeError> {
        if fee < 0 {
            return Err(FeeError::NegativeDefaultFee(fee));
        }

        Ok(Self {
            fees: BTreeMap::from([(0, 0), (1, fee)]),
        })
    }

    /// Expand into a dense table covering order sizes `0..=max_items`.
    ///
    /// Each entry takes the last declared fee at or below its order size. Order size zero is
    /// free unless declared otherwise. Declared sizes above `max_items` are ignored.
    pub fn expand(&self, max_items: usize) -> FeeTable {
        let mut fees = Vec::with_capacity(max_items.saturating_add(1));
        let mut current = 0;

        for count in 0..=max_items {
            if let Some(&fee) = self.fees.get(&count) {
                current = fee;
            }

            fees.push(current);
        }

        FeeTable { fees }
    }
}

/// Dense fee lookup indexed by order size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeeTable {
    fees: Vec<i64>,
}

impl FeeTable {
    /// Fee for an order of `count` items.
    pub fn fee_for(&self, count: usize) -> Option<i64> {
        self.fees.get(count).copied()
    }

    /// Largest order size covered by the table.
    pub fn max_items(&self) -> usize {
        self.fees.len().saturating_sub(1)
    }

    /// Iterate over `(order size, fee)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, i64)> + '_ {
        self.fees.iter().copied().enumerate()
    }

    /// Smallest fee in the table.
    pub fn min_fee(&self) -> i64 {
        self.fees.iter().copied().min().unwrap_or(0)
    }

    /// Largest fee in the table.
    pub fn max_fee(&self) -> i64 {
        self.fees.iter().copied().max().unwrap_or(0)
    }

    /// Fees as a slice, indexed by order size.
    pub fn as_slice(&self) -> &[i64] {
        &self.fees
    }
}

/// Shipping data for a single store, as found in the fee configuration file.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Website {
    /// Display name
    #[serde(default)]
    pub site_name: Option<String>,

    /// Storefront link
    #[serde(default)]
    pub link: Option<String>,

    /// Sparse order size -> fee table in minor units
    #[serde(default)]
    pub fees: BTreeMap<usize, i64>,
}

/// Fee configuration for all known stores.
#[derive(Clone, Debug, Deserialize)]
pub struct FeeConfig {
    /// Fee charged by unknown stores once at least one item is bought from them
    #[serde(default = "default_flat_fee")]
    pub default_flat_fee: i64,

    /// Known stores keyed by store identifier
    #[serde(default)]
    pub websites: BTreeMap<String, Website>,
}

fn default_flat_fee() -> i64 {
    DEFAULT_FLAT_FEE
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            default_flat_fee: DEFAULT_FLAT_FEE,
            websites: BTreeMap::new(),
        }
    }
}

impl FeeConfig {
    /// Create an empty configuration with the given default flat fee.
    pub fn with_default_flat_fee(default_flat_fee: i64) -> Self {
        Self {
            default_flat_fee,
            websites: BTreeMap::new(),
        }
    }

    /// Add or replace a store's fee table.
    #[must_use]
    pub fn with_store(
        mut self,
        store: impl Into<String>,
        fees: impl IntoIterator<Item = (usize, i64)>,
    ) -> Self {
        self.websites.insert(
            store.into(),
            Website {
                fees: fees.into_iter().collect(),
                ..Website::default()
            },
        );

        self
    }

    /// Parse a JSON fee configuration.
    ///
    /// # Errors
    ///
    /// Returns [`FeeError::Json`] if the document is malformed.
    pub fn from_json_str(contents: &str) -> Result<Self, FeeError> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Parse a YAML fee configuration.
    ///
    /// # Errors
    ///
    /// Returns [`FeeError::Yaml`] if the document is malformed.
    pub fn from_yaml_str(contents: &str) -> Result<Self, FeeError> {
        Ok(serde_norway::from_str(contents)?)
    }

    /// Load a fee configuration, choosing the parser from the file extension.
    ///
    /// # Errors
    ///
    /// Returns a [`FeeError`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FeeError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&contents),
            Some("yml" | "yaml") => Self::from_yaml_str(&contents),
            _ => Err(FeeError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Resolve the fee schedule for a participating store.
    ///
    /// Stores without shipping data get `{0: 0, 1: default_flat_fee}`. That is logged and
    /// otherwise treated as normal.
    ///
    /// # Errors
    ///
    /// Returns a [`FeeError`] if the configured or default fees are negative.
    pub fn resolve_store(&self, id: &str) -> Result<Store, FeeError> {
        match self.websites.get(id) {
            Some(website) => {
                let schedule = FeeSchedule::new(id, website.fees.iter().map(|(&k, &v)| (k, v)))?;

                Ok(Store::new(id, schedule))
            }
            None => {
                warn!(
                    store = id,
                    default_flat_fee = self.default_flat_fee,
                    "no shipping data found for store, using default flat fee"
                );

                Ok(Store::synthesized(id, FeeSchedule::flat(self.default_flat_fee)?))
            }
        }
    }

    /// Resolve every participating store.
    ///
    /// # Errors
    ///
    /// Returns a [`FeeError`] if any resolved schedule carries a negative fee.
    pub fn resolve_stores<'s>(
        &self,
        ids: impl IntoIterator<Item = &'s str>,
    ) -> Result<Vec<Store>, FeeError> {
        ids.into_iter().map(|id| self.resolve_store(id)).collect()
    }
}

/// Expand every store's schedule to cover `0..=max_items` order sizes.
pub fn resolve_fee_tables(stores: &[Store], max_items: usize) -> Vec<FeeTable> {
    stores
        .iter()
        .map(|store| store.schedule().expand(max_items))
        .collect()
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn expand_forward_fills_flat_schedule() -> TestResult {
        let schedule = FeeSchedule::new("a", [(0, 0), (1, 500)])?;

        assert_eq!(schedule.expand(3).as_slice(), &[0, 500, 500, 500]);

        Ok(())
    }

    #[test]
    fn expand_defaults_order_size_zero_to_free() -> TestResult {
        let schedule = FeeSchedule::new("a", [(2, 300)])?;

        assert_eq!(schedule.expand(3).as_slice(), &[0, 0, 300, 300]);

        Ok(())
    }

    #[test]
    fn expand_keeps_non_monotonic_steps() -> TestResult {
        let schedule = FeeSchedule::new("a", [(0, 0), (1, 800), (2, 500)])?;
        let table = schedule.expand(4);

        assert_eq!(table.as_slice(), &[0, 800, 500, 500, 500]);
        assert_eq!(table.min_fee(), 0);
        assert_eq!(table.max_fee(), 800);

        Ok(())
    }

    #[test]
    fn expand_ignores_entries_beyond_max_items() -> TestResult {
        let schedule = FeeSchedule::new("a", [(0, 0), (1, 500), (5, 0)])?;
        let table = schedule.expand(2);

        assert_eq!(table.as_slice(), &[0, 500, 500]);
        assert_eq!(table.max_items(), 2);
        assert_eq!(table.fee_for(3), None);

        Ok(())
    }

    #[test]
    fn expand_with_zero_items_has_single_entry() {
        let table = FeeSchedule::default().expand(0);

        assert_eq!(table.iter().collect::<Vec<_>>(), vec![(0, 0)]);
    }

    #[test]
    fn schedule_rejects_negative_fees() {
        let result = FeeSchedule::new("a", [(0, 0), (3, -100)]);

        assert!(matches!(
            result,
            Err(FeeError::NegativeFee { store, count: 3, fee: -100 }) if store == "a"
        ));
    }

    #[test]
    fn flat_schedule_charges_once() -> TestResult {
        let schedule = FeeSchedule::flat(250)?;

        assert_eq!(schedule.expand(2).as_slice(), &[0, 250, 250]);

        Ok(())
    }

    #[test]
    fn unknown_store_gets_synthesized_default() -> TestResult {
        let config = FeeConfig::with_default_flat_fee(700);

        let store = config.resolve_store("mystery")?;

        assert!(store.is_synthesized());
        assert_eq!(store.schedule().expand(2).as_slice(), &[0, 700, 700]);

        Ok(())
    }

    #[test]
    fn known_store_uses_configured_schedule() -> TestResult {
        let config = FeeConfig::default().with_store("a", [(0, 0), (1, 0), (2, 50)]);

        let stores = config.resolve_stores(["a", "b"])?;

        assert_eq!(stores.len(), 2);
        assert!(stores.first().is_some_and(|s| !s.is_synthesized()));
        assert!(stores.get(1).is_some_and(Store::is_synthesized));

        let tables = resolve_fee_tables(&stores, 2);

        let expected: [&[i64]; 2] = [&[0, 0, 50], &[0, 500, 500]];

        assert_eq!(
            tables.iter().map(FeeTable::as_slice).collect::<Vec<_>>(),
            expected
        );

        Ok(())
    }

    #[test]
    fn negative_default_fee_is_rejected() {
        let config = FeeConfig::with_default_flat_fee(-1);

        assert!(matches!(
            config.resolve_store("x"),
            Err(FeeError::NegativeDefaultFee(-1))
        ));
    }

    #[test]
    fn parses_websites_json_with_string_keys() -> TestResult {
        let json = r#"{
            "websites": {
                "store-a": {
                    "site_name": "Store A",
                    "link": "https://a.example",
                    "fees": { "0": 0, "1": 500, "3": 0 }
                }
            }
        }"#;

        let config = FeeConfig::from_json_str(json)?;

        assert_eq!(config.default_flat_fee, DEFAULT_FLAT_FEE);

        let store = config.resolve_store("store-a")?;

        assert_eq!(store.schedule().expand(4).as_slice(), &[0, 500, 500, 0, 0]);

        Ok(())
    }

    #[test]
    fn parses_yaml_configuration() -> TestResult {
        let yaml = r"
default_flat_fee: 300
websites:
  store-b:
    fees:
      0: 0
      1: 800
      2: 500
";

        let config = FeeConfig::from_yaml_str(yaml)?;

        assert_eq!(config.default_flat_fee, 300);
        assert_eq!(
            config.resolve_store("store-b")?.schedule().expand(3).as_slice(),
            &[0, 800, 500, 500]
        );

        Ok(())
    }

    #[test]
    fn load_rejects_unknown_extension() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("fees.toml");
        fs::write(&path, "")?;

        assert!(matches!(
            FeeConfig::load(&path),
            Err(FeeError::UnsupportedFormat(_))
        ));

        Ok(())
    }

    #[test]
    fn load_reads_json_files() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("websites.json");
        fs::write(&path, r#"{"websites": {"a": {"fees": {"1": 100}}}}"#)?;

        let config = FeeConfig::load(&path)?;

        assert_eq!(
            config.resolve_store("a")?.schedule().expand(1).fee_for(1),
            Some(100)
        );

        Ok(())
    }
}
