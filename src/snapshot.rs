//! Snapshots
//!
//! A snapshot is the caller-supplied description of one optimization run: the items to buy,
//! every store's listing for each item, and optionally which stores take part. After a run the
//! chosen listing is written back into each item record as `optimal_listing`.
//!
//! ```json
//! {
//!   "currency": "CAD",
//!   "items": {
//!     "Sol Ring": {
//!       "listings": {
//!         "store-a": { "price": 1.25, "variant_id": 42 }
//!       }
//!     }
//!   }
//! }
//! ```

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::Path,
};

use rust_decimal::Decimal;
use rusty_money::{Money, iso::Currency};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{
    fees::{FeeConfig, FeeError},
    items::Item,
    listings::Listing,
    pricing::{PricingError, parse_currency, to_minor_units},
    receipt::Receipt,
    shopping_list::{ShoppingList, ShoppingListError},
};

/// Snapshot errors
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// IO error reading or writing the snapshot
    #[error("failed to access snapshot: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialisation error
    #[error("invalid JSON snapshot: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing or serialisation error
    #[error("invalid YAML snapshot: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// The file extension is neither JSON nor YAML.
    #[error("unsupported snapshot format: {0}")]
    UnsupportedFormat(String),

    /// A listing price for an item could not be converted.
    #[error("invalid price for {item} at {store}: {source}")]
    Price {
        /// Item name
        item: String,
        /// Store identifier
        store: String,
        /// Underlying conversion error
        source: PricingError,
    },

    /// Wrapped pricing error
    #[error(transparent)]
    Pricing(#[from] PricingError),

    /// Wrapped fee configuration error
    #[error(transparent)]
    Fees(#[from] FeeError),

    /// Wrapped shopping list error
    #[error(transparent)]
    ShoppingList(#[from] ShoppingListError),
}

/// A single store's listing for an item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    /// Price in major units
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,

    /// Everything else, passed through untouched
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Everything known about one item to buy.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    /// Listings keyed by store identifier
    #[serde(default)]
    pub listings: BTreeMap<String, ListingRecord>,

    /// Listing chosen by the last optimization run, `null` if the run failed
    #[serde(default)]
    pub optimal_listing: Option<ListingRecord>,

    /// Unrecognised fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Input to (and output of) one optimization run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// ISO currency code of every price. Falls back to the configured currency.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,

    /// Participating stores. Every store with a listing takes part when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stores: Option<Vec<String>>,

    /// Items keyed by name
    #[serde(default)]
    pub items: BTreeMap<String, ItemRecord>,
}

impl Snapshot {
    /// Parse a JSON snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Json`] if the document is malformed.
    pub fn from_json_str(contents: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Parse a YAML snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Yaml`] if the document is malformed.
    pub fn from_yaml_str(contents: &str) -> Result<Self, SnapshotError> {
        Ok(serde_norway::from_str(contents)?)
    }

    /// Load a snapshot, choosing the parser from the file extension.
    ///
    /// # Errors
    ///
    /// Returns a [`SnapshotError`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;

        match Format::of(path)? {
            Format::Json => Self::from_json_str(&contents),
            Format::Yaml => Self::from_yaml_str(&contents),
        }
    }

    /// Serialise as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Json`] if serialisation fails.
    pub fn to_json_string(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the snapshot, choosing the format from the file extension.
    ///
    /// # Errors
    ///
    /// Returns a [`SnapshotError`] if serialisation or writing fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let path = path.as_ref();

        let contents = match Format::of(path)? {
            Format::Json => self.to_json_string()?,
            Format::Yaml => serde_norway::to_string(self)?,
        };

        fs::write(path, contents)?;

        Ok(())
    }

    /// Currency of the snapshot, or `default` if none is declared.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Pricing`] for unsupported currency codes.
    pub fn currency_or(
        &self,
        default: &'static Currency,
    ) -> Result<&'static Currency, SnapshotError> {
        match self.currency.as_deref() {
            Some(code) => Ok(parse_currency(code)?),
            None => Ok(default),
        }
    }

    /// Participating store identifiers, sorted and deduplicated.
    pub fn store_ids(&self) -> BTreeSet<&str> {
        match &self.stores {
            Some(stores) => stores.iter().map(String::as_str).collect(),
            None => self
                .items
                .values()
                .flat_map(|record| record.listings.keys())
                .map(String::as_str)
                .collect(),
        }
    }

    /// Build the shopping list for this snapshot.
    ///
    /// Prices are rounded to minor units here, once. Store fee schedules are resolved from
    /// `fees`, falling back to the default flat fee for stores it does not know.
    ///
    /// # Errors
    ///
    /// Returns a [`SnapshotError`] for unsupported currencies, negative or oversized prices,
    /// negative fees, or duplicate stores.
    pub fn to_shopping_list(
        &self,
        fees: &FeeConfig,
        default_currency: &'static Currency,
    ) -> Result<ShoppingList<'static>, SnapshotError> {
        let currency = self.currency_or(default_currency)?;
        let stores = fees.resolve_stores(self.store_ids())?;

        let mut items = Vec::with_capacity(self.items.len());

        for (name, record) in &self.items {
            let mut item = Item::new(name.as_str());

            for (store, listing) in &record.listings {
                let minor_units = to_minor_units(listing.price, currency).map_err(|source| {
                    SnapshotError::Price {
                        item: name.clone(),
                        store: store.clone(),
                        source,
                    }
                })?;

                item.offer(Listing::with_payload(
                    store.as_str(),
                    Money::from_minor(minor_units, currency),
                    listing.fields.clone(),
                ));
            }

            items.push(item);
        }

        Ok(ShoppingList::with_items(items, stores, currency)?)
    }

    /// Record the chosen listing for every item on the receipt.
    ///
    /// The listing record is copied from the snapshot as supplied, so passthrough fields and the
    /// original price are written back unchanged. Items missing from the receipt get `null`.
    pub fn apply_receipt(&mut self, receipt: &Receipt<'_>) {
        for (name, record) in &mut self.items {
            record.optimal_listing = receipt
                .purchase_for(name)
                .and_then(|purchase| record.listings.get(purchase.store()))
                .cloned();
        }
    }

    /// Reset every item's `optimal_listing` to `null`.
    pub fn clear_optimal_listings(&mut self) {
        for record in self.items.values_mut() {
            record.optimal_listing = None;
        }
    }
}

enum Format {
    Json,
    Yaml,
}

impl Format {
    fn of(path: &Path) -> Result<Self, SnapshotError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Self::Json),
            Some("yml" | "yaml") => Ok(Self::Yaml),
            _ => Err(SnapshotError::UnsupportedFormat(path.display().to_string())),
        }
    }
}
