//! Listings

use rusty_money::{Money, iso::Currency};
use serde_json::{Map, Value};

/// Opaque fields carried alongside a listing for the cart automation step.
pub type ListingPayload = Map<String, Value>;

/// A single store's offer for an item.
#[derive(Clone, Debug, PartialEq)]
pub struct Listing<'a> {
    store: String,
    price: Money<'a, Currency>,
    payload: ListingPayload,
}

impl<'a> Listing<'a> {
    /// Creates a new listing without any passthrough fields.
    pub fn new(store: impl Into<String>, price: Money<'a, Currency>) -> Self {
        Self::with_payload(store, price, ListingPayload::new())
    }

    /// Creates a new listing with passthrough fields.
    pub fn with_payload(
        store: impl Into<String>,
        price: Money<'a, Currency>,
        payload: ListingPayload,
    ) -> Self {
        Self {
            store: store.into(),
            price,
            payload,
        }
    }

    /// Identifier of the store offering this listing
    pub fn store(&self) -> &str {
        &self.store
    }

    /// Price of the listing
    pub fn price(&self) -> &Money<'a, Currency> {
        &self.price
    }

    /// Fields the optimizer does not interpret.
    pub fn payload(&self) -> &ListingPayload {
        &self.payload
    }
}
