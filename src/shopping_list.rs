//! Shopping List

use rusty_money::iso::Currency;
use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::{items::Item, pricing::MAX_EXACT_MINOR_UNITS, stores::Store};

/// Errors related to shopping list construction.
#[derive(Debug, Error)]
pub enum ShoppingListError {
    /// A listing's currency differs from the list currency (item, store, listing currency, list currency).
    #[error("Listing for {0} at {1} has currency {2}, but the shopping list has currency {3}")]
    CurrencyMismatch(String, String, &'static str, &'static str),

    /// The same store was supplied more than once.
    #[error("Store {0} appears more than once")]
    DuplicateStore(String),

    /// The same item was supplied more than once.
    #[error("Item {0} appears more than once")]
    DuplicateItem(String),

    /// A listing price is too large to be summed exactly (item, store, price in minor units).
    #[error("Listing for {0} at {1} costs {2} minor units, which cannot be summed exactly")]
    PriceTooLarge(String, String, i64),
}

/// Snapshot of everything one optimization run needs: the items, their listings, and the
/// participating stores.
///
/// Stores are kept sorted by identifier and items in the order they were supplied, which makes
/// the solver's choice between equally cheap assignments reproducible.
#[derive(Debug, Clone)]
pub struct ShoppingList<'a> {
    items: Vec<Item<'a>>,
    stores: Vec<Store>,
    currency: &'static Currency,
}

impl<'a> ShoppingList<'a> {
    /// Create a new shopping list with the given items and participating stores.
    ///
    /// # Errors
    ///
    /// Returns a [`ShoppingListError`] on duplicate items or stores, or if any listing is priced
    /// in a different currency or at [`MAX_EXACT_MINOR_UNITS`] or more.
    pub fn with_items(
        items: impl Into<Vec<Item<'a>>>,
        stores: impl Into<Vec<Store>>,
        currency: &'static Currency,
    ) -> Result<Self, ShoppingListError> {
        let items = items.into();
        let mut stores = stores.into();

        let mut seen_items = FxHashSet::default();

        for item in &items {
            if !seen_items.insert(item.name()) {
                return Err(ShoppingListError::DuplicateItem(item.name().to_string()));
            }

            if let Some(listing) = item
                .listings()
                .find(|listing| listing.price().currency() != currency)
            {
                return Err(ShoppingListError::CurrencyMismatch(
                    item.name().to_string(),
                    listing.store().to_string(),
                    listing.price().currency().iso_alpha_code,
                    currency.iso_alpha_code,
                ));
            }

            if let Some(listing) = item
                .listings()
                .find(|listing| listing.price().to_minor_units() >= MAX_EXACT_MINOR_UNITS)
            {
                return Err(ShoppingListError::PriceTooLarge(
                    item.name().to_string(),
                    listing.store().to_string(),
                    listing.price().to_minor_units(),
                ));
            }
        }

        stores.sort_by(|a, b| a.id().cmp(b.id()));

        for pair in stores.windows(2) {
            if let [a, b] = pair
                && a.id() == b.id()
            {
                return Err(ShoppingListError::DuplicateStore(b.id().to_string()));
            }
        }

        Ok(Self {
            items,
            stores,
            currency,
        })
    }

    /// Iterate over the items in the shopping list.
    pub fn iter(&self) -> impl Iterator<Item = &Item<'a>> {
        self.items.iter()
    }

    /// Participating stores, sorted by identifier.
    pub fn stores(&self) -> &[Store] {
        &self.stores
    }

    /// Position of a store in [`ShoppingList::stores`].
    pub fn store_index(&self, id: &str) -> Option<usize> {
        find_store(&self.stores, id)
    }

    /// Get the number of items in the shopping list.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the shopping list is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get the currency of the shopping list.
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }

    /// Whether an item has at least one listing at a participating store.
    pub fn is_available(&self, item: &Item<'_>) -> bool {
        offered_by_any(&self.stores, item)
    }

    /// Names of items with no listing at any participating store.
    pub fn unlisted_items(&self) -> impl Iterator<Item = &str> {
        self.items
            .iter()
            .filter(|item| !self.is_available(item))
            .map(Item::name)
    }

    /// Split off items that no participating store offers.
    ///
    /// Such items make the list unsolvable; callers that would rather buy the rest can drop them
    /// here and run the optimizer again. Returns the remaining list and the dropped item names.
    #[must_use]
    pub fn without_unlisted(self) -> (Self, Vec<String>) {
        let Self {
            items,
            stores,
            currency,
        } = self;

        let (items, dropped): (Vec<Item<'a>>, Vec<Item<'a>>) = items
            .into_iter()
            .partition(|item| offered_by_any(&stores, item));

        (
            Self {
                items,
                stores,
                currency,
            },
            dropped.iter().map(|item| item.name().to_string()).collect(),
        )
    }
}

fn find_store(stores: &[Store], id: &str) -> Option<usize> {
    stores.binary_search_by(|store| store.id().cmp(id)).ok()
}

fn offered_by_any(stores: &[Store], item: &Item<'_>) -> bool {
    item.listings()
        .any(|listing| find_store(stores, listing.store()).is_some())
}
