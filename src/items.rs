//! Items

use smallvec::SmallVec;

use crate::listings::Listing;

/// A needed item and the candidate listings for it, at most one per store.
#[derive(Clone, Debug, PartialEq)]
pub struct Item<'a> {
    name: String,
    listings: SmallVec<[Listing<'a>; 8]>,
}

impl<'a> Item<'a> {
    /// Creates a new item with no listings.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            listings: SmallVec::new(),
        }
    }

    /// Creates a new item from a set of listings, keeping the cheapest per store.
    pub fn with_listings(
        name: impl Into<String>,
        listings: impl IntoIterator<Item = Listing<'a>>,
    ) -> Self {
        let mut item = Self::new(name);

        for listing in listings {
            item.offer(listing);
        }

        item
    }

    /// Record a listing for this item.
    ///
    /// Only the cheapest listing per store is retained; on equal prices the first one seen wins.
    /// Returns `true` if the listing was kept.
    pub fn offer(&mut self, listing: Listing<'a>) -> bool {
        match self
            .listings
            .iter_mut()
            .find(|existing| existing.store() == listing.store())
        {
            Some(existing) => {
                if listing.price().to_minor_units() < existing.price().to_minor_units() {
                    *existing = listing;
                    true
                } else {
                    false
                }
            }
            None => {
                self.listings.push(listing);
                true
            }
        }
    }

    /// Returns the name of the item
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the listing offered by `store`, if any.
    pub fn listing_at(&self, store: &str) -> Option<&Listing<'a>> {
        self.listings.iter().find(|listing| listing.store() == store)
    }

    /// Iterate over the retained listings.
    pub fn listings(&self) -> impl Iterator<Item = &Listing<'a>> {
        self.listings.iter()
    }
}
