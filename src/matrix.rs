//! Cost Matrix

use crate::{pricing::MAX_EXACT_MINOR_UNITS, shopping_list::ShoppingList};

/// Cost recorded for an item a store does not offer.
///
/// Model construction rejects any problem whose worst-case total could reach this value, so it
/// is always larger than a feasible total.
pub const UNAVAILABLE: i64 = MAX_EXACT_MINOR_UNITS;

/// Dense item x store grid of prices in minor units.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CostMatrix {
    items: Vec<String>,
    costs: Vec<i64>,
    num_items: usize,
    num_stores: usize,
}

impl CostMatrix {
    /// Build the matrix for a shopping list.
    ///
    /// Rows follow the item order and columns follow [`ShoppingList::stores`]. Listings at
    /// stores that are not participating are left out.
    pub fn build(list: &ShoppingList<'_>) -> Self {
        let num_items = list.len();
        let num_stores = list.stores().len();
        let mut costs = vec![UNAVAILABLE; num_items.saturating_mul(num_stores)];

        for (item_idx, item) in list.iter().enumerate() {
            for listing in item.listings() {
                let Some(store_idx) = list.store_index(listing.store()) else {
                    continue;
                };

                if let Some(cell) = costs.get_mut(item_idx * num_stores + store_idx) {
                    *cell = listing.price().to_minor_units();
                }
            }
        }

        Self {
            items: list.iter().map(|item| item.name().to_string()).collect(),
            costs,
            num_items,
            num_stores,
        }
    }

    /// Build a matrix directly from rows of optional prices.
    ///
    /// Rows shorter than the longest row are padded with [`UNAVAILABLE`]. Items are named by
    /// their 1-based row number, `#1`, `#2`, and so on.
    pub fn from_rows<R>(rows: impl IntoIterator<Item = R>) -> Self
    where
        R: IntoIterator<Item = Option<i64>>,
    {
        let rows: Vec<Vec<i64>> = rows
            .into_iter()
            .map(|row| row.into_iter().map(|c| c.unwrap_or(UNAVAILABLE)).collect())
            .collect();

        let num_items = rows.len();
        let num_stores = rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut costs = Vec::with_capacity(num_items.saturating_mul(num_stores));

        for mut row in rows {
            row.resize(num_stores, UNAVAILABLE);
            costs.extend(row);
        }

        Self {
            items: (1..=num_items).map(|row| format!("#{row}")).collect(),
            costs,
            num_items,
            num_stores,
        }
    }

    /// Number of rows (items)
    pub fn num_items(&self) -> usize {
        self.num_items
    }

    /// Name of the item in row `item`
    pub fn item_name(&self, item: usize) -> Option<&str> {
        self.items.get(item).map(String::as_str)
    }

    /// Number of columns (stores)
    pub fn num_stores(&self) -> usize {
        self.num_stores
    }

    /// Raw cell value, [`UNAVAILABLE`] included. `None` if out of bounds.
    pub fn get(&self, item: usize, store: usize) -> Option<i64> {
        if item >= self.num_items || store >= self.num_stores {
            return None;
        }

        self.costs.get(item * self.num_stores + store).copied()
    }

    /// Price of `item` at `store`, or `None` if the store does not offer it.
    pub fn cost(&self, item: usize, store: usize) -> Option<i64> {
        self.get(item, store).filter(|&cost| cost != UNAVAILABLE)
    }

    /// Stores offering `item`, with their prices.
    pub fn candidates(&self, item: usize) -> impl Iterator<Item = (usize, i64)> + '_ {
        (0..self.num_stores).filter_map(move |store| Some((store, self.cost(item, store)?)))
    }

    /// Number of items `store` offers.
    pub fn offered_count(&self, store: usize) -> usize {
        (0..self.num_items)
            .filter(|&item| self.cost(item, store).is_some())
            .count()
    }

    /// Largest finite price in the matrix.
    pub fn max_price(&self) -> i64 {
        self.costs
            .iter()
            .copied()
            .filter(|&cost| cost != UNAVAILABLE)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::{Money, iso::CAD};
    use testresult::TestResult;

    use crate::{fees::FeeSchedule, items::Item, listings::Listing, stores::Store};

    use super::*;

    #[test]
    fn build_marks_missing_pairs_unavailable() -> TestResult {
        let items = [
            Item::with_listings(
                "A",
                [
                    Listing::new("s1", Money::from_minor(100, CAD)),
                    Listing::new("s2", Money::from_minor(200, CAD)),
                ],
            ),
            Item::with_listings(
                "B",
                [
                    Listing::new("s1", Money::from_minor(150, CAD)),
                    Listing::new("offline", Money::from_minor(1, CAD)),
                ],
            ),
        ];

        let stores = [
            Store::new("s2", FeeSchedule::default()),
            Store::new("s1", FeeSchedule::default()),
        ];

        let list = ShoppingList::with_items(items, stores, CAD)?;
        let matrix = CostMatrix::build(&list);

        assert_eq!(matrix.num_items(), 2);
        assert_eq!(matrix.num_stores(), 2);
        assert_eq!(matrix.item_name(1), Some("B"));
        assert_eq!(matrix.item_name(2), None);

        // Columns follow sorted store order: s1, s2.
        assert_eq!(matrix.cost(0, 0), Some(100));
        assert_eq!(matrix.cost(0, 1), Some(200));
        assert_eq!(matrix.cost(1, 0), Some(150));
        assert_eq!(matrix.cost(1, 1), None);
        assert_eq!(matrix.get(1, 1), Some(UNAVAILABLE));
        assert_eq!(matrix.get(2, 0), None);

        assert_eq!(matrix.offered_count(0), 2);
        assert_eq!(matrix.offered_count(1), 1);
        assert_eq!(matrix.max_price(), 200);

        Ok(())
    }

    #[test]
    fn from_rows_pads_short_rows() {
        let matrix = CostMatrix::from_rows([vec![Some(5)], vec![None, Some(7)]]);

        assert_eq!(matrix.num_stores(), 2);
        assert_eq!(matrix.item_name(0), Some("#1"));
        assert_eq!(matrix.cost(0, 1), None);
        assert_eq!(matrix.candidates(1).collect::<Vec<_>>(), vec![(1, 7)]);
        assert_eq!(matrix.candidates(0).collect::<Vec<_>>(), vec![(0, 5)]);
    }

    #[test]
    fn empty_matrix_has_no_prices() {
        let matrix = CostMatrix::from_rows(Vec::<Vec<Option<i64>>>::new());

        assert_eq!(matrix.num_items(), 0);
        assert_eq!(matrix.max_price(), 0);
    }
}
