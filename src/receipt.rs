//! Receipt
//!
//! Maps a solved assignment back onto the shopping list: which listing to buy for every item,
//! what each store ships and charges, and the grand total.

use std::{fmt::Write, io};

use rust_decimal::Decimal;
use rusty_money::{Money, MoneyError, iso::Currency};
use tabled::{
    builder::Builder,
    grid::config::HorizontalLine,
    settings::{
        Alignment, Color, Style, Theme,
        object::{Columns, Rows},
    },
};
use thiserror::Error;
use tracing::info;

use crate::{
    listings::Listing,
    pricing::{to_major_units, total_price},
    shopping_list::ShoppingList,
    solvers::{Problem, SolverResult},
};

/// Grand total reported when no optimal assignment could be produced.
///
/// Prices and fees are never negative, so this value cannot be mistaken for a real total.
pub const FAILED_TOTAL: Decimal = Decimal::NEGATIVE_ONE;

/// Errors that can occur when building a receipt.
#[derive(Debug, Error)]
pub enum ReceiptError {
    /// Wrapper for money errors.
    #[error(transparent)]
    Money(#[from] MoneyError),

    /// The solver result does not line up with the shopping list it was solved for.
    #[error("solver result does not match the shopping list: {0}")]
    Mismatch(&'static str),

    /// IO error
    #[error("IO error")]
    IO,
}

/// The listing chosen for one item.
#[derive(Debug, Clone, PartialEq)]
pub struct Purchase<'a> {
    item: String,
    listing: Listing<'a>,
}

impl<'a> Purchase<'a> {
    /// Name of the purchased item
    pub fn item(&self) -> &str {
        &self.item
    }

    /// Store the item is bought from
    pub fn store(&self) -> &str {
        self.listing.store()
    }

    /// The chosen listing, passthrough payload included
    pub fn listing(&self) -> &Listing<'a> {
        &self.listing
    }

    /// Price paid for the item
    pub fn price(&self) -> Money<'a, Currency> {
        *self.listing.price()
    }
}

/// Everything bought from a single store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreOrder<'a> {
    store: String,
    items: usize,
    goods: Money<'a, Currency>,
    fee: Money<'a, Currency>,
    synthesized: bool,
}

impl<'a> StoreOrder<'a> {
    /// Store identifier
    pub fn store(&self) -> &str {
        &self.store
    }

    /// Number of items in the order
    pub fn items(&self) -> usize {
        self.items
    }

    /// Sum of the item prices
    pub fn goods(&self) -> Money<'a, Currency> {
        self.goods
    }

    /// Shipping fee for the order size
    pub fn fee(&self) -> Money<'a, Currency> {
        self.fee
    }

    /// Goods plus shipping.
    ///
    /// # Errors
    ///
    /// Returns a [`MoneyError`] if the currencies differ.
    pub fn subtotal(&self) -> Result<Money<'a, Currency>, MoneyError> {
        self.goods.add(self.fee)
    }

    /// Whether the fee came from the default flat fee rather than store data
    pub fn is_synthesized(&self) -> bool {
        self.synthesized
    }
}

/// Final receipt for an optimized shopping list.
#[derive(Debug, Clone)]
pub struct Receipt<'a> {
    /// Chosen listing per item, in shopping list order
    purchases: Vec<Purchase<'a>>,

    /// Orders per store, in store order. Stores that ship nothing and charge nothing are omitted.
    orders: Vec<StoreOrder<'a>>,

    /// Sum of item prices
    goods: Money<'a, Currency>,

    /// Sum of shipping fees
    fees: Money<'a, Currency>,

    /// Goods plus fees
    total: Money<'a, Currency>,

    /// Currency used for all monetary values
    currency: &'static Currency,
}

impl<'a> Receipt<'a> {
    /// Build a receipt from a shopping list and the solver result for it.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiptError::Mismatch`] if the result does not describe a valid assignment for
    /// `list`, or if the itemised total disagrees with the solver's objective.
    pub fn from_solver_result(
        list: &ShoppingList<'a>,
        problem: &Problem,
        result: &SolverResult,
    ) -> Result<Self, ReceiptError> {
        if result.assignment.len() != list.len() {
            return Err(ReceiptError::Mismatch("one store per item is required"));
        }

        let currency = list.currency();
        let purchases = resolve_purchases(list, &result.assignment)?;
        let orders = build_orders(list, problem, &result.store_counts, &purchases)?;

        let goods = total_price(purchases.iter().map(Purchase::price), currency)?;
        let fees = total_price(orders.iter().map(StoreOrder::fee), currency)?;
        let total = goods.add(fees)?;

        if total.to_minor_units() != result.objective {
            return Err(ReceiptError::Mismatch(
                "itemised total disagrees with solver objective",
            ));
        }

        info!(total = %total, "optimal total");

        Ok(Self {
            purchases,
            orders,
            goods,
            fees,
            total,
            currency,
        })
    }

    /// Chosen listing per item, in shopping list order.
    pub fn purchases(&self) -> &[Purchase<'a>] {
        &self.purchases
    }

    /// Look up the purchase for an item by name.
    pub fn purchase_for(&self, item: &str) -> Option<&Purchase<'a>> {
        self.purchases.iter().find(|purchase| purchase.item() == item)
    }

    /// Per-store orders, in store order.
    pub fn orders(&self) -> &[StoreOrder<'a>] {
        &self.orders
    }

    /// Sum of item prices
    pub fn goods(&self) -> Money<'a, Currency> {
        self.goods
    }

    /// Sum of shipping fees
    pub fn fees(&self) -> Money<'a, Currency> {
        self.fees
    }

    /// Total amount paid
    pub fn total(&self) -> Money<'a, Currency> {
        self.total
    }

    /// Total amount paid, in major units.
    pub fn grand_total(&self) -> Decimal {
        to_major_units(self.total.to_minor_units(), self.currency)
    }

    /// Currency used for all monetary values.
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }

    /// Prints the receipt.
    ///
    /// # Errors
    ///
    /// Returns an error if the receipt cannot be written.
    pub fn write_to(&self, mut out: impl io::Write) -> Result<(), ReceiptError> {
        let mut purchases = Builder::default();

        purchases.push_record(["", "Item", "Store", "Price"]);

        for (item_idx, purchase) in self.purchases.iter().enumerate() {
            purchases.push_record([
                format!("#{:<3}", item_idx + 1),
                purchase.item().to_string(),
                purchase.store().to_string(),
                format!("{}", purchase.price()),
            ]);
        }

        write_table(&mut out, purchases, 3, &[])?;

        let mut orders = Builder::default();
        let mut default_fee_rows = Vec::new();

        orders.push_record(["Store", "Items", "Goods", "Shipping", "Subtotal"]);

        for (order_idx, order) in self.orders.iter().enumerate() {
            if order.is_synthesized() {
                // header is row 0
                default_fee_rows.push(order_idx + 1);
            }

            orders.push_record([
                order.store().to_string(),
                order.items().to_string(),
                format!("{}", order.goods()),
                format!("{}", order.fee()),
                format!("{}", order.subtotal()?),
            ]);
        }

        write_table(&mut out, orders, 1, &default_fee_rows)?;

        write_receipt_summary(&mut out, self)
    }
}

fn resolve_purchases<'a>(
    list: &ShoppingList<'a>,
    assignment: &[usize],
) -> Result<Vec<Purchase<'a>>, ReceiptError> {
    let mut purchases = Vec::with_capacity(list.len());

    for (item, &store_idx) in list.iter().zip(assignment) {
        let store = list
            .stores()
            .get(store_idx)
            .ok_or(ReceiptError::Mismatch("item assigned to an unknown store"))?;

        let listing = item
            .listing_at(store.id())
            .ok_or(ReceiptError::Mismatch(
                "item assigned to a store that does not list it",
            ))?
            .clone();

        info!(
            item = item.name(),
            store = store.id(),
            price = %listing.price(),
            "buy"
        );

        purchases.push(Purchase {
            item: item.name().to_string(),
            listing,
        });
    }

    Ok(purchases)
}

fn build_orders<'a>(
    list: &ShoppingList<'a>,
    problem: &Problem,
    store_counts: &[usize],
    purchases: &[Purchase<'a>],
) -> Result<Vec<StoreOrder<'a>>, ReceiptError> {
    let currency = list.currency();
    let mut orders = Vec::new();

    for (store_idx, store) in list.stores().iter().enumerate() {
        let bought = move || {
            purchases
                .iter()
                .filter(move |purchase| purchase.store() == store.id())
        };

        let items = bought().count();

        if store_counts.get(store_idx).copied().unwrap_or(0) != items {
            return Err(ReceiptError::Mismatch(
                "store order size disagrees with assignment",
            ));
        }

        let fee = problem
            .fee_tables()
            .get(store_idx)
            .and_then(|table| table.fee_for(items))
            .ok_or(ReceiptError::Mismatch("no fee for order size"))?;

        if items == 0 && fee == 0 {
            continue;
        }

        let goods = total_price(bought().map(Purchase::price), currency)?;
        let fee = Money::from_minor(fee, currency);

        info!(
            store = store.id(),
            items,
            goods = %goods,
            fee = %fee,
            default_fee = store.is_synthesized(),
            "store order"
        );

        orders.push(StoreOrder {
            store: store.id().to_string(),
            items,
            goods,
            fee,
            synthesized: store.is_synthesized(),
        });
    }

    Ok(orders)
}

fn write_table(
    out: &mut impl io::Write,
    builder: Builder,
    first_money_column: usize,
    dimmed_rows: &[usize],
) -> Result<(), ReceiptError> {
    let mut table = builder.build();
    let mut theme = Theme::from(Style::modern_rounded());
    let separator = HorizontalLine::new(Some('─'), Some('┼'), Some('├'), Some('┤'));

    theme.remove_horizontal_lines();
    theme.insert_horizontal_line(1, separator);

    table.with(theme);
    table.modify(Rows::first(), Color::BOLD);
    table.modify(Columns::new(first_money_column..), Alignment::right());

    for &row in dimmed_rows {
        table.modify(Rows::new(row..=row), color_dark_grey());
    }

    let table_str = colorize_borders(&table.to_string());

    writeln!(out, "\n{table_str}").map_err(|_err| ReceiptError::IO)
}

fn write_receipt_summary(
    out: &mut impl io::Write,
    receipt: &Receipt<'_>,
) -> Result<(), ReceiptError> {
    let lines = [
        (" Goods:", format!("{}  ", receipt.goods())),
        (" Shipping:", format!("{}  ", receipt.fees())),
        (" \x1b[1mTotal:\x1b[0m", format!("\x1b[1m{}\x1b[0m  ", receipt.total())),
    ];

    let label_width = lines
        .iter()
        .map(|(label, _)| visible_width(label))
        .max()
        .unwrap_or(0);

    let value_width = lines
        .iter()
        .map(|(_, value)| visible_width(value))
        .max()
        .unwrap_or(0);

    for (label, value) in &lines {
        let label_pad = label_width.saturating_sub(visible_width(label));
        let value_pad = value_width.saturating_sub(visible_width(value));

        writeln!(
            out,
            "{:>label_pad$}{label}  {}{value}",
            "",
            " ".repeat(value_pad)
        )
        .map_err(|_err| ReceiptError::IO)?;
    }

    writeln!(out).map_err(|_err| ReceiptError::IO)
}

/// Wraps runs of UTF-8 box-drawing characters in ANSI dark-grey escape codes.
fn colorize_borders(table: &str) -> String {
    let mut out = String::with_capacity(table.len() + 256);
    let mut in_run = false;

    for ch in table.chars() {
        let box_char = ('\u{2500}'..='\u{257F}').contains(&ch);

        if box_char && !in_run {
            _ = out.write_str("\x1b[90m");
            in_run = true;
        } else if !box_char && in_run {
            _ = out.write_str("\x1b[0m");
            in_run = false;
        }

        out.push(ch);
    }

    if in_run {
        _ = out.write_str("\x1b[0m");
    }

    out
}

/// Returns the visible (non-ANSI) width of a string.
fn visible_width(s: &str) -> usize {
    let mut width = 0usize;
    let mut in_escape = false;

    for ch in s.chars() {
        if in_escape {
            if ch.is_ascii_alphabetic() {
                in_escape = false;
            }
        } else if ch == '\x1b' {
            in_escape = true;
        } else {
            width += 1;
        }
    }

    width
}

/// ANSI dark grey foreground.
fn color_dark_grey() -> Color {
    Color::new("\x1b[90m", "\x1b[0m")
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::CAD;
    use serde_json::json;
    use testresult::TestResult;

    use crate::{
        fees::FeeSchedule,
        items::Item,
        listings::ListingPayload,
        solvers::{Solver, ilp::ILPSolver},
        stores::Store,
    };

    use super::*;

    fn shopping_list() -> TestResult<ShoppingList<'static>> {
        let mut payload = ListingPayload::new();
        payload.insert("variant_id".to_string(), json!(42));

        let items = vec![
            Item::with_listings(
                "A",
                [
                    Listing::with_payload("s1", Money::from_minor(100, CAD), payload),
                    Listing::new("s2", Money::from_minor(200, CAD)),
                ],
            ),
            Item::with_listings("B", [Listing::new("s1", Money::from_minor(150, CAD))]),
        ];

        let stores = vec![
            Store::new("s1", FeeSchedule::new("s1", [(0, 0), (1, 0), (2, 50)])?),
            Store::synthesized("s2", FeeSchedule::flat(100)?),
        ];

        Ok(ShoppingList::with_items(items, stores, CAD)?)
    }

    #[test]
    fn from_solver_result_resolves_listings_and_orders() -> TestResult {
        let list = shopping_list()?;
        let problem = Problem::from_shopping_list(&list)?;
        let result = ILPSolver::solve(&problem)?;

        let receipt = Receipt::from_solver_result(&list, &problem, &result)?;

        assert_eq!(receipt.purchases().len(), 2);
        assert_eq!(receipt.purchase_for("A").map(Purchase::store), Some("s1"));
        assert_eq!(
            receipt
                .purchase_for("A")
                .and_then(|purchase| purchase.listing().payload().get("variant_id")),
            Some(&json!(42))
        );

        assert_eq!(receipt.orders().len(), 1);

        let order = receipt.orders().first().ok_or("missing order")?;

        assert_eq!(order.store(), "s1");
        assert_eq!(order.items(), 2);
        assert_eq!(order.goods(), Money::from_minor(250, CAD));
        assert_eq!(order.fee(), Money::from_minor(50, CAD));
        assert_eq!(order.subtotal()?, Money::from_minor(300, CAD));

        assert_eq!(receipt.goods(), Money::from_minor(250, CAD));
        assert_eq!(receipt.fees(), Money::from_minor(50, CAD));
        assert_eq!(receipt.total(), Money::from_minor(300, CAD));
        assert_eq!(receipt.grand_total(), Decimal::new(300, 2));

        Ok(())
    }

    #[test]
    fn from_solver_result_rejects_wrong_length() -> TestResult {
        let list = shopping_list()?;
        let problem = Problem::from_shopping_list(&list)?;

        let result = SolverResult {
            assignment: vec![0],
            store_counts: vec![1, 0],
            objective: 100,
        };

        assert!(matches!(
            Receipt::from_solver_result(&list, &problem, &result),
            Err(ReceiptError::Mismatch(_))
        ));

        Ok(())
    }

    #[test]
    fn from_solver_result_rejects_unlisted_store() -> TestResult {
        let list = shopping_list()?;
        let problem = Problem::from_shopping_list(&list)?;

        // B is not listed at s2.
        let result = SolverResult {
            assignment: vec![0, 1],
            store_counts: vec![1, 1],
            objective: 350,
        };

        assert!(matches!(
            Receipt::from_solver_result(&list, &problem, &result),
            Err(ReceiptError::Mismatch(
                "item assigned to a store that does not list it"
            ))
        ));

        Ok(())
    }

    #[test]
    fn from_solver_result_rejects_objective_mismatch() -> TestResult {
        let list = shopping_list()?;
        let problem = Problem::from_shopping_list(&list)?;

        let result = SolverResult {
            assignment: vec![0, 0],
            store_counts: vec![2, 0],
            objective: 299,
        };

        assert!(matches!(
            Receipt::from_solver_result(&list, &problem, &result),
            Err(ReceiptError::Mismatch(
                "itemised total disagrees with solver objective"
            ))
        ));

        Ok(())
    }

    #[test]
    fn write_to_renders_purchases_and_summary() -> TestResult {
        let list = shopping_list()?;
        let problem = Problem::from_shopping_list(&list)?;

        // Split the order so both stores appear, s2 on the default flat fee.
        let result = SolverResult {
            assignment: vec![1, 0],
            store_counts: vec![1, 1],
            objective: 450,
        };

        let receipt = Receipt::from_solver_result(&list, &problem, &result)?;

        let mut out = Vec::new();
        receipt.write_to(&mut out)?;

        let output = String::from_utf8(out)?;

        assert!(output.contains("#1"));
        assert!(output.contains("s1"));
        assert!(output.contains("s2"));
        assert!(output.contains("Shipping"));
        assert!(output.contains("Goods:"));
        assert!(output.contains("Total:"));
        assert!(output.contains("$4.50"));

        Ok(())
    }

    #[test]
    fn visible_width_skips_ansi_sequences() {
        assert_eq!(visible_width("\x1b[1mTotal:\x1b[0m"), 6);
    }
}
