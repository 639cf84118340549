//! Optimizer
//!
//! Runs a whole optimization: fee resolution and price conversion, the cost matrix, the solve,
//! and the receipt.

use rust_decimal::Decimal;
use rusty_money::iso::Currency;
use thiserror::Error;
use tracing::{error, info};

use crate::{
    fees::FeeConfig,
    receipt::{FAILED_TOTAL, Receipt, ReceiptError},
    shopping_list::ShoppingList,
    snapshot::{Snapshot, SnapshotError},
    solvers::{Problem, Solver, SolverError, ilp::ILPSolver},
};

/// Errors from a complete optimization run.
#[derive(Debug, Error)]
pub enum OptimizeError {
    /// The snapshot could not be turned into a shopping list.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// No optimal assignment was found.
    #[error(transparent)]
    Solver(#[from] SolverError),

    /// The assignment could not be reported.
    #[error(transparent)]
    Receipt(#[from] ReceiptError),
}

/// Find the cheapest way to buy every item on the list.
///
/// # Errors
///
/// Returns an [`OptimizeError`] if an item cannot be bought from any participating store, the
/// amounts are too large to solve exactly, or no proven optimum is found.
pub fn optimize<'a>(list: &ShoppingList<'a>) -> Result<Receipt<'a>, OptimizeError> {
    optimize_with::<ILPSolver>(list)
}

/// [`optimize`] with a specific solver.
///
/// # Errors
///
/// See [`optimize`].
pub fn optimize_with<'a, S: Solver>(
    list: &ShoppingList<'a>,
) -> Result<Receipt<'a>, OptimizeError> {
    let problem = Problem::from_shopping_list(list)?;
    let result = S::solve(&problem)?;

    Ok(Receipt::from_solver_result(list, &problem, &result)?)
}

/// Optimize a snapshot in place.
///
/// Every item record gets an `optimal_listing`. Returns the grand total in major units, or
/// [`FAILED_TOTAL`] when the run fails, in which case every `optimal_listing` is `null`.
pub fn process(
    snapshot: &mut Snapshot,
    fees: &FeeConfig,
    default_currency: &'static Currency,
) -> Decimal {
    snapshot.clear_optimal_listings();

    match optimize_snapshot(snapshot, fees, default_currency) {
        Ok(receipt) => {
            snapshot.apply_receipt(&receipt);

            receipt.grand_total()
        }
        Err(OptimizeError::Solver(err)) if err.is_data_defect() => {
            error!(error = %err, "shopping list cannot be optimized as given");

            FAILED_TOTAL
        }
        Err(err) => {
            error!(error = %err, "optimization failed");

            FAILED_TOTAL
        }
    }
}

/// Build the shopping list for a snapshot and optimize it.
///
/// # Errors
///
/// Returns an [`OptimizeError`] if the snapshot is invalid or cannot be optimized.
pub fn optimize_snapshot(
    snapshot: &Snapshot,
    fees: &FeeConfig,
    default_currency: &'static Currency,
) -> Result<Receipt<'static>, OptimizeError> {
    let list = snapshot.to_shopping_list(fees, default_currency)?;

    info!(
        items = list.len(),
        stores = list.stores().len(),
        currency = list.currency().iso_alpha_code,
        "optimizing shopping list"
    );

    optimize(&list)
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::CAD;
    use testresult::TestResult;

    use super::*;

    fn fees() -> FeeConfig {
        FeeConfig::default()
            .with_store("s1", [(0, 0), (1, 0), (2, 50)])
            .with_store("s2", [(0, 0), (1, 100)])
    }

    #[test]
    fn process_returns_total_and_annotates_snapshot() -> TestResult {
        let mut snapshot = Snapshot::from_json_str(
            r#"{
                "items": {
                    "A": {"listings": {"s1": {"price": 1.00}, "s2": {"price": 2.00}}},
                    "B": {"listings": {"s1": {"price": 1.50, "sku": "b-1"}}}
                }
            }"#,
        )?;

        let total = process(&mut snapshot, &fees(), CAD);

        assert_eq!(total, Decimal::new(300, 2));

        let b = snapshot.items.get("B").ok_or("missing item")?;

        assert_eq!(
            b.optimal_listing
                .as_ref()
                .and_then(|listing| listing.fields.get("sku")),
            Some(&serde_json::json!("b-1"))
        );

        Ok(())
    }

    #[test]
    fn process_returns_sentinel_for_unlisted_items() -> TestResult {
        let mut snapshot = Snapshot::from_json_str(
            r#"{
                "items": {
                    "A": {"listings": {"s1": {"price": 1.00}}},
                    "C": {"listings": {}}
                }
            }"#,
        )?;

        let total = process(&mut snapshot, &fees(), CAD);

        assert_eq!(total, FAILED_TOTAL);
        assert!(
            snapshot
                .items
                .values()
                .all(|record| record.optimal_listing.is_none())
        );

        Ok(())
    }

    #[test]
    fn optimize_snapshot_reports_unlisted_item() -> TestResult {
        let snapshot = Snapshot::from_json_str(r#"{"items": {"C": {"listings": {}}}}"#)?;

        let result = optimize_snapshot(&snapshot, &fees(), CAD);

        assert!(matches!(
            result,
            Err(OptimizeError::Solver(SolverError::UnlistedItem { item, row: 0 })) if item == "C"
        ));

        Ok(())
    }
}
