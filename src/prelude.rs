//! Cardcart prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    config::OptimizerConfig,
    fees::{FeeConfig, FeeError, FeeSchedule, FeeTable},
    items::Item,
    listings::{Listing, ListingPayload},
    matrix::{CostMatrix, UNAVAILABLE},
    optimizer::{OptimizeError, optimize, optimize_snapshot, process},
    pricing::PricingError,
    receipt::{FAILED_TOTAL, Purchase, Receipt, ReceiptError, StoreOrder},
    shopping_list::{ShoppingList, ShoppingListError},
    snapshot::{Snapshot, SnapshotError},
    solvers::{
        Problem, Solver, SolverError, SolverResult,
        ilp::{ILPSolver, NoopObserver, observer::ILPObserver},
    },
    stores::Store,
};
