//! Solvers for retailer selection

use good_lp::ResolutionError;
use thiserror::Error;

use crate::{
    fees::{FeeTable, resolve_fee_tables},
    matrix::CostMatrix,
    shopping_list::ShoppingList,
};

pub mod ilp;

/// Solver Errors
#[derive(Debug, Error)]
pub enum SolverError {
    /// An item has no listing at any participating store. This is a data problem and is
    /// reported before any model is built.
    #[error("item {item} has no listing at any participating store")]
    UnlistedItem {
        /// Name of the offending item
        item: String,
        /// Row of the item in the cost matrix
        row: usize,
    },

    /// The worst-case total cannot be summed exactly in minor units.
    #[error(
        "worst-case total for {num_items} items at up to {max_price} each plus {max_fees} in fees cannot be represented exactly"
    )]
    WorstCaseOverflow {
        /// Number of items
        num_items: usize,
        /// Largest listing price in minor units
        max_price: i64,
        /// Sum of every store's largest fee in minor units (saturating)
        max_fees: i64,
    },

    /// Money amount in minor units cannot be represented exactly as a solver coefficient.
    #[error(
        "money amount in minor units cannot be represented exactly as a solver coefficient: {minor_units}"
    )]
    MinorUnitsNotRepresentable {
        /// Money amount in minor units
        minor_units: i64,
    },

    /// There is not exactly one fee table per store.
    #[error("{tables} fee tables supplied for {stores} stores")]
    FeeTableCount {
        /// Number of store columns in the cost matrix
        stores: usize,
        /// Number of fee tables supplied
        tables: usize,
    },

    /// A fee table does not cover every possible order size.
    #[error("fee table for store {store} covers {covered} items, expected {expected}")]
    FeeTableMismatch {
        /// Column of the store in the cost matrix
        store: usize,
        /// Number of items the table needs to cover
        expected: usize,
        /// Number of items the table covers
        covered: usize,
    },

    /// The solver proved that no assignment exists.
    #[error("no feasible assignment exists")]
    Infeasible,

    /// The solver stopped without proving its answer optimal.
    #[error("solver returned a solution that is not proven optimal: {status}")]
    NotOptimal {
        /// Status reported by the backend
        status: String,
    },

    /// Wrapped solver resolution error
    #[error(transparent)]
    ResolutionError(ResolutionError),

    /// Internal solver invariant was violated (this is a bug).
    #[error("solver invariant violated: {message}")]
    InvariantViolation {
        /// What invariant was violated
        message: &'static str,
    },
}

impl From<ResolutionError> for SolverError {
    fn from(err: ResolutionError) -> Self {
        match err {
            ResolutionError::Infeasible => SolverError::Infeasible,
            other => SolverError::ResolutionError(other),
        }
    }
}

impl SolverError {
    /// Whether the error stems from the input data rather than from solving.
    pub fn is_data_defect(&self) -> bool {
        matches!(
            self,
            SolverError::UnlistedItem { .. }
                | SolverError::WorstCaseOverflow { .. }
                | SolverError::MinorUnitsNotRepresentable { .. }
        )
    }
}

/// Fully materialised input to a solve: the price grid and one dense fee table per store.
#[derive(Debug, Clone)]
pub struct Problem {
    matrix: CostMatrix,
    fee_tables: Vec<FeeTable>,
}

impl Problem {
    /// Pair a cost matrix with per-store fee tables.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::FeeTableCount`] unless there is exactly one table per store, and
    /// [`SolverError::FeeTableMismatch`] if a table stops short of the number of items.
    pub fn new(matrix: CostMatrix, fee_tables: Vec<FeeTable>) -> Result<Self, SolverError> {
        let expected = matrix.num_items();

        if fee_tables.len() != matrix.num_stores() {
            return Err(SolverError::FeeTableCount {
                stores: matrix.num_stores(),
                tables: fee_tables.len(),
            });
        }

        if let Some((store, table)) = fee_tables
            .iter()
            .enumerate()
            .find(|(_, table)| table.max_items() < expected)
        {
            return Err(SolverError::FeeTableMismatch {
                store,
                expected,
                covered: table.max_items(),
            });
        }

        Ok(Self { matrix, fee_tables })
    }

    /// Build the cost matrix and expand every store's fee schedule for a shopping list.
    ///
    /// # Errors
    ///
    /// Returns a [`SolverError`] if the fee tables do not line up with the matrix.
    pub fn from_shopping_list(list: &ShoppingList<'_>) -> Result<Self, SolverError> {
        let matrix = CostMatrix::build(list);
        let fee_tables = resolve_fee_tables(list.stores(), list.len());

        Self::new(matrix, fee_tables)
    }

    /// Item x store price grid
    pub fn matrix(&self) -> &CostMatrix {
        &self.matrix
    }

    /// Dense fee tables, one per store column
    pub fn fee_tables(&self) -> &[FeeTable] {
        &self.fee_tables
    }

    /// Number of items to assign
    pub fn num_items(&self) -> usize {
        self.matrix.num_items()
    }

    /// Number of participating stores
    pub fn num_stores(&self) -> usize {
        self.matrix.num_stores()
    }
}

/// Optimal assignment of items to stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolverResult {
    /// Chosen store column for each item row
    pub assignment: Vec<usize>,

    /// Number of items routed to each store column
    pub store_counts: Vec<usize>,

    /// Goods plus fees in minor units
    pub objective: i64,
}

/// Trait for choosing a store for every item
pub trait Solver {
    /// Find a minimum-cost assignment.
    ///
    /// # Errors
    ///
    /// Returns a [`SolverError`] if the problem is malformed or no proven optimum is found.
    fn solve(problem: &Problem) -> Result<SolverResult, SolverError>;
}

#[cfg(test)]
mod tests {
    use crate::fees::FeeSchedule;

    use super::*;

    #[test]
    fn problem_requires_one_fee_table_per_store() {
        let matrix = CostMatrix::from_rows([[Some(1), Some(2)]]);
        let tables = vec![FeeSchedule::default().expand(1)];

        let result = Problem::new(matrix, tables);

        assert!(matches!(
            result,
            Err(SolverError::FeeTableCount {
                stores: 2,
                tables: 1,
            })
        ));
    }

    #[test]
    fn fee_table_count_message_names_stores_and_tables() {
        let err = SolverError::FeeTableCount {
            stores: 2,
            tables: 1,
        };

        assert_eq!(err.to_string(), "1 fee tables supplied for 2 stores");
    }

    #[test]
    fn unlisted_item_message_names_the_item() {
        let err = SolverError::UnlistedItem {
            item: "Sol Ring".to_string(),
            row: 3,
        };

        assert_eq!(
            err.to_string(),
            "item Sol Ring has no listing at any participating store"
        );
    }

    #[test]
    fn problem_requires_fee_tables_to_cover_all_items() {
        let matrix = CostMatrix::from_rows([[Some(1)], [Some(2)]]);
        let tables = vec![FeeSchedule::default().expand(1)];

        let result = Problem::new(matrix, tables);

        assert!(matches!(
            result,
            Err(SolverError::FeeTableMismatch {
                store: 0,
                expected: 2,
                covered: 1,
            })
        ));
    }

    #[test]
    fn infeasible_resolution_maps_to_dedicated_variant() {
        assert!(matches!(
            SolverError::from(ResolutionError::Infeasible),
            SolverError::Infeasible
        ));
        assert!(matches!(
            SolverError::from(ResolutionError::Unbounded),
            SolverError::ResolutionError(ResolutionError::Unbounded)
        ));
    }

    #[test]
    fn data_defects_are_distinguished_from_solver_failures() {
        assert!(
            SolverError::UnlistedItem {
                item: "A".to_string(),
                row: 0
            }
            .is_data_defect()
        );
        assert!(!SolverError::Infeasible.is_data_defect());
        assert!(
            !SolverError::NotOptimal {
                status: "TimeLimit".to_string()
            }
            .is_data_defect()
        );
    }
}
