//! ILP Observer

use good_lp::{Expression, Variable};

/// Observer trait for capturing the assignment model as it's built.
///
/// The solver remains the only place the model is constructed; observers passively record what
/// happens, e.g. to render the formulation or to inspect it in tests.
///
/// When no observer is provided the solver uses a [`NoopObserver`] and the calls are optimized
/// away via monomorphization.
pub trait ILPObserver {
    /// Called when an assignment variable `y[item, store]` is created.
    ///
    /// Only pairs where the store lists the item get a variable.
    fn on_assignment_variable(
        &mut self,
        item_idx: usize,
        store_idx: usize,
        var: Variable,
        price_minor: i64,
    );

    /// Called when the order-size indicator for `count` items at a store is created.
    ///
    /// - `fee_minor`: Fee in minor units charged when exactly `count` items are ordered
    fn on_indicator_variable(&mut self, store_idx: usize, count: usize, var: Variable, fee_minor: i64);

    /// Called when a store's order-size variable `n[store]` is created.
    fn on_count_variable(&mut self, _store_idx: usize, _var: Variable, _max_items: usize) {}

    /// Called when a store's fee variable is created, with its bounds in minor units.
    fn on_fee_variable(&mut self, _store_idx: usize, _var: Variable, _min: i64, _max: i64) {}

    /// Called when a term is added to the objective function.
    ///
    /// - `coefficient`: Coefficient in minor units (e.g., pence, cents)
    fn on_objective_term(&mut self, _var: Variable, _coefficient: f64) {}

    /// Called when the "exactly one store" constraint is added for an item.
    fn on_coverage_constraint(&mut self, item_idx: usize, constraint_expr: &Expression);

    /// Called when a per-store constraint linking order size and fee is added.
    ///
    /// - `constraint_type`: Human-readable constraint type (e.g. `"order size"`, `"fee"`)
    /// - `constraint_expr`: The left-hand side expression
    /// - `rhs`: Right-hand side of the equality
    fn on_store_constraint(
        &mut self,
        store_idx: usize,
        constraint_type: &str,
        constraint_expr: &Expression,
        rhs: f64,
    );
}

/// No-op observer for unobserved solves.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl ILPObserver for NoopObserver {
    fn on_assignment_variable(&mut self, _: usize, _: usize, _: Variable, _: i64) {}

    fn on_indicator_variable(&mut self, _: usize, _: usize, _: Variable, _: i64) {}

    fn on_coverage_constraint(&mut self, _: usize, _: &Expression) {}

    fn on_store_constraint(&mut self, _: usize, _: &str, _: &Expression, _: f64) {}
}

/// Observer that counts what was added to the model. Useful for logging model size.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ModelStats {
    /// Number of `y[item, store]` variables
    pub assignment_variables: usize,

    /// Number of order-size indicator variables
    pub indicator_variables: usize,

    /// Number of coverage constraints
    pub coverage_constraints: usize,

    /// Number of per-store constraints
    pub store_constraints: usize,
}

impl ILPObserver for ModelStats {
    fn on_assignment_variable(&mut self, _: usize, _: usize, _: Variable, _: i64) {
        self.assignment_variables += 1;
    }

    fn on_indicator_variable(&mut self, _: usize, _: usize, _: Variable, _: i64) {
        self.indicator_variables += 1;
    }

    fn on_coverage_constraint(&mut self, _: usize, _: &Expression) {
        self.coverage_constraints += 1;
    }

    fn on_store_constraint(&mut self, _: usize, _: &str, _: &Expression, _: f64) {
        self.store_constraints += 1;
    }
}
