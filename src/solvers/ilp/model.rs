//! Assignment model
//!
//! Decision variables:
//!
//! - `y[i, s]` binary, 1 if item `i` is bought from store `s`. Only created where `s` lists `i`.
//! - `n[s]` integer in `[0, items]`, the order size at store `s`.
//! - `b[s, k]` binary, 1 if exactly `k` items are bought from store `s`.
//! - `fee[s]` bounded by the smallest and largest fee of any store.
//!
//! Constraints:
//!
//! - coverage: `sum_s y[i, s] = 1` for every item
//! - order size: `sum_i y[i, s] - n[s] = 0`
//! - indicator choice: `sum_k b[s, k] = 1`
//! - indicator count: `n[s] - sum_k k * b[s, k] = 0`
//! - fee: `fee[s] - sum_k feeTable[s][k] * b[s, k] = 0`
//!
//! Together these pin `fee[s]` to the table entry for the actual order size, whatever shape the
//! table has. The objective is `sum y[i, s] * cost[i, s] + sum fee[s]`.

use std::fmt;

use good_lp::{Constraint, Expression, ProblemVariables, Variable, constraint, variable};
use num_traits::ToPrimitive;

use crate::{
    matrix::UNAVAILABLE,
    pricing::i64_to_f64_exact,
    solvers::{Problem, SolverError, ilp::observer::ILPObserver},
};

/// Recorded linear equality emitted during model construction.
#[derive(Debug, Clone)]
pub(crate) struct ILPConstraint {
    /// Left-hand side expression
    pub(crate) lhs: Expression,

    /// Right-hand side scalar
    pub(crate) rhs: f64,
}

impl ILPConstraint {
    pub(crate) fn into_constraint(self) -> Constraint {
        constraint::eq(self.lhs, self.rhs)
    }
}

/// Solver variables belonging to one store.
#[derive(Debug, Clone)]
pub(crate) struct StoreVars {
    /// Order size `n[s]`
    pub(crate) count: Variable,

    /// Fee `fee[s]`
    pub(crate) fee: Variable,

    /// `(k, b[s, k])` for every reachable order size `k`
    pub(crate) indicators: Vec<(usize, Variable)>,
}

/// Builder state for the assignment model.
pub struct AssignmentModel {
    pb: ProblemVariables,
    cost: Expression,
    num_stores: usize,
    assignment: Vec<Option<Variable>>,
    stores: Vec<StoreVars>,
    constraints: Vec<ILPConstraint>,
}

impl fmt::Debug for AssignmentModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssignmentModel")
            .field("pb", &"<ProblemVariables>")
            .field("cost", &"<Expression>")
            .field(
                "assignment",
                &format!(
                    "[{} variables]",
                    self.assignment.iter().filter(|v| v.is_some()).count()
                ),
            )
            .field("stores", &format!("[{} stores]", self.stores.len()))
            .field(
                "constraints",
                &format!("[{} constraints]", self.constraints.len()),
            )
            .finish()
    }
}

impl AssignmentModel {
    /// Build the model for `problem`.
    ///
    /// Input is checked before any variable is created: every item needs at least one store
    /// listing it, and the worst-case total must be exactly representable.
    ///
    /// # Errors
    ///
    /// - [`SolverError::UnlistedItem`]: an item has no finite-cost candidate.
    /// - [`SolverError::WorstCaseOverflow`]: the worst-case total could overflow or reach the
    ///   unavailable sentinel.
    /// - [`SolverError::MinorUnitsNotRepresentable`]: a coefficient is not exact as `f64`.
    pub fn build<O: ILPObserver + ?Sized>(
        problem: &Problem,
        observer: &mut O,
    ) -> Result<Self, SolverError> {
        validate_candidates(problem)?;
        ensure_worst_case_fits(problem)?;

        let matrix = problem.matrix();
        let num_items = problem.num_items();
        let num_stores = problem.num_stores();

        let mut model = Self {
            pb: ProblemVariables::new(),
            cost: Expression::default(),
            num_stores,
            assignment: Vec::with_capacity(num_items.saturating_mul(num_stores)),
            stores: Vec::with_capacity(num_stores),
            constraints: Vec::new(),
        };

        for item_idx in 0..num_items {
            for store_idx in 0..num_stores {
                let var = match matrix.cost(item_idx, store_idx) {
                    Some(price) => {
                        let var = model.pb.add(variable().binary());

                        observer.on_assignment_variable(item_idx, store_idx, var, price);
                        model.add_to_objective(var, price, observer)?;

                        Some(var)
                    }
                    None => None,
                };

                model.assignment.push(var);
            }
        }

        let (min_fee, max_fee) = fee_bounds(problem);
        let max_items = num_items.to_f64().ok_or(SolverError::InvariantViolation {
            message: "item count does not fit in a solver coefficient",
        })?;

        for (store_idx, table) in problem.fee_tables().iter().enumerate() {
            let count = model
                .pb
                .add(variable().integer().min(0).max(max_items));

            observer.on_count_variable(store_idx, count, num_items);

            let fee = model.pb.add(
                variable()
                    .min(exact(min_fee)?)
                    .max(exact(max_fee)?),
            );

            observer.on_fee_variable(store_idx, fee, min_fee, max_fee);
            model.add_to_objective(fee, 1, observer)?;

            // Order sizes above what the store lists can never occur.
            let reachable = matrix.offered_count(store_idx).min(num_items);

            let mut indicators = Vec::with_capacity(reachable + 1);

            for (k, fee_minor) in table.iter().take(reachable + 1) {
                let var = model.pb.add(variable().binary());

                observer.on_indicator_variable(store_idx, k, var, fee_minor);
                indicators.push((k, var));
            }

            model.stores.push(StoreVars {
                count,
                fee,
                indicators,
            });

            model.add_store_constraints(store_idx, table.as_slice(), observer)?;
        }

        for item_idx in 0..num_items {
            let expr: Expression = model.item_variables(item_idx).map(Expression::from).sum();

            observer.on_coverage_constraint(item_idx, &expr);
            model.constraints.push(ILPConstraint { lhs: expr, rhs: 1.0 });
        }

        Ok(model)
    }

    /// Add `var * coefficient` to the objective.
    fn add_to_objective<O: ILPObserver + ?Sized>(
        &mut self,
        var: Variable,
        minor_units: i64,
        observer: &mut O,
    ) -> Result<(), SolverError> {
        let coefficient = exact(minor_units)?;

        observer.on_objective_term(var, coefficient);
        self.cost += var * coefficient;

        Ok(())
    }

    fn add_store_constraints<O: ILPObserver + ?Sized>(
        &mut self,
        store_idx: usize,
        fees: &[i64],
        observer: &mut O,
    ) -> Result<(), SolverError> {
        let Some(vars) = self.stores.get(store_idx).cloned() else {
            return Err(SolverError::InvariantViolation {
                message: "store variables missing for store index",
            });
        };

        // sum_i y[i, s] - n[s] = 0
        let mut order_size: Expression = self.store_variables(store_idx).map(Expression::from).sum();
        order_size -= vars.count;

        // sum_k b[s, k] = 1
        let mut choice = Expression::default();

        // n[s] - sum_k k * b[s, k] = 0
        let mut indicator_count = Expression::from(vars.count);

        // fee[s] - sum_k fee[k] * b[s, k] = 0
        let mut fee = Expression::from(vars.fee);

        for &(k, indicator) in &vars.indicators {
            let fee_minor = fees.get(k).copied().ok_or(SolverError::InvariantViolation {
                message: "indicator order size outside fee table",
            })?;

            let k = i64::try_from(k).map_err(|_err| SolverError::InvariantViolation {
                message: "order size does not fit in i64",
            })?;

            choice += indicator;
            indicator_count -= indicator * exact(k)?;
            fee -= indicator * exact(fee_minor)?;
        }

        for (constraint_type, lhs, rhs) in [
            ("order size", order_size, 0.0),
            ("indicator choice", choice, 1.0),
            ("indicator count", indicator_count, 0.0),
            ("fee", fee, 0.0),
        ] {
            observer.on_store_constraint(store_idx, constraint_type, &lhs, rhs);
            self.constraints.push(ILPConstraint { lhs, rhs });
        }

        Ok(())
    }

    /// Assignment variable for `(item, store)`, if the store lists the item.
    pub fn assignment_variable(&self, item_idx: usize, store_idx: usize) -> Option<Variable> {
        if store_idx >= self.num_stores {
            return None;
        }

        self.assignment
            .get(item_idx * self.num_stores + store_idx)
            .copied()
            .flatten()
    }

    /// Assignment variables of one item across all stores.
    fn item_variables(&self, item_idx: usize) -> impl Iterator<Item = Variable> + '_ {
        (0..self.num_stores).filter_map(move |store_idx| self.assignment_variable(item_idx, store_idx))
    }

    /// Assignment variables routed to one store across all items.
    fn store_variables(&self, store_idx: usize) -> impl Iterator<Item = Variable> + '_ {
        let num_items = self.assignment.len().checked_div(self.num_stores).unwrap_or(0);

        (0..num_items).filter_map(move |item_idx| self.assignment_variable(item_idx, store_idx))
    }

    /// Fee variable of a store.
    #[cfg(test)]
    pub(crate) fn fee_variable(&self, store_idx: usize) -> Option<Variable> {
        self.stores.get(store_idx).map(|vars| vars.fee)
    }

    /// Number of recorded constraints.
    #[cfg(test)]
    pub(crate) fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Extract the problem variables, objective, assignment grid, and recorded constraints.
    pub(crate) fn into_parts(
        self,
    ) -> (
        ProblemVariables,
        Expression,
        Vec<Option<Variable>>,
        Vec<ILPConstraint>,
    ) {
        (self.pb, self.cost, self.assignment, self.constraints)
    }
}

/// Reject items no store lists. Routing them through the unavailable sentinel would produce a
/// meaningless total.
fn validate_candidates(problem: &Problem) -> Result<(), SolverError> {
    let matrix = problem.matrix();

    match (0..matrix.num_items()).find(|&row| matrix.candidates(row).next().is_none()) {
        Some(row) => Err(SolverError::UnlistedItem {
            item: matrix.item_name(row).unwrap_or_default().to_string(),
            row,
        }),
        None => Ok(()),
    }
}

/// Check that `items * max_price + sum of max fees` stays below [`UNAVAILABLE`].
fn ensure_worst_case_fits(problem: &Problem) -> Result<(), SolverError> {
    let num_items = problem.num_items();
    let max_price = problem.matrix().max_price();

    let max_fees = problem
        .fee_tables()
        .iter()
        .try_fold(0_i64, |acc, table| acc.checked_add(table.max_fee()));

    let worst_case = i64::try_from(num_items)
        .ok()
        .and_then(|n| n.checked_mul(max_price))
        .zip(max_fees)
        .and_then(|(goods, fees)| goods.checked_add(fees));

    match worst_case {
        Some(total) if total < UNAVAILABLE => Ok(()),
        _ => Err(SolverError::WorstCaseOverflow {
            num_items,
            max_price,
            max_fees: max_fees.unwrap_or(i64::MAX),
        }),
    }
}

/// Smallest and largest fee over every store and order size.
fn fee_bounds(problem: &Problem) -> (i64, i64) {
    let tables = problem.fee_tables();

    let min = tables.iter().map(|t| t.min_fee()).min().unwrap_or(0);
    let max = tables.iter().map(|t| t.max_fee()).max().unwrap_or(0);

    (min, max)
}

fn exact(minor_units: i64) -> Result<f64, SolverError> {
    // `good_lp` stores coefficients as `f64`. Only integers with absolute value <= 2^53
    // can be represented exactly; enforce that so we never silently change the objective.
    i64_to_f64_exact(minor_units).ok_or(SolverError::MinorUnitsNotRepresentable { minor_units })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use good_lp::Solution;
    use testresult::TestResult;

    use crate::{
        fees::FeeSchedule,
        matrix::CostMatrix,
        solvers::ilp::observer::{ModelStats, NoopObserver},
    };

    use super::*;

    fn problem(rows: &[&[Option<i64>]], schedules: &[&[(usize, i64)]]) -> Result<Problem, SolverError> {
        let matrix = CostMatrix::from_rows(rows.iter().map(|row| row.iter().copied()));
        let tables = schedules
            .iter()
            .map(|entries| {
                FeeSchedule::new("s", entries.iter().copied())
                    .map(|schedule| schedule.expand(rows.len()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_err| SolverError::InvariantViolation {
                message: "bad test schedule",
            })?;

        Problem::new(matrix, tables)
    }

    #[test]
    fn unlisted_item_is_rejected_before_variables_exist() -> TestResult {
        let problem = problem(&[&[Some(100), None], &[None, None]], &[&[], &[]])?;
        let mut stats = ModelStats::default();

        let result = AssignmentModel::build(&problem, &mut stats);

        assert!(matches!(
            result,
            Err(SolverError::UnlistedItem { item, row: 1 }) if item == "#2"
        ));
        assert_eq!(stats, ModelStats::default());

        Ok(())
    }

    #[test]
    fn unavailable_pairs_get_no_variable() -> TestResult {
        let problem = problem(
            &[&[Some(100), Some(200)], &[Some(150), None]],
            &[&[(1, 0), (2, 50)], &[(1, 100)]],
        )?;
        let mut stats = ModelStats::default();

        let model = AssignmentModel::build(&problem, &mut stats)?;

        assert_eq!(stats.assignment_variables, 3);
        assert!(model.assignment_variable(1, 1).is_none());
        assert!(model.assignment_variable(1, 0).is_some());
        assert!(model.assignment_variable(0, 2).is_none());

        // Store 0 lists two items (k = 0..=2), store 1 lists one (k = 0..=1).
        assert_eq!(stats.indicator_variables, 5);
        assert_eq!(stats.coverage_constraints, 2);
        assert_eq!(stats.store_constraints, 8);
        assert_eq!(model.constraint_count(), 10);

        Ok(())
    }

    #[test]
    fn worst_case_overflow_is_rejected() -> TestResult {
        let huge = UNAVAILABLE / 2;
        let problem = problem(&[&[Some(huge)], &[Some(huge)]], &[&[]])?;

        let result = AssignmentModel::build(&problem, &mut NoopObserver);

        assert!(matches!(
            result,
            Err(SolverError::WorstCaseOverflow { num_items: 2, .. })
        ));

        Ok(())
    }

    #[test]
    fn worst_case_includes_fees() -> TestResult {
        let problem = problem(&[&[Some(UNAVAILABLE - 10)]], &[&[(1, 10)]])?;

        let result = AssignmentModel::build(&problem, &mut NoopObserver);

        assert!(matches!(result, Err(SolverError::WorstCaseOverflow { .. })));

        Ok(())
    }

    #[test]
    fn objective_prices_assignment_and_fee_variables() -> TestResult {
        let problem = problem(&[&[Some(100), Some(200)]], &[&[(1, 30)], &[(1, 40)]])?;
        let model = AssignmentModel::build(&problem, &mut NoopObserver)?;

        let y0 = model.assignment_variable(0, 0).ok_or("missing y[0, 0]")?;
        let y1 = model.assignment_variable(0, 1).ok_or("missing y[0, 1]")?;
        let fee0 = model.fee_variable(0).ok_or("missing fee[0]")?;
        let fee1 = model.fee_variable(1).ok_or("missing fee[1]")?;

        let (_pb, objective, _assignment, _constraints) = model.into_parts();

        let solution: HashMap<Variable, f64> =
            HashMap::from([(y0, 1.0), (y1, 0.0), (fee0, 30.0), (fee1, 0.0)]);

        assert!((solution.eval(&objective) - 130.0).abs() <= f64::EPSILON);

        Ok(())
    }

    #[test]
    fn debug_reports_sizes() -> TestResult {
        let problem = problem(&[&[Some(1)]], &[&[]])?;
        let model = AssignmentModel::build(&problem, &mut NoopObserver)?;

        let formatted = format!("{model:?}");

        assert!(formatted.contains("AssignmentModel"));
        assert!(formatted.contains("[1 variables]"));
        assert!(formatted.contains("[1 stores]"));
        assert!(model.fee_variable(0).is_some());
        assert!(model.fee_variable(1).is_none());

        Ok(())
    }
}
