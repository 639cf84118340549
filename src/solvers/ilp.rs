//! ILP Solver

use good_lp::{Expression, Solution, SolutionStatus, SolverModel, Variable};
use tracing::debug;

#[cfg(feature = "solver-highs")]
use good_lp::solvers::highs::highs as default_solver;
#[cfg(all(not(feature = "solver-highs"), feature = "solver-microlp"))]
use good_lp::solvers::microlp::microlp as default_solver;

use crate::{
    matrix::CostMatrix,
    solvers::{
        Problem, Solver, SolverError, SolverResult,
        ilp::{
            model::AssignmentModel,
            observer::{ILPObserver, ModelStats},
        },
    },
};

pub mod model;
pub mod observer;

pub use observer::NoopObserver;

/// Binary threshold for determining truthiness
pub const BINARY_THRESHOLD: f64 = 0.5;

/// Largest tolerated gap between the solver's objective and the exact integer total.
const OBJECTIVE_TOLERANCE: f64 = 0.5;

/// Solver using Integer Linear Programming (ILP)
#[derive(Debug)]
pub struct ILPSolver;

impl Solver for ILPSolver {
    fn solve(problem: &Problem) -> Result<SolverResult, SolverError> {
        let mut stats = ModelStats::default();

        let result = Self::solve_with_observer(problem, &mut stats);

        debug!(
            assignment_variables = stats.assignment_variables,
            indicator_variables = stats.indicator_variables,
            coverage_constraints = stats.coverage_constraints,
            store_constraints = stats.store_constraints,
            "built assignment model"
        );

        result
    }
}

impl ILPSolver {
    /// Solve while reporting the model construction to `observer`.
    ///
    /// Only a result the backend reports as optimal is returned. Anything else, including
    /// infeasibility or an unproven incumbent, is an error.
    ///
    /// # Errors
    ///
    /// Returns a [`SolverError`] if the input is rejected, the backend fails, or the returned
    /// solution violates the model's invariants.
    pub fn solve_with_observer<O: ILPObserver + ?Sized>(
        problem: &Problem,
        observer: &mut O,
    ) -> Result<SolverResult, SolverError> {
        // Nothing to choose: every store ships an empty order.
        if problem.num_items() == 0 {
            let store_counts = vec![0; problem.num_stores()];
            let objective = exact_objective(problem, &[], &store_counts)?;

            return Ok(SolverResult {
                assignment: Vec::new(),
                store_counts,
                objective,
            });
        }

        let model = AssignmentModel::build(problem, observer)?;

        let (pb, cost, assignment_vars, constraints) = model.into_parts();

        // Create the solver model
        let mut solver_model = pb.minimise(cost.clone()).using(default_solver);

        for constraint in constraints {
            solver_model = solver_model.with(constraint.into_constraint());
        }

        let solution = solver_model.solve()?;

        ensure_optimal(&solution)?;

        let assignment = extract_assignment(&solution, &assignment_vars, problem.num_stores())?;
        let store_counts = count_per_store(&assignment, problem.num_stores());
        let objective = exact_objective(problem, &assignment, &store_counts)?;

        check_objective(&solution, &cost, objective)?;

        Ok(SolverResult {
            assignment,
            store_counts,
            objective,
        })
    }
}

/// Reject any solution the backend has not proven optimal.
fn ensure_optimal(solution: &impl Solution) -> Result<(), SolverError> {
    match solution.status() {
        SolutionStatus::Optimal => Ok(()),
        other => Err(SolverError::NotOptimal {
            status: format!("{other:?}"),
        }),
    }
}

/// Compare the solver's objective value with the exact integer total.
fn check_objective(
    solution: &impl Solution,
    cost: &Expression,
    objective: i64,
) -> Result<(), SolverError> {
    if (solution.eval(cost) - objective_as_f64(objective)?).abs() > OBJECTIVE_TOLERANCE {
        return Err(SolverError::InvariantViolation {
            message: "solver objective disagrees with recomputed total",
        });
    }

    Ok(())
}

/// Read the chosen store for each item from the solution.
///
/// Every item must have exactly one selected assignment variable.
fn extract_assignment(
    solution: &impl Solution,
    assignment_vars: &[Option<Variable>],
    num_stores: usize,
) -> Result<Vec<usize>, SolverError> {
    if num_stores == 0 {
        return if assignment_vars.is_empty() {
            Ok(Vec::new())
        } else {
            Err(SolverError::InvariantViolation {
                message: "assignment variables exist without stores",
            })
        };
    }

    assignment_vars
        .chunks(num_stores)
        .map(|row| {
            // Variables are binary but the solver returns floats, so treat values
            // greater than 0.5 as selected to tolerate numerical noise.
            let mut chosen = row.iter().copied().enumerate().filter_map(|(store_idx, var)| {
                var.filter(|&var| solution.value(var) > BINARY_THRESHOLD)
                    .map(|_| store_idx)
            });

            match (chosen.next(), chosen.next()) {
                (Some(store_idx), None) => Ok(store_idx),
                _ => Err(SolverError::InvariantViolation {
                    message: "item must be assigned to exactly one store",
                }),
            }
        })
        .collect()
}

fn count_per_store(assignment: &[usize], num_stores: usize) -> Vec<usize> {
    let mut counts = vec![0; num_stores];

    for &store_idx in assignment {
        if let Some(count) = counts.get_mut(store_idx) {
            *count += 1;
        }
    }

    counts
}

/// Recompute the total in exact integer arithmetic.
fn exact_objective(
    problem: &Problem,
    assignment: &[usize],
    store_counts: &[usize],
) -> Result<i64, SolverError> {
    let goods = goods_total(problem.matrix(), assignment)?;

    problem
        .fee_tables()
        .iter()
        .zip(store_counts)
        .try_fold(goods, |acc, (table, &count)| {
            table
                .fee_for(count)
                .and_then(|fee| acc.checked_add(fee))
        })
        .ok_or(SolverError::InvariantViolation {
            message: "fee lookup failed for solved order size",
        })
}

fn goods_total(matrix: &CostMatrix, assignment: &[usize]) -> Result<i64, SolverError> {
    assignment
        .iter()
        .enumerate()
        .try_fold(0_i64, |acc, (item_idx, &store_idx)| {
            matrix
                .cost(item_idx, store_idx)
                .and_then(|cost| acc.checked_add(cost))
        })
        .ok_or(SolverError::InvariantViolation {
            message: "item assigned to a store that does not list it",
        })
}

fn objective_as_f64(objective: i64) -> Result<f64, SolverError> {
    crate::pricing::i64_to_f64_exact(objective)
        .ok_or(SolverError::MinorUnitsNotRepresentable { minor_units: objective })
}
