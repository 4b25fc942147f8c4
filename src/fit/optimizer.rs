//! Derivative-free minimization of an [`Objective`].
//!
//! Wires a solver to the objective through `argmin`'s [`Executor`] and turns the
//! final state into the best parameters plus [`CalibrationDiagnostics`].
//!
//! - Powell: [`Powell`](crate::fit::Powell), budgeted by iterations and
//!   objective evaluations
//! - Nelder-Mead: `argmin`'s simplex solver started from a simplex that
//!   perturbs each coordinate by 5% (or 0.00025 when it is zero)

use argmin::core::{Executor, IterState, State, TerminationReason, TerminationStatus};
use argmin::solver::neldermead::NelderMead;
use tracing::warn;

use crate::domain::{CalibrationDiagnostics, OptimMethod};
use crate::error::ModelError;
use crate::fit::objective::Objective;
use crate::fit::powell::{EVAL_BUDGET_EXHAUSTED, Powell};

const SIMPLEX_NONZERO_DELTA: f64 = 0.05;
const SIMPLEX_ZERO_DELTA: f64 = 0.000_25;
const SIMPLEX_SD_TOLERANCE: f64 = 1.0e-8;

/// Optimizer choice and budget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimSettings {
    pub method: OptimMethod,
    pub max_iters: u64,
    pub max_evals: u64,
    /// Relative line-search tolerance on parameters (Powell).
    pub xtol: f64,
    /// Relative tolerance on the loss decrease per iteration (Powell).
    pub ftol: f64,
}

impl Default for OptimSettings {
    fn default() -> Self {
        Self {
            method: OptimMethod::Powell,
            max_iters: 10_000,
            max_evals: 10_000,
            xtol: 1.0e-4,
            ftol: 1.0e-4,
        }
    }
}

impl OptimSettings {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.max_iters == 0 || self.max_evals == 0 {
            return Err(ModelError::InvalidConfig(
                "iteration and evaluation budgets must be positive".to_string(),
            ));
        }
        if !(self.xtol > 0.0 && self.ftol > 0.0) {
            return Err(ModelError::InvalidConfig("tolerances must be positive".to_string()));
        }
        Ok(())
    }
}

/// Best point found by [`minimize`].
#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub params: Vec<f64>,
    pub loss: f64,
    pub diagnostics: CalibrationDiagnostics,
}

/// Minimize `objective` starting from `x0`.
///
/// Running out of budget is not an error: the best point so far is returned
/// with `diagnostics.budget_exhausted` set.
///
/// # Errors
/// `Optimizer` when the solver itself fails. Errors raised by the objective
/// (e.g. a parameter count mismatch) are returned unchanged.
pub fn minimize(objective: Objective<'_>, x0: Vec<f64>, settings: &OptimSettings) -> Result<Minimum, ModelError> {
    settings.validate()?;
    let initial_loss = objective.loss(&x0)?;

    let outcome = match settings.method {
        OptimMethod::Powell => {
            let solver = Powell::new(settings.xtol, settings.ftol, settings.max_evals);
            let res = Executor::new(objective, solver)
                .configure(|state| state.param(x0).max_iters(settings.max_iters))
                .run()
                .map_err(optimizer_error)?;
            SolverOutcome::from_state(res.state().clone())
        }
        OptimMethod::NelderMead => {
            // The simplex solver has no evaluation hook; every iteration costs
            // at least one evaluation, so the evaluation budget caps iterations.
            let max_iters = settings.max_iters.min(settings.max_evals);
            let solver = NelderMead::new(initial_simplex(&x0))
                .with_sd_tolerance(SIMPLEX_SD_TOLERANCE)
                .map_err(optimizer_error)?;
            let res = Executor::new(objective, solver)
                .configure(|state| state.param(x0).max_iters(max_iters))
                .run()
                .map_err(optimizer_error)?;
            SolverOutcome::from_state(res.state().clone())
        }
    };

    let params = outcome
        .params
        .ok_or_else(|| ModelError::Optimizer("solver finished without a best point".to_string()))?;
    let budget_exhausted = outcome.out_of_budget;
    if budget_exhausted {
        warn!(
            model = objective.kind().name(),
            method = settings.method.display_name(),
            iterations = outcome.iterations,
            evaluations = outcome.evaluations,
            loss = outcome.loss,
            "optimizer budget exhausted before convergence; keeping best point so far"
        );
    }

    Ok(Minimum {
        params,
        loss: outcome.loss,
        diagnostics: CalibrationDiagnostics {
            method: settings.method,
            initial_loss,
            iterations: outcome.iterations,
            evaluations: outcome.evaluations,
            termination: outcome.termination,
            budget_exhausted,
        },
    })
}

/// Starting simplex: `x0` plus one vertex per coordinate, nudged by 5%.
pub fn initial_simplex(x0: &[f64]) -> Vec<Vec<f64>> {
    let mut simplex = Vec::with_capacity(x0.len() + 1);
    simplex.push(x0.to_vec());
    for k in 0..x0.len() {
        let mut vertex = x0.to_vec();
        vertex[k] = if vertex[k] != 0.0 {
            (1.0 + SIMPLEX_NONZERO_DELTA) * vertex[k]
        } else {
            SIMPLEX_ZERO_DELTA
        };
        simplex.push(vertex);
    }
    simplex
}

struct SolverOutcome {
    params: Option<Vec<f64>>,
    loss: f64,
    iterations: u64,
    evaluations: u64,
    termination: String,
    out_of_budget: bool,
}

impl SolverOutcome {
    fn from_state(mut state: IterState<Vec<f64>, (), (), (), (), f64>) -> Self {
        let status = state.get_termination_status().clone();
        let evaluations = state.get_func_counts().get("cost_count").copied().unwrap_or(0);
        Self {
            loss: state.get_best_cost(),
            iterations: state.get_iter(),
            evaluations,
            termination: describe(&status),
            out_of_budget: matches!(
                &status,
                TerminationStatus::Terminated(TerminationReason::MaxItersReached)
            ) || matches!(
                &status,
                TerminationStatus::Terminated(TerminationReason::SolverExit(msg)) if msg == EVAL_BUDGET_EXHAUSTED
            ),
            params: state.take_best_param(),
        }
    }
}

fn describe(status: &TerminationStatus) -> String {
    match status {
        TerminationStatus::Terminated(reason) => reason.to_string(),
        TerminationStatus::NotTerminated => "not terminated".to_string(),
    }
}

fn optimizer_error(err: argmin::core::Error) -> ModelError {
    // Objective errors travel through argmin boxed; recover them when possible.
    match err.downcast::<ModelError>() {
        Ok(model_err) => model_err,
        Err(other) => ModelError::Optimizer(other.to_string()),
    }
}
