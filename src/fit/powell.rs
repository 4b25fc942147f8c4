//! Powell's conjugate-direction method as an `argmin` solver.
//!
//! Each iteration runs a line search along every direction in the current set,
//! then tries the extrapolated point `2 x - x_start`. When the move is
//! promising, the direction of largest decrease is replaced by the overall
//! displacement.
//!
//! Line searches bracket a minimum along the ray and refine it with Brent's
//! method (parabolic interpolation with golden-section fallback). A line
//! search never returns a point worse than where it started.
//!
//! Convergence follows the usual relative test on the loss decrease over one
//! iteration: `2 (f_start - f_end) <= ftol (|f_start| + |f_end|) + 1e-20`.
//!
//! The evaluation budget is a hard cap: a line search that runs out of
//! evaluations stops where it is and keeps the best point it has seen.

use argmin::core::{CostFunction, Error, IterState, KV, Problem, Solver, State, TerminationReason, TerminationStatus};

const GOLDEN: f64 = 1.618_034;
const GOLDEN_SECTION: f64 = 0.381_966_0;
const GROW_LIMIT: f64 = 110.0;
const BRACKET_MAX_ITERS: usize = 1_000;
const BRENT_MAX_ITERS: usize = 500;
const BRENT_MIN_TOL: f64 = 1.0e-11;
const VERY_SMALL: f64 = 1.0e-21;

/// Message attached to a stop caused by the evaluation budget.
pub const EVAL_BUDGET_EXHAUSTED: &str = "maximum number of objective evaluations reached";

type PowellState = IterState<Vec<f64>, (), (), (), (), f64>;

/// Raised inside a line search once the evaluation budget is spent.
#[derive(Debug, thiserror::Error)]
#[error("objective evaluation budget spent")]
struct OutOfBudget;

#[derive(Debug, Clone)]
pub struct Powell {
    xtol: f64,
    ftol: f64,
    max_evals: u64,
    directions: Vec<Vec<f64>>,
    evals: u64,
    converged: bool,
}

impl Powell {
    pub fn new(xtol: f64, ftol: f64, max_evals: u64) -> Self {
        Self {
            xtol,
            ftol,
            max_evals,
            directions: Vec::new(),
            evals: 0,
            converged: false,
        }
    }

    fn budget_left(&self) -> bool {
        self.evals < self.max_evals
    }

    /// Minimize along `direction` from `x` (with known loss `fx`).
    ///
    /// Returns the new point, its loss and the step actually taken.
    fn line_search<O>(
        &mut self,
        problem: &mut Problem<O>,
        x: &[f64],
        fx: f64,
        direction: &[f64],
    ) -> Result<(Vec<f64>, f64, Vec<f64>), Error>
    where
        O: CostFunction<Param = Vec<f64>, Output = f64>,
    {
        if direction.iter().all(|d| *d == 0.0) {
            return Ok((x.to_vec(), fx, direction.to_vec()));
        }

        let remaining = self.max_evals.saturating_sub(self.evals);
        let mut evals = 0u64;
        let mut best = (0.0, fx);
        let mut phi = |alpha: f64| -> Result<f64, Error> {
            if evals >= remaining {
                return Err(Error::new(OutOfBudget));
            }
            evals += 1;
            let point: Vec<f64> = x.iter().zip(direction).map(|(xi, di)| xi + alpha * di).collect();
            let f = problem.cost(&point)?;
            if f < best.1 {
                best = (alpha, f);
            }
            Ok(f)
        };
        let found = brent(&mut phi, fx, self.xtol * 100.0);
        self.evals += evals;
        let (alpha, f_alpha) = match found {
            Ok(found) => found,
            Err(e) if e.is::<OutOfBudget>() => best,
            Err(e) => return Err(e),
        };

        if !(f_alpha <= fx) {
            return Ok((x.to_vec(), fx, vec![0.0; x.len()]));
        }
        let step: Vec<f64> = direction.iter().map(|d| alpha * d).collect();
        let moved = x.iter().zip(&step).map(|(xi, si)| xi + si).collect();
        Ok((moved, f_alpha, step))
    }
}

impl<O> Solver<O, PowellState> for Powell
where
    O: CostFunction<Param = Vec<f64>, Output = f64>,
{
    const NAME: &'static str = "Powell";

    fn init(&mut self, problem: &mut Problem<O>, state: PowellState) -> Result<(PowellState, Option<KV>), Error> {
        let x0 = state
            .get_param()
            .ok_or_else(|| Error::msg("Powell requires an initial parameter vector"))?
            .clone();
        let n = x0.len();
        self.directions = (0..n)
            .map(|i| {
                let mut d = vec![0.0; n];
                d[i] = 1.0;
                d
            })
            .collect();
        self.evals = 1;
        self.converged = false;
        let f0 = problem.cost(&x0)?;
        Ok((state.param(x0).cost(f0), None))
    }

    fn next_iter(&mut self, problem: &mut Problem<O>, state: PowellState) -> Result<(PowellState, Option<KV>), Error> {
        let start = state
            .get_param()
            .ok_or_else(|| Error::msg("Powell state has no parameter vector"))?
            .clone();
        let f_start = state.get_cost();

        let mut x = start.clone();
        let mut fx = f_start;
        let mut biggest_drop = 0.0;
        let mut biggest_index = 0;

        for i in 0..self.directions.len() {
            if !self.budget_left() {
                break;
            }
            let before = fx;
            let direction = self.directions[i].clone();
            let (moved, f_moved, _) = self.line_search(problem, &x, fx, &direction)?;
            x = moved;
            fx = f_moved;
            if before - fx > biggest_drop {
                biggest_drop = before - fx;
                biggest_index = i;
            }
        }

        // A sweep cut short by the budget says nothing about convergence.
        if !self.budget_left() {
            return Ok((state.param(x).cost(fx), None));
        }
        if 2.0 * (f_start - fx) <= self.ftol * (f_start.abs() + fx.abs()) + 1e-20 {
            self.converged = true;
            return Ok((state.param(x).cost(fx), None));
        }

        let displacement: Vec<f64> = x.iter().zip(&start).map(|(a, b)| a - b).collect();
        let extrapolated: Vec<f64> = x.iter().zip(&start).map(|(a, b)| 2.0 * a - b).collect();
        let f_extrapolated = problem.cost(&extrapolated)?;
        self.evals += 1;

        if f_start > f_extrapolated {
            let a = f_start - fx - biggest_drop;
            let b = f_start - f_extrapolated;
            let t = 2.0 * (f_start + f_extrapolated - 2.0 * fx) * a * a - biggest_drop * b * b;
            if t < 0.0 && self.budget_left() {
                let (moved, f_moved, step) = self.line_search(problem, &x, fx, &displacement)?;
                x = moved;
                fx = f_moved;
                if step.iter().any(|s| *s != 0.0) {
                    let last = self.directions.len() - 1;
                    self.directions.swap(biggest_index, last);
                    self.directions[last] = step;
                }
            }
        }

        Ok((state.param(x).cost(fx), None))
    }

    fn terminate(&mut self, _state: &PowellState) -> TerminationStatus {
        if self.converged {
            return TerminationStatus::Terminated(TerminationReason::SolverConverged);
        }
        if !self.budget_left() {
            return TerminationStatus::Terminated(TerminationReason::SolverExit(EVAL_BUDGET_EXHAUSTED.to_string()));
        }
        TerminationStatus::NotTerminated
    }
}

/// Points `(a, b, c)` with `f(b) <= f(a)` and `f(b) <= f(c)`, grown downhill
/// from `[0, 1]`.
struct Bracket {
    a: f64,
    b: f64,
    c: f64,
    fb: f64,
}

fn bracket<F>(phi: &mut F, f0: f64) -> Result<Bracket, Error>
where
    F: FnMut(f64) -> Result<f64, Error>,
{
    let (mut xa, mut xb) = (0.0, 1.0);
    let (mut fa, mut fb) = (f0, phi(xb)?);
    if fa < fb {
        std::mem::swap(&mut xa, &mut xb);
        std::mem::swap(&mut fa, &mut fb);
    }
    let mut xc = xb + GOLDEN * (xb - xa);
    let mut fc = phi(xc)?;

    let mut iters = 0;
    while fc < fb && iters < BRACKET_MAX_ITERS {
        iters += 1;
        let tmp1 = (xb - xa) * (fb - fc);
        let tmp2 = (xb - xc) * (fb - fa);
        let val = tmp2 - tmp1;
        let denom = if val.abs() < VERY_SMALL { 2.0 * VERY_SMALL } else { 2.0 * val };
        let mut w = xb - ((xb - xc) * tmp2 - (xb - xa) * tmp1) / denom;
        if !w.is_finite() {
            w = xc + GOLDEN * (xc - xb);
        }
        let wlim = xb + GROW_LIMIT * (xc - xb);
        let mut fw;

        if (w - xc) * (xb - w) > 0.0 {
            fw = phi(w)?;
            if fw < fc {
                return Ok(Bracket { a: xb, b: w, c: xc, fb: fw });
            } else if fw > fb {
                return Ok(Bracket { a: xa, b: xb, c: w, fb });
            }
            w = xc + GOLDEN * (xc - xb);
            fw = phi(w)?;
        } else if (w - wlim) * (wlim - xc) >= 0.0 {
            w = wlim;
            fw = phi(w)?;
        } else if (w - wlim) * (xc - w) > 0.0 {
            fw = phi(w)?;
            if fw < fc {
                xb = xc;
                xc = w;
                w = xc + GOLDEN * (xc - xb);
                fb = fc;
                fc = fw;
                fw = phi(w)?;
            }
        } else {
            w = xc + GOLDEN * (xc - xb);
            fw = phi(w)?;
        }
        xa = xb;
        xb = xc;
        xc = w;
        fa = fb;
        fb = fc;
        fc = fw;
    }

    // Ran out of iterations while still descending: the best point seen is `c`.
    if fc < fb {
        return Ok(Bracket { a: xb, b: xc, c: xc, fb: fc });
    }
    Ok(Bracket { a: xa, b: xb, c: xc, fb })
}

/// Brent's minimization of `phi` on a bracket around `[0, 1]`.
///
/// `f0` is `phi(0)`, already known to the caller. Returns `(alpha, phi(alpha))`.
fn brent<F>(phi: &mut F, f0: f64, tol: f64) -> Result<(f64, f64), Error>
where
    F: FnMut(f64) -> Result<f64, Error>,
{
    let br = bracket(phi, f0)?;
    let (mut a, mut b) = if br.a < br.c { (br.a, br.c) } else { (br.c, br.a) };

    let mut x = br.b;
    let mut w = x;
    let mut v = x;
    let mut fx = br.fb;
    let mut fw = fx;
    let mut fv = fx;
    let mut deltax: f64 = 0.0;
    let mut rat: f64 = 0.0;

    for _ in 0..BRENT_MAX_ITERS {
        let tol1 = tol * x.abs() + BRENT_MIN_TOL;
        let tol2 = 2.0 * tol1;
        let xmid = 0.5 * (a + b);
        if (x - xmid).abs() < tol2 - 0.5 * (b - a) {
            break;
        }

        if deltax.abs() <= tol1 {
            deltax = if x >= xmid { a - x } else { b - x };
            rat = GOLDEN_SECTION * deltax;
        } else {
            let tmp1 = (x - w) * (fx - fv);
            let mut tmp2 = (x - v) * (fx - fw);
            let mut p = (x - v) * tmp2 - (x - w) * tmp1;
            tmp2 = 2.0 * (tmp2 - tmp1);
            if tmp2 > 0.0 {
                p = -p;
            }
            tmp2 = tmp2.abs();
            let previous = deltax;
            deltax = rat;

            let parabolic_ok = p.is_finite()
                && tmp2.is_finite()
                && p > tmp2 * (a - x)
                && p < tmp2 * (b - x)
                && p.abs() < (0.5 * tmp2 * previous).abs();
            if parabolic_ok {
                rat = p / tmp2;
                let u = x + rat;
                if (u - a) < tol2 || (b - u) < tol2 {
                    rat = if xmid - x >= 0.0 { tol1 } else { -tol1 };
                }
            } else {
                deltax = if x >= xmid { a - x } else { b - x };
                rat = GOLDEN_SECTION * deltax;
            }
        }

        let u = if rat.abs() < tol1 {
            if rat >= 0.0 { x + tol1 } else { x - tol1 }
        } else {
            x + rat
        };
        let fu = phi(u)?;

        if fu > fx {
            if u < x {
                a = u;
            } else {
                b = u;
            }
            if fu <= fw || w == x {
                v = w;
                w = u;
                fv = fw;
                fw = fu;
            } else if fu <= fv || v == x || v == w {
                v = u;
                fv = fu;
            }
        } else {
            if u >= x {
                a = x;
            } else {
                b = x;
            }
            v = w;
            w = x;
            x = u;
            fv = fw;
            fw = fx;
            fx = fu;
        }
    }

    Ok((x, fx))
}
