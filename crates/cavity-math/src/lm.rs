//! Levenberg–Marquardt nonlinear least squares.
//!
//! Minimizes ½||r(x)||² with a forward-difference Jacobian and Marquardt
//! diagonal scaling. The report carries the termination reason so callers
//! can refuse unconverged fits.

use crate::linalg::solve_vec;
use cavity_types::error::{CavityError, CavityResult};
use ndarray::{Array1, Array2};

/// Damping growth on a rejected step.
const LAMBDA_UP: f64 = 4.0;

/// Damping shrink on an accepted step.
const LAMBDA_DOWN: f64 = 0.25;

/// Beyond this damping the step is numerically zero.
const LAMBDA_MAX: f64 = 1e16;

/// Cost at which the fit is treated as exact.
const ZERO_COST: f64 = 1e-30;

#[derive(Debug, Clone, Copy)]
pub struct LmConfig {
    /// Maximum outer (Jacobian) iterations.
    pub max_iterations: usize,
    /// Relative cost reduction tolerance.
    pub ftol: f64,
    /// Relative step size tolerance.
    pub xtol: f64,
    /// Infinity-norm gradient tolerance.
    pub gtol: f64,
    /// Initial damping factor.
    pub initial_lambda: f64,
    /// Relative finite-difference step.
    pub fd_step: f64,
}

impl Default for LmConfig {
    fn default() -> Self {
        LmConfig {
            max_iterations: 200,
            ftol: 1e-10,
            xtol: 1e-10,
            gtol: 1e-12,
            initial_lambda: 1e-3,
            fd_step: f64::EPSILON.sqrt(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LmTermination {
    /// Residual vanished.
    ZeroResidual,
    /// Relative cost reduction below `ftol`.
    CostTolerance,
    /// Relative step below `xtol`.
    StepTolerance,
    /// Gradient below `gtol`.
    GradientTolerance,
    /// No damping level produced a decrease or a solvable step.
    Stalled,
    /// Hit `max_iterations`.
    MaxIterations,
}

impl LmTermination {
    pub fn is_converged(self) -> bool {
        !matches!(self, LmTermination::Stalled | LmTermination::MaxIterations)
    }
}

#[derive(Debug, Clone)]
pub struct LmReport {
    pub x: Array1<f64>,
    /// ½||r(x)||² at the returned point.
    pub cost: f64,
    pub iterations: usize,
    pub evaluations: usize,
    pub termination: LmTermination,
}

impl LmReport {
    pub fn converged(&self) -> bool {
        self.termination.is_converged()
    }
}

fn half_sq_norm(r: &Array1<f64>) -> f64 {
    0.5 * r.dot(r)
}

fn finite_or_err(r: &Array1<f64>, what: &str) -> CavityResult<()> {
    if r.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(CavityError::DegenerateInput(format!(
            "{what} produced non-finite residuals"
        )))
    }
}

fn jacobian<F>(residual: &mut F, x: &Array1<f64>, r0: &Array1<f64>, fd_step: f64) -> Array2<f64>
where
    F: FnMut(&Array1<f64>) -> Array1<f64>,
{
    let m = r0.len();
    let n = x.len();
    let mut jac = Array2::zeros((m, n));
    let mut xp = x.clone();
    for j in 0..n {
        let h = fd_step * x[j].abs().max(1.0);
        xp[j] = x[j] + h;
        let rp = residual(&xp);
        xp[j] = x[j];
        for i in 0..m {
            jac[[i, j]] = (rp[i] - r0[i]) / h;
        }
    }
    jac
}

/// Run Levenberg–Marquardt from `x0`.
///
/// Errors only on malformed problems (non-finite residuals, empty vectors);
/// non-convergence is reported through [`LmReport::termination`].
pub fn levenberg_marquardt<F>(
    mut residual: F,
    x0: &Array1<f64>,
    config: &LmConfig,
) -> CavityResult<LmReport>
where
    F: FnMut(&Array1<f64>) -> Array1<f64>,
{
    let n = x0.len();
    if n == 0 {
        return Err(CavityError::DegenerateInput(
            "Levenberg-Marquardt needs at least one unknown".to_string(),
        ));
    }

    let mut x = x0.clone();
    let mut r = residual(&x);
    let mut evaluations = 1;
    finite_or_err(&r, "initial guess")?;
    if r.is_empty() {
        return Err(CavityError::DegenerateInput(
            "Levenberg-Marquardt residual vector is empty".to_string(),
        ));
    }
    let mut cost = half_sq_norm(&r);
    let mut lambda = config.initial_lambda;

    for iteration in 0..config.max_iterations {
        if cost <= ZERO_COST {
            return Ok(LmReport {
                x,
                cost,
                iterations: iteration,
                evaluations,
                termination: LmTermination::ZeroResidual,
            });
        }

        let jac = jacobian(&mut residual, &x, &r, config.fd_step);
        evaluations += n;
        let grad = jac.t().dot(&r);
        let grad_inf = grad.iter().fold(0.0_f64, |acc, g| acc.max(g.abs()));
        if grad_inf <= config.gtol {
            return Ok(LmReport {
                x,
                cost,
                iterations: iteration,
                evaluations,
                termination: LmTermination::GradientTolerance,
            });
        }
        let jtj = jac.t().dot(&jac);
        let neg_grad = -&grad;

        let mut accepted = false;
        while lambda <= LAMBDA_MAX {
            let mut damped = jtj.clone();
            for i in 0..n {
                damped[[i, i]] += lambda * jtj[[i, i]].max(1e-12);
            }
            let step = match solve_vec(&damped, &neg_grad) {
                Ok(step) => step,
                Err(_) => {
                    lambda *= LAMBDA_UP;
                    continue;
                }
            };
            let x_new = &x + &step;
            let r_new = residual(&x_new);
            evaluations += 1;
            let cost_new = if r_new.iter().all(|v| v.is_finite()) {
                half_sq_norm(&r_new)
            } else {
                f64::INFINITY
            };

            let step_norm = step.dot(&step).sqrt();
            let x_norm = x.dot(&x).sqrt();
            if cost_new < cost {
                let reduction = cost - cost_new;
                x = x_new;
                r = r_new;
                let old_cost = cost;
                cost = cost_new;
                lambda = (lambda * LAMBDA_DOWN).max(1e-15);
                accepted = true;

                tracing::debug!(iteration, cost, lambda, "LM step accepted");
                if reduction <= config.ftol * old_cost {
                    return Ok(LmReport {
                        x,
                        cost,
                        iterations: iteration + 1,
                        evaluations,
                        termination: LmTermination::CostTolerance,
                    });
                }
                if step_norm <= config.xtol * (x_norm + config.xtol) {
                    return Ok(LmReport {
                        x,
                        cost,
                        iterations: iteration + 1,
                        evaluations,
                        termination: LmTermination::StepTolerance,
                    });
                }
                break;
            }
            // Rejected and already below the step tolerance: nothing left to gain.
            if step_norm <= config.xtol * (x_norm + config.xtol) {
                return Ok(LmReport {
                    x,
                    cost,
                    iterations: iteration + 1,
                    evaluations,
                    termination: LmTermination::StepTolerance,
                });
            }
            lambda *= LAMBDA_UP;
        }

        if !accepted {
            let termination = if cost <= ZERO_COST {
                LmTermination::ZeroResidual
            } else {
                LmTermination::Stalled
            };
            return Ok(LmReport {
                x,
                cost,
                iterations: iteration + 1,
                evaluations,
                termination,
            });
        }
    }

    Ok(LmReport {
        x,
        cost,
        iterations: config.max_iterations,
        evaluations,
        termination: LmTermination::MaxIterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_linear_fit_converges() {
        // r_i = a + b t_i - y_i with y = 2 - 3t
        let t = [0.0, 1.0, 2.0, 3.0, 4.0];
        let residual = |p: &Array1<f64>| {
            Array1::from_iter(t.iter().map(|&ti| p[0] + p[1] * ti - (2.0 - 3.0 * ti)))
        };
        let report =
            levenberg_marquardt(residual, &array![0.0, 0.0], &LmConfig::default()).unwrap();
        assert!(report.converged(), "termination: {:?}", report.termination);
        assert!((report.x[0] - 2.0).abs() < 1e-6);
        assert!((report.x[1] + 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_rosenbrock_converges() {
        let residual = |p: &Array1<f64>| array![10.0 * (p[1] - p[0] * p[0]), 1.0 - p[0]];
        let report =
            levenberg_marquardt(residual, &array![-1.2, 1.0], &LmConfig::default()).unwrap();
        assert!(report.converged(), "termination: {:?}", report.termination);
        assert!((report.x[0] - 1.0).abs() < 1e-5, "x = {}", report.x);
        assert!((report.x[1] - 1.0).abs() < 1e-5, "x = {}", report.x);
    }

    #[test]
    fn test_exponential_decay_fit() {
        // y = 3 exp(-0.7 t)
        let t: Vec<f64> = (0..20).map(|i| i as f64 * 0.25).collect();
        let y: Vec<f64> = t.iter().map(|&ti| 3.0 * (-0.7 * ti).exp()).collect();
        let residual = |p: &Array1<f64>| {
            Array1::from_iter(
                t.iter()
                    .zip(y.iter())
                    .map(|(&ti, &yi)| p[0] * (-p[1] * ti).exp() - yi),
            )
        };
        let report =
            levenberg_marquardt(residual, &array![1.0, 0.1], &LmConfig::default()).unwrap();
        assert!(report.converged());
        assert!((report.x[0] - 3.0).abs() < 1e-5);
        assert!((report.x[1] - 0.7).abs() < 1e-5);
    }

    #[test]
    fn test_iteration_cap_reports_unconverged() {
        let residual = |p: &Array1<f64>| array![10.0 * (p[1] - p[0] * p[0]), 1.0 - p[0]];
        let config = LmConfig {
            max_iterations: 1,
            ..LmConfig::default()
        };
        let report = levenberg_marquardt(residual, &array![-1.2, 1.0], &config).unwrap();
        assert_eq!(report.termination, LmTermination::MaxIterations);
        assert!(!report.converged());
    }

    #[test]
    fn test_non_finite_initial_residual_is_error() {
        let residual = |_: &Array1<f64>| array![f64::NAN];
        let result = levenberg_marquardt(residual, &array![0.0], &LmConfig::default());
        assert!(matches!(result, Err(CavityError::DegenerateInput(_))));
    }
}
