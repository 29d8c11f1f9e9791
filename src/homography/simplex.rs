//! Derivative-free minimisation used to refine the projective transform.

use argmin::core::{CostFunction, Executor, State, TerminationReason};
use argmin::solver::neldermead;

use super::HomographyError;

/// Outcome of a minimisation
#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub params: Vec<f64>,
    pub iterations: u64,
    /// `false` when the iteration cap was hit first
    pub converged: bool,
}

/// A derivative-free minimiser working from an initial point and per-parameter steps.
pub trait Minimizer {
    fn minimize(
        &self,
        initial: &[f64],
        step_sizes: &[f64],
        objective: &dyn Fn(&[f64]) -> f64,
        max_iterations: u64,
        tolerance: f64,
    ) -> Result<Minimum, HomographyError>;
}

/// Nelder-Mead simplex search backed by `argmin`.
///
/// The initial simplex is the starting point plus one vertex per parameter, offset by
/// that parameter's step. The search has converged once the standard deviation of the
/// vertex costs drops below the tolerance.
#[derive(Debug, Clone, Copy, Default)]
pub struct NelderMead;

struct Objective<'a> {
    f: &'a dyn Fn(&[f64]) -> f64,
}

impl CostFunction for Objective<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
        Ok((self.f)(param))
    }
}

impl Minimizer for NelderMead {
    fn minimize(
        &self,
        initial: &[f64],
        step_sizes: &[f64],
        objective: &dyn Fn(&[f64]) -> f64,
        max_iterations: u64,
        tolerance: f64,
    ) -> Result<Minimum, HomographyError> {
        if step_sizes.len() != initial.len() {
            return Err(HomographyError::ParameterCount {
                expected: initial.len(),
                found: step_sizes.len(),
            });
        }

        let mut simplex = Vec::with_capacity(initial.len() + 1);
        simplex.push(initial.to_vec());
        for (i, step) in step_sizes.iter().enumerate() {
            let mut vertex = initial.to_vec();
            vertex[i] += step;
            simplex.push(vertex);
        }

        let solver = neldermead::NelderMead::new(simplex).with_sd_tolerance(tolerance)?;
        let result = Executor::new(Objective { f: objective }, solver)
            .configure(|state| state.max_iters(max_iterations))
            .run()?;

        let state = result.state();
        let converged = matches!(
            state.get_termination_reason(),
            Some(TerminationReason::SolverConverged)
        );
        let params = state
            .get_best_param()
            .cloned()
            .unwrap_or_else(|| initial.to_vec());

        Ok(Minimum {
            params,
            iterations: state.get_iter(),
            converged,
        })
    }
}
