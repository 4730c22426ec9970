//! The nonlinear outer loop: wipe, reassemble with the latest permeability
//! estimate, solve, check convergence on the change in the solution vector,
//! relax after a handful of iterations to damp oscillation, repeat.
//!
//! Linear problems (no nonlinear blocks at all) fall out of this as the
//! single-iteration case: `update_nonlinear_mu` is a no-op when no block
//! carries a B-H curve, so the first solve already satisfies the
//! convergence check.

use femm_complex::Scalar;
use femm_model::{Problem, Regime};
use femm_sparse::{BigComplexLinProb, BigLinProb, SolveError};

use crate::assembler::{ac_magnetics, real_regime};
use crate::circuits::expand_circuits;
use crate::logger::Logger;
use crate::material::BhInterpolant;

/// Outer-loop tuning. `relax_after` is the iteration index (0-based) from
/// which under-relaxation kicks in; `relax_factor` is the
/// fraction of the freshly solved iterate that replaces the previous one
/// from then on.
#[derive(Debug, Clone, Copy)]
pub struct OuterLoopConfig {
    pub max_iterations: usize,
    pub relax_after: usize,
    pub relax_factor: f64,
}

impl Default for OuterLoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 40,
            relax_after: 5,
            relax_factor: 0.5,
        }
    }
}

fn build_bh_tables(problem: &Problem) -> Vec<Option<BhInterpolant>> {
    problem
        .block_props
        .iter()
        .map(|block| block.bh_curve.as_ref().map(BhInterpolant::build))
        .collect()
}

fn has_nonlinear_block(problem: &Problem) -> bool {
    problem.block_props.iter().any(|b| b.is_nonlinear())
}

fn is_newton(problem: &Problem) -> bool {
    matches!(problem.config.ac_solver, femm_model::AcSolverMode::Newton)
}

/// Solve a real-valued regime (magnetostatic DC, electrostatics, heat
/// flow) to self-consistency.
pub fn solve_dc(
    problem: &mut Problem,
    config: OuterLoopConfig,
    logger: &mut dyn Logger,
) -> Result<BigLinProb, SolveError> {
    let bh_tables = build_bh_tables(problem);
    let nonlinear = problem.regime == Regime::Magnetics && has_nonlinear_block(problem);
    let circuits = expand_circuits(problem);
    let n = problem.mesh.nodes.len();
    let total = n + circuits.num_conductors();

    let mut v_prev = vec![0.0; n];
    let mut mp = BigLinProb::create_with_conductors(total, 32, n);

    for iter in 0..config.max_iterations {
        if nonlinear {
            let v = if iter == 0 { None } else { Some(v_prev.as_slice()) };
            real_regime::update_nonlinear_mu(problem, &bh_tables, v, is_newton(problem));
        }

        mp.wipe();
        real_regime::assemble(problem, &mut mp, &circuits);
        mp.pcg_solve(problem.config.precision, iter > 0)?;

        let change = relative_change(&v_prev, &mp.v[..n]);
        logger.info(&format!("outer iteration {iter}: relative change {change:.3e}"));

        if iter >= config.relax_after && iter > 0 {
            for i in 0..n {
                mp.v[i] = v_prev[i] + config.relax_factor * (mp.v[i] - v_prev[i]);
            }
        }

        if !nonlinear || (iter > 0 && change < 100.0 * problem.config.precision) {
            return Ok(mp);
        }
        v_prev.copy_from_slice(&mp.v[..n]);
    }
    logger.warn("outer loop reached max iterations without meeting the nonlinear convergence target");
    Ok(mp)
}

/// Solve the time-harmonic magnetics regime to self-consistency.
pub fn solve_ac(
    problem: &mut Problem,
    config: OuterLoopConfig,
    logger: &mut dyn Logger,
) -> Result<BigComplexLinProb, SolveError> {
    let bh_tables = build_bh_tables(problem);
    let nonlinear = has_nonlinear_block(problem);
    let newton = is_newton(problem);
    let circuits = expand_circuits(problem);
    let n = problem.mesh.nodes.len();
    let total = n + circuits.num_conductors();

    let mut v_prev = vec![Scalar::new(0.0, 0.0); n];
    let mut mp = BigComplexLinProb::create_with_conductors(total, 32, n);

    for iter in 0..config.max_iterations {
        if nonlinear {
            let v = if iter == 0 { None } else { Some(v_prev.as_slice()) };
            ac_magnetics::update_nonlinear_mu(problem, &bh_tables, v, newton, &mut mp);
        }

        mp.wipe();
        ac_magnetics::assemble(problem, &mut mp, &circuits, newton);
        mp.bicgstab_solve(problem.config.precision, iter > 0)?;

        let change = relative_change_complex(&v_prev, &mp.v[..n]);
        logger.info(&format!("outer iteration {iter}: relative change {change:.3e}"));

        if iter >= config.relax_after && iter > 0 {
            for i in 0..n {
                mp.v[i] = v_prev[i] + (mp.v[i] - v_prev[i]) * config.relax_factor;
            }
        }

        if !nonlinear || (iter > 0 && change < 100.0 * problem.config.precision) {
            return Ok(mp);
        }
        v_prev.copy_from_slice(&mp.v[..n]);
    }
    logger.warn("outer loop reached max iterations without meeting the nonlinear convergence target");
    Ok(mp)
}

fn relative_change(prev: &[f64], next: &[f64]) -> f64 {
    let num: f64 = prev.iter().zip(next).map(|(a, b)| (a - b).powi(2)).sum::<f64>().sqrt();
    let den: f64 = next.iter().map(|b| b * b).sum::<f64>().sqrt();
    if den < 1e-300 {
        0.0
    } else {
        num / den
    }
}

fn relative_change_complex(prev: &[Scalar], next: &[Scalar]) -> f64 {
    let num: f64 = prev.iter().zip(next).map(|(a, b)| (a - b).norm_sqr()).sum::<f64>().sqrt();
    let den: f64 = next.iter().map(|b| b.norm_sqr()).sum::<f64>().sqrt();
    if den < 1e-300 {
        0.0
    } else {
        num / den
    }
}
