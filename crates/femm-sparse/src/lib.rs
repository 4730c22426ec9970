//! Bespoke row-linked sparse matrix engines and iterative solvers.
//!
//! Two variants, near-identical in surface: [`real::BigLinProb`] for the
//! real-symmetric regimes (magnetostatic DC, electrostatics, heat flow) and
//! [`complex::BigComplexLinProb`] for time-harmonic (AC) magnetics, which
//! additionally carries three auxiliary matrices for Newton-mode nonlinear
//! assembly. Both share the row-linked entry [`arena`].

mod arena;
pub mod complex;
pub mod real;

pub use complex::{BigComplexLinProb, Which};
pub use real::BigLinProb;

/// The inner iterative solver's failure mode; the outer loop does not
/// retry at a coarser tolerance, so this is fatal all the way up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SolveError {
    #[error("inner iterative solver failed to converge")]
    NonConvergence,
}
