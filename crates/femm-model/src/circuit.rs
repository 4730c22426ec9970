//! Lumped circuit / conductor constraints.
//!
//! One `Circuit` describes the excitation shared by every node that belongs
//! to it (via `Node::conductor_index`); the interpretation of `kind`'s
//! payload (current, charge, heat flow) depends on which regime is being
//! assembled. A series-type circuit is rewritten by the assembler into a
//! parallel circuit per block label, scaled by turns (the conductor
//! redirection step) — that rewrite is a pure data transformation and lives
//! in `femm-solver`, not here.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CircuitKind {
    /// Prescribed total current/charge/heat-flow, applied in series across
    /// every block label bound to this circuit (turns-scaled per label).
    Series(f64),
    /// Prescribed total current/charge/heat-flow, shared in parallel across
    /// every node bound to this circuit.
    Parallel(f64),
    /// Fixed potential (voltage / temperature) Dirichlet condition on every
    /// node bound to this circuit.
    FixedPotential(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circuit {
    pub kind: CircuitKind,
    /// Conductor resistance, ohms; used only for the post-solve impedance
    /// figure the solution writer reports alongside `(J, dV)`, not in the
    /// field solve itself.
    pub resistance: f64,
}

impl Circuit {
    pub fn is_series(&self) -> bool {
        matches!(self.kind, CircuitKind::Series(_))
    }

    pub fn is_fixed_potential(&self) -> bool {
        matches!(self.kind, CircuitKind::FixedPotential(_))
    }
}
