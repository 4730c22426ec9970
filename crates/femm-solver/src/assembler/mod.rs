//! Element-loop assemblers.
//!
//! `common` holds the geometry/depth/Kelvin-scale helpers every regime
//! shares; `real_regime` covers magnetostatic DC, electrostatics, and heat
//! flow (one matrix, one assembler, dispatched on `Regime`); `ac_magnetics`
//! covers time-harmonic magnetics, which needs a complex sparse engine and
//! the Newton-mode auxiliary matrices.

pub mod ac_magnetics;
pub mod common;
pub mod real_regime;
