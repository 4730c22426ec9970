//! The top-level problem configuration: the `[key=value]` scalars from the
//! external problem-file interface, independent of whatever textual grammar
//! produced them (the `.fem` grammar itself is an out-of-scope collaborator).

use crate::units::LengthUnit;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Coordinates {
    Cartesian,
    Polar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProblemType {
    Planar,
    Axisymmetric,
}

/// Which outer-loop update rule drives the time-harmonic (AC) nonlinear
/// solve; `[acsolver]` in the external interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcSolverMode {
    SuccessiveApproximation,
    Newton,
}

/// Kelvin-transform external-region parameters for an open-boundary
/// axisymmetric problem.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExternalRegion {
    pub r_i: f64,
    pub r_o: f64,
    pub z_o: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemConfig {
    /// 0 for magnetostatic DC / electrostatics / heat flow; > 0 selects the
    /// time-harmonic magnetics regime.
    pub frequency_hz: f64,
    pub precision: f64,
    /// Problem-set thickness (planar regime only).
    pub depth_mm: f64,
    #[serde(default)]
    pub length_unit: LengthUnit,
    pub coordinates: Coordinates,
    pub problem_type: ProblemType,
    #[serde(default)]
    pub external_region: Option<ExternalRegion>,
    #[serde(default = "default_ac_solver")]
    pub ac_solver: AcSolverMode,
    #[serde(default)]
    pub prev_solution_path: Option<String>,
    #[serde(default)]
    pub do_smart_mesh: bool,
    #[serde(default)]
    pub force_max_mesh: bool,
}

fn default_ac_solver() -> AcSolverMode {
    AcSolverMode::SuccessiveApproximation
}

impl ProblemConfig {
    pub fn is_harmonic(&self) -> bool {
        self.frequency_hz > 0.0
    }

    pub fn angular_frequency(&self) -> f64 {
        2.0 * std::f64::consts::PI * self.frequency_hz
    }
}
