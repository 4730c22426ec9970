//! Block labels: the PSLG-level instance that binds a point-in-region to a
//! material, circuit, turns count, and (for magnetics) a magnetization
//! direction.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Magnetization {
    /// Fixed angle, degrees, in the global frame.
    Angle(f64),
    /// A string expression evaluated per element (e.g. for a radial-magnet
    /// ring whose magnetization direction varies with position); carried as
    /// an opaque string since expression evaluation is a collaborator
    /// concern upstream of this solver core.
    Expression(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockLabel {
    pub x: f64,
    pub y: f64,
    pub material: usize,
    pub max_area: f64,
    pub circuit: Option<usize>,
    pub magnetization: Option<Magnetization>,
    /// Signed turns count; sign encodes winding direction.
    pub turns: f64,
    /// Marks the Kelvin-transform external region annulus in axisymmetric
    /// open-boundary problems.
    pub is_external_region: bool,
    pub is_default: bool,
}

impl BlockLabel {
    pub fn new(x: f64, y: f64, material: usize) -> Self {
        Self {
            x,
            y,
            material,
            max_area: f64::INFINITY,
            circuit: None,
            magnetization: None,
            turns: 1.0,
            is_external_region: false,
            is_default: false,
        }
    }
}
