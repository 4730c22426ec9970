//! Boundary-property and point-property tagged unions.

use femm_complex::Scalar;
use serde::{Deserialize, Serialize};

/// A boundary condition attached to one or more element edges via
/// `Element::edge_markers`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BoundaryProp {
    /// Dirichlet condition: `value(x, y) = a0 + a1*x + a2*y`, optionally
    /// phase-shifted (`phase_deg`) for the harmonic regime.
    Fixed {
        a0: f64,
        a1: f64,
        a2: f64,
        phase_deg: f64,
    },
    /// Mixed / Robin: `c0*u + c1 = du/dn`. Real-valued in DC magnetostatics,
    /// electrostatics, and heat flow; complex in harmonic magnetics.
    Mixed { c0: Scalar, c1: Scalar },
    /// Surface source: surface charge density, line current density, or
    /// surface heat flux depending on regime.
    SurfaceSource { density: f64 },
    /// Small-skin-depth absorbing boundary (harmonic magnetics only).
    SmallSkinDepth { mu_rel: f64, sigma: f64 },
    /// Periodic marker. Informational only during boundary-term assembly:
    /// the actual node coupling comes from `Mesh::periodic_pairs`, read
    /// directly off the `.pbc` file rather than derived from this tag.
    Periodic,
    /// Anti-periodic marker.
    AntiPeriodic,
}

impl BoundaryProp {
    /// Evaluate a `Fixed` boundary's prescribed value at `(x, y)`. For the
    /// harmonic regime the phase becomes a complex rotation of the real
    /// amplitude; for DC regimes `phase_deg` is ignored (it is 0 for any
    /// correctly-built DC problem).
    pub fn fixed_value(a0: f64, a1: f64, a2: f64, phase_deg: f64, x: f64, y: f64, harmonic: bool) -> Scalar {
        let amplitude = a0 + a1 * x + a2 * y;
        if harmonic {
            let theta = phase_deg.to_radians();
            Scalar::new(amplitude * theta.cos(), amplitude * theta.sin())
        } else {
            Scalar::new(amplitude, 0.0)
        }
    }
}

/// A point (nodal) source and/or fixed value, attached directly to a node.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PointProp {
    /// Point current / charge / heat flux.
    pub source: Option<f64>,
    /// Fixed nodal value (Dirichlet), distinct from a boundary-edge Fixed
    /// condition so a single corner node can be pinned without owning a
    /// whole edge.
    pub fixed_value: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_value_is_real_in_dc() {
        let v = BoundaryProp::fixed_value(1.0, 0.5, -0.5, 45.0, 2.0, 2.0, false);
        assert_eq!(v, Scalar::new(1.0, 0.0));
    }

    #[test]
    fn fixed_value_rotates_by_phase_in_ac() {
        let v = BoundaryProp::fixed_value(2.0, 0.0, 0.0, 90.0, 0.0, 0.0, true);
        assert!(v.re.abs() < 1e-9);
        assert!((v.im - 2.0).abs() < 1e-9);
    }
}
