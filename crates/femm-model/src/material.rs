//! Block (material) properties: linear anisotropic tensor, lamination
//! descriptor, B-H sample table, and wire descriptor.

use serde::{Deserialize, Serialize};

/// Which sheet/strand direction a laminated core is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LamType {
    /// Laminations lie in the xy (or rz) plane (`LamType=0`).
    InPlane,
    /// Stacked along x (`LamType=1`).
    StackX,
    /// Stacked along y (`LamType=2`).
    StackY,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lamination {
    pub lam_type: LamType,
    /// Fraction of the block's volume occupied by the magnetic lamina
    /// (the rest is air).
    pub fill_factor: f64,
    /// Lamina thickness, mm.
    pub thickness_mm: f64,
    /// Hysteresis lag angle, degrees.
    pub hysteresis_angle_deg: f64,
}

/// Stranded-conductor descriptor for proximity-effect permeability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WireDescriptor {
    pub is_foil: bool,
    pub strand_diameter_mm: f64,
    pub strand_count: u32,
}

/// A monotone B-H sample table. `samples[0]` must be `(0.0, 0.0)`;
/// invariant checked at construction. Serialized/deserialized
/// via the raw sample vector through `TryFrom` so a JSON problem descriptor
/// can't smuggle in an invalid curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<(f64, f64)>", into = "Vec<(f64, f64)>")]
pub struct BhCurve {
    samples: Vec<(f64, f64)>,
}

impl BhCurve {
    /// Build a validated curve: at least two points, strictly increasing in
    /// both B and H, starting at the origin.
    pub fn new(samples: Vec<(f64, f64)>) -> Result<Self, String> {
        if samples.len() < 2 {
            return Err("B-H curve needs at least 2 samples".to_string());
        }
        let (b0, h0) = samples[0];
        if b0.abs() > 1e-12 || h0.abs() > 1e-12 {
            return Err("B-H curve must start at (B, H) = (0, 0)".to_string());
        }
        for w in samples.windows(2) {
            let (b_prev, h_prev) = w[0];
            let (b_next, h_next) = w[1];
            if b_next <= b_prev || h_next <= h_prev {
                return Err("B-H curve samples must be strictly monotone increasing".to_string());
            }
        }
        Ok(Self { samples })
    }

    pub fn samples(&self) -> &[(f64, f64)] {
        &self.samples
    }
}

impl TryFrom<Vec<(f64, f64)>> for BhCurve {
    type Error = String;

    fn try_from(samples: Vec<(f64, f64)>) -> Result<Self, Self::Error> {
        BhCurve::new(samples)
    }
}

impl From<BhCurve> for Vec<(f64, f64)> {
    fn from(curve: BhCurve) -> Self {
        curve.samples
    }
}

/// A block (material) property. Anisotropic tensor `(kx, ky)` means
/// `1/mu` in magnetics, `epsilon` in electrostatics, `k` (thermal
/// conductivity) in heat flow; which interpretation applies is determined
/// by the regime the assembler is running, not by this struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockProp {
    pub kx: f64,
    pub ky: f64,
    /// Rotation of the (kx, ky) axes relative to the global frame, degrees.
    pub theta_deg: f64,
    /// Bulk conductivity, S/m (magnetics eddy-current terms only).
    pub sigma: f64,
    /// Permanent-magnet coercivity components in material axes, A/m
    /// (magnetostatics only; zero for non-magnet materials).
    pub hc_x: f64,
    pub hc_y: f64,
    /// Volumetric source density: current density (magnetics), volume
    /// charge (electrostatics), or volumetric heat generation (heat flow).
    pub volume_source: f64,
    pub lamination: Option<Lamination>,
    pub bh_curve: Option<BhCurve>,
    pub wire: Option<WireDescriptor>,
}

impl BlockProp {
    /// A simple linear isotropic material with no lamination, B-H table, or
    /// wire descriptor — the common case for air, simple dielectrics, and
    /// bulk conductors.
    pub fn linear_isotropic(k: f64) -> Self {
        Self {
            kx: k,
            ky: k,
            theta_deg: 0.0,
            sigma: 0.0,
            hc_x: 0.0,
            hc_y: 0.0,
            volume_source: 0.0,
            lamination: None,
            bh_curve: None,
            wire: None,
        }
    }

    pub fn is_nonlinear(&self) -> bool {
        self.bh_curve.is_some()
    }

    pub fn is_wound(&self) -> bool {
        self.wire.is_some()
            || matches!(
                self.lamination,
                Some(Lamination {
                    lam_type: LamType::StackX | LamType::StackY,
                    ..
                })
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_isotropic_has_no_nonlinearity() {
        let m = BlockProp::linear_isotropic(2.5);
        assert!(!m.is_nonlinear());
        assert_eq!(m.kx, m.ky);
    }

    #[test]
    fn bh_curve_rejects_nonzero_origin() {
        let result = BhCurve::new(vec![(0.0, 1.0), (1.0, 2.0)]);
        assert!(result.is_err());
    }

    #[test]
    fn bh_curve_rejects_non_monotone_samples() {
        let result = BhCurve::new(vec![(0.0, 0.0), (1.0, 2.0), (0.5, 3.0)]);
        assert!(result.is_err());
    }

    #[test]
    fn bh_curve_accepts_valid_table() {
        let curve = BhCurve::new(vec![(0.0, 0.0), (1.0, 100.0), (2.0, 400.0)]).unwrap();
        assert_eq!(curve.samples().len(), 3);
    }
}
