//! Length units and the physical constants that depend on the chosen
//! internal unit.
//!
//! Some historical solvers in this family scale node coordinates to
//! millimeters, others to centimeters. This workspace picks millimeters as
//! the single internal unit, so the choice is one named constant
//! (`MAGNETIC_SCALE` below) rather than scattered literals, even though
//! `f64` arithmetic means nothing in this workspace actually needs to apply
//! it (see DESIGN.md).

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Units a `.fem`-family problem file may declare in `[lengthunits]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    Inches,
    Mils,
    #[default]
    Millimeters,
    Centimeters,
    Meters,
    Microns,
}

impl LengthUnit {
    /// Conversion factor from this unit to millimeters, the solver's
    /// internal working unit.
    pub fn to_mm(self) -> f64 {
        match self {
            LengthUnit::Inches => 25.4,
            LengthUnit::Mils => 0.0254,
            LengthUnit::Millimeters => 1.0,
            LengthUnit::Centimeters => 10.0,
            LengthUnit::Meters => 1000.0,
            LengthUnit::Microns => 0.001,
        }
    }

    /// Conversion factor from millimeters back to this unit, used by the
    /// solution writer to report coordinates in the user's original units.
    pub fn from_mm(self) -> f64 {
        1.0 / self.to_mm()
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inches" | "inch" => Some(LengthUnit::Inches),
            "mils" => Some(LengthUnit::Mils),
            "millimeters" | "mm" => Some(LengthUnit::Millimeters),
            "centimeters" | "cm" => Some(LengthUnit::Centimeters),
            "meters" | "m" => Some(LengthUnit::Meters),
            "microns" => Some(LengthUnit::Microns),
            _ => None,
        }
    }
}

/// Permeability of free space, H/m.
pub const MU_0: f64 = 4.0 * PI * 1e-7;

/// The conditioning factor `c = 4*pi*1e-5` a single-precision-era
/// magnetostatic assembler would scale the vector potential A by
/// internally, to keep the stiffness matrix's entries in a numerically
/// comfortable range for the CG preconditioner. Kept as a named constant
/// for reference; not applied anywhere in this workspace, since `f64`
/// arithmetic plus a Gauss-Seidel-preconditioned CG doesn't need it (see
/// DESIGN.md).
pub const MAGNETIC_SCALE: f64 = 4.0 * PI * 1e-5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_mm() {
        for unit in [
            LengthUnit::Inches,
            LengthUnit::Mils,
            LengthUnit::Millimeters,
            LengthUnit::Centimeters,
            LengthUnit::Meters,
            LengthUnit::Microns,
        ] {
            let mm = unit.to_mm();
            let back = mm * unit.from_mm();
            assert!((back - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn parses_known_names_case_insensitively() {
        assert_eq!(LengthUnit::parse("Millimeters"), Some(LengthUnit::Millimeters));
        assert_eq!(LengthUnit::parse("METERS"), Some(LengthUnit::Meters));
        assert_eq!(LengthUnit::parse("bogus"), None);
    }
}
