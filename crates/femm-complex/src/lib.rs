//! Complex scalar arithmetic for the time-harmonic (AC) regimes.
//!
//! Magnetostatics and electrostatics only ever need real scalars; harmonic
//! magnetics needs a complex vector potential and a handful of transcendental
//! helpers (principal square root, `tanh`) for the lamination and proximity-
//! effect permeability formulas in the material model. Rather than hand-roll
//! a `(re, im)` struct, this crate is a thin wrapper over `num_complex`, which
//! already gives us a field-correct `Complex64` plus the transcendentals via
//! its `ComplexFloat` inherent impls.

pub use num_complex::Complex64;

/// The scalar type used throughout the AC assembler, sparse engine, and
/// material model. A type alias rather than a re-export of `Complex64`
/// directly so call sites read `femm_complex::Scalar` the way the rest of
/// the workspace reads `femm_model::Node`.
pub type Scalar = Complex64;

/// `i`, spelled out because `Scalar::i()` reads oddly at assembler call
/// sites that mix it with plain floating point literals.
pub fn j() -> Scalar {
    Scalar::new(0.0, 1.0)
}

/// `Scalar::new(x, 0.0)` spelled out for the same reason.
pub fn real(x: f64) -> Scalar {
    Scalar::new(x, 0.0)
}

/// Principal branch complex square root (`num_complex::Complex::sqrt` is
/// already principal-branch; this wrapper exists so assembler code never
/// has to remember that fact, and so a different branch cut can be swapped
/// in later without touching call sites).
pub fn csqrt(z: Scalar) -> Scalar {
    z.sqrt()
}

/// `tanh(z)/z`, the shape the lamination and round-strand proximity-effect
/// formulas in the material model both need (`c*tanh(c*d/2)/(c*d/2)`-style
/// expressions). Guards the removable singularity at `z == 0` where the
/// limit is exactly 1.
pub fn tanh_over_z(z: Scalar) -> Scalar {
    if z.norm() < 1e-12 {
        real(1.0)
    } else {
        z.tanh() / z
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqrt_is_principal_branch() {
        let z = csqrt(real(-1.0));
        assert!((z.re).abs() < 1e-12);
        assert!((z.im - 1.0).abs() < 1e-12);
    }

    #[test]
    fn tanh_over_z_limit_at_zero() {
        let z = tanh_over_z(real(0.0));
        assert!((z.re - 1.0).abs() < 1e-9);
        assert!(z.im.abs() < 1e-9);
    }

    #[test]
    fn tanh_over_z_matches_direct_division_away_from_zero() {
        let z = Scalar::new(0.3, 0.2);
        let a = tanh_over_z(z);
        let b = z.tanh() / z;
        assert!((a - b).norm() < 1e-12);
    }
}
