//! Material model: B-H interpolation, lamination and proximity-effect
//! permeability, and the per-element update rule the outer loop applies
//! every nonlinear iteration.

use femm_complex::{csqrt, real, tanh_over_z, Scalar};
use femm_model::material::{LamType, Lamination, WireDescriptor};
use femm_model::{BhCurve, MU_0};

/// A monotone cubic-Hermite interpolant over a B-H sample table, with
/// tangents clamped once at load time by the Fritsch-Carlson method so the
/// resulting curve never overshoots between samples: `dH/dB` stays positive
/// for `B > 0` everywhere on the curve.
#[derive(Debug, Clone)]
pub struct BhInterpolant {
    samples: Vec<(f64, f64)>,
    tangents: Vec<f64>,
}

impl BhInterpolant {
    pub fn build(curve: &BhCurve) -> Self {
        let samples = curve.samples().to_vec();
        let n = samples.len();
        let secants: Vec<f64> = (0..n - 1)
            .map(|k| {
                let (b0, h0) = samples[k];
                let (b1, h1) = samples[k + 1];
                (h1 - h0) / (b1 - b0)
            })
            .collect();

        let mut tangents = vec![0.0; n];
        tangents[0] = secants[0];
        tangents[n - 1] = secants[n - 2];
        for k in 1..n - 1 {
            tangents[k] = 0.5 * (secants[k - 1] + secants[k]);
        }
        for k in 0..n - 1 {
            let delta = secants[k];
            if delta == 0.0 {
                tangents[k] = 0.0;
                tangents[k + 1] = 0.0;
                continue;
            }
            let alpha = tangents[k] / delta;
            let beta = tangents[k + 1] / delta;
            let norm = alpha * alpha + beta * beta;
            if norm > 9.0 {
                let tau = 3.0 / norm.sqrt();
                tangents[k] = tau * alpha * delta;
                tangents[k + 1] = tau * beta * delta;
            }
        }

        Self { samples, tangents }
    }

    fn segment(&self, b: f64) -> usize {
        let n = self.samples.len();
        for k in 0..n - 1 {
            if b <= self.samples[k + 1].0 {
                return k;
            }
        }
        n - 2
    }

    /// `H(B)`; linear extrapolation beyond the last sample using its
    /// tangent.
    pub fn h(&self, b: f64) -> f64 {
        let n = self.samples.len();
        let (b_last, h_last) = self.samples[n - 1];
        if b > b_last {
            return h_last + self.tangents[n - 1] * (b - b_last);
        }
        let b = b.max(0.0);
        let k = self.segment(b);
        let (b0, h0) = self.samples[k];
        let (b1, h1) = self.samples[k + 1];
        let hk = b1 - b0;
        let t = (b - b0) / hk;
        let t2 = t * t;
        let t3 = t2 * t;
        let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h10 = t3 - 2.0 * t2 + t;
        let h01 = -2.0 * t3 + 3.0 * t2;
        let h11 = t3 - t2;
        h00 * h0 + h10 * hk * self.tangents[k] + h01 * h1 + h11 * hk * self.tangents[k + 1]
    }

    /// `dH/dB`, guaranteed positive for `B > 0` by the clamped tangents.
    pub fn dh_db(&self, b: f64) -> f64 {
        let n = self.samples.len();
        let (b_last, _) = self.samples[n - 1];
        if b > b_last {
            return self.tangents[n - 1];
        }
        let b = b.max(0.0);
        let k = self.segment(b);
        let (b0, _) = self.samples[k];
        let (b1, _) = self.samples[k + 1];
        let hk = b1 - b0;
        let t = (b - b0) / hk;
        let t2 = t * t;
        let dh00 = 6.0 * t2 - 6.0 * t;
        let dh10 = 3.0 * t2 - 4.0 * t + 1.0;
        let dh01 = -6.0 * t2 + 6.0 * t;
        let dh11 = 3.0 * t2 - 2.0 * t;
        (dh00 * self.samples[k].1 + dh10 * hk * self.tangents[k] + dh01 * self.samples[k + 1].1
            + dh11 * hk * self.tangents[k + 1])
            / hk
    }

    /// Reluctivity `nu(B) = H(B)/B`, with a short fallback near `B == 0`
    /// (the limit as `B -> 0` is the curve's initial tangent, `H'(0)`).
    pub fn reluctivity(&self, b: f64) -> f64 {
        if b.abs() < 1e-9 {
            self.tangents[0]
        } else {
            self.h(b) / b
        }
    }
}

/// Secant permeability `B / (mu0 * H(B))`, the "mu_rel" term of the
/// successive-approximation update.
pub fn secant_permeability(bh: &BhInterpolant, b_mag: f64) -> f64 {
    1.0 / (MU_0 * bh.reluctivity(b_mag))
}

/// Incremental permeability `1 / (mu0 * dH/dB(|B|))`, the "mu_inc" term.
pub fn incremental_permeability(bh: &BhInterpolant, b_mag: f64) -> f64 {
    1.0 / (MU_0 * bh.dh_db(b_mag))
}

/// Successive-approximation update: harmonic mean of the secant and
/// incremental permeabilities.
pub fn update_successive(bh: &BhInterpolant, b_mag: f64) -> f64 {
    let mu_rel = secant_permeability(bh, b_mag);
    let mu_inc = incremental_permeability(bh, b_mag);
    2.0 * mu_rel * mu_inc / (mu_rel + mu_inc)
}

/// Newton update: the incremental permeability directly, so the assembler
/// can build the directional-derivative auxiliaries from the same `dH/dB`.
pub fn update_newton(bh: &BhInterpolant, b_mag: f64) -> f64 {
    incremental_permeability(bh, b_mag)
}

/// In-plane lamination (`LamType::InPlane`) effective complex permeability.
/// The skin-effect correction factor is frequency-gated:
/// at `omega == 0` there is no eddy current to screen, so the effective
/// permeability is just the fill-weighted arithmetic mean of the lamina
/// and air; at `omega > 0` the lamina value is additionally scaled by the
/// complex factor `c * tanh(c*d/2)/(c*d/2)`.
pub fn in_plane_lamination_mu(mu_base: f64, lam: &Lamination, sigma: f64, omega: f64) -> Scalar {
    let f = lam.fill_factor;
    let air = real(MU_0);
    if omega <= 0.0 {
        return real(f * mu_base + (1.0 - f) * MU_0);
    }
    let theta_h = lam.hysteresis_angle_deg.to_radians();
    let phase = Scalar::from_polar(1.0, -theta_h / 2.0 + std::f64::consts::FRAC_PI_4);
    let c = csqrt(Scalar::new(0.0, omega * sigma * mu_base)) * phase;
    let d = lam.thickness_mm * 1e-3; // metres
    let factor = c * tanh_over_z(c * (d / 2.0));
    real(f) * real(mu_base) * factor + real(1.0 - f) * air
}

/// Stacked lamination (`LamType::StackX`/`StackY`) anisotropic
/// homogenization: harmonic mean across the stacking direction (series
/// reluctance through alternating lamina/air), arithmetic mean transverse
/// to it (parallel flux paths). Returns `(mu_x, mu_y)`. DC-only: the AC
/// assembler rejects these `LamType`s.
pub fn stacked_lamination_mu(mu_base: f64, lam: &Lamination) -> (f64, f64) {
    let f = lam.fill_factor;
    let harmonic = 1.0 / (f / mu_base + (1.0 - f) / MU_0);
    let arithmetic = f * mu_base + (1.0 - f) * MU_0;
    match lam.lam_type {
        LamType::StackX => (harmonic, arithmetic),
        LamType::StackY => (arithmetic, harmonic),
        LamType::InPlane => (mu_base, mu_base),
    }
}

/// Round-strand proximity-effect permeability. `turns` is the block label's
/// signed turns count (magnitude only matters here);
/// `block_area_mm2` is the summed element area of the block label.
pub fn round_strand_proximity_mu(
    wire: &WireDescriptor,
    sigma: f64,
    turns: f64,
    block_area_mm2: f64,
    omega: f64,
) -> Scalar {
    let r = wire.strand_diameter_mm / 2.0 * 1e-3; // metres
    let area_m2 = block_area_mm2 * 1e-6;
    let fa = (std::f64::consts::PI * r * r * wire.strand_count as f64 * turns.abs()) / area_m2;
    let omega_hat = omega * sigma * MU_0 * r * r / 2.0;
    let c1 = 0.7756 + fa * (0.6874 + fa * (0.0684 - 0.0714 * fa));
    let c2 = 1.5 * fa / c1;
    let z = csqrt(Scalar::new(0.0, c1 * omega_hat));
    real(c2) * tanh_over_z(z) + real(1.0 - c2)
}

/// Foil/rectangular-wire proximity-effect permeability: the same closed
/// form as in-plane lamination, keyed on strand (foil) thickness and a
/// fill factor from strand count over block area rather than a lamina
/// fill factor.
pub fn foil_proximity_mu(wire: &WireDescriptor, sigma: f64, omega: f64) -> Scalar {
    if omega <= 0.0 {
        return real(MU_0);
    }
    let d = wire.strand_diameter_mm * 1e-3;
    let c = csqrt(Scalar::new(0.0, omega * sigma * MU_0));
    real(MU_0) * c * tanh_over_z(c * (d / 2.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_curve() -> BhCurve {
        BhCurve::new(vec![
            (0.0, 0.0),
            (1.0, 200.0),
            (1.5, 1000.0),
            (1.8, 4000.0),
            (2.0, 20000.0),
        ])
        .unwrap()
    }

    #[test]
    fn dh_db_is_positive_everywhere() {
        let bh = BhInterpolant::build(&sample_curve());
        let mut b = 0.01;
        while b < 2.2 {
            assert!(bh.dh_db(b) > 0.0, "dH/dB must stay positive at B={b}");
            b += 0.05;
        }
    }

    #[test]
    fn interpolant_passes_through_samples() {
        let curve = sample_curve();
        let bh = BhInterpolant::build(&curve);
        for &(b, h) in curve.samples() {
            assert!((bh.h(b) - h).abs() < 1e-6);
        }
    }

    #[test]
    fn reluctivity_falls_back_near_zero() {
        let bh = BhInterpolant::build(&sample_curve());
        let nu0 = bh.reluctivity(0.0);
        let nu_small = bh.reluctivity(1e-7);
        assert!((nu0 - nu_small).abs() < 1e-3);
    }

    #[test]
    fn successive_update_is_between_secant_and_incremental() {
        let bh = BhInterpolant::build(&sample_curve());
        let b = 1.6;
        let mu_rel = secant_permeability(&bh, b);
        let mu_inc = incremental_permeability(&bh, b);
        let mu_new = update_successive(&bh, b);
        let (lo, hi) = if mu_rel < mu_inc {
            (mu_rel, mu_inc)
        } else {
            (mu_inc, mu_rel)
        };
        assert!(mu_new >= lo - 1e-9 && mu_new <= hi + 1e-9);
    }

    #[test]
    fn in_plane_lamination_reduces_to_fill_weighted_mean_at_dc() {
        let lam = Lamination {
            lam_type: LamType::InPlane,
            fill_factor: 0.95,
            thickness_mm: 0.35,
            hysteresis_angle_deg: 0.0,
        };
        let mu = in_plane_lamination_mu(1000.0 * MU_0, &lam, 2e6, 0.0);
        let expected = 0.95 * 1000.0 * MU_0 + 0.05 * MU_0;
        assert!((mu.re - expected).abs() < 1e-9);
        assert!(mu.im.abs() < 1e-12);
    }

    #[test]
    fn stacked_lamination_harmonic_mean_along_stacking_axis() {
        let lam = Lamination {
            lam_type: LamType::StackX,
            fill_factor: 0.9,
            thickness_mm: 0.3,
            hysteresis_angle_deg: 0.0,
        };
        let (mu_x, mu_y) = stacked_lamination_mu(500.0 * MU_0, &lam);
        assert!(mu_x < mu_y, "harmonic mean must be <= arithmetic mean");
    }

    #[test]
    fn round_strand_proximity_is_near_unity_at_low_frequency() {
        let wire = WireDescriptor {
            is_foil: false,
            strand_diameter_mm: 0.5,
            strand_count: 100,
        };
        let mu = round_strand_proximity_mu(&wire, 5.8e7, 50.0, 100.0, 1e-3);
        assert!((mu.re - 1.0).abs() < 0.2);
    }
}
