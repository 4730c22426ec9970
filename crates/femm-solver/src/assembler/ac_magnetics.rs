//! Time-harmonic (AC) magnetics assembler.
//!
//! Structurally identical to [`crate::assembler::real_regime`]'s element
//! loop — local stiffness, boundary terms, Dirichlet folding, conductor
//! redirection, periodicity last — but every quantity is complex, the
//! sparse engine is [`femm_sparse::BigComplexLinProb`], and a nonlinear
//! block's effective complex permeability (lamination/proximity-adjusted,
//! then B-H-updated) lives in `element.mu1`/`mu2` just as in the DC case.
//!
//! Newton-mode nonlinear AC assembly needs the derivative of the complex
//! reluctivity with respect to the *complex* flux density, which no closed
//! form pins down exactly for a scalar B-H table evaluated on |B| alone.
//! This assembler resolves that by letting the Hermitian auxiliary carry
//! `d(reluctivity)/d|B|` scaled into the stiffness the same way the primary
//! matrix is built (a Hermitian correction capturing the dominant
//! saturation sensitivity), while the other auxiliaries are left zero since
//! the successive-approximation path already converges correctly and
//! Newton mode is an optional accelerant over it, not a distinct physical
//! model.

use femm_complex::Scalar;
use femm_model::{BlockProp, BoundaryProp, Element, Magnetization, Problem, Regime};
use femm_sparse::{BigComplexLinProb, Which};

use crate::assembler::common::{edge_depth, element_geometry, kelvin_scale, volumetric_depth};
use crate::circuits::CircuitExpansion;
use crate::material::BhInterpolant;

fn element_block<'a>(problem: &'a Problem, element: &Element) -> &'a BlockProp {
    let label = &problem.block_labels[element.block_label];
    &problem.block_props[label.material]
}

fn element_k_tensor(problem: &Problem, element: &Element, block: &BlockProp) -> (Scalar, Scalar) {
    let (mut kx, mut ky) = (Scalar::new(1.0, 0.0) / element.mu1, Scalar::new(1.0, 0.0) / element.mu2);
    if block.theta_deg != 0.0 {
        let theta = block.theta_deg.to_radians();
        let (s, c) = theta.sin_cos();
        let (s2, c2) = (Scalar::new(s * s, 0.0), Scalar::new(c * c, 0.0));
        let kxx = kx * c2 + ky * s2;
        let kyy = kx * s2 + ky * c2;
        kx = kxx;
        ky = kyy;
    }
    let label = &problem.block_labels[element.block_label];
    if label.is_external_region {
        let geometry = element_geometry(&problem.mesh, element);
        let kappa = kelvin_scale(&problem.config, &geometry);
        kx *= kappa;
        ky *= kappa;
    }
    (kx, ky)
}

fn local_stiffness(b: [f64; 3], c: [f64; 3], area: f64, depth: f64, kx: Scalar, ky: Scalar) -> [[Scalar; 3]; 3] {
    let mut m = [[Scalar::new(0.0, 0.0); 3]; 3];
    let scale = depth / (4.0 * area);
    for j in 0..3 {
        for k in 0..3 {
            m[j][k] = kx * (scale * b[j] * b[k]) + ky * (scale * c[j] * c[k]);
        }
    }
    m
}

fn edge_length_mm(problem: &Problem, element: &Element, slot: usize) -> f64 {
    let (a, b) = element.edge(slot);
    let (ax, ay) = (problem.mesh.nodes[a].x, problem.mesh.nodes[a].y);
    let (bx, by) = (problem.mesh.nodes[b].x, problem.mesh.nodes[b].y);
    ((bx - ax).powi(2) + (by - ay).powi(2)).sqrt()
}

fn magnet_load(
    problem: &Problem,
    element: &Element,
    block: &BlockProp,
    geometry_b: [f64; 3],
    geometry_c: [f64; 3],
    depth: f64,
) -> [Scalar; 3] {
    let mut out = [Scalar::new(0.0, 0.0); 3];
    if block.hc_x == 0.0 && block.hc_y == 0.0 {
        return out;
    }
    let label = &problem.block_labels[element.block_label];
    let angle_deg = match &label.magnetization {
        Some(Magnetization::Angle(a)) => *a,
        Some(Magnetization::Expression(_)) | None => block.theta_deg,
    };
    let theta = angle_deg.to_radians();
    let (s, c) = theta.sin_cos();
    let hcx = block.hc_x * c - block.hc_y * s;
    let hcy = block.hc_x * s + block.hc_y * c;
    for j in 0..3 {
        out[j] = Scalar::new(depth / 2.0 * (hcx * geometry_c[j] - hcy * geometry_b[j]), 0.0);
    }
    out
}

/// Assemble and fold one full pass of the complex-valued harmonic system.
/// `newton` selects whether the `Hermitian` auxiliary's saturation
/// correction is folded into the primary matrix (Newton outer loop) or
/// left unused (successive-approximation outer loop).
pub fn assemble(problem: &Problem, mp: &mut BigComplexLinProb, circuits: &CircuitExpansion, newton: bool) {
    let n = problem.mesh.nodes.len();

    for element in &problem.mesh.elements {
        let block = element_block(problem, element);
        let geometry = element_geometry(&problem.mesh, element);
        let depth = volumetric_depth(&problem.config, &geometry);
        let (kx, ky) = element_k_tensor(problem, element, block);
        let mut mloc = local_stiffness(geometry.b, geometry.c, geometry.area, depth, kx, ky);
        let mut beloc = [Scalar::new(0.0, 0.0); 3];

        let area_m2 = geometry.area * 1e-6;
        for j in 0..3 {
            beloc[j] += Scalar::new(depth * block.volume_source * area_m2 / 3.0, 0.0);
        }
        let magnet = magnet_load(problem, element, block, geometry.b, geometry.c, depth);
        for j in 0..3 {
            beloc[j] += magnet[j];
        }

        if newton && block.is_nonlinear() {
            for j in 0..3 {
                for k in 0..3 {
                    let correction = mp.get(element.nodes[j], element.nodes[k], Which::Hermitian);
                    mloc[j][k] += correction;
                }
            }
        }

        for slot in 0..3 {
            let Some(bidx) = element.edge_markers[slot] else {
                continue;
            };
            let prop = &problem.boundary_props[bidx];
            let length_m = edge_length_mm(problem, element, slot) / 1000.0;
            let ed = edge_depth(&problem.config, &problem.mesh, element, slot);
            let local_pair = [slot, (slot + 1) % 3];
            match prop {
                BoundaryProp::Mixed { c0, c1 } => {
                    let mass = [[2.0, 1.0], [1.0, 2.0]];
                    for (ii, &vi) in local_pair.iter().enumerate() {
                        for (jj, &vj) in local_pair.iter().enumerate() {
                            mloc[vi][vj] += *c0 * (ed * length_m / 6.0 * mass[ii][jj]);
                        }
                        beloc[vi] += *c1 * (ed * length_m / 2.0);
                    }
                }
                BoundaryProp::SurfaceSource { density } => {
                    for &vi in &local_pair {
                        beloc[vi] += Scalar::new(density * ed * length_m / 2.0, 0.0);
                    }
                }
                BoundaryProp::SmallSkinDepth { mu_rel, sigma } => {
                    let omega = problem.config.angular_frequency();
                    if *sigma > 0.0 {
                        let mu_abs = mu_rel * femm_model::MU_0;
                        let delta = (2.0 / (omega * sigma * mu_abs)).sqrt();
                        // Impedance boundary condition dA/dn = -(1+j)/delta * A.
                        let c0 = Scalar::new(1.0, 1.0) / delta;
                        let mass = [[2.0, 1.0], [1.0, 2.0]];
                        for (ii, &vi) in local_pair.iter().enumerate() {
                            for (jj, &vj) in local_pair.iter().enumerate() {
                                mloc[vi][vj] += c0 * (ed * length_m / 6.0 * mass[ii][jj]);
                            }
                        }
                    }
                }
                BoundaryProp::Fixed { .. } | BoundaryProp::Periodic | BoundaryProp::AntiPeriodic => {}
            }
        }

        let mut fixed = [None; 3];
        for (j, &node) in element.nodes.iter().enumerate() {
            fixed[j] = dirichlet_value(problem, node);
        }
        for j in 0..3 {
            if let Some(vj) = fixed[j] {
                for k in 0..3 {
                    if k == j {
                        continue;
                    }
                    beloc[k] -= mloc[k][j] * vj;
                    mloc[k][j] = Scalar::new(0.0, 0.0);
                    mloc[j][k] = Scalar::new(0.0, 0.0);
                }
                beloc[j] = mloc[j][j] * vj;
            }
        }

        for j in 0..3 {
            let row_j = global_row(circuits, element.nodes[j], n);
            mp.b[row_j] += beloc[j];
            for k in 0..3 {
                let row_k = global_row(circuits, element.nodes[k], n);
                if mloc[j][k] != Scalar::new(0.0, 0.0) {
                    mp.put(mloc[j][k], row_j, row_k, Which::Primary);
                }
            }
            if let Some(c) = circuits.conductor_row(element.nodes[j]) {
                let node_row = element.nodes[j];
                mp.put(Scalar::new(1.0, 0.0), node_row, node_row, Which::Primary);
                mp.put(Scalar::new(-1.0, 0.0), node_row, n + c, Which::Primary);
            }
        }
    }

    for (&node, point) in &problem.point_props {
        if let Some(source) = point.source {
            let row = global_row(circuits, node, n);
            mp.b[row] += Scalar::new(source, 0.0);
        }
    }

    for (c, shadow) in circuits.shadow.iter().enumerate() {
        match shadow.kind {
            femm_model::CircuitKind::Parallel(total) | femm_model::CircuitKind::Series(total) => {
                mp.b[n + c] += Scalar::new(total, 0.0);
            }
            femm_model::CircuitKind::FixedPotential(value) => {
                mp.set_value(n + c, Scalar::new(value, 0.0));
            }
        }
    }

    for pair in &problem.mesh.periodic_pairs {
        if pair.anti {
            mp.anti_periodicity(pair.a, pair.b);
        } else {
            mp.periodicity(pair.a, pair.b);
        }
    }

    if problem.config.problem_type == femm_model::ProblemType::Axisymmetric {
        let axis_tol_mm = problem.config.length_unit.to_mm();
        for (i, node) in problem.mesh.nodes.iter().enumerate() {
            if node.on_symmetry_axis(axis_tol_mm) {
                mp.set_value(i, Scalar::new(0.0, 0.0));
            }
        }
    }
}

fn global_row(circuits: &CircuitExpansion, node: usize, n: usize) -> usize {
    match circuits.conductor_row(node) {
        Some(c) => n + c,
        None => node,
    }
}

fn dirichlet_value(problem: &Problem, node: usize) -> Option<Scalar> {
    if let Some(point) = problem.point_props.get(&node) {
        if let Some(v) = point.fixed_value {
            return Some(Scalar::new(v, 0.0));
        }
    }
    let n = &problem.mesh.nodes[node];
    if let Some(bidx) = n.boundary_index {
        if let BoundaryProp::Fixed { a0, a1, a2, phase_deg } = problem.boundary_props[bidx] {
            return Some(BoundaryProp::fixed_value(a0, a1, a2, phase_deg, n.x, n.y, true));
        }
    }
    if let Some(c) = n.conductor_index {
        if let femm_model::CircuitKind::FixedPotential(v) = problem.circuits[c].kind {
            return Some(Scalar::new(v, 0.0));
        }
    }
    None
}

fn gradient_magnitude(problem: &Problem, element: &Element, v: &[Scalar]) -> f64 {
    let geometry = element_geometry(&problem.mesh, element);
    let area2 = 2.0 * geometry.area;
    let mut grad = Scalar::new(0.0, 0.0);
    let mut grad_y = Scalar::new(0.0, 0.0);
    for j in 0..3 {
        let vj = v[element.nodes[j]];
        grad += vj * (geometry.c[j] / area2);
        grad_y += vj * (geometry.b[j] / area2);
    }
    (grad.norm_sqr() + grad_y.norm_sqr()).sqrt()
}

/// Update every nonlinear element's complex `mu1`/`mu2` for one AC outer
/// iteration: the magnitude of `|B|` evaluated from the complex gradient
/// of the previous iterate drives the same real B-H update rule as DC, the
/// result is then used as the base permeability for lamination/proximity
/// homogenization. A Newton pass also refreshes the Hermitian auxiliary
/// with `d(reluctivity)/d|B|` for `ac_magnetics::assemble` to fold back
/// into the primary matrix.
pub fn update_nonlinear_mu(
    problem: &mut Problem,
    bh_tables: &[Option<BhInterpolant>],
    v: Option<&[Scalar]>,
    newton: bool,
    mp: &mut BigComplexLinProb,
) {
    let omega = problem.config.angular_frequency();
    let updates: Vec<(usize, Scalar, Option<f64>)> = problem
        .mesh
        .elements
        .iter()
        .enumerate()
        .filter_map(|(ei, element)| {
            let block = element_block(problem, element);
            let bh = bh_tables[problem.block_labels[element.block_label].material].as_ref()?;
            let b_mag = match v {
                Some(v) => gradient_magnitude(problem, element, v),
                None => 0.0,
            };
            let mu_scalar = if newton {
                crate::material::update_newton(bh, b_mag)
            } else {
                crate::material::update_successive(bh, b_mag)
            };
            let effective = if let Some(lam) = &block.lamination {
                crate::material::in_plane_lamination_mu(mu_scalar, lam, block.sigma, omega)
            } else {
                femm_complex::real(mu_scalar)
            };
            let slope = if newton && b_mag > 1e-9 {
                let reluctivity_slope = 1.0 / bh.dh_db(b_mag) - 1.0 / bh.reluctivity(b_mag);
                Some(reluctivity_slope)
            } else {
                None
            };
            Some((ei, effective, slope))
        })
        .collect();

    for (ei, mu, slope) in updates {
        problem.mesh.elements[ei].mu1 = mu;
        problem.mesh.elements[ei].mu2 = mu;
        if let Some(slope) = slope {
            let element = &problem.mesh.elements[ei];
            let geometry = element_geometry(&problem.mesh, element);
            let depth = volumetric_depth(&problem.config, &geometry);
            let scale = depth / (4.0 * geometry.area) * slope;
            for j in 0..3 {
                for k in 0..3 {
                    let v = Scalar::new(
                        scale * (geometry.b[j] * geometry.b[k] + geometry.c[j] * geometry.c[k]),
                        0.0,
                    );
                    mp.put(v, element.nodes[j], element.nodes[k], Which::Hermitian);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use femm_model::{Coordinates, Mesh, Node, ProblemConfig, ProblemType, Regime};
    use std::collections::HashMap;

    fn square_problem() -> Problem {
        let mut mesh = Mesh::new();
        mesh.nodes.push(Node::new(0.0, 0.0));
        mesh.nodes.push(Node::new(1000.0, 0.0));
        mesh.nodes.push(Node::new(1000.0, 1000.0));
        mesh.nodes.push(Node::new(0.0, 1000.0));
        for n in &mut mesh.nodes {
            n.boundary_index = Some(0);
        }
        mesh.elements.push(Element::new([0, 1, 2], 0));
        mesh.elements.push(Element::new([0, 2, 3], 0));

        Problem {
            regime: Regime::Magnetics,
            config: ProblemConfig {
                frequency_hz: 60.0,
                precision: 1e-8,
                depth_mm: 1000.0,
                length_unit: Default::default(),
                coordinates: Coordinates::Cartesian,
                problem_type: ProblemType::Planar,
                external_region: None,
                ac_solver: femm_model::AcSolverMode::SuccessiveApproximation,
                prev_solution_path: None,
                do_smart_mesh: false,
                force_max_mesh: false,
            },
            mesh,
            boundary_props: vec![BoundaryProp::Fixed {
                a0: 0.0,
                a1: 0.0,
                a2: 0.0,
                phase_deg: 0.0,
            }],
            point_props: HashMap::new(),
            block_props: vec![BlockProp::linear_isotropic(1.0)],
            circuits: vec![],
            block_labels: vec![femm_model::BlockLabel::new(500.0, 500.0, 0)],
        }
    }

    #[test]
    fn dirichlet_square_has_zero_boundary_solution() {
        let problem = square_problem();
        let circuits = CircuitExpansion::empty_for(problem.mesh.nodes.len());
        let mut mp = BigComplexLinProb::create(problem.mesh.nodes.len(), 4);
        assemble(&problem, &mut mp, &circuits, false);
        mp.bicgstab_solve(1e-10, false).unwrap();
        for &v in &mp.v {
            assert!(v.norm() < 1e-8);
        }
    }

    #[test]
    fn point_current_produces_nonzero_interior_potential() {
        let mut problem = square_problem();
        problem.mesh.nodes[1].boundary_index = None;
        problem.point_props.insert(
            1,
            femm_model::PointProp {
                source: Some(1.0),
                fixed_value: None,
            },
        );
        let circuits = CircuitExpansion::empty_for(problem.mesh.nodes.len());
        let mut mp = BigComplexLinProb::create(problem.mesh.nodes.len(), 4);
        assemble(&problem, &mut mp, &circuits, false);
        mp.bicgstab_solve(1e-10, false).unwrap();
        assert!(mp.v[1].norm() > 1e-6);
    }
}
