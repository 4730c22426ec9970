//! Real-valued assembler shared by magnetostatic DC, electrostatics, and
//! heat flow. The three regimes differ only in how `BlockProp::kx/ky` is
//! interpreted (reluctivity / permittivity / conductivity), whether a
//! permanent-magnet source applies, and which per-element scratch holds the
//! current nonlinear coefficient; the element-loop skeleton — local
//! stiffness, local load, boundary terms, Dirichlet folding, conductor
//! redirection — is identical, so the assembler is parameterized on this
//! one discriminant rather than duplicated three ways.

use femm_model::{BlockProp, BoundaryProp, Element, Magnetization, Problem, Regime};
use femm_sparse::BigLinProb;

use crate::assembler::common::{edge_depth, element_geometry, kelvin_scale, mm2_to_m2, volumetric_depth};
use crate::circuits::CircuitExpansion;
use crate::material::BhInterpolant;

fn element_block<'a>(problem: &'a Problem, element: &Element) -> &'a BlockProp {
    let label = &problem.block_labels[element.block_label];
    &problem.block_props[label.material]
}

/// Per-element reluctivity/permittivity/conductivity tensor, already
/// rotated into the global frame and Kelvin-scaled if applicable. For a
/// nonlinear magnetics block the outer loop has already written the
/// current effective permeability into `element.mu1`/`mu2`; every other
/// case reads the tensor straight off `BlockProp`.
fn element_k_tensor(problem: &Problem, element: &Element, block: &BlockProp) -> (f64, f64) {
    let (mut kx, mut ky) = match problem.regime {
        Regime::Magnetics if block.is_nonlinear() => (1.0 / element.mu1.re, 1.0 / element.mu2.re),
        _ => (block.kx, block.ky),
    };
    if block.theta_deg != 0.0 {
        let theta = block.theta_deg.to_radians();
        let (s, c) = theta.sin_cos();
        let kxx = kx * c * c + ky * s * s;
        let kyy = kx * s * s + ky * c * c;
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

fn local_stiffness(b: [f64; 3], c: [f64; 3], area: f64, depth: f64, kx: f64, ky: f64) -> [[f64; 3]; 3] {
    let mut m = [[0.0; 3]; 3];
    let scale = depth / (4.0 * area);
    for j in 0..3 {
        for k in 0..3 {
            m[j][k] = scale * (kx * b[j] * b[k] + ky * c[j] * c[k]);
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

/// Permanent-magnet source: `Depth/2 * (Hcx*c[j] - Hcy*b[j])`, the weak
/// form of `curl(M)` against a vertex shape function (`dN_j/dy = c[j]/2A`,
/// `dN_j/dx = b[j]/2A`, the element area cancelling the integral's area
/// element). `Hc` is rotated by the block label's magnetization angle when
/// set, falling back to the material's own axis rotation otherwise; a
/// string-expression magnetization is left unevaluated (expression
/// evaluation is out of scope, as with the model's `Magnetization` carrier
/// itself).
fn magnet_load(
    problem: &Problem,
    element: &Element,
    block: &BlockProp,
    geometry_b: [f64; 3],
    geometry_c: [f64; 3],
    depth: f64,
) -> [f64; 3] {
    let mut out = [0.0; 3];
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
        out[j] = depth / 2.0 * (hcx * geometry_c[j] - hcy * geometry_b[j]);
    }
    out
}

/// Assemble and fold one full pass of the real-valued system's per-iteration
/// element loop; the nonlinear mu update itself is the outer loop's job via
/// `update_nonlinear_mu`, which writes `element.mu1`/`mu2` before this runs.
pub fn assemble(problem: &Problem, mp: &mut BigLinProb, circuits: &CircuitExpansion) {
    let n = problem.mesh.nodes.len();

    for element in &problem.mesh.elements {
        let block = element_block(problem, element);
        let geometry = element_geometry(&problem.mesh, element);
        let depth = volumetric_depth(&problem.config, &geometry);
        let (kx, ky) = element_k_tensor(problem, element, block);
        let mut mloc = local_stiffness(geometry.b, geometry.c, geometry.area, depth, kx, ky);
        let mut beloc = [0.0; 3];

        let area_m2 = mm2_to_m2(geometry.area);
        for j in 0..3 {
            beloc[j] += depth * block.volume_source * area_m2 / 3.0;
        }
        if problem.regime == Regime::Magnetics {
            let magnet = magnet_load(problem, element, block, geometry.b, geometry.c, depth);
            for j in 0..3 {
                beloc[j] += magnet[j];
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
                    let c0 = c0.re;
                    let c1 = c1.re;
                    let mass = [[2.0, 1.0], [1.0, 2.0]];
                    for (ii, &vi) in local_pair.iter().enumerate() {
                        for (jj, &vj) in local_pair.iter().enumerate() {
                            mloc[vi][vj] += c0 * ed * length_m / 6.0 * mass[ii][jj];
                        }
                        beloc[vi] += c1 * ed * length_m / 2.0;
                    }
                }
                BoundaryProp::SurfaceSource { density } => {
                    for &vi in &local_pair {
                        beloc[vi] += density * ed * length_m / 2.0;
                    }
                }
                BoundaryProp::SmallSkinDepth { mu_rel, sigma } => {
                    let omega = problem.config.angular_frequency();
                    if omega > 0.0 && *sigma > 0.0 {
                        let delta = (2.0 / (omega * sigma * mu_rel * femm_model::MU_0)).sqrt();
                        let c0 = 1.0 / delta;
                        let mass = [[2.0, 1.0], [1.0, 2.0]];
                        for (ii, &vi) in local_pair.iter().enumerate() {
                            for (jj, &vj) in local_pair.iter().enumerate() {
                                mloc[vi][vj] += c0 * ed * length_m / 6.0 * mass[ii][jj];
                            }
                        }
                    }
                }
                BoundaryProp::Fixed { .. } | BoundaryProp::Periodic | BoundaryProp::AntiPeriodic => {}
            }
        }

        // Fold Dirichlet vertices.
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
                    mloc[k][j] = 0.0;
                    mloc[j][k] = 0.0;
                }
                beloc[j] = mloc[j][j] * vj;
            }
        }

        // Fold into the global matrix, redirecting conductor-member
        // vertices to their shadow row `N + c`.
        for j in 0..3 {
            let row_j = global_row(circuits, element.nodes[j], n);
            mp.b[row_j] += beloc[j];
            for k in 0..3 {
                let row_k = global_row(circuits, element.nodes[k], n);
                if mloc[j][k] != 0.0 {
                    mp.put(mloc[j][k], row_j, row_k);
                }
            }
            if let Some(c) = circuits.conductor_row(element.nodes[j]) {
                let node_row = element.nodes[j];
                mp.put(1.0, node_row, node_row);
                mp.put(-1.0, node_row, n + c);
            }
        }
    }

    // Point sources. Fixed-value points are already folded above via
    // `dirichlet_value`; only the source term is new here.
    for (&node, point) in &problem.point_props {
        if let Some(source) = point.source {
            let row = global_row(circuits, node, n);
            mp.b[row] += source;
        }
    }

    // Shadow conductor excitation: every member node's own row was
    // redirected above into an identity tie
    // `V[node] - V[n+c] = 0`, so the conductor's prescribed total current/
    // charge/heat-flow or fixed potential belongs on row `n+c` itself.
    for (c, shadow) in circuits.shadow.iter().enumerate() {
        match shadow.kind {
            femm_model::CircuitKind::Parallel(total) | femm_model::CircuitKind::Series(total) => {
                mp.b[n + c] += total;
            }
            femm_model::CircuitKind::FixedPotential(value) => {
                mp.set_value(n + c, value);
            }
        }
    }

    // Periodicity/anti-periodicity, applied last.
    for pair in &problem.mesh.periodic_pairs {
        if pair.anti {
            mp.anti_periodicity(pair.a, pair.b);
        } else {
            mp.periodicity(pair.a, pair.b);
        }
    }

    // Axisymmetric on-axis fix-up: the solution is forced to zero on the
    // symmetry axis.
    if problem.config.problem_type == femm_model::ProblemType::Axisymmetric
        && matches!(problem.regime, Regime::Magnetics | Regime::Electrostatics)
    {
        let axis_tol_mm = problem.config.length_unit.to_mm();
        for (i, node) in problem.mesh.nodes.iter().enumerate() {
            if node.on_symmetry_axis(axis_tol_mm) {
                mp.set_value(i, 0.0);
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

fn dirichlet_value(problem: &Problem, node: usize) -> Option<f64> {
    if let Some(point) = problem.point_props.get(&node) {
        if let Some(v) = point.fixed_value {
            return Some(v);
        }
    }
    let n = &problem.mesh.nodes[node];
    if let Some(bidx) = n.boundary_index {
        if let BoundaryProp::Fixed { a0, a1, a2, .. } = problem.boundary_props[bidx] {
            return Some(a0 + a1 * n.x + a2 * n.y);
        }
    }
    if let Some(c) = n.conductor_index {
        if let femm_model::CircuitKind::FixedPotential(v) = problem.circuits[c].kind {
            return Some(v);
        }
    }
    None
}

/// `|grad(phi)|`-style magnitude used by the outer loop to evaluate the
/// B-H curve at the current element from the previous solution.
pub fn gradient_magnitude(problem: &Problem, element: &Element, v: &[f64]) -> f64 {
    let geometry = element_geometry(&problem.mesh, element);
    let area2 = 2.0 * geometry.area;
    let mut gx = 0.0;
    let mut gy = 0.0;
    for j in 0..3 {
        let vj = v[element.nodes[j]];
        gx += geometry.c[j] * vj / area2;
        gy += geometry.b[j] * vj / area2;
    }
    (gx * gx + gy * gy).sqrt()
}

/// Update every nonlinear magnetics element's `mu1`/`mu2` scratch in place
/// for one outer-loop iteration, given the previous solution `v` (`None` on
/// the trivial-start first iteration, which starts from `|B| = 0`
/// everywhere) and the AC-solver mode request.
pub fn update_nonlinear_mu(
    problem: &mut Problem,
    bh_tables: &[Option<BhInterpolant>],
    v: Option<&[f64]>,
    newton: bool,
) {
    let elements: Vec<(usize, f64)> = problem
        .mesh
        .elements
        .iter()
        .enumerate()
        .filter_map(|(ei, element)| {
            let label = &problem.block_labels[element.block_label];
            bh_tables[label.material].as_ref()?;
            let b_mag = match v {
                Some(v) => gradient_magnitude(problem, element, v),
                None => 0.0,
            };
            Some((ei, b_mag))
        })
        .collect();

    for (ei, b_mag) in elements {
        let label = &problem.block_labels[problem.mesh.elements[ei].block_label];
        let bh = bh_tables[label.material].as_ref().expect("filtered above");
        let mu = if newton {
            crate::material::update_newton(bh, b_mag)
        } else {
            crate::material::update_successive(bh, b_mag)
        };
        problem.mesh.elements[ei].mu1 = femm_complex::real(mu);
        problem.mesh.elements[ei].mu2 = femm_complex::real(mu);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use femm_model::{Coordinates, Mesh, Node, ProblemConfig, ProblemType};
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
            regime: Regime::Electrostatics,
            config: ProblemConfig {
                frequency_hz: 0.0,
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
        let mut mp = BigLinProb::create(problem.mesh.nodes.len(), 4);
        assemble(&problem, &mut mp, &circuits);
        mp.pcg_solve(1e-10, false).unwrap();
        for &v in &mp.v {
            assert!(v.abs() < 1e-8);
        }
    }

    #[test]
    fn point_charge_produces_nonzero_interior_potential() {
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
        let mut mp = BigLinProb::create(problem.mesh.nodes.len(), 4);
        assemble(&problem, &mut mp, &circuits);
        mp.pcg_solve(1e-10, false).unwrap();
        assert!(mp.v[1].abs() > 1e-6);
    }
}
