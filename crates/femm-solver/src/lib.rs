//! The solver-core driver: wires mesh loading, renumbering, element
//! assembly, the nonlinear outer loop, and the solution writer into a single
//! `run` entry point. `femm-cli` is a thin argument-parsing shell around it.

pub mod assembler;
pub mod circuits;
pub mod logger;
pub mod material;
pub mod outer_loop;
pub mod renumber;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use femm_complex::{real, Scalar};
use femm_io::{
    load_mesh, load_problem_descriptor, write_solution, CircuitResult, IoError, ProblemDescriptor,
    Solution, SolvedElement, SolvedNode,
};
use femm_model::{LamType, Problem, ProblemType};
use femm_sparse::SolveError;

pub use circuits::{expand_circuits, CircuitExpansion, ShadowConductor};
pub use logger::{Logger, RecordingLogger, StderrLogger};
pub use outer_loop::{solve_ac, solve_dc, OuterLoopConfig};
pub use renumber::{renumber, RenumberResult};

/// Driver-level error: the loader's file-format errors and the inner
/// solver's convergence failure pass through unchanged; the two remaining
/// kinds — rejecting on-edge lamination in a harmonic problem and an
/// incompatible previous-solution request — belong to the driver because
/// neither the assembler nor the loader alone has enough context to check
/// them.
#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    #[error(transparent)]
    Io(#[from] IoError),
    #[error("invalid problem: {0}")]
    InvalidProblem(String),
    #[error("on-edge lamination is not supported in a time-harmonic problem: block {0}")]
    OnEdgeLaminationInAc(usize),
    #[error("incompatible previous solution: {0}")]
    IncompatiblePreviousSolution(String),
    #[error(transparent)]
    Solve(#[from] SolveError),
}

pub type Result<T> = std::result::Result<T, SolverError>;

/// Reject stacked lamination (`LamType::StackX`/`StackY`) on any nonlinear
/// block when the problem is time-harmonic: the complex effective-mu
/// formulas for stacked laminations (`material::stacked_lamination_mu`) are
/// DC-only homogenizations, and the AC assembler has no other way to
/// account for a stacking axis.
pub fn validate_ac_lamination(problem: &Problem) -> Result<()> {
    if !problem.config.is_harmonic() {
        return Ok(());
    }
    for (i, block) in problem.block_props.iter().enumerate() {
        if let Some(lam) = &block.lamination {
            if matches!(lam.lam_type, LamType::StackX | LamType::StackY) {
                return Err(SolverError::OnEdgeLaminationInAc(i));
            }
        }
    }
    Ok(())
}

/// Reject a previous-solution (incremental-permeability) request the
/// single-step extension can't service: an axisymmetric harmonic problem
/// (the Kelvin-transform scaling and the lamination mu update would need to
/// be recomputed together in a way the extension doesn't model) or a
/// lamination with no fill factor, for which "incremental" permeability
/// reduces to the secant value anyway and carrying a previous solution adds
/// nothing.
pub fn validate_previous_solution(problem: &Problem) -> Result<()> {
    if problem.config.prev_solution_path.is_none() {
        return Ok(());
    }
    if problem.config.problem_type == ProblemType::Axisymmetric && problem.config.is_harmonic() {
        return Err(SolverError::IncompatiblePreviousSolution(
            "incremental permeability does not support axisymmetric time-harmonic problems".to_string(),
        ));
    }
    for block in &problem.block_props {
        if let Some(lam) = &block.lamination {
            if lam.fill_factor <= 0.0 {
                return Err(SolverError::IncompatiblePreviousSolution(
                    "incremental permeability requires a nonzero lamination fill factor".to_string(),
                ));
            }
        }
    }
    Ok(())
}

/// Remap `point_props`' keys (pre-renumber node indices) through the
/// renumberer's permutation. Every other per-node property rides along on
/// `Mesh::nodes`/`Element::nodes` itself (`Node::boundary_index`,
/// `Node::conductor_index`), but point properties are keyed externally by
/// node index, so they need their own pass.
fn remap_point_props(
    point_props: &mut HashMap<usize, femm_model::PointProp>,
    permutation: &[usize],
) {
    let remapped: HashMap<usize, femm_model::PointProp> = point_props
        .drain()
        .map(|(old, prop)| (permutation[old], prop))
        .collect();
    *point_props = remapped;
}

fn mesh_path(descriptor_dir: &Path, basename: &str) -> PathBuf {
    let candidate = Path::new(basename);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        descriptor_dir.join(candidate)
    }
}

/// Load the mesh and assemble a `Problem` from a descriptor, including label
/// and edge-marker validation, without renumbering or solving.
pub fn build_problem(descriptor: ProblemDescriptor, descriptor_dir: &Path) -> Result<Problem> {
    let default_label = descriptor.block_labels.iter().position(|l| l.is_default);
    let path = mesh_path(descriptor_dir, &descriptor.mesh_basename);
    let mesh = load_mesh(
        path.to_str().ok_or_else(|| {
            SolverError::InvalidProblem(format!("{}: not valid UTF-8", path.display()))
        })?,
        descriptor.config.length_unit,
        default_label,
    )?;

    let problem = Problem {
        regime: descriptor.regime,
        config: descriptor.config,
        mesh,
        boundary_props: descriptor.boundary_props,
        point_props: descriptor.point_props,
        block_props: descriptor.block_props,
        circuits: descriptor.circuits,
        block_labels: descriptor.block_labels,
    };
    problem.validate_labels().map_err(SolverError::InvalidProblem)?;
    problem
        .validate_edge_markers()
        .map_err(SolverError::InvalidProblem)?;
    Ok(problem)
}

/// The complete solved artifact: the `femm-io` solution plus the renumbering
/// stats a caller (the CLI's `-v` path) may want to report.
pub struct RunOutcome {
    pub solution: Solution,
    pub renumbering: RenumberResult,
}

/// Run a complete solve: load, validate, renumber, assemble/solve to
/// self-consistency, collapse circuit results, and build the solution
/// record ready for `femm_io::write_solution`. Does not itself touch the
/// problem file; the caller decides when (and whether) to persist the
/// result.
pub fn run(descriptor: ProblemDescriptor, descriptor_dir: &Path, logger: &mut dyn Logger) -> Result<RunOutcome> {
    let mut problem = build_problem(descriptor, descriptor_dir)?;

    validate_ac_lamination(&problem)?;
    validate_previous_solution(&problem)?;

    let renumbering = renumber::renumber(&mut problem.mesh);
    remap_point_props(&mut problem.point_props, &renumbering.permutation);
    logger.info(&format!(
        "renumbered {} nodes: bandwidth {} -> {}",
        problem.mesh.nodes.len(),
        renumbering.bandwidth_before,
        renumbering.bandwidth_after
    ));

    let circuits = expand_circuits(&problem);
    let n = problem.mesh.nodes.len();
    let unit = problem.config.length_unit;

    let excitation: Vec<f64> = problem.circuits.iter().map(|c| excitation_of(c.kind)).collect();

    let (values, circuit_results): (Vec<Scalar>, Vec<CircuitResult>) = if problem.config.is_harmonic() {
        let mp = outer_loop::solve_ac(&mut problem, OuterLoopConfig::default(), logger)?;
        let drop: Vec<f64> = (0..circuits.num_conductors()).map(|c| mp.v[n + c].re).collect();
        let results = circuits::collapse_circuit_results(&circuits, &drop, &excitation)
            .into_iter()
            .map(|(ci, excitation, response)| CircuitResult {
                circuit_index: ci,
                excitation_re: excitation,
                excitation_im: 0.0,
                response_re: response,
                response_im: 0.0,
            })
            .collect();
        (mp.v[..n].to_vec(), results)
    } else {
        let mp = outer_loop::solve_dc(&mut problem, OuterLoopConfig::default(), logger)?;
        let drop: Vec<f64> = (0..circuits.num_conductors()).map(|c| mp.v[n + c]).collect();
        let results = circuits::collapse_circuit_results(&circuits, &drop, &excitation)
            .into_iter()
            .map(|(ci, excitation, response)| CircuitResult {
                circuit_index: ci,
                excitation_re: excitation,
                excitation_im: 0.0,
                response_re: response,
                response_im: 0.0,
            })
            .collect();
        (mp.v[..n].iter().map(|&x| real(x)).collect(), results)
    };

    let nodes = (0..n)
        .map(|i| SolvedNode::from_internal(problem.mesh.nodes[i].x, problem.mesh.nodes[i].y, values[i], unit))
        .collect();
    let elements = problem
        .mesh
        .elements
        .iter()
        .map(|e| SolvedElement {
            nodes: e.nodes,
            block_label: e.block_label,
        })
        .collect();

    Ok(RunOutcome {
        solution: Solution {
            nodes,
            elements,
            circuits: circuit_results,
        },
        renumbering,
    })
}

fn excitation_of(kind: femm_model::CircuitKind) -> f64 {
    match kind {
        femm_model::CircuitKind::Series(total) => total,
        femm_model::CircuitKind::Parallel(total) => total,
        femm_model::CircuitKind::FixedPotential(value) => value,
    }
}

/// Load a problem descriptor, run it, and write the solution back to the
/// same file.
pub fn solve_problem_file(path: &Path, logger: &mut dyn Logger) -> Result<RunOutcome> {
    let descriptor = load_problem_descriptor(path)?;
    let descriptor_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let outcome = run(descriptor, descriptor_dir, logger)?;
    write_solution(path, &outcome.solution)?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use femm_model::{
        AcSolverMode, BhCurve, BlockLabel, BlockProp, BoundaryProp, Coordinates, Lamination,
        ProblemConfig, ProblemType, Regime,
    };

    fn base_config(harmonic: bool) -> ProblemConfig {
        ProblemConfig {
            frequency_hz: if harmonic { 60.0 } else { 0.0 },
            precision: 1e-8,
            depth_mm: 1.0,
            length_unit: Default::default(),
            coordinates: Coordinates::Cartesian,
            problem_type: ProblemType::Planar,
            external_region: None,
            ac_solver: AcSolverMode::SuccessiveApproximation,
            prev_solution_path: None,
            do_smart_mesh: false,
            force_max_mesh: false,
        }
    }

    fn base_problem(harmonic: bool) -> Problem {
        let mut mesh = femm_model::Mesh::new();
        mesh.nodes.push(femm_model::Node::new(0.0, 0.0));
        mesh.nodes.push(femm_model::Node::new(1.0, 0.0));
        mesh.nodes.push(femm_model::Node::new(0.0, 1.0));
        mesh.elements.push(femm_model::Element::new([0, 1, 2], 0));
        Problem {
            regime: Regime::Magnetics,
            config: base_config(harmonic),
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
            block_labels: vec![BlockLabel::new(0.3, 0.3, 0)],
        }
    }

    #[test]
    fn ac_lamination_validation_rejects_stacked_lam_in_harmonic_problem() {
        let mut problem = base_problem(true);
        problem.block_props[0].bh_curve = Some(BhCurve::new(vec![(0.0, 0.0), (1.0, 100.0)]).unwrap());
        problem.block_props[0].lamination = Some(Lamination {
            lam_type: LamType::StackX,
            fill_factor: 0.9,
            thickness_mm: 0.3,
            hysteresis_angle_deg: 0.0,
        });
        assert!(matches!(
            validate_ac_lamination(&problem),
            Err(SolverError::OnEdgeLaminationInAc(0))
        ));
    }

    #[test]
    fn ac_lamination_validation_allows_in_plane_lam_in_harmonic_problem() {
        let mut problem = base_problem(true);
        problem.block_props[0].lamination = Some(Lamination {
            lam_type: LamType::InPlane,
            fill_factor: 0.9,
            thickness_mm: 0.3,
            hysteresis_angle_deg: 0.0,
        });
        assert!(validate_ac_lamination(&problem).is_ok());
    }

    #[test]
    fn ac_lamination_validation_is_a_no_op_for_dc_problems() {
        let mut problem = base_problem(false);
        problem.block_props[0].lamination = Some(Lamination {
            lam_type: LamType::StackY,
            fill_factor: 0.9,
            thickness_mm: 0.3,
            hysteresis_angle_deg: 0.0,
        });
        assert!(validate_ac_lamination(&problem).is_ok());
    }

    #[test]
    fn previous_solution_validation_rejects_axisymmetric_harmonic() {
        let mut problem = base_problem(true);
        problem.config.problem_type = ProblemType::Axisymmetric;
        problem.config.prev_solution_path = Some("prev.json".to_string());
        assert!(matches!(
            validate_previous_solution(&problem),
            Err(SolverError::IncompatiblePreviousSolution(_))
        ));
    }

    #[test]
    fn previous_solution_validation_rejects_zero_fill_factor() {
        let mut problem = base_problem(false);
        problem.config.prev_solution_path = Some("prev.json".to_string());
        problem.block_props[0].lamination = Some(Lamination {
            lam_type: LamType::InPlane,
            fill_factor: 0.0,
            thickness_mm: 0.3,
            hysteresis_angle_deg: 0.0,
        });
        assert!(matches!(
            validate_previous_solution(&problem),
            Err(SolverError::IncompatiblePreviousSolution(_))
        ));
    }

    #[test]
    fn previous_solution_validation_is_a_no_op_without_a_path() {
        let problem = base_problem(false);
        assert!(validate_previous_solution(&problem).is_ok());
    }

    #[test]
    fn remap_point_props_moves_keys_through_permutation() {
        let mut props = HashMap::new();
        props.insert(0, femm_model::PointProp { source: Some(1.0), fixed_value: None });
        props.insert(2, femm_model::PointProp { source: None, fixed_value: Some(5.0) });
        let permutation = vec![2, 1, 0];
        remap_point_props(&mut props, &permutation);
        assert_eq!(props.get(&2).unwrap().source, Some(1.0));
        assert_eq!(props.get(&0).unwrap().fixed_value, Some(5.0));
    }

    #[test]
    fn run_pipeline_solves_a_trivial_grounded_triangle() {
        // Exercises the renumber -> remap -> solve slice of `run` directly,
        // since `run`/`build_problem` need a mesh file on disk and that
        // loading step is already covered by `femm-io`'s own tests.
        let mut problem = base_problem(false);
        let mut logger = RecordingLogger::default();
        let renumbering = renumber::renumber(&mut problem.mesh);
        remap_point_props(&mut problem.point_props, &renumbering.permutation);
        let n = problem.mesh.nodes.len();
        let mp = outer_loop::solve_dc(&mut problem, OuterLoopConfig::default(), &mut logger).unwrap();
        for &v in &mp.v[..n] {
            assert!(v.is_finite());
        }
    }
}
