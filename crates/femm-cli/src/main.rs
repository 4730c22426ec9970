use std::path::Path;
use std::process::ExitCode;

use femm_io::load_mesh;
use femm_solver::{renumber, solve_problem_file, Logger, SolverError, StderrLogger};

fn usage() {
    eprintln!("usage:");
    eprintln!("  femm-cli solve <problem.json>");
    eprintln!("  femm-cli mesh-stats <mesh_basename> <length_unit>");
    eprintln!("  femm-cli --help");
    eprintln!();
    eprintln!("examples:");
    eprintln!("  femm-cli solve examples/bushing.json");
    eprintln!("  femm-cli mesh-stats examples/bushing millimeters");
    eprintln!();
    eprintln!("`solve` loads <problem.json> (the mesh basename is the");
    eprintln!("descriptor's own \"mesh_basename\" key), solves it, and");
    eprintln!("writes the result back under the descriptor's \"solution\" key.");
}

fn run_solve(path: &Path) -> ExitCode {
    let mut logger = StderrLogger;
    match solve_problem_file(path, &mut logger) {
        Ok(outcome) => {
            logger.info(&format!(
                "solved {} nodes, {} elements, {} circuits",
                outcome.solution.nodes.len(),
                outcome.solution.elements.len(),
                outcome.solution.circuits.len()
            ));
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            exit_code_for(&err)
        }
    }
}

fn exit_code_for(err: &SolverError) -> ExitCode {
    match err {
        SolverError::Io(_) | SolverError::InvalidProblem(_) => ExitCode::from(1),
        SolverError::OnEdgeLaminationInAc(_)
        | SolverError::IncompatiblePreviousSolution(_)
        | SolverError::Solve(_) => ExitCode::from(2),
    }
}

fn run_mesh_stats(basename: &str, unit: &str) -> ExitCode {
    let unit = match femm_model::LengthUnit::parse(unit) {
        Some(u) => u,
        None => {
            eprintln!("error: unrecognized length unit {unit:?}");
            return ExitCode::from(1);
        }
    };
    let mut mesh = match load_mesh(basename, unit, None) {
        Ok(mesh) => mesh,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(1);
        }
    };
    let result = renumber::renumber(&mut mesh);
    println!("nodes: {}", mesh.nodes.len());
    println!("elements: {}", mesh.elements.len());
    println!("periodic_pairs: {}", mesh.periodic_pairs.len());
    println!("bandwidth_before: {}", result.bandwidth_before);
    println!("bandwidth_after: {}", result.bandwidth_after);
    ExitCode::SUCCESS
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("solve") => match args.get(1) {
            Some(path) => run_solve(Path::new(path)),
            None => {
                usage();
                ExitCode::from(2)
            }
        },
        Some("mesh-stats") => match (args.get(1), args.get(2)) {
            (Some(basename), Some(unit)) => run_mesh_stats(basename, unit),
            _ => {
                usage();
                ExitCode::from(2)
            }
        },
        Some("--help") | Some("-h") => {
            usage();
            ExitCode::SUCCESS
        }
        _ => {
            usage();
            ExitCode::from(2)
        }
    }
}
