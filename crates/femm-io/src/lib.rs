//! File I/O for the 2D FEM solver core: mesh-file loading, a JSON
//! problem-descriptor reader standing in for the out-of-scope `.fem`
//! grammar, and the solution writer.
//!
//! This crate does no assembly or solving; it turns on-disk formats into
//! (and back out of) `femm-model` types.

pub mod error;
pub mod mesh_loader;
pub mod problem_descriptor;
pub mod solution_writer;

pub use error::{IoError, Result};
pub use mesh_loader::{delete_mesh_files, load_mesh};
pub use problem_descriptor::{load_problem_descriptor, save_problem_descriptor, ProblemDescriptor};
pub use solution_writer::{write_solution, CircuitResult, Solution, SolvedElement, SolvedNode};
