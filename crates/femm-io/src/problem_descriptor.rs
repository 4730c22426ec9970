//! JSON problem-descriptor reader: the stand-in for the out-of-scope
//! `.fem`/`.feh`/`.fee` bracket-and-block text grammar. Carries the same
//! key set and property tables the text grammar would, so `femm-cli` has a
//! serializable format to hand the library without reimplementing that
//! grammar's own parser.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use femm_model::{
    BlockLabel, BlockProp, BoundaryProp, Circuit, PointProp, ProblemConfig, Regime,
};
use serde::{Deserialize, Serialize};

use crate::error::{IoError, Result};

/// Everything needed to build a `femm_model::Problem` except the mesh
/// itself, which is loaded separately from the `.node/.ele/.pbc/.edge`
/// quadruple since the two have independent lifecycles (a descriptor can be
/// re-solved against a re-meshed geometry).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemDescriptor {
    pub regime: Regime,
    pub config: ProblemConfig,
    #[serde(default)]
    pub boundary_props: Vec<BoundaryProp>,
    #[serde(default)]
    pub point_props: HashMap<usize, PointProp>,
    #[serde(default)]
    pub block_props: Vec<BlockProp>,
    #[serde(default)]
    pub circuits: Vec<Circuit>,
    #[serde(default)]
    pub block_labels: Vec<BlockLabel>,
    /// Mesh-file basename (without extension), relative to the descriptor
    /// file unless absolute.
    pub mesh_basename: String,
}

pub fn load_problem_descriptor(path: &Path) -> Result<ProblemDescriptor> {
    let text = fs::read_to_string(path)?;
    let descriptor: ProblemDescriptor = serde_json::from_str(&text)
        .map_err(|e| IoError::BadProblemFile(format!("{}: {e}", path.display())))?;
    Ok(descriptor)
}

pub fn save_problem_descriptor(path: &Path, descriptor: &ProblemDescriptor) -> Result<()> {
    let text = serde_json::to_string_pretty(descriptor)?;
    fs::write(path, text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use femm_model::{AcSolverMode, Coordinates, ProblemType};
    use tempfile::tempdir;

    fn sample() -> ProblemDescriptor {
        ProblemDescriptor {
            regime: Regime::Magnetics,
            config: ProblemConfig {
                frequency_hz: 0.0,
                precision: 1e-8,
                depth_mm: 1.0,
                length_unit: femm_model::LengthUnit::Millimeters,
                coordinates: Coordinates::Cartesian,
                problem_type: ProblemType::Planar,
                external_region: None,
                ac_solver: AcSolverMode::SuccessiveApproximation,
                prev_solution_path: None,
                do_smart_mesh: false,
                force_max_mesh: false,
            },
            boundary_props: vec![],
            point_props: HashMap::new(),
            block_props: vec![BlockProp::linear_isotropic(1.0)],
            circuits: vec![],
            block_labels: vec![],
            mesh_basename: "square".to_string(),
        }
    }

    #[test]
    fn round_trips_through_json_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("problem.json");
        let descriptor = sample();
        save_problem_descriptor(&path, &descriptor).unwrap();
        let back = load_problem_descriptor(&path).unwrap();
        assert_eq!(back.regime, descriptor.regime);
        assert_eq!(back.mesh_basename, "square");
        assert_eq!(back.block_props.len(), 1);
    }

    #[test]
    fn bad_json_is_a_bad_problem_file_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();
        let err = load_problem_descriptor(&path).unwrap_err();
        assert!(matches!(err, IoError::BadProblemFile(_)));
    }
}
