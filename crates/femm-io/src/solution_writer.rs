//! Solution writer: appends the solved node/element tables and per-circuit
//! results to the problem file.
//!
//! The out-of-scope `.fem` grammar appends a `<beginsolution>` block in
//! place; this JSON stand-in appends a `"solution"` key to the same
//! descriptor document instead, so a solved problem file is still a single
//! self-contained artifact a post-processor collaborator can read back.

use std::fs;
use std::path::Path;

use femm_complex::Scalar;
use femm_model::LengthUnit;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One solved node: coordinates converted back to the user's original
/// length units, and the solution value at that node (real for DC
/// regimes, complex for harmonic magnetics).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SolvedNode {
    pub x: f64,
    pub y: f64,
    pub value_re: f64,
    pub value_im: f64,
}

/// One element: three vertex indices plus its (possibly default-resolved)
/// block-label index, for a post-processor to re-triangulate the field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SolvedElement {
    pub nodes: [usize; 3],
    pub block_label: usize,
}

/// A single circuit's reduced result. Magnetics/electrostatics report
/// `(excitation, response)` as `(current, voltage_drop)` /
/// `(voltage, charge)`; heat flow reports `(heat_flow, temperature_drop)`.
/// Series circuits rewritten to parallel-by-block for assembly are collapsed
/// back to this one record per *original* circuit, not the per-block shadow
/// conductors the assembler introduced.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CircuitResult {
    pub circuit_index: usize,
    pub excitation_re: f64,
    pub excitation_im: f64,
    pub response_re: f64,
    pub response_im: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    pub nodes: Vec<SolvedNode>,
    pub elements: Vec<SolvedElement>,
    pub circuits: Vec<CircuitResult>,
}

impl SolvedNode {
    pub fn from_internal(x_mm: f64, y_mm: f64, value: Scalar, unit: LengthUnit) -> Self {
        let from_mm = unit.from_mm();
        Self {
            x: x_mm * from_mm,
            y: y_mm * from_mm,
            value_re: value.re,
            value_im: value.im,
        }
    }
}

/// Append (or overwrite) the `"solution"` key of the JSON problem file at
/// `path`, leaving every other key as-is. No partial output is ever written
/// on failure: the whole merged document is serialized into memory before
/// anything touches disk.
pub fn write_solution(path: &Path, solution: &Solution) -> Result<()> {
    let text = fs::read_to_string(path)?;
    let mut document: serde_json::Value = serde_json::from_str(&text)?;
    let solution_value = serde_json::to_value(solution)?;
    match document.as_object_mut() {
        Some(map) => {
            map.insert("solution".to_string(), solution_value);
        }
        None => {
            return Err(crate::error::IoError::BadProblemFile(format!(
                "{}: top-level document is not an object",
                path.display()
            )))
        }
    }
    let merged = serde_json::to_string_pretty(&document)?;
    fs::write(path, merged)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn appends_solution_without_disturbing_other_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("problem.json");
        fs::write(&path, r#"{"mesh_basename": "square", "other": 1}"#).unwrap();

        let solution = Solution {
            nodes: vec![SolvedNode {
                x: 1.0,
                y: 2.0,
                value_re: 0.5,
                value_im: 0.0,
            }],
            elements: vec![SolvedElement {
                nodes: [0, 1, 2],
                block_label: 0,
            }],
            circuits: vec![],
        };
        write_solution(&path, &solution).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(doc["mesh_basename"], "square");
        assert_eq!(doc["other"], 1);
        assert_eq!(doc["solution"]["nodes"][0]["value_re"], 0.5);
    }

    #[test]
    fn solved_node_converts_back_to_user_units() {
        let node = SolvedNode::from_internal(25.4, 0.0, Scalar::new(1.0, 0.0), LengthUnit::Inches);
        assert!((node.x - 1.0).abs() < 1e-9);
    }
}
