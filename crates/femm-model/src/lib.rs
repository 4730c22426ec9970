//! Plain data model for the 2D elliptic FEM solver core: mesh entities,
//! boundary/point/material properties, circuits, block labels, and the
//! top-level problem configuration.
//!
//! This crate does no file I/O (that's `femm-io`) and no solving (that's
//! `femm-sparse`/`femm-solver`); it is the vocabulary the rest of the
//! workspace shares.

pub mod block_label;
pub mod boundary;
pub mod circuit;
pub mod material;
pub mod mesh;
pub mod problem_config;
pub mod units;

pub use block_label::{BlockLabel, Magnetization};
pub use boundary::{BoundaryProp, PointProp};
pub use circuit::{Circuit, CircuitKind};
pub use material::{BhCurve, BlockProp, LamType, Lamination, WireDescriptor};
pub use mesh::{Element, Mesh, Node, NodeElementAdjacency, PeriodicPair};
pub use problem_config::{AcSolverMode, Coordinates, ExternalRegion, ProblemConfig, ProblemType};
pub use units::{LengthUnit, MAGNETIC_SCALE, MU_0};

use serde::{Deserialize, Serialize};

/// Which physical regime an assembler run targets. The assembler dispatches
/// its tensor/source/boundary-condition rules on this discriminant rather
/// than on per-operation virtual calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Regime {
    /// Magnetostatics (DC) or time-harmonic magnetics (AC), selected by
    /// `ProblemConfig::is_harmonic()`.
    Magnetics,
    Electrostatics,
    HeatFlow,
}

/// The complete in-memory problem: mesh, properties, config. Built by the
/// loader in `femm-io` or by hand in tests; consumed by the renumberer,
/// assemblers, and outer loop in `femm-solver`.
#[derive(Debug, Clone)]
pub struct Problem {
    pub regime: Regime,
    pub config: ProblemConfig,
    pub mesh: Mesh,
    pub boundary_props: Vec<BoundaryProp>,
    pub point_props: std::collections::HashMap<usize, PointProp>,
    pub block_props: Vec<BlockProp>,
    pub circuits: Vec<Circuit>,
    pub block_labels: Vec<BlockLabel>,
}

impl Problem {
    /// Resolve the default block label, if one is flagged (the `.ele`
    /// label==0 convention).
    pub fn default_label(&self) -> Option<usize> {
        self.block_labels.iter().position(|l| l.is_default)
    }

    /// Every element's block label must resolve to a real block label
    /// index, either directly or via the default.
    pub fn validate_labels(&self) -> Result<(), String> {
        let has_default = self.default_label().is_some();
        for (i, e) in self.mesh.elements.iter().enumerate() {
            if e.block_label >= self.block_labels.len() && !has_default {
                return Err(format!(
                    "missing-material-properties: element {i} has no block label and no default is set"
                ));
            }
        }
        Ok(())
    }

    /// Every edge marker must be `None` or a valid boundary-property index.
    pub fn validate_edge_markers(&self) -> Result<(), String> {
        for (i, e) in self.mesh.elements.iter().enumerate() {
            for m in e.edge_markers {
                if let Some(idx) = m {
                    if idx >= self.boundary_props.len() {
                        return Err(format!(
                            "element {i} references out-of-range boundary property {idx}"
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}
