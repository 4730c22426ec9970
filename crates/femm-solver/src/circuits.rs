//! Series-to-parallel circuit rewrite and conductor-row bookkeeping.
//!
//! A series circuit's prescribed total current/charge/heat-flow is carried
//! unchanged (not split) through every block label bound to it, scaled by
//! that label's turns count; each such label gets its own "shadow"
//! parallel conductor so the sparse engine's `N+c` row-redirection scheme
//! only ever has to know about plain parallel/fixed-value conductors. This
//! rewrite is a pure data transformation that runs once before assembly.

use std::collections::HashMap;

use femm_model::{Circuit, CircuitKind, Problem};

/// One shadow conductor: a renumbered `N+c` row the assembler redirects
/// node contributions to.
#[derive(Debug, Clone, Copy)]
pub struct ShadowConductor {
    pub original_circuit: usize,
    pub kind: CircuitKind,
    /// Scale applied to this block label's copy of a series circuit's
    /// excitation; `1.0` for parallel/fixed-potential circuits, which are
    /// not split per block.
    pub turns: f64,
}

#[derive(Debug, Clone)]
pub struct CircuitExpansion {
    pub shadow: Vec<ShadowConductor>,
    /// `node_conductor[node_index]` is the row offset (`c` in `N+c`) of the
    /// shadow conductor that node's element contributions redirect to,
    /// `None` if the node is not a conductor member.
    node_conductor: Vec<Option<usize>>,
}

impl CircuitExpansion {
    pub fn conductor_row(&self, node: usize) -> Option<usize> {
        self.node_conductor[node]
    }

    pub fn num_conductors(&self) -> usize {
        self.shadow.len()
    }

    /// An expansion with no circuits at all, for problems/tests with no
    /// conductors bound.
    pub fn empty_for(num_nodes: usize) -> Self {
        Self {
            shadow: Vec::new(),
            node_conductor: vec![None; num_nodes],
        }
    }
}

const WHOLE_CIRCUIT: usize = usize::MAX;

/// Build the series-to-parallel rewrite for `problem`: one shadow conductor
/// per (series circuit, bound block label) pair, and one shadow conductor
/// per non-series circuit as a whole.
pub fn expand_circuits(problem: &Problem) -> CircuitExpansion {
    let mut shadow = Vec::new();
    let mut slot: HashMap<(usize, usize), usize> = HashMap::new();

    for (ci, circuit) in problem.circuits.iter().enumerate() {
        if circuit.is_series() {
            for (li, label) in problem.block_labels.iter().enumerate() {
                if label.circuit == Some(ci) {
                    let idx = shadow.len();
                    shadow.push(ShadowConductor {
                        original_circuit: ci,
                        kind: series_as_parallel(circuit),
                        turns: label.turns,
                    });
                    slot.insert((ci, li), idx);
                }
            }
        } else {
            let idx = shadow.len();
            shadow.push(ShadowConductor {
                original_circuit: ci,
                kind: circuit.kind,
                turns: 1.0,
            });
            slot.insert((ci, WHOLE_CIRCUIT), idx);
        }
    }

    let adjacency = problem.mesh.node_to_elements();
    let mut node_conductor = vec![None; problem.mesh.nodes.len()];
    for (ni, node) in problem.mesh.nodes.iter().enumerate() {
        let Some(c) = node.conductor_index else {
            continue;
        };
        let Some(circuit) = problem.circuits.get(c) else {
            continue;
        };
        let idx = if circuit.is_series() {
            adjacency
                .elements_of(ni)
                .iter()
                .map(|&ei| problem.mesh.elements[ei].block_label)
                .find_map(|li| slot.get(&(c, li)).copied())
        } else {
            slot.get(&(c, WHOLE_CIRCUIT)).copied()
        };
        node_conductor[ni] = idx;
    }

    CircuitExpansion {
        shadow,
        node_conductor,
    }
}

fn series_as_parallel(circuit: &Circuit) -> CircuitKind {
    match circuit.kind {
        CircuitKind::Series(total) => CircuitKind::Parallel(total),
        other => other,
    }
}

/// Collapse shadow-conductor solutions back to one result per *original*
/// circuit: series circuits report the excitation as given
/// (every shadow copy carries the same total, scaled copies only differ in
/// `turns`) and sum the per-block voltage drops weighted by turns to get an
/// aggregate drop; parallel/fixed-potential circuits have exactly one
/// shadow and pass through unchanged.
pub fn collapse_circuit_results(
    expansion: &CircuitExpansion,
    shadow_drop: &[f64],
    original_excitation: &[f64],
) -> Vec<(usize, f64, f64)> {
    let mut by_circuit: HashMap<usize, (f64, f64)> = HashMap::new();
    for (shadow_idx, conductor) in expansion.shadow.iter().enumerate() {
        let drop = shadow_drop[shadow_idx];
        let entry = by_circuit.entry(conductor.original_circuit).or_insert((0.0, 0.0));
        entry.0 += drop * conductor.turns;
        entry.1 += conductor.turns.abs();
    }
    by_circuit
        .into_iter()
        .map(|(ci, (weighted_drop, weight))| {
            let drop = if weight > 0.0 {
                weighted_drop / weight
            } else {
                weighted_drop
            };
            (ci, original_excitation[ci], drop)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use femm_model::{
        BlockLabel, Coordinates, Element, Mesh, Node, ProblemConfig, ProblemType, Regime,
    };
    use std::collections::HashMap as StdHashMap;

    fn base_config() -> ProblemConfig {
        ProblemConfig {
            frequency_hz: 0.0,
            precision: 1e-8,
            depth_mm: 1.0,
            length_unit: Default::default(),
            coordinates: Coordinates::Cartesian,
            problem_type: ProblemType::Planar,
            external_region: None,
            ac_solver: femm_model::AcSolverMode::SuccessiveApproximation,
            prev_solution_path: None,
            do_smart_mesh: false,
            force_max_mesh: false,
        }
    }

    #[test]
    fn series_circuit_splits_per_block_label() {
        let mut mesh = Mesh::new();
        mesh.nodes.push(Node::new(0.0, 0.0));
        mesh.nodes.push(Node::new(1.0, 0.0));
        mesh.nodes.push(Node::new(0.0, 1.0));
        mesh.nodes[0].conductor_index = Some(0);
        mesh.elements.push(Element::new([0, 1, 2], 0));

        let mut label_a = BlockLabel::new(0.1, 0.1, 0);
        label_a.circuit = Some(0);
        label_a.turns = 10.0;
        let mut label_b = BlockLabel::new(5.0, 5.0, 0);
        label_b.circuit = Some(0);
        label_b.turns = -10.0;

        let problem = Problem {
            regime: Regime::Magnetics,
            config: base_config(),
            mesh,
            boundary_props: vec![],
            point_props: StdHashMap::new(),
            block_props: vec![],
            circuits: vec![Circuit {
                kind: CircuitKind::Series(5.0),
                resistance: 0.0,
            }],
            block_labels: vec![label_a, label_b],
        };

        let expansion = expand_circuits(&problem);
        assert_eq!(expansion.num_conductors(), 2);
        assert!(expansion.conductor_row(0).is_some());
    }

    #[test]
    fn parallel_circuit_keeps_a_single_shadow() {
        let mut mesh = Mesh::new();
        mesh.nodes.push(Node::new(0.0, 0.0));
        mesh.nodes[0].conductor_index = Some(0);

        let problem = Problem {
            regime: Regime::Electrostatics,
            config: base_config(),
            mesh,
            boundary_props: vec![],
            point_props: StdHashMap::new(),
            block_props: vec![],
            circuits: vec![Circuit {
                kind: CircuitKind::Parallel(1.0),
                resistance: 0.0,
            }],
            block_labels: vec![],
        };
        let expansion = expand_circuits(&problem);
        assert_eq!(expansion.num_conductors(), 1);
        assert_eq!(expansion.conductor_row(0), Some(0));
    }
}
