//! Mesh entities: nodes, triangular elements, and periodic node pairs.
//!
//! Nodes and elements are created by the loader, mutated only by the
//! renumberer (coordinates are immutable; only array position moves), and
//! read-only from then on.

use femm_complex::Scalar;

/// A mesh node. `boundary_index` and `conductor_index` are the decoded halves
/// of the packed 32-bit marker on `.node`/`.edge` records; `None`
/// means "no marker", matching the packed encoding's 0 sentinel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    pub x: f64,
    pub y: f64,
    pub boundary_index: Option<usize>,
    pub conductor_index: Option<usize>,
}

impl Node {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            boundary_index: None,
            conductor_index: None,
        }
    }

    /// True when this node lies on the axisymmetric r-axis (x ~ 0), where
    /// the vector potential / voltage is forced to zero by symmetry.
    pub fn on_symmetry_axis(&self, length_unit_mm: f64) -> bool {
        self.x.abs() < 1e-6 * length_unit_mm
    }
}

/// A triangular mesh element. `edge_markers[j]` is the boundary-property
/// index for the edge opposite vertex `nodes[j]` (i.e. between
/// `nodes[j]` and `nodes[(j+1) % 3]`), a convention fixed once and applied
/// consistently in assembly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Element {
    pub nodes: [usize; 3],
    pub block_label: usize,
    pub edge_markers: [Option<usize>; 3],
    /// Scratch permeabilities/permittivities/conductivities updated once per
    /// outer nonlinear iteration; `mu1` is the "primary" direction, `mu2` the
    /// secondary, both scaled by `MU_0` where relevant to the regime.
    /// Read-only outside the outer loop.
    pub mu1: Scalar,
    pub mu2: Scalar,
}

impl Element {
    pub fn new(nodes: [usize; 3], block_label: usize) -> Self {
        Self {
            nodes,
            block_label,
            edge_markers: [None; 3],
            mu1: Scalar::new(1.0, 0.0),
            mu2: Scalar::new(1.0, 0.0),
        }
    }

    /// The edge (as an ordered node-index pair) opposite vertex `j`.
    pub fn edge(&self, j: usize) -> (usize, usize) {
        (self.nodes[j], self.nodes[(j + 1) % 3])
    }
}

/// Two nodes coupled as `V[a] == V[b]` (periodic) or `V[a] == -V[b]`
/// (anti-periodic).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodicPair {
    pub a: usize,
    pub b: usize,
    pub anti: bool,
}

/// A complete mesh: nodes, elements, and periodicity couplings. Plain data;
/// geometric validation lives here since it needs no I/O, but loading from
/// files is `femm-io`'s job and renumbering is `femm-solver`'s.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub nodes: Vec<Node>,
    pub elements: Vec<Element>,
    pub periodic_pairs: Vec<PeriodicPair>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signed area of element `e`'s triangle under vertex ordering
    /// (n0, n1, n2); must be strictly positive for assembly to be valid.
    pub fn signed_area(&self, e: &Element) -> f64 {
        let [p0, p1, p2] = e.nodes;
        let (x0, y0) = (self.nodes[p0].x, self.nodes[p0].y);
        let (x1, y1) = (self.nodes[p1].x, self.nodes[p1].y);
        let (x2, y2) = (self.nodes[p2].x, self.nodes[p2].y);
        let b0 = y1 - y2;
        let b1 = y2 - y0;
        let c0 = x2 - x1;
        let c1 = x0 - x2;
        (b0 * c1 - b1 * c0) / 2.0
    }

    /// Checks that every element references three distinct existing nodes
    /// with strictly positive signed area.
    pub fn validate_elements(&self) -> Result<(), String> {
        for (i, e) in self.elements.iter().enumerate() {
            let [p0, p1, p2] = e.nodes;
            if p0 == p1 || p1 == p2 || p0 == p2 {
                return Err(format!("element {i} has repeated vertex indices"));
            }
            for p in e.nodes {
                if p >= self.nodes.len() {
                    return Err(format!("element {i} references nonexistent node {p}"));
                }
            }
            if self.signed_area(e) <= 0.0 {
                return Err(format!(
                    "element {i} has non-positive signed area; vertex ordering is wrong"
                ));
            }
        }
        Ok(())
    }

    /// Node-to-element adjacency, built in two passes (count then place),
    /// avoiding nested per-node allocation.
    pub fn node_to_elements(&self) -> NodeElementAdjacency {
        let n = self.nodes.len();
        let mut counts = vec![0usize; n];
        for e in &self.elements {
            for &p in &e.nodes {
                counts[p] += 1;
            }
        }
        let mut offsets = vec![0usize; n + 1];
        for i in 0..n {
            offsets[i + 1] = offsets[i] + counts[i];
        }
        let mut cursor = offsets.clone();
        let mut flat = vec![0usize; offsets[n]];
        for (ei, e) in self.elements.iter().enumerate() {
            for &p in &e.nodes {
                flat[cursor[p]] = ei;
                cursor[p] += 1;
            }
        }
        NodeElementAdjacency { offsets, flat }
    }
}

/// Flat node -> element-index adjacency, `elements_of(v)` giving the
/// elements touching node `v`.
#[derive(Debug, Clone)]
pub struct NodeElementAdjacency {
    offsets: Vec<usize>,
    flat: Vec<usize>,
}

impl NodeElementAdjacency {
    pub fn elements_of(&self, node: usize) -> &[usize] {
        &self.flat[self.offsets[node]..self.offsets[node + 1]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_triangle_mesh() -> Mesh {
        let mut mesh = Mesh::new();
        mesh.nodes.push(Node::new(0.0, 0.0));
        mesh.nodes.push(Node::new(1.0, 0.0));
        mesh.nodes.push(Node::new(0.0, 1.0));
        mesh.elements.push(Element::new([0, 1, 2], 0));
        mesh
    }

    #[test]
    fn signed_area_positive_for_ccw_triangle() {
        let mesh = unit_triangle_mesh();
        assert!((mesh.signed_area(&mesh.elements[0]) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn validate_rejects_degenerate_ordering() {
        let mut mesh = unit_triangle_mesh();
        mesh.elements[0].nodes = [0, 2, 1]; // clockwise: negative area
        assert!(mesh.validate_elements().is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_node() {
        let mut mesh = unit_triangle_mesh();
        mesh.elements[0].nodes = [0, 1, 9];
        assert!(mesh.validate_elements().is_err());
    }

    #[test]
    fn adjacency_is_an_involution() {
        let mut mesh = unit_triangle_mesh();
        mesh.nodes.push(Node::new(1.0, 1.0));
        mesh.elements.push(Element::new([1, 3, 2], 0));

        let adj = mesh.node_to_elements();
        for (ei, e) in mesh.elements.iter().enumerate() {
            for &v in &e.nodes {
                assert!(adj.elements_of(v).contains(&ei));
            }
        }
    }
}
