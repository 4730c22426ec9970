//! Shared element-level geometry and folding helpers used by every regime
//! assembler.

use femm_model::{BlockLabel, Element, Mesh, ProblemConfig, ProblemType};

/// Shape parameters `b`/`c` and the signed area.
#[derive(Debug, Clone, Copy)]
pub struct ElementGeometry {
    pub b: [f64; 3],
    pub c: [f64; 3],
    pub area: f64,
    pub centroid_x: f64,
    pub centroid_y: f64,
}

pub fn element_geometry(mesh: &Mesh, element: &Element) -> ElementGeometry {
    let [p0, p1, p2] = element.nodes;
    let (x0, y0) = (mesh.nodes[p0].x, mesh.nodes[p0].y);
    let (x1, y1) = (mesh.nodes[p1].x, mesh.nodes[p1].y);
    let (x2, y2) = (mesh.nodes[p2].x, mesh.nodes[p2].y);
    let b = [y1 - y2, y2 - y0, y0 - y1];
    let c = [x2 - x1, x0 - x2, x1 - x0];
    let area = (b[0] * c[1] - b[1] * c[0]) / 2.0;
    ElementGeometry {
        b,
        c,
        area,
        centroid_x: (x0 + x1 + x2) / 3.0,
        centroid_y: (y0 + y1 + y2) / 3.0,
    }
}

/// Planar "depth" or axisymmetric `2*pi*r_bar` volumetric depth factor.
/// Lengths are millimetres internally; this returns metres
/// so `J`/`q`-style source densities in SI units combine correctly with a
/// millimetre-squared area by converting via `mm_to_m2`. Callers that only
/// need a dimensionless *ratio* between elements (e.g. Kelvin scaling) are
/// unaffected by the absolute unit.
pub fn volumetric_depth(config: &ProblemConfig, geometry: &ElementGeometry) -> f64 {
    match config.problem_type {
        ProblemType::Planar => config.depth_mm / 1000.0,
        ProblemType::Axisymmetric => {
            2.0 * std::f64::consts::PI * (geometry.centroid_x / 1000.0)
        }
    }
}

/// Boundary-edge depth factor: plain `Depth` for planar, `pi*(xj+xk)` for
/// axisymmetric (linear radial interpolation over the edge).
pub fn edge_depth(config: &ProblemConfig, mesh: &Mesh, element: &Element, edge_slot: usize) -> f64 {
    match config.problem_type {
        ProblemType::Planar => config.depth_mm / 1000.0,
        ProblemType::Axisymmetric => {
            let (a, b) = element.edge(edge_slot);
            std::f64::consts::PI * (mesh.nodes[a].x + mesh.nodes[b].x) / 1000.0
        }
    }
}

/// Kelvin-transform scale factor `kappa = (r^2+z^2)/(R_i*R_o)` applied to
/// the permeability/permittivity of elements in the external-region
/// annulus, evaluated at the element centroid.
pub fn kelvin_scale(config: &ProblemConfig, geometry: &ElementGeometry) -> f64 {
    let Some(region) = config.external_region else {
        return 1.0;
    };
    let r = geometry.centroid_x;
    let z = geometry.centroid_y - region.z_o;
    (r * r + z * z) / (region.r_i * region.r_o)
}

/// mm^2 -> m^2 conversion for areas computed from millimetre coordinates.
pub fn mm2_to_m2(area_mm2: f64) -> f64 {
    area_mm2 * 1e-6
}

pub fn is_external_region(label: &BlockLabel) -> bool {
    label.is_external_region
}

#[cfg(test)]
mod tests {
    use super::*;
    use femm_model::Node;

    #[test]
    fn geometry_matches_mesh_signed_area() {
        let mut mesh = Mesh::new();
        mesh.nodes.push(Node::new(0.0, 0.0));
        mesh.nodes.push(Node::new(2.0, 0.0));
        mesh.nodes.push(Node::new(0.0, 2.0));
        let element = Element::new([0, 1, 2], 0);
        let geom = element_geometry(&mesh, &element);
        assert!((geom.area - 2.0).abs() < 1e-12);
        assert!((geom.centroid_x - 2.0 / 3.0).abs() < 1e-12);
    }
}
