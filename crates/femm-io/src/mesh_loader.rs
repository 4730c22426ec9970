//! Mesh loader: reads `<basename>.node/.ele/.pbc/.edge` and assembles a
//! `femm_model::Mesh` with edge markers and default-label resolution.
//!
//! The packed 32-bit marker on `.node`/`.edge` records splits into a low
//! 16-bit boundary-property index (offset by 2, 0/1 meaning "none") and a
//! high 16-bit conductor index (offset by 1, 0 meaning "none"). `.edge`
//! records additionally use the sign of the packed value to say whether the
//! marker belongs to the edge itself (surface source / mixed / periodic) or
//! is inherited from its endpoint nodes; negative values are the edge's own
//! marker.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use femm_model::{Element, Mesh, Node, PeriodicPair};

use crate::error::{IoError, Result};

fn decode_marker(raw: i64) -> (Option<usize>, Option<usize>) {
    let magnitude = raw.unsigned_abs();
    let low = (magnitude & 0xFFFF) as u32;
    let high = ((magnitude >> 16) & 0xFFFF) as u32;
    let boundary = if low >= 2 { Some((low - 2) as usize) } else { None };
    let conductor = if high >= 1 { Some((high - 1) as usize) } else { None };
    (boundary, conductor)
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Load the `.node` file: first line is the node count, then one
/// `i x y marker` record per line.
pub fn load_nodes(basename: &str) -> Result<Vec<Node>> {
    let path = Path::new(basename).with_extension("node");
    let lines = read_lines(&path).map_err(|e| match e {
        IoError::Io(io) => IoError::BadNodeFile(format!("{}: {io}", path.display())),
        other => other,
    })?;
    let mut iter = lines.iter();
    let header = iter
        .next()
        .ok_or_else(|| IoError::BadNodeFile("empty .node file".into()))?;
    let n: usize = header
        .split_whitespace()
        .next()
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| IoError::BadNodeFile(format!("bad header: {header}")))?;

    let mut nodes = Vec::with_capacity(n);
    for line in iter.take(n) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 {
            return Err(IoError::BadNodeFile(format!("short record: {line}")));
        }
        let x: f64 = fields[1]
            .parse()
            .map_err(|_| IoError::BadNodeFile(format!("bad x in: {line}")))?;
        let y: f64 = fields[2]
            .parse()
            .map_err(|_| IoError::BadNodeFile(format!("bad y in: {line}")))?;
        let mut node = Node::new(x, y);
        if let Some(raw) = fields.get(3) {
            let raw: i64 = raw
                .parse()
                .map_err(|_| IoError::BadNodeFile(format!("bad marker in: {line}")))?;
            let (boundary, conductor) = decode_marker(raw);
            node.boundary_index = boundary;
            node.conductor_index = conductor;
        }
        nodes.push(node);
    }
    if nodes.len() != n {
        return Err(IoError::BadNodeFile(format!(
            "declared {n} nodes, found {}",
            nodes.len()
        )));
    }
    Ok(nodes)
}

/// Load the `.ele` file: first line is the element count, then
/// `i p0 p1 p2 label` records (label is 1-indexed, 0 means "use the
/// default label").
pub fn load_elements(basename: &str) -> Result<Vec<Element>> {
    let path = Path::new(basename).with_extension("ele");
    let lines = read_lines(&path).map_err(|e| match e {
        IoError::Io(io) => IoError::BadElementFile(format!("{}: {io}", path.display())),
        other => other,
    })?;
    let mut iter = lines.iter();
    let header = iter
        .next()
        .ok_or_else(|| IoError::BadElementFile("empty .ele file".into()))?;
    let n: usize = header
        .split_whitespace()
        .next()
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| IoError::BadElementFile(format!("bad header: {header}")))?;

    let mut elements = Vec::with_capacity(n);
    for line in iter.take(n) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 5 {
            return Err(IoError::BadElementFile(format!("short record: {line}")));
        }
        let p: Vec<usize> = fields[1..4]
            .iter()
            .map(|f| f.parse::<usize>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| IoError::BadElementFile(format!("bad vertex index in: {line}")))?;
        let label: i64 = fields[4]
            .parse()
            .map_err(|_| IoError::BadElementFile(format!("bad label in: {line}")))?;
        // label==0 means "use the default label"; the loader keeps that as
        // a sentinel (usize::MAX) that Problem::validate_labels resolves
        // against the default-flagged block label, and real labels are
        // rebased to 0-indexed.
        let block_label = if label == 0 {
            usize::MAX
        } else {
            (label - 1) as usize
        };
        elements.push(Element::new([p[0], p[1], p[2]], block_label));
    }
    if elements.len() != n {
        return Err(IoError::BadElementFile(format!(
            "declared {n} elements, found {}",
            elements.len()
        )));
    }
    Ok(elements)
}

/// Load the `.pbc` file: first line is the pair count, then `i a b t`
/// records with `t` in `{0, 1}` (periodic / anti-periodic).
pub fn load_periodic_pairs(basename: &str) -> Result<Vec<PeriodicPair>> {
    let path = Path::new(basename).with_extension("pbc");
    let lines = read_lines(&path).map_err(|e| match e {
        IoError::Io(io) => IoError::BadPbcFile(format!("{}: {io}", path.display())),
        other => other,
    })?;
    let mut iter = lines.iter();
    let header = iter
        .next()
        .ok_or_else(|| IoError::BadPbcFile("empty .pbc file".into()))?;
    let k: usize = header
        .split_whitespace()
        .next()
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| IoError::BadPbcFile(format!("bad header: {header}")))?;

    let mut pairs = Vec::with_capacity(k);
    for line in iter.take(k) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            return Err(IoError::BadPbcFile(format!("short record: {line}")));
        }
        let a: usize = fields[1]
            .parse()
            .map_err(|_| IoError::BadPbcFile(format!("bad node a in: {line}")))?;
        let b: usize = fields[2]
            .parse()
            .map_err(|_| IoError::BadPbcFile(format!("bad node b in: {line}")))?;
        let t: u8 = fields[3]
            .parse()
            .map_err(|_| IoError::BadPbcFile(format!("bad tag in: {line}")))?;
        pairs.push(PeriodicPair {
            a,
            b,
            anti: t == 1,
        });
    }
    if pairs.len() != k {
        return Err(IoError::BadPbcFile(format!(
            "declared {k} pairs, found {}",
            pairs.len()
        )));
    }
    Ok(pairs)
}

/// One decoded `.edge` record: endpoint nodes and, if the marker belongs to
/// the edge itself (negative raw value), its boundary index.
struct EdgeRecord {
    n0: usize,
    n1: usize,
    boundary: Option<usize>,
}

fn load_edge_records(basename: &str) -> Result<Vec<EdgeRecord>> {
    let path = Path::new(basename).with_extension("edge");
    let lines = read_lines(&path).map_err(|e| match e {
        IoError::Io(io) => IoError::BadEdgeFile(format!("{}: {io}", path.display())),
        other => other,
    })?;
    let mut iter = lines.iter();
    let header = iter
        .next()
        .ok_or_else(|| IoError::BadEdgeFile("empty .edge file".into()))?;
    let n: usize = header
        .split_whitespace()
        .next()
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| IoError::BadEdgeFile(format!("bad header: {header}")))?;

    let mut records = Vec::with_capacity(n);
    for line in iter.take(n) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            return Err(IoError::BadEdgeFile(format!("short record: {line}")));
        }
        let n0: usize = fields[1]
            .parse()
            .map_err(|_| IoError::BadEdgeFile(format!("bad endpoint in: {line}")))?;
        let n1: usize = fields[2]
            .parse()
            .map_err(|_| IoError::BadEdgeFile(format!("bad endpoint in: {line}")))?;
        let raw: i64 = fields[3]
            .parse()
            .map_err(|_| IoError::BadEdgeFile(format!("bad marker in: {line}")))?;
        let boundary = if raw < 0 {
            decode_marker(raw).0
        } else {
            None
        };
        records.push(EdgeRecord { n0, n1, boundary });
    }
    if records.len() != n {
        return Err(IoError::BadEdgeFile(format!(
            "declared {n} edges, found {}",
            records.len()
        )));
    }
    Ok(records)
}

/// Which vertex slot, if any, of element `e` the pair `(n0, n1)` occupies as
/// "the edge opposite vertex j" (the edge between `p[j]` and
/// `p[(j+1)%3]`).
fn matching_edge_slot(e: &Element, n0: usize, n1: usize) -> Option<usize> {
    (0..3).find(|&j| {
        let (a, b) = e.edge(j);
        (a == n0 && b == n1) || (a == n1 && b == n0)
    })
}

/// Walk `.edge` records, resolve each against the node-to-element adjacency
/// of its endpoints, and write the boundary index onto the matching
/// element's edge-marker slot. Surface-source edges with both candidate
/// elements genuinely touching the edge are assigned to exactly one
/// (deterministic "first hit wins": lower element index).
fn assign_edge_markers(mesh: &mut Mesh, records: &[EdgeRecord]) -> Result<()> {
    let adjacency = mesh.node_to_elements();
    let mut assigned: HashSet<(usize, usize)> = HashSet::new();

    for rec in records {
        let Some(boundary) = rec.boundary else {
            continue;
        };
        let key = if rec.n0 <= rec.n1 {
            (rec.n0, rec.n1)
        } else {
            (rec.n1, rec.n0)
        };
        if assigned.contains(&key) {
            continue;
        }
        let mut candidates: Vec<usize> = adjacency
            .elements_of(rec.n0)
            .iter()
            .copied()
            .filter(|&ei| matching_edge_slot(&mesh.elements[ei], rec.n0, rec.n1).is_some())
            .collect();
        candidates.sort_unstable();
        candidates.dedup();
        let Some(&winner) = candidates.first() else {
            continue;
        };
        let slot = matching_edge_slot(&mesh.elements[winner], rec.n0, rec.n1)
            .expect("winner was filtered for a matching slot");
        mesh.elements[winner].edge_markers[slot] = Some(boundary);
        assigned.insert(key);
    }
    Ok(())
}

/// Resolve each element's `.ele` label==0 sentinel (`usize::MAX`) to the
/// default block label.
fn resolve_default_labels(mesh: &mut Mesh, default_label: Option<usize>) -> Result<()> {
    for (i, e) in mesh.elements.iter_mut().enumerate() {
        if e.block_label == usize::MAX {
            match default_label {
                Some(d) => e.block_label = d,
                None => {
                    return Err(IoError::MissingMaterialProperties(format!(
                        "element {i} has no block label and no default is set"
                    )))
                }
            }
        }
    }
    Ok(())
}

/// Load the full mesh quadruple for `basename` (`<basename>.node/.ele/.pbc/
/// .edge`), scale coordinates from `unit` into the solver's internal
/// millimeter working unit, assign edge markers, and resolve default
/// labels.
pub fn load_mesh(
    basename: &str,
    unit: femm_model::LengthUnit,
    default_label: Option<usize>,
) -> Result<Mesh> {
    let mut nodes = load_nodes(basename)?;
    let scale = unit.to_mm();
    for node in &mut nodes {
        node.x *= scale;
        node.y *= scale;
    }
    let elements = load_elements(basename)?;
    let periodic_pairs = load_periodic_pairs(basename)?;
    let edge_records = load_edge_records(basename)?;

    let mut mesh = Mesh {
        nodes,
        elements,
        periodic_pairs,
    };
    mesh.validate_elements()
        .map_err(IoError::BadElementFile)?;
    resolve_default_labels(&mut mesh, default_label)?;
    assign_edge_markers(&mut mesh, &edge_records)?;
    Ok(mesh)
}

/// Delete the transient mesh-file quadruple plus `.poly` for `basename`,
/// on successful load when the caller requests it. Best-effort: a missing
/// file is not an error.
pub fn delete_mesh_files(basename: &str) {
    for ext in ["node", "ele", "pbc", "edge", "poly"] {
        let _ = fs::remove_file(Path::new(basename).with_extension(ext));
    }
}
