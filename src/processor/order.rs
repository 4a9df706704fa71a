//! Cyclic ordering of the half-faces incident to a non-manifold iso-edge.
//!
//! Within one tetrahedron the order comes from walking the arrangement
//! cells around the local edge: consecutive incident faces share the cell
//! between them. Fans from different tets are stitched across shared tet
//! faces: a tet-boundary sub-face either merges the two angular regions on
//! its sides (plain boundary) or is itself a surface face shared by both
//! tets (coplanar surface). Tets that contain the edge but cut nothing
//! around it pass the region straight through.
//!
//! The stitched structure is a circular alternation of regions and surface
//! half-faces; every region bounded by two half-faces yields one ordered
//! pair. Regions open to the domain boundary yield none.

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::arrangement::Arrangement;
use crate::containers::UnionFind;

use super::{GlobalVid, HalfFace, SimplexKind, SurfaceNetworkProcessor, INVALID};

/// One face in a tet's fan around the edge.
#[derive(Clone, Debug)]
struct FanNode {
    /// Global iso-face id; INVALID for plain tet-boundary sub-faces.
    iso_face: u32,
    /// One-sided in the local arrangement (on the tet boundary).
    one_sided: bool,
    /// Orientation toward the preceding / following slot of the fan:
    /// +1 if that region is on the face's positive side.
    or_prev: i8,
    or_next: i8,
    /// Sorted global identities of the face's corners; the stitching key
    /// for one-sided faces.
    key: SmallVec<[GlobalVid; 8]>,
}

/// A per-tet fan: nodes in angular order with a region slot between each
/// consecutive pair; `cyclic` when the edge is interior to the tet.
#[derive(Clone, Debug)]
struct TetFan {
    nodes: Vec<FanNode>,
    cyclic: bool,
}

/// Compute the ordered half-face pairs around iso-edge `edge_id`: for each
/// angular region between two consecutive incident half-faces, the pair of
/// half-faces bounding it.
pub(super) fn compute_face_order(
    proc: &SurfaceNetworkProcessor,
    edge_id: u32,
) -> Vec<(HalfFace, HalfFace)> {
    let edge = &proc.iso_edges[edge_id as usize];
    let (va, vb) = (&proc.iso_verts[edge.v1 as usize], &proc.iso_verts[edge.v2 as usize]);

    // Tets containing the edge: those containing every mesh vertex of both
    // endpoints' minimal simplices.
    let mut simplex_union: SmallVec<[u32; 8]> = SmallVec::new();
    for &v in va.simplex_vertices().iter().chain(vb.simplex_vertices()) {
        if !simplex_union.contains(&v) {
            simplex_union.push(v);
        }
    }
    let mut tets: Vec<u32> = proc.incidence.tets_of(simplex_union[0]).to_vec();
    for &v in &simplex_union[1..] {
        let other = proc.incidence.tets_of(v);
        tets.retain(|t| other.binary_search(t).is_ok());
    }
    debug_assert!(!tets.is_empty(), "an iso-edge lies in at least one tet");

    let mut fans: Vec<TetFan> = Vec::with_capacity(tets.len());
    for &tet in &tets {
        match proc.arrangement_of_tet(tet) {
            Some(arrangement) => {
                // A function whose zero set passes through a vertex strictly
                // inside a mesh simplex is strictly sign-mixed over that
                // simplex's vertices, hence active in every tet containing
                // it. Both endpoints therefore exist in this arrangement.
                let fan = fan_in_tet(proc, tet, arrangement, edge.v1, edge.v2)
                    .expect("edge endpoints exist in every containing arrangement");
                fans.push(fan);
            }
            None => {
                // Pass-through tet: both wedge walls are whole tet faces.
                fans.push(pass_through_fan(proc, tet, &simplex_union));
            }
        }
    }

    assemble_pairs(fans)
}

/// Global identity of iso-vertex `vid` inside a tet's vertex table: mesh
/// corners are matched by their mesh id.
fn local_of_global(table: &[GlobalVid], proc: &SurfaceNetworkProcessor, vid: u32) -> Option<u32> {
    let vert = &proc.iso_verts[vid as usize];
    let wanted = if vert.simplex == SimplexKind::Vertex {
        GlobalVid::Mesh(vert.simplex_verts[0])
    } else {
        GlobalVid::Iso(vid)
    };
    table.iter().position(|&g| g == wanted).map(|i| i as u32)
}

/// Walk the arrangement of `tet` around the local edge joining the two
/// endpoint iso-vertices. `None` only if an endpoint is missing from this
/// arrangement, which a consistent surface network rules out.
fn fan_in_tet(
    proc: &SurfaceNetworkProcessor,
    tet: u32,
    arrangement: &Arrangement,
    v1: u32,
    v2: u32,
) -> Option<TetFan> {
    let table = proc.tables.vids_of_tet(tet);
    let la = local_of_global(table, proc, v1)?;
    let lb = local_of_global(table, proc, v2)?;
    Some(fan_around_local_edge(proc, tet, arrangement, la, lb))
}

/// The ordered fan of faces around local edge (la, lb) with the cell
/// between each consecutive pair.
fn fan_around_local_edge(
    proc: &SurfaceNetworkProcessor,
    tet: u32,
    arrangement: &Arrangement,
    la: u32,
    lb: u32,
) -> TetFan {
    let table = proc.tables.vids_of_tet(tet);
    let iso_faces = proc.tables.iso_faces_of_tet(tet);

    // Faces whose boundary loop contains the local edge (la, lb).
    let mut incident: SmallVec<[u32; 8]> = SmallVec::new();
    for (f, face) in arrangement.faces.iter().enumerate() {
        let n = face.vertices.len();
        for i in 0..n {
            let a = face.vertices[i];
            let b = face.vertices[(i + 1) % n];
            if (a == la && b == lb) || (a == lb && b == la) {
                incident.push(f as u32);
                break;
            }
        }
    }
    debug_assert!(incident.len() >= 2, "a wedge has at least two walls");

    // Start from a one-sided face if the edge is on the tet boundary,
    // otherwise anywhere (cyclic fan).
    let start = incident
        .iter()
        .position(|&f| arrangement.faces[f as usize].negative_cell == INVALID)
        .unwrap_or(0);
    let cyclic = arrangement.faces[incident[start] as usize].negative_cell != INVALID;

    // The next wall of `cell` around the edge.
    let other_wall = |cell: u32, current: u32| -> u32 {
        *incident
            .iter()
            .find(|&&f| {
                f != current
                    && (arrangement.faces[f as usize].positive_cell == cell
                        || arrangement.faces[f as usize].negative_cell == cell)
            })
            .expect("each cell around the edge has exactly two walls")
    };

    let mut ordered: Vec<u32> = vec![incident[start]];
    let mut cells: Vec<u32> = Vec::new();
    let mut cell = arrangement.faces[incident[start] as usize].positive_cell;
    loop {
        let next = other_wall(cell, *ordered.last().unwrap());
        cells.push(cell);
        if cyclic && next == ordered[0] {
            break;
        }
        ordered.push(next);
        let next_face = &arrangement.faces[next as usize];
        if next_face.negative_cell == INVALID {
            // Reached the far wall of a boundary fan.
            break;
        }
        cell = if next_face.positive_cell == cell { next_face.negative_cell } else { next_face.positive_cell };
    }

    let nodes = ordered
        .iter()
        .enumerate()
        .map(|(i, &f)| {
            let face = &arrangement.faces[f as usize];
            let orient = |cell: u32| if face.positive_cell == cell { 1 } else { -1 };
            // Slot before node i is cells[i-1]; after it, cells[i].
            let or_prev = if i > 0 {
                orient(cells[i - 1])
            } else if cyclic {
                orient(cells[cells.len() - 1])
            } else {
                0
            };
            let or_next = if i < cells.len() { orient(cells[i]) } else { 0 };
            let mut key: SmallVec<[GlobalVid; 8]> =
                face.vertices.iter().map(|&v| table[v as usize]).collect();
            key.sort_unstable();
            FanNode {
                iso_face: iso_faces[f as usize],
                one_sided: face.negative_cell == INVALID,
                or_prev,
                or_next,
                key,
            }
        })
        .collect();

    TetFan { nodes, cyclic }
}

/// Fan of a tet with no arrangement: the edge lies on a mesh edge and the
/// wedge runs uncut between the two tet faces containing it.
fn pass_through_fan(proc: &SurfaceNetworkProcessor, tet: u32, edge_verts: &[u32]) -> TetFan {
    debug_assert!(edge_verts.len() <= 2, "pass-through tets only occur along mesh edges");
    let corners = proc.mesh.tets[tet as usize];
    let mut nodes = Vec::with_capacity(2);
    for skip in 0..4 {
        let face: SmallVec<[u32; 8]> = (0..4)
            .filter(|&c| c != skip)
            .map(|c| corners[c])
            .collect();
        if edge_verts.iter().all(|v| face.contains(v)) {
            let mut key: SmallVec<[GlobalVid; 8]> = face.iter().map(|&c| GlobalVid::Mesh(c)).collect();
            key.sort_unstable();
            nodes.push(FanNode { iso_face: INVALID, one_sided: true, or_prev: 0, or_next: 0, key });
        }
    }
    debug_assert!(nodes.len() == 2, "a mesh edge belongs to exactly two faces of a containing tet");
    TetFan { nodes, cyclic: false }
}

/// Stitch the per-tet fans into regions and emit one ordered pair per
/// region bounded by two surface half-faces.
fn assemble_pairs(fans: Vec<TetFan>) -> Vec<(HalfFace, HalfFace)> {
    // Region slots: one per consecutive node pair of every fan.
    let mut slot_count = 0usize;
    let fan_slots: Vec<(usize, usize)> = fans
        .iter()
        .map(|fan| {
            let slots = if fan.cyclic { fan.nodes.len() } else { fan.nodes.len() - 1 };
            let range = (slot_count, slots);
            slot_count += slots;
            range
        })
        .collect();
    let mut regions = UnionFind::new(slot_count);

    // Surface incidences: (slot, face, orientation).
    let mut incidences: Vec<(u32, u32, i8)> = Vec::new();
    // Arc ends waiting to be matched across tet boundaries, keyed by the
    // boundary face's identity. An entry carries the end node's fan/pos and
    // its adjacent slot.
    struct ArcEnd {
        fan: usize,
        node: usize,
        slot: u32,
    }
    let mut open_ends: AHashMap<SmallVec<[GlobalVid; 8]>, SmallVec<[ArcEnd; 2]>> = AHashMap::new();

    for (f, fan) in fans.iter().enumerate() {
        let (slot_base, num_slots) = fan_slots[f];
        for (n, node) in fan.nodes.iter().enumerate() {
            // Interior incidences toward both adjacent slots.
            let prev_slot = if n > 0 {
                Some(slot_base + n - 1)
            } else if fan.cyclic {
                Some(slot_base + num_slots - 1)
            } else {
                None
            };
            let next_slot = if n < num_slots { Some(slot_base + n) } else { None };
            if node.iso_face != INVALID {
                if let Some(slot) = prev_slot {
                    incidences.push((slot as u32, node.iso_face, node.or_prev));
                }
                if let Some(slot) = next_slot {
                    incidences.push((slot as u32, node.iso_face, node.or_next));
                }
            }
            if node.one_sided && !fan.cyclic {
                let slot = prev_slot.or(next_slot).expect("an end node borders one slot") as u32;
                open_ends.entry(node.key.clone()).or_default().push(ArcEnd { fan: f, node: n, slot });
            }
        }
    }

    // Match arc ends pairwise.
    for (_, ends) in open_ends.iter() {
        debug_assert!(ends.len() <= 2, "a tet face is shared by at most two tets");
        if ends.len() != 2 {
            // Domain boundary: the region stays open.
            continue;
        }
        let (a, b) = (&ends[0], &ends[1]);
        let node_a = &fans[a.fan].nodes[a.node];
        let node_b = &fans[b.fan].nodes[b.node];
        match (node_a.iso_face != INVALID, node_b.iso_face != INVALID) {
            (true, true) => {
                // The same surface polygon seen from both tets; the regions
                // on its two sides stay separate. Incidences already cover
                // both sides.
                debug_assert!(node_a.iso_face == node_b.iso_face);
            }
            (true, false) => {
                // A's surface face walls B's region from its far side; the
                // inner orientation is whichever of the two is set.
                let or = -(node_a.or_prev + node_a.or_next);
                incidences.push((b.slot, node_a.iso_face, or));
            }
            (false, true) => {
                let or = -(node_b.or_prev + node_b.or_next);
                incidences.push((a.slot, node_b.iso_face, or));
            }
            (false, false) => {
                // Plain boundary crossing: merge the regions.
                regions.merge(a.slot, b.slot);
            }
        }
    }

    // Emit one pair per region closed by two half-faces.
    let mut per_region: AHashMap<u32, SmallVec<[(u32, i8); 2]>> = AHashMap::new();
    for &(slot, face, orientation) in &incidences {
        per_region.entry(regions.find(slot)).or_default().push((face, orientation));
    }
    let mut pairs: Vec<(HalfFace, HalfFace)> = Vec::new();
    for (_, walls) in per_region.iter() {
        debug_assert!(walls.len() <= 2, "a region is bounded by at most two half-faces");
        if let [(f1, o1), (f2, o2)] = walls.as_slice() {
            pairs.push((
                HalfFace { index: *f1, orientation: *o1 },
                HalfFace { index: *f2, orientation: *o2 },
            ));
        }
    }
    // Hash iteration order is not deterministic; the pair list must be.
    pairs.sort_unstable_by_key(|(a, b)| (a.index, a.orientation, b.index, b.orientation));
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};

    use glam::DVec3;

    use crate::mesh::TetMesh;
    use crate::scene::{Primitive, Scene};

    /// The emitted pairs as (function, orientation) sets, normalized for
    /// order-free comparison.
    fn function_pairs(
        proc: &SurfaceNetworkProcessor,
        pairs: &[(HalfFace, HalfFace)],
    ) -> Vec<[(u32, i8); 2]> {
        let mut out: Vec<[(u32, i8); 2]> = pairs
            .iter()
            .map(|&(a, b)| {
                let mut pair = [
                    (proc.iso_faces[a.index as usize].function, a.orientation),
                    (proc.iso_faces[b.index as usize].function, b.orientation),
                ];
                pair.sort_unstable();
                pair
            })
            .collect();
        out.sort_unstable();
        out
    }

    /// Every wall polygon must bound exactly two regions, once per side.
    fn assert_faces_used_once_per_side(pairs: &[(HalfFace, HalfFace)]) {
        let mut orientations_of_face: HashMap<u32, Vec<i8>> = HashMap::new();
        for &(a, b) in pairs {
            for half in [a, b] {
                orientations_of_face.entry(half.index).or_default().push(half.orientation);
            }
        }
        for (face, mut orientations) in orientations_of_face {
            orientations.sort_unstable();
            assert_eq!(orientations, vec![-1, 1], "face {face} must wall two regions from opposite sides");
        }
    }

    /// Walking region to region through shared walls must visit every pair
    /// exactly once before closing: the fan's cyclic order.
    fn assert_single_cycle(pairs: &[(HalfFace, HalfFace)]) {
        let mut pairs_of_face: HashMap<u32, Vec<usize>> = HashMap::new();
        for (i, &(a, b)) in pairs.iter().enumerate() {
            pairs_of_face.entry(a.index).or_default().push(i);
            pairs_of_face.entry(b.index).or_default().push(i);
        }
        let mut steps = 0;
        let mut current = 0usize;
        let mut entry_face = pairs[0].0.index;
        loop {
            steps += 1;
            assert!(steps <= pairs.len(), "the region walk revisits a pair before closing");
            let (a, b) = pairs[current];
            let exit_face = if a.index == entry_face { b.index } else { a.index };
            let incident = &pairs_of_face[&exit_face];
            current = if incident[0] == current { incident[1] } else { incident[0] };
            entry_face = exit_face;
            if current == 0 {
                break;
            }
        }
        assert_eq!(steps, pairs.len(), "the regions must close into one cycle");
    }

    fn run_processor<'a>(
        scene: &Scene,
        mesh: &'a TetMesh,
        field: &'a ndarray::Array2<f64>,
    ) -> SurfaceNetworkProcessor<'a> {
        let mut proc = SurfaceNetworkProcessor::new(mesh, field, None);
        proc.run(scene).unwrap();
        proc
    }

    #[test]
    fn three_planes_through_a_common_line() {
        // Three half spaces whose boundary planes share the line
        // {y = 0.13, z = 0.17}: every edge of the branch chain carries six
        // half-faces, two per plane, interleaved around the line.
        let anchor = DVec3::new(0.0, 0.13, 0.17);
        let mut scene = Scene::new();
        let a = scene.add_primitive(Primitive::Plane { point: anchor, normal: DVec3::Y });
        let b = scene.add_primitive(Primitive::Plane { point: anchor, normal: DVec3::Z });
        let c = scene.add_primitive(Primitive::Plane { point: anchor, normal: DVec3::new(0.0, 1.0, 1.0) });
        let ab = scene.union(a, b);
        scene.union(ab, c);

        let mesh = TetMesh::generate(2, DVec3::splat(-1.0), DVec3::splat(1.0));
        let field = scene.evaluate_scalar_field(&mesh);
        let proc = run_processor(&scene, &mesh, &field);

        assert_eq!(proc.chains.len(), 1);
        let representative = proc.chains[0][0];
        assert_eq!(proc.iso_edges[representative as usize].headers.len(), 6);

        let pairs = compute_face_order(&proc, representative);
        assert_eq!(pairs.len(), 6);
        assert_faces_used_once_per_side(&pairs);
        assert_single_cycle(&pairs);

        // By angle around the line in the (y, z) plane the walls appear in
        // the order f1, f0, f2, f1, f0, f2; each wedge between consecutive
        // walls is labelled by the signs of its two bounding functions.
        let mut expected: Vec<[(u32, i8); 2]> = vec![
            [(1, 1), (0, 1)],
            [(0, -1), (2, 1)],
            [(2, -1), (1, 1)],
            [(1, -1), (0, -1)],
            [(0, 1), (2, -1)],
            [(2, 1), (1, -1)],
        ];
        for pair in &mut expected {
            pair.sort_unstable();
        }
        expected.sort_unstable();
        assert_eq!(function_pairs(&proc, &pairs), expected);
    }

    #[test]
    fn grid_aligned_planes_stitch_across_tets() {
        // The planes y = 0 and z = 0 lie on grid faces and meet along mesh
        // edges of the x axis. Every wall polygon around such an edge comes
        // from a different tet, and the quadrant regions between them merge
        // across tet boundaries; the all-negative quadrant's tets carry no
        // arrangement at all and pass the region straight through.
        let mut scene = Scene::new();
        let a = scene.add_primitive(Primitive::Plane { point: DVec3::ZERO, normal: DVec3::Y });
        let b = scene.add_primitive(Primitive::Plane { point: DVec3::ZERO, normal: DVec3::Z });
        scene.union(a, b);

        let mesh = TetMesh::generate(2, DVec3::splat(-1.0), DVec3::splat(1.0));
        let field = scene.evaluate_scalar_field(&mesh);
        let proc = run_processor(&scene, &mesh, &field);

        assert_eq!(proc.chains.len(), 1);
        let representative = proc.chains[0][0];
        let edge = &proc.iso_edges[representative as usize];
        assert_eq!(edge.headers.len(), 4);

        // Four walls from four different producing tets.
        let producing_tets: HashSet<u32> = edge
            .headers
            .iter()
            .flat_map(|h| proc.iso_faces[h.face as usize].headers.iter().map(|fh| fh.tet))
            .collect();
        assert_eq!(producing_tets.len(), 4);

        // The ring of tets containing the edge is larger than the producing
        // set and includes pass-through tets without an arrangement.
        let (va, vb) = (&proc.iso_verts[edge.v1 as usize], &proc.iso_verts[edge.v2 as usize]);
        let mut ring: Vec<u32> = proc.incidence.tets_of(va.simplex_verts[0]).to_vec();
        for &v in vb.simplex_vertices() {
            let other = proc.incidence.tets_of(v);
            ring.retain(|t| other.binary_search(t).is_ok());
        }
        assert!(ring.len() > 4, "the edge ring spans more tets than the producing ones");
        assert!(ring.iter().any(|&t| proc.arrangement_of_tet(t).is_none()));

        let pairs = compute_face_order(&proc, representative);
        assert_eq!(pairs.len(), 4);
        assert_faces_used_once_per_side(&pairs);
        assert_single_cycle(&pairs);

        // One quadrant region per sign combination of the two functions.
        let expected: Vec<[(u32, i8); 2]> = vec![
            [(0, -1), (1, -1)],
            [(0, -1), (1, 1)],
            [(0, 1), (1, -1)],
            [(0, 1), (1, 1)],
        ];
        assert_eq!(function_pairs(&proc, &pairs), expected);
    }
}
