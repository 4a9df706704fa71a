//! Topological ray shooting: resolve the nesting of surface components by
//! following a monotone path of tet edges toward the lexicographically
//! smallest mesh vertex and recording which shells the path crosses.

use ahash::AHashMap;
use glam::DVec3;

use crate::arrangement::Arrangement;

use super::{GlobalVid, SimplexKind, SurfaceNetworkProcessor, INVALID};

/// Lexicographic (x, y, z) order on points.
#[inline]
pub(super) fn point_xyz_less(p: DVec3, q: DVec3) -> bool {
    (p.x, p.y, p.z) < (q.x, q.y, q.z)
}

/// A face crossing with the side the crossing region lies on.
#[derive(Clone, Copy, Debug)]
struct FaceWithOrient {
    face: u32,
    orient: i8,
}

/// For every mesh vertex, the smallest vertex among its tet neighbours: a
/// forest of directed edges flowing to the global minimum.
pub(super) fn build_next_vert(proc: &SurfaceNetworkProcessor) -> Vec<u32> {
    let mesh = proc.mesh;
    let mut next_vert = vec![INVALID; mesh.num_vertices()];
    for tet in &mesh.tets {
        let mut min_local = 0;
        for i in 1..4 {
            if point_xyz_less(mesh.vertices[tet[i] as usize], mesh.vertices[tet[min_local] as usize]) {
                min_local = i;
            }
        }
        let min_vert = tet[min_local];
        for (i, &v) in tet.iter().enumerate() {
            if i != min_local {
                next_vert[v as usize] = min_vert;
            }
        }
    }
    next_vert
}

struct ExtremalEdges {
    /// Extremal edge (v, next_vert[v]) of component `i` at `[2i]`, `[2i+1]`.
    extremal_edge_of_component: Vec<u32>,
    /// An iso-vertex on edge (v, next_vert[v]), per vertex v.
    iso_vert_on_v_next: Vec<u32>,
    /// Component of every iso-vertex.
    component_of_iso_vert: Vec<u32>,
}

/// Find, per component, the smallest tree edge carrying one of its
/// iso-vertices, and index the data the ray walk needs.
fn find_extremal_edges(proc: &SurfaceNetworkProcessor, next_vert: &[u32]) -> ExtremalEdges {
    let points = &proc.mesh.vertices;
    let mut out = ExtremalEdges {
        extremal_edge_of_component: vec![INVALID; 2 * proc.components.len()],
        iso_vert_on_v_next: vec![INVALID; points.len()],
        component_of_iso_vert: vec![INVALID; proc.iso_verts.len()],
    };

    let mut visited = vec![false; proc.iso_verts.len()];
    for (patch, faces) in proc.patches.iter().enumerate() {
        let component = proc.component_of_patch[patch];
        for &face_id in faces {
            let face = &proc.iso_faces[face_id as usize];
            for &vid in &face.vertices {
                if visited[vid as usize] {
                    continue;
                }
                visited[vid as usize] = true;
                out.component_of_iso_vert[vid as usize] = component;
                let vert = &proc.iso_verts[vid as usize];
                if vert.simplex != SimplexKind::Edge {
                    continue;
                }
                let (v1, v2) = (vert.simplex_verts[0], vert.simplex_verts[1]);
                // Record only iso-vertices sitting on tree edges.
                let (from, to) = if next_vert[v1 as usize] == v2 {
                    (v1, v2)
                } else if next_vert[v2 as usize] == v1 {
                    (v2, v1)
                } else {
                    continue;
                };
                let (u1, u2) = {
                    let (left, right) = out
                        .extremal_edge_of_component
                        .split_at_mut(2 * component as usize + 1);
                    (&mut left[2 * component as usize], &mut right[0])
                };
                if *u1 == INVALID {
                    *u1 = from;
                    *u2 = to;
                } else if to == *u2 {
                    if point_xyz_less(points[from as usize], points[*u1 as usize]) {
                        *u1 = from;
                    }
                } else if point_xyz_less(points[to as usize], points[*u2 as usize]) {
                    *u1 = from;
                    *u2 = to;
                }
                out.iso_vert_on_v_next[from as usize] = vid;
            }
        }
    }
    out
}

/// Ordered arrangement vertices along the tet edge from local corner `v` to
/// local corner `u` (corners are local plane indices 0..4): the corner's
/// vertex id, the crossing ids in order, the far corner's vertex id.
fn compute_edge_intersection_order(arrangement: &Arrangement, v: u32, u: u32) -> Vec<u32> {
    let vertices = &arrangement.vertices;
    let faces = &arrangement.faces;

    let mut edge_flag = [true; 4];
    edge_flag[v as usize] = false;
    edge_flag[u as usize] = false;

    // Vertices on edge v->u carry the two boundary planes adjacent to it.
    let mut v_id = INVALID;
    let mut u_id = INVALID;
    let mut on_edge = vec![false; vertices.len()];
    let mut interior_count = 0usize;
    for (i, point) in vertices.iter().enumerate() {
        let mut flag_count = 0;
        let mut other_plane = INVALID;
        for &p in point {
            if p < 4 {
                if edge_flag[p as usize] {
                    flag_count += 1;
                } else {
                    other_plane = p;
                }
            }
        }
        if flag_count == 2 {
            on_edge[i] = true;
            if other_plane == u {
                v_id = i as u32;
            } else if other_plane == v {
                u_id = i as u32;
            } else {
                interior_count += 1;
            }
        }
    }
    debug_assert!(v_id != INVALID && u_id != INVALID);
    if interior_count == 0 {
        return vec![v_id, u_id];
    }

    // The faces on the boundary triangle containing v->u and a third corner.
    let w = (0..4u32).find(|&i| edge_flag[i as usize]).expect("two corners remain");
    let faces_on_triangle: Vec<u32> = (0..faces.len() as u32)
        .filter(|&f| {
            let face = &faces[f as usize];
            face.negative_cell == INVALID && face.supporting_plane == w
        })
        .collect();

    // Edge -> (face, face) connectivity within the triangle.
    let mut faces_of_edge: AHashMap<(u32, u32), (u32, u32)> = AHashMap::new();
    for &f in &faces_on_triangle {
        let face = &faces[f as usize];
        let n = face.vertices.len();
        for i in 0..n {
            let a = face.vertices[i];
            let b = face.vertices[(i + 1) % n];
            for key in [(a, b), (b, a)] {
                faces_of_edge
                    .entry(key)
                    .and_modify(|pair| pair.1 = f)
                    .or_insert((f, INVALID));
            }
        }
    }

    // Start at the face that touches v and has an edge on v->u.
    let f_start = *faces_on_triangle
        .iter()
        .find(|&&f| {
            let face = &faces[f as usize];
            let touches_v = face.vertices.contains(&v_id);
            let on_edge_count = face.vertices.iter().filter(|&&vi| on_edge[vi as usize]).count();
            touches_v && on_edge_count == 2
        })
        .expect("a triangle face starts the trace at v");

    // March from v to u, hopping faces; record each vertex met on the edge.
    let mut order = Vec::with_capacity(interior_count + 2);
    order.push(v_id);
    let mut visited_face = vec![false; faces.len()];
    let mut v_curr = v_id;
    let mut f_curr = f_start;
    while v_curr != u_id {
        let face = &faces[f_curr as usize];
        let n = face.vertices.len();
        let mut edge_next = None;
        let mut edge_on_vu = None;
        for i in 0..n {
            let a = face.vertices[i];
            let b = face.vertices[(i + 1) % n];
            match (on_edge[a as usize], on_edge[b as usize]) {
                (true, true) => edge_on_vu = Some((a, b)),
                (true, false) | (false, true) => {
                    let anchor = if on_edge[a as usize] { a } else { b };
                    let pair = faces_of_edge[&(a, b)];
                    let other = if pair.0 == f_curr { pair.1 } else { pair.0 };
                    let is_behind = anchor == v_id || (other != INVALID && visited_face[other as usize]);
                    if !is_behind {
                        edge_next = Some((a, b));
                    }
                }
                (false, false) => {}
            }
        }

        visited_face[f_curr as usize] = true;
        if let Some((a, b)) = edge_on_vu {
            // Advance along the edge.
            v_curr = if a == v_curr { b } else { a };
            order.push(v_curr);
            if v_curr == u_id {
                break;
            }
        }
        let (a, b) = edge_next.expect("the trace continues until u");
        let pair = faces_of_edge[&(a, b)];
        f_curr = if pair.0 == f_curr { pair.1 } else { pair.0 };
        debug_assert!(f_curr != INVALID);
    }
    order
}

/// The two faces of the cell between `v1` and `v2` (consecutive on a tet
/// edge) that the ray pierces: one passing `v1`, one passing `v2`.
fn compute_passing_face_pair(
    arrangement: &Arrangement,
    v1: u32,
    v2: u32,
) -> (FaceWithOrient, FaceWithOrient) {
    let cell_id = cell_between(arrangement, v1, v2);
    let cell = &arrangement.cells[cell_id as usize];

    let mut out1 = None;
    let mut out2 = None;
    for &f in &cell.faces {
        let face = &arrangement.faces[f as usize];
        let has_v1 = face.vertices.contains(&v1);
        let has_v2 = face.vertices.contains(&v2);
        let orient = if face.positive_cell == cell_id { 1 } else { -1 };
        if has_v1 && !has_v2 {
            out1 = Some(FaceWithOrient { face: f, orient });
        } else if has_v2 && !has_v1 {
            out2 = Some(FaceWithOrient { face: f, orient });
        }
    }
    (out1.expect("a face passes v1"), out2.expect("a face passes v2"))
}

/// The face of the cell between `v` and `u` passing `v` (the ray exits the
/// tet at corner `u`).
fn compute_passing_face(arrangement: &Arrangement, v: u32, u: u32) -> FaceWithOrient {
    let cell_id = cell_between(arrangement, v, u);
    let cell = &arrangement.cells[cell_id as usize];
    for &f in &cell.faces {
        let face = &arrangement.faces[f as usize];
        if face.vertices.contains(&v) && !face.vertices.contains(&u) {
            let orient = if face.positive_cell == cell_id { 1 } else { -1 };
            return FaceWithOrient { face: f, orient };
        }
    }
    unreachable!("a face passes v away from u");
}

/// The cell bordering segment (v1, v2) of a tet edge: the positive cell of
/// any face whose boundary contains the segment.
fn cell_between(arrangement: &Arrangement, v1: u32, v2: u32) -> u32 {
    for face in &arrangement.faces {
        let n = face.vertices.len();
        for i in 0..n {
            let a = face.vertices[i];
            let b = face.vertices[(i + 1) % n];
            if (a == v1 && b == v2) || (a == v2 && b == v1) {
                return face.positive_cell;
            }
        }
    }
    unreachable!("consecutive edge vertices bound a face");
}

/// Shell id of a half-face given its orientation relative to the crossing
/// region.
fn shell_of_crossing(proc: &SurfaceNetworkProcessor, tet: u32, crossing: FaceWithOrient) -> u32 {
    let iso_face = proc.tables.iso_faces_of_tet(tet)[crossing.face as usize];
    debug_assert!(iso_face != INVALID, "the pierced face lies on the surface");
    let patch = proc.patch_of_face[iso_face as usize];
    let half_patch = if crossing.orient == 1 { 2 * patch } else { 2 * patch + 1 };
    proc.shell_of_half_patch[half_patch as usize]
}

/// Shoot one topological ray per component and link the shells the ray
/// connects; `INVALID` links to the unbounded outside.
pub(super) fn topo_ray_shooting(proc: &SurfaceNetworkProcessor) -> Vec<(u32, u32)> {
    let next_vert = build_next_vert(proc);
    let extremal = find_extremal_edges(proc, &next_vert);

    let mut shell_links: Vec<(u32, u32)> = Vec::with_capacity(proc.components.len());
    for component in 0..proc.components.len() as u32 {
        // Extremal tree edge v1 -> v2 of this component.
        let extreme_v1 = extremal.extremal_edge_of_component[2 * component as usize];
        let extreme_v2 = extremal.extremal_edge_of_component[2 * component as usize + 1];
        debug_assert!(extreme_v1 != INVALID, "every component meets a tree edge");
        let iso_vid = extremal.iso_vert_on_v_next[extreme_v1 as usize];
        let tet = proc.iso_verts[iso_vid as usize].tet;
        let arrangement = proc.arrangement_of_tet(tet).expect("the producing tet has an arrangement");

        let (local_v1, local_v2) = local_corners(proc, tet, extreme_v1, extreme_v2);
        let order = compute_edge_intersection_order(arrangement, local_v1, local_v2);

        // The vertex of this component on v1->v2 nearest to v2.
        let table = proc.tables.vids_of_tet(tet);
        let mut start = None;
        for (j, &vid) in order.iter().enumerate().take(order.len() - 1) {
            if let GlobalVid::Iso(global) = table[vid as usize] {
                if extremal.component_of_iso_vert[global as usize] == component {
                    start = Some(j);
                }
            }
        }
        let start = start.expect("the extremal vertex lies on the traced edge");

        if start + 2 < order.len() {
            // Another vertex sits between the start and v2: the ray crosses
            // into the neighbouring region inside this very tet.
            let (crossing1, crossing2) = compute_passing_face_pair(arrangement, order[start], order[start + 1]);
            let shell1 = shell_of_crossing(proc, tet, crossing1);
            let shell2 = shell_of_crossing(proc, tet, crossing2);
            shell_links.push((shell1, shell2));
        } else {
            // Leave through v2 and follow the tree to the next hit or sink.
            let crossing = compute_passing_face(arrangement, order[start], *order.last().unwrap());
            let shell_start = shell_of_crossing(proc, tet, crossing);

            let mut v_curr = extreme_v2;
            while next_vert[v_curr as usize] != INVALID
                && extremal.iso_vert_on_v_next[v_curr as usize] == INVALID
            {
                v_curr = next_vert[v_curr as usize];
            }
            if extremal.iso_vert_on_v_next[v_curr as usize] != INVALID {
                let iso_end = extremal.iso_vert_on_v_next[v_curr as usize];
                let end_tet = proc.iso_verts[iso_end as usize].tet;
                let end_arrangement =
                    proc.arrangement_of_tet(end_tet).expect("the producing tet has an arrangement");
                let v_next = next_vert[v_curr as usize];
                let (local_v1, local_v2) = local_corners(proc, end_tet, v_curr, v_next);
                let end_order = compute_edge_intersection_order(end_arrangement, local_v1, local_v2);
                // Enter the end tet from its v side: the first crossing.
                let crossing = compute_passing_face(end_arrangement, end_order[1], end_order[0]);
                let shell_end = shell_of_crossing(proc, end_tet, crossing);
                shell_links.push((shell_start, shell_end));
            } else {
                // Fell off the mesh: the region is the outside.
                shell_links.push((shell_start, INVALID));
            }
        }
    }
    shell_links
}

/// Local corner indices (0..4) of two mesh vertices inside a tet.
fn local_corners(proc: &SurfaceNetworkProcessor, tet: u32, v1: u32, v2: u32) -> (u32, u32) {
    let corners = proc.mesh.tets[tet as usize];
    let mut local_v1 = INVALID;
    let mut local_v2 = INVALID;
    for (i, &c) in corners.iter().enumerate() {
        if c == v1 {
            local_v1 = i as u32;
        } else if c == v2 {
            local_v2 = i as u32;
        }
    }
    debug_assert!(local_v1 != INVALID && local_v2 != INVALID);
    (local_v1, local_v2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrangement::compute_arrangement;

    #[test]
    fn edge_order_without_crossings() {
        let owned = compute_arrangement(&[], None).unwrap();
        let arrangement = &*owned;
        // Edge from corner 0 to corner 1 (local planes 0 and 1).
        let order = compute_edge_intersection_order(&arrangement, 0, 1);
        assert_eq!(order.len(), 2);
        // The first is the corner opposite plane triple missing 0.
        let first = arrangement.vertices[order[0] as usize];
        assert!(!first.contains(&0));
        assert!(first.contains(&1));
        let last = arrangement.vertices[order[1] as usize];
        assert!(!last.contains(&1));
    }

    #[test]
    fn edge_order_single_crossing() {
        // Plane positive only at corner 0: it crosses the edges at corner 0.
        let arrangement = compute_arrangement(&[[1.0, -1.0, -1.0, -1.0]], None).unwrap();
        let order = compute_edge_intersection_order(&arrangement, 0, 1);
        assert_eq!(order.len(), 3);
        // The middle vertex lies on the cut plane.
        let middle = arrangement.vertices[order[1] as usize];
        assert!(middle.contains(&4));
    }

    #[test]
    fn edge_order_two_crossings_sorted_from_v() {
        // Two nested cuts crossing the 0-1 edge: corner-0 side first.
        let near = [1.0, -3.0, -3.0, -3.0];
        let far = [3.0, -1.0, -1.0, -1.0];
        let owned = compute_arrangement(&[near, far], None).unwrap();
        let arrangement = &*owned;
        let order = compute_edge_intersection_order(&arrangement, 0, 1);
        assert_eq!(order.len(), 4);
        // From corner 0: first the `near` plane (4), then `far` (5).
        assert!(arrangement.vertices[order[1] as usize].contains(&4));
        assert!(arrangement.vertices[order[2] as usize].contains(&5));
    }

    #[test]
    fn passing_faces_straddle_a_crossing() {
        let near = [1.0, -3.0, -3.0, -3.0];
        let far = [3.0, -1.0, -1.0, -1.0];
        let owned = compute_arrangement(&[near, far], None).unwrap();
        let arrangement = &*owned;
        let order = compute_edge_intersection_order(&arrangement, 0, 1);
        let (f1, f2) = compute_passing_face_pair(&arrangement, order[1], order[2]);
        // The pierced faces support the two cut planes.
        let p1 = arrangement.faces[f1.face as usize].supporting_plane;
        let p2 = arrangement.faces[f2.face as usize].supporting_plane;
        assert_eq!((p1.min(p2), p1.max(p2)), (4, 5));
    }
}
