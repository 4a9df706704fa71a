//! Insertion of one plane (or line) into a simplicial cell complex.
//!
//! Cutting proceeds bottom-up: sign every vertex, split crossed edges, split
//! crossed faces with a new cut edge, then (in 3-D) split crossed cells with
//! a new cut face chained from the cut edges. Afterwards the complex is
//! compacted to active geometry only.

use crate::containers::{DynamicBitset, FlatMap};
use crate::predicates::{orient2d, orient3d, Orientation};

use super::complex::{compact, Complex2, Complex3, Edge2, Edge3, Face2, Face3, Cell3};
use super::{DegeneratePlaneError, LineGroup, PlaneGroup, INVALID};

/// Sign of the new plane at every existing vertex of the complex.
pub(super) fn cut_vertices_3(
    planes: &PlaneGroup,
    complex: &Complex3,
    plane: u32,
) -> Result<Vec<i8>, DegeneratePlaneError> {
    let p = planes.get(plane);
    complex
        .vertices
        .iter()
        .map(|&[i0, i1, i2]| {
            match orient3d(planes.get(i0), planes.get(i1), planes.get(i2), p) {
                Orientation::Invalid => Err(DegeneratePlaneError { plane }),
                o => Ok(o.sign()),
            }
        })
        .collect()
}

pub(super) fn cut_vertices_2(
    lines: &LineGroup,
    complex: &Complex2,
    line: u32,
) -> Result<Vec<i8>, DegeneratePlaneError> {
    let l = lines.get(line);
    complex
        .vertices
        .iter()
        .map(|&[i0, i1]| match orient2d(lines.get(i0), lines.get(i1), l) {
            Orientation::Invalid => Err(DegeneratePlaneError { plane: line }),
            o => Ok(o.sign()),
        })
        .collect()
}

/// Split edge `eid` along the new plane.
///
/// Returns `[positive_subedge, negative_subedge, intersection_vertex]`; both
/// subedge slots are `INVALID` iff the edge is coplanar with the plane.
pub(super) fn cut_edge_3(complex: &mut Complex3, eid: u32, plane: u32, orientations: &[i8]) -> [u32; 3] {
    let e = complex.edges[eid as usize].clone();
    let [v0, v1] = e.vertices;
    let (o0, o1) = (orientations[v0 as usize], orientations[v1 as usize]);

    let mut intersection = INVALID;
    if o0 == 0 {
        intersection = v0;
    } else if o1 == 0 {
        intersection = v1;
    }

    // A coplanar edge (o0 == 0 && o1 == 0) splits nothing.
    if o0 >= 0 && o1 >= 0 {
        return [eid, INVALID, intersection];
    }
    if o0 <= 0 && o1 <= 0 {
        return [INVALID, eid, intersection];
    }

    // Proper crossing: a new vertex on the edge's two supporting planes.
    debug_assert!(intersection == INVALID);
    complex.vertices.push([e.supporting_planes[0], e.supporting_planes[1], plane]);
    intersection = (complex.vertices.len() - 1) as u32;

    let (positive_half, negative_half) = if o0 > 0 {
        ([v0, intersection], [intersection, v1])
    } else {
        ([intersection, v1], [v0, intersection])
    };
    complex.edges.push(Edge3 { vertices: positive_half, supporting_planes: e.supporting_planes });
    complex.edges.push(Edge3 { vertices: negative_half, supporting_planes: e.supporting_planes });
    let positive_subedge = (complex.edges.len() - 2) as u32;
    [positive_subedge, positive_subedge + 1, intersection]
}

pub(super) fn cut_edge_2(complex: &mut Complex2, eid: u32, line: u32, orientations: &[i8]) -> [u32; 3] {
    let e = complex.edges[eid as usize].clone();
    let [v0, v1] = e.vertices;
    let (o0, o1) = (orientations[v0 as usize], orientations[v1 as usize]);

    let mut intersection = INVALID;
    if o0 == 0 {
        intersection = v0;
    } else if o1 == 0 {
        intersection = v1;
    }

    if o0 >= 0 && o1 >= 0 {
        return [eid, INVALID, intersection];
    }
    if o0 <= 0 && o1 <= 0 {
        return [INVALID, eid, intersection];
    }

    debug_assert!(intersection == INVALID);
    complex.vertices.push([e.supporting_line, line]);
    intersection = (complex.vertices.len() - 1) as u32;

    let (positive_half, negative_half) = if o0 > 0 {
        ([v0, intersection], [intersection, v1])
    } else {
        ([intersection, v1], [v0, intersection])
    };
    for vertices in [positive_half, negative_half] {
        complex.edges.push(Edge2 {
            vertices,
            supporting_line: e.supporting_line,
            positive_face: e.positive_face,
            negative_face: e.negative_face,
        });
    }
    let positive_subedge = (complex.edges.len() - 2) as u32;
    [positive_subedge, positive_subedge + 1, intersection]
}

/// Vertex shared by face boundary edge `local` and its cyclic successor.
fn end_vertex_3(complex: &Complex3, face_edges: &[u32], local: usize) -> u32 {
    let e0 = &complex.edges[face_edges[local] as usize];
    let e1 = &complex.edges[face_edges[(local + 1) % face_edges.len()] as usize];
    if e1.vertices.contains(&e0.vertices[0]) {
        e0.vertices[0]
    } else {
        debug_assert!(e1.vertices.contains(&e0.vertices[1]));
        e0.vertices[1]
    }
}

fn end_vertex_2(complex: &Complex2, face_edges: &[u32], local: usize) -> u32 {
    let e0 = &complex.edges[face_edges[local] as usize];
    let e1 = &complex.edges[face_edges[(local + 1) % face_edges.len()] as usize];
    if e1.vertices.contains(&e0.vertices[0]) {
        e0.vertices[0]
    } else {
        debug_assert!(e1.vertices.contains(&e0.vertices[1]));
        e0.vertices[1]
    }
}

/// Split face `fid` along the new plane.
///
/// Returns `[positive_subface, negative_subface, cut_edge]`. Both subface
/// slots are `INVALID` iff the face is coplanar with the plane; one slot is
/// the face itself when the plane misses it.
pub(super) fn cut_face_3(
    complex: &mut Complex3,
    fid: u32,
    plane: u32,
    orientations: &[i8],
    subedges: &[[u32; 3]],
) -> [u32; 3] {
    let face_edges = complex.faces[fid as usize].edges.clone();
    let num_boundary_edges = face_edges.len();

    let mut positive_subedges: Vec<u32> = Vec::with_capacity(num_boundary_edges);
    let mut negative_subedges: Vec<u32> = Vec::with_capacity(num_boundary_edges);
    let mut cut_edge_vertices = [INVALID; 2];
    let mut cut_edge_index = INVALID;
    let mut face_is_coplanar = true;
    let mut positive_chain_end = INVALID;
    let mut negative_chain_end = INVALID;

    for (local, &eid) in face_edges.iter().enumerate() {
        let [positive_subedge, negative_subedge, intersection] = subedges[eid as usize];
        let mut last_positive = false;
        let mut last_negative = false;

        if positive_subedge == INVALID && negative_subedge == INVALID {
            // The edge lies on the new plane; it becomes the cut edge.
            cut_edge_index = eid;
            continue;
        }
        if positive_subedge != INVALID {
            positive_subedges.push(positive_subedge);
            if orientations[end_vertex_3(complex, &face_edges, local) as usize] <= 0 {
                positive_chain_end = positive_subedges.len() as u32;
                last_positive = true;
            }
        }
        if negative_subedge != INVALID {
            negative_subedges.push(negative_subedge);
            if orientations[end_vertex_3(complex, &face_edges, local) as usize] >= 0 {
                negative_chain_end = negative_subedges.len() as u32;
                last_negative = true;
            }
        }
        face_is_coplanar = false;
        if intersection != INVALID {
            if last_positive {
                cut_edge_vertices[0] = intersection;
            } else if last_negative {
                cut_edge_vertices[1] = intersection;
            }
        }
    }

    if face_is_coplanar {
        return [INVALID, INVALID, INVALID];
    }

    if positive_subedges.is_empty() {
        return [INVALID, fid, cut_edge_index];
    }
    if negative_subedges.is_empty() {
        return [fid, INVALID, cut_edge_index];
    }

    // Proper crossing: insert the cut edge joining the two chain breaks.
    debug_assert!(cut_edge_index == INVALID);
    let old = &complex.faces[fid as usize];
    let (supporting_plane, positive_cell, negative_cell) =
        (old.supporting_plane, old.positive_cell, old.negative_cell);
    complex.edges.push(Edge3 {
        vertices: cut_edge_vertices,
        supporting_planes: [supporting_plane, plane],
    });
    cut_edge_index = (complex.edges.len() - 1) as u32;

    // Rotate each chain so the cut edge closes its loop, then emit subfaces.
    if positive_chain_end != positive_subedges.len() as u32 {
        positive_subedges.rotate_left(positive_chain_end as usize);
    }
    if negative_chain_end != negative_subedges.len() as u32 {
        negative_subedges.rotate_left(negative_chain_end as usize);
    }
    positive_subedges.push(cut_edge_index);
    negative_subedges.push(cut_edge_index);
    debug_assert!(positive_subedges.len() > 2 && negative_subedges.len() > 2);

    complex.faces.push(Face3 {
        edges: positive_subedges,
        supporting_plane,
        positive_cell,
        negative_cell,
    });
    complex.faces.push(Face3 {
        edges: negative_subedges,
        supporting_plane,
        positive_cell,
        negative_cell,
    });
    let positive_fid = (complex.faces.len() - 2) as u32;
    [positive_fid, positive_fid + 1, cut_edge_index]
}

pub(super) fn cut_face_2(
    complex: &mut Complex2,
    fid: u32,
    line: u32,
    orientations: &[i8],
    subedges: &[[u32; 3]],
) -> [u32; 3] {
    let face_edges = complex.faces[fid as usize].edges.clone();
    let num_boundary_edges = face_edges.len();

    let mut positive_subedges: Vec<u32> = Vec::with_capacity(num_boundary_edges);
    let mut negative_subedges: Vec<u32> = Vec::with_capacity(num_boundary_edges);
    let mut cut_edge_vertices = [INVALID; 2];
    let mut cut_edge_index = INVALID;
    let mut face_is_coplanar = true;
    let mut positive_chain_end = INVALID;
    let mut negative_chain_end = INVALID;

    for (local, &eid) in face_edges.iter().enumerate() {
        let [positive_subedge, negative_subedge, intersection] = subedges[eid as usize];
        let mut last_positive = false;
        let mut last_negative = false;

        if positive_subedge == INVALID && negative_subedge == INVALID {
            cut_edge_index = eid;
            continue;
        }
        if positive_subedge != INVALID {
            positive_subedges.push(positive_subedge);
            if orientations[end_vertex_2(complex, &face_edges, local) as usize] <= 0 {
                positive_chain_end = positive_subedges.len() as u32;
                last_positive = true;
            }
        }
        if negative_subedge != INVALID {
            negative_subedges.push(negative_subedge);
            if orientations[end_vertex_2(complex, &face_edges, local) as usize] >= 0 {
                negative_chain_end = negative_subedges.len() as u32;
                last_negative = true;
            }
        }
        face_is_coplanar = false;
        if intersection != INVALID {
            if last_positive {
                cut_edge_vertices[0] = intersection;
            } else if last_negative {
                cut_edge_vertices[1] = intersection;
            }
        }
    }

    if face_is_coplanar {
        return [INVALID, INVALID, INVALID];
    }

    if positive_subedges.is_empty() {
        complex.faces[fid as usize].signs.set(line as usize, false);
        return [INVALID, fid, cut_edge_index];
    }
    if negative_subedges.is_empty() {
        complex.faces[fid as usize].signs.set(line as usize, true);
        return [fid, INVALID, cut_edge_index];
    }

    debug_assert!(cut_edge_index == INVALID);
    complex.edges.push(Edge2 {
        vertices: cut_edge_vertices,
        supporting_line: line,
        positive_face: INVALID,
        negative_face: INVALID,
    });
    cut_edge_index = (complex.edges.len() - 1) as u32;

    if positive_chain_end != positive_subedges.len() as u32 {
        positive_subedges.rotate_left(positive_chain_end as usize);
    }
    if negative_chain_end != negative_subedges.len() as u32 {
        negative_subedges.rotate_left(negative_chain_end as usize);
    }
    positive_subedges.push(cut_edge_index);
    negative_subedges.push(cut_edge_index);

    let mut positive_signs = complex.faces[fid as usize].signs.clone();
    let mut negative_signs = positive_signs.clone();
    positive_signs.set(line as usize, true);
    negative_signs.set(line as usize, false);

    complex.faces.push(Face2 { edges: positive_subedges, signs: positive_signs });
    complex.faces.push(Face2 { edges: negative_subedges, signs: negative_signs });
    let positive_fid = (complex.faces.len() - 2) as u32;
    let negative_fid = positive_fid + 1;

    // Re-point edge->face references from the split face to its halves.
    complex.edges[cut_edge_index as usize].positive_face = positive_fid;
    complex.edges[cut_edge_index as usize].negative_face = negative_fid;
    for (new_fid, local_face) in [(positive_fid, positive_fid), (negative_fid, negative_fid)] {
        let edges = complex.faces[local_face as usize].edges.clone();
        for eid in edges {
            if eid == cut_edge_index {
                continue;
            }
            let e = &mut complex.edges[eid as usize];
            debug_assert!(e.positive_face == fid || e.negative_face == fid);
            if e.positive_face == fid {
                e.positive_face = new_fid;
            } else {
                e.negative_face = new_fid;
            }
        }
    }

    [positive_fid, negative_fid, cut_edge_index]
}

/// Split cell `cid` along the new plane.
///
/// Returns `[positive_subcell, negative_subcell, cut_face]`; both subcell
/// slots are `INVALID` iff the plane misses the cell entirely.
pub(super) fn cut_cell_3(complex: &mut Complex3, cid: u32, plane: u32, subfaces: &[[u32; 3]]) -> [u32; 3] {
    let cell_faces = complex.cells[cid as usize].faces.clone();

    let mut cut_face_id = INVALID;
    let mut positive_subfaces: Vec<u32> = Vec::with_capacity(cell_faces.len() + 1);
    let mut negative_subfaces: Vec<u32> = Vec::with_capacity(cell_faces.len() + 1);
    let mut cut_edges: Vec<u32> = Vec::with_capacity(cell_faces.len());
    let mut cut_edge_orientations: Vec<bool> = Vec::with_capacity(cell_faces.len());

    for &fid in &cell_faces {
        let subface = subfaces[fid as usize];
        if subface[0] == INVALID && subface[1] == INVALID {
            cut_face_id = fid;
        }
        if subface[0] != INVALID {
            positive_subfaces.push(subface[0]);
        }
        if subface[1] != INVALID {
            negative_subfaces.push(subface[1]);
        }
        if subface[2] != INVALID {
            cut_edges.push(subface[2]);
            cut_edge_orientations.push(cut_edge_orientation(complex, cid, fid, subface));
        }
    }

    if positive_subfaces.is_empty() && negative_subfaces.is_empty() {
        // The plane does not cross this cell at all.
        return [INVALID, INVALID, INVALID];
    }
    if positive_subfaces.is_empty() {
        complex.cells[cid as usize].signs.set(plane as usize, false);
        return [INVALID, cid, cut_face_id];
    }
    if negative_subfaces.is_empty() {
        complex.cells[cid as usize].signs.set(plane as usize, true);
        return [cid, INVALID, cut_face_id];
    }

    // Chain the cut edges into a closed loop.
    {
        let num_cut_edges = cut_edges.len();
        debug_assert!(num_cut_edges >= 3);
        let mut edge_at_vertex: FlatMap<u32, u32> = FlatMap::with_capacity(num_cut_edges);
        for (i, &eid) in cut_edges.iter().enumerate() {
            let e = &complex.edges[eid as usize];
            let start = if cut_edge_orientations[i] { e.vertices[0] } else { e.vertices[1] };
            edge_at_vertex.insert(start, i as u32);
        }
        let mut chained: Vec<u32> = Vec::with_capacity(num_cut_edges);
        chained.push(0);
        while chained.len() < num_cut_edges {
            let i = *chained.last().unwrap() as usize;
            let e = &complex.edges[cut_edges[i] as usize];
            let tip = if cut_edge_orientations[i] { e.vertices[1] } else { e.vertices[0] };
            let next = *edge_at_vertex.get(&tip).expect("cut edges must chain into a loop");
            if cut_edges[next as usize] == cut_edges[chained[0] as usize] {
                break;
            }
            chained.push(next);
        }
        cut_edges = chained.iter().map(|&i| cut_edges[i as usize]).collect();
    }

    // Cross cut: a new face on the inserted plane.
    complex.faces.push(Face3 {
        edges: cut_edges,
        supporting_plane: plane,
        positive_cell: INVALID,
        negative_cell: INVALID,
    });
    cut_face_id = (complex.faces.len() - 1) as u32;

    positive_subfaces.push(cut_face_id);
    negative_subfaces.push(cut_face_id);
    let mut positive_signs = complex.cells[cid as usize].signs.clone();
    let mut negative_signs = positive_signs.clone();
    positive_signs.set(plane as usize, true);
    negative_signs.set(plane as usize, false);

    complex.cells.push(Cell3 { faces: positive_subfaces, signs: positive_signs });
    complex.cells.push(Cell3 { faces: negative_subfaces, signs: negative_signs });
    let positive_cell_id = (complex.cells.len() - 2) as u32;
    let negative_cell_id = positive_cell_id + 1;

    // Re-point face->cell references from the split cell to its halves.
    complex.faces[cut_face_id as usize].positive_cell = positive_cell_id;
    complex.faces[cut_face_id as usize].negative_cell = negative_cell_id;
    for new_cid in [positive_cell_id, negative_cell_id] {
        let faces = complex.cells[new_cid as usize].faces.clone();
        for fid in faces {
            if fid == cut_face_id {
                continue;
            }
            let f = &mut complex.faces[fid as usize];
            debug_assert!(f.positive_cell == cid || f.negative_cell == cid);
            if f.positive_cell == cid {
                f.positive_cell = new_cid;
            } else {
                f.negative_cell = new_cid;
            }
        }
    }

    [positive_cell_id, negative_cell_id, cut_face_id]
}

/// Direction of a cut edge with respect to the loop being chained.
fn cut_edge_orientation(complex: &Complex3, cid: u32, fid: u32, subface: [u32; 3]) -> bool {
    debug_assert!(subface[2] != INVALID);
    let face = &complex.faces[fid as usize];
    let s = complex.cells[cid as usize].signs.get(face.supporting_plane as usize);

    if subface[0] == INVALID || subface[1] == INVALID {
        // The intersection edge lies on the boundary of an uncut face.
        let local = face
            .edges
            .iter()
            .position(|&e| e == subface[2])
            .expect("cut edge must bound its face");
        let next = (local + 1) % face.edges.len();
        let curr_e = &complex.edges[face.edges[local] as usize];
        let next_e = &complex.edges[face.edges[next] as usize];
        let edge_is_consistent_with_face = next_e.vertices.contains(&curr_e.vertices[1]);
        let on_positive_side = subface[0] != INVALID;
        let key = u8::from(s) + u8::from(edge_is_consistent_with_face) + u8::from(on_positive_side);
        key % 2 == 0
    } else {
        // The intersection edge is a cross cut.
        !s
    }
}

/// Drop faces, edges and vertices no longer referenced by any cell.
pub(super) fn remove_unused_geometry_3(complex: &mut Complex3) {
    // Faces referenced by cells.
    {
        let mut keep = DynamicBitset::new(complex.faces.len(), false);
        for cell in &complex.cells {
            for &fid in &cell.faces {
                keep.set(fid as usize, true);
            }
        }
        let index_map = compact(&mut complex.faces, &keep);
        for cell in &mut complex.cells {
            for fid in &mut cell.faces {
                debug_assert!(index_map[*fid as usize] != INVALID);
                *fid = index_map[*fid as usize];
            }
        }
    }
    // Edges referenced by faces.
    {
        let mut keep = DynamicBitset::new(complex.edges.len(), false);
        for face in &complex.faces {
            for &eid in &face.edges {
                keep.set(eid as usize, true);
            }
        }
        let index_map = compact(&mut complex.edges, &keep);
        for face in &mut complex.faces {
            for eid in &mut face.edges {
                debug_assert!(index_map[*eid as usize] != INVALID);
                *eid = index_map[*eid as usize];
            }
        }
    }
    // Vertices referenced by edges.
    {
        let mut keep = DynamicBitset::new(complex.vertices.len(), false);
        for edge in &complex.edges {
            for &vid in &edge.vertices {
                debug_assert!(vid != INVALID);
                keep.set(vid as usize, true);
            }
        }
        let index_map = compact(&mut complex.vertices, &keep);
        for edge in &mut complex.edges {
            edge.vertices = edge.vertices.map(|v| index_map[v as usize]);
        }
    }
}

pub(super) fn remove_unused_geometry_2(complex: &mut Complex2) {
    // Edges referenced by faces.
    {
        let mut keep = DynamicBitset::new(complex.edges.len(), false);
        for face in &complex.faces {
            for &eid in &face.edges {
                keep.set(eid as usize, true);
            }
        }
        let index_map = compact(&mut complex.edges, &keep);
        for face in &mut complex.faces {
            for eid in &mut face.edges {
                *eid = index_map[*eid as usize];
            }
        }
    }
    // Vertices referenced by edges.
    {
        let mut keep = DynamicBitset::new(complex.vertices.len(), false);
        for edge in &complex.edges {
            for &vid in &edge.vertices {
                keep.set(vid as usize, true);
            }
        }
        let index_map = compact(&mut complex.vertices, &keep);
        for edge in &mut complex.edges {
            edge.vertices = edge.vertices.map(|v| index_map[v as usize]);
        }
    }
}

/// Insert one plane into the complex. Returns the id of an existing coplanar
/// plane if the new plane duplicates one, `INVALID` otherwise.
pub(super) fn add_plane_3(
    planes: &PlaneGroup,
    complex: &mut Complex3,
    plane: u32,
) -> Result<u32, DegeneratePlaneError> {
    if planes.get(plane).iter().all(|&c| c == 0.0) {
        // Identically zero over the simplex; it cannot be signed.
        return Err(DegeneratePlaneError { plane });
    }
    let num_edges = complex.edges.len();
    let num_faces = complex.faces.len();
    let num_cells = complex.cells.len();

    let orientations = cut_vertices_3(planes, complex, plane)?;

    let mut subedges: Vec<[u32; 3]> = Vec::with_capacity(num_edges);
    for eid in 0..num_edges as u32 {
        subedges.push(cut_edge_3(complex, eid, plane, &orientations));
    }

    let mut subfaces: Vec<[u32; 3]> = Vec::with_capacity(num_faces);
    for fid in 0..num_faces as u32 {
        subfaces.push(cut_face_3(complex, fid, plane, &orientations, &subedges));
    }

    let mut subcells: Vec<[u32; 3]> = Vec::with_capacity(num_cells);
    for cid in 0..num_cells as u32 {
        subcells.push(cut_cell_3(complex, cid, plane, &subfaces));
    }

    // A face whose subface entries are both INVALID lies on the new plane:
    // the plane duplicates that face's supporting plane. Read this before
    // compaction invalidates face indices.
    let mut coplanar_plane = INVALID;
    for (fid, subface) in subfaces.iter().enumerate().take(num_faces) {
        if subface[0] == INVALID && subface[1] == INVALID {
            coplanar_plane = complex.faces[fid].supporting_plane;
        }
    }

    // Drop split cells and re-point face->cell indices.
    {
        let mut keep = DynamicBitset::new(complex.cells.len(), false);
        for subcell in &subcells {
            if subcell[0] != INVALID {
                keep.set(subcell[0] as usize, true);
            }
            if subcell[1] != INVALID {
                keep.set(subcell[1] as usize, true);
            }
        }
        let index_map = compact(&mut complex.cells, &keep);
        for face in &mut complex.faces {
            if face.positive_cell != INVALID {
                face.positive_cell = index_map[face.positive_cell as usize];
            }
            if face.negative_cell != INVALID {
                face.negative_cell = index_map[face.negative_cell as usize];
            }
        }
    }

    remove_unused_geometry_3(complex);
    Ok(coplanar_plane)
}

/// Insert one line into the 2-simplex complex; the 2-D analogue of
/// [`add_plane_3`].
pub(super) fn add_line_2(
    lines: &LineGroup,
    complex: &mut Complex2,
    line: u32,
) -> Result<u32, DegeneratePlaneError> {
    if lines.get(line).iter().all(|&c| c == 0.0) {
        return Err(DegeneratePlaneError { plane: line });
    }
    let num_edges = complex.edges.len();
    let num_faces = complex.faces.len();

    let orientations = cut_vertices_2(lines, complex, line)?;

    let mut subedges: Vec<[u32; 3]> = Vec::with_capacity(num_edges);
    for eid in 0..num_edges as u32 {
        subedges.push(cut_edge_2(complex, eid, line, &orientations));
    }

    let mut subfaces: Vec<[u32; 3]> = Vec::with_capacity(num_faces);
    for fid in 0..num_faces as u32 {
        subfaces.push(cut_face_2(complex, fid, line, &orientations, &subedges));
    }

    // An edge whose subedge entries are both INVALID lies on the new line.
    let mut coplanar_line = INVALID;
    for (eid, subedge) in subedges.iter().enumerate().take(num_edges) {
        if subedge[0] == INVALID && subedge[1] == INVALID {
            coplanar_line = complex.edges[eid].supporting_line;
        }
    }

    // Drop split faces and re-point edge->face indices.
    {
        let mut keep = DynamicBitset::new(complex.faces.len(), false);
        for subface in &subfaces {
            if subface[0] != INVALID {
                keep.set(subface[0] as usize, true);
            }
            if subface[1] != INVALID {
                keep.set(subface[1] as usize, true);
            }
        }
        let index_map = compact(&mut complex.faces, &keep);
        for edge in &mut complex.edges {
            if edge.positive_face != INVALID {
                edge.positive_face = index_map[edge.positive_face as usize];
            }
            if edge.negative_face != INVALID {
                edge.negative_face = index_map[edge.negative_face as usize];
            }
        }
    }

    remove_unused_geometry_2(complex);
    Ok(coplanar_line)
}
