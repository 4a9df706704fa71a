//! Iso-mesh extraction: walk every per-tet arrangement and emit globally
//! deduplicated surface vertices and polygons.
//!
//! Vertices on shared simplices (tet vertices, edges, faces) and polygons on
//! shared tet faces are keyed so neighbouring tets agree on one global id.
//! Alongside the global arrays, per-tet CSR tables record the global
//! identity of every local arrangement vertex and the iso-face id of every
//! local face; the ordering and ray-shooting stages depend on them.

use ahash::AHashMap;
use glam::{DMat3, DMat4, DVec3, DVec4};
use itertools::Itertools;
use ndarray::Array2;
use smallvec::smallvec;

use crate::mesh::TetMesh;

use super::{
    FaceHeader, GlobalVid, IsoVertex, PolygonFace, SimplexKind, SurfaceNetworkProcessor, INVALID,
};

/// Per-tet CSR tables produced during extraction.
#[derive(Clone, Debug, Default)]
pub(super) struct ExtractionTables {
    vid_of_tet_vert: Vec<GlobalVid>,
    vid_start_of_tet: Vec<u32>,
    iso_face_of_tet_face: Vec<u32>,
    face_start_of_tet: Vec<u32>,
}

impl ExtractionTables {
    /// Global identity of each local arrangement vertex of `tet`.
    #[inline]
    pub fn vids_of_tet(&self, tet: u32) -> &[GlobalVid] {
        let range =
            self.vid_start_of_tet[tet as usize] as usize..self.vid_start_of_tet[tet as usize + 1] as usize;
        &self.vid_of_tet_vert[range]
    }

    /// Iso-face id (or INVALID) of each local arrangement face of `tet`.
    #[inline]
    pub fn iso_faces_of_tet(&self, tet: u32) -> &[u32] {
        let range =
            self.face_start_of_tet[tet as usize] as usize..self.face_start_of_tet[tet as usize + 1] as usize;
        &self.iso_face_of_tet_face[range]
    }
}

pub(super) struct Extraction {
    pub iso_verts: Vec<IsoVertex>,
    pub iso_faces: Vec<PolygonFace>,
    pub tables: ExtractionTables,
}

/// Deduplication key of a polygon on a shared tet face: the smallest, second
/// smallest, and largest of its vertex ids.
fn iso_face_key(face_verts: &[u32]) -> [u32; 3] {
    let sorted: Vec<u32> = face_verts.iter().copied().sorted_unstable().collect();
    [sorted[0], sorted[1], sorted[sorted.len() - 1]]
}

pub(super) fn extract_iso_mesh(proc: &SurfaceNetworkProcessor) -> Extraction {
    let num_tets = proc.mesh.num_tets();

    let mut iso_verts: Vec<IsoVertex> = Vec::new();
    let mut iso_faces: Vec<PolygonFace> = Vec::new();
    let mut tables = ExtractionTables {
        vid_start_of_tet: Vec::with_capacity(num_tets + 1),
        face_start_of_tet: Vec::with_capacity(num_tets + 1),
        ..Default::default()
    };
    tables.vid_start_of_tet.push(0);
    tables.face_start_of_tet.push(0);

    // Dedup tables for simplices shared between tets.
    let mut vert_on_tet_vert: AHashMap<u32, u32> = AHashMap::new();
    let mut vert_on_tet_edge: AHashMap<[u32; 3], u32> = AHashMap::new();
    let mut vert_on_tet_face: AHashMap<[u32; 5], u32> = AHashMap::new();
    let mut face_on_tet_face: AHashMap<[u32; 3], u32> = AHashMap::new();

    for t in 0..num_tets as u32 {
        let Some(arrangement) = proc.arrangement_of_tet(t) else {
            tables.vid_start_of_tet.push(tables.vid_of_tet_vert.len() as u32);
            tables.face_start_of_tet.push(tables.iso_face_of_tet_face.len() as u32);
            continue;
        };
        let tet = proc.mesh.tets[t as usize];

        // A face is on the iso-surface iff its supporting plane (or any
        // coplanar duplicate) is an implicit plane.
        let mut is_iso_vert = vec![false; arrangement.vertices.len()];
        let mut is_iso_face = vec![false; arrangement.faces.len()];
        for (j, face) in arrangement.faces.iter().enumerate() {
            let iso = if arrangement.all_planes_unique() {
                face.supporting_plane > 3
            } else {
                let class = arrangement.unique_plane_indices[face.supporting_plane as usize];
                arrangement.unique_planes[class as usize].iter().any(|&p| p > 3)
            };
            if iso {
                is_iso_face[j] = true;
                for &vid in &face.vertices {
                    is_iso_vert[vid as usize] = true;
                }
            }
        }

        // Create or look up global iso-vertices.
        let mut iso_vid_of_vert: Vec<u32> = Vec::with_capacity(arrangement.vertices.len());
        for (j, point) in arrangement.vertices.iter().enumerate() {
            let mut boundary_planes: Vec<u32> = Vec::with_capacity(3);
            let mut functions: Vec<u32> = Vec::with_capacity(3);
            for &p in point {
                if p > 3 {
                    functions.push(proc.function_of_plane(t, p));
                } else {
                    boundary_planes.push(p);
                }
            }

            if !is_iso_vert[j] {
                // Not on the surface: must be a tet corner.
                debug_assert!(boundary_planes.len() == 3);
                let corner = (0..4u32)
                    .find(|c| !boundary_planes.contains(c))
                    .expect("three distinct boundary planes leave one corner");
                tables.vid_of_tet_vert.push(GlobalVid::Mesh(tet[corner as usize]));
                iso_vid_of_vert.push(INVALID);
                continue;
            }

            match boundary_planes.len() {
                2 => {
                    // On a tet edge: the two corners not opposite a
                    // boundary plane span it.
                    let mut ends: Vec<u32> = (0..4u32)
                        .filter(|c| !boundary_planes.contains(c))
                        .map(|c| tet[c as usize])
                        .collect();
                    ends.sort_unstable();
                    let key = [ends[0], ends[1], functions[0]];
                    let id = *vert_on_tet_edge.entry(key).or_insert_with(|| {
                        iso_verts.push(IsoVertex {
                            tet: t,
                            local: j as u32,
                            simplex: SimplexKind::Edge,
                            simplex_verts: [ends[0], ends[1], INVALID, INVALID],
                            functions: [functions[0], INVALID, INVALID],
                        });
                        (iso_verts.len() - 1) as u32
                    });
                    tables.vid_of_tet_vert.push(GlobalVid::Iso(id));
                    iso_vid_of_vert.push(id);
                }
                1 => {
                    // On a tet face; both the corner triple and the function
                    // pair are sorted so the neighbouring tet agrees on the
                    // key.
                    let mut corners: Vec<u32> = (0..4u32)
                        .filter(|&c| c != boundary_planes[0])
                        .map(|c| tet[c as usize])
                        .collect();
                    corners.sort_unstable();
                    let (f_lo, f_hi) = (functions[0].min(functions[1]), functions[0].max(functions[1]));
                    let key = [corners[0], corners[1], corners[2], f_lo, f_hi];
                    let id = *vert_on_tet_face.entry(key).or_insert_with(|| {
                        iso_verts.push(IsoVertex {
                            tet: t,
                            local: j as u32,
                            simplex: SimplexKind::Face,
                            simplex_verts: [corners[0], corners[1], corners[2], INVALID],
                            functions: [f_lo, f_hi, INVALID],
                        });
                        (iso_verts.len() - 1) as u32
                    });
                    tables.vid_of_tet_vert.push(GlobalVid::Iso(id));
                    iso_vid_of_vert.push(id);
                }
                0 => {
                    // Interior: never shared.
                    let id = iso_verts.len() as u32;
                    iso_verts.push(IsoVertex {
                        tet: t,
                        local: j as u32,
                        simplex: SimplexKind::Interior,
                        simplex_verts: tet,
                        functions: [functions[0], functions[1], functions[2]],
                    });
                    tables.vid_of_tet_vert.push(GlobalVid::Iso(id));
                    iso_vid_of_vert.push(id);
                }
                3 => {
                    // Exactly on a tet corner.
                    let corner = (0..4u32)
                        .find(|c| !boundary_planes.contains(c))
                        .expect("three distinct boundary planes leave one corner");
                    let mesh_vert = tet[corner as usize];
                    let id = *vert_on_tet_vert.entry(mesh_vert).or_insert_with(|| {
                        iso_verts.push(IsoVertex {
                            tet: t,
                            local: j as u32,
                            simplex: SimplexKind::Vertex,
                            simplex_verts: [mesh_vert, INVALID, INVALID, INVALID],
                            functions: [INVALID, INVALID, INVALID],
                        });
                        (iso_verts.len() - 1) as u32
                    });
                    tables.vid_of_tet_vert.push(GlobalVid::Mesh(mesh_vert));
                    iso_vid_of_vert.push(id);
                }
                _ => unreachable!("a vertex has exactly three supporting planes"),
            }
        }
        tables.vid_start_of_tet.push(tables.vid_of_tet_vert.len() as u32);

        // Create or merge global iso-faces.
        for (j, face) in arrangement.faces.iter().enumerate() {
            if !is_iso_face[j] {
                tables.iso_face_of_tet_face.push(INVALID);
                continue;
            }

            let (function, reversed) = if arrangement.all_planes_unique() {
                (proc.function_of_plane(t, face.supporting_plane), false)
            } else {
                // The face may be supported by a coplanar duplicate (even a
                // tet boundary plane); express it through the implicit
                // member of its class and align the stored orientation.
                let class = arrangement.unique_plane_indices[face.supporting_plane as usize];
                let member = *arrangement.unique_planes[class as usize]
                    .iter()
                    .find(|&&p| p > 3)
                    .expect("iso face class contains an implicit plane");
                let reversed = arrangement.unique_plane_orientations[face.supporting_plane as usize]
                    != arrangement.unique_plane_orientations[member as usize];
                (proc.function_of_plane(t, member), reversed)
            };

            let mut face_verts: Vec<u32> = face
                .vertices
                .iter()
                .map(|&vid| iso_vid_of_vert[vid as usize])
                .collect();
            debug_assert!(face_verts.iter().all(|&v| v != INVALID));
            if reversed {
                face_verts.reverse();
            }

            let on_tet_boundary = face.negative_cell == INVALID;
            if on_tet_boundary {
                let key = iso_face_key(&face_verts);
                match face_on_tet_face.entry(key) {
                    std::collections::hash_map::Entry::Occupied(entry) => {
                        let id = *entry.get();
                        iso_faces[id as usize].headers.push(FaceHeader { tet: t, local_face: j as u32 });
                        tables.iso_face_of_tet_face.push(id);
                    }
                    std::collections::hash_map::Entry::Vacant(entry) => {
                        let id = iso_faces.len() as u32;
                        entry.insert(id);
                        iso_faces.push(PolygonFace {
                            vertices: face_verts,
                            headers: smallvec![FaceHeader { tet: t, local_face: j as u32 }],
                            function,
                        });
                        tables.iso_face_of_tet_face.push(id);
                    }
                }
            } else {
                let id = iso_faces.len() as u32;
                iso_faces.push(PolygonFace {
                    vertices: face_verts,
                    headers: smallvec![FaceHeader { tet: t, local_face: j as u32 }],
                    function,
                });
                tables.iso_face_of_tet_face.push(id);
            }
        }
        tables.face_start_of_tet.push(tables.iso_face_of_tet_face.len() as u32);
    }

    Extraction { iso_verts, iso_faces, tables }
}

/// World coordinates of every iso-vertex, by zero-crossing interpolation
/// over its minimal simplex.
pub(super) fn compute_iso_vertex_coordinates(
    mesh: &TetMesh,
    scalar_field: &Array2<f64>,
    iso_verts: &[IsoVertex],
) -> Vec<DVec3> {
    iso_verts
        .iter()
        .map(|vert| {
            let position = |i: usize| mesh.vertices[vert.simplex_verts[i] as usize];
            let value = |f: usize, i: usize| scalar_field[[vert.functions[f] as usize, vert.simplex_verts[i] as usize]];
            match vert.simplex {
                SimplexKind::Vertex => position(0),
                SimplexKind::Edge => {
                    // One function crossing zero on a segment.
                    let (a, b) = (value(0, 0), value(0, 1));
                    let t = a / (a - b);
                    position(0) + (position(1) - position(0)) * t
                }
                SimplexKind::Face => {
                    // Two functions zero on a triangle: solve for the
                    // barycentric coordinates.
                    let m = DMat3::from_cols(
                        DVec3::new(value(0, 0), value(1, 0), 1.0),
                        DVec3::new(value(0, 1), value(1, 1), 1.0),
                        DVec3::new(value(0, 2), value(1, 2), 1.0),
                    );
                    let b = m.inverse() * DVec3::new(0.0, 0.0, 1.0);
                    position(0) * b.x + position(1) * b.y + position(2) * b.z
                }
                SimplexKind::Interior => {
                    // Three functions zero inside the tet.
                    let column = |i: usize| DVec4::new(value(0, i), value(1, i), value(2, i), 1.0);
                    let m = DMat4::from_cols(column(0), column(1), column(2), column(3));
                    let b = m.inverse() * DVec4::new(0.0, 0.0, 0.0, 1.0);
                    position(0) * b.x + position(1) * b.y + position(2) * b.z + position(3) * b.w
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn face_key_uses_min_second_max() {
        assert_eq!(iso_face_key(&[5, 2, 9, 4]), [2, 4, 9]);
        assert_eq!(iso_face_key(&[3, 1, 2]), [1, 2, 3]);
    }

    #[test]
    fn edge_interpolation_is_linear() {
        use crate::mesh::TetMesh;
        use glam::DVec3;
        use ndarray::Array2;

        let mesh = TetMesh {
            vertices: vec![DVec3::ZERO, DVec3::new(2.0, 0.0, 0.0)],
            tets: vec![],
        };
        // One function: -1 at vertex 0, +3 at vertex 1; zero at x = 0.5.
        let field = Array2::from_shape_vec((1, 2), vec![-1.0, 3.0]).unwrap();
        let verts = vec![IsoVertex {
            tet: 0,
            local: 0,
            simplex: SimplexKind::Edge,
            simplex_verts: [0, 1, INVALID, INVALID],
            functions: [0, INVALID, INVALID],
        }];
        let coords = compute_iso_vertex_coordinates(&mesh, &field, &verts);
        assert!(coords[0].abs_diff_eq(DVec3::new(0.5, 0.0, 0.0), 1e-12));
    }
}
