//! Connectivity over the extracted surface network: iso-edges, patches,
//! chains, shells, components, and arrangement cells.

use std::collections::VecDeque;

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::containers::DynamicBitset;

use super::{EdgeHeader, HalfPatch, IsoEdge, PolygonFace, INVALID};

/// Build the iso-edge arena and the face -> edge incidence.
///
/// Edges are keyed by their (sorted) endpoint pair; each incidence records
/// the face and the edge's position in the face's vertex loop.
pub(super) fn compute_patch_edges(
    iso_faces: &[PolygonFace],
    iso_edges: &mut Vec<IsoEdge>,
) -> Vec<SmallVec<[u32; 8]>> {
    let mut edges_of_face: Vec<SmallVec<[u32; 8]>> = Vec::with_capacity(iso_faces.len());
    let mut edge_id: AHashMap<(u32, u32), u32> = AHashMap::new();

    for (f, face) in iso_faces.iter().enumerate() {
        let num_edges = face.vertices.len();
        let mut face_edges: SmallVec<[u32; 8]> = SmallVec::with_capacity(num_edges);
        for j in 0..num_edges {
            let a = face.vertices[j];
            let b = face.vertices[(j + 1) % num_edges];
            let key = (a.min(b), a.max(b));
            let header = EdgeHeader { face: f as u32, local_edge: j as u32 };
            let id = *edge_id.entry(key).or_insert_with(|| {
                iso_edges.push(IsoEdge { v1: key.0, v2: key.1, headers: SmallVec::new() });
                (iso_edges.len() - 1) as u32
            });
            iso_edges[id as usize].headers.push(header);
            face_edges.push(id);
        }
        edges_of_face.push(face_edges);
    }
    edges_of_face
}

/// Flood-fill iso-faces into patches across manifold edges (exactly two
/// incident faces). Each patch lies on a single function's zero set.
pub(super) fn compute_patches(
    edges_of_face: &[SmallVec<[u32; 8]>],
    iso_edges: &[IsoEdge],
    iso_faces: &[PolygonFace],
    patches: &mut Vec<Vec<u32>>,
    patch_functions: &mut Vec<u32>,
) {
    let mut visited = DynamicBitset::new(edges_of_face.len(), false);
    for seed in 0..edges_of_face.len() as u32 {
        if visited.get(seed as usize) {
            continue;
        }
        let mut patch = vec![seed];
        let mut queue = VecDeque::from([seed]);
        visited.set(seed as usize, true);
        patch_functions.push(iso_faces[seed as usize].function);
        while let Some(face) = queue.pop_front() {
            for &edge in &edges_of_face[face as usize] {
                let headers = &iso_edges[edge as usize].headers;
                if headers.len() != 2 {
                    continue;
                }
                let other = if headers[0].face == face { headers[1].face } else { headers[0].face };
                if !visited.get(other as usize) {
                    visited.set(other as usize, true);
                    patch.push(other);
                    queue.push_back(other);
                }
            }
        }
        patches.push(patch);
    }
}

/// Flood-fill non-manifold iso-edges into chains through vertices whose
/// non-manifold degree is exactly two.
pub(super) fn compute_chains(
    iso_edges: &[IsoEdge],
    non_manifold_edges_of_vert: &[SmallVec<[u32; 4]>],
    chains: &mut Vec<Vec<u32>>,
) {
    let mut visited = DynamicBitset::new(iso_edges.len(), false);
    for seed in 0..iso_edges.len() as u32 {
        if visited.get(seed as usize) || iso_edges[seed as usize].headers.len() <= 2 {
            continue;
        }
        let mut chain = vec![seed];
        let mut queue = VecDeque::from([seed]);
        visited.set(seed as usize, true);
        while let Some(edge) = queue.pop_front() {
            for vertex in [iso_edges[edge as usize].v1, iso_edges[edge as usize].v2] {
                let incident = &non_manifold_edges_of_vert[vertex as usize];
                if incident.len() != 2 {
                    // Degree != 2: a chain endpoint.
                    continue;
                }
                let other = if incident[0] == edge { incident[1] } else { incident[0] };
                if !visited.get(other as usize) {
                    visited.set(other as usize, true);
                    chain.push(other);
                    queue.push_back(other);
                }
            }
        }
        chains.push(chain);
    }
}

/// Group half-patches into shells (connected components of the half-patch
/// adjacency from chain ordering) and patches into components (the same
/// adjacency with signs ignored).
pub(super) fn compute_shells_and_components(
    num_patches: u32,
    half_patch_pairs: &[(HalfPatch, HalfPatch)],
    shells: &mut Vec<Vec<u32>>,
    shell_of_half_patch: &mut Vec<u32>,
    components: &mut Vec<Vec<u32>>,
    component_of_patch: &mut Vec<u32>,
) {
    let mut adjacency: Vec<SmallVec<[u32; 4]>> = vec![SmallVec::new(); 2 * num_patches as usize];
    for &(a, b) in half_patch_pairs {
        adjacency[a.id() as usize].push(b.id());
        adjacency[b.id() as usize].push(a.id());
    }

    // Shells: components of the half-patch graph.
    let mut visited = DynamicBitset::new(2 * num_patches as usize, false);
    shells.clear();
    shell_of_half_patch.clear();
    shell_of_half_patch.resize(2 * num_patches as usize, INVALID);
    for seed in 0..2 * num_patches {
        if visited.get(seed as usize) {
            continue;
        }
        let shell_id = shells.len() as u32;
        let mut shell = vec![seed];
        let mut queue = VecDeque::from([seed]);
        visited.set(seed as usize, true);
        shell_of_half_patch[seed as usize] = shell_id;
        while let Some(half_patch) = queue.pop_front() {
            for &next in &adjacency[half_patch as usize] {
                if !visited.get(next as usize) {
                    visited.set(next as usize, true);
                    shell.push(next);
                    shell_of_half_patch[next as usize] = shell_id;
                    queue.push_back(next);
                }
            }
        }
        shells.push(shell);
    }

    // Components: the same flood ignoring the sign bit.
    let mut visited = DynamicBitset::new(num_patches as usize, false);
    components.clear();
    component_of_patch.clear();
    component_of_patch.resize(num_patches as usize, INVALID);
    for seed in 0..num_patches {
        if visited.get(seed as usize) {
            continue;
        }
        let component_id = components.len() as u32;
        let mut component = vec![seed];
        let mut queue = VecDeque::from([seed]);
        visited.set(seed as usize, true);
        component_of_patch[seed as usize] = component_id;
        while let Some(patch) = queue.pop_front() {
            for half in [2 * patch, 2 * patch + 1] {
                for &next in &adjacency[half as usize] {
                    let other = next / 2;
                    if !visited.get(other as usize) {
                        visited.set(other as usize, true);
                        component.push(other);
                        component_of_patch[other as usize] = component_id;
                        queue.push_back(other);
                    }
                }
            }
        }
        components.push(component);
    }
}

/// Build arrangement cells as connected components of the shell adjacency
/// induced by ray-shooting links. `INVALID` in a link stands for the
/// unbounded outside, modelled as a sink shell and removed afterwards.
pub(super) fn compute_arrangement_cells(
    num_shells: u32,
    shell_links: &[(u32, u32)],
    arrangement_cells: &mut Vec<Vec<u32>>,
) {
    let sink = num_shells;
    let mut adjacency: Vec<SmallVec<[u32; 4]>> = vec![SmallVec::new(); num_shells as usize + 1];
    for &(a, b) in shell_links {
        let a = if a == INVALID { sink } else { a };
        let b = if b == INVALID { sink } else { b };
        adjacency[a as usize].push(b);
        adjacency[b as usize].push(a);
    }

    let mut visited = DynamicBitset::new(num_shells as usize + 1, false);
    arrangement_cells.clear();
    for seed in 0..=num_shells {
        if visited.get(seed as usize) {
            continue;
        }
        let mut cell = vec![seed];
        let mut queue = VecDeque::from([seed]);
        visited.set(seed as usize, true);
        while let Some(shell) = queue.pop_front() {
            for &next in &adjacency[shell as usize] {
                if !visited.get(next as usize) {
                    visited.set(next as usize, true);
                    cell.push(next);
                    queue.push_back(next);
                }
            }
        }
        // Drop the sink pseudo-shell from the cell it landed in.
        cell.retain(|&s| s < num_shells);
        if !cell.is_empty() {
            arrangement_cells.push(cell);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn quad_faces() -> Vec<PolygonFace> {
        // Two triangles sharing edge (1, 2).
        vec![
            PolygonFace { vertices: vec![0, 1, 2], headers: smallvec![], function: 0 },
            PolygonFace { vertices: vec![2, 1, 3], headers: smallvec![], function: 0 },
        ]
    }

    #[test]
    fn shared_edge_has_two_headers() {
        let faces = quad_faces();
        let mut iso_edges = Vec::new();
        let edges_of_face = compute_patch_edges(&faces, &mut iso_edges);

        assert_eq!(edges_of_face.len(), 2);
        // 5 distinct undirected edges.
        assert_eq!(iso_edges.len(), 5);
        let shared: Vec<_> = iso_edges.iter().filter(|e| e.headers.len() == 2).collect();
        assert_eq!(shared.len(), 1);
        assert_eq!((shared[0].v1, shared[0].v2), (1, 2));
    }

    #[test]
    fn manifold_faces_fuse_into_one_patch() {
        let faces = quad_faces();
        let mut iso_edges = Vec::new();
        let edges_of_face = compute_patch_edges(&faces, &mut iso_edges);
        let mut patches = Vec::new();
        let mut patch_functions = Vec::new();
        compute_patches(&edges_of_face, &iso_edges, &faces, &mut patches, &mut patch_functions);
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].len(), 2);
        assert_eq!(patch_functions, vec![0]);
    }

    #[test]
    fn non_manifold_edge_splits_patches() {
        // Three faces share edge (0, 1): every face is its own patch.
        let faces = vec![
            PolygonFace { vertices: vec![0, 1, 2], headers: smallvec![], function: 0 },
            PolygonFace { vertices: vec![0, 1, 3], headers: smallvec![], function: 1 },
            PolygonFace { vertices: vec![0, 1, 4], headers: smallvec![], function: 1 },
        ];
        let mut iso_edges = Vec::new();
        let edges_of_face = compute_patch_edges(&faces, &mut iso_edges);
        let mut patches = Vec::new();
        let mut patch_functions = Vec::new();
        compute_patches(&edges_of_face, &iso_edges, &faces, &mut patches, &mut patch_functions);
        assert_eq!(patches.len(), 3);
        assert_eq!(patch_functions, vec![0, 1, 1]);
    }

    #[test]
    fn chains_stop_at_high_degree_vertices() {
        // Edges a(0-1), b(1-2) non-manifold and joined at vertex 1 of
        // non-manifold degree 2: one chain of two edges.
        let mut iso_edges = vec![
            IsoEdge { v1: 0, v2: 1, headers: smallvec![] },
            IsoEdge { v1: 1, v2: 2, headers: smallvec![] },
        ];
        for edge in &mut iso_edges {
            for k in 0..4u32 {
                edge.headers.push(EdgeHeader { face: k, local_edge: 0 });
            }
        }
        let non_manifold: Vec<SmallVec<[u32; 4]>> = vec![smallvec![0], smallvec![0, 1], smallvec![1]];
        let mut chains = Vec::new();
        compute_chains(&iso_edges, &non_manifold, &mut chains);
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].len(), 2);
    }

    #[test]
    fn shells_and_components_from_pairs() {
        // Two patches meeting along a chain: positive sides pair up, and so
        // do negative sides.
        let pairs = vec![
            (HalfPatch { index: 0, orientation: 1 }, HalfPatch { index: 1, orientation: 1 }),
            (HalfPatch { index: 0, orientation: -1 }, HalfPatch { index: 1, orientation: -1 }),
        ];
        let mut shells = Vec::new();
        let mut shell_of_half_patch = Vec::new();
        let mut components = Vec::new();
        let mut component_of_patch = Vec::new();
        compute_shells_and_components(
            2,
            &pairs,
            &mut shells,
            &mut shell_of_half_patch,
            &mut components,
            &mut component_of_patch,
        );
        assert_eq!(shells.len(), 2);
        assert_eq!(components.len(), 1);
        assert_eq!(component_of_patch, vec![0, 0]);
        // Each shell holds one half of each patch.
        for shell in &shells {
            assert_eq!(shell.len(), 2);
        }
        assert_ne!(shell_of_half_patch[0], shell_of_half_patch[1]);
        assert_eq!(shell_of_half_patch[0], shell_of_half_patch[2]);
    }

    #[test]
    fn arrangement_cells_collapse_linked_shells() {
        // Shells 0 and 1 linked (same cell); shell 2 linked to the outside.
        let links = vec![(0, 1), (2, INVALID)];
        let mut cells = Vec::new();
        compute_arrangement_cells(3, &links, &mut cells);
        assert_eq!(cells.len(), 2);
        assert!(cells.contains(&vec![0, 1]));
        assert!(cells.contains(&vec![2]));
    }
}
