//! Incremental cell complexes for simplicial arrangements.
//!
//! A 3-simplex complex starts as the tetrahedron itself (4 vertices, 6
//! edges, 4 faces, 1 cell) and is refined one plane at a time by the cut
//! routines. The 2-simplex complex is the triangle analogue.

use crate::containers::DynamicBitset;

use super::INVALID;

/// A vertex is the intersection of three planes (3-simplex complexes).
pub type PlanePoint = [u32; 3];

/// A vertex is the intersection of two lines (2-simplex complexes).
pub type LinePoint = [u32; 2];

#[derive(Clone, Debug, Default)]
pub struct Edge3 {
    /// Ordered endpoints.
    pub vertices: [u32; 2],
    pub supporting_planes: [u32; 2],
}

#[derive(Clone, Debug, Default)]
pub struct Face3 {
    /// Boundary edge ids in cyclic order.
    pub edges: Vec<u32>,
    pub supporting_plane: u32,
    pub positive_cell: u32,
    pub negative_cell: u32,
}

#[derive(Clone, Debug, Default)]
pub struct Cell3 {
    pub faces: Vec<u32>,
    /// For each plane id, whether this cell is on its positive side.
    pub signs: DynamicBitset,
}

/// Cell complex of a tetrahedron cut by planes.
#[derive(Clone, Debug, Default)]
pub struct Complex3 {
    pub vertices: Vec<PlanePoint>,
    pub edges: Vec<Edge3>,
    pub faces: Vec<Face3>,
    pub cells: Vec<Cell3>,
}

impl Complex3 {
    /// The uncut tetrahedron, with sign storage for `num_planes` planes
    /// (the four boundary planes included).
    pub fn tetrahedron(num_planes: usize) -> Self {
        let vertices = vec![[1, 2, 3], [2, 3, 0], [3, 0, 1], [0, 1, 2]];

        let mut edges = vec![Edge3::default(); 6];
        edges[0].vertices = [0, 1];
        edges[1].vertices = [0, 2];
        edges[2].vertices = [0, 3];
        edges[3].vertices = [1, 2];
        edges[4].vertices = [1, 3];
        edges[5].vertices = [2, 3];
        edges[0].supporting_planes = [2, 3];
        edges[1].supporting_planes = [1, 3];
        edges[2].supporting_planes = [1, 2];
        edges[3].supporting_planes = [0, 3];
        edges[4].supporting_planes = [0, 2];
        edges[5].supporting_planes = [0, 1];

        let mut faces = vec![Face3::default(); 4];
        faces[0].edges = vec![5, 3, 4];
        faces[1].edges = vec![2, 1, 5];
        faces[2].edges = vec![4, 0, 2];
        faces[3].edges = vec![1, 0, 3];
        for (i, face) in faces.iter_mut().enumerate() {
            face.supporting_plane = i as u32;
            face.positive_cell = 0;
            face.negative_cell = INVALID;
        }

        let mut signs = DynamicBitset::new(num_planes.max(4), false);
        for plane in 0..4 {
            signs.set(plane, true);
        }
        let cells = vec![Cell3 { faces: vec![0, 1, 2, 3], signs }];

        Self { vertices, edges, faces, cells }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Edge2 {
    pub vertices: [u32; 2],
    pub supporting_line: u32,
    pub positive_face: u32,
    pub negative_face: u32,
}

#[derive(Clone, Debug, Default)]
pub struct Face2 {
    pub edges: Vec<u32>,
    /// For each line id, whether this face is on its positive side.
    pub signs: DynamicBitset,
}

/// Cell complex of a triangle cut by lines.
#[derive(Clone, Debug, Default)]
pub struct Complex2 {
    pub vertices: Vec<LinePoint>,
    pub edges: Vec<Edge2>,
    pub faces: Vec<Face2>,
}

impl Complex2 {
    /// The uncut triangle, with sign storage for `num_lines` lines
    /// (the three boundary lines included).
    pub fn triangle(num_lines: usize) -> Self {
        let vertices = vec![[1, 2], [2, 0], [0, 1]];

        let mut edges = vec![Edge2::default(); 3];
        edges[0].vertices = [1, 2];
        edges[1].vertices = [2, 0];
        edges[2].vertices = [0, 1];
        for (i, edge) in edges.iter_mut().enumerate() {
            edge.supporting_line = i as u32;
            edge.positive_face = 0;
            edge.negative_face = INVALID;
        }

        let mut signs = DynamicBitset::new(num_lines.max(3), false);
        for line in 0..3 {
            signs.set(line, true);
        }
        let faces = vec![Face2 { edges: vec![0, 1, 2], signs }];

        Self { vertices, edges, faces }
    }
}

/// Compact `items` down to the entries flagged in `keep`, preserving order.
/// Returns the old-index -> new-index map, `INVALID` for dropped entries.
pub(super) fn compact<T>(items: &mut Vec<T>, keep: &DynamicBitset) -> Vec<u32> {
    debug_assert!(items.len() == keep.len(), "keep flags must cover all items");
    let mut index_map = vec![INVALID; items.len()];
    let mut active = 0usize;
    for i in 0..items.len() {
        if !keep.get(i) {
            continue;
        }
        if i != active {
            items.swap(active, i);
        }
        index_map[i] = active as u32;
        active += 1;
    }
    items.truncate(active);
    index_map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tetrahedron_complex_is_consistent() {
        let complex = Complex3::tetrahedron(6);
        assert_eq!(complex.vertices.len(), 4);
        assert_eq!(complex.edges.len(), 6);
        assert_eq!(complex.faces.len(), 4);
        assert_eq!(complex.cells.len(), 1);

        // Face i is supported by plane i and does not touch vertex i.
        for (i, face) in complex.faces.iter().enumerate() {
            assert_eq!(face.supporting_plane, i as u32);
            for &eid in &face.edges {
                for &vid in &complex.edges[eid as usize].vertices {
                    assert_ne!(vid as usize, i, "face {i} must not touch vertex {i}");
                }
                // Every face edge lies on the face's plane.
                assert!(complex.edges[eid as usize].supporting_planes.contains(&(i as u32)));
            }
        }

        // Each vertex's plane triple excludes its own opposite plane.
        for (i, vertex) in complex.vertices.iter().enumerate() {
            assert!(!vertex.contains(&(i as u32)));
        }

        // The single cell is positive for all four boundary planes.
        let cell = &complex.cells[0];
        assert_eq!(cell.signs.len(), 6);
        for plane in 0..4 {
            assert!(cell.signs.get(plane));
        }
        assert!(!cell.signs.get(4));
    }

    #[test]
    fn triangle_complex_is_consistent() {
        let complex = Complex2::triangle(4);
        assert_eq!(complex.vertices.len(), 3);
        assert_eq!(complex.edges.len(), 3);
        assert_eq!(complex.faces.len(), 1);
        for (i, edge) in complex.edges.iter().enumerate() {
            assert_eq!(edge.supporting_line, i as u32);
            assert!(!edge.vertices.contains(&(i as u32)));
        }
    }

    #[test]
    fn compact_squeezes_and_maps() {
        let mut items = vec!['a', 'b', 'c', 'd', 'e'];
        let mut keep = DynamicBitset::new(5, false);
        keep.set(1, true);
        keep.set(3, true);
        keep.set(4, true);
        let map = compact(&mut items, &keep);
        assert_eq!(items, vec!['b', 'd', 'e']);
        assert_eq!(map, vec![INVALID, 0, INVALID, 1, 2]);
    }
}
