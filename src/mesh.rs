//! Tetrahedral background mesh.
//!
//! The processor consumes an arbitrary conforming tet mesh; the generator
//! here fills an axis-aligned box with a regular grid of cubes, each split
//! into six tetrahedra around the main diagonal (Kuhn subdivision). All
//! cubes use the same diagonal, so neighbouring cubes share their boundary
//! triangles exactly, and every tetrahedron is positively oriented.

use glam::DVec3;

/// An indexed tetrahedral mesh. The local vertex order of each tet is
/// significant: face `i` is the triangle opposite local vertex `i`.
#[derive(Clone, Debug, Default)]
pub struct TetMesh {
    pub vertices: Vec<DVec3>,
    pub tets: Vec<[u32; 4]>,
}

/// The six vertex-permutation paths of the Kuhn subdivision, as corner
/// masks along the path 000 -> 111. Odd permutations are stored with their
/// last two vertices swapped to keep the tet positively oriented.
const KUHN_TETS: [[u8; 4]; 6] = [
    [0b000, 0b001, 0b011, 0b111],
    [0b000, 0b001, 0b111, 0b101], // swapped
    [0b000, 0b010, 0b111, 0b011], // swapped
    [0b000, 0b010, 0b110, 0b111],
    [0b000, 0b100, 0b101, 0b111],
    [0b000, 0b100, 0b111, 0b110], // swapped
];

impl TetMesh {
    /// Tetrahedralise the box `[aabb_min, aabb_max]` with `resolution` cubes
    /// along each axis.
    pub fn generate(resolution: u32, aabb_min: DVec3, aabb_max: DVec3) -> Self {
        assert!(resolution >= 1, "resolution must be positive");
        let n = resolution as usize;
        let verts_per_axis = n + 1;
        let step = (aabb_max - aabb_min) / resolution as f64;

        let mut vertices = Vec::with_capacity(verts_per_axis.pow(3));
        for k in 0..verts_per_axis {
            for j in 0..verts_per_axis {
                for i in 0..verts_per_axis {
                    vertices.push(aabb_min + DVec3::new(i as f64, j as f64, k as f64) * step);
                }
            }
        }

        let vertex_id = |i: usize, j: usize, k: usize| -> u32 {
            (i + verts_per_axis * (j + verts_per_axis * k)) as u32
        };

        let mut tets = Vec::with_capacity(6 * n * n * n);
        for k in 0..n {
            for j in 0..n {
                for i in 0..n {
                    let corner = |mask: u8| {
                        vertex_id(
                            i + (mask & 1) as usize,
                            j + ((mask >> 1) & 1) as usize,
                            k + ((mask >> 2) & 1) as usize,
                        )
                    };
                    for masks in KUHN_TETS {
                        tets.push(masks.map(corner));
                    }
                }
            }
        }

        Self { vertices, tets }
    }

    #[inline] pub fn num_vertices(&self) -> usize { self.vertices.len() }

    #[inline] pub fn num_tets(&self) -> usize { self.tets.len() }

    /// CSR incidence: for each vertex, the tets containing it.
    pub fn vertex_tet_incidence(&self) -> VertexTetIncidence {
        let mut counts = vec![0u32; self.vertices.len() + 1];
        for tet in &self.tets {
            for &v in tet {
                counts[v as usize + 1] += 1;
            }
        }
        for i in 1..counts.len() {
            counts[i] += counts[i - 1];
        }
        let mut tets = vec![0u32; counts[counts.len() - 1] as usize];
        let mut cursor = counts.clone();
        for (t, tet) in self.tets.iter().enumerate() {
            for &v in tet {
                tets[cursor[v as usize] as usize] = t as u32;
                cursor[v as usize] += 1;
            }
        }
        VertexTetIncidence { offsets: counts, tets }
    }
}

/// CSR map vertex -> incident tets, tet ids ascending per vertex.
#[derive(Clone, Debug, Default)]
pub struct VertexTetIncidence {
    offsets: Vec<u32>,
    tets: Vec<u32>,
}

impl VertexTetIncidence {
    /// Tets containing `vertex`, ascending.
    #[inline]
    pub fn tets_of(&self, vertex: u32) -> &[u32] {
        let range = self.offsets[vertex as usize] as usize..self.offsets[vertex as usize + 1] as usize;
        &self.tets[range]
    }
}

/// Signed volume of a tetrahedron, positive for the orientation the
/// generator produces.
pub fn tet_signed_volume(v0: DVec3, v1: DVec3, v2: DVec3, v3: DVec3) -> f64 {
    (v1 - v0).cross(v2 - v0).dot(v3 - v0) / 6.0
}
