//! Arrangements of planes inside a simplex.
//!
//! The kernel partitions a tetrahedron (or triangle) by the zero sets of
//! barycentric plane equations into a vertex/face/cell complex. One- and
//! two-plane arrangements take a lookup-table fast path when available;
//! everything else goes through incremental plane insertion.

mod complex;
mod cut;
mod lut;

pub use complex::{Complex2, Complex3, LinePoint, PlanePoint};
pub use lut::{inner_index_2, outer_index_1, outer_index_2, Lut};

use crate::containers::UnionFind;

/// Sentinel for "no index".
pub const INVALID: u32 = u32::MAX;

/// A plane in a 3-simplex: coefficients of the barycentric plane equation
/// `f0*b0 + f1*b1 + f2*b2 + f3*b3 = 0`. The sign of the expression at simplex
/// vertex `i` is the sign of `f_i`.
pub type BaryPlane = [f64; 4];

/// A line in a 2-simplex, by the same convention.
pub type BaryLine = [f64; 3];

/// Error raised when a plane cannot be signed against the simplex (it is
/// identically zero over it).
#[derive(Clone, Copy, Debug)]
pub struct DegeneratePlaneError {
    /// Id of the offending plane in the local plane group.
    pub plane: u32,
}

/// The four boundary planes of the reference tetrahedron followed by the
/// user planes, addressed by a single id space.
#[derive(Clone, Debug, Default)]
pub struct PlaneGroup {
    planes: Vec<BaryPlane>,
}

impl PlaneGroup {
    pub fn new(user_planes: &[BaryPlane]) -> Self {
        let mut planes = vec![
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        planes.extend_from_slice(user_planes);
        Self { planes }
    }

    #[inline]
    pub fn get(&self, id: u32) -> BaryPlane {
        self.planes[id as usize]
    }

    #[inline] pub fn len(&self) -> usize { self.planes.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.planes.is_empty() }
}

/// The three boundary lines of the reference triangle plus user lines.
#[derive(Clone, Debug, Default)]
pub struct LineGroup {
    lines: Vec<BaryLine>,
}

impl LineGroup {
    pub fn new(user_lines: &[BaryLine]) -> Self {
        let mut lines = vec![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        lines.extend_from_slice(user_lines);
        Self { lines }
    }

    #[inline]
    pub fn get(&self, id: u32) -> BaryLine {
        self.lines[id as usize]
    }
}

/// A polygonal face of a finished arrangement.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArrangementFace {
    /// Boundary vertices, counter-clockwise seen from the positive side of
    /// the supporting plane.
    pub vertices: Vec<u32>,
    pub supporting_plane: u32,
    pub positive_cell: u32,
    /// `INVALID` on the simplex boundary.
    pub negative_cell: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArrangementCell {
    pub faces: Vec<u32>,
}

/// The output form of a 3-simplex arrangement.
#[derive(Clone, Debug, Default)]
pub struct Arrangement {
    pub vertices: Vec<PlanePoint>,
    pub faces: Vec<ArrangementFace>,
    pub cells: Vec<ArrangementCell>,
    /// Only populated when duplicate planes were detected: for each plane id,
    /// the index of its equivalence class.
    pub unique_plane_indices: Vec<u32>,
    /// Members of each equivalence class.
    pub unique_planes: Vec<Vec<u32>>,
    /// Whether each plane is oriented consistently with its class
    /// representative.
    pub unique_plane_orientations: Vec<bool>,
}

impl Arrangement {
    /// True when no duplicate planes were detected.
    #[inline]
    pub fn all_planes_unique(&self) -> bool {
        self.unique_planes.is_empty()
    }
}

/// A per-tetrahedron arrangement: either a shared lookup-table entry or one
/// computed at runtime and owned here.
#[derive(Debug)]
pub enum TetArrangement<'a> {
    Shared(&'a Arrangement),
    Owned(Box<Arrangement>),
}

impl std::ops::Deref for TetArrangement<'_> {
    type Target = Arrangement;

    #[inline]
    fn deref(&self) -> &Arrangement {
        match self {
            TetArrangement::Shared(a) => a,
            TetArrangement::Owned(a) => a,
        }
    }
}

/// Compute the arrangement of `planes` inside the reference tetrahedron.
///
/// With a lookup table, non-degenerate one- and two-plane inputs resolve in
/// O(1) to a shared entry; every other input takes the incremental kernel.
pub fn compute_arrangement<'a>(
    planes: &[BaryPlane],
    lut: Option<&'a Lut>,
) -> Result<TetArrangement<'a>, DegeneratePlaneError> {
    if let Some(lut) = lut {
        if let Some(shared) = lut.lookup(planes) {
            return Ok(TetArrangement::Shared(shared));
        }
    }

    let num_planes = planes.len() as u32;
    let group = PlaneGroup::new(planes);
    let mut complex = Complex3::tetrahedron(group.len());
    let mut coplanar_classes = UnionFind::new(group.len());
    let mut unique_plane_count = 0u32;
    for i in 0..num_planes {
        let plane_id = i + 4;
        let coplanar_with = cut::add_plane_3(&group, &mut complex, plane_id)?;
        if coplanar_with != INVALID {
            coplanar_classes.merge(plane_id, coplanar_with);
        } else {
            unique_plane_count += 1;
        }
    }

    let mut arrangement = extract_arrangement(&complex);
    if unique_plane_count != num_planes {
        extract_unique_planes(&mut arrangement, &group, &mut coplanar_classes);
    }
    Ok(TetArrangement::Owned(Box::new(arrangement)))
}

/// Convert the face/edge representation into ordered vertex loops.
fn extract_arrangement(complex: &Complex3) -> Arrangement {
    let mut arrangement = Arrangement {
        vertices: complex.vertices.clone(),
        faces: Vec::with_capacity(complex.faces.len()),
        cells: Vec::with_capacity(complex.cells.len()),
        ..Default::default()
    };

    for face in &complex.faces {
        let num_boundary_edges = face.edges.len();
        debug_assert!(num_boundary_edges >= 3);
        let mut vertices = Vec::with_capacity(num_boundary_edges);
        for j in 0..num_boundary_edges {
            let curr = &complex.edges[face.edges[j] as usize];
            let next = &complex.edges[face.edges[(j + 1) % num_boundary_edges] as usize];
            // The shared endpoint between consecutive boundary edges.
            if next.vertices.contains(&curr.vertices[0]) {
                vertices.push(curr.vertices[0]);
            } else {
                debug_assert!(next.vertices.contains(&curr.vertices[1]));
                vertices.push(curr.vertices[1]);
            }
        }
        arrangement.faces.push(ArrangementFace {
            vertices,
            supporting_plane: face.supporting_plane,
            positive_cell: face.positive_cell,
            negative_cell: face.negative_cell,
        });
    }

    for cell in &complex.cells {
        arrangement.cells.push(ArrangementCell { faces: cell.faces.clone() });
    }

    arrangement
}

/// Populate the duplicate-plane equivalence classes and orientation flags.
fn extract_unique_planes(arrangement: &mut Arrangement, group: &PlaneGroup, classes: &mut UnionFind) {
    let consistently_oriented = |i1: u32, i2: u32| -> bool {
        let p1 = group.get(i1);
        let p2 = group.get(i2);
        for i in 0..4 {
            if p1[i] == 0.0 && p2[i] == 0.0 {
                continue;
            }
            return (p1[i] > 0.0 && p2[i] > 0.0) || (p1[i] < 0.0 && p2[i] < 0.0);
        }
        true
    };

    let (sets, set_of) = classes.extract_sets();
    arrangement.unique_planes = sets;
    arrangement.unique_plane_indices = set_of;
    arrangement.unique_plane_orientations = vec![true; group.len()];
    for members in &arrangement.unique_planes {
        debug_assert!(!members.is_empty());
        for &member in &members[1..] {
            arrangement.unique_plane_orientations[member as usize] =
                consistently_oriented(members[0], member);
        }
    }
}

/// An edge of a finished 2-simplex arrangement.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArrangementEdge2 {
    pub vertices: [u32; 2],
    pub supporting_line: u32,
    pub positive_face: u32,
    pub negative_face: u32,
}

/// The output form of a 2-simplex arrangement.
#[derive(Clone, Debug, Default)]
pub struct Arrangement2 {
    pub vertices: Vec<LinePoint>,
    pub edges: Vec<ArrangementEdge2>,
    pub faces: Vec<Vec<u32>>,
}

/// Compute the arrangement of `lines` inside the reference triangle.
pub fn compute_arrangement_2d(lines: &[BaryLine]) -> Result<Arrangement2, DegeneratePlaneError> {
    let group = LineGroup::new(lines);
    let mut complex = Complex2::triangle(lines.len() + 3);
    for i in 0..lines.len() as u32 {
        cut::add_line_2(&group, &mut complex, i + 3)?;
    }
    Ok(Arrangement2 {
        vertices: complex.vertices.clone(),
        edges: complex
            .edges
            .iter()
            .map(|e| ArrangementEdge2 {
                vertices: e.vertices,
                supporting_line: e.supporting_line,
                positive_face: e.positive_face,
                negative_face: e.negative_face,
            })
            .collect(),
        faces: complex.faces.iter().map(|f| f.edges.clone()).collect(),
    })
}
