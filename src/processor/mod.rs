//! The implicit surface network processor.
//!
//! Pipeline: per-tet arrangements over the active primitives, global
//! iso-mesh extraction with cross-tet deduplication, patch/chain
//! connectivity, half-face ordering around non-manifold chains, shell and
//! component construction, arrangement-cell resolution (topological ray
//! shooting when components nest), sign propagation, and finally
//! boolean-driven cell filtering with surface and volume integrals.

mod connectivity;
mod extract;
mod order;
mod propagate;
mod ray_shooting;

use glam::DVec3;
use log::{debug, info};
use ndarray::Array2;
use rayon::prelude::*;
use smallvec::SmallVec;

use crate::arrangement::{compute_arrangement, Arrangement, BaryPlane, Lut, TetArrangement};
use crate::containers::DynamicBitset;
use crate::error::{Error, Result};
use crate::mesh::{TetMesh, VertexTetIncidence};
use crate::scene::Scene;

/// Sentinel for "no index".
pub const INVALID: u32 = u32::MAX;

/// The smallest background-mesh simplex containing an iso-vertex.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimplexKind {
    /// On a background-mesh vertex.
    Vertex = 1,
    /// In the interior of a mesh edge.
    Edge = 2,
    /// In the interior of a mesh face.
    Face = 3,
    /// In a tetrahedron's interior.
    Interior = 4,
}

impl SimplexKind {
    /// Number of mesh vertices spanning the simplex.
    #[inline]
    pub fn vertex_count(self) -> usize {
        self as usize
    }
}

impl IsoVertex {
    /// Mesh vertices of the minimal containing simplex.
    #[inline]
    pub fn simplex_vertices(&self) -> &[u32] {
        &self.simplex_verts[..self.simplex.vertex_count()]
    }
}

/// A vertex of the stitched surface network.
#[derive(Clone, Copy, Debug)]
pub struct IsoVertex {
    /// Tet that first produced the vertex.
    pub tet: u32,
    /// Local vertex index inside that tet's arrangement.
    pub local: u32,
    pub simplex: SimplexKind,
    /// Mesh vertices of the minimal simplex; the first
    /// `simplex.vertex_count()` entries are valid.
    pub simplex_verts: [u32; 4],
    /// Implicit functions whose zero sets pass through the vertex,
    /// `INVALID`-padded.
    pub functions: [u32; 3],
}

/// Identifies a face inside one tet's arrangement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FaceHeader {
    pub tet: u32,
    pub local_face: u32,
}

/// A polygon of the surface network.
#[derive(Clone, Debug, Default)]
pub struct PolygonFace {
    /// Global iso-vertex ids, counter-clockwise seen from the positive side
    /// of the supporting function.
    pub vertices: Vec<u32>,
    /// Every (tet, local face) that contributes this polygon.
    pub headers: SmallVec<[FaceHeader; 2]>,
    /// The function whose zero set contains the polygon.
    pub function: u32,
}

/// Incidence of an iso-edge in one iso-face's boundary.
#[derive(Clone, Copy, Debug)]
pub struct EdgeHeader {
    pub face: u32,
    /// Edge position within the face's vertex loop.
    pub local_edge: u32,
}

/// An edge of the surface network. Manifold iff exactly two headers.
#[derive(Clone, Debug, Default)]
pub struct IsoEdge {
    pub v1: u32,
    pub v2: u32,
    pub headers: SmallVec<[EdgeHeader; 4]>,
}

/// A patch side: patch `index` seen from its positive (`+1`) or negative
/// (`-1`) side. Half-patch id `2*index + (orientation < 0)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HalfPatch {
    pub index: u32,
    pub orientation: i8,
}

impl HalfPatch {
    #[inline]
    pub fn id(self) -> u32 {
        2 * self.index + u32::from(self.orientation < 0)
    }
}

/// A face side during chain ordering, before patches are known.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HalfFace {
    pub index: u32,
    pub orientation: i8,
}

/// Global identity of a local arrangement vertex: either a surface-network
/// vertex or a background-mesh corner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GlobalVid {
    Iso(u32),
    Mesh(u32),
}

/// The boundary surface of the run's boolean expression.
#[derive(Clone, Debug, Default)]
pub struct FilteredSurface {
    /// Flat vertex indices of all emitted polygons, indices into the
    /// processor's `iso_vertices` (which is not pruned).
    pub faces: Vec<u32>,
    /// Per-polygon vertex count, parallel to the polygon sequence.
    pub vertex_counts: Vec<u32>,
    pub surface_area: f64,
    pub volume: f64,
}

/// The surface network processor. Borrows its inputs for the duration of a
/// run and owns every intermediate and output arena.
pub struct SurfaceNetworkProcessor<'a> {
    mesh: &'a TetMesh,
    scalar_field: &'a Array2<f64>,
    lut: Option<&'a Lut>,

    // Per-tet stage data, kept for the ordering and ray-shooting stages.
    tet_arrangements: Vec<Option<TetArrangement<'a>>>,
    funcs_in_tet: Vec<u32>,
    func_start_of_tet: Vec<u32>,
    tables: extract::ExtractionTables,
    incidence: VertexTetIncidence,
    patch_of_face: Vec<u32>,

    /// Surface-network vertex positions (parallel to `iso_verts`).
    pub iso_vertices: Vec<DVec3>,
    pub iso_verts: Vec<IsoVertex>,
    pub iso_faces: Vec<PolygonFace>,
    pub iso_edges: Vec<IsoEdge>,
    /// Iso-face ids per patch.
    pub patches: Vec<Vec<u32>>,
    /// Supporting function per patch.
    pub patch_functions: Vec<u32>,
    /// Iso-edge ids per chain.
    pub chains: Vec<Vec<u32>>,
    /// Half-patch ids per shell.
    pub shells: Vec<Vec<u32>>,
    pub shell_of_half_patch: Vec<u32>,
    /// Patch ids per component.
    pub components: Vec<Vec<u32>>,
    pub component_of_patch: Vec<u32>,
    /// Shell ids per arrangement cell.
    pub arrangement_cells: Vec<Vec<u32>>,
    /// Per function, one bit per arrangement cell: true iff the cell lies
    /// inside that function's solid.
    pub cell_labels: Vec<DynamicBitset>,
}

impl<'a> SurfaceNetworkProcessor<'a> {
    /// Create a processor over a background mesh and its (function x
    /// vertex) scalar matrix. `lut` enables the arrangement fast path.
    pub fn new(mesh: &'a TetMesh, scalar_field: &'a Array2<f64>, lut: Option<&'a Lut>) -> Self {
        assert!(
            scalar_field.ncols() == mesh.num_vertices(),
            "scalar field must cover every mesh vertex"
        );
        Self {
            mesh,
            scalar_field,
            lut,
            tet_arrangements: Vec::new(),
            funcs_in_tet: Vec::new(),
            func_start_of_tet: Vec::new(),
            tables: Default::default(),
            incidence: Default::default(),
            patch_of_face: Vec::new(),
            iso_vertices: Vec::new(),
            iso_verts: Vec::new(),
            iso_faces: Vec::new(),
            iso_edges: Vec::new(),
            patches: Vec::new(),
            patch_functions: Vec::new(),
            chains: Vec::new(),
            shells: Vec::new(),
            shell_of_half_patch: Vec::new(),
            components: Vec::new(),
            component_of_patch: Vec::new(),
            arrangement_cells: Vec::new(),
            cell_labels: Vec::new(),
        }
    }

    #[inline]
    fn num_functions(&self) -> usize {
        self.scalar_field.nrows()
    }

    /// Arrangement of tet `t`, if any function is active there.
    fn arrangement_of_tet(&self, tet: u32) -> Option<&Arrangement> {
        self.tet_arrangements[tet as usize].as_deref()
    }

    /// Function id of local plane `plane` (>= 4) of tet `tet`.
    fn function_of_plane(&self, tet: u32, plane: u32) -> u32 {
        debug_assert!(plane >= 4);
        self.funcs_in_tet[(self.func_start_of_tet[tet as usize] + plane - 4) as usize]
    }

    /// Run stages B through H: arrangements, extraction, connectivity,
    /// ordering, shells, cells, and sign propagation. The boolean filter is
    /// [`Self::filter_surface`].
    pub fn run(&mut self, scene: &Scene) -> Result<()> {
        assert!(
            scene.primitive_count() == self.num_functions(),
            "scene and scalar field must agree on the primitive count"
        );

        // Active functions per tet: mixed corner signs.
        self.scan_active_functions();
        info!(
            "active-function scan: {} entries over {} tets",
            self.funcs_in_tet.len(),
            self.mesh.num_tets()
        );

        // Per-tet arrangements, tets independent (merged tet-ascending).
        self.compute_tet_arrangements()?;

        // Global iso-mesh extraction with cross-tet deduplication.
        let extraction = extract::extract_iso_mesh(self);
        self.iso_verts = extraction.iso_verts;
        self.iso_faces = extraction.iso_faces;
        self.tables = extraction.tables;
        self.iso_vertices = extract::compute_iso_vertex_coordinates(self.mesh, self.scalar_field, &self.iso_verts);
        info!("extracted {} iso-vertices, {} iso-faces", self.iso_verts.len(), self.iso_faces.len());

        // Iso-edges and face->edge incidence.
        let edges_of_face = connectivity::compute_patch_edges(&self.iso_faces, &mut self.iso_edges);

        // Patches over manifold edges.
        connectivity::compute_patches(
            &edges_of_face,
            &self.iso_edges,
            &self.iso_faces,
            &mut self.patches,
            &mut self.patch_functions,
        );
        self.patch_of_face = vec![INVALID; self.iso_faces.len()];
        for (patch, faces) in self.patches.iter().enumerate() {
            for &face in faces {
                self.patch_of_face[face as usize] = patch as u32;
            }
        }

        // Chains over non-manifold edges.
        let mut non_manifold_edges_of_vert: Vec<SmallVec<[u32; 4]>> =
            vec![SmallVec::new(); self.iso_verts.len()];
        for (e, edge) in self.iso_edges.iter().enumerate() {
            if edge.headers.len() > 2 {
                non_manifold_edges_of_vert[edge.v1 as usize].push(e as u32);
                non_manifold_edges_of_vert[edge.v2 as usize].push(e as u32);
            }
        }
        connectivity::compute_chains(&self.iso_edges, &non_manifold_edges_of_vert, &mut self.chains);
        debug!("{} patches, {} chains", self.patches.len(), self.chains.len());

        // Mesh incidence for multi-tet chain ordering and degenerate
        // endpoints.
        self.incidence = self.mesh.vertex_tet_incidence();

        // Cyclic half-face order around each chain, then shells/components.
        let mut half_patch_pairs: Vec<(HalfPatch, HalfPatch)> = Vec::new();
        for chain in 0..self.chains.len() {
            let representative = self.chains[chain][0];
            let face_pairs = order::compute_face_order(self, representative);
            for (a, b) in face_pairs {
                half_patch_pairs.push((
                    HalfPatch { index: self.patch_of_face[a.index as usize], orientation: a.orientation },
                    HalfPatch { index: self.patch_of_face[b.index as usize], orientation: b.orientation },
                ));
            }
        }

        connectivity::compute_shells_and_components(
            self.patches.len() as u32,
            &half_patch_pairs,
            &mut self.shells,
            &mut self.shell_of_half_patch,
            &mut self.components,
            &mut self.component_of_patch,
        );
        debug!("{} shells, {} components", self.shells.len(), self.components.len());

        // Arrangement cells: trivial when a single component, otherwise
        // nesting is resolved by topological ray shooting.
        if self.components.len() < 2 {
            self.arrangement_cells = (0..self.shells.len() as u32).map(|s| vec![s]).collect();
        } else {
            let shell_links = ray_shooting::topo_ray_shooting(self);
            connectivity::compute_arrangement_cells(
                self.shells.len() as u32,
                &shell_links,
                &mut self.arrangement_cells,
            );
        }
        info!("{} arrangement cells", self.arrangement_cells.len());

        // Containment labels for every (function, cell) pair.
        self.cell_labels = propagate::propagate_labels(self, scene)?;
        Ok(())
    }

    /// Stage I: evaluate the blobtree over the cell labels, emit the
    /// boundary between active and inactive cells, and accumulate the
    /// integrals. `face_areas` and `face_volumes` are the caller-supplied
    /// per-iso-face integrals.
    pub fn filter_surface(
        &self,
        scene: &Scene,
        root: u32,
        face_areas: &[f64],
        face_volumes: &[f64],
    ) -> Result<FilteredSurface> {
        propagate::filter_surface(self, scene, root, face_areas, face_volumes)
    }

    /// Mark functions active per tet: a function crosses a tet iff its
    /// corner values have at least one strictly positive and one
    /// non-positive entry.
    fn scan_active_functions(&mut self) {
        let mesh = self.mesh;
        let scalar_field = self.scalar_field;
        let num_functions = self.num_functions();
        self.funcs_in_tet = Vec::with_capacity(mesh.num_tets());
        self.func_start_of_tet = Vec::with_capacity(mesh.num_tets() + 1);
        self.func_start_of_tet.push(0);
        for tet in &mesh.tets {
            for f in 0..num_functions {
                let positive = tet
                    .iter()
                    .filter(|&&v| scalar_field[[f, v as usize]] > 0.0)
                    .count();
                if positive > 0 && positive < 4 {
                    self.funcs_in_tet.push(f as u32);
                }
            }
            self.func_start_of_tet.push(self.funcs_in_tet.len() as u32);
        }
    }

    /// Compute the arrangement of every intersecting tet, in parallel,
    /// collected in tet order.
    fn compute_tet_arrangements(&mut self) -> Result<()> {
        let mesh = self.mesh;
        let scalar_field = self.scalar_field;
        let lut = self.lut;
        let funcs_in_tet = &self.funcs_in_tet;
        let func_start_of_tet = &self.func_start_of_tet;
        let results: std::result::Result<Vec<_>, Error> = (0..mesh.num_tets())
            .into_par_iter()
            .map(|t| {
                let start = func_start_of_tet[t] as usize;
                let end = func_start_of_tet[t + 1] as usize;
                if start == end {
                    return Ok(None);
                }
                let tet = mesh.tets[t];
                let planes: Vec<BaryPlane> = funcs_in_tet[start..end]
                    .iter()
                    .map(|&f| {
                        [
                            scalar_field[[f as usize, tet[0] as usize]],
                            scalar_field[[f as usize, tet[1] as usize]],
                            scalar_field[[f as usize, tet[2] as usize]],
                            scalar_field[[f as usize, tet[3] as usize]],
                        ]
                    })
                    .collect();
                compute_arrangement(&planes, lut)
                    .map(Some)
                    .map_err(|e| Error::DegeneratePlane {
                        tet: t as u32,
                        primitive: funcs_in_tet[start + (e.plane - 4) as usize],
                    })
            })
            .collect();
        self.tet_arrangements = results?;

        let shared = self
            .tet_arrangements
            .iter()
            .flatten()
            .filter(|a| matches!(a, TetArrangement::Shared(_)))
            .count();
        let owned = self.tet_arrangements.iter().flatten().count() - shared;
        debug!("tet arrangements: {shared} from lookup table, {owned} computed");
        Ok(())
    }
}
