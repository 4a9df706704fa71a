#![doc = "CSG over implicit solids: surface network extraction, arrangement cells, and integrals"]

mod arrangement;
mod config;
mod containers;
mod error;
mod integrate;
mod mesh;
mod pipeline;
mod predicates;
mod processor;
mod scene;

pub mod cli;
pub mod commands;

#[doc(inline)]
pub use arrangement::{
    compute_arrangement, compute_arrangement_2d, Arrangement, Arrangement2, ArrangementCell,
    ArrangementEdge2, ArrangementFace, BaryLine, BaryPlane, DegeneratePlaneError, Lut,
    TetArrangement,
};

#[doc(inline)]
pub use config::Config;

#[doc(inline)]
pub use containers::{DynamicBitset, FlatMap, FlatSet, UnionFind};

#[doc(inline)]
pub use error::{Error, Result};

#[doc(inline)]
pub use integrate::{face_integrals, FaceIntegrals};

#[doc(inline)]
pub use mesh::TetMesh;

#[doc(inline)]
pub use pipeline::{solve, SolveResult, SolveStats};

#[doc(inline)]
pub use processor::{
    EdgeHeader, FaceHeader, FilteredSurface, GlobalVid, HalfPatch, IsoEdge, IsoVertex, PolygonFace,
    SimplexKind, SurfaceNetworkProcessor,
};

#[doc(inline)]
pub use scene::{
    Aabb, AxisLine, BlobTree, BoolOp, CircularArc3, ClosestPoint, ExtrudedSolid, HelixLine,
    MeshSolid, Node, NodeKind, PolyLine, Primitive, Scene,
};

#[doc(inline)]
pub use predicates::{orient1d, orient2d, orient3d, Orientation};
