//! The scene: primitives, their bounding boxes, and the blobtree combining
//! them. One scene object replaces the original system's module-level
//! globals; it is constructed before any run and borrowed by the processor.

mod aabb;
mod blobtree;
mod extrude;
mod primitive;

pub use aabb::Aabb;
pub use blobtree::{BlobTree, BoolOp, Node, NodeKind};
pub use extrude::{AxisLine, CircularArc3, ClosestPoint, ExtrudedSolid, HelixLine, PolyLine};
pub use primitive::{MeshSolid, Primitive};

use glam::DVec3;
use ndarray::Array2;
use rayon::prelude::*;

use crate::mesh::TetMesh;

/// Sentinel for "no index".
pub const INVALID: u32 = u32::MAX;

/// A CSG scene: the primitive table, per-primitive bounding boxes, and the
/// boolean expression tree over them.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    primitives: Vec<Primitive>,
    aabbs: Vec<Aabb>,
    tree: BlobTree,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a primitive, creating its blobtree leaf. Returns the leaf node id.
    pub fn add_primitive(&mut self, primitive: Primitive) -> u32 {
        let index = self.primitives.len() as u32;
        self.aabbs.push(primitive.aabb());
        self.primitives.push(primitive);
        self.tree.push_leaf(index)
    }

    /// Join two parentless subtrees; returns the new node id.
    pub fn union(&mut self, left: u32, right: u32) -> u32 {
        self.tree.join(BoolOp::Union, left, right)
    }

    pub fn intersect(&mut self, left: u32, right: u32) -> u32 {
        self.tree.join(BoolOp::Intersection, left, right)
    }

    pub fn difference(&mut self, left: u32, right: u32) -> u32 {
        self.tree.join(BoolOp::Difference, left, right)
    }

    #[inline] pub fn primitive_count(&self) -> usize { self.primitives.len() }

    #[inline]
    pub fn primitive(&self, index: u32) -> &Primitive {
        &self.primitives[index as usize]
    }

    #[inline]
    pub fn aabb(&self, index: u32) -> &Aabb {
        &self.aabbs[index as usize]
    }

    #[inline] pub fn tree(&self) -> &BlobTree { &self.tree }

    /// The root of the boolean expression, if the arena forms one tree.
    #[inline]
    pub fn root(&self) -> Option<u32> {
        self.tree.root()
    }

    /// Evaluate every primitive at every mesh vertex: the (function x
    /// vertex) scalar-field matrix the processor consumes. Rows are
    /// primitives.
    pub fn evaluate_scalar_field(&self, mesh: &TetMesh) -> Array2<f64> {
        let num_primitives = self.primitives.len();
        let num_vertices = mesh.vertices.len();
        let values: Vec<f64> = (0..num_primitives)
            .into_par_iter()
            .flat_map_iter(|f| {
                let primitive = &self.primitives[f];
                mesh.vertices.iter().map(move |&v| primitive.evaluate_scalar(v))
            })
            .collect();
        Array2::from_shape_vec((num_primitives, num_vertices), values)
            .expect("scalar field shape follows from its construction")
    }

    /// True if `point` is inside primitive `index` (AABB prefilter plus
    /// sign evaluation).
    pub fn contains(&self, index: u32, point: DVec3) -> bool {
        self.aabbs[index as usize].contains(point) && self.primitive(index).evaluate_scalar(point) < 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_field_layout_is_function_major() {
        let mut scene = Scene::new();
        scene.add_primitive(Primitive::Sphere { center: DVec3::ZERO, radius: 0.5 });
        scene.add_primitive(Primitive::Plane { point: DVec3::ZERO, normal: DVec3::X });

        let mesh = TetMesh::generate(1, DVec3::splat(-1.0), DVec3::splat(1.0));
        let field = scene.evaluate_scalar_field(&mesh);
        assert_eq!(field.shape(), &[2, mesh.num_vertices()]);
        for (v, &position) in mesh.vertices.iter().enumerate() {
            assert_eq!(field[[0, v]], scene.primitive(0).evaluate_scalar(position));
            assert_eq!(field[[1, v]], scene.primitive(1).evaluate_scalar(position));
        }
    }

    #[test]
    fn contains_combines_aabb_and_sign() {
        let mut scene = Scene::new();
        scene.add_primitive(Primitive::Sphere { center: DVec3::ZERO, radius: 0.5 });
        assert!(scene.contains(0, DVec3::ZERO));
        // Inside the AABB corner but outside the ball.
        assert!(!scene.contains(0, DVec3::splat(0.45)));
        assert!(!scene.contains(0, DVec3::splat(2.0)));
    }

    #[test]
    fn csg_tree_construction() {
        let mut scene = Scene::new();
        let a = scene.add_primitive(Primitive::Sphere { center: DVec3::ZERO, radius: 0.8 });
        let b = scene.add_primitive(Primitive::Sphere { center: DVec3::ZERO, radius: 0.3 });
        let root = scene.difference(a, b);
        assert_eq!(scene.root(), Some(root));
        assert_eq!(scene.primitive_count(), 2);
        assert_eq!(scene.tree().leaf_of_primitive(0), a);
        assert_eq!(scene.tree().leaf_of_primitive(1), b);
    }
}
