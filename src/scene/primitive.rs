//! Implicit primitives.
//!
//! A closed set of tagged variants; every variant answers a signed scalar
//! (`< 0` inside), a gradient, a closest surface point, and a bounding box.

use glam::DVec3;

use super::aabb::Aabb;
use super::extrude::ExtrudedSolid;

/// Step for central-difference gradients of the irregular primitives.
const GRADIENT_STEP: f64 = 1e-6;

/// A solid bounded by a closed triangle-compatible polygon mesh.
#[derive(Clone, Debug)]
pub struct MeshSolid {
    points: Vec<DVec3>,
    /// Flat vertex indices of all faces.
    indices: Vec<u32>,
    /// (begin, count) per polygon into `indices`.
    faces: Vec<(u32, u32)>,
    aabb: Aabb,
}

impl MeshSolid {
    pub fn new(points: Vec<DVec3>, indices: Vec<u32>, faces: Vec<(u32, u32)>) -> Self {
        let mut aabb = Aabb::default();
        for &p in &points {
            aabb.extend_point(p);
        }
        Self { points, indices, faces, aabb }
    }

    /// Triangles of the mesh, polygons fanned from their first vertex.
    fn triangles(&self) -> impl Iterator<Item = [DVec3; 3]> + '_ {
        self.faces.iter().flat_map(move |&(begin, count)| {
            (1..count.max(1) - 1).map(move |k| {
                let at = |i: u32| self.points[self.indices[(begin + i) as usize] as usize];
                [at(0), at(k), at(k + 1)]
            })
        })
    }

    fn signed_distance(&self, p: DVec3) -> f64 {
        let mut distance = f64::INFINITY;
        let mut crossings = 0u32;
        for [a, b, c] in self.triangles() {
            distance = distance.min(triangle_distance(p, a, b, c));
            if ray_intersects_triangle(p, DVec3::X, a, b, c) {
                crossings += 1;
            }
        }
        if crossings % 2 == 1 {
            -distance
        } else {
            distance
        }
    }
}

/// Unsigned distance from `p` to triangle `abc`.
fn triangle_distance(p: DVec3, a: DVec3, b: DVec3, c: DVec3) -> f64 {
    let ba = b - a;
    let pa = p - a;
    let cb = c - b;
    let pb = p - b;
    let ac = a - c;
    let pc = p - c;
    let normal = ba.cross(ac);

    let sign = |t: f64| if t >= 0.0 { 1.0 } else { -1.0 };
    let outside_an_edge = sign(pa.dot(ba.cross(normal))) + sign(pb.dot(cb.cross(normal))) + sign(pc.dot(ac.cross(normal))) < 2.0;
    if outside_an_edge {
        let d1 = (ba * (ba.dot(pa) / ba.length_squared()).clamp(0.0, 1.0) - pa).length();
        let d2 = (cb * (cb.dot(pb) / cb.length_squared()).clamp(0.0, 1.0) - pb).length();
        let d3 = (ac * (ac.dot(pc) / ac.length_squared()).clamp(0.0, 1.0) - pc).length();
        d1.min(d2).min(d3)
    } else {
        (pa.dot(normal) / normal.length()).abs()
    }
}

/// Möller-Trumbore test of the ray `origin + t*dir`, `t >= 0`.
fn ray_intersects_triangle(origin: DVec3, dir: DVec3, v0: DVec3, v1: DVec3, v2: DVec3) -> bool {
    let e1 = v1 - v0;
    let e2 = v2 - v0;
    let s = origin - v0;
    let s1 = dir.cross(e2);
    let s2 = s.cross(e1);
    let denominator = s1.dot(e1);
    if denominator == 0.0 {
        return false;
    }
    let coeff = 1.0 / denominator;
    let t = coeff * s2.dot(e2);
    let b1 = coeff * s1.dot(s);
    let b2 = coeff * s2.dot(dir);
    t >= 0.0 && b1 >= 0.0 && b2 >= 0.0 && (1.0 - b1 - b2) >= 0.0
}

/// One implicit solid. Scalar convention: negative inside.
#[derive(Clone, Debug)]
pub enum Primitive {
    /// A space-filling constant; positive values denote an empty body.
    Constant { value: f64 },
    /// Half space below the plane through `point` with outward `normal`.
    Plane { point: DVec3, normal: DVec3 },
    Sphere { center: DVec3, radius: f64 },
    /// Capped cylinder from `bottom` to `bottom + offset`.
    Cylinder { bottom: DVec3, offset: DVec3, radius: f64 },
    /// Capped cone between two parallel discs.
    Cone { top: DVec3, bottom: DVec3, radius_top: f64, radius_bottom: f64 },
    Box { center: DVec3, half_size: DVec3 },
    Mesh(MeshSolid),
    Extrude(ExtrudedSolid),
}

impl Primitive {
    /// Signed scalar value at `p`; negative inside the solid.
    pub fn evaluate_scalar(&self, p: DVec3) -> f64 {
        match self {
            Primitive::Constant { value } => *value,
            Primitive::Plane { point, normal } => normal.normalize().dot(p - *point),
            Primitive::Sphere { center, radius } => (p - *center).length() - radius,
            Primitive::Cylinder { bottom, offset, radius } => {
                let height = offset.length();
                let axis = *offset / height;
                let local = p - *bottom;
                let along = local.dot(axis);
                let radial = (local - along * axis).length() - radius;
                let axial = (along - height * 0.5).abs() - height * 0.5;
                radial.max(axial).min(0.0)
                    + DVec3::new(radial.max(0.0), axial.max(0.0), 0.0).length()
            }
            Primitive::Cone { top, bottom, radius_top, radius_bottom } => {
                let ba = *top - *bottom;
                let pa = p - *bottom;
                let baba = ba.dot(ba);
                let paba = pa.dot(ba) / baba;
                let x = (pa.dot(pa) - paba * paba * baba).max(0.0).sqrt();
                let cax = (x - if paba < 0.5 { *radius_bottom } else { *radius_top }).max(0.0);
                let cay = (paba - 0.5).abs() - 0.5;
                let rba = radius_top - radius_bottom;
                let k = rba * rba + baba;
                let f = ((rba * (x - radius_bottom) + paba * baba) / k).clamp(0.0, 1.0);
                let cbx = x - radius_bottom - f * rba;
                let cby = paba - f;
                let s = if cbx < 0.0 && cay < 0.0 { -1.0 } else { 1.0 };
                s * (cax * cax + cay * cay * baba).min(cbx * cbx + cby * cby * baba).sqrt()
            }
            Primitive::Box { center, half_size } => {
                let q = (p - *center).abs() - *half_size;
                q.max(DVec3::ZERO).length() + q.max_element().min(0.0)
            }
            Primitive::Mesh(mesh) => mesh.signed_distance(p),
            Primitive::Extrude(solid) => solid.signed_distance(p),
        }
    }

    /// Gradient of the scalar at `p`; analytic where the primitive is
    /// smooth, central differences otherwise.
    pub fn evaluate_gradient(&self, p: DVec3) -> DVec3 {
        match self {
            Primitive::Constant { .. } => DVec3::ZERO,
            Primitive::Plane { normal, .. } => normal.normalize(),
            Primitive::Sphere { center, radius: _ } => {
                let v = p - *center;
                let len = v.length();
                if len < GRADIENT_STEP {
                    DVec3::ZERO
                } else {
                    v / len
                }
            }
            _ => {
                let h = GRADIENT_STEP;
                let d = |axis: DVec3| {
                    (self.evaluate_scalar(p + axis * h) - self.evaluate_scalar(p - axis * h)) / (2.0 * h)
                };
                DVec3::new(d(DVec3::X), d(DVec3::Y), d(DVec3::Z))
            }
        }
    }

    /// A point on the zero set near `p`, via one gradient step.
    pub fn closest_point(&self, p: DVec3) -> DVec3 {
        let gradient = self.evaluate_gradient(p);
        let len = gradient.length();
        if len == 0.0 {
            return p;
        }
        p - self.evaluate_scalar(p) * gradient / len
    }

    /// Bounding box of the solid (conservative; unbounded solids report an
    /// all-space box).
    pub fn aabb(&self) -> Aabb {
        match self {
            Primitive::Constant { value } => {
                if *value < 0.0 {
                    Aabb::everything()
                } else {
                    Aabb::default()
                }
            }
            Primitive::Plane { .. } => Aabb::everything(),
            Primitive::Sphere { center, radius } => {
                Aabb::new(*center - DVec3::splat(*radius), *center + DVec3::splat(*radius))
            }
            Primitive::Cylinder { bottom, offset, radius } => {
                let mut aabb = Aabb::default();
                aabb.extend_point(*bottom);
                aabb.extend_point(*bottom + *offset);
                aabb.expand(*radius);
                aabb
            }
            Primitive::Cone { top, bottom, radius_top, radius_bottom } => {
                let mut aabb = Aabb::default();
                aabb.extend_point(*top);
                aabb.extend_point(*bottom);
                aabb.expand(radius_top.max(*radius_bottom));
                aabb
            }
            Primitive::Box { center, half_size } => Aabb::new(*center - *half_size, *center + *half_size),
            Primitive::Mesh(mesh) => mesh.aabb,
            Primitive::Extrude(solid) => solid.aabb(),
        }
    }
}
