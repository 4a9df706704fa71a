//! Extruded solids: a closed 2-D profile (poly-line with per-segment bulge
//! arcs) swept along a 3-D axis that is a poly-line, a single arc, or a
//! helix.
//!
//! The signed distance of a query point is computed by finding its closest
//! axis parameter, erecting the local tangent/normal/binormal frame there,
//! projecting the point into the profile plane, and classifying it against
//! the 2-D profile loops (first loop is the outer boundary, the rest are
//! holes). Negative means inside.

use glam::{DVec2, DVec3};

use super::aabb::Aabb;

const EPS: f64 = 1e-9;
/// Parameter slack for treating an axis parameter as an endpoint.
const EPS_END_PARAM: f64 = 1e-8;
/// Newton convergence threshold on |dL|.
const EPS_NEWTON: f64 = 1e6 * f64::EPSILON;
/// Hard cap on Newton refinement steps.
const MAX_NEWTON_STEPS: usize = 32;

#[inline]
fn nearly_zero(x: f64) -> bool {
    x.abs() < EPS
}

/// Closest-point query result on a parametric line.
#[derive(Clone, Copy, Debug)]
pub struct ClosestPoint {
    pub t: f64,
    pub distance: f64,
}

impl Default for ClosestPoint {
    fn default() -> Self {
        Self { t: 0.0, distance: f64::MAX }
    }
}

/// Point/region classification against a closed boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundaryRelation {
    Inside,
    OnBoundary,
    Outside,
}

impl BoundaryRelation {
    #[inline]
    fn sign(self) -> f64 {
        match self {
            BoundaryRelation::Inside => -1.0,
            BoundaryRelation::OnBoundary => 0.0,
            BoundaryRelation::Outside => 1.0,
        }
    }
}

/// Circular arc data for one poly-line segment. A zero `theta` marks a
/// straight segment.
#[derive(Clone, Copy, Debug)]
pub struct CircularArc3 {
    pub center: DVec3,
    pub radius: f64,
    pub theta: f64,
    /// Distance from the chord midpoint to the center; infinite for
    /// straight segments.
    pub h: f64,
    pub u: DVec3,
    pub v: DVec3,
    /// Unit direction from the chord toward the arc's bulge side.
    pub in_circle_dir: DVec3,
}

impl CircularArc3 {
    #[inline]
    fn is_curved(&self) -> bool {
        self.theta > 0.0
    }
}

/// The 2-D projection of a [`CircularArc3`] into the profile plane.
#[derive(Clone, Copy, Debug)]
pub struct CircularArc2 {
    pub center: DVec2,
    pub radius: f64,
    pub theta: f64,
    pub h: f64,
    pub in_circle_dir: DVec2,
}

/// Closest point of `p` on segment `ab`, as (parameter on the segment,
/// distance).
fn segment_closest_3(p: DVec3, a: DVec3, b: DVec3) -> ClosestPoint {
    let ab = b - a;
    let ap = p - a;
    let h = (ap.dot(ab) / ab.dot(ab)).clamp(0.0, 1.0);
    ClosestPoint { t: h, distance: (ap - ab * h).length() }
}

fn segment_closest_2(p: DVec2, a: DVec2, b: DVec2) -> ClosestPoint {
    let ab = b - a;
    let ap = p - a;
    let h = (ap.dot(ab) / ab.dot(ab)).clamp(0.0, 1.0);
    ClosestPoint { t: h, distance: (ap - ab * h).length() }
}

/// A 3-D poly-line whose segments may bulge into circular arcs.
///
/// Parameterised by segment: `t` in `[i, i+1]` traces segment `i`. Closed
/// poly-lines have as many segments as points, open ones one fewer.
#[derive(Clone, Debug)]
pub struct PolyLine {
    points: Vec<DVec3>,
    bulges: Vec<f64>,
    ref_normal: DVec3,
    closed: bool,
    arcs: Vec<CircularArc3>,
    aabb: Aabb,
}

impl PolyLine {
    pub fn new(points: Vec<DVec3>, bulges: Vec<f64>, ref_normal: DVec3, closed: bool) -> Self {
        assert!(points.len() >= 2, "poly-line needs at least two points");
        if closed {
            assert!(points.len() == bulges.len(), "closed poly-line: one bulge per point");
        } else {
            assert!(points.len() - 1 == bulges.len(), "open poly-line: one bulge per segment");
        }
        let ref_normal = ref_normal.normalize();
        let mut line = Self { points, bulges, ref_normal, closed, arcs: Vec::new(), aabb: Aabb::default() };
        line.arcs = (0..line.bulges.len()).map(|i| line.arc_of_segment(i)).collect();
        for i in 0..line.bulges.len() {
            let mut segment_box = Aabb::default();
            segment_box.extend_point(line.points[i]);
            segment_box.extend_point(line.points[(i + 1) % line.points.len()]);
            let arc = &line.arcs[i];
            if arc.is_curved() {
                segment_box.expand(arc.radius - arc.h);
            }
            line.aabb.extend(&segment_box);
        }
        line
    }

    /// A single-arc line between `a` and `b`.
    pub fn single_arc(a: DVec3, b: DVec3, bulge: f64, ref_normal: DVec3) -> Self {
        Self::new(vec![a, b], vec![bulge], ref_normal, false)
    }

    fn arc_of_segment(&self, i: usize) -> CircularArc3 {
        let a = self.points[i];
        let b = self.points[(i + 1) % self.points.len()];
        let bulge = self.bulges[i];
        if nearly_zero(bulge) {
            let in_circle_dir = self.ref_normal.cross(b - a).normalize();
            return CircularArc3 {
                center: DVec3::ZERO,
                radius: f64::INFINITY,
                theta: 0.0,
                h: f64::INFINITY,
                u: in_circle_dir,
                v: self.ref_normal.cross(in_circle_dir),
                in_circle_dir,
            };
        }

        let ab_half = (b - a) * 0.5;
        let ab_norm = ab_half.normalize();
        let theta = bulge.abs().atan() * 4.0;
        let in_circle_dir = ab_norm.cross(self.ref_normal) * if bulge > 0.0 { 1.0 } else { -1.0 };
        let h = if bulge.abs() == 1.0 { 0.0 } else { ab_half.length() / (theta * 0.5).tan() };
        let center = a + ab_half - in_circle_dir * h;
        let radius = (center - a).length();
        let u = (a - center).normalize();
        CircularArc3 { center, radius, theta, h, u, v: self.ref_normal.cross(u), in_circle_dir }
    }

    #[inline] pub fn points(&self) -> &[DVec3] { &self.points }

    #[inline] pub fn is_closed(&self) -> bool { self.closed }

    #[inline] pub fn ref_normal(&self) -> DVec3 { self.ref_normal }

    #[inline] pub fn arcs(&self) -> &[CircularArc3] { &self.arcs }

    #[inline] pub fn start_t(&self) -> f64 { 0.0 }

    #[inline] pub fn end_t(&self) -> f64 { self.bulges.len() as f64 }

    #[inline] pub fn aabb(&self) -> Aabb { self.aabb }

    #[inline]
    fn segment_of(&self, t: f64) -> usize {
        (t as usize).min(self.bulges.len() - 1)
    }

    pub fn eval(&self, t: f64) -> DVec3 {
        let seg = self.segment_of(t);
        let a = self.points[seg];
        let b = self.points[(seg + 1) % self.points.len()];
        if nearly_zero(self.bulges[seg]) {
            return a + (b - a) * (t - seg as f64);
        }
        let arc = &self.arcs[seg];
        let phi = (t - seg as f64) * arc.theta;
        arc.center + arc.radius * (arc.u * phi.cos() + arc.v * phi.sin())
    }

    pub fn der1(&self, t: f64) -> DVec3 {
        let seg = self.segment_of(t);
        if nearly_zero(self.bulges[seg]) {
            return self.points[(seg + 1) % self.points.len()] - self.points[seg];
        }
        let arc = &self.arcs[seg];
        let phi = (t - seg as f64) * arc.theta;
        arc.radius * (arc.u * -phi.sin() + arc.v * phi.cos())
    }

    pub fn der2(&self, t: f64) -> DVec3 {
        let seg = self.segment_of(t);
        let arc = &self.arcs[seg];
        let phi = (t - seg as f64) * arc.theta;
        -arc.radius * (arc.u * phi.cos() + arc.v * phi.sin())
    }

    pub fn tangent(&self, t: f64) -> DVec3 {
        self.der1(t).normalize()
    }

    pub fn normal(&self, t: f64, _tangent: Option<DVec3>) -> DVec3 {
        let seg = self.segment_of(t);
        if nearly_zero(self.bulges[seg]) {
            return -self.arcs[seg].in_circle_dir;
        }
        self.der2(t).normalize()
    }

    #[inline]
    pub fn is_end_param(&self, t: f64) -> bool {
        t < EPS_END_PARAM || t > self.end_t() - EPS_END_PARAM
    }

    /// Closest parameter and distance to `p` over all segments.
    pub fn closest(&self, p: DVec3) -> ClosestPoint {
        let mut closest = ClosestPoint::default();
        for i in 0..self.bulges.len() {
            let a = self.points[i];
            let b = self.points[(i + 1) % self.points.len()];
            if nearly_zero(self.bulges[i]) {
                let on_segment = segment_closest_3(p, a, b);
                if on_segment.distance < closest.distance {
                    closest = ClosestPoint { t: i as f64 + on_segment.t, distance: on_segment.distance };
                }
                continue;
            }
            let arc = &self.arcs[i];
            // Project into the arc plane, then onto the circle.
            let projected = p - self.ref_normal.dot(p - a) * self.ref_normal;
            let on_circle = arc.center + arc.radius * (projected - arc.center).normalize();
            if (on_circle - a).dot(arc.in_circle_dir) > 0.0 {
                // The circle's closest point lies on the arc span.
                let distance = (p - on_circle).length();
                if distance < closest.distance {
                    let oa = a - arc.center;
                    let oc = on_circle - arc.center;
                    let cos_theta = (oa.dot(oc) / (arc.radius * arc.radius)).clamp(-1.0, 1.0);
                    let mut angle = cos_theta.acos();
                    if oa.cross(oc).dot(self.ref_normal) < 0.0 {
                        angle = std::f64::consts::TAU - angle;
                    }
                    closest = ClosestPoint { t: i as f64 + angle / arc.theta, distance };
                }
                continue;
            }
            let to_a = (p - a).length();
            let to_b = (p - b).length();
            if to_a < closest.distance {
                closest = ClosestPoint { t: i as f64, distance: to_a };
            }
            if to_b < closest.distance {
                closest = ClosestPoint { t: i as f64 + 1.0, distance: to_b };
            }
        }
        closest
    }
}

/// A constant-pitch helix around a straight axis, parameterised by advance
/// along the axis: `t` in `[0, advance_len]`.
#[derive(Clone, Debug)]
pub struct HelixLine {
    axis_start: DVec3,
    axis_dir: DVec3,
    advance_len: f64,
    frequency: f64,
    u: DVec3,
    v: DVec3,
    radius: f64,
    two_pi_r_over_pitch: f64,
    four_pi2_r_over_pitch2: f64,
    arc_delta_max_factor: f64,
    seg_t: f64,
    aabb: Aabb,
}

const HELIX_SEGS_PER_ROUND: f64 = 12.0;

impl HelixLine {
    pub fn new(axis_start: DVec3, axis_end: DVec3, radius: f64, advance_per_round: f64, start_dir: DVec3) -> Self {
        let span = axis_end - axis_start;
        let advance_len = span.length();
        let axis_dir = span / advance_len;
        let u = start_dir.normalize();
        let v = axis_dir.cross(u);
        let frequency = std::f64::consts::TAU / advance_per_round;
        let two_pi_r_over_pitch = std::f64::consts::TAU * radius / advance_per_round;
        let four_pi2_r = std::f64::consts::TAU * std::f64::consts::TAU * radius;
        let arc_delta_max_factor =
            four_pi2_r / (advance_per_round * advance_per_round + four_pi2_r * radius) * 0.125;

        let mut aabb = Aabb::default();
        aabb.extend_point(axis_start);
        aabb.extend_point(axis_end);
        aabb.expand(radius);

        Self {
            axis_start,
            axis_dir,
            advance_len,
            frequency,
            u,
            v,
            radius,
            two_pi_r_over_pitch,
            four_pi2_r_over_pitch2: two_pi_r_over_pitch * frequency,
            arc_delta_max_factor,
            seg_t: advance_per_round / HELIX_SEGS_PER_ROUND,
            aabb,
        }
    }

    #[inline] pub fn start_t(&self) -> f64 { 0.0 }

    #[inline] pub fn end_t(&self) -> f64 { self.advance_len }

    #[inline] pub fn aabb(&self) -> Aabb { self.aabb }

    pub fn eval(&self, t: f64) -> DVec3 {
        let theta = self.frequency * t;
        self.axis_start + self.axis_dir * t + (self.u * theta.cos() + self.v * theta.sin()) * self.radius
    }

    pub fn der1(&self, t: f64) -> DVec3 {
        let theta = self.frequency * t;
        self.axis_dir + self.two_pi_r_over_pitch * (self.v * theta.cos() - self.u * theta.sin())
    }

    pub fn der2(&self, t: f64) -> DVec3 {
        let theta = self.frequency * t;
        -self.four_pi2_r_over_pitch2 * (self.u * theta.cos() + self.v * theta.sin())
    }

    pub fn tangent(&self, t: f64) -> DVec3 {
        self.der1(t).normalize()
    }

    pub fn normal(&self, t: f64, tangent: Option<DVec3>) -> DVec3 {
        let der2 = self.der2(t);
        let tangent = tangent.unwrap_or_else(|| self.tangent(t));
        (der2 - der2.dot(tangent) * tangent).normalize()
    }

    #[inline]
    pub fn is_end_param(&self, t: f64) -> bool {
        t < EPS_END_PARAM || t > self.advance_len - EPS_END_PARAM
    }

    /// Closest parameter by coarse sampling plus bounded Newton refinement.
    pub fn closest(&self, p: DVec3) -> ClosestPoint {
        let seg_count = (self.advance_len / self.seg_t).ceil() as usize;
        let mut samples: Vec<ClosestPoint> = Vec::with_capacity(seg_count + 2);
        let mut sample_points: Vec<DVec3> = Vec::with_capacity(seg_count + 2);
        let mut best = ClosestPoint::default();

        for i in 0..seg_count {
            let t = (i as f64 * self.seg_t + self.seg_t * 0.5).min(self.advance_len);
            let q = self.eval(t);
            let sample = ClosestPoint { t, distance: (q - p).length() };
            if sample.distance < best.distance {
                best = sample;
            }
            samples.push(sample);
            sample_points.push(q);
        }
        // The two endpoints, where queries concentrate.
        for t in [0.0, self.advance_len] {
            let q = self.eval(t);
            let sample = ClosestPoint { t, distance: (q - p).length() };
            if sample.distance < best.distance {
                best = sample;
            }
            samples.push(sample);
            sample_points.push(q);
        }

        // Newton refinement on every sample that could beat the incumbent,
        // pruned by the chord-to-arc deviation bound.
        let common_delta = (self.eval(0.0) - self.eval(self.seg_t)).length_squared() * self.arc_delta_max_factor;
        let last_delta = (self.eval(self.advance_len) - self.eval(self.seg_t * (seg_count - 1) as f64))
            .length_squared()
            * self.arc_delta_max_factor;
        for (i, sample) in samples.iter().enumerate() {
            let delta_max = if i >= seg_count {
                // Endpoint samples are exact.
                0.0
            } else if i == seg_count - 1 {
                last_delta
            } else {
                common_delta
            };
            if sample.distance - delta_max >= best.distance {
                continue;
            }
            let mut t = sample.t;
            let mut q = sample_points[i];
            let mut d1 = self.der1(t);
            let mut d2 = self.der2(t);
            let mut dl = (q - p).dot(d1);
            let mut steps = 0;
            while dl.abs() > EPS_NEWTON && steps < MAX_NEWTON_STEPS {
                let t_next = t - dl / (d1.dot(d1) + (q - p).dot(d2));
                if t_next < 0.0 || t_next > self.advance_len {
                    break;
                }
                t = t_next;
                q = self.eval(t);
                d1 = self.der1(t);
                d2 = self.der2(t);
                dl = (q - p).dot(d1);
                steps += 1;
            }
            let distance = (q - p).length();
            if distance < best.distance {
                best = ClosestPoint { t, distance };
            }
        }
        best
    }
}

/// Axis variants an extrusion can sweep along. A single arc is a one-segment
/// poly-line.
#[derive(Clone, Debug)]
pub enum AxisLine {
    PolyLine(PolyLine),
    Helix(HelixLine),
}

impl AxisLine {
    pub fn eval(&self, t: f64) -> DVec3 {
        match self {
            AxisLine::PolyLine(line) => line.eval(t),
            AxisLine::Helix(line) => line.eval(t),
        }
    }

    pub fn tangent(&self, t: f64) -> DVec3 {
        match self {
            AxisLine::PolyLine(line) => line.tangent(t),
            AxisLine::Helix(line) => line.tangent(t),
        }
    }

    pub fn normal(&self, t: f64, tangent: Option<DVec3>) -> DVec3 {
        match self {
            AxisLine::PolyLine(line) => line.normal(t, tangent),
            AxisLine::Helix(line) => line.normal(t, tangent),
        }
    }

    pub fn closest(&self, p: DVec3) -> ClosestPoint {
        match self {
            AxisLine::PolyLine(line) => line.closest(p),
            AxisLine::Helix(line) => line.closest(p),
        }
    }

    pub fn is_end_param(&self, t: f64) -> bool {
        match self {
            AxisLine::PolyLine(line) => line.is_end_param(t),
            AxisLine::Helix(line) => line.is_end_param(t),
        }
    }

    pub fn end_t(&self) -> f64 {
        match self {
            AxisLine::PolyLine(line) => line.end_t(),
            AxisLine::Helix(line) => line.end_t(),
        }
    }

    pub fn aabb(&self) -> Aabb {
        match self {
            AxisLine::PolyLine(line) => line.aabb(),
            AxisLine::Helix(line) => line.aabb(),
        }
    }
}

/// A solid formed by sweeping closed profile loops along an axis line.
#[derive(Clone, Debug)]
pub struct ExtrudedSolid {
    profiles: Vec<PolyLine>,
    axis: AxisLine,
    local_profiles: Vec<Vec<DVec2>>,
    local_arcs: Vec<Vec<CircularArc2>>,
    binormal: DVec3,
    axis_start: DVec3,
    axis_start_tangent: DVec3,
    axis_end: DVec3,
    axis_end_tangent: DVec3,
    aabb: Aabb,
}

fn to_local_point(p: DVec3, u: DVec3, v: DVec3, origin: DVec3) -> DVec2 {
    let op = p - origin;
    DVec2::new(op.dot(u), op.dot(v))
}

fn to_local_dir(dir: DVec3, u: DVec3, v: DVec3) -> DVec2 {
    DVec2::new(dir.dot(u), dir.dot(v)).normalize()
}

impl ExtrudedSolid {
    /// Build from closed profile loops (first loop is the outer boundary,
    /// the rest are holes) and the sweep axis.
    pub fn new(profiles: Vec<PolyLine>, axis: AxisLine) -> Self {
        assert!(!profiles.is_empty(), "extrusion needs at least one profile");
        for profile in &profiles {
            assert!(profile.is_closed(), "extrusion profiles must be closed loops");
        }

        let axis_start_tangent = axis.tangent(0.0);
        let normal = axis.normal(0.0, None);
        let binormal = axis_start_tangent.cross(normal);
        let axis_start = axis.eval(0.0);
        let axis_end = axis.eval(axis.end_t());
        let axis_end_tangent = axis.tangent(axis.end_t());

        let local_profiles: Vec<Vec<DVec2>> = profiles
            .iter()
            .map(|profile| {
                profile
                    .points()
                    .iter()
                    .map(|&p| to_local_point(p, normal, binormal, axis_start))
                    .collect()
            })
            .collect();
        let local_arcs: Vec<Vec<CircularArc2>> = profiles
            .iter()
            .map(|profile| {
                profile
                    .arcs()
                    .iter()
                    .map(|arc| CircularArc2 {
                        center: to_local_point(arc.center, normal, binormal, axis_start),
                        in_circle_dir: to_local_dir(arc.in_circle_dir, normal, binormal),
                        radius: arc.radius,
                        theta: arc.theta,
                        h: arc.h,
                    })
                    .collect()
            })
            .collect();

        let profile_box = profiles[0].aabb();
        let mut aabb = axis.aabb();
        aabb.translate(profile_box.center() - axis_start);
        aabb.expand_by(profile_box.half_size());
        aabb.expand(EPS_END_PARAM);

        Self {
            profiles,
            axis,
            local_profiles,
            local_arcs,
            binormal,
            axis_start,
            axis_start_tangent,
            axis_end,
            axis_end_tangent,
            aabb,
        }
    }

    #[inline] pub fn aabb(&self) -> Aabb { self.aabb }

    /// Local frame (tangent, normal, binormal) at axis parameter `t` for a
    /// query point `p` whose closest axis point is `q`.
    fn frame(&self, p: DVec3, q: DVec3, t: f64) -> [DVec3; 3] {
        match &self.axis {
            AxisLine::PolyLine(line) => {
                if !line.is_end_param(t) && (t - t.round()).abs() < EPS_END_PARAM {
                    // Segment joint: reconstruct the normal from the query
                    // point's side so the frame stays continuous.
                    let projected = p - self.binormal.dot(p - q) * self.binormal;
                    let mut normal = (q - projected).normalize();
                    if normal.dot(line.normal(t, None)) < 0.0 {
                        normal = -normal;
                    }
                    return [normal.cross(self.binormal), normal, self.binormal];
                }
                let tangent = line.tangent(t);
                [tangent, line.normal(t, Some(tangent)), self.binormal]
            }
            AxisLine::Helix(line) => {
                let tangent = line.tangent(t);
                let normal = line.normal(t, Some(tangent));
                [tangent, normal, tangent.cross(normal)]
            }
        }
    }

    /// Signed distance of `p`: negative inside the solid.
    pub fn signed_distance(&self, p: DVec3) -> f64 {
        let on_axis = self.axis.closest(p);
        let t = on_axis.t;
        let q = self.axis.eval(t);
        let qp = p - q;
        let [tangent, normal, binormal] = self.frame(p, q, t);

        if self.axis.is_end_param(t) && qp.dot(tangent).abs() > EPS {
            // Beyond an end cap: project onto the cap plane and combine the
            // in-plane and axial distances. Always outside.
            let axial = -qp.dot(tangent);
            let projected = p + tangent * axial;
            let local = to_local_point(projected, normal, binormal, q);
            let mut in_plane = 0.0;
            if self.classify_profile(local) == BoundaryRelation::Outside {
                in_plane = self.closest_profile(local).distance;
            }
            return (in_plane * in_plane + axial * axial).sqrt();
        }

        let local = to_local_point(p, normal, binormal, q);
        let relation = self.classify_profile(local);
        if relation == BoundaryRelation::OnBoundary {
            return 0.0;
        }
        let to_profile = self.closest_profile(local);
        if relation == BoundaryRelation::Inside {
            // An end cap may be closer than the lateral boundary.
            let to_start = (self.axis_start - p).dot(self.axis_start_tangent);
            if to_start.abs() < to_profile.distance {
                return -to_start.abs();
            }
            let to_end = (self.axis_end - p).dot(self.axis_end_tangent);
            if to_end.abs() < to_profile.distance {
                return -to_end.abs();
            }
        }
        to_profile.distance * relation.sign()
    }

    /// Closest point over all profile loops in the local plane.
    fn closest_profile(&self, p: DVec2) -> ClosestPoint {
        let mut best = ClosestPoint::default();
        for (loop_points, loop_arcs) in self.local_profiles.iter().zip(&self.local_arcs) {
            let candidate = loop_distance_2d(p, loop_points, loop_arcs);
            if candidate.distance < best.distance {
                best = candidate;
            }
        }
        best
    }

    /// Classification against the loops: outer boundary minus holes.
    fn classify_profile(&self, p: DVec2) -> BoundaryRelation {
        for (i, (loop_points, loop_arcs)) in self.local_profiles.iter().zip(&self.local_arcs).enumerate() {
            let relation = loop_classify_2d(p, loop_points, loop_arcs);
            if relation == BoundaryRelation::OnBoundary {
                return BoundaryRelation::OnBoundary;
            }
            if (relation == BoundaryRelation::Outside && i == 0)
                || (relation == BoundaryRelation::Inside && i != 0)
            {
                return BoundaryRelation::Outside;
            }
        }
        BoundaryRelation::Inside
    }
}

/// Distance from `p` to a closed loop of segments/arcs in the plane.
fn loop_distance_2d(p: DVec2, points: &[DVec2], arcs: &[CircularArc2]) -> ClosestPoint {
    let mut best = ClosestPoint::default();
    for (i, arc) in arcs.iter().enumerate() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        let candidate = arc_distance_2d(p, a, b, arc);
        if candidate.distance < best.distance {
            best = ClosestPoint { t: i as f64 + candidate.t, distance: candidate.distance };
        }
    }
    best
}

fn arc_distance_2d(p: DVec2, a: DVec2, b: DVec2, arc: &CircularArc2) -> ClosestPoint {
    if nearly_zero(arc.theta) {
        return segment_closest_2(p, a, b);
    }
    let op = p - arc.center;
    let q = arc.center + arc.radius * op.normalize();
    if (q - a).dot(arc.in_circle_dir) > 0.0 {
        let oq = q - arc.center;
        let oa = a - arc.center;
        let r2 = arc.radius * arc.radius;
        let cos_theta = oa.dot(oq) / r2;
        let sin_theta = oa.perp_dot(oq) / r2;
        return ClosestPoint { t: sin_theta.atan2(cos_theta) / arc.theta, distance: (p - q).length() };
    }
    let to_a = (a - p).length();
    let to_b = (b - p).length();
    if to_a < to_b {
        ClosestPoint { t: 0.0, distance: to_a }
    } else {
        ClosestPoint { t: 1.0, distance: to_b }
    }
}

fn point_on_segment_2d(p: DVec2, a: DVec2, b: DVec2) -> bool {
    let cross = (p.y - a.y) * (b.x - a.x) - (p.x - a.x) * (b.y - a.y);
    if !nearly_zero(cross) {
        return false;
    }
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

/// Classify `p` against one closed loop: segment chords decide a polygon
/// parity test, bulge fans flip it where the point falls inside an arc's
/// circular segment.
fn loop_classify_2d(p: DVec2, points: &[DVec2], arcs: &[CircularArc2]) -> BoundaryRelation {
    let seg_count = arcs.len();
    let mut in_fan = false;
    let mut on_chord_of_arc = None;
    for (i, arc) in arcs.iter().enumerate() {
        let a = points[i];
        let b = points[(i + 1) % seg_count];
        if arc.theta <= EPS {
            if point_on_segment_2d(p, a, b) {
                return BoundaryRelation::OnBoundary;
            }
            continue;
        }
        if point_on_segment_2d(p, a, b) {
            on_chord_of_arc = Some(i);
            break;
        }
        let to_center = (p - arc.center).length();
        if (p - a).dot(arc.in_circle_dir) > 0.0 {
            if to_center == arc.radius {
                return BoundaryRelation::OnBoundary;
            }
            if to_center < arc.radius {
                in_fan = true;
                break;
            }
        } else if to_center <= arc.radius {
            in_fan = true;
            break;
        }
    }

    // Parity of ray crossings against the chord polygon, majority over three
    // ray directions to dodge degenerate hits.
    let point_in_polygon = |p: DVec2| -> bool {
        let mut majority_in = 0;
        let mut majority_out = 0;
        for ray_index in 0..3 {
            let angle = std::f64::consts::TAU * ray_index as f64 / 3.0;
            let ray = DVec2::new(angle.cos(), angle.sin());
            let mut crossings = 0;
            for i in 0..seg_count {
                let a = points[i];
                let b = points[(i + 1) % seg_count];
                let d1 = b - a;
                let determinant = d1.x * ray.y - d1.y * ray.x;
                if nearly_zero(determinant) {
                    continue;
                }
                let t1 = ((p.x - a.x) * ray.y - (p.y - a.y) * ray.x) / determinant;
                let t2 = ((p.x - a.x) * d1.y - (p.y - a.y) * d1.x) / determinant;
                if (0.0..=1.0).contains(&t1) && t2 >= 0.0 {
                    crossings += 1;
                }
            }
            if crossings % 2 == 0 {
                majority_out += 1;
            } else {
                majority_in += 1;
            }
        }
        majority_in > majority_out
    };

    if let Some(i) = on_chord_of_arc {
        // On the chord of a bulged segment: sample a nudge toward the arc.
        let sample = p + arcs[i].in_circle_dir * EPS;
        return if point_in_polygon(sample) { BoundaryRelation::Outside } else { BoundaryRelation::Inside };
    }
    if point_in_polygon(p) ^ in_fan {
        BoundaryRelation::Inside
    } else {
        BoundaryRelation::Outside
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_profile(half: f64) -> PolyLine {
        PolyLine::new(
            vec![
                DVec3::new(-half, 0.0, -half),
                DVec3::new(half, 0.0, -half),
                DVec3::new(half, 0.0, half),
                DVec3::new(-half, 0.0, half),
            ],
            vec![0.0; 4],
            DVec3::Y,
            true,
        )
    }

    #[test]
    fn polyline_eval_walks_segments() {
        let line = PolyLine::new(
            vec![DVec3::ZERO, DVec3::X, DVec3::new(1.0, 1.0, 0.0)],
            vec![0.0, 0.0],
            DVec3::Z,
            false,
        );
        assert!(line.eval(0.5).abs_diff_eq(DVec3::new(0.5, 0.0, 0.0), 1e-12));
        assert!(line.eval(1.5).abs_diff_eq(DVec3::new(1.0, 0.5, 0.0), 1e-12));
        assert!(line.eval(2.0).abs_diff_eq(DVec3::new(1.0, 1.0, 0.0), 1e-12));
    }

    #[test]
    fn semicircle_bulge_geometry() {
        // bulge 1 = half circle: from (0,0,0) to (2,0,0) bulging toward -y
        // (ref normal +z makes in_circle_dir = ab x z scaled by bulge sign).
        let line = PolyLine::single_arc(DVec3::ZERO, DVec3::new(2.0, 0.0, 0.0), 1.0, DVec3::Z);
        let arc = line.arcs()[0];
        assert!((arc.radius - 1.0).abs() < 1e-12);
        assert!((arc.theta - std::f64::consts::PI).abs() < 1e-12);
        assert!(arc.center.abs_diff_eq(DVec3::new(1.0, 0.0, 0.0), 1e-12));
        // Midpoint of the arc is at distance radius from the center.
        let mid = line.eval(0.5);
        assert!(((mid - arc.center).length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn polyline_closest_on_straight_segment() {
        let line = PolyLine::new(vec![DVec3::ZERO, DVec3::new(2.0, 0.0, 0.0)], vec![0.0], DVec3::Z, false);
        let hit = line.closest(DVec3::new(1.0, 3.0, 0.0));
        assert!((hit.distance - 3.0).abs() < 1e-12);
        assert!((hit.t - 0.5).abs() < 1e-12);
    }

    #[test]
    fn helix_eval_and_derivatives() {
        let helix = HelixLine::new(DVec3::ZERO, DVec3::new(0.0, 0.0, 4.0), 1.0, 2.0, DVec3::X);
        // At t=0: on the x axis at radius 1.
        assert!(helix.eval(0.0).abs_diff_eq(DVec3::new(1.0, 0.0, 0.0), 1e-12));
        // After one full pitch the point returns over the start.
        let after_round = helix.eval(2.0);
        assert!((after_round.x - 1.0).abs() < 1e-9 && after_round.y.abs() < 1e-9);
        assert!((after_round.z - 2.0).abs() < 1e-12);
        // der1 is finite-difference consistent.
        let t = 0.7;
        let h = 1e-6;
        let fd = (helix.eval(t + h) - helix.eval(t - h)) / (2.0 * h);
        assert!(helix.der1(t).abs_diff_eq(fd, 1e-5));
    }

    #[test]
    fn helix_closest_converges_on_axis_points() {
        let helix = HelixLine::new(DVec3::ZERO, DVec3::new(0.0, 0.0, 4.0), 1.0, 2.0, DVec3::X);
        // A point on the helix itself.
        let on_curve = helix.eval(1.3);
        let hit = helix.closest(on_curve);
        assert!(hit.distance < 1e-6);
        assert!((hit.t - 1.3).abs() < 1e-4);
    }

    #[test]
    fn straight_extrusion_signs() {
        // Square 1x1 profile swept 2 units along +y.
        let axis = AxisLine::PolyLine(PolyLine::new(
            vec![DVec3::ZERO, DVec3::new(0.0, 2.0, 0.0)],
            vec![0.0],
            DVec3::Z,
            false,
        ));
        let solid = ExtrudedSolid::new(vec![square_profile(0.5)], axis);

        assert!(solid.signed_distance(DVec3::new(0.0, 1.0, 0.0)) < 0.0);
        assert!(solid.signed_distance(DVec3::new(0.9, 1.0, 0.0)) > 0.0);
        assert!(solid.signed_distance(DVec3::new(0.0, 2.8, 0.0)) > 0.0);
        assert!(solid.signed_distance(DVec3::new(0.0, -0.7, 0.0)) > 0.0);
        // Inside distance near the lateral wall reflects the wall gap.
        let d = solid.signed_distance(DVec3::new(0.4, 1.0, 0.0));
        assert!(d < 0.0 && (d + 0.1).abs() < 1e-6);
    }

    #[test]
    fn extrusion_aabb_covers_the_solid() {
        let axis = AxisLine::PolyLine(PolyLine::new(
            vec![DVec3::ZERO, DVec3::new(0.0, 2.0, 0.0)],
            vec![0.0],
            DVec3::Z,
            false,
        ));
        let solid = ExtrudedSolid::new(vec![square_profile(0.5)], axis);
        let aabb = solid.aabb();
        assert!(aabb.contains(DVec3::new(0.4, 1.9, 0.4)));
        assert!(aabb.contains(DVec3::new(-0.4, 0.1, -0.4)));
    }
}
