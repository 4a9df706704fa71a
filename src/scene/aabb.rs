use glam::DVec3;

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Default for Aabb {
    /// The empty box: extending it with any point yields that point.
    fn default() -> Self {
        Self { min: DVec3::splat(f64::INFINITY), max: DVec3::splat(f64::NEG_INFINITY) }
    }
}

impl Aabb {
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    /// Box covering all of space; used for unbounded primitives.
    pub fn everything() -> Self {
        Self { min: DVec3::splat(f64::NEG_INFINITY), max: DVec3::splat(f64::INFINITY) }
    }

    #[inline]
    pub fn contains(&self, point: DVec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Grow to cover `point`.
    pub fn extend_point(&mut self, point: DVec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Grow to cover `other`.
    pub fn extend(&mut self, other: &Aabb) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Pad by `margin` on every side.
    pub fn expand(&mut self, margin: f64) {
        self.min -= DVec3::splat(margin);
        self.max += DVec3::splat(margin);
    }

    /// Pad componentwise.
    pub fn expand_by(&mut self, half: DVec3) {
        self.min -= half;
        self.max += half;
    }

    /// Translate by `offset`.
    pub fn translate(&mut self, offset: DVec3) {
        self.min += offset;
        self.max += offset;
    }

    #[inline]
    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn half_size(&self) -> DVec3 {
        (self.max - self.min) * 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_is_inclusive() {
        let aabb = Aabb::new(DVec3::splat(-1.0), DVec3::splat(1.0));
        assert!(aabb.contains(DVec3::ZERO));
        assert!(aabb.contains(DVec3::splat(1.0)));
        assert!(!aabb.contains(DVec3::new(1.1, 0.0, 0.0)));
    }

    #[test]
    fn default_is_empty_identity() {
        let mut aabb = Aabb::default();
        aabb.extend_point(DVec3::new(2.0, -1.0, 0.5));
        assert_eq!(aabb.min, DVec3::new(2.0, -1.0, 0.5));
        assert_eq!(aabb.max, DVec3::new(2.0, -1.0, 0.5));
    }

    #[test]
    fn expand_and_translate() {
        let mut aabb = Aabb::new(DVec3::ZERO, DVec3::ONE);
        aabb.expand(0.5);
        assert_eq!(aabb.min, DVec3::splat(-0.5));
        aabb.translate(DVec3::X);
        assert_eq!(aabb.max.x, 2.5);
        assert_eq!(aabb.center(), DVec3::new(1.0, 0.5, 0.5));
    }
}
