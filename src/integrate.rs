//! Per-face integrals of the surface network polygons.
//!
//! The surface filter consumes, per iso-face, a scalar area and a "partial
//! volume": the divergence-theorem moment of the polygon along its stored
//! orientation. Summed with the normal pointing out of a closed region, the
//! moments telescope to the region's volume.

use glam::DVec3;

/// The two scalars the surface filter needs for one polygon.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FaceIntegrals {
    pub area: f64,
    /// Flux of the position field through the polygon, along the stored
    /// vertex order's normal.
    pub moment: f64,
}

/// Integrate one planar polygon given by its vertex loop.
pub fn face_integrals(polygon: &[DVec3]) -> FaceIntegrals {
    if polygon.len() < 3 {
        return FaceIntegrals::default();
    }
    let mut vector_area = DVec3::ZERO;
    for i in 0..polygon.len() {
        vector_area += polygon[i].cross(polygon[(i + 1) % polygon.len()]);
    }
    vector_area *= 0.5;
    FaceIntegrals {
        area: vector_area.length(),
        // For a planar polygon, (1/3) * area_vector . p for any p on its
        // plane: the cone volume subtended at the origin.
        moment: vector_area.dot(polygon[0]) / 3.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_square_area_and_moment() {
        // Unit square at z = 2, counter-clockwise seen from +z.
        let square = [
            DVec3::new(0.0, 0.0, 2.0),
            DVec3::new(1.0, 0.0, 2.0),
            DVec3::new(1.0, 1.0, 2.0),
            DVec3::new(0.0, 1.0, 2.0),
        ];
        let out = face_integrals(&square);
        assert!((out.area - 1.0).abs() < 1e-12);
        // Normal +z, flux = z * area / 3.
        assert!((out.moment - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn reversing_the_loop_negates_the_moment() {
        let triangle = [
            DVec3::new(1.0, 0.0, 1.0),
            DVec3::new(0.0, 1.0, 1.0),
            DVec3::new(-1.0, 0.0, 1.0),
        ];
        let reversed: Vec<DVec3> = triangle.iter().rev().copied().collect();
        let forward = face_integrals(&triangle);
        let backward = face_integrals(&reversed);
        assert!((forward.area - backward.area).abs() < 1e-12);
        assert!((forward.moment + backward.moment).abs() < 1e-12);
    }

    #[test]
    fn closed_cube_moments_sum_to_volume() {
        // Cube [0,1]^3 as six outward-oriented quads.
        let corner = |mask: u8| {
            DVec3::new(f64::from(mask & 1), f64::from((mask >> 1) & 1), f64::from((mask >> 2) & 1))
        };
        let quads: [[u8; 4]; 6] = [
            [0b000, 0b010, 0b110, 0b100], // z = 0, normal -z
            [0b001, 0b101, 0b111, 0b011], // z = 1, normal +z
            [0b000, 0b100, 0b101, 0b001], // y = 0, normal -y
            [0b010, 0b011, 0b111, 0b110], // y = 1, normal +y
            [0b000, 0b001, 0b011, 0b010], // x = 0, normal -x
            [0b100, 0b110, 0b111, 0b101], // x = 1, normal +x
        ];
        let mut area = 0.0;
        let mut volume = 0.0;
        for quad in quads {
            let polygon: Vec<DVec3> = quad.iter().map(|&m| corner(m)).collect();
            let out = face_integrals(&polygon);
            area += out.area;
            volume += out.moment;
        }
        assert!((area - 6.0).abs() < 1e-12);
        assert!((volume - 1.0).abs() < 1e-12);
    }
}
