//! Robust sign predicates over barycentric plane coefficients.
//!
//! Every predicate answers a discrete [`Orientation`] and never "uncertain":
//! a semi-static floating-point filter handles the common case, interval
//! arithmetic catches most of the rest, and an exact dyadic-integer
//! determinant decides the remainder. `Invalid` is reserved for ill-posed
//! inputs (a degenerate plane), which callers must surface as errors.

mod exact;
mod interval;

use interval::Interval;

/// Discrete result of a sign predicate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
    Negative,
    Zero,
    Positive,
    Invalid,
}

impl Orientation {
    /// Numeric sign; must not be called on `Invalid`.
    #[inline]
    pub fn sign(self) -> i8 {
        match self {
            Orientation::Negative => -1,
            Orientation::Zero => 0,
            Orientation::Positive => 1,
            Orientation::Invalid => panic!("sign of invalid orientation"),
        }
    }

    #[inline]
    fn flipped(self) -> Self {
        match self {
            Orientation::Negative => Orientation::Positive,
            Orientation::Positive => Orientation::Negative,
            other => other,
        }
    }

    #[inline]
    fn from_sign(s: i8) -> Self {
        match s.cmp(&0) {
            std::cmp::Ordering::Less => Orientation::Negative,
            std::cmp::Ordering::Equal => Orientation::Zero,
            std::cmp::Ordering::Greater => Orientation::Positive,
        }
    }
}

/// Orientation of the zero crossing of function 0 relative to function 1,
/// both sampled at the two endpoints of an edge.
///
/// `Invalid` iff function 0 is constant over the edge (no crossing).
pub fn orient1d(f0: [f64; 2], f1: [f64; 2]) -> Orientation {
    if f0[0] == f0[1] {
        return Orientation::Invalid;
    }
    let m = [[f0[0], f0[1]], [f1[0], f1[1]]];
    let numerator = det_sign_2(&m);
    if f0[1] < f0[0] { numerator } else { numerator.flipped() }
}

/// Orientation of the intersection of the zero sets of functions 0 and 1
/// relative to function 2, all sampled at the corners of a triangle.
pub fn orient2d(f0: [f64; 3], f1: [f64; 3], f2: [f64; 3]) -> Orientation {
    let numerator = det_sign_3(&[f0, f1, f2]);
    let denominator = det_sign_3(&[f0, f1, [1.0, 1.0, 1.0]]);
    combine(numerator, denominator)
}

/// Orientation of the intersection of the zero sets of functions 0..2
/// relative to function 3, all sampled at the corners of a tetrahedron.
pub fn orient3d(f0: [f64; 4], f1: [f64; 4], f2: [f64; 4], f3: [f64; 4]) -> Orientation {
    let numerator = det_sign_4(&[f0, f1, f2, f3]);
    let denominator = det_sign_4(&[f0, f1, f2, [1.0; 4]]);
    combine(numerator, denominator)
}

#[inline]
fn combine(numerator: Orientation, denominator: Orientation) -> Orientation {
    match denominator {
        Orientation::Zero => Orientation::Invalid,
        Orientation::Positive => numerator,
        Orientation::Negative => numerator.flipped(),
        Orientation::Invalid => unreachable!("determinant sign is never invalid"),
    }
}

/// Filter threshold: a conservative bound on the rounding error of an n-by-n
/// cofactor expansion in terms of the magnitude sum of its terms.
const FILTER_SLACK: f64 = 64.0 * f64::EPSILON;

macro_rules! det_sign_impl {
    ($name:ident, $n:literal, $approx:ident, $ival:ident) => {
        fn $name(m: &[[f64; $n]; $n]) -> Orientation {
            // Stage 1: floating point with a semi-static error filter.
            let (det, magnitude) = $approx(m);
            if det.abs() > magnitude * FILTER_SLACK {
                return Orientation::from_sign(if det > 0.0 { 1 } else { -1 });
            }
            if magnitude == 0.0 {
                // Every term is exactly zero.
                return Orientation::Zero;
            }
            // Stage 2: interval arithmetic.
            let iv = $ival(m);
            if let Some(sign) = iv.sign() {
                return Orientation::from_sign(sign);
            }
            // Stage 3: exact arithmetic over dyadic integers.
            Orientation::from_sign(exact::$name(m))
        }
    };
}

det_sign_impl!(det_sign_2, 2, det2_approx, det2_interval);
det_sign_impl!(det_sign_3, 3, det3_approx, det3_interval);
det_sign_impl!(det_sign_4, 4, det4_approx, det4_interval);

// Floating-point cofactor expansions, returning (value, magnitude sum).

fn det2_approx(m: &[[f64; 2]; 2]) -> (f64, f64) {
    let a = m[0][0] * m[1][1];
    let b = m[0][1] * m[1][0];
    (a - b, a.abs() + b.abs())
}

fn det3_approx(m: &[[f64; 3]; 3]) -> (f64, f64) {
    let mut det = 0.0;
    let mut mag = 0.0;
    for col in 0..3 {
        let cols = (0..3).filter(|&c| c != col).collect::<Vec<_>>();
        let (sub, sub_mag) = det2_approx(&minor(m, 0, &cols));
        let sign = if col % 2 == 0 { 1.0 } else { -1.0 };
        det += sign * m[0][col] * sub;
        mag += m[0][col].abs() * sub_mag;
    }
    (det, mag)
}

fn det4_approx(m: &[[f64; 4]; 4]) -> (f64, f64) {
    let mut det = 0.0;
    let mut mag = 0.0;
    for col in 0..4 {
        let cols = (0..4).filter(|&c| c != col).collect::<Vec<_>>();
        let (sub, sub_mag) = det3_approx(&minor(m, 0, &cols));
        let sign = if col % 2 == 0 { 1.0 } else { -1.0 };
        det += sign * m[0][col] * sub;
        mag += m[0][col].abs() * sub_mag;
    }
    (det, mag)
}

/// Minor of `m` dropping row `row` and keeping columns `cols`.
fn minor<const N: usize, const M: usize>(m: &[[f64; N]; N], row: usize, cols: &[usize]) -> [[f64; M]; M] {
    debug_assert!(cols.len() == M && M + 1 == N);
    let mut out = [[0.0; M]; M];
    let mut r_out = 0;
    for r in 0..N {
        if r == row {
            continue;
        }
        for (c_out, &c) in cols.iter().enumerate() {
            out[r_out][c_out] = m[r][c];
        }
        r_out += 1;
    }
    out
}

// Interval cofactor expansions.

fn det2_interval(m: &[[f64; 2]; 2]) -> Interval {
    Interval::from(m[0][0]) * Interval::from(m[1][1]) - Interval::from(m[0][1]) * Interval::from(m[1][0])
}

fn det3_interval(m: &[[f64; 3]; 3]) -> Interval {
    let mut det = Interval::zero();
    for col in 0..3 {
        let cols = (0..3).filter(|&c| c != col).collect::<Vec<_>>();
        let sub = det2_interval(&minor(m, 0, &cols));
        let term = Interval::from(m[0][col]) * sub;
        det = if col % 2 == 0 { det + term } else { det - term };
    }
    det
}

fn det4_interval(m: &[[f64; 4]; 4]) -> Interval {
    let mut det = Interval::zero();
    for col in 0..4 {
        let cols = (0..4).filter(|&c| c != col).collect::<Vec<_>>();
        let sub = det3_interval(&minor(m, 0, &cols));
        let term = Interval::from(m[0][col]) * sub;
        det = if col % 2 == 0 { det + term } else { det - term };
    }
    det
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orient1d_basic() {
        // f0 crosses zero descending at t=0.5; f1 is positive there.
        assert_eq!(orient1d([1.0, -1.0], [2.0, 1.0]), Orientation::Positive);
        // f1 negative at the crossing.
        assert_eq!(orient1d([1.0, -1.0], [-1.0, -2.0]), Orientation::Negative);
        // f1 zero exactly at the crossing.
        assert_eq!(orient1d([1.0, -1.0], [1.0, -1.0]), Orientation::Zero);
        // Constant f0 is ill-posed.
        assert_eq!(orient1d([2.0, 2.0], [0.0, 1.0]), Orientation::Invalid);
    }

    #[test]
    fn orient1d_direction_invariance() {
        // Ascending f0 must give the same answer as the descending mirror.
        assert_eq!(orient1d([-1.0, 1.0], [2.0, 1.0]), Orientation::Positive);
        assert_eq!(orient1d([-1.0, 1.0], [-2.0, -1.0]), Orientation::Negative);
    }

    #[test]
    fn orient3d_tet_corner_planes() {
        // Barycentric coordinate planes of a tet: planes 1,2,3 meet at
        // corner 0, where plane (1,1,1,1) is positive.
        let p1 = [0.0, 1.0, 0.0, 0.0];
        let p2 = [0.0, 0.0, 1.0, 0.0];
        let p3 = [0.0, 0.0, 0.0, 1.0];
        assert_eq!(orient3d(p1, p2, p3, [1.0; 4]), Orientation::Positive);
        assert_eq!(orient3d(p1, p2, p3, [-1.0, 1.0, 1.0, 1.0]), Orientation::Negative);
        assert_eq!(orient3d(p1, p2, p3, [0.0, 1.0, 1.0, 1.0]), Orientation::Zero);
    }

    #[test]
    fn orient3d_degenerate_plane_is_invalid() {
        // Three planes that do not meet in a single point (two parallel).
        let p1 = [1.0, -1.0, 0.0, 0.0];
        let p2 = [2.0, -2.0, 0.0, 0.0];
        let p3 = [0.0, 0.0, 1.0, -1.0];
        assert_eq!(orient3d(p1, p2, p3, [1.0; 4]), Orientation::Invalid);
    }

    #[test]
    fn zero_detection_survives_scaling() {
        // A crossing exactly on the other function's zero set, at hostile scales.
        for scale in [1e-200, 1e-30, 1.0, 1e30, 1e200] {
            let f0 = [3.0 * scale, -5.0 * scale];
            let f1 = [3.0 * scale, -5.0 * scale];
            assert_eq!(orient1d(f0, f1), Orientation::Zero, "scale {scale}");
        }
    }

    #[test]
    fn filter_falls_through_to_exact() {
        // Nearly-degenerate values the float filter cannot certify: the
        // second row is a tiny perturbation of the first.
        let eps = f64::EPSILON;
        let f0 = [1.0, -1.0, 1.0, -1.0];
        let f1 = [1.0 + eps, -1.0, 1.0, -1.0];
        let f2 = [0.0, 1.0, 0.0, 0.0];
        let f3 = [0.0, 0.0, 1.0, 0.0];
        let out = orient3d(f0, f1, f2, f3);
        assert_ne!(out, Orientation::Invalid);
    }
}
