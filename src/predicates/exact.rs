//! Exact determinant signs over arbitrary-precision dyadic integers.
//!
//! Every finite `f64` is a dyadic rational `mantissa * 2^exponent`. Scaling a
//! whole matrix to its smallest exponent turns the determinant sign into an
//! integer computation, which `BigInt` evaluates without error.

use num_bigint::BigInt;
use num_traits::{Signed, Zero};

/// Decompose a finite f64 into (mantissa, base-2 exponent).
fn dyadic(x: f64) -> (BigInt, i64) {
    assert!(x.is_finite(), "predicate input must be finite");
    if x == 0.0 {
        return (BigInt::zero(), 0);
    }
    let bits = x.to_bits();
    let raw_exponent = ((bits >> 52) & 0x7ff) as i64;
    let raw_mantissa = bits & 0xf_ffff_ffff_ffff;
    let (mantissa, exponent) = if raw_exponent == 0 {
        // Subnormal.
        (raw_mantissa, -1074)
    } else {
        (raw_mantissa | (1 << 52), raw_exponent - 1075)
    };
    let mut m = BigInt::from(mantissa);
    if x < 0.0 {
        m = -m;
    }
    (m, exponent)
}

/// Matrix of dyadic mantissas scaled to a common exponent.
fn scaled<const N: usize>(m: &[[f64; N]; N]) -> [[BigInt; N]; N] {
    let decomposed = m.map(|row| row.map(dyadic));
    let min_exponent = decomposed
        .iter()
        .flatten()
        .filter(|(mant, _)| !mant.is_zero())
        .map(|&(_, e)| e)
        .min()
        .unwrap_or(0);
    decomposed.map(|row| {
        row.map(|(mant, e)| if mant.is_zero() { mant } else { mant << (e - min_exponent) as u64 })
    })
}

fn det2(m: &[[BigInt; 2]; 2]) -> BigInt {
    &m[0][0] * &m[1][1] - &m[0][1] * &m[1][0]
}

fn det3(m: &[[BigInt; 3]; 3]) -> BigInt {
    let mut det = BigInt::zero();
    for col in 0..3 {
        let cols = (0..3).filter(|&c| c != col).collect::<Vec<_>>();
        let sub = det2(&minor(m, &cols));
        let term = &m[0][col] * sub;
        if col % 2 == 0 {
            det += term;
        } else {
            det -= term;
        }
    }
    det
}

fn det4(m: &[[BigInt; 4]; 4]) -> BigInt {
    let mut det = BigInt::zero();
    for col in 0..4 {
        let cols = (0..4).filter(|&c| c != col).collect::<Vec<_>>();
        let sub = det3(&minor(m, &cols));
        let term = &m[0][col] * sub;
        if col % 2 == 0 {
            det += term;
        } else {
            det -= term;
        }
    }
    det
}

fn minor<const N: usize, const M: usize>(m: &[[BigInt; N]; N], cols: &[usize]) -> [[BigInt; M]; M] {
    debug_assert!(cols.len() == M && M + 1 == N);
    std::array::from_fn(|r| std::array::from_fn(|c| m[r + 1][cols[c]].clone()))
}

fn sign_of(det: BigInt) -> i8 {
    if det.is_positive() {
        1
    } else if det.is_negative() {
        -1
    } else {
        0
    }
}

pub(super) fn det_sign_2(m: &[[f64; 2]; 2]) -> i8 {
    sign_of(det2(&scaled(m)))
}

pub(super) fn det_sign_3(m: &[[f64; 3]; 3]) -> i8 {
    sign_of(det3(&scaled(m)))
}

pub(super) fn det_sign_4(m: &[[f64; 4]; 4]) -> i8 {
    sign_of(det4(&scaled(m)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dyadic_round_trips() {
        for x in [0.0, 1.0, -1.5, 0.1, 1e-300, -3.7e250, f64::MIN_POSITIVE / 4.0] {
            let (mant, exp) = dyadic(x);
            // mant * 2^exp == x, checked through exact halving/doubling.
            let mut value = x;
            let mut e = exp;
            while e < 0 {
                value *= 2.0;
                e += 1;
            }
            while e > 0 {
                value /= 2.0;
                e -= 1;
            }
            // Power-of-two scaling of a 53-bit mantissa is exact.
            assert_eq!(BigInt::from(value as i128), mant, "x = {x}");
        }
    }

    #[test]
    fn exact_sign_of_cancelling_matrix() {
        // Rows differ by one ULP; f64 evaluation cancels catastrophically.
        let eps = f64::EPSILON;
        let m = [
            [1.0 + eps, 1.0],
            [1.0, 1.0 - eps],
        ];
        // det = (1+eps)(1-eps) - 1 = -eps^2 < 0, invisible to f64.
        assert_eq!(det_sign_2(&m), -1);
    }

    #[test]
    fn singular_matrix_is_zero() {
        let m = [
            [2.0, 4.0, 6.0],
            [1.0, 2.0, 3.0],
            [0.5, 1.0, 1.5],
        ];
        assert_eq!(det_sign_3(&m), 0);
    }

    #[test]
    fn matches_float_on_well_conditioned_input() {
        let m = [
            [3.0, 1.0, 0.0, 2.0],
            [0.0, -2.0, 1.0, 1.0],
            [5.0, 0.0, 1.0, -1.0],
            [1.0, 1.0, 1.0, 1.0],
        ];
        let float_det = {
            // Straightforward cofactor evaluation for the reference.
            fn d3(m: [[f64; 3]; 3]) -> f64 {
                m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
                    - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
                    + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
            }
            let mut det = 0.0;
            for col in 0..4 {
                let cols: Vec<usize> = (0..4).filter(|&c| c != col).collect();
                let sub = d3(std::array::from_fn(|r| std::array::from_fn(|c| m[r + 1][cols[c]])));
                det += if col % 2 == 0 { 1.0 } else { -1.0 } * m[0][col] * sub;
            }
            det
        };
        assert_eq!(det_sign_4(&m), float_det.signum() as i8);
    }
}
