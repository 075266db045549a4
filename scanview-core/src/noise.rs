//! 3D simplex noise used to roughen the reveal boundary.
//!
//! This is the textureless simplex noise by Ian McEwan and Stefan Gustavson
//! (Ashima Arts, MIT licensed), evaluated in `f32` exactly the way the
//! dissolve fragment shader does. Keeping the CPU and GPU arithmetic identical
//! lets the CPU side serve as the reference for which fragments get
//! discarded.
//!
//! Gradients come from a permutation polynomial over `mod 289` instead of a
//! lookup table, so there is no table to initialize and the result only
//! depends on the input coordinates.

use glam::{Vec3, Vec3Swizzles, Vec4, Vec4Swizzles};

const C: (f32, f32) = (1.0 / 6.0, 1.0 / 3.0);
const GRADIENT_RING: f32 = 1.0 / 7.0;

/// Scale applied to the summed corner contributions.
pub const NOISE_SCALE: f32 = 42.0;

/// Squared radius of each corner's falloff kernel.
pub const KERNEL_RADIUS_SQ: f32 = 0.6;

fn mod289_3(x: Vec3) -> Vec3 {
    x - (x * (1.0 / 289.0)).floor() * 289.0
}

fn mod289_4(x: Vec4) -> Vec4 {
    x - (x * (1.0 / 289.0)).floor() * 289.0
}

fn permute(x: Vec4) -> Vec4 {
    mod289_4(((x * 34.0) + 1.0) * x)
}

fn taylor_inv_sqrt(r: Vec4) -> Vec4 {
    1.792_842_9 - 0.853_734_7 * r
}

/// GLSL `step(edge, x)`: 1.0 where `x >= edge`, else 0.0.
fn step3(edge: Vec3, x: Vec3) -> Vec3 {
    Vec3::select(x.cmpge(edge), Vec3::ONE, Vec3::ZERO)
}

fn step4(edge: Vec4, x: Vec4) -> Vec4 {
    Vec4::select(x.cmpge(edge), Vec4::ONE, Vec4::ZERO)
}

/// Evaluate simplex noise at `v`.
///
/// The result is nominally in `[-1, 1]` but not strictly bounded; use
/// [`unit`] when a probability-like value is needed.
pub fn evaluate(v: Vec3) -> f32 {
    // First corner
    let i = (v + v.dot(Vec3::splat(C.1))).floor();
    let x0 = v - i + i.dot(Vec3::splat(C.0));

    // Other corners. The >= comparison decides ties the same way every time.
    let g = step3(x0.yzx(), x0);
    let l = Vec3::ONE - g;
    let i1 = g.min(l.zxy());
    let i2 = g.max(l.zxy());

    let x1 = x0 - i1 + C.0;
    let x2 = x0 - i2 + C.1;
    let x3 = x0 - 0.5;

    // Permutations
    let i = mod289_3(i);
    let p = permute(
        permute(
            permute(Vec4::splat(i.z) + Vec4::new(0.0, i1.z, i2.z, 1.0))
                + Vec4::splat(i.y)
                + Vec4::new(0.0, i1.y, i2.y, 1.0),
        ) + Vec4::splat(i.x)
            + Vec4::new(0.0, i1.x, i2.x, 1.0),
    );

    // Gradients: 7x7 points over a square, mapped onto an octahedron.
    let ns = Vec3::new(2.0, 0.5, 1.0) * GRADIENT_RING - Vec3::new(0.0, 1.0, 0.0);

    let j = p - 49.0 * (p * ns.z * ns.z).floor();

    let x_ = (j * ns.z).floor();
    let y_ = (j - 7.0 * x_).floor();

    let x = x_ * ns.x + Vec4::splat(ns.y);
    let y = y_ * ns.x + Vec4::splat(ns.y);
    let h = Vec4::ONE - x.abs() - y.abs();

    let b0 = Vec4::new(x.x, x.y, y.x, y.y);
    let b1 = Vec4::new(x.z, x.w, y.z, y.w);

    let s0 = b0.floor() * 2.0 + 1.0;
    let s1 = b1.floor() * 2.0 + 1.0;
    let sh = -step4(h, Vec4::ZERO);

    let a0 = b0.xzyw() + s0.xzyw() * sh.xxyy();
    let a1 = b1.xzyw() + s1.xzyw() * sh.zzww();

    let p0 = Vec3::new(a0.x, a0.y, h.x);
    let p1 = Vec3::new(a0.z, a0.w, h.y);
    let p2 = Vec3::new(a1.x, a1.y, h.z);
    let p3 = Vec3::new(a1.z, a1.w, h.w);

    let norm = taylor_inv_sqrt(Vec4::new(p0.dot(p0), p1.dot(p1), p2.dot(p2), p3.dot(p3)));
    let p0 = p0 * norm.x;
    let p1 = p1 * norm.y;
    let p2 = p2 * norm.z;
    let p3 = p3 * norm.w;

    // Mix final noise value
    let m = (Vec4::splat(KERNEL_RADIUS_SQ)
        - Vec4::new(x0.dot(x0), x1.dot(x1), x2.dot(x2), x3.dot(x3)))
    .max(Vec4::ZERO);
    let m = m * m;
    NOISE_SCALE * (m * m).dot(Vec4::new(p0.dot(x0), p1.dot(x1), p2.dot(x2), p3.dot(x3)))
}

/// Noise remapped to `[0, 1]` via `(n + 1) / 2`, clamped.
pub fn unit(v: Vec3) -> f32 {
    ((evaluate(v) + 1.0) * 0.5).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_points() -> Vec<Vec3> {
        let mut points = Vec::new();
        for i in 0..512 {
            let f = i as f32;
            points.push(Vec3::new(
                (f * 0.731).sin() * 40.0,
                (f * 0.197).cos() * 25.0 + f * 0.01,
                f * 0.113 - 20.0,
            ));
        }
        points
    }

    #[test]
    fn test_evaluate_is_bit_stable() {
        let points = sample_points();
        let first: Vec<u32> = points.iter().map(|&p| evaluate(p).to_bits()).collect();
        // Reverse order to make sure earlier calls do not influence later ones.
        let second: Vec<u32> = points
            .iter()
            .rev()
            .map(|&p| evaluate(p).to_bits())
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_evaluate_is_nominally_bounded() {
        for p in sample_points() {
            let n = evaluate(p);
            assert!(n.is_finite());
            assert!(n.abs() <= 1.5, "noise {} at {:?} out of range", n, p);
        }
    }

    #[test]
    fn test_evaluate_is_continuous() {
        // With a 0.6 falloff a corner that drops out at a simplex boundary
        // still has a small weight, so the field has small steps there. The
        // bound only rules out gross discontinuities.
        let eps = 1e-3;
        for p in sample_points() {
            let base = evaluate(p);
            for offset in [Vec3::X, Vec3::Y, Vec3::Z] {
                let shifted = evaluate(p + offset * eps);
                assert!(
                    (shifted - base).abs() < 0.2,
                    "jump of {} at {:?}",
                    (shifted - base).abs(),
                    p
                );
            }
        }
    }

    #[test]
    fn test_evaluate_varies_in_space() {
        let values: Vec<f32> = sample_points().into_iter().map(evaluate).collect();
        let min = values.iter().copied().fold(f32::MAX, f32::min);
        let max = values.iter().copied().fold(f32::MIN, f32::max);
        assert!(max - min > 0.5);
    }

    #[test]
    fn test_evaluate_on_lattice_ties() {
        // Integer lattice points hit the tie-break path where all fractional
        // offsets compare equal.
        for p in [Vec3::ZERO, Vec3::ONE, Vec3::new(-3.0, 7.0, 12.0)] {
            assert_eq!(evaluate(p).to_bits(), evaluate(p).to_bits());
            assert!(evaluate(p).is_finite());
        }
    }

    #[test]
    fn test_unit_is_clamped() {
        for p in sample_points() {
            let v = unit(p * 450.0);
            assert!((0.0..=1.0).contains(&v));
        }
    }
}
