//! Property-based tests for the array and bounding box invariants.
//!
//! - Resizing keeps every element in the overlap at the same multi-index
//! - Reset + merge gives the component-wise min/max in any order
//! - Every merged point is contained
//! - Overlap is symmetric

use proptest::prelude::*;
use sim2d::{Array2, Array3, BoundingBox2D, BoundingBox2F, BoundingBox3F};

fn point2() -> impl Strategy<Value = [f32; 2]> {
    [-100.0f32..100.0, -100.0f32..100.0]
}

fn box2() -> impl Strategy<Value = BoundingBox2F> {
    (point2(), point2()).prop_map(|(a, b)| BoundingBox2F::new(a, b))
}

proptest! {
    #[test]
    fn resize_preserves_overlap_2d(
        w0 in 0usize..8, h0 in 0usize..8,
        w1 in 0usize..8, h1 in 0usize..8,
        init in -5i32..5,
    ) {
        let mut array = Array2::new([w0, h0], 0i32);
        for j in 0..h0 {
            for i in 0..w0 {
                array[[i, j]] = (i * 100 + j) as i32;
            }
        }

        array.resize([w1, h1], init);
        prop_assert_eq!(array.size(), [w1, h1]);
        prop_assert_eq!(array.len(), w1 * h1);
        for j in 0..h1 {
            for i in 0..w1 {
                let expected = if i < w0 && j < h0 { (i * 100 + j) as i32 } else { init };
                prop_assert_eq!(array[[i, j]], expected);
            }
        }
    }

    #[test]
    fn resize_preserves_overlap_3d(
        s0 in prop::array::uniform3(0usize..5),
        s1 in prop::array::uniform3(0usize..5),
    ) {
        let mut array = Array3::new(s0, -1i64);
        array.for_each_index_mut(|[i, j, k], v| *v = (i * 10_000 + j * 100 + k) as i64);

        array.resize(s1, -1);
        let mut checked = 0;
        array.for_each_index(|[i, j, k]| {
            let inside = i < s0[0] && j < s0[1] && k < s0[2];
            let expected = if inside { (i * 10_000 + j * 100 + k) as i64 } else { -1 };
            assert_eq!(array[[i, j, k]], expected);
            checked += 1;
        });
        prop_assert_eq!(checked, s1[0] * s1[1] * s1[2]);
    }

    #[test]
    fn merge_order_does_not_matter(points in prop::collection::vec(point2(), 1..20)) {
        let mut forward = BoundingBox2F::default();
        forward.reset();
        for p in &points {
            forward.merge_point(p);
        }
        let mut backward = BoundingBox2F::default();
        for p in points.iter().rev() {
            backward.merge_point(p);
        }
        prop_assert_eq!(forward, backward);

        for axis in 0..2 {
            let lo = points.iter().map(|p| p[axis]).fold(f32::INFINITY, f32::min);
            let hi = points.iter().map(|p| p[axis]).fold(f32::NEG_INFINITY, f32::max);
            prop_assert_eq!(forward.lower_corner[axis], lo);
            prop_assert_eq!(forward.upper_corner[axis], hi);
        }

        for p in &points {
            prop_assert!(forward.contains(p));
        }
    }

    #[test]
    fn merge_boxes_is_commutative(a in box2(), b in box2(), c in box2()) {
        let mut ab = a;
        ab.merge(&b);
        ab.merge(&c);
        let mut cb = c;
        cb.merge(&b);
        cb.merge(&a);
        prop_assert_eq!(ab, cb);
        prop_assert!(ab.contains(&a.lower_corner));
        prop_assert!(ab.contains(&c.upper_corner));
    }

    #[test]
    fn overlaps_is_symmetric(a in box2(), b in box2()) {
        prop_assert_eq!(a.overlaps(&b), b.overlaps(&a));
        prop_assert!(a.overlaps(&a));
    }

    #[test]
    fn expand_moves_both_corners(a in box2(), delta in -10.0f32..10.0) {
        let mut expanded = a;
        expanded.expand(delta);
        for axis in 0..2 {
            prop_assert!((expanded.lower_corner[axis] - (a.lower_corner[axis] - delta)).abs() < 1e-4);
            prop_assert!((expanded.upper_corner[axis] - (a.upper_corner[axis] + delta)).abs() < 1e-4);
        }
    }
}

#[test]
fn diagonal_and_mid_point_of_3_4_box() {
    let mut bbox = BoundingBox2F::default();
    bbox.reset();
    bbox.merge_point(&[0.0, 0.0]);
    bbox.merge_point(&[3.0, 4.0]);
    assert_eq!(bbox.diagonal_length(), 5.0);
    assert_eq!(bbox.diagonal_length_squared(), 25.0);
    assert_eq!(bbox.mid_point(), [1.5, 2.0]);

    let mut wide = BoundingBox2D::new([0.0, 0.0], [3.0, 4.0]);
    assert_eq!(wide.diagonal_length(), 5.0);
    // Shrinking past zero inverts the box rather than failing
    wide.expand(-2.0);
    assert!(wide.lower_corner[0] > wide.upper_corner[0]);
    assert!(wide.is_empty());

    let cube = BoundingBox3F::new([0.0; 3], [1.0; 3]);
    assert!(cube.contains(&[1.0, 1.0, 1.0]));
    assert!(!cube.contains(&[1.0, 1.0, 1.01]));
}
