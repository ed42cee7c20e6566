use crate::{sample_bilinear_u8, Image, ImageView, Point};
use nalgebra::{Matrix3, Point2, SMatrix, SVector, Vector3};
use serde::{Deserialize, Serialize};

/// 3x3 projective transform acting on homogeneous pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn identity() -> Self {
        Self::new(Matrix3::identity())
    }

    pub fn from_array(rows: [[f64; 3]; 3]) -> Self {
        Self::new(Matrix3::from_row_slice(&[
            rows[0][0], rows[0][1], rows[0][2], rows[1][0], rows[1][1], rows[1][2], rows[2][0],
            rows[2][1], rows[2][2],
        ]))
    }

    pub fn to_array(&self) -> [[f64; 3]; 3] {
        [
            [self.h[(0, 0)], self.h[(0, 1)], self.h[(0, 2)]],
            [self.h[(1, 0)], self.h[(1, 1)], self.h[(1, 2)]],
            [self.h[(2, 0)], self.h[(2, 1)], self.h[(2, 2)]],
        ]
    }

    #[inline]
    pub fn apply(&self, p: Point2<f32>) -> Point2<f32> {
        let q = self.apply_f64(Point2::new(p.x as f64, p.y as f64));
        Point2::new(q.x as f32, q.y as f32)
    }

    #[inline]
    pub fn apply_f64(&self, p: Point2<f64>) -> Point2<f64> {
        let v = self.h * Vector3::new(p.x, p.y, 1.0);
        let w = v[2];
        Point2::new(v[0] / w, v[1] / w)
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }
}

fn hartley_normalization(cx: f64, cy: f64, mean_dist: f64) -> Matrix3<f64> {
    let s = if mean_dist > 1e-12 {
        (2.0_f64).sqrt() / mean_dist
    } else {
        1.0
    };

    Matrix3::<f64>::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

fn normalize_points4(pts: &[Point2<f32>; 4]) -> ([Point2<f64>; 4], Matrix3<f64>) {
    // translate to centroid, scale so mean distance = sqrt(2)
    let n = 4.0_f64;
    let mut cx = 0.0_f64;
    let mut cy = 0.0_f64;
    for p in pts {
        cx += p.x as f64;
        cy += p.y as f64;
    }
    cx /= n;
    cy /= n;

    let mut mean_dist = 0.0_f64;
    for p in pts {
        let dx = p.x as f64 - cx;
        let dy = p.y as f64 - cy;
        mean_dist += (dx * dx + dy * dy).sqrt();
    }
    mean_dist /= n;

    let t = hartley_normalization(cx, cy, mean_dist);

    let mut out = [Point2::new(0.0_f64, 0.0_f64); 4];
    for (i, p) in pts.iter().enumerate() {
        let v = t * Vector3::new(p.x as f64, p.y as f64, 1.0);
        out[i] = Point2::new(v[0], v[1]);
    }

    (out, t)
}

fn normalize_homography(h: Matrix3<f64>) -> Option<Matrix3<f64>> {
    let s = h[(2, 2)];
    if s.abs() < 1e-12 {
        return None;
    }
    Some(h / s)
}

fn denormalize_homography(
    hn: Matrix3<f64>,
    t_src: Matrix3<f64>,
    t_dst: Matrix3<f64>,
) -> Option<Matrix3<f64>> {
    let t_dst_inv = t_dst.try_inverse()?;
    Some(t_dst_inv * hn * t_src)
}

/// True when any three of the four points are collinear (or coincide).
///
/// Such a quad has no projective mapping onto a rectangle.
pub fn is_degenerate_quad(pts: &[Point2<f32>; 4]) -> bool {
    let scale = pts
        .iter()
        .flat_map(|p| [p.x.abs() as f64, p.y.abs() as f64])
        .fold(1.0_f64, f64::max);
    let eps = 1e-9 * scale * scale;

    const TRIPLES: [[usize; 3]; 4] = [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]];
    TRIPLES.iter().any(|&[a, b, c]| {
        let (pa, pb, pc) = (pts[a], pts[b], pts[c]);
        let cross = (pb.x as f64 - pa.x as f64) * (pc.y as f64 - pa.y as f64)
            - (pb.y as f64 - pa.y as f64) * (pc.x as f64 - pa.x as f64);
        cross.abs() <= eps
    })
}

/// Compute H such that: dst ~ H * src (projective), using 4 point correspondences.
///
/// Corner order must be consistent between `src` and `dst`. Returns `None`
/// when either quad is degenerate or the linear system is singular.
pub fn homography_from_4pt(src: &[Point2<f32>; 4], dst: &[Point2<f32>; 4]) -> Option<Homography> {
    if is_degenerate_quad(src) || is_degenerate_quad(dst) {
        return None;
    }

    // Unknowns: [h11 h12 h13 h21 h22 h23 h31 h32], with h33 = 1
    // For each correspondence (x,y)->(u,v):
    // h11 x + h12 y + h13 - u h31 x - u h32 y = u
    // h21 x + h22 y + h23 - v h31 x - v h32 y = v
    let (src_n, t_src) = normalize_points4(src);
    let (dst_n, t_dst) = normalize_points4(dst);

    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();

    for k in 0..4 {
        let x = src_n[k].x;
        let y = src_n[k].y;
        let u = dst_n[k].x;
        let v = dst_n[k].y;

        let r0 = 2 * k;
        a[(r0, 0)] = x;
        a[(r0, 1)] = y;
        a[(r0, 2)] = 1.0;
        a[(r0, 6)] = -u * x;
        a[(r0, 7)] = -u * y;
        b[r0] = u;

        let r1 = 2 * k + 1;
        a[(r1, 3)] = x;
        a[(r1, 4)] = y;
        a[(r1, 5)] = 1.0;
        a[(r1, 6)] = -v * x;
        a[(r1, 7)] = -v * y;
        b[r1] = v;
    }

    let x = a.lu().solve(&b)?;

    let hn = Matrix3::<f64>::new(
        x[0], x[1], x[2], //
        x[3], x[4], x[5], //
        x[6], x[7], 1.0,
    );

    let h_den = denormalize_homography(hn, t_src, t_dst)?;
    let h_den = normalize_homography(h_den)?;
    if h_den.iter().any(|v| !v.is_finite()) {
        return None;
    }

    Some(Homography::new(h_den))
}

/// Homography taking the corner-sorted quad onto a `width` x `height` rectangle.
///
/// `corners` must be `[top-left, top-right, bottom-right, bottom-left]`; they
/// map to `(0,0), (w,0), (w,h), (0,h)` respectively.
pub fn perspective_to_rect(corners: &[Point; 4], width: i32, height: i32) -> Option<Homography> {
    let src = corners.map(Point::to_f32);
    let (w, h) = (width as f32, height as f32);
    let dst = [
        Point2::new(0.0, 0.0),
        Point2::new(w, 0.0),
        Point2::new(w, h),
        Point2::new(0.0, h),
    ];
    homography_from_4pt(&src, &dst)
}

// Coordinates this close to an integer are snapped before sampling so exact
// pixel mappings do not pick up interpolation noise.
const SNAP_EPS: f64 = 1e-6;

#[inline]
fn snap(v: f64) -> f32 {
    let r = v.round();
    if (v - r).abs() < SNAP_EPS {
        r as f32
    } else {
        v as f32
    }
}

/// Warp `src` into an `out_w` x `out_h` image through `h_dst_from_src`.
///
/// Every destination pixel is pulled back through the inverse transform and
/// sampled bilinearly; pixels that land outside `src` are 0. Returns `None`
/// if the transform is not invertible.
pub fn warp_perspective(
    src: &ImageView<'_>,
    h_dst_from_src: &Homography,
    out_w: usize,
    out_h: usize,
) -> Option<Image> {
    let h_src_from_dst = h_dst_from_src.inverse()?;
    let channels = src.channels;
    let mut out = vec![0u8; out_w * out_h * channels];

    for y in 0..out_h {
        for x in 0..out_w {
            let p = h_src_from_dst.apply_f64(Point2::new(x as f64, y as f64));
            if !p.x.is_finite() || !p.y.is_finite() {
                continue;
            }
            let (sx, sy) = (snap(p.x), snap(p.y));
            let base = (y * out_w + x) * channels;
            for c in 0..channels {
                out[base + c] = sample_bilinear_u8(src, sx, sy, c);
            }
        }
    }

    Some(Image {
        width: out_w,
        height: out_h,
        channels,
        data: out,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: Point2<f32>, b: Point2<f32>, tol: f32) {
        let dx = (a.x - b.x).abs();
        let dy = (a.y - b.y).abs();
        assert!(
            dx < tol && dy < tol,
            "expected ({:.6},{:.6}) ~ ({:.6},{:.6}) within {}",
            a.x,
            a.y,
            b.x,
            b.y,
            tol
        );
    }

    fn quad(raw: [(i32, i32); 4]) -> [Point; 4] {
        raw.map(|(x, y)| Point::new(x, y))
    }

    #[test]
    fn axis_aligned_square_is_a_pure_translation() {
        let corners = quad([(10, 10), (110, 10), (110, 110), (10, 110)]);
        let h = perspective_to_rect(&corners, 100, 100).expect("solvable");
        let expected = [[1.0, 0.0, -10.0], [0.0, 1.0, -10.0], [0.0, 0.0, 1.0]];
        for (row, exp_row) in h.to_array().iter().zip(expected.iter()) {
            for (v, e) in row.iter().zip(exp_row.iter()) {
                assert!((v - e).abs() < 1e-9, "{:?}", h.to_array());
            }
        }
    }

    #[test]
    fn sorted_corners_land_on_destination_corners() {
        let corners = quad([(37, 22), (290, 48), (305, 231), (12, 199)]);
        let (w, h) = (293, 209);
        let hom = perspective_to_rect(&corners, w, h).expect("solvable");
        let dst = [(0.0, 0.0), (w as f32, 0.0), (w as f32, h as f32), (0.0, h as f32)];
        for (c, (u, v)) in corners.iter().zip(dst) {
            assert_close(hom.apply(c.to_f32()), Point2::new(u, v), 1e-3);
        }
    }

    #[test]
    fn four_point_specialization_recovers_h() {
        let ground_truth = Homography::new(Matrix3::new(
            0.8, 0.05, 120.0, //
            -0.02, 1.1, 80.0, //
            0.0009, -0.0004, 1.0,
        ));

        let rect = [
            Point2::new(0.0_f32, 0.0),
            Point2::new(180.0_f32, 0.0),
            Point2::new(180.0_f32, 130.0),
            Point2::new(0.0_f32, 130.0),
        ];
        let dst = rect.map(|p| ground_truth.apply(p));

        let recovered = homography_from_4pt(&rect, &dst).expect("recoverable");

        for p in [
            Point2::new(0.0_f32, 0.0),
            Point2::new(60.0, 40.0),
            Point2::new(150.0, 120.0),
        ] {
            assert_close(recovered.apply(p), ground_truth.apply(p), 1e-3);
        }
    }

    #[test]
    fn collinear_or_coincident_corners_fail() {
        let line = quad([(0, 0), (50, 0), (100, 0), (0, 80)]);
        assert!(perspective_to_rect(&line, 100, 80).is_none());

        let same = [Point::new(0, 0); 4];
        assert!(perspective_to_rect(&same, 0, 0).is_none());

        let ok = quad([(0, 0), (100, 0), (100, 80), (0, 80)]);
        assert!(perspective_to_rect(&ok, 0, 80).is_none());
    }

    #[test]
    fn inverse_round_trips_points() {
        let h = Homography::new(Matrix3::new(
            1.2, 0.1, 5.0, //
            -0.05, 0.9, 3.0, //
            0.001, 0.0005, 1.0,
        ));
        let inv = h.inverse().expect("invertible");

        for p in [
            Point2::new(0.0_f32, 0.0),
            Point2::new(50.0_f32, -20.0),
            Point2::new(320.0_f32, 200.0),
        ] {
            assert_close(inv.apply(h.apply(p)), p, 1e-3);
        }
    }

    #[test]
    fn warp_with_translation_copies_pixels() {
        let (w, h, c) = (40usize, 30usize, 3usize);
        let data: Vec<u8> = (0..w * h * c).map(|i| (i % 251) as u8).collect();
        let src = Image::new(w, h, c, data).unwrap();

        let corners = quad([(10, 5), (30, 5), (30, 25), (10, 25)]);
        let hom = perspective_to_rect(&corners, 20, 20).unwrap();
        let out = warp_perspective(&src.view(), &hom, 20, 20).expect("invertible");

        assert_eq!((out.width, out.height, out.channels), (20, 20, 3));
        for (x, y) in [(0, 0), (7, 3), (19, 19)] {
            assert_eq!(out.pixel(x, y), src.pixel(x + 10, y + 5));
        }
    }

    #[test]
    fn warp_fills_outside_with_zero() {
        let src = Image::new(4, 4, 1, vec![200; 16]).unwrap();
        let shift = Homography::from_array([[1.0, 0.0, 10.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
        let out = warp_perspective(&src.view(), &shift, 4, 4).unwrap();
        assert!(out.data.iter().all(|&v| v == 0));

        let singular = Homography::new(Matrix3::zeros());
        assert!(warp_perspective(&src.view(), &singular, 4, 4).is_none());
    }
}
