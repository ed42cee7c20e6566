use crate::Point;

/// Order four corners as `[top-left, top-right, bottom-right, bottom-left]`.
///
/// Points are split by `y` into an upper and a lower pair. The upper pair is
/// ordered by ascending `x`, the lower pair by descending `x`, which yields a
/// clockwise traversal. Swapping either tie-break mirrors the quad and flips
/// the handedness of any homography built from it.
///
/// All sorts are stable, so coincident or collinear input is accepted as is.
pub fn sort_corners(points: [Point; 4]) -> [Point; 4] {
    let mut by_y = points;
    by_y.sort_by_key(|p| p.y);

    let mut upper = [by_y[0], by_y[1]];
    upper.sort_by_key(|p| p.x);

    let mut lower = [by_y[2], by_y[3]];
    lower.sort_by(|a, b| b.x.cmp(&a.x));

    [upper[0], upper[1], lower[0], lower[1]]
}
