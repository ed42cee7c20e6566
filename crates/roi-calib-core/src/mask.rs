//! Polygon rasterization for region-of-interest masks.
//!
//! Filling follows the even-odd rule with pixel-centre sampling: a pixel is
//! set when its centre `(x + 0.5, y + 0.5)` lies inside the polygon. Vertices
//! may be in any order, so self-intersecting outlines are filled as well.

use crate::{Image, Point, Rect};

/// Value written for pixels inside the region.
pub const MASK_ON: u8 = 255;

/// Reusable buffer of edge crossings for a single scanline.
struct ScanlineBuffer {
    crossings: Vec<f64>,
}

impl ScanlineBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            crossings: Vec::with_capacity(capacity),
        }
    }

    /// Collect sorted x crossings of the horizontal line at `yc`.
    fn scan(&mut self, polygon: &[Point], yc: f64) -> &[f64] {
        self.crossings.clear();
        let n = polygon.len();
        for i in 0..n {
            let p1 = polygon[i];
            let p2 = polygon[(i + 1) % n];
            let (y1, y2) = (p1.y as f64, p2.y as f64);
            // half-open on y so shared vertices are counted once
            if (y1 <= yc && yc < y2) || (y2 <= yc && yc < y1) {
                let x = p1.x as f64 + (yc - y1) * (p2.x as f64 - p1.x as f64) / (y2 - y1);
                self.crossings.push(x);
            }
        }
        self.crossings.sort_by(|a, b| a.total_cmp(b));
        &self.crossings
    }
}

/// Fill `polygon` into channel 0 of `mask` with `value`.
///
/// Vertices outside the mask are fine; the fill is clipped to the image.
pub fn fill_polygon(mask: &mut Image, polygon: &[Point], value: u8) {
    if polygon.len() < 3 || mask.width == 0 || mask.height == 0 {
        return;
    }

    let (w, c) = (mask.width, mask.channels);
    let mut buffer = ScanlineBuffer::new(polygon.len());
    for y in 0..mask.height {
        let yc = y as f64 + 0.5;
        for pair in buffer.scan(polygon, yc).chunks_exact(2) {
            // pixel centres x + 0.5 within [pair[0], pair[1])
            let start = (pair[0] - 0.5).ceil().max(0.0);
            let end = (pair[1] - 0.5).ceil().min(w as f64);
            if start >= end {
                continue;
            }
            for x in start as usize..end as usize {
                mask.data[(y * w + x) * c] = value;
            }
        }
    }
}

/// Build the visibility mask: a single channel image the size of `visibility`
/// with `clip_points` (in their given order) filled at [`MASK_ON`].
///
/// Clip points are translated into mask-local coordinates by subtracting the
/// visibility origin.
pub fn visibility_mask(visibility: &Rect, clip_points: &[Point]) -> Image {
    let width = visibility.width().max(0) as usize;
    let height = visibility.height().max(0) as usize;
    let mut mask = Image::zeros(width, height, 1);

    let origin = visibility.origin();
    let local: Vec<Point> = clip_points.iter().map(|p| p.relative_to(origin)).collect();
    fill_polygon(&mut mask, &local, MASK_ON);
    mask
}
