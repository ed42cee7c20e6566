//! Geometry core for four-point ROI calibration.
//!
//! This crate is purely computational: it turns operator-marked points into a
//! bounding rectangle, a canonical corner ordering, a perspective transform
//! and a binary mask, and applies those to raw interleaved 8-bit frames. It
//! performs no I/O besides logging.

mod corners;
mod geometry;
mod homography;
mod image;
mod logger;
mod mask;

pub use corners::sort_corners;
pub use geometry::{bounding_rect, bounds, normalize, Point, Rect};
pub use homography::{
    homography_from_4pt, is_degenerate_quad, perspective_to_rect, warp_perspective, Homography,
};
pub use image::{copy_with_mask, sample_bilinear, sample_bilinear_u8, Image, ImageError, ImageView};
pub use mask::{fill_polygon, visibility_mask, MASK_ON};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, level_for_verbosity};
