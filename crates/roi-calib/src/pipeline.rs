//! Applying a calibration to incoming frames.
//!
//! Every operation only reads the frame passed in and the calibrator's
//! current geometry; nothing about the frame is retained between calls.

use crate::{Calibrator, PipelineError};
use roi_calib_core::{copy_with_mask, warp_perspective, Image, ImageView};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// All calibrated views of one frame.
#[derive(Clone, Debug)]
pub struct ProcessedFrame {
    /// Clip rectangle crop, or the full frame.
    pub clipped: Image,
    /// Perspective-corrected visibility quad, if a transform exists.
    pub rectified: Option<Image>,
    /// `rectified` with the visibility mask applied.
    pub masked: Option<Image>,
}

impl Calibrator {
    /// Crop `frame` to the clip rectangle.
    ///
    /// Falls back to a copy of the whole frame when the calibration is
    /// incomplete or the rectangle is empty or does not fit the frame.
    pub fn clip(&self, frame: &ImageView<'_>) -> Image {
        if !self.is_complete() {
            return frame.to_image();
        }
        let rect = self.clip_rect();
        match frame.crop(&rect) {
            Some(clipped) => clipped,
            None => {
                log::warn!(
                    "clip rectangle {} does not fit {}x{} frame, using full frame",
                    rect,
                    frame.width,
                    frame.height
                );
                frame.to_image()
            }
        }
    }

    /// Warp the visibility quad of `frame` onto a rectangle the size of the
    /// visibility rectangle.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "debug",
            skip(self, frame),
            fields(width = frame.width, height = frame.height)
        )
    )]
    pub fn rectify(&self, frame: &ImageView<'_>) -> Result<Image, PipelineError> {
        let h = self.perspective().ok_or(PipelineError::NoTransform)?;
        let vis = self.visibility_rect();
        warp_perspective(frame, h, vis.width() as usize, vis.height() as usize)
            .ok_or(PipelineError::NoTransform)
    }

    /// Blank every pixel outside the visibility mask.
    ///
    /// `frame` must be the size of the visibility rectangle, i.e. the output
    /// of [`Self::rectify`].
    pub fn mask(&self, frame: &ImageView<'_>) -> Result<Image, PipelineError> {
        let mask = self.visibility_mask().ok_or(PipelineError::NoMask)?;
        Ok(copy_with_mask(frame, &mask.view())?)
    }

    /// Run clip, rectify and mask, skipping whatever is unavailable.
    pub fn process(&self, frame: &ImageView<'_>) -> ProcessedFrame {
        let clipped = self.clip(frame);
        let rectified = match self.rectify(frame) {
            Ok(img) => Some(img),
            Err(err) => {
                if self.is_complete() {
                    log::debug!("skipping rectification: {}", err);
                }
                None
            }
        };
        let masked = rectified
            .as_ref()
            .and_then(|r| match self.mask(&r.view()) {
                Ok(img) => Some(img),
                Err(err) => {
                    log::debug!("skipping mask: {}", err);
                    None
                }
            });
        ProcessedFrame {
            clipped,
            rectified,
            masked,
        }
    }
}
