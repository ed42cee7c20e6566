//! Four-point clip, mask and perspective calibration for live video.
//!
//! An operator double-clicks four points on a paused frame. From them the
//! [`Calibrator`] derives a clip rectangle, a visibility mask and a
//! perspective transform that rectifies the marked quad, persists the points
//! to a small text file, and applies the result to every later frame.
//!
//! ## Quickstart
//!
//! ```no_run
//! use roi_calib::{Calibrator, CalibratorConfig, CameraAdapter, SnapshotSource};
//! use roi_calib::core::{Image, Point};
//!
//! let mut calibrator = Calibrator::new(CalibratorConfig::in_dir("data"));
//! let mut camera = CameraAdapter::new(SnapshotSource::new(Image::zeros(640, 480, 3)), false);
//! camera.attach(calibrator.events_mut());
//!
//! calibrator.start_editing_with(&mut camera);
//! for (x, y) in [(10, 10), (610, 12), (620, 470), (5, 460)] {
//!     calibrator.click(Point::new(x, y));
//! }
//!
//! let frame = camera.read().frame;
//! let out = calibrator.process(&frame.view());
//! println!("rectified: {}", out.rectified.is_some());
//! ```
//!
//! ## API map
//! - `roi_calib::core`: points, rectangles, corner ordering, homography,
//!   mask rasterization and images.
//! - [`Calibrator`]: the edit/drag state machine and frame processing.
//! - [`CalibrationStore`]: the eight-line calibration record.
//! - [`EventBus`]: calibration notifications.
//! - [`CameraAdapter`], [`BufferedSource`]: frame sources at the boundary.

mod config;
mod error;
mod events;
mod pipeline;
mod session;
mod source;
mod store;

pub use roi_calib_core as core;

pub use config::CalibratorConfig;
pub use error::{ConfigError, PipelineError, StoreError};
pub use events::{CalibrationEvent, EventBus};
pub use pipeline::ProcessedFrame;
pub use session::{Calibrator, Handle, PointSet, PointerStatus, SessionState};
pub use source::{
    BufferedSource, CameraAdapter, Captured, FrameRead, FrameSource, LatestFrame, PauseControl,
    SnapshotSource,
};
pub use store::{
    format_record, parse_record, CalibrationRecord, CalibrationStore, PointSlot, POINTS_PER_SET,
};
