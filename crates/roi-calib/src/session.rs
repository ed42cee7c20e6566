//! Interactive calibration session.
//!
//! A [`Calibrator`] owns the clip and visibility point sets and everything
//! derived from them. Hosts feed it double-click positions while editing and
//! per-handle pointer status afterwards; it recomputes the clip rectangle,
//! visibility rectangle, mask and perspective transform whenever a set holds
//! exactly four points, and persists the record through a
//! [`CalibrationStore`].
//!
//! # States
//!
//! - `Idle`: not editing, no complete calibration.
//! - `Editing`: collecting clicks. Calling [`Calibrator::start_editing`]
//!   again while editing *leaves* editing mode instead of restarting it.
//! - `Complete`: four points per set, derived geometry valid.
//! - `Dragging(handle)`: a complete calibration with one point under the
//!   pointer. Geometry is recomputed on every move; the record is written
//!   once the drag ends.

use crate::source::PauseControl;
use crate::store::{CalibrationRecord, CalibrationStore, POINTS_PER_SET};
use crate::{CalibrationEvent, CalibratorConfig, EventBus};
use roi_calib_core::{
    bounding_rect, normalize, perspective_to_rect, sort_corners, visibility_mask, Homography,
    Image, Point, Rect,
};
use serde::Serialize;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Which of the two point sets a handle belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum PointSet {
    Clip,
    Visibility,
}

/// A draggable point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Handle {
    pub set: PointSet,
    pub index: usize,
}

impl Handle {
    pub const fn clip(index: usize) -> Self {
        Self {
            set: PointSet::Clip,
            index,
        }
    }

    pub const fn visibility(index: usize) -> Self {
        Self {
            set: PointSet::Visibility,
            index,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Editing,
    Dragging(Handle),
    Complete,
}

/// Pointer status relative to one handle's interactive area.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerStatus {
    /// Hovering, button up.
    Over,
    /// Button held.
    Down,
    /// Outside the handle.
    Out,
}

/// Keep each axis of `pointer` that lies in `[min, max]`; other axes keep
/// the value from `current`.
fn clamp_pointer(current: Point, pointer: Point, bounds: (i32, i32, i32, i32)) -> Point {
    let (min_x, min_y, max_x, max_y) = bounds;
    let x = if pointer.x < min_x || pointer.x > max_x {
        current.x
    } else {
        pointer.x
    };
    let y = if pointer.y < min_y || pointer.y > max_y {
        current.y
    } else {
        pointer.y
    };
    Point::new(x, y)
}

#[derive(Debug)]
pub struct Calibrator {
    config: CalibratorConfig,
    store: CalibrationStore,
    events: EventBus,
    state: SessionState,
    clip_points: Vec<Point>,
    visibility_points: Vec<Point>,
    clip_rect: Rect,
    visibility_rect: Rect,
    visibility_mask: Option<Image>,
    perspective: Option<Homography>,
    dirty: bool,
    loaded: Option<CalibrationRecord>,
}

impl Calibrator {
    /// Create a session storing its record at `config.calibration_path()`.
    pub fn new(config: CalibratorConfig) -> Self {
        let store = CalibrationStore::from_config(&config);
        Self::with_store(config, store)
    }

    /// Create a session and load any existing record from `store`.
    ///
    /// Unreadable records are logged and ignored so startup never fails.
    pub fn with_store(config: CalibratorConfig, store: CalibrationStore) -> Self {
        let mut calibrator = Self {
            config,
            store,
            events: EventBus::new(),
            state: SessionState::Idle,
            clip_points: Vec::with_capacity(POINTS_PER_SET),
            visibility_points: Vec::with_capacity(POINTS_PER_SET),
            clip_rect: Rect::default(),
            visibility_rect: Rect::default(),
            visibility_mask: None,
            perspective: None,
            dirty: false,
            loaded: None,
        };
        calibrator.load();
        calibrator
    }

    fn load(&mut self) {
        let record = match self.store.load() {
            Ok(Some(record)) => record,
            Ok(None) => return,
            Err(err) => {
                log::warn!(
                    "cannot read calibration {}: {}",
                    self.store.path().display(),
                    err
                );
                return;
            }
        };

        if record.defaulted_slots() == 2 * POINTS_PER_SET {
            log::warn!("calibration record holds no valid points, ignoring it");
        } else if let Some(rect) = [record.clip_points(), record.visibility_points()]
            .iter()
            .map(|points| bounding_rect(points))
            .find(|rect| !self.within_extent(rect))
        {
            log::warn!(
                "calibration record spans {}, larger than {} px, ignoring it",
                rect,
                self.config.max_extent
            );
        } else {
            self.clip_points = record.clip_points();
            self.visibility_points = record.visibility_points();
            if self.clip_points.len() == POINTS_PER_SET {
                self.state = SessionState::Complete;
                self.recompute();
            }
        }
        self.loaded = Some(record);
    }

    fn within_extent(&self, rect: &Rect) -> bool {
        rect.width() <= self.config.max_extent && rect.height() <= self.config.max_extent
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_editing(&self) -> bool {
        self.state == SessionState::Editing
    }

    /// Derived geometry is valid and frame processing is active.
    pub fn is_complete(&self) -> bool {
        matches!(
            self.state,
            SessionState::Complete | SessionState::Dragging(_)
        )
    }

    pub fn config(&self) -> &CalibratorConfig {
        &self.config
    }

    pub fn store(&self) -> &CalibrationStore {
        &self.store
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn set_limit_visibility(&mut self, limit: bool) {
        self.config.limit_visibility = limit;
    }

    /// The record read at startup, with per-slot presence.
    pub fn loaded_record(&self) -> Option<&CalibrationRecord> {
        self.loaded.as_ref()
    }

    pub fn clip_points(&self) -> &[Point] {
        &self.clip_points
    }

    pub fn visibility_points(&self) -> &[Point] {
        &self.visibility_points
    }

    pub fn clip_rect(&self) -> Rect {
        self.clip_rect
    }

    pub fn visibility_rect(&self) -> Rect {
        self.visibility_rect
    }

    pub fn visibility_mask(&self) -> Option<&Image> {
        self.visibility_mask.as_ref()
    }

    pub fn perspective(&self) -> Option<&Homography> {
        self.perspective.as_ref()
    }

    pub fn clip_width(&self) -> i32 {
        self.clip_rect.width()
    }

    pub fn clip_height(&self) -> i32 {
        self.clip_rect.height()
    }

    pub fn clip_area(&self) -> i64 {
        self.clip_rect.area()
    }

    pub fn clip_size(&self) -> [i32; 2] {
        [self.clip_width(), self.clip_height()]
    }

    /// Scale `(x, y)` by the clip rectangle extent. `None` for an empty rect.
    pub fn normalize_clipped(&self, x: f32, y: f32) -> Option<(f32, f32)> {
        if self.clip_rect.is_empty() {
            return None;
        }
        Some(normalize(
            x,
            y,
            self.clip_width() as f32,
            self.clip_height() as f32,
        ))
    }

    /// Enter edit mode, or leave it when already editing.
    ///
    /// Entering clears a complete calibration so four fresh points can be
    /// placed. Calling it again while editing exits edit mode without
    /// touching the points collected so far; a later call continues from
    /// there.
    pub fn start_editing(&mut self) {
        self.toggle_editing(None);
    }

    /// [`Self::start_editing`] that also pauses `source` on entry and resumes
    /// it on exit.
    pub fn start_editing_with(&mut self, source: &mut dyn PauseControl) {
        self.toggle_editing(Some(source));
    }

    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
    fn toggle_editing(&mut self, source: Option<&mut dyn PauseControl>) {
        if self.state == SessionState::Editing {
            self.state = SessionState::Idle;
            if let Some(source) = source {
                source.set_paused(false);
            }
            log::info!("left calibration mode");
            return;
        }

        if self.clip_points.len() == POINTS_PER_SET {
            self.clip_points.clear();
            self.visibility_points.clear();
            self.clear_derived();
        }

        if let Some(source) = source {
            source.set_paused(true);
        }
        self.state = SessionState::Editing;
        log::info!("calibration mode, {} points placed", self.clip_points.len());
    }

    /// Leave edit mode; completes the calibration if four points are placed.
    pub fn stop_editing(&mut self) {
        if self.clip_points.len() == POINTS_PER_SET {
            self.state = SessionState::Complete;
            self.recompute();
            self.save();
        } else {
            self.state = SessionState::Idle;
        }
    }

    /// Register a double-click at `point`.
    ///
    /// Ignored outside edit mode or once four points are placed. The fourth
    /// point completes the calibration and emits
    /// [`CalibrationEvent::CalibrationDone`]. Returns whether the point was
    /// accepted.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    pub fn click(&mut self, point: Point) -> bool {
        if self.state != SessionState::Editing || self.clip_points.len() >= POINTS_PER_SET {
            return false;
        }

        self.clip_points.push(point);
        self.visibility_points.push(point);
        log::debug!("point {} placed at {}", self.clip_points.len(), point);

        if self.clip_points.len() == POINTS_PER_SET {
            self.stop_editing();
            self.events.emit(CalibrationEvent::CalibrationDone);
        }
        true
    }

    pub fn point(&self, handle: Handle) -> Option<Point> {
        self.points(handle.set).get(handle.index).copied()
    }

    fn points(&self, set: PointSet) -> &[Point] {
        match set {
            PointSet::Clip => &self.clip_points,
            PointSet::Visibility => &self.visibility_points,
        }
    }

    fn capture_size(&self, handle: Handle) -> i32 {
        if self.state == SessionState::Dragging(handle) {
            self.config.drag_capture_size
        } else {
            self.config.drag_handle_size
        }
    }

    /// The handle whose interactive area contains `pointer`, clip points first.
    pub fn handle_at(&self, pointer: Point) -> Option<Handle> {
        if !self.is_complete() {
            return None;
        }
        if let SessionState::Dragging(active) = self.state {
            let p = self.point(active)?;
            if p.in_square(self.capture_size(active), pointer) {
                return Some(active);
            }
        }
        [PointSet::Clip, PointSet::Visibility]
            .into_iter()
            .flat_map(|set| (0..POINTS_PER_SET).map(move |index| Handle { set, index }))
            .find(|&h| {
                self.point(h)
                    .is_some_and(|p| p.in_square(self.config.drag_handle_size, pointer))
            })
    }

    /// Feed the pointer status of one handle for the current frame.
    ///
    /// `Down` inside the handle's area starts or continues a drag and moves
    /// the point to `pointer`, clamped to the frame (`frame_size`) or, with
    /// `limit_visibility`, to the visibility rectangle. `Out` on the dragged
    /// handle ends the drag and writes the record if anything moved. Returns
    /// whether the geometry changed.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn handle_pointer(
        &mut self,
        handle: Handle,
        status: PointerStatus,
        pointer: Point,
        frame_size: (usize, usize),
    ) -> bool {
        if !self.is_complete() {
            return false;
        }
        let Some(current) = self.point(handle) else {
            return false;
        };

        match status {
            PointerStatus::Over => {
                if self.state == SessionState::Dragging(handle) {
                    self.state = SessionState::Complete;
                }
                false
            }
            PointerStatus::Out => {
                match self.state {
                    SessionState::Dragging(active) if active != handle => return false,
                    SessionState::Dragging(_) => self.state = SessionState::Complete,
                    _ => {}
                }
                self.flush();
                false
            }
            PointerStatus::Down => {
                if !current.in_square(self.capture_size(handle), pointer) {
                    return false;
                }
                self.state = SessionState::Dragging(handle);

                let vis = self.visibility_rect;
                let bounds = if self.config.limit_visibility && !vis.is_empty() {
                    vis.expand()
                } else {
                    (0, 0, frame_size.0 as i32, frame_size.1 as i32)
                };
                let moved = clamp_pointer(current, pointer, bounds);
                if moved == current {
                    return false;
                }
                self.move_point(handle, moved);
                true
            }
        }
    }

    /// Replace a point and recompute; the record is written on [`Self::end_drag`]
    /// or when the pointer leaves the handle.
    pub fn move_point(&mut self, handle: Handle, to: Point) -> bool {
        let points = match handle.set {
            PointSet::Clip => &mut self.clip_points,
            PointSet::Visibility => &mut self.visibility_points,
        };
        let Some(slot) = points.get_mut(handle.index) else {
            return false;
        };
        *slot = to;
        self.recompute();
        self.dirty = true;
        true
    }

    /// Finish any drag and write pending changes.
    pub fn end_drag(&mut self) {
        if let SessionState::Dragging(_) = self.state {
            self.state = SessionState::Complete;
        }
        self.flush();
    }

    /// Write the record if a drag changed it.
    pub fn flush(&mut self) {
        if self.dirty {
            self.save();
            self.dirty = false;
        }
    }

    pub fn has_pending_changes(&self) -> bool {
        self.dirty
    }

    fn save(&self) {
        if let Err(err) = self.store.save(&self.clip_points, &self.visibility_points) {
            log::warn!(
                "cannot save calibration to {}: {}",
                self.store.path().display(),
                err
            );
        }
    }

    fn clear_derived(&mut self) {
        self.clip_rect = Rect::default();
        self.visibility_rect = Rect::default();
        self.visibility_mask = None;
        self.perspective = None;
        self.dirty = false;
    }

    /// Bounds, mask and perspective from the current point sets.
    fn recompute(&mut self) {
        self.clip_rect = bounding_rect(&self.clip_points);
        self.visibility_rect = bounding_rect(&self.visibility_points);
        self.visibility_mask = if self.visibility_rect.is_empty() {
            None
        } else if !self.within_extent(&self.visibility_rect) {
            log::warn!(
                "visibility rect {} exceeds {} px, mask disabled",
                self.visibility_rect,
                self.config.max_extent
            );
            None
        } else {
            Some(visibility_mask(&self.visibility_rect, &self.clip_points))
        };
        self.perspective = self.solve_perspective();
        log::info!(
            "recalculating calibration area: clip {} visibility {}",
            self.clip_rect,
            self.visibility_rect
        );
    }

    fn solve_perspective(&self) -> Option<Homography> {
        let corners: [Point; POINTS_PER_SET] = self.visibility_points.as_slice().try_into().ok()?;
        let sorted = sort_corners(corners);
        let vis = self.visibility_rect;
        let h = perspective_to_rect(&sorted, vis.width(), vis.height());
        if h.is_none() {
            log::warn!(
                "degenerate visibility corners {:?}, rectification disabled",
                sorted
            );
        }
        h
    }
}
