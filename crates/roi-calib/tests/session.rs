use roi_calib::core::{Image, Point, Rect};
use roi_calib::{
    CalibrationEvent, CalibrationStore, Calibrator, CalibratorConfig, CameraAdapter, Handle,
    PauseControl, PipelineError, PointSlot, PointerStatus, SessionState, SnapshotSource,
};
use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

const SQUARE: [(i32, i32); 4] = [(10, 10), (110, 10), (110, 110), (10, 110)];
const FRAME: (usize, usize) = (200, 150);

fn pts(raw: &[(i32, i32)]) -> Vec<Point> {
    raw.iter().map(|&(x, y)| Point::new(x, y)).collect()
}

fn calibrator_in(dir: &Path) -> Calibrator {
    Calibrator::new(CalibratorConfig::in_dir(dir))
}

fn place(calibrator: &mut Calibrator, clicks: &[(i32, i32)]) {
    calibrator.start_editing();
    for &(x, y) in clicks {
        calibrator.click(Point::new(x, y));
    }
}

/// RGB frame where pixel (x, y) is (x, y, 7).
fn coordinate_frame(width: usize, height: usize) -> Image {
    let mut data = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        for x in 0..width {
            data.extend_from_slice(&[x as u8, y as u8, 7]);
        }
    }
    Image::new(width, height, 3, data).expect("valid frame")
}

fn assert_matrix_close(a: [[f64; 3]; 3], b: [[f64; 3]; 3]) {
    for r in 0..3 {
        for c in 0..3 {
            assert!((a[r][c] - b[r][c]).abs() < 1e-6, "{:?} != {:?}", a, b);
        }
    }
}

#[test]
fn clockwise_clicks_give_translation_only_transform() {
    let dir = tempfile::tempdir().unwrap();
    let mut cal = calibrator_in(dir.path());
    place(&mut cal, &SQUARE);

    assert_eq!(cal.state(), SessionState::Complete);
    assert_eq!(cal.clip_rect(), Rect::new(10, 10, 100, 100));
    assert_eq!(cal.visibility_rect(), Rect::new(10, 10, 100, 100));
    assert_eq!(cal.clip_size(), [100, 100]);
    assert_eq!(cal.clip_area(), 10_000);

    let h = cal.perspective().expect("transform").to_array();
    assert_matrix_close(h, [[1.0, 0.0, -10.0], [0.0, 1.0, -10.0], [0.0, 0.0, 1.0]]);

    let mask = cal.visibility_mask().expect("mask");
    assert_eq!((mask.width, mask.height), (100, 100));
    assert_eq!(mask.count_nonzero(), 100 * 100);
}

#[test]
fn reversed_clicks_give_the_same_transform() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let mut forward = calibrator_in(dir_a.path());
    let mut reversed = calibrator_in(dir_b.path());
    place(&mut forward, &SQUARE);
    place(&mut reversed, &[(110, 110), (110, 10), (10, 10), (10, 110)]);

    assert_eq!(reversed.clip_rect(), forward.clip_rect());
    assert_matrix_close(
        reversed.perspective().unwrap().to_array(),
        forward.perspective().unwrap().to_array(),
    );
    // clicks are stored in click order, not corner order
    assert_eq!(reversed.clip_points()[0], Point::new(110, 110));
}

#[test]
fn short_record_loads_as_present_but_degenerate() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = CalibratorConfig::in_dir(dir.path());
    fs::write(cfg.calibration_path(), "10 10\n110 10\n110 110\n10 110\n").unwrap();

    let cal = Calibrator::new(cfg);
    assert!(cal.is_complete());
    assert_eq!(cal.clip_points(), pts(&SQUARE).as_slice());
    assert_eq!(cal.visibility_points(), vec![Point::default(); 4].as_slice());
    assert_eq!(cal.clip_rect(), Rect::new(10, 10, 100, 100));
    assert!(cal.visibility_rect().is_empty());
    assert!(cal.perspective().is_none());
    assert!(cal.visibility_mask().is_none());

    let record = cal.loaded_record().expect("record");
    assert_eq!(record.defaulted_slots(), 4);
    assert!(record.visibility.iter().all(|s| *s == PointSlot::Defaulted));

    let frame = coordinate_frame(FRAME.0, FRAME.1);
    assert!(matches!(
        cal.rectify(&frame.view()),
        Err(PipelineError::NoTransform)
    ));
    let clipped = cal.clip(&frame.view());
    assert_eq!((clipped.width, clipped.height), (100, 100));
}

#[test]
fn record_with_no_valid_points_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = CalibratorConfig::in_dir(dir.path());
    fs::write(cfg.calibration_path(), "garbage\n").unwrap();

    let cal = Calibrator::new(cfg);
    assert_eq!(cal.state(), SessionState::Idle);
    assert!(cal.clip_points().is_empty());
    assert_eq!(cal.loaded_record().unwrap().defaulted_slots(), 8);
}

#[test]
fn record_with_overflowing_coordinates_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = CalibratorConfig::in_dir(dir.path());
    let corrupt = "-2000000000 0\n2000000000 0\n2000000000 10\n-2000000000 10\n".repeat(2);
    fs::write(cfg.calibration_path(), corrupt).unwrap();

    let cal = Calibrator::new(cfg);
    assert_eq!(cal.state(), SessionState::Idle);
    assert!(cal.clip_points().is_empty());
    assert!(cal.visibility_mask().is_none());
    assert_eq!(cal.loaded_record().unwrap().defaulted_slots(), 0);
}

#[test]
fn record_wider_than_max_extent_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = CalibratorConfig::in_dir(dir.path());
    cfg.max_extent = 50;
    fs::write(cfg.calibration_path(), "10 10\n110 10\n110 110\n10 110\n".repeat(2)).unwrap();

    let cal = Calibrator::new(cfg);
    assert_eq!(cal.state(), SessionState::Idle);
    assert!(cal.clip_rect().is_empty());
}

#[test]
fn completion_persists_and_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("cam").join("front");
    let clicks = [(30, 20), (160, 25), (170, 130), (20, 120)];
    {
        let mut cal = calibrator_in(&nested);
        place(&mut cal, &clicks);
    }

    let text = fs::read_to_string(nested.join("calibration.txt")).unwrap();
    assert_eq!(text.lines().count(), 8);
    assert_eq!(text.lines().next(), Some("30 20"));

    let reloaded = calibrator_in(&nested);
    assert_eq!(reloaded.state(), SessionState::Complete);
    assert_eq!(reloaded.clip_points(), pts(&clicks).as_slice());
    assert_eq!(reloaded.visibility_points(), pts(&clicks).as_slice());
    assert!(reloaded.loaded_record().unwrap().is_complete());
    assert!(reloaded.perspective().is_some());
}

#[test]
fn store_round_trips_eight_points() {
    let dir = tempfile::tempdir().unwrap();
    let store = CalibrationStore::new(dir.path().join("a/b/calibration.txt"));
    let clip = pts(&[(0, 0), (640, 0), (640, 480), (0, 480)]);
    let vis = pts(&[(12, 7), (600, 3), (633, 470), (2, 455)]);
    store.save(&clip, &vis).unwrap();
    store.save(&vis, &clip).unwrap();

    let record = store.load().unwrap().expect("exists");
    assert!(record.is_complete());
    assert_eq!(record.clip_points(), vis);
    assert_eq!(record.visibility_points(), clip);

    let missing = CalibrationStore::new(dir.path().join("nope.txt"));
    assert!(missing.load().unwrap().is_none());
}

#[test]
fn partial_clicks_never_produce_geometry() {
    let dir = tempfile::tempdir().unwrap();
    let mut cal = calibrator_in(dir.path());
    place(&mut cal, &SQUARE[..3]);

    assert_eq!(cal.state(), SessionState::Editing);
    assert!(!cal.is_complete());
    assert!(cal.perspective().is_none());
    assert!(cal.visibility_mask().is_none());
    assert!(!dir.path().join("calibration.txt").exists());

    let frame = coordinate_frame(FRAME.0, FRAME.1);
    let out = cal.process(&frame.view());
    assert_eq!(out.clipped, frame);
    assert!(out.rectified.is_none());
    assert!(out.masked.is_none());
}

#[test]
fn clicks_outside_edit_mode_or_past_four_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let mut cal = calibrator_in(dir.path());
    assert!(!cal.click(Point::new(1, 1)));

    place(&mut cal, &SQUARE);
    assert!(!cal.click(Point::new(5, 5)));
    assert_eq!(cal.clip_points().len(), 4);
}

#[test]
fn second_start_editing_toggles_out_and_keeps_partial_points() {
    let dir = tempfile::tempdir().unwrap();
    let mut cal = calibrator_in(dir.path());
    let mut cam = CameraAdapter::new(SnapshotSource::new(Image::zeros(4, 4, 3)), false);

    cal.start_editing_with(&mut cam);
    assert!(cam.is_paused());
    cal.click(Point::new(10, 10));
    cal.click(Point::new(110, 10));

    cal.start_editing_with(&mut cam);
    assert_eq!(cal.state(), SessionState::Idle);
    assert!(!cam.is_paused());
    assert_eq!(cal.clip_points().len(), 2);

    cal.start_editing_with(&mut cam);
    cal.click(Point::new(110, 110));
    cal.click(Point::new(10, 110));
    assert_eq!(cal.state(), SessionState::Complete);
    assert_eq!(cal.clip_rect(), Rect::new(10, 10, 100, 100));
}

#[test]
fn re_editing_a_complete_calibration_starts_over() {
    let dir = tempfile::tempdir().unwrap();
    let mut cal = calibrator_in(dir.path());
    place(&mut cal, &SQUARE);

    cal.start_editing();
    assert!(cal.is_editing());
    assert!(cal.clip_points().is_empty());
    assert!(cal.visibility_points().is_empty());
    assert!(cal.perspective().is_none());
    assert!(cal.clip_rect().is_empty());
}

#[test]
fn completion_notifies_and_resumes_camera() {
    let dir = tempfile::tempdir().unwrap();
    let mut cal = calibrator_in(dir.path());
    let mut cam = CameraAdapter::new(SnapshotSource::new(Image::zeros(4, 4, 3)), false);
    cam.attach(cal.events_mut());

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    cal.events_mut().on(move |e| sink.borrow_mut().push(e));

    cal.start_editing_with(&mut cam);
    for &(x, y) in &SQUARE {
        cal.click(Point::new(x, y));
    }
    assert_eq!(*seen.borrow(), vec![CalibrationEvent::CalibrationDone]);

    assert!(cam.is_paused());
    assert!(cam.read().success);
    assert!(!cam.is_paused());
}

#[test]
fn dragging_recomputes_live_and_saves_on_release() {
    let dir = tempfile::tempdir().unwrap();
    let mut cal = calibrator_in(dir.path());
    place(&mut cal, &SQUARE);
    let path = dir.path().join("calibration.txt");
    let before = fs::read_to_string(&path).unwrap();

    let corner = Handle::clip(2);
    assert_eq!(cal.handle_at(Point::new(112, 108)), Some(corner));

    assert!(cal.handle_pointer(corner, PointerStatus::Down, Point::new(115, 105), FRAME));
    assert_eq!(cal.state(), SessionState::Dragging(corner));
    assert_eq!(cal.clip_rect(), Rect::new(10, 10, 105, 100));
    assert!(cal.has_pending_changes());

    // a move beyond the idle handle size is still captured while dragging
    assert!(cal.handle_pointer(corner, PointerStatus::Down, Point::new(150, 120), FRAME));
    assert_eq!(cal.point(corner), Some(Point::new(150, 120)));
    assert_eq!(fs::read_to_string(&path).unwrap(), before);

    // other handles reporting Out do not end the drag
    assert!(!cal.handle_pointer(Handle::clip(0), PointerStatus::Out, Point::new(150, 120), FRAME));
    assert_eq!(cal.state(), SessionState::Dragging(corner));
    assert_eq!(fs::read_to_string(&path).unwrap(), before);

    cal.handle_pointer(corner, PointerStatus::Out, Point::new(400, 400), FRAME);
    assert_eq!(cal.state(), SessionState::Complete);
    assert!(!cal.has_pending_changes());
    let after = fs::read_to_string(&path).unwrap();
    assert_eq!(after.lines().nth(2), Some("150 120"));
    // visibility points are independent of clip drags
    assert_eq!(after.lines().nth(6), Some("110 110"));
    assert_eq!(cal.visibility_rect(), Rect::new(10, 10, 100, 100));
}

#[test]
fn dragging_a_visibility_corner_changes_the_transform() {
    let dir = tempfile::tempdir().unwrap();
    let mut cal = calibrator_in(dir.path());
    place(&mut cal, &SQUARE);
    let before = *cal.perspective().unwrap();

    let handle = Handle::visibility(1);
    assert!(cal.handle_pointer(handle, PointerStatus::Down, Point::new(118, 4), FRAME));
    cal.end_drag();

    assert_eq!(cal.visibility_rect(), Rect::new(10, 4, 108, 106));
    let after = cal.perspective().expect("still solvable");
    assert_ne!(after, &before);

    let moved = cal.visibility_points()[1];
    let mapped = after.apply(moved.to_f32());
    assert!((mapped.x - 108.0).abs() < 1e-3 && mapped.y.abs() < 1e-3);
}

#[test]
fn drag_outside_handle_or_frame_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut cal = calibrator_in(dir.path());
    place(&mut cal, &SQUARE);

    // pointer far from the handle: no drag starts
    assert!(!cal.handle_pointer(Handle::clip(0), PointerStatus::Down, Point::new(60, 60), FRAME));
    assert_eq!(cal.state(), SessionState::Complete);

    // x outside the frame keeps the old x
    let corner = Handle::clip(1);
    cal.handle_pointer(corner, PointerStatus::Down, Point::new(105, 5), FRAME);
    cal.handle_pointer(corner, PointerStatus::Down, Point::new(250, 8), FRAME);
    assert_eq!(cal.point(corner), Some(Point::new(105, 8)));
}

#[test]
fn limit_visibility_clamps_to_visibility_rect() {
    let dir = tempfile::tempdir().unwrap();
    let mut cal = calibrator_in(dir.path());
    cal.set_limit_visibility(true);
    place(&mut cal, &SQUARE);

    let corner = Handle::clip(0);
    cal.handle_pointer(corner, PointerStatus::Down, Point::new(15, 15), FRAME);
    assert_eq!(cal.point(corner), Some(Point::new(15, 15)));
    // (5, 20) leaves the visibility rect on x only
    cal.handle_pointer(corner, PointerStatus::Down, Point::new(5, 20), FRAME);
    assert_eq!(cal.point(corner), Some(Point::new(15, 20)));
}

#[test]
fn pipeline_clips_rectifies_and_masks() {
    let dir = tempfile::tempdir().unwrap();
    let mut cal = calibrator_in(dir.path());
    place(&mut cal, &[(20, 30), (120, 30), (120, 90), (20, 90)]);
    let frame = coordinate_frame(FRAME.0, FRAME.1);

    let out = cal.process(&frame.view());
    assert_eq!((out.clipped.width, out.clipped.height), (100, 60));
    assert_eq!(out.clipped.pixel(0, 0), &[20, 30, 7]);

    let rectified = out.rectified.expect("rectified");
    assert_eq!((rectified.width, rectified.height), (100, 60));
    assert_eq!(rectified.pixel(5, 4), &[25, 34, 7]);

    let masked = out.masked.expect("masked");
    assert_eq!(masked, rectified);
}

#[test]
fn mask_blanks_outside_a_narrowed_clip_polygon() {
    let dir = tempfile::tempdir().unwrap();
    let mut cal = calibrator_in(dir.path());
    place(&mut cal, &SQUARE);
    // pull the top-left clip corner inwards; visibility stays on the square
    cal.move_point(Handle::clip(0), Point::new(60, 60));
    cal.end_drag();

    let frame = coordinate_frame(FRAME.0, FRAME.1);
    let rectified = cal.rectify(&frame.view()).unwrap();
    let masked = cal.mask(&rectified.view()).unwrap();
    assert_eq!(masked.pixel(2, 2), &[0, 0, 0]);
    assert_eq!(masked.pixel(95, 95), rectified.pixel(95, 95));
}

#[test]
fn clip_falls_back_when_rect_leaves_the_frame() {
    let dir = tempfile::tempdir().unwrap();
    let mut cal = calibrator_in(dir.path());
    place(&mut cal, &SQUARE);

    let small = coordinate_frame(50, 50);
    let clipped = cal.clip(&small.view());
    assert_eq!(clipped, small);
}

#[test]
fn degenerate_quad_disables_rectification_only() {
    let dir = tempfile::tempdir().unwrap();
    let mut cal = calibrator_in(dir.path());
    place(&mut cal, &[(10, 10), (60, 10), (110, 10), (10, 110)]);

    assert!(cal.is_complete());
    assert!(cal.perspective().is_none());
    assert_eq!(cal.clip_rect(), Rect::new(10, 10, 100, 100));

    let frame = coordinate_frame(FRAME.0, FRAME.1);
    let out = cal.process(&frame.view());
    assert_eq!((out.clipped.width, out.clipped.height), (100, 100));
    assert!(out.rectified.is_none());
    assert!(out.masked.is_none());
}

#[test]
fn normalized_coordinates_use_clip_extent() {
    let dir = tempfile::tempdir().unwrap();
    let mut cal = calibrator_in(dir.path());
    assert!(cal.normalize_clipped(5.0, 5.0).is_none());
    place(&mut cal, &[(0, 0), (200, 0), (200, 100), (0, 100)]);
    assert_eq!(cal.normalize_clipped(50.0, 25.0), Some((0.25, 0.25)));
}
