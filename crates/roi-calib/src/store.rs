//! Plain-text persistence of the eight calibration points.
//!
//! The record is eight `"<x> <y>\n"` lines: four clip points in click order,
//! then four visibility points in click order. Loading is lenient: a missing
//! or malformed line becomes a [`PointSlot::Defaulted`] slot instead of an
//! error.

use crate::{CalibratorConfig, StoreError};
use roi_calib_core::Point;
use serde::Serialize;
use std::{
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
};

/// Points per set in the record.
pub const POINTS_PER_SET: usize = 4;

/// One slot of a loaded record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PointSlot {
    /// Parsed from a well-formed line.
    Present(Point),
    /// Line was missing or malformed; reads as `(0, 0)`.
    Defaulted,
}

impl PointSlot {
    pub fn point(self) -> Point {
        match self {
            PointSlot::Present(p) => p,
            PointSlot::Defaulted => Point::default(),
        }
    }

    pub fn is_present(self) -> bool {
        matches!(self, PointSlot::Present(_))
    }
}

/// A record as read back from disk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CalibrationRecord {
    pub clip: [PointSlot; POINTS_PER_SET],
    pub visibility: [PointSlot; POINTS_PER_SET],
}

impl CalibrationRecord {
    pub fn clip_points(&self) -> Vec<Point> {
        self.clip.iter().map(|s| s.point()).collect()
    }

    pub fn visibility_points(&self) -> Vec<Point> {
        self.visibility.iter().map(|s| s.point()).collect()
    }

    /// Number of slots that fell back to `(0, 0)`.
    pub fn defaulted_slots(&self) -> usize {
        self.clip
            .iter()
            .chain(self.visibility.iter())
            .filter(|s| !s.is_present())
            .count()
    }

    /// Every slot was parsed from a well-formed line.
    pub fn is_complete(&self) -> bool {
        self.defaulted_slots() == 0
    }
}

fn parse_line(line: Option<&str>) -> PointSlot {
    let Some(line) = line else {
        return PointSlot::Defaulted;
    };
    let tokens: Vec<&str> = line.split_whitespace().collect();
    match tokens.as_slice() {
        [x, y] => match (x.parse::<i32>(), y.parse::<i32>()) {
            (Ok(x), Ok(y)) => PointSlot::Present(Point::new(x, y)),
            _ => PointSlot::Defaulted,
        },
        _ => PointSlot::Defaulted,
    }
}

/// Parse the text of a calibration record. Never fails.
pub fn parse_record(text: &str) -> CalibrationRecord {
    let mut lines = text.lines();
    let mut read_set = || -> [PointSlot; POINTS_PER_SET] {
        std::array::from_fn(|_| parse_line(lines.next()))
    };
    let clip = read_set();
    let visibility = read_set();
    CalibrationRecord { clip, visibility }
}

/// Render the eight-line record text.
pub fn format_record(clip: &[Point], visibility: &[Point]) -> Result<String, StoreError> {
    if clip.len() != POINTS_PER_SET || visibility.len() != POINTS_PER_SET {
        return Err(StoreError::IncompleteRecord {
            clip: clip.len(),
            visibility: visibility.len(),
        });
    }
    let mut out = String::new();
    for p in clip.iter().chain(visibility.iter()) {
        let _ = writeln!(out, "{} {}", p.x, p.y);
    }
    Ok(out)
}

/// Reads and writes the record at a fixed path.
#[derive(Clone, Debug)]
pub struct CalibrationStore {
    path: PathBuf,
}

impl CalibrationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_config(config: &CalibratorConfig) -> Self {
        Self::new(config.calibration_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the record, creating parent directories as needed.
    pub fn save(&self, clip: &[Point], visibility: &[Point]) -> Result<(), StoreError> {
        let text = format_record(clip, visibility)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, text)?;
        log::debug!("saved calibration to {}", self.path.display());
        Ok(())
    }

    /// Read the record. `Ok(None)` when no record exists yet.
    pub fn load(&self) -> Result<Option<CalibrationRecord>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        // undecodable bytes only spoil the line they sit on
        let bytes = fs::read(&self.path)?;
        let record = parse_record(&String::from_utf8_lossy(&bytes));
        let defaulted = record.defaulted_slots();
        if defaulted > 0 {
            log::warn!(
                "{}: {} of 8 calibration slots missing or malformed, using (0, 0)",
                self.path.display(),
                defaulted
            );
        }
        Ok(Some(record))
    }
}
