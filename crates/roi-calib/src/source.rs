//! Frame producers at the boundary of the calibrator.
//!
//! The calibrator itself never reads frames. Hosts pull frames through a
//! [`CameraAdapter`], which can be paused while the operator edits points and
//! resumes on [`CalibrationEvent::CalibrationDone`].

use crate::{CalibrationEvent, Calibrator, EventBus};
use roi_calib_core::Image;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::JoinHandle;

/// One frame plus an optional auxiliary plane (e.g. depth).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Captured {
    pub frame: Image,
    pub auxiliary: Option<Image>,
}

impl Captured {
    pub fn new(frame: Image) -> Self {
        Self {
            frame,
            auxiliary: None,
        }
    }
}

/// A camera, stream or file that yields frames.
pub trait FrameSource {
    /// Next frame, or `None` if capture failed or the stream ended.
    fn read(&mut self) -> Option<Captured>;

    fn width(&self) -> usize;

    fn height(&self) -> usize;

    fn channels(&self) -> usize {
        3
    }

    /// Stop capturing and free the device.
    fn release(&mut self) {}
}

/// Accepts pause/resume directives while the operator edits points.
pub trait PauseControl {
    fn set_paused(&mut self, paused: bool);

    fn is_paused(&self) -> bool;
}

/// A single still image served forever.
#[derive(Clone, Debug)]
pub struct SnapshotSource {
    frame: Image,
}

impl SnapshotSource {
    pub fn new(frame: Image) -> Self {
        Self { frame }
    }
}

impl FrameSource for SnapshotSource {
    fn read(&mut self) -> Option<Captured> {
        Some(Captured::new(self.frame.clone()))
    }

    fn width(&self) -> usize {
        self.frame.width
    }

    fn height(&self) -> usize {
        self.frame.height
    }

    fn channels(&self) -> usize {
        self.frame.channels
    }
}

/// Result of [`CameraAdapter::read`].
#[derive(Clone, Debug)]
pub struct FrameRead {
    pub success: bool,
    pub frame: Image,
    pub auxiliary: Option<Image>,
}

/// Wraps a [`FrameSource`] with pause handling and a background slot.
pub struct CameraAdapter<S> {
    source: S,
    frame: Option<Image>,
    auxiliary: Option<Image>,
    background: Option<Image>,
    background_requested: bool,
    paused: bool,
    still: bool,
    events: Option<Receiver<CalibrationEvent>>,
}

impl<S: FrameSource> CameraAdapter<S> {
    /// `still` sources are re-read every time, even while paused.
    pub fn new(source: S, still: bool) -> Self {
        Self {
            source,
            frame: None,
            auxiliary: None,
            background: None,
            background_requested: false,
            paused: false,
            still,
            events: None,
        }
    }

    /// Subscribe to the calibrator's notifications.
    pub fn attach(&mut self, bus: &mut EventBus) {
        self.events = Some(bus.subscribe());
    }

    pub fn handle_event(&mut self, event: CalibrationEvent) {
        match event {
            CalibrationEvent::CalibrationDone => self.paused = false,
            CalibrationEvent::SaveBackground => self.background_requested = true,
        }
    }

    /// A [`CalibrationEvent::SaveBackground`] arrived and has not been served
    /// by [`Self::store_background`] yet.
    pub fn background_requested(&self) -> bool {
        self.background_requested
    }

    /// Keep the current frame, clipped by `calibrator`, as background.
    ///
    /// Clears any pending request. Returns `None` before the first frame.
    pub fn store_background(&mut self, calibrator: &Calibrator) -> Option<&Image> {
        self.background_requested = false;
        let clipped = calibrator.clip(&self.frame.as_ref()?.view());
        log::info!("background stored, {}x{}", clipped.width, clipped.height);
        self.background = Some(clipped);
        self.background.as_ref()
    }

    fn drain_events(&mut self) {
        let pending: Vec<CalibrationEvent> = match &self.events {
            Some(rx) => rx.try_iter().collect(),
            None => return,
        };
        for event in pending {
            self.handle_event(event);
        }
    }

    fn blank(&self) -> Image {
        Image::zeros(
            self.source.width(),
            self.source.height(),
            self.source.channels(),
        )
    }

    /// Next frame for processing.
    ///
    /// While paused the last frame is repeated. Without any frame a blank
    /// image of the source size is returned with `success == false`.
    pub fn read(&mut self) -> FrameRead {
        self.drain_events();

        if self.still {
            let success = match self.source.read() {
                Some(captured) => {
                    self.frame = Some(captured.frame);
                    self.auxiliary = captured.auxiliary;
                    true
                }
                None => false,
            };
            let frame = self.frame.clone().unwrap_or_else(|| self.blank());
            return FrameRead {
                success,
                frame,
                auxiliary: None,
            };
        }

        if !self.paused {
            let captured = self.source.read();
            self.auxiliary = captured.as_ref().and_then(|c| c.auxiliary.clone());
            self.frame = captured.map(|c| c.frame);
        }

        match &self.frame {
            Some(frame) => FrameRead {
                success: true,
                frame: frame.clone(),
                auxiliary: self.auxiliary.clone(),
            },
            None => FrameRead {
                success: false,
                frame: self.blank(),
                auxiliary: None,
            },
        }
    }

    /// The stored background, or the latest raw frame if none was stored.
    pub fn background(&self) -> Option<&Image> {
        self.background.as_ref().or(self.frame.as_ref())
    }

    pub fn width(&self) -> usize {
        self.source.width()
    }

    pub fn height(&self) -> usize {
        self.source.height()
    }

    pub fn release(&mut self) {
        self.source.release();
    }
}

impl<S> PauseControl for CameraAdapter<S> {
    fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }
}

#[derive(Debug)]
struct Slot<T> {
    value: Option<T>,
    closed: bool,
}

/// Single-slot hand-off between a capture thread and a consumer.
///
/// Publishing overwrites any value not yet taken; nothing is ever queued.
#[derive(Debug)]
pub struct LatestFrame<T> {
    shared: Arc<(Mutex<Slot<T>>, Condvar)>,
}

impl<T> Clone for LatestFrame<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Default for LatestFrame<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LatestFrame<T> {
    pub fn new() -> Self {
        Self {
            shared: Arc::new((
                Mutex::new(Slot {
                    value: None,
                    closed: false,
                }),
                Condvar::new(),
            )),
        }
    }

    /// Store `value`; returns true if an untaken value was discarded.
    pub fn publish(&self, value: T) -> bool {
        let (lock, cvar) = &*self.shared;
        let mut slot = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let dropped = slot.value.replace(value).is_some();
        cvar.notify_one();
        dropped
    }

    /// Take the value if one is waiting.
    pub fn take(&self) -> Option<T> {
        let (lock, _) = &*self.shared;
        lock.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .value
            .take()
    }

    /// Wait for a value. `None` once closed and drained.
    pub fn take_blocking(&self) -> Option<T> {
        let (lock, cvar) = &*self.shared;
        let mut slot = lock.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(value) = slot.value.take() {
                return Some(value);
            }
            if slot.closed {
                return None;
            }
            slot = cvar.wait(slot).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Wake waiters; later `take_blocking` calls return once the slot drains.
    pub fn close(&self) {
        let (lock, cvar) = &*self.shared;
        lock.lock().unwrap_or_else(PoisonError::into_inner).closed = true;
        cvar.notify_all();
    }
}

/// Runs a [`FrameSource`] on its own capture thread and serves the most
/// recent frame.
pub struct BufferedSource {
    buffer: LatestFrame<Captured>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    width: usize,
    height: usize,
    channels: usize,
}

impl BufferedSource {
    pub fn spawn<S>(mut source: S) -> Self
    where
        S: FrameSource + Send + 'static,
    {
        let (width, height, channels) = (source.width(), source.height(), source.channels());
        let buffer = LatestFrame::new();
        let stop = Arc::new(AtomicBool::new(false));

        let worker = {
            let buffer = buffer.clone();
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                let mut dropped = 0usize;
                while !stop.load(Ordering::Relaxed) {
                    match source.read() {
                        Some(captured) => {
                            if buffer.publish(captured) {
                                dropped += 1;
                            }
                        }
                        None => break,
                    }
                }
                log::debug!("capture thread finished, {} stale frames dropped", dropped);
                buffer.close();
                source.release();
            })
        };

        Self {
            buffer,
            stop,
            worker: Some(worker),
            width,
            height,
            channels,
        }
    }
}

impl FrameSource for BufferedSource {
    fn read(&mut self) -> Option<Captured> {
        self.buffer.take_blocking()
    }

    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn release(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("capture thread panicked");
            }
        }
        self.buffer.close();
    }
}

impl Drop for BufferedSource {
    fn drop(&mut self) {
        self.release();
    }
}
