//! Typed publish/subscribe for calibration notifications.

use std::sync::mpsc::{self, Receiver, Sender};

/// Notifications published by the calibrator and its host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CalibrationEvent {
    /// All four points were placed and the derived geometry is ready.
    CalibrationDone,
    /// The host asked for the current frame to be kept as background.
    SaveBackground,
}

type Handler = Box<dyn FnMut(CalibrationEvent)>;

/// Fan-out of [`CalibrationEvent`]s to closures and channel subscribers.
#[derive(Default)]
pub struct EventBus {
    handlers: Vec<Handler>,
    subscribers: Vec<Sender<CalibrationEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `handler` synchronously on every emitted event.
    pub fn on(&mut self, handler: impl FnMut(CalibrationEvent) + 'static) {
        self.handlers.push(Box::new(handler));
    }

    /// Queue every emitted event on a fresh channel.
    ///
    /// Dropping the receiver unsubscribes on the next emit.
    pub fn subscribe(&mut self) -> Receiver<CalibrationEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn emit(&mut self, event: CalibrationEvent) {
        log::debug!("emit {:?}", event);
        for handler in &mut self.handlers {
            handler(event);
        }
        self.subscribers.retain(|tx| tx.send(event).is_ok());
    }

    pub fn listener_count(&self) -> usize {
        self.handlers.len() + self.subscribers.len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.handlers.len())
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
