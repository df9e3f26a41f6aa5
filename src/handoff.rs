//! Non-blocking hand-off between producer threads and the update thread
//!
//! Sensor drivers, input handlers and media decoders run on their own
//! threads. They never block on the update thread: sensor samples overwrite a
//! single slot, gestures accumulate until drained, and media events go to a
//! per-session mailbox that is closed on teardown.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;

use crate::orientation::GestureDelta;
use crate::playback::MediaEvent;

/// Capacity for discrete (non-progress) media events per session
pub const MEDIA_EVENT_CAPACITY: usize = 64;

/// Single-slot "latest value" cell; newer values overwrite unread older ones
pub struct LatestSlot<T> {
    value: Mutex<Option<T>>,
    /// Whether a value is waiting for pickup
    fresh: AtomicBool,
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LatestSlot<T> {
    pub fn new() -> Self {
        Self {
            value: Mutex::new(None),
            fresh: AtomicBool::new(false),
        }
    }

    /// Store a value, replacing any unread one.
    ///
    /// Returns true if an unread value was overwritten.
    pub fn publish(&self, value: T) -> bool {
        let mut slot = self.value.lock();
        let replaced = slot.replace(value).is_some();
        self.fresh.store(true, Ordering::Release);
        replaced
    }

    /// Take the latest value if one arrived since the last take
    pub fn take(&self) -> Option<T> {
        if self.fresh.swap(false, Ordering::AcqRel) {
            return self.value.lock().take();
        }
        None
    }

    /// Check if a value is waiting (without taking it)
    pub fn has_value(&self) -> bool {
        self.fresh.load(Ordering::Acquire)
    }

    /// Discard any unread value
    pub fn clear(&self) {
        self.fresh.store(false, Ordering::Release);
        self.value.lock().take();
    }
}

/// Gesture deltas accumulated between ticks
#[derive(Default)]
pub struct GestureAccumulator {
    pending: Mutex<GestureDelta>,
}

impl GestureAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a delta into the pending total
    pub fn push(&self, delta: GestureDelta) {
        self.pending.lock().accumulate(delta);
    }

    /// Read and reset the pending total in one step
    pub fn drain(&self) -> GestureDelta {
        std::mem::replace(&mut *self.pending.lock(), GestureDelta::NONE)
    }
}

/// Cloneable handle for the input thread to report gestures
#[derive(Clone, Default)]
pub struct GestureInput {
    accumulator: Arc<GestureAccumulator>,
}

impl GestureInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a pan in points
    pub fn pan(&self, dx: f32, dy: f32) {
        self.accumulator.push(GestureDelta::pan(dx, dy));
    }

    /// Report an incremental pinch scale
    pub fn pinch(&self, scale: f32) {
        self.accumulator.push(GestureDelta::pinch(scale));
    }

    pub fn push(&self, delta: GestureDelta) {
        self.accumulator.push(delta);
    }

    /// Drain everything reported since the previous drain
    pub fn drain(&self) -> GestureDelta {
        self.accumulator.drain()
    }
}

/// Media events for one source session
///
/// Progress updates are coalesced to the latest value; other events keep
/// their order in a bounded queue. End and failure events are never lost:
/// if the queue is full they are latched and delivered after it. Once
/// closed, sends are dropped.
pub struct MediaMailbox {
    open: AtomicBool,
    progress: LatestSlot<MediaEvent>,
    /// `ReachedEnd` that did not fit in the queue
    overflow_end: LatestSlot<MediaEvent>,
    /// `DecodeFailed` that did not fit in the queue
    overflow_failure: LatestSlot<MediaEvent>,
    sender: Sender<MediaEvent>,
    receiver: Receiver<MediaEvent>,
    dropped: AtomicU64,
}

impl MediaMailbox {
    /// Create an open mailbox
    pub fn new() -> Arc<Self> {
        Self::with_capacity(MEDIA_EVENT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Arc<Self> {
        let (sender, receiver) = bounded(capacity.max(1));
        Arc::new(Self {
            open: AtomicBool::new(true),
            progress: LatestSlot::new(),
            overflow_end: LatestSlot::new(),
            overflow_failure: LatestSlot::new(),
            sender,
            receiver,
            dropped: AtomicU64::new(0),
        })
    }

    /// Handle for the media pipeline
    pub fn sender(self: &Arc<Self>) -> MediaEventSender {
        MediaEventSender {
            mailbox: Arc::clone(self),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Number of buffering/readiness/duration events dropped because the queue was full
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn deliver(&self, event: MediaEvent) -> bool {
        if !self.is_open() {
            return false;
        }
        if event.is_progress() {
            self.progress.publish(event);
            return true;
        }
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event @ MediaEvent::ReachedEnd)) => {
                tracing::debug!("MediaMailbox: queue full, latching end");
                self.overflow_end.publish(event);
                true
            }
            Err(TrySendError::Full(event @ MediaEvent::DecodeFailed(_))) => {
                tracing::debug!("MediaMailbox: queue full, latching failure");
                self.overflow_failure.publish(event);
                true
            }
            Err(TrySendError::Full(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("MediaMailbox: queue full, dropping {:?}", event);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Take every pending event: queued events in order, then the latest
    /// progress, then any latched end or failure
    pub fn drain(&self) -> Vec<MediaEvent> {
        if !self.is_open() {
            return Vec::new();
        }
        let mut events: Vec<MediaEvent> = self.receiver.try_iter().collect();
        events.extend(self.progress.take());
        events.extend(self.overflow_end.take());
        events.extend(self.overflow_failure.take());
        events
    }

    /// Stop accepting events and discard anything pending
    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
        while self.receiver.try_recv().is_ok() {}
        self.progress.clear();
        self.overflow_end.clear();
        self.overflow_failure.clear();
    }
}

/// Sending side of a [`MediaMailbox`], held by the media pipeline
#[derive(Clone)]
pub struct MediaEventSender {
    mailbox: Arc<MediaMailbox>,
}

impl MediaEventSender {
    /// Deliver an event without blocking.
    ///
    /// Returns false if the session was torn down or the queue is full.
    pub fn send(&self, event: MediaEvent) -> bool {
        self.mailbox.deliver(event)
    }

    /// Whether the receiving session is still alive
    pub fn is_open(&self) -> bool {
        self.mailbox.is_open()
    }
}
