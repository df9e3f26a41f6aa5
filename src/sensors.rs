//! Device motion sensors
//!
//! The device attitude source is process-wide: one [`SensorHub`] wraps the
//! platform [`MotionProvider`] and hands out subscriptions. The provider runs
//! only while at least one subscription is alive; the first subscription
//! starts it and dropping the last one stops it.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::handoff::LatestSlot;
use crate::orientation::SensorSample;

/// Errors reported by a motion provider
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorError {
    #[error("Motion sensors unavailable: {0}")]
    Unavailable(String),
}

/// Platform attitude source (gyroscope / device motion driver)
pub trait MotionProvider: Send {
    /// Begin delivering samples through `publisher`
    fn start(&mut self, publisher: SamplePublisher) -> Result<(), SensorError>;

    /// Stop delivering samples. Must not return while a delivery is in flight.
    fn stop(&mut self);
}

struct Subscribers {
    slots: Mutex<Vec<(u64, Arc<LatestSlot<SensorSample>>)>>,
}

/// Handle the provider uses to deliver samples to every subscriber
#[derive(Clone)]
pub struct SamplePublisher {
    subscribers: Arc<Subscribers>,
}

impl SamplePublisher {
    /// Deliver a sample; each subscriber keeps only the newest one
    pub fn publish(&self, sample: SensorSample) {
        let slots = self.subscribers.slots.lock();
        for (_, slot) in slots.iter() {
            slot.publish(sample);
        }
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.slots.lock().len()
    }
}

/// Process-wide owner of the motion provider
pub struct SensorHub {
    subscribers: Arc<Subscribers>,
    provider: Mutex<Box<dyn MotionProvider>>,
    active: AtomicBool,
    next_id: AtomicU64,
}

impl SensorHub {
    /// Wrap a provider; it stays stopped until the first subscription
    pub fn new(provider: Box<dyn MotionProvider>) -> Arc<Self> {
        Arc::new(Self {
            subscribers: Arc::new(Subscribers {
                slots: Mutex::new(Vec::new()),
            }),
            provider: Mutex::new(provider),
            active: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        })
    }

    /// Subscribe to attitude samples, starting the provider if needed
    pub fn subscribe(self: &Arc<Self>) -> SensorSubscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let slot = Arc::new(LatestSlot::new());
        self.subscribers.slots.lock().push((id, Arc::clone(&slot)));

        let mut provider = self.provider.lock();
        if !self.active.load(Ordering::Acquire) {
            let publisher = SamplePublisher {
                subscribers: Arc::clone(&self.subscribers),
            };
            match provider.start(publisher) {
                Ok(()) => {
                    self.active.store(true, Ordering::Release);
                    tracing::info!("SensorHub: motion provider started");
                }
                // No samples will arrive; the fuser holds its last orientation
                Err(e) => tracing::warn!("SensorHub: {}", e),
            }
        }

        SensorSubscription {
            hub: Arc::clone(self),
            id,
            slot,
        }
    }

    fn unsubscribe(&self, id: u64) {
        self.subscribers.slots.lock().retain(|(slot_id, _)| *slot_id != id);

        let mut provider = self.provider.lock();
        if self.active.load(Ordering::Acquire) && self.subscribers.slots.lock().is_empty() {
            provider.stop();
            self.active.store(false, Ordering::Release);
            tracing::info!("SensorHub: motion provider stopped");
        }
    }

    /// Whether the provider is currently running
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.slots.lock().len()
    }
}

/// A live subscription; dropping it stops delivery to this subscriber
/// before returning
pub struct SensorSubscription {
    hub: Arc<SensorHub>,
    id: u64,
    slot: Arc<LatestSlot<SensorSample>>,
}

impl SensorSubscription {
    /// Take the newest sample since the previous call
    pub fn take_latest(&self) -> Option<SensorSample> {
        self.slot.take()
    }
}

impl Drop for SensorSubscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.id);
    }
}
