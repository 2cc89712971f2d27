//! Logging & Status Reporting (C12): a lock-free SPSC ring carrying
//! `(category, message)` pairs from any thread — including the real-time
//! audio thread, which must never allocate or format a string on its own
//! stack into the `log` facade directly — to a single status-consumer
//! thread. That thread is the only one that calls into `log` on the RT
//! thread's behalf, and forwards to `/engine/error` when a control server
//! is active.

use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bbx_core::{Consumer, Producer, SpscRingBuffer};
use log::{debug, error, info, warn};

/// Coarse classification of a [`StatusEvent`], matching §7's error taxonomy
/// at the level the facade reports it (not every `ConfigError`/`NetError`
/// variant, just which subsystem and how severe).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCategory {
    Config,
    Device,
    NodeRuntime,
    Transient,
    Control,
    Transport,
    Info,
}

impl StatusCategory {
    fn as_str(&self) -> &'static str {
        match self {
            StatusCategory::Config => "config",
            StatusCategory::Device => "device",
            StatusCategory::NodeRuntime => "node",
            StatusCategory::Transient => "transient",
            StatusCategory::Control => "control",
            StatusCategory::Transport => "transport",
            StatusCategory::Info => "info",
        }
    }
}

/// One posted status event: a category, a message, and the time it was
/// posted (not when it's drained — the RT thread's post must stay
/// allocation-free beyond the `String`'s own buffer, which the caller
/// already owns).
#[derive(Debug, Clone)]
pub struct StatusEvent {
    pub category: StatusCategory,
    pub message: String,
    pub posted_at: Duration,
}

impl StatusEvent {
    pub fn new(category: StatusCategory, message: impl Into<String>) -> Self {
        Self { category, message: message.into(), posted_at: SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default() }
    }
}

/// A subscriber callback invoked once per drained event, on the status
/// thread (never on the RT thread).
pub type StatusSubscriber = Box<dyn Fn(&StatusEvent) + Send>;

/// Producer handle cloned into every thread (including the RT callback)
/// that needs to report a status event. `post` never blocks: on ring
/// overflow (the status thread fell behind), the event is dropped rather
/// than stalling the caller.
#[derive(Clone)]
pub struct StatusHandle {
    producer: std::sync::Arc<std::sync::Mutex<Producer<StatusEvent>>>,
}

impl StatusHandle {
    /// Posts an event; never blocks. Drops the event (silently, by design —
    /// logging the drop would itself require allocation on the caller's
    /// thread) if the ring is full.
    pub fn post(&self, category: StatusCategory, message: impl Into<String>) {
        let event = StatusEvent::new(category, message);
        if let Ok(mut producer) = self.producer.lock() {
            let _ = producer.try_push(event);
        }
    }
}

/// Owns the consumer side of the status ring and the background thread
/// that drains it. Dropping this stops the thread (the channel is closed
/// when the last `StatusHandle` is dropped and the ring empties).
pub struct StatusReporter {
    handle: StatusHandle,
    worker: Option<JoinHandle<()>>,
    stop: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

impl StatusReporter {
    /// Creates the ring (sized for a burst of per-block transient events
    /// without allocating) and starts the draining thread immediately.
    pub fn start(capacity: usize, subscribers: Vec<StatusSubscriber>) -> Self {
        let (producer, mut consumer) = SpscRingBuffer::new::<StatusEvent>(capacity);
        let stop = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let stop_worker = std::sync::Arc::clone(&stop);

        let worker = thread::Builder::new()
            .name("bbx-status".into())
            .spawn(move || {
                while !stop_worker.load(std::sync::atomic::Ordering::Acquire) {
                    match consumer.try_pop() {
                        Some(event) => {
                            log_event(&event);
                            for subscriber in &subscribers {
                                subscriber(&event);
                            }
                        }
                        None => thread::sleep(Duration::from_millis(5)),
                    }
                }
                // Drain whatever's left before exiting.
                while let Some(event) = consumer.try_pop() {
                    log_event(&event);
                    for subscriber in &subscribers {
                        subscriber(&event);
                    }
                }
            })
            .expect("failed to spawn status-reporter thread");

        Self { handle: StatusHandle { producer: std::sync::Arc::new(std::sync::Mutex::new(producer)) }, worker: Some(worker), stop }
    }

    /// Returns a cloneable handle any thread (RT included) can post through.
    pub fn handle(&self) -> StatusHandle {
        self.handle.clone()
    }

    /// Signals the drain thread to stop after flushing the ring, and joins it.
    pub fn stop(&mut self) {
        self.stop.store(true, std::sync::atomic::Ordering::Release);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for StatusReporter {
    fn drop(&mut self) {
        self.stop();
    }
}

fn log_event(event: &StatusEvent) {
    let category = event.category.as_str();
    match event.category {
        StatusCategory::Config | StatusCategory::Device => error!("[{category}] {}", event.message),
        StatusCategory::NodeRuntime => error!("[{category}] {}", event.message),
        StatusCategory::Transient => debug!("[{category}] {}", event.message),
        StatusCategory::Control | StatusCategory::Transport => warn!("[{category}] {}", event.message),
        StatusCategory::Info => info!("[{category}] {}", event.message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn posted_events_reach_subscribers() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_worker = Arc::clone(&seen);
        let mut reporter = StatusReporter::start(
            64,
            vec![Box::new(move |_event: &StatusEvent| {
                seen_worker.fetch_add(1, Ordering::SeqCst);
            })],
        );

        let handle = reporter.handle();
        handle.post(StatusCategory::Transient, "pool exhausted on edge `a->b`");
        handle.post(StatusCategory::NodeRuntime, "file sink `out` write failed");

        // Bound the wait rather than sleeping a fixed guess: poll until the
        // worker thread has drained both posts or we give up.
        let deadline = std::time::Instant::now() + Duration::from_secs(1);
        while seen.load(Ordering::SeqCst) < 2 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        reporter.stop();
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
