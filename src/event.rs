//! Named-event registration, consumed by event-gated execution.
//!
//! The gate only needs one capability from a collaborator: subscribe to a
//! named event and later deregister. [`EventSource`] captures that;
//! [`Emitter`] is a tokio-broadcast implementation of the centralized-
//! emitter convention (and the test double). Objects following an
//! add/remove-listener convention implement the trait by attaching a
//! removal guard to the returned gate; either way deregistration happens
//! exactly once, on drop, on every exit path.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use tokio::sync::broadcast;

/// A registration object for named events with payloads of type `P`.
pub trait EventSource<P>: Send + Sync
where
    P: Clone + Send + 'static,
{
    /// Register interest in `event`. Dropping the returned gate
    /// deregisters the listener.
    fn subscribe(&self, event: &str) -> EventGate<P>;
}

/// A live subscription to one named event.
pub struct EventGate<P> {
    rx: broadcast::Receiver<P>,
    // runs once on drop; the hook for add/remove-listener sources
    remove: Option<Box<dyn FnOnce() + Send>>,
}

impl<P> fmt::Debug for EventGate<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EventGate(..)")
    }
}

impl<P: Clone + Send + 'static> EventGate<P> {
    /// Wrap a broadcast receiver; the receiver deregisters itself on drop.
    pub fn new(rx: broadcast::Receiver<P>) -> Self {
        Self { rx, remove: None }
    }

    /// Attach an explicit removal action, run exactly once on drop.
    pub fn with_removal<F>(rx: broadcast::Receiver<P>, remove: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self { rx, remove: Some(Box::new(remove)) }
    }

    /// The next payload, or `None` once the source is gone. A lagged
    /// receiver skips to the oldest retained payload rather than failing.
    pub async fn next(&mut self) -> Option<P> {
        loop {
            match self.rx.recv().await {
                Ok(payload) => return Some(payload),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl<P> Drop for EventGate<P> {
    fn drop(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

/// Centralized named-event emitter backed by broadcast channels.
pub struct Emitter<P> {
    channels: Mutex<HashMap<String, broadcast::Sender<P>>>,
    capacity: usize,
}

impl<P> fmt::Debug for Emitter<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter").field("capacity", &self.capacity).finish()
    }
}

impl<P: Clone + Send + 'static> Default for Emitter<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Clone + Send + 'static> Emitter<P> {
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    /// `capacity` bounds payload buffering per event for slow listeners.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { channels: Mutex::new(HashMap::new()), capacity }
    }

    /// Emit `payload` to every current listener of `event`; returns the
    /// number of listeners reached.
    pub fn emit(&self, event: &str, payload: P) -> usize {
        let channels = self.channels.lock().unwrap();
        match channels.get(event) {
            Some(tx) => tx.send(payload).unwrap_or(0),
            None => 0,
        }
    }

    /// Number of live listeners for `event`.
    pub fn listeners(&self, event: &str) -> usize {
        let channels = self.channels.lock().unwrap();
        channels.get(event).map_or(0, |tx| tx.receiver_count())
    }
}

impl<P: Clone + Send + 'static> EventSource<P> for Emitter<P> {
    fn subscribe(&self, event: &str) -> EventGate<P> {
        let mut channels = self.channels.lock().unwrap();
        let tx = channels
            .entry(event.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        EventGate::new(tx.subscribe())
    }
}
