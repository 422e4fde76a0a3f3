//! Debounced write coalescer (C4).
//!
//! Per collection, at most one pending timer exists at a time. Scheduling a
//! save for a collection that already has a live timer cancels it in effect
//! by bumping a generation counter: the old timer's callback notices its
//! generation is stale and does nothing. The callback always re-reads the
//! collection's current state when it fires, which is what lets a burst of
//! mutations collapse into a single `write` (spec.md §4.4).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

/// Per-collection debounce timer plus the save callback it drives.
pub struct Coalescer {
    debounce: Duration,
    saver: Arc<dyn Fn(&str) + Send + Sync>,
    pending: Mutex<HashMap<String, u64>>,
}

impl Coalescer {
    /// Creates a coalescer with the given debounce interval. `saver` is
    /// invoked (with the collection name) when a timer fires; it is
    /// expected to swallow its own errors and log them, per spec.md §7
    /// ("Coalescer-driven saves swallow their errors").
    pub fn new(debounce: Duration, saver: Arc<dyn Fn(&str) + Send + Sync>) -> Arc<Self> {
        Arc::new(Self {
            debounce,
            saver,
            pending: Mutex::new(HashMap::new()),
        })
    }

    /// Cancels any existing timer for `collection` and starts a new one.
    pub fn schedule(self: &Arc<Self>, collection: &str) {
        let generation = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            let slot = pending.entry(collection.to_string()).or_insert(0);
            *slot += 1;
            *slot
        };

        let this = Arc::clone(self);
        let name = collection.to_string();
        debug!(collection = name.as_str(), generation, "coalescer timer (re)armed");
        thread::spawn(move || {
            thread::sleep(this.debounce);
            let fire = {
                let mut pending = this.pending.lock().unwrap_or_else(|e| e.into_inner());
                if pending.get(&name) == Some(&generation) {
                    pending.remove(&name);
                    true
                } else {
                    false
                }
            };
            if fire {
                (this.saver)(&name);
            }
        });
    }

    /// Removes and returns every collection with a live timer, without
    /// running their saves — the caller (the database facade) runs the
    /// saves itself so it can propagate errors, per spec.md §7.
    pub fn drain_pending(&self) -> Vec<String> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        let names: Vec<String> = pending.keys().cloned().collect();
        pending.clear();
        names
    }

    /// Number of collections with a live pending timer.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Swallows a save failure, logging it at `warn` level (spec.md §7).
pub fn log_swallowed_error(collection: &str, err: &crate::error::ProseQLError) {
    warn!(collection, error = %err, "coalesced save failed; will retry on next mutation");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;

    #[test]
    fn test_pending_count_tracks_schedule() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let coalescer = Coalescer::new(StdDuration::from_millis(20), Arc::new(move |_name: &str| {
            calls2.fetch_add(1, Ordering::SeqCst);
        }));
        coalescer.schedule("books");
        assert_eq!(coalescer.pending_count(), 1);
        thread::sleep(StdDuration::from_millis(60));
        assert_eq!(coalescer.pending_count(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reschedule_collapses_bursts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let coalescer = Coalescer::new(StdDuration::from_millis(30), Arc::new(move |_name: &str| {
            calls2.fetch_add(1, Ordering::SeqCst);
        }));
        for _ in 0..10 {
            coalescer.schedule("books");
        }
        thread::sleep(StdDuration::from_millis(80));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drain_pending_clears_without_firing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let coalescer = Coalescer::new(StdDuration::from_millis(50), Arc::new(move |_name: &str| {
            calls2.fetch_add(1, Ordering::SeqCst);
        }));
        coalescer.schedule("books");
        let drained = coalescer.drain_pending();
        assert_eq!(drained, vec!["books".to_string()]);
        assert_eq!(coalescer.pending_count(), 0);
        thread::sleep(StdDuration::from_millis(80));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
