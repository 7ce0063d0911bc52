use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::super::engine::{RecorderObserver, RecorderStatus};
use super::super::signals::RecorderFailure;
use super::super::types::PublisherBinding;

/// Invoked at most once per session when a recorder fails at runtime.
pub type ForcedStopCallback = Arc<dyn Fn(RecorderFailure) + Send + Sync>;

/// Observer shared by every recorder of one session.
///
/// Both recorders may fail within the same tick; the latch lets only the
/// first failure through. Stops the coordinator requested itself are expected
/// per binding and never count as failures. Once closed, the native side may
/// still call in but nothing is raised.
pub struct SessionWatch {
    generation: u64,
    raised: AtomicBool,
    closed: AtomicBool,
    expected_stops: Mutex<HashSet<PublisherBinding>>,
    callback: Option<ForcedStopCallback>,
}

impl SessionWatch {
    pub fn new(generation: u64, callback: Option<ForcedStopCallback>) -> Self {
        Self {
            generation,
            raised: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            expected_stops: Mutex::new(HashSet::new()),
            callback,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Marks `Stopped` notifications of `binding` as requested from now on.
    pub fn expect_stop(&self, binding: &PublisherBinding) {
        if let Ok(mut expected) = self.expected_stops.lock() {
            expected.insert(binding.clone());
        }
    }

    /// Detaches the watch from its session. Later callbacks are ignored.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_expected(&self, binding: &PublisherBinding) -> bool {
        self.expected_stops
            .lock()
            .map(|expected| expected.contains(binding))
            .unwrap_or(false)
    }

    fn raise(&self, failure: RecorderFailure) {
        if self.raised.swap(true, Ordering::SeqCst) {
            tracing::debug!(target: "broadcast", "[RECORDING] Forced stop already raised, ignoring {}", failure.binding);
            return;
        }

        tracing::error!(target: "broadcast", "[RECORDING] Recorder {} failed: {}", failure.binding, failure.reason);
        match &self.callback {
            Some(callback) => callback(failure),
            None => tracing::warn!(target: "broadcast", "[RECORDING] No forced-stop callback registered"),
        }
    }

    fn failure(&self, binding: &PublisherBinding, reason: String) -> RecorderFailure {
        RecorderFailure {
            binding: binding.clone(),
            reason,
            generation: self.generation,
        }
    }
}

impl RecorderObserver for SessionWatch {
    fn on_state_changed(&self, binding: &PublisherBinding, status: RecorderStatus, reason: Option<String>) {
        if self.closed.load(Ordering::SeqCst) {
            tracing::debug!(target: "broadcast", "[RECORDING] Ignoring {:?} from {} of a finished session", status, binding);
            return;
        }

        match status {
            RecorderStatus::Started => {
                tracing::debug!(target: "broadcast", "[RECORDING] Recorder {} started", binding);
            }
            RecorderStatus::Stopped if self.is_expected(binding) => {
                tracing::debug!(target: "broadcast", "[RECORDING] Recorder {} stopped", binding);
            }
            RecorderStatus::Stopped => self.raise(self.failure(
                binding,
                reason.unwrap_or_else(|| "recorder stopped unexpectedly".to_string()),
            )),
            RecorderStatus::Error => {
                self.raise(self.failure(binding, reason.unwrap_or_else(|| "recorder error".to_string())))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_watch() -> (Arc<SessionWatch>, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let callback: ForcedStopCallback = Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (Arc::new(SessionWatch::new(1, Some(callback))), count)
    }

    #[test]
    fn test_concurrent_errors_raise_once() {
        let (watch, count) = counting_watch();
        let primary = PublisherBinding::primary("ch", 1);
        let secondary = PublisherBinding::secondary("ch", 2);

        let handles: Vec<_> = [primary, secondary]
            .into_iter()
            .map(|binding| {
                let watch = watch.clone();
                std::thread::spawn(move || {
                    watch.on_state_changed(&binding, RecorderStatus::Error, Some("disk full".into()))
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_expected_stop_is_not_a_failure() {
        let (watch, count) = counting_watch();
        let binding = PublisherBinding::primary("ch", 1);

        watch.expect_stop(&binding);
        watch.on_state_changed(&binding, RecorderStatus::Stopped, None);

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_expected_stop_covers_only_its_binding() {
        let (watch, count) = counting_watch();
        let primary = PublisherBinding::primary("ch", 1);
        let secondary = PublisherBinding::secondary("ch", 2);

        watch.expect_stop(&primary);
        watch.on_state_changed(&primary, RecorderStatus::Stopped, None);
        watch.on_state_changed(&secondary, RecorderStatus::Stopped, None);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_closed_watch_ignores_late_callbacks() {
        let (watch, count) = counting_watch();
        let binding = PublisherBinding::primary("ch", 1);

        watch.close();
        watch.on_state_changed(&binding, RecorderStatus::Error, Some("late".into()));
        watch.on_state_changed(&binding, RecorderStatus::Stopped, None);

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failure_carries_generation() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: ForcedStopCallback = Arc::new(move |failure| {
            sink.lock().unwrap().push(failure);
        });
        let watch = SessionWatch::new(7, Some(callback));

        watch.on_state_changed(&PublisherBinding::primary("ch", 1), RecorderStatus::Error, None);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].generation, 7);
        assert_eq!(seen[0].reason, "recorder error");
    }

    #[test]
    fn test_unexpected_stop_is_a_failure() {
        let (watch, count) = counting_watch();
        let binding = PublisherBinding::primary("ch", 1);

        watch.on_state_changed(&binding, RecorderStatus::Started, None);
        watch.on_state_changed(&binding, RecorderStatus::Stopped, None);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
