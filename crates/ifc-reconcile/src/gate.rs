use std::sync::{Mutex, MutexGuard, PoisonError};

static GLOBAL: LabelMutationGate = LabelMutationGate::new();

/// Serializes label mutation sequences.
///
/// The label endpoint has no concurrency token, so a whole sequence of
/// per-type writes runs as one critical section. Only guards writers inside
/// this process.
#[derive(Debug)]
pub struct LabelMutationGate {
    lock: Mutex<()>,
}

/// Held for the duration of one mutation sequence. Released on drop, so
/// early returns and `?` release it too.
#[derive(Debug)]
pub struct LabelMutationGuard<'a> {
    _held: MutexGuard<'a, ()>,
}

impl Default for LabelMutationGate {
    fn default() -> Self {
        Self::new()
    }
}

impl LabelMutationGate {
    pub const fn new() -> Self {
        Self {
            lock: Mutex::new(()),
        }
    }

    /// The process-wide gate.
    pub fn global() -> &'static LabelMutationGate {
        &GLOBAL
    }

    /// Block until no other sequence holds the gate.
    ///
    /// A panic inside a previous sequence does not wedge the gate: the lock
    /// guards no data, so poisoning is ignored.
    pub fn acquire(&self) -> LabelMutationGuard<'_> {
        LabelMutationGuard {
            _held: self.lock.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Run `f` while holding the gate.
    pub fn run<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = self.acquire();
        f()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn sequences_never_overlap() {
        let gate = Arc::new(LabelMutationGate::new());
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let (gate, active, peak) = (gate.clone(), active.clone(), peak.clone());
                thread::spawn(move || {
                    gate.run(|| {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(5));
                        active.fetch_sub(1, Ordering::SeqCst);
                    })
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn gate_is_released_after_an_error_path() {
        let gate = LabelMutationGate::new();
        let r: Result<(), &str> = gate.run(|| Err("boom"));
        assert!(r.is_err());
        // would deadlock if the first sequence kept the lock
        gate.run(|| ());
    }

    #[test]
    fn gate_survives_a_panicking_sequence() {
        let gate = Arc::new(LabelMutationGate::new());
        let g = gate.clone();
        let _ = thread::spawn(move || g.run(|| panic!("mid-sequence"))).join();
        assert_eq!(gate.run(|| 1), 1);
    }
}
