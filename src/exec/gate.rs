//! Process-wide admission gates for heavy external operations.
//!
//! A gate is a counting semaphore with a fixed capacity. Gates are built once
//! from configuration and handed to every pool that performs the guarded kind
//! of work, so the capacity bounds the total across all concurrent jobs rather
//! than per pool.

use crate::config::GateConfig;
use crate::exec::cancel::{CancelToken, Wake};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

/// Resource class for CPU-heavy audio work (tempo shifts, encodes, concatenation).
pub const HEAVY_CPU: &str = "heavy-cpu";
/// Resource class for transcription backend calls.
pub const TRANSCRIPTION: &str = "transcription";
/// Resource class for speech synthesis backend calls.
pub const SYNTHESIS: &str = "synthesis";

#[derive(Debug, Default)]
struct Slots {
    in_use: Mutex<usize>,
    /// Signalled when a slot is released or a watching token is cancelled.
    changed: Condvar,
}

impl Slots {
    fn lock(&self) -> MutexGuard<'_, usize> {
        // The counter stays consistent even if a holder panicked.
        self.in_use
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, usize>) -> MutexGuard<'a, usize> {
        self.changed
            .wait(guard)
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Wake for Slots {
    fn wake(&self) {
        // Taking the lock orders this wake after any waiter's token check.
        let _guard = self.lock();
        self.changed.notify_all();
    }
}

/// Counting semaphore with a fixed capacity.
///
/// No fairness or timeout guarantee is made by `acquire`; callers that need a
/// deadline use `acquire_timeout` or `acquire_cancellable`.
#[derive(Debug)]
pub struct ResourceGate {
    name: String,
    capacity: usize,
    slots: Arc<Slots>,
}

impl ResourceGate {
    /// Create a gate admitting at most `capacity` concurrent holders.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        assert!(capacity > 0, "gate capacity must be positive");
        Self {
            name: name.into(),
            capacity,
            slots: Arc::new(Slots::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of permits currently held.
    pub fn in_use(&self) -> usize {
        *self.lock()
    }

    /// Number of permits that could be acquired right now.
    pub fn available(&self) -> usize {
        self.capacity - *self.lock()
    }

    /// Block until a slot is free.
    ///
    /// The slot is released when the returned permit is dropped, on every exit
    /// path of the caller.
    pub fn acquire(&self) -> GatePermit<'_> {
        let mut in_use = self.lock();
        while *in_use >= self.capacity {
            in_use = self.slots.wait(in_use);
        }
        *in_use += 1;
        GatePermit { gate: self }
    }

    /// Take a slot only if one is free right now.
    pub fn try_acquire(&self) -> Option<GatePermit<'_>> {
        let mut in_use = self.lock();
        if *in_use >= self.capacity {
            return None;
        }
        *in_use += 1;
        Some(GatePermit { gate: self })
    }

    /// Wait at most `timeout` for a slot.
    pub fn acquire_timeout(&self, timeout: Duration) -> Option<GatePermit<'_>> {
        let deadline = Instant::now() + timeout;
        let mut in_use = self.lock();
        while *in_use >= self.capacity {
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (guard, _) = self
                .slots
                .changed
                .wait_timeout(in_use, deadline - now)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            in_use = guard;
        }
        *in_use += 1;
        Some(GatePermit { gate: self })
    }

    /// Wait for a slot until one frees up or `cancel` fires.
    ///
    /// Returns `None` once cancellation is observed.
    pub fn acquire_cancellable(&self, cancel: &CancelToken) -> Option<GatePermit<'_>> {
        self.acquire_unless_cancelled(&[cancel])
    }

    /// Wait for a slot until one frees up or any of `tokens` fires.
    ///
    /// The waiter sleeps on the gate's condvar; a cancelled token wakes it
    /// directly.
    pub fn acquire_unless_cancelled(&self, tokens: &[&CancelToken]) -> Option<GatePermit<'_>> {
        let waker: Weak<dyn Wake> = Arc::downgrade(&self.slots) as Weak<dyn Wake>;
        for token in tokens {
            token.register(waker.clone());
        }

        let mut in_use = self.lock();
        loop {
            if tokens.iter().any(|token| token.is_cancelled()) {
                // Hand on a release notification this waiter may have consumed.
                self.slots.changed.notify_one();
                return None;
            }
            if *in_use < self.capacity {
                *in_use += 1;
                return Some(GatePermit { gate: self });
            }
            in_use = self.slots.wait(in_use);
        }
    }

    fn release(&self) {
        let mut in_use = self.lock();
        *in_use = in_use.saturating_sub(1);
        drop(in_use);
        self.slots.changed.notify_one();
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        self.slots.lock()
    }
}

/// A held slot in a `ResourceGate`. Dropping it releases the slot.
#[derive(Debug)]
#[must_use = "the slot is released as soon as the permit is dropped"]
pub struct GatePermit<'a> {
    gate: &'a ResourceGate,
}

impl GatePermit<'_> {
    pub fn gate_name(&self) -> &str {
        self.gate.name()
    }
}

impl Drop for GatePermit<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}

/// One gate per resource class, shared by every job in the process.
#[derive(Debug, Clone)]
pub struct GateSet {
    pub heavy_cpu: Arc<ResourceGate>,
    pub transcription: Arc<ResourceGate>,
    pub synthesis: Arc<ResourceGate>,
}

impl GateSet {
    /// Create gates with explicit capacities.
    ///
    /// # Panics
    /// Panics if any capacity is zero.
    pub fn new(heavy_cpu: usize, transcription: usize, synthesis: usize) -> Self {
        Self {
            heavy_cpu: Arc::new(ResourceGate::new(HEAVY_CPU, heavy_cpu)),
            transcription: Arc::new(ResourceGate::new(TRANSCRIPTION, transcription)),
            synthesis: Arc::new(ResourceGate::new(SYNTHESIS, synthesis)),
        }
    }

    /// Create gates sized from configuration.
    ///
    /// Zero capacities are clamped to one; `Config::validate` reports them.
    pub fn from_config(config: &GateConfig) -> Self {
        Self::new(
            config.heavy_cpu.max(1),
            config.transcription.max(1),
            config.synthesis.max(1),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_acquire_and_release() {
        let gate = ResourceGate::new("test", 2);
        assert_eq!(gate.available(), 2);

        let a = gate.acquire();
        let b = gate.acquire();
        assert_eq!(gate.in_use(), 2);
        assert!(gate.try_acquire().is_none());

        drop(a);
        assert_eq!(gate.in_use(), 1);
        drop(b);
        assert_eq!(gate.available(), 2);
    }

    #[test]
    fn test_permit_released_on_error_path() {
        let gate = ResourceGate::new("test", 1);

        fn failing_work(gate: &ResourceGate) -> std::result::Result<(), String> {
            let _permit = gate.acquire();
            Err("tool failed".to_string())
        }

        assert!(failing_work(&gate).is_err());
        assert_eq!(gate.in_use(), 0);
    }

    #[test]
    fn test_acquire_timeout_expires_when_full() {
        let gate = ResourceGate::new("test", 1);
        let _held = gate.acquire();
        let start = Instant::now();
        assert!(gate.acquire_timeout(Duration::from_millis(30)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_acquire_timeout_succeeds_after_release() {
        let gate = Arc::new(ResourceGate::new("test", 1));
        let permit = gate.acquire();

        let waiter = {
            let gate = gate.clone();
            thread::spawn(move || gate.acquire_timeout(Duration::from_secs(5)).is_some())
        };
        thread::sleep(Duration::from_millis(20));
        drop(permit);

        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_acquire_cancellable_returns_none_on_cancel() {
        let gate = Arc::new(ResourceGate::new("test", 1));
        let _held = gate.acquire();
        let cancel = CancelToken::new();

        let waiter = {
            let gate = gate.clone();
            let cancel = cancel.clone();
            thread::spawn(move || gate.acquire_cancellable(&cancel).is_none())
        };
        thread::sleep(Duration::from_millis(20));
        cancel.cancel();

        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_cancel_wakes_waiter_without_release() {
        let gate = Arc::new(ResourceGate::new("test", 1));
        let _held = gate.acquire();
        let cancel = CancelToken::new();
        let abort = CancelToken::new();

        let waiter = {
            let gate = gate.clone();
            let (cancel, abort) = (cancel.clone(), abort.clone());
            thread::spawn(move || {
                let outcome = gate.acquire_unless_cancelled(&[&cancel, &abort]).is_none();
                (outcome, Instant::now())
            })
        };
        thread::sleep(Duration::from_millis(50));
        let fired = Instant::now();
        abort.cancel();

        let (gave_up, woke) = waiter.join().unwrap();
        assert!(gave_up);
        assert!(woke.duration_since(fired) < Duration::from_secs(1));
        assert_eq!(gate.in_use(), 1);
    }

    #[test]
    fn test_cancelled_waiter_does_not_strand_a_release() {
        let gate = Arc::new(ResourceGate::new("test", 1));
        let held = gate.acquire();
        let cancel = CancelToken::new();

        let (quitter, patient) = {
            let (g1, g2) = (gate.clone(), gate.clone());
            let token = cancel.clone();
            (
                thread::spawn(move || g1.acquire_cancellable(&token).is_none()),
                thread::spawn(move || g2.acquire_cancellable(&CancelToken::new()).is_some()),
            )
        };
        thread::sleep(Duration::from_millis(30));
        cancel.cancel();
        drop(held);

        assert!(quitter.join().unwrap());
        assert!(patient.join().unwrap());
        assert_eq!(gate.in_use(), 0);
    }

    #[test]
    fn test_concurrent_holders_never_exceed_capacity() {
        let capacity = 3;
        let gate = Arc::new(ResourceGate::new("flood", capacity));
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..capacity + 9)
            .map(|_| {
                let gate = gate.clone();
                let current = current.clone();
                let peak = peak.clone();
                thread::spawn(move || {
                    let _permit = gate.acquire();
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    current.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= capacity);
        assert_eq!(gate.in_use(), 0);
    }

    #[test]
    #[should_panic(expected = "gate capacity must be positive")]
    fn test_zero_capacity_panics() {
        ResourceGate::new("empty", 0);
    }

    #[test]
    fn test_gate_set_names() {
        let gates = GateSet::new(4, 2, 3);
        assert_eq!(gates.heavy_cpu.name(), HEAVY_CPU);
        assert_eq!(gates.transcription.capacity(), 2);
        assert_eq!(gates.synthesis.capacity(), 3);
    }

    #[test]
    fn test_gate_set_from_config_clamps_zero() {
        let config = GateConfig {
            heavy_cpu: 0,
            transcription: 1,
            synthesis: 2,
        };
        let gates = GateSet::from_config(&config);
        assert_eq!(gates.heavy_cpu.capacity(), 1);
    }

    #[test]
    fn test_permit_reports_gate_name() {
        let gate = ResourceGate::new(SYNTHESIS, 1);
        let permit = gate.acquire();
        assert_eq!(permit.gate_name(), SYNTHESIS);
    }
}
