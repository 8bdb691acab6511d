//! # Concurrency Limiter
//!
//! Counting admission gate bounding how many work units run simultaneously.
//! An explicit, injectable object rather than a process-wide singleton, so
//! tests can instantiate isolated limiters and assert peak concurrency.
//!
//! The adaptive variant layers a capacity policy on top of the same
//! acquire/release contract: a governor withdraws permits while a
//! process-wide pressure signal is raised and restores them once it clears.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Raised when the limiter's semaphore has been closed; does not happen in
/// normal operation
#[derive(Debug, Error)]
#[error("concurrency limiter is closed")]
pub struct LimiterClosed;

/// Snapshot of limiter occupancy for logging and test assertions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterStats {
    /// Configured capacity
    pub capacity: usize,
    /// Capacity minus permits currently withheld by the governor
    pub effective_capacity: usize,
    /// Units holding a slot right now
    pub in_flight: usize,
    /// High-water mark of simultaneous holders since construction
    pub peak: usize,
}

/// Counting semaphore with instrumented occupancy gauges
///
/// ```rust
/// use chroma_core::orchestration::ConcurrencyLimiter;
///
/// # tokio_test::block_on(async {
/// let limiter = ConcurrencyLimiter::new(2);
/// let permit = limiter.acquire().await.unwrap();
/// assert_eq!(limiter.stats().in_flight, 1);
/// drop(permit);
/// assert_eq!(limiter.stats().in_flight, 0);
/// # });
/// ```
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    /// Permits currently forgotten under pressure; guarded so withhold and
    /// restore cannot interleave
    withheld: Mutex<usize>,
}

impl ConcurrencyLimiter {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
            withheld: Mutex::new(0),
        }
    }

    /// Acquire one slot, suspending until capacity frees up. The returned
    /// permit releases its slot on drop, on every exit path.
    pub async fn acquire(&self) -> Result<LimiterPermit, LimiterClosed> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| LimiterClosed)?;

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);

        Ok(LimiterPermit {
            _permit: permit,
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    pub fn stats(&self) -> LimiterStats {
        let withheld = *self.withheld.lock();
        LimiterStats {
            capacity: self.capacity,
            effective_capacity: self.capacity - withheld,
            in_flight: self.in_flight.load(Ordering::SeqCst),
            peak: self.peak.load(Ordering::SeqCst),
        }
    }

    /// Withdraw idle permits until `target` of them are withheld. Permits
    /// held by running units cannot be withdrawn; those are absorbed as
    /// they are released, on the governor's next pass.
    pub fn withhold(&self, target: usize) {
        let target = target.min(self.capacity.saturating_sub(1));
        let mut withheld = self.withheld.lock();
        while *withheld < target {
            match self.semaphore.try_acquire() {
                Ok(permit) => {
                    permit.forget();
                    *withheld += 1;
                }
                Err(_) => break,
            }
        }
        debug!(
            withheld = *withheld,
            target = target,
            "Limiter capacity withheld"
        );
    }

    /// Return every withheld permit to the pool
    pub fn restore(&self) {
        let mut withheld = self.withheld.lock();
        if *withheld > 0 {
            self.semaphore.add_permits(*withheld);
            debug!(restored = *withheld, "Limiter capacity restored");
            *withheld = 0;
        }
    }
}

/// RAII slot handle; releasing is infallible and automatic
pub struct LimiterPermit {
    _permit: tokio::sync::OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for LimiterPermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Process-wide resource signal consulted by the adaptive governor
pub trait PressureSignal: Send + Sync {
    fn under_pressure(&self) -> bool;
}

/// Periodically reconciles limiter capacity against a pressure signal.
/// While the signal is raised, capacity is reduced to `reduced_capacity`;
/// once it clears, full capacity returns.
pub struct AdaptiveGovernor {
    limiter: Arc<ConcurrencyLimiter>,
    signal: Arc<dyn PressureSignal>,
    reduced_capacity: usize,
    poll_interval: Duration,
}

impl AdaptiveGovernor {
    pub fn new(
        limiter: Arc<ConcurrencyLimiter>,
        signal: Arc<dyn PressureSignal>,
        reduced_capacity: usize,
        poll_interval: Duration,
    ) -> Self {
        Self {
            limiter,
            signal,
            reduced_capacity,
            poll_interval,
        }
    }

    /// One reconciliation pass; factored out so tests can drive it directly
    pub fn reconcile(&self) {
        if self.signal.under_pressure() {
            let target = self
                .limiter
                .capacity
                .saturating_sub(self.reduced_capacity.max(1));
            self.limiter.withhold(target);
        } else {
            self.limiter.restore();
        }
    }

    /// Spawn the polling loop; aborts with the returned handle
    pub fn spawn(self) -> JoinHandle<()> {
        info!(
            reduced_capacity = self.reduced_capacity,
            poll_secs = self.poll_interval.as_secs(),
            "🛡️ Adaptive limiter governor started"
        );
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let was_pressured = self.limiter.stats().effective_capacity
                    < self.limiter.capacity;
                self.reconcile();
                let now_pressured =
                    self.limiter.stats().effective_capacity < self.limiter.capacity;
                if was_pressured != now_pressured {
                    warn!(
                        effective_capacity = self.limiter.stats().effective_capacity,
                        capacity = self.limiter.capacity,
                        "Limiter capacity changed under pressure signal"
                    );
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    struct StaticPressure(AtomicBool);

    impl PressureSignal for StaticPressure {
        fn under_pressure(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn test_permit_release_on_drop() {
        let limiter = ConcurrencyLimiter::new(1);

        let permit = limiter.acquire().await.unwrap();
        assert_eq!(limiter.stats().in_flight, 1);
        drop(permit);
        assert_eq!(limiter.stats().in_flight, 0);

        // Slot is actually reusable
        let _again = limiter.acquire().await.unwrap();
    }

    #[tokio::test]
    async fn test_peak_tracks_high_water_mark() {
        let limiter = ConcurrencyLimiter::new(3);
        let a = limiter.acquire().await.unwrap();
        let b = limiter.acquire().await.unwrap();
        drop(a);
        let _c = limiter.acquire().await.unwrap();
        drop(b);

        let stats = limiter.stats();
        assert_eq!(stats.peak, 2);
        assert_eq!(stats.in_flight, 1);
    }

    #[tokio::test]
    async fn test_withhold_and_restore() {
        let limiter = ConcurrencyLimiter::new(3);
        limiter.withhold(2);
        assert_eq!(limiter.stats().effective_capacity, 1);

        limiter.restore();
        assert_eq!(limiter.stats().effective_capacity, 3);
    }

    #[tokio::test]
    async fn test_withhold_never_reaches_zero_capacity() {
        let limiter = ConcurrencyLimiter::new(2);
        limiter.withhold(5);
        // At least one slot always survives so the batch cannot deadlock
        assert!(limiter.stats().effective_capacity >= 1);
    }

    #[tokio::test]
    async fn test_governor_reconcile_follows_signal() {
        let limiter = Arc::new(ConcurrencyLimiter::new(4));
        let signal = Arc::new(StaticPressure(AtomicBool::new(true)));
        let governor = AdaptiveGovernor::new(
            Arc::clone(&limiter),
            signal.clone(),
            2,
            Duration::from_millis(10),
        );

        governor.reconcile();
        assert_eq!(limiter.stats().effective_capacity, 2);

        signal.0.store(false, Ordering::SeqCst);
        governor.reconcile();
        assert_eq!(limiter.stats().effective_capacity, 4);
    }
}
