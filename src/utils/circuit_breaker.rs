use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

// ============================================================================
// Circuit Breaker
// ============================================================================
//
// Fail-fast guard for an unreliable downstream. Tracks consecutive failures
// and short-circuits calls while the downstream is considered dead.
//
// States:
// - Closed: calls pass through
// - Open: calls are rejected until the cooldown elapses
// - HalfOpen: a single probe call at a time is let through to test recovery
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Clone)]
pub struct BreakerConfig {
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,
    /// How long to reject calls before probing again
    pub cooldown: Duration,
    /// Probe successes required to close the circuit
    pub success_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
            success_threshold: 3,
        }
    }
}

struct BreakerInner {
    state: BreakerState,
    consecutive_failures: u32,
    probe_successes: u32,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

#[derive(Clone)]
pub struct CircuitBreaker {
    inner: Arc<Mutex<BreakerInner>>,
    config: BreakerConfig,
}

#[derive(Debug)]
pub enum BreakerError<E> {
    /// Rejected without running the operation
    Rejected,
    /// The operation ran and failed
    Failed(E),
}

enum Admit {
    Pass,
    Probe,
    Reject,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                probe_successes: 0,
                opened_at: None,
                probe_in_flight: false,
            })),
            config,
        }
    }

    /// Run `operation` under the breaker. Returns `Rejected` without polling
    /// it when the circuit is open, or when another probe already holds the
    /// half-open slot.
    pub async fn call<F, T, E>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: std::future::Future<Output = Result<T, E>>,
    {
        let is_probe = match self.admit() {
            Admit::Pass => false,
            Admit::Probe => true,
            Admit::Reject => return Err(BreakerError::Rejected),
        };

        // Releases the half-open slot even if the probe future is dropped
        // before completing.
        let _probe_slot = ProbeSlot {
            breaker: self,
            armed: is_probe,
        };

        match operation.await {
            Ok(value) => {
                self.on_success(is_probe);
                Ok(value)
            }
            Err(err) => {
                self.on_failure();
                Err(BreakerError::Failed(err))
            }
        }
    }

    pub fn state(&self) -> BreakerState {
        self.lock().state
    }

    fn admit(&self) -> Admit {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => Admit::Pass,
            BreakerState::Open => {
                let cooled_down = inner
                    .opened_at
                    .map(|at| at.elapsed() >= self.config.cooldown)
                    .unwrap_or(true);
                if cooled_down {
                    tracing::info!("circuit breaker half-open, probing");
                    inner.state = BreakerState::HalfOpen;
                    inner.probe_successes = 0;
                    inner.probe_in_flight = true;
                    Admit::Probe
                } else {
                    Admit::Reject
                }
            }
            BreakerState::HalfOpen => {
                if inner.probe_in_flight {
                    Admit::Reject
                } else {
                    inner.probe_in_flight = true;
                    Admit::Probe
                }
            }
        }
    }

    fn on_success(&self, is_probe: bool) {
        let mut inner = self.lock();
        inner.consecutive_failures = 0;
        if is_probe && inner.state == BreakerState::HalfOpen {
            inner.probe_successes += 1;
            if inner.probe_successes >= self.config.success_threshold {
                tracing::info!(successes = inner.probe_successes, "circuit breaker closed");
                inner.state = BreakerState::Closed;
                inner.probe_successes = 0;
                inner.opened_at = None;
            }
        }
    }

    fn on_failure(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures += 1;
        match inner.state {
            BreakerState::Closed => {
                if inner.consecutive_failures >= self.config.failure_threshold {
                    tracing::warn!(
                        failures = inner.consecutive_failures,
                        "circuit breaker opened"
                    );
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            BreakerState::HalfOpen => {
                tracing::warn!("probe failed, circuit breaker reopened");
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                inner.probe_successes = 0;
            }
            BreakerState::Open => {
                inner.opened_at = Some(Instant::now());
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        // A poisoned lock only means some caller panicked mid-update; the
        // counters themselves are still usable.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

struct ProbeSlot<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl Drop for ProbeSlot<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.lock().probe_in_flight = false;
        }
    }
}

impl<E: std::fmt::Display> std::fmt::Display for BreakerError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BreakerError::Rejected => write!(f, "circuit breaker is open"),
            BreakerError::Failed(e) => write!(f, "operation failed: {}", e),
        }
    }
}

impl<E: std::error::Error> std::error::Error for BreakerError<E> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(failure_threshold: u32, cooldown_ms: u64, success_threshold: u32) -> BreakerConfig {
        BreakerConfig {
            failure_threshold,
            cooldown: Duration::from_millis(cooldown_ms),
            success_threshold,
        }
    }

    #[tokio::test]
    async fn opens_after_consecutive_failures() {
        let breaker = CircuitBreaker::new(config(3, 1000, 2));

        for _ in 0..3 {
            let result = breaker.call(async { Err::<(), _>("boom") }).await;
            assert!(matches!(result, Err(BreakerError::Failed(_))));
        }
        assert_eq!(breaker.state(), BreakerState::Open);

        let rejected = breaker.call(async { Ok::<_, &str>(()) }).await;
        assert!(matches!(rejected, Err(BreakerError::Rejected)));
    }

    #[tokio::test]
    async fn a_success_resets_the_failure_streak() {
        let breaker = CircuitBreaker::new(config(2, 1000, 1));

        let _ = breaker.call(async { Err::<(), _>("boom") }).await;
        let _ = breaker.call(async { Ok::<_, &str>(()) }).await;
        let _ = breaker.call(async { Err::<(), _>("boom") }).await;

        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn probes_after_cooldown_and_closes_on_success() {
        let breaker = CircuitBreaker::new(config(2, 50, 1));

        for _ in 0..2 {
            let _ = breaker.call(async { Err::<(), _>("boom") }).await;
        }
        assert_eq!(breaker.state(), BreakerState::Open);

        tokio::time::sleep(Duration::from_millis(80)).await;

        let probed = breaker.call(async { Ok::<_, &str>(()) }).await;
        assert!(probed.is_ok());
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn failed_probe_reopens_the_circuit() {
        let breaker = CircuitBreaker::new(config(1, 50, 1));

        let _ = breaker.call(async { Err::<(), _>("boom") }).await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        let probed = breaker.call(async { Err::<(), _>("still down") }).await;
        assert!(matches!(probed, Err(BreakerError::Failed(_))));
        assert_eq!(breaker.state(), BreakerState::Open);

        let rejected = breaker.call(async { Ok::<_, &str>(()) }).await;
        assert!(matches!(rejected, Err(BreakerError::Rejected)));
    }

    #[tokio::test]
    async fn half_open_admits_one_probe_at_a_time() {
        let breaker = CircuitBreaker::new(config(1, 20, 1));

        let _ = breaker.call(async { Err::<(), _>("boom") }).await;
        assert_eq!(breaker.state(), BreakerState::Open);

        tokio::time::sleep(Duration::from_millis(40)).await;

        let (release, gate) = tokio::sync::oneshot::channel::<()>();
        let probing = {
            let breaker = breaker.clone();
            tokio::spawn(async move {
                breaker
                    .call(async {
                        let _ = gate.await;
                        Ok::<_, &str>(())
                    })
                    .await
            })
        };

        // Let the spawned probe claim the half-open slot first.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(breaker.state(), BreakerState::HalfOpen);

        let second = breaker.call(async { Ok::<_, &str>(()) }).await;
        assert!(matches!(second, Err(BreakerError::Rejected)));

        release.send(()).ok();
        let first = probing.await.unwrap();
        assert!(first.is_ok());
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn dropped_probe_releases_the_half_open_slot() {
        let breaker = CircuitBreaker::new(config(1, 10, 1));

        let _ = breaker.call(async { Err::<(), _>("boom") }).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        {
            let probe = breaker.call(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, &str>(())
            });
            tokio::pin!(probe);
            let still_pending =
                tokio::time::timeout(Duration::from_millis(5), probe.as_mut()).await;
            assert!(still_pending.is_err());
        }

        // The abandoned probe must not leave the slot occupied.
        let next = breaker.call(async { Ok::<_, &str>(()) }).await;
        assert!(next.is_ok());
        assert_eq!(breaker.state(), BreakerState::Closed);
    }
}
