//! Bounded waiting for a resource to become ready.

use anyhow::Result;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

/// How long `create` waits for its dependency.
///
/// A zero `interval` or zero `max_attempts` skips the wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollingPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// A policy that never probes.
    pub fn no_wait() -> Self {
        Self::new(Duration::ZERO, 0)
    }
}

impl Default for PollingPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(3000), 10)
    }
}

/// Outcome of [`await_ready`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// The policy interval is zero; nothing was probed.
    Skipped,
    Ready { attempts: u32 },
    /// The attempt budget ran out without a positive probe.
    Exhausted { attempts: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("wait cancelled")]
pub struct Cancelled;

/// Suspends the caller between probe attempts.
pub trait Sleeper {
    fn sleep(&self, duration: Duration) -> std::result::Result<(), Cancelled>;

    fn cancelled(&self) -> bool {
        false
    }
}

/// Answers whether a dependency is ready yet.
pub trait ReadinessProbe {
    fn is_ready(&self, dependency_id: &str) -> Result<bool>;
}

impl<F> ReadinessProbe for F
where
    F: Fn(&str) -> bool,
{
    fn is_ready(&self, dependency_id: &str) -> Result<bool> {
        Ok(self(dependency_id))
    }
}

/// Shared cancellation flag; also the sleeper used outside of tests.
///
/// Clones share state: `cancel()` on any clone wakes a sleeping poller on
/// another thread immediately.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Sleeper for CancelToken {
    fn sleep(&self, duration: Duration) -> std::result::Result<(), Cancelled> {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = cvar
            .wait_timeout_while(guard, duration, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        if *guard { Err(Cancelled) } else { Ok(()) }
    }

    fn cancelled(&self) -> bool {
        self.is_cancelled()
    }
}

/// Calls `probe` until it reports ready or `policy.max_attempts` is spent.
///
/// There is no sleep after a successful probe, nor after the last failed one.
/// A probe error counts as "not ready" for that attempt.
pub fn await_ready<P>(
    mut probe: P,
    policy: &PollingPolicy,
    sleeper: &dyn Sleeper,
) -> std::result::Result<Wait, Cancelled>
where
    P: FnMut() -> Result<bool>,
{
    if policy.interval.is_zero() {
        return Ok(Wait::Skipped);
    }

    for attempt in 1..=policy.max_attempts {
        if sleeper.cancelled() {
            return Err(Cancelled);
        }

        match probe() {
            Ok(true) => return Ok(Wait::Ready { attempts: attempt }),
            Ok(false) => {}
            Err(err) => {
                tracing::debug!(attempt, error = %format!("{err:#}"), "readiness probe failed");
            }
        }

        if attempt < policy.max_attempts {
            sleeper.sleep(policy.interval)?;
        }
    }

    Ok(Wait::Exhausted {
        attempts: policy.max_attempts,
    })
}
