//! Backend warm-up
//!
//! The backend runs on a serverless host that goes cold when idle. A periodic
//! keep-alive ping stops that from happening while the storefront is open, and
//! checkout waits on [`warm_up_backend`] before talking to it.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::api::{ApiError, BackendProbe, ProbeMethod};

pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const STATUS_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WarmUpPolicy { pub max_attempts: u32, pub attempt_timeout: Duration, pub backoff: Duration }

impl Default for WarmUpPolicy {
    fn default() -> Self { Self { max_attempts: 3, attempt_timeout: Duration::from_secs(15), backoff: Duration::from_secs(2) } }
}

/// Handle to a running keep-alive task. Dropping it stops the pings too.
#[derive(Debug)]
pub struct KeepAlive { handle: JoinHandle<()>, every: Duration }

impl KeepAlive {
    /// Ping the backend now and then once per `every`. Must be called inside a tokio runtime.
    pub fn start(probe: Arc<dyn BackendProbe>, every: Duration) -> Self {
        info!(interval_secs = every.as_secs(), "starting backend keep-alive");
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match timeout(every, probe.probe(ProbeMethod::Head)).await.unwrap_or(Err(ApiError::Timeout)) {
                    Ok(()) => debug!("keep-alive ping ok"),
                    Err(e) => warn!(error = %e, "keep-alive ping failed"),
                }
            }
        });
        Self { handle, every }
    }

    pub fn interval(&self) -> Duration { self.every }
    pub fn is_running(&self) -> bool { !self.handle.is_finished() }

    pub fn stop(self) {
        info!("stopping backend keep-alive");
    }
}

impl Drop for KeepAlive {
    fn drop(&mut self) { self.handle.abort(); }
}

/// Probe the backend with a real request until it answers, reporting progress
/// as it goes. Returns whether the backend is ready.
pub async fn warm_up_backend(probe: &dyn BackendProbe, policy: &WarmUpPolicy, mut on_progress: impl FnMut(&str)) -> bool {
    for attempt in 1..=policy.max_attempts {
        on_progress(&format!("Connecting to server (attempt {attempt}/{})...", policy.max_attempts));
        let result = timeout(policy.attempt_timeout, probe.probe(ProbeMethod::Get)).await.unwrap_or(Err(ApiError::Timeout));
        match result {
            Ok(()) => {
                info!(attempt, "backend is ready");
                on_progress("Server is ready!");
                return true;
            }
            Err(e) => warn!(attempt, error = %e, "backend warm-up attempt failed"),
        }
        if attempt < policy.max_attempts {
            on_progress(&format!("Server is waking up, retrying in {}s...", policy.backoff.as_secs()));
            tokio::time::sleep(policy.backoff).await;
        }
    }
    on_progress("Server is taking longer than expected. Please try again shortly.");
    false
}

/// One quick probe, for hints that must not hold anything up.
pub async fn check_backend_status(probe: &dyn BackendProbe) -> bool {
    matches!(timeout(STATUS_TIMEOUT, probe.probe(ProbeMethod::Head)).await, Ok(Ok(())))
}
