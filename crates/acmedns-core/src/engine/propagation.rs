//! Propagation wait for the validation TXT record
//!
//! Sleeps a pre-wait, then polls the probe until it reports a match or the
//! timeout elapses, then sleeps a post-wait as a margin for resolvers that
//! have not caught up yet. Only probes are retried here; no mutation is.
//!
//! Each call opens a fresh wait window, so calling it again after a timeout
//! simply waits again.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::traits::RecordProbe;

/// Propagation timings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropagationConfig {
    /// Delay before the first check
    pub pre_wait: Duration,
    /// Delay between checks
    pub poll_interval: Duration,
    /// Maximum time spent polling
    pub timeout: Duration,
    /// Delay after the record is confirmed
    pub post_wait: Duration,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            pre_wait: Duration::from_secs(30),
            poll_interval: Duration::from_secs(10),
            timeout: Duration::from_secs(300),
            post_wait: Duration::from_secs(10),
        }
    }
}

/// Wait until `name` serves `expected`
///
/// # Returns
///
/// - `Ok(Duration)`: Time from the first poll until the match was seen
/// - `Err(Error::PropagationTimeout)`: No match within `config.timeout`
pub async fn wait_for_propagation(
    probe: &dyn RecordProbe,
    name: &str,
    expected: &str,
    config: &PropagationConfig,
) -> Result<Duration> {
    info!(
        record = %name,
        timeout_secs = config.timeout.as_secs(),
        "Waiting for DNS records to propagate"
    );

    tokio::time::sleep(config.pre_wait).await;

    let start = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        match probe.validate_record(name, expected).await {
            Ok(true) => break,
            Ok(false) => trace!(record = %name, attempts, "Record not yet propagated"),
            Err(e) if e.is_not_found() => {
                trace!(record = %name, attempts, "Record does not resolve yet")
            }
            Err(e) => warn!(record = %name, error = %e, "DNS lookup error"),
        }

        tokio::time::sleep(config.poll_interval).await;

        let elapsed = start.elapsed();
        if elapsed > config.timeout {
            warn!(
                record = %name,
                elapsed_secs = elapsed.as_secs(),
                attempts,
                "DNS propagation timed out"
            );
            return Err(Error::PropagationTimeout { elapsed });
        }
    }

    let elapsed = start.elapsed();
    debug!(
        record = %name,
        elapsed_secs = elapsed.as_secs(),
        attempts,
        "DNS propagation confirmed"
    );

    tokio::time::sleep(config.post_wait).await;
    Ok(elapsed)
}
