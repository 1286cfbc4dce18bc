//! Endpoint readiness probe.
//!
//! After the deployment collaborator reports an endpoint, the pipeline
//! waits for it to answer HTTP before handing it to the verification gate.
//! The retry budget here is the bounded external timeout of the execution
//! model; the gate itself never retries.

use std::time::Duration;

use anyhow::Context;
use backon::{ExponentialBuilder, Retryable};
use url::Url;

/// Default timeout for a single probe request.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of probe attempts before giving up.
pub const DEFAULT_PROBE_ATTEMPTS: usize = 8;

/// Create an HTTP client configured for readiness probes.
pub fn create_client() -> Result<reqwest::Client, anyhow::Error> {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")
}

/// Wait for an endpoint to answer HTTP, with exponential backoff.
///
/// Any response at all counts as ready; routing-level status codes are the
/// verification gate's concern, not the probe's.
pub async fn wait_until_ready(
    client: &reqwest::Client,
    endpoint: &Url,
    max_attempts: usize,
) -> Result<(), anyhow::Error> {
    let probe = || async {
        client
            .get(endpoint.clone())
            .send()
            .await
            .map(|_| ())
            .with_context(|| format!("endpoint {} not answering", endpoint))
    };

    probe
        .retry(
            ExponentialBuilder::default()
                .with_min_delay(Duration::from_millis(500))
                .with_max_delay(Duration::from_secs(8))
                .with_max_times(max_attempts),
        )
        .notify(|err, dur| {
            tracing::trace!(error = %err, retry_in = ?dur, "readiness probe failed, retrying...");
        })
        .await
        .with_context(|| format!("Timeout waiting for {} to be ready", endpoint))
}
