//! Pre-flight reachability check of the site under test

use std::time::Duration;
use tracing::{debug, info};

use crate::error::{E2eError, E2eResult};

/// Bound on the reachability check
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Bound on the single request
    pub request_timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Check once that the target URL answers with a non-error status.
///
/// Any connection error or error status is [`E2eError::Navigation`]; callers
/// abort the run on that. Nothing is retried.
pub async fn probe(url: &str, config: &ProbeConfig) -> E2eResult<()> {
    let client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()?;

    debug!("Probing {}", url);
    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| E2eError::Navigation(format!("{}: {}", url, e)))?;

    let status = resp.status();
    if status.is_success() || status.is_redirection() {
        info!("Target {} is up ({})", url, status);
        Ok(())
    } else {
        Err(E2eError::Navigation(format!("{}: status {}", url, status)))
    }
}
