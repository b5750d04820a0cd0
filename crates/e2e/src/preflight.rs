//! Preflight probe for the application under test

use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{E2eError, E2eResult};

/// Wait until the application answers any HTTP request at its base URL.
///
/// Any status counts as reachable; the scenario decides what the pages
/// must contain. Connection refusals are expected while the app boots.
pub async fn wait_for_reachable(config: &PreflightConfig) -> E2eResult<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()?;

    let start = Instant::now();
    let mut attempts = 0;

    loop {
        attempts += 1;

        match client.get(&config.base_url).send().await {
            Ok(resp) => {
                info!("Application reachable at {} ({})", config.base_url, resp.status());
                return Ok(());
            }
            Err(e) => {
                if attempts == 1 {
                    info!("Waiting for application at {}...", config.base_url);
                }
                if !e.is_connect() {
                    warn!("Preflight error: {}", e);
                }
            }
        }

        if start.elapsed() >= config.startup_timeout {
            break;
        }
        sleep(config.poll_interval).await;
    }

    Err(E2eError::TargetUnreachable {
        url: config.base_url.clone(),
        attempts,
    })
}

/// Configuration for the preflight probe
#[derive(Debug, Clone)]
pub struct PreflightConfig {
    pub base_url: String,
    pub startup_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for PreflightConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5174".to_string(),
            startup_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(100),
        }
    }
}
