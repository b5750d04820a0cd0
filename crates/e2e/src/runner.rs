//! Runs the edit-route scenario end to end: preflight, browser, artifact

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::artifact::{self, ScreenshotReport};
use crate::error::{E2eError, E2eResult};
use crate::playwright::{Browser, PlaywrightConfig, PlaywrightHandle, StepResult};
use crate::preflight::{self, PreflightConfig};
use crate::scenario::{Scenario, StepKind, Viewport};

/// Result of one scenario run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub success: bool,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub base_url: String,
    pub browser: Browser,
    pub steps: Vec<StepResult>,
    pub screenshot: Option<ScreenshotReport>,
    pub error: Option<String>,
}

/// Drives the edit-route scenario against a running application
pub struct ScenarioRunner {
    config: RunnerConfig,
}

impl ScenarioRunner {
    pub fn new() -> Self {
        Self::with_config(RunnerConfig::default())
    }

    pub fn with_config(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// The scenario this runner executes, with paths resolved
    pub fn scenario(&self) -> E2eResult<Scenario> {
        let screenshot = artifact::absolute(&self.config.screenshot)?;
        let mut scenario = Scenario::edit_route_name(&self.config.base_url, &screenshot);
        scenario.viewport = self.config.viewport;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Run every step in order. The first failing action or assertion
    /// aborts the run and is returned as the error; the JSON report is
    /// written either way.
    pub async fn run(&self) -> E2eResult<ScenarioResult> {
        let scenario = self.scenario()?;

        if !self.config.skip_preflight {
            preflight::wait_for_reachable(&PreflightConfig {
                base_url: self.config.base_url.clone(),
                startup_timeout: self.config.startup_timeout,
                ..Default::default()
            })
            .await?;
        }

        for path in scenario.screenshots() {
            artifact::prepare(path)?;
        }

        let playwright = PlaywrightHandle::new(
            self.config.playwright.clone().with_script_dir(&self.config.output_dir),
        )?;

        self.run_with(&playwright, &scenario).await
    }

    /// Execute `scenario` with an already configured handle, verify the
    /// screenshot and write the report, including when the driver crashes.
    pub async fn run_with(
        &self,
        playwright: &PlaywrightHandle,
        scenario: &Scenario,
    ) -> E2eResult<ScenarioResult> {
        let started_at = Utc::now();
        let start = Instant::now();

        let (steps, mut failure) = match playwright.execute(scenario).await {
            Ok(steps) => {
                let failure = steps.iter().find(|r| !r.success).map(step_failure);
                (steps, failure)
            }
            Err(e) => (Vec::new(), Some(e)),
        };

        let mut screenshot = None;
        if failure.is_none() {
            for path in scenario.screenshots() {
                match artifact::verify(path) {
                    Ok(report) => screenshot = Some(report),
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }
        }

        let result = ScenarioResult {
            name: scenario.name.clone(),
            success: failure.is_none(),
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            base_url: self.config.base_url.clone(),
            browser: self.config.playwright.browser,
            steps,
            screenshot,
            error: failure.as_ref().map(ToString::to_string),
        };

        self.write_results(&result)?;

        match failure {
            Some(e) => {
                error!("✗ {} - {}", result.name, e);
                Err(e)
            }
            None => {
                info!("✓ {} ({} ms)", result.name, result.duration_ms);
                Ok(result)
            }
        }
    }

    /// Write the run report to JSON
    pub fn write_results(&self, result: &ScenarioResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join(format!("{}-results.json", result.name));
        let json = serde_json::to_string_pretty(result)?;
        std::fs::write(&path, json)?;

        debug!("Results written to: {}", path.display());
        Ok(path)
    }
}

impl Default for ScenarioRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// Turn a failed step into the error that aborts the run
pub fn step_failure(result: &StepResult) -> E2eError {
    let reason = result.error.clone().unwrap_or_else(|| "unknown error".to_string());
    match result.kind {
        StepKind::Action => E2eError::ActionFailed {
            step: result.step_name.clone(),
            reason,
        },
        StepKind::Assertion => E2eError::AssertionFailed {
            step: result.step_name.clone(),
            reason,
        },
    }
}

/// Configuration for the scenario runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub base_url: String,
    pub screenshot: PathBuf,
    pub output_dir: PathBuf,
    pub viewport: Viewport,
    pub playwright: PlaywrightConfig,
    pub startup_timeout: Duration,
    pub skip_preflight: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5174".to_string(),
            screenshot: PathBuf::from("jules-scratch/verification/verification.png"),
            output_dir: PathBuf::from("test-results"),
            viewport: Viewport::default(),
            playwright: PlaywrightConfig::default(),
            startup_timeout: Duration::from_secs(30),
            skip_preflight: false,
        }
    }
}
