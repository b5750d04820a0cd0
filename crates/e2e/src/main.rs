//! Command-line entry point for the edit-route verification run.
//!
//! Exit codes: 0 on success, 1 when the scenario fails, 2 when the run
//! could not be started.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use routes_e2e::playwright::{Browser, PlaywrightConfig};
use routes_e2e::scenario::Viewport;
use routes_e2e::{E2eError, RunnerConfig, ScenarioRunner};

#[derive(Parser, Debug)]
#[command(name = "verify-edit-route")]
#[command(about = "Create a route, rename it, and capture the result")]
#[command(version)]
struct Args {
    /// Base URL of the running application
    #[arg(long, env = "ROUTES_E2E_BASE_URL", default_value = "http://localhost:5174")]
    base_url: String,

    /// Where the final screenshot is written (overwritten on each run)
    #[arg(long, default_value = "jules-scratch/verification/verification.png")]
    screenshot: PathBuf,

    /// Output directory for the driver script and JSON results
    #[arg(short, long, default_value = "test-results")]
    output: PathBuf,

    /// Browser to use (chromium, firefox, webkit)
    #[arg(long, default_value = "chromium")]
    browser: Browser,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Viewport width
    #[arg(long, default_value = "1280")]
    viewport_width: u32,

    /// Viewport height
    #[arg(long, default_value = "720")]
    viewport_height: u32,

    /// Override the driver's default timeout for actions and assertions
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// How long to wait for the application to answer before giving up
    #[arg(long, default_value = "30")]
    startup_timeout_secs: u64,

    /// Do not probe the application before launching the browser
    #[arg(long)]
    skip_preflight: bool,

    /// Node.js executable
    #[arg(long, default_value = "node")]
    node: PathBuf,
}

impl Args {
    fn into_config(self) -> RunnerConfig {
        RunnerConfig {
            base_url: self.base_url,
            screenshot: self.screenshot,
            output_dir: self.output,
            viewport: Viewport {
                width: self.viewport_width,
                height: self.viewport_height,
            },
            playwright: PlaywrightConfig {
                node_binary: self.node,
                browser: self.browser,
                headless: !self.headed,
                timeout_ms: self.timeout_ms,
                ..Default::default()
            },
            startup_timeout: Duration::from_secs(self.startup_timeout_secs),
            skip_preflight: self.skip_preflight,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let runner = ScenarioRunner::with_config(args.into_config());

    let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create tokio runtime: {}", e);
            std::process::exit(2);
        }
    };

    match rt.block_on(runner.run()) {
        Ok(_) => std::process::exit(0),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(exit_code(&e));
        }
    }
}

fn exit_code(e: &E2eError) -> i32 {
    if e.is_scenario_failure() {
        1
    } else {
        2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_reproduce_fixed_run() {
        let config = Args::parse_from(["verify-edit-route"]).into_config();
        assert_eq!(config.base_url, "http://localhost:5174");
        assert_eq!(
            config.screenshot,
            PathBuf::from("jules-scratch/verification/verification.png")
        );
        assert!(config.playwright.headless);
        assert_eq!(config.playwright.browser, Browser::Chromium);
        assert_eq!(config.playwright.timeout_ms, None);
        assert!(!config.skip_preflight);
    }

    #[test]
    fn test_flags_override() {
        let config = Args::parse_from([
            "verify-edit-route",
            "--base-url",
            "http://127.0.0.1:3000",
            "--browser",
            "firefox",
            "--headed",
            "--timeout-ms",
            "10000",
        ])
        .into_config();
        assert_eq!(config.base_url, "http://127.0.0.1:3000");
        assert_eq!(config.playwright.browser, Browser::Firefox);
        assert!(!config.playwright.headless);
        assert_eq!(config.playwright.timeout_ms, Some(10000));
    }

    #[test]
    fn test_exit_codes() {
        let assertion = E2eError::AssertionFailed {
            step: "expect-visible:heading[=Edit Route]".into(),
            reason: "not visible".into(),
        };
        assert_eq!(exit_code(&assertion), 1);
        assert_eq!(exit_code(&E2eError::PlaywrightNotFound), 2);
    }
}
