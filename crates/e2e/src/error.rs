//! Error types for the edit-route verification run

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Playwright not found. Install with: npm i -D @playwright/test && npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Application not reachable at {url} after {attempts} attempts")]
    TargetUnreachable { url: String, attempts: usize },

    #[error("Invalid scenario: {0}")]
    InvalidScenario(String),

    #[error("Action failed: {step} - {reason}")]
    ActionFailed { step: String, reason: String },

    #[error("Assertion failed: {step} - {reason}")]
    AssertionFailed { step: String, reason: String },

    #[error("Screenshot error: {0}")]
    Screenshot(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl E2eError {
    /// True when the scenario itself failed, as opposed to the runner being
    /// unable to start it.
    pub fn is_scenario_failure(&self) -> bool {
        matches!(
            self,
            E2eError::ActionFailed { .. }
                | E2eError::AssertionFailed { .. }
                | E2eError::Screenshot(_)
                | E2eError::Image(_)
        )
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
