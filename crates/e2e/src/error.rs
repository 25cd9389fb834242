//! Error types for the E2E harness

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Target unreachable: {0}")]
    Navigation(String),

    #[error("Playwright not found. Install with: npm install playwright && npx playwright install chromium")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Fixture parse error: {0}")]
    FixtureParse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("No output appeared for '{selector}' within {}ms", .waited.as_millis())]
    OutputTimeout { selector: String, waited: Duration },

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl E2eError {
    /// Whether this error is a presence-phase timeout rather than some other failure
    pub fn is_output_timeout(&self) -> bool {
        matches!(self, E2eError::OutputTimeout { .. })
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
