//! Suite configuration: target URL, selectors and timing constants

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{E2eError, E2eResult};
use crate::sync::SettleStrategy;

pub const DEFAULT_URL: &str = "https://www.swifttranslator.com/";
pub const DEFAULT_INPUT_LABEL: &str = "Input Your Singlish Text Here.";
pub const DEFAULT_OUTPUT_SELECTOR: &str =
    "div.w-full.h-80.p-3.rounded-lg.ring-1.ring-slate-300.whitespace-pre-wrap";

/// Top-level configuration for a suite run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Page under test
    pub url: String,

    /// How the input and output regions are located
    pub selectors: Selectors,

    /// Fixed waits and poll bounds
    pub timings: Timings,

    /// What to do once output is present
    pub settle: SettleStrategy,

    /// Number of independent browser sessions
    pub workers: usize,

    /// Count reproduced known defects as failures
    pub strict: bool,

    /// Directory the JSON report is written to
    pub output_dir: PathBuf,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            selectors: Selectors::default(),
            timings: Timings::default(),
            settle: SettleStrategy::default(),
            workers: 1,
            strict: false,
            output_dir: PathBuf::from("test-results"),
        }
    }
}

impl SuiteConfig {
    /// Parse a config from a YAML string; missing keys keep their defaults
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn validate(&self) -> E2eResult<()> {
        if self.workers == 0 {
            return Err(E2eError::Config("workers must be at least 1".into()));
        }
        if self.selectors.input_label.trim().is_empty() {
            return Err(E2eError::Config("input label must not be empty".into()));
        }
        if self.selectors.output.trim().is_empty() {
            return Err(E2eError::Config("output selector must not be empty".into()));
        }
        if self.timings.poll_interval_ms == 0 {
            return Err(E2eError::Config("poll interval must be non-zero".into()));
        }
        if let SettleStrategy::Stable { consecutive, interval_ms, .. } = self.settle {
            if consecutive < 2 || interval_ms == 0 {
                return Err(E2eError::Config(
                    "stable settle needs at least 2 reads and a non-zero interval".into(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    /// Accessible name of the input textbox
    pub input_label: String,

    /// Structural fingerprint shared by the output region(s)
    pub output: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            input_label: DEFAULT_INPUT_LABEL.to_string(),
            output: DEFAULT_OUTPUT_SELECTOR.to_string(),
        }
    }
}

/// Timing constants, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// Extra wait after the page reports network idle
    pub page_load_ms: u64,

    /// Wait after clearing the input so the debounced output catches up
    pub after_clear_ms: u64,

    /// Upper bound on the presence phase
    pub presence_timeout_ms: u64,

    /// Poll cadence of the presence phase
    pub poll_interval_ms: u64,

    /// Pacing between cases
    pub between_tests_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            page_load_ms: 2000,
            after_clear_ms: 1000,
            presence_timeout_ms: 10_000,
            poll_interval_ms: 100,
            between_tests_ms: 2000,
        }
    }
}

impl Timings {
    pub fn page_load(&self) -> Duration {
        Duration::from_millis(self.page_load_ms)
    }

    pub fn after_clear(&self) -> Duration {
        Duration::from_millis(self.after_clear_ms)
    }

    pub fn presence_timeout(&self) -> Duration {
        Duration::from_millis(self.presence_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn between_tests(&self) -> Duration {
        Duration::from_millis(self.between_tests_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_site() {
        let config = SuiteConfig::default();
        assert_eq!(config.url, DEFAULT_URL);
        assert_eq!(config.timings.presence_timeout(), Duration::from_secs(10));
        assert_eq!(config.settle, SettleStrategy::Fixed { delay_ms: 3000 });
        config.validate().unwrap();
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = r#"
url: http://127.0.0.1:4000/
timings:
  between_tests_ms: 0
settle:
  mode: stable
  consecutive: 3
  interval_ms: 250
  max_wait_ms: 5000
"#;
        let config = SuiteConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.url, "http://127.0.0.1:4000/");
        assert_eq!(config.timings.between_tests_ms, 0);
        assert_eq!(config.timings.after_clear_ms, 1000);
        assert_eq!(config.selectors.input_label, DEFAULT_INPUT_LABEL);
        assert!(matches!(config.settle, SettleStrategy::Stable { consecutive: 3, .. }));
    }

    #[test]
    fn rejects_zero_workers() {
        let err = SuiteConfig::from_yaml("workers: 0").unwrap_err();
        assert!(matches!(err, E2eError::Config(_)));
    }

    #[test]
    fn rejects_single_read_stability() {
        let yaml = "settle: { mode: stable, consecutive: 1, interval_ms: 100, max_wait_ms: 1000 }";
        assert!(SuiteConfig::from_yaml(yaml).is_err());
    }
}
