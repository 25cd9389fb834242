//! SwiftTranslator E2E Test Framework
//!
//! This crate drives a browser against the live Singlish-to-Sinhala
//! transliteration site and checks its output against a fixture table:
//! - Controls Playwright through a long-lived Node.js bridge (JSON lines)
//! - Parses the declarative YAML fixture table
//! - Waits for debounced, incrementally rendered output with a bounded
//!   presence poll followed by a settle phase
//! - Tracks documented upstream defects separately from real regressions
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    E2E Test Runner (Rust)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  SuiteRunner<F: SessionFactory>                             │
//! │    ├── preflight() -> target reachable?                     │
//! │    ├── run(table) -> SuiteResult                            │
//! │    │     └── per worker: factory.open() -> BrowserSession   │
//! │    └── write_to(dir) -> test-results.json                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TranslatorPage<S: BrowserSession>                          │
//! │    ├── navigate / clear_and_wait / type_input               │
//! │    ├── wait_for_output  (presence poll, then settle)        │
//! │    ├── read_output                                          │
//! │    └── perform_translation(input) -> String                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  FixtureTable (YAML)                                        │
//! │    ├── positive: [TestCase]                                 │
//! │    ├── negative: [TestCase + documented actual]             │
//! │    └── ui: UiScenario                                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod browser;
pub mod config;
pub mod error;
pub mod fixtures;
pub mod page;
pub mod playwright;
pub mod runner;
pub mod sync;
pub mod target;

pub use browser::{BrowserSession, ElementSnapshot, SessionFactory};
pub use config::SuiteConfig;
pub use error::{E2eError, E2eResult};
pub use fixtures::{FixtureTable, TestCase, UiScenario};
pub use page::TranslatorPage;
pub use runner::{SuiteResult, SuiteRunner};
