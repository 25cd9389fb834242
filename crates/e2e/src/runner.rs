//! Suite runner: drives every fixture through the page object and reports

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::browser::{BrowserSession, SessionFactory};
use crate::config::SuiteConfig;
use crate::error::{E2eError, E2eResult};
use crate::fixtures::{FixtureKind, FixtureTable, TestCase, UiScenario};
use crate::page::TranslatorPage;
use crate::target::{self, ProbeConfig};

/// What happened to one case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CaseOutcome {
    Passed,

    /// Output settled on something other than the expected text
    Mismatch { actual: String },

    /// A UI-level check failed (partial output missing, output not cleared)
    AssertionFailed { message: String },

    /// No output appeared within the presence bound
    TimedOut { error: String },

    /// Navigation or browser failure
    Errored { error: String },
}

impl CaseOutcome {
    fn from_error(e: E2eError) -> Self {
        if e.is_output_timeout() {
            CaseOutcome::TimedOut { error: e.to_string() }
        } else {
            CaseOutcome::Errored { error: e.to_string() }
        }
    }

    fn describe(&self) -> String {
        match self {
            CaseOutcome::Passed => "passed".into(),
            CaseOutcome::Mismatch { actual } => format!("got '{}'", actual),
            CaseOutcome::AssertionFailed { message } => message.clone(),
            CaseOutcome::TimedOut { error } | CaseOutcome::Errored { error } => error.clone(),
        }
    }
}

/// How a known-defect fixture behaved compared to its documented output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefectStatus {
    /// Still renders the documented wrong output
    Reproduced,
    /// Still wrong, but differently
    Changed,
    /// Now renders the expected output
    Fixed,
}

/// Result of running a single case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
    pub id: String,
    pub name: String,
    pub kind: FixtureKind,
    pub input: String,
    pub expected: String,
    #[serde(flatten)]
    pub outcome: CaseOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub known_defect: Option<DefectStatus>,
    pub duration_ms: u64,
}

impl CaseResult {
    pub fn passed(&self) -> bool {
        self.outcome == CaseOutcome::Passed
    }

    /// Failed, and not merely reproducing a documented defect
    pub fn is_unexpected_failure(&self, strict: bool) -> bool {
        !self.passed() && (strict || self.known_defect != Some(DefectStatus::Reproduced))
    }
}

/// Result of running all cases
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub known_defects: usize,
    pub duration_ms: u64,
    pub cases: Vec<CaseResult>,
}

impl SuiteResult {
    fn from_cases(started_at: DateTime<Utc>, duration_ms: u64, cases: Vec<CaseResult>) -> Self {
        let passed = cases.iter().filter(|c| c.passed()).count();
        let known_defects = cases
            .iter()
            .filter(|c| c.known_defect == Some(DefectStatus::Reproduced))
            .count();
        Self {
            started_at,
            total: cases.len(),
            passed,
            failed: cases.len() - passed,
            known_defects,
            duration_ms,
            cases,
        }
    }

    pub fn unexpected_failures(&self, strict: bool) -> usize {
        self.cases
            .iter()
            .filter(|c| c.is_unexpected_failure(strict))
            .count()
    }

    pub fn success(&self, strict: bool) -> bool {
        self.unexpected_failures(strict) == 0
    }

    pub fn case(&self, id: &str) -> Option<&CaseResult> {
        self.cases.iter().find(|c| c.id == id)
    }

    /// Write test results to `<dir>/test-results.json`
    pub fn write_to(&self, dir: &Path) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(dir)?;

        let path = dir.join("test-results.json");
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

/// Compare one settled output against a fixture
pub fn judge(case: &TestCase, result: E2eResult<String>) -> (CaseOutcome, Option<DefectStatus>) {
    let outcome = match result {
        Ok(actual) if actual == case.expected => CaseOutcome::Passed,
        Ok(actual) => CaseOutcome::Mismatch { actual },
        Err(e) => CaseOutcome::from_error(e),
    };

    let defect = case.known_actual.as_ref().and_then(|known| match &outcome {
        CaseOutcome::Passed => Some(DefectStatus::Fixed),
        CaseOutcome::Mismatch { actual } if actual == known => Some(DefectStatus::Reproduced),
        CaseOutcome::Mismatch { .. } => Some(DefectStatus::Changed),
        _ => None,
    });

    (outcome, defect)
}

/// Main suite runner
pub struct SuiteRunner<F: SessionFactory> {
    factory: Arc<F>,
    config: Arc<SuiteConfig>,
    probe: ProbeConfig,
}

impl<F: SessionFactory + 'static> SuiteRunner<F> {
    pub fn new(factory: F, config: SuiteConfig) -> E2eResult<Self> {
        config.validate()?;
        Ok(Self {
            factory: Arc::new(factory),
            config: Arc::new(config),
            probe: ProbeConfig::default(),
        })
    }

    pub fn with_probe(mut self, probe: ProbeConfig) -> Self {
        self.probe = probe;
        self
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    /// Make sure the site answers before spending time on browsers
    pub async fn preflight(&self) -> E2eResult<()> {
        target::probe(&self.config.url, &self.probe).await
    }

    /// Run every case in `table`; one case failing never stops the others
    pub async fn run(&self, table: &FixtureTable) -> E2eResult<SuiteResult> {
        let started_at = Utc::now();
        let start = Instant::now();

        for id in table.duplicate_ids() {
            warn!("Fixture id '{}' is used more than once", id);
        }

        let cases: Vec<TestCase> = table.cases().cloned().collect();
        let case_count = cases.len();
        let workers = self.config.workers.min(case_count.max(1));
        info!("Running {} case(s) on {} worker(s)...", table.len(), workers);

        let queue = Arc::new(Mutex::new(cases.into_iter().enumerate().collect::<VecDeque<_>>()));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut set = JoinSet::new();
        if case_count > 0 {
            for worker in 0..workers {
                let factory = Arc::clone(&self.factory);
                let config = Arc::clone(&self.config);
                let queue = Arc::clone(&queue);
                let tx = tx.clone();
                set.spawn(async move { work(worker, factory, config, queue, tx).await });
            }
        }
        drop(tx);

        let mut indexed = Vec::with_capacity(case_count);
        while let Some(item) = rx.recv().await {
            indexed.push(item);
        }

        let mut first_error = None;
        while let Some(joined) = set.join_next().await {
            let outcome = joined.map_err(|e| E2eError::Playwright(format!("worker panicked: {}", e)));
            if let Err(e) = outcome.and_then(|r| r) {
                error!("Worker failed: {}", e);
                first_error.get_or_insert(e);
            }
        }

        let leftover = queue.lock().map(|q| q.len()).unwrap_or(0);
        if leftover > 0 {
            return Err(first_error.unwrap_or_else(|| {
                E2eError::Playwright(format!("{} case(s) were never run", leftover))
            }));
        }

        indexed.sort_by_key(|(i, _)| *i);
        let mut results: Vec<CaseResult> = indexed.into_iter().map(|(_, r)| r).collect();

        if let Some(scenario) = &table.ui {
            let result = match self.factory.open().await {
                Ok(session) => {
                    let result = run_ui_scenario(&session, &self.config, scenario).await;
                    if let Err(e) = session.close().await {
                        warn!("Closing session failed: {}", e);
                    }
                    result
                }
                Err(e) => {
                    let result = ui_result(scenario, CaseOutcome::Errored { error: e.to_string() }, 0);
                    log_case(&result);
                    result
                }
            };
            results.push(result);
            sleep(self.config.timings.between_tests()).await;
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        let suite = SuiteResult::from_cases(started_at, duration_ms, results);

        info!("");
        info!(
            "Test Results: {} passed, {} failed ({} known defect(s) reproduced), {} unexpected ({} ms)",
            suite.passed,
            suite.failed,
            suite.known_defects,
            suite.unexpected_failures(self.config.strict),
            duration_ms
        );

        Ok(suite)
    }

    /// Run the suite and write the JSON report to the configured directory
    pub async fn run_and_report(&self, table: &FixtureTable) -> E2eResult<SuiteResult> {
        let suite = self.run(table).await?;
        suite.write_to(&self.config.output_dir)?;
        Ok(suite)
    }
}

/// One worker: open a session, pull cases until the queue is empty
async fn work<F: SessionFactory>(
    worker: usize,
    factory: Arc<F>,
    config: Arc<SuiteConfig>,
    queue: Arc<Mutex<VecDeque<(usize, TestCase)>>>,
    tx: mpsc::UnboundedSender<(usize, CaseResult)>,
) -> E2eResult<()> {
    let session = factory.open().await?;
    debug!("Worker {} has a session", worker);

    loop {
        let next = queue
            .lock()
            .map_err(|_| E2eError::Playwright("case queue poisoned".into()))?
            .pop_front();
        let Some((index, case)) = next else { break };

        let result = run_case(&session, &config, &case).await;
        if tx.send((index, result)).is_err() {
            break;
        }
        sleep(config.timings.between_tests()).await;
    }

    if let Err(e) = session.close().await {
        warn!("Worker {}: closing session failed: {}", worker, e);
    }
    Ok(())
}

fn translator_page<'a, S: BrowserSession + ?Sized>(session: &'a S, config: &SuiteConfig) -> TranslatorPage<'a, S> {
    TranslatorPage::new(
        session,
        config.url.clone(),
        config.selectors.clone(),
        config.timings.clone(),
        config.settle.clone(),
    )
}

/// Fresh navigation, translate, compare
pub async fn run_case<S: BrowserSession + ?Sized>(
    session: &S,
    config: &SuiteConfig,
    case: &TestCase,
) -> CaseResult {
    let start = Instant::now();
    debug!("Running case: {}", case.title());

    let page = translator_page(session, config);
    let translated = match page.navigate().await {
        Ok(()) => page.perform_translation(&case.input).await,
        Err(e) => Err(e),
    };
    let (outcome, known_defect) = judge(case, translated);

    let result = CaseResult {
        id: case.id.clone(),
        name: case.name.clone(),
        kind: case.kind,
        input: case.input.clone(),
        expected: case.expected.clone(),
        outcome,
        known_defect,
        duration_ms: start.elapsed().as_millis() as u64,
    };
    log_case(&result);
    result
}

/// Progressive typing, full translation, then clear
pub async fn run_ui_scenario<S: BrowserSession + ?Sized>(
    session: &S,
    config: &SuiteConfig,
    scenario: &UiScenario,
) -> CaseResult {
    let start = Instant::now();
    debug!("Running UI scenario: {}", scenario.title());

    let page = translator_page(session, config);
    let outcome = match ui_steps(&page, scenario).await {
        Ok(outcome) => outcome,
        Err(e) => CaseOutcome::from_error(e),
    };

    let result = ui_result(scenario, outcome, start.elapsed().as_millis() as u64);
    log_case(&result);
    result
}

fn ui_result(scenario: &UiScenario, outcome: CaseOutcome, duration_ms: u64) -> CaseResult {
    CaseResult {
        id: scenario.id.clone(),
        name: scenario.name.clone(),
        kind: FixtureKind::Ui,
        input: scenario.input.clone(),
        expected: scenario.expected_full.clone(),
        outcome,
        known_defect: None,
        duration_ms,
    }
}

async fn ui_steps<S: BrowserSession + ?Sized>(
    page: &TranslatorPage<'_, S>,
    scenario: &UiScenario,
) -> E2eResult<CaseOutcome> {
    page.navigate().await?;
    page.clear_and_wait().await?;

    page.type_sequentially(scenario.partial(), scenario.type_delay()).await?;
    sleep(scenario.partial_wait()).await;
    let partial = page.read_output().await?;
    if partial.is_empty() {
        return Ok(CaseOutcome::AssertionFailed {
            message: format!("no output after typing '{}'", scenario.partial()),
        });
    }
    debug!("Partial output: '{}'", partial);

    page.type_sequentially(scenario.remainder(), scenario.type_delay()).await?;
    let full = page.wait_for_output().await?;
    if full != scenario.expected_full {
        return Ok(CaseOutcome::Mismatch { actual: full });
    }

    page.clear_and_wait().await?;
    match page.wait_for_empty_output().await {
        Ok(()) => Ok(CaseOutcome::Passed),
        Err(E2eError::Timeout(what)) => Ok(CaseOutcome::AssertionFailed {
            message: format!("timed out waiting for {}", what),
        }),
        Err(e) => Err(e),
    }
}

fn log_case(result: &CaseResult) {
    match (&result.outcome, result.known_defect) {
        (CaseOutcome::Passed, Some(DefectStatus::Fixed)) => {
            warn!("✓ {} - {} (known defect fixed upstream)", result.id, result.name)
        }
        (CaseOutcome::Passed, _) => {
            info!("✓ {} - {} ({} ms)", result.id, result.name, result.duration_ms)
        }
        (outcome, Some(DefectStatus::Reproduced)) => {
            info!("✗ {} - {} - {} (known defect)", result.id, result.name, outcome.describe())
        }
        (outcome, Some(DefectStatus::Changed)) => {
            warn!("✗ {} - {} - {} (known defect changed)", result.id, result.name, outcome.describe())
        }
        (outcome, _) => error!("✗ {} - {} - {}", result.id, result.name, outcome.describe()),
    }
}
