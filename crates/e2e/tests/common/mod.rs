//! In-memory stand-in for the translator page
//!
//! Models the behaviour the harness has to cope with: output is debounced
//! behind input changes, then rendered in two passes (first half of the
//! words, then everything). All timing runs on tokio's clock, so tests use
//! `start_paused = true` and finish instantly.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, Instant};

use swifttranslator_e2e::config::{DEFAULT_INPUT_LABEL, DEFAULT_OUTPUT_SELECTOR};
use swifttranslator_e2e::{BrowserSession, E2eError, E2eResult, ElementSnapshot, SessionFactory};

#[derive(Debug, Clone)]
pub struct Behavior {
    /// Quiet period after the last input change before output updates
    pub debounce: Duration,

    /// Time between the partial and the complete render
    pub render_lag: Duration,

    /// Never render anything
    pub frozen: bool,

    /// Fail every navigation
    pub unreachable: bool,

    pub words: HashMap<String, String>,
}

impl Default for Behavior {
    fn default() -> Self {
        let words = [
            ("mama", "මම"),
            ("bath", "බත්"),
            ("kanavaa.", "කනවා."),
            ("api", "අපි"),
            ("yamu", "යමු"),
            ("bhavana", "බ්හවන"),
            ("dharmaya", "දර්මය"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            debounce: Duration::from_millis(300),
            render_lag: Duration::from_millis(1200),
            frozen: false,
            unreachable: false,
            words,
        }
    }
}

impl Behavior {
    fn translate_words(&self, input: &str, take: usize) -> String {
        input
            .split(' ')
            .filter(|w| !w.is_empty())
            .take(take)
            .map(|w| self.words.get(w).cloned().unwrap_or_else(|| w.to_string()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn full(&self, input: &str) -> String {
        self.translate_words(input, usize::MAX)
    }

    pub fn partial(&self, input: &str) -> String {
        let n = input.split(' ').filter(|w| !w.is_empty()).count();
        self.translate_words(input, n.div_ceil(2))
    }
}

#[derive(Debug)]
struct PageState {
    input: String,
    changed_at: Instant,
    shown_before_change: String,
}

pub struct FakeSession {
    behavior: Behavior,
    state: Mutex<PageState>,
    pub navigations: AtomicUsize,
    pub queries: AtomicUsize,
    pub closed: AtomicUsize,
}

impl FakeSession {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            state: Mutex::new(PageState {
                input: String::new(),
                changed_at: Instant::now(),
                shown_before_change: String::new(),
            }),
            navigations: AtomicUsize::new(0),
            queries: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
        }
    }

    fn displayed(&self, state: &PageState, now: Instant) -> String {
        if self.behavior.frozen {
            return String::new();
        }
        let since = now.saturating_duration_since(state.changed_at);
        if since < self.behavior.debounce {
            state.shown_before_change.clone()
        } else if since < self.behavior.debounce + self.behavior.render_lag {
            self.behavior.partial(&state.input)
        } else {
            self.behavior.full(&state.input)
        }
    }

    fn set_input(&self, input: String) {
        let now = Instant::now();
        let mut state = self.state.lock().unwrap();
        state.shown_before_change = self.displayed(&state, now);
        state.input = input;
        state.changed_at = now;
    }

    fn check_label(label: &str) -> E2eResult<()> {
        if label == DEFAULT_INPUT_LABEL {
            Ok(())
        } else {
            Err(E2eError::Playwright(format!("no textbox named '{}'", label)))
        }
    }

    pub fn input(&self) -> String {
        self.state.lock().unwrap().input.clone()
    }

    pub fn shown_now(&self) -> String {
        let state = self.state.lock().unwrap();
        self.displayed(&state, Instant::now())
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        if self.behavior.unreachable {
            return Err(E2eError::Navigation(format!("{}: net::ERR_NAME_NOT_RESOLVED", url)));
        }
        self.navigations.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        state.input.clear();
        state.shown_before_change.clear();
        state.changed_at = Instant::now();
        Ok(())
    }

    async fn wait_for_network_idle(&self) -> E2eResult<()> {
        sleep(Duration::from_millis(500)).await;
        Ok(())
    }

    async fn clear(&self, label: &str) -> E2eResult<()> {
        Self::check_label(label)?;
        self.set_input(String::new());
        Ok(())
    }

    async fn fill(&self, label: &str, text: &str) -> E2eResult<()> {
        Self::check_label(label)?;
        self.set_input(text.to_string());
        Ok(())
    }

    async fn press_sequentially(&self, label: &str, text: &str, delay: Duration) -> E2eResult<()> {
        Self::check_label(label)?;
        for ch in text.chars() {
            let mut next = self.input();
            next.push(ch);
            self.set_input(next);
            sleep(delay).await;
        }
        Ok(())
    }

    async fn query(&self, selector: &str) -> E2eResult<Vec<ElementSnapshot>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if selector != DEFAULT_OUTPUT_SELECTOR {
            return Ok(Vec::new());
        }
        let state = self.state.lock().unwrap();
        let shown = self.displayed(&state, Instant::now());
        Ok(vec![
            ElementSnapshot::new("TEXTAREA", None, state.input.clone()),
            ElementSnapshot::new("DIV", None, format!("  {}\n", shown)),
        ])
    }

    async fn close(&self) -> E2eResult<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out fresh [`FakeSession`]s and counts them
#[derive(Clone, Default)]
pub struct FakeFactory {
    pub behavior: Behavior,
    pub opened: Arc<AtomicUsize>,
    pub fail_open: bool,
    /// Sessions that open successfully before every further open fails
    pub open_limit: Option<usize>,
}

impl FakeFactory {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            ..Default::default()
        }
    }
}

#[async_trait]
impl SessionFactory for FakeFactory {
    type Session = FakeSession;

    async fn open(&self) -> E2eResult<FakeSession> {
        if self.fail_open {
            return Err(E2eError::PlaywrightNotFound);
        }
        let opened = self.opened.fetch_add(1, Ordering::SeqCst);
        if self.open_limit.is_some_and(|limit| opened >= limit) {
            self.opened.fetch_sub(1, Ordering::SeqCst);
            return Err(E2eError::Playwright("browser crashed on launch".into()));
        }
        Ok(FakeSession::new(self.behavior.clone()))
    }
}
