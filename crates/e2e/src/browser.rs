//! Browser capability the page object is written against
//!
//! Anything that can drive a page (the Playwright bridge, an in-memory fake)
//! implements [`BrowserSession`]. The harness never talks to a concrete
//! backend directly.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::E2eResult;

/// A point-in-time view of one element matched by a selector
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    /// Upper-case tag name, as reported by the DOM (`DIV`, `TEXTAREA`, ...)
    pub tag: String,

    /// Value of the `role` attribute, if any
    #[serde(default)]
    pub role: Option<String>,

    /// Raw `textContent`
    #[serde(default)]
    pub text: String,
}

impl ElementSnapshot {
    pub fn new(tag: impl Into<String>, role: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            role: role.map(String::from),
            text: text.into(),
        }
    }

    /// Whether the element is the text-entry surface rather than an output region
    pub fn is_input_role(&self) -> bool {
        self.tag.eq_ignore_ascii_case("textarea") || self.role.as_deref() == Some("textbox")
    }

    pub fn trimmed_text(&self) -> &str {
        self.text.trim()
    }
}

/// One browser page the harness can drive
///
/// Inputs are addressed by accessible label (`getByRole('textbox', { name })`),
/// outputs by a CSS selector.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigate to an absolute URL
    async fn goto(&self, url: &str) -> E2eResult<()>;

    /// Wait until the page has had no network traffic for a while
    async fn wait_for_network_idle(&self) -> E2eResult<()>;

    /// Clear the text input with the given accessible label
    async fn clear(&self, label: &str) -> E2eResult<()>;

    /// Replace the text input's content in one step
    async fn fill(&self, label: &str, text: &str) -> E2eResult<()>;

    /// Type text key by key, pausing `delay` between keys
    async fn press_sequentially(&self, label: &str, text: &str, delay: Duration) -> E2eResult<()>;

    /// Snapshot every element matching `selector`, in document order
    async fn query(&self, selector: &str) -> E2eResult<Vec<ElementSnapshot>>;

    /// Release the session
    async fn close(&self) -> E2eResult<()>;
}

/// Creates independent sessions, one per runner worker
#[async_trait]
pub trait SessionFactory: Send + Sync {
    type Session: BrowserSession + 'static;

    async fn open(&self) -> E2eResult<Self::Session>;
}
