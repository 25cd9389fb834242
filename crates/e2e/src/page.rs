//! Page object for the translator page

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info};

use crate::browser::BrowserSession;
use crate::config::{Selectors, Timings};
use crate::error::E2eResult;
use crate::sync::{self, SettleStrategy};

/// High-level operations on the translator page over any [`BrowserSession`]
pub struct TranslatorPage<'a, S: BrowserSession + ?Sized> {
    session: &'a S,
    url: String,
    selectors: Selectors,
    timings: Timings,
    settle: SettleStrategy,
}

impl<'a, S: BrowserSession + ?Sized> TranslatorPage<'a, S> {
    pub fn new(
        session: &'a S,
        url: impl Into<String>,
        selectors: Selectors,
        timings: Timings,
        settle: SettleStrategy,
    ) -> Self {
        Self {
            session,
            url: url.into(),
            selectors,
            timings,
            settle,
        }
    }

    pub fn session(&self) -> &S {
        self.session
    }

    /// Load the page and give client-side rendering time to finish
    pub async fn navigate(&self) -> E2eResult<()> {
        debug!("Navigating to {}", self.url);
        self.session.goto(&self.url).await?;
        self.session.wait_for_network_idle().await?;
        sleep(self.timings.page_load()).await;
        Ok(())
    }

    /// Clear the input and wait for the debounced output to follow
    pub async fn clear_and_wait(&self) -> E2eResult<()> {
        self.session.clear(&self.selectors.input_label).await?;
        sleep(self.timings.after_clear()).await;
        Ok(())
    }

    /// Set the input text in one step
    pub async fn type_input(&self, text: &str) -> E2eResult<()> {
        self.session.fill(&self.selectors.input_label, text).await
    }

    /// Append text key by key, as a user would
    pub async fn type_sequentially(&self, text: &str, delay: Duration) -> E2eResult<()> {
        self.session
            .press_sequentially(&self.selectors.input_label, text, delay)
            .await
    }

    /// Presence poll then settle; returns the settled text
    pub async fn wait_for_output(&self) -> E2eResult<String> {
        let first = sync::wait_for_presence(
            self.session,
            &self.selectors.output,
            self.timings.presence_timeout(),
            self.timings.poll_interval(),
        )
        .await?;
        debug!("Output present: '{}'", first);

        sync::settle(self.session, &self.selectors.output, &self.settle).await
    }

    /// Trimmed output text as it is right now, without waiting
    pub async fn read_output(&self) -> E2eResult<String> {
        sync::read_output(self.session, &self.selectors.output).await
    }

    /// Poll until the output region is empty again
    pub async fn wait_for_empty_output(&self) -> E2eResult<()> {
        sync::wait_for_empty(
            self.session,
            &self.selectors.output,
            self.timings.presence_timeout(),
            self.timings.poll_interval(),
        )
        .await
    }

    /// Clear, type, wait for the output to settle, and read it
    pub async fn perform_translation(&self, input: &str) -> E2eResult<String> {
        self.clear_and_wait().await?;
        self.type_input(input).await?;
        let output = self.wait_for_output().await?;
        info!("'{}' -> '{}'", input, output);
        Ok(output)
    }
}
