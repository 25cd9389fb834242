//! Playwright browser automation
//!
//! Each [`PlaywrightSession`] owns a Node.js bridge process holding one
//! browser page. Requests and replies travel as JSON lines over the bridge's
//! stdin/stdout; stderr is forwarded to tracing.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::browser::{BrowserSession, ElementSnapshot, SessionFactory};
use crate::error::{E2eError, E2eResult};

const BRIDGE_SCRIPT: &str = include_str!("../js/bridge.js");

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" => Ok(Browser::Webkit),
            other => Err(E2eError::Config(format!("unknown browser '{}'", other))),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Node executable
    pub node_binary: PathBuf,

    /// `node_modules` directory that contains `playwright` (None = `./node_modules`)
    pub node_modules: Option<PathBuf>,

    /// Bound on browser launch
    pub launch_timeout: Duration,

    /// Playwright-side bound on navigation and load-state waits
    pub navigation_timeout: Duration,

    /// Bound on any single bridge round trip
    pub request_timeout: Duration,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            node_binary: PathBuf::from("node"),
            node_modules: None,
            launch_timeout: Duration::from_secs(30),
            navigation_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl PlaywrightConfig {
    /// Launch options passed to the bridge as its first argument
    pub fn launch_options(&self) -> serde_json::Value {
        serde_json::json!({
            "browser": self.browser.as_str(),
            "headless": self.headless,
            "viewport": { "width": self.viewport_width, "height": self.viewport_height },
        })
    }

    fn resolved_node_modules(&self) -> E2eResult<PathBuf> {
        match &self.node_modules {
            Some(dir) => Ok(dir.clone()),
            None => Ok(std::env::current_dir()?.join("node_modules")),
        }
    }
}

/// Check if Playwright is installed
pub fn check_playwright_installed() -> E2eResult<()> {
    let output = Command::new("npx")
        .args(["playwright", "--version"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match output {
        Ok(status) if status.success() => Ok(()),
        _ => Err(E2eError::PlaywrightNotFound),
    }
}

/// One bridge request
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum BridgeCommand<'a> {
    Goto { url: &'a str, timeout_ms: u64 },
    WaitForNetworkIdle { timeout_ms: u64 },
    Clear { label: &'a str },
    Fill { label: &'a str, text: &'a str },
    PressSequentially { label: &'a str, text: &'a str, delay_ms: u64 },
    Query { selector: &'a str },
    Close,
}

impl BridgeCommand<'_> {
    fn op(&self) -> &'static str {
        match self {
            BridgeCommand::Goto { .. } => "goto",
            BridgeCommand::WaitForNetworkIdle { .. } => "wait_for_network_idle",
            BridgeCommand::Clear { .. } => "clear",
            BridgeCommand::Fill { .. } => "fill",
            BridgeCommand::PressSequentially { .. } => "press_sequentially",
            BridgeCommand::Query { .. } => "query",
            BridgeCommand::Close => "close",
        }
    }
}

#[derive(Debug, Serialize)]
struct BridgeRequest<'a> {
    id: u64,
    #[serde(flatten)]
    command: BridgeCommand<'a>,
}

#[derive(Debug, Deserialize)]
struct BridgeReply {
    id: u64,
    ok: bool,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    error: Option<String>,
}

struct BridgeIo {
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl BridgeIo {
    /// Read replies until the one for `id`; earlier ids belong to abandoned requests
    async fn read_reply(&mut self, id: u64) -> E2eResult<BridgeReply> {
        loop {
            let line = self
                .stdout
                .next_line()
                .await?
                .ok_or_else(|| E2eError::Playwright("bridge exited".into()))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let reply: BridgeReply = match serde_json::from_str(line) {
                Ok(reply) => reply,
                Err(_) => {
                    debug!("[bridge stdout] {}", line);
                    continue;
                }
            };
            if reply.id == id {
                return Ok(reply);
            }
            debug!("Dropping stale bridge reply {} (waiting for {})", reply.id, id);
        }
    }
}

/// Playwright browser handle
pub struct PlaywrightSession {
    io: Mutex<BridgeIo>,
    child: Mutex<Child>,
    next_id: AtomicU64,
    navigation_timeout: Duration,
    request_timeout: Duration,
    _script_dir: tempfile::TempDir,
}

impl PlaywrightSession {
    /// Spawn the bridge and wait until its page is ready
    pub async fn launch(config: &PlaywrightConfig) -> E2eResult<Self> {
        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("bridge.js");
        std::fs::write(&script_path, BRIDGE_SCRIPT)?;

        let node_modules = config.resolved_node_modules()?;
        debug!(
            "Starting Playwright bridge {} (NODE_PATH={})",
            script_path.display(),
            node_modules.display()
        );

        let mut child = TokioCommand::new(&config.node_binary)
            .arg(&script_path)
            .arg(config.launch_options().to_string())
            .env("NODE_PATH", &node_modules)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                E2eError::Playwright(format!(
                    "failed to spawn {}: {}",
                    config.node_binary.display(),
                    e
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Playwright("bridge stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Playwright("bridge stdout unavailable".into()))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!("[bridge] {}", line);
                }
            });
        }

        let mut io = BridgeIo {
            stdin,
            stdout: BufReader::new(stdout).lines(),
        };

        let ready = timeout(config.launch_timeout, io.read_reply(0))
            .await
            .map_err(|_| {
                E2eError::Playwright(format!(
                    "browser did not start within {}s",
                    config.launch_timeout.as_secs()
                ))
            })??;
        if !ready.ok {
            return Err(E2eError::Playwright(format!(
                "launch failed: {}",
                ready.error.unwrap_or_default()
            )));
        }

        info!("Launched {} (headless: {})", config.browser.as_str(), config.headless);

        Ok(Self {
            io: Mutex::new(io),
            child: Mutex::new(child),
            next_id: AtomicU64::new(1),
            navigation_timeout: config.navigation_timeout,
            request_timeout: config.request_timeout,
            _script_dir: script_dir,
        })
    }

    async fn request(&self, command: BridgeCommand<'_>) -> E2eResult<serde_json::Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let op = command.op();
        let mut line = serde_json::to_string(&BridgeRequest { id, command })?;
        line.push('\n');

        let mut io = self.io.lock().await;
        io.stdin.write_all(line.as_bytes()).await?;
        io.stdin.flush().await?;

        let reply = timeout(self.request_timeout, io.read_reply(id))
            .await
            .map_err(|_| {
                E2eError::Playwright(format!(
                    "{} got no reply within {}ms",
                    op,
                    self.request_timeout.as_millis()
                ))
            })??;

        if reply.ok {
            Ok(reply.value)
        } else {
            Err(E2eError::Playwright(format!(
                "{}: {}",
                op,
                reply.error.unwrap_or_else(|| "unknown error".into())
            )))
        }
    }

    fn timeout_ms(&self) -> u64 {
        self.navigation_timeout.as_millis() as u64
    }
}

#[async_trait]
impl BrowserSession for PlaywrightSession {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        self.request(BridgeCommand::Goto {
            url,
            timeout_ms: self.timeout_ms(),
        })
        .await
        .map_err(|e| E2eError::Navigation(format!("{}: {}", url, e)))?;
        Ok(())
    }

    async fn wait_for_network_idle(&self) -> E2eResult<()> {
        self.request(BridgeCommand::WaitForNetworkIdle {
            timeout_ms: self.timeout_ms(),
        })
        .await?;
        Ok(())
    }

    async fn clear(&self, label: &str) -> E2eResult<()> {
        self.request(BridgeCommand::Clear { label }).await?;
        Ok(())
    }

    async fn fill(&self, label: &str, text: &str) -> E2eResult<()> {
        self.request(BridgeCommand::Fill { label, text }).await?;
        Ok(())
    }

    async fn press_sequentially(&self, label: &str, text: &str, delay: Duration) -> E2eResult<()> {
        self.request(BridgeCommand::PressSequentially {
            label,
            text,
            delay_ms: delay.as_millis() as u64,
        })
        .await?;
        Ok(())
    }

    async fn query(&self, selector: &str) -> E2eResult<Vec<ElementSnapshot>> {
        let value = self.request(BridgeCommand::Query { selector }).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn close(&self) -> E2eResult<()> {
        let closed = self.request(BridgeCommand::Close).await;
        let mut child = self.child.lock().await;
        match timeout(Duration::from_secs(5), child.wait()).await {
            Ok(status) => debug!("Bridge exited: {}", status?),
            Err(_) => {
                warn!("Bridge did not exit after close; killing it");
                child.kill().await?;
            }
        }
        closed.map(|_| ())
    }
}

impl Drop for PlaywrightSession {
    fn drop(&mut self) {
        let child = self.child.get_mut();

        // Try graceful shutdown first so the browser gets to clean up
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = child.id() {
                let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
            }
        }

        let _ = child.start_kill();
    }
}

/// Opens one [`PlaywrightSession`] per worker
#[derive(Debug, Clone, Default)]
pub struct PlaywrightLauncher {
    pub config: PlaywrightConfig,
}

impl PlaywrightLauncher {
    pub fn new(config: PlaywrightConfig) -> E2eResult<Self> {
        check_playwright_installed()?;
        Ok(Self { config })
    }
}

#[async_trait]
impl SessionFactory for PlaywrightLauncher {
    type Session = PlaywrightSession;

    async fn open(&self) -> E2eResult<PlaywrightSession> {
        PlaywrightSession::launch(&self.config).await
    }
}
