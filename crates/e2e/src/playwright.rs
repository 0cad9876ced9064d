//! Playwright browser automation
//!
//! Each session is a `node` child process running a small driver script
//! that owns one Chromium page. Requests and replies are JSON lines over
//! stdin/stdout; a FIFO lock around the pipes keeps actions in issue order.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use aiqa_common::AiqaConfig;

use crate::browser::{ActionExecutor, BrowserLauncher, BrowserSession, Cursor};
use crate::error::{E2eError, E2eResult};

/// Environment variable the driver reads its launch options from
const OPTIONS_ENV: &str = "AIQA_DRIVER_OPTIONS";

/// Reply id the driver uses once the page has loaded
const READY_ID: u64 = 0;

/// Screenshot sequence shared by every session in the process
static SCREENSHOT_SEQ: AtomicU64 = AtomicU64::new(0);

const DRIVER_JS: &str = r#"
const { chromium } = require('playwright');
const readline = require('readline');

const options = JSON.parse(process.env.AIQA_DRIVER_OPTIONS);
const CURSOR_ID = '__aiqa_cursor';

function reply(msg) {
  process.stdout.write(JSON.stringify(msg) + '\n');
}

async function drawCursor(page, x, y) {
  await page.evaluate(([id, x, y]) => {
    let el = document.getElementById(id);
    if (!el) {
      el = document.createElement('div');
      el.id = id;
      Object.assign(el.style, {
        position: 'fixed',
        width: '14px',
        height: '14px',
        borderRadius: '50%',
        background: 'rgba(255, 0, 0, 0.6)',
        border: '2px solid white',
        transform: 'translate(-50%, -50%)',
        pointerEvents: 'none',
        zIndex: '2147483647',
      });
      document.body.appendChild(el);
    }
    el.style.left = x + 'px';
    el.style.top = y + 'px';
  }, [CURSOR_ID, x, y]);
}

(async () => {
  const browser = await chromium.launch({ headless: options.headless });
  const context = await browser.newContext({
    viewport: { width: options.width, height: options.height },
  });
  const page = await context.newPage();
  await page.goto(options.base_url, { waitUntil: 'networkidle' });
  await drawCursor(page, 0, 0);
  reply({ id: 0, ok: true });

  const rl = readline.createInterface({ input: process.stdin });
  for await (const line of rl) {
    if (!line.trim()) continue;
    let req;
    try {
      req = JSON.parse(line);
    } catch (e) {
      continue;
    }
    try {
      switch (req.op) {
        case 'move':
          await page.mouse.move(req.x, req.y);
          await drawCursor(page, req.x, req.y);
          break;
        case 'click':
          await page.mouse.click(req.x, req.y);
          break;
        case 'type':
          await page.keyboard.type(req.text);
          break;
        case 'screenshot':
          await page.screenshot({ path: req.path, type: 'jpeg' });
          break;
        case 'close':
          await browser.close();
          reply({ id: req.id, ok: true });
          process.exit(0);
        default:
          throw new Error('unknown op ' + req.op);
      }
      reply({ id: req.id, ok: true });
    } catch (e) {
      reply({ id: req.id, ok: false, error: e.message });
    }
  }
  await browser.close();
})().catch((e) => {
  reply({ id: 0, ok: false, error: e.message });
  process.exit(1);
});
"#;

/// Configuration for Playwright sessions
#[derive(Debug, Clone, Serialize)]
pub struct PlaywrightConfig {
    pub base_url: String,
    #[serde(skip)]
    pub screenshots_dir: PathBuf,
    #[serde(rename = "width")]
    pub viewport_width: u32,
    #[serde(rename = "height")]
    pub viewport_height: u32,
    pub headless: bool,
}

impl PlaywrightConfig {
    pub fn from_config(config: &AiqaConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            screenshots_dir: config.screenshots_dir.clone(),
            viewport_width: config.screen_width,
            viewport_height: config.screen_height,
            headless: config.headless,
        }
    }
}

/// Launches one Chromium page per instruction
pub struct PlaywrightLauncher {
    config: PlaywrightConfig,
}

impl PlaywrightLauncher {
    /// Verify Playwright is installed and prepare the screenshot directory
    pub fn new(config: PlaywrightConfig) -> E2eResult<Self> {
        Self::check_playwright_installed()?;
        std::fs::create_dir_all(&config.screenshots_dir)?;
        Ok(Self { config })
    }

    fn check_playwright_installed() -> E2eResult<()> {
        let output = Command::new("npx")
            .args(["playwright", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match output {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::BrowserNotFound),
        }
    }
}

#[async_trait]
impl BrowserLauncher for PlaywrightLauncher {
    async fn launch(&self) -> E2eResult<Box<dyn BrowserSession>> {
        let session = PlaywrightSession::start(&self.config).await?;
        Ok(Box::new(session))
    }
}

#[derive(Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum DriverOp<'a> {
    Move { x: f64, y: f64 },
    Click { x: f64, y: f64 },
    Type { text: &'a str },
    Screenshot { path: &'a str },
    Close,
}

#[derive(Serialize)]
struct DriverRequest<'a> {
    id: u64,
    #[serde(flatten)]
    op: DriverOp<'a>,
}

#[derive(Debug, Deserialize)]
struct DriverReply {
    id: u64,
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

struct DriverIo {
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
}

impl DriverIo {
    async fn wait_for(&mut self, id: u64) -> E2eResult<()> {
        loop {
            let line = self
                .stdout
                .next_line()
                .await?
                .ok_or_else(|| E2eError::Browser("driver exited unexpectedly".to_string()))?;

            let reply: DriverReply = match serde_json::from_str(&line) {
                Ok(reply) => reply,
                Err(_) => {
                    debug!("[driver] {}", line);
                    continue;
                }
            };
            if reply.id != id && reply.id != READY_ID {
                warn!("Dropping stale driver reply {}", reply.id);
                continue;
            }
            if reply.ok {
                return Ok(());
            }
            return Err(E2eError::Browser(
                reply.error.unwrap_or_else(|| "unknown driver error".to_string()),
            ));
        }
    }
}

/// A live Chromium page driven through Playwright
pub struct PlaywrightSession {
    io: Mutex<DriverIo>,
    child: Mutex<Child>,
    cursor: parking_lot::Mutex<Cursor>,
    screenshots_dir: PathBuf,
}

impl PlaywrightSession {
    /// Spawn the driver and wait until the page has loaded `base_url`
    pub async fn start(config: &PlaywrightConfig) -> E2eResult<Self> {
        let options = serde_json::to_string(config)?;
        debug!("Launching browser on {}", config.base_url);

        let mut command = TokioCommand::new("node");
        command.arg("-e").arg(DRIVER_JS).env(OPTIONS_ENV, options);
        let session = Self::attach(command, config.screenshots_dir.clone()).await?;
        info!("Browser ready at {}", config.base_url);
        Ok(session)
    }

    /// Spawn `command` as the driver and wait for its ready reply
    async fn attach(mut command: TokioCommand, screenshots_dir: PathBuf) -> E2eResult<Self> {
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| E2eError::Browser(format!("Failed to spawn driver: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Browser("driver stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Browser("driver stdout unavailable".to_string()))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("[driver stderr] {}", line);
                }
            });
        }

        let mut io = DriverIo {
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: READY_ID,
        };
        io.wait_for(READY_ID).await?;

        Ok(Self {
            io: Mutex::new(io),
            child: Mutex::new(child),
            cursor: parking_lot::Mutex::new(Cursor::default()),
            screenshots_dir,
        })
    }

    async fn call(&self, op: DriverOp<'_>) -> E2eResult<()> {
        let mut io = self.io.lock().await;
        io.next_id += 1;
        let id = io.next_id;

        let mut line = serde_json::to_string(&DriverRequest { id, op })?;
        line.push('\n');
        io.stdin.write_all(line.as_bytes()).await?;
        io.stdin.flush().await?;

        io.wait_for(id).await
    }

    pub fn cursor(&self) -> Cursor {
        *self.cursor.lock()
    }

    fn next_screenshot_path(&self) -> PathBuf {
        let seq = SCREENSHOT_SEQ.fetch_add(1, Ordering::Relaxed);
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
        self.screenshots_dir
            .join(format!("screenshot_{}_{}.jpg", stamp, seq))
    }
}

#[async_trait]
impl ActionExecutor for PlaywrightSession {
    async fn screenshot(&self) -> E2eResult<PathBuf> {
        let path = self.next_screenshot_path();
        let path_str = path.to_string_lossy();
        self.call(DriverOp::Screenshot { path: &*path_str }).await?;
        Ok(path)
    }

    async fn move_cursor(&self, x: f64, y: f64) -> E2eResult<()> {
        // Recorded at issue time so a click issued after this move sees it
        let previous = std::mem::replace(&mut *self.cursor.lock(), Cursor { x, y });
        let outcome = self.call(DriverOp::Move { x, y }).await;
        if outcome.is_err() {
            *self.cursor.lock() = previous;
        }
        outcome
    }

    async fn click(&self) -> E2eResult<()> {
        let Cursor { x, y } = self.cursor();
        self.call(DriverOp::Click { x, y }).await
    }

    async fn type_text(&self, text: &str) -> E2eResult<()> {
        self.call(DriverOp::Type { text }).await
    }
}

#[async_trait]
impl BrowserSession for PlaywrightSession {
    async fn close(&self) -> E2eResult<()> {
        let closed = self.call(DriverOp::Close).await;
        let mut child = self.child.lock().await;
        if let Err(e) = &closed {
            warn!("Browser did not close cleanly: {}", e);
            child.kill().await?;
        }
        child.wait().await?;
        debug!("Browser closed");
        closed
    }
}
