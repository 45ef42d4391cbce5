//! Headless browser sessions
//!
//! The extractor only talks to the [`EmbedSession`] and [`SessionFactory`]
//! traits. [`ChromiumLauncher`] implements them on top of chromiumoxide,
//! launching one isolated browser process per session.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{EnableParams, SetBlockedUrLsParams};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{EmbedError, Result};

/// Global variable the embed page fills with its language groups
pub const DATA_VARIABLE: &str = "dataLink";

/// Default name of the page's decryption routine
pub const DEFAULT_DECRYPT_FUNCTION: &str = "decryptLinks";

/// URL patterns blocked on every page
const BLOCKED_RESOURCES: &[&str] = &[
    "*.jpg", "*.jpeg", "*.png", "*.gif", "*.webp", "*.svg", "*.ico",
    "*.css",
    "*.woff", "*.woff2", "*.ttf", "*.otf",
    "*.mp4", "*.webm", "*.mp3",
];

/// Decrypts a batch of link tokens
///
/// The output is the routine's raw return value; it is expected to be an
/// array aligned with `batch`, but that is checked by the caller.
#[async_trait]
pub trait Decryptor: Send + Sync {
    async fn decrypt(&self, batch: &[Value]) -> Result<Value>;
}

/// One browser page pointed at embed pages
#[async_trait]
pub trait EmbedSession: Decryptor {
    /// Navigates and waits for network activity to settle
    ///
    /// # Errors
    /// `Timeout` if the page does not settle within `timeout`
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()>;

    /// Current rendered HTML
    async fn html(&self) -> Result<String>;

    /// Polls until the data variable is a non-empty array
    ///
    /// Returns `Ok(false)` if `timeout` elapses first.
    async fn wait_for_data(&self, timeout: Duration, poll: Duration) -> Result<bool>;

    /// Reads the data variable into memory
    async fn read_data(&self) -> Result<Value>;

    /// Releases the page and everything that backs it
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Opens fresh sessions
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn EmbedSession>>;
}

/// Browser launch options
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// Run without a visible window (default: true)
    pub headless: bool,
    /// Pass `--no-sandbox`, needed in most containers (default: true)
    pub no_sandbox: bool,
    /// Chrome/Chromium binary; auto-detected when `None`
    pub chrome_executable: Option<PathBuf>,
    /// Extra command line flags
    pub args: Vec<String>,
    /// DevTools request timeout (default: 30s)
    pub request_timeout: Duration,
    /// Name of the page's decryption routine
    pub decrypt_function: String,
    /// Block images, stylesheets, fonts and media (default: true)
    pub block_resources: bool,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            headless: true,
            no_sandbox: true,
            chrome_executable: None,
            args: vec!["--disable-gpu".to_string(), "--disable-dev-shm-usage".to_string()],
            request_timeout: Duration::from_secs(30),
            decrypt_function: DEFAULT_DECRYPT_FUNCTION.to_string(),
            block_resources: true,
        }
    }
}

/// Launches one chromium process per session
#[derive(Debug, Clone, Default)]
pub struct ChromiumLauncher {
    config: LaunchConfig,
}

impl ChromiumLauncher {
    pub fn new(config: LaunchConfig) -> Self {
        Self { config }
    }

    fn browser_config(&self) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder().request_timeout(self.config.request_timeout);
        if !self.config.headless {
            builder = builder.with_head();
        }
        if self.config.no_sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(path) = &self.config.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        builder
            .args(self.config.args.clone())
            .build()
            .map_err(EmbedError::Browser)
    }
}

#[async_trait]
impl SessionFactory for ChromiumLauncher {
    async fn open(&self) -> Result<Box<dyn EmbedSession>> {
        if !is_js_identifier(&self.config.decrypt_function) {
            return Err(EmbedError::InvalidRequest(format!(
                "decrypt function {:?} is not a JavaScript identifier",
                self.config.decrypt_function
            )));
        }

        let (mut browser, mut handler) = Browser::launch(self.browser_config()?).await?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("chromium handler event error: {}", e);
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                shutdown(&mut browser, handler_task).await;
                return Err(e.into());
            }
        };

        if self.config.block_resources {
            if let Err(e) = block_resources(&page).await {
                debug!("resource blocking unavailable: {}", e);
            }
        }

        Ok(Box::new(ChromiumSession {
            browser,
            page,
            handler_task,
            decrypt_function: self.config.decrypt_function.clone(),
        }))
    }
}

/// A launched browser with a single page
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    decrypt_function: String,
}

impl ChromiumSession {
    async fn evaluate_value(&self, js: String) -> Result<Value> {
        let params = EvaluateParams::builder()
            .expression(js)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(EmbedError::Browser)?;
        let result = self.page.evaluate_expression(params).await?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    /// Waits until the document is complete and no new resources were
    /// requested for one second
    async fn settle(&self) -> Result<()> {
        let js = r#"(async () => {
            const idleMs = 1000;
            const interval = 250;
            let last = -1;
            let stable = 0;
            while (true) {
                await new Promise(r => setTimeout(r, interval));
                let count = last;
                try { count = performance.getEntriesByType('resource').length; } catch (_) {}
                if (document.readyState === 'complete' && count === last) {
                    stable += interval;
                    if (stable >= idleMs) return true;
                } else {
                    stable = 0;
                }
                last = count;
            }
        })()"#;
        self.evaluate_value(js.to_string()).await.map(|_| ())
    }
}

#[async_trait]
impl Decryptor for ChromiumSession {
    async fn decrypt(&self, batch: &[Value]) -> Result<Value> {
        let name = &self.decrypt_function;
        let payload = serde_json::to_string(batch)?;
        let js = format!(
            r#"(async () => {{
                if (typeof {name} !== 'function') {{
                    return {{ error: '{name} is not available' }};
                }}
                try {{
                    const out = await {name}({payload});
                    return out === undefined ? null : out;
                }} catch (e) {{
                    return {{ error: String(e && e.message ? e.message : e) }};
                }}
            }})()"#
        );
        self.evaluate_value(js).await
    }
}

#[async_trait]
impl EmbedSession for ChromiumSession {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()> {
        let navigation = async {
            self.page.goto(url).await?;
            self.settle().await
        };
        match tokio::time::timeout(timeout, navigation).await {
            Ok(result) => result,
            Err(_) => Err(EmbedError::Timeout(format!("navigation to {}", url))),
        }
    }

    async fn html(&self) -> Result<String> {
        Ok(self.page.content().await?)
    }

    async fn wait_for_data(&self, timeout: Duration, poll: Duration) -> Result<bool> {
        let check = format!(
            "typeof {v} !== 'undefined' && Array.isArray({v}) && {v}.length > 0",
            v = DATA_VARIABLE
        );
        let polling = async {
            loop {
                if self.evaluate_value(check.clone()).await?.as_bool() == Some(true) {
                    return Ok::<_, EmbedError>(());
                }
                tokio::time::sleep(poll).await;
            }
        };
        match tokio::time::timeout(timeout, polling).await {
            Ok(result) => result.map(|_| true),
            Err(_) => Ok(false),
        }
    }

    async fn read_data(&self) -> Result<Value> {
        self.evaluate_value(DATA_VARIABLE.to_string()).await
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let ChromiumSession {
            mut browser,
            page,
            handler_task,
            ..
        } = *self;
        if let Err(e) = page.close().await {
            debug!("page close failed: {}", e);
        }
        shutdown(&mut browser, handler_task).await;
        Ok(())
    }
}

async fn block_resources(page: &Page) -> Result<()> {
    page.execute(EnableParams::default()).await?;
    let params = SetBlockedUrLsParams {
        urls: BLOCKED_RESOURCES.iter().map(|s| s.to_string()).collect(),
    };
    page.execute(params).await?;
    Ok(())
}

async fn shutdown(browser: &mut Browser, handler_task: JoinHandle<()>) {
    if let Err(e) = browser.close().await {
        warn!("browser close failed: {}", e);
    }
    if let Err(e) = browser.wait().await {
        debug!("browser process wait failed: {}", e);
    }
    handler_task.abort();
}

/// True for plain JavaScript identifiers like `decryptLinks` or `$dec_2`
pub fn is_js_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}
