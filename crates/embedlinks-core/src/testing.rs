//! In-memory browser fakes shared by the unit tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::browser::{Decryptor, EmbedSession, SessionFactory};
use crate::error::{EmbedError, Result};

/// How a fake page behaves once navigated to
#[derive(Debug, Clone)]
pub struct FakePage {
    pub html: String,
    /// `None` makes the data wait time out
    pub data: Option<Value>,
    pub decrypted: std::result::Result<Value, String>,
    pub navigation_timeout: bool,
    pub panic_on_read: bool,
}

impl FakePage {
    pub fn with_data(data: Value) -> Self {
        Self {
            html: "<html><body><div id='player'></div></body></html>".to_string(),
            data: Some(data),
            decrypted: Ok(json!([])),
            navigation_timeout: false,
            panic_on_read: false,
        }
    }

    pub fn missing(text: &str) -> Self {
        Self {
            html: format!("<html><body><h1>{}</h1></body></html>", text),
            data: None,
            ..Self::with_data(Value::Null)
        }
    }

    pub fn decrypting_to(mut self, output: Value) -> Self {
        self.decrypted = Ok(output);
        self
    }
}

#[derive(Debug, Default)]
pub struct Counters {
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub waits: AtomicUsize,
    pub decrypts: AtomicUsize,
    pub navigations: Mutex<Vec<String>>,
}

impl Counters {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn waits(&self) -> usize {
        self.waits.load(Ordering::SeqCst)
    }

    pub fn decrypts(&self) -> usize {
        self.decrypts.load(Ordering::SeqCst)
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

/// Serves [`FakePage`]s by URL, falling back to `default_page`
#[derive(Debug, Clone)]
pub struct FakeFactory {
    pub pages: HashMap<String, FakePage>,
    pub default_page: FakePage,
    pub counters: Arc<Counters>,
    pub fail_open: bool,
    /// Cancel this token when the given URL is navigated to
    pub cancel_on: Option<(String, CancellationToken)>,
}

impl FakeFactory {
    pub fn new(default_page: FakePage) -> Self {
        Self {
            pages: HashMap::new(),
            default_page,
            counters: Arc::new(Counters::default()),
            fail_open: false,
            cancel_on: None,
        }
    }

    pub fn page(mut self, url: &str, page: FakePage) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }
}

#[async_trait]
impl SessionFactory for FakeFactory {
    async fn open(&self) -> Result<Box<dyn EmbedSession>> {
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail_open {
            return Err(EmbedError::Browser("no chrome executable".to_string()));
        }
        Ok(Box::new(FakeSession {
            factory: self.clone(),
            current: Mutex::new(None),
        }))
    }
}

pub struct FakeSession {
    factory: FakeFactory,
    current: Mutex<Option<FakePage>>,
}

impl FakeSession {
    fn page(&self) -> Result<FakePage> {
        self.current
            .lock()
            .ok()
            .and_then(|p| p.clone())
            .ok_or_else(|| EmbedError::Browser("no page loaded".to_string()))
    }
}

#[async_trait]
impl Decryptor for FakeSession {
    async fn decrypt(&self, _batch: &[Value]) -> Result<Value> {
        self.factory.counters.decrypts.fetch_add(1, Ordering::SeqCst);
        self.page()?.decrypted.map_err(EmbedError::Decryption)
    }
}

#[async_trait]
impl EmbedSession for FakeSession {
    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<()> {
        if let Ok(mut navs) = self.factory.counters.navigations.lock() {
            navs.push(url.to_string());
        }
        if let Some((target, token)) = &self.factory.cancel_on {
            if target == url {
                token.cancel();
            }
        }
        let page = self
            .factory
            .pages
            .get(url)
            .cloned()
            .unwrap_or_else(|| self.factory.default_page.clone());
        let timed_out = page.navigation_timeout;
        if let Ok(mut current) = self.current.lock() {
            *current = Some(page);
        }
        if timed_out {
            return Err(EmbedError::Timeout(url.to_string()));
        }
        Ok(())
    }

    async fn html(&self) -> Result<String> {
        Ok(self.page()?.html)
    }

    async fn wait_for_data(&self, _timeout: Duration, _poll: Duration) -> Result<bool> {
        self.factory.counters.waits.fetch_add(1, Ordering::SeqCst);
        Ok(self.page()?.data.is_some())
    }

    async fn read_data(&self) -> Result<Value> {
        let page = self.page()?;
        if page.panic_on_read {
            panic!("page script crashed");
        }
        page.data
            .ok_or_else(|| EmbedError::Browser("dataLink missing".to_string()))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.factory.counters.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
