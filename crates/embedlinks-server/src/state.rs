//! Shared server state

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use embedlinks_core::{ChromiumLauncher, EmbedScraper, TmdbCatalog};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub type Scraper = EmbedScraper<TmdbCatalog, ChromiumLauncher>;

#[derive(Clone)]
pub struct AppState {
    pub scraper: Arc<Scraper>,
    pub extractions: Arc<Extractions>,
}

impl AppState {
    pub fn new(scraper: Scraper) -> Self {
        Self {
            scraper: Arc::new(scraper),
            extractions: Arc::new(Extractions::default()),
        }
    }
}

/// Cancellation tokens of in-flight extractions
///
/// Each extraction gets its own token; stopping cancels every token
/// registered at that moment. Extractions started afterwards are not
/// affected.
#[derive(Debug, Default)]
pub struct Extractions {
    next_id: AtomicU64,
    running: Mutex<HashMap<u64, CancellationToken>>,
}

impl Extractions {
    /// Registers a new extraction; it is unregistered when the guard drops
    pub fn register(self: &Arc<Self>) -> ExtractionGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        if let Ok(mut running) = self.running.lock() {
            running.insert(id, token.clone());
        }
        debug!(id, "extraction registered");
        ExtractionGuard {
            registry: Arc::clone(self),
            id,
            token,
        }
    }

    /// Cancels every in-flight extraction, returning how many were signalled
    pub fn cancel_all(&self) -> usize {
        let Ok(running) = self.running.lock() else {
            return 0;
        };
        for token in running.values() {
            token.cancel();
        }
        running.len()
    }

    /// Number of extractions registered since startup
    pub fn registered(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed)
    }

    pub fn running(&self) -> usize {
        self.running.lock().map(|r| r.len()).unwrap_or(0)
    }

    fn remove(&self, id: u64) {
        if let Ok(mut running) = self.running.lock() {
            running.remove(&id);
        }
    }
}

/// Registration of one extraction
pub struct ExtractionGuard {
    registry: Arc<Extractions>,
    id: u64,
    token: CancellationToken,
}

impl ExtractionGuard {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for ExtractionGuard {
    fn drop(&mut self) {
        self.registry.remove(self.id);
        debug!(id = self.id, "extraction unregistered");
    }
}
