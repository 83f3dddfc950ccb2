//! Application state shared across all request handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::bad_requests::BadRequestLog;
use crate::cache::{CardCache, ImageStore};
use crate::config::Config;
use crate::gate::{self, RenderGate};
use crate::oembed::{self, EmbedEndpoints};

/// Embed endpoint HTTP timeout. The endpoints answer in well under a
/// second when they answer at all.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared application state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<Config>,

    /// HTTP client for the embed endpoints.
    pub http: reqwest::Client,

    /// Where embed snippets are fetched from.
    pub endpoints: Arc<EmbedEndpoints>,

    /// Durable store of rendered preview images.
    pub images: Arc<ImageStore>,

    /// Durable store of generated card documents.
    pub cards: Arc<CardCache>,

    /// Exclusive access to the rendering engine.
    pub gate: RenderGate,

    /// Diagnostic channel for rejected requests.
    pub bad_requests: Arc<BadRequestLog>,
}

impl AppState {
    /// Create a new application state from configuration.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
        let images = ImageStore::new(config.images_dir.clone());
        let cards = CardCache::new(config.cache_dir.clone(), config.cache_ttl);
        let gate = RenderGate::new(
            config.browser_config(),
            config.scratch_dir.join(gate::MARKER_FILE),
            config.gate_timeout,
        );
        let bad_requests = BadRequestLog::new(config.logs_dir.clone());

        Ok(Self {
            config: Arc::new(config),
            http,
            endpoints: Arc::new(EmbedEndpoints::default()),
            images: Arc::new(images),
            cards: Arc::new(cards),
            gate,
            bad_requests: Arc::new(bad_requests),
        })
    }

    /// Startup housekeeping: create the storage directories and clear
    /// scratch leftovers from a previous run.
    pub fn prepare(&self) -> std::io::Result<()> {
        for dir in [
            &self.config.images_dir,
            &self.config.cache_dir,
            &self.config.scratch_dir,
            &self.config.logs_dir,
        ] {
            std::fs::create_dir_all(dir)?;
        }
        self.gate.clear_leftover_marker();
        oembed::discard_snippet(&self.config.scratch_dir.join(oembed::SNIPPET_FILE));
        Ok(())
    }
}
