//! Exclusive access to the rendering engine.
//!
//! The engine is one external browser process; two concurrent navigations
//! would corrupt each other's screenshots. Every render therefore goes
//! through [`RenderGate::acquire`], which serializes local tasks with an
//! async mutex and other processes with a marker file in the scratch
//! directory. The engine handle itself lives inside the gate and is only
//! reachable through an acquired [`RenderLease`].
//!
//! The marker favors liveness over strict exclusion: one that persists past
//! the reclaim bound is treated as abandoned by a crashed holder and
//! overwritten instead of deadlocking every future render.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::{Instant, sleep};

use crate::browser::{Browser, BrowserConfig, BrowserError, WebDriverBrowser};

/// Marker file claimed for the duration of a render.
pub const MARKER_FILE: &str = "render.lock";

const BACKOFF_START: Duration = Duration::from_millis(100);
const BACKOFF_CAP: Duration = Duration::from_secs(2);

type EngineSlot = Arc<Mutex<Option<Box<dyn Browser>>>>;

/// Serializes rendering and owns the lazily-launched engine singleton.
#[derive(Clone)]
pub struct RenderGate {
    slot: EngineSlot,
    launch: Option<BrowserConfig>,
    marker: PathBuf,
    reclaim_after: Duration,
}

impl RenderGate {
    /// Gate that launches a WebDriver engine on first use.
    pub fn new(config: BrowserConfig, marker: PathBuf, reclaim_after: Duration) -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            launch: Some(config),
            marker,
            reclaim_after,
        }
    }

    /// Gate around an engine built elsewhere.
    pub fn with_engine(
        engine: Box<dyn Browser>,
        marker: PathBuf,
        reclaim_after: Duration,
    ) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(engine))),
            launch: None,
            marker,
            reclaim_after,
        }
    }

    /// Block until this caller is the sole holder of the engine.
    pub async fn acquire(&self) -> RenderLease {
        let slot = self.slot.clone().lock_owned().await;
        self.claim_marker().await;
        RenderLease {
            slot,
            launch: self.launch.clone(),
            marker: self.marker.clone(),
        }
    }

    /// Remove a marker left behind by a previous crashed run. Startup only;
    /// while the process lives the marker belongs to whoever holds the
    /// lease.
    pub fn clear_leftover_marker(&self) {
        match std::fs::remove_file(&self.marker) {
            Ok(()) => {
                tracing::warn!(
                    marker = %self.marker.display(),
                    "removed leftover render marker"
                );
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                tracing::warn!(
                    marker = %self.marker.display(),
                    error = %err,
                    "could not remove leftover render marker"
                );
            }
        }
    }

    /// Claim the marker file, backing off while another holder has it and
    /// force-reclaiming once it looks abandoned.
    async fn claim_marker(&self) {
        if let Some(parent) = self.marker.parent() {
            if let Err(err) = std::fs::create_dir_all(parent) {
                tracing::warn!(error = %err, "could not create scratch directory");
            }
        }

        let deadline = Instant::now() + self.reclaim_after;
        let mut backoff = BACKOFF_START;
        loop {
            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&self.marker)
            {
                Ok(mut file) => {
                    let _ = writeln!(file, "{}", std::process::id());
                    return;
                }
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                    if Instant::now() >= deadline {
                        tracing::warn!(
                            marker = %self.marker.display(),
                            waited = ?self.reclaim_after,
                            "render marker abandoned, force-reclaiming"
                        );
                        if let Err(err) = std::fs::write(&self.marker, b"") {
                            tracing::warn!(error = %err, "could not overwrite abandoned marker");
                        }
                        return;
                    }
                    tracing::debug!(backoff = ?backoff, "render marker held, waiting");
                    sleep(backoff).await;
                    backoff = (backoff * 2).min(BACKOFF_CAP);
                }
                Err(err) => {
                    // An unwritable scratch directory must not wedge every
                    // render; the in-process mutex still serializes us.
                    tracing::warn!(
                        marker = %self.marker.display(),
                        error = %err,
                        "could not create render marker, proceeding without it"
                    );
                    return;
                }
            }
        }
    }
}

/// Exclusive ownership of the rendering engine. Dropping the lease removes
/// the marker, on every exit path.
pub struct RenderLease {
    slot: OwnedMutexGuard<Option<Box<dyn Browser>>>,
    launch: Option<BrowserConfig>,
    marker: PathBuf,
}

impl RenderLease {
    /// The engine, launching it on first use.
    pub async fn browser(&mut self) -> Result<&mut (dyn Browser + 'static), BrowserError> {
        if self.slot.is_none() {
            let config = self.launch.as_ref().ok_or_else(|| {
                BrowserError::Driver(std::io::Error::other("no rendering engine configured"))
            })?;
            let engine = WebDriverBrowser::launch(config).await?;
            *self.slot = Some(Box::new(engine));
        }
        self.slot.as_deref_mut().ok_or_else(|| {
            BrowserError::Driver(std::io::Error::other("rendering engine slot empty"))
        })
    }
}

impl Drop for RenderLease {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.marker) {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    marker = %self.marker.display(),
                    error = %err,
                    "could not remove render marker"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::browser::Rect;

    fn unused_config() -> BrowserConfig {
        BrowserConfig {
            webdriver: "chromedriver".to_string(),
            port: 0,
            browser: None,
        }
    }

    struct NoopBrowser;

    #[async_trait]
    impl Browser for NoopBrowser {
        async fn goto(&mut self, _url: &str) -> Result<(), BrowserError> {
            Ok(())
        }

        async fn enter_embed_frame(
            &mut self,
            _within: Duration,
        ) -> Result<Option<Rect>, BrowserError> {
            Ok(None)
        }

        async fn leave_frame(&mut self) -> Result<(), BrowserError> {
            Ok(())
        }

        async fn wait_present(
            &mut self,
            _xpath: &str,
            _within: Duration,
        ) -> Result<bool, BrowserError> {
            Ok(true)
        }

        async fn is_displayed(&mut self, _xpath: &str) -> Result<bool, BrowserError> {
            Ok(true)
        }

        async fn rect_of(&mut self, _xpath: &str) -> Result<Option<Rect>, BrowserError> {
            Ok(None)
        }

        async fn text_of(&mut self, _xpath: &str) -> Result<Option<String>, BrowserError> {
            Ok(None)
        }

        async fn set_inner_html(
            &mut self,
            _xpath: &str,
            _html: &str,
        ) -> Result<bool, BrowserError> {
            Ok(true)
        }

        async fn image_decoded(&mut self, _xpath: &str) -> Result<bool, BrowserError> {
            Ok(true)
        }

        async fn all_images_decoded(&mut self) -> Result<bool, BrowserError> {
            Ok(true)
        }

        async fn viewport_width(&mut self) -> Result<f64, BrowserError> {
            Ok(600.0)
        }

        async fn screenshot(&mut self) -> Result<Vec<u8>, BrowserError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn lease_claims_and_releases_the_marker() {
        let tmp = TempDir::new().unwrap();
        let marker = tmp.path().join(MARKER_FILE);
        let gate = RenderGate::new(unused_config(), marker.clone(), Duration::from_secs(30));

        let lease = gate.acquire().await;
        assert!(marker.is_file());

        drop(lease);
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn holds_never_overlap() {
        let tmp = TempDir::new().unwrap();
        let gate = RenderGate::new(
            unused_config(),
            tmp.path().join(MARKER_FILE),
            Duration::from_secs(30),
        );
        let active = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..4 {
            let gate = gate.clone();
            let active = active.clone();
            tasks.push(tokio::spawn(async move {
                let lease = gate.acquire().await;
                assert_eq!(active.fetch_add(1, Ordering::SeqCst), 0);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                drop(lease);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_marker_is_force_reclaimed() {
        let tmp = TempDir::new().unwrap();
        let marker = tmp.path().join(MARKER_FILE);
        std::fs::write(&marker, "stale").unwrap();

        let gate = RenderGate::new(unused_config(), marker.clone(), Duration::from_millis(300));
        let lease = gate.acquire().await;

        assert!(marker.is_file());
        assert_ne!(std::fs::read_to_string(&marker).unwrap(), "stale");
        drop(lease);
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn leftover_marker_is_cleared_at_startup() {
        let tmp = TempDir::new().unwrap();
        let marker = tmp.path().join(MARKER_FILE);
        std::fs::write(&marker, "stale").unwrap();

        let gate = RenderGate::new(unused_config(), marker.clone(), Duration::from_secs(30));
        gate.clear_leftover_marker();
        assert!(!marker.exists());

        // Clearing again is not an error.
        gate.clear_leftover_marker();
    }

    #[tokio::test]
    async fn lease_hands_out_a_preset_engine() {
        let tmp = TempDir::new().unwrap();
        let gate = RenderGate::with_engine(
            Box::new(NoopBrowser),
            tmp.path().join(MARKER_FILE),
            Duration::from_secs(30),
        );

        let mut lease = gate.acquire().await;
        let browser = lease.browser().await.unwrap();
        browser.goto("file:///staged.html").await.unwrap();
    }
}
