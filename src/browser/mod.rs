//! Rendering engine: the WebDriver-backed browser and the pipeline that
//! turns an embed snippet into a card image.
//!
//! The pipeline only talks to the engine through the [`Browser`] trait, so
//! its geometry and readiness logic is testable against a scripted stub
//! without a browser process.

pub mod canvas;
pub mod crop;
pub mod heuristics;
pub mod pipeline;
pub mod webdriver;

use std::time::Duration;

use async_trait::async_trait;

pub use crop::{CropRect, Rect};
pub use pipeline::{RenderFailure, RenderResult, render};
pub use webdriver::{BrowserConfig, WebDriverBrowser};

/// Rendering-engine failure, distinct from a post that merely fails to
/// produce the expected embed structure (see
/// [`RenderFailure`](pipeline::RenderFailure)).
#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("webdriver session could not be established: {0}")]
    Session(#[from] fantoccini::error::NewSessionError),

    #[error("webdriver command failed: {0}")]
    Command(#[from] fantoccini::error::CmdError),

    #[error("driver process: {0}")]
    Driver(#[from] std::io::Error),
}

/// Capabilities the render pipeline needs from an HTML rendering engine.
///
/// All element lookups take structural XPath patterns. Lookup methods
/// report absence through their return value; an `Err` always means the
/// engine itself failed.
#[async_trait]
pub trait Browser: Send {
    /// Navigate to a URL and wait for the top-level document load.
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Look for an embedded sub-frame within the bound. On a hit, record
    /// its page-space bounding box and switch the active context into it.
    async fn enter_embed_frame(&mut self, within: Duration)
    -> Result<Option<Rect>, BrowserError>;

    /// Switch the active context back to the top-level document.
    async fn leave_frame(&mut self) -> Result<(), BrowserError>;

    /// Wait for an element matching the pattern to be present; `false` when
    /// the bound expires first.
    async fn wait_present(&mut self, xpath: &str, within: Duration)
    -> Result<bool, BrowserError>;

    /// Whether the first match is currently displayed.
    async fn is_displayed(&mut self, xpath: &str) -> Result<bool, BrowserError>;

    /// Bounding box of the first match, in the active context's CSS pixels.
    async fn rect_of(&mut self, xpath: &str) -> Result<Option<Rect>, BrowserError>;

    /// Rendered text of the first match.
    async fn text_of(&mut self, xpath: &str) -> Result<Option<String>, BrowserError>;

    /// Replace the inner HTML of the first match; `false` when nothing
    /// matched.
    async fn set_inner_html(&mut self, xpath: &str, html: &str) -> Result<bool, BrowserError>;

    /// Whether the first matching image element is visible and has fully
    /// decoded pixel data.
    async fn image_decoded(&mut self, xpath: &str) -> Result<bool, BrowserError>;

    /// Whether every image in the active context is visible and decoded.
    async fn all_images_decoded(&mut self) -> Result<bool, BrowserError>;

    /// CSS-pixel width of the viewport, for the device-pixel ratio.
    async fn viewport_width(&mut self) -> Result<f64, BrowserError>;

    /// PNG screenshot of the visible viewport.
    async fn screenshot(&mut self) -> Result<Vec<u8>, BrowserError>;
}
