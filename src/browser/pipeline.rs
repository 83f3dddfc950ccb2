//! Turns a staged embed snippet into a finished card image.
//!
//! The pipeline drives a [`Browser`] through the embed's load sequence,
//! patches the markup where a platform calls for it, measures the embed's
//! geometry, and crops and composes the screenshot into the card PNG. It
//! never touches the filesystem or the network itself; the snippet is
//! already staged and the result goes back to the caller as bytes.

use std::io::Cursor;
use std::time::Duration;

use image::ImageFormat;
use tokio::time::{Instant, sleep};

use super::canvas;
use super::crop::{self, CropAnchors, Rect};
use super::heuristics::{self, EmbedStyle};
use super::{Browser, BrowserError};

/// Bound on the embed sub-frame appearing after document load.
const FRAME_WAIT: Duration = Duration::from_secs(1);
/// Bound on the content container turning up in the DOM. Expiry is not
/// fatal: a document with nothing matching the content pattern is
/// screenshot as-is once loaded.
const PRESENCE_WAIT: Duration = Duration::from_secs(5);
/// Bound on a present content container becoming visible. Expiry fails
/// the render: a blank embed screenshots as a blank card.
const VISIBILITY_WAIT: Duration = Duration::from_secs(10);
/// Bound on image decoding, for both the whole-document wait and the
/// swapped logo. Only the latter is fatal on expiry.
const IMAGE_WAIT: Duration = Duration::from_secs(10);
const POLL: Duration = Duration::from_millis(250);

/// What a successful render produced.
#[derive(Debug, Clone)]
pub struct RenderResult {
    /// The finished card PNG.
    pub png: Vec<u8>,
    /// Final image size in pixels, for the card's `og:image` metadata.
    pub width: u32,
    pub height: u32,
    /// Vertical scale the crop went through to fit the canvas. Below
    /// [`canvas::LEGIBLE_SHRINK`] the image is too small to read and the
    /// card should carry the post text as well.
    pub shrink_ratio: f32,
    /// Likes count, when the platform exposes one and it parsed.
    pub likes: Option<u64>,
    /// The post's text content, when the embed exposes it.
    pub excerpt: Option<String>,
}

/// Why a render did not produce a card.
#[derive(Debug, thiserror::Error)]
pub enum RenderFailure {
    #[error(transparent)]
    Engine(#[from] BrowserError),

    #[error("embed content {xpath} not visible after {waited:?}")]
    ContentNotVisible {
        xpath: &'static str,
        waited: Duration,
    },

    #[error("logo patch target {0} not found in embed")]
    PatchTargetMissing(&'static str),

    #[error("logo patch target {0} rejected the replacement markup")]
    PatchRejected(&'static str),

    #[error("swapped logo {0} never finished decoding")]
    PatchNotDecoded(&'static str),

    #[error("screenshot did not decode: {0}")]
    BadScreenshot(#[from] image::ImageError),
}

/// Render the staged snippet at `snippet_url` into a card.
///
/// The embed may arrive inside a sub-frame or as the top document; all
/// geometry is translated into page space before the crop is computed, so
/// both layouts take the same path from there.
pub async fn render(
    browser: &mut dyn Browser,
    style: &EmbedStyle,
    snippet_url: &str,
) -> Result<RenderResult, RenderFailure> {
    browser.goto(snippet_url).await?;

    let frame = browser.enter_embed_frame(FRAME_WAIT).await?;
    if frame.is_none() {
        tracing::debug!("embed rendered without a sub-frame");
    }

    if browser.wait_present(style.content, PRESENCE_WAIT).await? {
        wait_visible(browser, style.content).await?;

        // Screenshotting before every image has pixel data bakes grey
        // boxes into the card, but some embeds keep a hidden lazy image
        // around forever. Wait, then proceed either way.
        if !poll_images(browser).await? {
            tracing::warn!("images still undecoded, proceeding with screenshot");
        }
    } else {
        // Plain documents render nothing matching the content pattern;
        // the load completing is all the readiness there is.
        tracing::warn!(content = style.content, "embed content never appeared");
    }

    if let Some(patch) = &style.logo_patch {
        apply_logo_patch(browser, patch).await?;
    }

    let likes = match style.likes {
        Some(xpath) => browser
            .text_of(xpath)
            .await?
            .filter(|label| heuristics::plausible_likes(label))
            .and_then(|label| label.parse::<u64>().ok()),
        None => None,
    };

    let excerpt = match style.text {
        Some(xpath) => browser
            .text_of(xpath)
            .await?
            .filter(|text| !text.trim().is_empty()),
        None => None,
    };

    let anchors = measure(browser, style, frame).await?;

    if frame.is_some() {
        browser.leave_frame().await?;
    }
    let viewport_w = browser.viewport_width().await?;

    let shot = browser.screenshot().await?;
    let screenshot = image::load_from_memory(&shot)?.to_rgba8();
    let (shot_w, shot_h) = screenshot.dimensions();
    let dpr = if viewport_w > 0.0 {
        f64::from(shot_w) / viewport_w
    } else {
        1.0
    };

    let crop = crop::compute_crop(&anchors, dpr, shot_w, shot_h);
    let cropped =
        image::imageops::crop_imm(&screenshot, crop.left, crop.top, crop.width(), crop.height())
            .to_image();
    let (card, shrink_ratio) = canvas::compose(&cropped);

    let mut png = Vec::new();
    card.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

    tracing::debug!(
        crop_w = crop.width(),
        crop_h = crop.height(),
        card_w = card.width(),
        card_h = card.height(),
        shrink_ratio,
        "rendered card"
    );

    Ok(RenderResult {
        png,
        width: card.width(),
        height: card.height(),
        shrink_ratio,
        likes,
        excerpt,
    })
}

async fn wait_visible(
    browser: &mut dyn Browser,
    xpath: &'static str,
) -> Result<(), RenderFailure> {
    let deadline = Instant::now() + VISIBILITY_WAIT;
    loop {
        if browser.is_displayed(xpath).await? {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(RenderFailure::ContentNotVisible {
                xpath,
                waited: VISIBILITY_WAIT,
            });
        }
        sleep(POLL).await;
    }
}

async fn poll_images(browser: &mut dyn Browser) -> Result<bool, RenderFailure> {
    let deadline = Instant::now() + IMAGE_WAIT;
    loop {
        if browser.all_images_decoded().await? {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        sleep(POLL).await;
    }
}

/// Swap the platform logo in the live embed and wait for the replacement
/// image to decode. Every step is fatal: a half-applied patch screenshots
/// as a broken embed.
async fn apply_logo_patch(
    browser: &mut dyn Browser,
    patch: &heuristics::LogoPatch,
) -> Result<(), RenderFailure> {
    if !browser.wait_present(patch.target, PRESENCE_WAIT).await? {
        return Err(RenderFailure::PatchTargetMissing(patch.target));
    }
    if !browser.set_inner_html(patch.target, patch.html).await? {
        return Err(RenderFailure::PatchRejected(patch.target));
    }

    let deadline = Instant::now() + IMAGE_WAIT;
    loop {
        if browser.image_decoded(patch.swapped).await? {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(RenderFailure::PatchNotDecoded(patch.swapped));
        }
        sleep(POLL).await;
    }
}

/// Measure the crop anchor geometry in the active context and translate it
/// into page space. The embed's outer box is the sub-frame when there is
/// one, else the content container itself.
async fn measure(
    browser: &mut dyn Browser,
    style: &EmbedStyle,
    frame: Option<Rect>,
) -> Result<CropAnchors, RenderFailure> {
    // Boxes measured inside a sub-frame are frame-relative.
    let to_page = |rect: Rect| match frame {
        Some(origin) => rect.offset_by(origin.x, origin.y),
        None => rect,
    };

    let container = browser.rect_of(style.container).await?.map(to_page);
    let content = browser.rect_of(style.content).await?.map(to_page);
    let timestamp = match style.timestamp {
        Some(xpath) => browser.rect_of(xpath).await?.map(to_page),
        None => None,
    };

    let embed = match (frame, container) {
        (Some(frame_rect), _) => frame_rect,
        (None, Some(container_rect)) => container_rect,
        (None, None) => {
            tracing::warn!(
                container = style.container,
                "embed container not found, falling back to the full screenshot"
            );
            Rect {
                x: 0.0,
                y: 0.0,
                w: 0.0,
                h: 0.0,
            }
        }
    };

    Ok(CropAnchors {
        embed,
        content_top: content.map(|r| r.y),
        content_bottom: container.map(|r| r.bottom()),
        timestamp_top: timestamp.map(|r| r.y),
    })
}
