//! Crop-rectangle computation in screenshot pixel space.
//!
//! The rendering engine reports element geometry in CSS pixels; the
//! screenshot is in device pixels. Everything here converts through the
//! device-pixel ratio and clamps into the screenshot bounds, so the
//! resulting rectangle is always safe to crop with.

/// Element bounding box in CSS pixels, page coordinate space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }

    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    /// The same box translated by an offset, for mapping frame-relative
    /// geometry into page space.
    pub fn offset_by(&self, dx: f64, dy: f64) -> Rect {
        Rect {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }
}

/// Crop region in screenshot pixels. `left < right` and `top < bottom`
/// always hold, and all values lie within the screenshot bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CropRect {
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }
}

/// Measured geometry the crop is derived from, all in CSS pixels and page
/// coordinate space (frame-relative boxes already translated by the frame
/// origin).
#[derive(Debug, Clone, Copy)]
pub struct CropAnchors {
    /// Outer box of the embed (the sub-frame when the embed renders in one,
    /// else the platform's content container).
    pub embed: Rect,
    /// Top edge of the first content block, when one was found.
    pub content_top: Option<f64>,
    /// Bottom edge of the content container, when one was found.
    pub content_bottom: Option<f64>,
    /// Top edge of the timestamp row, when the embed shows one.
    pub timestamp_top: Option<f64>,
}

/// Inward inset excluding the embed border from the left/right edges.
const EDGE_INSET_PX: f64 = 2.0;
/// Trim above the first content block.
const TOP_TRIM_PX: f64 = 6.0;
/// Trim above the timestamp row, cutting engagement chrome from the card.
const TIMESTAMP_TRIM_PX: f64 = 10.0;
/// Trim at the content container's bottom edge.
const CONTAINER_TRIM_PX: f64 = 4.0;

/// Compute the crop rectangle for a screenshot of `shot_w` x `shot_h`
/// device pixels taken at the given device-pixel ratio.
///
/// Bottom anchor preference: timestamp row, else content container bottom,
/// else the embed's own bottom edge. A degenerate result (after rounding
/// and clamping) falls back to the full screenshot.
pub fn compute_crop(anchors: &CropAnchors, dpr: f64, shot_w: u32, shot_h: u32) -> CropRect {
    let left = anchors.embed.x * dpr + EDGE_INSET_PX;
    let right = anchors.embed.right() * dpr - EDGE_INSET_PX;

    let top = match anchors.content_top {
        Some(y) => y * dpr - TOP_TRIM_PX,
        None => anchors.embed.y * dpr,
    };

    let bottom = if let Some(y) = anchors.timestamp_top {
        y * dpr - TIMESTAMP_TRIM_PX
    } else if let Some(y) = anchors.content_bottom {
        y * dpr - CONTAINER_TRIM_PX
    } else {
        anchors.embed.bottom() * dpr
    };

    let left = to_pixel(left, shot_w);
    let right = to_pixel(right, shot_w);
    let top = to_pixel(top, shot_h);
    let bottom = to_pixel(bottom, shot_h);

    if left < right && top < bottom {
        CropRect { left, top, right, bottom }
    } else {
        tracing::warn!(
            left, top, right, bottom,
            "degenerate crop rectangle, falling back to full screenshot"
        );
        CropRect { left: 0, top: 0, right: shot_w, bottom: shot_h }
    }
}

fn to_pixel(value: f64, bound: u32) -> u32 {
    value.round().clamp(0.0, f64::from(bound)) as u32
}
