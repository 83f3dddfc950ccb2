//! Fitting a cropped screenshot onto the canonical card canvas.
//!
//! Link-preview consumers render cards at a fixed aspect ratio; an image
//! that deviates gets center-cropped by the consumer, usually badly. So the
//! canvas is always exactly [`CARD_ASPECT`], grown around the cropped image
//! and capped at the nominal maximum size. The image is never upscaled.

use image::{Rgba, RgbaImage, imageops};

/// Card aspect ratio (width / height).
pub const CARD_ASPECT: f64 = 1.9;
/// Nominal maximum card width.
pub const CARD_MAX_WIDTH: u32 = 1200;
/// Nominal maximum card height.
pub const CARD_MAX_HEIGHT: u32 = 630;
/// Shrink ratio below which post text in the image stops being legible
/// and the card should carry the text itself as well.
pub const LEGIBLE_SHRINK: f32 = 0.8;

/// Canvas fill behind the pasted image. Faint white reads acceptably on
/// both light and dark link-card frames.
const CANVAS_FILL: Rgba<u8> = Rgba([255, 255, 255, 64]);

/// Placement of a cropped image on the card canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasPlan {
    pub canvas_w: u32,
    pub canvas_h: u32,
    pub scaled_w: u32,
    pub scaled_h: u32,
    pub offset_x: u32,
    pub offset_y: u32,
    /// Pasted height divided by source height. Below ~0.8 the post text in
    /// the image is usually too small to read.
    pub shrink_ratio: f32,
}

/// Plan the canvas for a cropped image of `crop_w` x `crop_h` pixels.
///
/// The deficient dimension grows until the canvas reaches [`CARD_ASPECT`];
/// each dimension is then capped at the nominal maximum, shrinking the
/// other proportionally when a cap binds; finally the image is scaled
/// (down only) to fit and centered.
pub fn plan_canvas(crop_w: u32, crop_h: u32) -> CanvasPlan {
    let src_w = f64::from(crop_w.max(1));
    let src_h = f64::from(crop_h.max(1));

    let mut canvas_w = src_w;
    let mut canvas_h = src_h;
    if canvas_w / canvas_h < CARD_ASPECT {
        canvas_w = canvas_h * CARD_ASPECT;
    } else {
        canvas_h = canvas_w / CARD_ASPECT;
    }

    if canvas_w > f64::from(CARD_MAX_WIDTH) {
        canvas_h *= f64::from(CARD_MAX_WIDTH) / canvas_w;
        canvas_w = f64::from(CARD_MAX_WIDTH);
    }
    if canvas_h > f64::from(CARD_MAX_HEIGHT) {
        canvas_w *= f64::from(CARD_MAX_HEIGHT) / canvas_h;
        canvas_h = f64::from(CARD_MAX_HEIGHT);
    }

    let canvas_w = (canvas_w.round() as u32).max(1);
    let canvas_h = (canvas_h.round() as u32).max(1);

    let scale = (f64::from(canvas_w) / src_w)
        .min(f64::from(canvas_h) / src_h)
        .min(1.0);
    let scaled_w = ((src_w * scale).round() as u32).clamp(1, canvas_w);
    let scaled_h = ((src_h * scale).round() as u32).clamp(1, canvas_h);

    CanvasPlan {
        canvas_w,
        canvas_h,
        scaled_w,
        scaled_h,
        offset_x: (canvas_w - scaled_w) / 2,
        offset_y: (canvas_h - scaled_h) / 2,
        shrink_ratio: (f64::from(scaled_h) / src_h) as f32,
    }
}

/// Scale (down only, Lanczos) and center the cropped image on the card
/// canvas. Returns the finished canvas and the shrink ratio.
pub fn compose(cropped: &RgbaImage) -> (RgbaImage, f32) {
    let plan = plan_canvas(cropped.width(), cropped.height());

    let mut canvas = RgbaImage::from_pixel(plan.canvas_w, plan.canvas_h, CANVAS_FILL);

    if plan.scaled_w == cropped.width() && plan.scaled_h == cropped.height() {
        imageops::overlay(
            &mut canvas,
            cropped,
            i64::from(plan.offset_x),
            i64::from(plan.offset_y),
        );
    } else {
        let scaled = imageops::resize(
            cropped,
            plan.scaled_w,
            plan.scaled_h,
            imageops::FilterType::Lanczos3,
        );
        imageops::overlay(
            &mut canvas,
            &scaled,
            i64::from(plan.offset_x),
            i64::from(plan.offset_y),
        );
    }

    (canvas, plan.shrink_ratio)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_card_aspect(plan: &CanvasPlan) {
        let ratio = f64::from(plan.canvas_w) / f64::from(plan.canvas_h);
        assert!(
            (ratio - CARD_ASPECT).abs() < 0.01,
            "canvas {}x{} has ratio {ratio}",
            plan.canvas_w,
            plan.canvas_h
        );
        assert!(plan.canvas_w <= CARD_MAX_WIDTH);
        assert!(plan.canvas_h <= CARD_MAX_HEIGHT);
    }

    #[test]
    fn small_wide_crop_grows_height() {
        let plan = plan_canvas(570, 100);
        assert_card_aspect(&plan);
        assert_eq!(plan.scaled_w, 570);
        assert_eq!(plan.scaled_h, 100);
        assert_eq!(plan.shrink_ratio, 1.0);
        assert_eq!(plan.offset_x, 0);
    }

    #[test]
    fn small_tall_crop_grows_width() {
        let plan = plan_canvas(400, 300);
        assert_card_aspect(&plan);
        assert_eq!(plan.canvas_w, 570); // 300 * 1.9
        assert_eq!(plan.canvas_h, 300);
        assert_eq!(plan.scaled_w, 400);
        assert_eq!(plan.offset_x, 85);
        assert_eq!(plan.offset_y, 0);
        assert_eq!(plan.shrink_ratio, 1.0);
    }

    #[test]
    fn tall_crop_is_capped_and_shrunk() {
        let plan = plan_canvas(500, 800);
        assert_card_aspect(&plan);
        assert_eq!(plan.canvas_h, CARD_MAX_HEIGHT);
        assert!(plan.canvas_w <= CARD_MAX_WIDTH);
        assert!(plan.scaled_h <= CARD_MAX_HEIGHT);
        assert!(plan.shrink_ratio < 0.8, "shrink was {}", plan.shrink_ratio);
        // Shrink ratio reflects the height reduction.
        let expected = plan.scaled_h as f32 / 800.0;
        assert!((plan.shrink_ratio - expected).abs() < f32::EPSILON);
    }

    #[test]
    fn huge_crop_never_exceeds_nominal_max() {
        let plan = plan_canvas(4000, 6000);
        assert_card_aspect(&plan);
        assert!(plan.scaled_w <= plan.canvas_w);
        assert!(plan.scaled_h <= plan.canvas_h);
    }

    #[test]
    fn image_is_never_upscaled() {
        for (w, h) in [(10, 10), (100, 40), (30, 200), (1199, 630)] {
            let plan = plan_canvas(w, h);
            assert!(plan.scaled_w <= w, "{w}x{h}");
            assert!(plan.scaled_h <= h, "{w}x{h}");
        }
    }

    #[test]
    fn aspect_invariant_across_sizes() {
        for (w, h) in [(19, 10), (600, 900), (1164, 1316), (2400, 400), (50, 2000)] {
            assert_card_aspect(&plan_canvas(w, h));
        }
    }

    #[test]
    fn compose_centers_image_on_fill() {
        let cropped = RgbaImage::from_pixel(100, 100, Rgba([10, 20, 30, 255]));
        let (canvas, shrink) = compose(&cropped);
        assert_eq!(shrink, 1.0);
        assert_eq!(canvas.height(), 100);
        assert_eq!(canvas.width(), 190);

        // Corners are canvas fill, the center is the pasted image.
        assert_eq!(*canvas.get_pixel(0, 0), Rgba([255, 255, 255, 64]));
        assert_eq!(*canvas.get_pixel(189, 99), Rgba([255, 255, 255, 64]));
        assert_eq!(*canvas.get_pixel(95, 50), Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn compose_is_deterministic() {
        let mut cropped = RgbaImage::new(640, 1100);
        for (x, y, px) in cropped.enumerate_pixels_mut() {
            *px = Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255]);
        }
        let (a, _) = compose(&cropped);
        let (b, _) = compose(&cropped);
        assert_eq!(a.as_raw(), b.as_raw());
    }
}
