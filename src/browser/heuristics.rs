//! Platform-specific embed structure heuristics.
//!
//! Each platform's embed markup is probed with structural XPath patterns:
//! where the content container sits, which element anchors the crop bottom,
//! where likes and post text live. These are best-effort by nature and tied
//! to upstream markup; when a platform changes its embed DOM, the entry
//! here is the thing to fix.

use crate::platform::Platform;

/// Structural patterns for one platform's embed markup.
#[derive(Debug, Clone, Copy)]
pub struct EmbedStyle {
    /// Content container element. Doubles as the embed's outer box when the
    /// embed renders without a sub-frame.
    pub container: &'static str,
    /// First content block inside the container; anchors the crop top.
    pub content: &'static str,
    /// Timestamp row; preferred crop bottom anchor, cutting the engagement
    /// chrome below it out of the card.
    pub timestamp: Option<&'static str>,
    /// Likes label candidate.
    pub likes: Option<&'static str>,
    /// Primary post text block.
    pub text: Option<&'static str>,
    /// Logo swap applied before the screenshot.
    pub logo_patch: Option<LogoPatch>,
}

/// A cosmetic markup replacement applied to the live embed.
#[derive(Debug, Clone, Copy)]
pub struct LogoPatch {
    /// Element whose inner markup is replaced.
    pub target: &'static str,
    /// Replacement markup.
    pub html: &'static str,
    /// The swapped-in image, polled until fully decoded.
    pub swapped: &'static str,
}

/// The X logo (several svg icons deep in the embed; the first anchor-hosted
/// one is the logo) swapped for the dead-bird image. Must be https since the
/// rest of the embed page is.
const XITTER_LOGO_PATCH: LogoPatch = LogoPatch {
    target: "//article/div//a/*[name()='svg']/..",
    html: concat!(
        "<image src=\"https://robotaxi.news/wp-content/uploads/2025/01/dead_twitter.png\" ",
        "name=\"replacement_logo\" width=\"41\" height=\"38\">"
    ),
    swapped: "//*[@name='replacement_logo']",
};

const XITTER: EmbedStyle = EmbedStyle {
    container: "//article",
    content: "//article//div",
    timestamp: Some("//article//time"),
    likes: Some("//article/div/a/div/span"),
    // Tweet text carries a lang attribute, nothing else in the embed does.
    text: Some("//article//div[@lang]"),
    logo_patch: Some(XITTER_LOGO_PATCH),
};

const BLUESKY: EmbedStyle = EmbedStyle {
    container: "//div[@id='root']",
    content: "//div[@id='root']//div",
    timestamp: Some("//time"),
    likes: None,
    text: Some("//div[@id='root']//p"),
    logo_patch: None,
};

const THREADS: EmbedStyle = EmbedStyle {
    container: "//body/div",
    content: "//body/div//div",
    timestamp: Some("//time"),
    likes: None,
    text: Some("//body/div//span"),
    logo_patch: None,
};

/// The embed style for a platform; `None` for [`Platform::Unknown`].
pub fn style_for(platform: Platform) -> Option<&'static EmbedStyle> {
    match platform {
        Platform::Xitter => Some(&XITTER),
        Platform::Bluesky => Some(&BLUESKY),
        Platform::Threads => Some(&THREADS),
        Platform::Unknown => None,
    }
}

/// Whether an extracted likes label is plausible: the leading character
/// must be a digit 1-9, rejecting zero counts and garbage matches.
pub fn plausible_likes(label: &str) -> bool {
    label.chars().next().is_some_and(|c| matches!(c, '1'..='9'))
}
