//! The Open Graph card document served to crawlers.
//!
//! A card is a head-only HTML page whose meta tags point the crawler at
//! the rendered preview image. Consumers read the tags and never render
//! the body, so there is none.

use maud::{Markup, html};

/// Everything the card document is built from.
#[derive(Debug, Clone)]
pub struct CardData<'a> {
    /// Absolute URL of the rendered preview image.
    pub image_url: &'a str,
    pub image_width: u32,
    pub image_height: u32,
    /// Extracted likes count, shown in the title when present.
    pub likes: Option<u64>,
    /// Post text, populated when the image alone is too small to read.
    pub description: Option<&'a str>,
}

/// Build the card document.
///
/// The title is `Reposted via`, prefixed with `♥ <likes> - ` when a likes
/// count was extracted, and given a trailing colon when a description
/// follows it up.
pub fn card_document(data: &CardData<'_>) -> Markup {
    let description = data
        .description
        .map(collapse_whitespace)
        .unwrap_or_default();

    let mut title = String::from("Reposted via");
    if let Some(likes) = data.likes {
        title = format!("♥ {likes} - {title}");
    }
    if !description.is_empty() {
        title.push(':');
    }

    html! {
        (maud::DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                title { (title) }
                meta property="og:title" content=(title);
                meta name="twitter:title" content=(title);
                meta property="og:description" content=(description);
                meta property="og:type" content="image";
                meta property="og:image" content=(data.image_url);
                meta property="og:image:width" content=(data.image_width);
                meta property="og:image:height" content=(data.image_height);
            }
        }
    }
}

/// Meta tag content is a single line; embed text often is not.
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
