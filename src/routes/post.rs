//! The post handler: card for crawlers, redirect for everyone else.
//!
//! Every path that is not the image namespace lands here. The User-Agent
//! decides what the requester is after: link-preview crawlers get a card
//! document rendered for the post, humans get bounced to the post itself
//! on the owning platform.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, Uri, header};
use axum::response::{Html, IntoResponse, Response};

use crate::browser::{self, canvas, heuristics};
use crate::error::CardError;
use crate::oembed;
use crate::platform::PostReference;
use crate::render;
use crate::state::AppState;

/// Substrings identifying link-preview crawlers, matched case-insensitively
/// against the User-Agent.
const CRAWLER_MARKERS: &[&str] = &[
    "opengraph",
    "bluesky cardyb",
    "facebookexternalhit",
    "twitterbot",
    "slackbot",
    "discordbot",
    "telegrambot",
    "whatsapp",
];

pub async fn post_or_redirect(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    let full_path = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());

    let reference = PostReference::parse(&full_path);
    let Some(domain) = reference.platform.public_domain() else {
        let err = CardError::NotAPost(full_path);
        state.bad_requests.record(addr.ip(), &err.to_string());
        return err.into_response();
    };

    if is_crawler(headers.get(header::USER_AGENT)) {
        match serve_card(&state, &reference).await {
            Ok(response) => response,
            Err(err) => err.into_response(),
        }
    } else {
        let location = format!("https://{domain}{full_path}");
        tracing::debug!(location = %location, "redirecting non-crawler");
        (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
    }
}

/// Serve the card for a parsed post, from cache when fresh, rendering
/// otherwise.
async fn serve_card(state: &AppState, reference: &PostReference) -> Result<Response, CardError> {
    let post_path = &reference.original_path;

    if let Some((html, age)) = state.cards.lookup(post_path).await {
        if !state.cards.fresh(age) {
            tracing::debug!(path = %post_path, age_secs = age.as_secs(), "card stale, re-rendering");
        } else if state.images.lookup(post_path).await.is_none() {
            // A card pointing at a missing image embeds as a broken
            // preview; regenerate both.
            tracing::debug!(path = %post_path, "cached card lost its image, re-rendering");
        } else {
            tracing::debug!(path = %post_path, age_secs = age.as_secs(), "card cache hit");
            return Ok(Html(html).into_response());
        }
    }

    let style = heuristics::style_for(reference.platform)
        .ok_or_else(|| CardError::NotAPost(post_path.clone()))?;

    tracing::info!(
        platform = %reference.platform,
        user = %reference.user_name,
        post = %reference.post_id,
        "rendering card"
    );
    let snippet = oembed::fetch_snippet(&state.http, &state.endpoints, reference).await?;

    // The staged snippet and the engine are both shared; everything from
    // staging to screenshot happens inside the gate.
    let mut lease = state.gate.acquire().await;
    let staged = oembed::stage_snippet(&state.config.scratch_dir, &snippet)?;
    let url = oembed::snippet_url(&staged);
    let rendered = match lease.browser().await {
        Ok(engine) => browser::render(engine, style, &url).await.map_err(CardError::from),
        Err(err) => Err(CardError::from(err)),
    };
    oembed::discard_snippet(&staged);
    drop(lease);
    let rendered = rendered?;

    let key = crate::cache::stable_key(post_path);
    let image_url = format!("http://{}/images/{key}.png", state.config.domain);

    let description = if rendered.shrink_ratio < canvas::LEGIBLE_SHRINK {
        tracing::debug!(
            shrink_ratio = rendered.shrink_ratio,
            "image too small to read, carrying post text on the card"
        );
        rendered.excerpt.as_deref()
    } else {
        None
    };

    let card = render::card_document(&render::CardData {
        image_url: &image_url,
        image_width: rendered.width,
        image_height: rendered.height,
        likes: rendered.likes,
        description,
    })
    .into_string();

    // Both stores are written together so the card never points at a
    // missing image. A failed write still serves the fresh result.
    if let Err(err) = state.images.store(post_path, &rendered.png).await {
        tracing::warn!(path = %post_path, error = %err, "could not store preview image");
    }
    if let Err(err) = state.cards.store(post_path, &card).await {
        tracing::warn!(path = %post_path, error = %err, "could not store card document");
    }

    Ok(Html(card).into_response())
}

fn is_crawler(user_agent: Option<&HeaderValue>) -> bool {
    let Some(value) = user_agent else {
        return false;
    };
    let Ok(value) = value.to_str() else {
        return false;
    };
    let value = value.to_ascii_lowercase();
    CRAWLER_MARKERS.iter().any(|marker| value.contains(marker))
}
