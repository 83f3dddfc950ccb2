//! Serving rendered preview images.

use axum::extract::{Path, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

/// Serve a stored preview image by file name.
///
/// The lookup is literal: the hash-named file either exists or it does
/// not. Anything that is not a plain file name (traversal, nesting) is a
/// plain miss.
pub async fn serve_image(State(state): State<AppState>, Path(file): Path<String>) -> Response {
    match state.images.open_file(&file).await {
        Some(png) => png_response(png),
        None => {
            tracing::debug!(file = %file, "image not found");
            (StatusCode::NOT_FOUND, "no such image").into_response()
        }
    }
}

/// Build an HTTP response with PNG content and cache headers.
fn png_response(png: Vec<u8>) -> Response {
    let headers = [
        (header::CONTENT_TYPE, HeaderValue::from_static("image/png")),
        (
            header::CACHE_CONTROL,
            HeaderValue::from_static("public, max-age=3600"),
        ),
    ];

    (StatusCode::OK, headers, png).into_response()
}
