//! Error type for the card service.
//!
//! Every per-request failure ends up here and leaves as a plain-text
//! diagnostic response; crawlers neither render error pages nor follow
//! retry hints. Parse failures are quiet (they go to the bad-request
//! channel at the route), everything else logs at error level.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::browser::{BrowserError, RenderFailure};
use crate::oembed::SnippetError;

#[derive(Debug, thiserror::Error)]
pub enum CardError {
    /// The path does not match any platform's post grammar.
    #[error("Not a valid post \"{0}\"")]
    NotAPost(String),

    /// The embed endpoint could not produce a snippet.
    #[error("embed fetch failed: {0}")]
    Snippet(#[from] SnippetError),

    /// The pipeline could not turn the snippet into a card.
    #[error("render failed: {0}")]
    Render(#[from] RenderFailure),

    /// The snippet could not be staged for the engine.
    #[error("could not stage the embed snippet: {0}")]
    Scratch(#[from] std::io::Error),

    /// The rendering engine could not be launched or reached.
    #[error("rendering engine unavailable: {0}")]
    Engine(#[from] BrowserError),
}

impl CardError {
    fn status(&self) -> StatusCode {
        // Everything is a 404 to the requester; crawlers treat the post as
        // previewless and move on. The distinction lives in the logs.
        match self {
            Self::NotAPost(_) => StatusCode::NOT_FOUND,
            Self::Snippet(_) => StatusCode::NOT_FOUND,
            Self::Render(_) => StatusCode::NOT_FOUND,
            Self::Scratch(_) => StatusCode::NOT_FOUND,
            Self::Engine(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for CardError {
    fn into_response(self) -> Response {
        match &self {
            Self::NotAPost(_) => {}
            Self::Snippet(err) => {
                tracing::error!(error = %err, "embed fetch failed");
            }
            Self::Render(err) => {
                tracing::error!(error = %err, "render failed");
            }
            Self::Scratch(err) => {
                tracing::error!(error = %err, "could not stage the embed snippet");
            }
            Self::Engine(err) => {
                tracing::error!(error = %err, "rendering engine unavailable");
            }
        }
        (self.status(), self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_a_post_display_quotes_the_path() {
        let err = CardError::NotAPost("/some/junk".to_string());
        assert_eq!(err.to_string(), "Not a valid post \"/some/junk\"");
    }

    #[test]
    fn snippet_display_carries_the_cause() {
        let err = CardError::Snippet(SnippetError::Empty);
        assert_eq!(
            err.to_string(),
            "embed fetch failed: embed endpoint returned an empty snippet"
        );
    }

    #[test]
    fn every_variant_answers_not_found() {
        let errors = [
            CardError::NotAPost("/x".to_string()),
            CardError::Snippet(SnippetError::Empty),
            CardError::Render(RenderFailure::PatchTargetMissing("//logo")),
        ];
        for err in errors {
            assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
        }
    }
}
