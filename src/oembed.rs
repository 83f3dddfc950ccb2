//! Embed snippet acquisition and scratch staging.
//!
//! Each platform publishes an embed endpoint that turns a post URL into a
//! self-contained HTML snippet. The snippet is fetched over HTTP, written
//! to a scratch file, and the rendering engine navigates to the file's
//! `file://` URL. The scratch file is shared between renders; callers hold
//! the render gate across staging and rendering.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::platform::{Platform, PostReference};

/// Scratch file the engine navigates to.
pub const SNIPPET_FILE: &str = "post.html";

/// Base URLs of the per-platform embed endpoints. Overridable so tests can
/// stand in a local endpoint.
#[derive(Debug, Clone)]
pub struct EmbedEndpoints {
    /// oEmbed endpoint answering for Xitter post URLs.
    pub xitter_oembed: String,
    /// oEmbed endpoint answering for Bluesky post URLs.
    pub bluesky_oembed: String,
    /// Site base whose `/@<user>/post/<id>/embed` pages are the snippet
    /// themselves.
    pub threads_base: String,
}

impl Default for EmbedEndpoints {
    fn default() -> Self {
        Self {
            xitter_oembed: "https://publish.twitter.com/oembed".to_string(),
            bluesky_oembed: "https://embed.bsky.app/oembed".to_string(),
            threads_base: "https://threads.net".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SnippetError {
    #[error("embed endpoint request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embed endpoint returned an empty snippet")]
    Empty,

    #[error("no embed endpoint for {0} posts")]
    Unsupported(Platform),
}

#[derive(Debug, Deserialize)]
struct OEmbedBody {
    html: String,
}

/// Fetch the embed snippet for a post. A single GET without retries; the
/// embed endpoints answer quickly or not at all, and the caller surfaces
/// the failure to the requester.
pub async fn fetch_snippet(
    client: &reqwest::Client,
    endpoints: &EmbedEndpoints,
    reference: &PostReference,
) -> Result<String, SnippetError> {
    let html = match reference.platform {
        Platform::Xitter => {
            let post_url = format!(
                "https://twitter.com/{}/status/{}",
                reference.user_name, reference.post_id
            );
            oembed_html(
                client,
                &endpoints.xitter_oembed,
                &[("url", post_url.as_str()), ("hide_thread", "false")],
            )
            .await?
        }
        Platform::Bluesky => {
            let post_url = format!(
                "https://bsky.app/profile/{}/post/{}",
                reference.user_name, reference.post_id
            );
            oembed_html(
                client,
                &endpoints.bluesky_oembed,
                &[("url", post_url.as_str()), ("maxwidth", "220")],
            )
            .await?
        }
        Platform::Threads => {
            let url = format!(
                "{}/{}/post/{}/embed",
                endpoints.threads_base, reference.user_name, reference.post_id
            );
            client
                .get(&url)
                .send()
                .await?
                .error_for_status()?
                .text()
                .await?
        }
        Platform::Unknown => return Err(SnippetError::Unsupported(reference.platform)),
    };

    if html.trim().is_empty() {
        return Err(SnippetError::Empty);
    }
    Ok(html)
}

async fn oembed_html(
    client: &reqwest::Client,
    endpoint: &str,
    query: &[(&str, &str)],
) -> Result<String, SnippetError> {
    let body: OEmbedBody = client
        .get(endpoint)
        .query(query)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(body.html)
}

/// Write the snippet where the engine will pick it up and return the
/// absolute path. One shared scratch file; callers hold the render gate
/// while it is in use.
pub fn stage_snippet(scratch_dir: &Path, html: &str) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(scratch_dir)?;
    let path = scratch_dir.join(SNIPPET_FILE);
    std::fs::write(&path, html)?;
    path.canonicalize()
}

/// `file://` URL for a staged snippet.
pub fn snippet_url(path: &Path) -> String {
    format!("file://{}", path.display())
}

/// Remove a staged snippet. Failure is logged and swallowed; the next
/// staging overwrites the file anyway.
pub fn discard_snippet(path: &Path) {
    if let Err(err) = std::fs::remove_file(path) {
        if err.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "could not remove staged snippet"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn staging_writes_and_discarding_removes() {
        let tmp = TempDir::new().unwrap();
        let scratch = tmp.path().join("scratch");

        let path = stage_snippet(&scratch, "<blockquote>post</blockquote>").unwrap();
        assert!(path.is_absolute());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "<blockquote>post</blockquote>"
        );

        discard_snippet(&path);
        assert!(!path.exists());
        // Discarding again is not an error.
        discard_snippet(&path);
    }

    #[test]
    fn staging_overwrites_a_leftover_snippet() {
        let tmp = TempDir::new().unwrap();
        let scratch = tmp.path().to_path_buf();

        stage_snippet(&scratch, "old").unwrap();
        let path = stage_snippet(&scratch, "new").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn snippet_urls_are_file_scheme() {
        let tmp = TempDir::new().unwrap();
        let path = stage_snippet(tmp.path(), "x").unwrap();
        let url = snippet_url(&path);
        assert!(url.starts_with("file:///"), "{url}");
        assert!(url.ends_with(SNIPPET_FILE), "{url}");
    }
}
