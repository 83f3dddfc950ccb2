//! Post platform classification and path parsing.
//!
//! Each supported platform has its own URL shape. Parsing is a total
//! function over request paths: anything that matches no known shape comes
//! back as [`Platform::Unknown`] rather than an error, and the router
//! decides what to do with it.

use std::fmt;

/// Social platform a post path belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Xitter,
    Bluesky,
    Threads,
    Unknown,
}

impl Platform {
    /// Domain serving the original post, used for browser redirects.
    ///
    /// `None` for [`Platform::Unknown`], which has nowhere to redirect to.
    pub fn public_domain(&self) -> Option<&'static str> {
        match self {
            Self::Xitter => Some("x.com"),
            Self::Bluesky => Some("bsky.app"),
            Self::Threads => Some("threads.net"),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Xitter => "xitter",
            Self::Bluesky => "bluesky",
            Self::Threads => "threads",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A post identified from a request path.
///
/// Immutable once parsed; created per request and discarded after the
/// response is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostReference {
    pub platform: Platform,
    pub user_name: String,
    pub post_id: String,
    /// The normalized path (query stripped) the reference was parsed from.
    /// This is the cache key input, so it must be stable for a given post.
    pub original_path: String,
}

impl PostReference {
    /// Parse a request path into a post reference.
    ///
    /// Recognized shapes:
    /// - `/<user>/status/<id>` - Xitter
    /// - `/profile/<user>/post/<id>` - Bluesky
    /// - `/@<user>/post/<id>` - Threads (id truncated at `?`)
    ///
    /// Anything else yields a reference with [`Platform::Unknown`] and empty
    /// user/id fields.
    pub fn parse(path: &str) -> Self {
        // Strip any query string so cache keys stay stable across
        // superfluous tracking parameters.
        let path = path.split('?').next().unwrap_or(path);
        let trimmed = path.trim_matches('/');
        let segments: Vec<&str> = trimmed.split('/').collect();

        let (platform, user_name, post_id) = match segments.as_slice() {
            ["profile", user, "post", id] if !user.is_empty() && !id.is_empty() => {
                (Platform::Bluesky, *user, *id)
            }
            [user, "status", id] if !user.is_empty() && !id.is_empty() => {
                (Platform::Xitter, *user, *id)
            }
            // Threads handles always carry the `@`; a bare user segment in
            // this position is not a post path.
            [user, "post", id] if user.starts_with('@') && !id.is_empty() => {
                // Threads ids sometimes arrive with a trailing query even
                // after global query stripping (posts shared with an
                // escaped `?igshid=...` suffix).
                (Platform::Threads, *user, id.split('?').next().unwrap_or(id))
            }
            _ => (Platform::Unknown, "", ""),
        };

        let original_path = if platform == Platform::Unknown {
            path.to_string()
        } else {
            format!("/{trimmed}")
        };

        Self {
            platform,
            user_name: user_name.to_string(),
            post_id: post_id.to_string(),
            original_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_xitter_post() {
        let post = PostReference::parse("/becauseberkeley/status/1865482308008255873");
        assert_eq!(post.platform, Platform::Xitter);
        assert_eq!(post.user_name, "becauseberkeley");
        assert_eq!(post.post_id, "1865482308008255873");
        assert_eq!(post.original_path, "/becauseberkeley/status/1865482308008255873");
    }

    #[test]
    fn parse_bluesky_post() {
        let post = PostReference::parse("/profile/skibu.bsky.social/post/3lcmchch6js2j");
        assert_eq!(post.platform, Platform::Bluesky);
        assert_eq!(post.user_name, "skibu.bsky.social");
        assert_eq!(post.post_id, "3lcmchch6js2j");
    }

    #[test]
    fn parse_threads_post() {
        let post = PostReference::parse("/@lakota_man/post/DDXTHZ2Jr14");
        assert_eq!(post.platform, Platform::Threads);
        assert_eq!(post.user_name, "@lakota_man");
        assert_eq!(post.post_id, "DDXTHZ2Jr14");
    }

    #[test]
    fn parse_strips_query_string() {
        let post = PostReference::parse("/alice/status/123?s=20&t=tracking");
        assert_eq!(post.platform, Platform::Xitter);
        assert_eq!(post.post_id, "123");
        assert_eq!(post.original_path, "/alice/status/123");
    }

    #[test]
    fn parse_threads_id_truncated_at_question_mark() {
        let post = PostReference::parse("/@user/post/ABC?igshid=xyz");
        assert_eq!(post.platform, Platform::Threads);
        assert_eq!(post.post_id, "ABC");
    }

    #[test]
    fn parse_unknown_paths() {
        for path in ["/", "/not-a-post", "/a/b/c/d/e", "/status/123", "/images/foo.png"] {
            let post = PostReference::parse(path);
            assert_eq!(post.platform, Platform::Unknown, "path {path}");
            assert!(post.user_name.is_empty());
            assert!(post.post_id.is_empty());
        }
    }

    #[test]
    fn parse_rejects_empty_segments() {
        assert_eq!(PostReference::parse("//status/123").platform, Platform::Unknown);
        assert_eq!(PostReference::parse("/alice/status/").platform, Platform::Unknown);
        assert_eq!(PostReference::parse("/profile//post/123").platform, Platform::Unknown);
    }

    #[test]
    fn parse_rejects_threads_without_at_prefix() {
        let post = PostReference::parse("/alice/post/99");
        assert_eq!(post.platform, Platform::Unknown);
        assert!(post.user_name.is_empty());
        assert!(post.post_id.is_empty());
    }

    #[test]
    fn parse_is_deterministic() {
        let a = PostReference::parse("/alice/status/123");
        let b = PostReference::parse("/alice/status/123");
        assert_eq!(a, b);
    }

    #[test]
    fn parse_trailing_slash_normalized() {
        let post = PostReference::parse("/alice/status/123/");
        assert_eq!(post.platform, Platform::Xitter);
        assert_eq!(post.original_path, "/alice/status/123");
    }

    #[test]
    fn public_domains() {
        assert_eq!(Platform::Xitter.public_domain(), Some("x.com"));
        assert_eq!(Platform::Bluesky.public_domain(), Some("bsky.app"));
        assert_eq!(Platform::Threads.public_domain(), Some("threads.net"));
        assert_eq!(Platform::Unknown.public_domain(), None);
    }
}
