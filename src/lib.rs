//! post2card - Open Graph cards and preview images for social media posts.
//!
//! This crate provides a small HTTP service that turns a social media post
//! URL (Xitter, Bluesky, or Threads) into a link-preview card: crawlers get
//! an Open Graph card document whose `og:image` is a rendered screenshot of
//! the post, while ordinary browsers get a redirect to the post on its
//! original platform.
//!
//! # Architecture
//!
//! - **Platform**: classifies request paths into platform variants and
//!   extracts the user name and post id
//! - **Oembed**: fetches the embed snippet for a post from the platform's
//!   public embed endpoint
//! - **Browser**: drives a WebDriver-controlled headless browser to render
//!   the snippet, then crops and fits the screenshot to card dimensions
//! - **Gate**: serializes all browser use behind a filesystem-visible
//!   exclusive marker
//! - **Cache**: durable, content-addressed stores for generated images and
//!   card documents with TTL-based regeneration
//! - **Routes**: the crawler/browser request classification state machine
//!
//! # URL Patterns
//!
//! ```text
//! GET /<user>/status/<id>           Xitter post
//! GET /profile/<user>/post/<id>     Bluesky post
//! GET /@<user>/post/<id>            Threads post
//! GET /images/<hash>.png            generated preview image
//! ```

pub mod bad_requests;
pub mod browser;
pub mod cache;
pub mod config;
pub mod error;
pub mod gate;
pub mod oembed;
pub mod platform;
pub mod render;
pub mod routes;
pub mod state;

pub use config::Config;
pub use routes::router;
pub use state::AppState;
