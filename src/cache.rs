//! Durable, content-addressed stores for rendered artifacts.
//!
//! Two stores share one keying scheme: the XXH3-64 hash of the normalized
//! request path, rendered as 16 uppercase hex digits. Keys are stable across
//! restarts, so a regenerated entry always lands on the same file and the
//! image URL embedded in a cached card stays valid.
//!
//! Entries are never actively evicted; a stale entry is simply overwritten
//! by the next render. Read errors are treated as a miss, write errors are
//! reported to the caller and otherwise harmless (the freshly rendered
//! result is still served).

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Stable storage key for a normalized post path.
pub fn stable_key(post_path: &str) -> String {
    format!("{:016X}", xxhash_rust::xxh3::xxh3_64(post_path.as_bytes()))
}

/// Age of the entry at `path`, from file modification time.
///
/// A missing or unreadable mtime (or one in the future) counts as brand new;
/// the worst case is serving one stale entry instead of failing the request.
async fn entry_age(path: &Path) -> Duration {
    match tokio::fs::metadata(path).await.and_then(|meta| meta.modified()) {
        Ok(mtime) => SystemTime::now()
            .duration_since(mtime)
            .unwrap_or(Duration::ZERO),
        Err(_) => Duration::ZERO,
    }
}

/// Read a file and its age, treating any read error as a miss.
async fn read_with_age(path: &Path) -> Option<(Vec<u8>, Duration)> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "cache read failed, treating as miss");
            return None;
        }
    };
    let age = entry_age(path).await;
    Some((bytes, age))
}

/// Store for generated preview images (`<dir>/<hash>.png`).
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.png"))
    }

    /// Look up the image for a post path. Returns the PNG bytes and entry age.
    pub async fn lookup(&self, post_path: &str) -> Option<(Vec<u8>, Duration)> {
        read_with_age(&self.path_for(&stable_key(post_path))).await
    }

    /// Store the image for a post path, overwriting any previous entry.
    pub async fn store(&self, post_path: &str, png: &[u8]) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.path_for(&stable_key(post_path)), png).await
    }

    /// Look up an image by its literal file name, for the image-namespace
    /// route. The name must be a single path segment; anything that could
    /// escape the store directory is rejected.
    pub async fn open_file(&self, file_name: &str) -> Option<Vec<u8>> {
        if file_name.is_empty()
            || file_name.contains('/')
            || file_name.contains('\\')
            || file_name.contains("..")
        {
            return None;
        }
        match tokio::fs::read(self.dir.join(file_name)).await {
            Ok(bytes) => Some(bytes),
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => {
                tracing::warn!(file = %file_name, error = %err, "image read failed");
                None
            }
        }
    }
}

/// Store for generated Open Graph card documents (`<dir>/<hash>_card.html`).
#[derive(Debug, Clone)]
pub struct CardCache {
    dir: PathBuf,
    ttl: Duration,
}

impl CardCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self { dir: dir.into(), ttl }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}_card.html"))
    }

    /// Whether an entry of the given age is still servable.
    pub fn fresh(&self, age: Duration) -> bool {
        age < self.ttl
    }

    /// Look up the card for a post path. Returns the document and entry age.
    pub async fn lookup(&self, post_path: &str) -> Option<(String, Duration)> {
        let (bytes, age) = read_with_age(&self.path_for(&stable_key(post_path))).await?;
        match String::from_utf8(bytes) {
            Ok(html) => Some((html, age)),
            Err(err) => {
                tracing::warn!(post_path = %post_path, error = %err, "cached card is not utf-8, treating as miss");
                None
            }
        }
    }

    /// Store the card for a post path, overwriting any previous entry.
    pub async fn store(&self, post_path: &str, html: &str) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.path_for(&stable_key(post_path)), html).await
    }
}
