//! Diagnostic channel for rejected requests.
//!
//! Crawlers probe with plenty of junk paths; those rejections go to their
//! own append-only file instead of the main log, one line per request,
//! keyed by client address.

use std::io::Write;
use std::net::IpAddr;
use std::path::PathBuf;

use parking_lot::Mutex;

pub const LOG_FILE: &str = "bad_requests.log";

/// Append-only `<client-ip> : <message>` log.
pub struct BadRequestLog {
    path: PathBuf,
    /// Serializes appends so concurrent rejections cannot interleave.
    lock: Mutex<()>,
}

impl BadRequestLog {
    pub fn new(logs_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: logs_dir.into().join(LOG_FILE),
            lock: Mutex::new(()),
        }
    }

    /// Record one rejection. An IO failure is logged and swallowed; the
    /// 404 must go out whether or not the diagnostic line landed.
    pub fn record(&self, client: IpAddr, message: &str) {
        let _held = self.lock.lock();
        if let Err(err) = self.append(client, message) {
            tracing::warn!(
                path = %self.path.display(),
                error = %err,
                "could not append to bad-request log"
            );
        }
    }

    fn append(&self, client: IpAddr, message: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;
        writeln!(file, "{client} : {message}")
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn records_append_one_line_each() {
        let tmp = TempDir::new().unwrap();
        let log = BadRequestLog::new(tmp.path().join("logs"));

        log.record("203.0.113.9".parse().unwrap(), "Not a valid post \"/nope\"");
        log.record("::1".parse().unwrap(), "Not a valid post \"/also/nope\"");

        let contents =
            std::fs::read_to_string(tmp.path().join("logs").join(LOG_FILE)).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(
            lines,
            [
                "203.0.113.9 : Not a valid post \"/nope\"",
                "::1 : Not a valid post \"/also/nope\"",
            ]
        );
    }

    #[test]
    fn missing_logs_dir_is_created_on_first_record() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("deep").join("logs");
        let log = BadRequestLog::new(&dir);

        log.record("127.0.0.1".parse().unwrap(), "probe");
        assert!(dir.join(LOG_FILE).is_file());
    }
}
