use super::location::{LocationKind, SourceLocation};
use crate::error::{ErrorKind, Result, ValidationError};
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use std::time::Duration;
use tracing::debug;

/// Byte-level I/O behind the document store
///
/// The store owns caching, decoding and hashing; a fetcher only reads raw bytes
/// and probes freshness. Swap it to serve documents from an embedded bundle, a
/// test fixture, or a client with custom TLS/retry settings.
pub trait SourceFetcher: Send + Sync {
    /// Read the whole document. Failures are `UnreadableSource`.
    fn read(&self, source: &SourceLocation) -> Result<Vec<u8>>;

    /// Last modification time of the document. Failures are `TransportError`
    /// and are downgraded to "now" by the store.
    fn modified(&self, source: &SourceLocation) -> Result<DateTime<Utc>>;
}

/// Filesystem + blocking HTTP fetcher
///
/// The HTTP client is built on first remote access. There is no retry; wrap the
/// fetcher if a caller needs one.
pub struct DefaultFetcher {
    timeout: Duration,
    client: OnceCell<reqwest::blocking::Client>,
}

impl DefaultFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            client: OnceCell::new(),
        }
    }

    fn client(&self) -> std::result::Result<&reqwest::blocking::Client, reqwest::Error> {
        self.client.get_or_try_init(|| {
            reqwest::blocking::Client::builder()
                .timeout(self.timeout)
                .build()
        })
    }
}

impl Default for DefaultFetcher {
    fn default() -> Self {
        Self::new(Duration::from_millis(5000))
    }
}

impl SourceFetcher for DefaultFetcher {
    fn read(&self, source: &SourceLocation) -> Result<Vec<u8>> {
        match source.kind {
            LocationKind::File => std::fs::read(source.path()).map_err(|e| {
                ValidationError::unreadable(
                    format!("Cannot read contents for file {}: {}", source.canonical, e),
                    "DefaultFetcher::read",
                )
            }),
            LocationKind::Url => {
                let unreadable = |e: reqwest::Error| {
                    ValidationError::unreadable(
                        format!("Cannot read contents for url {}: {}", source.canonical, e),
                        "DefaultFetcher::read",
                    )
                };
                let response = self
                    .client()
                    .map_err(unreadable)?
                    .get(&source.canonical)
                    .send()
                    .and_then(|r| r.error_for_status())
                    .map_err(unreadable)?;
                let bytes = response.bytes().map_err(unreadable)?;
                Ok(bytes.to_vec())
            }
        }
    }

    fn modified(&self, source: &SourceLocation) -> Result<DateTime<Utc>> {
        let transport = |msg: String| {
            ValidationError::new(ErrorKind::TransportError, msg, "DefaultFetcher::modified")
        };

        match source.kind {
            LocationKind::File => {
                let modified = std::fs::metadata(source.path())
                    .and_then(|m| m.modified())
                    .map_err(|e| transport(format!("{}: {}", source.canonical, e)))?;
                Ok(DateTime::<Utc>::from(modified))
            }
            LocationKind::Url => {
                let response = self
                    .client()
                    .and_then(|c| c.head(&source.canonical).send())
                    .map_err(|e| transport(format!("HEAD {}: {}", source.canonical, e)))?;

                let header = response
                    .headers()
                    .get(reqwest::header::LAST_MODIFIED)
                    .and_then(|v| v.to_str().ok());

                match header.and_then(|h| DateTime::parse_from_rfc2822(h).ok()) {
                    Some(ts) => Ok(ts.with_timezone(&Utc)),
                    None => {
                        debug!(url = %source.canonical, "no usable Last-Modified header, using now");
                        Ok(Utc::now())
                    }
                }
            }
        }
    }
}
