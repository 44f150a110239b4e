use std::time::Duration;

use crate::error::{Result, SourceError};

/// Connect/read timeouts shared by every client (§6 `HTTP_TIMEOUT_*`).
#[derive(Debug, Clone, Copy)]
pub struct HttpTimeouts {
    pub connect: Duration,
    pub read: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            read: Duration::from_secs(30),
        }
    }
}

pub fn build_client(timeouts: HttpTimeouts) -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(timeouts.connect)
        .timeout(timeouts.read)
        .user_agent("omics-oracle/0.2 (mailto:oracle@example.org)")
        .build()
        .expect("static client configuration is always valid")
}

/// Maps a completed response's status into the shared error taxonomy,
/// honoring `Retry-After` for 429s (§4.6).
pub fn check_status(resp: &reqwest::Response) -> Result<()> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let retry_after_s = resp
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    Err(SourceError::from_status(status, retry_after_s))
}
