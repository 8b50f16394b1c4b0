//! GENA SUBSCRIBE / RENEW / UNSUBSCRIBE transport.
//!
//! The wire contract is header-only: SUBSCRIBE carries `CALLBACK`/`NT`/
//! `TIMEOUT`, renewal reuses SUBSCRIBE with `SID` instead of a callback,
//! and the device answers with `SID` and `TIMEOUT` headers. A 412 on renew
//! means the device no longer knows the subscription.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

/// A device-reported `infinite` timeout maps to a day so renewal math
/// never goes negative.
const INFINITE_TIMEOUT_SECONDS: u32 = 86_400;

/// Classified GENA request failure.
#[derive(Debug, thiserror::Error)]
pub enum GenaError {
    /// The device answered 412: the subscription is gone.
    #[error("subscription not found on device")]
    NotFound,

    /// The request exceeded its deadline.
    #[error("GENA request timed out")]
    Timeout,

    /// Transport-level failure.
    #[error("device unreachable: {0}")]
    Unreachable(String),

    /// The device answered, but outside the protocol contract.
    #[error("GENA protocol error: {0}")]
    Protocol(String),
}

/// Successful SUBSCRIBE outcome.
#[derive(Debug, Clone)]
pub struct SubscribeResponse {
    pub sid: String,
    /// Timeout actually granted by the device, in seconds
    pub timeout_seconds: u32,
}

/// The three GENA verbs, behind a seam so lifecycle logic is testable
/// without devices.
#[async_trait]
pub trait GenaTransport: Send + Sync {
    async fn subscribe(
        &self,
        endpoint_url: &str,
        callback_url: &str,
        timeout_seconds: u32,
    ) -> Result<SubscribeResponse, GenaError>;

    /// Renew an existing subscription; returns the granted timeout.
    async fn renew(
        &self,
        endpoint_url: &str,
        sid: &str,
        timeout_seconds: u32,
    ) -> Result<u32, GenaError>;

    /// Cancel a subscription. A 412 or an unreachable device both count as
    /// already-unsubscribed and are not errors.
    async fn unsubscribe(&self, endpoint_url: &str, sid: &str) -> Result<(), GenaError>;
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpGenaTransport {
    http: reqwest::Client,
    timeout: Duration,
}

impl HttpGenaTransport {
    pub fn new(timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(8)
            .connect_timeout(Duration::from_secs(2))
            .build()
            .expect("failed to build HTTP client");
        Self { http, timeout }
    }

    fn method(verb: &'static [u8]) -> reqwest::Method {
        reqwest::Method::from_bytes(verb).expect("static GENA method")
    }

    fn classify(err: reqwest::Error) -> GenaError {
        if err.is_timeout() {
            GenaError::Timeout
        } else {
            GenaError::Unreachable(err.to_string())
        }
    }
}

impl Default for HttpGenaTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl GenaTransport for HttpGenaTransport {
    async fn subscribe(
        &self,
        endpoint_url: &str,
        callback_url: &str,
        timeout_seconds: u32,
    ) -> Result<SubscribeResponse, GenaError> {
        let response = self
            .http
            .request(Self::method(b"SUBSCRIBE"), endpoint_url)
            .header("HOST", host_of(endpoint_url))
            .header("CALLBACK", format!("<{callback_url}>"))
            .header("NT", "upnp:event")
            .header("TIMEOUT", format!("Second-{timeout_seconds}"))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(Self::classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenaError::Protocol(format!("SUBSCRIBE answered {status}")));
        }

        let sid = header(&response, "SID")
            .ok_or_else(|| GenaError::Protocol("SUBSCRIBE response missing SID".to_string()))?;
        let timeout_seconds = header(&response, "TIMEOUT")
            .map(|t| parse_timeout(&t, timeout_seconds))
            .unwrap_or(timeout_seconds);

        debug!(sid, timeout_seconds, "subscribed");
        Ok(SubscribeResponse {
            sid,
            timeout_seconds,
        })
    }

    async fn renew(
        &self,
        endpoint_url: &str,
        sid: &str,
        timeout_seconds: u32,
    ) -> Result<u32, GenaError> {
        let response = self
            .http
            .request(Self::method(b"SUBSCRIBE"), endpoint_url)
            .header("HOST", host_of(endpoint_url))
            .header("SID", sid)
            .header("TIMEOUT", format!("Second-{timeout_seconds}"))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(Self::classify)?;

        let status = response.status();
        if status.as_u16() == 412 {
            return Err(GenaError::NotFound);
        }
        if !status.is_success() {
            return Err(GenaError::Protocol(format!("RENEW answered {status}")));
        }

        Ok(header(&response, "TIMEOUT")
            .map(|t| parse_timeout(&t, timeout_seconds))
            .unwrap_or(timeout_seconds))
    }

    async fn unsubscribe(&self, endpoint_url: &str, sid: &str) -> Result<(), GenaError> {
        let result = self
            .http
            .request(Self::method(b"UNSUBSCRIBE"), endpoint_url)
            .header("HOST", host_of(endpoint_url))
            .header("SID", sid)
            .timeout(self.timeout)
            .send()
            .await;

        match result {
            Ok(response) => {
                let status = response.status();
                if status.is_success() || status.as_u16() == 412 {
                    Ok(())
                } else {
                    Err(GenaError::Protocol(format!("UNSUBSCRIBE answered {status}")))
                }
            }
            // The device being gone is the same outcome as unsubscribing.
            Err(e) => {
                debug!(sid, error = %e, "unsubscribe transport failure treated as done");
                Ok(())
            }
        }
    }
}

fn header(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Parse a GENA `TIMEOUT` header (`Second-1800` or `Second-infinite`).
fn parse_timeout(value: &str, requested: u32) -> u32 {
    let Some(rest) = value.strip_prefix("Second-") else {
        warn!(value, "unparseable TIMEOUT header; keeping requested value");
        return requested;
    };
    if rest.eq_ignore_ascii_case("infinite") {
        return INFINITE_TIMEOUT_SECONDS;
    }
    rest.parse().unwrap_or_else(|_| {
        warn!(value, "unparseable TIMEOUT header; keeping requested value");
        requested
    })
}

fn host_of(endpoint_url: &str) -> String {
    url::Url::parse(endpoint_url)
        .ok()
        .and_then(|u| {
            let host = u.host_str()?.to_string();
            Some(match u.port() {
                Some(port) => format!("{host}:{port}"),
                None => host,
            })
        })
        .unwrap_or_else(|| endpoint_url.to_string())
}
