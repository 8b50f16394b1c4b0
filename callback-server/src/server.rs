//! The HTTP server behind the callback URL.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use warp::Filter;

use crate::NotifyPayload;

/// Errors raised while bringing the callback endpoint up or down.
#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    #[error("no available port in range {start}-{end}")]
    NoAvailablePort { start: u16, end: u16 },

    #[error("failed to detect a local IP address for callback URLs")]
    NoLocalAddress,

    #[error("callback server failed to start: {0}")]
    StartupFailed(String),

    #[error("callback server shutdown error: {0}")]
    ShutdownFailed(String),
}

/// HTTP server receiving GENA NOTIFY requests for the whole fleet.
///
/// One server handles every device and service; the callback path embeds a
/// process-unique token so stale device state from an earlier run cannot be
/// mistaken for current traffic, plus an optional service suffix so the
/// source service kind survives even when the body shape is ambiguous.
pub struct CallbackServer {
    port: u16,
    base_url: String,
    token: String,
    shutdown_tx: Option<mpsc::Sender<()>>,
    server_handle: Option<JoinHandle<()>>,
}

impl CallbackServer {
    /// Bind the first free port in `port_range` and start serving.
    pub async fn start(
        port_range: (u16, u16),
        sender: mpsc::UnboundedSender<NotifyPayload>,
    ) -> Result<Self, CallbackError> {
        let port = find_available_port(port_range.0, port_range.1).ok_or(
            CallbackError::NoAvailablePort {
                start: port_range.0,
                end: port_range.1,
            },
        )?;
        let local_ip = detect_local_ip().ok_or(CallbackError::NoLocalAddress)?;
        let token = uuid::Uuid::new_v4().simple().to_string();
        let base_url = format!("http://{local_ip}:{port}");

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (ready_tx, mut ready_rx) = mpsc::channel::<()>(1);

        let route_token = token.clone();
        let server_handle = tokio::spawn(async move {
            let routes = notify_route(route_token, sender).recover(handle_rejection);
            let (addr, server) = warp::serve(routes).bind_with_graceful_shutdown(
                SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), port),
                async move {
                    shutdown_rx.recv().await;
                },
            );
            info!(%addr, "callback server listening");
            let _ = ready_tx.send(()).await;
            server.await;
        });

        ready_rx
            .recv()
            .await
            .ok_or_else(|| CallbackError::StartupFailed("server task exited early".to_string()))?;

        Ok(Self {
            port,
            base_url,
            token,
            shutdown_tx: Some(shutdown_tx),
            server_handle: Some(server_handle),
        })
    }

    /// The bound port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Base callback URL, without a service suffix.
    pub fn callback_url(&self) -> String {
        self.urls().base()
    }

    /// Callback URL carrying a per-service path suffix.
    pub fn callback_url_for(&self, service_suffix: &str) -> String {
        self.urls().for_service(service_suffix)
    }

    /// A cloneable handle that can mint callback URLs after the server
    /// handle itself has been moved elsewhere.
    pub fn urls(&self) -> CallbackUrls {
        CallbackUrls {
            base_url: self.base_url.clone(),
            token: self.token.clone(),
        }
    }

    /// Signal the server to stop and wait for it to finish.
    pub async fn shutdown(mut self) -> Result<(), CallbackError> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.server_handle.take() {
            tokio::time::timeout(std::time::Duration::from_secs(5), handle)
                .await
                .map_err(|_| CallbackError::ShutdownFailed("timed out".to_string()))?
                .map_err(|e| CallbackError::ShutdownFailed(e.to_string()))?;
        }
        Ok(())
    }
}

/// Callback URL factory detached from the server's lifecycle.
#[derive(Debug, Clone)]
pub struct CallbackUrls {
    base_url: String,
    token: String,
}

impl CallbackUrls {
    /// Build a URLs handle for an externally-known base URL, e.g. when the
    /// callback endpoint sits behind explicit network configuration.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    /// The base NOTIFY URL.
    pub fn base(&self) -> String {
        format!("{}/notify/{}", self.base_url, self.token)
    }

    /// A NOTIFY URL carrying a per-service path suffix.
    pub fn for_service(&self, suffix: &str) -> String {
        format!("{}/notify/{}/{}", self.base_url, self.token, suffix)
    }
}

#[derive(Debug)]
struct InvalidNotifyHeaders;
impl warp::reject::Reject for InvalidNotifyHeaders {}

fn notify_route(
    token: String,
    sender: mpsc::UnboundedSender<NotifyPayload>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::method()
        .and(warp::path::full())
        .and(warp::header::optional::<String>("sid"))
        .and(warp::header::optional::<String>("seq"))
        .and(warp::header::optional::<String>("nt"))
        .and(warp::header::optional::<String>("nts"))
        .and(warp::body::bytes())
        .and_then(
            move |method: warp::http::Method,
                  path: warp::path::FullPath,
                  sid: Option<String>,
                  seq: Option<String>,
                  nt: Option<String>,
                  nts: Option<String>,
                  body: bytes::Bytes| {
                let token = token.clone();
                let sender = sender.clone();
                async move {
                    // Anything that is not `NOTIFY upnp:event/upnp:propchange`
                    // is rejected before the body is considered.
                    if method.as_str() != "NOTIFY" {
                        return Err(warp::reject::not_found());
                    }
                    if nt.as_deref() != Some("upnp:event")
                        || nts.as_deref() != Some("upnp:propchange")
                    {
                        warn!(?nt, ?nts, "NOTIFY with invalid UPnP headers");
                        return Err(warp::reject::custom(InvalidNotifyHeaders));
                    }
                    let Some(sid) = sid.filter(|s| !s.is_empty()) else {
                        warn!("NOTIFY without SID header");
                        return Err(warp::reject::custom(InvalidNotifyHeaders));
                    };

                    let Some(service_hint) = parse_notify_path(path.as_str(), &token) else {
                        debug!(path = path.as_str(), "NOTIFY on unknown path");
                        return Err(warp::reject::not_found());
                    };

                    let payload = NotifyPayload {
                        sid,
                        seq: seq.and_then(|s| s.trim().parse().ok()),
                        service_hint,
                        body: String::from_utf8_lossy(&body).into_owned(),
                    };
                    debug!(sid = %payload.sid, seq = ?payload.seq, "NOTIFY received");

                    // Receipt is acknowledged regardless of what happens
                    // downstream; a non-200 answer makes the device retry.
                    let _ = sender.send(payload);
                    Ok::<_, warp::Rejection>(warp::reply::with_status(
                        "",
                        warp::http::StatusCode::OK,
                    ))
                }
            },
        )
}

/// Split `/notify/{token}[/{suffix}]`, checking the token.
///
/// Returns `None` for foreign paths and `Some(suffix)` for ours.
fn parse_notify_path(path: &str, token: &str) -> Option<Option<String>> {
    let rest = path.strip_prefix("/notify/")?;
    let (path_token, suffix) = match rest.split_once('/') {
        Some((t, s)) => (t, Some(s)),
        None => (rest, None),
    };
    if path_token != token {
        return None;
    }
    Some(suffix.filter(|s| !s.is_empty()).map(str::to_string))
}

async fn handle_rejection(
    err: warp::Rejection,
) -> Result<impl warp::Reply, std::convert::Infallible> {
    let code = if err.find::<InvalidNotifyHeaders>().is_some() {
        warp::http::StatusCode::BAD_REQUEST
    } else if err.is_not_found() {
        warp::http::StatusCode::NOT_FOUND
    } else {
        warp::http::StatusCode::INTERNAL_SERVER_ERROR
    };
    Ok(warp::reply::with_status("", code))
}

fn find_available_port(start: u16, end: u16) -> Option<u16> {
    (start..=end).find(|&port| {
        TcpListener::bind(SocketAddr::new(
            IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port,
        ))
        .is_ok()
    })
}

/// Determine the local IP the fleet can reach us on, using outbound-routing
/// lookup on a connected UDP socket. No packet is sent.
fn detect_local_ip() -> Option<IpAddr> {
    let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    Some(socket.local_addr().ok()?.ip())
}
