//! # Sync Connector
//!
//! The live replication channel to the remote sync service.
//!
//! ## Connection Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    WsSyncConnector                                      │
//! │                                                                         │
//! │  connect()                                                             │
//! │    │ access token? ── none ──► Err(NotAuthenticated)                   │
//! │    ▼                                                                    │
//! │  GET wss://…/sync/stream  (Authorization: Bearer <token>)              │
//! │    │ timeout ──► Err(Timeout)                                          │
//! │    ▼                                                                    │
//! │  ┌──────────────────────────┐                                          │
//! │  │ connection loop (task)   │  ping every N secs                       │
//! │  │  reads server frames     │  answers pings                           │
//! │  │  waits for shutdown      │                                          │
//! │  └────────────┬─────────────┘                                          │
//! │               │                                                         │
//! │  disconnect() ─► shutdown signal ─► Close frame ─► task joins           │
//! │  (no socket: no-op)                                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Neither call retries. Retrying is the lifecycle controller's decision,
//! and it only retries on a new session event.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::SyncSettings;
use crate::error::{SyncError, SyncResult};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Path of the streaming endpoint under an http(s) sync URL.
pub const STREAM_PATH: &str = "sync/stream";

// =============================================================================
// Traits
// =============================================================================

/// Supplies the bearer token for the sync connection.
pub trait CredentialSource: Send + Sync {
    /// Current access token, `None` when signed out.
    fn access_token(&self) -> Option<String>;
}

/// Opens and closes the sync connection.
///
/// Only the lifecycle controller calls these, one at a time.
#[async_trait]
pub trait SyncConnector: Send + Sync {
    /// Opens the connection. Ok if already open.
    async fn connect(&self) -> SyncResult<()>;

    /// Closes the connection. Ok if nothing is open.
    async fn disconnect(&self) -> SyncResult<()>;

    /// Watches whether the connection is open, for connectors whose
    /// connection can end without a `disconnect()` call.
    fn link_status(&self) -> Option<watch::Receiver<bool>> {
        None
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Settings for [`WsSyncConnector`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorConfig {
    /// WebSocket URL of the streaming endpoint.
    pub url: Url,

    /// Connection timeout.
    pub connect_timeout: Duration,

    /// Close handshake timeout.
    pub disconnect_timeout: Duration,

    /// Ping interval for keepalive.
    pub ping_interval: Duration,
}

impl ConnectorConfig {
    /// Builds the config from the sync endpoint and `[sync]` settings.
    pub fn new(sync_url: &Url, settings: &SyncSettings) -> SyncResult<Self> {
        Ok(ConnectorConfig {
            url: stream_url(sync_url)?,
            connect_timeout: Duration::from_secs(settings.connect_timeout_secs),
            disconnect_timeout: Duration::from_secs(settings.disconnect_timeout_secs),
            ping_interval: Duration::from_secs(settings.ping_interval_secs.max(1)),
        })
    }
}

/// Maps the configured sync endpoint to its WebSocket stream URL.
///
/// `ws://` and `wss://` URLs are used as given; `http(s)://` URLs get the
/// matching WebSocket scheme and the streaming path appended.
pub fn stream_url(base: &Url) -> SyncResult<Url> {
    let scheme = match base.scheme() {
        "ws" | "wss" => return Ok(base.clone()),
        "http" => "ws",
        "https" => "wss",
        other => {
            return Err(SyncError::InvalidUrl(format!(
                "unsupported sync URL scheme: {other}"
            )))
        }
    };

    let mut url = base.clone();
    url.set_scheme(scheme)
        .map_err(|_| SyncError::InvalidUrl(format!("cannot use {scheme} for {base}")))?;

    let path = url.path().trim_end_matches('/');
    if !path.ends_with(STREAM_PATH) {
        let joined = format!("{path}/{STREAM_PATH}");
        url.set_path(&joined);
    }
    Ok(url)
}

// =============================================================================
// WebSocket Connector
// =============================================================================

struct Link {
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<SyncResult<()>>,
}

/// [`SyncConnector`] over a WebSocket.
pub struct WsSyncConnector {
    config: ConnectorConfig,
    credentials: Arc<dyn CredentialSource>,
    link: Mutex<Option<Link>>,
    open_tx: Arc<watch::Sender<bool>>,
}

impl WsSyncConnector {
    /// Creates a connector; nothing is opened until `connect()`.
    pub fn new(config: ConnectorConfig, credentials: Arc<dyn CredentialSource>) -> Self {
        WsSyncConnector {
            config,
            credentials,
            link: Mutex::new(None),
            open_tx: Arc::new(watch::channel(false).0),
        }
    }

    /// Returns the stream URL.
    pub fn url(&self) -> &Url {
        &self.config.url
    }

    /// Returns true while the connection task is running.
    pub async fn is_open(&self) -> bool {
        self.link
            .lock()
            .await
            .as_ref()
            .is_some_and(|link| !link.task.is_finished())
    }

    fn build_request(&self, token: &str) -> SyncResult<Request> {
        let mut request = self.config.url.as_str().into_client_request()?;
        let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
            SyncError::InvalidConfig("access token is not a valid header value".into())
        })?;
        request.headers_mut().insert(AUTHORIZATION, value);
        Ok(request)
    }

    /// Connects with timeout.
    async fn connect_with_timeout(&self, request: Request) -> SyncResult<WsStream> {
        match timeout(self.config.connect_timeout, connect_async(request)).await {
            Ok(Ok((ws_stream, response))) => {
                debug!(status = ?response.status(), "WebSocket handshake complete");
                Ok(ws_stream)
            }
            Ok(Err(e)) => Err(SyncError::from(e)),
            Err(_) => Err(SyncError::Timeout(self.config.connect_timeout.as_secs())),
        }
    }
}

#[async_trait]
impl SyncConnector for WsSyncConnector {
    async fn connect(&self) -> SyncResult<()> {
        let mut link = self.link.lock().await;

        if link.as_ref().is_some_and(|l| !l.task.is_finished()) {
            debug!("Sync connection already open");
            return Ok(());
        }
        if let Some(stale) = link.take() {
            if let Ok(Err(e)) = stale.task.await {
                debug!(error = %e, "Previous sync connection had ended");
            }
        }

        let token = self
            .credentials
            .access_token()
            .ok_or(SyncError::NotAuthenticated)?;
        let request = self.build_request(&token)?;

        info!(url = %self.config.url, "Opening sync connection");
        let ws_stream = self.connect_with_timeout(request).await?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.open_tx.send_replace(true);
        let task = tokio::spawn({
            let open_tx = self.open_tx.clone();
            let ping_every = self.config.ping_interval;
            async move {
                let result = connection_loop(ws_stream, shutdown_rx, ping_every).await;
                open_tx.send_replace(false);
                result
            }
        });
        *link = Some(Link { shutdown_tx, task });

        info!("Sync connection open");
        Ok(())
    }

    async fn disconnect(&self) -> SyncResult<()> {
        let Some(link) = self.link.lock().await.take() else {
            debug!("No sync connection to close");
            return Ok(());
        };

        if link.shutdown_tx.send(()).is_err() {
            // The loop already exited; the socket is gone either way.
            debug!("Sync connection had already closed");
            return Ok(());
        }

        let mut task = link.task;
        match timeout(self.config.disconnect_timeout, &mut task).await {
            Ok(Ok(Err(SyncError::Disconnected))) => {
                // The server hung up while the close was on its way.
                debug!("Sync connection had already closed");
                Ok(())
            }
            Ok(Ok(result)) => {
                info!("Sync connection closed");
                result
            }
            Ok(Err(join_error)) => {
                self.open_tx.send_replace(false);
                Err(SyncError::Internal(format!(
                    "connection task failed: {join_error}"
                )))
            }
            Err(_) => {
                warn!("Close handshake timed out, dropping connection");
                task.abort();
                self.open_tx.send_replace(false);
                Err(SyncError::Timeout(self.config.disconnect_timeout.as_secs()))
            }
        }
    }

    fn link_status(&self) -> Option<watch::Receiver<bool>> {
        Some(self.open_tx.subscribe())
    }
}

/// Keeps the socket alive until shutdown or until the server goes away.
async fn connection_loop(
    ws_stream: WsStream,
    mut shutdown_rx: oneshot::Receiver<()>,
    ping_every: Duration,
) -> SyncResult<()> {
    let (mut write, mut read) = ws_stream.split();

    let mut ping_interval = interval_at(Instant::now() + ping_every, ping_every);
    ping_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            // Shutdown requested (or the connector was dropped)
            _ = &mut shutdown_rx => {
                debug!("Shutdown signal received, sending close frame");
                write.send(WsMessage::Close(None)).await?;
                return Ok(());
            }

            incoming = read.next() => {
                match incoming {
                    Some(Ok(WsMessage::Text(text))) => {
                        debug!(len = text.len(), "Received sync frame");
                    }
                    Some(Ok(WsMessage::Binary(data))) => {
                        debug!(len = data.len(), "Received binary sync frame");
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        write.send(WsMessage::Pong(data)).await?;
                    }
                    Some(Ok(WsMessage::Pong(_))) => {
                        debug!("Received pong");
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        info!(?frame, "Sync service closed the connection");
                        return Err(SyncError::Disconnected);
                    }
                    Some(Ok(WsMessage::Frame(_))) => {}
                    Some(Err(e)) => {
                        error!(error = %e, "Sync connection error");
                        return Err(SyncError::from(e));
                    }
                    None => return Err(SyncError::Disconnected),
                }
            }

            _ = ping_interval.tick() => {
                write.send(WsMessage::Ping(Vec::new().into())).await?;
                debug!("Sent ping");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_hdr_async;
    use tokio_tungstenite::tungstenite::handshake::server::{
        ErrorResponse, Request as ServerRequest, Response as ServerResponse,
    };

    struct StaticToken(Option<&'static str>);

    impl CredentialSource for StaticToken {
        fn access_token(&self) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    fn config(url: &str) -> ConnectorConfig {
        ConnectorConfig::new(&Url::parse(url).unwrap(), &SyncSettings::default()).unwrap()
    }

    #[test]
    fn test_stream_url() {
        let url = stream_url(&Url::parse("https://sync.example.com").unwrap()).unwrap();
        assert_eq!(url.as_str(), "wss://sync.example.com/sync/stream");

        let url = stream_url(&Url::parse("http://localhost:8080/api/").unwrap()).unwrap();
        assert_eq!(url.as_str(), "ws://localhost:8080/api/sync/stream");

        let url = stream_url(&Url::parse("wss://sync.example.com/custom").unwrap()).unwrap();
        assert_eq!(url.as_str(), "wss://sync.example.com/custom");

        let url = stream_url(&Url::parse("https://sync.example.com/sync/stream").unwrap()).unwrap();
        assert_eq!(url.as_str(), "wss://sync.example.com/sync/stream");

        assert!(stream_url(&Url::parse("ftp://sync.example.com").unwrap()).is_err());
    }

    #[tokio::test]
    async fn test_connect_without_session() {
        let connector = WsSyncConnector::new(config("ws://127.0.0.1:9"), Arc::new(StaticToken(None)));
        let err = connector.connect().await.unwrap_err();
        assert!(matches!(err, SyncError::NotAuthenticated));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_disconnect_when_closed_is_noop() {
        let connector =
            WsSyncConnector::new(config("ws://127.0.0.1:9"), Arc::new(StaticToken(Some("t"))));
        connector.disconnect().await.unwrap();
        connector.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_connection_refused_is_retryable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let connector = WsSyncConnector::new(
            config(&format!("ws://{addr}")),
            Arc::new(StaticToken(Some("t"))),
        );
        let err = connector.connect().await.unwrap_err();
        assert!(err.is_retryable(), "unexpected error: {err:?}");
        assert!(!connector.is_open().await);
    }

    #[tokio::test]
    async fn test_connect_and_disconnect_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (auth_tx, auth_rx) = oneshot::channel::<Option<String>>();
        let (closed_tx, closed_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let callback = move |req: &ServerRequest,
                                 resp: ServerResponse|
                  -> Result<ServerResponse, ErrorResponse> {
                let header = req
                    .headers()
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let _ = auth_tx.send(header);
                Ok(resp)
            };
            let mut ws = accept_hdr_async(stream, callback).await.unwrap();
            while let Some(msg) = ws.next().await {
                if matches!(msg, Ok(WsMessage::Close(_)) | Err(_)) {
                    break;
                }
            }
            let _ = closed_tx.send(());
        });

        let connector = WsSyncConnector::new(
            config(&format!("ws://{addr}")),
            Arc::new(StaticToken(Some("secret-token"))),
        );
        connector.connect().await.unwrap();
        assert!(connector.is_open().await);
        assert_eq!(auth_rx.await.unwrap().as_deref(), Some("Bearer secret-token"));

        // Second connect on an open socket does nothing.
        connector.connect().await.unwrap();

        connector.disconnect().await.unwrap();
        assert!(!connector.is_open().await);
        timeout(Duration::from_secs(2), closed_rx).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_link_status_reports_server_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let _ = ws.close(None).await;
        });

        let connector = WsSyncConnector::new(
            config(&format!("ws://{addr}")),
            Arc::new(StaticToken(Some("t"))),
        );
        let mut link = connector.link_status().unwrap();
        assert!(!*link.borrow());

        connector.connect().await.unwrap();
        timeout(Duration::from_secs(2), link.wait_for(|open| !*open))
            .await
            .unwrap()
            .unwrap();

        // Nothing left to close.
        connector.disconnect().await.unwrap();
    }
}
