//! WebSocket connector for the realtime endpoint

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header, HeaderValue, Request};
use tokio_tungstenite::tungstenite::Message;

use voice_duet_config::RealtimeConfig;
use voice_duet_core::AgentIdentity;

use crate::connection::{Connector, Outbound, RealtimeConnection, TransportEvent};
use crate::protocol::decode_frame;
use crate::TransportError;

/// Opens one WebSocket per agent against the configured endpoint
#[derive(Clone)]
pub struct WebSocketConnector {
    endpoint: String,
    api_key: Option<String>,
    connect_timeout: Duration,
    close_timeout: Duration,
}

impl WebSocketConnector {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key,
            connect_timeout: Duration::from_secs(10),
            close_timeout: Duration::from_secs(5),
        }
    }

    pub fn from_config(config: &RealtimeConfig) -> Self {
        Self {
            endpoint: config.endpoint(),
            api_key: config.api_key.clone(),
            connect_timeout: config.connect_timeout(),
            close_timeout: config.close_timeout(),
        }
    }

    pub fn with_timeouts(mut self, connect: Duration, close: Duration) -> Self {
        self.connect_timeout = connect;
        self.close_timeout = close;
        self
    }

    fn build_request(&self) -> Result<Request<()>, TransportError> {
        let mut request = self
            .endpoint
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        let headers = request.headers_mut();
        if let Some(key) = &self.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|e| TransportError::InvalidRequest(format!("Invalid API key: {}", e)))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        headers.insert("openai-beta", HeaderValue::from_static("realtime=v1"));

        Ok(request)
    }
}

impl std::fmt::Debug for WebSocketConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketConnector")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, agent: &AgentIdentity) -> Result<RealtimeConnection, TransportError> {
        let request = self.build_request()?;

        tracing::info!(
            agent = %agent.id,
            name = %agent.name,
            endpoint = %self.endpoint,
            "Opening realtime WebSocket"
        );

        let (ws, _response) =
            tokio::time::timeout(self.connect_timeout, tokio_tungstenite::connect_async(request))
                .await
                .map_err(|_| TransportError::Timeout(self.connect_timeout))?
                .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        let (mut sink, mut stream) = ws.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Outbound>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<TransportEvent>();
        let seat = agent.id;

        let writer = tokio::spawn(async move {
            while let Some(outbound) = out_rx.recv().await {
                match outbound {
                    Outbound::Event(event) => {
                        let json = match event.to_json() {
                            Ok(json) => json,
                            Err(e) => {
                                tracing::error!(agent = %seat, error = %e, "Failed to encode event");
                                continue;
                            },
                        };
                        tracing::trace!(agent = %seat, kind = event.kind(), "Sending event");
                        if let Err(e) = sink.send(Message::Text(json)).await {
                            tracing::warn!(agent = %seat, error = %e, "WebSocket send failed");
                            break;
                        }
                    },
                    Outbound::Close => break,
                }
            }
            // Dropped sender or explicit close
            let _ = sink.send(Message::Close(None)).await;
            let _ = sink.close().await;
        });

        // Pings are answered by tungstenite on the next read.
        let reader = tokio::spawn(async move {
            let mut reason = None;
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        if in_tx.send(decode_frame(&text)).is_err() {
                            return;
                        }
                    },
                    Ok(Message::Binary(bytes)) => {
                        tracing::debug!(agent = %seat, bytes = bytes.len(), "Ignoring binary frame");
                    },
                    Ok(Message::Close(frame)) => {
                        reason = frame.map(|f| f.reason.to_string()).filter(|r| !r.is_empty());
                        break;
                    },
                    Ok(_) => {},
                    Err(e) => {
                        reason = Some(e.to_string());
                        break;
                    },
                }
            }
            let _ = in_tx.send(TransportEvent::Closed { reason });
        });

        Ok(RealtimeConnection::new(
            agent.id,
            out_tx,
            in_rx,
            vec![writer, reader],
            self.close_timeout,
        ))
    }

    fn name(&self) -> &'static str {
        "websocket"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_duet_core::AgentId;

    #[test]
    fn test_request_carries_auth_headers() {
        let connector = WebSocketConnector::new(
            "wss://realtime.example.com/v1/realtime?model=voice-1",
            Some("sk-test".to_string()),
        );
        let request = connector.build_request().unwrap();

        assert_eq!(request.uri().query(), Some("model=voice-1"));
        assert_eq!(request.headers()[header::AUTHORIZATION], "Bearer sk-test");
        assert_eq!(request.headers()["openai-beta"], "realtime=v1");
    }

    #[test]
    fn test_request_rejects_bad_url() {
        let connector = WebSocketConnector::new("not a url", None);
        assert!(matches!(connector.build_request(), Err(TransportError::InvalidRequest(_))));
    }

    #[test]
    fn test_debug_redacts_key() {
        let connector = WebSocketConnector::new("wss://x", Some("sk-secret".into()));
        assert!(!format!("{:?}", connector).contains("sk-secret"));
    }

    #[tokio::test]
    async fn test_connect_refused_reports_failure() {
        // Nothing listens on port 9 locally
        let connector = WebSocketConnector::new("ws://127.0.0.1:9/realtime", None)
            .with_timeouts(Duration::from_secs(2), Duration::from_millis(100));
        let identity = AgentIdentity::new(AgentId::A, "Alex");

        let result = connector.connect(&identity).await;
        assert!(matches!(
            result,
            Err(TransportError::ConnectionFailed(_)) | Err(TransportError::Timeout(_))
        ));
    }
}
