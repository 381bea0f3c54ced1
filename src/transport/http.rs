// HTTP/SSE transport for the research backend

use std::time::Duration;

use futures_util::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;

use super::{EventTransport, ResearchRequest, Subscription, TransportError, TransportEvent};
use crate::config::BackendConfig;
use crate::parsers::{decode_frame, SseDecoder, SseFrame};

/// Body of the backend's health endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }
}

/// Streams research events with `POST {url}{stream_path}` and reads the
/// response body as Server-Sent Events
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    stream_url: String,
    health_url: String,
}

impl HttpTransport {
    pub fn new(config: &BackendConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(concat!("research-stream/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            stream_url: config.stream_url(),
            health_url: config.health_url(),
        })
    }

    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }

    /// Query the backend health endpoint
    pub async fn check_health(&self) -> Result<HealthStatus, TransportError> {
        let response = self
            .client
            .get(&self.health_url)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::HttpStatus { status, body });
        }

        response
            .json::<HealthStatus>()
            .await
            .map_err(|e| TransportError::Request(format!("Invalid health response: {}", e)))
    }
}

impl EventTransport for HttpTransport {
    fn open(&self, request: &ResearchRequest) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = self.client.clone();
        let url = self.stream_url.clone();
        let request = request.clone();

        let task = tokio::spawn(async move {
            stream_research(client, url, request, tx).await;
        });

        Subscription::new(rx, Some(task))
    }
}

async fn stream_research(
    client: reqwest::Client,
    url: String,
    request: ResearchRequest,
    tx: mpsc::UnboundedSender<TransportEvent>,
) {
    log::info!(
        "Opening research stream {} for session {}",
        url,
        request.session_id
    );

    let response = match client
        .post(&url)
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .json(&serde_json::json!({ "topic": request.topic }))
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            let _ = tx.send(TransportEvent::Failed(TransportError::Request(
                e.to_string(),
            )));
            return;
        }
    };

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let _ = tx.send(TransportEvent::Failed(TransportError::HttpStatus {
            status,
            body,
        }));
        return;
    }

    let mut body = response.bytes_stream();
    let mut decoder = SseDecoder::new();

    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                let _ = tx.send(TransportEvent::Failed(TransportError::StreamRead(
                    e.to_string(),
                )));
                return;
            }
        };

        for frame in decoder.push(&chunk) {
            match forward_frame(&tx, &frame) {
                Forwarded::More => {}
                Forwarded::Terminal => {
                    log::debug!("Research stream for session {} finished", request.session_id);
                    return;
                }
                Forwarded::Closed => {
                    log::debug!("Subscriber for session {} went away", request.session_id);
                    return;
                }
            }
        }
    }

    if let Some(frame) = decoder.finish() {
        forward_frame(&tx, &frame);
    }

    log::debug!("Research stream for session {} ended", request.session_id);
}

/// What the read loop should do after forwarding a frame
#[derive(Debug, PartialEq, Eq)]
enum Forwarded {
    More,
    /// A terminal event went out; nothing after it can apply
    Terminal,
    /// The receiving side has been closed
    Closed,
}

fn forward_frame(tx: &mpsc::UnboundedSender<TransportEvent>, frame: &SseFrame) -> Forwarded {
    let (item, terminal) = match decode_frame(frame) {
        Ok(event) => {
            let terminal = event.is_terminal();
            (TransportEvent::Event(event), terminal)
        }
        Err(e) => {
            log::warn!(
                "Malformed SSE frame (id {}): {}",
                frame.id.as_deref().unwrap_or("-"),
                e
            );
            (TransportEvent::Malformed(e), false)
        }
    };

    if tx.send(item).is_err() {
        Forwarded::Closed
    } else if terminal {
        Forwarded::Terminal
    } else {
        Forwarded::More
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ResearchEvent;

    #[test]
    fn test_health_status_is_ok() {
        let health: HealthStatus =
            serde_json::from_str(r#"{"status": "ok", "service": "research-assistant-backend"}"#)
                .unwrap();
        assert!(health.is_ok());
        assert_eq!(health.service.as_deref(), Some("research-assistant-backend"));

        let degraded: HealthStatus = serde_json::from_str(r#"{"status": "degraded"}"#).unwrap();
        assert!(!degraded.is_ok());
    }

    #[test]
    fn test_transport_uses_configured_urls() {
        let config = BackendConfig {
            url: "http://research.local:9000/".to_string(),
            ..BackendConfig::default()
        };
        let transport = HttpTransport::new(&config).unwrap();
        assert_eq!(transport.stream_url(), "http://research.local:9000/research-stream");
    }

    #[test]
    fn test_forward_frame_marks_garbage_malformed() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let frame = SseFrame {
            data: "nope".to_string(),
            ..SseFrame::default()
        };
        assert_eq!(forward_frame(&tx, &frame), Forwarded::More);
        assert!(matches!(
            rx.try_recv(),
            Ok(TransportEvent::Malformed(_))
        ));
    }

    #[test]
    fn test_forward_frame_stops_after_terminal_event() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let done = SseFrame {
            id: Some("42".to_string()),
            data: r#"{"type": "status", "agent": "System", "status": "finished"}"#.to_string(),
            ..SseFrame::default()
        };
        assert_eq!(forward_frame(&tx, &done), Forwarded::Terminal);
        assert_eq!(rx.try_recv(), Ok(TransportEvent::Event(ResearchEvent::Done)));

        drop(rx);
        let status = SseFrame {
            data: r#"{"type": "status", "agent": "Supervisor", "status": "working"}"#.to_string(),
            ..SseFrame::default()
        };
        assert_eq!(forward_frame(&tx, &status), Forwarded::Closed);
    }
}
