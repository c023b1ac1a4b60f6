//! Mock Edge read-aloud WebSocket server
//!
//! Accepts connections on an ephemeral port, records the handshake URI and the
//! first two text frames (config, SSML) of every session, then plays back a
//! scripted list of frames. Handshakes can be rejected with 403 to exercise
//! clock skew recovery.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;

use edge_tts_gateway::config::ClientConfig;

type Script = dyn Fn(usize) -> Vec<Message> + Send + Sync;

/// Shared state of one mock server.
pub struct MockEdgeState {
    forbidden_remaining: AtomicUsize,
    forbidden_date: Option<String>,
    script: Box<Script>,
    /// Request URIs of every handshake, accepted or not.
    pub handshakes: Mutex<Vec<String>>,
    /// Text frames received per accepted session.
    pub received: Mutex<Vec<Vec<String>>>,
}

impl MockEdgeState {
    fn take_forbidden(&self) -> bool {
        self.forbidden_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Builder for a mock server.
pub struct MockEdgeServer {
    forbidden: usize,
    forbidden_date: Option<String>,
    script: Box<Script>,
}

impl MockEdgeServer {
    /// Plays `script(session_index)` on every accepted session.
    pub fn new(script: impl Fn(usize) -> Vec<Message> + Send + Sync + 'static) -> Self {
        Self {
            forbidden: 0,
            forbidden_date: None,
            script: Box::new(script),
        }
    }

    /// Rejects the first `count` handshakes with 403, optionally with a `Date`.
    pub fn forbid_first(mut self, count: usize, date: Option<&str>) -> Self {
        self.forbidden = count;
        self.forbidden_date = date.map(str::to_string);
        self
    }

    pub async fn start(self) -> (SocketAddr, Arc<MockEdgeState>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(MockEdgeState {
            forbidden_remaining: AtomicUsize::new(self.forbidden),
            forbidden_date: self.forbidden_date,
            script: self.script,
            handshakes: Mutex::new(Vec::new()),
            received: Mutex::new(Vec::new()),
        });

        let server_state = state.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let state = server_state.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, state).await {
                        eprintln!("Mock Edge connection error: {}", e);
                    }
                });
            }
        });

        (addr, state)
    }
}

async fn handle_connection(
    stream: TcpStream,
    state: Arc<MockEdgeState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let forbid = state.take_forbidden();
    let handshake_state = state.clone();
    let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        handshake_state.handshakes.lock().push(request.uri().to_string());
        if !forbid {
            return Ok(response);
        }
        let mut rejection = Response::builder().status(StatusCode::FORBIDDEN);
        if let Some(date) = &handshake_state.forbidden_date {
            rejection = rejection.header("Date", date.as_str());
        }
        Err(rejection
            .body(Some("Forbidden".to_string()))
            .expect("static rejection response"))
    };

    let ws_stream = match accept_hdr_async(stream, callback).await {
        Ok(ws_stream) => ws_stream,
        Err(_) if forbid => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    let (mut write, mut read) = ws_stream.split();

    let mut frames = Vec::new();
    while frames.len() < 2 {
        match read.next().await {
            Some(Ok(Message::Text(text))) => frames.push(text.to_string()),
            Some(Ok(_)) => continue,
            _ => return Ok(()),
        }
    }
    let session = {
        let mut received = state.received.lock();
        received.push(frames);
        received.len() - 1
    };

    for message in (state.script)(session) {
        write.send(message).await?;
    }

    // Wait for the client's close, then finish the closing handshake.
    while let Ok(Some(Ok(message))) =
        tokio::time::timeout(Duration::from_secs(5), read.next()).await
    {
        if let Message::Close(_) = message {
            break;
        }
    }
    let _ = write.close().await;
    Ok(())
}

// =============================================================================
// Frame Helpers
// =============================================================================

pub fn audio_frame(payload: &[u8]) -> Message {
    binary_frame("X-RequestId:1\r\nContent-Type:audio/mpeg\r\nPath:audio\r\n", payload)
}

pub fn binary_frame(headers: &str, payload: &[u8]) -> Message {
    let mut frame = Vec::with_capacity(2 + headers.len() + payload.len());
    frame.extend_from_slice(&(headers.len() as u16).to_be_bytes());
    frame.extend_from_slice(headers.as_bytes());
    frame.extend_from_slice(payload);
    Message::Binary(Bytes::from(frame))
}

pub fn text_frame(path: &str, body: &str) -> Message {
    Message::Text(format!("X-RequestId:1\r\nContent-Type:application/json; charset=utf-8\r\nPath:{path}\r\n\r\n{body}").into())
}

pub fn turn_start() -> Message {
    text_frame("turn.start", "{\"context\":{\"serviceTag\":\"mock\"}}")
}

pub fn turn_end() -> Message {
    text_frame("turn.end", "{}")
}

pub fn word_boundary(offset: u64, duration: u64, text: &str) -> Message {
    text_frame(
        "audio.metadata",
        &format!(
            "{{\"Metadata\":[{{\"Type\":\"WordBoundary\",\"Data\":{{\"Offset\":{offset},\"Duration\":{duration},\"text\":{{\"Text\":\"{text}\",\"Length\":{},\"BoundaryType\":\"WordBoundary\"}}}}}}]}}",
            text.len()
        ),
    )
}

/// Client configuration pointing at a mock server.
pub fn client_config(addr: SocketAddr) -> ClientConfig {
    ClientConfig {
        wss_url: format!("ws://{addr}/consumer/speech/synthesize/readaloud/edge/v1"),
        connect_timeout: Duration::from_secs(2),
        receive_timeout: Duration::from_secs(2),
        poll_interval: Duration::from_millis(10),
        ..Default::default()
    }
}

/// Value of query parameter `name` in a recorded handshake URI.
pub fn query_param(uri: &str, name: &str) -> Option<String> {
    let url = url::Url::parse(&format!("ws://mock{uri}")).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}
