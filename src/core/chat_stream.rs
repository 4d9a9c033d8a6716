//! Chat-completions transport: one-shot requests and streamed replies.
//!
//! The streaming body is a sequence of newline-terminated lines. Lines
//! carrying a `data: ` prefix hold a JSON delta envelope; the literal
//! `data: [DONE]` line ends the stream. Everything else (keep-alive
//! blanks, other SSE fields) is ignored.

use std::error::Error;
use std::fmt;

use futures_util::{Stream, StreamExt};
use memchr::memchr;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::api::{ChatRequest, ChatResponse};
use crate::utils::url::endpoint_url;

const DONE_SENTINEL: &str = "data: [DONE]";
const DATA_PREFIX: &str = "data: ";

#[derive(Debug)]
pub enum ChatError {
    /// The request body failed to serialize.
    Encode(serde_json::Error),
    /// The HTTP exchange itself failed (connect, TLS, timeout).
    Transport(reqwest::Error),
    /// A non-streaming response body was not valid JSON for the
    /// expected shape.
    Decode(serde_json::Error),
    /// Reading the streaming body failed mid-flight.
    StreamRead(reqwest::Error),
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::Encode(err) => write!(f, "failed to encode request body: {err}"),
            ChatError::Transport(err) => write!(f, "request failed: {err}"),
            ChatError::Decode(err) => write!(f, "failed to decode response body: {err}"),
            ChatError::StreamRead(err) => write!(f, "failed to read response stream: {err}"),
        }
    }
}

impl Error for ChatError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ChatError::Encode(err) | ChatError::Decode(err) => Some(err),
            ChatError::Transport(err) | ChatError::StreamRead(err) => Some(err),
        }
    }
}

/// One step of a streaming reply, in arrival order.
#[derive(Debug)]
pub enum StreamEvent {
    /// An incremental piece of assistant text.
    Fragment(String),
    /// A data line that could not be decoded; the stream keeps going.
    Malformed(String),
    /// The stream died. Terminal, nothing follows.
    Failed(ChatError),
    /// Normal end of stream, via the done sentinel or connection close.
    Done,
}

/// Envelope of one streamed data line. Internal to the decoder; the
/// stable response model lives in [`crate::api`].
#[derive(Deserialize)]
struct DeltaEnvelope {
    #[serde(default)]
    choices: Vec<DeltaChoice>,
}

#[derive(Deserialize)]
struct DeltaChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Deserialize, Default)]
struct Delta {
    content: Option<String>,
}

/// Configuration for [`ChatClient`].
///
/// Supplying `http` lets callers set timeouts or swap the transport;
/// this layer itself imposes neither.
pub struct ClientConfig {
    pub base_url: String,
    /// Signed token used verbatim as the `Authorization` header value.
    pub token: String,
    pub http: Option<reqwest::Client>,
}

pub struct ChatClient {
    http: reqwest::Client,
    url: String,
    token: String,
}

impl ChatClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            http: config.http.unwrap_or_default(),
            url: endpoint_url(&config.base_url, "chat/completions"),
            token: config.token,
        }
    }

    /// Send `request` and decode the complete response body.
    ///
    /// An empty choice list is not an error here; see
    /// [`ChatResponse::first_content`].
    pub async fn complete(&self, mut request: ChatRequest) -> Result<ChatResponse, ChatError> {
        request.stream = false;
        let body = serde_json::to_vec(&request).map_err(ChatError::Encode)?;
        let response = self
            .http
            .post(&self.url)
            .header("Authorization", &self.token)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(ChatError::Transport)?;
        let raw = response.text().await.map_err(ChatError::Transport)?;
        serde_json::from_str(&raw).map_err(ChatError::Decode)
    }

    /// Send `request` and stream the reply incrementally.
    ///
    /// The receiver yields events in arrival order and always finishes
    /// with [`StreamEvent::Done`] or [`StreamEvent::Failed`]; it cannot
    /// be restarted.
    pub fn stream(&self, mut request: ChatRequest) -> mpsc::UnboundedReceiver<StreamEvent> {
        request.stream = true;
        let (tx, rx) = mpsc::unbounded_channel();
        let http = self.http.clone();
        let url = self.url.clone();
        let token = self.token.clone();

        tokio::spawn(async move {
            let body = match serde_json::to_vec(&request) {
                Ok(body) => body,
                Err(err) => {
                    let _ = tx.send(StreamEvent::Failed(ChatError::Encode(err)));
                    return;
                }
            };
            let response = match http
                .post(&url)
                .header("Authorization", &token)
                .header("Content-Type", "application/json")
                .body(body)
                .send()
                .await
            {
                Ok(response) => response,
                Err(err) => {
                    let _ = tx.send(StreamEvent::Failed(ChatError::Transport(err)));
                    return;
                }
            };
            pump_stream(response.bytes_stream(), &tx).await;
        });

        rx
    }
}

/// Drive the body to completion, splitting buffered chunks into lines
/// and forwarding one event per decoded step. The body is dropped on
/// every exit path, which releases the connection.
async fn pump_stream<S, B>(mut body: S, tx: &mpsc::UnboundedSender<StreamEvent>)
where
    S: Stream<Item = Result<B, reqwest::Error>> + Unpin,
    B: AsRef<[u8]>,
{
    let mut buffer: Vec<u8> = Vec::new();
    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err) => {
                let _ = tx.send(StreamEvent::Failed(ChatError::StreamRead(err)));
                return;
            }
        };
        buffer.extend_from_slice(chunk.as_ref());

        while let Some(newline) = memchr(b'\n', &buffer) {
            let done = match std::str::from_utf8(&buffer[..newline]) {
                Ok(line) => process_line(line, tx),
                Err(err) => {
                    let _ = tx.send(StreamEvent::Malformed(format!(
                        "invalid UTF-8 in stream: {err}"
                    )));
                    false
                }
            };
            buffer.drain(..=newline);
            if done {
                let _ = tx.send(StreamEvent::Done);
                return;
            }
        }
    }

    // Connection closed without a sentinel: a normal terminator. Any
    // unterminated tail in the buffer is dropped.
    let _ = tx.send(StreamEvent::Done);
}

/// Handle one line of the streaming body. Returns `true` when the line
/// was the done sentinel and reading should stop.
fn process_line(line: &str, tx: &mpsc::UnboundedSender<StreamEvent>) -> bool {
    if line.trim() == DONE_SENTINEL {
        return true;
    }
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        if !line.trim().is_empty() {
            debug!(line, "ignoring non-data stream line");
        }
        return false;
    };
    match serde_json::from_str::<DeltaEnvelope>(payload) {
        Ok(envelope) => {
            for choice in envelope.choices {
                if let Some(content) = choice.delta.content {
                    let _ = tx.send(StreamEvent::Fragment(content));
                }
            }
        }
        Err(err) => {
            warn!(%err, "skipping undecodable stream line");
            let _ = tx.send(StreamEvent::Malformed(format!("{err}: {payload}")));
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    async fn pump_chunks(chunks: Vec<&'static [u8]>) -> Vec<StreamEvent> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let body = stream::iter(chunks.into_iter().map(Ok::<_, reqwest::Error>));
        pump_stream(body, &tx).await;
        drop(tx);

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn fragment_then_done_sentinel() {
        let events = pump_chunks(vec![
            b"data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n",
            b"data: [DONE]\n",
        ])
        .await;

        match &events[..] {
            [StreamEvent::Fragment(text), StreamEvent::Done] => assert_eq!(text, "Hi"),
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[tokio::test]
    async fn eof_without_sentinel_ends_cleanly() {
        let events = pump_chunks(vec![
            b"data: {\"choices\":[{\"delta\":{\"content\":\"partial\"}}]}\n",
        ])
        .await;

        match &events[..] {
            [StreamEvent::Fragment(text), StreamEvent::Done] => assert_eq!(text, "partial"),
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_line_is_reported_and_skipped() {
        let events = pump_chunks(vec![
            b"data: {not json}\n",
            b"data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n",
            b"data: [DONE]\n",
        ])
        .await;

        match &events[..] {
            [StreamEvent::Malformed(_), StreamEvent::Fragment(text), StreamEvent::Done] => {
                assert_eq!(text, "ok")
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[tokio::test]
    async fn multi_choice_lines_emit_one_fragment_per_choice() {
        let events = pump_chunks(vec![
            b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}},{\"delta\":{}},{\"delta\":{\"content\":\"b\"}}]}\n",
            b"data: [DONE]\n",
        ])
        .await;

        match &events[..] {
            [StreamEvent::Fragment(first), StreamEvent::Fragment(second), StreamEvent::Done] => {
                assert_eq!(first, "a");
                assert_eq!(second, "b");
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_data_lines_are_ignored() {
        let events = pump_chunks(vec![
            b"\n",
            b": keep-alive\n",
            b"event: ping\n",
            b"data: [DONE]\n",
        ])
        .await;

        assert!(matches!(&events[..], [StreamEvent::Done]));
    }

    #[tokio::test]
    async fn lines_reassemble_across_chunk_boundaries() {
        let events = pump_chunks(vec![
            b"data: {\"choices\":[{\"del",
            b"ta\":{\"content\":\"split\"}}]}\ndata: [D",
            b"ONE]\n",
        ])
        .await;

        match &events[..] {
            [StreamEvent::Fragment(text), StreamEvent::Done] => assert_eq!(text, "split"),
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[tokio::test]
    async fn content_after_sentinel_is_dropped() {
        let events = pump_chunks(vec![
            b"data: [DONE]\ndata: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n",
        ])
        .await;

        assert!(matches!(&events[..], [StreamEvent::Done]));
    }

    #[tokio::test]
    async fn sentinel_tolerates_surrounding_whitespace() {
        let events = pump_chunks(vec![b"  data: [DONE] \r\n"]).await;
        assert!(matches!(&events[..], [StreamEvent::Done]));
    }

    #[test]
    fn client_builds_completions_url_from_base() {
        let client = ChatClient::new(ClientConfig {
            base_url: "https://example.com/v4/".to_string(),
            token: "token".to_string(),
            http: None,
        });
        assert_eq!(client.url, "https://example.com/v4/chat/completions");
    }
}
