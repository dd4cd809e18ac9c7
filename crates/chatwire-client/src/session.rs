//! One streaming HTTP request and its decoded events.

use std::collections::VecDeque;
use std::pin::Pin;

use futures::{Stream, StreamExt};
use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::sse::{FrameParser, StreamEvent};
use crate::transport::RequestDescriptor;

/// Decoded events of one open session.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// A single-use streaming request.
///
/// The underlying client has no total timeout; a read that stays idle longer
/// than the configured ceiling fails with a network error instead.
#[derive(Debug, Clone)]
pub struct StreamSession {
    client: Client,
}

impl StreamSession {
    /// Create a session with a client tuned for long-lived responses.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` if the HTTP client cannot be created.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .read_timeout(config.stream_idle_timeout())
            .build()
            .map_err(|e| ClientError::Config(format!("failed to create stream client: {e}")))?;

        Ok(Self { client })
    }

    /// Create a session on an existing client.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Send `descriptor` and return its decoded events.
    ///
    /// The returned stream checks `cancel` before yielding each event and
    /// ends quietly once it is cancelled. It also ends when the body does;
    /// an unterminated trailing frame is dropped.
    ///
    /// # Errors
    ///
    /// `HttpStatus` for a non-2xx response, `InvalidResponse` if no
    /// well-formed response arrives, `Network` for connection failures.
    /// Body read failures surface as `Network` items of the stream.
    pub async fn open(
        self,
        descriptor: &RequestDescriptor,
        cancel: CancellationToken,
    ) -> Result<EventStream> {
        tracing::debug!(method = %descriptor.method(), url = %descriptor.url(), "Opening stream");

        let response = descriptor
            .to_request(&self.client)
            .header(ACCEPT, HeaderValue::from_static("text/event-stream"))
            .send()
            .await
            .map_err(ClientError::from_send)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.ok().filter(|body| !body.is_empty());
            tracing::debug!(url = %descriptor.url(), status = %status, "Stream request failed");
            return Err(ClientError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(Box::pin(decode(Box::pin(response.bytes_stream()), cancel)))
    }
}

struct DecodeState<S> {
    chunks: S,
    parser: FrameParser,
    pending: VecDeque<StreamEvent>,
    cancel: CancellationToken,
    finished: bool,
}

/// Turn a chunk stream into events.
///
/// Stops after the first chunk error, which is yielded once.
pub(crate) fn decode<S, B, E>(
    chunks: S,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<StreamEvent>>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Into<ClientError>,
{
    let state = DecodeState {
        chunks,
        parser: FrameParser::new(),
        pending: VecDeque::new(),
        cancel,
        finished: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if state.cancel.is_cancelled() {
                tracing::debug!("Stream cancelled");
                return None;
            }
            if let Some(event) = state.pending.pop_front() {
                return Some((Ok(event), state));
            }
            if state.finished {
                return None;
            }

            match state.chunks.next().await {
                Some(Ok(chunk)) => state.pending.extend(state.parser.push(chunk.as_ref())),
                Some(Err(err)) => {
                    state.finished = true;
                    return Some((Err(err.into()), state));
                }
                None => {
                    let dropped = state.parser.finish();
                    if dropped > 0 {
                        tracing::debug!(bytes = dropped, "Dropped unterminated frame at end of stream");
                    }
                    state.finished = true;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc;
    use futures::stream;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::testing::raw_http_server;
    use crate::transport::{Endpoint, Transport};

    fn descriptor(base: &str) -> RequestDescriptor {
        Transport::with_client(Client::new(), base)
            .unwrap()
            .build(&Endpoint::post("conversations/c1/messages").json(serde_json::json!({
                "role": "user",
                "text": "Hello"
            })))
            .unwrap()
    }

    async fn collect(events: EventStream) -> Vec<Result<StreamEvent>> {
        events.collect().await
    }

    #[tokio::test]
    async fn streams_events_from_sse_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/conversations/c1/messages"))
            .and(header("accept", "text/event-stream"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(
                        ": keep-alive\n\ndata: {\"deltaText\":\"Hi\"}\n\ndata: {\"done\":true}\n\n",
                    ),
            )
            .expect(1)
            .mount(&server)
            .await;

        let events = StreamSession::with_client(Client::new())
            .open(&descriptor(&server.uri()), CancellationToken::new())
            .await
            .unwrap();
        let events: Vec<StreamEvent> = collect(events)
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();

        assert_eq!(
            events,
            vec![StreamEvent::DeltaText("Hi".into()), StreamEvent::Done]
        );
    }

    #[tokio::test]
    async fn non_success_status_fails_open() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let result = StreamSession::with_client(Client::new())
            .open(&descriptor(&server.uri()), CancellationToken::new())
            .await;

        match result {
            Err(ClientError::HttpStatus { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body.as_deref(), Some("overloaded"));
            }
            Err(other) => panic!("expected HttpStatus, got {other:?}"),
            Ok(_) => panic!("expected HttpStatus, got a stream"),
        }
    }

    #[tokio::test]
    async fn cancelled_before_first_event_yields_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("data: {\"deltaText\":\"Hi\"}\n\n"),
            )
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        let events = StreamSession::with_client(Client::new())
            .open(&descriptor(&server.uri()), cancel.clone())
            .await
            .unwrap();
        cancel.cancel();

        assert!(collect(events).await.is_empty());
    }

    #[tokio::test]
    async fn unterminated_tail_ends_quietly() {
        let chunks = stream::iter(vec![
            Ok::<_, ClientError>(b"data: {\"deltaText\":\"a\"}\n\n".to_vec()),
            Ok(b"data: {\"deltaText\":\"b\"}".to_vec()),
        ]);

        let events: Vec<_> = decode(chunks, CancellationToken::new()).collect().await;

        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].as_ref().unwrap(),
            &StreamEvent::DeltaText("a".into())
        );
    }

    #[tokio::test]
    async fn chunk_error_is_yielded_once_then_ends() {
        let chunks = stream::iter(vec![
            Ok(b"data: {\"deltaText\":\"a\"}\n\n".to_vec()),
            Err(ClientError::InvalidResponse("connection reset".into())),
            Ok(b"data: {\"deltaText\":\"never\"}\n\n".to_vec()),
        ]);

        let events: Vec<_> = decode(chunks, CancellationToken::new()).collect().await;

        assert_eq!(events.len(), 2);
        assert!(events[0].is_ok());
        assert!(matches!(events[1], Err(ClientError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn non_http_reply_is_invalid_response() {
        let base = raw_http_server(b"NOT-HTTP garbage\r\n\r\n").await;

        let result = StreamSession::with_client(Client::new())
            .open(&descriptor(&base), CancellationToken::new())
            .await;

        match result {
            Err(ClientError::InvalidResponse(_)) => {}
            Err(other) => panic!("expected InvalidResponse, got {other:?}"),
            Ok(_) => panic!("expected open to fail"),
        }
    }

    #[tokio::test]
    async fn cancellation_is_observed_between_events() {
        let (tx, rx) = mpsc::unbounded::<std::result::Result<Vec<u8>, ClientError>>();
        let cancel = CancellationToken::new();
        let mut events = Box::pin(decode(rx, cancel.clone()));

        tx.unbounded_send(Ok(b"data: {\"deltaText\":\"one\"}\n\n".to_vec()))
            .unwrap();
        assert_eq!(
            events.next().await.unwrap().unwrap(),
            StreamEvent::DeltaText("one".into())
        );

        cancel.cancel();
        tx.unbounded_send(Ok(b"data: {\"deltaText\":\"two\"}\n\n".to_vec()))
            .unwrap();
        assert!(events.next().await.is_none());
    }
}
