//! HttpEventSource - reqwest-backed `ChannelTransport`.
//!
//! Each `open()` spawns one reader task that performs the GET, checks the
//! response and feeds body chunks through a `FrameDecoder`. Signals go out
//! on the owner's queue tagged with the open's generation; `close()` aborts
//! the reader and bumps the generation so anything it already queued can be
//! recognised as stale with [`HttpEventSource::is_current`].
//!
//! The source never reconnects on its own. After `Failed` it stays closed.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use futures::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::notification::{FrameDecoder, DEFAULT_EVENT_TYPE};
use crate::ports::{ChannelTransport, TransportError, TransportSignal};

/// A transport signal tagged with the `open()` it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceEvent {
    pub generation: u64,
    pub signal: TransportSignal,
}

type EventTypes = Arc<Mutex<HashSet<String>>>;

/// Event-stream subscription over HTTP.
///
/// Generic over the owner's queue item so transport signals can share one
/// queue with commands and timer events.
pub struct HttpEventSource<E> {
    client: reqwest::Client,
    events: mpsc::UnboundedSender<E>,
    event_types: EventTypes,
    generation: u64,
    reader: Option<JoinHandle<()>>,
}

impl<E> HttpEventSource<E>
where
    E: From<SourceEvent> + Send + 'static,
{
    /// Creates a closed source. Unnamed (`message`) events are always
    /// delivered; other types only after `subscribe`.
    pub fn new(client: reqwest::Client, events: mpsc::UnboundedSender<E>) -> Self {
        let event_types = HashSet::from([DEFAULT_EVENT_TYPE.to_string()]);
        Self {
            client,
            events,
            event_types: Arc::new(Mutex::new(event_types)),
            generation: 0,
            reader: None,
        }
    }

    /// True if `generation` belongs to the currently open stream.
    pub fn is_current(&self, generation: u64) -> bool {
        self.reader.is_some() && generation == self.generation
    }

    /// True while a reader task is attached.
    pub fn is_open(&self) -> bool {
        self.reader.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl<E> ChannelTransport for HttpEventSource<E>
where
    E: From<SourceEvent> + Send + 'static,
{
    fn open(&mut self, url: &str, last_event_id: Option<&str>) -> Result<(), TransportError> {
        self.close();

        let url = reqwest::Url::parse(url).map_err(|e| TransportError::Connect(e.to_string()))?;

        let mut request = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");
        if let Some(id) = last_event_id.filter(|id| !id.is_empty()) {
            request = request.header("Last-Event-ID", id);
        }

        self.generation += 1;
        let reader = Reader {
            generation: self.generation,
            events: self.events.clone(),
            event_types: Arc::clone(&self.event_types),
        };
        self.reader = Some(tokio::spawn(reader.run(request)));
        Ok(())
    }

    fn close(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
            self.generation += 1;
        }
    }

    fn subscribe(&mut self, event_type: &str) {
        self.event_types
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(event_type.to_string());
    }
}

impl<E> Drop for HttpEventSource<E> {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

struct Reader<E> {
    generation: u64,
    events: mpsc::UnboundedSender<E>,
    event_types: EventTypes,
}

impl<E> Reader<E>
where
    E: From<SourceEvent> + Send + 'static,
{
    async fn run(self, request: reqwest::RequestBuilder) {
        let failure = self.read(request).await;
        tracing::debug!(generation = self.generation, error = %failure, "Event stream ended");
        self.emit(TransportSignal::Failed(failure));
    }

    /// Reads until the stream ends and returns why it ended.
    async fn read(&self, request: reqwest::RequestBuilder) -> TransportError {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return TransportError::Connect(e.to_string()),
        };

        let status = response.status();
        if !status.is_success() {
            return TransportError::Status(status.as_u16());
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.starts_with("text/event-stream") {
            return TransportError::ContentType(content_type);
        }

        if !self.emit(TransportSignal::Opened) {
            return TransportError::Closed;
        }

        let mut decoder = FrameDecoder::new();
        let mut body = response.bytes_stream();

        while let Some(chunk) = body.next().await {
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(e) => return TransportError::Stream(e.to_string()),
            };

            for frame in decoder.feed(&bytes) {
                if !self.wants(frame.event_type()) {
                    continue;
                }
                if !self.emit(TransportSignal::Frame(frame)) {
                    return TransportError::Closed;
                }
            }
        }

        TransportError::Closed
    }

    fn wants(&self, event_type: &str) -> bool {
        self.event_types
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(event_type)
    }

    /// Returns false once the owner's queue is gone.
    fn emit(&self, signal: TransportSignal) -> bool {
        let event = SourceEvent {
            generation: self.generation,
            signal,
        };
        self.events.send(E::from(event)).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, StatusCode},
        response::Response,
        routing::get,
        Router,
    };
    use std::time::Duration;

    type Source = HttpEventSource<SourceEvent>;

    fn event_stream(body: &'static str) -> Response {
        Response::builder()
            .header(header::CONTENT_TYPE, "text/event-stream")
            .body(Body::from(body))
            .unwrap()
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<SourceEvent>) -> SourceEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("signal within timeout")
            .expect("queue open")
    }

    #[tokio::test]
    async fn invalid_url_fails_synchronously() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut source = Source::new(reqwest::Client::new(), tx);

        assert!(matches!(
            source.open("not a url", None),
            Err(TransportError::Connect(_))
        ));
        assert!(!source.is_open());
    }

    #[tokio::test]
    async fn delivers_opened_then_default_frames_then_closed() {
        let base = serve(Router::new().route(
            "/stream",
            get(|| async {
                event_stream(": keep-alive\n\nid: 1\ndata: {\"n\":1}\n\nevent: other\ndata: skipped\n\n")
            }),
        ))
        .await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut source = Source::new(reqwest::Client::new(), tx);

        source.open(&format!("{}/stream", base), None).unwrap();

        let opened = next(&mut rx).await;
        assert_eq!(opened.signal, TransportSignal::Opened);
        assert!(source.is_current(opened.generation));

        match next(&mut rx).await.signal {
            TransportSignal::Frame(frame) => {
                assert_eq!(frame.id.as_deref(), Some("1"));
                assert_eq!(frame.data, "{\"n\":1}");
            }
            other => panic!("expected frame, got {:?}", other),
        }
        assert_eq!(
            next(&mut rx).await.signal,
            TransportSignal::Failed(TransportError::Closed)
        );
    }

    #[tokio::test]
    async fn subscribed_types_are_delivered() {
        let base = serve(Router::new().route(
            "/stream",
            get(|| async { event_stream("event: alert\ndata: hi\n\n") }),
        ))
        .await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut source = Source::new(reqwest::Client::new(), tx);
        source.subscribe("alert");

        source.open(&format!("{}/stream", base), None).unwrap();

        assert_eq!(next(&mut rx).await.signal, TransportSignal::Opened);
        match next(&mut rx).await.signal {
            TransportSignal::Frame(frame) => assert_eq!(frame.event_type(), "alert"),
            other => panic!("expected frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let base = serve(Router::new().route(
            "/stream",
            get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        ))
        .await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut source = Source::new(reqwest::Client::new(), tx);

        source.open(&format!("{}/stream", base), None).unwrap();

        assert_eq!(
            next(&mut rx).await.signal,
            TransportSignal::Failed(TransportError::Status(503))
        );
    }

    #[tokio::test]
    async fn wrong_content_type_is_reported() {
        let base = serve(Router::new().route("/stream", get(|| async { "plain text" }))).await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut source = Source::new(reqwest::Client::new(), tx);

        source.open(&format!("{}/stream", base), None).unwrap();

        assert!(matches!(
            next(&mut rx).await.signal,
            TransportSignal::Failed(TransportError::ContentType(_))
        ));
    }

    #[tokio::test]
    async fn last_event_id_is_sent() {
        let base = serve(Router::new().route(
            "/stream",
            get(|headers: axum::http::HeaderMap| async move {
                let id = headers
                    .get("last-event-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("none")
                    .to_string();
                Response::builder()
                    .header(header::CONTENT_TYPE, "text/event-stream")
                    .body(Body::from(format!("data: {}\n\n", id)))
                    .unwrap()
            }),
        ))
        .await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut source = Source::new(reqwest::Client::new(), tx);

        source.open(&format!("{}/stream", base), Some("42")).unwrap();

        next(&mut rx).await;
        match next(&mut rx).await.signal {
            TransportSignal::Frame(frame) => assert_eq!(frame.data, "42"),
            other => panic!("expected frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn close_makes_earlier_generation_stale() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut source = Source::new(reqwest::Client::new(), tx);

        source.open("http://127.0.0.1:9/stream", None).unwrap();
        let first = source.generation;
        assert!(source.is_current(first));

        source.close();
        assert!(!source.is_current(first));

        source.open("http://127.0.0.1:9/stream", None).unwrap();
        assert!(!source.is_current(first));
        assert!(source.is_current(source.generation));
    }
}
