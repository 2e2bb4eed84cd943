use std::pin::Pin;
use std::task::{Context, Poll};

use eventsource_stream::{EventStream, EventStreamError, Eventsource};
use futures_util::Stream;
use serde::Deserialize;

use super::{BackendError, BackendResult};

/// One event of a turn stream, in the server's protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Incremental text for the in-progress ai message.
    Delta { text: String },
    /// The turn completed successfully.
    Done,
    /// The server reported a failure; terminal.
    Error { message: String },
}

impl StreamEvent {
    /// Message used when the transport fails instead of the server.
    pub const TRANSPORT_FAILURE: &str = "streaming failed";

    /// The error event every transport-level failure is mapped to.
    pub fn transport_failure() -> Self {
        StreamEvent::Error {
            message: Self::TRANSPORT_FAILURE.to_string(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done | StreamEvent::Error { .. })
    }
}

/// Raw JSON payload of an SSE `data:` line.
#[derive(Debug, Deserialize)]
struct SseEventData {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Parses a single `data:` payload into a `StreamEvent`.
///
/// # Errors
/// Returns a parse error for invalid JSON or an unknown event type.
pub(crate) fn parse_event_data(data: &str) -> BackendResult<StreamEvent> {
    let parsed: SseEventData = serde_json::from_str(data)
        .map_err(|err| BackendError::parse(format!("Failed to parse stream event: {err}")))?;

    match parsed.event_type.as_str() {
        "delta" => Ok(StreamEvent::Delta {
            text: parsed.text.unwrap_or_default(),
        }),
        "done" => Ok(StreamEvent::Done),
        "error" => Ok(StreamEvent::Error {
            message: parsed
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| "unknown error".to_string()),
        }),
        other => Err(BackendError::parse(format!(
            "Unknown stream event type: {other}"
        ))),
    }
}

/// Appends a blank line when the body ends so a final event without its
/// terminating blank line is still dispatched.
struct SseTerminatedStream<S> {
    inner: S,
    emitted_terminator: bool,
}

impl<S> SseTerminatedStream<S> {
    fn new(inner: S) -> Self {
        Self {
            inner,
            emitted_terminator: false,
        }
    }
}

impl<S, E> Stream for SseTerminatedStream<S>
where
    S: Stream<Item = std::result::Result<bytes::Bytes, E>> + Unpin,
{
    type Item = std::result::Result<bytes::Bytes, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.emitted_terminator {
            return Poll::Ready(None);
        }

        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(None) => {
                self.emitted_terminator = true;
                Poll::Ready(Some(Ok(bytes::Bytes::from_static(b"\n\n"))))
            }
            other => other,
        }
    }
}

/// SSE parser that converts a byte stream into `StreamEvent`s.
///
/// Yields events in receipt order and ends right after the first terminal
/// event. A body that ends before any terminal event yields one I/O error.
pub struct SseParser<S> {
    inner: EventStream<SseTerminatedStream<S>>,
    finished: bool,
}

impl<S, E> SseParser<S>
where
    S: Stream<Item = std::result::Result<bytes::Bytes, E>> + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            inner: SseTerminatedStream::new(stream).eventsource(),
            finished: false,
        }
    }
}

impl<S, E> Stream for SseParser<S>
where
    S: Stream<Item = std::result::Result<bytes::Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    type Item = BackendResult<StreamEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }

        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => {
                    let data = event.data.trim();
                    if data.is_empty() {
                        continue;
                    }
                    let parsed = parse_event_data(data);
                    match &parsed {
                        Ok(ev) if !ev.is_terminal() => {}
                        _ => self.finished = true,
                    }
                    return Poll::Ready(Some(parsed));
                }
                Poll::Ready(Some(Err(e))) => {
                    self.finished = true;
                    let err = match e {
                        EventStreamError::Transport(e) => {
                            BackendError::io(format!("Stream transport error: {e}"))
                        }
                        other => BackendError::parse(format!("SSE stream error: {other}")),
                    };
                    return Poll::Ready(Some(Err(err)));
                }
                Poll::Ready(None) => {
                    self.finished = true;
                    return Poll::Ready(Some(Err(BackendError::io(
                        "Stream closed before a terminal event",
                    ))));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;
    use futures_util::stream;

    use super::*;
    use crate::backend::BackendErrorKind;

    fn chunks(parts: &[&str]) -> impl Stream<Item = Result<bytes::Bytes, std::io::Error>> + Unpin {
        let owned: Vec<Result<bytes::Bytes, std::io::Error>> = parts
            .iter()
            .map(|p| Ok(bytes::Bytes::from(p.to_string())))
            .collect();
        stream::iter(owned)
    }

    async fn collect(parts: &[&str]) -> Vec<BackendResult<StreamEvent>> {
        SseParser::new(chunks(parts)).collect().await
    }

    #[test]
    fn test_parse_event_data() {
        assert_eq!(
            parse_event_data(r#"{"type":"delta","text":"Hel"}"#).unwrap(),
            StreamEvent::Delta {
                text: "Hel".to_string()
            }
        );
        assert_eq!(
            parse_event_data(r#"{"type":"done"}"#).unwrap(),
            StreamEvent::Done
        );
        assert_eq!(
            parse_event_data(r#"{"type":"error","message":"timeout"}"#).unwrap(),
            StreamEvent::Error {
                message: "timeout".to_string()
            }
        );
    }

    #[test]
    fn test_parse_event_data_rejects_garbage() {
        let err = parse_event_data("{not json").unwrap_err();
        assert_eq!(err.kind, BackendErrorKind::Parse);

        let err = parse_event_data(r#"{"type":"usage"}"#).unwrap_err();
        assert!(err.message.contains("usage"));
    }

    #[tokio::test]
    async fn test_events_split_across_chunks() {
        let events = collect(&[
            "data: {\"type\":\"delta\",\"te",
            "xt\":\"Hel\"}\n\ndata: {\"type\":\"delta\",\"text\":\"lo\"}\n\n",
            "data: {\"type\":\"done\"}\n\n",
        ])
        .await;

        let events: Vec<StreamEvent> = events.into_iter().map(Result::unwrap).collect();
        assert_eq!(
            events,
            vec![
                StreamEvent::Delta {
                    text: "Hel".to_string()
                },
                StreamEvent::Delta {
                    text: "lo".to_string()
                },
                StreamEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_stops_after_terminal_event() {
        let events = collect(&[
            "data: {\"type\":\"error\",\"message\":\"boom\"}\n\n",
            "data: {\"type\":\"done\"}\n\n",
        ])
        .await;

        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].as_ref().unwrap(),
            &StreamEvent::Error {
                message: "boom".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_final_event_without_blank_line() {
        let events = collect(&["data: {\"type\":\"done\"}"]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap(), &StreamEvent::Done);
    }

    #[tokio::test]
    async fn test_body_ending_early_is_an_error() {
        let events = collect(&["data: {\"type\":\"delta\",\"text\":\"partial\"}\n\n"]).await;

        assert_eq!(events.len(), 2);
        assert!(events[0].is_ok());
        let err = events[1].as_ref().unwrap_err();
        assert_eq!(err.kind, BackendErrorKind::Io);
    }

    #[tokio::test]
    async fn test_malformed_event_ends_stream() {
        let events = collect(&[
            "data: {\"type\":\"delta\",\"text\":\"a\"}\n\n",
            "data: oops\n\n",
            "data: {\"type\":\"delta\",\"text\":\"b\"}\n\n",
        ])
        .await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[1].as_ref().unwrap_err().kind, BackendErrorKind::Parse);
    }

    #[tokio::test]
    async fn test_keepalive_comments_are_ignored() {
        let events = collect(&[": ping\n\n", "data: {\"type\":\"done\"}\n\n"]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap(), &StreamEvent::Done);
    }
}
