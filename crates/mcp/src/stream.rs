//! Subscription to the service's `GET /mcp/sse` event channel.
//!
//! A background task reads the response body, splits it into SSE frames
//! and decodes each frame as JSON. The consumer pulls items from an
//! [`EventStream`]; malformed frames arrive as [`StreamItem::Fault`] and
//! leave the stream open, while the reason the stream ended is reported
//! separately through [`EventStream::close_reason`].
//!
//! Lifecycle: `Idle -> Connecting -> Open -> Closed`. `Closed` is terminal;
//! there is no reconnect. The reader task never closes the stream itself:
//! the consumer does, once it has taken the last buffered item and, after a
//! fault, reported the error.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::StreamExt;
use serde_json::Value;
use tokio::sync::{mpsc, watch};

use crate::error::{Error, Result};
use crate::sse::{Decoder, Frame, MAX_PENDING};

/// Frames buffered between the reader task and the consumer.
const CHANNEL_CAPACITY: usize = 64;

/// Lifecycle state of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Connecting,
    Open,
    Closed,
}

/// One decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    pub payload: Value,
    /// SSE `event:` field, if the frame had one.
    pub event: Option<String>,
    /// SSE `id:` field, if the frame had one.
    pub id: Option<String>,
}

/// Item yielded by [`EventStream::next`].
#[derive(Debug)]
pub enum StreamItem {
    Event(StreamEvent),
    /// A frame that was not valid JSON. The stream stays open.
    Fault(Error),
}

/// Why a stream stopped yielding items.
#[derive(Debug)]
pub enum CloseReason {
    /// [`StreamHandle::close`] was called.
    Closed,
    /// The server finished the response body.
    EndOfStream,
    /// The connection failed while reading.
    Failed(Error),
}

#[derive(Debug)]
enum Message {
    Item(StreamItem),
    Failed(Error),
}

/// Result of one receive, before any state change.
enum Received {
    Item(StreamItem),
    End(CloseReason),
}

#[derive(Debug)]
struct Shared {
    state: watch::Sender<State>,
    cancelled: AtomicBool,
    cancel: watch::Sender<bool>,
}

/// Cloneable handle controlling a subscription.
#[derive(Debug, Clone)]
pub struct StreamHandle {
    shared: Arc<Shared>,
}

impl StreamHandle {
    fn new() -> Self {
        let (state, _) = watch::channel(State::Idle);
        let (cancel, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                state,
                cancelled: AtomicBool::new(false),
                cancel,
            }),
        }
    }

    pub fn state(&self) -> State {
        *self.shared.state.borrow()
    }

    pub fn is_closed(&self) -> bool {
        self.state() == State::Closed
    }

    /// Stop the subscription. No item is delivered afterwards, including
    /// frames already buffered. Calling this again has no effect.
    pub fn close(&self) {
        if self.shared.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.cancel.send_replace(true);
        if self.transition(State::Closed) {
            tracing::debug!("event stream closed by handle");
        }
    }

    /// Resolves once the subscription reaches `Closed`, for any reason.
    pub async fn closed(&self) {
        let mut rx = self.shared.state.subscribe();
        let _ = rx.wait_for(|state| *state == State::Closed).await;
    }

    fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::SeqCst)
    }

    async fn cancelled(&self) {
        let mut rx = self.shared.cancel.subscribe();
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Move to `next` unless already there or closed.
    fn transition(&self, next: State) -> bool {
        self.shared.state.send_if_modified(|state| {
            if *state == State::Closed || *state == next {
                return false;
            }
            *state = next;
            true
        })
    }
}

/// Pull-based view of an open subscription.
///
/// Dropping the stream closes it.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<Message>,
    handle: StreamHandle,
    reason: Option<CloseReason>,
    ended: bool,
}

impl EventStream {
    pub(crate) async fn connect(http: reqwest::Client, url: String) -> Result<Self> {
        Self::connect_with(http, url, StreamHandle::new()).await
    }

    async fn connect_with(http: reqwest::Client, url: String, handle: StreamHandle) -> Result<Self> {
        handle.transition(State::Connecting);
        let response = open(&http, &url)
            .await
            .inspect_err(|e| tracing::debug!(%url, error = %e, "event stream connect failed"))?;

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        handle.transition(State::Open);
        tracing::debug!(%url, "event stream open");
        tokio::spawn(read_frames(response, tx, handle.clone()));

        Ok(Self {
            rx,
            handle,
            reason: None,
            ended: false,
        })
    }

    pub fn handle(&self) -> StreamHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> State {
        self.handle.state()
    }

    pub fn close(&self) {
        self.handle.close();
    }

    /// Next item in arrival order, or `None` once the stream is closed.
    ///
    /// The state stays `Open` until this has returned every buffered item;
    /// it moves to `Closed` when the end or a fatal fault is taken.
    pub async fn next(&mut self) -> Option<StreamItem> {
        match self.recv().await? {
            Received::Item(item) => Some(item),
            Received::End(reason) => {
                self.reason = Some(reason);
                self.finish();
                None
            }
        }
    }

    /// Take the next message without touching the state. `None` once the
    /// end has already been taken.
    async fn recv(&mut self) -> Option<Received> {
        if self.ended {
            return None;
        }
        if self.handle.is_cancelled() {
            self.ended = true;
            return Some(Received::End(CloseReason::Closed));
        }

        let message = tokio::select! {
            biased;
            _ = self.handle.cancelled() => None,
            message = self.rx.recv() => Some(message),
        };

        let received = match message {
            None => Received::End(CloseReason::Closed),
            Some(Some(Message::Item(item))) => return Some(Received::Item(item)),
            Some(Some(Message::Failed(e))) => Received::End(CloseReason::Failed(e)),
            Some(None) => Received::End(CloseReason::EndOfStream),
        };
        self.ended = true;
        Some(received)
    }

    fn finish(&self) {
        if self.handle.transition(State::Closed) {
            tracing::debug!("event stream closed");
        }
    }

    /// Why the stream ended. `None` while it is still yielding items.
    pub fn close_reason(&self) -> Option<&CloseReason> {
        self.reason.as_ref()
    }

    pub fn take_close_reason(&mut self) -> Option<CloseReason> {
        self.reason.take()
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.handle.close();
    }
}

pub(crate) fn subscribe<E, F>(
    http: reqwest::Client,
    url: String,
    mut on_event: E,
    mut on_error: F,
) -> StreamHandle
where
    E: FnMut(StreamEvent) + Send + 'static,
    F: FnMut(Error) + Send + 'static,
{
    let handle = StreamHandle::new();
    let task_handle = handle.clone();

    tokio::spawn(async move {
        let handle = task_handle;
        let mut stream = tokio::select! {
            biased;
            _ = handle.cancelled() => return,
            result = EventStream::connect_with(http, url, handle.clone()) => match result {
                Ok(stream) => stream,
                Err(e) => {
                    if !handle.is_cancelled() {
                        on_error(e);
                    }
                    handle.transition(State::Closed);
                    return;
                }
            },
        };

        // Errors are reported before the state moves to `Closed`.
        while let Some(received) = stream.recv().await {
            if handle.is_cancelled() {
                return;
            }
            match received {
                Received::Item(StreamItem::Event(event)) => on_event(event),
                Received::Item(StreamItem::Fault(e)) => on_error(e),
                Received::End(reason) => {
                    if let CloseReason::Failed(e) = reason {
                        on_error(e);
                    }
                    stream.finish();
                }
            }
        }
    });

    handle
}

async fn open(http: &reqwest::Client, url: &str) -> Result<reqwest::Response> {
    let response = http
        .get(url)
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Protocol {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

/// Dropping `tx` on return is what tells the consumer the body ended.
async fn read_frames(response: reqwest::Response, tx: mpsc::Sender<Message>, handle: StreamHandle) {
    let mut body = std::pin::pin!(response.bytes_stream());
    let mut decoder = Decoder::new();

    'read: loop {
        let chunk = tokio::select! {
            biased;
            _ = handle.cancelled() => break,
            chunk = body.next() => chunk,
        };

        match chunk {
            Some(Ok(bytes)) => {
                for frame in decoder.feed(&bytes) {
                    let message = Message::Item(decode_frame(frame));
                    if !deliver(&tx, &handle, message).await {
                        break 'read;
                    }
                }
                if decoder.pending() > MAX_PENDING {
                    tracing::warn!(bytes = decoder.pending(), "event stream line too long");
                    let error = Error::FrameTooLarge { limit: MAX_PENDING };
                    deliver(&tx, &handle, Message::Failed(error)).await;
                    break;
                }
            }
            Some(Err(e)) => {
                tracing::warn!(error = %e, "event stream interrupted");
                deliver(&tx, &handle, Message::Failed(Error::Transport(e))).await;
                break;
            }
            None => {
                if decoder.pending() > 0 {
                    tracing::debug!(bytes = decoder.pending(), "discarding unterminated frame");
                }
                tracing::debug!("event stream ended by server");
                break;
            }
        }
    }
}

/// Send to the consumer unless the stream is closed first.
async fn deliver(tx: &mpsc::Sender<Message>, handle: &StreamHandle, message: Message) -> bool {
    tokio::select! {
        biased;
        _ = handle.cancelled() => false,
        sent = tx.send(message) => sent.is_ok(),
    }
}

fn decode_frame(frame: Frame) -> StreamItem {
    match serde_json::from_str(&frame.data) {
        Ok(payload) => StreamItem::Event(StreamEvent {
            payload,
            event: frame.event,
            id: frame.id,
        }),
        Err(e) => {
            tracing::warn!(data = %frame.data, error = %e, "malformed event stream frame");
            StreamItem::Fault(Error::Decode(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn handle_starts_idle() {
        let handle = StreamHandle::new();
        assert_eq!(handle.state(), State::Idle);
        assert!(!handle.is_closed());
    }

    #[test]
    fn close_is_idempotent() {
        let handle = StreamHandle::new();
        handle.close();
        handle.close();
        assert!(handle.is_closed());
        assert!(handle.is_cancelled());
    }

    #[test]
    fn closed_is_terminal() {
        let handle = StreamHandle::new();
        assert!(handle.transition(State::Connecting));
        assert!(handle.transition(State::Open));
        handle.close();
        assert!(!handle.transition(State::Open));
        assert_eq!(handle.state(), State::Closed);
    }

    #[test]
    fn clones_share_state() {
        let handle = StreamHandle::new();
        let other = handle.clone();
        other.close();
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn closed_resolves_after_close() {
        let handle = StreamHandle::new();
        let waiter = handle.clone();
        let task = tokio::spawn(async move { waiter.closed().await });
        handle.close();
        task.await.unwrap();
    }

    #[test]
    fn decode_valid_frame() {
        let item = decode_frame(Frame {
            event: Some("progress".into()),
            id: Some("3".into()),
            data: r#"{"imageId":"abc","status":"done"}"#.into(),
        });
        match item {
            StreamItem::Event(event) => {
                assert_eq!(event.payload, json!({"imageId": "abc", "status": "done"}));
                assert_eq!(event.event.as_deref(), Some("progress"));
                assert_eq!(event.id.as_deref(), Some("3"));
            }
            StreamItem::Fault(e) => panic!("unexpected fault: {e}"),
        }
    }

    #[test]
    fn decode_malformed_frame_is_fault() {
        let item = decode_frame(Frame {
            data: "not json".into(),
            ..Frame::default()
        });
        assert!(matches!(item, StreamItem::Fault(Error::Decode(_))));
    }
}
