//! Client side of the companion's push channel (`GET /sse`).
//!
//! A subscription delivers at most one `payload` event. The streaming request
//! runs on its own task; the handle owns that task and aborts it on close, on
//! drop, and right after the first payload is handed out, so the connection
//! never outlives the handle.

use std::time::Duration;

use futures::StreamExt;
use reqwest::header::ACCEPT;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

use crate::error::PushChannelError;
use crate::sse::SseDecoder;

/// The only event name the session reacts to.
pub const PAYLOAD_EVENT: &str = "payload";

/// Body of the first `payload` event seen on a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadEvent {
    pub data: String,
    pub id: Option<String>,
}

type Delivery = Result<PayloadEvent, PushChannelError>;

#[derive(Debug, Clone)]
pub struct PushChannelClient {
    http: reqwest::Client,
    payload_timeout: Option<Duration>,
}

impl PushChannelClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            payload_timeout: None,
        }
    }

    /// Upper bound on [`PushChannelHandle::await_first_payload`]. `None`
    /// waits for as long as the connection stays open.
    pub fn with_payload_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.payload_timeout = timeout;
        self
    }

    /// Start subscribing. Returns immediately; the request is driven by a
    /// spawned task, so this must be called from within a tokio runtime.
    pub fn open(&self, endpoint: Url) -> PushChannelHandle {
        let (tx, rx) = oneshot::channel();
        let http = self.http.clone();
        let task = tokio::spawn(async move {
            let delivery = first_payload(http, endpoint).await;
            if let Err(err) = &delivery {
                debug!(%err, "push channel ended without a payload");
            }
            let _ = tx.send(delivery);
        });

        PushChannelHandle {
            delivery: Some(rx),
            task: Some(task),
            payload_timeout: self.payload_timeout,
        }
    }
}

async fn first_payload(http: reqwest::Client, endpoint: Url) -> Delivery {
    debug!(%endpoint, "opening push channel");
    let response = http
        .get(endpoint)
        .header(ACCEPT, "text/event-stream")
        .send()
        .await
        .map_err(PushChannelError::from_reqwest)?;

    let status = response.status();
    if !status.is_success() {
        return Err(PushChannelError::Rejected(status));
    }

    let mut decoder = SseDecoder::new();
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(PushChannelError::from_reqwest)?;
        for event in decoder.feed(&chunk) {
            if event.event == PAYLOAD_EVENT {
                // Returning drops the body stream, which closes the connection
                // before anything after this event is read.
                return Ok(PayloadEvent {
                    data: event.data,
                    id: event.id,
                });
            }
            debug!(event = %event.event, "ignoring push channel event");
        }
    }
    Err(PushChannelError::Disconnected)
}

/// An open subscription. Closed exactly once: on first delivery, on error,
/// on an explicit [`close`](Self::close), or on drop, whichever comes first.
#[derive(Debug)]
pub struct PushChannelHandle {
    delivery: Option<oneshot::Receiver<Delivery>>,
    task: Option<JoinHandle<()>>,
    payload_timeout: Option<Duration>,
}

impl PushChannelHandle {
    /// Wait for the first `payload` event. The handle is closed when this
    /// returns, whatever the result.
    pub async fn await_first_payload(&mut self) -> Result<PayloadEvent, PushChannelError> {
        let Some(delivery) = self.delivery.as_mut() else {
            return Err(PushChannelError::Closed);
        };

        let received = match self.payload_timeout {
            Some(limit) => tokio::time::timeout(limit, delivery).await.ok(),
            None => Some(delivery.await),
        };
        self.close();

        match received {
            Some(Ok(delivery)) => delivery,
            // sender dropped: the task was aborted or panicked
            Some(Err(_)) => Err(PushChannelError::Disconnected),
            None => {
                let limit = self.payload_timeout.unwrap_or_default();
                warn!(?limit, "gave up waiting for a payload");
                Err(PushChannelError::TimedOut(limit))
            }
        }
    }

    /// Release the subscription. Safe to call any number of times.
    pub fn close(&mut self) {
        self.delivery = None;
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("push channel closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.task.is_none()
    }
}

impl Drop for PushChannelHandle {
    fn drop(&mut self) {
        self.close();
    }
}
