//! Transport abstraction for conversation streams

use std::{pin::Pin, time::Duration};

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use parley_protocol::{Error, Frame, Result};
use reqwest::Url;
use reqwest_eventsource::{Event, EventSource, retry::ExponentialBackoff};
use tokio_stream::Stream;

/// What the transport can report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The stream is (re)established
    Open,
    /// One frame arrived
    Frame(Frame),
    /// The stream broke. With `retrying` set the transport reconnects on its own.
    Error { message: String, retrying: bool },
}

/// A stream of transport events; ends when the transport stops for good
pub type TransportStream = Pin<Box<dyn Stream<Item = TransportEvent> + Send>>;

/// Something that can deliver a conversation stream
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self) -> Result<TransportStream>;
}

/// Reconnect configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Delay before the first reconnect
    pub initial_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Maximum delay between reconnects
    pub max_delay: Duration,
    /// Give up after this many consecutive failures; `None` retries forever
    pub max_retries: Option<usize>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

impl RetryConfig {
    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(
            self.initial_delay,
            self.backoff_multiplier,
            Some(self.max_delay),
            self.max_retries,
        )
    }
}

/// Server-sent events over HTTP GET, reconnecting with backoff
pub struct EventSourceTransport {
    client: reqwest::Client,
    endpoint: Url,
    retry_config: RetryConfig,
}

impl EventSourceTransport {
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| Error::InvalidConfig(format!("endpoint '{}': {}", endpoint, e)))?;
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            retry_config: RetryConfig::default(),
        })
    }

    /// Set retry configuration
    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for EventSourceTransport {
    async fn connect(&self) -> Result<TransportStream> {
        tracing::debug!("connecting to {}", self.endpoint);

        let request = self
            .client
            .get(self.endpoint.clone())
            .header(reqwest::header::ACCEPT, "text/event-stream");

        let mut event_source = EventSource::new(request)
            .map_err(|e| Error::Sse(format!("Failed to create event source: {}", e)))?;
        event_source.set_retry_policy(Box::new(self.retry_config.backoff()));

        Ok(Box::pin(create_stream(event_source)))
    }
}

fn create_stream(mut event_source: EventSource) -> impl Stream<Item = TransportEvent> {
    stream! {
        while let Some(event) = event_source.next().await {
            match event {
                Ok(Event::Open) => yield TransportEvent::Open,
                Ok(Event::Message(message)) => {
                    yield TransportEvent::Frame(Frame::new(message.event, message.data));
                }
                Err(reqwest_eventsource::Error::StreamEnded) => {
                    tracing::debug!("server ended the stream, reconnecting");
                    yield TransportEvent::Error {
                        message: "stream ended".to_string(),
                        retrying: true,
                    };
                }
                Err(e) => {
                    tracing::warn!("SSE connection error: {}", e);
                    yield TransportEvent::Error {
                        message: e.to_string(),
                        retrying: true,
                    };
                }
            }
        }

        // The event source only finishes once its retry policy gives up
        yield TransportEvent::Error {
            message: "reconnect attempts exhausted".to_string(),
            retrying: false,
        };
    }
}

/// Plays back a fixed list of events, for tests and recorded captures
#[derive(Debug, Clone, Default)]
pub struct ReplayTransport {
    events: Vec<TransportEvent>,
    hold_open: bool,
}

impl ReplayTransport {
    pub fn new(events: Vec<TransportEvent>) -> Self {
        Self {
            events,
            hold_open: false,
        }
    }

    /// An opened stream that delivers `frames` and then finishes
    pub fn from_frames(frames: impl IntoIterator<Item = Frame>) -> Self {
        let events = std::iter::once(TransportEvent::Open)
            .chain(frames.into_iter().map(TransportEvent::Frame))
            .collect();
        Self::new(events)
    }

    /// Keep the stream pending after the last event instead of finishing
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }
}

#[async_trait]
impl Transport for ReplayTransport {
    async fn connect(&self) -> Result<TransportStream> {
        let events = futures::stream::iter(self.events.clone());
        if self.hold_open {
            Ok(Box::pin(events.chain(futures::stream::pending())))
        } else {
            Ok(Box::pin(events))
        }
    }
}
