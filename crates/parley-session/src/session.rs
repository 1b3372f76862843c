//! Session runtime: connection lifecycle around the stream reducer
//!
//! One task owns the session and processes transport events, host signals and
//! teardown requests one at a time, so the reducer, its store and the
//! connection monitor all have a single writer.

use std::sync::Arc;

use futures::StreamExt;
use parley_protocol::{Conversation, Frame, Message};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::{
    config::SessionConfig,
    error::{Error, Result},
    handle::SessionHandle,
    monitor::{ConnectionMonitor, HostSignal},
    reducer::{Outcome, StreamReducer},
    store::ConversationStore,
    transport::{Transport, TransportEvent},
};

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No connection attempted yet
    Idle,
    /// Connecting to the transport
    Connecting,
    /// The stream is open
    Streaming,
    /// The transport lost the stream and is retrying
    Reconnecting,
    /// Torn down
    Closed,
}

/// Everything presentation needs, published on every accepted change
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub conversations: Vec<Arc<Conversation>>,
    pub is_connected: bool,
    pub is_slow_connection: bool,
    pub error: Option<String>,
    pub state: SessionState,
    /// Incremented on every publish
    pub revision: u64,
}

impl SessionSnapshot {
    fn empty() -> Self {
        Self {
            conversations: Vec::new(),
            is_connected: false,
            is_slow_connection: false,
            error: None,
            state: SessionState::Idle,
            revision: 0,
        }
    }

    /// The newest message across all conversations
    pub fn last_message(&self) -> Option<&Message> {
        self.conversations.last().and_then(|c| c.last_message())
    }

    /// Total number of retained messages
    pub fn message_count(&self) -> usize {
        self.conversations.iter().map(|c| c.len()).sum()
    }
}

/// A conversation stream session
pub struct ChatSession {
    config: SessionConfig,
    reducer: StreamReducer,
    monitor: ConnectionMonitor,
    state: SessionState,
    cancel: CancellationToken,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    subscribers: Vec<mpsc::UnboundedSender<SessionSnapshot>>,
    revision: u64,
}

impl ChatSession {
    /// Create an idle session
    pub fn new(config: SessionConfig) -> Self {
        let reducer = StreamReducer::new(ConversationStore::new(config.max_conversations));
        let monitor = ConnectionMonitor::new(config.slow_rtt_ms);
        let (snapshot_tx, _) = watch::channel(SessionSnapshot::empty());
        Self {
            config,
            reducer,
            monitor,
            state: SessionState::Idle,
            cancel: CancellationToken::new(),
            snapshot_tx,
            subscribers: Vec::new(),
            revision: 0,
        }
    }

    /// Get a handle for watching and closing this session
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            cancel: self.cancel.clone(),
            snapshot: self.snapshot_tx.subscribe(),
        }
    }

    /// Receive every published snapshot in order.
    ///
    /// Unlike [`SessionHandle::changed`] nothing is coalesced. The receiver
    /// ends once the session is dropped.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SessionSnapshot> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn reducer(&self) -> &StreamReducer {
        &self.reducer
    }

    pub fn monitor(&self) -> &ConnectionMonitor {
        &self.monitor
    }

    /// Build a snapshot of the current state
    pub fn snapshot(&self) -> SessionSnapshot {
        let status = self.monitor.status();
        SessionSnapshot {
            conversations: self.reducer.store().snapshot(),
            is_connected: status.is_connected,
            is_slow_connection: status.is_slow_connection,
            error: status.error,
            state: self.state,
            revision: self.revision,
        }
    }

    /// Apply one frame and publish if the store changed
    pub fn handle_frame(&mut self, frame: &Frame) -> Outcome {
        let outcome = self.reducer.handle_frame(frame);
        if outcome.changed_store() {
            self.publish();
        }
        outcome
    }

    /// Apply one transport event
    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        let changed = match event {
            TransportEvent::Open => {
                tracing::debug!("stream open");
                let status = self.monitor.on_transport_open();
                self.set_state(SessionState::Streaming) || status
            }
            TransportEvent::Frame(frame) => {
                self.handle_frame(&frame);
                return;
            }
            TransportEvent::Error { message, retrying } => {
                let status = self.monitor.on_transport_error(retrying);
                if retrying {
                    tracing::warn!("stream interrupted, transport is retrying: {}", message);
                    self.set_state(SessionState::Reconnecting) || status
                } else {
                    tracing::error!("stream lost: {}", message);
                    status
                }
            }
        };
        if changed {
            self.publish();
        }
    }

    /// Apply one host connectivity signal
    pub fn handle_signal(&mut self, signal: HostSignal) {
        tracing::debug!(?signal, "host signal");
        if self.monitor.apply(&signal) {
            self.publish();
        }
    }

    /// Tear the session down. Only the first call has any effect.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.cancel.cancel();
        self.monitor.on_transport_closed();
        self.set_state(SessionState::Closed);
        self.publish();
    }

    /// Drive the session until it is closed or the transport finishes.
    ///
    /// Connecting is delayed by the configured interval; host signals are
    /// handled during the delay too. Returns the final snapshot.
    pub async fn run(
        mut self,
        transport: Arc<dyn Transport>,
        mut signals: Option<mpsc::Receiver<HostSignal>>,
    ) -> Result<SessionSnapshot> {
        if self.state == SessionState::Closed {
            return Err(Error::Closed);
        }
        let cancel = self.cancel.clone();

        let delay = tokio::time::sleep(self.config.connect_delay());
        tokio::pin!(delay);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!("session closed before connecting");
                    self.close();
                    return Ok(self.snapshot());
                }
                _ = &mut delay => break,
                signal = next_signal(&mut signals) => match signal {
                    Some(signal) => self.handle_signal(signal),
                    None => signals = None,
                },
            }
        }

        if self.set_state(SessionState::Connecting) {
            self.publish();
        }
        let connected = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("session closed while connecting");
                self.close();
                return Ok(self.snapshot());
            }
            result = transport.connect() => result,
        };
        let mut stream = match connected {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!("failed to connect: {}", e);
                self.monitor.on_transport_error(false);
                self.close();
                return Err(e.into());
            }
        };

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!("session closed");
                    break;
                }
                event = stream.next() => match event {
                    Some(event) => self.handle_transport_event(event),
                    None => {
                        tracing::debug!("transport finished");
                        break;
                    }
                },
                signal = next_signal(&mut signals) => match signal {
                    Some(signal) => self.handle_signal(signal),
                    None => signals = None,
                },
            }
        }

        // Dropping the stream closes the underlying connection
        drop(stream);
        self.close();
        Ok(self.snapshot())
    }

    fn set_state(&mut self, state: SessionState) -> bool {
        if self.state == state {
            return false;
        }
        tracing::debug!(from = ?self.state, to = ?state, "session state");
        self.state = state;
        true
    }

    fn publish(&mut self) {
        self.revision += 1;
        let snapshot = self.snapshot();
        self.subscribers.retain(|tx| tx.send(snapshot.clone()).is_ok());
        self.snapshot_tx.send_replace(snapshot);
    }
}

async fn next_signal(signals: &mut Option<mpsc::Receiver<HostSignal>>) -> Option<HostSignal> {
    match signals {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
