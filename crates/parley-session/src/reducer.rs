//! Stream reducer: applies protocol events to the conversation store
//!
//! Events are applied strictly in arrival order. Only the last message of the
//! current conversation is mutable; events addressed to anything else leave
//! the store unchanged. A message id seen twice since the last boundary means
//! the remote side has started a new conversation.

use crate::reporter::ErrorReporter;
use crate::store::ConversationStore;
use parley_protocol::{Component, EventKind, FailureKind, Frame, Message, Role, StreamEvent, decode_frame};
use std::collections::HashSet;

/// What applying one frame did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The event changed the store
    Applied(EventKind),
    /// The event was valid but changed nothing
    Unchanged(EventKind, Unchanged),
    /// The frame failed validation; an error message was appended instead
    Reported(FailureKind),
    /// The frame is not a protocol event
    Unrecognized,
}

impl Outcome {
    /// Check if the store changed
    pub fn changed_store(&self) -> bool {
        matches!(self, Outcome::Applied(_) | Outcome::Reported(_))
    }
}

/// Why a valid event left the store unchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unchanged {
    /// The event targets a message other than the current last one
    NotCurrentMessage,
    /// The target message has already completed
    MessageComplete,
    /// A field arrived before its component was started
    NoComponent,
    /// `component_end` carries no state
    StructuralMarker,
}

/// Single-writer state machine over a [`ConversationStore`]
#[derive(Debug)]
pub struct StreamReducer {
    store: ConversationStore,
    /// Message ids seen since the last conversation boundary
    tracked_ids: HashSet<String>,
    reporter: ErrorReporter,
}

impl StreamReducer {
    pub fn new(store: ConversationStore) -> Self {
        Self {
            store,
            tracked_ids: HashSet::new(),
            reporter: ErrorReporter::new(),
        }
    }

    /// Decode a raw frame and apply it, reporting failures as error messages
    pub fn handle_frame(&mut self, frame: &Frame) -> Outcome {
        match decode_frame(frame) {
            Ok(Some(event)) => {
                tracing::trace!(event = %event.kind(), message_id = event.message_id(), "applying event");
                self.apply(event)
            }
            Ok(None) => {
                tracing::debug!(label = %frame.event, "ignoring non-protocol frame");
                Outcome::Unrecognized
            }
            Err(error) => {
                self.reporter.report(&mut self.store, &error, &frame.data);
                Outcome::Reported(error.kind())
            }
        }
    }

    /// Apply a validated event
    pub fn apply(&mut self, event: StreamEvent) -> Outcome {
        match event {
            StreamEvent::MessageStart { message_id, role } => self.start_message(message_id, role),
            StreamEvent::TextChunk { message_id, chunk } => {
                self.mutate_target(EventKind::TextChunk, &message_id, |msg| {
                    msg.content.push_str(&chunk)
                })
            }
            StreamEvent::ComponentStart {
                message_id,
                component_type,
            } => self.mutate_target(EventKind::ComponentStart, &message_id, |msg| {
                msg.component = Some(Component::new(component_type))
            }),
            StreamEvent::ComponentField {
                message_id,
                field,
                value,
            } => {
                let has_component = self.target(&message_id).map(|msg| msg.component.is_some());
                match has_component {
                    Ok(true) => self.mutate_target(EventKind::ComponentField, &message_id, |msg| {
                        if let Some(component) = msg.component.as_mut() {
                            component.set_field(field, value);
                        }
                    }),
                    Ok(false) => {
                        self.unchanged(EventKind::ComponentField, &message_id, Unchanged::NoComponent)
                    }
                    Err(reason) => self.unchanged(EventKind::ComponentField, &message_id, reason),
                }
            }
            StreamEvent::ComponentEnd { .. } => {
                Outcome::Unchanged(EventKind::ComponentEnd, Unchanged::StructuralMarker)
            }
            StreamEvent::MessageEnd { message_id } => {
                self.mutate_target(EventKind::MessageEnd, &message_id, |msg| msg.is_complete = true)
            }
        }
    }

    fn start_message(&mut self, message_id: String, role: Role) -> Outcome {
        if self.tracked_ids.contains(&message_id) {
            tracing::debug!(%message_id, "message id reused, starting a new conversation");
            self.tracked_ids.clear();
            self.tracked_ids.insert(message_id.clone());
            self.store.start_conversation();
        } else {
            self.tracked_ids.insert(message_id.clone());
        }

        tracing::debug!(%message_id, role = role.as_str(), "message started");
        self.store.append_message(Message::started(message_id, role));
        Outcome::Applied(EventKind::MessageStart)
    }

    /// Resolve the message an event may change
    fn target(&self, message_id: &str) -> Result<&Message, Unchanged> {
        match self.store.last_message() {
            Some(msg) if msg.id == message_id => {
                if msg.is_complete {
                    Err(Unchanged::MessageComplete)
                } else {
                    Ok(msg)
                }
            }
            _ => Err(Unchanged::NotCurrentMessage),
        }
    }

    fn mutate_target<F>(&mut self, kind: EventKind, message_id: &str, f: F) -> Outcome
    where
        F: FnOnce(&mut Message),
    {
        if let Err(reason) = self.target(message_id).map(|_| ()) {
            return self.unchanged(kind, message_id, reason);
        }
        self.store.mutate_last(f);
        if kind == EventKind::MessageEnd {
            tracing::debug!(%message_id, "message complete");
        }
        Outcome::Applied(kind)
    }

    fn unchanged(&self, kind: EventKind, message_id: &str, reason: Unchanged) -> Outcome {
        tracing::debug!(event = %kind, %message_id, ?reason, "event left store unchanged");
        Outcome::Unchanged(kind, reason)
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn tracked_ids(&self) -> &HashSet<String> {
        &self.tracked_ids
    }

    /// Number of frames turned into error messages
    pub fn reported_failures(&self) -> u64 {
        self.reporter.reported()
    }
}

impl Default for StreamReducer {
    fn default() -> Self {
        Self::new(ConversationStore::default())
    }
}
