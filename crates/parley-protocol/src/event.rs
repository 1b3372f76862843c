//! Protocol event types

use crate::types::{ComponentType, Role};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The six event labels the stream emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    MessageStart,
    TextChunk,
    ComponentStart,
    ComponentField,
    ComponentEnd,
    MessageEnd,
}

impl EventKind {
    /// Every protocol event, in the order a message normally produces them
    pub const ALL: [EventKind; 6] = [
        EventKind::MessageStart,
        EventKind::TextChunk,
        EventKind::ComponentStart,
        EventKind::ComponentField,
        EventKind::ComponentEnd,
        EventKind::MessageEnd,
    ];

    /// Look up an event kind by its wire label
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "message_start" => Some(EventKind::MessageStart),
            "text_chunk" => Some(EventKind::TextChunk),
            "component_start" => Some(EventKind::ComponentStart),
            "component_field" => Some(EventKind::ComponentField),
            "component_end" => Some(EventKind::ComponentEnd),
            "message_end" => Some(EventKind::MessageEnd),
            _ => None,
        }
    }

    /// The wire label
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::MessageStart => "message_start",
            EventKind::TextChunk => "text_chunk",
            EventKind::ComponentStart => "component_start",
            EventKind::ComponentField => "component_field",
            EventKind::ComponentEnd => "component_end",
            EventKind::MessageEnd => "message_end",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One raw unit of the inbound stream: an event label and its payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub event: String,
    pub data: String,
}

impl Frame {
    /// Create a frame from a label and payload
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
        }
    }

    /// The protocol event this frame is labelled with, if it is one
    pub fn kind(&self) -> Option<EventKind> {
        EventKind::from_label(&self.event)
    }
}

/// A validated protocol event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A new message begins
    MessageStart { message_id: String, role: Role },
    /// Text appended to the message
    TextChunk { message_id: String, chunk: String },
    /// A component is attached to the message
    ComponentStart {
        message_id: String,
        component_type: ComponentType,
    },
    /// One field of the attached component
    ComponentField {
        message_id: String,
        field: String,
        value: String,
    },
    /// The component is done (structural marker only)
    ComponentEnd { message_id: String },
    /// The message is complete
    MessageEnd { message_id: String },
}

impl StreamEvent {
    /// The message this event targets
    pub fn message_id(&self) -> &str {
        match self {
            StreamEvent::MessageStart { message_id, .. }
            | StreamEvent::TextChunk { message_id, .. }
            | StreamEvent::ComponentStart { message_id, .. }
            | StreamEvent::ComponentField { message_id, .. }
            | StreamEvent::ComponentEnd { message_id }
            | StreamEvent::MessageEnd { message_id } => message_id,
        }
    }

    /// The label this event travels under
    pub fn kind(&self) -> EventKind {
        match self {
            StreamEvent::MessageStart { .. } => EventKind::MessageStart,
            StreamEvent::TextChunk { .. } => EventKind::TextChunk,
            StreamEvent::ComponentStart { .. } => EventKind::ComponentStart,
            StreamEvent::ComponentField { .. } => EventKind::ComponentField,
            StreamEvent::ComponentEnd { .. } => EventKind::ComponentEnd,
            StreamEvent::MessageEnd { .. } => EventKind::MessageEnd,
        }
    }
}
