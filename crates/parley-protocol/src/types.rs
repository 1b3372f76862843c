//! Conversation data model rebuilt from the stream

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

impl Role {
    /// Parse a wire role
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "agent" => Some(Role::Agent),
            _ => None,
        }
    }

    /// The wire name of this role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Agent => "agent",
        }
    }
}

/// Kind of structured payload attached to a message.
///
/// The set is open: labels the client does not know are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ComponentType {
    CalendarEvent,
    ContactBadge,
    Other(String),
}

impl ComponentType {
    pub fn from_label(label: &str) -> Self {
        match label {
            "calendar_event" => ComponentType::CalendarEvent,
            "contact_badge" => ComponentType::ContactBadge,
            other => ComponentType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ComponentType::CalendarEvent => "calendar_event",
            ComponentType::ContactBadge => "contact_badge",
            ComponentType::Other(label) => label,
        }
    }
}

impl From<String> for ComponentType {
    fn from(label: String) -> Self {
        ComponentType::from_label(&label)
    }
}

impl From<ComponentType> for String {
    fn from(kind: ComponentType) -> Self {
        kind.as_str().to_string()
    }
}

/// A component assembled field by field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    #[serde(rename = "type")]
    pub kind: ComponentType,
    #[serde(default)]
    pub fields: HashMap<String, String>,
}

impl Component {
    /// Create an empty component of the given kind
    pub fn new(kind: ComponentType) -> Self {
        Self {
            kind,
            fields: HashMap::new(),
        }
    }

    /// Insert or overwrite a field
    pub fn set_field(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Get a field value
    pub fn field(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }
}

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    /// Text accumulated from chunks
    pub content: String,
    pub is_complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<Component>,
    /// Set on messages synthesized from stream failures
    #[serde(default)]
    pub is_error: bool,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// A freshly started message: empty and incomplete
    pub fn started(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
            content: String::new(),
            is_complete: false,
            component: None,
            is_error: false,
            timestamp: Utc::now(),
        }
    }

    /// A complete agent message flagged as an error, with a fresh unique id
    pub fn error(text: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: format!(
                "error_{}_{}",
                now.timestamp_millis(),
                uuid::Uuid::new_v4().simple()
            ),
            role: Role::Agent,
            content: text.into(),
            is_complete: true,
            component: None,
            is_error: true,
            timestamp: now,
        }
    }
}

/// An ordered run of messages.
///
/// Messages sit behind `Arc` so snapshots share them; only the last one is
/// ever replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub messages: Vec<Arc<Message>>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Create an empty conversation with a fresh id
    pub fn new() -> Self {
        Self {
            id: format!("conversation_{}", uuid::Uuid::new_v4().simple()),
            messages: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last().map(Arc::as_ref)
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}
