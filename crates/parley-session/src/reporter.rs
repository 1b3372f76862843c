//! Turns frame failures into visible error messages

use crate::store::ConversationStore;
use parley_protocol::{DecodeError, Message};

/// Synthesizes an error message for every frame that fails validation
#[derive(Debug, Default)]
pub struct ErrorReporter {
    reported: u64,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log the failure and append its fixed user-facing message to the store.
    ///
    /// Returns the id of the synthesized message.
    pub fn report(&mut self, store: &mut ConversationStore, error: &DecodeError, raw: &str) -> String {
        tracing::error!(
            event = %error.event(),
            kind = ?error.kind(),
            raw,
            "dropping frame: {}",
            error
        );

        let message = Message::error(error.kind().user_message());
        let id = message.id.clone();
        store.append_message(message);
        self.reported += 1;
        id
    }

    /// Number of failures reported so far
    pub fn reported(&self) -> u64 {
        self.reported
    }
}
