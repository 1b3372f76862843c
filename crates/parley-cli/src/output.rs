//! Rendering snapshots to stdout

use parley_protocol::Message;
use parley_session::SessionSnapshot;
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// One line per completed message plus connection banners
    Human,
    /// One JSON snapshot per publish
    Json,
}

/// Tracks what has been shown so each message prints once
pub struct Printer {
    mode: OutputMode,
    printed: HashSet<(String, String)>,
    ordinals: HashMap<String, usize>,
    next_ordinal: usize,
    error: Option<String>,
    slow: bool,
}

impl Printer {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            printed: HashSet::new(),
            ordinals: HashMap::new(),
            next_ordinal: 1,
            error: None,
            slow: false,
        }
    }

    /// Lines to print for a newly published snapshot
    pub fn render(&mut self, snapshot: &SessionSnapshot) -> Vec<String> {
        match self.mode {
            OutputMode::Json => match serde_json::to_string(snapshot) {
                Ok(line) => vec![line],
                Err(e) => {
                    tracing::error!("failed to encode snapshot: {}", e);
                    Vec::new()
                }
            },
            OutputMode::Human => self.render_messages(snapshot, false),
        }
    }

    /// Lines for the final snapshot, including messages that never completed
    pub fn finish(&mut self, snapshot: &SessionSnapshot) -> Vec<String> {
        match self.mode {
            OutputMode::Json => Vec::new(),
            OutputMode::Human => self.render_messages(snapshot, true),
        }
    }

    fn render_messages(&mut self, snapshot: &SessionSnapshot, flush: bool) -> Vec<String> {
        let mut lines = self.banners(snapshot);

        for conversation in &snapshot.conversations {
            let ordinal = self.ordinal(&conversation.id);
            for message in &conversation.messages {
                if !message.is_complete && !flush {
                    continue;
                }
                let key = (conversation.id.clone(), message.id.clone());
                if self.printed.insert(key) {
                    lines.push(format_message(ordinal, message));
                }
            }
        }
        self.forget_evicted(snapshot);
        lines
    }

    /// Drop bookkeeping for conversations that are no longer retained
    fn forget_evicted(&mut self, snapshot: &SessionSnapshot) {
        let retained: HashSet<&str> = snapshot
            .conversations
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        self.ordinals.retain(|id, _| retained.contains(id.as_str()));
        self.printed
            .retain(|(conversation_id, _)| retained.contains(conversation_id.as_str()));
    }

    fn banners(&mut self, snapshot: &SessionSnapshot) -> Vec<String> {
        let mut lines = Vec::new();
        if snapshot.error != self.error {
            match &snapshot.error {
                Some(error) => lines.push(format!("! {}", error)),
                None => lines.push("! connection restored".to_string()),
            }
            self.error = snapshot.error.clone();
        }
        if snapshot.is_slow_connection != self.slow {
            self.slow = snapshot.is_slow_connection;
            if self.slow {
                lines.push("! slow connection".to_string());
            }
        }
        lines
    }

    fn ordinal(&mut self, conversation_id: &str) -> usize {
        if let Some(ordinal) = self.ordinals.get(conversation_id) {
            return *ordinal;
        }
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        self.ordinals.insert(conversation_id.to_string(), ordinal);
        ordinal
    }

    /// Number of conversations still tracked
    pub fn tracked_conversations(&self) -> usize {
        self.ordinals.len()
    }
}

/// `[conversation n] role: content`, with component fields appended
pub fn format_message(ordinal: usize, message: &Message) -> String {
    let mut line = format!(
        "[conversation {}] {}: {}",
        ordinal,
        message.role.as_str(),
        message.content
    );
    if let Some(component) = &message.component {
        let mut fields: Vec<_> = component.fields.iter().collect();
        fields.sort();
        let fields: Vec<String> = fields.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        line.push_str(&format!(" [{}", component.kind.as_str()));
        if !fields.is_empty() {
            line.push(' ');
            line.push_str(&fields.join(", "));
        }
        line.push(']');
    }
    if !message.is_complete {
        line.push_str(" (incomplete)");
    }
    line
}

/// Render every published snapshot until the session goes away
pub async fn render_updates(
    mut updates: mpsc::UnboundedReceiver<SessionSnapshot>,
    mode: OutputMode,
    mut emit: impl FnMut(String),
) {
    let mut printer = Printer::new(mode);
    let mut last = None;
    while let Some(snapshot) = updates.recv().await {
        printer.render(&snapshot).into_iter().for_each(&mut emit);
        last = Some(snapshot);
    }
    if let Some(snapshot) = last {
        printer.finish(&snapshot).into_iter().for_each(&mut emit);
    }
}

/// Print every published snapshot to stdout
pub async fn print_snapshots(updates: mpsc::UnboundedReceiver<SessionSnapshot>, mode: OutputMode) {
    render_updates(updates, mode, |line| println!("{}", line)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_protocol::{Component, ComponentType, Conversation, Frame, Role};
    use parley_session::{ChatSession, ReplayTransport, SessionConfig, SessionState};
    use std::sync::Arc;

    fn snapshot(conversations: Vec<Conversation>) -> SessionSnapshot {
        SessionSnapshot {
            conversations: conversations.into_iter().map(Arc::new).collect(),
            is_connected: true,
            is_slow_connection: false,
            error: None,
            state: SessionState::Streaming,
            revision: 1,
        }
    }

    fn message(id: &str, role: Role, content: &str, complete: bool) -> Arc<Message> {
        let mut message = Message::started(id, role);
        message.content = content.to_string();
        message.is_complete = complete;
        Arc::new(message)
    }

    /// Each turn reuses the id `q`, so every turn after the first opens a new conversation
    fn reused_id_turns(turns: usize) -> Vec<Frame> {
        (0..turns)
            .flat_map(|i| {
                [
                    Frame::new("message_start", r#"{"messageId":"q","role":"user"}"#),
                    Frame::new(
                        "text_chunk",
                        format!(r#"{{"messageId":"q","chunk":"turn {}"}}"#, i),
                    ),
                    Frame::new("message_end", r#"{"messageId":"q"}"#),
                ]
            })
            .collect()
    }

    async fn replay(frames: Vec<Frame>, mode: OutputMode) -> Vec<String> {
        let config = SessionConfig {
            max_conversations: 5,
            connect_delay_ms: 0,
            ..Default::default()
        };
        let mut session = ChatSession::new(config);
        let updates = session.subscribe();
        let transport = Arc::new(ReplayTransport::from_frames(frames));

        let (_, lines) = tokio::join!(session.run(transport, None), async {
            let mut lines = Vec::new();
            render_updates(updates, mode, |line| lines.push(line)).await;
            lines
        });
        lines
    }

    #[tokio::test]
    async fn test_replay_prints_evicted_conversations() {
        let lines = replay(reused_id_turns(12), OutputMode::Human).await;

        let expected: Vec<String> = (0..12)
            .map(|i| format!("[conversation {}] user: turn {}", i + 1, i))
            .collect();
        assert_eq!(lines, expected);
    }

    #[tokio::test]
    async fn test_json_prints_one_line_per_publish() {
        let lines = replay(reused_id_turns(12), OutputMode::Json).await;

        let revisions: Vec<u64> = lines
            .iter()
            .map(|line| {
                let value: serde_json::Value = serde_json::from_str(line).unwrap();
                value["revision"].as_u64().unwrap()
            })
            .collect();
        let expected: Vec<u64> = (1..=revisions.len() as u64).collect();
        assert_eq!(revisions, expected);
        // connecting, open, 36 frames, close
        assert_eq!(lines.len(), 39);
    }

    #[test]
    fn test_evicted_conversations_are_forgotten() {
        let mut printer = Printer::new(OutputMode::Human);
        let mut conversations = Vec::new();
        for i in 0..8 {
            let mut conversation = Conversation::new();
            conversation
                .messages
                .push(message("q", Role::User, &format!("turn {}", i), true));
            conversations.push(conversation);
            let start = conversations.len().saturating_sub(3);
            printer.render(&snapshot(conversations[start..].to_vec()));
        }
        assert_eq!(printer.tracked_conversations(), 3);
        assert_eq!(printer.printed.len(), 3);
    }

    #[test]
    fn test_completed_messages_print_once() {
        let mut conversation = Conversation::new();
        conversation.messages.push(message("m1", Role::User, "Hi", true));
        conversation.messages.push(message("m2", Role::Agent, "Hel", false));
        let mut printer = Printer::new(OutputMode::Human);

        let lines = printer.render(&snapshot(vec![conversation.clone()]));
        assert_eq!(lines, vec!["[conversation 1] user: Hi"]);

        conversation.messages[1] = message("m2", Role::Agent, "Hello", true);
        let lines = printer.render(&snapshot(vec![conversation]));
        assert_eq!(lines, vec!["[conversation 1] agent: Hello"]);
    }

    #[test]
    fn test_conversation_ordinals_survive_eviction() {
        let mut first = Conversation::new();
        first.messages.push(message("m1", Role::User, "a", true));
        let mut second = Conversation::new();
        second.messages.push(message("m1", Role::User, "b", true));
        let mut printer = Printer::new(OutputMode::Human);

        printer.render(&snapshot(vec![first]));
        let lines = printer.render(&snapshot(vec![second]));
        assert_eq!(lines, vec!["[conversation 2] user: b"]);
    }

    #[test]
    fn test_component_fields_are_sorted() {
        let mut msg = Message::started("m1", Role::Agent);
        msg.content = "Booked".into();
        msg.is_complete = true;
        let mut component = Component::new(ComponentType::CalendarEvent);
        component.set_field("title", "Lunch");
        component.set_field("date", "2024-01-01");
        msg.component = Some(component);

        assert_eq!(
            format_message(3, &msg),
            "[conversation 3] agent: Booked [calendar_event date=2024-01-01, title=Lunch]"
        );
    }

    #[test]
    fn test_banners_follow_status_changes() {
        let mut printer = Printer::new(OutputMode::Human);
        let mut snap = snapshot(Vec::new());
        snap.error = Some("offline".into());
        snap.is_slow_connection = true;
        assert_eq!(printer.render(&snap), vec!["! offline", "! slow connection"]);
        assert!(printer.render(&snap).is_empty());

        snap.error = None;
        assert_eq!(printer.render(&snap), vec!["! connection restored"]);
    }

    #[test]
    fn test_finish_flushes_incomplete() {
        let mut conversation = Conversation::new();
        conversation.messages.push(message("m1", Role::Agent, "Hel", false));
        let snap = snapshot(vec![conversation]);
        let mut printer = Printer::new(OutputMode::Human);

        assert!(printer.render(&snap).is_empty());
        assert_eq!(
            printer.finish(&snap),
            vec!["[conversation 1] agent: Hel (incomplete)"]
        );
    }

    #[test]
    fn test_json_mode_emits_snapshot() {
        let mut printer = Printer::new(OutputMode::Json);
        let lines = printer.render(&snapshot(Vec::new()));
        assert_eq!(lines.len(), 1);
        let value: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(value["state"], "streaming");
        assert_eq!(value["is_connected"], true);
    }
}
