//! Server-sent events text format
//!
//! Live streams are framed by the HTTP transport. This parser handles the
//! same format from recorded captures:
//! - `event: <label>` sets the label of the pending frame
//! - `data: <text>` appends a payload line (multiple lines join with `\n`)
//! - a line starting with `:` is a comment
//! - an empty line dispatches the pending frame

use crate::event::Frame;

/// Label used when a frame carries data but no `event:` line
pub const DEFAULT_EVENT: &str = "message";

/// Stateful parser that accumulates lines and emits complete frames
#[derive(Debug, Default)]
pub struct FrameParser {
    event: Option<String>,
    data: Vec<String>,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line (without its terminator), returning a frame when one completes
    pub fn feed_line(&mut self, line: &str) -> Option<Frame> {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            // id / retry only matter to a live reconnecting client
            _ => {}
        }
        None
    }

    /// Flush a trailing frame that was not followed by a blank line
    pub fn finish(&mut self) -> Option<Frame> {
        self.dispatch()
    }

    fn dispatch(&mut self) -> Option<Frame> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(Frame::new(
            event.unwrap_or_else(|| DEFAULT_EVENT.to_string()),
            data,
        ))
    }
}

/// Parse a whole capture into frames, in order
pub fn parse_capture(text: &str) -> Vec<Frame> {
    let mut parser = FrameParser::new();
    let mut frames: Vec<Frame> = text.lines().filter_map(|line| parser.feed_line(line)).collect();
    frames.extend(parser.finish());
    frames
}
