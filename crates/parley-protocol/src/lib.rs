//! parley-protocol: wire types and decoding for conversation streams
//!
//! This crate defines the six-event streaming protocol, the decoder that turns
//! raw frames into typed events, and the conversation data model that the
//! session layer rebuilds from those events.

pub mod decode;
pub mod error;
pub mod event;
pub mod sse;
pub mod types;

pub use decode::{decode, decode_frame};
pub use error::{DecodeError, Error, FailureKind, Result};
pub use event::{EventKind, Frame, StreamEvent};
pub use types::*;
