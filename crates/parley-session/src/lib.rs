//! parley-session: Conversation stream runtime
//!
//! This crate turns a stream of conversation frames into an observable,
//! bounded message history. Frames are decoded by `parley-protocol`, folded
//! into the [`ConversationStore`] by the [`StreamReducer`], and published as
//! [`SessionSnapshot`]s alongside the [`ConnectionMonitor`]'s status.

pub mod config;
pub mod error;
pub mod handle;
pub mod monitor;
pub mod reducer;
pub mod reporter;
pub mod session;
pub mod store;
pub mod transport;

pub use config::SessionConfig;
pub use error::{Error, Result};
pub use handle::SessionHandle;
pub use monitor::{ConnectionMonitor, ConnectionStatus, HostSignal, NetworkQuality};
pub use reducer::{Outcome, StreamReducer, Unchanged};
pub use reporter::ErrorReporter;
pub use session::{ChatSession, SessionSnapshot, SessionState};
pub use store::ConversationStore;
pub use transport::{
    EventSourceTransport, ReplayTransport, RetryConfig, Transport, TransportEvent, TransportStream,
};
