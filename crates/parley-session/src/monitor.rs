//! Connection monitor: transport liveness, host connectivity and link quality
//!
//! The monitor never looks at message content. Transport errors alone do not
//! produce a user-facing error, the transport is expected to retry; only a
//! lost network, or a transport that gave up, is reported.

use serde::{Deserialize, Serialize};

/// Default round-trip time above which the link counts as slow
pub const DEFAULT_SLOW_RTT_MS: u64 = 500;

/// Effective connection types that always count as slow
pub const SLOW_EFFECTIVE_TYPES: [&str; 2] = ["slow-2g", "2g"];

pub const OFFLINE_ERROR: &str =
    "No internet connection. We'll reconnect automatically when you're back online.";

pub const CONNECTION_LOST_ERROR: &str =
    "Connection lost. We couldn't reconnect to the conversation stream.";

/// A network quality reading from the host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkQuality {
    /// Effective connection type, e.g. `4g` or `slow-2g`
    pub effective_type: Option<String>,
    /// Measured round-trip time in milliseconds
    pub rtt_ms: Option<u64>,
}

/// Connectivity notifications from the host, independent of the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostSignal {
    Online,
    Offline,
    Quality(NetworkQuality),
}

/// The connection fields of a session snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub is_connected: bool,
    pub is_slow_connection: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Issue {
    Offline,
    ConnectionLost,
}

impl Issue {
    fn message(&self) -> &'static str {
        match self {
            Issue::Offline => OFFLINE_ERROR,
            Issue::ConnectionLost => CONNECTION_LOST_ERROR,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionMonitor {
    transport_open: bool,
    online: bool,
    slow: bool,
    issue: Option<Issue>,
    slow_rtt_ms: u64,
}

impl ConnectionMonitor {
    pub fn new(slow_rtt_ms: u64) -> Self {
        Self {
            transport_open: false,
            online: true,
            slow: false,
            issue: None,
            slow_rtt_ms,
        }
    }

    /// The transport opened (or reopened) the stream
    pub fn on_transport_open(&mut self) -> bool {
        self.update(|m| {
            m.transport_open = true;
            m.online = true;
            m.issue = None;
        })
    }

    /// The transport hit an error. While it is still retrying the error text
    /// is left unchanged.
    pub fn on_transport_error(&mut self, retrying: bool) -> bool {
        self.update(|m| {
            m.transport_open = false;
            if !retrying && m.issue.is_none() {
                m.issue = Some(Issue::ConnectionLost);
            }
        })
    }

    /// The stream was closed on purpose
    pub fn on_transport_closed(&mut self) -> bool {
        self.update(|m| m.transport_open = false)
    }

    pub fn on_offline(&mut self) -> bool {
        self.update(|m| {
            m.online = false;
            m.issue = Some(Issue::Offline);
        })
    }

    pub fn on_online(&mut self) -> bool {
        self.update(|m| {
            m.online = true;
            if m.issue == Some(Issue::Offline) {
                m.issue = None;
            }
        })
    }

    pub fn on_quality(&mut self, quality: &NetworkQuality) -> bool {
        let slow = is_slow(quality, self.slow_rtt_ms);
        self.update(|m| m.slow = slow)
    }

    /// Dispatch a host signal; returns whether the status changed
    pub fn apply(&mut self, signal: &HostSignal) -> bool {
        match signal {
            HostSignal::Online => self.on_online(),
            HostSignal::Offline => self.on_offline(),
            HostSignal::Quality(quality) => self.on_quality(quality),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.transport_open && self.online
    }

    pub fn is_slow_connection(&self) -> bool {
        self.slow
    }

    pub fn error(&self) -> Option<&'static str> {
        self.issue.map(|issue| issue.message())
    }

    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            is_connected: self.is_connected(),
            is_slow_connection: self.slow,
            error: self.error().map(str::to_string),
        }
    }

    fn update(&mut self, f: impl FnOnce(&mut Self)) -> bool {
        let before = (self.is_connected(), self.slow, self.issue);
        f(self);
        let after = (self.is_connected(), self.slow, self.issue);
        if before != after {
            tracing::debug!(
                connected = after.0,
                slow = after.1,
                error = ?self.error(),
                "connection status changed"
            );
        }
        before != after
    }
}

impl Default for ConnectionMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_SLOW_RTT_MS)
    }
}

/// Classify a quality reading against an RTT threshold
pub fn is_slow(quality: &NetworkQuality, slow_rtt_ms: u64) -> bool {
    let slow_type = quality
        .effective_type
        .as_deref()
        .is_some_and(|t| SLOW_EFFECTIVE_TYPES.contains(&t));
    let slow_rtt = quality.rtt_ms.is_some_and(|rtt| rtt > slow_rtt_ms);
    slow_type || slow_rtt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quality(effective_type: Option<&str>, rtt_ms: Option<u64>) -> NetworkQuality {
        NetworkQuality {
            effective_type: effective_type.map(str::to_string),
            rtt_ms,
        }
    }

    #[test]
    fn test_starts_disconnected_without_error() {
        let m = ConnectionMonitor::default();
        assert_eq!(m.status(), ConnectionStatus::default());
    }

    #[test]
    fn test_open_connects_and_clears_error() {
        let mut m = ConnectionMonitor::default();
        m.on_transport_error(false);
        assert_eq!(m.error(), Some(CONNECTION_LOST_ERROR));
        assert!(m.on_transport_open());
        assert!(m.is_connected());
        assert_eq!(m.error(), None);
    }

    #[test]
    fn test_retrying_error_keeps_error_text_untouched() {
        let mut m = ConnectionMonitor::default();
        m.on_transport_open();
        assert!(m.on_transport_error(true));
        assert!(!m.is_connected());
        assert_eq!(m.error(), None, "routine reconnects must not raise a banner");

        m.on_offline();
        m.on_transport_error(true);
        assert_eq!(m.error(), Some(OFFLINE_ERROR));
    }

    #[test]
    fn test_terminal_error_does_not_replace_offline_text() {
        let mut m = ConnectionMonitor::default();
        m.on_offline();
        m.on_transport_error(false);
        assert_eq!(m.error(), Some(OFFLINE_ERROR));
    }

    #[test]
    fn test_offline_then_online() {
        let mut m = ConnectionMonitor::default();
        m.on_transport_open();
        assert!(m.on_offline());
        assert!(!m.is_connected());
        assert_eq!(m.error(), Some(OFFLINE_ERROR));

        assert!(m.on_online());
        assert_eq!(m.error(), None);
        assert!(m.is_connected(), "transport never dropped, so we are back");
    }

    #[test]
    fn test_online_waits_for_transport() {
        let mut m = ConnectionMonitor::default();
        m.on_transport_open();
        m.on_offline();
        m.on_transport_error(true);
        m.on_online();
        assert!(!m.is_connected());
        m.on_transport_open();
        assert!(m.is_connected());
    }

    #[test]
    fn test_online_keeps_connection_lost() {
        let mut m = ConnectionMonitor::default();
        m.on_transport_error(false);
        m.on_online();
        assert_eq!(m.error(), Some(CONNECTION_LOST_ERROR));
    }

    #[test]
    fn test_slow_classification() {
        assert!(is_slow(&quality(Some("slow-2g"), None), 500));
        assert!(is_slow(&quality(Some("2g"), Some(10)), 500));
        assert!(!is_slow(&quality(Some("3g"), Some(500)), 500));
        assert!(is_slow(&quality(Some("4g"), Some(501)), 500));
        assert!(is_slow(&quality(None, Some(120)), 100));
        assert!(!is_slow(&quality(None, None), 500));
    }

    #[test]
    fn test_quality_recomputed_on_each_reading() {
        let mut m = ConnectionMonitor::new(300);
        assert!(m.apply(&HostSignal::Quality(quality(Some("4g"), Some(800)))));
        assert!(m.is_slow_connection());
        assert!(!m.apply(&HostSignal::Quality(quality(Some("2g"), None))));
        assert!(m.apply(&HostSignal::Quality(quality(Some("4g"), Some(50)))));
        assert!(!m.is_slow_connection());
    }

    #[test]
    fn test_quality_never_touches_connection() {
        let mut m = ConnectionMonitor::default();
        m.on_transport_open();
        m.on_quality(&quality(Some("slow-2g"), None));
        assert!(m.is_connected());
        assert_eq!(m.error(), None);
    }
}
