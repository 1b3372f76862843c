//! Periodic reachability probe feeding host signals to the session

use parley_session::{HostSignal, NetworkQuality};
use reqwest::Url;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(15);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of one probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// The origin answered (any HTTP status) after this long
    Reachable(Duration),
    /// The request could not connect or timed out
    Unreachable,
    /// Something else went wrong; says nothing about the network
    Inconclusive,
}

/// Turns observations into host signals
#[derive(Debug, Default)]
pub struct ProbeState {
    offline: bool,
}

impl ProbeState {
    pub fn observe(&mut self, observation: Observation) -> Vec<HostSignal> {
        match observation {
            Observation::Reachable(rtt) => {
                let mut signals = Vec::with_capacity(2);
                if self.offline {
                    self.offline = false;
                    signals.push(HostSignal::Online);
                }
                signals.push(HostSignal::Quality(NetworkQuality {
                    effective_type: None,
                    rtt_ms: Some(rtt.as_millis() as u64),
                }));
                signals
            }
            Observation::Unreachable if !self.offline => {
                self.offline = true;
                vec![HostSignal::Offline]
            }
            Observation::Unreachable | Observation::Inconclusive => Vec::new(),
        }
    }
}

/// Sends a `HEAD` to the endpoint's origin on an interval
pub struct NetworkProbe {
    client: reqwest::Client,
    target: Url,
    interval: Duration,
}

impl NetworkProbe {
    pub fn new(endpoint: &Url, interval: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            target: origin(endpoint),
            interval,
        }
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    /// Probe until the session stops listening
    pub async fn run(self, signals: mpsc::Sender<HostSignal>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut state = ProbeState::default();

        loop {
            tokio::select! {
                _ = signals.closed() => break,
                _ = ticker.tick() => {}
            }
            let observation = self.probe_once().await;
            tracing::debug!(?observation, target = %self.target, "network probe");
            for signal in state.observe(observation) {
                if signals.send(signal).await.is_err() {
                    return;
                }
            }
        }
    }

    async fn probe_once(&self) -> Observation {
        let started = Instant::now();
        match self
            .client
            .head(self.target.clone())
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(_) => Observation::Reachable(started.elapsed()),
            Err(e) if e.is_connect() || e.is_timeout() => Observation::Unreachable,
            Err(e) => {
                tracing::warn!("network probe failed: {}", e);
                Observation::Inconclusive
            }
        }
    }
}

fn origin(endpoint: &Url) -> Url {
    let mut origin = endpoint.clone();
    origin.set_path("/");
    origin.set_query(None);
    origin.set_fragment(None);
    origin
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_strips_path_and_query() {
        let url = Url::parse("https://example.com:8443/v1/stream?x=1#top").unwrap();
        let probe = NetworkProbe::new(&url, DEFAULT_PROBE_INTERVAL);
        assert_eq!(probe.target().as_str(), "https://example.com:8443/");
    }

    #[test]
    fn test_outage_then_recovery() {
        let mut state = ProbeState::default();

        assert_eq!(state.observe(Observation::Unreachable), vec![HostSignal::Offline]);
        assert!(state.observe(Observation::Unreachable).is_empty());
        assert!(state.observe(Observation::Inconclusive).is_empty());

        let signals = state.observe(Observation::Reachable(Duration::from_millis(640)));
        assert_eq!(
            signals,
            vec![
                HostSignal::Online,
                HostSignal::Quality(NetworkQuality {
                    effective_type: None,
                    rtt_ms: Some(640),
                }),
            ]
        );
    }

    #[test]
    fn test_steady_state_reports_quality_only() {
        let mut state = ProbeState::default();
        let signals = state.observe(Observation::Reachable(Duration::from_millis(40)));
        assert_eq!(signals.len(), 1);
        assert!(matches!(signals[0], HostSignal::Quality(_)));
    }
}
