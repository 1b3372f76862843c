//! parley - follow a conversation stream from the terminal

mod config;
mod output;
mod probe;

use anyhow::Context;
use clap::{Parser, Subcommand};
use output::OutputMode;
use parley_session::{
    ChatSession, EventSourceTransport, HostSignal, ReplayTransport, SessionConfig, Transport,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// parley - live conversation stream viewer
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Stream endpoint URL
    #[arg(short, long)]
    url: Option<String>,

    /// Conversations kept in memory (default: 5)
    #[arg(long, global = true)]
    max_conversations: Option<usize>,

    /// Round-trip time in ms above which the connection counts as slow (default: 500)
    #[arg(long)]
    slow_rtt_ms: Option<u64>,

    /// Delay in ms before connecting (default: 2000)
    #[arg(long)]
    connect_delay_ms: Option<u64>,

    /// Disable the network reachability probe
    #[arg(long)]
    no_probe: bool,

    /// Print every snapshot as JSON instead of message lines
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a recorded event stream capture
    Replay {
        /// File in text/event-stream format
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries the conversation
    let filter = if args.verbose {
        EnvFilter::new("parley=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if args.init_config {
        let path = config::Config::init().context("creating config file")?;
        println!("Config file created at: {}", path.display());
        println!("\nExample config:\n{}", config::example_config());
        return Ok(());
    }

    let cfg = config::Config::load();
    let mut session_config = cfg.session_config();
    apply_args(&args, &mut session_config);

    let mode = if args.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    match args.command {
        Some(Command::Replay { ref file }) => {
            let text = tokio::fs::read_to_string(file)
                .await
                .with_context(|| format!("reading capture {}", file.display()))?;
            let frames = parley_protocol::sse::parse_capture(&text);
            tracing::debug!("replaying {} frames from {}", frames.len(), file.display());
            session_config.connect_delay_ms = 0;
            session_config.validate()?;
            run(session_config, Arc::new(ReplayTransport::from_frames(frames)), None, mode).await
        }
        None => {
            session_config.validate()?;
            let transport = EventSourceTransport::new(&session_config.endpoint)?
                .with_retry_config(session_config.retry.clone());

            let signals = if args.no_probe {
                None
            } else {
                let interval = cfg
                    .probe_interval_secs
                    .map(Duration::from_secs)
                    .unwrap_or(probe::DEFAULT_PROBE_INTERVAL);
                let (tx, rx) = mpsc::channel::<HostSignal>(16);
                let probe = probe::NetworkProbe::new(transport.endpoint(), interval);
                tracing::debug!("probing {} every {:?}", probe.target(), interval);
                tokio::spawn(probe.run(tx));
                Some(rx)
            };

            run(session_config, Arc::new(transport), signals, mode).await
        }
    }
}

fn apply_args(args: &Args, config: &mut SessionConfig) {
    if let Some(ref url) = args.url {
        config.endpoint = url.clone();
    }
    if let Some(max) = args.max_conversations {
        config.max_conversations = max;
    }
    if let Some(rtt) = args.slow_rtt_ms {
        config.slow_rtt_ms = rtt;
    }
    if let Some(delay) = args.connect_delay_ms {
        config.connect_delay_ms = delay;
    }
}

async fn run(
    config: SessionConfig,
    transport: Arc<dyn Transport>,
    signals: Option<mpsc::Receiver<HostSignal>>,
    mode: OutputMode,
) -> anyhow::Result<()> {
    let mut session = ChatSession::new(config);
    let printer = tokio::spawn(output::print_snapshots(session.subscribe(), mode));

    let handle = session.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("interrupted");
            handle.close();
        }
    });

    let result = session.run(transport, signals).await;
    // The session is gone, so the printer's feed closes after the last snapshot
    printer.await.context("output task failed")?;

    let snapshot = result?;
    tracing::debug!(
        "session finished with {} messages in {} conversations",
        snapshot.message_count(),
        snapshot.conversations.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_override_config() {
        let args = Args::parse_from([
            "parley",
            "--url",
            "http://localhost:9000/stream",
            "--max-conversations",
            "2",
            "--connect-delay-ms",
            "0",
        ]);
        let mut config = SessionConfig::default();
        apply_args(&args, &mut config);

        assert_eq!(config.endpoint, "http://localhost:9000/stream");
        assert_eq!(config.max_conversations, 2);
        assert_eq!(config.connect_delay_ms, 0);
        assert_eq!(config.slow_rtt_ms, 500);
    }

    #[test]
    fn test_replay_subcommand() {
        let args = Args::parse_from(["parley", "replay", "capture.sse", "--json"]);
        assert!(args.json);
        assert!(matches!(args.command, Some(Command::Replay { ref file }) if file == &PathBuf::from("capture.sse")));
    }

    #[tokio::test]
    async fn test_replay_run_completes() {
        let capture = "event: message_start\ndata: {\"messageId\":\"m1\",\"role\":\"agent\"}\n\n\
                       event: text_chunk\ndata: {\"messageId\":\"m1\",\"chunk\":\"Hi\"}\n\n\
                       event: message_end\ndata: {\"messageId\":\"m1\"}\n\n";
        let frames = parley_protocol::sse::parse_capture(capture);
        assert_eq!(frames.len(), 3);

        let config = SessionConfig {
            connect_delay_ms: 0,
            ..Default::default()
        };
        run(config, Arc::new(ReplayTransport::from_frames(frames)), None, OutputMode::Json)
            .await
            .unwrap();
    }
}
