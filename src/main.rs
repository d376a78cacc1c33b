use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use otter_gateway::client::DEFAULT_TIMEOUT;
use otter_gateway::conversation::InputMode;
use otter_gateway::session::Orchestrator;
use otter_gateway::terminal::{TerminalView, run_chat};
use otter_gateway::upstream::RagClient;
use otter_gateway::voice::{AudioCapture, CpalMicrophone, MouthAnimator, SpeakerSink, rms};
use otter_gateway::{ApiServerBuilder, ApiState, Config, ProxyClient};

/// Otter - Voice chat gateway for a RAG assistant
#[derive(Parser)]
#[command(name = "otter", version, about)]
struct Cli {
    /// Address to bind the HTTP server to
    #[arg(long, env = "OTTER_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the proxy server (default)
    Serve,
    /// Talk to a running gateway from the terminal
    Chat {
        /// Gateway base URL
        #[arg(long, env = "OTTER_URL", default_value = "http://localhost:3000")]
        url: String,
        /// Start in text mode instead of voice mode
        #[arg(long)]
        text: bool,
        /// Voice to request for spoken replies
        #[arg(long)]
        voice: Option<String>,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Check configuration and upstream reachability
    Check,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,otter_gateway=info",
        1 => "info,otter_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(cli.host, cli.port).await,
        Command::Chat { url, text, voice } => chat(&url, text, voice).await,
        Command::TestMic { duration } => test_mic(duration).await,
        Command::Check => check().await,
    }
}

/// Run the proxy until Ctrl-C
async fn serve(host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    config.log_environment();
    tracing::debug!(?config, "loaded configuration");

    let state = Arc::new(ApiState::from_config(&config)?);
    let server = ApiServerBuilder::new(state)
        .host(&config.server.host)
        .port(config.server.port)
        .static_dir(config.server.static_dir.clone())
        .build();

    server.run().await?;
    Ok(())
}

/// Interactive terminal frontend
#[allow(clippy::future_not_send)]
async fn chat(url: &str, text: bool, voice: Option<String>) -> anyhow::Result<()> {
    let proxy = ProxyClient::new(url, DEFAULT_TIMEOUT)?;
    tracing::info!(url = %proxy.base_url(), "connecting to gateway");

    let orchestrator = Orchestrator::new(
        Box::new(proxy),
        Box::new(CpalMicrophone),
        Box::new(SpeakerSink::new()),
        Box::new(TerminalView),
    )
    .with_indicator(Box::new(MouthAnimator::new()))
    .with_voice(voice);

    let mode = if text { InputMode::Text } else { InputMode::Voice };
    println!("Otter chat - Enter to talk, /text or /voice to switch, /end, /quit");

    run_chat(orchestrator, mode).await?;
    Ok(())
}

/// Print a level meter for the default microphone
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;

    println!("Sample rate: {} Hz", capture.sample_rate());
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.take_buffer();
        let energy = rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check that the right input device is the default.");

    Ok(())
}

/// Validate configuration and probe the RAG backend
async fn check() -> anyhow::Result<()> {
    let config = Config::load()?;
    config.log_environment();

    let rag = RagClient::new(&config.rag.url, config.upstream_timeout)?;
    match rag.health().await {
        Ok(()) => println!("RAG backend: ok ({})", rag.base_url()),
        Err(e) => println!("RAG backend: unreachable ({}): {e}", rag.base_url()),
    }

    let key = if config.api_keys.elevenlabs.is_some() {
        "set"
    } else {
        "not set"
    };
    println!("Speech provider key: {key}");

    if config.voice.normalize {
        let found = tokio::process::Command::new(&config.voice.ffmpeg)
            .arg("-version")
            .output()
            .await
            .is_ok_and(|o| o.status.success());
        println!(
            "ffmpeg ({}): {}",
            config.voice.ffmpeg.display(),
            if found { "ok" } else { "not found, uploads pass through" }
        );
    }

    Ok(())
}
