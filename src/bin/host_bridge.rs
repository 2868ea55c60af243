//! Headless host bridge binary for stdin/stdout JSON communication.
//!
//! Reads `CommandEnvelope` messages as newline-delimited JSON from stdin,
//! drives the conversation engine, and writes `ResponseEnvelope` and
//! `EventEnvelope` messages to stdout.
//!
//! All tracing/diagnostic output goes to stderr so that stdout remains a
//! clean JSON protocol channel.

use std::sync::Arc;

use parley::audio::NullPlayer;
use parley::config::EngineConfig;
use parley::host::stdio::run_stdio_bridge;
use parley::pipeline::{ConversationCoordinator, CoordinatorParts, SpeakQueue, SpeakScheduler};
use parley::session::SessionStatus;
use parley::tts::SilentSynthesizer;
use tokio_util::sync::CancellationToken;

fn load_config() -> anyhow::Result<EngineConfig> {
    let path = std::env::var_os("PARLEY_CONFIG")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(EngineConfig::default_config_path);
    if !path.exists() {
        tracing::info!(path = %path.display(), "no config file; using defaults");
        return Ok(EngineConfig::default());
    }
    let config = EngineConfig::from_file(&path)
        .map_err(|e| anyhow::anyhow!("failed to load {}: {e}", path.display()))?;
    tracing::info!(path = %path.display(), "config loaded");
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise tracing to stderr only (stdout is reserved for the JSON
    // protocol).
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("parley-host starting");

    let config = load_config()?;
    let session = Arc::new(SessionStatus::new(config.speech.audio_enabled));
    let queue = Arc::new(SpeakQueue::new(Arc::clone(&session)));
    let parts = CoordinatorParts::from_config(&config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to build engine: {e}"))?;

    let scheduler = SpeakScheduler::new(
        Arc::clone(&queue),
        Arc::clone(&session),
        Arc::new(SilentSynthesizer::new(config.speech.voice.as_str())),
        Arc::new(NullPlayer),
        config.speech.poll_interval(),
    );
    let status_interval = config.host.status_interval();
    let coordinator = Arc::new(ConversationCoordinator::new(
        config,
        session,
        queue,
        parts,
    ));
    let runtime_events = coordinator.subscribe();

    let cancel = CancellationToken::new();
    let scheduler_handle = tokio::spawn(scheduler.run(cancel.clone()));
    let voice_handle = {
        let coordinator = Arc::clone(&coordinator);
        let cancel = cancel.clone();
        tokio::spawn(async move { coordinator.run_voice_loop(cancel).await })
    };

    let result = run_stdio_bridge(Arc::clone(&coordinator), runtime_events, status_interval).await;

    coordinator.break_answer();
    cancel.cancel();
    let _ = scheduler_handle.await;
    let _ = voice_handle.await;

    result.map_err(|e| {
        tracing::error!(error = %e, "parley-host exited with error");
        anyhow::anyhow!("parley-host failed: {e}")
    })?;

    tracing::info!("parley-host shut down cleanly");
    Ok(())
}
