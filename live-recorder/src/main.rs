mod cli;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use live_recorder::config::AppConfig;
use live_recorder::domain::{Recording, RecordingConfig, RecordingUrl};
use live_recorder::logging::init_logging;
use live_recorder::monitor::{CheckRequest, Collaborators, LiveStatus, RecordingOrchestrator};
use live_recorder::scheduler::Scheduler;
use platforms_resolver::{StreamTarget, build_client, install_rustls_provider};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    install_rustls_provider();

    let config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    let (logging, _guard) =
        init_logging(&config.paths.log_dir).context("failed to initialize logging")?;
    if let Some(filter) = cli.log_filter.as_deref() {
        logging.set_filter(filter)?;
    }
    debug!(
        filter = %logging.get_filter(),
        log_dir = %logging.log_dir().display(),
        "logging ready"
    );

    let client = build_client(
        config.proxy.active(),
        std::time::Duration::from_secs(config.scheduler.resolve_timeout_secs),
    )?;
    let collaborators = Collaborators::from_config(&config, client);
    let orchestrator = RecordingOrchestrator::new(config, collaborators);
    orchestrator
        .load()
        .await
        .context("failed to load saved recordings")?;

    match cli.command {
        Commands::Run => run(orchestrator).await?,
        Commands::Add {
            url,
            name,
            mode,
            quality,
            paused,
        } => {
            let config = RecordingConfig {
                streamer_name: name,
                record_mode: mode,
                quality,
                ..Default::default()
            };
            let recording = orchestrator.add_recording(&url, config).await?;
            if !paused {
                orchestrator.start_monitor(&recording.id).await?;
            }
            // cancels the check start_monitor kicked off and saves
            orchestrator.shutdown().await;
            println!("{}\t{}", recording.id, recording.url);
        }
        Commands::Remove { id } => {
            orchestrator.stop_monitor(&id).await?;
            orchestrator.remove_recording(&id).await?;
            println!("removed {id}");
        }
        Commands::List { json } => {
            let recordings = orchestrator.list();
            if json {
                let rows: Vec<serde_json::Value> = recordings.iter().map(list_row).collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                print_table(&recordings);
            }
        }
        Commands::CheckDuplicate { url, name } => {
            let (duplicate, reason) = orchestrator.check_duplicate(&url, name.as_deref()).await;
            if duplicate {
                println!("duplicate: {}", reason.code());
            } else {
                println!("not a duplicate");
            }
        }
        Commands::Resolve { url, quality } => {
            let url = RecordingUrl::new(&url)?;
            let platform = url
                .platform()
                .with_context(|| format!("cannot identify the platform of {url}"))?;
            let registry = orchestrator.detector().registry();
            if !registry.supports(&platform.key) {
                anyhow::bail!(
                    "no resolver for {} (supported: {})",
                    platform.name,
                    registry.supported_keys().join(", ")
                );
            }
            let request = CheckRequest {
                recording_id: "resolve".to_string(),
                target: StreamTarget::new(url.as_str(), &platform.key).with_quality(quality),
            };
            let status = orchestrator.detector().check(&request).await?;
            println!("platform: {} ({})", platform.name, platform.key);
            println!("anchor:   {}", status.anchor_name());
            println!("title:    {}", status.title());
            match status {
                LiveStatus::Live { stream_url, .. } => println!("live:     yes\nstream:   {stream_url}"),
                LiveStatus::Offline { .. } => println!("live:     no"),
            }
        }
    }

    Ok(())
}

async fn run(orchestrator: Arc<RecordingOrchestrator>) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let scheduler = Scheduler::new(Arc::clone(&orchestrator));
    let scheduler_task = tokio::spawn(scheduler.run(cancel.clone()));

    let mut events = orchestrator.subscribe();
    let event_log = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if !matches!(event, live_recorder::monitor::RecordingEvent::Changed { .. }) {
                info!(event = %event.description(), "recording event");
            }
        }
    });

    info!(recordings = orchestrator.len(), "live-recorder running, press Ctrl+C to stop");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for Ctrl+C");
    }

    info!("shutting down");
    cancel.cancel();
    if let Err(e) = scheduler_task.await {
        error!(error = %e, "scheduler task failed");
    }
    orchestrator.shutdown().await;
    event_log.abort();
    Ok(())
}

fn list_row(recording: &Recording) -> serde_json::Value {
    serde_json::json!({
        "id": recording.id,
        "url": recording.url.as_str(),
        "platform": recording.platform.key,
        "name": recording.display_name(),
        "monitored": recording.runtime.monitor_enabled,
        "mode": recording.config.record_mode,
        "quality": recording.config.quality,
        "last_title": recording.runtime.live_title,
    })
}

fn print_table(recordings: &[Recording]) {
    if recordings.is_empty() {
        println!("no recordings");
        return;
    }
    println!("{:<36}  {:<10}  {:<9}  {:<20}  URL", "ID", "PLATFORM", "MONITOR", "NAME");
    for recording in recordings {
        println!(
            "{:<36}  {:<10}  {:<9}  {:<20}  {}",
            recording.id,
            recording.platform.key,
            if recording.runtime.monitor_enabled { "on" } else { "off" },
            recording.display_name(),
            recording.url
        );
    }
}
