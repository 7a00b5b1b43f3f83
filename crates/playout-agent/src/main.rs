use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use application::{ChannelEventPublisher, Conductor, DeviceRegistry, WindowResolver, WorkerContext};
use domain::event::EventPublisher;
use infrastructure::config::AgentConfig;
use infrastructure::messaging::mqtt_client::MqttPublisherClient;
use infrastructure::{CompositeEventPublisher, MqttClient, MqttStatusPublisher};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config directory
    #[arg(long)]
    config_dir: Option<String>,

    /// Override Agent ID
    #[arg(long)]
    agent_id: Option<String>,
}

/// Published retained on `playout/<agent>/agent`
fn agent_state(state: &str) -> String {
    serde_json::json!({ "status": state }).to_string()
}

async fn run() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,playout_agent=debug,application=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🎬 Playout Agent Starting...");
    info!("🆔 Process ID: {}", std::process::id());

    let args = Args::parse();

    // Run from the workspace root during development
    let config_dir = args.config_dir.unwrap_or_else(|| {
        let dev_dir = "crates/playout-agent/config";
        if std::path::Path::new(dev_dir).exists() {
            dev_dir.to_string()
        } else {
            "config".to_string()
        }
    });
    info!("📂 Config directory: {}", config_dir);

    let mut config = AgentConfig::load(&config_dir)
        .with_context(|| format!("loading configuration from {}", config_dir))?;
    if let Some(id) = args.agent_id {
        config.agent_id = id;
    }
    let agent_id = config.agent_id.clone();
    info!(
        agent_id = %agent_id,
        devices = config.devices.len(),
        layers = config.mappings.len(),
        "✅ Configuration loaded"
    );

    // Event fan-out: workers publish into the channel, sinks hang off it
    let cancel = CancellationToken::new();
    let channel = ChannelEventPublisher::new(1024);
    let mut sinks: Vec<Arc<dyn EventPublisher>> = Vec::new();

    let agent_topic = format!("playout/{}/agent", agent_id);
    let mqtt_client = match &config.mqtt {
        Some(mqtt) => {
            info!(host = %mqtt.host, port = mqtt.port, "Connecting to MQTT Broker...");
            let last_will = rumqttc::LastWill::new(
                &agent_topic,
                agent_state("OFFLINE"),
                rumqttc::QoS::AtLeastOnce,
                true,
            );
            let client = MqttClient::new(
                &mqtt.host,
                mqtt.port,
                &format!("playout-{}", agent_id),
                Some(last_will),
            );
            let publisher_client: Arc<dyn MqttPublisherClient> = Arc::new(client.clone());
            sinks.push(Arc::new(MqttStatusPublisher::new(
                publisher_client,
                mqtt.status_topic(&agent_id),
            )));
            Some(client)
        }
        None => {
            info!("MQTT not configured, events stay in-process");
            None
        }
    };
    let sink: Option<Arc<dyn EventPublisher>> = match sinks.len() {
        0 => None,
        1 => sinks.pop(),
        _ => Some(Arc::new(CompositeEventPublisher::new(sinks))),
    };
    let forwarder = sink.map(|sink| channel.forward_to(sink, cancel.child_token()));

    let resolver = match &config.timeline_file {
        Some(file) => {
            // Relative to the config directory
            let path = std::path::Path::new(&config_dir).join(file);
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading timeline {}", path.display()))?;
            let resolver = WindowResolver::from_json(&json)
                .with_context(|| format!("parsing timeline {}", path.display()))?;
            info!(path = %path.display(), "📜 Timeline loaded");
            resolver
        }
        None => {
            warn!("No timeline file configured, devices will receive an empty timeline");
            WindowResolver::default()
        }
    };

    let registry = Arc::new(DeviceRegistry::with_default_devices());
    let conductor = Conductor::new(
        registry,
        Arc::new(resolver),
        WorkerContext {
            publisher: Arc::new(channel.clone()),
            templates: config.status_templates(),
        },
    );

    let report = conductor
        .apply_configuration(&config.devices, &config.mappings)
        .await
        .context("applying device configuration")?;
    info!(started = ?report.started, "✅ Devices started");

    if let Some(client) = &mqtt_client {
        if let Err(e) = client.publish(&agent_topic, &agent_state("ONLINE"), true).await {
            warn!("Failed to publish ONLINE status: {}", e);
        }
    }

    let mut ticker = tokio::time::interval(Duration::from_millis(config.tick_interval_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(interval_ms = config.tick_interval_ms, "⏱️ Tick loop running");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = conductor.resolve_and_dispatch(chrono::Utc::now().timestamp_millis());
                if !report.failed.is_empty() {
                    debug!(time = report.time, failed = report.failed.len(), "Tick dispatched with failures");
                }
            }
            signal = &mut shutdown => {
                match signal {
                    Ok(()) => info!("🛑 Shutting down..."),
                    Err(err) => warn!(error = %err, "Unable to listen for shutdown signal"),
                }
                break;
            }
        }
    }

    conductor.shutdown().await;
    cancel.cancel();
    if let Some(forwarder) = forwarder {
        let _ = forwarder.await;
    }

    if let Some(client) = &mqtt_client {
        let _ = client.publish(&agent_topic, &agent_state("OFFLINE"), true).await;
    }

    info!("👋 Good bye!");
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("\n❌ CRITICAL ERROR: {:?}", e);
        std::process::exit(1);
    }
}
