use clap::Parser;
use log::{error, info};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use unify_matter_bridge::bridge::Bridge;
use unify_matter_bridge::bus::MqttClient;
use unify_matter_bridge::config::{Config, load_dotenv};
use unify_matter_bridge::instance_lock::InstanceLock;
use unify_matter_bridge::matter::LoggingSink;

#[derive(Parser)]
#[command(name = "unify-matter-bridge")]
#[command(about = "Bridge Matter cluster commands onto a Unify UCL/MQTT bus")]
struct Cli {
    /// MQTT broker host
    #[arg(long, env = "MQTT_BROKER_HOST")]
    broker_host: Option<String>,

    /// MQTT broker port
    #[arg(long, env = "MQTT_BROKER_PORT")]
    broker_port: Option<u16>,

    /// UCL topic prefix
    #[arg(long, env = "UCL_TOPIC_PREFIX")]
    prefix: Option<String>,

    /// Reply timeout in milliseconds
    #[arg(long, env = "BRIDGE_REPLY_TIMEOUT_MS")]
    reply_timeout_ms: Option<u64>,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

#[tokio::main]
async fn main() {
    load_dotenv();
    init_logger();
    let cli = Cli::parse();
    info!("Starting Unify Matter Bridge");

    let mut config = Config::from_env();
    if let Some(host) = cli.broker_host {
        config.mqtt.broker_host = host;
    }
    if let Some(port) = cli.broker_port {
        config.mqtt.broker_port = port;
    }
    if let Some(prefix) = cli.prefix {
        config.bridge.topic_prefix = prefix;
    }
    if let Some(timeout) = cli.reply_timeout_ms {
        config.bridge.reply_timeout_ms = timeout;
    }
    info!("Configuration loaded:");
    info!(
        "  MQTT broker: {}:{} (client id {})",
        config.mqtt.broker_host, config.mqtt.broker_port, config.mqtt.client_id
    );
    info!("  UCL prefix: {}", config.bridge.topic_prefix);
    info!("  Reply timeout: {} ms", config.bridge.reply_timeout_ms);

    let _lock = match InstanceLock::acquire(&config.mqtt.client_id) {
        Ok(lock) => lock,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let mqtt = MqttClient::new(&config.mqtt);
    let bridge = match Bridge::new(&config.bridge, Arc::new(mqtt.bus()), Arc::new(LoggingSink)) {
        Ok(bridge) => Arc::new(bridge),
        Err(e) => {
            error!("Failed to set up bridge: {}", e);
            std::process::exit(1);
        }
    };

    let cancel = CancellationToken::new();
    let (tx, rx) = mpsc::channel(100);

    let mqtt_task = tokio::spawn(mqtt.run(tx, cancel.clone()));
    let bridge_task = {
        let bridge = bridge.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { bridge.run(rx, cancel).await })
    };

    info!("Unify Matter Bridge is running");
    info!("  - Press Ctrl+C to exit");

    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }

    cancel.cancel();
    let _ = mqtt_task.await;
    let _ = bridge_task.await;

    let abandoned = bridge.dispatcher().pending().len();
    if abandoned > 0 {
        info!("{} request(s) were still pending at shutdown", abandoned);
    }
    info!("Unify Matter Bridge stopped");
}
