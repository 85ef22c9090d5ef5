//! Development tool: send one Matter command through the bridge and print
//! how it completes.
//!
//! Usage:
//!   cargo run --bin ucl-probe -- --unid zw-CAFECAFE-0004 --cluster OnOff --command 1
//!   cargo run --bin ucl-probe -- --unid zw-CAFECAFE-0004 --cluster LevelControl \
//!       --command 0 --fields '{"Level": 128}'

use clap::Parser;
use log::info;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use unify_matter_bridge::bridge::Bridge;
use unify_matter_bridge::bus::{DeviceAddress, MqttClient};
use unify_matter_bridge::config::{Config, load_dotenv};
use unify_matter_bridge::error::{BridgeError, Result};
use unify_matter_bridge::instance_lock::InstanceLock;
use unify_matter_bridge::matter::{
    ChannelSink, CommandId, CommandPayload, EndpointId, HandlerContext, KnownCluster,
    ProtocolEvent,
};
use unify_matter_bridge::node_state::NodeStateMonitor;
use unify_matter_bridge::translator::Invocation;

#[derive(Parser)]
#[command(name = "ucl-probe")]
#[command(about = "Send one Matter command through the bridge and wait for the outcome")]
struct Cli {
    /// Unify id of the target node
    #[arg(long)]
    unid: String,

    /// Endpoint on the bus side
    #[arg(long, default_value_t = 1)]
    endpoint: u16,

    /// UCL cluster name (OnOff, LevelControl, Identify, Groups, Thermostat)
    #[arg(long)]
    cluster: String,

    /// Matter command id
    #[arg(long)]
    command: u32,

    /// Command fields as a JSON object
    #[arg(long, default_value = "{}")]
    fields: String,

    /// How long to wait for the node to show up, in seconds
    #[arg(long, default_value_t = 10)]
    wait: u64,

    #[arg(long, env = "MQTT_CLIENT_ID", default_value = "ucl-probe")]
    client_id: String,
}

#[tokio::main]
async fn main() {
    load_dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(e) = probe(Cli::parse()).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn probe(cli: Cli) -> Result<()> {
    let cluster = KnownCluster::from_bus_name(&cli.cluster)
        .ok_or_else(|| BridgeError::UnknownCluster(cli.cluster.clone()))?;
    let fields: CommandPayload = serde_json::from_str(&cli.fields)?;

    let mut config = Config::from_env();
    config.mqtt.client_id = cli.client_id;
    let _lock = InstanceLock::acquire(&config.mqtt.client_id)?;

    let mqtt = MqttClient::new(&config.mqtt);
    let (sink, mut protocol_events) = ChannelSink::new();
    let bridge = Arc::new(Bridge::new(&config.bridge, Arc::new(mqtt.bus()), Arc::new(sink))?);

    let cancel = CancellationToken::new();
    let (tx, rx) = mpsc::channel(100);
    tokio::spawn(mqtt.run(tx, cancel.clone()));
    {
        let bridge = bridge.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { bridge.run(rx, cancel).await });
    }

    println!(
        "Connecting to {}:{}...",
        config.mqtt.broker_host, config.mqtt.broker_port
    );
    let address = DeviceAddress::new(cli.unid, cli.endpoint);
    let endpoint = wait_for_endpoint(&bridge, &address, Duration::from_secs(cli.wait)).await?;
    println!("{} is Matter {}", address, endpoint);

    let ctx =
        HandlerContext::new(endpoint, cluster.id(), CommandId(cli.command)).with_payload(fields);
    let invocation = bridge.dispatcher().dispatch(&ctx)?;

    match invocation {
        Invocation::Sent => println!("Sent (no reply expected)"),
        Invocation::Pending(handle) => {
            info!("Waiting on handle {}", handle.id());
            while let Some(event) = protocol_events.recv().await {
                match event {
                    ProtocolEvent::Completed(completion) if completion.handle == handle => {
                        match completion.result {
                            Ok(reply) => println!("Completed: {:?}", reply),
                            Err(e) => println!("Failed ({:?}): {}", e.status(), e),
                        }
                        break;
                    }
                    ProtocolEvent::AttributeUpdated(update) => {
                        println!("  {} {} = {:?}", update.cluster, update.attribute, update.value);
                    }
                    ProtocolEvent::Completed(_) => {}
                }
            }
        }
    }

    cancel.cancel();
    Ok(())
}

async fn wait_for_endpoint(
    bridge: &Bridge,
    address: &DeviceAddress,
    wait: Duration,
) -> Result<EndpointId> {
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        if let Some(endpoint) = bridge.monitor().endpoint_for(address) {
            return Ok(endpoint);
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(BridgeError::NodeOffline(address.to_string()));
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}
