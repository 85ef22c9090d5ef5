//! MQTT client wrapper for the UCL bus.

use super::{BusClient, BusEvent, BusMessage};
use crate::config::MqttConfig;
use crate::error::TranslateError;
use log::{debug, error, info, warn};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// MQTT connection: the request handle plus the event loop driving it.
pub struct MqttClient {
    client: AsyncClient,
    event_loop: EventLoop,
}

impl MqttClient {
    /// Create a new MQTT client from configuration.
    pub fn new(config: &MqttConfig) -> Self {
        let mut options =
            MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(Duration::from_secs(30));

        // Set credentials if provided
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(options, 100);

        Self { client, event_loop }
    }

    /// Publishing handle for the translators.
    pub fn bus(&self) -> MqttBus {
        MqttBus {
            client: self.client.clone(),
        }
    }

    /// Run the MQTT event loop and forward events to the provided channel.
    ///
    /// Runs until `cancel` fires or the receiving side is dropped. Connection
    /// errors are retried every 5 seconds.
    pub async fn run(mut self, tx: mpsc::Sender<BusEvent>, cancel: CancellationToken) {
        info!("[MQTT] Starting event loop");

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = self.event_loop.poll() => event,
            };

            let forwarded = match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("[MQTT] Connected to broker");
                    BusEvent::Connected
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let payload = match String::from_utf8(publish.payload.to_vec()) {
                        Ok(s) => s,
                        Err(e) => {
                            warn!("[MQTT] Invalid UTF-8 payload on {}: {}", publish.topic, e);
                            continue;
                        }
                    };
                    debug!("[MQTT] Received on {}: {}", publish.topic, payload);
                    BusEvent::Message(BusMessage {
                        topic: publish.topic,
                        payload,
                    })
                }
                Ok(_) => continue,
                Err(e) => {
                    error!("[MQTT] Connection error: {:?}", e);
                    // Wait before reconnecting
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(Duration::from_secs(5)) => continue,
                    }
                }
            };

            if tx.send(forwarded).await.is_err() {
                error!("[MQTT] Event channel closed");
                break;
            }
        }

        info!("[MQTT] Event loop stopped");
    }
}

/// [`BusClient`] backed by a rumqttc request queue.
///
/// Uses the non-blocking `try_*` calls: a full request queue or a dead event
/// loop surfaces as `BusUnavailable` instead of stalling the caller.
#[derive(Clone)]
pub struct MqttBus {
    client: AsyncClient,
}

impl BusClient for MqttBus {
    fn publish(&self, topic: &str, payload: &str) -> Result<(), TranslateError> {
        debug!("[MQTT] Publishing to {}: {}", topic, payload);
        self.client
            .try_publish(topic, QoS::AtLeastOnce, false, payload.as_bytes().to_vec())
            .map_err(|e| TranslateError::BusUnavailable(e.to_string()))
    }

    fn subscribe(&self, pattern: &str) -> Result<(), TranslateError> {
        info!("[MQTT] Subscribing to {}", pattern);
        self.client
            .try_subscribe(pattern, QoS::AtLeastOnce)
            .map_err(|e| TranslateError::BusUnavailable(e.to_string()))
    }
}
