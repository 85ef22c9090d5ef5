//! Message bus side of the bridge: UCL topics over MQTT.
//!
//! The translators only see the [`BusClient`] trait. Inbound traffic is
//! delivered by the MQTT event loop task as [`BusEvent`]s over a channel.

mod client;
mod topic;

pub use client::{MqttBus, MqttClient};
pub use topic::{BusTopic, DEFAULT_PREFIX, DeviceAddress, TopicScheme};

use crate::error::TranslateError;

/// Message received from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub topic: String,
    pub payload: String,
}

/// Events produced by the bus event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// (Re)connected to the broker; subscriptions must be renewed.
    Connected,
    Message(BusMessage),
}

/// Publish/subscribe access to the bus.
///
/// Both calls must return without waiting for the broker. A transport-level
/// failure is reported as [`TranslateError::BusUnavailable`].
pub trait BusClient: Send + Sync + 'static {
    fn publish(&self, topic: &str, payload: &str) -> Result<(), TranslateError>;

    fn subscribe(&self, pattern: &str) -> Result<(), TranslateError>;
}
