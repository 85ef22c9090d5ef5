//! In-memory collaborators for translator tests.

use super::TranslatorLinks;
use crate::bus::{BusClient, DeviceAddress, TopicScheme};
use crate::error::TranslateError;
use crate::matter::{AttributeUpdate, CommandCompletion, EndpointId, ProtocolEvent, ProtocolSink};
use crate::node_state::{NodeStateEvent, NodeStateMonitor};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

/// Bus that records every publish.
#[derive(Default)]
pub struct RecordingBus {
    published: Mutex<Vec<(String, String)>>,
    subscribed: Mutex<Vec<String>>,
    offline: AtomicBool,
}

impl RecordingBus {
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().clone()
    }

    pub fn subscribed(&self) -> Vec<String> {
        self.subscribed.lock().clone()
    }

    /// Payload of the only publish so far, parsed.
    pub fn last_json(&self) -> serde_json::Value {
        let published = self.published.lock();
        let (_, payload) = published.last().expect("nothing published");
        serde_json::from_str(payload).expect("payload is not JSON")
    }
}

impl BusClient for RecordingBus {
    fn publish(&self, topic: &str, payload: &str) -> Result<(), TranslateError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(TranslateError::BusUnavailable("broker offline".to_string()));
        }
        self.published
            .lock()
            .push((topic.to_string(), payload.to_string()));
        Ok(())
    }

    fn subscribe(&self, pattern: &str) -> Result<(), TranslateError> {
        self.subscribed.lock().push(pattern.to_string());
        Ok(())
    }
}

/// Fixed endpoint map with manual attach/detach.
pub struct StaticMonitor {
    devices: Mutex<HashMap<EndpointId, DeviceAddress>>,
    events: broadcast::Sender<NodeStateEvent>,
}

impl Default for StaticMonitor {
    fn default() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            devices: Mutex::new(HashMap::new()),
            events,
        }
    }
}

impl StaticMonitor {
    pub fn attach(&self, endpoint: EndpointId, address: DeviceAddress) {
        let unid = address.unid.clone();
        self.devices.lock().insert(endpoint, address);
        let _ = self.events.send(NodeStateEvent::Attached {
            unid,
            endpoints: vec![endpoint],
        });
    }

    /// Detach every endpoint of `unid`, returning the event sent.
    pub fn detach(&self, unid: &str) -> NodeStateEvent {
        let mut devices = self.devices.lock();
        let endpoints: Vec<EndpointId> = devices
            .iter()
            .filter(|(_, address)| address.unid == unid)
            .map(|(endpoint, _)| *endpoint)
            .collect();
        devices.retain(|_, address| address.unid != unid);

        let event = NodeStateEvent::Detached {
            unid: unid.to_string(),
            endpoints,
        };
        let _ = self.events.send(event.clone());
        event
    }
}

impl NodeStateMonitor for StaticMonitor {
    fn resolve_endpoint(&self, endpoint: EndpointId) -> Option<DeviceAddress> {
        self.devices.lock().get(&endpoint).cloned()
    }

    fn endpoint_for(&self, address: &DeviceAddress) -> Option<EndpointId> {
        self.devices
            .lock()
            .iter()
            .find(|(_, a)| *a == address)
            .map(|(endpoint, _)| *endpoint)
    }

    fn subscribe(&self) -> broadcast::Receiver<NodeStateEvent> {
        self.events.subscribe()
    }
}

/// Sink that records everything delivered to it, in order.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ProtocolEvent>>,
}

impl RecordingSink {
    pub fn completions(&self) -> Vec<CommandCompletion> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                ProtocolEvent::Completed(c) => Some(c.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn updates(&self) -> Vec<AttributeUpdate> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                ProtocolEvent::AttributeUpdated(u) => Some(u.clone()),
                _ => None,
            })
            .collect()
    }
}

impl ProtocolSink for RecordingSink {
    fn command_completed(&self, completion: CommandCompletion) {
        self.events.lock().push(ProtocolEvent::Completed(completion));
    }

    fn attribute_updated(&self, update: AttributeUpdate) {
        self.events
            .lock()
            .push(ProtocolEvent::AttributeUpdated(update));
    }
}

/// Links to a [`StaticMonitor`] with `zw-D1/ep1` attached as Matter ep2.
pub struct Fixture {
    pub bus: Arc<RecordingBus>,
    pub monitor: Arc<StaticMonitor>,
    pub links: TranslatorLinks,
}

pub const D1: &str = "zw-D1";
pub const D1_ENDPOINT: EndpointId = EndpointId(2);

impl Fixture {
    pub fn new() -> Self {
        let bus = Arc::new(RecordingBus::default());
        let monitor = Arc::new(StaticMonitor::default());
        monitor.attach(D1_ENDPOINT, DeviceAddress::new(D1, 1));
        let links = TranslatorLinks::new(monitor.clone(), bus.clone(), TopicScheme::default());
        Self {
            bus,
            monitor,
            links,
        }
    }
}
