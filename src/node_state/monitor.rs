//! Node state monitor fed by UCL `State` and `SupportedCommands` topics.
//!
//! Matter endpoint numbers are handed out on first sight of a bus endpoint
//! and never reused for another device during the process lifetime, so a
//! device that drops off and comes back keeps its endpoints.

use super::{NodeStateEvent, NodeStateMonitor};
use crate::bus::{BusMessage, BusTopic, DeviceAddress, TopicScheme};
use crate::matter::EndpointId;
use log::{debug, error, info, warn};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::broadcast;

/// `P/by-unid/{unid}/State` payload (only the fields we use).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NodeStatePayload {
    #[serde(default)]
    network_status: Option<String>,
}

#[derive(Debug, Default)]
struct NodeRecord {
    online: bool,
    /// Bus endpoint -> Matter endpoint.
    endpoints: BTreeMap<u16, EndpointId>,
}

#[derive(Debug)]
struct EndpointMap {
    nodes: HashMap<String, NodeRecord>,
    by_endpoint: HashMap<EndpointId, DeviceAddress>,
    next_endpoint: Option<u16>,
}

pub struct UnifyNodeMonitor {
    topics: TopicScheme,
    map: RwLock<EndpointMap>,
    events: broadcast::Sender<NodeStateEvent>,
}

impl UnifyNodeMonitor {
    /// Create a monitor allocating Matter endpoints from `first_endpoint` up.
    pub fn new(topics: TopicScheme, first_endpoint: u16) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            topics,
            map: RwLock::new(EndpointMap {
                nodes: HashMap::new(),
                by_endpoint: HashMap::new(),
                next_endpoint: Some(first_endpoint),
            }),
            events,
        }
    }

    /// Topic patterns the monitor needs.
    pub fn subscriptions(&self) -> Vec<String> {
        self.topics.node_subscriptions()
    }

    /// Record a bus endpoint, returning its Matter endpoint.
    ///
    /// If the node is already online the new endpoint is announced with an
    /// `Attached` event.
    pub fn register_endpoint(&self, address: &DeviceAddress) -> Option<EndpointId> {
        let (endpoint, announce) = {
            let mut map = self.map.write();
            let next = map.next_endpoint;
            let node = map.nodes.entry(address.unid.clone()).or_default();

            if let Some(existing) = node.endpoints.get(&address.endpoint) {
                return Some(*existing);
            }

            let Some(allocated) = next else {
                error!("[Node] Matter endpoint space exhausted, ignoring {}", address);
                return None;
            };
            let endpoint = EndpointId(allocated);
            node.endpoints.insert(address.endpoint, endpoint);
            let announce = node.online;

            map.next_endpoint = allocated.checked_add(1);
            map.by_endpoint.insert(endpoint, address.clone());
            (endpoint, announce)
        };

        info!("[Node] {} mapped to Matter {}", address, endpoint);
        if announce {
            self.notify(NodeStateEvent::Attached {
                unid: address.unid.clone(),
                endpoints: vec![endpoint],
            });
        }
        Some(endpoint)
    }

    /// Mark a node online. No-op if it already is.
    pub fn attach(&self, unid: &str) {
        let endpoints = {
            let mut map = self.map.write();
            let node = map.nodes.entry(unid.to_string()).or_default();
            if node.online {
                return;
            }
            node.online = true;
            node.endpoints.values().copied().collect::<Vec<_>>()
        };

        info!("[Node] {} attached ({} endpoint(s))", unid, endpoints.len());
        self.notify(NodeStateEvent::Attached {
            unid: unid.to_string(),
            endpoints,
        });
    }

    /// Mark a node offline. No-op if it is not online.
    pub fn detach(&self, unid: &str) {
        let endpoints = {
            let mut map = self.map.write();
            let Some(node) = map.nodes.get_mut(unid) else {
                return;
            };
            if !node.online {
                return;
            }
            node.online = false;
            node.endpoints.values().copied().collect::<Vec<_>>()
        };

        info!("[Node] {} detached", unid);
        self.notify(NodeStateEvent::Detached {
            unid: unid.to_string(),
            endpoints,
        });
    }

    /// Feed one bus message. Returns true if it was node state traffic.
    pub fn handle_message(&self, message: &BusMessage) -> bool {
        match self.topics.parse(&message.topic) {
            Some(BusTopic::NodeState { unid }) => {
                self.handle_state(&unid, &message.payload);
                true
            }
            Some(BusTopic::SupportedCommands { address, .. }) => {
                self.register_endpoint(&address);
                true
            }
            _ => false,
        }
    }

    fn handle_state(&self, unid: &str, payload: &str) {
        // An empty payload clears the retained state: the node is gone.
        if payload.trim().is_empty() {
            self.detach(unid);
            return;
        }

        let state = match serde_json::from_str::<NodeStatePayload>(payload) {
            Ok(state) => state,
            Err(e) => {
                warn!("[Node] Failed to parse state of {}: {}", unid, e);
                return;
            }
        };

        match state.network_status.as_deref() {
            Some(status) if status.starts_with("Online") => self.attach(unid),
            Some(status) => {
                debug!("[Node] {} network status: {}", unid, status);
                self.detach(unid);
            }
            None => debug!("[Node] {} state without NetworkStatus", unid),
        }
    }

    fn notify(&self, event: NodeStateEvent) {
        // No receivers is fine (nothing pending to invalidate)
        let _ = self.events.send(event);
    }
}

impl NodeStateMonitor for UnifyNodeMonitor {
    fn resolve_endpoint(&self, endpoint: EndpointId) -> Option<DeviceAddress> {
        let map = self.map.read();
        let address = map.by_endpoint.get(&endpoint)?;
        let online = map.nodes.get(&address.unid).is_some_and(|n| n.online);
        online.then(|| address.clone())
    }

    fn endpoint_for(&self, address: &DeviceAddress) -> Option<EndpointId> {
        let map = self.map.read();
        let node = map.nodes.get(&address.unid).filter(|n| n.online)?;
        node.endpoints.get(&address.endpoint).copied()
    }

    fn subscribe(&self) -> broadcast::Receiver<NodeStateEvent> {
        self.events.subscribe()
    }
}
