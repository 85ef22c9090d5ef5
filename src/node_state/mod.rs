//! Live mapping between Matter endpoints and bus devices.
//!
//! The translators only read from a [`NodeStateMonitor`]. The concrete
//! [`UnifyNodeMonitor`] learns the mapping from UCL node state traffic.

mod monitor;

pub use monitor::UnifyNodeMonitor;

use crate::bus::DeviceAddress;
use crate::matter::EndpointId;
use tokio::sync::broadcast;

/// Change notification published by a monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeStateEvent {
    /// The device came online; these endpoints now resolve.
    Attached {
        unid: String,
        endpoints: Vec<EndpointId>,
    },
    /// The device left the bus; these endpoints no longer resolve.
    Detached {
        unid: String,
        endpoints: Vec<EndpointId>,
    },
}

pub trait NodeStateMonitor: Send + Sync + 'static {
    /// Bus device currently backing `endpoint`, if it is attached.
    fn resolve_endpoint(&self, endpoint: EndpointId) -> Option<DeviceAddress>;

    /// Reverse of [`resolve_endpoint`](Self::resolve_endpoint), used to
    /// attribute inbound reports.
    fn endpoint_for(&self, address: &DeviceAddress) -> Option<EndpointId>;

    /// Subscribe to attach/detach notifications.
    fn subscribe(&self) -> broadcast::Receiver<NodeStateEvent>;
}
