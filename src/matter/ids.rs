//! Identifiers of the Matter data model as seen by the bridge.
//!
//! The bridge never encodes Matter TLV itself; it only needs stable ids to
//! route requests and name things on the bus.

use std::fmt;
use strum::{FromRepr, IntoStaticStr};

/// Matter cluster id (32 bit, e.g. 0x0006 for OnOff).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterId(pub u32);

impl ClusterId {
    pub const IDENTIFY: ClusterId = ClusterId(KnownCluster::Identify as u32);
    pub const GROUPS: ClusterId = ClusterId(KnownCluster::Groups as u32);
    pub const ON_OFF: ClusterId = ClusterId(KnownCluster::OnOff as u32);
    pub const LEVEL_CONTROL: ClusterId = ClusterId(KnownCluster::LevelControl as u32);
    pub const THERMOSTAT: ClusterId = ClusterId(KnownCluster::Thermostat as u32);

    /// The cluster family, if the bridge knows it.
    pub fn known(self) -> Option<KnownCluster> {
        KnownCluster::from_repr(self.0)
    }

    /// Cluster name used in UCL topics.
    pub fn bus_name(self) -> Option<&'static str> {
        self.known().map(KnownCluster::bus_name)
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bus_name() {
            Some(name) => f.write_str(name),
            None => write!(f, "0x{:04X}", self.0),
        }
    }
}

/// Cluster families with a translator in this crate.
///
/// The variant name doubles as the UCL cluster name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, IntoStaticStr)]
#[repr(u32)]
pub enum KnownCluster {
    Identify = 0x0003,
    Groups = 0x0004,
    OnOff = 0x0006,
    LevelControl = 0x0008,
    Thermostat = 0x0201,
}

impl KnownCluster {
    pub fn bus_name(self) -> &'static str {
        self.into()
    }

    /// Reverse lookup from a UCL topic segment.
    pub fn from_bus_name(name: &str) -> Option<Self> {
        [
            KnownCluster::Identify,
            KnownCluster::Groups,
            KnownCluster::OnOff,
            KnownCluster::LevelControl,
            KnownCluster::Thermostat,
        ]
        .into_iter()
        .find(|cluster| cluster.bus_name() == name)
    }

    pub fn id(self) -> ClusterId {
        ClusterId(self as u32)
    }
}

/// Matter endpoint number exposed by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointId(pub u16);

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ep{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandId(pub u32);

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeId(pub u32);

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

/// Matter group id (group-cast target).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(pub u16);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
