//! UCL topic grammar.
//!
//! With prefix `P` (default `ucl`):
//!
//! | purpose            | topic                                                        |
//! |--------------------|--------------------------------------------------------------|
//! | device command     | `P/by-unid/{unid}/ep{ep}/{Cluster}/Commands/{Command}`       |
//! | attribute write    | `P/by-unid/{unid}/ep{ep}/{Cluster}/Commands/WriteAttributes` |
//! | group command      | `P/by-group/{group}/{Cluster}/Commands/{Command}`            |
//! | attribute report   | `P/by-unid/{unid}/ep{ep}/{Cluster}/Attributes/{Attr}/Reported` |
//! | response command   | `P/by-unid/{unid}/ep{ep}/{Cluster}/GeneratedCommands/{Command}` |
//! | supported commands | `P/by-unid/{unid}/ep{ep}/{Cluster}/SupportedCommands`        |
//! | node state         | `P/by-unid/{unid}/State`                                     |
//!
//! Every topic is a pure function of its inputs.

use crate::matter::GroupId;
use std::fmt;

pub const DEFAULT_PREFIX: &str = "ucl";

/// Bus-side identity of one device endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceAddress {
    /// Unify unique id of the node (e.g. `zw-CAFECAFE-0004`).
    pub unid: String,
    /// Endpoint number on the bus side.
    pub endpoint: u16,
}

impl DeviceAddress {
    pub fn new(unid: impl Into<String>, endpoint: u16) -> Self {
        Self {
            unid: unid.into(),
            endpoint,
        }
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/ep{}", self.unid, self.endpoint)
    }
}

/// Inbound topic, parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusTopic {
    NodeState {
        unid: String,
    },
    Reported {
        address: DeviceAddress,
        cluster: String,
        attribute: String,
    },
    Generated {
        address: DeviceAddress,
        cluster: String,
        command: String,
    },
    SupportedCommands {
        address: DeviceAddress,
        cluster: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicScheme {
    prefix: String,
}

impl Default for TopicScheme {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl TopicScheme {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix: String = prefix.into();
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    fn device(&self, address: &DeviceAddress, cluster: &str) -> String {
        format!(
            "{}/by-unid/{}/ep{}/{}",
            self.prefix, address.unid, address.endpoint, cluster
        )
    }

    pub fn device_command(&self, address: &DeviceAddress, cluster: &str, command: &str) -> String {
        format!("{}/Commands/{}", self.device(address, cluster), command)
    }

    pub fn write_attributes(&self, address: &DeviceAddress, cluster: &str) -> String {
        self.device_command(address, cluster, "WriteAttributes")
    }

    pub fn group_command(&self, group: GroupId, cluster: &str, command: &str) -> String {
        format!(
            "{}/by-group/{}/{}/Commands/{}",
            self.prefix, group, cluster, command
        )
    }

    pub fn attribute_reported(
        &self,
        address: &DeviceAddress,
        cluster: &str,
        attribute: &str,
    ) -> String {
        format!(
            "{}/Attributes/{}/Reported",
            self.device(address, cluster),
            attribute
        )
    }

    pub fn generated_command(&self, address: &DeviceAddress, cluster: &str, command: &str) -> String {
        format!(
            "{}/GeneratedCommands/{}",
            self.device(address, cluster),
            command
        )
    }

    /// Patterns a translator for `cluster` needs to see.
    pub fn cluster_subscriptions(&self, cluster: &str) -> Vec<String> {
        vec![
            format!("{}/by-unid/+/+/{}/Attributes/+/Reported", self.prefix, cluster),
            format!("{}/by-unid/+/+/{}/GeneratedCommands/+", self.prefix, cluster),
        ]
    }

    /// Patterns the node state monitor needs to see.
    pub fn node_subscriptions(&self) -> Vec<String> {
        vec![
            format!("{}/by-unid/+/State", self.prefix),
            format!("{}/by-unid/+/+/+/SupportedCommands", self.prefix),
        ]
    }

    pub fn parse(&self, topic: &str) -> Option<BusTopic> {
        let rest = topic.strip_prefix(&self.prefix)?.strip_prefix("/by-unid/")?;
        let parts: Vec<&str> = rest.split('/').collect();

        match parts.as_slice() {
            [unid, "State"] if !unid.is_empty() => Some(BusTopic::NodeState {
                unid: unid.to_string(),
            }),
            [unid, ep, cluster, "Attributes", attribute, "Reported"] => Some(BusTopic::Reported {
                address: Self::address(unid, ep)?,
                cluster: cluster.to_string(),
                attribute: attribute.to_string(),
            }),
            [unid, ep, cluster, "GeneratedCommands", command] => Some(BusTopic::Generated {
                address: Self::address(unid, ep)?,
                cluster: cluster.to_string(),
                command: command.to_string(),
            }),
            [unid, ep, cluster, "SupportedCommands"] => Some(BusTopic::SupportedCommands {
                address: Self::address(unid, ep)?,
                cluster: cluster.to_string(),
            }),
            _ => None,
        }
    }

    fn address(unid: &str, ep: &str) -> Option<DeviceAddress> {
        if unid.is_empty() {
            return None;
        }
        let endpoint = ep.strip_prefix("ep")?.parse().ok()?;
        Some(DeviceAddress::new(unid, endpoint))
    }
}
