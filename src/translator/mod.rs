//! Cluster translators: Matter requests in, UCL messages out, and back.
//!
//! One [`CommandTranslator`] exists per supported cluster family. A concrete
//! translator only supplies its mapping tables and any payload shaping; the
//! request flow (resolve, publish, register a reply) is shared and lives in
//! the provided trait methods below.
//!
//! Nothing here ever waits for the bus. A request that expects a reply
//! returns `Invocation::Pending` and is finished later through
//! [`PendingRequests`].

mod cache;
mod dispatcher;
mod groups;
mod identify;
mod level_control;
mod on_off;
mod pending;
mod thermostat;

#[cfg(test)]
pub(crate) mod test_support;

pub use cache::AttributeCache;
pub use dispatcher::Dispatcher;
pub use groups::GroupsTranslator;
pub use identify::IdentifyTranslator;
pub use level_control::LevelControlTranslator;
pub use on_off::OnOffTranslator;
pub use pending::{CompletionHandle, PendingRequests, RequestOrigin};
pub use thermostat::ThermostatTranslator;

use crate::bus::{BusClient, BusTopic, DeviceAddress, TopicScheme};
use crate::error::TranslateError;
use crate::matter::{
    AttributeId, AttributeKind, AttributeValue, AttributeWrite, CommandId, CommandPayload,
    CommandReply, EndpointId, GroupId, HandlerContext, KnownCluster, Operation, PayloadFields,
};
use crate::node_state::NodeStateMonitor;
use log::debug;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Collaborators every translator talks to.
#[derive(Clone)]
pub struct TranslatorLinks {
    pub node_state: Arc<dyn NodeStateMonitor>,
    pub bus: Arc<dyn BusClient>,
    pub topics: TopicScheme,
}

impl TranslatorLinks {
    pub fn new(
        node_state: Arc<dyn NodeStateMonitor>,
        bus: Arc<dyn BusClient>,
        topics: TopicScheme,
    ) -> Self {
        Self {
            node_state,
            bus,
            topics,
        }
    }
}

/// Where a command is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The device backing the request's endpoint.
    Device,
    /// The group named by the command's `GroupID` field. No endpoint
    /// resolution, no reply.
    Group,
}

/// What confirms a device command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Fire-and-forget.
    None,
    /// A report of this attribute.
    Attribute(&'static str),
    /// This generated (response) command.
    Response(&'static str),
}

/// One row of a cluster's command table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandMapping {
    /// UCL command name.
    pub name: &'static str,
    pub target: Target,
    pub reply: Reply,
}

impl CommandMapping {
    pub const fn device(name: &'static str, reply: Reply) -> Self {
        Self {
            name,
            target: Target::Device,
            reply,
        }
    }

    pub const fn group(name: &'static str) -> Self {
        Self {
            name,
            target: Target::Group,
            reply: Reply::None,
        }
    }
}

/// One row of a cluster's attribute table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeMapping {
    pub id: AttributeId,
    /// UCL attribute name.
    pub name: &'static str,
    pub kind: AttributeKind,
    pub writable: bool,
}

/// Immediate result of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    /// Published, nothing to wait for.
    Sent,
    /// Published; the outcome arrives later through the protocol sink.
    Pending(CompletionHandle),
}

/// A decoded inbound bus message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Report {
        /// None when the reporting device is not mapped (or not attached).
        endpoint: Option<EndpointId>,
        attribute: AttributeId,
        value: AttributeValue,
    },
    Reply(CommandReply),
}

/// Translation contract for one cluster family.
pub trait CommandTranslator: Send + Sync + 'static {
    fn cluster(&self) -> KnownCluster;

    fn links(&self) -> &TranslatorLinks;

    /// Command table lookup.
    fn command(&self, command: CommandId) -> Option<CommandMapping>;

    /// Attribute table lookup by Matter id.
    fn attribute(&self, attribute: AttributeId) -> Option<AttributeMapping>;

    /// Attribute table lookup by UCL name.
    fn attribute_named(&self, name: &str) -> Option<AttributeMapping>;

    /// Shape decoded command fields into the UCL payload.
    fn command_payload(
        &self,
        _command: CommandId,
        fields: &CommandPayload,
    ) -> Result<Value, TranslateError> {
        Ok(Value::Object(fields.clone()))
    }

    /// Reply expected for this particular request.
    fn reply_for(&self, mapping: &CommandMapping, _fields: &CommandPayload) -> Reply {
        mapping.reply
    }

    /// Validate a value before it is written to the device.
    fn check_write(
        &self,
        mapping: &AttributeMapping,
        value: &AttributeValue,
    ) -> Result<(), TranslateError> {
        value.check(mapping.kind)
    }

    /// Translate and publish one endpoint-addressed command.
    fn invoke(
        &self,
        ctx: &HandlerContext,
        pending: &PendingRequests,
    ) -> Result<Invocation, TranslateError> {
        let cluster = self.cluster();
        let mapping = self
            .command(ctx.command)
            .ok_or(TranslateError::UnsupportedCommand {
                cluster: cluster.id(),
                command: ctx.command,
            })?;

        if mapping.target == Target::Group {
            let group = group_field(&ctx.payload)?;
            self.invoke_group(group, ctx.command, &ctx.payload)?;
            return Ok(Invocation::Sent);
        }

        let links = self.links();
        let address = links
            .node_state
            .resolve_endpoint(ctx.endpoint)
            .ok_or(TranslateError::DeviceUnavailable(ctx.endpoint))?;
        let payload = self.command_payload(ctx.command, &ctx.payload)?;

        let topic = links
            .topics
            .device_command(&address, cluster.bus_name(), mapping.name);
        let reply_topic = match self.reply_for(&mapping, &ctx.payload) {
            Reply::None => None,
            Reply::Attribute(attribute) => Some(links.topics.attribute_reported(
                &address,
                cluster.bus_name(),
                attribute,
            )),
            Reply::Response(command) => Some(links.topics.generated_command(
                &address,
                cluster.bus_name(),
                command,
            )),
        };

        let origin = RequestOrigin {
            endpoint: ctx.endpoint,
            cluster: cluster.id(),
            operation: Operation::Invoke(ctx.command),
        };
        send(links, pending, &address, &topic, &payload, reply_topic, origin)
    }

    /// Translate and publish a group-cast command. Never tracked.
    fn invoke_group(
        &self,
        group: GroupId,
        command: CommandId,
        fields: &CommandPayload,
    ) -> Result<(), TranslateError> {
        let cluster = self.cluster();
        let mapping = self
            .command(command)
            .ok_or(TranslateError::UnsupportedCommand {
                cluster: cluster.id(),
                command,
            })?;
        let payload = self.command_payload(command, fields)?;

        let links = self.links();
        let topic = links
            .topics
            .group_command(group, cluster.bus_name(), mapping.name);
        links.bus.publish(&topic, &payload.to_string())?;
        debug!("[Bridge] Group {} {} {} sent", group, cluster.bus_name(), mapping.name);
        Ok(())
    }

    /// Translate and publish one attribute write.
    fn write_attribute(
        &self,
        write: &AttributeWrite,
        pending: &PendingRequests,
    ) -> Result<Invocation, TranslateError> {
        let cluster = self.cluster();
        let mapping = self
            .attribute(write.attribute)
            .ok_or(TranslateError::UnsupportedAttribute {
                cluster: cluster.id(),
                attribute: write.attribute.0,
            })?;
        if !mapping.writable {
            return Err(TranslateError::ReadOnlyAttribute {
                cluster: cluster.id(),
                attribute: write.attribute.0,
            });
        }
        self.check_write(&mapping, &write.value)?;

        let links = self.links();
        let address = links
            .node_state
            .resolve_endpoint(write.endpoint)
            .ok_or(TranslateError::DeviceUnavailable(write.endpoint))?;

        let mut body = Map::new();
        body.insert(mapping.name.to_string(), write.value.to_json());
        let topic = links.topics.write_attributes(&address, cluster.bus_name());
        let reply_topic = links
            .topics
            .attribute_reported(&address, cluster.bus_name(), mapping.name);

        let origin = RequestOrigin {
            endpoint: write.endpoint,
            cluster: cluster.id(),
            operation: Operation::Write(write.attribute),
        };
        send(
            links,
            pending,
            &address,
            &topic,
            &Value::Object(body),
            Some(reply_topic),
            origin,
        )
    }

    /// Decode an inbound report or response for this cluster.
    fn decode_bus_message(&self, topic: &BusTopic, payload: &str) -> Result<Inbound, TranslateError> {
        match topic {
            BusTopic::Reported {
                address, attribute, ..
            } => {
                let mapping = self.attribute_named(attribute).ok_or_else(|| {
                    TranslateError::InvalidPayload(format!("unknown attribute {attribute}"))
                })?;
                let value = AttributeValue::from_json(mapping.kind, &reported_value(payload)?)?;
                Ok(Inbound::Report {
                    endpoint: self.links().node_state.endpoint_for(address),
                    attribute: mapping.id,
                    value,
                })
            }
            BusTopic::Generated { command, .. } => {
                let fields: Value = serde_json::from_str(payload)
                    .map_err(|e| TranslateError::InvalidPayload(e.to_string()))?;
                Ok(Inbound::Reply(CommandReply::Response {
                    command: command.clone(),
                    fields,
                }))
            }
            _ => Err(TranslateError::InvalidPayload(
                "not a cluster topic".to_string(),
            )),
        }
    }

    /// Topic patterns to subscribe for this cluster.
    fn subscriptions(&self) -> Vec<String> {
        self.links()
            .topics
            .cluster_subscriptions(self.cluster().bus_name())
    }
}

/// Publish, registering the reply first when one is expected.
fn send(
    links: &TranslatorLinks,
    pending: &PendingRequests,
    address: &DeviceAddress,
    topic: &str,
    payload: &Value,
    reply_topic: Option<String>,
    origin: RequestOrigin,
) -> Result<Invocation, TranslateError> {
    let Some(reply_topic) = reply_topic else {
        links.bus.publish(topic, &payload.to_string())?;
        return Ok(Invocation::Sent);
    };

    // Register before publishing: the reply may beat us back otherwise
    let endpoint = origin.endpoint;
    let handle = pending.register(reply_topic.clone(), &address.unid, origin)?;

    // A detach handled since resolution found nothing to fail
    if links.node_state.resolve_endpoint(endpoint).as_ref() != Some(address) {
        pending.discard(&reply_topic, handle);
        return Err(TranslateError::DeviceUnavailable(endpoint));
    }
    if let Err(e) = links.bus.publish(topic, &payload.to_string()) {
        pending.discard(&reply_topic, handle);
        return Err(e);
    }
    Ok(Invocation::Pending(handle))
}

fn group_field(fields: &CommandPayload) -> Result<GroupId, TranslateError> {
    let group = fields.unsigned_field("GroupID", u16::MAX as u64)?;
    Ok(GroupId(group as u16))
}

/// Extract `value` from a UCL `{"value": ...}` report.
fn reported_value(payload: &str) -> Result<Value, TranslateError> {
    let mut report: Map<String, Value> = serde_json::from_str(payload)
        .map_err(|e| TranslateError::InvalidPayload(e.to_string()))?;
    report
        .remove("value")
        .ok_or_else(|| TranslateError::InvalidPayload("report without value".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matter::ClusterId;
    use crate::node_state::NodeStateEvent;
    use crate::translator::test_support::{D1, D1_ENDPOINT, RecordingBus, RecordingSink};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::broadcast;

    /// Resolves a fixed number of times, then behaves as if the node left.
    struct DetachingMonitor {
        address: DeviceAddress,
        lookups_left: AtomicUsize,
        events: broadcast::Sender<NodeStateEvent>,
    }

    impl DetachingMonitor {
        fn new(lookups: usize) -> Self {
            let (events, _) = broadcast::channel(4);
            Self {
                address: DeviceAddress::new(D1, 1),
                lookups_left: AtomicUsize::new(lookups),
                events,
            }
        }
    }

    impl NodeStateMonitor for DetachingMonitor {
        fn resolve_endpoint(&self, endpoint: EndpointId) -> Option<DeviceAddress> {
            let online = self
                .lookups_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            (online && endpoint == D1_ENDPOINT).then(|| self.address.clone())
        }

        fn endpoint_for(&self, _address: &DeviceAddress) -> Option<EndpointId> {
            None
        }

        fn subscribe(&self) -> broadcast::Receiver<NodeStateEvent> {
            self.events.subscribe()
        }
    }

    #[test]
    fn test_detach_during_invoke_is_not_left_pending() {
        let bus = Arc::new(RecordingBus::default());
        let sink = Arc::new(RecordingSink::default());
        let links = TranslatorLinks::new(
            Arc::new(DetachingMonitor::new(1)),
            bus.clone(),
            TopicScheme::default(),
        );
        let translator = OnOffTranslator::new(links);
        let pending = PendingRequests::new(Duration::from_secs(5), sink.clone());
        let ctx = HandlerContext::new(D1_ENDPOINT, ClusterId::ON_OFF, CommandId(0x01));

        assert_eq!(
            translator.invoke(&ctx, &pending),
            Err(TranslateError::DeviceUnavailable(D1_ENDPOINT))
        );
        assert!(pending.is_empty());
        assert!(bus.published().is_empty());
        assert!(sink.completions().is_empty());
    }

    #[test]
    fn test_detach_during_write_is_not_left_pending() {
        let bus = Arc::new(RecordingBus::default());
        let links = TranslatorLinks::new(
            Arc::new(DetachingMonitor::new(1)),
            bus.clone(),
            TopicScheme::default(),
        );
        let translator = OnOffTranslator::new(links);
        let pending = PendingRequests::new(
            Duration::from_secs(5),
            Arc::new(RecordingSink::default()),
        );
        let write = AttributeWrite {
            endpoint: D1_ENDPOINT,
            cluster: ClusterId::ON_OFF,
            attribute: AttributeId(0x4001),
            value: AttributeValue::Unsigned(60),
        };

        assert_eq!(
            translator.write_attribute(&write, &pending),
            Err(TranslateError::DeviceUnavailable(D1_ENDPOINT))
        );
        assert!(pending.is_empty());
        assert!(bus.published().is_empty());
    }

    #[test]
    fn test_stable_node_still_registers() {
        let bus = Arc::new(RecordingBus::default());
        let links = TranslatorLinks::new(
            Arc::new(DetachingMonitor::new(2)),
            bus.clone(),
            TopicScheme::default(),
        );
        let translator = OnOffTranslator::new(links);
        let pending = PendingRequests::new(
            Duration::from_secs(5),
            Arc::new(RecordingSink::default()),
        );
        let ctx = HandlerContext::new(D1_ENDPOINT, ClusterId::ON_OFF, CommandId(0x01));

        assert!(matches!(
            translator.invoke(&ctx, &pending),
            Ok(Invocation::Pending(_))
        ));
        assert_eq!(pending.len(), 1);
        assert_eq!(bus.published().len(), 1);
    }

    #[test]
    fn test_reported_value() {
        assert_eq!(reported_value(r#"{"value": 21}"#), Ok(Value::from(21)));
        assert!(reported_value(r#"{"other": 21}"#).is_err());
        assert!(reported_value("").is_err());
    }

    #[test]
    fn test_group_field() {
        let mut fields = CommandPayload::new();
        fields.insert("GroupID".to_string(), Value::from(0x1234));
        assert_eq!(group_field(&fields), Ok(GroupId(0x1234)));

        fields.insert("GroupID".to_string(), Value::from(0x1_0000));
        assert!(group_field(&fields).is_err());
    }
}
