//! Routes protocol requests to the translator registered for their cluster,
//! and inbound bus traffic back to the protocol stack.

use super::{AttributeCache, CommandTranslator, Inbound, Invocation, PendingRequests};
use crate::bus::{BusMessage, BusTopic, TopicScheme};
use crate::error::{BridgeError, TranslateError};
use crate::matter::{
    AttributeId, AttributeUpdate, AttributeValue, AttributeWrite, ClusterId, CommandId,
    CommandPayload, CommandReply, EndpointId, GroupId, HandlerContext, KnownCluster,
    ProtocolSink,
};
use crate::node_state::{NodeStateEvent, NodeStateMonitor};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct Dispatcher {
    translators: HashMap<ClusterId, Arc<dyn CommandTranslator>>,
    topics: TopicScheme,
    pending: PendingRequests,
    cache: AttributeCache,
    sink: Arc<dyn ProtocolSink>,
}

impl Dispatcher {
    pub fn new(topics: TopicScheme, sink: Arc<dyn ProtocolSink>, reply_timeout: Duration) -> Self {
        Self {
            translators: HashMap::new(),
            topics,
            pending: PendingRequests::new(reply_timeout, sink.clone()),
            cache: AttributeCache::default(),
            sink,
        }
    }

    /// Bind a translator to its cluster. Each cluster takes one translator.
    pub fn register(&mut self, translator: Arc<dyn CommandTranslator>) -> crate::error::Result<()> {
        let cluster = translator.cluster().id();
        if self.translators.contains_key(&cluster) {
            return Err(BridgeError::DuplicateTranslator(cluster));
        }
        info!("[Bridge] Registered translator for {}", cluster);
        self.translators.insert(cluster, translator);
        Ok(())
    }

    fn translator(&self, cluster: ClusterId) -> Result<&Arc<dyn CommandTranslator>, TranslateError> {
        self.translators
            .get(&cluster)
            .ok_or(TranslateError::UnsupportedCluster(cluster))
    }

    /// Invoke a command on one endpoint.
    pub fn dispatch(&self, ctx: &HandlerContext) -> Result<Invocation, TranslateError> {
        let result = self
            .translator(ctx.cluster)
            .and_then(|translator| translator.invoke(ctx, &self.pending));
        if let Err(e) = &result {
            debug!(
                "[Bridge] {} {} command {} rejected: {}",
                ctx.endpoint, ctx.cluster, ctx.command, e
            );
        }
        result
    }

    /// Invoke a command on a group. Group commands are never tracked.
    pub fn dispatch_group(
        &self,
        group: GroupId,
        cluster: ClusterId,
        command: CommandId,
        payload: &CommandPayload,
    ) -> Result<(), TranslateError> {
        self.translator(cluster)?
            .invoke_group(group, command, payload)
    }

    pub fn write_attribute(&self, write: &AttributeWrite) -> Result<Invocation, TranslateError> {
        self.translator(write.cluster)?
            .write_attribute(write, &self.pending)
    }

    /// Last reported value, or None before the first report.
    pub fn read_attribute(
        &self,
        endpoint: EndpointId,
        cluster: ClusterId,
        attribute: AttributeId,
    ) -> Result<Option<AttributeValue>, TranslateError> {
        let translator = self.translator(cluster)?;
        if translator.attribute(attribute).is_none() {
            return Err(TranslateError::UnsupportedAttribute {
                cluster,
                attribute: attribute.0,
            });
        }
        if translator.links().node_state.resolve_endpoint(endpoint).is_none() {
            return Err(TranslateError::DeviceUnavailable(endpoint));
        }
        Ok(self.cache.get(endpoint, cluster, attribute))
    }

    /// Handle one inbound bus message.
    pub fn on_bus_message(&self, message: &BusMessage) {
        let Some(topic) = self.topics.parse(&message.topic) else {
            debug!("[Bridge] Ignoring {}", message.topic);
            return;
        };
        let cluster = match &topic {
            BusTopic::Reported { cluster, .. } | BusTopic::Generated { cluster, .. } => cluster,
            _ => return,
        };
        let Some(translator) = KnownCluster::from_bus_name(cluster)
            .and_then(|known| self.translators.get(&known.id()))
        else {
            debug!("[Bridge] No translator for {}", message.topic);
            return;
        };

        let inbound = match translator.decode_bus_message(&topic, &message.payload) {
            Ok(inbound) => inbound,
            Err(e) => {
                warn!("[Bridge] Dropping message on {}: {}", message.topic, e);
                return;
            }
        };

        match inbound {
            Inbound::Report {
                endpoint,
                attribute,
                value,
            } => {
                self.pending
                    .complete(&message.topic, CommandReply::Attribute(value.clone()));

                let Some(endpoint) = endpoint else {
                    debug!("[Bridge] Report from unmapped device on {}", message.topic);
                    return;
                };
                let cluster = translator.cluster().id();
                self.cache.store(endpoint, cluster, attribute, value.clone());
                self.sink.attribute_updated(AttributeUpdate {
                    endpoint,
                    cluster,
                    attribute,
                    value,
                });
            }
            Inbound::Reply(reply) => {
                if !self.pending.complete(&message.topic, reply) {
                    warn!("[Bridge] Unmatched reply on {}, dropped", message.topic);
                }
            }
        }
    }

    /// React to a device attaching or detaching.
    pub fn on_node_event(&self, event: &NodeStateEvent) {
        if let NodeStateEvent::Detached { unid, endpoints } = event {
            let failed = self.pending.fail_device(unid);
            if failed > 0 {
                info!("[Bridge] {} pending request(s) failed: {} detached", failed, unid);
            }
            self.cache.forget(endpoints);
        }
    }

    /// Fail pending requests for devices `monitor` no longer resolves.
    pub fn reconcile(&self, monitor: &dyn NodeStateMonitor) -> usize {
        let failed = self.pending.fail_unreachable(monitor);
        if failed > 0 {
            info!("[Bridge] {} pending request(s) failed on reconcile", failed);
        }
        failed
    }

    /// Time out every request past its deadline.
    pub fn expire_pending(&self, now: Instant) -> usize {
        self.pending.expire(now)
    }

    /// Every topic pattern the registered translators need.
    pub fn subscriptions(&self) -> Vec<String> {
        let mut patterns: Vec<String> = self
            .translators
            .values()
            .flat_map(|translator| translator.subscriptions())
            .collect();
        patterns.sort();
        patterns.dedup();
        patterns
    }

    pub fn pending(&self) -> &PendingRequests {
        &self.pending
    }
}
