//! Callback surface back into the protocol stack.
//!
//! Completions and attribute updates are produced on the bridge loop, not on
//! the protocol stack's own processing context. Implementations must only
//! hand the value over (queue, signal) and return.

use super::context::AttributeValue;
use super::ids::{AttributeId, ClusterId, CommandId, EndpointId};
use crate::error::TranslateError;
use crate::translator::CompletionHandle;
use log::{info, warn};
use serde_json::Value;
use std::fmt;
use tokio::sync::mpsc;

/// Decoded reply carried by a completed request.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandReply {
    /// The device reported the attribute the command was expected to change.
    Attribute(AttributeValue),
    /// The device answered with a response command (fields as decoded JSON).
    Response { command: String, fields: Value },
}

/// What a pending request was doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Invoke(CommandId),
    Write(AttributeId),
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Invoke(command) => write!(f, "command {}", command),
            Operation::Write(attribute) => write!(f, "write {}", attribute),
        }
    }
}

/// Final outcome of a request that returned `Invocation::Pending`.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandCompletion {
    pub handle: CompletionHandle,
    pub endpoint: EndpointId,
    pub cluster: ClusterId,
    pub operation: Operation,
    pub result: Result<CommandReply, TranslateError>,
}

/// Attribute value reported by a device.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeUpdate {
    pub endpoint: EndpointId,
    pub cluster: ClusterId,
    pub attribute: AttributeId,
    pub value: AttributeValue,
}

pub trait ProtocolSink: Send + Sync + 'static {
    /// Deliver the outcome of a pending request. Called exactly once per handle.
    fn command_completed(&self, completion: CommandCompletion);

    /// Deliver an unsolicited attribute update.
    fn attribute_updated(&self, update: AttributeUpdate);
}

/// Sink that only logs. Used when no protocol stack is attached.
pub struct LoggingSink;

impl ProtocolSink for LoggingSink {
    fn command_completed(&self, completion: CommandCompletion) {
        match &completion.result {
            Ok(reply) => info!(
                "[Matter] {} {} {} completed (handle {}): {:?}",
                completion.endpoint,
                completion.cluster,
                completion.operation,
                completion.handle.id(),
                reply
            ),
            Err(e) => warn!(
                "[Matter] {} {} {} failed (handle {}, status {:?}): {}",
                completion.endpoint,
                completion.cluster,
                completion.operation,
                completion.handle.id(),
                e.status(),
                e
            ),
        }
    }

    fn attribute_updated(&self, update: AttributeUpdate) {
        info!(
            "[Matter] {} {} attribute {} = {:?}",
            update.endpoint, update.cluster, update.attribute, update.value
        );
    }
}

/// Everything a [`ChannelSink`] forwards.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolEvent {
    Completed(CommandCompletion),
    AttributeUpdated(AttributeUpdate),
}

/// Sink that queues events for the protocol stack's own context.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ProtocolEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProtocolEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: ProtocolEvent) {
        if self.tx.send(event).is_err() {
            warn!("[Matter] Protocol event receiver dropped");
        }
    }
}

impl ProtocolSink for ChannelSink {
    fn command_completed(&self, completion: CommandCompletion) {
        self.send(ProtocolEvent::Completed(completion));
    }

    fn attribute_updated(&self, update: AttributeUpdate) {
        self.send(ProtocolEvent::AttributeUpdated(update));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_sink_forwards_in_order() {
        let (sink, mut rx) = ChannelSink::new();
        let update = AttributeUpdate {
            endpoint: EndpointId(3),
            cluster: ClusterId::ON_OFF,
            attribute: AttributeId(0),
            value: AttributeValue::Bool(true),
        };

        sink.attribute_updated(update.clone());
        sink.command_completed(CommandCompletion {
            handle: CompletionHandle::new(9),
            endpoint: EndpointId(3),
            cluster: ClusterId::ON_OFF,
            operation: Operation::Invoke(CommandId(1)),
            result: Err(TranslateError::TimedOut),
        });

        assert_eq!(rx.recv().await, Some(ProtocolEvent::AttributeUpdated(update)));
        match rx.recv().await {
            Some(ProtocolEvent::Completed(c)) => {
                assert_eq!(c.handle.id(), 9);
                assert_eq!(c.result, Err(TranslateError::TimedOut));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
