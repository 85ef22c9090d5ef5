//! Protocol-side view of the bridge: ids, per-request context and the
//! callback surface used to answer the Matter stack.

mod context;
mod ids;
mod sink;

pub use context::{
    AttributeKind, AttributeValue, AttributeWrite, CommandPayload, HandlerContext, PayloadFields,
};
pub use ids::{AttributeId, ClusterId, CommandId, EndpointId, GroupId, KnownCluster};
pub use sink::{
    AttributeUpdate, ChannelSink, CommandCompletion, CommandReply, LoggingSink, Operation,
    ProtocolEvent, ProtocolSink,
};
