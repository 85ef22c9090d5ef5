//! Last reported attribute values, served to protocol-side reads.

use crate::matter::{AttributeId, AttributeValue, ClusterId, EndpointId};
use parking_lot::RwLock;
use std::collections::HashMap;

type AttributeKey = (EndpointId, ClusterId, AttributeId);

#[derive(Default)]
pub struct AttributeCache {
    values: RwLock<HashMap<AttributeKey, AttributeValue>>,
}

impl AttributeCache {
    pub fn store(
        &self,
        endpoint: EndpointId,
        cluster: ClusterId,
        attribute: AttributeId,
        value: AttributeValue,
    ) {
        self.values
            .write()
            .insert((endpoint, cluster, attribute), value);
    }

    pub fn get(
        &self,
        endpoint: EndpointId,
        cluster: ClusterId,
        attribute: AttributeId,
    ) -> Option<AttributeValue> {
        self.values
            .read()
            .get(&(endpoint, cluster, attribute))
            .cloned()
    }

    /// Forget everything known about `endpoints` (their device detached).
    pub fn forget(&self, endpoints: &[EndpointId]) {
        self.values
            .write()
            .retain(|(endpoint, _, _), _| !endpoints.contains(endpoint));
    }
}
