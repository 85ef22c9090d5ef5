//! Groups cluster (0x0004).
//!
//! Group management commands are published on the group topic of the
//! group they name, so the bus controller updates its own group table.
//! GetGroupMembership and RemoveAllGroups concern one device and go to it.

use super::{AttributeMapping, CommandMapping, CommandTranslator, Reply, TranslatorLinks};
use crate::error::TranslateError;
use crate::matter::{
    AttributeId, AttributeKind, CommandId, CommandPayload, KnownCluster, PayloadFields,
};
use serde_json::{Map, Value};
use strum::{EnumString, FromRepr, IntoStaticStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, IntoStaticStr)]
#[repr(u32)]
enum GroupsCommand {
    AddGroup = 0x00,
    ViewGroup = 0x01,
    GetGroupMembership = 0x02,
    RemoveGroup = 0x03,
    RemoveAllGroups = 0x04,
    AddGroupIfIdentifying = 0x05,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, IntoStaticStr, EnumString)]
#[repr(u32)]
enum GroupsAttribute {
    NameSupport = 0x0000,
}

pub struct GroupsTranslator {
    links: TranslatorLinks,
}

impl GroupsTranslator {
    pub fn new(links: TranslatorLinks) -> Self {
        Self { links }
    }

    fn mapping(command: GroupsCommand) -> CommandMapping {
        let name: &'static str = command.into();
        match command {
            GroupsCommand::GetGroupMembership => {
                CommandMapping::device(name, Reply::Response("GetGroupMembershipResponse"))
            }
            GroupsCommand::RemoveAllGroups => CommandMapping::device(name, Reply::None),
            _ => CommandMapping::group(name),
        }
    }

    fn attribute_mapping(attribute: GroupsAttribute) -> AttributeMapping {
        AttributeMapping {
            id: AttributeId(attribute as u32),
            name: attribute.into(),
            kind: AttributeKind::Bitmap8,
            writable: false,
        }
    }
}

impl CommandTranslator for GroupsTranslator {
    fn cluster(&self) -> KnownCluster {
        KnownCluster::Groups
    }

    fn links(&self) -> &TranslatorLinks {
        &self.links
    }

    fn command(&self, command: CommandId) -> Option<CommandMapping> {
        GroupsCommand::from_repr(command.0).map(Self::mapping)
    }

    fn attribute(&self, attribute: AttributeId) -> Option<AttributeMapping> {
        GroupsAttribute::from_repr(attribute.0).map(Self::attribute_mapping)
    }

    fn attribute_named(&self, name: &str) -> Option<AttributeMapping> {
        name.parse::<GroupsAttribute>()
            .ok()
            .map(Self::attribute_mapping)
    }

    fn command_payload(
        &self,
        command: CommandId,
        fields: &CommandPayload,
    ) -> Result<Value, TranslateError> {
        let mut out = Map::new();
        match GroupsCommand::from_repr(command.0) {
            Some(GroupsCommand::AddGroup | GroupsCommand::AddGroupIfIdentifying) => {
                let group = fields.unsigned_field("GroupID", u16::MAX as u64)?;
                let name = fields
                    .get("GroupName")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                out.insert("GroupId".to_string(), Value::from(group));
                out.insert("GroupName".to_string(), Value::from(name));
            }
            Some(GroupsCommand::ViewGroup | GroupsCommand::RemoveGroup) => {
                let group = fields.unsigned_field("GroupID", u16::MAX as u64)?;
                out.insert("GroupId".to_string(), Value::from(group));
            }
            Some(GroupsCommand::GetGroupMembership) => {
                let list = fields
                    .get("GroupList")
                    .cloned()
                    .unwrap_or_else(|| Value::Array(Vec::new()));
                if !list.is_array() {
                    return Err(TranslateError::InvalidPayload(
                        "GroupList is not a list".to_string(),
                    ));
                }
                out.insert("GroupList".to_string(), list);
            }
            Some(GroupsCommand::RemoveAllGroups) | None => {}
        }
        Ok(Value::Object(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matter::{ClusterId, HandlerContext};
    use crate::translator::test_support::{D1_ENDPOINT, Fixture, RecordingSink};
    use crate::translator::{Invocation, PendingRequests};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn setup() -> (Fixture, GroupsTranslator, PendingRequests) {
        let fixture = Fixture::new();
        let translator = GroupsTranslator::new(fixture.links.clone());
        let pending = PendingRequests::new(
            Duration::from_secs(5),
            Arc::new(RecordingSink::default()),
        );
        (fixture, translator, pending)
    }

    #[test]
    fn test_add_group_goes_to_group_topic() {
        let (fixture, translator, pending) = setup();
        let ctx = HandlerContext::new(D1_ENDPOINT, ClusterId::GROUPS, CommandId(0x00))
            .with_field("GroupID", 5)
            .with_field("GroupName", "Kitchen");

        assert_eq!(translator.invoke(&ctx, &pending), Ok(Invocation::Sent));
        assert!(pending.is_empty());

        let published = fixture.bus.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "ucl/by-group/5/Groups/Commands/AddGroup");
        assert_eq!(
            fixture.bus.last_json(),
            json!({"GroupId": 5, "GroupName": "Kitchen"})
        );
    }

    #[test]
    fn test_membership_query_waits_for_response() {
        let (fixture, translator, pending) = setup();
        let ctx = HandlerContext::new(D1_ENDPOINT, ClusterId::GROUPS, CommandId(0x02))
            .with_field("GroupList", json!([1, 2]));

        let Ok(Invocation::Pending(handle)) = translator.invoke(&ctx, &pending) else {
            panic!("expected a pending handle");
        };
        assert!(pending.is_pending(handle));
        assert_eq!(
            fixture.bus.published()[0].0,
            "ucl/by-unid/zw-D1/ep1/Groups/Commands/GetGroupMembership"
        );
    }

    #[test]
    fn test_remove_all_groups_is_fire_and_forget() {
        let (fixture, translator, pending) = setup();
        let ctx = HandlerContext::new(D1_ENDPOINT, ClusterId::GROUPS, CommandId(0x04));

        assert_eq!(translator.invoke(&ctx, &pending), Ok(Invocation::Sent));
        assert_eq!(
            fixture.bus.published()[0].0,
            "ucl/by-unid/zw-D1/ep1/Groups/Commands/RemoveAllGroups"
        );
    }

    #[test]
    fn test_missing_group_id_publishes_nothing() {
        let (fixture, translator, pending) = setup();
        let ctx = HandlerContext::new(D1_ENDPOINT, ClusterId::GROUPS, CommandId(0x03));

        assert!(matches!(
            translator.invoke(&ctx, &pending),
            Err(TranslateError::InvalidPayload(_))
        ));
        assert!(fixture.bus.published().is_empty());
    }

    #[test]
    fn test_name_support_is_read_only() {
        let (_fixture, translator, _pending) = setup();
        let mapping = translator.attribute_named("NameSupport").unwrap();
        assert_eq!(mapping.id, AttributeId(0));
        assert!(!mapping.writable);
        assert_eq!(translator.attribute(AttributeId(1)), None);
    }
}
