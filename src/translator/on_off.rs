//! OnOff cluster (0x0006).

use super::{AttributeMapping, CommandMapping, CommandTranslator, Reply, TranslatorLinks};
use crate::error::TranslateError;
use crate::matter::{
    AttributeId, AttributeKind, CommandId, CommandPayload, KnownCluster, PayloadFields,
};
use serde_json::{Map, Value};
use strum::{EnumString, FromRepr, IntoStaticStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, IntoStaticStr)]
#[repr(u32)]
enum OnOffCommand {
    Off = 0x00,
    On = 0x01,
    Toggle = 0x02,
    OffWithEffect = 0x40,
    OnWithRecallGlobalScene = 0x41,
    OnWithTimedOff = 0x42,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, IntoStaticStr, EnumString)]
#[repr(u32)]
enum OnOffAttribute {
    OnOff = 0x0000,
    GlobalSceneControl = 0x4000,
    OnTime = 0x4001,
    OffWaitTime = 0x4002,
    StartUpOnOff = 0x4003,
}

pub struct OnOffTranslator {
    links: TranslatorLinks,
}

impl OnOffTranslator {
    pub fn new(links: TranslatorLinks) -> Self {
        Self { links }
    }

    fn mapping(command: OnOffCommand) -> CommandMapping {
        let name: &'static str = command.into();
        match command {
            OnOffCommand::Off | OnOffCommand::On | OnOffCommand::Toggle => {
                CommandMapping::device(name, Reply::Attribute("OnOff"))
            }
            _ => CommandMapping::device(name, Reply::None),
        }
    }

    fn attribute_mapping(attribute: OnOffAttribute) -> AttributeMapping {
        let (kind, writable) = match attribute {
            OnOffAttribute::OnOff | OnOffAttribute::GlobalSceneControl => {
                (AttributeKind::Bool, false)
            }
            OnOffAttribute::OnTime | OnOffAttribute::OffWaitTime => (AttributeKind::U16, true),
            OnOffAttribute::StartUpOnOff => (AttributeKind::NullableEnum8, true),
        };
        AttributeMapping {
            id: AttributeId(attribute as u32),
            name: attribute.into(),
            kind,
            writable,
        }
    }
}

impl CommandTranslator for OnOffTranslator {
    fn cluster(&self) -> KnownCluster {
        KnownCluster::OnOff
    }

    fn links(&self) -> &TranslatorLinks {
        &self.links
    }

    fn command(&self, command: CommandId) -> Option<CommandMapping> {
        OnOffCommand::from_repr(command.0).map(Self::mapping)
    }

    fn attribute(&self, attribute: AttributeId) -> Option<AttributeMapping> {
        OnOffAttribute::from_repr(attribute.0).map(Self::attribute_mapping)
    }

    fn attribute_named(&self, name: &str) -> Option<AttributeMapping> {
        name.parse::<OnOffAttribute>()
            .ok()
            .map(Self::attribute_mapping)
    }

    fn command_payload(
        &self,
        command: CommandId,
        fields: &CommandPayload,
    ) -> Result<Value, TranslateError> {
        let mut out = Map::new();
        match OnOffCommand::from_repr(command.0) {
            Some(OnOffCommand::OffWithEffect) => {
                let effect = fields.unsigned_field("EffectIdentifier", u8::MAX as u64)?;
                let variant = fields.unsigned_or("EffectVariant", u8::MAX as u64, 0)?;
                out.insert("EffectIdentifier".to_string(), Value::from(effect));
                out.insert("EffectVariant".to_string(), Value::from(variant));
            }
            Some(OnOffCommand::OnWithTimedOff) => {
                let control = fields.unsigned_or("OnOffControl", u8::MAX as u64, 0)?;
                let on_time = fields.unsigned_field("OnTime", u16::MAX as u64)?;
                let off_wait = fields.unsigned_field("OffWaitTime", u16::MAX as u64)?;
                out.insert("OnOffControl".to_string(), Value::from(control));
                out.insert("OnTime".to_string(), Value::from(on_time));
                out.insert("OffWaitTime".to_string(), Value::from(off_wait));
            }
            _ => {}
        }
        Ok(Value::Object(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::BusTopic;
    use crate::matter::{AttributeValue, AttributeWrite, ClusterId, HandlerContext};
    use crate::translator::test_support::{D1_ENDPOINT, Fixture, RecordingSink};
    use crate::translator::{Inbound, Invocation, PendingRequests};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn setup() -> (Fixture, OnOffTranslator, PendingRequests) {
        let fixture = Fixture::new();
        let translator = OnOffTranslator::new(fixture.links.clone());
        let pending = PendingRequests::new(
            Duration::from_secs(5),
            Arc::new(RecordingSink::default()),
        );
        (fixture, translator, pending)
    }

    #[test]
    fn test_on_expects_on_off_report() {
        let (fixture, translator, pending) = setup();
        let ctx = HandlerContext::new(D1_ENDPOINT, ClusterId::ON_OFF, CommandId(0x01));

        assert!(matches!(
            translator.invoke(&ctx, &pending),
            Ok(Invocation::Pending(_))
        ));
        assert_eq!(
            fixture.bus.published(),
            vec![(
                "ucl/by-unid/zw-D1/ep1/OnOff/Commands/On".to_string(),
                "{}".to_string()
            )]
        );

        // A second On while the first is unanswered would be ambiguous
        assert!(matches!(
            translator.invoke(&ctx, &pending),
            Err(TranslateError::RequestInFlight(_))
        ));
        assert_eq!(fixture.bus.published().len(), 1);
    }

    #[test]
    fn test_timed_off_payload() {
        let (fixture, translator, pending) = setup();
        let ctx = HandlerContext::new(D1_ENDPOINT, ClusterId::ON_OFF, CommandId(0x42))
            .with_field("OnTime", 600)
            .with_field("OffWaitTime", 30);

        assert_eq!(translator.invoke(&ctx, &pending), Ok(Invocation::Sent));
        assert_eq!(
            fixture.bus.last_json(),
            json!({"OnOffControl": 0, "OnTime": 600, "OffWaitTime": 30})
        );
    }

    #[test]
    fn test_publish_failure_rolls_back_handle() {
        let (fixture, translator, pending) = setup();
        fixture.bus.set_offline(true);
        let ctx = HandlerContext::new(D1_ENDPOINT, ClusterId::ON_OFF, CommandId(0x02));

        assert!(matches!(
            translator.invoke(&ctx, &pending),
            Err(TranslateError::BusUnavailable(_))
        ));
        assert!(pending.is_empty());
    }

    #[test]
    fn test_write_on_time() {
        let (fixture, translator, pending) = setup();
        let write = AttributeWrite {
            endpoint: D1_ENDPOINT,
            cluster: ClusterId::ON_OFF,
            attribute: AttributeId(0x4001),
            value: AttributeValue::Unsigned(300),
        };

        assert!(matches!(
            translator.write_attribute(&write, &pending),
            Ok(Invocation::Pending(_))
        ));
        assert_eq!(
            fixture.bus.published()[0].0,
            "ucl/by-unid/zw-D1/ep1/OnOff/Commands/WriteAttributes"
        );
        assert_eq!(fixture.bus.last_json(), json!({"OnTime": 300}));
    }

    #[test]
    fn test_on_off_attribute_is_read_only() {
        let (fixture, translator, pending) = setup();
        let write = AttributeWrite {
            endpoint: D1_ENDPOINT,
            cluster: ClusterId::ON_OFF,
            attribute: AttributeId(0x0000),
            value: AttributeValue::Bool(true),
        };

        assert_eq!(
            translator.write_attribute(&write, &pending),
            Err(TranslateError::ReadOnlyAttribute {
                cluster: ClusterId::ON_OFF,
                attribute: 0,
            })
        );
        assert!(fixture.bus.published().is_empty());
    }

    #[test]
    fn test_decode_report() {
        let (_fixture, translator, _pending) = setup();
        let topic = BusTopic::Reported {
            address: crate::bus::DeviceAddress::new("zw-D1", 1),
            cluster: "OnOff".to_string(),
            attribute: "OnOff".to_string(),
        };

        assert_eq!(
            translator.decode_bus_message(&topic, r#"{"value": true}"#),
            Ok(Inbound::Report {
                endpoint: Some(D1_ENDPOINT),
                attribute: AttributeId(0),
                value: AttributeValue::Bool(true),
            })
        );
        assert!(translator
            .decode_bus_message(&topic, r#"{"value": "on"}"#)
            .is_err());
    }

    #[test]
    fn test_start_up_on_off_may_be_null() {
        let (_fixture, translator, pending) = setup();
        let topic = BusTopic::Reported {
            address: crate::bus::DeviceAddress::new("zw-D1", 1),
            cluster: "OnOff".to_string(),
            attribute: "StartUpOnOff".to_string(),
        };

        assert_eq!(
            translator.decode_bus_message(&topic, r#"{"value": null}"#),
            Ok(Inbound::Report {
                endpoint: Some(D1_ENDPOINT),
                attribute: AttributeId(0x4003),
                value: AttributeValue::Null,
            })
        );

        // Writing null restores the previous state on power-up
        let write = AttributeWrite {
            endpoint: D1_ENDPOINT,
            cluster: ClusterId::ON_OFF,
            attribute: AttributeId(0x4003),
            value: AttributeValue::Null,
        };
        assert!(matches!(
            translator.write_attribute(&write, &pending),
            Ok(Invocation::Pending(_))
        ));
    }
}
