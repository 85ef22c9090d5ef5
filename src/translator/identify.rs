//! Identify cluster (0x0003).

use super::{AttributeMapping, CommandMapping, CommandTranslator, Reply, TranslatorLinks};
use crate::error::TranslateError;
use crate::matter::{
    AttributeId, AttributeKind, CommandId, CommandPayload, KnownCluster, PayloadFields,
};
use serde_json::{Map, Value};
use strum::{EnumString, FromRepr, IntoStaticStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, IntoStaticStr)]
#[repr(u32)]
enum IdentifyCommand {
    Identify = 0x00,
    TriggerEffect = 0x40,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, IntoStaticStr, EnumString)]
#[repr(u32)]
enum IdentifyAttribute {
    IdentifyTime = 0x0000,
    IdentifyType = 0x0001,
}

pub struct IdentifyTranslator {
    links: TranslatorLinks,
}

impl IdentifyTranslator {
    pub fn new(links: TranslatorLinks) -> Self {
        Self { links }
    }

    fn mapping(command: IdentifyCommand) -> CommandMapping {
        let name: &'static str = command.into();
        match command {
            IdentifyCommand::Identify => CommandMapping::device(name, Reply::Attribute("IdentifyTime")),
            IdentifyCommand::TriggerEffect => CommandMapping::device(name, Reply::None),
        }
    }

    fn attribute_mapping(attribute: IdentifyAttribute) -> AttributeMapping {
        let (kind, writable) = match attribute {
            IdentifyAttribute::IdentifyTime => (AttributeKind::U16, true),
            IdentifyAttribute::IdentifyType => (AttributeKind::Enum8, false),
        };
        AttributeMapping {
            id: AttributeId(attribute as u32),
            name: attribute.into(),
            kind,
            writable,
        }
    }
}

impl CommandTranslator for IdentifyTranslator {
    fn cluster(&self) -> KnownCluster {
        KnownCluster::Identify
    }

    fn links(&self) -> &TranslatorLinks {
        &self.links
    }

    fn command(&self, command: CommandId) -> Option<CommandMapping> {
        IdentifyCommand::from_repr(command.0).map(Self::mapping)
    }

    fn attribute(&self, attribute: AttributeId) -> Option<AttributeMapping> {
        IdentifyAttribute::from_repr(attribute.0).map(Self::attribute_mapping)
    }

    fn attribute_named(&self, name: &str) -> Option<AttributeMapping> {
        name.parse::<IdentifyAttribute>()
            .ok()
            .map(Self::attribute_mapping)
    }

    fn command_payload(
        &self,
        command: CommandId,
        fields: &CommandPayload,
    ) -> Result<Value, TranslateError> {
        let mut out = Map::new();
        match IdentifyCommand::from_repr(command.0) {
            Some(IdentifyCommand::Identify) => {
                let time = fields.unsigned_field("IdentifyTime", u16::MAX as u64)?;
                out.insert("IdentifyTime".to_string(), Value::from(time));
            }
            Some(IdentifyCommand::TriggerEffect) => {
                let effect = fields.unsigned_field("EffectIdentifier", u8::MAX as u64)?;
                let variant = fields.unsigned_or("EffectVariant", u8::MAX as u64, 0)?;
                out.insert("EffectIdentifier".to_string(), Value::from(effect));
                out.insert("EffectVariant".to_string(), Value::from(variant));
            }
            None => {}
        }
        Ok(Value::Object(out))
    }
}
