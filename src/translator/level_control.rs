//! LevelControl cluster (0x0008).
//!
//! UCL expects `OptionsMask` and `OptionsOverride` on every movement
//! command; Matter clients may omit them, so they default to 0 here.

use super::{AttributeMapping, CommandMapping, CommandTranslator, Reply, TranslatorLinks};
use crate::error::TranslateError;
use crate::matter::{
    AttributeId, AttributeKind, CommandId, CommandPayload, KnownCluster, PayloadFields,
};
use serde_json::{Map, Value};
use strum::{EnumString, FromRepr, IntoStaticStr};

/// Highest valid level; 255 is reserved.
const MAX_LEVEL: u64 = 254;

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, IntoStaticStr)]
#[repr(u32)]
enum LevelCommand {
    MoveToLevel = 0x00,
    Move = 0x01,
    Step = 0x02,
    Stop = 0x03,
    MoveToLevelWithOnOff = 0x04,
    MoveWithOnOff = 0x05,
    StepWithOnOff = 0x06,
    StopWithOnOff = 0x07,
}

impl LevelCommand {
    /// The plain command this is a WithOnOff variant of (or itself).
    fn base(self) -> Self {
        match self {
            LevelCommand::MoveToLevelWithOnOff => LevelCommand::MoveToLevel,
            LevelCommand::MoveWithOnOff => LevelCommand::Move,
            LevelCommand::StepWithOnOff => LevelCommand::Step,
            LevelCommand::StopWithOnOff => LevelCommand::Stop,
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, IntoStaticStr, EnumString)]
#[repr(u32)]
enum LevelAttribute {
    CurrentLevel = 0x0000,
    RemainingTime = 0x0001,
    MinLevel = 0x0002,
    MaxLevel = 0x0003,
    Options = 0x000F,
    OnLevel = 0x0011,
}

pub struct LevelControlTranslator {
    links: TranslatorLinks,
}

impl LevelControlTranslator {
    pub fn new(links: TranslatorLinks) -> Self {
        Self { links }
    }

    fn mapping(command: LevelCommand) -> CommandMapping {
        let name: &'static str = command.into();
        match command {
            LevelCommand::MoveToLevel | LevelCommand::MoveToLevelWithOnOff => {
                CommandMapping::device(name, Reply::Attribute("CurrentLevel"))
            }
            _ => CommandMapping::device(name, Reply::None),
        }
    }

    fn attribute_mapping(attribute: LevelAttribute) -> AttributeMapping {
        let (kind, writable) = match attribute {
            LevelAttribute::RemainingTime => (AttributeKind::U16, false),
            LevelAttribute::Options => (AttributeKind::Bitmap8, true),
            LevelAttribute::OnLevel => (AttributeKind::U8, true),
            _ => (AttributeKind::U8, false),
        };
        AttributeMapping {
            id: AttributeId(attribute as u32),
            name: attribute.into(),
            kind,
            writable,
        }
    }
}

impl CommandTranslator for LevelControlTranslator {
    fn cluster(&self) -> KnownCluster {
        KnownCluster::LevelControl
    }

    fn links(&self) -> &TranslatorLinks {
        &self.links
    }

    fn command(&self, command: CommandId) -> Option<CommandMapping> {
        LevelCommand::from_repr(command.0).map(Self::mapping)
    }

    fn attribute(&self, attribute: AttributeId) -> Option<AttributeMapping> {
        LevelAttribute::from_repr(attribute.0).map(Self::attribute_mapping)
    }

    fn attribute_named(&self, name: &str) -> Option<AttributeMapping> {
        name.parse::<LevelAttribute>()
            .ok()
            .map(Self::attribute_mapping)
    }

    fn command_payload(
        &self,
        command: CommandId,
        fields: &CommandPayload,
    ) -> Result<Value, TranslateError> {
        let Some(command) = LevelCommand::from_repr(command.0) else {
            return Ok(Value::Object(Map::new()));
        };

        let mut out = Map::new();
        match command.base() {
            LevelCommand::MoveToLevel => {
                let level = fields.unsigned_field("Level", MAX_LEVEL)?;
                let time = fields.unsigned_or("TransitionTime", u16::MAX as u64, 0)?;
                out.insert("Level".to_string(), Value::from(level));
                out.insert("TransitionTime".to_string(), Value::from(time));
            }
            LevelCommand::Move => {
                let mode = fields.unsigned_field("MoveMode", 1)?;
                let rate = fields.unsigned_or("Rate", u8::MAX as u64, u8::MAX as u64)?;
                out.insert("MoveMode".to_string(), Value::from(mode));
                out.insert("Rate".to_string(), Value::from(rate));
            }
            LevelCommand::Step => {
                let mode = fields.unsigned_field("StepMode", 1)?;
                let size = fields.unsigned_field("StepSize", u8::MAX as u64)?;
                let time = fields.unsigned_or("TransitionTime", u16::MAX as u64, 0)?;
                out.insert("StepMode".to_string(), Value::from(mode));
                out.insert("StepSize".to_string(), Value::from(size));
                out.insert("TransitionTime".to_string(), Value::from(time));
            }
            _ => {}
        }

        let mask = fields.unsigned_or("OptionsMask", u8::MAX as u64, 0)?;
        let over = fields.unsigned_or("OptionsOverride", u8::MAX as u64, 0)?;
        out.insert("OptionsMask".to_string(), Value::from(mask));
        out.insert("OptionsOverride".to_string(), Value::from(over));
        Ok(Value::Object(out))
    }
}
