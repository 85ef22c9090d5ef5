//! Thermostat cluster (0x0201).
//!
//! Temperatures are in centi-degrees Celsius on both sides, so values pass
//! through unscaled.

use super::{AttributeMapping, CommandMapping, CommandTranslator, Reply, TranslatorLinks};
use crate::error::TranslateError;
use crate::matter::{
    AttributeId, AttributeKind, AttributeValue, CommandId, CommandPayload, KnownCluster,
    PayloadFields,
};
use serde_json::{Map, Value};
use std::ops::RangeInclusive;
use strum::{EnumString, FromRepr, IntoStaticStr};

const HEATING_LIMITS: RangeInclusive<i64> = 700..=3000;
const COOLING_LIMITS: RangeInclusive<i64> = 1600..=3200;

/// Reserved SystemMode value.
const SYSTEM_MODE_RESERVED: u64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, IntoStaticStr)]
#[repr(u32)]
enum ThermostatCommand {
    #[strum(to_string = "SetpointRaiseOrLower")]
    SetpointRaiseLower = 0x00,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(u64)]
enum SetpointMode {
    Heat = 0,
    Cool = 1,
    Both = 2,
}

impl SetpointMode {
    fn bus_name(self) -> &'static str {
        match self {
            SetpointMode::Heat => "Heat",
            SetpointMode::Cool => "Cool",
            SetpointMode::Both => "Both",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, IntoStaticStr, EnumString)]
#[repr(u32)]
enum ThermostatAttribute {
    LocalTemperature = 0x0000,
    OccupiedCoolingSetpoint = 0x0011,
    OccupiedHeatingSetpoint = 0x0012,
    ControlSequenceOfOperation = 0x001B,
    SystemMode = 0x001C,
}

pub struct ThermostatTranslator {
    links: TranslatorLinks,
}

impl ThermostatTranslator {
    pub fn new(links: TranslatorLinks) -> Self {
        Self { links }
    }

    fn attribute_mapping(attribute: ThermostatAttribute) -> AttributeMapping {
        let (kind, writable) = match attribute {
            ThermostatAttribute::LocalTemperature => (AttributeKind::NullableI16, false),
            ThermostatAttribute::OccupiedCoolingSetpoint
            | ThermostatAttribute::OccupiedHeatingSetpoint => (AttributeKind::I16, true),
            ThermostatAttribute::ControlSequenceOfOperation => (AttributeKind::Enum8, false),
            ThermostatAttribute::SystemMode => (AttributeKind::Enum8, true),
        };
        AttributeMapping {
            id: AttributeId(attribute as u32),
            name: attribute.into(),
            kind,
            writable,
        }
    }

    fn mode(fields: &CommandPayload) -> Result<SetpointMode, TranslateError> {
        let mode = fields.unsigned_field("Mode", SetpointMode::Both as u64)?;
        SetpointMode::from_repr(mode)
            .ok_or_else(|| TranslateError::InvalidPayload(format!("Mode={mode} is unknown")))
    }
}

impl CommandTranslator for ThermostatTranslator {
    fn cluster(&self) -> KnownCluster {
        KnownCluster::Thermostat
    }

    fn links(&self) -> &TranslatorLinks {
        &self.links
    }

    fn command(&self, command: CommandId) -> Option<CommandMapping> {
        ThermostatCommand::from_repr(command.0).map(|command| {
            CommandMapping::device(command.into(), Reply::Attribute("OccupiedHeatingSetpoint"))
        })
    }

    fn attribute(&self, attribute: AttributeId) -> Option<AttributeMapping> {
        ThermostatAttribute::from_repr(attribute.0).map(Self::attribute_mapping)
    }

    fn attribute_named(&self, name: &str) -> Option<AttributeMapping> {
        name.parse::<ThermostatAttribute>()
            .ok()
            .map(Self::attribute_mapping)
    }

    fn command_payload(
        &self,
        _command: CommandId,
        fields: &CommandPayload,
    ) -> Result<Value, TranslateError> {
        let mode = Self::mode(fields)?;
        let amount = fields.signed_field("Amount", i8::MIN as i64, i8::MAX as i64)?;

        let mut out = Map::new();
        out.insert("Mode".to_string(), Value::from(mode.bus_name()));
        out.insert("Amount".to_string(), Value::from(amount));
        Ok(Value::Object(out))
    }

    /// Cooling-only adjustments are confirmed by the cooling setpoint.
    fn reply_for(&self, mapping: &CommandMapping, fields: &CommandPayload) -> Reply {
        match Self::mode(fields) {
            Ok(SetpointMode::Cool) => Reply::Attribute("OccupiedCoolingSetpoint"),
            _ => mapping.reply,
        }
    }

    fn check_write(
        &self,
        mapping: &AttributeMapping,
        value: &AttributeValue,
    ) -> Result<(), TranslateError> {
        value.check(mapping.kind)?;

        let out_of_range = || {
            TranslateError::InvalidPayload(format!("{} = {:?} is out of range", mapping.name, value))
        };
        match (mapping.name.parse::<ThermostatAttribute>(), value) {
            (Ok(ThermostatAttribute::OccupiedHeatingSetpoint), AttributeValue::Signed(v))
                if !HEATING_LIMITS.contains(v) =>
            {
                Err(out_of_range())
            }
            (Ok(ThermostatAttribute::OccupiedCoolingSetpoint), AttributeValue::Signed(v))
                if !COOLING_LIMITS.contains(v) =>
            {
                Err(out_of_range())
            }
            (Ok(ThermostatAttribute::SystemMode), AttributeValue::Unsigned(SYSTEM_MODE_RESERVED)) => {
                Err(out_of_range())
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matter::{AttributeWrite, ClusterId, HandlerContext};
    use crate::translator::test_support::{D1_ENDPOINT, Fixture, RecordingSink};
    use crate::translator::{Invocation, PendingRequests};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    const HEATING_REPORTED: &str =
        "ucl/by-unid/zw-D1/ep1/Thermostat/Attributes/OccupiedHeatingSetpoint/Reported";
    const COOLING_REPORTED: &str =
        "ucl/by-unid/zw-D1/ep1/Thermostat/Attributes/OccupiedCoolingSetpoint/Reported";

    fn setup() -> (Fixture, ThermostatTranslator, PendingRequests) {
        let fixture = Fixture::new();
        let translator = ThermostatTranslator::new(fixture.links.clone());
        let pending = PendingRequests::new(
            Duration::from_secs(5),
            Arc::new(RecordingSink::default()),
        );
        (fixture, translator, pending)
    }

    fn setpoint(mode: u64, amount: i64) -> HandlerContext {
        HandlerContext::new(D1_ENDPOINT, ClusterId::THERMOSTAT, CommandId(0x00))
            .with_field("Mode", mode)
            .with_field("Amount", amount)
    }

    #[test]
    fn test_setpoint_raise_lower() {
        let (fixture, translator, pending) = setup();

        assert!(matches!(
            translator.invoke(&setpoint(0, -5), &pending),
            Ok(Invocation::Pending(_))
        ));
        assert_eq!(
            fixture.bus.published()[0].0,
            "ucl/by-unid/zw-D1/ep1/Thermostat/Commands/SetpointRaiseOrLower"
        );
        assert_eq!(fixture.bus.last_json(), json!({"Mode": "Heat", "Amount": -5}));

        // Waits on the heating report, so the topic is now busy
        assert!(matches!(
            pending.register(HEATING_REPORTED.to_string(), "zw-D1", origin()),
            Err(TranslateError::RequestInFlight(_))
        ));
    }

    #[test]
    fn test_cool_waits_for_cooling_setpoint() {
        let (_fixture, translator, pending) = setup();
        translator.invoke(&setpoint(1, 10), &pending).unwrap();

        assert!(matches!(
            pending.register(COOLING_REPORTED.to_string(), "zw-D1", origin()),
            Err(TranslateError::RequestInFlight(_))
        ));
        assert!(pending
            .register(HEATING_REPORTED.to_string(), "zw-D1", origin())
            .is_ok());
    }

    #[test]
    fn test_setpoint_rejects_bad_fields() {
        let (fixture, translator, pending) = setup();

        for ctx in [setpoint(3, 1), setpoint(0, 200), setpoint(0, -129)] {
            assert!(matches!(
                translator.invoke(&ctx, &pending),
                Err(TranslateError::InvalidPayload(_))
            ));
        }
        assert!(fixture.bus.published().is_empty());
        assert!(pending.is_empty());
    }

    #[test]
    fn test_setpoint_write_limits() {
        let (fixture, translator, pending) = setup();
        let write = |attribute: u32, value: AttributeValue| AttributeWrite {
            endpoint: D1_ENDPOINT,
            cluster: ClusterId::THERMOSTAT,
            attribute: AttributeId(attribute),
            value,
        };

        assert!(translator
            .write_attribute(&write(0x0012, AttributeValue::Signed(3100)), &pending)
            .is_err());
        assert!(translator
            .write_attribute(&write(0x0011, AttributeValue::Signed(1500)), &pending)
            .is_err());
        assert!(translator
            .write_attribute(&write(0x001C, AttributeValue::Unsigned(2)), &pending)
            .is_err());
        assert!(fixture.bus.published().is_empty());

        assert!(translator
            .write_attribute(&write(0x0012, AttributeValue::Signed(2100)), &pending)
            .is_ok());
        assert_eq!(
            fixture.bus.last_json(),
            json!({"OccupiedHeatingSetpoint": 2100})
        );
    }

    #[test]
    fn test_local_temperature_is_nullable() {
        let (_fixture, translator, _pending) = setup();
        let mapping = translator.attribute_named("LocalTemperature").unwrap();
        assert_eq!(mapping.kind, AttributeKind::NullableI16);
        assert!(!mapping.writable);
    }

    fn origin() -> crate::translator::RequestOrigin {
        crate::translator::RequestOrigin {
            endpoint: D1_ENDPOINT,
            cluster: ClusterId::THERMOSTAT,
            operation: crate::matter::Operation::Invoke(CommandId(0)),
        }
    }
}
