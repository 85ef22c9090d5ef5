use crate::matter::{ClusterId, CommandId, EndpointId};
use thiserror::Error as ThisError;

/// Matter interaction model status codes the bridge reports back to the
/// protocol stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ImStatus {
    Success = 0x00,
    Failure = 0x01,
    UnsupportedCommand = 0x81,
    InvalidCommand = 0x85,
    UnsupportedAttribute = 0x86,
    UnsupportedWrite = 0x88,
    Timeout = 0x94,
    Busy = 0x9C,
    UnsupportedCluster = 0xC3,
}

/// Errors produced while translating a single request or reply.
///
/// All of these are recoverable: they are turned into command-failure
/// responses for the protocol stack, never into a crash.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum TranslateError {
    #[error("no translator registered for cluster {0}")]
    UnsupportedCluster(ClusterId),

    #[error("command {command} is not supported by cluster {cluster}")]
    UnsupportedCommand {
        cluster: ClusterId,
        command: CommandId,
    },

    #[error("attribute 0x{attribute:04X} is not supported by cluster {cluster}")]
    UnsupportedAttribute { cluster: ClusterId, attribute: u32 },

    #[error("attribute 0x{attribute:04X} of cluster {cluster} is read-only")]
    ReadOnlyAttribute { cluster: ClusterId, attribute: u32 },

    #[error("endpoint {0} is not backed by an attached device")]
    DeviceUnavailable(EndpointId),

    #[error("bus unavailable: {0}")]
    BusUnavailable(String),

    #[error("no reply before the deadline")]
    TimedOut,

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("a request awaiting {0} is already in flight")]
    RequestInFlight(String),
}

impl TranslateError {
    /// Status code the protocol stack should answer with.
    pub fn status(&self) -> ImStatus {
        match self {
            TranslateError::UnsupportedCluster(_) => ImStatus::UnsupportedCluster,
            TranslateError::UnsupportedCommand { .. } => ImStatus::UnsupportedCommand,
            TranslateError::UnsupportedAttribute { .. } => ImStatus::UnsupportedAttribute,
            TranslateError::ReadOnlyAttribute { .. } => ImStatus::UnsupportedWrite,
            TranslateError::DeviceUnavailable(_) => ImStatus::Failure,
            TranslateError::BusUnavailable(_) => ImStatus::Failure,
            TranslateError::TimedOut => ImStatus::Timeout,
            TranslateError::InvalidPayload(_) => ImStatus::InvalidCommand,
            TranslateError::RequestInFlight(_) => ImStatus::Busy,
        }
    }
}

/// Process-level errors (start-up, transport, configuration).
#[derive(ThisError, Debug)]
pub enum BridgeError {
    #[error("cluster {0} already has a registered translator")]
    DuplicateTranslator(ClusterId),

    #[error("unknown cluster {0}")]
    UnknownCluster(String),

    #[error("{0} did not come online")]
    NodeOffline(String),

    #[error(transparent)]
    InstanceLock(#[from] crate::instance_lock::InstanceLockError),

    #[error(transparent)]
    Translate(#[from] TranslateError),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_maps_to_status_codes() {
        assert_eq!(
            TranslateError::UnsupportedCluster(ClusterId(0x0101)).status(),
            ImStatus::UnsupportedCluster
        );
        assert_eq!(
            TranslateError::UnsupportedCommand {
                cluster: ClusterId::GROUPS,
                command: CommandId(0xFF),
            }
            .status(),
            ImStatus::UnsupportedCommand
        );
        assert_eq!(TranslateError::TimedOut.status(), ImStatus::Timeout);
        assert_eq!(
            TranslateError::DeviceUnavailable(EndpointId(2)).status(),
            ImStatus::Failure
        );
        assert_eq!(ImStatus::UnsupportedCluster as u8, 0xC3);
    }

    #[test]
    fn test_error_messages() {
        let err = TranslateError::UnsupportedCommand {
            cluster: ClusterId::ON_OFF,
            command: CommandId(0xFF),
        };
        assert_eq!(
            err.to_string(),
            "command 0xFF is not supported by cluster OnOff"
        );
    }
}
