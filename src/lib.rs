//! Unify Matter Bridge library.
//!
//! Translates Matter cluster commands into Unify Controller Language (UCL)
//! messages on an MQTT bus, and bus reports back into Matter attribute
//! updates and command completions.

pub mod bridge;
pub mod bus;
pub mod config;
pub mod error;
pub mod instance_lock;
pub mod matter;
pub mod node_state;
pub mod translator;
