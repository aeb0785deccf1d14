//! Forward utility meter broadcasts decoded by rtlamr to MQTT
//!
//! Every JSON line rtlamr prints is attributed to a configured meter, checked
//! against the message type configured for it, calibrated and filtered for
//! duplicates and outliers before it is published under a per-meter topic.

pub mod config;
pub mod models;
pub mod mqtt;
pub mod metering_amr;
pub mod rtlamr;

// Re-export common types for easier access
pub use config::Config;
pub use models::{MsgType, DecodedBroadcast, FieldValue, Payload};
pub use mqtt::{MqttManager, PublishData};
pub use metering_amr::{AmrManager, AmrError, registry::Registry};
