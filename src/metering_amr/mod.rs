use crate::{config::Config, models::ID_FIELDS, mqtt::PublishData};
use log::{debug, error, info, log, trace, warn, Level};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{error::TrySendError, Receiver, Sender};

pub mod registry;
pub mod decoder;
pub mod identity;
pub mod reading;
pub mod filter;
pub mod formatter;

use filter::{MeterStates, Verdict};
use registry::Registry;

/// How the line loop reacts to a rejected line: the level it is logged at and
/// whether the loop pauses before reading on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipPolicy {
    pub level: Level,
    pub cooldown: bool,
}

impl SkipPolicy {
    /// Expected traffic
    pub const SILENT: SkipPolicy = SkipPolicy { level: Level::Trace, cooldown: false };
    pub const LOGGED: SkipPolicy = SkipPolicy { level: Level::Debug, cooldown: false };
    /// The line could not be processed at all
    pub const SILENT_COOLDOWN: SkipPolicy = SkipPolicy { level: Level::Trace, cooldown: true };
    pub const LOGGED_COOLDOWN: SkipPolicy = SkipPolicy { level: Level::Debug, cooldown: true };
    /// A watched meter sent unusable data
    pub const COOLDOWN: SkipPolicy = SkipPolicy { level: Level::Warn, cooldown: true };
}

/// Reasons a line does not lead to a publish
#[derive(Error, Debug)]
pub enum AmrError {
    #[error("Line is not a JSON object")]
    NotStructured,
    #[error("Malformed rtlamr message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("No known id field in message")]
    UnresolvedIdentity,
    #[error("Meter {0} is not watched")]
    UnwatchedMeter(String),
    #[error("Message type mismatch for meter {id}: expected id in {expected}, found it in {found}")]
    TypeMismatch { id: u64, expected: &'static str, found: &'static str },
    #[error("Meter {id}: reading field {field} missing")]
    MissingReading { id: u64, field: String },
    #[error("Meter {id}: reading field {field} is not a number")]
    NonNumericReading { id: u64, field: String },
    #[error("Meter {id}: reading can not be represented after applying the multiplier")]
    ReadingOverflow { id: u64 },
}

impl AmrError {
    pub fn policy(&self) -> SkipPolicy {
        match self {
            AmrError::NotStructured | AmrError::UnwatchedMeter(_) => SkipPolicy::SILENT,
            AmrError::TypeMismatch { .. } => SkipPolicy::LOGGED,
            AmrError::UnresolvedIdentity => SkipPolicy::SILENT_COOLDOWN,
            AmrError::Malformed(_) => SkipPolicy::LOGGED_COOLDOWN,
            AmrError::MissingReading { .. } | AmrError::NonNumericReading { .. } | AmrError::ReadingOverflow { .. } => SkipPolicy::COOLDOWN,
        }
    }
}

pub struct AmrManager {
    sender: Sender<PublishData>,
    registry: Registry,
    states: MeterStates,
    topic_prefix: String,
    cooldown: Duration,
}

impl AmrManager {
    pub fn new(sender: Sender<PublishData>, registry: Registry, config: &Config) -> Self {
        Self {
            sender,
            registry,
            states: MeterStates::from_config(&config.filter),
            topic_prefix: config.mqtt.topic_prefix.clone(),
            cooldown: Duration::from_millis(config.filter.error_cooldown_ms),
        }
    }

    pub fn states(&self) -> &MeterStates {
        &self.states
    }

    /// Process lines until the channel closes or rtlamr reports it lost its samples
    pub async fn start_thread(&mut self, mut receiver: Receiver<String>) {
        info!("Starting AMR thread watching {} meters", self.registry.len());

        while let Some(line) = receiver.recv().await {
            trace!("{line}");

            if decoder::is_upstream_eof(&line) {
                error!("rtlamr stopped: {}", line.trim());
                return;
            }

            match self.handle_line(&line) {
                Ok(Some(publish)) => self.hand_over(publish),
                Ok(None) => {}
                Err(e) => {
                    let policy = e.policy();
                    log!(policy.level, "{e}: {}", line.trim());
                    if policy.cooldown {
                        tokio::time::sleep(self.cooldown).await;
                    }
                }
            }
        }

        info!("Line source closed, AMR thread exits");
    }

    /// Never waits for the sink, a reading it can not take right now is lost
    fn hand_over(&self, publish: PublishData) {
        match self.sender.try_send(publish) {
            Ok(_) => {}
            Err(TrySendError::Full(p)) => error!("Publish queue full, reading for {} lost: {}", p.topic, p.payload),
            Err(TrySendError::Closed(p)) => error!("Publishing to {} failed: sink is gone", p.topic),
        }
    }

    /// Run one line through the whole pipeline, `Ok(None)` means the filter held it back
    pub fn handle_line(&mut self, line: &str) -> Result<Option<PublishData>, AmrError> {
        let broadcast = decoder::decode_line(line)?;
        let (id_value, id_field) = identity::resolve_identity(&broadcast.message, &ID_FIELDS)?;
        let meter = identity::check_msg_type(&self.registry, id_value, id_field)?;
        let reading = reading::extract_reading(meter, &broadcast.message)?;

        debug!("meter_id={} reading={} other_fields={:?}", meter.id, reading.value, reading.other_fields);

        let verdict = self.states.evaluate(meter.id, &reading);
        if verdict == Verdict::Outlier {
            let last = self.states.get(meter.id).map(|s| s.last_reading.to_string()).unwrap_or_default();
            warn!("Seemingly erroneous reading: meter={} current={} previous={last}", meter.id, reading.value);
        }
        if !verdict.publishes() {
            return Ok(None);
        }

        let publish = formatter::publish_data(&self.topic_prefix, meter, &reading);
        info!("[{}] {} {} [retain={}]", broadcast.time, publish.topic, publish.payload, publish.retain);
        Ok(Some(publish))
    }
}
