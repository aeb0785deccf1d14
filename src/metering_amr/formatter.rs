use super::reading::Reading;
use super::registry::MeterConfig;
use crate::mqtt::PublishData;
use serde_json::Value;

/// QoS used for every reading
pub const READING_QOS: u8 = 1;

/// `{prefix}/{name}-{id}`, or `{prefix}/{id}` for meters without a name
pub fn topic(prefix: &str, meter: &MeterConfig) -> String {
    if meter.name.is_empty() {
        format!("{prefix}/{}", meter.id)
    } else {
        format!("{prefix}/{}-{}", meter.name, meter.id)
    }
}

/// JSON object with the reading first, followed by the extra fields in configured order
pub fn payload(reading_field: &str, reading: &Reading) -> String {
    let mut fields = vec![format!("{}:{}", Value::String(reading_field.to_string()), reading.value)];
    fields.extend(reading.other_fields.iter().cloned());
    format!("{{{}}}", fields.join(","))
}

pub fn publish_data(prefix: &str, meter: &MeterConfig, reading: &Reading) -> PublishData {
    PublishData {
        topic: topic(prefix, meter),
        payload: payload(&meter.reading_field, reading),
        qos: READING_QOS,
        retain: meter.retain,
    }
}
