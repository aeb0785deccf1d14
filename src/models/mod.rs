use lazy_static::lazy_static;
use serde::Deserialize;
use serde_json::{Number, Value};
use std::collections::BTreeMap;


/// Message types rtlamr can decode, in the order the schema table declares them
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MsgType {
    Scm,
    ScmPlus,
    Idm,
    NetIdm,
    R900,
    R900Bcd,
}

/// Field names a message type uses for the meter id and its reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageTypeSchema {
    pub id_field: &'static str,
    pub reading_field: &'static str,
}

impl MsgType {
    pub const ALL: [MsgType; 6] = [
        MsgType::Scm,
        MsgType::ScmPlus,
        MsgType::Idm,
        MsgType::NetIdm,
        MsgType::R900,
        MsgType::R900Bcd,
    ];

    /// Case-insensitive, so "IDM" and "idm" resolve to the same type
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "scm" => Some(MsgType::Scm),
            "scm+" => Some(MsgType::ScmPlus),
            "idm" => Some(MsgType::Idm),
            "netidm" => Some(MsgType::NetIdm),
            "r900" => Some(MsgType::R900),
            "r900bcd" => Some(MsgType::R900Bcd),
            _ => None,
        }
    }

    pub fn to_string(&self) -> String {
        match self {
            MsgType::Scm => "scm".to_string(),
            MsgType::ScmPlus => "scm+".to_string(),
            MsgType::Idm => "idm".to_string(),
            MsgType::NetIdm => "netidm".to_string(),
            MsgType::R900 => "r900".to_string(),
            MsgType::R900Bcd => "r900bcd".to_string(),
        }
    }

    pub fn schema(&self) -> MessageTypeSchema {
        match self {
            MsgType::Scm => MessageTypeSchema { id_field: "ID", reading_field: "Consumption" },
            MsgType::ScmPlus => MessageTypeSchema { id_field: "EndpointID", reading_field: "Consumption" },
            MsgType::Idm | MsgType::NetIdm => MessageTypeSchema { id_field: "ERTSerialNumber", reading_field: "LastConsumptionCount" },
            MsgType::R900 | MsgType::R900Bcd => MessageTypeSchema { id_field: "ID", reading_field: "Consumption" },
        }
    }
}

lazy_static! {
    /// Every id field name known to any schema, first occurrence in `MsgType::ALL` order.
    /// Broadcasts are attributed by probing these names in exactly this order.
    pub static ref ID_FIELDS: Vec<&'static str> = {
        let mut fields: Vec<&'static str> = Vec::new();
        for msg_type in MsgType::ALL {
            let id_field = msg_type.schema().id_field;
            if !fields.contains(&id_field) {
                fields.push(id_field);
            }
        }
        fields
    };
}

/// A single value of a decoded broadcast, tagged by how it has to be rendered
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(Number),
    Text(String),
    Flag(bool),
    /// Arrays, objects and null are carried through as raw JSON
    Raw(Value),
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Number(n) => FieldValue::Number(n),
            Value::String(s) => FieldValue::Text(s),
            Value::Bool(b) => FieldValue::Flag(b),
            other => FieldValue::Raw(other),
        }
    }
}

impl FieldValue {
    pub fn as_number(&self) -> Option<&Number> {
        match self {
            FieldValue::Number(n) => Some(n),
            _ => None,
        }
    }

    /// Meter ids are unsigned integers in every rtlamr schema
    pub fn as_meter_id(&self) -> Option<u64> {
        self.as_number().and_then(|n| n.as_u64())
    }

    /// JSON rendering used in published payloads: numbers and flags bare,
    /// everything else as a quoted string
    pub fn to_json_literal(&self) -> String {
        match self {
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Flag(b) => b.to_string(),
            FieldValue::Text(s) => Value::String(s.clone()).to_string(),
            FieldValue::Raw(v) => Value::String(v.to_string()).to_string(),
        }
    }
}

/// The `Message` object of a broadcast with explicit presence checks
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "serde_json::Map<String, Value>")]
pub struct Payload {
    fields: BTreeMap<String, FieldValue>,
}

impl From<serde_json::Map<String, Value>> for Payload {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        Payload {
            fields: map.into_iter().map(|(k, v)| (k, FieldValue::from(v))).collect(),
        }
    }
}

impl Payload {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// One line of rtlamr JSON output
#[derive(Debug, Clone, Deserialize)]
pub struct DecodedBroadcast {
    /// Kept opaque, only used for logging
    #[serde(rename = "Time")]
    pub time: String,
    #[serde(rename = "Message")]
    pub message: Payload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msg_type_from_str() {
        assert_eq!(MsgType::from_str("scm"), Some(MsgType::Scm));
        assert_eq!(MsgType::from_str("SCM+"), Some(MsgType::ScmPlus));
        assert_eq!(MsgType::from_str("IDM"), Some(MsgType::Idm));
        assert_eq!(MsgType::from_str("r900bcd"), Some(MsgType::R900Bcd));
        assert_eq!(MsgType::from_str("ert"), None);
        for msg_type in MsgType::ALL {
            assert_eq!(MsgType::from_str(&msg_type.to_string()), Some(msg_type));
        }
    }

    #[test]
    fn test_schema_table() {
        assert_eq!(MsgType::ScmPlus.schema().id_field, "EndpointID");
        assert_eq!(MsgType::NetIdm.schema(), MsgType::Idm.schema());
        assert_eq!(MsgType::R900Bcd.schema(), MsgType::R900.schema());
        assert_eq!(MsgType::Idm.schema().reading_field, "LastConsumptionCount");
    }

    #[test]
    fn test_id_fields_order() {
        assert_eq!(*ID_FIELDS, vec!["ID", "EndpointID", "ERTSerialNumber"]);
    }

    #[test]
    fn test_json_literal() {
        assert_eq!(FieldValue::from(serde_json::json!(42)).to_json_literal(), "42");
        assert_eq!(FieldValue::from(serde_json::json!(0.5)).to_json_literal(), "0.5");
        assert_eq!(FieldValue::from(serde_json::json!("abc")).to_json_literal(), "\"abc\"");
        assert_eq!(FieldValue::from(serde_json::json!("a\"b")).to_json_literal(), "\"a\\\"b\"");
        assert_eq!(FieldValue::from(serde_json::json!(true)).to_json_literal(), "true");
        assert_eq!(FieldValue::from(serde_json::json!([1, 2])).to_json_literal(), "\"[1,2]\"");
    }

    #[test]
    fn test_decode_broadcast() {
        let line = r#"{"Time":"2024-08-01T10:00:00.1","Offset":0,"Length":0,"Type":"SCM","Message":{"ID":60210816,"Type":7,"TamperPhy":0,"TamperEnc":0,"Consumption":1234,"ChecksumVal":1}}"#;
        let b: DecodedBroadcast = serde_json::from_str(line).unwrap();
        assert_eq!(b.time, "2024-08-01T10:00:00.1");
        assert_eq!(b.message.get("ID").and_then(|v| v.as_meter_id()), Some(60210816));
        assert!(b.message.contains("Consumption"));
        assert!(!b.message.contains("EndpointID"));
    }
}
