use super::registry::MeterConfig;
use super::AmrError;
use crate::models::Payload;
use serde_json::{Number, Value};

/// Calibrated reading of one broadcast plus the extra fields to forward
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub value: Number,
    /// Already rendered as `"name":value`, in configured order
    pub other_fields: Vec<String>,
}

impl Reading {
    pub fn as_f64(&self) -> f64 {
        self.value.as_f64().unwrap_or(f64::NAN)
    }
}

fn is_one(n: &Number) -> bool {
    n.as_u64() == Some(1) || n.as_f64() == Some(1.0)
}

/// Integer products stay exact integers, anything else goes through f64.
/// A multiplier of exactly one leaves the raw value untouched.
pub fn apply_multiplier(raw: &Number, multiplier: &Number) -> Option<Number> {
    if is_one(multiplier) {
        return Some(raw.clone());
    }

    if let (Some(a), Some(b)) = (raw.as_i64(), multiplier.as_i64()) {
        if let Some(p) = a.checked_mul(b) {
            return Some(Number::from(p));
        }
    }
    if let (Some(a), Some(b)) = (raw.as_u64(), multiplier.as_u64()) {
        if let Some(p) = a.checked_mul(b) {
            return Some(Number::from(p));
        }
    }

    Number::from_f64(raw.as_f64()? * multiplier.as_f64()?)
}

/// Fields missing from the payload are left out, not padded
pub fn format_other_fields(fields: &[String], payload: &Payload) -> Vec<String> {
    fields.iter()
        .filter_map(|name| payload.get(name).map(|v| format!("{}:{}", Value::String(name.clone()), v.to_json_literal())))
        .collect()
}

pub fn extract_reading(meter: &MeterConfig, payload: &Payload) -> Result<Reading, AmrError> {
    let raw = payload.get(&meter.reading_field)
        .ok_or_else(|| AmrError::MissingReading { id: meter.id, field: meter.reading_field.clone() })?;
    let raw = raw.as_number()
        .ok_or_else(|| AmrError::NonNumericReading { id: meter.id, field: meter.reading_field.clone() })?;
    let value = apply_multiplier(raw, &meter.multiplier)
        .ok_or_else(|| AmrError::ReadingOverflow { id: meter.id })?;

    Ok(Reading {
        value,
        other_fields: format_other_fields(&meter.other_fields, payload),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MsgType;
    use serde_json::json;

    fn meter(multiplier: Number, other_fields: Vec<&str>) -> MeterConfig {
        MeterConfig {
            id: 1576312494,
            msg_type: MsgType::R900,
            name: "Water-R900".to_string(),
            reading_field: "Consumption".to_string(),
            multiplier,
            other_fields: other_fields.into_iter().map(String::from).collect(),
            retain: false,
        }
    }

    fn payload(v: Value) -> Payload {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn test_multiplier_exact() {
        let n = apply_multiplier(&Number::from(500), &Number::from(1000)).unwrap();
        assert_eq!(n.as_u64(), Some(500000));
        assert_eq!(n.to_string(), "500000");

        let n = apply_multiplier(&Number::from(500), &Number::from(1)).unwrap();
        assert_eq!(n.to_string(), "500");

        /* 1.0 counts as one as well */
        let raw = Number::from_f64(0.3).unwrap();
        let n = apply_multiplier(&raw, &Number::from_f64(1.0).unwrap()).unwrap();
        assert_eq!(n, raw);
    }

    #[test]
    fn test_multiplier_fractional() {
        let n = apply_multiplier(&Number::from(1234), &Number::from_f64(0.5).unwrap()).unwrap();
        assert_eq!(n.as_f64(), Some(617.0));
        let n = apply_multiplier(&Number::from(-4), &Number::from(3)).unwrap();
        assert_eq!(n.as_i64(), Some(-12));
    }

    #[test]
    fn test_multiplier_overflow_falls_back_to_float() {
        let n = apply_multiplier(&Number::from(u64::MAX), &Number::from(2)).unwrap();
        assert!(n.is_f64());
    }

    #[test]
    fn test_other_fields_formatting() {
        let p = payload(json!({"ID": 1, "Consumption": 10, "Leak": 2, "LeakNow": "yes"}));
        let fields = format_other_fields(&["LeakNow".to_string(), "Missing".to_string(), "Leak".to_string()], &p);
        assert_eq!(fields, vec!["\"LeakNow\":\"yes\"".to_string(), "\"Leak\":2".to_string()]);
    }

    #[test]
    fn test_extract_reading() {
        let m = meter(Number::from(1000), vec!["Leak"]);
        let r = extract_reading(&m, &payload(json!({"ID": 1, "Consumption": 500, "Leak": 0}))).unwrap();
        assert_eq!(r.value.as_u64(), Some(500000));
        assert_eq!(r.as_f64(), 500000.0);
        assert_eq!(r.other_fields, vec!["\"Leak\":0".to_string()]);
    }

    #[test]
    fn test_extract_errors() {
        let m = meter(Number::from(1), vec![]);
        assert!(matches!(
            extract_reading(&m, &payload(json!({"ID": 1}))),
            Err(AmrError::MissingReading { id: 1576312494, .. })
        ));
        assert!(matches!(
            extract_reading(&m, &payload(json!({"ID": 1, "Consumption": "lots"}))),
            Err(AmrError::NonNumericReading { .. })
        ));
    }
}
