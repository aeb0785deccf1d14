use super::registry::{MeterConfig, Registry};
use super::AmrError;
use crate::models::{FieldValue, Payload};

/// Returns the first candidate id field present in the payload together with its value.
/// Candidates are probed in the given order, see `models::ID_FIELDS`.
pub fn resolve_identity<'a>(payload: &'a Payload, candidates: &[&'static str]) -> Result<(&'a FieldValue, &'static str), AmrError> {
    for field in candidates.iter().copied() {
        if let Some(value) = payload.get(field) {
            return Ok((value, field));
        }
    }

    Err(AmrError::UnresolvedIdentity)
}

/// Look up the watched meter and make sure the id arrived through the field
/// of the message type configured for it
pub fn check_msg_type<'r>(registry: &'r Registry, id_value: &FieldValue, id_field: &'static str) -> Result<&'r MeterConfig, AmrError> {
    let meter = id_value.as_meter_id()
        .and_then(|id| registry.get(id))
        .ok_or_else(|| AmrError::UnwatchedMeter(id_value.to_json_literal()))?;

    let expected = meter.msg_type.schema().id_field;
    if expected != id_field {
        return Err(AmrError::TypeMismatch { id: meter.id, expected, found: id_field });
    }

    Ok(meter)
}
