use super::AmrError;
use crate::models::DecodedBroadcast;

/// rtlamr prints this once its sample source is gone, nothing follows it
const SAMPLES_EOF_MARKER: &str = "Error reading samples:";

pub fn decode_line(line: &str) -> Result<DecodedBroadcast, AmrError> {
    let line = line.trim();
    if !line.starts_with('{') {
        return Err(AmrError::NotStructured);
    }

    return Ok(serde_json::from_str(line)?);
}

pub fn is_upstream_eof(line: &str) -> bool {
    let line = line.trim();
    line.contains(SAMPLES_EOF_MARKER) && line.ends_with("EOF")
}
