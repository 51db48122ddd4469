// BLOB version prefix helpers. [version: u8][wincode payload].
// Numeric arrays of a series (times, data) are stored this way.

use super::StorageError;

pub(super) const BLOB_VERSION: u8 = 1;

pub(super) fn with_version_prefix(version: u8, payload: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + payload.len());
    out.push(version);
    out.extend_from_slice(&payload);
    out
}

/// Payload after the version byte. Unknown versions are an error, not a guess.
pub(super) fn blob_payload(bytes: &[u8], expected_version: u8) -> Result<&[u8], StorageError> {
    match bytes.split_first() {
        Some((&v, payload)) if v == expected_version => Ok(payload),
        Some((&v, _)) => Err(StorageError::Codec(format!(
            "blob version {} (expected {})",
            v, expected_version
        ))),
        None => Err(StorageError::Codec("empty blob".into())),
    }
}

pub(super) fn encode_f64s(values: &[f64]) -> Result<Vec<u8>, StorageError> {
    let payload = wincode::serialize(&values.to_vec())
        .map_err(|e| StorageError::Codec(format!("wincode: {}", e)))?;
    Ok(with_version_prefix(BLOB_VERSION, payload))
}

pub(super) fn decode_f64s(bytes: &[u8]) -> Result<Vec<f64>, StorageError> {
    wincode::deserialize::<Vec<f64>>(blob_payload(bytes, BLOB_VERSION)?)
        .map_err(|e| StorageError::Codec(format!("wincode deserialize f64 array: {}", e)))
}

pub(super) fn encode_i64s(values: &[i64]) -> Result<Vec<u8>, StorageError> {
    let payload = wincode::serialize(&values.to_vec())
        .map_err(|e| StorageError::Codec(format!("wincode: {}", e)))?;
    Ok(with_version_prefix(BLOB_VERSION, payload))
}

pub(super) fn decode_i64s(bytes: &[u8]) -> Result<Vec<i64>, StorageError> {
    wincode::deserialize::<Vec<i64>>(blob_payload(bytes, BLOB_VERSION)?)
        .map_err(|e| StorageError::Codec(format!("wincode deserialize i64 array: {}", e)))
}
