//! CBOR parameter encoding.
//!
//! Framing belongs to the transport; these helpers only turn typed
//! operation arguments into the owned payload buffers requests carry.

use crate::error::WicketResult;
use std::io::Cursor;

/// Encode operation parameters into an owned CBOR payload.
pub fn encode_params<T: serde::Serialize>(value: &T) -> WicketResult<Vec<u8>> {
    let mut payload = Vec::new();
    ciborium::into_writer(value, &mut payload)?;
    Ok(payload)
}

/// Decode a CBOR payload into typed operation parameters.
pub fn decode_params<T: serde::de::DeserializeOwned>(data: &[u8]) -> WicketResult<T> {
    let cursor = Cursor::new(data);
    let value: T = ciborium::from_reader(cursor)?;
    Ok(value)
}

/// The canonical empty payload (CBOR null), for void operations.
pub fn empty_params() -> Vec<u8> {
    vec![0xf6]
}
