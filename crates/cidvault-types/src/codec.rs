//! Binary ⇄ text-safe transcoding.
//!
//! Every boundary where binary data crosses a JSON or text channel goes
//! through these helpers: file bytes before sealing, envelope fields, the
//! pinned blob, and the hex-framed decrypt request sent to the identity
//! provider.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::TypeError;

/// Standard (padded) base64 encoding.
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard base64, ignoring surrounding whitespace.
pub fn decode_base64(text: &str) -> Result<Vec<u8>, TypeError> {
    STANDARD
        .decode(text.trim())
        .map_err(|e| TypeError::InvalidBase64(e.to_string()))
}

/// Interpret bytes as UTF-8 text.
pub fn utf8_from_bytes(bytes: Vec<u8>) -> Result<String, TypeError> {
    String::from_utf8(bytes).map_err(|e| TypeError::InvalidUtf8(e.to_string()))
}

/// `0x`-prefixed lowercase hex.
pub fn encode_hex_prefixed(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode hex with an optional `0x` prefix.
pub fn decode_hex_prefixed(text: &str) -> Result<Vec<u8>, TypeError> {
    let trimmed = text.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    hex::decode(digits).map_err(|e| TypeError::InvalidHex(e.to_string()))
}

/// Serialize a value to JSON and wrap it as base64 text.
pub fn encode_json_base64<T: Serialize>(value: &T) -> Result<String, TypeError> {
    let json = serde_json::to_vec(value).map_err(|e| TypeError::Serialization(e.to_string()))?;
    Ok(encode_base64(&json))
}

/// Inverse of [`encode_json_base64`], starting from raw fetched bytes.
///
/// The bytes must be UTF-8 base64 text whose decoded content is JSON for `T`.
pub fn decode_json_base64<T: DeserializeOwned>(raw: &[u8]) -> Result<T, TypeError> {
    let text = std::str::from_utf8(raw).map_err(|e| TypeError::InvalidUtf8(e.to_string()))?;
    let json = decode_base64(text)?;
    serde_json::from_slice(&json).map_err(|e| TypeError::Serialization(e.to_string()))
}
