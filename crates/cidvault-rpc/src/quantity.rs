use crate::error::{RpcError, RpcResult};

/// Parse a `0x`-prefixed hex quantity.
pub fn parse_quantity(value: &str) -> RpcResult<u64> {
    let digits = value
        .strip_prefix("0x")
        .ok_or_else(|| RpcError::Decode(format!("quantity without 0x prefix: {value:?}")))?;
    if digits.is_empty() {
        return Err(RpcError::Decode("empty quantity".into()));
    }
    u64::from_str_radix(digits, 16)
        .map_err(|e| RpcError::Decode(format!("bad quantity {value:?}: {e}")))
}

/// Render a `0x`-prefixed hex quantity with no leading zeros.
pub fn to_quantity(value: u64) -> String {
    format!("{value:#x}")
}
