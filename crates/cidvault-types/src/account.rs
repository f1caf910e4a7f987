use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// An identity-provider account.
///
/// Accounts are 20-byte addresses. They are rendered as lowercase
/// `0x`-prefixed hex and compared byte-wise, so checksummed and lowercase
/// spellings of the same address are equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Account([u8; 20]);

impl Account {
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Derive a deterministic account from a label (tests and local wallets).
    pub fn from_label(label: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"cidvault-account-v1:");
        hasher.update(label.as_bytes());
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&hasher.finalize().as_bytes()[..20]);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Lowercase `0x`-prefixed hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse from hex, with or without the `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let stripped = s.trim().trim_start_matches("0x").trim_start_matches("0X");
        let bytes = hex::decode(stripped).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != 20 {
            return Err(TypeError::InvalidLength {
                expected: 20,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// 32-byte left-padded form, as used for indexed event topics.
    pub fn to_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&self.0);
        word
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Account(0x{}…)", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Account {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for Account {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Account> for String {
    fn from(account: Account) -> Self {
        account.to_hex()
    }
}

/// Network identifier reported by the identity provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChainId(pub u64);

impl ChainId {
    pub const MAINNET: Self = Self(1);
    pub const SEPOLIA: Self = Self(11_155_111);

    /// `0x`-prefixed hex quantity, as JSON-RPC reports it.
    pub fn to_quantity(&self) -> String {
        format!("{:#x}", self.0)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChainId {
    type Err = TypeError;

    /// Accepts decimal (`11155111`) or hex quantity (`0xaa36a7`) spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex_digits) => u64::from_str_radix(hex_digits, 16),
            None => s.parse::<u64>(),
        };
        parsed
            .map(Self)
            .map_err(|_| TypeError::InvalidChainId(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let account = Account::from_label("alice");
        let parsed = Account::from_hex(&account.to_hex()).unwrap();
        assert_eq!(account, parsed);
    }

    #[test]
    fn parse_ignores_checksum_case() {
        let lower = Account::from_hex("0x52908400098527886e0f7030069857d2e4169ee7").unwrap();
        let mixed = Account::from_hex("0x52908400098527886E0F7030069857D2E4169EE7").unwrap();
        assert_eq!(lower, mixed);
        assert_eq!(lower.to_hex(), "0x52908400098527886e0f7030069857d2e4169ee7");
    }

    #[test]
    fn rejects_wrong_length() {
        let err = Account::from_hex("0x1234").unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidLength {
                expected: 20,
                actual: 2
            }
        );
    }

    #[test]
    fn word_is_left_padded() {
        let account = Account::from_bytes([0xab; 20]);
        let word = account.to_word();
        assert_eq!(&word[..12], &[0u8; 12]);
        assert_eq!(&word[12..], &[0xab; 20]);
    }

    #[test]
    fn labels_are_distinct() {
        assert_ne!(Account::from_label("alice"), Account::from_label("bob"));
    }

    #[test]
    fn chain_id_parses_decimal_and_hex() {
        assert_eq!("11155111".parse::<ChainId>().unwrap(), ChainId::SEPOLIA);
        assert_eq!("0xaa36a7".parse::<ChainId>().unwrap(), ChainId::SEPOLIA);
        assert!("sepolia".parse::<ChainId>().is_err());
    }

    #[test]
    fn chain_id_quantity() {
        assert_eq!(ChainId::SEPOLIA.to_quantity(), "0xaa36a7");
        assert_eq!(ChainId::MAINNET.to_quantity(), "0x1");
    }

    #[test]
    fn serde_uses_hex_string() {
        let account = Account::from_bytes([1; 20]);
        let json = serde_json::to_string(&account).unwrap();
        assert_eq!(json, format!("\"{}\"", account.to_hex()));
        let parsed: Account = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, account);
    }
}
