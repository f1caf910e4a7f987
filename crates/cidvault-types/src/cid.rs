use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Number of leading characters kept by [`Cid::short`].
const SHORT_HEAD: usize = 6;
/// Number of trailing characters kept by [`Cid::short`].
const SHORT_TAIL: usize = 4;

/// Content identifier returned by the blob store.
///
/// A `Cid` is opaque to CidVault: it is derived from the stored payload by
/// the blob store and only ever compared, displayed, or sent back to the
/// store and the ledger. The only structural rule enforced here is that it
/// is a non-empty token safe to splice into a gateway URL path.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cid(String);

impl Cid {
    /// Parse and validate a content identifier.
    pub fn new(value: impl Into<String>) -> Result<Self, TypeError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty()
            || !trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(TypeError::InvalidCid(value));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Derive a local CID from payload bytes.
    ///
    /// Used by in-process stores that have no remote hashing service. The
    /// result is a BLAKE3 digest rendered in the `bafk` raw-leaf style.
    pub fn derive(payload: &[u8]) -> Self {
        let hash = blake3::hash(payload);
        Self(format!("bafk{}", hex::encode(&hash.as_bytes()[..26])))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Truncated form used as a fallback display name.
    ///
    /// Short identifiers are returned whole.
    pub fn short(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= SHORT_HEAD + SHORT_TAIL + 2 {
            return self.0.clone();
        }
        let head: String = chars[..SHORT_HEAD].iter().collect();
        let tail: String = chars[chars.len() - SHORT_TAIL..].iter().collect();
        format!("{head}…{tail}")
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cid({})", self.short())
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Cid {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Cid {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Cid> for String {
    fn from(cid: Cid) -> Self {
        cid.0
    }
}

impl AsRef<str> for Cid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
