//! Contract ABI for the document registry.
//!
//! ```text
//! function registerDocument(string cid)
//! event DocumentRegistered(address indexed owner, string cid, uint256 timestamp)
//! ```
//!
//! Only the shapes these two signatures need are implemented: 32-byte words,
//! `uint256` values that fit in a `u64`, and one dynamic `string`.

use cidvault_types::Account;
use sha3::{Digest, Keccak256};

use crate::error::{RegistryError, RegistryResult};

pub const REGISTER_SIGNATURE: &str = "registerDocument(string)";
pub const REGISTERED_EVENT_SIGNATURE: &str = "DocumentRegistered(address,string,uint256)";

const WORD: usize = 32;

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// First four bytes of the signature hash.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// `topic0` of every `DocumentRegistered` log.
pub fn registered_topic() -> [u8; 32] {
    keccak256(REGISTERED_EVENT_SIGNATURE.as_bytes())
}

pub fn word_from_u64(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

fn invalid(reason: impl Into<String>) -> RegistryError {
    RegistryError::InvalidEvent(reason.into())
}

fn u64_from_word(word: &[u8]) -> RegistryResult<u64> {
    if word.len() != WORD {
        return Err(invalid(format!("word of {} bytes", word.len())));
    }
    if word[..24].iter().any(|b| *b != 0) {
        return Err(invalid("uint256 value exceeds u64"));
    }
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&word[24..]);
    Ok(u64::from_be_bytes(tail))
}

fn word_at(data: &[u8], offset: usize) -> RegistryResult<&[u8]> {
    offset
        .checked_add(WORD)
        .and_then(|end| data.get(offset..end))
        .ok_or_else(|| invalid(format!("data truncated at offset {offset}")))
}

fn encode_string_tail(out: &mut Vec<u8>, value: &str) {
    let bytes = value.as_bytes();
    out.extend_from_slice(&word_from_u64(bytes.len() as u64));
    out.extend_from_slice(bytes);
    let padding = (WORD - bytes.len() % WORD) % WORD;
    out.extend(std::iter::repeat(0u8).take(padding));
}

fn decode_string_at(data: &[u8], offset: usize) -> RegistryResult<String> {
    let len = u64_from_word(word_at(data, offset)?)? as usize;
    let start = offset + WORD;
    let bytes = start
        .checked_add(len)
        .and_then(|end| data.get(start..end))
        .ok_or_else(|| invalid("string runs past end of data"))?;
    String::from_utf8(bytes.to_vec()).map_err(|_| invalid("string is not UTF-8"))
}

/// Calldata for `registerDocument(cid)`.
pub fn encode_register_document(cid: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + WORD * 3 + cid.len());
    out.extend_from_slice(&selector(REGISTER_SIGNATURE));
    out.extend_from_slice(&word_from_u64(WORD as u64));
    encode_string_tail(&mut out, cid);
    out
}

/// Recover the CID argument from `registerDocument` calldata.
pub fn decode_register_document(calldata: &[u8]) -> RegistryResult<String> {
    if calldata.len() < 4 {
        return Err(invalid("calldata shorter than selector"));
    }
    let (head, args) = calldata.split_at(4);
    if head != selector(REGISTER_SIGNATURE) {
        return Err(invalid("selector is not registerDocument(string)"));
    }
    let offset = u64_from_word(word_at(args, 0)?)? as usize;
    decode_string_at(args, offset)
}

/// Non-indexed log data of `DocumentRegistered`: `(string cid, uint256 timestamp)`.
pub fn encode_registered_data(cid: &str, timestamp: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(WORD * 4 + cid.len());
    out.extend_from_slice(&word_from_u64((WORD * 2) as u64));
    out.extend_from_slice(&word_from_u64(timestamp));
    encode_string_tail(&mut out, cid);
    out
}

/// Fields of one decoded `DocumentRegistered` log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedRegistration {
    pub owner: Account,
    pub cid: String,
    pub timestamp: u64,
}

pub fn decode_registered_log(
    topics: &[[u8; 32]],
    data: &[u8],
) -> RegistryResult<DecodedRegistration> {
    match topics.first() {
        Some(topic) if *topic == registered_topic() => {}
        _ => return Err(invalid("topic0 is not DocumentRegistered")),
    }
    let owner_word = topics
        .get(1)
        .ok_or_else(|| invalid("missing indexed owner topic"))?;
    if owner_word[..12].iter().any(|b| *b != 0) {
        return Err(invalid("owner topic is not an address"));
    }
    let mut owner = [0u8; 20];
    owner.copy_from_slice(&owner_word[12..]);

    let offset = u64_from_word(word_at(data, 0)?)? as usize;
    let timestamp = u64_from_word(word_at(data, WORD)?)?;
    let cid = decode_string_at(data, offset)?;

    Ok(DecodedRegistration {
        owner: Account::from_bytes(owner),
        cid,
        timestamp,
    })
}
