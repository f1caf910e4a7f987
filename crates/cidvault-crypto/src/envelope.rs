//! Sealed payload format.
//!
//! An envelope is a NaCl box from a fresh ephemeral X25519 key pair to the
//! recipient's public key: the X25519 shared secret is run through HSalsa20
//! and the plaintext sealed with XSalsa20-Poly1305 under a random 24-byte
//! nonce. This is the `x25519-xsalsa20-poly1305` scheme wallets expose
//! through `eth_getEncryptionPublicKey` and `eth_decrypt`.
//!
//! On the wire an envelope is JSON with base64 binary fields. The pinned
//! blob is that JSON wrapped once more in base64, and decrypt requests carry
//! the JSON as `0x`-prefixed hex.

use cidvault_types::codec;
use crypto_box::aead::{self, Aead};
use crypto_box::SalsaBox;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{CryptoError, CryptoResult};
use crate::keys::{PublicKey, SecretKey};

/// The single sealing scheme this build produces and opens.
pub const ENVELOPE_VERSION: &str = "x25519-xsalsa20-poly1305";

type Nonce = aead::Nonce<SalsaBox>;

const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;

/// Self-describing sealed payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextEnvelope {
    pub version: String,
    #[serde(with = "b64")]
    pub nonce: Vec<u8>,
    #[serde(rename = "ephemPublicKey")]
    pub ephem_public_key: PublicKey,
    #[serde(with = "b64")]
    pub ciphertext: Vec<u8>,
}

impl CiphertextEnvelope {
    /// Seal `plaintext` so that only the holder of `recipient`'s secret can open it.
    pub fn seal(recipient: &PublicKey, plaintext: &[u8]) -> CryptoResult<Self> {
        let ephemeral = SecretKey::generate();
        let ephem_public_key = ephemeral.public_key();
        let shared = ephemeral.diffie_hellman(recipient);
        if shared == [0u8; 32] {
            return Err(CryptoError::EncryptionFailed(
                "recipient key is a low-order point".into(),
            ));
        }

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill(&mut nonce);

        let ciphertext = salsa_box(recipient, &ephemeral)
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| CryptoError::EncryptionFailed("AEAD seal failed".into()))?;

        Ok(Self {
            version: ENVELOPE_VERSION.into(),
            nonce: nonce.to_vec(),
            ephem_public_key,
            ciphertext,
        })
    }

    /// Open the envelope with the recipient's secret key.
    ///
    /// Only identity providers call this; CidVault's own code path requests
    /// decryption through [`crate::IdentityProvider::decrypt`].
    pub fn open(&self, secret: &SecretKey) -> CryptoResult<Vec<u8>> {
        self.check_shape()?;
        let shared = secret.diffie_hellman(&self.ephem_public_key);
        if shared == [0u8; 32] {
            return Err(CryptoError::DecryptionFailed(
                "ephemeral key is a low-order point".into(),
            ));
        }
        salsa_box(&self.ephem_public_key, secret)
            .decrypt(Nonce::from_slice(&self.nonce), self.ciphertext.as_slice())
            .map_err(|_| {
                CryptoError::DecryptionFailed(
                    "authentication failed (wrong key or tampered data)".into(),
                )
            })
    }

    /// Structural validation that needs no key.
    pub fn check_shape(&self) -> CryptoResult<()> {
        if self.version != ENVELOPE_VERSION {
            return Err(CryptoError::DecryptionFailed(format!(
                "unsupported envelope version {:?}",
                self.version
            )));
        }
        if self.nonce.len() != NONCE_LEN {
            return Err(CryptoError::DecryptionFailed(format!(
                "nonce must be {NONCE_LEN} bytes, got {}",
                self.nonce.len()
            )));
        }
        if self.ciphertext.len() < TAG_LEN {
            return Err(CryptoError::DecryptionFailed("ciphertext shorter than tag".into()));
        }
        Ok(())
    }

    /// Canonical stored form: base64 text of the envelope JSON.
    pub fn to_text(&self) -> CryptoResult<String> {
        codec::encode_json_base64(self).map_err(|e| CryptoError::EncryptionFailed(e.to_string()))
    }

    /// Parse the canonical stored form from raw fetched bytes.
    pub fn from_text(raw: &[u8]) -> CryptoResult<Self> {
        let envelope: Self = codec::decode_json_base64(raw)
            .map_err(|e| CryptoError::DecryptionFailed(format!("malformed envelope: {e}")))?;
        envelope.check_shape()?;
        Ok(envelope)
    }

    /// Hex-framed JSON, as carried by provider decrypt requests.
    pub fn to_hex_request(&self) -> CryptoResult<String> {
        let json =
            serde_json::to_vec(self).map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
        Ok(codec::encode_hex_prefixed(&json))
    }

    /// Inverse of [`Self::to_hex_request`].
    pub fn from_hex_request(hex: &str) -> CryptoResult<Self> {
        let json = codec::decode_hex_prefixed(hex)
            .map_err(|e| CryptoError::DecryptionFailed(format!("bad request framing: {e}")))?;
        let envelope: Self = serde_json::from_slice(&json)
            .map_err(|e| CryptoError::DecryptionFailed(format!("malformed envelope: {e}")))?;
        envelope.check_shape()?;
        Ok(envelope)
    }
}

fn salsa_box(peer: &PublicKey, secret: &SecretKey) -> SalsaBox {
    SalsaBox::new(
        &crypto_box::PublicKey::from(*peer.as_bytes()),
        &crypto_box::SecretKey::from(*secret.as_bytes()),
    )
}

mod b64 {
    use cidvault_types::codec;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&codec::encode_base64(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        codec::decode_base64(&text).map_err(serde::de::Error::custom)
    }
}
