//! AEAD seal/open of secret bytes under a passphrase-derived key (§4.1)
//!
//! Pure functions over bytes: no store, no credential model. A fresh salt
//! and nonce are drawn for every [`seal`] call so identical plaintexts
//! under the same passphrase never produce identical ciphertexts.

use crate::core::error::CryptoError;
use crate::core::secure::Passphrase;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use scrypt::Params as ScryptParams;
use serde::{Deserialize, Serialize};

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;

const SCRYPT_LOG_N: u8 = 15; // N = 2^15
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;

/// The fixed probe string sealed at store init time; a successful decrypt
/// with the supplied passphrase proves the passphrase is correct without
/// exposing any credential (§4.2, §9).
pub const MASTER_KEY_CHECK_PROBE: &[u8] = b"credential-vault-core/master-key-check/v1";

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        STANDARD.encode(bytes).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(d)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// scrypt parameters recorded verbatim in the envelope so the KDF can be
/// re-run on open even if future builds change the defaults (§4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdfParams {
    #[serde(with = "base64_bytes")]
    pub salt: Vec<u8>,
    pub n: u8,
    pub r: u32,
    pub p: u32,
    pub dk_len: usize,
}

impl KdfParams {
    fn fresh() -> Result<Self, CryptoError> {
        let mut salt = vec![0u8; SALT_LEN];
        OsRng.try_fill_bytes(&mut salt)
            .map_err(|_| CryptoError::RandomGeneration)?;
        Ok(Self {
            salt,
            n: SCRYPT_LOG_N,
            r: SCRYPT_R,
            p: SCRYPT_P,
            dk_len: KEY_LEN,
        })
    }

    fn derive_key(&self, passphrase: &Passphrase) -> Result<[u8; KEY_LEN], CryptoError> {
        let params = ScryptParams::new(self.n, self.r, self.p, self.dk_len)
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
        let mut key = [0u8; KEY_LEN];
        passphrase
            .with_exposed(|bytes| scrypt::scrypt(bytes, &self.salt, &params, &mut key))
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
        Ok(key)
    }
}

/// Self-describing ciphertext unit persisted in the store's `secrets` map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    pub algorithm: String,
    pub kdf_params: KdfParams,
    #[serde(with = "base64_bytes")]
    pub nonce: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub tag: Vec<u8>,
}

/// Seal `plaintext` under `passphrase`, drawing a fresh salt and nonce.
pub fn seal(passphrase: &Passphrase, plaintext: &[u8]) -> Result<EncryptedEnvelope, CryptoError> {
    let kdf_params = KdfParams::fresh()?;
    let key_bytes = kdf_params.derive_key(passphrase)?;
    let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
    let cipher = Aes256Gcm::new(key);

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng
        .try_fill_bytes(&mut nonce_bytes)
        .map_err(|_| CryptoError::RandomGeneration)?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    let mut sealed = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
    let tag = sealed.split_off(sealed.len() - TAG_LEN);

    Ok(EncryptedEnvelope {
        algorithm: "aes-256-gcm".to_string(),
        kdf_params,
        nonce: nonce_bytes.to_vec(),
        ciphertext: sealed,
        tag,
    })
}

/// Open an envelope. A bad passphrase or corrupted envelope both surface
/// as [`CryptoError::DecryptionFailed`]; the caller (Vault Service) is
/// responsible for mapping that to `WRONG_KEY` vs. `CORRUPT` depending on
/// whether this is the `masterKeyCheck` probe (§4.1).
pub fn open(passphrase: &Passphrase, envelope: &EncryptedEnvelope) -> Result<Vec<u8>, CryptoError> {
    if envelope.algorithm != "aes-256-gcm" {
        return Err(CryptoError::UnsupportedAlgorithm(envelope.algorithm.clone()));
    }
    let key_bytes = envelope.kdf_params.derive_key(passphrase)?;
    let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
    let cipher = Aes256Gcm::new(key);
    let nonce = Nonce::from_slice(&envelope.nonce);

    let mut combined = envelope.ciphertext.clone();
    combined.extend_from_slice(&envelope.tag);

    cipher
        .decrypt(nonce, combined.as_slice())
        .map_err(|_| CryptoError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_then_open_round_trips() {
        let pass = Passphrase::from("correct horse battery staple");
        let envelope = seal(&pass, b"top secret").unwrap();
        let plaintext = open(&pass, &envelope).unwrap();
        assert_eq!(plaintext, b"top secret");
    }

    #[test]
    fn open_with_wrong_passphrase_fails() {
        let pass = Passphrase::from("right");
        let wrong = Passphrase::from("wrong");
        let envelope = seal(&pass, b"data").unwrap();
        assert!(open(&wrong, &envelope).is_err());
    }

    #[test]
    fn identical_plaintext_yields_distinct_ciphertext() {
        let pass = Passphrase::from("same passphrase");
        let a = seal(&pass, b"same plaintext").unwrap();
        let b = seal(&pass, b"same plaintext").unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.kdf_params.salt, b.kdf_params.salt);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn corrupted_tag_fails_to_open() {
        let pass = Passphrase::from("pw");
        let mut envelope = seal(&pass, b"data").unwrap();
        envelope.tag[0] ^= 0xFF;
        assert!(open(&pass, &envelope).is_err());
    }

    #[test]
    fn master_key_check_probe_round_trips() {
        let pass = Passphrase::from("master");
        let envelope = seal(&pass, MASTER_KEY_CHECK_PROBE).unwrap();
        assert_eq!(open(&pass, &envelope).unwrap(), MASTER_KEY_CHECK_PROBE);
    }
}
