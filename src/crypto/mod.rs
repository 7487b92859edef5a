//! The Envelope Codec: AEAD seal/open of individual secrets (§4.1)

mod envelope;

pub use envelope::{seal, open, EncryptedEnvelope, KdfParams, MASTER_KEY_CHECK_PROBE};
