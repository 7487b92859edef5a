//! The Vault Service: configuration and orchestration (§4.6, §13)

pub mod config;
pub mod vault;

pub use config::{VaultConfig, VaultConfigBuilder};
pub use vault::{
    AccountPatch, CheckoutOutcome, CreateCredentialInput, CredentialPatch, VaultService,
    VaultServiceBuilder,
};
