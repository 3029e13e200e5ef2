//! Local username/password authentication against the account table.

pub mod pipeline;
pub mod policy;
pub mod stores;
pub mod verifier;

pub use pipeline::{AUTH_SUCCESS_MESSAGE, AuthDecision, AuthPipeline, LoginRequest};
pub use policy::{ALLOW_LOCAL_LOGIN, PolicyInput};
pub use stores::{AttemptStore, IdentityStore, NewIdentity, SettingsMap, SiteConfig, Uid};
pub use verifier::{AccountRecord, CredentialVerifier};
