//! Credential handling for the HTTP collaborators.

pub mod credentials;

pub use credentials::{BasicCredentials, SecretString};
