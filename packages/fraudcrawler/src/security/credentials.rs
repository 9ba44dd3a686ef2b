//! API keys and basic-auth pairs that never show up in logs.

use reqwest::RequestBuilder;
use secrecy::{ExposeSecret, SecretBox};
use std::fmt;

const REDACTED: &str = "[REDACTED]";

/// An API key or password. Formats as `[REDACTED]` under both `{}` and `{:?}`.
pub struct SecretString(SecretBox<str>);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretBox::new(value.into().into_boxed_str()))
    }

    /// The raw value, for building a request.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }
}

impl Clone for SecretString {
    fn clone(&self) -> Self {
        self.expose().into()
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// User and password for HTTP basic auth (DataForSEO).
#[derive(Clone)]
pub struct BasicCredentials {
    pub user: String,
    pub password: SecretString,
}

impl BasicCredentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: SecretString::new(password),
        }
    }

    /// Attach the pair as an `Authorization: Basic` header.
    pub fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.user, Some(self.password.expose()))
    }
}

impl fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BasicCredentials({}:{REDACTED})", self.user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_not_in_debug_or_display() {
        let secret = SecretString::new("serp-key-1234");
        assert_eq!(format!("{:?}", secret), "[REDACTED]");
        assert_eq!(format!("{}", secret), "[REDACTED]");
        assert_eq!(secret.expose(), "serp-key-1234");
        assert_eq!(secret.clone().expose(), "serp-key-1234");
    }

    #[test]
    fn test_basic_credentials_debug_hides_password() {
        let creds = BasicCredentials::new("crawler@example.ch", "hunter2");
        assert_eq!(
            format!("{:?}", creds),
            "BasicCredentials(crawler@example.ch:[REDACTED])"
        );
    }

    #[test]
    fn test_authorize_sets_basic_header() {
        let creds = BasicCredentials::new("crawler@example.ch", "hunter2");
        let request = creds
            .authorize(reqwest::Client::new().post("https://api.dataforseo.com/v3"))
            .build()
            .unwrap();
        let header = request.headers()[reqwest::header::AUTHORIZATION]
            .to_str()
            .unwrap();
        assert!(header.starts_with("Basic "));
    }
}
