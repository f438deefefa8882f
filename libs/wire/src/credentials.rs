//! Client credentials.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors decoding a credentials token.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialsError {
    #[error("{0}")]
    NotBase64(String),

    #[error("token is not UTF-8")]
    NotUtf8,

    #[error("token must encode user:password")]
    MissingSeparator,
}

/// Credentials as sent by clients: a base64 `user:password` token and the
/// project the caller acts in.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub token: String,
    pub project: String,
}

impl Credentials {
    /// Encode a username and password into a token.
    pub fn new(username: &str, password: &str, project: impl Into<String>) -> Self {
        Self {
            token: STANDARD.encode(format!("{username}:{password}")),
            project: project.into(),
        }
    }

    /// Decode the token. The password may itself contain `:`.
    pub fn decode(&self) -> Result<BasicAuth, CredentialsError> {
        let raw = STANDARD
            .decode(self.token.trim())
            .map_err(|e| CredentialsError::NotBase64(e.to_string()))?;
        let raw = String::from_utf8(raw).map_err(|_| CredentialsError::NotUtf8)?;
        let (username, password) = raw
            .split_once(':')
            .ok_or(CredentialsError::MissingSeparator)?;

        Ok(BasicAuth {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .field("project", &self.project)
            .finish()
    }
}

/// A decoded token.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_may_contain_colon() {
        let auth = Credentials::new("alice", "pa:ss", "tenantA").decode().unwrap();
        assert_eq!(auth.username, "alice");
        assert_eq!(auth.password, "pa:ss");
    }

    #[test]
    fn test_bad_tokens() {
        let not_base64 = Credentials {
            token: "%%%".into(),
            project: "p".into(),
        };
        assert!(matches!(not_base64.decode(), Err(CredentialsError::NotBase64(_))));

        let no_colon = Credentials {
            token: STANDARD.encode("alice"),
            project: "p".into(),
        };
        assert_eq!(no_colon.decode(), Err(CredentialsError::MissingSeparator));

        let not_utf8 = Credentials {
            token: STANDARD.encode([0xff, 0xfe, b':']),
            project: "p".into(),
        };
        assert_eq!(not_utf8.decode(), Err(CredentialsError::NotUtf8));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = Credentials::new("alice", "hunter2", "tenantA");
        let auth = creds.decode().unwrap();
        assert!(!format!("{creds:?}").contains(&creds.token));
        assert!(!format!("{auth:?}").contains("hunter2"));
    }
}
