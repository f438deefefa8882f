//! Caller identity and admin policy.
//!
//! Whether a caller may run privileged operations is decided once per
//! invocation by an injected [`AuthorizationPolicy`].

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::BmiError;

pub use bmi_wire::Credentials;

/// A resolved caller.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub password: String,
    pub project: String,
}

impl Identity {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        project: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            project: project.into(),
        }
    }

    /// Decode a client's credentials into an identity.
    pub fn from_credentials(credentials: &Credentials) -> Result<Self, BmiError> {
        let auth = credentials
            .decode()
            .map_err(|e| BmiError::InvalidCredentials(e.to_string()))?;
        Ok(Self::new(auth.username, auth.password, credentials.project.clone()))
    }

    /// The service's own identity, used for startup reconciliation.
    pub fn bootstrap(admin_project: impl Into<String>) -> Self {
        Self::new("", "", admin_project)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("project", &self.project)
            .finish()
    }
}

/// Decides whether an identity may run admin operations.
pub trait AuthorizationPolicy: Send + Sync {
    fn is_admin(&self, identity: &Identity) -> bool;
}

/// Everyone is an admin.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AuthorizationPolicy for AllowAll {
    fn is_admin(&self, _identity: &Identity) -> bool {
        true
    }
}

/// Callers acting in the admin project are admins.
#[derive(Debug, Clone)]
pub struct AdminProject {
    project: String,
}

impl AdminProject {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
        }
    }
}

impl AuthorizationPolicy for AdminProject {
    fn is_admin(&self, identity: &Identity) -> bool {
        identity.project == self.project
    }
}

/// A fixed set of usernames are admins.
#[derive(Debug, Clone, Default)]
pub struct AdminUsers {
    users: BTreeSet<String>,
}

impl AdminUsers {
    pub fn new<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            users: users.into_iter().map(Into::into).collect(),
        }
    }
}

impl AuthorizationPolicy for AdminUsers {
    fn is_admin(&self, identity: &Identity) -> bool {
        self.users.contains(&identity.username)
    }
}

/// Which policy a deployment uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    AllowAll,
    #[default]
    AdminProject,
    AdminUsers,
}

impl std::str::FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allow-all" => Ok(PolicyKind::AllowAll),
            "admin-project" => Ok(PolicyKind::AdminProject),
            "admin-users" => Ok(PolicyKind::AdminUsers),
            other => Err(format!("unknown authorization policy: {other}")),
        }
    }
}

/// Build the configured policy.
pub fn build_policy(
    kind: PolicyKind,
    admin_project: &str,
    admin_users: &[String],
) -> Box<dyn AuthorizationPolicy> {
    match kind {
        PolicyKind::AllowAll => Box::new(AllowAll),
        PolicyKind::AdminProject => Box::new(AdminProject::new(admin_project)),
        PolicyKind::AdminUsers => Box::new(AdminUsers::new(admin_users.iter().cloned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_from_credentials() {
        let creds = Credentials::new("alice", "pa:ss", "tenantA");
        let identity = Identity::from_credentials(&creds).unwrap();
        assert_eq!(identity.username, "alice");
        assert_eq!(identity.password, "pa:ss");
        assert_eq!(identity.project, "tenantA");
        assert!(!format!("{identity:?}").contains("pa:ss"));
    }

    #[test]
    fn test_bad_token_is_invalid_credentials() {
        let creds = Credentials {
            token: "%%%".into(),
            project: "p".into(),
        };
        let err = Identity::from_credentials(&creds).unwrap_err();
        assert!(matches!(err, BmiError::InvalidCredentials(_)));
        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn test_policies() {
        let admin = Identity::new("root", "pw", "bmi_admin");
        let tenant = Identity::new("alice", "pw", "tenantA");

        assert!(AllowAll.is_admin(&tenant));

        let by_project = AdminProject::new("bmi_admin");
        assert!(by_project.is_admin(&admin));
        assert!(!by_project.is_admin(&tenant));

        let by_user = AdminUsers::new(["alice"]);
        assert!(by_user.is_admin(&tenant));
        assert!(!by_user.is_admin(&admin));
    }

    #[test]
    fn test_policy_kind_parse() {
        assert_eq!("allow-all".parse::<PolicyKind>(), Ok(PolicyKind::AllowAll));
        assert_eq!("admin-users".parse::<PolicyKind>(), Ok(PolicyKind::AdminUsers));
        assert!("root".parse::<PolicyKind>().is_err());
        assert_eq!(PolicyKind::default(), PolicyKind::AdminProject);
    }
}
