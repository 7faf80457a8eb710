//! Users and the loader interface

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::labels::Labels;

/// A user claims are made on behalf of
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct User {
    pub name: String,

    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub labels: Labels,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub secrets: BTreeMap<String, String>,

    /// Built-in administrator: full privileges everywhere
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub domain_admin: bool,

    /// Hex encoded SHA-256 of the password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_sha256: Option<String>,
}

impl User {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a label
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Store the password hash
    pub fn with_password(mut self, password: &str) -> Self {
        self.password_sha256 = Some(hash_password(password));
        self
    }

    /// Check a plain text password against the stored hash
    pub fn check_password(&self, password: &str) -> bool {
        self.password_sha256
            .as_deref()
            .is_some_and(|stored| stored.eq_ignore_ascii_case(&hash_password(password)))
    }
}

fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Source of users
pub trait UserLoader: Send + Sync {
    /// All users, by name
    fn load_all(&self) -> Result<BTreeMap<String, User>>;

    /// A single user, if known
    fn load_by_name(&self, name: &str) -> Result<Option<User>>;

    /// Look up a user and verify the password
    fn authenticate(&self, name: &str, password: &str) -> Result<User> {
        match self.load_by_name(name)? {
            Some(user) if user.check_password(password) => Ok(user),
            _ => Err(Error::AuthenticationFailed {
                user: name.to_string(),
            }),
        }
    }
}

/// Users held in memory
#[derive(Debug, Clone, Default)]
pub struct StaticUserLoader {
    users: BTreeMap<String, User>,
}

impl StaticUserLoader {
    pub fn new(users: impl IntoIterator<Item = User>) -> Self {
        Self {
            users: users.into_iter().map(|u| (u.name.clone(), u)).collect(),
        }
    }
}

impl UserLoader for StaticUserLoader {
    fn load_all(&self) -> Result<BTreeMap<String, User>> {
        Ok(self.users.clone())
    }

    fn load_by_name(&self, name: &str) -> Result<Option<User>> {
        Ok(self.users.get(name).cloned())
    }
}
