//! User directory boundary.
//!
//! The relational user store lives outside this crate. Handlers reach it
//! through [`UserDirectory`]; credential verification (including password
//! hashing) is the directory's responsibility.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::config::UserConfig;

/// Clearance given to accounts that do not name one.
pub const DEFAULT_CLEARANCE: &str = "Low";

/// Public identity of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub fullname: String,
    pub role: String,
    pub is_admin: bool,
    pub clearance: String,
}

impl User {
    /// Account with the profile defaults: full name equal to the username,
    /// admin flag derived from the role, `Low` clearance.
    pub fn new(id: i64, username: &str, role: &str) -> Self {
        Self {
            id,
            username: username.to_string(),
            fullname: username.to_string(),
            role: role.to_string(),
            is_admin: role.eq_ignore_ascii_case("admin"),
            clearance: DEFAULT_CLEARANCE.to_string(),
        }
    }
}

/// Errors surfaced by a directory backend.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("user directory unavailable: {0}")]
    Unavailable(String),
}

/// Data-access collaborator for user accounts.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Look up an account by name.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DirectoryError>;

    /// Return the account when `password` matches its credentials.
    async fn verify_password(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, DirectoryError>;
}

/// Directory backed by accounts from the configuration file.
///
/// Intended for development and tests; passwords are compared as stored.
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserDirectory {
    accounts: HashMap<String, (User, String)>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(users: &[UserConfig]) -> Self {
        users.iter().fold(Self::new(), |dir, u| {
            let mut user = User::new(u.id, &u.username, &u.role);
            if let Some(fullname) = &u.fullname {
                user.fullname = fullname.clone();
            }
            if let Some(is_admin) = u.is_admin {
                user.is_admin = is_admin;
            }
            if let Some(clearance) = &u.clearance {
                user.clearance = clearance.clone();
            }
            dir.with_account(user, &u.password)
        })
    }

    pub fn with_user(self, id: i64, username: &str, password: &str, role: &str) -> Self {
        self.with_account(User::new(id, username, role), password)
    }

    /// Add a fully described account.
    pub fn with_account(mut self, user: User, password: &str) -> Self {
        self.accounts
            .insert(user.username.to_lowercase(), (user, password.to_string()));
        self
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DirectoryError> {
        Ok(self
            .accounts
            .get(&username.to_lowercase())
            .map(|(user, _)| user.clone()))
    }

    async fn verify_password(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, DirectoryError> {
        Ok(self
            .accounts
            .get(&username.to_lowercase())
            .filter(|(_, stored)| stored == password)
            .map(|(user, _)| user.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lookup_is_case_insensitive() {
        let dir = InMemoryUserDirectory::new().with_user(1, "Commander", "pw", "Admin");
        let user = dir.find_by_username("commander").await.unwrap().unwrap();
        assert_eq!(user.id, 1);
        assert!(dir.find_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn password_must_match() {
        let dir = InMemoryUserDirectory::from_config(&[UserConfig {
            id: 3,
            username: "ops".into(),
            password: "hunter2".into(),
            role: "User".into(),
            fullname: Some("Field Ops".into()),
            is_admin: None,
            clearance: Some("High".into()),
        }]);
        assert!(dir.verify_password("ops", "hunter2").await.unwrap().is_some());
        assert!(dir.verify_password("ops", "Hunter2").await.unwrap().is_none());
        assert_eq!(dir.len(), 1);

        let user = dir.find_by_username("ops").await.unwrap().unwrap();
        assert_eq!(user.fullname, "Field Ops");
        assert_eq!(user.clearance, "High");
        assert!(!user.is_admin);
    }

    #[test]
    fn profile_defaults_follow_role() {
        let admin = User::new(1, "natasha", "Admin");
        assert!(admin.is_admin);
        assert_eq!(admin.fullname, "natasha");
        assert_eq!(admin.clearance, DEFAULT_CLEARANCE);
        assert!(!User::new(2, "clint", "User").is_admin);
    }
}
