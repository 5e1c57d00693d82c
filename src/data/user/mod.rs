use argon2::password_hash::{rand_core::OsRng, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

pub mod db;

use crate::role::Role;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    #[error("user '{0}' doesn't exist")]
    NotFound(String),
    #[error("username '{0}' is already used")]
    UsernameTaken(String),
    #[error("passwords don't match")]
    PasswordMismatch,
    #[error("current password is wrong")]
    WrongPassword,
    #[error("{0}")]
    InvalidInput(&'static str),
    #[error("unable to hash password")]
    Hashing,
}

/// Salted Argon2 hash in PHC string form.
#[derive(Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub fn new(password: impl AsRef<str>) -> Result<PasswordHash, AccountError> {
        let salt = SaltString::generate(&mut OsRng);

        Argon2::default()
            .hash_password(password.as_ref().as_bytes(), &salt)
            .map(|hash| PasswordHash(hash.to_string()))
            .map_err(|_| AccountError::Hashing)
    }

    pub fn verify(&self, password: impl AsRef<str>) -> bool {
        match argon2::PasswordHash::new(&self.0) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_ref().as_bytes(), &parsed)
                .is_ok(),
            Err(_) => {
                tracing::warn!("Stored password hash is malformed.");
                false
            }
        }
    }
}

impl std::fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PasswordHash(..)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub username: String,
    #[serde(rename = "password_hash")]
    pub pw_hash: PasswordHash,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: Role,
}

impl User {
    pub fn new(
        username: impl ToString,
        password: impl AsRef<str>,
        name: impl ToString,
        role: Role,
    ) -> Result<User, AccountError> {
        let user_id = Uuid::new_v4().to_string();
        tracing::info!("Creating a new user with id: {}", user_id);

        Ok(User {
            user_id,
            username: username.to_string(),
            pw_hash: PasswordHash::new(password)?,
            name: name.to_string(),
            role,
        })
    }
}

/// Caller identity as supplied by the auth token; trusted as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub username: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub user_id: String,
    pub username: String,
    pub name: String,
    pub role: Role,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            user_id: user.user_id,
            username: user.username,
            name: user.name,
            role: user.role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_verifies() {
        let hash = PasswordHash::new("correct horse").unwrap();

        assert!(hash.verify("correct horse"));
        assert!(!hash.verify("battery staple"));
        assert_ne!(hash, PasswordHash::new("correct horse").unwrap(), "hashes must be salted");
    }

    #[test]
    fn malformed_hash_never_verifies() {
        let hash: PasswordHash = serde_json::from_str("\"plaintext\"").unwrap();
        assert!(!hash.verify("plaintext"));
    }

    #[test]
    fn stored_user_hides_plain_password() {
        let user = User::new("student1", "hunter22", "Student One", Role::Student).unwrap();
        let stored = serde_json::to_value(&user).unwrap();

        assert!(stored.get("password").is_none());
        assert_ne!(stored["password_hash"], "hunter22");
        assert_eq!(stored["role"], "student");

        let read: User = serde_json::from_value(stored).unwrap();
        assert_eq!(read, user);
    }
}
