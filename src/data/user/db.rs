use rocket::FromForm;
use utoipa::ToSchema;

use super::{AccountError, User};
use crate::config::SeedAdmin;
use crate::data::store::{Collection, Database};
use crate::error::ServiceError;
use crate::role::Role;

#[derive(Clone, FromForm, ToSchema)]
pub struct UserSignupData {
    pub username: String,
    #[schema(format = Password)]
    pub password: String,
    #[schema(format = Password)]
    pub confirm_password: String,
    #[field(default = String::new())]
    pub name: String,
}

impl std::fmt::Debug for UserSignupData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UserSignupInfo:{}", self.username)
    }
}

impl UserSignupData {
    pub fn validate(&self) -> Result<(), AccountError> {
        let username = self.username.trim();
        if username.is_empty() {
            return Err(AccountError::InvalidInput("Username can't be empty."));
        }
        if username.len() > 32 {
            return Err(AccountError::InvalidInput(
                "Username can't be longer than 32 (bytes) characters.",
            ));
        }
        if self.password.is_empty() {
            return Err(AccountError::InvalidInput("Password can't be empty."));
        }
        if self.password.len() > 1024 {
            return Err(AccountError::InvalidInput(
                "Passwords longer than 1024 characters aren't supported.",
            ));
        }
        if self.password != self.confirm_password {
            return Err(AccountError::PasswordMismatch);
        }

        Ok(())
    }
}

#[derive(Clone, FromForm, ToSchema)]
pub struct UserLoginData {
    pub username: String,
    #[schema(format = Password)]
    pub password: String,
}

impl std::fmt::Debug for UserLoginData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UserLoginInfo:{}", self.username)
    }
}

/// Empty fields are left unchanged. A new password requires the current one.
#[derive(Clone, Default, FromForm, ToSchema)]
pub struct ProfileUpdateData {
    pub name: Option<String>,
    #[schema(format = Password)]
    pub current_password: Option<String>,
    #[schema(format = Password)]
    pub new_password: Option<String>,
    #[schema(format = Password)]
    pub confirm_password: Option<String>,
}

impl std::fmt::Debug for ProfileUpdateData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ProfileUpdate:{:?}", self.name)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|it| !it.is_empty())
}

pub trait UserDbExt {
    fn create_user(
        &self,
        signup: UserSignupData,
        admin_names: &[String],
    ) -> Result<User, ServiceError>;

    /// Returns the user only if `password` matches the stored hash.
    fn login(&self, username: impl AsRef<str>, password: impl AsRef<str>) -> Option<User>;

    fn get_user(&self, id: impl AsRef<str>) -> Option<User>;
    fn find_user_by_username(&self, username: impl AsRef<str>) -> Option<User>;
    fn list_users(&self) -> Vec<User>;

    fn update_profile(
        &self,
        id: impl AsRef<str>,
        update: ProfileUpdateData,
    ) -> Result<User, ServiceError>;

    /// Creates the configured admin if no user exists yet.
    fn seed_admin(&self, seed: &SeedAdmin) -> Result<Option<User>, ServiceError>;
}

impl UserDbExt for Database {
    fn create_user(
        &self,
        signup: UserSignupData,
        admin_names: &[String],
    ) -> Result<User, ServiceError> {
        signup.validate()?;
        let username = signup.username.trim().to_string();

        let _lock = self.lock(&[Collection::Users]);
        let mut users: Vec<User> = self.load(Collection::Users);

        if users.iter().any(|it| it.username == username) {
            return Err(AccountError::UsernameTaken(username).into());
        }

        let role = if admin_names.contains(&username) {
            Role::Admin
        } else {
            Role::Student
        };

        let user = User::new(username, &signup.password, signup.name.trim(), role)?;
        users.push(user.clone());
        self.save(Collection::Users, &users)?;

        Ok(user)
    }

    fn login(&self, username: impl AsRef<str>, password: impl AsRef<str>) -> Option<User> {
        self.find_user_by_username(username)
            .filter(|user| user.pw_hash.verify(password))
    }

    fn get_user(&self, id: impl AsRef<str>) -> Option<User> {
        self.list_users()
            .into_iter()
            .find(|it| it.user_id == id.as_ref())
    }

    fn find_user_by_username(&self, username: impl AsRef<str>) -> Option<User> {
        self.list_users()
            .into_iter()
            .find(|it| it.username == username.as_ref())
    }

    fn list_users(&self) -> Vec<User> {
        self.load(Collection::Users)
    }

    fn update_profile(
        &self,
        id: impl AsRef<str>,
        update: ProfileUpdateData,
    ) -> Result<User, ServiceError> {
        let id = id.as_ref();

        let _lock = self.lock(&[Collection::Users]);
        let mut users: Vec<User> = self.load(Collection::Users);
        let user = users
            .iter_mut()
            .find(|it| it.user_id == id)
            .ok_or_else(|| AccountError::NotFound(id.to_string()))?;

        let mut changed = user.clone();

        if let Some(name) = non_empty(&update.name) {
            changed.name = name.trim().to_string();
        }

        if let Some(new_password) = non_empty(&update.new_password) {
            if Some(new_password) != update.confirm_password.as_deref() {
                return Err(AccountError::PasswordMismatch.into());
            }
            let current = update.current_password.as_deref().unwrap_or_default();
            if !user.pw_hash.verify(current) {
                return Err(AccountError::WrongPassword.into());
            }
            changed.pw_hash = super::PasswordHash::new(new_password)?;
        }

        *user = changed.clone();
        self.save(Collection::Users, &users)?;

        Ok(changed)
    }

    fn seed_admin(&self, seed: &SeedAdmin) -> Result<Option<User>, ServiceError> {
        let _lock = self.lock(&[Collection::Users]);
        let mut users: Vec<User> = self.load(Collection::Users);
        if !users.is_empty() {
            return Ok(None);
        }

        tracing::info!("No users found. Seeding admin account '{}'.", seed.username);
        let password = seed.password_or_generated();
        let admin = User::new(&seed.username, &password, &seed.name, Role::Admin)?;
        users.push(admin.clone());
        self.save(Collection::Users, &users)?;

        Ok(Some(admin))
    }
}
