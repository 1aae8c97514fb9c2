use crate::{
    entities::{user, Role, User},
    errors::ServiceError,
    events::{Event, EventSender},
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Account directory: registration, credential verification, and lookup.
///
/// Request authentication itself (sessions, tokens) belongs to the identity
/// provider; this service only owns the records identities resolve against.
#[derive(Clone)]
pub struct AccountService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl AccountService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Registers a new customer account.
    ///
    /// Username and email must both be unused; either collision fails with
    /// `Conflict` before anything is written. The password is stored as an
    /// argon2 PHC string. Publishes `UserRegistered` on success.
    #[instrument(skip(self, input), fields(username = %input.username))]
    pub async fn register(&self, input: RegisterInput) -> Result<user::Model, ServiceError> {
        input.validate()?;

        if User::find()
            .filter(user::Column::Username.eq(input.username.as_str()))
            .one(&*self.db)
            .await?
            .is_some()
        {
            warn!("Registration failed, username exists: {}", input.username);
            return Err(ServiceError::Conflict(format!(
                "Username {} already exists",
                input.username
            )));
        }

        if User::find()
            .filter(user::Column::Email.eq(input.email.as_str()))
            .one(&*self.db)
            .await?
            .is_some()
        {
            warn!("Registration failed, email exists: {}", input.email);
            return Err(ServiceError::Conflict(format!(
                "Email {} already exists",
                input.email
            )));
        }

        let user_id = Uuid::new_v4();
        let user = user::ActiveModel {
            id: Set(user_id),
            username: Set(input.username.clone()),
            email: Set(input.email.clone()),
            password_hash: Set(hash_password(&input.password)?),
            role: Set(input.role),
            created_at: Set(Utc::now()),
        };

        let user = user.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::UserRegistered(user_id))
            .await;

        info!("User registered: {} ({})", user.username, user_id);
        Ok(user)
    }

    /// Verifies credentials for a login attempt.
    ///
    /// The identifier may be the username or the email address. Unknown
    /// identifier and wrong password return the same `AuthError`.
    #[instrument(skip(self, password))]
    pub async fn authenticate(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<user::Model, ServiceError> {
        let user = User::find()
            .filter(
                Condition::any()
                    .add(user::Column::Email.eq(identifier))
                    .add(user::Column::Username.eq(identifier)),
            )
            .one(&*self.db)
            .await?;

        let Some(user) = user else {
            return Err(invalid_credentials());
        };

        if verify_password(password, &user.password_hash)? {
            Ok(user)
        } else {
            Err(invalid_credentials())
        }
    }

    /// Looks up an account by id.
    pub async fn get_account(&self, user_id: Uuid) -> Result<user::Model, ServiceError> {
        User::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))
    }

    /// Number of customer (non-admin) accounts.
    pub async fn count_customers(&self) -> Result<u64, ServiceError> {
        Ok(User::find()
            .filter(user::Column::Role.eq(Role::Customer))
            .count(&*self.db)
            .await?)
    }

    /// Any existing admin account, if one exists.
    pub async fn find_admin(&self) -> Result<Option<user::Model>, ServiceError> {
        Ok(User::find()
            .filter(user::Column::Role.eq(Role::Admin))
            .one(&*self.db)
            .await?)
    }
}

fn invalid_credentials() -> ServiceError {
    ServiceError::AuthError("Invalid email/username or password".to_string())
}

fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::HashError(e.to_string()))
}

fn verify_password(password: &str, stored_hash: &str) -> Result<bool, ServiceError> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| ServiceError::HashError(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Input for registering an account
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(length(min = 3, max = 80))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6))]
    pub password: String,
    #[serde(default = "default_role")]
    pub role: Role,
}

fn default_role() -> Role {
    Role::Customer
}

impl RegisterInput {
    pub fn customer(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            role: Role::Customer,
        }
    }

    pub fn admin(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            role: Role::Admin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hashing_round_trips() {
        let hash = hash_password("opensesame").expect("hashing should succeed");
        assert_ne!(hash, "opensesame");
        assert!(hash.starts_with("$argon2"));

        assert!(verify_password("opensesame", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn hashes_are_salted() {
        let first = hash_password("opensesame").unwrap();
        let second = hash_password("opensesame").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn garbage_stored_hash_is_an_internal_error() {
        assert!(matches!(
            verify_password("x", "not-a-phc-string"),
            Err(ServiceError::HashError(_))
        ));
    }

    #[test]
    fn register_input_validation() {
        assert!(RegisterInput::customer("bob", "bob@example.com", "hunter22")
            .validate()
            .is_ok());
        // Too-short username
        assert!(RegisterInput::customer("ab", "bob@example.com", "hunter22")
            .validate()
            .is_err());
        // Malformed email
        assert!(RegisterInput::customer("bob", "not-an-email", "hunter22")
            .validate()
            .is_err());
        // Short password
        assert!(RegisterInput::customer("bob", "bob@example.com", "12345")
            .validate()
            .is_err());
    }
}
