//! User service
//!
//! Registration, login and session handling, plus user administration:
//! - the first registered user becomes an administrator, later ones readers
//! - login accepts a username or an email and opens a session
//! - users edit their own email and password; only admins change roles
//! - deleting a user removes their content, content blocks and sessions

use std::str::FromStr;
use std::sync::Arc;

use chrono::Duration;
use serde::Deserialize;

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{CreateUserInput, ListQuery, Session, UpdateUserInput, User, UserRole, USER_LIST};
use crate::config::MAX_SESSION_TTL_HOURS;
use crate::services::error::{
    duplicate_on_conflict, present, require_fields, ServiceError, ServiceResult,
};
use crate::services::password::{hash_password, is_valid_email, password_meets_rules, verify_password};
use crate::services::policy::{ensure_can_mutate, Principal};

/// Default session lifetime in hours
const DEFAULT_SESSION_TTL_HOURS: i64 = 24 * 7;

const BAD_CREDENTIALS: &str = "Invalid username or password";

/// Registration request as received
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDraft {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
}

impl RegisterDraft {
    fn validate(self) -> ServiceResult<CreateUserInput> {
        require_fields(&[
            ("username", present(&self.username)),
            ("email", present(&self.email)),
            ("password", present(&self.password)),
            ("confirmPassword", present(&self.confirm_password)),
        ])?;

        let input = CreateUserInput {
            username: self.username.unwrap_or_default().trim().to_string(),
            email: self.email.unwrap_or_default().trim().to_string(),
            password: self.password.unwrap_or_default(),
            confirm_password: self.confirm_password.unwrap_or_default(),
        };

        if input.password != input.confirm_password {
            return Err(ServiceError::Validation("Passwords do not match".to_string()));
        }
        if !password_meets_rules(&input.password) {
            return Err(ServiceError::Validation(
                "Password does not comply with the rules".to_string(),
            ));
        }
        if !is_valid_email(&input.email) {
            return Err(ServiceError::Validation("Invalid email format".to_string()));
        }

        Ok(input)
    }
}

/// Login request; `username` may also be an email address
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginDraft {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Partial user update as received
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdateDraft {
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

impl UserUpdateDraft {
    fn validate(self) -> ServiceResult<UpdateUserInput> {
        let input = UpdateUserInput {
            email: self.email.filter(|e| !e.trim().is_empty()).map(|e| e.trim().to_string()),
            password: self.password.filter(|p| !p.is_empty()),
            role: match self.role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
                Some(raw) => Some(
                    UserRole::from_str(raw).map_err(|e| ServiceError::Validation(e.to_string()))?,
                ),
                None => None,
            },
        };

        if input.is_empty() {
            return Err(ServiceError::MissingField(vec!["email", "password", "role"]));
        }
        if let Some(email) = &input.email {
            if !is_valid_email(email) {
                return Err(ServiceError::Validation("Invalid email format".to_string()));
            }
        }
        if let Some(password) = &input.password {
            if !password_meets_rules(password) {
                return Err(ServiceError::Validation(
                    "Password does not comply with the rules".to_string(),
                ));
            }
        }

        Ok(input)
    }
}

pub struct UserService {
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionRepository>,
    session_ttl: Duration,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>, sessions: Arc<dyn SessionRepository>) -> Self {
        Self::with_session_ttl(users, sessions, DEFAULT_SESSION_TTL_HOURS)
    }

    /// Create a user service whose sessions last `ttl_hours`, capped at
    /// `MAX_SESSION_TTL_HOURS`
    pub fn with_session_ttl(
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRepository>,
        ttl_hours: i64,
    ) -> Self {
        Self {
            users,
            sessions,
            session_ttl: Duration::hours(ttl_hours.min(MAX_SESSION_TTL_HOURS)),
        }
    }

    /// Register a new account.
    ///
    /// # Errors
    ///
    /// - `MissingField` / `Validation` for incomplete or malformed input
    /// - `Duplicate` if the username or email is taken
    pub async fn register(&self, draft: RegisterDraft) -> ServiceResult<User> {
        let input = draft.validate().inspect_err(|e| {
            tracing::warn!("Registration rejected: {}", e);
        })?;

        if self.users.get_by_username(&input.username).await?.is_some() {
            tracing::warn!("Registration rejected: username {} taken", input.username);
            return Err(ServiceError::Duplicate(format!(
                "Username '{}' is already taken",
                input.username
            )));
        }
        if self.users.get_by_email(&input.email).await?.is_some() {
            tracing::warn!("Registration rejected: email {} taken", input.email);
            return Err(ServiceError::Duplicate(format!(
                "Email '{}' is already registered",
                input.email
            )));
        }

        let role = if self.users.count().await? == 0 {
            UserRole::Admin
        } else {
            UserRole::Reader
        };

        let password_hash = hash_password(&input.password)?;
        let user = self
            .users
            .create(&User::new(input.username, input.email, password_hash, role))
            .await
            .map_err(|e| {
                duplicate_on_conflict(e, || "Username or email is already taken".to_string())
            })?;

        tracing::info!("Registered user {} ({}) as {}", user.id, user.username, user.role);
        Ok(user)
    }

    /// Check credentials and open a session.
    ///
    /// Unknown users and wrong passwords produce the same error.
    pub async fn login(&self, draft: LoginDraft) -> ServiceResult<(Session, User)> {
        require_fields(&[
            ("username", present(&draft.username)),
            ("password", present(&draft.password)),
        ])?;
        let login = draft.username.unwrap_or_default();
        let password = draft.password.unwrap_or_default();

        let Some(user) = self.users.get_by_login(login.trim()).await? else {
            tracing::warn!("Login failed for {}: no such user", login);
            return Err(ServiceError::Authentication(BAD_CREDENTIALS.to_string()));
        };

        if !verify_password(&password, &user.password_hash)? {
            tracing::warn!("Login failed for user {}: wrong password", user.id);
            return Err(ServiceError::Authentication(BAD_CREDENTIALS.to_string()));
        }

        let session = self
            .sessions
            .create(&Session::start(user.id, self.session_ttl))
            .await?;

        tracing::info!("User {} logged in", user.id);
        Ok((session, user))
    }

    pub async fn logout(&self, token: &str) -> ServiceResult<()> {
        self.sessions.delete(token).await?;
        Ok(())
    }

    /// Resolve a session token to its user.
    ///
    /// Returns `None` for unknown tokens and for expired sessions, which are
    /// deleted on sight.
    pub async fn validate_session(&self, token: &str) -> ServiceResult<Option<User>> {
        let Some(session) = self.sessions.get_by_id(token).await? else {
            return Ok(None);
        };

        if session.is_expired() {
            self.sessions.delete(token).await?;
            return Ok(None);
        }

        Ok(self.users.get_by_id(session.user_id).await?)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<User> {
        self.users
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {}", id)))
    }

    pub async fn list(&self, query: &ListQuery) -> ServiceResult<Vec<User>> {
        let options = USER_LIST.resolve(query)?;
        Ok(self.users.list(&options).await?)
    }

    /// Update email, password or role of user `id`.
    ///
    /// A password change ends every session of that user.
    pub async fn update(
        &self,
        principal: &Principal,
        id: i64,
        draft: UserUpdateDraft,
    ) -> ServiceResult<User> {
        let input = draft.validate()?;
        let mut user = self.get(id).await?;

        ensure_can_mutate(principal, Some(user.id), "edit user")?;
        if input.role.is_some() && !principal.is_admin() {
            tracing::warn!("User {} tried to change the role of user {}", principal.id, id);
            return Err(ServiceError::Forbidden(
                "Only administrators may change roles".to_string(),
            ));
        }

        if let Some(email) = input.email {
            if let Some(other) = self.users.get_by_email(&email).await? {
                if other.id != user.id {
                    return Err(ServiceError::Duplicate(format!(
                        "Email '{}' is already registered",
                        email
                    )));
                }
            }
            user.email = email;
        }

        let password_changed = input.password.is_some();
        if let Some(password) = input.password {
            user.password_hash = hash_password(&password)?;
        }
        if let Some(role) = input.role {
            user.role = role;
        }

        let updated = self.users.update(&user).await.map_err(|e| {
            duplicate_on_conflict(e, || format!("Email '{}' is already registered", user.email))
        })?;
        if password_changed {
            let ended = self.sessions.delete_by_user(updated.id).await?;
            tracing::info!("Password of user {} changed, {} session(s) ended", updated.id, ended);
        }

        Ok(updated)
    }

    /// Delete user `id` and everything they own
    pub async fn delete(&self, principal: &Principal, id: i64) -> ServiceResult<()> {
        let user = self.get(id).await?;
        ensure_can_mutate(principal, Some(user.id), "delete user")?;

        if !self.users.delete_cascade(user.id).await? {
            return Err(ServiceError::NotFound(format!("User {}", id)));
        }

        tracing::info!("User {} deleted by {}", id, principal.id);
        Ok(())
    }

    /// Remove expired sessions, returning how many were deleted
    pub async fn cleanup_expired_sessions(&self) -> ServiceResult<u64> {
        Ok(self.sessions.delete_expired().await?)
    }
}
