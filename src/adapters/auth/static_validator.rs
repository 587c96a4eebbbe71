//! Static token table session validator.
//!
//! Maps fixed bearer tokens to users. Meant for development and tests, where
//! running a real identity provider is not worth it. Tokens come from the
//! `auth.static_tokens` setting as comma-separated `token:user_id` pairs:
//!
//! ```text
//! NOTIFICATION_RELAY__AUTH__STATIC_TOKENS="dev-alice:alice,dev-bob:bob"
//! ```

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, AuthenticatedUser, UserId, ValidationError};
use crate::ports::SessionValidator;

/// Session validator backed by an in-memory token table.
///
/// Tokens not in the table return `InvalidToken`.
#[derive(Debug, Default)]
pub struct StaticSessionValidator {
    tokens: RwLock<HashMap<String, AuthenticatedUser>>,
    force_error: RwLock<Option<AuthError>>,
}

impl StaticSessionValidator {
    /// Creates an empty validator that rejects every token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a validator from `token:user_id` pairs separated by commas.
    ///
    /// Blank entries are skipped. An entry without a `:` or with an empty
    /// token or user id is a validation error.
    pub fn from_entries(entries: &str) -> Result<Self, ValidationError> {
        let validator = Self::new();

        for entry in entries.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (token, user_id) = entry.split_once(':').ok_or_else(|| {
                ValidationError::invalid_format("static_tokens", "expected token:user_id")
            })?;
            let token = token.trim();
            if token.is_empty() {
                return Err(ValidationError::empty_field("static_tokens.token"));
            }
            let user_id = UserId::new(user_id.trim())?;
            validator.add_token(token, AuthenticatedUser::new(user_id, None));
        }

        Ok(validator)
    }

    /// Adds a valid token that maps to a user.
    pub fn with_user(self, token: impl Into<String>, user: AuthenticatedUser) -> Self {
        self.add_token(token, user);
        self
    }

    /// Forces all validations to return the specified error.
    pub fn with_error(self, error: AuthError) -> Self {
        *self
            .force_error
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(error);
        self
    }

    /// Registers a new valid token at runtime.
    pub fn add_token(&self, token: impl Into<String>, user: AuthenticatedUser) {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.into(), user);
    }

    /// Removes a token, making it invalid.
    pub fn remove_token(&self, token: &str) {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(token);
    }

    /// Returns the number of registered valid tokens.
    pub fn token_count(&self) -> usize {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl SessionValidator for StaticSessionValidator {
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        if let Some(error) = self
            .force_error
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(error);
        }

        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> AuthenticatedUser {
        AuthenticatedUser::new(UserId::new(id).unwrap(), Some(format!("User {}", id)))
    }

    #[tokio::test]
    async fn returns_user_for_known_token() {
        let validator = StaticSessionValidator::new().with_user("valid-token", user("u1"));

        let result = validator.validate("valid-token").await.unwrap();
        assert_eq!(result.id.as_str(), "u1");
    }

    #[tokio::test]
    async fn rejects_unknown_token() {
        let validator = StaticSessionValidator::new();

        assert!(matches!(
            validator.validate("nope").await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn forced_error_wins_over_table() {
        let validator = StaticSessionValidator::new()
            .with_user("valid-token", user("u1"))
            .with_error(AuthError::TokenExpired);

        assert!(matches!(
            validator.validate("valid-token").await,
            Err(AuthError::TokenExpired)
        ));
    }

    #[tokio::test]
    async fn parses_entries() {
        let validator =
            StaticSessionValidator::from_entries(" dev-alice:alice , dev-bob:bob,").unwrap();

        assert_eq!(validator.token_count(), 2);
        assert_eq!(
            validator.validate("dev-bob").await.unwrap().id.as_str(),
            "bob"
        );
    }

    #[test]
    fn empty_entries_give_empty_table() {
        assert_eq!(StaticSessionValidator::from_entries("").unwrap().token_count(), 0);
    }

    #[test]
    fn malformed_entries_are_rejected() {
        assert!(StaticSessionValidator::from_entries("no-separator").is_err());
        assert!(StaticSessionValidator::from_entries(":alice").is_err());
        assert!(StaticSessionValidator::from_entries("token:").is_err());
    }

    #[tokio::test]
    async fn removed_token_becomes_invalid() {
        let validator = StaticSessionValidator::new().with_user("t", user("u1"));
        validator.remove_token("t");

        assert!(validator.validate("t").await.is_err());
    }
}
