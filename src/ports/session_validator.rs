//! Session validation port.
//!
//! Turns a bearer token into a user identity. Credential storage and
//! verification live behind this port; the notification channel only needs
//! the resulting `UserId`.
//!
//! # Example Implementation
//!
//! ```ignore
//! pub struct OidcValidator { ... }
//!
//! #[async_trait]
//! impl SessionValidator for OidcValidator {
//!     async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
//!         // 1. Verify signature against the provider's keys
//!         // 2. Validate iss, aud, exp claims
//!         // 3. Map claims to AuthenticatedUser
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, AuthenticatedUser};

/// Validates access tokens and extracts user identity.
///
/// # Contract
///
/// Implementations must:
/// - Return `AuthError::InvalidToken` for unknown or malformed tokens
/// - Return `AuthError::TokenExpired` for expired tokens
/// - Return `AuthError::ServiceUnavailable` for transient errors
#[async_trait]
pub trait SessionValidator: Send + Sync {
    /// Validate a raw token (without "Bearer " prefix).
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserId;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct TestSessionValidator {
        tokens: HashMap<String, AuthenticatedUser>,
    }

    #[async_trait]
    impl SessionValidator for TestSessionValidator {
        async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
            self.tokens.get(token).cloned().ok_or(AuthError::InvalidToken)
        }
    }

    #[tokio::test]
    async fn validator_can_be_used_as_trait_object() {
        let user = AuthenticatedUser::new(UserId::new("user-1").unwrap(), None);
        let validator: Arc<dyn SessionValidator> = Arc::new(TestSessionValidator {
            tokens: HashMap::from([("token".to_string(), user.clone())]),
        });

        assert_eq!(validator.validate("token").await.unwrap(), user);
        assert!(matches!(
            validator.validate("other").await,
            Err(AuthError::InvalidToken)
        ));
    }
}
