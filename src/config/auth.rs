//! Authentication configuration

use serde::Deserialize;

use super::error::ValidationError;
use super::server::Environment;

/// Authentication configuration
///
/// Only the static token table is configurable here; real identity
/// providers plug in through the `SessionValidator` port.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// Comma-separated `token:user_id` pairs for development
    pub static_tokens: Option<String>,
}

impl AuthConfig {
    /// The token table, or an empty string when unset
    pub fn static_token_entries(&self) -> &str {
        self.static_tokens.as_deref().unwrap_or("")
    }

    /// Validate authentication configuration
    ///
    /// Static tokens are development tooling and are refused in production.
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        let entries = self.static_token_entries();
        if entries.trim().is_empty() {
            return Ok(());
        }

        if *environment == Environment::Production {
            return Err(ValidationError::StaticTokensInProduction);
        }

        for entry in entries.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            match entry.split_once(':') {
                Some((token, user)) if !token.trim().is_empty() && !user.trim().is_empty() => {}
                _ => return Err(ValidationError::InvalidStaticTokens(entry.to_string())),
            }
        }

        Ok(())
    }
}
