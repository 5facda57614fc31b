//! Token signing configuration, read once at startup

use crate::error::ConfigError;

/// JWT signing configuration
///
/// Every login and registration depends on the signing secret, so an absent
/// or empty secret is a startup error rather than a per-request one.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

impl JwtConfig {
    pub fn new(
        secret: impl Into<String>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let secret = secret.into();
        if secret.trim().is_empty() {
            return Err(ConfigError::MissingSecret);
        }

        Ok(Self {
            secret,
            issuer: issuer.into(),
            audience: audience.into(),
        })
    }

    /// Load configuration from environment variables
    ///
    /// `KEYWARD_JWT_SECRET` is required; issuer and audience fall back to
    /// service defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(
            std::env::var("KEYWARD_JWT_SECRET").unwrap_or_default(),
            std::env::var("KEYWARD_JWT_ISSUER").unwrap_or_else(|_| "keyward".to_string()),
            std::env::var("KEYWARD_JWT_AUDIENCE")
                .unwrap_or_else(|_| "keyward-clients".to_string()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_secret_is_rejected() {
        let result = JwtConfig::new("", "keyward", "keyward-clients");
        assert!(matches!(result, Err(ConfigError::MissingSecret)));

        let result = JwtConfig::new("   ", "keyward", "keyward-clients");
        assert!(matches!(result, Err(ConfigError::MissingSecret)));
    }

    #[test]
    fn test_valid_secret_is_accepted() {
        let config = JwtConfig::new("test-secret", "keyward", "keyward-clients").unwrap();
        assert_eq!(config.issuer, "keyward");
        assert_eq!(config.audience, "keyward-clients");
    }
}
