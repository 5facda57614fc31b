//! Signed bearer token issuance and verification

use crate::{
    config::JwtConfig,
    error::{ConfigError, TokenError},
    store::IdentityStore,
    types::UserRecord,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};
use uuid::Uuid;

/// Fixed token validity window: 30 minutes from issuance
pub const TOKEN_VALIDITY_SECS: i64 = 30 * 60;

/// JWT payload
///
/// The claim set is a deterministic projection of the user's role/claim graph
/// at issuance time: `roles` holds one entry per role, and every direct or
/// role-inherited `(type, value)` claim lands in the flattened multimap.
/// Ordered collections keep the projection independent of iteration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Subject display name
    pub name: String,
    /// Unique token identifier, fresh per issuance
    pub jti: String,
    pub iss: String,
    pub aud: String,
    /// Issued at (timestamp)
    pub iat: i64,
    /// Expiration time (timestamp)
    pub exp: i64,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub roles: BTreeSet<String>,
    #[serde(flatten, default, skip_serializing_if = "BTreeMap::is_empty")]
    pub claims: BTreeMap<String, BTreeSet<String>>,
}

impl TokenClaims {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// True when the claim set contains the exact (type, value) pair
    pub fn has_claim(&self, claim_type: &str, value: &str) -> bool {
        self.claims
            .get(claim_type)
            .is_some_and(|values| values.contains(value))
    }

    pub fn add_claim(&mut self, claim_type: impl Into<String>, value: impl Into<String>) {
        self.claims
            .entry(claim_type.into())
            .or_default()
            .insert(value.into());
    }
}

/// Converts a verified user identity into a signed bearer token
///
/// Stateless per call: safe to share behind an `Arc` across in-flight
/// requests without locking.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    validity: Duration,
}

impl TokenIssuer {
    /// Build an issuer from startup configuration
    ///
    /// Rejects an empty signing secret so the failure happens at startup
    /// rather than on the first login.
    pub fn new(config: &JwtConfig) -> Result<Self, ConfigError> {
        if config.secret.trim().is_empty() {
            return Err(ConfigError::MissingSecret);
        }

        Ok(Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            validity: Duration::seconds(TOKEN_VALIDITY_SECS),
        })
    }

    /// Issue a signed token for an already-authenticated user
    ///
    /// Projects the user's roles, each role's own claims, and the user's
    /// direct claims into the payload, then signs with HMAC-SHA-256. A role
    /// name without a backing role record is skipped silently; membership in
    /// a vanished role is a benign inconsistency, not an error.
    pub async fn issue(
        &self,
        store: &dyn IdentityStore,
        user: &UserRecord,
    ) -> Result<String, TokenError> {
        let role_names = store.user_roles(&user.id).await?;

        let now = Utc::now();
        let mut claims = TokenClaims {
            sub: user.id.clone(),
            name: user.username.clone(),
            jti: Uuid::new_v4().to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp(),
            exp: (now + self.validity).timestamp(),
            roles: BTreeSet::new(),
            claims: BTreeMap::new(),
        };

        for role in &role_names {
            claims.roles.insert(role.clone());
        }

        for role in &role_names {
            let Some(role_record) = store.find_role(role).await? else {
                debug!("role '{}' no longer exists, skipping its claims", role);
                continue;
            };
            for entry in store.role_claims(&role_record.name).await? {
                claims.add_claim(entry.claim_type, entry.claim_value);
            }
        }

        for entry in store.user_claims(&user.id).await? {
            claims.add_claim(entry.claim_type, entry.claim_value);
        }

        encode(&Header::default(), &claims, &self.encoding).map_err(|e| {
            warn!("failed to encode bearer token: {}", e);
            TokenError::Creation
        })
    }

    /// Verify signature, expiry, issuer, and audience, returning the claims
    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);

        let token_data = decode::<TokenClaims>(token, &self.decoding, &validation).map_err(|e| {
            debug!("token verification failed: {}", e);
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            }
        })?;

        Ok(token_data.claims)
    }
}
