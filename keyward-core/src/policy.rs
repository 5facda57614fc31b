//! Named authorization policies evaluated against token claims

use crate::{error::PolicyError, token::TokenClaims};
use std::collections::HashMap;

/// A named conjunction of role and claim requirements
///
/// Zero-or-one required role plus zero-or-more required (type, value) claim
/// pairs. Multiple required values on the same claim type are an AND: the
/// token must carry a separate claim entry per value.
#[derive(Debug, Clone, Default)]
pub struct Policy {
    required_role: Option<String>,
    required_claims: Vec<(String, String)>,
}

impl Policy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require_role(mut self, role: impl Into<String>) -> Self {
        self.required_role = Some(role.into());
        self
    }

    pub fn require_claim(
        mut self,
        claim_type: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.required_claims.push((claim_type.into(), value.into()));
        self
    }

    /// Evaluate every predicate against the presented claim set
    pub fn allows(&self, claims: &TokenClaims) -> bool {
        if let Some(role) = &self.required_role {
            if !claims.has_role(role) {
                return false;
            }
        }
        self.required_claims
            .iter()
            .all(|(claim_type, value)| claims.has_claim(claim_type, value))
    }
}

/// Immutable table of named policies, built once at startup
#[derive(Debug, Clone, Default)]
pub struct PolicyRegistry {
    policies: HashMap<String, Policy>,
}

impl PolicyRegistry {
    pub fn builder() -> PolicyRegistryBuilder {
        PolicyRegistryBuilder {
            policies: HashMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Policy> {
        self.policies.get(name)
    }

    /// Evaluate a named policy; referencing an unregistered name is an error,
    /// a failed predicate is not
    pub fn evaluate(&self, name: &str, claims: &TokenClaims) -> Result<bool, PolicyError> {
        let policy = self
            .get(name)
            .ok_or_else(|| PolicyError::UnknownPolicy(name.to_string()))?;
        Ok(policy.allows(claims))
    }
}

/// Builder consumed into an immutable registry
pub struct PolicyRegistryBuilder {
    policies: HashMap<String, Policy>,
}

impl PolicyRegistryBuilder {
    pub fn add_policy(mut self, name: impl Into<String>, policy: Policy) -> Self {
        self.policies.insert(name.into(), policy);
        self
    }

    pub fn build(self) -> PolicyRegistry {
        PolicyRegistry {
            policies: self.policies,
        }
    }
}

/// Policies registered at process startup
///
/// The claim type/value pairs are configuration data, not fixed logic;
/// deployments with different claim vocabularies register their own table.
pub fn default_policies() -> PolicyRegistry {
    PolicyRegistry::builder()
        .add_policy("AdminOnly", Policy::new().require_role("Admin"))
        .add_policy(
            "AdminWithInsertClaim",
            Policy::new()
                .require_role("Admin")
                .require_claim("Tempo", "Inserir"),
        )
        .add_policy(
            "AdminWithMultipleClaims",
            Policy::new()
                .require_role("Admin")
                .require_claim("Tempo", "Inserir")
                .require_claim("Tempo", "Editar")
                .require_claim("Tempo", "Excluir"),
        )
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    fn claims(roles: &[&str], pairs: &[(&str, &str)]) -> TokenClaims {
        let mut claim_map: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (claim_type, value) in pairs {
            claim_map
                .entry(claim_type.to_string())
                .or_default()
                .insert(value.to_string());
        }

        TokenClaims {
            sub: "user-1".to_string(),
            name: "alice".to_string(),
            jti: "jti-1".to_string(),
            iss: "keyward".to_string(),
            aud: "keyward-clients".to_string(),
            iat: 0,
            exp: 0,
            roles: roles.iter().map(|r| r.to_string()).collect(),
            claims: claim_map,
        }
    }

    #[test]
    fn test_role_without_required_claim_fails() {
        let registry = default_policies();

        let admin_only = claims(&["Admin"], &[]);
        assert!(!registry.evaluate("AdminWithInsertClaim", &admin_only).unwrap());

        let with_claim = claims(&["Admin"], &[("Tempo", "Inserir")]);
        assert!(registry.evaluate("AdminWithInsertClaim", &with_claim).unwrap());
    }

    #[test]
    fn test_claim_without_required_role_fails() {
        let registry = default_policies();
        let no_role = claims(&["User"], &[("Tempo", "Inserir")]);
        assert!(!registry.evaluate("AdminWithInsertClaim", &no_role).unwrap());
    }

    #[test]
    fn test_multiple_values_on_one_type_are_conjoined() {
        let registry = default_policies();

        let partial = claims(&["Admin"], &[("Tempo", "Inserir"), ("Tempo", "Editar")]);
        assert!(!registry.evaluate("AdminWithMultipleClaims", &partial).unwrap());

        let full = claims(
            &["Admin"],
            &[("Tempo", "Inserir"), ("Tempo", "Editar"), ("Tempo", "Excluir")],
        );
        assert!(registry.evaluate("AdminWithMultipleClaims", &full).unwrap());
    }

    #[test]
    fn test_boolean_shaped_claims_are_plain_configuration() {
        let registry = PolicyRegistry::builder()
            .add_policy(
                "AdminWithInsertClaim",
                Policy::new().require_role("Admin").require_claim("Inserir", "true"),
            )
            .build();

        let without = claims(&["Admin"], &[]);
        assert!(!registry.evaluate("AdminWithInsertClaim", &without).unwrap());

        let with = claims(&["Admin"], &[("Inserir", "true")]);
        assert!(registry.evaluate("AdminWithInsertClaim", &with).unwrap());
    }

    #[test]
    fn test_unknown_policy_is_an_error() {
        let registry = default_policies();
        let result = registry.evaluate("DoesNotExist", &claims(&[], &[]));
        assert!(matches!(result, Err(PolicyError::UnknownPolicy(_))));
    }

    #[test]
    fn test_empty_policy_allows_everyone() {
        let policy = Policy::new();
        assert!(policy.allows(&claims(&[], &[])));
    }
}
