//! Credential to principal resolution.
//!
//! Role normalization happens here, once. The coordinator receives a
//! [`Principal`] and never sees raw claims.

use async_trait::async_trait;
use ewaste_types::{Principal, PrincipalClaims, PrincipalError};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("credential '{token}' has invalid claims: {source}")]
    InvalidClaims {
        token: String,
        #[source]
        source: PrincipalError,
    },

    #[error("identity backend unavailable: {0}")]
    Unavailable(String),
}

/// Resolves an opaque credential into an authenticated principal.
///
/// `Ok(None)` means the credential is unknown, which callers surface as
/// unauthenticated rather than as an error.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, credential: &str) -> Result<Option<Principal>, IdentityError>;
}

/// Fixed token table, normalized when the resolver is built.
#[derive(Debug, Default, Clone)]
pub struct StaticIdentityResolver {
    principals: HashMap<String, Principal>,
}

impl StaticIdentityResolver {
    /// Build from raw claims. Any entry that does not normalize to exactly
    /// one role fails the whole table.
    pub fn from_claims<I>(entries: I) -> Result<Self, IdentityError>
    where
        I: IntoIterator<Item = (String, PrincipalClaims)>,
    {
        let mut principals = HashMap::new();
        for (token, claims) in entries {
            let principal = Principal::from_claims(&claims).map_err(|source| {
                IdentityError::InvalidClaims {
                    token: redact(&token),
                    source,
                }
            })?;
            principals.insert(normalize_token(&token), principal);
        }
        Ok(Self { principals })
    }

    pub fn with_principal(mut self, token: impl Into<String>, principal: Principal) -> Self {
        let token: String = token.into();
        self.principals.insert(normalize_token(&token), principal);
        self
    }

    pub fn len(&self) -> usize {
        self.principals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.principals.is_empty()
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentityResolver {
    async fn resolve(&self, credential: &str) -> Result<Option<Principal>, IdentityError> {
        Ok(self.principals.get(&normalize_token(credential)).copied())
    }
}

/// Stored and presented tokens are compared in this form.
fn normalize_token(token: &str) -> String {
    token.trim().to_string()
}

fn redact(token: &str) -> String {
    let visible: String = token.chars().take(4).collect();
    format!("{visible}***")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ewaste_types::{PrincipalId, Role};

    #[tokio::test]
    async fn resolves_known_tokens_only() {
        let id = PrincipalId::generate();
        let resolver = StaticIdentityResolver::from_claims([(
            "vendor-token".to_string(),
            PrincipalClaims {
                subject: id.to_string(),
                kind: Some("VendorUser".to_string()),
                ..Default::default()
            },
        )])
        .unwrap();

        let principal = resolver.resolve("vendor-token").await.unwrap().unwrap();
        assert_eq!(principal.id(), id);
        assert_eq!(principal.role(), Role::VendorUser);
        assert!(resolver.resolve("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn configured_whitespace_does_not_hide_a_token() {
        let id = PrincipalId::generate();
        let resolver = StaticIdentityResolver::from_claims([(
            "  padded-token\n".to_string(),
            PrincipalClaims {
                subject: id.to_string(),
                ..Default::default()
            },
        )])
        .unwrap()
        .with_principal(" vendor-token ", Principal::vendor(PrincipalId::generate()));

        let principal = resolver.resolve("padded-token").await.unwrap().unwrap();
        assert_eq!(principal.id(), id);
        assert!(resolver.resolve(" padded-token ").await.unwrap().is_some());
        assert!(resolver.resolve("vendor-token").await.unwrap().is_some());
    }

    #[test]
    fn ambiguous_entry_fails_construction() {
        let err = StaticIdentityResolver::from_claims([(
            "secret-token".to_string(),
            PrincipalClaims {
                subject: PrincipalId::generate().to_string(),
                role: Some("user".to_string()),
                vendor: Some(ewaste_types::VendorId::generate().to_string()),
                ..Default::default()
            },
        )])
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("secr***"));
        assert!(!message.contains("secret-token"));
    }
}
