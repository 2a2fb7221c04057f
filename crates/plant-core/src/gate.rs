//! # Authorization Gates
//!
//! An explicit ordered list of checks evaluated before a handler runs:
//!
//! ```text
//! credential ──▶ Authenticated ──▶ RequireRole(..) ──▶ handler
//!                    │                  │
//!                    ▼                  ▼
//!              Unauthenticated      Forbidden { role }
//! ```
//!
//! Evaluation is sequential and stops at the first failing stage. A principal
//! without a stored record holds no role and fails every role gate.

use crate::error::{MarketError, MarketResult};
use crate::identity::{bearer_token, verify_with_timeout, IdentityVerifier};
use crate::principal::{Principal, Role};
use crate::store::RoleStore;
use std::time::Duration;
use tracing::{debug, warn};

/// One stage of a gate chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Caller presents a valid identity token
    Authenticated,
    /// Caller's stored role equals the given role
    RequireRole(Role),
}

/// Outcome of a single stage
enum Step {
    Continue,
    Reject(MarketError),
}

/// Caller context accumulated while walking the chain
#[derive(Debug, Clone, Default)]
pub struct GateContext {
    /// Verified email, set by `Authenticated`
    pub email: Option<String>,
    /// Stored principal, loaded by the first role gate
    pub principal: Option<Principal>,
}

impl GateContext {
    pub fn role(&self) -> Option<Role> {
        self.principal.as_ref().map(|p| p.role)
    }
}

/// An ordered list of gates
#[derive(Debug, Clone)]
pub struct GateChain {
    stages: Vec<Gate>,
}

impl GateChain {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Authenticated callers only
    pub fn authenticated() -> Self {
        Self::new().then(Gate::Authenticated)
    }

    /// Authenticated callers holding `role`
    pub fn role(role: Role) -> Self {
        Self::authenticated().then(Gate::RequireRole(role))
    }

    /// Append a stage
    pub fn then(mut self, gate: Gate) -> Self {
        self.stages.push(gate);
        self
    }

    /// Walk every stage in order.
    ///
    /// `authorization` is the raw `Authorization` header value, if any.
    pub async fn evaluate<R>(
        &self,
        authorization: Option<&str>,
        verifier: &dyn IdentityVerifier,
        roles: &R,
        timeout: Duration,
    ) -> MarketResult<GateContext>
    where
        R: RoleStore + ?Sized,
    {
        let mut ctx = GateContext::default();
        for gate in &self.stages {
            let step = match gate {
                Gate::Authenticated => {
                    authenticate(&mut ctx, authorization, verifier, timeout).await?
                }
                Gate::RequireRole(required) => require_role(&mut ctx, *required, roles).await?,
            };
            if let Step::Reject(err) = step {
                return Err(err);
            }
        }
        Ok(ctx)
    }
}

impl Default for GateChain {
    fn default() -> Self {
        Self::new()
    }
}

async fn authenticate(
    ctx: &mut GateContext,
    authorization: Option<&str>,
    verifier: &dyn IdentityVerifier,
    timeout: Duration,
) -> MarketResult<Step> {
    let token = match bearer_token(authorization) {
        Ok(token) => token,
        Err(err) => return Ok(Step::Reject(err)),
    };
    match verify_with_timeout(verifier, token, timeout).await {
        Ok(identity) => {
            debug!(email = %identity.email, "identity verified");
            ctx.email = Some(identity.email);
            Ok(Step::Continue)
        }
        Err(err @ MarketError::Unauthenticated(_)) => {
            warn!("rejected identity token: {}", err);
            Ok(Step::Reject(err))
        }
        Err(err) => Err(err),
    }
}

async fn require_role<R>(ctx: &mut GateContext, required: Role, roles: &R) -> MarketResult<Step>
where
    R: RoleStore + ?Sized,
{
    let Some(email) = ctx.email.as_deref() else {
        return Ok(Step::Reject(MarketError::Unauthenticated(
            "role gate reached without a verified identity".to_string(),
        )));
    };

    if ctx.principal.is_none() {
        ctx.principal = roles.find_principal(email).await?;
    }

    let actual = ctx.role();
    if actual == Some(required) {
        return Ok(Step::Continue);
    }

    let message = match required {
        Role::Admin => "Admin only Action!".to_string(),
        Role::Seller => "Seller only Action!".to_string(),
        Role::Customer => "Customer only Action!".to_string(),
    };
    Ok(Step::Reject(MarketError::forbidden(message, actual)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::VerifiedIdentity;
    use crate::memory::MemoryStore;
    use crate::principal::SignIn;
    use async_trait::async_trait;

    /// Accepts tokens of the form `token:<email>`
    struct PrefixVerifier;

    #[async_trait]
    impl IdentityVerifier for PrefixVerifier {
        async fn verify(&self, token: &str) -> MarketResult<VerifiedIdentity> {
            token
                .strip_prefix("token:")
                .map(|email| VerifiedIdentity {
                    email: email.to_string(),
                })
                .ok_or_else(|| MarketError::Unauthenticated("bad token".into()))
        }
    }

    const TIMEOUT: Duration = Duration::from_secs(5);

    async fn store_with(email: &str, role: Role) -> MemoryStore {
        let store = MemoryStore::new();
        store
            .upsert_on_sign_in(SignIn {
                email: email.into(),
                name: None,
                image: None,
            })
            .await
            .unwrap();
        store.set_role(email, role).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_missing_credential_is_unauthenticated() {
        let store = MemoryStore::new();
        let err = GateChain::authenticated()
            .evaluate(None, &PrefixVerifier, &store, TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Unauthenticated(_)));

        let err = GateChain::authenticated()
            .evaluate(Some("Bearer nope"), &PrefixVerifier, &store, TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn test_authenticated_passes_without_record() {
        let store = MemoryStore::new();
        let ctx = GateChain::authenticated()
            .evaluate(Some("Bearer token:a@x.com"), &PrefixVerifier, &store, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(ctx.email.as_deref(), Some("a@x.com"));
        assert!(ctx.principal.is_none());
    }

    #[tokio::test]
    async fn test_customer_is_forbidden_from_privileged_gates() {
        let store = store_with("c@x.com", Role::Customer).await;

        for role in [Role::Seller, Role::Admin] {
            let err = GateChain::role(role)
                .evaluate(Some("Bearer token:c@x.com"), &PrefixVerifier, &store, TIMEOUT)
                .await
                .unwrap_err();
            match err {
                MarketError::Forbidden { role, .. } => assert_eq!(role, Some(Role::Customer)),
                other => panic!("expected Forbidden, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_unknown_principal_fails_closed() {
        let store = MemoryStore::new();
        let err = GateChain::role(Role::Admin)
            .evaluate(Some("Bearer token:who@x.com"), &PrefixVerifier, &store, TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Forbidden { role: None, .. }));
    }

    #[tokio::test]
    async fn test_matching_role_continues() {
        let store = store_with("s@x.com", Role::Seller).await;
        let ctx = GateChain::role(Role::Seller)
            .evaluate(Some("Bearer token:s@x.com"), &PrefixVerifier, &store, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(ctx.role(), Some(Role::Seller));
    }

    #[tokio::test]
    async fn test_role_gate_without_identity_stage() {
        let store = store_with("s@x.com", Role::Seller).await;
        let err = GateChain::new()
            .then(Gate::RequireRole(Role::Seller))
            .evaluate(Some("Bearer token:s@x.com"), &PrefixVerifier, &store, TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Unauthenticated(_)));
    }
}
