//! # Identity Verification
//!
//! Validation of externally-issued identity tokens. Signature and expiry checks
//! are delegated to the identity provider; this side only extracts the
//! verified email.

use crate::error::{MarketError, MarketResult};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// A verified caller. Valid for the lifetime of one request only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub email: String,
}

/// Verifies bearer tokens against the identity provider.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> MarketResult<VerifiedIdentity>;
}

pub type BoxedIdentityVerifier = Arc<dyn IdentityVerifier>;

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> MarketResult<&str> {
    let header = header.ok_or_else(|| {
        MarketError::Unauthenticated("missing authorization header".to_string())
    })?;

    let mut parts = header.splitn(2, ' ');
    match (parts.next(), parts.next()) {
        (Some(scheme), Some(token))
            if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() =>
        {
            Ok(token.trim())
        }
        _ => Err(MarketError::Unauthenticated(
            "malformed authorization header".to_string(),
        )),
    }
}

/// Run `verifier` with a deadline.
pub async fn verify_with_timeout(
    verifier: &dyn IdentityVerifier,
    token: &str,
    timeout: Duration,
) -> MarketResult<VerifiedIdentity> {
    tokio::time::timeout(timeout, verifier.verify(token))
        .await
        .map_err(|_| MarketError::Timeout {
            operation: "identity verification",
        })?
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowVerifier;

    #[async_trait]
    impl IdentityVerifier for SlowVerifier {
        async fn verify(&self, _token: &str) -> MarketResult<VerifiedIdentity> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(VerifiedIdentity {
                email: "late@x.com".into(),
            })
        }
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(Some("Bearer abc.def")).unwrap(), "abc.def");
        assert_eq!(bearer_token(Some("bearer tok")).unwrap(), "tok");
        assert!(matches!(
            bearer_token(None),
            Err(MarketError::Unauthenticated(_))
        ));
        assert!(matches!(
            bearer_token(Some("Bearer ")),
            Err(MarketError::Unauthenticated(_))
        ));
        assert!(matches!(
            bearer_token(Some("Basic abc")),
            Err(MarketError::Unauthenticated(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_verification_times_out() {
        let result = verify_with_timeout(&SlowVerifier, "tok", Duration::from_secs(5)).await;
        assert!(matches!(result, Err(MarketError::Timeout { .. })));
    }
}
