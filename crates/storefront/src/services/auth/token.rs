//! HS256 bearer tokens.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use stes_core::CustomerId;
use stes_core::customer::Customer;

use super::AuthError;

/// Claims carried by a customer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Customer ID.
    pub sub: i32,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    #[must_use]
    pub const fn customer_id(&self) -> CustomerId {
        CustomerId::new(self.sub)
    }
}

/// Signing and verification keys derived from the configured secret.
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenKeys {
    #[must_use]
    pub fn new(secret: &SecretString, ttl_hours: i64) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            validation,
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Issue a token for `customer`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Signing` if encoding fails.
    pub fn issue(&self, customer: &Customer) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: customer.id.as_i32(),
            email: customer.email.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        self.sign(&claims)
    }

    /// Verify signature and expiry.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` for any malformed, forged or expired token.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected bearer token");
                AuthError::InvalidToken
            })
    }

    fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding).map_err(AuthError::Signing)
    }
}

impl std::fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenKeys")
            .field("keys", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use stes_core::Email;

    use super::*;

    fn keys() -> TokenKeys {
        TokenKeys::new(&SecretString::from("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6"), 168)
    }

    fn customer() -> Customer {
        Customer {
            id: CustomerId::new(42),
            name: "Amira".to_owned(),
            email: Email::parse("amira@stes.tn").unwrap(),
            phone: None,
            loyalty_points: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_issue_then_verify() {
        let keys = keys();
        let token = keys.issue(&customer()).unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.customer_id(), CustomerId::new(42));
        assert_eq!(claims.email, "amira@stes.tn");
        assert_eq!(claims.exp - claims.iat, 168 * 3600);
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let keys = keys();
        let past = Utc::now() - Duration::hours(2);
        let token = keys
            .sign(&Claims {
                sub: 42,
                email: "amira@stes.tn".to_owned(),
                iat: (past - Duration::hours(1)).timestamp(),
                exp: past.timestamp(),
            })
            .unwrap();
        assert!(matches!(keys.verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_token_from_other_secret_is_rejected() {
        let other = TokenKeys::new(&SecretString::from("zQ8#pL1!vN6@tR3$wK9^yH2&cM5*bF7"), 168);
        let token = other.issue(&customer()).unwrap();
        assert!(keys().verify(&token).is_err());
        assert!(keys().verify("not.a.token").is_err());
    }

    #[test]
    fn test_debug_redacts_keys() {
        let debug = format!("{:?}", keys());
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("aB3$"));
    }
}
