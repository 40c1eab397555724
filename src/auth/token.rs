//! Signed session tokens.
//!
//! Tokens are stateless HS256 JWTs carrying `{id, role, iat, exp}`. There is
//! no refresh mechanism, so an expired token means logging in again.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::auth::{Principal, Role};
use crate::error::{SchoolError, SchoolResult};
use crate::util::current_time;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub id: i64,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn principal(&self) -> Principal {
        Principal::new(self.role, self.id)
    }
}

pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn issue(&self, principal: Principal) -> SchoolResult<String> {
        self.issue_at(principal, current_time())
    }

    fn issue_at(&self, principal: Principal, issued_at: OffsetDateTime) -> SchoolResult<String> {
        let claims = Claims {
            id: principal.id(),
            role: principal.role(),
            iat: issued_at.unix_timestamp(),
            exp: (issued_at + self.ttl).unix_timestamp(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|err| SchoolError::Server(format!("Failed to sign token: {}", err)))
    }

    /// Checks the signature and expiry, failing closed on anything unexpected.
    pub fn verify(&self, token: &str) -> SchoolResult<Claims> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| {
                tracing::debug!(%err, "rejected session token");
                SchoolError::Unauthorized("Invalid or expired token")
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new("test-secret", Duration::hours(24))
    }

    #[test]
    fn issued_tokens_verify_to_the_same_principal() {
        let issuer = issuer();
        let token = issuer.issue(Principal::Faculty(7)).unwrap();
        let claims = issuer.verify(&token).unwrap();

        assert_eq!(claims.principal(), Principal::Faculty(7));
        assert_eq!(claims.exp - claims.iat, 24 * 60 * 60);
    }

    #[test]
    fn expired_tokens_are_rejected_even_with_a_valid_signature() {
        let issuer = issuer();
        let two_days_ago = current_time() - Duration::days(2);
        let token = issuer.issue_at(Principal::Student(3), two_days_ago).unwrap();

        assert!(matches!(
            issuer.verify(&token),
            Err(SchoolError::Unauthorized(_))
        ));
    }

    #[test]
    fn tokens_signed_with_another_secret_are_rejected() {
        let other = TokenIssuer::new("someone-else", Duration::hours(24));
        let token = other.issue(Principal::Admin(1)).unwrap();

        assert!(issuer().verify(&token).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(issuer().verify("not.a.token").is_err());
    }
}
