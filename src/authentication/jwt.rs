use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use jwt::{SignWithKey, VerifyWithKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::{
    error::ApiError,
    schema::{Id, TokenPair, User},
};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Id,
    pub email: String,
    pub token_type: TokenType,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(user: &User, token_type: TokenType, lifetime: Duration) -> Self {
        let now = Utc::now();
        let iat = now.timestamp();
        let exp = (now + lifetime).timestamp();

        Self {
            user_id: user.id,
            email: user.email.to_owned(),
            token_type,
            iat,
            exp,
        }
    }
}

/// The authenticated caller, resolved from a verified access token against
/// the current user row.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionData {
    pub user_id: Id,
    pub email: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl From<&User> for SessionData {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            email: user.email.to_owned(),
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
        }
    }
}

#[derive(Clone)]
pub struct TokenService {
    key: Hmac<Sha256>,
    access_lifetime: Duration,
    refresh_lifetime: Duration,
}

impl TokenService {
    pub fn new(
        secret: &str,
        access_lifetime: Duration,
        refresh_lifetime: Duration,
    ) -> Result<Self, hmac::digest::InvalidLength> {
        let key: Hmac<Sha256> = Hmac::new_from_slice(secret.as_bytes())?;

        Ok(Self {
            key,
            access_lifetime,
            refresh_lifetime,
        })
    }

    fn sign(&self, claims: JwtSessionData) -> Result<String, ApiError> {
        claims
            .sign_with_key(&self.key)
            .map_err(|e| ApiError::Internal(format!("Could not sign token: {e}")))
    }

    pub fn issue_access(&self, user: &User) -> Result<String, ApiError> {
        self.sign(JwtSessionData::new(
            user,
            TokenType::Access,
            self.access_lifetime,
        ))
    }

    pub fn issue_pair(&self, user: &User) -> Result<TokenPair, ApiError> {
        Ok(TokenPair {
            access: self.issue_access(user)?,
            refresh: self.sign(JwtSessionData::new(
                user,
                TokenType::Refresh,
                self.refresh_lifetime,
            ))?,
        })
    }

    pub fn verify(&self, token: &str, expected: TokenType) -> Result<JwtSessionData, ApiError> {
        let session: JwtSessionData = token
            .verify_with_key(&self.key)
            .map_err(|_| ApiError::unauthorized("Given token not valid for any token type"))?;

        if session.token_type != expected {
            return Err(ApiError::unauthorized(
                "Given token not valid for any token type",
            ));
        }

        let now = Utc::now().timestamp();
        if (session.exp - now).is_negative() {
            return Err(ApiError::unauthorized("Token is invalid or expired"));
        }

        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 7,
            email: String::from("cook@example.com"),
            name: String::from("Cook"),
            password: String::new(),
            is_active: true,
            is_staff: false,
            is_superuser: false,
            last_login: None,
            date_joined: Utc::now(),
        }
    }

    fn service(access: Duration) -> TokenService {
        TokenService::new("test-secret", access, Duration::hours(24)).unwrap()
    }

    #[test]
    fn access_token_round_trip() {
        let tokens = service(Duration::minutes(5));
        let pair = tokens.issue_pair(&user()).unwrap();

        let session = tokens.verify(&pair.access, TokenType::Access).unwrap();
        assert_eq!(session.user_id, 7);
        assert_eq!(session.email, "cook@example.com");
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let tokens = service(Duration::minutes(5));
        let pair = tokens.issue_pair(&user()).unwrap();

        assert!(tokens.verify(&pair.refresh, TokenType::Access).is_err());
        assert!(tokens.verify(&pair.refresh, TokenType::Refresh).is_ok());
    }

    #[test]
    fn expired_token_is_rejected() {
        let tokens = service(Duration::minutes(-5));
        let token = tokens.issue_access(&user()).unwrap();

        assert!(matches!(
            tokens.verify(&token, TokenType::Access),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn token_signed_with_other_key_is_rejected() {
        let token = service(Duration::minutes(5)).issue_access(&user()).unwrap();
        let other = TokenService::new("other", Duration::minutes(5), Duration::hours(1)).unwrap();

        assert!(other.verify(&token, TokenType::Access).is_err());
    }
}
