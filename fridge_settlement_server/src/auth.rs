//! Bearer token authentication.
//!
//! Access tokens are HS256 JWTs carrying the user id in `sub` and the caller's roles. Tokens are issued elsewhere (the
//! customer app's login service, the admin panel, or the fridge provisioning tool); this server only verifies them.
use std::{
    fmt::Display,
    future::{ready, Ready},
};

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use chrono::{DateTime, Utc};
use fridge_common::Secret;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::*;
use serde::{Deserialize, Serialize};

use crate::errors::{AuthError, ServerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A customer with a wallet
    User,
    Admin,
    /// The controller inside a fridge, reporting door events
    Fridge,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Admin => f.write_str("admin"),
            Role::Fridge => f.write_str("fridge"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The user id
    pub sub: i64,
    pub roles: Vec<Role>,
    /// Expiry, in seconds since the epoch
    pub exp: i64,
}

impl JwtClaims {
    pub fn new(user_id: i64, roles: Vec<Role>, expiry: DateTime<Utc>) -> Self {
        Self { sub: user_id, roles, exp: expiry.timestamp() }
    }

    pub fn user_id(&self) -> i64 {
        self.sub
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// Handlers take `JwtClaims` as an argument to get the caller's identity. The claims are placed in the request
/// extensions by [`crate::middleware::JwtMiddlewareFactory`].
impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let claims = req.extensions().get::<JwtClaims>().cloned().ok_or_else(|| {
            warn!("💻️ No JWT claims found in request extensions");
            ServerError::AuthenticationError(AuthError::MissingToken)
        });
        ready(claims)
    }
}

/// Verifies access tokens against the shared HS256 secret.
#[derive(Clone)]
pub struct TokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    pub fn new(secret: &Secret<String>) -> Self {
        let key = DecodingKey::from_secret(secret.reveal().as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 30;
        Self { key, validation }
    }

    pub fn validate(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let data = decode::<JwtClaims>(token, &self.key, &self.validation).map_err(|e| {
            debug!("💻️ Access token rejected. {e}");
            AuthError::InvalidToken(e.to_string())
        })?;
        Ok(data.claims)
    }

    /// Extracts the token from an `Authorization: Bearer <token>` header value.
    pub fn bearer_token(header: &str) -> Option<&str> {
        header.strip_prefix("Bearer ").map(str::trim).filter(|t| !t.is_empty())
    }
}

/// Signs access tokens. The server never issues tokens itself; this is for tooling and tests.
pub fn issue_token(claims: &JwtClaims, secret: &Secret<String>) -> Result<String, AuthError> {
    let key = EncodingKey::from_secret(secret.reveal().as_bytes());
    encode(&Header::new(Algorithm::HS256), claims, &key).map_err(|e| AuthError::InvalidToken(e.to_string()))
}
