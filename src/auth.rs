//! Login and bearer-token authentication.
//!
//! `POST /api/login` checks the credentials and hands out an HS256 token
//! carrying the numeric `user_id`. Every `/api/admin` route sits behind
//! [`require_auth`], which turns a valid token into a [`Principal`] request
//! extension.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::header,
    middleware::Next,
    response::Response,
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::config::JwtConfig;
use crate::error::AppError;
use crate::password::verify_password;
use crate::repository::UserRepository;
use crate::response::Meta;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub user_id: i64,
    pub sub: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum JwtError {
    #[error("token expired")]
    Expired,

    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("token signing failed: {0}")]
    Signing(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessToken {
    pub access_token: String,
    /// Unix timestamp after which the token is rejected.
    pub expires_at: i64,
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    ttl: Duration,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer.clone(),
            ttl: Duration::try_minutes(config.expiration_minutes).unwrap_or_else(Duration::zero),
        }
    }

    pub fn issue(&self, user_id: i64) -> Result<AccessToken, JwtError> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| JwtError::Signing("token lifetime out of range".to_string()))?
            .timestamp();
        let claims = Claims {
            user_id,
            sub: user_id.to_string(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: expires_at,
        };

        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| JwtError::Signing(e.to_string()))?;
        Ok(AccessToken {
            access_token,
            expires_at,
        })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::Expired,
                _ => JwtError::Invalid(e.to_string()),
            })
    }
}

/// The authenticated caller of an admin request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
}

pub fn bearer_token(value: &str) -> Option<&str> {
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let token = match header_value.and_then(bearer_token) {
        Some(token) => token,
        None => {
            tracing::warn!(uri = %req.uri(), "missing bearer token");
            return Err(AppError::Unauthorized("Unauthorized access".to_string()));
        }
    };

    let claims = state.auth.jwt().verify(token).map_err(|e| {
        tracing::warn!(uri = %req.uri(), error = %e, "token rejected");
        match e {
            JwtError::Expired => AppError::Unauthorized("Token expired".to_string()),
            _ => AppError::Unauthorized("Invalid token".to_string()),
        }
    })?;

    if claims.user_id <= 0 {
        return Err(AppError::Unauthorized("Unauthorized access".to_string()));
    }

    req.extensions_mut().insert(Principal {
        user_id: claims.user_id,
    });
    Ok(next.run(req).await)
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    jwt: JwtService,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepository>, jwt: JwtService) -> Self {
        Self { users, jwt }
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    /// Unknown email and wrong password are distinct failures so the caller
    /// can answer 400 and 401 respectively.
    pub fn login(&self, email: &str, password: &str) -> Result<AccessToken, AppError> {
        let user = self
            .users
            .find_user_by_email(email)?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if !verify_password(password, &user.password_hash) {
            tracing::info!(user_id = user.id, "login with wrong password");
            return Err(AppError::InvalidPassword);
        }

        let token = self
            .jwt
            .issue(user.id)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        tracing::info!(user_id = user.id, "user logged in");
        Ok(token)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub meta: Meta,
    pub access_token: String,
    pub expires_at: i64,
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let Json(req) = payload?;
    req.validate()?;

    let auth = state.auth.clone();
    let token = crate::run_blocking(move || auth.login(&req.email, &req.password)).await?;

    Ok(Json(LoginResponse {
        meta: Meta {
            status: true,
            message: "Login successful".to_string(),
        },
        access_token: token.access_token,
        expires_at: token.expires_at,
    }))
}
