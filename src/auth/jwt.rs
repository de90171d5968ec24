/// Token issuer: signs and verifies the access/refresh pair.
///
/// The two tokens are signed with independent secrets. Access tokens are
/// fully stateless; a verified refresh token is only *trusted* after the
/// caller has compared it against the credential record's stored slot.
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::{AccessClaims, RefreshClaims};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};
use crate::users::model::User;

/// A freshly signed access/refresh pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub fn issue_access_token(user: &User, config: &JwtSettings) -> Result<String, AppError> {
    let claims = AccessClaims::new(
        user.id,
        user.username.clone(),
        user.email.clone(),
        user.display_name.clone(),
        config.access_token_expiry,
        config.issuer.clone(),
    );

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.access_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("access token generation failed: {}", e)))
}

pub fn issue_refresh_token(user_id: Uuid, config: &JwtSettings) -> Result<String, AppError> {
    let claims = RefreshClaims::new(user_id, config.refresh_token_expiry, config.issuer.clone());

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.refresh_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("refresh token generation failed: {}", e)))
}

/// Signs both tokens for one subject. The caller persists the refresh value
/// into the credential record's slot.
pub fn issue_token_pair(user: &User, config: &JwtSettings) -> Result<TokenPair, AppError> {
    Ok(TokenPair {
        access_token: issue_access_token(user, config)?,
        refresh_token: issue_refresh_token(user.id, config)?,
    })
}

/// Stateless check: signature, expiry, issuer.
pub fn verify_access_token(token: &str, config: &JwtSettings) -> Result<AccessClaims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);

    decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(config.access_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::warn!("access token validation failed: {}", e);
        AppError::Auth(AuthError::InvalidAccessToken)
    })
}

/// Signature/expiry/issuer check only. Trust additionally requires equality
/// with the stored refresh-token slot.
pub fn verify_refresh_token(token: &str, config: &JwtSettings) -> Result<RefreshClaims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);

    decode::<RefreshClaims>(
        token,
        &DecodingKey::from_secret(config.refresh_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::warn!("refresh token validation failed: {}", e);
        AppError::Auth(AuthError::InvalidRefreshToken)
    })
}
