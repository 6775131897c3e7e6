//! Session lifecycle: login, refresh-token rotation, logout, and password
//! change over a single refresh-token slot per account.
//!
//! Each operation performs at most one store write, after every check and
//! every token signature has succeeded; a failure at any step leaves the
//! account untouched.

use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{self, JwtConfig};
use crate::errors::ApiError;
use crate::password;
use crate::user::{normalize_username, AccountStore, User};

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Result of a successful login or rotation.
#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
    pub user: User,
    pub tokens: SessionTokens,
}

/// Authenticate by username or email and start a session.
///
/// Lookup misses and password mismatches produce the identical error, so
/// the response never reveals which credential was wrong.
pub async fn login<S: AccountStore>(
    store: &S,
    jwt: &JwtConfig,
    username: Option<&str>,
    email: Option<&str>,
    presented_password: &str,
) -> Result<AuthenticatedSession, ApiError> {
    let username = username
        .map(normalize_username)
        .filter(|u| !u.is_empty());
    let email = email.map(str::trim).filter(|e| !e.is_empty());

    if username.is_none() && email.is_none() {
        return Err(ApiError::bad_request("username or email is required"));
    }

    let found = store
        .find_by_username_or_email(username.as_deref(), email)
        .await?;

    let Some(user) = found else {
        return Err(invalid_credentials());
    };

    if !password::verify_password(&user.password_hash, presented_password) {
        return Err(invalid_credentials());
    }

    let tokens = start_session(store, jwt, &user).await?;

    info!("user {} logged in", user.id);

    Ok(AuthenticatedSession { user, tokens })
}

/// Rotate a refresh token: verify it, check it against the stored slot,
/// and issue a replacement pair.
///
/// The incoming token must be byte-equal to the slot; a superseded token
/// is rejected even before its expiry, and a successful rotation makes the
/// prior token permanently invalid.
pub async fn refresh<S: AccountStore>(
    store: &S,
    jwt: &JwtConfig,
    incoming: Option<&str>,
) -> Result<AuthenticatedSession, ApiError> {
    let Some(incoming) = incoming.map(str::trim).filter(|t| !t.is_empty()) else {
        return Err(ApiError::unauthorized("unauthorized request"));
    };

    let claims = auth::decode_refresh_token(jwt, incoming)
        .map_err(|_| ApiError::unauthorized("invalid refresh token"))?;

    let Some(user) = store.find_by_id(claims.sub).await? else {
        return Err(ApiError::unauthorized("invalid refresh token"));
    };

    if user.refresh_token.as_deref() != Some(incoming) {
        warn!("stale refresh token presented for user {}", user.id);
        return Err(ApiError::unauthorized(
            "refresh token is expired or already used",
        ));
    }

    let tokens = start_session(store, jwt, &user).await?;

    info!("rotated refresh token for user {}", user.id);

    Ok(AuthenticatedSession { user, tokens })
}

/// End the account's session by clearing the refresh-token slot.
pub async fn logout<S: AccountStore>(store: &S, user_id: Uuid) -> Result<(), ApiError> {
    store.set_refresh_token(user_id, None).await?;

    info!("user {} logged out", user_id);

    Ok(())
}

/// Replace the account's password after verifying the old one.
///
/// The stored refresh token survives a password change.
pub async fn change_password<S: AccountStore>(
    store: &S,
    user_id: Uuid,
    old_password: &str,
    new_password: &str,
) -> Result<(), ApiError> {
    if old_password.is_empty() || new_password.is_empty() {
        return Err(ApiError::bad_request("old and new password are required"));
    }

    let Some(user) = store.find_by_id(user_id).await? else {
        return Err(ApiError::NotFound("account not found".to_string()));
    };

    if !password::verify_password(&user.password_hash, old_password) {
        return Err(ApiError::unauthorized("invalid old password"));
    }

    let new_hash = password::hash_password(new_password)
        .map_err(|_| ApiError::internal("something went wrong"))?;

    store.set_password_hash(user_id, &new_hash).await?;

    info!("password changed for user {}", user_id);

    Ok(())
}

/// Issue a fresh pair and persist the refresh token.
///
/// Both tokens are signed before the single slot write; any failure here
/// surfaces as one issuance error with nothing persisted.
async fn start_session<S: AccountStore>(
    store: &S,
    jwt: &JwtConfig,
    user: &User,
) -> Result<SessionTokens, ApiError> {
    let access_token =
        auth::issue_access_token(jwt, user).map_err(|_| token_issuance_failed())?;
    let refresh_token =
        auth::issue_refresh_token(jwt, user.id).map_err(|_| token_issuance_failed())?;

    if store
        .set_refresh_token(user.id, Some(&refresh_token))
        .await
        .is_err()
    {
        return Err(token_issuance_failed());
    }

    Ok(SessionTokens {
        access_token,
        refresh_token,
    })
}

fn invalid_credentials() -> ApiError {
    ApiError::unauthorized("invalid user credentials")
}

fn token_issuance_failed() -> ApiError {
    ApiError::internal("something went wrong while generating tokens")
}
