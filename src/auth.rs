use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use chrono::Utc;
use color_eyre::eyre::eyre;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;
use tracing::error;
use uuid::Uuid;

use crate::cookies::ACCESS_TOKEN_COOKIE;
use crate::errors::ApiError;
use crate::state::AppState;
use crate::user::{AccountStore, User};

/// Default access token lifetime in seconds (15 minutes)
pub const DEFAULT_ACCESS_TTL_SECS: i64 = 900;

/// Default refresh token lifetime in seconds (30 days)
pub const DEFAULT_REFRESH_TTL_SECS: i64 = 30 * 24 * 60 * 60;

/// Signing configuration for both token kinds.
///
/// One secret and one lifetime per kind; issuance is a pure function of
/// this config plus the account.
#[derive(Clone)]
pub struct JwtConfig {
    access_secret: String,
    refresh_secret: String,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl JwtConfig {
    pub fn new(
        access_secret: impl Into<String>,
        refresh_secret: impl Into<String>,
        access_ttl_secs: i64,
        refresh_ttl_secs: i64,
    ) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }

    pub fn from_env() -> color_eyre::Result<Self> {
        let access_secret = std::env::var("ACCESS_TOKEN_SECRET")
            .map_err(|_| eyre!("ACCESS_TOKEN_SECRET environment variable not set"))?;
        let refresh_secret = std::env::var("REFRESH_TOKEN_SECRET")
            .map_err(|_| eyre!("REFRESH_TOKEN_SECRET environment variable not set"))?;

        let config = Self {
            access_secret,
            refresh_secret,
            access_ttl_secs: ttl_from_env("ACCESS_TOKEN_TTL_SECS", DEFAULT_ACCESS_TTL_SECS)?,
            refresh_ttl_secs: ttl_from_env("REFRESH_TOKEN_TTL_SECS", DEFAULT_REFRESH_TTL_SECS)?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Verify that the secrets are usable before serving any requests
    fn validate(&self) -> color_eyre::Result<()> {
        if self.access_secret.is_empty() || self.refresh_secret.is_empty() {
            return Err(eyre!("token signing secrets must not be empty"));
        }

        if self.access_secret == self.refresh_secret {
            return Err(eyre!("access and refresh token secrets must differ"));
        }

        if self.access_ttl_secs <= 0 || self.refresh_ttl_secs <= 0 {
            return Err(eyre!("token lifetimes must be positive"));
        }

        Ok(())
    }

    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl_secs
    }

    pub fn refresh_ttl_secs(&self) -> i64 {
        self.refresh_ttl_secs
    }
}

fn ttl_from_env(name: &str, default: i64) -> color_eyre::Result<i64> {
    match std::env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => raw
            .parse()
            .map_err(|_| eyre!("{name} must be an integer number of seconds")),
    }
}

/// Claims carried by a short-lived access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: Uuid,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

/// Claims carried by a long-lived refresh token.
///
/// The `jti` makes every issued token distinct, so rotation always
/// produces a new value even within the same second.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: Uuid,
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
}

pub fn issue_access_token(
    config: &JwtConfig,
    user: &User,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp();
    let claims = AccessClaims {
        sub: user.id,
        username: user.username.clone(),
        iat: now,
        exp: now + config.access_ttl_secs,
    };

    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.access_secret.as_bytes()),
    )
}

pub fn issue_refresh_token(
    config: &JwtConfig,
    user_id: Uuid,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp();
    let claims = RefreshClaims {
        sub: user_id,
        jti: Uuid::new_v4(),
        iat: now,
        exp: now + config.refresh_ttl_secs,
    };

    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.refresh_secret.as_bytes()),
    )
}

pub fn decode_access_token(
    config: &JwtConfig,
    token: &str,
) -> Result<AccessClaims, jsonwebtoken::errors::Error> {
    let data = jsonwebtoken::decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(config.access_secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(data.claims)
}

pub fn decode_refresh_token(
    config: &JwtConfig,
    token: &str,
) -> Result<RefreshClaims, jsonwebtoken::errors::Error> {
    let data = jsonwebtoken::decode::<RefreshClaims>(
        token,
        &DecodingKey::from_secret(config.refresh_secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(data.claims)
}

/// Extract the current user from the request if authenticated
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let cookies = Cookies::from_request_parts(parts, state).await.map_err(|_| {
            error!("failed to extract cookies from request");
            ApiError::internal("something went wrong")
        })?;

        let token = cookies
            .get(ACCESS_TOKEN_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .or_else(|| bearer_token(&parts.headers));

        let Some(token) = token else {
            return Err(ApiError::unauthorized("unauthorized request"));
        };

        let claims = decode_access_token(&state.jwt, &token)
            .map_err(|_| ApiError::unauthorized("invalid access token"))?;

        let user = state.db.find_by_id(claims.sub).await?;

        let Some(user) = user else {
            return Err(ApiError::unauthorized("invalid access token"));
        };

        Ok(AuthUser { user })
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_config() -> JwtConfig {
        JwtConfig::new("access-secret", "refresh-secret", 900, 3600)
    }

    fn test_user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "ana".to_string(),
            email: "ana@x.com".to_string(),
            full_name: "Ana Example".to_string(),
            password_hash: "hash".to_string(),
            avatar_url: None,
            cover_image_url: None,
            refresh_token: None,
            created_at_utc: Utc::now(),
            updated_at_utc: Utc::now(),
        }
    }

    #[test]
    fn access_token_roundtrip() {
        let config = test_config();
        let user = test_user();

        let token = issue_access_token(&config, &user).unwrap();
        let claims = decode_access_token(&config, &token).unwrap();

        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.username, user.username);
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn refresh_token_roundtrip() {
        let config = test_config();
        let user_id = Uuid::new_v4();

        let token = issue_refresh_token(&config, user_id).unwrap();
        let claims = decode_refresh_token(&config, &token).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn successive_refresh_tokens_differ() {
        let config = test_config();
        let user_id = Uuid::new_v4();

        let first = issue_refresh_token(&config, user_id).unwrap();
        let second = issue_refresh_token(&config, user_id).unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn token_kinds_do_not_cross_verify() {
        let config = test_config();
        let user = test_user();

        let access = issue_access_token(&config, &user).unwrap();
        let refresh = issue_refresh_token(&config, user.id).unwrap();

        assert!(decode_refresh_token(&config, &access).is_err());
        assert!(decode_access_token(&config, &refresh).is_err());
    }

    #[test]
    fn tampered_token_is_rejected() {
        let config = test_config();
        let token = issue_refresh_token(&config, Uuid::new_v4()).unwrap();

        let mut tampered = token.clone();
        tampered.pop();

        assert!(decode_refresh_token(&config, &tampered).is_err());
    }
}
