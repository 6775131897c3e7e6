use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::postgres::PgPool;
use tracing::info;
use uuid::Uuid;

/// Represents a user account in the system
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    /// Unique user ID (matches database column 'id')
    pub id: Uuid,
    /// Unique username, stored lower-cased
    pub username: String,
    /// Unique email
    pub email: String,
    /// Display name
    pub full_name: String,
    /// Argon2id password hash; never serialized out
    pub password_hash: String,
    /// URL of the hosted avatar image
    pub avatar_url: Option<String>,
    /// URL of the hosted cover image
    pub cover_image_url: Option<String>,
    /// The single currently-valid refresh token, if any
    pub refresh_token: Option<String>,
    /// When the user was created
    pub created_at_utc: DateTime<Utc>,
    /// When the user was last updated
    pub updated_at_utc: DateTime<Utc>,
}

/// Wire representation of an account. Carries neither the password hash
/// nor the refresh token.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar_url: Option<String>,
    pub cover_image_url: Option<String>,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            avatar_url: user.avatar_url,
            cover_image_url: user.cover_image_url,
            created_at_utc: user.created_at_utc,
            updated_at_utc: user.updated_at_utc,
        }
    }
}

/// Fields required to create a new account. The password arrives here
/// already hashed; the avatar has already been uploaded to the media host.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub avatar_url: String,
    pub cover_image_url: Option<String>,
}

/// Lower-case a username for storage or comparison.
pub fn normalize_username(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("account not found")]
    NotFound,
    #[error("duplicate username or email")]
    Duplicate,
    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            // 23505: Postgres unique_violation
            if db.code().as_deref() == Some("23505") {
                return StoreError::Duplicate;
            }
        }
        StoreError::Database(err)
    }
}

/// Persistence seam for accounts.
///
/// Callers pass usernames already normalized via [`normalize_username`];
/// implementations compare identifiers literally. Column-scoped writes
/// (`set_refresh_token`, `set_password_hash`) touch only their column and
/// never re-validate the rest of the record.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Look up an account by username or email; either may be absent.
    async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, StoreError>;

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError>;

    /// Overwrite the refresh-token slot; `None` clears it. Last writer wins.
    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> Result<(), StoreError>;

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError>;

    async fn update_profile_fields(
        &self,
        id: Uuid,
        full_name: &str,
        email: &str,
    ) -> Result<User, StoreError>;

    async fn set_avatar_url(&self, id: Uuid, url: &str) -> Result<User, StoreError>;

    async fn set_cover_image_url(&self, id: Uuid, url: &str) -> Result<User, StoreError>;
}

#[async_trait]
impl AccountStore for PgPool {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(self)
            .await?;

        Ok(user)
    }

    async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            WHERE ($1::text IS NOT NULL AND username = $1)
               OR ($2::text IS NOT NULL AND email = $2)
            LIMIT 1
            "#,
        )
        .bind(username)
        .bind(email)
        .fetch_optional(self)
        .await?;

        Ok(user)
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, full_name, password_hash, avatar_url, cover_image_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.full_name)
        .bind(&new_user.password_hash)
        .bind(&new_user.avatar_url)
        .bind(&new_user.cover_image_url)
        .fetch_one(self)
        .await?;

        info!("created new user with ID: {}", user.id);

        Ok(user)
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE users SET refresh_token = $1, updated_at_utc = NOW() WHERE id = $2",
        )
        .bind(token)
        .bind(id)
        .execute(self)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $1, updated_at_utc = NOW() WHERE id = $2",
        )
        .bind(password_hash)
        .bind(id)
        .execute(self)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        info!("updated password hash for user {}", id);

        Ok(())
    }

    async fn update_profile_fields(
        &self,
        id: Uuid,
        full_name: &str,
        email: &str,
    ) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET full_name = $1, email = $2, updated_at_utc = NOW()
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(full_name)
        .bind(email)
        .bind(id)
        .fetch_optional(self)
        .await?
        .ok_or(StoreError::NotFound)?;

        info!("updated account details for user {}", id);

        Ok(user)
    }

    async fn set_avatar_url(&self, id: Uuid, url: &str) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET avatar_url = $1, updated_at_utc = NOW()
            WHERE id = $2
            RETURNING *
            "#,
        )
        .bind(url)
        .bind(id)
        .fetch_optional(self)
        .await?
        .ok_or(StoreError::NotFound)?;

        info!("updated avatar for user {}", id);

        Ok(user)
    }

    async fn set_cover_image_url(&self, id: Uuid, url: &str) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET cover_image_url = $1, updated_at_utc = NOW()
            WHERE id = $2
            RETURNING *
            "#,
        )
        .bind(url)
        .bind(id)
        .fetch_optional(self)
        .await?
        .ok_or(StoreError::NotFound)?;

        info!("updated cover image for user {}", id);

        Ok(user)
    }
}
