use color_eyre::eyre::eyre;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::auth::JwtConfig;
use crate::media::MediaClient;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub jwt: JwtConfig,
    pub media: MediaClient,
    pub protocol: String,
}

impl AppState {
    pub async fn from_env() -> color_eyre::Result<Self> {
        let pool = setup_db_pool().await?;

        let jwt = JwtConfig::from_env()?;

        let media_base_url = std::env::var("MEDIA_BASE_URL")
            .map_err(|_| eyre!("MEDIA_BASE_URL environment variable not set"))?;

        let client = reqwest::ClientBuilder::new()
            .timeout(std::time::Duration::from_secs(10))
            .use_rustls_tls()
            .build()?;

        Ok(Self {
            db: pool,
            jwt,
            media: MediaClient::new(media_base_url, client),
            protocol: std::env::var("PROTO").unwrap_or_else(|_| "https".to_string()),
        })
    }

    /// Session cookies are marked Secure when serving over https.
    pub fn secure_cookies(&self) -> bool {
        self.protocol == "https"
    }
}

#[tracing::instrument(err)]
pub async fn setup_db_pool() -> color_eyre::Result<PgPool> {
    const MIGRATION_LOCK_ID: i64 = 0xDB_AC_C0_07;

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| eyre!("DATABASE_URL environment variable not set"))?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    sqlx::query("SELECT pg_advisory_lock($1)")
        .bind(MIGRATION_LOCK_ID)
        .execute(&pool)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let unlocked: bool = sqlx::query_scalar("SELECT pg_advisory_unlock($1)")
        .bind(MIGRATION_LOCK_ID)
        .fetch_one(&pool)
        .await?;

    if unlocked {
        info!("migration lock unlocked");
    } else {
        info!("failed to unlock migration lock");
    }

    Ok(pool)
}
