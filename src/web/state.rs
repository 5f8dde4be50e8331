use std::{env, sync::Arc};

use anyhow::{Context, Result, anyhow};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{config::AppConfig, notify::MailClient, web::storage};

#[derive(Clone)]
pub struct AppState {
    pool: PgPool,
    config: Arc<AppConfig>,
    mail: MailClient,
}

impl AppState {
    pub async fn new() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL env var is missing")?;
        let config = AppConfig::from_env()?;

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&database_url)
            .await
            .context("failed to connect to Postgres")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run database migrations")?;

        storage::ensure_storage_root(&config.storage_root).await?;

        Ok(Self {
            pool,
            config: Arc::new(config),
            mail: MailClient::from_env(),
        })
    }

    /// Idempotent bootstrap: guarantee at least one admin account exists.
    /// Runs once at startup, never as part of request serving.
    pub async fn ensure_seed_admin(&self) -> Result<()> {
        let has_admin: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE role = 'admin')")
                .fetch_one(&self.pool)
                .await
                .context("failed to verify admin presence")?;

        if !has_admin {
            let email = self.config.seed_admin_email.trim().to_ascii_lowercase();
            let password_hash = crate::web::auth::hash_password(&self.config.seed_admin_password)
                .map_err(|err| anyhow!("failed to hash seed admin password: {err}"))?;

            sqlx::query(
                "INSERT INTO users (id, name, email, password_hash, role) \
                 VALUES ($1, $2, $3, $4, 'admin')",
            )
            .bind(Uuid::new_v4())
            .bind("Journals Admin")
            .bind(&email)
            .bind(password_hash)
            .execute(&self.pool)
            .await
            .context("failed to insert seed admin user")?;

            warn!(%email, "Seeded default admin account. Update its password promptly.");
        } else {
            info!("admin account already present, skipping seed");
        }

        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn mail_client(&self) -> MailClient {
        self.mail.clone()
    }

    pub fn pool_ref(&self) -> &PgPool {
        &self.pool
    }
}
