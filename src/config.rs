use std::env;

use anyhow::{Context, Result};

pub const TOKEN_TTL_DAYS: i64 = 7;
pub const MAX_PDF_BYTES: u64 = 15 * 1024 * 1024;
pub const PUBLICATION_PREFIX: &str = "JRNL";

const DEFAULT_STORAGE_ROOT: &str = "storage/journals";
const DEFAULT_SEED_ADMIN_EMAIL: &str = "admin@example.edu";
const DEFAULT_SEED_ADMIN_PASSWORD: &str = "change-me";
const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";

/// Environment-derived settings, resolved once at startup.
#[derive(Clone)]
pub struct AppConfig {
    pub token_secret: String,
    pub storage_root: String,
    pub seed_admin_email: String,
    pub seed_admin_password: String,
    pub frontend_url: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let token_secret = env::var("TOKEN_SECRET").context("TOKEN_SECRET env var is missing")?;

        Ok(Self {
            token_secret,
            storage_root: env::var("STORAGE_ROOT")
                .unwrap_or_else(|_| DEFAULT_STORAGE_ROOT.to_string()),
            seed_admin_email: env::var("SEED_ADMIN_EMAIL")
                .unwrap_or_else(|_| DEFAULT_SEED_ADMIN_EMAIL.to_string()),
            seed_admin_password: env::var("SEED_ADMIN_PASSWORD")
                .unwrap_or_else(|_| DEFAULT_SEED_ADMIN_PASSWORD.to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| DEFAULT_FRONTEND_URL.to_string()),
        })
    }
}
