use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode, header},
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;
use uuid::Uuid;

use crate::{
    config::TOKEN_TTL_DAYS,
    error::ApiError,
    web::{
        AppState,
        models::{DbAccount, Role},
    },
};

/// Identity resolved from a bearer token. Carries only what the token itself
/// asserts; there is no session table and no server-side revocation, so a
/// leaked token stays valid until it expires.
#[derive(Clone, Copy, Debug)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    role: String,
    iat: i64,
    exp: i64,
}

pub fn issue_token(secret: &str, account_id: Uuid, role: Role) -> Result<String, ApiError> {
    issue_token_with_ttl(secret, account_id, role, ChronoDuration::days(TOKEN_TTL_DAYS))
}

fn issue_token_with_ttl(
    secret: &str,
    account_id: Uuid,
    role: Role,
    ttl: ChronoDuration,
) -> Result<String, ApiError> {
    let now = Utc::now();
    let claims = Claims {
        sub: account_id,
        role: role.as_str().to_string(),
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|err| {
        error!(?err, "failed to sign token");
        ApiError::Internal(anyhow::anyhow!("token signing failed"))
    })
}

pub fn resolve_token(secret: &str, token: &str) -> Result<AuthUser, ApiError> {
    let decoded = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|_| ApiError::Unauthorized)?;

    let role = Role::parse(&decoded.claims.role).ok_or(ApiError::Unauthorized)?;
    Ok(AuthUser {
        id: decoded.claims.sub,
        role,
    })
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Resolve the caller from the Authorization header. Signature and expiry are
/// the only validity checks.
pub fn require_user(state: &AppState, headers: &HeaderMap) -> Result<AuthUser, ApiError> {
    let token = bearer_token(headers).ok_or(ApiError::Unauthorized)?;
    resolve_token(&state.config().token_secret, token)
}

/// Role checks run before any resource lookup so unauthorized callers learn
/// nothing about record existence.
pub fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<AuthUser, ApiError> {
    let user = require_user(state, headers)?;
    if user.role != Role::Admin {
        return Err(ApiError::Forbidden);
    }
    Ok(user)
}

pub fn require_student(state: &AppState, headers: &HeaderMap) -> Result<AuthUser, ApiError> {
    let user = require_user(state, headers)?;
    if user.role != Role::Student {
        return Err(ApiError::Forbidden);
    }
    Ok(user)
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let parsed = PasswordHash::new(password_hash);
    match parsed {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}

/// Agreement flags arrive from clients as either a JSON boolean or the
/// strings "true"/"false". Parsed exactly once here; anything else is
/// rejected instead of being coerced downstream.
pub fn parse_agreement(value: &Value) -> Result<bool, ApiError> {
    match value {
        Value::Bool(flag) => Ok(*flag),
        Value::String(text) => match text.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(ApiError::validation(
                "agreement_accepted must be true or false",
            )),
        },
        _ => Err(ApiError::validation(
            "agreement_accepted must be true or false",
        )),
    }
}

#[derive(Deserialize)]
pub struct RegisterPayload {
    pub name: String,
    pub email: String,
    pub password: String,
    pub college: String,
    pub department: String,
    pub year: String,
    #[serde(default)]
    pub agreement_accepted: Value,
}

#[derive(Deserialize)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AccountInfo {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub college: String,
    pub department: String,
    pub year: String,
}

impl From<DbAccount> for AccountInfo {
    fn from(account: DbAccount) -> Self {
        Self {
            id: account.id,
            name: account.name,
            email: account.email,
            role: account.role,
            college: account.college,
            department: account.department,
            year: account.year,
        }
    }
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub message: String,
    pub token: String,
    pub user: AccountInfo,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterPayload>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let name = payload.name.trim();
    let college = payload.college.trim();
    let department = payload.department.trim();
    let year = payload.year.trim();

    if name.is_empty() {
        return Err(ApiError::validation("Name is required"));
    }
    let email = normalize_email(&payload.email)?;
    if payload.password.len() < 6 {
        return Err(ApiError::validation(
            "Password must be at least 6 characters",
        ));
    }
    if college.is_empty() {
        return Err(ApiError::validation("College is required"));
    }
    if department.is_empty() {
        return Err(ApiError::validation("Department is required"));
    }
    if year.is_empty() {
        return Err(ApiError::validation("Year is required"));
    }
    if !parse_agreement(&payload.agreement_accepted)? {
        return Err(ApiError::validation("You must accept the agreement"));
    }

    let password_hash = hash_password(&payload.password).map_err(|err| {
        error!(?err, "failed to hash password during registration");
        ApiError::Internal(anyhow::anyhow!("password hashing failed"))
    })?;

    let account_id = Uuid::new_v4();
    let result = sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, role, college, department, year)
         VALUES ($1, $2, $3, $4, 'student', $5, $6, $7)",
    )
    .bind(account_id)
    .bind(name)
    .bind(&email)
    .bind(&password_hash)
    .bind(college)
    .bind(department)
    .bind(year)
    .execute(state.pool_ref())
    .await;

    match result {
        Ok(_) => {}
        Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505") => {
            return Err(ApiError::DuplicateIdentity);
        }
        Err(err) => return Err(err.into()),
    }

    let token = issue_token(&state.config().token_secret, account_id, Role::Student)?;
    let user = AccountInfo {
        id: account_id,
        name: name.to_string(),
        email,
        role: Role::Student.as_str().to_string(),
        college: college.to_string(),
        department: department.to_string(),
        year: year.to_string(),
    };

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "Registration successful".to_string(),
            token,
            user,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<Json<AuthResponse>, ApiError> {
    let account = fetch_account_for_login(&state, &payload.email, None).await?;
    complete_login(&state, account, &payload.password, "Login successful")
}

/// Separate admin entry point: the stored role must already be admin, so a
/// student credential can never mint an admin token here.
pub async fn admin_login(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<Json<AuthResponse>, ApiError> {
    let account = fetch_account_for_login(&state, &payload.email, Some(Role::Admin)).await?;
    complete_login(&state, account, &payload.password, "Admin login successful")
}

async fn fetch_account_for_login(
    state: &AppState,
    email: &str,
    required_role: Option<Role>,
) -> Result<DbAccount, ApiError> {
    let email = email.trim().to_ascii_lowercase();

    let account = sqlx::query_as::<_, DbAccount>(
        "SELECT id, name, email, password_hash, role, college, department, year
         FROM users WHERE email = $1",
    )
    .bind(&email)
    .fetch_optional(state.pool_ref())
    .await?
    .ok_or(ApiError::Unauthorized)?;

    if let Some(required) = required_role {
        if Role::parse(&account.role) != Some(required) {
            return Err(ApiError::Unauthorized);
        }
    }

    Ok(account)
}

fn complete_login(
    state: &AppState,
    account: DbAccount,
    password: &str,
    message: &str,
) -> Result<Json<AuthResponse>, ApiError> {
    if !verify_password(password, &account.password_hash) {
        return Err(ApiError::Unauthorized);
    }

    let role = Role::parse(&account.role).ok_or(ApiError::Unauthorized)?;
    let token = issue_token(&state.config().token_secret, account.id, role)?;

    Ok(Json(AuthResponse {
        message: message.to_string(),
        token,
        user: account.into(),
    }))
}

fn normalize_email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim().to_ascii_lowercase();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        return Err(ApiError::validation("Valid email is required"));
    }
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &str = "test-secret";

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("s3cret-pass").expect("hashing should succeed");
        assert!(verify_password("s3cret-pass", &hash));
        assert!(!verify_password("wrong-pass", &hash));
    }

    #[test]
    fn verify_rejects_malformed_hash() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn token_round_trips_identity_and_role() {
        let id = Uuid::new_v4();
        let token = issue_token(SECRET, id, Role::Admin).expect("token should issue");
        let user = resolve_token(SECRET, &token).expect("token should resolve");
        assert_eq!(user.id, id);
        assert_eq!(user.role, Role::Admin);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = issue_token("other-secret", Uuid::new_v4(), Role::Student).unwrap();
        assert!(matches!(
            resolve_token(SECRET, &token),
            Err(ApiError::Unauthorized)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = issue_token_with_ttl(
            SECRET,
            Uuid::new_v4(),
            Role::Student,
            ChronoDuration::days(-1),
        )
        .unwrap();
        assert!(matches!(
            resolve_token(SECRET, &token),
            Err(ApiError::Unauthorized)
        ));
    }

    #[test]
    fn agreement_accepts_bool_and_literal_strings() {
        assert_eq!(parse_agreement(&json!(true)).unwrap(), true);
        assert_eq!(parse_agreement(&json!("false")).unwrap(), false);
        assert!(parse_agreement(&json!("yes")).is_err());
        assert!(parse_agreement(&json!(1)).is_err());
        assert!(parse_agreement(&Value::Null).is_err());
    }

    #[test]
    fn email_normalization_is_case_insensitive() {
        assert_eq!(
            normalize_email(" Student@Uni.EDU ").unwrap(),
            "student@uni.edu"
        );
        assert!(normalize_email("not-an-email").is_err());
        assert!(normalize_email("@uni.edu").is_err());
    }
}
