use anyhow::{anyhow, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::{local, version4::V4, Local};
use sqlx::Row;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::app::users::user_from_row;
use crate::domain::user::User;
use crate::infra::db::Db;

const TOKEN_ISSUER: &str = "scribe";

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;
/// One year.
pub const MAX_ACCESS_TTL_MINUTES: u64 = 525_600;

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct AuthService {
    db: Db,
    access_key: [u8; 32],
    access_ttl_minutes: u64,
}

impl AuthService {
    pub fn new(db: Db, access_key: [u8; 32], access_ttl_minutes: u64) -> Self {
        Self {
            db,
            access_key,
            access_ttl_minutes,
        }
    }

    pub async fn signup(
        &self,
        username: &str,
        display_name: &str,
        password: &str,
    ) -> Result<User> {
        let password_hash = hash_password(password)?;
        let row = sqlx::query(
            "INSERT INTO users (username, display_name, password_hash) \
             VALUES ($1, $2, $3) \
             RETURNING id, username, display_name, created_at",
        )
        .bind(username)
        .bind(display_name)
        .bind(password_hash)
        .fetch_one(self.db.pool())
        .await?;

        Ok(user_from_row(&row))
    }

    /// `None` for an unknown username or a wrong password.
    pub async fn login(&self, username: &str, password: &str) -> Result<Option<AccessToken>> {
        let row = sqlx::query("SELECT id, password_hash FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(self.db.pool())
            .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let user_id: Uuid = row.get("id");
        let password_hash: String = row.get("password_hash");
        if password_hash.is_empty() {
            return Ok(None);
        }

        if !verify_password(password, &password_hash)? {
            return Ok(None);
        }

        Ok(Some(self.issue_access_token(user_id)?))
    }

    pub fn issue_access_token(&self, user_id: Uuid) -> Result<AccessToken> {
        issue_access_token(&self.access_key, self.access_ttl_minutes, user_id)
    }
}

pub fn issue_access_token(key: &[u8; 32], ttl_minutes: u64, user_id: Uuid) -> Result<AccessToken> {
    let ttl_minutes = ttl_minutes.min(MAX_ACCESS_TTL_MINUTES);
    let duration = std::time::Duration::from_secs(ttl_minutes.saturating_mul(60));
    let mut claims = Claims::new_expires_in(&duration)?;
    claims.issuer(TOKEN_ISSUER)?;
    claims.audience(TOKEN_ISSUER)?;
    claims.subject(&user_id.to_string())?;
    claims.add_additional("typ", "access")?;

    let key = SymmetricKey::<V4>::from(key)?;
    let token = local::encrypt(&key, &claims, None, None)?;
    let expires_at = OffsetDateTime::now_utc()
        + Duration::minutes(i64::try_from(ttl_minutes).unwrap_or(0));

    Ok(AccessToken { token, expires_at })
}

/// `Ok(None)` for tokens that are malformed, expired, or sealed with another key.
pub fn authenticate_access_token(key: &[u8; 32], token: &str) -> Result<Option<AuthSession>> {
    let key = SymmetricKey::<V4>::from(key)?;
    let mut rules = ClaimsValidationRules::new();
    rules.validate_issuer_with(TOKEN_ISSUER);
    rules.validate_audience_with(TOKEN_ISSUER);

    let untrusted = match UntrustedToken::<Local, V4>::try_from(token) {
        Ok(token) => token,
        Err(_) => return Ok(None),
    };
    let trusted = match local::decrypt(&key, &untrusted, &rules, None, None) {
        Ok(token) => token,
        Err(_) => return Ok(None),
    };
    let claims = match trusted.payload_claims() {
        Some(claims) => claims,
        None => return Ok(None),
    };

    if !has_token_type(claims, "access") {
        return Ok(None);
    }
    let user_id = claim_uuid(claims, "sub")?;
    Ok(Some(AuthSession { user_id }))
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {}", err))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| anyhow!("failed to parse password hash: {}", err))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn claim_uuid(claims: &Claims, name: &str) -> Result<Uuid> {
    let value = claims
        .get_claim(name)
        .and_then(|value| value.as_str())
        .ok_or_else(|| anyhow!("missing {} claim", name))?;
    Ok(Uuid::parse_str(value)?)
}

fn has_token_type(claims: &Claims, expected: &str) -> bool {
    claims
        .get_claim("typ")
        .and_then(|value| value.as_str())
        .map(|value| value == expected)
        .unwrap_or(false)
}
