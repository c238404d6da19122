//! Session tokens
//!
//! HS256 JWTs carried in the `gotek_session` cookie or an
//! `Authorization: Bearer` header.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use gotek_core::models::User;

use crate::ServerConfig;

/// Session cookie name
pub const SESSION_COOKIE: &str = "gotek_session";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// The signed-in user, inserted into request extensions by the auth middleware
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
}

impl AuthUser {
    /// Actor string for the audit log
    pub fn actor(&self) -> String {
        format!("user:{}", self.id)
    }
}

/// Sign a session token for a user
pub fn issue_token(config: &ServerConfig, user: &User) -> Result<String, String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        iat: now.timestamp(),
        exp: (now + Duration::hours(config.session_ttl_hours)).timestamp(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| format!("Failed to sign session token: {}", e))
}

/// Validate a session token's signature and expiry
pub fn verify_token(config: &ServerConfig, token: &str) -> Result<AuthUser, String> {
    let validation = Validation::new(Algorithm::HS256);
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|e| format!("Invalid session token: {}", e))?;

    let id = data
        .claims
        .sub
        .parse()
        .map_err(|_| "Invalid subject in session token".to_string())?;
    Ok(AuthUser {
        id,
        email: data.claims.email,
    })
}

/// `Set-Cookie` value carrying a fresh session
pub fn session_cookie(config: &ServerConfig, token: &str) -> String {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        token,
        config.session_ttl_hours * 3600
    );
    if config.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that clears the session
pub fn expired_cookie(config: &ServerConfig) -> String {
    let mut cookie = format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", SESSION_COOKIE);
    if config.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Session token from a `Cookie` header value
pub fn token_from_cookie_header(header: &str) -> Option<&str> {
    header
        .split(';')
        .map(str::trim)
        .find_map(|pair| pair.strip_prefix(SESSION_COOKIE)?.strip_prefix('='))
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 42,
            name: "Ayu".into(),
            email: "ayu@example.com".into(),
            phone: "6281111111111".into(),
            password_hash: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_token_roundtrip() {
        let config = ServerConfig::new("unit-test-secret");
        let token = issue_token(&config, &user()).unwrap();
        let auth = verify_token(&config, &token).unwrap();
        assert_eq!(auth.id, 42);
        assert_eq!(auth.email, "ayu@example.com");
        assert_eq!(auth.actor(), "user:42");
    }

    #[test]
    fn test_token_rejects_wrong_secret_and_expiry() {
        let config = ServerConfig::new("unit-test-secret");
        let token = issue_token(&config, &user()).unwrap();
        assert!(verify_token(&ServerConfig::new("other"), &token).is_err());

        let expired = ServerConfig {
            session_ttl_hours: -2,
            ..ServerConfig::new("unit-test-secret")
        };
        let token = issue_token(&expired, &user()).unwrap();
        assert!(verify_token(&config, &token).is_err());
    }

    #[test]
    fn test_cookie_parsing() {
        assert_eq!(
            token_from_cookie_header("theme=dark; gotek_session=abc.def.ghi; lang=id"),
            Some("abc.def.ghi")
        );
        assert_eq!(token_from_cookie_header("gotek_session="), None);
        assert_eq!(token_from_cookie_header("gotek_sessionx=abc"), None);
        assert_eq!(token_from_cookie_header("other=1"), None);
    }

    #[test]
    fn test_cookie_attributes() {
        let mut config = ServerConfig::new("s");
        config.session_ttl_hours = 1;
        assert_eq!(
            session_cookie(&config, "tok"),
            "gotek_session=tok; HttpOnly; SameSite=Lax; Path=/; Max-Age=3600; Secure"
        );
        config.cookie_secure = false;
        assert!(!expired_cookie(&config).contains("Secure"));
        assert!(expired_cookie(&config).contains("Max-Age=0"));
    }
}
