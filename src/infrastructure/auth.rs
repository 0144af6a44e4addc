// Session tokens - HS256 JWTs for the single configured account
use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: i64,
}

#[derive(Clone)]
pub struct TokenService {
    username: String,
    password_hash: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_secs: i64,
}

/// Bcrypt hash for `auth.password_hash`, printed by `lora-dashboard hash-password`
pub fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST).context("Failed to hash password")
}

impl TokenService {
    pub fn new(username: String, password_hash: String, secret: &str, ttl_secs: i64) -> Result<Self> {
        if secret.len() < 16 {
            anyhow::bail!("auth.jwt_secret must be at least 16 bytes");
        }
        // A malformed hash fails to parse here instead of on the first login
        bcrypt::verify("", &password_hash)
            .context("auth.password_hash is not a bcrypt hash")?;

        Ok(Self {
            username,
            password_hash,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
        })
    }

    /// Issue a token when both credentials match. Blocks on bcrypt; async
    /// callers run it on the blocking pool.
    pub fn login(&self, username: &str, password: &str) -> Result<Option<IssuedToken>> {
        let user_ok = bool::from(username.as_bytes().ct_eq(self.username.as_bytes()));
        let pass_ok = bcrypt::verify(password, &self.password_hash)?;
        if !(user_ok & pass_ok) {
            tracing::warn!("Rejected login for user {}", username);
            return Ok(None);
        }

        self.issue(username).map(Some)
    }

    pub fn issue(&self, subject: &str) -> Result<IssuedToken> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: subject.to_string(),
            iat: now,
            exp: now + self.ttl_secs,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;

        Ok(IssuedToken {
            token,
            expires_at: claims.exp,
        })
    }

    pub fn verify(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;

        Ok(decode::<Claims>(token, &self.decoding_key, &validation)?.claims)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const SECRET: &str = "0123456789abcdef0123456789abcdef";

    /// Lowest bcrypt cost keeps the tests fast
    pub(crate) fn service_with(secret: &str, ttl_secs: i64) -> TokenService {
        let hash = bcrypt::hash("hunter22", 4).unwrap();
        TokenService::new("admin".to_string(), hash, secret, ttl_secs).unwrap()
    }

    fn service(ttl_secs: i64) -> TokenService {
        service_with(SECRET, ttl_secs)
    }

    #[test]
    fn test_login_issues_verifiable_token() {
        let service = service(3600);
        let issued = service.login("admin", "hunter22").unwrap().unwrap();

        let claims = service.verify(&issued.token).unwrap();
        assert_eq!(claims.sub, "admin");
        assert_eq!(claims.exp, issued.expires_at);
    }

    #[test]
    fn test_wrong_credentials() {
        let service = service(3600);
        assert!(service.login("admin", "hunter2").unwrap().is_none());
        assert!(service.login("root", "hunter22").unwrap().is_none());
    }

    #[test]
    fn test_rejects_expired_and_foreign_tokens() {
        let expired = service(-60).issue("admin").unwrap();
        assert!(service(3600).verify(&expired.token).is_err());

        let other = service_with("another-secret-of-enough-length", 3600)
            .issue("admin")
            .unwrap();
        assert!(service(3600).verify(&other.token).is_err());
        assert!(service(3600).verify("not.a.jwt").is_err());
    }

    #[test]
    fn test_weak_configuration_rejected() {
        let hash = bcrypt::hash("hunter22", 4).unwrap();
        assert!(TokenService::new("admin".to_string(), hash, "short", 60).is_err());
        assert!(TokenService::new("admin".to_string(), String::new(), SECRET, 60).is_err());
        assert!(TokenService::new("admin".to_string(), "hunter22".to_string(), SECRET, 60).is_err());
    }

    #[test]
    fn test_hash_password_round_trips_through_login() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$2"));
        let service = TokenService::new("admin".to_string(), hash, SECRET, 60).unwrap();
        assert!(service.login("admin", "correct horse").unwrap().is_some());
    }
}
