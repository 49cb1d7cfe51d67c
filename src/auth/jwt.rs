/// JWT token minting and verification
///
/// Both halves are built once from `JwtSettings` at startup and shared; no
/// request path reads the secret or algorithm from anywhere else.
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sha2::{Digest, Sha256};

use crate::auth::claims::{Claims, TokenType};
use crate::auth::Identity;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError, ConfigError};

/// A freshly signed token and the instant it stops being valid.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub token_type: TokenType,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TokenIssuer {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
}

impl TokenIssuer {
    pub fn new(config: &JwtSettings) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            algorithm: config.signing_algorithm()?,
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
        })
    }

    pub fn issue(
        &self,
        identity: &Identity,
        token_type: TokenType,
        ttl: Duration,
    ) -> Result<IssuedToken, AppError> {
        self.issue_at(identity, token_type, ttl, Utc::now())
    }

    /// Signs claims for `identity` as of `now`.
    pub fn issue_at(
        &self,
        identity: &Identity,
        token_type: TokenType,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AppError> {
        let expires_at = now.checked_add_signed(ttl).ok_or_else(|| {
            ConfigError::InvalidValue(format!("{} token lifetime is out of range", token_type))
        })?;
        let claims = Claims::new(identity, token_type, now, expires_at);

        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))?;

        Ok(IssuedToken {
            token,
            token_type,
            expires_at,
        })
    }
}

#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(config: &JwtSettings) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut validation = Validation::new(config.signing_algorithm()?);
        validation.leeway = 0;
        validation.validate_exp = true;

        Ok(Self {
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
        })
    }

    /// Checks signature and expiry and returns the embedded claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => {
                    tracing::warn!("JWT validation error: {}", e);
                    AuthError::TokenInvalid
                }
            })
    }
}

/// SHA-256 hex digest of a token; the session store only ever sees this.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
