//! JWT issuance and validation (HS256)
//!
//! Three lifetimes are in play: access tokens (30 minutes), refresh tokens
//! (30 days) and the short verification token handed out after a password
//! reset code is redeemed (10 minutes). Verification tokens are access
//! tokens with a shorter expiry, so they pass the same guards.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::db::models::Role;

const ACCESS_TOKEN_EXPIRATION_MINUTES: i64 = 30;
const REFRESH_TOKEN_EXPIRATION_DAYS: i64 = 30;
const VERIFICATION_TOKEN_EXPIRATION_MINUTES: i64 = 10;
const DEFAULT_ISSUER: &str = "realtors";

/// JWT configuration
#[derive(Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expiration_minutes: i64,
    pub refresh_token_expiration_days: i64,
    pub verification_token_expiration_minutes: i64,
    pub issuer: String,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("access_token_expiration_minutes", &self.access_token_expiration_minutes)
            .field("refresh_token_expiration_days", &self.refresh_token_expiration_days)
            .field(
                "verification_token_expiration_minutes",
                &self.verification_token_expiration_minutes,
            )
            .field("issuer", &self.issuer)
            .finish()
    }
}

impl JwtConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            access_token_expiration_minutes: ACCESS_TOKEN_EXPIRATION_MINUTES,
            refresh_token_expiration_days: REFRESH_TOKEN_EXPIRATION_DAYS,
            verification_token_expiration_minutes: VERIFICATION_TOKEN_EXPIRATION_MINUTES,
            issuer: DEFAULT_ISSUER.to_string(),
        }
    }

    /// Create config from JWT_SECRET, with optional JWT_ACCESS_EXPIRATION_MINUTES,
    /// JWT_REFRESH_EXPIRATION_DAYS and JWT_ISSUER overrides
    pub fn from_env() -> Result<Self, JwtError> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| JwtError::MissingSecret)?;
        let mut config = Self::new(secret);

        if let Some(minutes) = std::env::var("JWT_ACCESS_EXPIRATION_MINUTES")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.access_token_expiration_minutes = minutes;
        }
        if let Some(days) = std::env::var("JWT_REFRESH_EXPIRATION_DAYS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.refresh_token_expiration_days = days;
        }
        if let Ok(issuer) = std::env::var("JWT_ISSUER") {
            config.issuer = issuer;
        }

        Ok(config)
    }

    pub fn access_token_expiration(mut self, minutes: i64) -> Self {
        self.access_token_expiration_minutes = minutes;
        self
    }

    pub fn refresh_token_expiration(mut self, days: i64) -> Self {
        self.refresh_token_expiration_days = days;
        self
    }

    pub fn verification_token_expiration(mut self, minutes: i64) -> Self {
        self.verification_token_expiration_minutes = minutes;
        self
    }

    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }
}

/// JWT errors
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("JWT_SECRET environment variable not set")]
    MissingSecret,

    #[error("Token encoding failed: {0}")]
    EncodingError(String),

    #[error("Token decoding failed: {0}")]
    DecodingError(String),

    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid token type")]
    InvalidTokenType,
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            ErrorKind::InvalidToken
            | ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidIssuer => JwtError::InvalidToken,
            _ => JwtError::DecodingError(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenType::Access => write!(f, "access"),
            TokenType::Refresh => write!(f, "refresh"),
        }
    }
}

/// JWT claims
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    pub role: Role,
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub jti: String,
}

impl Claims {
    pub fn is_access_token(&self) -> bool {
        self.token_type == TokenType::Access
    }

    pub fn is_refresh_token(&self) -> bool {
        self.token_type == TokenType::Refresh
    }

    pub fn user_id(&self) -> Result<Uuid, JwtError> {
        Uuid::parse_str(&self.sub).map_err(|_| JwtError::InvalidToken)
    }
}

/// Access + refresh token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: i64,
    pub refresh_expires_at: i64,
}

#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    pub fn from_env() -> Result<Self, JwtError> {
        Ok(Self::new(JwtConfig::from_env()?))
    }

    fn issue(
        &self,
        user_id: Uuid,
        role: Role,
        token_type: TokenType,
        lifetime: Duration,
    ) -> Result<(String, i64), JwtError> {
        let now = Utc::now();
        let exp = now + lifetime;

        let claims = Claims {
            sub: user_id.to_string(),
            role,
            token_type,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: self.config.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| JwtError::EncodingError(e.to_string()))?;

        Ok((token, exp.timestamp()))
    }

    /// Generate an access token, returning it with its expiry timestamp
    pub fn generate_access_token(&self, user_id: Uuid, role: Role) -> Result<(String, i64), JwtError> {
        self.issue(
            user_id,
            role,
            TokenType::Access,
            Duration::minutes(self.config.access_token_expiration_minutes),
        )
    }

    pub fn generate_refresh_token(&self, user_id: Uuid, role: Role) -> Result<(String, i64), JwtError> {
        self.issue(
            user_id,
            role,
            TokenType::Refresh,
            Duration::days(self.config.refresh_token_expiration_days),
        )
    }

    /// Short-lived access token issued after a reset code is redeemed
    pub fn generate_verification_token(&self, user_id: Uuid, role: Role) -> Result<String, JwtError> {
        let (token, _) = self.issue(
            user_id,
            role,
            TokenType::Access,
            Duration::minutes(self.config.verification_token_expiration_minutes),
        )?;
        Ok(token)
    }

    pub fn generate_token_pair(&self, user_id: Uuid, role: Role) -> Result<TokenPair, JwtError> {
        let (access_token, access_expires_at) = self.generate_access_token(user_id, role)?;
        let (refresh_token, refresh_expires_at) = self.generate_refresh_token(user_id, role)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
        })
    }

    /// Validate signature, issuer and expiry
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.config.issuer]);
        // strict expiry
        validation.leeway = 0;

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)?;
        Ok(token_data.claims)
    }

    pub fn validate_access_token(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = self.validate_token(token)?;
        if !claims.is_access_token() {
            return Err(JwtError::InvalidTokenType);
        }
        Ok(claims)
    }

    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = self.validate_token(token)?;
        if !claims.is_refresh_token() {
            return Err(JwtError::InvalidTokenType);
        }
        Ok(claims)
    }

    pub fn refresh_token_expiration_days(&self) -> i64 {
        self.config.refresh_token_expiration_days
    }
}
