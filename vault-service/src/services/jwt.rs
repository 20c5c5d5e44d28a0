//! RS256 session and step-up tokens. The two token kinds carry distinct
//! audiences so neither can be replayed as the other.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fs;
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::models::{Principal, Role};

pub const SESSION_AUDIENCE: &str = "vault-session";
pub const STEP_UP_AUDIENCE: &str = "vault-step-up";
pub const STEP_UP_SCOPE: &str = "document_access";

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    session_ttl: Duration,
    step_up_ttl: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Principal id
    pub sub: Uuid,
    pub role: Role,
    pub vault_id: Uuid,
    pub aud: String,
    pub iss: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepUpClaims {
    pub sub: Uuid,
    pub role: Role,
    pub scope: String,
    pub aud: String,
    pub iss: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: Uuid,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_in: i64,
}

impl JwtService {
    /// Load RSA keys from the configured PEM files.
    pub fn new(config: &JwtConfig) -> Result<Self, anyhow::Error> {
        let private_key_pem = fs::read_to_string(&config.private_key_path).map_err(|e| {
            anyhow::anyhow!(
                "Failed to read private key from {}: {}",
                config.private_key_path,
                e
            )
        })?;

        let public_key_pem = fs::read_to_string(&config.public_key_path).map_err(|e| {
            anyhow::anyhow!(
                "Failed to read public key from {}: {}",
                config.public_key_path,
                e
            )
        })?;

        let service = Self::from_pem(
            private_key_pem.as_bytes(),
            public_key_pem.as_bytes(),
            &config.issuer,
        )?
        .with_ttls(
            Duration::days(config.session_expiry_days),
            Duration::minutes(config.step_up_expiry_minutes),
        );

        tracing::info!("JWT service initialized with RS256 keys");
        Ok(service)
    }

    pub fn from_pem(
        private_key_pem: &[u8],
        public_key_pem: &[u8],
        issuer: &str,
    ) -> Result<Self, anyhow::Error> {
        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem)
            .map_err(|e| anyhow::anyhow!("Failed to parse private key: {}", e))?;
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem)
            .map_err(|e| anyhow::anyhow!("Failed to parse public key: {}", e))?;

        Ok(Self {
            encoding_key,
            decoding_key,
            issuer: issuer.to_string(),
            session_ttl: Duration::days(7),
            step_up_ttl: Duration::minutes(5),
        })
    }

    pub fn with_ttls(mut self, session_ttl: Duration, step_up_ttl: Duration) -> Self {
        self.session_ttl = session_ttl;
        self.step_up_ttl = step_up_ttl;
        self
    }

    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl.num_seconds()
    }

    fn validation(&self, audience: &str) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;
        validation.leeway = 5;
        validation.set_audience(&[audience]);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation
    }

    pub fn issue_session(&self, principal: &Principal) -> Result<IssuedToken, anyhow::Error> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: principal.id,
            role: principal.role,
            vault_id: principal.vault_id,
            aud: SESSION_AUDIENCE.to_string(),
            iss: self.issuer.clone(),
            exp: (now + self.session_ttl).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4(),
        };

        let token = encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode session token: {}", e))?;

        Ok(IssuedToken {
            token,
            expires_in: self.session_ttl.num_seconds(),
        })
    }

    pub fn verify_session(&self, token: &str) -> Result<SessionClaims, anyhow::Error> {
        let data = decode::<SessionClaims>(
            token,
            &self.decoding_key,
            &self.validation(SESSION_AUDIENCE),
        )
        .map_err(|e| anyhow::anyhow!("Invalid session token: {}", e))?;
        Ok(data.claims)
    }

    pub fn issue_step_up(&self, principal_id: Uuid, role: Role) -> Result<IssuedToken, anyhow::Error> {
        let now = Utc::now();
        let claims = StepUpClaims {
            sub: principal_id,
            role,
            scope: STEP_UP_SCOPE.to_string(),
            aud: STEP_UP_AUDIENCE.to_string(),
            iss: self.issuer.clone(),
            exp: (now + self.step_up_ttl).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4(),
        };

        let token = encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode step-up token: {}", e))?;

        Ok(IssuedToken {
            token,
            expires_in: self.step_up_ttl.num_seconds(),
        })
    }

    pub fn verify_step_up(&self, token: &str) -> Result<StepUpClaims, anyhow::Error> {
        let data = decode::<StepUpClaims>(
            token,
            &self.decoding_key,
            &self.validation(STEP_UP_AUDIENCE),
        )
        .map_err(|e| anyhow::anyhow!("Invalid step-up token: {}", e))?;

        if data.claims.scope != STEP_UP_SCOPE {
            return Err(anyhow::anyhow!("Step-up token has wrong scope"));
        }
        Ok(data.claims)
    }
}
