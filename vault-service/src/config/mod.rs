use std::env;
use vault_core::config as core_config;
use vault_core::error::AppError;

#[derive(Debug, Clone)]
pub struct VaultConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub session: SessionConfig,
    pub reset: ResetConfig,
    pub smtp: Option<SmtpConfig>,
    pub scoring: ScoringConfig,
    pub documents: DocumentConfig,
    pub security: SecurityConfig,
    pub swagger: SwaggerConfig,
    pub rate_limit: RateLimitConfig,
    pub bootstrap_admin: Option<BootstrapAdminConfig>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub private_key_path: String,
    pub public_key_path: String,
    pub issuer: String,
    pub session_expiry_days: i64,
    pub step_up_expiry_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub cookie_secure: bool,
}

#[derive(Debug, Clone)]
pub struct ResetConfig {
    pub token_expiry_minutes: i64,
    /// Base of the link mailed to the user; the token is appended as a query parameter.
    pub public_base_url: String,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub url: Option<String>,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct DocumentConfig {
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SwaggerConfig {
    pub enabled: SwaggerMode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SwaggerMode {
    Public,
    /// Served to `gov_admin` sessions only.
    Authenticated,
    Disabled,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub login_attempts: u32,
    pub login_window_seconds: u64,
    pub register_attempts: u32,
    pub register_window_seconds: u64,
    pub password_reset_attempts: u32,
    pub password_reset_window_seconds: u64,
    pub step_up_attempts: u32,
    pub step_up_window_seconds: u64,
    pub global_ip_limit: u32,
    pub global_ip_window_seconds: u64,
    /// Reverse proxies in front of the service. Zero ignores `X-Forwarded-For`.
    pub trusted_proxy_hops: usize,
}

#[derive(Debug, Clone)]
pub struct BootstrapAdminConfig {
    pub email: String,
    pub password: String,
    pub telephone: String,
}

impl VaultConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        Self::from_lookup(common, |key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment: Environment = lookup("ENVIRONMENT")
            .unwrap_or_else(|| "dev".to_string())
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;
        let get = |key: &str, default: Option<&str>| get_env(&lookup, key, default, is_prod);
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend: StoreBackend = get("STORE_BACKEND", Some("postgres"))?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let smtp = match optional("SMTP_HOST") {
            Some(host) => Some(SmtpConfig {
                host,
                port: parse(&get("SMTP_PORT", Some("587"))?, "SMTP_PORT")?,
                username: get("SMTP_USERNAME", None)?,
                password: get("SMTP_PASSWORD", None)?,
                from_address: get("SMTP_FROM", None)?,
            }),
            None => None,
        };

        let bootstrap_admin = match optional("BOOTSTRAP_ADMIN_EMAIL") {
            Some(email) => Some(BootstrapAdminConfig {
                email,
                password: get("BOOTSTRAP_ADMIN_PASSWORD", None)?,
                telephone: get("BOOTSTRAP_ADMIN_TELEPHONE", None)?,
            }),
            None => None,
        };

        let config = VaultConfig {
            common,
            environment: environment.clone(),
            service_name: get("SERVICE_NAME", Some("vault-service"))?,
            service_version: get("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")))?,
            log_level: get("LOG_LEVEL", Some("info"))?,
            otlp_endpoint: optional("OTLP_ENDPOINT"),
            database: DatabaseConfig {
                url: match backend {
                    StoreBackend::Postgres => Some(get("DATABASE_URL", None)?),
                    StoreBackend::Memory => optional("DATABASE_URL"),
                },
                backend,
                max_connections: parse(
                    &get("DATABASE_MAX_CONNECTIONS", Some("10"))?,
                    "DATABASE_MAX_CONNECTIONS",
                )?,
                min_connections: parse(
                    &get("DATABASE_MIN_CONNECTIONS", Some("1"))?,
                    "DATABASE_MIN_CONNECTIONS",
                )?,
                acquire_timeout_seconds: parse(
                    &get("DATABASE_ACQUIRE_TIMEOUT_SECONDS", Some("5"))?,
                    "DATABASE_ACQUIRE_TIMEOUT_SECONDS",
                )?,
            },
            jwt: JwtConfig {
                private_key_path: get("JWT_PRIVATE_KEY_PATH", None)?,
                public_key_path: get("JWT_PUBLIC_KEY_PATH", None)?,
                issuer: get("JWT_ISSUER", Some("vault-service"))?,
                session_expiry_days: parse(
                    &get("JWT_SESSION_EXPIRY_DAYS", Some("7"))?,
                    "JWT_SESSION_EXPIRY_DAYS",
                )?,
                step_up_expiry_minutes: parse(
                    &get("JWT_STEP_UP_EXPIRY_MINUTES", Some("5"))?,
                    "JWT_STEP_UP_EXPIRY_MINUTES",
                )?,
            },
            session: SessionConfig {
                cookie_secure: get("SESSION_COOKIE_SECURE", Some("false"))?
                    .parse()
                    .unwrap_or(false),
            },
            reset: ResetConfig {
                token_expiry_minutes: parse(
                    &get("RESET_TOKEN_EXPIRY_MINUTES", Some("15"))?,
                    "RESET_TOKEN_EXPIRY_MINUTES",
                )?,
                public_base_url: get("PUBLIC_BASE_URL", Some("http://localhost:3000"))?,
            },
            smtp,
            scoring: ScoringConfig {
                url: optional("SCORING_URL"),
                timeout_ms: parse(&get("SCORING_TIMEOUT_MS", Some("3000"))?, "SCORING_TIMEOUT_MS")?,
            },
            documents: DocumentConfig {
                max_body_bytes: parse(
                    &get("MAX_BODY_BYTES", Some("1048576"))?,
                    "MAX_BODY_BYTES",
                )?,
            },
            security: SecurityConfig {
                allowed_origins: get("ALLOWED_ORIGINS", Some("http://localhost:3000"))?
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            swagger: SwaggerConfig {
                enabled: get("ENABLE_SWAGGER", Some("public"))?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
            },
            rate_limit: RateLimitConfig {
                login_attempts: get("RATE_LIMIT_LOGIN_ATTEMPTS", Some("5"))?
                    .parse()
                    .unwrap_or(5),
                login_window_seconds: get("RATE_LIMIT_LOGIN_WINDOW_SECONDS", Some("900"))?
                    .parse()
                    .unwrap_or(900),
                register_attempts: get("RATE_LIMIT_REGISTER_ATTEMPTS", Some("3"))?
                    .parse()
                    .unwrap_or(3),
                register_window_seconds: get("RATE_LIMIT_REGISTER_WINDOW_SECONDS", Some("3600"))?
                    .parse()
                    .unwrap_or(3600),
                password_reset_attempts: get("RATE_LIMIT_PASSWORD_RESET_ATTEMPTS", Some("3"))?
                    .parse()
                    .unwrap_or(3),
                password_reset_window_seconds: get(
                    "RATE_LIMIT_PASSWORD_RESET_WINDOW_SECONDS",
                    Some("3600"),
                )?
                .parse()
                .unwrap_or(3600),
                step_up_attempts: get("RATE_LIMIT_STEP_UP_ATTEMPTS", Some("5"))?
                    .parse()
                    .unwrap_or(5),
                step_up_window_seconds: get("RATE_LIMIT_STEP_UP_WINDOW_SECONDS", Some("300"))?
                    .parse()
                    .unwrap_or(300),
                global_ip_limit: get("RATE_LIMIT_GLOBAL_IP_LIMIT", Some("100"))?
                    .parse()
                    .unwrap_or(100),
                global_ip_window_seconds: get("RATE_LIMIT_GLOBAL_IP_WINDOW_SECONDS", Some("60"))?
                    .parse()
                    .unwrap_or(60),
                trusted_proxy_hops: parse(
                    &get("TRUSTED_PROXY_HOPS", Some("0"))?,
                    "TRUSTED_PROXY_HOPS",
                )?,
            },
            bootstrap_admin,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.jwt.session_expiry_days <= 0 || self.jwt.step_up_expiry_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT expiry settings must be positive"
            )));
        }

        if self.reset.token_expiry_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "RESET_TOKEN_EXPIRY_MINUTES must be positive"
            )));
        }

        if self.environment == Environment::Prod {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }

            if self.database.backend == StoreBackend::Memory {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "The memory store is not allowed in production"
                )));
            }

            if !self.session.cookie_secure {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "SESSION_COOKIE_SECURE must be true in production"
                )));
            }

            if self.swagger.enabled == SwaggerMode::Public {
                tracing::error!("Swagger is publicly accessible in production - consider using 'authenticated' or 'disabled'");
            }
        }

        Ok(())
    }
}

fn get_env<F>(lookup: &F, key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(val) => Ok(val),
        None => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn parse<T>(value: &str, key: &str) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("Invalid {}: {}", key, e)))
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(format!("Invalid store backend: {}", s)),
        }
    }
}

impl std::str::FromStr for SwaggerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(SwaggerMode::Public),
            "authenticated" => Ok(SwaggerMode::Authenticated),
            "disabled" => Ok(SwaggerMode::Disabled),
            _ => Err(format!("Invalid swagger mode: {}", s)),
        }
    }
}
