use std::env;

/// Sentinel `DATABASE_URL` value selecting the in-memory repository.
pub const MEMORY_DATABASE: &str = "memory";

const LOCAL_JWT_SECRET: &str = "doc-archive-local-development-secret";
const DEFAULT_TOKEN_TTL_SECS: u64 = 60 * 60 * 24;

/// AppConfig
///
/// Holds the application's entire configuration state. Immutable once loaded and
/// pulled into handlers and the access gate via `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Postgres connection string, or `memory` for the in-process store.
    pub db_url: String,
    // Runtime environment marker. Controls the local `x-user-id` bypass and log format.
    pub env: Env,
    // HMAC secret used to sign and verify bearer tokens.
    pub jwt_secret: String,
    // Lifetime of issued bearer tokens, in seconds.
    pub token_ttl_secs: u64,
    // Directory receiving uploaded document files.
    pub upload_dir: String,
    pub bind_addr: String,
    // Browser origin allowed by CORS (credentials enabled).
    pub cors_origin: String,
    // Optional bootstrap administrator, created at startup when absent.
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

/// Env
///
/// Runtime context: `Local` enables development conveniences, `Production`
/// demands every secret explicitly.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// Non-panicking configuration for tests and state scaffolding.
    fn default() -> Self {
        Self {
            db_url: MEMORY_DATABASE.to_string(),
            env: Env::Local,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            upload_dir: "./public/documents".to_string(),
            bind_addr: "0.0.0.0:3000".to_string(),
            cors_origin: "http://localhost:8080".to_string(),
            admin_email: None,
            admin_password: None,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables, fail-fast.
    ///
    /// # Panics
    /// Panics in production when `DATABASE_URL` or `JWT_SECRET` is missing, so the
    /// service never starts with an insecure configuration.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };
        let defaults = Self::default();

        let (db_url, jwt_secret) = match env {
            Env::Production => (
                env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in production."),
                env::var("JWT_SECRET").expect("FATAL: JWT_SECRET must be set in production."),
            ),
            Env::Local => (
                env::var("DATABASE_URL").unwrap_or(defaults.db_url),
                env::var("JWT_SECRET").unwrap_or(defaults.jwt_secret),
            ),
        };

        let token_ttl_secs = env::var("TOKEN_TTL_SECS")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(defaults.token_ttl_secs);

        Self {
            db_url,
            env,
            jwt_secret,
            token_ttl_secs,
            upload_dir: env::var("UPLOAD_DIR").unwrap_or(defaults.upload_dir),
            bind_addr: env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            cors_origin: env::var("CORS_ORIGIN").unwrap_or(defaults.cors_origin),
            admin_email: env::var("ADMIN_EMAIL").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
        }
    }

    pub fn uses_memory_store(&self) -> bool {
        self.db_url == MEMORY_DATABASE
    }
}
