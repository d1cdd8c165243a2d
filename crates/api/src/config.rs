//! Process configuration, read from the environment at startup.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};

pub const DEV_JWT_SECRET: &str = "dev-secret";
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "123456";

const DEFAULT_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_TOKEN_TTL_MINUTES: i64 = 720;
const DEFAULT_UPLOAD_DIR: &str = "./uploads";
const DEFAULT_CORS_ORIGINS: [&str; 4] = [
    "http://localhost:3000",
    "http://127.0.0.1:3000",
    "http://localhost:5173",
    "http://127.0.0.1:5173",
];

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub addr: SocketAddr,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    pub upload_dir: PathBuf,
    /// When set, committed events are journaled here and replayed on start.
    pub journal_path: Option<PathBuf>,
    pub cors_origins: Vec<String>,
    pub admin_username: String,
    pub admin_password: String,
    pub seed_demo: bool,
}

impl ApiConfig {
    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::info!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let addr = get("GASLINE_ADDR")
            .unwrap_or_else(|| DEFAULT_ADDR.to_string())
            .parse::<SocketAddr>()
            .context("GASLINE_ADDR must be a socket address like 0.0.0.0:8080")?;

        let jwt_secret = match get("JWT_SECRET") {
            Some(secret) => secret,
            None => {
                tracing::warn!("JWT_SECRET not set; using insecure dev default");
                DEV_JWT_SECRET.to_string()
            }
        };

        let ttl_minutes = match get("GASLINE_TOKEN_TTL_MINUTES") {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .context("GASLINE_TOKEN_TTL_MINUTES must be an integer")?,
            None => DEFAULT_TOKEN_TTL_MINUTES,
        };
        if ttl_minutes <= 0 {
            bail!("GASLINE_TOKEN_TTL_MINUTES must be positive, got {ttl_minutes}");
        }
        let token_ttl = chrono::Duration::try_minutes(ttl_minutes)
            .filter(|ttl| chrono::Utc::now().checked_add_signed(*ttl).is_some())
            .context("GASLINE_TOKEN_TTL_MINUTES is too large")?;

        let upload_dir = PathBuf::from(get("GASLINE_UPLOAD_DIR").unwrap_or_else(|| DEFAULT_UPLOAD_DIR.to_string()));
        let journal_path = get("GASLINE_JOURNAL_PATH").map(PathBuf::from);

        let cors_origins = match get("GASLINE_CORS_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect(),
            None => DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect(),
        };

        let admin_username = get("GASLINE_ADMIN_USERNAME").unwrap_or_else(|| DEFAULT_ADMIN_USERNAME.to_string());
        let admin_password = match get("GASLINE_ADMIN_PASSWORD") {
            Some(pw) => pw,
            None => {
                tracing::warn!("GASLINE_ADMIN_PASSWORD not set; bootstrap admin uses the default password");
                DEFAULT_ADMIN_PASSWORD.to_string()
            }
        };

        let seed_demo = match get("GASLINE_SEED_DEMO") {
            Some(raw) => parse_flag(&raw).context("GASLINE_SEED_DEMO must be true or false")?,
            None => false,
        };

        Ok(Self {
            addr,
            jwt_secret,
            token_ttl,
            upload_dir,
            journal_path,
            cors_origins,
            admin_username,
            admin_password,
            seed_demo,
        })
    }
}

fn parse_flag(raw: &str) -> anyhow::Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("not a boolean: {other}"),
    }
}
