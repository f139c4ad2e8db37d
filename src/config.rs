use std::str::FromStr;

use chrono::Duration;

use crate::password::DEFAULT_COST;

/// One year. Longer lifetimes are refused at startup.
pub const MAX_EXPIRATION_MINUTES: i64 = 60 * 24 * 366;

/// Same floor as the login and password update forms.
pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    Missing(&'static str),

    #[error("environment variable {name} has an invalid value `{value}`")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub env: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_open: usize,
    pub max_idle: usize,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub expiration_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct R2Config {
    pub bucket_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub account_id: String,
    pub public_url: String,
}

impl R2Config {
    pub fn endpoint(&self) -> String {
        format!("https://{}.r2.cloudflarestorage.com", self.account_id)
    }
}

/// Admin account created at startup when it does not exist yet.
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub r2: R2Config,
    pub password_cost: u32,
    pub admin_seed: Option<AdminSeed>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads every setting through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));
        let or_default = |name: &str, default: &str| get(name).unwrap_or_else(|| default.to_string());

        let admin_seed = match (get("ADMIN_EMAIL"), get("ADMIN_PASSWORD")) {
            (Some(_), Some(password)) if password.chars().count() < MIN_PASSWORD_LEN => {
                return Err(ConfigError::Invalid {
                    name: "ADMIN_PASSWORD",
                    value: format!("<{} characters>", password.chars().count()),
                });
            }
            (Some(email), Some(password)) => Some(AdminSeed {
                name: or_default("ADMIN_NAME", "Admin"),
                email,
                password,
            }),
            _ => None,
        };

        Ok(Self {
            app: AppConfig {
                port: parse_or(get("APP_PORT"), "APP_PORT", 8080)?,
                env: or_default("APP_ENV", "development"),
            },
            database: DatabaseConfig {
                url: required("DB_URL")?,
                max_open: parse_or(
                    get("DATABASE_MAX_OPEN_CONNECTION"),
                    "DATABASE_MAX_OPEN_CONNECTION",
                    10,
                )?,
                max_idle: parse_or(
                    get("DATABASE_MAX_IDLE_CONNECTION"),
                    "DATABASE_MAX_IDLE_CONNECTION",
                    2,
                )?,
            },
            jwt: JwtConfig {
                secret: required("JWT_SECRET_KEY")?,
                issuer: or_default("JWT_ISSUER", "blog-admin"),
                expiration_minutes: token_lifetime(get("JWT_EXPIRATION_MINUTES"))?,
            },
            r2: R2Config {
                bucket_name: required("CLOUDFLARE_R2_BUCKET_NAME")?,
                api_key: required("CLOUDFLARE_R2_API_KEY")?,
                api_secret: required("CLOUDFLARE_R2_API_SECRET")?,
                account_id: required("CLOUDFLARE_R2_ACCOUNT_ID")?,
                public_url: required("CLOUDFLARE_R2_PUBLIC_URL")?,
            },
            password_cost: parse_or(get("PASSWORD_HASH_COST"), "PASSWORD_HASH_COST", DEFAULT_COST)?,
            admin_seed,
        })
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

/// Minutes a token stays valid: positive and at most a year.
fn token_lifetime(raw: Option<String>) -> Result<i64, ConfigError> {
    let name = "JWT_EXPIRATION_MINUTES";
    let minutes: i64 = parse_or(raw.clone(), name, 120)?;
    let in_range = (1..=MAX_EXPIRATION_MINUTES).contains(&minutes)
        && Duration::try_minutes(minutes).is_some();
    if !in_range {
        return Err(ConfigError::Invalid {
            name,
            value: raw.unwrap_or_default(),
        });
    }
    Ok(minutes)
}
