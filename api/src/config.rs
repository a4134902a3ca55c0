use secrecy::SecretString;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

pub const MIN_TOKEN_LIFETIME_SECONDS: i64 = 300;
pub const MAX_TOKEN_LIFETIME_SECONDS: i64 = 86_400;

#[derive(Debug, Error)]
#[error("Invalid configuration value for {key}: {message}")]
pub struct ConfigError {
    pub key: String,
    pub message: String,
}

impl ConfigError {
    fn new(key: &str, message: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// HTTP server settings. Nested groups use `__` in variable names,
/// e.g. `DB__HOST`, `API__PORT`.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub database_url: SecretString,
    pub pool_size: u32,
    pub host: String,
    pub port: u16,
    pub title: String,
    pub version: String,
    pub cors_origins: Vec<String>,
    pub token_lifetime_seconds: i64,
    pub log_level: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            database_url: SecretString::from(String::new()),
            pool_size: 10,
            host: "0.0.0.0".to_string(),
            port: 8000,
            title: "Octopus".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            cors_origins: vec!["*".to_string()],
            token_lifetime_seconds: 3600,
            log_level: "info".to_string(),
        }
    }
}

impl ApiSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let database_url = match get("DATABASE_URL") {
            Some(url) => url,
            None => database_url_from_parts(&get)?,
        };

        let port: u16 = parse_or(&get, "API__PORT", defaults.port)?;
        if port == 0 {
            return Err(ConfigError::new("API__PORT", "must be between 1 and 65535"));
        }

        let token_lifetime_seconds: i64 = parse_or(
            &get,
            "ACCESS_TOKEN__LIFETIME_SECONDS",
            defaults.token_lifetime_seconds,
        )?;
        if !(MIN_TOKEN_LIFETIME_SECONDS..=MAX_TOKEN_LIFETIME_SECONDS).contains(&token_lifetime_seconds) {
            return Err(ConfigError::new(
                "ACCESS_TOKEN__LIFETIME_SECONDS",
                format!(
                    "must be between {} and {}",
                    MIN_TOKEN_LIFETIME_SECONDS, MAX_TOKEN_LIFETIME_SECONDS
                ),
            ));
        }

        let cors_origins = match get("API__CORS_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect(),
            None => defaults.cors_origins,
        };

        Ok(Self {
            database_url: SecretString::from(database_url),
            pool_size: parse_or(&get, "DB__POOL_SIZE", defaults.pool_size)?,
            host: get("API__HOST").unwrap_or(defaults.host),
            port,
            title: get("API__TITLE").unwrap_or(defaults.title),
            version: get("API__VERSION").unwrap_or(defaults.version),
            cors_origins,
            token_lifetime_seconds,
            log_level: get("LOGGER__LEVEL").unwrap_or(defaults.log_level),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn database_url_from_parts<G>(get: &G) -> Result<String, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let required = |key: &str| {
        get(key).ok_or_else(|| ConfigError::new(key, "must be set when DATABASE_URL is not"))
    };

    let host = required("DB__HOST")?;
    let port: u16 = parse_or(get, "DB__PORT", 5432)?;
    let user = required("DB__USER")?;
    let password = required("DB__PASSWORD")?;
    let name = required("DB__NAME")?;

    let mut url = Url::parse(&format!("postgres://{}:{}/{}", host, port, name))
        .map_err(|e| ConfigError::new("DB__HOST", e.to_string()))?;
    url.set_username(&user)
        .map_err(|_| ConfigError::new("DB__USER", "cannot be used in a connection URL"))?;
    url.set_password(Some(&password))
        .map_err(|_| ConfigError::new("DB__PASSWORD", "cannot be used in a connection URL"))?;

    Ok(url.to_string())
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::new(key, format!("{:?}: {}", raw, e))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn builds_database_url_from_parts() {
        let settings = ApiSettings::from_lookup(lookup(&[
            ("DB__HOST", "db"),
            ("DB__USER", "octopus"),
            ("DB__PASSWORD", "p@ss word"),
            ("DB__NAME", "news"),
        ]))
        .unwrap();

        assert_eq!(
            settings.database_url.expose_secret(),
            "postgres://octopus:p%40ss%20word@db:5432/news"
        );
        assert_eq!(settings.port, 8000);
        assert_eq!(settings.title, "Octopus");
        assert_eq!(settings.cors_origins, vec!["*"]);
        assert_eq!(settings.token_lifetime_seconds, 3600);
    }

    #[test]
    fn explicit_database_url_wins() {
        let settings = ApiSettings::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/news"),
            ("API__CORS_ORIGINS", "https://a.example, https://b.example"),
            ("API__PORT", "9000"),
        ]))
        .unwrap();

        assert_eq!(settings.database_url.expose_secret(), "postgres://localhost/news");
        assert_eq!(settings.cors_origins, vec!["https://a.example", "https://b.example"]);
        assert_eq!(settings.bind_address(), "0.0.0.0:9000");
    }

    #[test]
    fn token_lifetime_must_be_in_range() {
        for bad in ["299", "86401"] {
            let result = ApiSettings::from_lookup(lookup(&[
                ("DATABASE_URL", "postgres://localhost/news"),
                ("ACCESS_TOKEN__LIFETIME_SECONDS", bad),
            ]));
            assert!(result.is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn missing_database_settings_are_reported() {
        let err = ApiSettings::from_lookup(lookup(&[("DB__HOST", "db")])).unwrap_err();
        assert_eq!(err.key, "DB__USER");
    }
}
