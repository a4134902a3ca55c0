use crate::enricher::DEFAULT_BATCH_SIZE;
use crate::llm_adapter::{LlmConfig, DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL};
use crate::persister::DEFAULT_LOG_TRUNCATE;
use crate::types::{ExtractorError, FetchConfig, Result};
use secrecy::SecretString;
use std::str::FromStr;
use url::Url;

/// Everything one extractor run needs, read from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub feed_url: String,
    /// Optional so `--dry-run` works without a database.
    pub database_url: Option<String>,
    pub llm: LlmConfig,
    pub fetch: FetchConfig,
    pub batch_size: usize,
    pub concurrency: usize,
    pub log_truncate: usize,
    pub log_level: String,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| get(key).ok_or_else(|| ExtractorError::config(key, "must be set"));

        let feed_url = required("FEED_URL")?;
        let parsed = Url::parse(&feed_url).map_err(|e| ExtractorError::config("FEED_URL", e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ExtractorError::config("FEED_URL", "must be an http or https URL"));
        }

        let database_url = get("DATABASE_URL");
        let api_key = SecretString::from(required("OPENAI_API_KEY")?);

        let fetch_defaults = FetchConfig::default();
        let fetch = FetchConfig {
            user_agent: get("FETCH_USER_AGENT").unwrap_or(fetch_defaults.user_agent),
            timeout_seconds: parse_or(&get, "FETCH_TIMEOUT_SECS", fetch_defaults.timeout_seconds)?,
            ..fetch_defaults
        };

        let llm = LlmConfig {
            api_key,
            model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            base_url: get("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            temperature: parse_or(&get, "OPENAI_TEMPERATURE", 0.5)?,
            timeout_seconds: 60,
        };

        let batch_size: usize = parse_or(&get, "TAG_BATCH_SIZE", DEFAULT_BATCH_SIZE)?;
        if batch_size == 0 {
            return Err(ExtractorError::config("TAG_BATCH_SIZE", "must be at least 1"));
        }

        let concurrency: usize = parse_or(&get, "TAG_CONCURRENCY", 1)?;
        if concurrency == 0 {
            return Err(ExtractorError::config("TAG_CONCURRENCY", "must be at least 1"));
        }

        Ok(Self {
            feed_url,
            database_url,
            llm,
            fetch,
            batch_size,
            concurrency,
            log_truncate: parse_or(&get, "LOG_TRUNCATE", DEFAULT_LOG_TRUNCATE)?,
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// The DSN, for runs that read and write Postgres.
    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .ok_or_else(|| ExtractorError::config("DATABASE_URL", "must be set"))
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ExtractorError::config(key, format!("{:?}: {}", raw, e))),
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

    const REQUIRED: [(&str, &str); 3] = [
        ("FEED_URL", "https://news.example.com/rss"),
        ("DATABASE_URL", "postgres://localhost/news"),
        ("OPENAI_API_KEY", "sk-test"),
    ];

    #[test]
    fn defaults_apply_when_only_required_keys_are_set() {
        let settings = Settings::from_lookup(lookup(&REQUIRED)).unwrap();

        assert_eq!(settings.batch_size, 10);
        assert_eq!(settings.concurrency, 1);
        assert_eq!(settings.log_truncate, 80);
        assert_eq!(settings.llm.model, "gpt-4");
        assert_eq!(settings.llm.base_url, "https://api.openai.com/v1");
        assert_eq!(settings.llm.temperature, 0.5);
        assert_eq!(settings.llm.api_key.expose_secret(), "sk-test");
        assert_eq!(settings.fetch.timeout_seconds, 30);
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn overrides_are_parsed() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("TAG_BATCH_SIZE", "3"),
            ("TAG_CONCURRENCY", "4"),
            ("OPENAI_MODEL", "gpt-4o-mini"),
            ("FETCH_TIMEOUT_SECS", "5"),
        ]);
        let settings = Settings::from_lookup(lookup(&pairs)).unwrap();

        assert_eq!(settings.batch_size, 3);
        assert_eq!(settings.concurrency, 4);
        assert_eq!(settings.llm.model, "gpt-4o-mini");
        assert_eq!(settings.fetch.timeout_seconds, 5);
    }

    #[test]
    fn missing_required_key_names_the_key() {
        let err = Settings::from_lookup(lookup(&[REQUIRED[0], REQUIRED[1]])).unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn database_url_is_only_needed_when_asked_for() {
        let settings = Settings::from_lookup(lookup(&[REQUIRED[0], REQUIRED[2]])).unwrap();

        assert!(settings.database_url.is_none());
        let err = settings.require_database_url().unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));

        let settings = Settings::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(
            settings.require_database_url().unwrap(),
            "postgres://localhost/news"
        );
    }

    #[test]
    fn rejects_bad_values() {
        let mut zero_batch = REQUIRED.to_vec();
        zero_batch.push(("TAG_BATCH_SIZE", "0"));
        assert!(Settings::from_lookup(lookup(&zero_batch)).is_err());

        let mut not_a_number = REQUIRED.to_vec();
        not_a_number.push(("TAG_CONCURRENCY", "many"));
        assert!(Settings::from_lookup(lookup(&not_a_number)).is_err());

        let mut ftp = REQUIRED.to_vec();
        ftp[0] = ("FEED_URL", "ftp://news.example.com/rss");
        assert!(Settings::from_lookup(lookup(&ftp)).is_err());
    }

    #[test]
    fn debug_output_hides_the_api_key() {
        let settings = Settings::from_lookup(lookup(&REQUIRED)).unwrap();
        assert!(!format!("{:?}", settings).contains("sk-test"));
    }
}
