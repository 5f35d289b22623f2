use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_API_BASE: &str = "http://localhost:8000";
pub const ENV_API_BASE: &str = "QUANTPLAY_API_BASE";
pub const ENV_AUTH_URL: &str = "QUANTPLAY_AUTH_URL";
pub const ENV_AUTH_ANON_KEY: &str = "QUANTPLAY_AUTH_ANON_KEY";

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub playground: PlaygroundConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    pub base_url: Option<String>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    pub url: Option<String>,
    pub anon_key: Option<String>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct PlaygroundConfig {
    pub ticker: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub code: Option<String>,
}

/// Endpoints resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub api_base: String,
    pub api_timeout_ms: Option<u64>,
    pub auth_url: Option<String>,
    pub auth_anon_key: String,
    pub auth_timeout_ms: Option<u64>,
}

pub fn load_config(path: &Path) -> Result<Config, String> {
    let contents = fs::read_to_string(path)
        .map_err(|err| format!("failed to read config {}: {}", path.display(), err))?;
    toml::from_str(&contents)
        .map_err(|err| format!("failed to parse TOML {}: {}", path.display(), err))
}

/// Environment overrides win over the file; the API base falls back to the
/// local default.
pub fn resolve_endpoints<F>(config: &Config, env: F) -> Endpoints
where
    F: Fn(&str) -> Option<String>,
{
    let non_blank = |v: String| {
        let t = v.trim().to_string();
        (!t.is_empty()).then_some(t)
    };

    let api_base = env(ENV_API_BASE)
        .and_then(non_blank)
        .or_else(|| config.api.base_url.clone().and_then(non_blank))
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
    let auth_url = env(ENV_AUTH_URL)
        .and_then(non_blank)
        .or_else(|| config.auth.url.clone().and_then(non_blank));
    let auth_anon_key = env(ENV_AUTH_ANON_KEY)
        .and_then(non_blank)
        .or_else(|| config.auth.anon_key.clone().and_then(non_blank))
        .unwrap_or_default();

    Endpoints {
        api_base,
        api_timeout_ms: config.api.timeout_ms,
        auth_url,
        auth_anon_key,
        auth_timeout_ms: config.auth.timeout_ms,
    }
}

pub fn resolve_from_process_env(config: &Config) -> Endpoints {
    resolve_endpoints(config, |key| std::env::var(key).ok())
}

#[cfg(test)]
mod tests {
    use super::{resolve_endpoints, Config, DEFAULT_API_BASE, ENV_API_BASE};

    fn parse_config(toml_str: &str) -> Config {
        toml::from_str(toml_str).expect("config should parse")
    }

    #[test]
    fn empty_config_falls_back_to_local_default() {
        let endpoints = resolve_endpoints(&Config::default(), |_| None);
        assert_eq!(endpoints.api_base, DEFAULT_API_BASE);
        assert_eq!(endpoints.api_timeout_ms, None);
        assert!(endpoints.auth_url.is_none());
    }

    #[test]
    fn env_override_wins_over_file() {
        let config = parse_config(
            r#"
[api]
base_url = "http://backtest.internal:9000"
"#,
        );
        let endpoints = resolve_endpoints(&config, |key| {
            (key == ENV_API_BASE).then(|| "https://api.example.com".to_string())
        });
        assert_eq!(endpoints.api_base, "https://api.example.com");

        let endpoints = resolve_endpoints(&config, |_| Some("   ".to_string()));
        assert_eq!(endpoints.api_base, "http://backtest.internal:9000");
    }

    #[test]
    fn parse_full_config() {
        let config = parse_config(
            r#"
[api]
base_url = "http://localhost:8000"
timeout_ms = 30000

[auth]
url = "https://project.example.co"
anon_key = "anon"

[playground]
ticker = "MSFT"
start_date = "2021-01-01"
end_date = "2021-06-30"
"#,
        );
        assert_eq!(config.api.timeout_ms, Some(30_000));
        assert_eq!(config.playground.ticker.as_deref(), Some("MSFT"));
        let endpoints = resolve_endpoints(&config, |_| None);
        assert_eq!(endpoints.auth_url.as_deref(), Some("https://project.example.co"));
        assert_eq!(endpoints.auth_anon_key, "anon");
    }

    #[test]
    fn parse_config_rejects_unknown_fields() {
        let err = toml::from_str::<Config>(
            r#"
[api]
base_url = "http://localhost:8000"
retries = 3
"#,
        )
        .expect_err("unknown field should fail");
        assert!(err.to_string().to_lowercase().contains("unknown field"));
    }

    #[test]
    fn parse_config_rejects_malformed_toml() {
        let err = toml::from_str::<Config>("[api\nbase_url = 1").expect_err("malformed");
        assert!(!err.to_string().is_empty());
    }
}
