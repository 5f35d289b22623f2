use playground_application::api::PlaygroundApi;
use playground_application::auth::AuthService;
use playground_application::config::{self, Config, Endpoints};
use playground_application::session::SessionContext;
use playground_domain::errors::ClientError;
use playground_domain::value_objects::session::{AuthEvent, Session};
use playground_infrastructure::api::HttpStrategyService;
use playground_infrastructure::identity::GoTrueIdentityProvider;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const ENV_CONFIG: &str = "QUANTPLAY_CONFIG";
pub const ENV_ACCESS_TOKEN: &str = "QUANTPLAY_ACCESS_TOKEN";
pub const ENV_EMAIL: &str = "QUANTPLAY_EMAIL";
pub const ENV_PASSWORD: &str = "QUANTPLAY_PASSWORD";

/// Everything the TUI and the headless runner share for one process.
#[derive(Clone)]
pub struct Services {
    pub endpoints: Endpoints,
    pub session: SessionContext,
    pub api: PlaygroundApi,
    /// `None` when no identity provider URL is configured.
    pub auth: Option<AuthService>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSource {
    AccessToken,
    Password,
    None,
}

pub fn resolve_config_path(cli: Option<PathBuf>) -> Option<PathBuf> {
    cli.or_else(|| {
        std::env::var(ENV_CONFIG)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
    })
}

pub fn load_startup_config(path: Option<&Path>) -> Result<Config, String> {
    match path {
        Some(path) => config::load_config(path),
        None => Ok(Config::default()),
    }
}

pub fn build_services(config: &Config) -> Result<Services, String> {
    build_services_with(config::resolve_from_process_env(config))
}

pub fn build_services_with(endpoints: Endpoints) -> Result<Services, String> {
    let session = SessionContext::new();
    let strategy = HttpStrategyService::new(endpoints.api_base.clone(), endpoints.api_timeout_ms)?;
    let api = PlaygroundApi::new(Arc::new(strategy));

    let auth = match endpoints.auth_url.as_deref() {
        Some(url) => {
            let provider = GoTrueIdentityProvider::new(
                url.to_string(),
                endpoints.auth_anon_key.clone(),
                endpoints.auth_timeout_ms,
            )?;
            Some(AuthService::new(Arc::new(provider), session.clone()))
        }
        None => {
            tracing::info!("no identity provider configured; sign-in disabled");
            None
        }
    };

    tracing::info!(
        api_base = %endpoints.api_base,
        auth_url = endpoints.auth_url.as_deref().unwrap_or("-"),
        "services ready"
    );

    Ok(Services {
        endpoints,
        session,
        api,
        auth,
    })
}

/// Seeds the session from the environment: a raw access token wins over
/// email/password sign-in.
pub fn restore_session<F>(services: &Services, env: F) -> Result<SessionSource, ClientError>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

    if let Some(token) = non_empty(ENV_ACCESS_TOKEN) {
        services
            .session
            .apply(AuthEvent::SignedIn(Session::new(token.trim())));
        return Ok(SessionSource::AccessToken);
    }

    let (Some(email), Some(password)) = (non_empty(ENV_EMAIL), env(ENV_PASSWORD)) else {
        return Ok(SessionSource::None);
    };
    let auth = services.auth.as_ref().ok_or_else(|| {
        ClientError::Config(format!(
            "{ENV_EMAIL} is set but no identity provider is configured (set {})",
            config::ENV_AUTH_URL
        ))
    })?;
    auth.sign_in(&email, &password)?;
    Ok(SessionSource::Password)
}

#[cfg(test)]
mod tests {
    use super::{
        build_services_with, restore_session, SessionSource, ENV_ACCESS_TOKEN, ENV_EMAIL,
        ENV_PASSWORD,
    };
    use playground_application::config::Endpoints;
    use playground_domain::errors::ClientError;

    fn endpoints(auth_url: Option<&str>) -> Endpoints {
        Endpoints {
            api_base: "http://127.0.0.1:9".to_string(),
            api_timeout_ms: Some(200),
            auth_url: auth_url.map(str::to_string),
            auth_anon_key: String::new(),
            auth_timeout_ms: Some(200),
        }
    }

    #[test]
    fn auth_is_optional() {
        let services = build_services_with(endpoints(None)).expect("services");
        assert!(services.auth.is_none());
        let with_auth =
            build_services_with(endpoints(Some("http://127.0.0.1:9"))).expect("services");
        assert!(with_auth.auth.is_some());
    }

    #[test]
    fn access_token_env_seeds_session() {
        let services = build_services_with(endpoints(None)).expect("services");
        let source = restore_session(&services, |key| {
            (key == ENV_ACCESS_TOKEN).then(|| " tok ".to_string())
        })
        .expect("restore");
        assert_eq!(source, SessionSource::AccessToken);
        assert_eq!(services.session.access_token().as_deref(), Some("tok"));
    }

    #[test]
    fn nothing_set_leaves_session_empty() {
        let services = build_services_with(endpoints(None)).expect("services");
        assert_eq!(
            restore_session(&services, |_| None).expect("restore"),
            SessionSource::None
        );
        assert!(services.session.access_token().is_none());
    }

    #[test]
    fn password_sign_in_without_provider_is_a_config_error() {
        let services = build_services_with(endpoints(None)).expect("services");
        let err = restore_session(&services, |key| match key {
            k if k == ENV_EMAIL => Some("a@b.c".to_string()),
            k if k == ENV_PASSWORD => Some("pw".to_string()),
            _ => None,
        })
        .expect_err("no provider");
        assert!(matches!(err, ClientError::Config(_)));
    }
}
