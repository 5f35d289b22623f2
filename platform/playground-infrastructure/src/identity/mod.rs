use chrono::{DateTime, Duration as ChronoDuration, Utc};
use playground_domain::errors::ClientError;
use playground_domain::repositories::identity::{Credentials, IdentityProvider, SignUpOutcome};
use playground_domain::value_objects::session::Session;
use reqwest::blocking::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Email/password client for a hosted GoTrue-compatible auth service.
///
/// Only the public sign-in and sign-up endpoints are used; session refresh
/// is left to the caller re-authenticating.
pub struct GoTrueIdentityProvider {
    pub url: String,
    anon_key: String,
    client: Client,
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    expires_at: Option<i64>,
    user: Option<AuthUser>,
    // sign-up without auto-confirm answers with the bare user object
    id: Option<String>,
}

impl GoTrueIdentityProvider {
    pub fn new(url: String, anon_key: String, timeout_ms: Option<u64>) -> Result<Self, String> {
        if url.trim().is_empty() {
            return Err("auth url is empty".to_string());
        }
        let client = Client::builder()
            .timeout(timeout_ms.map(std::time::Duration::from_millis))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|err| format!("failed to build http client: {err}"))?;
        Ok(Self {
            url,
            anon_key,
            client,
        })
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let endpoint = format!("{}/auth/v1/{}", self.url.trim_end_matches('/'), path);
        let mut builder = self.client.post(endpoint);
        if !self.anon_key.trim().is_empty() {
            builder = builder
                .header("apikey", self.anon_key.as_str())
                .bearer_auth(self.anon_key.as_str());
        }
        builder
    }

    fn send(&self, op: &'static str, builder: RequestBuilder) -> Result<TokenResponse, ClientError> {
        let span = tracing::info_span!("infra.identity.call", base_url = %self.url, op);
        let _enter = span.enter();
        metrics::counter!("quantplay.infra.identity.requests_total", "op" => op).increment(1);

        let resp = builder.send().map_err(|err| {
            tracing::warn!(error = %err, "identity provider unreachable");
            metrics::counter!("quantplay.infra.identity.errors_total", "op" => op, "kind" => "transport")
                .increment(1);
            ClientError::transport(None, format!("auth service unreachable: {err}"))
        })?;

        let status = resp.status();
        let text = resp.text().unwrap_or_default();
        if !status.is_success() {
            metrics::counter!("quantplay.infra.identity.errors_total", "op" => op, "kind" => "rejected")
                .increment(1);
            let message = provider_error_message(&text)
                .unwrap_or_else(|| format!("auth request failed: status {}", status.as_u16()));
            tracing::info!(status = status.as_u16(), "identity provider rejected request");
            return Err(ClientError::ValidationFailure(message));
        }

        serde_json::from_str::<TokenResponse>(&text)
            .map_err(|err| ClientError::Decode(format!("{op} response: {err}")))
    }
}

impl IdentityProvider for GoTrueIdentityProvider {
    fn sign_in_with_password(&self, credentials: &Credentials) -> Result<Session, ClientError> {
        let builder = self
            .post("token")
            .query(&[("grant_type", "password")])
            .json(&PasswordGrant {
                email: &credentials.email,
                password: &credentials.password,
            });
        let parsed = self.send("sign_in", builder)?;
        session_from(parsed, Utc::now()).ok_or_else(|| {
            ClientError::Decode("sign_in response carries no access_token".to_string())
        })
    }

    fn sign_up(&self, credentials: &Credentials) -> Result<SignUpOutcome, ClientError> {
        let builder = self.post("signup").json(&PasswordGrant {
            email: &credentials.email,
            password: &credentials.password,
        });
        let parsed = self.send("sign_up", builder)?;
        let user_id = parsed
            .user
            .as_ref()
            .and_then(|u| u.id.clone())
            .or_else(|| parsed.id.clone());
        let session = session_from(parsed, Utc::now());
        Ok(SignUpOutcome { session, user_id })
    }
}

fn session_from(parsed: TokenResponse, now: DateTime<Utc>) -> Option<Session> {
    let access_token = parsed.access_token.filter(|t| !t.trim().is_empty())?;
    let expires_at = match (parsed.expires_at, parsed.expires_in) {
        (Some(at), _) => DateTime::from_timestamp(at, 0),
        // out-of-range lifetimes are treated as non-expiring
        (None, Some(secs)) => {
            ChronoDuration::try_seconds(secs).and_then(|d| now.checked_add_signed(d))
        }
        (None, None) => None,
    };
    let (user_id, email) = match parsed.user {
        Some(user) => (user.id, user.email),
        None => (None, None),
    };
    Some(Session {
        access_token,
        refresh_token: parsed.refresh_token,
        expires_at,
        user_id,
        email,
    })
}

fn provider_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}
