pub use playground_domain::value_objects::backtest::{BacktestRequest, BacktestResponse};
pub use playground_domain::value_objects::generate::{GenerateRequest, GenerateResponse};
use playground_domain::errors::ClientError;
use playground_domain::repositories::strategy_service::StrategyService;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};

pub const GENERIC_FAILURE: &str = "Request failed";

/// `StrategyService` over the backtest HTTP API.
///
/// Each call is sent exactly once: no retries, no backoff.
pub struct HttpStrategyService {
    pub base_url: String,
    pub timeout_ms: Option<u64>,
    client: Client,
}

impl HttpStrategyService {
    pub fn new(base_url: String, timeout_ms: Option<u64>) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(timeout_ms.map(Duration::from_millis))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|err| format!("failed to build http client: {err}"))?;
        Ok(Self {
            base_url,
            timeout_ms,
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn post_json<Req, Resp>(
        &self,
        name: &'static str,
        path: &str,
        token: Option<&str>,
        body: &Req,
    ) -> Result<Resp, ClientError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let endpoint = self.endpoint(path);
        let span = tracing::info_span!(
            "infra.api.call",
            endpoint = %endpoint,
            name,
            authenticated = token.is_some()
        );
        let _enter = span.enter();

        metrics::counter!("quantplay.infra.api.requests_total", "endpoint" => name).increment(1);
        let start = Instant::now();

        let mut builder = self.client.post(&endpoint);
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        let result = match builder.json(body).send() {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    resp.json::<Resp>().map_err(|err| {
                        ClientError::Decode(format!("{name} response from {endpoint}: {err}"))
                    })
                } else {
                    let text = resp.text().unwrap_or_default();
                    Err(ClientError::transport(
                        Some(status.as_u16()),
                        failure_message(&text),
                    ))
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "request did not reach the service");
                Err(ClientError::transport(None, GENERIC_FAILURE))
            }
        };

        let elapsed_ms = start.elapsed().as_millis() as f64;
        match &result {
            Ok(_) => {
                metrics::histogram!(
                    "quantplay.infra.api.call_ms",
                    "endpoint" => name,
                    "result" => "ok"
                )
                .record(elapsed_ms);
                tracing::debug!(elapsed_ms, "request succeeded");
            }
            Err(err) => {
                let status = match err {
                    ClientError::TransportFailure {
                        status: Some(code), ..
                    } => code.to_string(),
                    _ => "none".to_string(),
                };
                metrics::counter!(
                    "quantplay.infra.api.errors_total",
                    "endpoint" => name,
                    "kind" => err.kind(),
                    "status" => status.clone()
                )
                .increment(1);
                metrics::histogram!(
                    "quantplay.infra.api.call_ms",
                    "endpoint" => name,
                    "result" => "err"
                )
                .record(elapsed_ms);
                tracing::warn!(status = %status, error = %err, "request failed");
            }
        }
        result
    }
}

impl StrategyService for HttpStrategyService {
    fn run_backtest(
        &self,
        token: &str,
        request: &BacktestRequest,
    ) -> Result<BacktestResponse, ClientError> {
        self.post_json("backtest", "backtest", Some(token), request)
    }

    fn generate_strategy(
        &self,
        token: Option<&str>,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, ClientError> {
        self.post_json("generate", "generate", token, request)
    }
}

/// Human-readable message from a non-2xx body.
///
/// Understands `{"detail": "..."}` and the validation-list form
/// `{"detail": [{"msg": "..."}, ...]}`.
pub fn failure_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| detail_message(&value))
        .unwrap_or_else(|| GENERIC_FAILURE.to_string())
}

fn detail_message(value: &Value) -> Option<String> {
    match value.get("detail")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Array(items) => {
            let msgs: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                .collect();
            if msgs.is_empty() {
                None
            } else {
                Some(msgs.join("; "))
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{failure_message, BacktestRequest, GenerateRequest, HttpStrategyService};
    use crate::test_server::{http_response, try_spawn_server};
    use chrono::NaiveDate;
    use playground_domain::errors::ClientError;
    use playground_domain::repositories::strategy_service::StrategyService;

    fn sample_request() -> BacktestRequest {
        BacktestRequest {
            code: "result = {'example': 'strategy output here'}".to_string(),
            ticker: "AAPL".to_string(),
            start_date: NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2022, 12, 31).unwrap(),
        }
    }

    #[test]
    fn backtest_posts_json_with_bearer_token() {
        let ok_body = r#"{"message":"Backtest executed","summary":{"sharpe":1.2,"trading_days":252}}"#;
        let Some((base_url, requests)) =
            try_spawn_server(vec![http_response(200, "OK", "application/json", ok_body)])
        else {
            eprintln!("skipping: cannot bind local test server");
            return;
        };

        let service = HttpStrategyService::new(base_url, Some(2_000)).expect("service");
        let response = service
            .run_backtest("tok-123", &sample_request())
            .expect("backtest");
        assert_eq!(response.summary().unwrap().trading_days, Some(252));

        let raw = requests.recv().expect("request captured");
        assert!(raw.starts_with("POST /backtest "));
        assert!(raw
            .to_lowercase()
            .contains("authorization: bearer tok-123"));
        assert!(raw.contains(r#""start_date":"2022-01-01""#));
        assert!(raw.contains(r#""ticker":"AAPL""#));
    }

    #[test]
    fn backtest_surfaces_detail_from_error_body_without_retrying() {
        let Some((base_url, requests)) = try_spawn_server(vec![http_response(
            400,
            "Bad Request",
            "application/json",
            r#"{"detail":"Error in strategy code: name 'x' is not defined"}"#,
        )]) else {
            eprintln!("skipping: cannot bind local test server");
            return;
        };

        let service = HttpStrategyService::new(base_url, Some(2_000)).expect("service");
        let err = service
            .run_backtest("tok", &sample_request())
            .expect_err("bad request");
        assert_eq!(
            err,
            ClientError::TransportFailure {
                status: Some(400),
                message: "Error in strategy code: name 'x' is not defined".to_string(),
            }
        );
        assert!(requests.recv().is_ok());
        assert!(requests.try_recv().is_err());
    }

    #[test]
    fn server_error_without_detail_uses_generic_message() {
        let Some((base_url, _requests)) = try_spawn_server(vec![http_response(
            500,
            "Internal Server Error",
            "text/plain",
            "oops",
        )]) else {
            eprintln!("skipping: cannot bind local test server");
            return;
        };

        let service = HttpStrategyService::new(base_url, Some(2_000)).expect("service");
        let err = service
            .run_backtest("tok", &sample_request())
            .expect_err("server error");
        assert_eq!(err.to_string(), "Request failed");
    }

    #[test]
    fn malformed_success_body_is_a_decode_failure() {
        let Some((base_url, _requests)) = try_spawn_server(vec![http_response(
            200,
            "OK",
            "application/json",
            r#"{"summary":{},"error":"both"}"#,
        )]) else {
            eprintln!("skipping: cannot bind local test server");
            return;
        };

        let service = HttpStrategyService::new(base_url, Some(2_000)).expect("service");
        let err = service
            .run_backtest("tok", &sample_request())
            .expect_err("invalid body");
        assert_eq!(err.kind(), "decode");
    }

    #[test]
    fn generate_without_token_sends_no_authorization_header() {
        let Some((base_url, requests)) = try_spawn_server(vec![http_response(
            200,
            "OK",
            "application/json",
            r#"{"code":"result = {}"}"#,
        )]) else {
            eprintln!("skipping: cannot bind local test server");
            return;
        };

        let service = HttpStrategyService::new(base_url, None).expect("service");
        let response = service
            .generate_strategy(
                None,
                &GenerateRequest {
                    description: "Buy when the 10-day SMA crosses above the 30-day SMA"
                        .to_string(),
                },
            )
            .expect("generate");
        assert_eq!(response.code, "result = {}");

        let raw = requests.recv().expect("request captured");
        assert!(raw.starts_with("POST /generate "));
        assert!(!raw.to_lowercase().contains("authorization:"));
        assert!(raw.contains("10-day SMA"));
    }

    #[test]
    fn unreachable_service_is_a_transport_failure() {
        let service =
            HttpStrategyService::new("http://127.0.0.1:9".to_string(), Some(500)).expect("service");
        let err = service
            .run_backtest("tok", &sample_request())
            .expect_err("unreachable");
        assert!(matches!(err, ClientError::TransportFailure { status: None, .. }));
    }

    #[test]
    fn failure_message_joins_validation_entries() {
        let body = r#"{"detail":[{"loc":["body","ticker"],"msg":"field required"},{"msg":"bad date"}]}"#;
        assert_eq!(failure_message(body), "field required; bad date");
        assert_eq!(failure_message(r#"{"detail":""}"#), "Request failed");
        assert_eq!(failure_message("<html>"), "Request failed");
    }
}
