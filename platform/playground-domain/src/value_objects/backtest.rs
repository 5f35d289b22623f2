use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacktestRequest {
    pub code: String,
    pub ticker: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: String,
    pub value: f64,
}

/// Performance summary computed by the backtest service.
///
/// Every field is optional so that partial payloads still decode; keys the
/// client does not know about are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Summary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sharpe: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cumulative_return: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_drawdown: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub win_rate: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub trading_days: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cumulative_series: Option<Vec<SeriesPoint>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Summary {
    /// The chart series, if the service sent a non-empty one.
    pub fn chart_series(&self) -> Option<&[SeriesPoint]> {
        self.cumulative_series
            .as_deref()
            .filter(|points| !points.is_empty())
    }
}

// pandas-backed services emit counts as floats (252.0).
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => {
            if let Some(v) = n.as_u64() {
                return Ok(Some(v));
            }
            match n.as_f64() {
                Some(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 => Ok(Some(f as u64)),
                _ => Err(serde::de::Error::custom(format!(
                    "invalid trading_days: {n}"
                ))),
            }
        }
        Some(other) => Err(serde::de::Error::custom(format!(
            "invalid trading_days: {other}"
        ))),
    }
}

/// Result of `POST /backtest`: a summary or an error, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireBacktestResponse", into = "WireBacktestResponse")]
pub enum BacktestResponse {
    Completed {
        summary: Summary,
        message: Option<String>,
    },
    Failed {
        error: String,
    },
}

impl BacktestResponse {
    pub fn completed(summary: Summary) -> Self {
        Self::Completed {
            summary,
            message: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }

    pub fn summary(&self) -> Option<&Summary> {
        match self {
            Self::Completed { summary, .. } => Some(summary),
            Self::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Completed { .. } => None,
            Self::Failed { error } => Some(error),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct WireBacktestResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    summary: Option<Summary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl TryFrom<WireBacktestResponse> for BacktestResponse {
    type Error = String;

    fn try_from(wire: WireBacktestResponse) -> Result<Self, Self::Error> {
        match (wire.summary, wire.error) {
            (Some(summary), None) => Ok(Self::Completed {
                summary,
                message: wire.message,
            }),
            (None, Some(error)) => Ok(Self::Failed { error }),
            (Some(_), Some(_)) => {
                Err("backtest response carries both summary and error".to_string())
            }
            (None, None) => Err("backtest response carries neither summary nor error".to_string()),
        }
    }
}

impl From<BacktestResponse> for WireBacktestResponse {
    fn from(response: BacktestResponse) -> Self {
        match response {
            BacktestResponse::Completed { summary, message } => Self {
                message,
                summary: Some(summary),
                error: None,
            },
            BacktestResponse::Failed { error } => Self {
                message: None,
                summary: None,
                error: Some(error),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BacktestRequest, BacktestResponse};
    use chrono::NaiveDate;

    #[test]
    fn request_serializes_dates_as_iso_calendar_dates() {
        let request = BacktestRequest {
            code: "result = {}".to_string(),
            ticker: "AAPL".to_string(),
            start_date: NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2022, 12, 31).unwrap(),
        };
        let json = serde_json::to_value(&request).expect("serialize");
        assert_eq!(json["start_date"], "2022-01-01");
        assert_eq!(json["end_date"], "2022-12-31");
        assert_eq!(json["ticker"], "AAPL");
    }

    #[test]
    fn response_with_summary_decodes() {
        let body = r#"{
            "message": "Backtest executed",
            "summary": {
                "sharpe": 1.2,
                "cumulative_return": 0.153,
                "max_drawdown": -0.08,
                "win_rate": 0.55,
                "trading_days": 252,
                "cumulative_series": [
                    {"date": "2022-01-03", "value": 0.0},
                    {"date": "2022-12-30", "value": 0.153}
                ]
            }
        }"#;
        let response: BacktestResponse = serde_json::from_str(body).expect("decode");
        let summary = response.summary().expect("summary");
        assert_eq!(summary.sharpe, Some(1.2));
        assert_eq!(summary.trading_days, Some(252));
        assert_eq!(summary.chart_series().map(|s| s.len()), Some(2));
        assert!(summary.extra.is_empty());
        assert!(response.error().is_none());
    }

    #[test]
    fn partial_summary_decodes_and_keeps_unknown_keys() {
        let body = r#"{"summary": {"example": "strategy output here", "trading_days": 10.0}}"#;
        let response: BacktestResponse = serde_json::from_str(body).expect("decode");
        let summary = response.summary().expect("summary");
        assert_eq!(summary.sharpe, None);
        assert_eq!(summary.trading_days, Some(10));
        assert!(summary.chart_series().is_none());
        assert_eq!(summary.extra["example"], "strategy output here");
    }

    #[test]
    fn empty_series_is_not_a_chart() {
        let body = r#"{"summary": {"cumulative_series": []}}"#;
        let response: BacktestResponse = serde_json::from_str(body).expect("decode");
        assert!(response.summary().unwrap().chart_series().is_none());
    }

    #[test]
    fn response_with_error_decodes() {
        let response: BacktestResponse =
            serde_json::from_str(r#"{"error": "No data found in the given range"}"#)
                .expect("decode");
        assert_eq!(response.error(), Some("No data found in the given range"));
        assert!(response.summary().is_none());
    }

    #[test]
    fn response_with_both_fields_is_rejected() {
        let err = serde_json::from_str::<BacktestResponse>(r#"{"summary": {}, "error": "x"}"#)
            .expect_err("both fields");
        assert!(err.to_string().contains("both summary and error"));
    }

    #[test]
    fn response_with_neither_field_is_rejected() {
        let err = serde_json::from_str::<BacktestResponse>(r#"{"message": "ok"}"#)
            .expect_err("neither field");
        assert!(err.to_string().contains("neither"));
    }

    #[test]
    fn failed_response_serializes_only_error() {
        let json = serde_json::to_value(BacktestResponse::failed("Request failed")).unwrap();
        assert_eq!(json, serde_json::json!({"error": "Request failed"}));
    }
}
