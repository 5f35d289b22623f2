use chrono::NaiveDate;
use playground_domain::value_objects::backtest::{BacktestRequest, BacktestResponse};
use proptest::prelude::*;

fn date_from_offset(days: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(1990, 1, 1).unwrap() + chrono::Duration::days(days)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn request_echo_preserves_ticker_and_dates(
        ticker in "[A-Z]{1,5}(\\.[A-Z]{1,2})?",
        start in 0i64..15_000,
        span in 0i64..3_000,
        code in ".{0,64}",
    ) {
        let request = BacktestRequest {
            code,
            ticker,
            start_date: date_from_offset(start),
            end_date: date_from_offset(start + span),
        };
        let echoed = serde_json::to_string(&request).unwrap();
        let parsed: BacktestRequest = serde_json::from_str(&echoed).unwrap();
        prop_assert_eq!(&parsed.ticker, &request.ticker);
        prop_assert_eq!(parsed.start_date, request.start_date);
        prop_assert_eq!(parsed.end_date, request.end_date);
    }

    #[test]
    fn error_responses_never_decode_a_summary(message in "[a-zA-Z0-9 :]{0,80}") {
        let body = serde_json::json!({ "error": message }).to_string();
        let response: BacktestResponse = serde_json::from_str(&body).unwrap();
        prop_assert!(response.summary().is_none());
        prop_assert_eq!(response.error(), Some(message.as_str()));
    }
}
