use playground_application::render::ResultView;
use playground_domain::value_objects::backtest::{BacktestResponse, SeriesPoint, Summary};
use proptest::prelude::*;

fn summary_strategy() -> impl Strategy<Value = Summary> {
    (
        prop::option::of(-5.0f64..5.0),
        prop::option::of(-1.0f64..5.0),
        prop::option::of(-1.0f64..=0.0),
        prop::option::of(0.0f64..=1.0),
        prop::option::of(0u64..10_000),
        prop::option::of(prop::collection::vec(-1.0f64..5.0, 0..40)),
    )
        .prop_map(|(sharpe, cum, dd, win, days, series)| Summary {
            sharpe,
            cumulative_return: cum,
            max_drawdown: dd,
            win_rate: win,
            trading_days: days,
            cumulative_series: series.map(|values| {
                values
                    .into_iter()
                    .enumerate()
                    .map(|(idx, value)| SeriesPoint {
                        date: format!("2022-01-{:02}", (idx % 28) + 1),
                        value,
                    })
                    .collect()
            }),
            ..Summary::default()
        })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn summary_always_shows_five_metrics_and_chart_iff_series(summary in summary_strategy()) {
        let has_series = summary
            .cumulative_series
            .as_ref()
            .is_some_and(|s| !s.is_empty());
        let response = BacktestResponse::completed(summary);
        let view = ResultView::project(Some(&response));
        let lines = view.lines();

        prop_assert_eq!(lines.len(), 5);
        for label in ["Sharpe Ratio", "Cumulative Return", "Max Drawdown", "Win Rate", "Trading Days"] {
            prop_assert!(lines.iter().any(|l| l.starts_with(label)));
        }
        prop_assert_eq!(view.chart().is_some(), has_series);
        if let Some(chart) = view.chart() {
            prop_assert!(chart.y_bounds.0 < chart.y_bounds.1);
        }
    }

    #[test]
    fn error_only_response_has_no_metrics_or_chart(message in "[a-zA-Z ]{1,40}") {
        let response = BacktestResponse::failed(message);
        let view = ResultView::project(Some(&response));
        prop_assert!(matches!(view, ResultView::Error(_)));
        prop_assert!(view.chart().is_none());
        prop_assert_eq!(view.lines().len(), 1);
    }
}
