//! Projection of the last backtest response into what the result panel shows.

use playground_domain::value_objects::backtest::{BacktestResponse, SeriesPoint, Summary};
use serde_json::Value;
use std::fmt;

pub const MISSING: &str = "n/a";

#[derive(Debug, Clone, PartialEq)]
pub enum ResultView {
    Empty,
    Error(String),
    Metrics(MetricsView),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsView {
    pub message: Option<String>,
    pub lines: Vec<MetricLine>,
    pub chart: Option<ChartView>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricLine {
    pub label: String,
    pub value: String,
}

impl fmt::Display for MetricLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.value)
    }
}

/// Cumulative return series laid out for a line chart: x is the point
/// index, labels carry the dates, y is a fraction shown as a percentage.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartView {
    pub points: Vec<(f64, f64)>,
    pub dates: Vec<String>,
    pub x_bounds: (f64, f64),
    pub y_bounds: (f64, f64),
}

impl ChartView {
    pub fn from_series(series: &[SeriesPoint]) -> Option<Self> {
        if series.is_empty() {
            return None;
        }
        let points: Vec<(f64, f64)> = series
            .iter()
            .enumerate()
            .map(|(idx, p)| (idx as f64, if p.value.is_finite() { p.value } else { 0.0 }))
            .collect();
        let dates = series.iter().map(|p| p.date.clone()).collect();
        let x_bounds = x_bounds(&points);
        let y_bounds = y_bounds(&points);
        Some(Self {
            points,
            dates,
            x_bounds,
            y_bounds,
        })
    }

    /// First, middle and last dates.
    pub fn x_labels(&self) -> Vec<String> {
        let Some(first) = self.dates.first() else {
            return Vec::new();
        };
        let last = self.dates.last().unwrap_or(first);
        if self.dates.len() <= 2 {
            return vec![first.clone(), last.clone()];
        }
        let mid = &self.dates[self.dates.len() / 2];
        vec![first.clone(), mid.clone(), last.clone()]
    }

    pub fn y_labels(&self) -> Vec<String> {
        let (min, max) = self.y_bounds;
        let mid = (min + max) / 2.0;
        vec![
            format_percent(min),
            format_percent(mid),
            format_percent(max),
        ]
    }
}

impl ResultView {
    pub fn project(response: Option<&BacktestResponse>) -> Self {
        match response {
            None => Self::Empty,
            Some(BacktestResponse::Failed { error }) => Self::Error(error.clone()),
            Some(BacktestResponse::Completed { summary, message }) => {
                Self::Metrics(MetricsView {
                    message: message.clone(),
                    lines: metric_lines(summary),
                    chart: summary.chart_series().and_then(ChartView::from_series),
                })
            }
        }
    }

    pub fn lines(&self) -> Vec<String> {
        match self {
            Self::Empty => Vec::new(),
            Self::Error(err) => vec![format!("Error: {err}")],
            Self::Metrics(view) => view.lines.iter().map(ToString::to_string).collect(),
        }
    }

    pub fn chart(&self) -> Option<&ChartView> {
        match self {
            Self::Metrics(view) => view.chart.as_ref(),
            _ => None,
        }
    }
}

fn metric_lines(summary: &Summary) -> Vec<MetricLine> {
    let mut lines = vec![
        line("Sharpe Ratio", summary.sharpe.map(format_ratio)),
        line(
            "Cumulative Return",
            summary.cumulative_return.map(format_percent),
        ),
        line("Max Drawdown", summary.max_drawdown.map(format_percent)),
        line("Win Rate", summary.win_rate.map(format_percent)),
        line("Trading Days", summary.trading_days.map(|d| d.to_string())),
    ];
    for (key, value) in &summary.extra {
        lines.push(MetricLine {
            label: key.clone(),
            value: format_extra(value),
        });
    }
    lines
}

fn line(label: &str, value: Option<String>) -> MetricLine {
    MetricLine {
        label: label.to_string(),
        value: value.unwrap_or_else(|| MISSING.to_string()),
    }
}

pub fn format_percent(fraction: f64) -> String {
    if !fraction.is_finite() {
        return MISSING.to_string();
    }
    format!("{:.2}%", fraction * 100.0)
}

pub fn format_ratio(value: f64) -> String {
    if !value.is_finite() {
        return MISSING.to_string();
    }
    format!("{value:.2}")
}

fn format_extra(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => MISSING.to_string(),
        other => other.to_string(),
    }
}

fn x_bounds(points: &[(f64, f64)]) -> (f64, f64) {
    let x_min = points.first().map(|p| p.0).unwrap_or(0.0);
    let mut x_max = points.last().map(|p| p.0).unwrap_or(x_min + 1.0);
    if x_max <= x_min {
        x_max = x_min + 1.0;
    }
    (x_min, x_max)
}

fn y_bounds(points: &[(f64, f64)]) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for (_, y) in points {
        min = min.min(*y);
        max = max.max(*y);
    }
    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    if max <= min {
        return (min - 0.01, max + 0.01);
    }
    let pad = (max - min) * 0.05;
    (min - pad, max + pad)
}
