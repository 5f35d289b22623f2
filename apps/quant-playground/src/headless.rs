use crate::bootstrap::Services;
use playground_application::playground::{
    call_kind_label, CallKind, Completion, PlaygroundController, PlaygroundForm,
};
use playground_application::render::ResultView;
use playground_domain::errors::ClientError;
use serde_json::json;
use std::fmt;

pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_UNAUTHENTICATED: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadlessMode {
    Backtest,
    Generate,
}

pub struct HeadlessArgs {
    pub mode: HeadlessMode,
    pub form: PlaygroundForm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlessFailure {
    pub message: String,
    pub exit_code: i32,
}

impl HeadlessFailure {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            exit_code: EXIT_FAILURE,
        }
    }
}

impl From<&ClientError> for HeadlessFailure {
    fn from(err: &ClientError) -> Self {
        Self {
            message: err.to_string(),
            exit_code: match err {
                ClientError::Unauthenticated => EXIT_UNAUTHENTICATED,
                _ => EXIT_FAILURE,
            },
        }
    }
}

impl fmt::Display for HeadlessFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

pub fn run_headless(
    args: HeadlessArgs,
    services: &Services,
) -> Result<serde_json::Value, HeadlessFailure> {
    let mut controller = PlaygroundController::new(args.form);
    let kind = match args.mode {
        HeadlessMode::Backtest => CallKind::Backtest,
        HeadlessMode::Generate => CallKind::Generate,
    };
    let _span = tracing::info_span!("headless", mode = call_kind_label(kind)).entered();
    match args.mode {
        HeadlessMode::Backtest => run_backtest(&mut controller, services),
        HeadlessMode::Generate => run_generate(&mut controller, services),
    }
}

fn run_backtest(
    controller: &mut PlaygroundController,
    services: &Services,
) -> Result<serde_json::Value, HeadlessFailure> {
    let dispatch = controller
        .begin_backtest()
        .map_err(|err| HeadlessFailure::new(err.to_string()))?;
    let result = services.api.run_backtest(&services.session, &dispatch.request);
    if let Err(err @ ClientError::Unauthenticated) = &result {
        return Err(err.into());
    }
    controller.complete_backtest(dispatch.id, result);

    let Some(response) = controller.output() else {
        return Err(HeadlessFailure::new("backtest produced no output"));
    };
    if let Some(error) = response.error() {
        return Err(HeadlessFailure::new(error));
    }
    let metrics = ResultView::project(Some(response)).lines();
    let response = serde_json::to_value(response)
        .map_err(|err| HeadlessFailure::new(format!("failed to encode response: {err}")))?;

    Ok(json!({
        "status": "ok",
        "mode": "backtest",
        "request": {
            "ticker": dispatch.request.ticker,
            "start_date": dispatch.request.start_date.to_string(),
            "end_date": dispatch.request.end_date.to_string(),
        },
        "response": response,
        "metrics": metrics,
    }))
}

fn run_generate(
    controller: &mut PlaygroundController,
    services: &Services,
) -> Result<serde_json::Value, HeadlessFailure> {
    controller
        .enter_ai()
        .map_err(|err| HeadlessFailure::new(err.to_string()))?;
    match controller.submit_generate(&services.api, &services.session) {
        Ok(Completion::Applied) => Ok(json!({
            "status": "ok",
            "mode": "generate",
            "code": controller.form.code,
        })),
        Ok(_) => Err(HeadlessFailure::new(
            controller.alert().unwrap_or("strategy generation failed"),
        )),
        Err(err) => Err(HeadlessFailure::new(err.to_string())),
    }
}
