use crate::api::PlaygroundApi;
use crate::config::PlaygroundConfig;
use crate::session::SessionContext;
use chrono::NaiveDate;
use playground_domain::errors::ClientError;
use playground_domain::value_objects::backtest::{BacktestRequest, BacktestResponse};
use playground_domain::value_objects::generate::{GenerateRequest, GenerateResponse};

pub const DEFAULT_TICKER: &str = "AAPL";
pub const DEFAULT_START_DATE: &str = "2022-01-01";
pub const DEFAULT_END_DATE: &str = "2022-12-31";
pub const DEFAULT_STRATEGY: &str = "result = {'example': 'strategy output here'}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl RequestId {
    pub fn get(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Manual,
    Ai,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Backtest,
    Generate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InFlight {
    pub id: RequestId,
    pub kind: CallKind,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("a {0:?} call is already in flight")]
    Busy(CallKind),
    #[error("not allowed in {actual:?} mode (needs {expected:?})")]
    WrongMode { expected: Mode, actual: Mode },
    #[error("describe the strategy before generating")]
    EmptyPrompt,
    #[error("{0}")]
    InvalidForm(String),
}

/// What happened to a completion handed back to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    Failed,
    Stale,
}

/// A request the caller must send, tagged with the id to complete it with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch<R> {
    pub id: RequestId,
    pub request: R,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaygroundForm {
    pub ticker: String,
    pub start_date: String,
    pub end_date: String,
    pub code: String,
    pub prompt: String,
}

impl Default for PlaygroundForm {
    fn default() -> Self {
        Self {
            ticker: DEFAULT_TICKER.to_string(),
            start_date: DEFAULT_START_DATE.to_string(),
            end_date: DEFAULT_END_DATE.to_string(),
            code: DEFAULT_STRATEGY.to_string(),
            prompt: String::new(),
        }
    }
}

impl PlaygroundForm {
    pub fn from_config(cfg: &PlaygroundConfig) -> Self {
        let defaults = Self::default();
        Self {
            ticker: cfg.ticker.clone().unwrap_or(defaults.ticker),
            start_date: cfg.start_date.clone().unwrap_or(defaults.start_date),
            end_date: cfg.end_date.clone().unwrap_or(defaults.end_date),
            code: cfg.code.clone().unwrap_or(defaults.code),
            prompt: defaults.prompt,
        }
    }

    /// Start <= end is left to the server.
    pub fn to_backtest_request(&self) -> Result<BacktestRequest, String> {
        Ok(BacktestRequest {
            code: self.code.clone(),
            ticker: self.ticker.trim().to_string(),
            start_date: parse_date("start", &self.start_date)?,
            end_date: parse_date("end", &self.end_date)?,
        })
    }
}

fn parse_date(which: &str, raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| format!("invalid {which} date {:?}: expected YYYY-MM-DD", raw.trim()))
}

/// Playground state: form, mode, the in-flight call and the last output.
///
/// Every dispatched call gets a fresh [`RequestId`]; only the completion
/// matching the latest id is applied.
pub struct PlaygroundController {
    pub form: PlaygroundForm,
    mode: Mode,
    in_flight: Option<InFlight>,
    next_id: u64,
    output: Option<BacktestResponse>,
    alert: Option<String>,
}

impl PlaygroundController {
    pub fn new(form: PlaygroundForm) -> Self {
        Self {
            form,
            mode: Mode::Manual,
            in_flight: None,
            next_id: 1,
            output: None,
            alert: None,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn in_flight(&self) -> Option<InFlight> {
        self.in_flight
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn output(&self) -> Option<&BacktestResponse> {
        self.output.as_ref()
    }

    /// Blocking alert raised by a failed generation.
    pub fn alert(&self) -> Option<&str> {
        self.alert.as_deref()
    }

    pub fn dismiss_alert(&mut self) {
        self.alert = None;
    }

    pub fn enter_ai(&mut self) -> Result<(), TransitionError> {
        self.ensure_idle()?;
        self.ensure_mode(Mode::Manual)?;
        self.mode = Mode::Ai;
        tracing::debug!("playground: manual -> ai");
        Ok(())
    }

    pub fn exit_ai(&mut self) -> Result<(), TransitionError> {
        self.ensure_idle()?;
        self.ensure_mode(Mode::Ai)?;
        self.mode = Mode::Manual;
        tracing::debug!("playground: ai -> manual");
        Ok(())
    }

    pub fn begin_backtest(&mut self) -> Result<Dispatch<BacktestRequest>, TransitionError> {
        self.ensure_idle()?;
        let request = match self.form.to_backtest_request() {
            Ok(request) => request,
            Err(message) => {
                self.output = Some(BacktestResponse::failed(message.clone()));
                return Err(TransitionError::InvalidForm(message));
            }
        };
        let id = self.issue(CallKind::Backtest);
        Ok(Dispatch { id, request })
    }

    pub fn complete_backtest(
        &mut self,
        id: RequestId,
        result: Result<BacktestResponse, ClientError>,
    ) -> Completion {
        if !self.settle(id, CallKind::Backtest) {
            return Completion::Stale;
        }
        match result {
            Ok(response) => {
                let completion = if response.error().is_some() {
                    Completion::Failed
                } else {
                    Completion::Applied
                };
                self.output = Some(response);
                completion
            }
            Err(err) => {
                self.output = Some(BacktestResponse::failed(err.to_string()));
                Completion::Failed
            }
        }
    }

    pub fn begin_generate(&mut self) -> Result<Dispatch<GenerateRequest>, TransitionError> {
        self.ensure_idle()?;
        self.ensure_mode(Mode::Ai)?;
        let description = self.form.prompt.trim().to_string();
        if description.is_empty() {
            return Err(TransitionError::EmptyPrompt);
        }
        let id = self.issue(CallKind::Generate);
        Ok(Dispatch {
            id,
            request: GenerateRequest { description },
        })
    }

    pub fn complete_generate(
        &mut self,
        id: RequestId,
        result: Result<GenerateResponse, ClientError>,
    ) -> Completion {
        if !self.settle(id, CallKind::Generate) {
            return Completion::Stale;
        }
        match result {
            Ok(response) => {
                self.form.code = response.code;
                self.mode = Mode::Manual;
                Completion::Applied
            }
            Err(err) => {
                self.alert = Some(format!("Strategy generation failed: {err}"));
                Completion::Failed
            }
        }
    }

    /// Runs one backtest to completion on the calling thread.
    pub fn submit_backtest(
        &mut self,
        api: &PlaygroundApi,
        session: &SessionContext,
    ) -> Result<Completion, TransitionError> {
        let dispatch = self.begin_backtest()?;
        let result = api.run_backtest(session, &dispatch.request);
        Ok(self.complete_backtest(dispatch.id, result))
    }

    /// Runs one generation to completion on the calling thread.
    pub fn submit_generate(
        &mut self,
        api: &PlaygroundApi,
        session: &SessionContext,
    ) -> Result<Completion, TransitionError> {
        let dispatch = self.begin_generate()?;
        let result = api.generate_strategy(session, &dispatch.request);
        Ok(self.complete_generate(dispatch.id, result))
    }

    fn issue(&mut self, kind: CallKind) -> RequestId {
        let id = RequestId(self.next_id);
        self.next_id += 1;
        self.in_flight = Some(InFlight { id, kind });
        metrics::counter!(
            "quantplay.app.playground.dispatched_total",
            "kind" => call_kind_label(kind)
        )
        .increment(1);
        tracing::debug!(request_id = id.0, kind = call_kind_label(kind), "call dispatched");
        id
    }

    fn settle(&mut self, id: RequestId, kind: CallKind) -> bool {
        match self.in_flight {
            Some(current) if current.id == id && current.kind == kind => {
                self.in_flight = None;
                true
            }
            _ => {
                metrics::counter!(
                    "quantplay.app.playground.stale_total",
                    "kind" => call_kind_label(kind)
                )
                .increment(1);
                tracing::warn!(
                    request_id = id.0,
                    kind = call_kind_label(kind),
                    "dropping stale completion"
                );
                false
            }
        }
    }

    fn ensure_idle(&self) -> Result<(), TransitionError> {
        match self.in_flight {
            Some(current) => Err(TransitionError::Busy(current.kind)),
            None => Ok(()),
        }
    }

    fn ensure_mode(&self, expected: Mode) -> Result<(), TransitionError> {
        if self.mode == expected {
            Ok(())
        } else {
            Err(TransitionError::WrongMode {
                expected,
                actual: self.mode,
            })
        }
    }
}

pub fn call_kind_label(kind: CallKind) -> &'static str {
    match kind {
        CallKind::Backtest => "backtest",
        CallKind::Generate => "generate",
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Completion, Mode, PlaygroundController, PlaygroundForm, TransitionError,
        DEFAULT_STRATEGY,
    };
    use playground_domain::errors::ClientError;
    use playground_domain::value_objects::backtest::{BacktestResponse, Summary};
    use playground_domain::value_objects::generate::GenerateResponse;

    fn controller() -> PlaygroundController {
        PlaygroundController::new(PlaygroundForm::default())
    }

    #[test]
    fn ai_mode_only_entered_when_idle() {
        let mut ctl = controller();
        let _dispatch = ctl.begin_backtest().expect("dispatch");
        assert!(matches!(ctl.enter_ai(), Err(TransitionError::Busy(_))));
        assert_eq!(ctl.mode(), Mode::Manual);
    }

    #[test]
    fn exit_ai_keeps_editor_buffer() {
        let mut ctl = controller();
        ctl.enter_ai().expect("enter");
        assert!(matches!(
            ctl.enter_ai(),
            Err(TransitionError::WrongMode { .. })
        ));
        ctl.exit_ai().expect("exit");
        assert_eq!(ctl.mode(), Mode::Manual);
        assert_eq!(ctl.form.code, DEFAULT_STRATEGY);
    }

    #[test]
    fn generate_requires_ai_mode_and_prompt() {
        let mut ctl = controller();
        assert!(matches!(
            ctl.begin_generate(),
            Err(TransitionError::WrongMode { .. })
        ));
        ctl.enter_ai().expect("enter");
        assert_eq!(ctl.begin_generate(), Err(TransitionError::EmptyPrompt));
        assert!(!ctl.is_busy());
    }

    #[test]
    fn failed_generation_raises_alert_and_keeps_mode() {
        let mut ctl = controller();
        ctl.enter_ai().expect("enter");
        ctl.form.prompt = "momentum".to_string();
        let dispatch = ctl.begin_generate().expect("dispatch");
        let completion = ctl.complete_generate(
            dispatch.id,
            Err(ClientError::transport(Some(500), "Request failed")),
        );
        assert_eq!(completion, Completion::Failed);
        assert_eq!(ctl.mode(), Mode::Ai);
        assert_eq!(ctl.form.code, DEFAULT_STRATEGY);
        assert!(ctl.alert().unwrap().contains("Request failed"));
        assert!(!ctl.is_busy());

        ctl.dismiss_alert();
        assert!(ctl.alert().is_none());
    }

    #[test]
    fn backtest_error_replaces_previous_output() {
        let mut ctl = controller();
        let first = ctl.begin_backtest().expect("dispatch");
        ctl.complete_backtest(first.id, Ok(BacktestResponse::completed(Summary::default())));
        assert!(ctl.output().unwrap().summary().is_some());

        let second = ctl.begin_backtest().expect("dispatch");
        let completion = ctl.complete_backtest(second.id, Err(ClientError::Unauthenticated));
        assert_eq!(completion, Completion::Failed);
        assert!(ctl.output().unwrap().summary().is_none());
        assert!(ctl.output().unwrap().error().unwrap().contains("not signed in"));
    }

    #[test]
    fn stale_completion_is_ignored() {
        let mut ctl = controller();
        let first = ctl.begin_backtest().expect("dispatch");
        ctl.complete_backtest(first.id, Ok(BacktestResponse::failed("first")));

        let second = ctl.begin_backtest().expect("dispatch");
        assert_eq!(
            ctl.complete_backtest(first.id, Ok(BacktestResponse::failed("late"))),
            Completion::Stale
        );
        assert!(ctl.is_busy());
        assert_eq!(ctl.output().unwrap().error(), Some("first"));

        ctl.complete_backtest(second.id, Ok(BacktestResponse::failed("second")));
        assert_eq!(ctl.output().unwrap().error(), Some("second"));
        assert!(second.id > first.id);
    }

    #[test]
    fn completion_of_other_kind_is_stale() {
        let mut ctl = controller();
        let dispatch = ctl.begin_backtest().expect("dispatch");
        assert_eq!(
            ctl.complete_generate(
                dispatch.id,
                Ok(GenerateResponse {
                    code: "x".to_string()
                })
            ),
            Completion::Stale
        );
        assert_eq!(ctl.form.code, DEFAULT_STRATEGY);
    }

    #[test]
    fn malformed_date_is_reported_without_dispatch() {
        let mut ctl = controller();
        ctl.form.start_date = "01/02/2022".to_string();
        let err = ctl.begin_backtest().expect_err("invalid date");
        assert!(matches!(err, TransitionError::InvalidForm(_)));
        assert!(!ctl.is_busy());
        assert!(ctl.output().unwrap().error().unwrap().contains("start date"));
    }
}
