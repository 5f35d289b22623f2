use crate::logging::SharedLogBuffer;
use crate::tasks::{AuthAction, AuthOutcome, TaskEvent, TaskRunner};
use crossterm::event::{Event as CtEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use playground_application::auth::{validate_credentials, SignUpResult};
use playground_application::playground::{
    CallKind, Completion, Mode, PlaygroundController, PlaygroundForm, TransitionError,
};
use playground_application::session::SessionSubscription;
use playground_domain::value_objects::session::Session;
use std::time::{Duration, Instant};

const INFO_TTL: Duration = Duration::from_secs(5);
const LOG_SCROLL_STEP: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewId {
    SignUp,
    SignIn,
    Playground,
}

/// Single-line or multi-line edit buffer; `cursor` is a byte offset that
/// always sits on a char boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextInput {
    pub value: String,
    pub cursor: usize,
}

impl TextInput {
    pub fn new(value: String) -> Self {
        let cursor = value.len();
        Self { value, cursor }
    }

    pub fn insert_char(&mut self, ch: char) {
        self.value.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    pub fn backspace(&mut self) {
        if let Some(ch) = self.value[..self.cursor].chars().next_back() {
            self.cursor -= ch.len_utf8();
            self.value.remove(self.cursor);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.value.len() {
            self.value.remove(self.cursor);
        }
    }

    pub fn move_left(&mut self) {
        if let Some(ch) = self.value[..self.cursor].chars().next_back() {
            self.cursor -= ch.len_utf8();
        }
    }

    pub fn move_right(&mut self) {
        if let Some(ch) = self.value[self.cursor..].chars().next() {
            self.cursor += ch.len_utf8();
        }
    }

    pub fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }

    /// The value with `marker` drawn at the cursor.
    pub fn with_cursor(&self, marker: char) -> String {
        let mut out = String::with_capacity(self.value.len() + marker.len_utf8());
        out.push_str(&self.value[..self.cursor]);
        out.push(marker);
        out.push_str(&self.value[self.cursor..]);
        out
    }

    fn handle_edit_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char(ch) => self.insert_char(ch),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Delete => self.delete(),
            KeyCode::Left => self.move_left(),
            KeyCode::Right => self.move_right(),
            _ => return false,
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthField {
    Email,
    Password,
}

#[derive(Debug, Clone)]
pub struct AuthForm {
    pub email: TextInput,
    pub password: TextInput,
    pub focus: AuthField,
    pub pending: bool,
    pub error: Option<String>,
}

impl AuthForm {
    fn new() -> Self {
        Self {
            email: TextInput::default(),
            password: TextInput::default(),
            focus: AuthField::Email,
            pending: false,
            error: None,
        }
    }

    fn focused_mut(&mut self) -> &mut TextInput {
        match self.focus {
            AuthField::Email => &mut self.email,
            AuthField::Password => &mut self.password,
        }
    }

    fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            AuthField::Email => AuthField::Password,
            AuthField::Password => AuthField::Email,
        };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Ticker,
    StartDate,
    EndDate,
    Code,
}

impl FormField {
    fn next(self) -> Self {
        match self {
            Self::Ticker => Self::StartDate,
            Self::StartDate => Self::EndDate,
            Self::EndDate => Self::Code,
            Self::Code => Self::Ticker,
        }
    }

    fn prev(self) -> Self {
        match self {
            Self::Ticker => Self::Code,
            Self::StartDate => Self::Ticker,
            Self::EndDate => Self::StartDate,
            Self::Code => Self::EndDate,
        }
    }
}

/// Edit buffers backing the controller's form.
#[derive(Debug, Clone)]
pub struct PlaygroundInputs {
    pub ticker: TextInput,
    pub start_date: TextInput,
    pub end_date: TextInput,
    pub code: TextInput,
    pub prompt: TextInput,
}

impl PlaygroundInputs {
    fn from_form(form: &PlaygroundForm) -> Self {
        Self {
            ticker: TextInput::new(form.ticker.clone()),
            start_date: TextInput::new(form.start_date.clone()),
            end_date: TextInput::new(form.end_date.clone()),
            code: TextInput::new(form.code.clone()),
            prompt: TextInput::new(form.prompt.clone()),
        }
    }

    fn write_to(&self, form: &mut PlaygroundForm) {
        form.ticker.clone_from(&self.ticker.value);
        form.start_date.clone_from(&self.start_date.value);
        form.end_date.clone_from(&self.end_date.value);
        form.code.clone_from(&self.code.value);
        form.prompt.clone_from(&self.prompt.value);
    }

    fn field_mut(&mut self, field: FormField) -> &mut TextInput {
        match field {
            FormField::Ticker => &mut self.ticker,
            FormField::StartDate => &mut self.start_date,
            FormField::EndDate => &mut self.end_date,
            FormField::Code => &mut self.code,
        }
    }
}

pub struct App {
    pub active_view: ViewId,
    pub auth_form: AuthForm,

    pub controller: PlaygroundController,
    pub inputs: PlaygroundInputs,
    pub focus: FormField,

    pub signed_in_as: Option<String>,
    session_events: SessionSubscription,

    pub logs: SharedLogBuffer,
    pub log_scroll: usize,
    seen_logs: u64,

    pub task_runner: TaskRunner,
    pub dirty: bool,
    spinner: usize,
    pub info_message: Option<String>,
    info_expires_at: Option<Instant>,
}

impl App {
    pub fn new(form: PlaygroundForm, logs: SharedLogBuffer, task_runner: TaskRunner) -> Self {
        let session_events = task_runner.services().session.subscribe();
        let current = session_events.latest();
        let active_view = if current.is_some() {
            ViewId::Playground
        } else {
            ViewId::SignUp
        };
        Self {
            active_view,
            auth_form: AuthForm::new(),
            inputs: PlaygroundInputs::from_form(&form),
            controller: PlaygroundController::new(form),
            focus: FormField::Ticker,
            signed_in_as: current.as_ref().map(session_label),
            session_events,
            logs,
            log_scroll: 0,
            seen_logs: 0,
            task_runner,
            dirty: true,
            spinner: 0,
            info_message: None,
            info_expires_at: None,
        }
    }

    pub fn spawn_input_reader(&self, tx: tokio::sync::mpsc::UnboundedSender<TaskEvent>) {
        std::thread::spawn(move || {
            while let Ok(event) = crossterm::event::read() {
                if tx.send(TaskEvent::Input(event)).is_err() {
                    break;
                }
            }
        });
    }

    pub fn on_tick(&mut self) {
        if self.controller.is_busy() || self.auth_form.pending {
            self.spinner = (self.spinner + 1) % 4;
            self.dirty = true;
        }

        if let Some(change) = self.session_events.take_change() {
            self.signed_in_as = change.as_ref().map(session_label);
            if change.is_none() && self.active_view == ViewId::Playground {
                self.active_view = ViewId::SignIn;
                self.set_info("Session ended. Sign in again.");
            }
            self.dirty = true;
        }

        let pushed = self.logs.lock().pushed();
        if pushed != self.seen_logs {
            self.seen_logs = pushed;
            self.dirty = true;
        }

        if let Some(until) = self.info_expires_at {
            if Instant::now() >= until {
                self.info_message = None;
                self.info_expires_at = None;
                self.dirty = true;
            }
        }
    }

    pub fn on_event(&mut self, event: TaskEvent) -> Result<bool, String> {
        match event {
            TaskEvent::Input(ct) => self.on_input(ct),
            TaskEvent::BacktestFinished { id, result } => {
                self.controller.complete_backtest(id, result);
                self.dirty = true;
                Ok(false)
            }
            TaskEvent::GenerateFinished { id, result } => {
                if self.controller.complete_generate(id, result) == Completion::Applied {
                    self.inputs.code = TextInput::new(self.controller.form.code.clone());
                    self.focus = FormField::Code;
                    self.set_info("Strategy generated. Review it, then run the backtest.");
                }
                self.dirty = true;
                Ok(false)
            }
            TaskEvent::AuthFinished { action, result } => {
                self.on_auth_finished(action, result);
                self.dirty = true;
                Ok(false)
            }
        }
    }

    fn on_auth_finished(
        &mut self,
        action: AuthAction,
        result: Result<AuthOutcome, playground_domain::errors::ClientError>,
    ) {
        self.auth_form.pending = false;
        match result {
            Ok(AuthOutcome::SignedIn) | Ok(AuthOutcome::SignedUp(SignUpResult::SignedIn)) => {
                self.auth_form = AuthForm::new();
                self.active_view = ViewId::Playground;
            }
            Ok(AuthOutcome::SignedUp(SignUpResult::ConfirmationRequired)) => {
                self.auth_form.password.clear();
                self.auth_form.error = None;
                self.active_view = ViewId::SignIn;
                self.set_info("Account created. Confirm your email, then sign in.");
            }
            Err(err) => {
                tracing::warn!(?action, error = %err, "authentication failed");
                self.auth_form.password.clear();
                self.auth_form.error = Some(err.to_string());
            }
        }
    }

    fn on_input(&mut self, event: CtEvent) -> Result<bool, String> {
        match event {
            CtEvent::Key(key) if key.kind != KeyEventKind::Release => self.on_key(key),
            CtEvent::Resize(_, _) => {
                self.dirty = true;
                Ok(false)
            }
            _ => Ok(false),
        }
    }

    fn on_key(&mut self, key: KeyEvent) -> Result<bool, String> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl && key.code == KeyCode::Char('c') {
            return Ok(true);
        }
        self.dirty = true;

        match key.code {
            KeyCode::PageUp => {
                let max = self.logs.lock().len().saturating_sub(1);
                self.log_scroll = (self.log_scroll + LOG_SCROLL_STEP).min(max);
                return Ok(false);
            }
            KeyCode::PageDown => {
                self.log_scroll = self.log_scroll.saturating_sub(LOG_SCROLL_STEP);
                return Ok(false);
            }
            _ => {}
        }

        match self.active_view {
            ViewId::SignUp | ViewId::SignIn => self.handle_auth_keys(key, ctrl),
            ViewId::Playground => self.handle_playground_keys(key, ctrl),
        }
    }

    fn handle_auth_keys(&mut self, key: KeyEvent, ctrl: bool) -> Result<bool, String> {
        if self.auth_form.pending {
            return Ok(false);
        }
        match key.code {
            KeyCode::Esc => return Ok(true),
            KeyCode::Char('s') if ctrl => {
                self.active_view = match self.active_view {
                    ViewId::SignUp => ViewId::SignIn,
                    _ => ViewId::SignUp,
                };
                self.auth_form.error = None;
            }
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                self.auth_form.toggle_focus();
            }
            KeyCode::Enter => match self.auth_form.focus {
                AuthField::Email => self.auth_form.focus = AuthField::Password,
                AuthField::Password => self.submit_auth(),
            },
            code if !ctrl => {
                self.auth_form.focused_mut().handle_edit_key(code);
            }
            _ => {}
        }
        Ok(false)
    }

    fn submit_auth(&mut self) {
        let action = match self.active_view {
            ViewId::SignUp => AuthAction::SignUp,
            _ => AuthAction::SignIn,
        };
        let email = self.auth_form.email.value.clone();
        let password = self.auth_form.password.value.clone();
        if let Err(err) = validate_credentials(&email, &password) {
            self.auth_form.error = Some(err.to_string());
            return;
        }
        self.auth_form.error = None;
        self.auth_form.pending = true;
        self.task_runner.authenticate(action, email, password);
    }

    fn handle_playground_keys(&mut self, key: KeyEvent, ctrl: bool) -> Result<bool, String> {
        if self.controller.alert().is_some() {
            if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
                self.controller.dismiss_alert();
            }
            return Ok(false);
        }

        if ctrl {
            match key.code {
                KeyCode::Char('r') => self.start_backtest(),
                KeyCode::Char('g') => self.toggle_mode(),
                KeyCode::Char('o') => self.sign_out(),
                _ => {}
            }
            return Ok(false);
        }

        match self.controller.mode() {
            Mode::Ai => match key.code {
                KeyCode::Esc => self.toggle_mode(),
                KeyCode::Enter => self.start_generate(),
                code => {
                    self.inputs.prompt.handle_edit_key(code);
                }
            },
            Mode::Manual => match key.code {
                KeyCode::Esc => return Ok(true),
                KeyCode::Tab => self.focus = self.focus.next(),
                KeyCode::BackTab => self.focus = self.focus.prev(),
                KeyCode::Enter if self.focus == FormField::Code => {
                    self.inputs.code.insert_char('\n');
                }
                KeyCode::Enter => self.start_backtest(),
                code => {
                    self.inputs.field_mut(self.focus).handle_edit_key(code);
                }
            },
        }
        Ok(false)
    }

    fn toggle_mode(&mut self) {
        self.inputs.write_to(&mut self.controller.form);
        let result = match self.controller.mode() {
            Mode::Manual => self.controller.enter_ai(),
            Mode::Ai => self.controller.exit_ai(),
        };
        if let Err(err) = result {
            self.set_info(err.to_string());
        }
    }

    fn start_backtest(&mut self) {
        if self.controller.mode() == Mode::Ai {
            self.set_info("Leave AI mode (Esc) to run a backtest.");
            return;
        }
        self.inputs.write_to(&mut self.controller.form);
        match self.controller.begin_backtest() {
            Ok(dispatch) => self.task_runner.run_backtest(dispatch),
            // The controller already put the message in the result panel.
            Err(TransitionError::InvalidForm(_)) => {}
            Err(err) => self.set_info(err.to_string()),
        }
    }

    fn start_generate(&mut self) {
        self.inputs.write_to(&mut self.controller.form);
        match self.controller.begin_generate() {
            Ok(dispatch) => self.task_runner.generate_strategy(dispatch),
            Err(err) => self.set_info(err.to_string()),
        }
    }

    fn sign_out(&mut self) {
        self.task_runner.sign_out();
        self.auth_form = AuthForm::new();
        self.active_view = ViewId::SignIn;
    }

    fn set_info(&mut self, msg: impl Into<String>) {
        self.info_message = Some(msg.into());
        self.info_expires_at = Some(Instant::now() + INFO_TTL);
    }

    /// Label for the call in flight, e.g. `Running... /`.
    pub fn busy_label(&self) -> Option<String> {
        let in_flight = self.controller.in_flight()?;
        let verb = match in_flight.kind {
            CallKind::Backtest => "Running...",
            CallKind::Generate => "Generating...",
        };
        Some(format!("{verb} {}", self.spinner_char()))
    }

    pub fn spinner_char(&self) -> char {
        match self.spinner {
            0 => '|',
            1 => '/',
            2 => '-',
            _ => '\\',
        }
    }
}

fn session_label(session: &Session) -> String {
    session
        .email
        .clone()
        .or_else(|| session.user_id.clone())
        .unwrap_or_else(|| "signed in".to_string())
}
