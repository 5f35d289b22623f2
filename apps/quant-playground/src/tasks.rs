use crate::bootstrap::Services;
use playground_application::auth::SignUpResult;
use playground_application::playground::{Dispatch, RequestId};
use playground_domain::errors::ClientError;
use playground_domain::value_objects::backtest::{BacktestRequest, BacktestResponse};
use playground_domain::value_objects::generate::{GenerateRequest, GenerateResponse};
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAction {
    SignIn,
    SignUp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    SignedIn,
    SignedUp(SignUpResult),
}

pub enum TaskEvent {
    Input(crossterm::event::Event),
    BacktestFinished {
        id: RequestId,
        result: Result<BacktestResponse, ClientError>,
    },
    GenerateFinished {
        id: RequestId,
        result: Result<GenerateResponse, ClientError>,
    },
    AuthFinished {
        action: AuthAction,
        result: Result<AuthOutcome, ClientError>,
    },
}

/// Runs blocking HTTP calls off the UI loop and reports back as events.
///
/// Must be used from inside a tokio runtime.
#[derive(Clone)]
pub struct TaskRunner {
    tx: UnboundedSender<TaskEvent>,
    services: Services,
}

impl TaskRunner {
    pub fn new(tx: UnboundedSender<TaskEvent>, services: Services) -> Self {
        Self { tx, services }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn run_backtest(&self, dispatch: Dispatch<BacktestRequest>) {
        let tx = self.tx.clone();
        let api = self.services.api.clone();
        let session = self.services.session.clone();
        tokio::task::spawn_blocking(move || {
            let result = api.run_backtest(&session, &dispatch.request);
            let _ = tx.send(TaskEvent::BacktestFinished {
                id: dispatch.id,
                result,
            });
        });
    }

    pub fn generate_strategy(&self, dispatch: Dispatch<GenerateRequest>) {
        let tx = self.tx.clone();
        let api = self.services.api.clone();
        let session = self.services.session.clone();
        tokio::task::spawn_blocking(move || {
            let result = api.generate_strategy(&session, &dispatch.request);
            let _ = tx.send(TaskEvent::GenerateFinished {
                id: dispatch.id,
                result,
            });
        });
    }

    pub fn authenticate(&self, action: AuthAction, email: String, password: String) {
        let tx = self.tx.clone();
        let Some(auth) = self.services.auth.clone() else {
            let _ = tx.send(TaskEvent::AuthFinished {
                action,
                result: Err(ClientError::Config(format!(
                    "no identity provider configured (set {})",
                    playground_application::config::ENV_AUTH_URL
                ))),
            });
            return;
        };
        tokio::task::spawn_blocking(move || {
            let result = match action {
                AuthAction::SignIn => auth
                    .sign_in(&email, &password)
                    .map(|()| AuthOutcome::SignedIn),
                AuthAction::SignUp => auth.sign_up(&email, &password).map(AuthOutcome::SignedUp),
            };
            let _ = tx.send(TaskEvent::AuthFinished { action, result });
        });
    }

    pub fn sign_out(&self) {
        match &self.services.auth {
            Some(auth) => auth.sign_out(),
            None => self
                .services
                .session
                .apply(playground_domain::value_objects::session::AuthEvent::SignedOut),
        }
    }
}
