use chrono::{DateTime, Utc};
use playground_domain::value_objects::session::{AuthEvent, Session};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Holds the current session and publishes every change to subscribers.
///
/// Written only by the auth flow through [`SessionContext::apply`]; request
/// code reads the token through [`SessionContext::access_token`].
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    tx: watch::Sender<Option<Session>>,
    closed: AtomicBool,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            inner: Arc::new(SessionInner {
                tx,
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn with_session(session: Session) -> Self {
        let ctx = Self::new();
        ctx.apply(AuthEvent::SignedIn(session));
        ctx
    }

    pub fn apply(&self, event: AuthEvent) {
        if self.inner.closed.load(Ordering::Acquire) {
            tracing::warn!(?event, "auth event after session holder closed; ignored");
            return;
        }
        match event {
            AuthEvent::SignedIn(session) => {
                tracing::info!(
                    user_id = session.user_id.as_deref().unwrap_or("unknown"),
                    "signed in"
                );
                self.inner.tx.send_replace(Some(session));
            }
            AuthEvent::TokenRefreshed(session) => {
                tracing::debug!("session token refreshed");
                self.inner.tx.send_replace(Some(session));
            }
            AuthEvent::SignedOut => {
                tracing::info!("signed out");
                self.inner.tx.send_replace(None);
            }
        }
    }

    pub fn current(&self) -> Option<Session> {
        self.inner.tx.borrow().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.access_token_at(Utc::now())
    }

    pub fn access_token_at(&self, now: DateTime<Utc>) -> Option<String> {
        self.inner
            .tx
            .borrow()
            .as_ref()
            .and_then(|session| session.token_at(now))
            .map(str::to_string)
    }

    pub fn subscribe(&self) -> SessionSubscription {
        SessionSubscription {
            rx: self.inner.tx.subscribe(),
        }
    }

    /// Ends the holder's lifetime: the session is cleared, subscribers see
    /// the final `None`, later events are ignored.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.tx.send_replace(None);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

pub struct SessionSubscription {
    rx: watch::Receiver<Option<Session>>,
}

impl SessionSubscription {
    pub fn latest(&self) -> Option<Session> {
        self.rx.borrow().clone()
    }

    /// The new value if it changed since the last call; never blocks.
    pub fn take_change(&mut self) -> Option<Option<Session>> {
        match self.rx.has_changed() {
            Ok(true) => Some(self.rx.borrow_and_update().clone()),
            _ => None,
        }
    }

    /// Waits for the next change. `None` once the holder is dropped.
    pub async fn changed(&mut self) -> Option<Option<Session>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    pub fn unsubscribe(self) {}
}
