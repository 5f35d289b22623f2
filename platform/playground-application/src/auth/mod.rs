use crate::session::SessionContext;
use playground_domain::errors::ClientError;
use playground_domain::repositories::identity::{Credentials, IdentityProvider};
use playground_domain::value_objects::session::AuthEvent;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignUpResult {
    SignedIn,
    ConfirmationRequired,
}

/// Sign-in/sign-up flow. The only writer of the session holder.
#[derive(Clone)]
pub struct AuthService {
    provider: Arc<dyn IdentityProvider>,
    session: SessionContext,
}

impl AuthService {
    pub fn new(provider: Arc<dyn IdentityProvider>, session: SessionContext) -> Self {
        Self { provider, session }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn sign_in(&self, email: &str, password: &str) -> Result<(), ClientError> {
        let credentials = validate_credentials(email, password)?;
        let session = self.provider.sign_in_with_password(&credentials)?;
        metrics::counter!("quantplay.app.auth.sign_in_total").increment(1);
        self.session.apply(AuthEvent::SignedIn(session));
        Ok(())
    }

    pub fn sign_up(&self, email: &str, password: &str) -> Result<SignUpResult, ClientError> {
        let credentials = validate_credentials(email, password)?;
        let outcome = self.provider.sign_up(&credentials)?;
        metrics::counter!("quantplay.app.auth.sign_up_total").increment(1);
        tracing::info!(
            user_id = outcome.user_id.as_deref().unwrap_or("unknown"),
            confirmed = outcome.session.is_some(),
            "account created"
        );
        match outcome.session {
            Some(session) => {
                self.session.apply(AuthEvent::SignedIn(session));
                Ok(SignUpResult::SignedIn)
            }
            None => Ok(SignUpResult::ConfirmationRequired),
        }
    }

    pub fn sign_out(&self) {
        self.session.apply(AuthEvent::SignedOut);
    }
}

pub fn validate_credentials(email: &str, password: &str) -> Result<Credentials, ClientError> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ClientError::ValidationFailure(
            "enter a valid email address".to_string(),
        ));
    }
    if password.is_empty() {
        return Err(ClientError::ValidationFailure(
            "password is required".to_string(),
        ));
    }
    Ok(Credentials {
        email: email.to_string(),
        password: password.to_string(),
    })
}
