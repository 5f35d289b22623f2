use crate::errors::ClientError;
use crate::value_objects::session::Session;
use std::fmt;

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpOutcome {
    /// `None` when the provider wants the address confirmed first.
    pub session: Option<Session>,
    pub user_id: Option<String>,
}

/// Hosted email/password identity provider.
pub trait IdentityProvider: Send + Sync {
    fn sign_in_with_password(&self, credentials: &Credentials) -> Result<Session, ClientError>;

    fn sign_up(&self, credentials: &Credentials) -> Result<SignUpOutcome, ClientError>;
}
