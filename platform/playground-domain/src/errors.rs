/// Failure taxonomy shared by every call the client makes.
///
/// All variants are terminal: nothing in the client retries on them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("not signed in: sign in before running a backtest")]
    Unauthenticated,

    #[error("{message}")]
    TransportFailure {
        status: Option<u16>,
        message: String,
    },

    #[error("{0}")]
    ValidationFailure(String),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ClientError {
    pub fn transport(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::TransportFailure {
            status,
            message: message.into(),
        }
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::TransportFailure { .. } => "transport",
            Self::ValidationFailure(_) => "validation",
            Self::Decode(_) => "decode",
            Self::Config(_) => "config",
        }
    }
}
