//! Gateway error taxonomy
//!
//! None of these are fatal: each one means "this command or message had no effect".

use thiserror::Error;

/// Errors surfaced by the MagicQ gateway core
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Host missing or send port outside 1..=65535
    #[error("cannot send OSC: {0}")]
    ConfigIncomplete(String),

    /// Socket bind/send failure
    #[error("OSC transport failure: {0}")]
    Transport(String),

    /// Outbound packet could not be encoded
    #[error("OSC encoding failed: {0}")]
    Encode(String),

    /// Action options missing a required value or carrying an unusable one
    #[error("malformed input for '{action}': {reason}")]
    MalformedInput { action: String, reason: String },

    /// Action id not present in the catalog
    #[error("unknown action '{0}'")]
    UnknownAction(String),

    /// Feedback id not present in the catalog
    #[error("unknown feedback '{0}'")]
    UnknownFeedback(String),

    /// No transport is open (bind failed or driver not initialized)
    #[error("console transport is not open")]
    NotConnected,

    /// The state actor has stopped and no longer accepts commands
    #[error("state actor is no longer running")]
    StateActorClosed,
}

impl GatewayError {
    /// Shorthand for a [`GatewayError::MalformedInput`]
    pub fn malformed(action: &str, reason: impl Into<String>) -> Self {
        GatewayError::MalformedInput {
            action: action.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the caller supplied bad input (as opposed to an environment failure)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            GatewayError::MalformedInput { .. }
                | GatewayError::UnknownAction(_)
                | GatewayError::UnknownFeedback(_)
        )
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(e: std::io::Error) -> Self {
        GatewayError::Transport(e.to_string())
    }
}

impl From<rosc::OscError> for GatewayError {
    fn from(e: rosc::OscError) -> Self {
        GatewayError::Encode(format!("{:?}", e))
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
