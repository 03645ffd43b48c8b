use thiserror::Error;

/// Failure of a call into the cluster control plane.
///
/// "Already exists" never surfaces here: gateways adopt the existing
/// resource instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The control plane could not be queried at all.
    #[error("cluster API unreachable: {0}")]
    Unreachable(String),
    /// The control plane answered and refused the request.
    #[error("cluster API rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl GatewayError {
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        GatewayError::Rejected {
            status,
            message: message.into(),
        }
    }

    /// The message the cluster returned, without classification prefix.
    pub fn message(&self) -> &str {
        match self {
            GatewayError::Unreachable(message) => message,
            GatewayError::Rejected { message, .. } => message,
        }
    }
}
