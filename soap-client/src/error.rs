//! SOAP call error taxonomy.
//!
//! Every failure is classified so callers can branch exhaustively:
//! a device that answered with a structured fault rejected the action and
//! must not be retried; timeouts and transport failures are the caller's
//! choice to retry.

/// Classified failure of a SOAP action call.
#[derive(Debug, thiserror::Error)]
pub enum SoapError {
    /// The device answered with a SOAP fault. Never retried.
    #[error("{action} rejected by device (fault {fault_code}: {description})")]
    Rejected {
        action: &'static str,
        fault_code: u16,
        description: String,
    },

    /// The call exceeded its deadline.
    #[error("{action} timed out")]
    Timeout { action: &'static str },

    /// Transport-level failure before a device answer arrived.
    #[error("{action} failed, device unreachable: {message}")]
    Unreachable {
        action: &'static str,
        message: String,
    },

    /// The device answered 200 but the body did not carry the expected shape.
    #[error("{action} returned an unusable response: {message}")]
    InvalidResponse {
        action: &'static str,
        message: String,
    },
}

impl SoapError {
    /// The action this error was raised for.
    pub fn action(&self) -> &'static str {
        match self {
            Self::Rejected { action, .. }
            | Self::Timeout { action }
            | Self::Unreachable { action, .. }
            | Self::InvalidResponse { action, .. } => action,
        }
    }

    /// Whether the caller may reasonably retry the call.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Unreachable { .. })
    }
}

/// Convenience alias for SOAP call results.
pub type SoapResult<T> = std::result::Result<T, SoapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_is_terminal() {
        let err = SoapError::Rejected {
            action: "Play",
            fault_code: 701,
            description: "Transition not available".to_string(),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.action(), "Play");
        assert!(err.to_string().contains("fault 701"));
    }

    #[test]
    fn transport_failures_are_retryable() {
        assert!(SoapError::Timeout { action: "GetVolume" }.is_retryable());
        assert!(SoapError::Unreachable {
            action: "GetVolume",
            message: "connection refused".to_string(),
        }
        .is_retryable());
    }
}
