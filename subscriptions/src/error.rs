//! Subscription manager errors.

/// Errors surfaced by the subscription manager's lifecycle operations.
///
/// Per-device transport failures are deliberately absent: the manager
/// swallows and logs those so one unreachable device never blocks
/// fleet-wide operation.
#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    #[error("manager shutdown error: {0}")]
    ShutdownError(String),
}

/// Convenience alias for subscription results.
pub type SubscriptionResult<T> = std::result::Result<T, SubscriptionError>;
