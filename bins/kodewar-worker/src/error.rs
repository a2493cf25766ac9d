//! Failure taxonomy for the execution pipeline.
//!
//! The retry decision matches on these variants rather than parsing
//! message strings, so the kinds must stay distinct. Only infrastructure
//! failures are worth another attempt; everything else is terminal.

/// Errors that can occur while executing a submission.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// Sandbox resource configuration was rejected before any container
    /// was created.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Transient failure in the container runtime or broker plumbing.
    #[error("infrastructure error: {message}")]
    Infrastructure { message: String },

    /// A declared ceiling (time or memory) was reached.
    #[error("resource limit exceeded: {message}")]
    ResourceLimit { message: String },

    /// The runtime blocked a forbidden operation inside the sandbox.
    #[error("security violation: {message}")]
    Security { message: String },

    /// The submitted code failed on its own; the message carries its
    /// diagnostics.
    #[error("user code error: {message}")]
    UserCode { message: String },
}

impl ExecError {
    /// Creates a `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates an `Infrastructure` error.
    pub fn infrastructure(message: impl Into<String>) -> Self {
        Self::Infrastructure {
            message: message.into(),
        }
    }

    /// Creates a `ResourceLimit` error.
    pub fn resource_limit(message: impl Into<String>) -> Self {
        Self::ResourceLimit {
            message: message.into(),
        }
    }

    /// Creates a `Security` error.
    pub fn security(message: impl Into<String>) -> Self {
        Self::Security {
            message: message.into(),
        }
    }

    /// Creates a `UserCode` error.
    pub fn user_code(message: impl Into<String>) -> Self {
        Self::UserCode {
            message: message.into(),
        }
    }

    /// Returns true if another attempt could plausibly succeed.
    /// Deterministic failures (bad config, limits, user code) never retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Infrastructure { .. })
    }

    /// Returns true if this failure should be flagged for the audit log.
    pub fn is_security(&self) -> bool {
        matches!(self, Self::Security { .. })
    }
}
