use std::error::Error as StdError;

use keyflow_sessions::SessionStoreError;

/// A single action failed. The flow is aborted; earlier actions stand.
#[derive(Debug, thiserror::Error)]
pub enum ActionExecutionError {
    #[error("step {step}: send failed: {source}")]
    Send {
        step: usize,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("step {step}: session write failed: {source}")]
    Session {
        step: usize,
        #[source]
        source: SessionStoreError,
    },
}

impl ActionExecutionError {
    /// 1-based position of the failed action in execution order.
    pub fn step(&self) -> usize {
        match self {
            Self::Send { step, .. } | Self::Session { step, .. } => *step,
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Send { .. } => "send",
            Self::Session { .. } => "session",
        }
    }
}

pub type Result<T> = std::result::Result<T, ActionExecutionError>;
