use serde::{Deserialize, Serialize};

/// Master switch gating every recording and photo side effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArmState {
    Armed,
    Disarmed,
}

impl ArmState {
    pub fn is_armed(self) -> bool {
        matches!(self, ArmState::Armed)
    }
}

/// External inputs sampled once per acquisition cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalSignals {
    pub arm: ArmState,
    pub reset_requested: bool,
}

impl ExternalSignals {
    pub fn armed() -> Self {
        Self {
            arm: ArmState::Armed,
            reset_requested: false,
        }
    }

    pub fn disarmed() -> Self {
        Self {
            arm: ArmState::Disarmed,
            reset_requested: false,
        }
    }
}

/// Common error type for the recorder core.
#[derive(thiserror::Error, Debug)]
pub enum RecorderError {
    #[error("device error: {0}")]
    Device(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("signal error: {0}")]
    Signal(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl RecorderError {
    /// Wraps an I/O failure with the operation that was being attempted.
    pub fn storage(operation: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        RecorderError::Storage(format!("{}: {}", operation, err))
    }

    pub fn device(operation: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        RecorderError::Device(format!("{}: {}", operation, err))
    }
}

pub type RecorderResult<T> = Result<T, RecorderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_carries_operation_context() {
        let err = RecorderError::storage("opening videos/a.avi", "disk full");
        assert_eq!(err.to_string(), "storage error: opening videos/a.avi: disk full");
    }

    #[test]
    fn arm_state_reports_armed() {
        assert!(ArmState::Armed.is_armed());
        assert!(!ArmState::Disarmed.is_armed());
    }
}
