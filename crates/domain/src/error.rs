use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid device ID: {0}")]
    InvalidDeviceId(String),

    #[error("Invalid device configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid mapping for layer {layer}: {reason}")]
    InvalidMapping { layer: String, reason: String },

    #[error("No integration registered for device type: {0}")]
    UnknownDeviceType(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Device worker unavailable: {0}")]
    WorkerUnavailable(String),
}

impl DomainError {
    /// True for the error class that must fail device construction synchronously.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidDeviceId(_)
                | Self::InvalidConfiguration(_)
                | Self::InvalidMapping { .. }
                | Self::UnknownDeviceType(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors_are_classified() {
        assert!(DomainError::InvalidConfiguration("port".into()).is_configuration_error());
        assert!(DomainError::UnknownDeviceType("atem".into()).is_configuration_error());
        assert!(
            DomainError::InvalidMapping {
                layer: "cam1".into(),
                reason: "device type mismatch".into()
            }
            .is_configuration_error()
        );
        assert!(!DomainError::WorkerUnavailable("ptz0".into()).is_configuration_error());
    }

    #[test]
    fn test_error_display() {
        let err = DomainError::InvalidMapping {
            layer: "cam1".into(),
            reason: "unknown device".into(),
        };
        assert_eq!(err.to_string(), "Invalid mapping for layer cam1: unknown device");
    }
}
