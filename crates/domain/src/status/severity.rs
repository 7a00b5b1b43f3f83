use serde::{Deserialize, Serialize};

/// Severity of a device condition.
///
/// Variant order is the severity order, so `Ord` gives
/// `Unknown < Good < WarningMinor < WarningMajor < Bad < Fatal`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    /// Never connected
    #[default]
    Unknown,
    Good,
    /// Degraded timing, no functional loss
    WarningMinor,
    WarningMajor,
    /// Recoverable but currently broken
    Bad,
    /// Needs manual intervention
    Fatal,
}

impl StatusCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Good => "GOOD",
            Self::WarningMinor => "WARNING_MINOR",
            Self::WarningMajor => "WARNING_MAJOR",
            Self::Bad => "BAD",
            Self::Fatal => "FATAL",
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Good)
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order() {
        let ordered = [
            StatusCode::Unknown,
            StatusCode::Good,
            StatusCode::WarningMinor,
            StatusCode::WarningMajor,
            StatusCode::Bad,
            StatusCode::Fatal,
        ];
        for pair in ordered.windows(2) {
            assert!(pair[0] < pair[1], "{} < {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_serialization() {
        assert_eq!(
            serde_json::to_string(&StatusCode::WarningMajor).unwrap(),
            "\"WARNING_MAJOR\""
        );
        let code: StatusCode = serde_json::from_str("\"FATAL\"").unwrap();
        assert_eq!(code, StatusCode::Fatal);
    }
}
