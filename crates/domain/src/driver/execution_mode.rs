use serde::{Deserialize, Serialize};

/// How many commands a device may have in flight at once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ExecutionMode {
    /// Every eligible command may be sent without waiting
    #[default]
    Salvo,
    /// One outstanding command; the next is sent after ack or timeout
    Sequential,
}

impl ExecutionMode {
    /// Upper bound of unresolved commands, `None` when unbounded
    pub fn max_in_flight(&self) -> Option<usize> {
        match self {
            Self::Salvo => None,
            Self::Sequential => Some(1),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Salvo => "salvo",
            Self::Sequential => "sequential",
        }
    }
}
