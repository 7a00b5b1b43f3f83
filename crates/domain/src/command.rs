use serde::{Deserialize, Serialize};

/// Where a command came from: the timeline object(s) and layer that caused it
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandContext {
    pub object_ids: Vec<String>,
    pub layer: String,
}

impl CommandContext {
    pub fn new(object_id: impl Into<String>, layer: impl Into<String>) -> Self {
        Self {
            object_ids: vec![object_id.into()],
            layer: layer.into(),
        }
    }

    /// Context for a command that has no timeline origin (actions, resync)
    pub fn internal(reason: impl Into<String>) -> Self {
        Self {
            object_ids: Vec::new(),
            layer: reason.into(),
        }
    }
}

/// A single outbound instruction derived from a state diff.
///
/// Built fresh per diff and never mutated afterwards; the builder
/// methods consume `self`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Command<C> {
    content: C,
    context: CommandContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    queue_id: Option<String>,
    temporal_priority: i32,
}

impl<C> Command<C> {
    pub fn new(content: C, context: CommandContext) -> Self {
        Self {
            content,
            context,
            queue_id: None,
            temporal_priority: 0,
        }
    }

    /// Place the command in a named FIFO sub-queue
    pub fn in_queue(mut self, queue_id: impl Into<String>) -> Self {
        self.queue_id = Some(queue_id.into());
        self
    }

    /// Higher priorities are sent first among eligible commands
    pub fn with_priority(mut self, temporal_priority: i32) -> Self {
        self.temporal_priority = temporal_priority;
        self
    }

    pub fn content(&self) -> &C {
        &self.content
    }

    pub fn context(&self) -> &CommandContext {
        &self.context
    }

    pub fn queue_id(&self) -> Option<&str> {
        self.queue_id.as_deref()
    }

    pub fn temporal_priority(&self) -> i32 {
        self.temporal_priority
    }

    pub fn into_content(self) -> C {
        self.content
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_defaults() {
        let cmd = Command::new("recall", CommandContext::new("obj1", "cam1"));
        assert_eq!(*cmd.content(), "recall");
        assert_eq!(cmd.context().object_ids, vec!["obj1"]);
        assert_eq!(cmd.context().layer, "cam1");
        assert_eq!(cmd.queue_id(), None);
        assert_eq!(cmd.temporal_priority(), 0);
    }

    #[test]
    fn test_builder_sets_queue_and_priority() {
        let cmd = Command::new(1u8, CommandContext::default())
            .in_queue("Q1")
            .with_priority(5);
        assert_eq!(cmd.queue_id(), Some("Q1"));
        assert_eq!(cmd.temporal_priority(), 5);
    }

    #[test]
    fn test_serialization_omits_missing_queue() {
        let cmd = Command::new("x", CommandContext::new("obj1", "l1"));
        let json = serde_json::to_value(&cmd).unwrap();
        assert!(json.get("queueId").is_none());
        assert_eq!(json["context"]["objectIds"][0], "obj1");
        assert_eq!(json["temporalPriority"], 0);
    }
}
