use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sender designator for messages typed by a person.
pub const HUMAN: &str = "human";
/// Sender designator for messages emitted by the orchestrator itself.
pub const SYSTEM: &str = "system";
/// Recipient marker meaning every participant.
pub const BROADCAST: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
  #[default]
  Chat,
  System,
  Command,
}

/// One immutable unit of conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
  pub id: Uuid,
  pub sender: String,
  pub recipients: Vec<String>,
  pub content: String,
  #[serde(default)]
  pub message_type: MessageType,
  pub timestamp: DateTime<Utc>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Message {
  pub fn new(
    sender: impl Into<String>,
    recipients: Vec<String>,
    content: impl Into<String>,
    message_type: MessageType,
  ) -> Self {
    Self {
      id: Uuid::new_v4(),
      sender: sender.into(),
      recipients,
      content: content.into(),
      message_type,
      timestamp: Utc::now(),
      metadata: BTreeMap::new(),
    }
  }

  /// A chat message from the human addressed to one agent.
  pub fn human(to: &str, content: impl Into<String>) -> Self {
    Self::new(HUMAN, vec![to.to_string()], content, MessageType::Chat)
  }

  /// A chat reply authored by `agent`, broadcast to all participants.
  pub fn reply(agent: &str, content: impl Into<String>) -> Self {
    Self::new(agent, vec![BROADCAST.to_string()], content, MessageType::Chat)
  }

  pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
    self.metadata.insert(key.into(), value);
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn human_message_targets_agent() {
    let m = Message::human("a", "hello");
    assert_eq!(m.sender, HUMAN);
    assert_eq!(m.recipients, vec!["a".to_string()]);
    assert_eq!(m.message_type, MessageType::Chat);
  }

  #[test]
  fn ids_are_unique() {
    let a = Message::reply("a", "x");
    let b = Message::reply("a", "x");
    assert_ne!(a.id, b.id);
  }

  #[test]
  fn wire_shape_uses_snake_case_type() {
    let m = Message::new(SYSTEM, vec![BROADCAST.into()], "up", MessageType::System);
    let v = serde_json::to_value(&m).unwrap();
    assert_eq!(v["message_type"], "system");
    assert_eq!(v["recipients"][0], "all");
    assert!(v.get("metadata").is_none());
  }
}
