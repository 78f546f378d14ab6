//! Data models for conversation context

use serde::{Deserialize, Serialize};
use std::fmt;

/// Speaker of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single role-tagged conversation message.
///
/// Messages are immutable once created. Conversations are ordered slices of
/// messages, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    role: Role,
    content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// How a message history divides into retained turns and turns to fold into
/// a summary.
///
/// `keep_messages` counts the most recent messages; `summarize_messages`
/// counts the oldest ones. The two always add up to the history length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarizationSplit {
    pub keep_messages: usize,
    pub summarize_messages: usize,
}

impl SummarizationSplit {
    pub fn total(&self) -> usize {
        self.keep_messages + self.summarize_messages
    }

    /// True when nothing would be summarized
    pub fn is_trivial(&self) -> bool {
        self.summarize_messages == 0
    }
}
