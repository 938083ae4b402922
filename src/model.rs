use crate::error::TurnError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// The conversation sent in full on every turn.
///
/// Messages are only ever appended; callers get shared slices back, so
/// nothing already in the transcript can be edited or reordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt)],
        }
    }

    pub fn append(&mut self, role: MessageRole, content: impl Into<String>) {
        self.messages.push(Message::new(role, content));
    }

    pub fn snapshot(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// True when the tail is a user message that never got a reply, which is
    /// what a failed or cancelled turn leaves behind.
    pub fn has_dangling_user(&self) -> bool {
        self.last()
            .is_some_and(|msg| msg.role == MessageRole::User)
    }

    pub fn check_consistency(&self) -> Result<(), TurnError> {
        match self.messages.first() {
            Some(first) if first.role == MessageRole::System => {}
            Some(first) => {
                return Err(TurnError::TranscriptInconsistency(format!(
                    "expected a leading system message, found '{}'",
                    first.role.as_str()
                )));
            }
            None => {
                return Err(TurnError::TranscriptInconsistency(
                    "transcript has no system message".to_string(),
                ));
            }
        }

        if let Some(idx) = self.messages[1..]
            .iter()
            .position(|msg| msg.role == MessageRole::System)
        {
            return Err(TurnError::TranscriptInconsistency(format!(
                "unexpected system message at position {}",
                idx + 1
            )));
        }

        Ok(())
    }
}
