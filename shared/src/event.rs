use serde::{Deserialize, Serialize};

/// User facing outcome of an operation, delivered through the `Notifier`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notice {
    Success { message: String },
    OperationFailed { message: String },
    /// The session is missing or was rejected. The host has already been
    /// asked to show the login screen.
    AuthenticationRequired { login_url: String },
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self::Success {
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::OperationFailed {
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::OperationFailed { .. } => "operation_failed",
            Self::AuthenticationRequired { .. } => "authentication_required",
        }
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        !matches!(self, Self::Success { .. })
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success { message } | Self::OperationFailed { message } => Some(message),
            Self::AuthenticationRequired { .. } => None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PromptTone {
    #[default]
    Neutral,
    Destructive,
}

/// Text of a confirmation dialog shown before a destructive change.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ConfirmPrompt {
    pub title: String,
    pub message: String,
    pub confirm_label: String,
    pub tone: PromptTone,
}

impl ConfirmPrompt {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            confirm_label: "Confirm".into(),
            tone: PromptTone::Neutral,
        }
    }

    pub fn delete(noun: &str, label: &str) -> Self {
        Self {
            title: format!("Delete {noun}?"),
            message: format!("\"{label}\" will be permanently removed."),
            confirm_label: "Delete".into(),
            tone: PromptTone::Destructive,
        }
    }

    #[must_use]
    pub fn with_confirm_label(mut self, label: impl Into<String>) -> Self {
        self.confirm_label = label.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_serialization_is_tagged() {
        let json = serde_json::to_value(Notice::success("Saved")).unwrap();
        assert_eq!(json["type"], "success");
        assert_eq!(json["message"], "Saved");
    }

    #[test]
    fn test_notice_helpers() {
        let notice = Notice::AuthenticationRequired {
            login_url: "/login".into(),
        };
        assert!(notice.is_error());
        assert_eq!(notice.message(), None);
        assert_eq!(notice.name(), "authentication_required");
        assert!(!Notice::success("ok").is_error());
    }

    #[test]
    fn test_delete_prompt() {
        let prompt = ConfirmPrompt::delete("FAQ", "How do I book?");
        assert_eq!(prompt.title, "Delete FAQ?");
        assert_eq!(prompt.tone, PromptTone::Destructive);
        assert_eq!(prompt.confirm_label, "Delete");
    }
}
