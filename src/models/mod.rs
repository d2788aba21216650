//! Request records exchanged with the approval backend.

pub mod channel;
pub mod escalation;
pub mod function_call;
pub mod human_contact;

use serde::{Deserialize, Serialize};

use crate::errors::{HandrailError, Result};

pub use channel::{ContactChannel, EmailChannel, SlackChannel, SmsChannel, WhatsAppChannel};
pub use escalation::{EmailRecipient, Escalation};
pub use function_call::{
    ApprovalDecision, CompletedFunctionCall, FunctionCall, FunctionCallSpec, FunctionCallStatus,
};
pub use human_contact::{
    CompletedHumanContact, HumanContact, HumanContactSpec, HumanContactStatus,
};

/// A named, pre-canned choice a human can pick when resolving a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseOption {
    /// Unique within any one list of options.
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Text pre-filled into the responder's comment box when picked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_fill: Option<String>,
}

impl ResponseOption {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            description: None,
            prompt_fill: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_prompt_fill(mut self, prompt_fill: impl Into<String>) -> Self {
        self.prompt_fill = Some(prompt_fill.into());
        self
    }
}

/// Reject a list of options whose names collide. Called at guard/tool
/// construction time, never deferred to call time.
pub fn ensure_unique_names(options: &[ResponseOption]) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for option in options {
        if !seen.insert(option.name.as_str()) {
            return Err(HandrailError::DuplicateOptionName(option.name.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_names_are_a_hard_error() {
        let options = vec![
            ResponseOption::new("defer"),
            ResponseOption::new("retry"),
            ResponseOption::new("defer"),
        ];
        match ensure_unique_names(&options) {
            Err(HandrailError::DuplicateOptionName(name)) => assert_eq!(name, "defer"),
            other => panic!("expected duplicate-name error, got {other:?}"),
        }
    }

    #[test]
    fn unique_names_pass() {
        let options = vec![ResponseOption::new("defer"), ResponseOption::new("retry")];
        assert!(ensure_unique_names(&options).is_ok());
    }

    #[test]
    fn empty_list_passes() {
        assert!(ensure_unique_names(&[]).is_ok());
    }
}
