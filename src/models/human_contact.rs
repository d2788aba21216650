//! Contact requests: a pending ask for free-text human input.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{HandrailError, Result};
use crate::models::channel::ContactChannel;
use crate::models::ResponseOption;

/// The immutable description of a human-contact request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanContactSpec {
    /// The question or message for the human.
    pub msg: String,
    /// Subject line, meaningful for email channels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<ContactChannel>,
    /// Pre-canned responses the human may pick from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_options: Option<Vec<ResponseOption>>,
    /// Opaque caller state, echoed back on fetch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<serde_json::Value>,
}

impl HumanContactSpec {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            subject: None,
            channel: None,
            response_options: None,
            state: None,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_channel(mut self, channel: ContactChannel) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn with_response_options(mut self, options: Vec<ResponseOption>) -> Self {
        self.response_options = Some(options);
        self
    }
}

/// The mutable resolution of a contact request. `response` is `None` while
/// pending.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HumanContactStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    /// Name of the response option the human picked, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_option_name: Option<String>,
}

impl HumanContactStatus {
    pub fn responded(response: impl Into<String>) -> Self {
        Self {
            responded_at: Some(Utc::now()),
            response: Some(response.into()),
            ..Self::default()
        }
    }

    /// The terminal response. Errors while pending.
    pub fn as_completed(&self) -> Result<String> {
        self.response.clone().ok_or_else(|| {
            HandrailError::StillPending("human contact has no response yet".into())
        })
    }
}

/// A pending (or resolved) contact request, identified by `(run_id, call_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanContact {
    pub run_id: String,
    pub call_id: String,
    pub spec: HumanContactSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<HumanContactStatus>,
}

impl HumanContact {
    pub fn new(
        run_id: impl Into<String>,
        call_id: impl Into<String>,
        spec: HumanContactSpec,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            call_id: call_id.into(),
            spec,
            status: None,
        }
    }

    pub fn as_completed(&self) -> Result<String> {
        match &self.status {
            None => Err(HandrailError::StillPending(format!(
                "human contact {} has no status yet",
                self.call_id
            ))),
            Some(status) => status.as_completed(),
        }
    }
}

/// Envelope around a contact the engine has observed as terminal.
#[derive(Debug, Clone)]
pub struct CompletedHumanContact {
    pub contact: HumanContact,
}

impl CompletedHumanContact {
    pub fn as_completed(&self) -> Result<String> {
        self.contact.as_completed()
    }
}
