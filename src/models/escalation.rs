//! Escalations: notifying a broader audience about a still-pending request.
//!
//! An escalation is a side notification, not a state transition — it never
//! changes the request's identity or resolution, and a request may be
//! escalated any number of times while it remains pending.

use serde::{Deserialize, Serialize};

use crate::models::channel::ContactChannel;

/// An additional email recipient, with the header field it lands in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailRecipient {
    pub address: String,
    /// Routing field: "to" or "cc".
    pub field: String,
}

impl EmailRecipient {
    pub fn to(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            field: "to".into(),
        }
    }

    pub fn cc(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            field: "cc".into(),
        }
    }
}

/// Hands an unresolved request to a broader audience.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Escalation {
    /// Why the request is being escalated, shown to the new recipients.
    pub escalation_msg: String,
    /// Extra recipients added to the original channel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_recipients: Option<Vec<EmailRecipient>>,
    /// Full channel override: route the escalation somewhere else entirely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<ContactChannel>,
}

impl Escalation {
    pub fn new(escalation_msg: impl Into<String>) -> Self {
        Self {
            escalation_msg: escalation_msg.into(),
            additional_recipients: None,
            channel: None,
        }
    }

    pub fn with_additional_recipients(mut self, recipients: Vec<EmailRecipient>) -> Self {
        self.additional_recipients = Some(recipients);
        self
    }

    pub fn with_channel(mut self, channel: ContactChannel) -> Self {
        self.channel = Some(channel);
        self
    }
}
