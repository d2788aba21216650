//! Contact channels: where a request is routed for human attention.
//!
//! A [`ContactChannel`] carries at most one meaningful delivery mechanism.
//! Channel resolution treats a missing channel as "no explicit choice", in
//! which case the backend's own default routing applies.

use serde::{Deserialize, Serialize};

use crate::errors::{HandrailError, Result};

/// Slack delivery: a channel or DM, optionally restricted to named responders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlackChannel {
    /// Slack channel or user id the request is posted to.
    pub channel_or_user_id: String,
    /// Human-readable context, e.g. "the finance channel" or
    /// "a DM with the CEO". Embedded in denial messages and generated tool
    /// names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_about_channel_or_user: Option<String>,
    /// Override bot token; the backend's configured token is used when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,
    /// If present, only these Slack user ids may respond. An empty list is a
    /// validation error: it would make the request unanswerable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_responder_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental_slack_blocks: Option<bool>,
}

impl SlackChannel {
    pub fn new(channel_or_user_id: impl Into<String>) -> Self {
        Self {
            channel_or_user_id: channel_or_user_id.into(),
            context_about_channel_or_user: None,
            bot_token: None,
            allowed_responder_ids: None,
            experimental_slack_blocks: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context_about_channel_or_user = Some(context.into());
        self
    }

    pub fn with_allowed_responders(mut self, ids: Vec<String>) -> Self {
        self.allowed_responder_ids = Some(ids);
        self
    }
}

/// SMS delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmsChannel {
    pub phone_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_about_user: Option<String>,
}

/// WhatsApp delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhatsAppChannel {
    pub phone_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_about_user: Option<String>,
}

/// Email delivery, with optional reply-threading fields so an approval can
/// continue an existing thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailChannel {
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_about_user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental_subject_line: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental_in_reply_to_message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental_references_message_id: Option<String>,
}

impl EmailChannel {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            context_about_user: None,
            experimental_subject_line: None,
            experimental_in_reply_to_message_id: None,
            experimental_references_message_id: None,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.experimental_subject_line = Some(subject.into());
        self
    }
}

/// A tagged union of delivery mechanisms. At most one field is meaningfully
/// populated; constructors below set exactly one.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContactChannel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slack: Option<SlackChannel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sms: Option<SmsChannel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whatsapp: Option<WhatsAppChannel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<EmailChannel>,
}

impl ContactChannel {
    pub fn slack(slack: SlackChannel) -> Self {
        Self {
            slack: Some(slack),
            ..Self::default()
        }
    }

    pub fn sms(sms: SmsChannel) -> Self {
        Self {
            sms: Some(sms),
            ..Self::default()
        }
    }

    pub fn whatsapp(whatsapp: WhatsAppChannel) -> Self {
        Self {
            whatsapp: Some(whatsapp),
            ..Self::default()
        }
    }

    pub fn email(email: EmailChannel) -> Self {
        Self {
            email: Some(email),
            ..Self::default()
        }
    }

    /// Enforce channel invariants. Called wherever a channel enters the
    /// engine: guard construction, tool construction, and request creation.
    pub fn validate(&self) -> Result<()> {
        if let Some(slack) = &self.slack {
            if let Some(ids) = &slack.allowed_responder_ids {
                if ids.is_empty() {
                    return Err(HandrailError::Config(
                        "slack.allowed_responder_ids must not be empty".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// The human-context string for this channel, used in denial messages
    /// ("User in {context} denied ...") and generated tool descriptions.
    pub fn context_label(&self) -> Option<&str> {
        if let Some(slack) = &self.slack {
            return slack.context_about_channel_or_user.as_deref();
        }
        if let Some(email) = &self.email {
            return email.context_about_user.as_deref();
        }
        if let Some(sms) = &self.sms {
            return sms.context_about_user.as_deref();
        }
        if let Some(whatsapp) = &self.whatsapp {
            return whatsapp.context_about_user.as_deref();
        }
        None
    }
}
