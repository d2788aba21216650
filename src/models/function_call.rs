//! Approval requests: a pending ask for a human to allow or deny a specific
//! function invocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{HandrailError, Result};
use crate::models::channel::ContactChannel;
use crate::models::ResponseOption;

/// The immutable description of what is being requested. Never mutated after
/// creation; the backend may fill in server-computed fields on `add`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCallSpec {
    /// Name of the guarded function.
    #[serde(rename = "fn")]
    pub fn_name: String,
    /// Keyword arguments the agent wants to call the function with, shown to
    /// the approver verbatim.
    pub kwargs: serde_json::Value,
    /// Target channel; `None` defers to wrapper/instance/backend defaults.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<ContactChannel>,
    /// Pre-canned denial choices offered to the approver.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reject_options: Option<Vec<ResponseOption>>,
    /// Opaque caller state, echoed back on fetch. Useful for resuming a
    /// conversation thread after a webhook round-trip.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<serde_json::Value>,
}

impl FunctionCallSpec {
    pub fn new(fn_name: impl Into<String>, kwargs: serde_json::Value) -> Self {
        Self {
            fn_name: fn_name.into(),
            kwargs,
            channel: None,
            reject_options: None,
            state: None,
        }
    }

    pub fn with_channel(mut self, channel: ContactChannel) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn with_reject_options(mut self, options: Vec<ResponseOption>) -> Self {
        self.reject_options = Some(options);
        self
    }

    pub fn with_state(mut self, state: serde_json::Value) -> Self {
        self.state = Some(state);
        self
    }
}

/// The mutable resolution of an approval request. All resolution fields are
/// `None` while the request is pending.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<DateTime<Utc>>,
    /// `None` = pending, `Some(true)` = approved, `Some(false)` = denied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Name of the reject option the approver picked, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reject_option_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slack_message_ts: Option<String>,
}

impl FunctionCallStatus {
    pub fn approved(comment: Option<String>) -> Self {
        Self {
            responded_at: Some(Utc::now()),
            approved: Some(true),
            comment,
            ..Self::default()
        }
    }

    pub fn rejected(comment: impl Into<String>) -> Self {
        Self {
            responded_at: Some(Utc::now()),
            approved: Some(false),
            comment: Some(comment.into()),
            ..Self::default()
        }
    }

    /// Convert the ambiguous `approved: Option<bool>` representation into a
    /// decision sum type.
    ///
    /// Errors if the status is still pending, or if it records a denial with
    /// no comment — a denial without a reason is invalid.
    pub fn as_completed(&self) -> Result<ApprovalDecision> {
        match self.approved {
            None => Err(HandrailError::StillPending(
                "function call has no approval decision yet".into(),
            )),
            Some(true) => Ok(ApprovalDecision::Approved {
                comment: self.comment.clone(),
            }),
            Some(false) => {
                let comment = self
                    .comment
                    .clone()
                    .ok_or(HandrailError::MissingDenialComment)?;
                Ok(ApprovalDecision::Rejected {
                    comment,
                    reject_option_name: self.reject_option_name.clone(),
                })
            }
        }
    }
}

/// Terminal view of an approval, with the "denial needs a comment" invariant
/// already enforced.
#[derive(Debug, Clone, PartialEq)]
pub enum ApprovalDecision {
    Approved {
        comment: Option<String>,
    },
    Rejected {
        comment: String,
        reject_option_name: Option<String>,
    },
}

impl ApprovalDecision {
    pub fn is_approved(&self) -> bool {
        matches!(self, ApprovalDecision::Approved { .. })
    }
}

/// A pending (or resolved) approval request, identified by
/// `(run_id, call_id)`. Owns exactly one immutable spec and at most one
/// status. Resolution happens exactly once, by the external approver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub run_id: String,
    pub call_id: String,
    pub spec: FunctionCallSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<FunctionCallStatus>,
}

impl FunctionCall {
    pub fn new(
        run_id: impl Into<String>,
        call_id: impl Into<String>,
        spec: FunctionCallSpec,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            call_id: call_id.into(),
            spec,
            status: None,
        }
    }

    /// Terminal decision for this call. Errors while the call is pending.
    pub fn as_completed(&self) -> Result<ApprovalDecision> {
        match &self.status {
            None => Err(HandrailError::StillPending(format!(
                "function call {} has no status yet",
                self.call_id
            ))),
            Some(status) => status.as_completed(),
        }
    }
}

/// Envelope around a call the engine has observed as terminal.
#[derive(Debug, Clone)]
pub struct CompletedFunctionCall {
    pub call: FunctionCall,
}

impl CompletedFunctionCall {
    pub fn as_completed(&self) -> Result<ApprovalDecision> {
        self.call.as_completed()
    }
}
