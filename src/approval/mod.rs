//! The approval engine: the state machine taking a request from creation
//! through polling to terminal resolution.
//!
//! Two engine variants share everything in this module — [`Handrail`] suspends
//! cooperatively on `tokio::time::sleep`, [`BlockingHandrail`] sleeps the
//! calling thread. The poll-step predicates, channel resolution, id
//! generation, and message formatting live here so the two cannot drift.

pub mod blocking;
pub mod cli;
pub mod engine;

use std::str::FromStr;
use std::time::Duration;

use uuid::Uuid;

use crate::config;
use crate::errors::{HandrailError, Result};
use crate::models::{ContactChannel, FunctionCall, HumanContact};

pub use blocking::{BlockingFunctionGuard, BlockingHandrail, BlockingHumanTool};
pub use engine::{FunctionGuard, Handrail, HumanTool};

pub(crate) const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// How approvals are obtained: a local terminal prompt, or the backend store
/// plus a human responder somewhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalMethod {
    Cli,
    Backend,
}

impl FromStr for ApprovalMethod {
    type Err = HandrailError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cli" => Ok(ApprovalMethod::Cli),
            "backend" => Ok(ApprovalMethod::Backend),
            other => Err(HandrailError::Config(format!(
                "unknown approval method {other:?}, expected \"cli\" or \"backend\""
            ))),
        }
    }
}

/// Result of a guarded call.
///
/// Denial and transport failure are plain values, not errors: many agent
/// frameworks cannot propagate exceptions through their tool loop, so the
/// guarded call never raises past this boundary. The string collapse those
/// frameworks want lives in [`Outcome::into_tool_message`] — an adapter, not
/// part of the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<R> {
    /// Approved: the function ran and returned this value.
    Executed(R),
    /// Denied: the function was never invoked. The reason embeds the
    /// channel's human context and the denial comment.
    Denied { reason: String },
    /// The store or transport failed somewhere between creation and
    /// resolution.
    Failed { error: String },
}

impl<R> Outcome<R> {
    pub fn is_executed(&self) -> bool {
        matches!(self, Outcome::Executed(_))
    }

    pub fn executed(self) -> Option<R> {
        match self {
            Outcome::Executed(value) => Some(value),
            _ => None,
        }
    }

    pub fn denial_reason(&self) -> Option<&str> {
        match self {
            Outcome::Denied { reason } => Some(reason),
            _ => None,
        }
    }

    /// Typed adapter: `Err` carries the denial reason or failure text.
    pub fn into_result(self) -> std::result::Result<R, String> {
        match self {
            Outcome::Executed(value) => Ok(value),
            Outcome::Denied { reason } => Err(reason),
            Outcome::Failed { error } => Err(error),
        }
    }
}

impl<R: std::fmt::Display> Outcome<R> {
    /// Collapse into the single string loosely-typed tool frameworks expect
    /// in place of a raised error.
    pub fn into_tool_message(self) -> String {
        match self {
            Outcome::Executed(value) => value.to_string(),
            Outcome::Denied { reason } => reason,
            Outcome::Failed { error } => error,
        }
    }
}

/// `{prefix}-{8 hex chars}`, unique enough for request ids.
pub(crate) fn genid(prefix: &str) -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", &uuid[..8])
}

/// Lowercased identifier-safe form of free text, for generated tool names.
pub(crate) fn slug(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_sep = true;
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            prev_sep = false;
        } else if !prev_sep {
            out.push('_');
            prev_sep = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// Channel precedence, applied uniformly at every call site:
/// per-call explicit > wrapper-bound > instance default > none.
pub(crate) fn resolve_channel(
    per_call: Option<ContactChannel>,
    bound: Option<&ContactChannel>,
    instance: Option<&ContactChannel>,
) -> Option<ContactChannel> {
    per_call
        .or_else(|| bound.cloned())
        .or_else(|| instance.cloned())
}

/// Poll step for approvals: terminal once `approved` is set either way.
pub(crate) fn function_call_resolved(call: &FunctionCall) -> bool {
    matches!(&call.status, Some(status) if status.approved.is_some())
}

/// Poll step for contacts: terminal once a response exists.
pub(crate) fn human_contact_resolved(contact: &HumanContact) -> bool {
    matches!(&contact.status, Some(status) if status.response.is_some())
}

/// Human-readable denial string for the guarded-call boundary.
pub(crate) fn denial_message(
    fn_name: &str,
    channel: Option<&ContactChannel>,
    comment: &str,
) -> String {
    match channel.and_then(ContactChannel::context_label) {
        Some(context) => format!("User in {context} denied {fn_name} with message: {comment}"),
        None => format!("User denied {fn_name} with message: {comment}"),
    }
}

/// Generated `(name, description)` for a human-as-tool callable, specialized
/// on the resolved channel so an LLM tool-selection layer sees a
/// self-descriptive tool.
pub(crate) fn tool_identity(channel: Option<&ContactChannel>) -> (String, String) {
    let Some(channel) = channel else {
        return (
            "contact_human".into(),
            "Contact a human and wait for a response".into(),
        );
    };

    if let Some(slack) = &channel.slack {
        let mut name = "contact_human_in_slack".to_string();
        let mut description = "Contact a human via slack and wait for a response".to_string();
        if let Some(context) = &slack.context_about_channel_or_user {
            name = format!("contact_human_in_slack_in_{}", slug(context));
            description = format!("{description} in {context}");
        }
        return (name, description);
    }
    if let Some(email) = &channel.email {
        return (
            format!("contact_human_via_email_{}", slug(&email.address)),
            "Contact a human via email and wait for a response".into(),
        );
    }
    if channel.sms.is_some() {
        return (
            "contact_human_via_sms".into(),
            "Contact a human via sms and wait for a response".into(),
        );
    }
    if channel.whatsapp.is_some() {
        return (
            "contact_human_via_whatsapp".into(),
            "Contact a human via whatsapp and wait for a response".into(),
        );
    }
    (
        "contact_human".into(),
        "Contact a human and wait for a response".into(),
    )
}

/// Construction-time knobs shared by both engine builders.
pub(crate) struct EngineOptions {
    pub run_id: Option<String>,
    pub agent_name: Option<String>,
    pub approval_method: Option<ApprovalMethod>,
    pub poll_interval: Option<Duration>,
    pub have_backend: bool,
    pub have_api_key: bool,
}

pub(crate) struct EngineConfig {
    pub run_id: String,
    pub approval_method: ApprovalMethod,
    pub poll_interval: Duration,
}

/// Resolve approval method, run id, and poll interval. Precedence for the
/// method: explicit > env override > inferred from whether a backend or API
/// key is available. Run id: explicit > env > generated from the agent name.
pub(crate) fn resolve_engine_config(opts: EngineOptions) -> Result<EngineConfig> {
    config::bootstrap_env();

    let approval_method = match opts.approval_method {
        Some(method) => method,
        None => match config::approval_method_from_env() {
            Some(raw) => raw.parse()?,
            None => {
                if opts.have_backend || opts.have_api_key || config::api_key_from_env().is_some() {
                    ApprovalMethod::Backend
                } else {
                    tracing::info!(
                        "no {} found, defaulting to CLI approvals",
                        config::API_KEY_ENV
                    );
                    ApprovalMethod::Cli
                }
            }
        },
    };

    let agent_name = opts.agent_name.as_deref().unwrap_or("agent");
    let run_id = opts
        .run_id
        .or_else(config::run_id_from_env)
        .unwrap_or_else(|| genid(&slug(agent_name)));

    Ok(EngineConfig {
        run_id,
        approval_method,
        poll_interval: opts.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL),
    })
}
