//! Handrail puts a human in the loop of autonomous agents.
//!
//! An agent wraps its high-stakes functions in a [`FunctionGuard`]; each
//! guarded call becomes an approval request that a human resolves over
//! Slack, email, SMS, or WhatsApp before the function runs. A human can
//! also be exposed as a plain question/answer tool via [`HumanTool`].
//!
//! Two engines share one lifecycle: [`Handrail`] suspends cooperatively on
//! a tokio runtime, [`BlockingHandrail`] parks its thread. With no backend
//! configured, both degrade to a terminal prompt.
//!
//! ```no_run
//! use handrail::{Handrail, Outcome};
//! use serde_json::json;
//!
//! # async fn demo() -> handrail::Result<()> {
//! let hl = Handrail::cloud(None, None)?;
//! let guard = hl.require_approval(None, None)?;
//!
//! let outcome = guard
//!     .call("multiply", json!({"x": 2, "y": 5}), || async { 2 * 5 })
//!     .await;
//! match outcome {
//!     Outcome::Executed(product) => println!("result: {product}"),
//!     Outcome::Denied { reason } => println!("{reason}"),
//!     Outcome::Failed { error } => eprintln!("{error}"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod approval;
pub mod config;
pub mod errors;
pub mod models;
pub mod store;

pub use approval::{
    ApprovalMethod, BlockingFunctionGuard, BlockingHandrail, BlockingHumanTool, FunctionGuard,
    Handrail, HumanTool, Outcome,
};
pub use errors::{HandrailError, Result};
pub use models::{
    ApprovalDecision, CompletedFunctionCall, CompletedHumanContact, ContactChannel, EmailChannel,
    EmailRecipient, Escalation, FunctionCall, FunctionCallSpec, FunctionCallStatus, HumanContact,
    HumanContactSpec, HumanContactStatus, ResponseOption, SlackChannel, SmsChannel,
    WhatsAppChannel,
};
pub use store::{
    AgentBackend, AgentStore, BlockingAgentBackend, BlockingAgentStore, BlockingCloudBackend,
    BlockingCloudConnection, CloudBackend, CloudConnection,
};
