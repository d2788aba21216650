//! The cooperative (async) approval engine.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::approval::{self, cli, ApprovalMethod, EngineOptions, Outcome};
use crate::errors::{HandrailError, Result};
use crate::models::{
    ensure_unique_names, ApprovalDecision, CompletedFunctionCall, CompletedHumanContact,
    ContactChannel, Escalation, FunctionCall, FunctionCallSpec, FunctionCallStatus, HumanContact,
    HumanContactSpec, HumanContactStatus, ResponseOption,
};
use crate::store::{AgentBackend, CloudBackend, CloudConnection};

type ArgumentAdapter = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Builder for [`Handrail`]. Everything here is a construction-time input;
/// unset knobs fall back to environment variables and then to defaults.
#[derive(Default)]
pub struct HandrailBuilder {
    run_id: Option<String>,
    agent_name: Option<String>,
    approval_method: Option<ApprovalMethod>,
    backend: Option<Arc<dyn AgentBackend>>,
    api_key: Option<String>,
    api_base_url: Option<String>,
    contact_channel: Option<ContactChannel>,
    poll_interval: Option<Duration>,
}

impl HandrailBuilder {
    pub fn run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn agent_name(mut self, agent_name: impl Into<String>) -> Self {
        self.agent_name = Some(agent_name.into());
        self
    }

    pub fn approval_method(mut self, method: ApprovalMethod) -> Self {
        self.approval_method = Some(method);
        self
    }

    /// Use a custom store instead of the cloud backend.
    pub fn backend(mut self, backend: Arc<dyn AgentBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn api_base_url(mut self, api_base_url: impl Into<String>) -> Self {
        self.api_base_url = Some(api_base_url.into());
        self
    }

    /// Instance-level default channel, the weakest link in the resolution
    /// chain.
    pub fn contact_channel(mut self, channel: ContactChannel) -> Self {
        self.contact_channel = Some(channel);
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn build(self) -> Result<Handrail> {
        if let Some(channel) = &self.contact_channel {
            channel.validate()?;
        }

        let config = approval::resolve_engine_config(EngineOptions {
            run_id: self.run_id,
            agent_name: self.agent_name,
            approval_method: self.approval_method,
            poll_interval: self.poll_interval,
            have_backend: self.backend.is_some(),
            have_api_key: self.api_key.is_some(),
        })?;

        let backend = match config.approval_method {
            ApprovalMethod::Backend => Some(match self.backend {
                Some(backend) => backend,
                None => Arc::new(CloudBackend::new(CloudConnection::new(
                    self.api_key,
                    self.api_base_url,
                )?)) as Arc<dyn AgentBackend>,
            }),
            ApprovalMethod::Cli => None,
        };

        Ok(Handrail {
            run_id: config.run_id,
            approval_method: config.approval_method,
            backend,
            contact_channel: self.contact_channel,
            poll_interval: config.poll_interval,
        })
    }
}

/// The async approval engine. Creates requests against a backend store and
/// cooperatively suspends between poll ticks; in CLI mode it degrades to a
/// local terminal prompt with no store at all.
pub struct Handrail {
    run_id: String,
    approval_method: ApprovalMethod,
    backend: Option<Arc<dyn AgentBackend>>,
    contact_channel: Option<ContactChannel>,
    poll_interval: Duration,
}

impl Handrail {
    pub fn builder() -> HandrailBuilder {
        HandrailBuilder::default()
    }

    /// Cloud-backed engine; fails fast when no API key is resolvable.
    pub fn cloud(api_key: Option<String>, api_base_url: Option<String>) -> Result<Self> {
        let mut builder = Self::builder().approval_method(ApprovalMethod::Backend);
        if let Some(api_key) = api_key {
            builder = builder.api_key(api_key);
        }
        if let Some(api_base_url) = api_base_url {
            builder = builder.api_base_url(api_base_url);
        }
        builder.build()
    }

    /// Terminal-prompt engine, no backend.
    pub fn cli() -> Result<Self> {
        Self::builder().approval_method(ApprovalMethod::Cli).build()
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn approval_method(&self) -> ApprovalMethod {
        self.approval_method
    }

    fn backend(&self, op: &'static str) -> Result<&dyn AgentBackend> {
        self.backend
            .as_deref()
            .ok_or(HandrailError::BackendRequired(op))
    }

    /// Build a guard that intercepts a function call until a human approves
    /// it. Reject-option name collisions and channel invariants fail here,
    /// at decoration time, never at call time.
    pub fn require_approval(
        &self,
        channel: Option<ContactChannel>,
        reject_options: Option<Vec<ResponseOption>>,
    ) -> Result<FunctionGuard<'_>> {
        if let Some(options) = &reject_options {
            ensure_unique_names(options)?;
        }
        if let Some(channel) = &channel {
            channel.validate()?;
        }
        Ok(FunctionGuard {
            engine: self,
            channel,
            reject_options,
            adapter: None,
        })
    }

    /// Create an approval request and poll until it is terminal. The
    /// lower-level primitive under [`FunctionGuard::call`]: errors propagate
    /// instead of being folded into an outcome.
    pub async fn fetch_approval(
        &self,
        mut spec: FunctionCallSpec,
    ) -> Result<CompletedFunctionCall> {
        if spec.channel.is_none() {
            spec.channel = self.contact_channel.clone();
        }
        if let Some(channel) = &spec.channel {
            channel.validate()?;
        }

        let call = self.create_function_call(spec, None).await?;
        let call_id = call.call_id;
        tracing::info!(call_id = %call_id, "waiting for approval");
        loop {
            tokio::time::sleep(self.poll_interval).await;
            let call = self.get_function_call(&call_id).await?;
            if approval::function_call_resolved(&call) {
                tracing::info!(call_id = %call_id, "approval resolved");
                return Ok(CompletedFunctionCall { call });
            }
            tracing::debug!(call_id = %call_id, "approval still pending");
        }
    }

    pub async fn create_function_call(
        &self,
        spec: FunctionCallSpec,
        call_id: Option<String>,
    ) -> Result<FunctionCall> {
        let backend = self.backend("create_function_call")?;
        let call_id = call_id.unwrap_or_else(|| approval::genid("call"));
        let call = FunctionCall::new(self.run_id.clone(), call_id, spec);
        backend.functions().add(call).await
    }

    pub async fn get_function_call(&self, call_id: &str) -> Result<FunctionCall> {
        self.backend("get_function_call")?
            .functions()
            .get(call_id)
            .await
    }

    /// Responder-side write. A denial with no comment is rejected here, on
    /// the write path, so the responder sees the mistake instead of the
    /// agent hitting it later at read time.
    pub async fn respond_to_function_call(
        &self,
        call_id: &str,
        status: FunctionCallStatus,
    ) -> Result<FunctionCall> {
        if status.approved == Some(false) && status.comment.is_none() {
            return Err(HandrailError::MissingDenialComment);
        }
        self.backend("respond_to_function_call")?
            .functions()
            .respond(call_id, status)
            .await
    }

    /// Notify additional recipients about a still-pending approval. May be
    /// repeated with different recipients or channels; never changes the
    /// request's resolution state.
    pub async fn escalate_email_function_call(
        &self,
        call_id: &str,
        escalation: Escalation,
    ) -> Result<FunctionCall> {
        tracing::info!(call_id = %call_id, msg = %escalation.escalation_msg, "escalating function call");
        self.backend("escalate_email_function_call")?
            .functions()
            .escalate_email(call_id, escalation)
            .await
    }

    /// Expose a human as a question/answer tool. The tool's name and
    /// description are specialized from the resolved channel so an LLM
    /// tool-selection layer sees where the question goes.
    pub fn human_as_tool(
        &self,
        channel: Option<ContactChannel>,
        response_options: Option<Vec<ResponseOption>>,
    ) -> Result<HumanTool<'_>> {
        if let Some(options) = &response_options {
            ensure_unique_names(options)?;
        }
        if let Some(channel) = &channel {
            channel.validate()?;
        }
        let channel = approval::resolve_channel(channel, None, self.contact_channel.as_ref());
        let (name, description) = approval::tool_identity(channel.as_ref());
        Ok(HumanTool {
            engine: self,
            channel,
            response_options,
            name,
            description,
        })
    }

    /// Create a contact request and poll until a response exists.
    pub async fn fetch_human_response(
        &self,
        mut spec: HumanContactSpec,
    ) -> Result<CompletedHumanContact> {
        if spec.channel.is_none() {
            spec.channel = self.contact_channel.clone();
        }
        if let Some(channel) = &spec.channel {
            channel.validate()?;
        }

        let contact = self.create_human_contact(spec, None).await?;
        let call_id = contact.call_id;
        tracing::info!(call_id = %call_id, "waiting for human response");
        loop {
            tokio::time::sleep(self.poll_interval).await;
            let contact = self.get_human_contact(&call_id).await?;
            if approval::human_contact_resolved(&contact) {
                tracing::info!(call_id = %call_id, "human responded");
                return Ok(CompletedHumanContact { contact });
            }
            tracing::debug!(call_id = %call_id, "contact still pending");
        }
    }

    pub async fn create_human_contact(
        &self,
        spec: HumanContactSpec,
        call_id: Option<String>,
    ) -> Result<HumanContact> {
        let backend = self.backend("create_human_contact")?;
        let call_id = call_id.unwrap_or_else(|| approval::genid("human_call"));
        let contact = HumanContact::new(self.run_id.clone(), call_id, spec);
        backend.contacts().add(contact).await
    }

    pub async fn get_human_contact(&self, call_id: &str) -> Result<HumanContact> {
        self.backend("get_human_contact")?
            .contacts()
            .get(call_id)
            .await
    }

    pub async fn respond_to_human_contact(
        &self,
        call_id: &str,
        status: HumanContactStatus,
    ) -> Result<HumanContact> {
        self.backend("respond_to_human_contact")?
            .contacts()
            .respond(call_id, status)
            .await
    }

    pub async fn escalate_email_human_contact(
        &self,
        call_id: &str,
        escalation: Escalation,
    ) -> Result<HumanContact> {
        tracing::info!(call_id = %call_id, msg = %escalation.escalation_msg, "escalating human contact");
        self.backend("escalate_email_human_contact")?
            .contacts()
            .escalate_email(call_id, escalation)
            .await
    }
}

/// A guarded function: holds the channel and reject options bound at
/// decoration time, runs the full create → poll → resolve flow per call.
pub struct FunctionGuard<'hl> {
    engine: &'hl Handrail,
    channel: Option<ContactChannel>,
    reject_options: Option<Vec<ResponseOption>>,
    adapter: Option<ArgumentAdapter>,
}

impl<'hl> FunctionGuard<'hl> {
    /// Reshape raw call arguments before they become the request's kwargs.
    /// For frameworks that pass positional arguments in their own shape.
    pub fn with_argument_adapter<F>(mut self, adapter: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.adapter = Some(Arc::new(adapter));
        self
    }

    /// Run `f` only if a human approves `fn_name(kwargs)`. Denial and
    /// transport failure come back as outcome variants; this never panics or
    /// returns an error past the boundary.
    pub async fn call<F, Fut, R>(&self, fn_name: &str, kwargs: Value, f: F) -> Outcome<R>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
    {
        self.call_with_channel(None, fn_name, kwargs, f).await
    }

    /// Like [`FunctionGuard::call`] with a per-call channel override, the
    /// strongest link in the resolution chain.
    pub async fn call_with_channel<F, Fut, R>(
        &self,
        channel: Option<ContactChannel>,
        fn_name: &str,
        kwargs: Value,
        f: F,
    ) -> Outcome<R>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
    {
        let kwargs = match &self.adapter {
            Some(adapt) => adapt(kwargs),
            None => kwargs,
        };
        match self.engine.approval_method {
            ApprovalMethod::Cli => self.call_cli(fn_name, kwargs, f).await,
            ApprovalMethod::Backend => self.call_backend(channel, fn_name, kwargs, f).await,
        }
    }

    async fn call_cli<F, Fut, R>(&self, fn_name: &str, kwargs: Value, f: F) -> Outcome<R>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
    {
        let run_id = self.engine.run_id.clone();
        let fn_name_owned = fn_name.to_string();
        // stdin is blocking; keep the event loop free while we wait.
        let prompt = tokio::task::spawn_blocking(move || {
            cli::prompt_approval(
                std::io::stdin().lock(),
                std::io::stdout(),
                &run_id,
                &fn_name_owned,
                &kwargs,
            )
        })
        .await;

        match prompt {
            Ok(Ok(None)) => Outcome::Executed(f().await),
            Ok(Ok(Some(feedback))) => Outcome::Denied {
                reason: format!("User denied {fn_name} with feedback: {feedback}"),
            },
            Ok(Err(e)) => Outcome::Failed {
                error: format!("error reading approval input for {fn_name}: {e}"),
            },
            Err(e) => Outcome::Failed {
                error: format!("approval prompt task failed for {fn_name}: {e}"),
            },
        }
    }

    async fn call_backend<F, Fut, R>(
        &self,
        per_call: Option<ContactChannel>,
        fn_name: &str,
        kwargs: Value,
        f: F,
    ) -> Outcome<R>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
    {
        let channel = approval::resolve_channel(
            per_call,
            self.channel.as_ref(),
            self.engine.contact_channel.as_ref(),
        );
        let mut spec = FunctionCallSpec::new(fn_name, kwargs);
        spec.channel = channel.clone();
        spec.reject_options = self.reject_options.clone();

        match self.engine.fetch_approval(spec).await {
            Ok(completed) => {
                // prefer the channel echoed back by the backend
                let effective = completed.call.spec.channel.clone().or(channel);
                match completed.as_completed() {
                    Ok(ApprovalDecision::Approved { .. }) => {
                        tracing::info!(func = fn_name, "human approved");
                        Outcome::Executed(f().await)
                    }
                    Ok(ApprovalDecision::Rejected { comment, .. }) => {
                        tracing::info!(func = fn_name, comment = %comment, "human denied");
                        Outcome::Denied {
                            reason: approval::denial_message(fn_name, effective.as_ref(), &comment),
                        }
                    }
                    Err(e) => Outcome::Failed {
                        error: format!("error fetching approval for {fn_name}: {e}"),
                    },
                }
            }
            Err(e) => Outcome::Failed {
                error: format!("error fetching approval for {fn_name}: {e}"),
            },
        }
    }
}

/// A human exposed as a question/answer tool.
pub struct HumanTool<'hl> {
    engine: &'hl Handrail,
    channel: Option<ContactChannel>,
    response_options: Option<Vec<ResponseOption>>,
    name: String,
    description: String,
}

impl HumanTool<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Ask the human and wait for their answer.
    pub async fn ask(&self, message: &str) -> Result<String> {
        self.ask_with_subject(message, None).await
    }

    pub async fn ask_with_subject(&self, message: &str, subject: Option<&str>) -> Result<String> {
        match self.engine.approval_method {
            ApprovalMethod::Cli => {
                let run_id = self.engine.run_id.clone();
                let message = message.to_string();
                let reply = tokio::task::spawn_blocking(move || {
                    cli::prompt_contact(
                        std::io::stdin().lock(),
                        std::io::stdout(),
                        &run_id,
                        &message,
                    )
                })
                .await
                .map_err(|e| {
                    HandrailError::Io(std::io::Error::new(std::io::ErrorKind::Other, e))
                })??;
                Ok(reply)
            }
            ApprovalMethod::Backend => {
                let mut spec = HumanContactSpec::new(message);
                spec.subject = subject.map(str::to_string);
                spec.channel = self.channel.clone();
                spec.response_options = self.response_options.clone();
                let completed = self.engine.fetch_human_response(spec).await?;
                completed.as_completed()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SlackChannel;

    #[test]
    fn cli_engine_builds_without_credentials() {
        let engine = Handrail::builder()
            .approval_method(ApprovalMethod::Cli)
            .run_id("test-run")
            .build()
            .unwrap();
        assert_eq!(engine.approval_method(), ApprovalMethod::Cli);
        assert_eq!(engine.run_id(), "test-run");
    }

    #[test]
    fn duplicate_reject_options_fail_at_decoration_time() {
        let engine = Handrail::cli().unwrap();
        let result = engine.require_approval(
            None,
            Some(vec![
                ResponseOption::new("defer"),
                ResponseOption::new("defer"),
            ]),
        );
        assert!(matches!(
            result,
            Err(HandrailError::DuplicateOptionName(_))
        ));
    }

    #[test]
    fn invalid_channel_fails_at_decoration_time() {
        let engine = Handrail::cli().unwrap();
        let channel =
            ContactChannel::slack(SlackChannel::new("C1").with_allowed_responders(vec![]));
        assert!(matches!(
            engine.require_approval(Some(channel), None),
            Err(HandrailError::Config(_))
        ));
    }

    #[test]
    fn tool_identity_uses_instance_default_channel() {
        let engine = Handrail::builder()
            .approval_method(ApprovalMethod::Cli)
            .run_id("r")
            .contact_channel(ContactChannel::slack(
                SlackChannel::new("C1").with_context("the ops channel"),
            ))
            .build()
            .unwrap();
        let tool = engine.human_as_tool(None, None).unwrap();
        assert_eq!(tool.name(), "contact_human_in_slack_in_the_ops_channel");
        assert!(tool.description().contains("the ops channel"));
    }

    #[test]
    fn tool_bound_channel_beats_instance_default() {
        let engine = Handrail::builder()
            .approval_method(ApprovalMethod::Cli)
            .run_id("r")
            .contact_channel(ContactChannel::slack(
                SlackChannel::new("C1").with_context("the ops channel"),
            ))
            .build()
            .unwrap();
        let bound = ContactChannel::slack(SlackChannel::new("U9").with_context("a DM with the CEO"));
        let tool = engine.human_as_tool(Some(bound), None).unwrap();
        assert_eq!(tool.name(), "contact_human_in_slack_in_a_dm_with_the_ceo");
    }

    #[tokio::test]
    async fn low_level_ops_require_a_backend() {
        let engine = Handrail::cli().unwrap();
        let result = engine
            .create_function_call(FunctionCallSpec::new("f", serde_json::json!({})), None)
            .await;
        assert!(matches!(result, Err(HandrailError::BackendRequired(_))));
    }
}
