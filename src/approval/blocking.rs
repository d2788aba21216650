//! Blocking mirror of the async engine. Same lifecycle, same resolution
//! rules, same denial strings; only the suspend primitive differs.

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
use crate::store::{BlockingAgentBackend, BlockingCloudBackend, BlockingCloudConnection};

type ArgumentAdapter = Arc<dyn Fn(Value) -> Value + Send + Sync>;

#[derive(Default)]
pub struct BlockingHandrailBuilder {
    run_id: Option<String>,
    agent_name: Option<String>,
    approval_method: Option<ApprovalMethod>,
    backend: Option<Arc<dyn BlockingAgentBackend>>,
    api_key: Option<String>,
    api_base_url: Option<String>,
    contact_channel: Option<ContactChannel>,
    poll_interval: Option<Duration>,
}

impl BlockingHandrailBuilder {
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

    pub fn backend(mut self, backend: Arc<dyn BlockingAgentBackend>) -> Self {
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

    pub fn contact_channel(mut self, channel: ContactChannel) -> Self {
        self.contact_channel = Some(channel);
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn build(self) -> Result<BlockingHandrail> {
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
                None => Arc::new(BlockingCloudBackend::new(BlockingCloudConnection::new(
                    self.api_key,
                    self.api_base_url,
                )?)) as Arc<dyn BlockingAgentBackend>,
            }),
            ApprovalMethod::Cli => None,
        };

        Ok(BlockingHandrail {
            run_id: config.run_id,
            approval_method: config.approval_method,
            backend,
            contact_channel: self.contact_channel,
            poll_interval: config.poll_interval,
        })
    }
}

/// Thread-blocking approval engine for programs without an async runtime.
pub struct BlockingHandrail {
    run_id: String,
    approval_method: ApprovalMethod,
    backend: Option<Arc<dyn BlockingAgentBackend>>,
    contact_channel: Option<ContactChannel>,
    poll_interval: Duration,
}

impl BlockingHandrail {
    pub fn builder() -> BlockingHandrailBuilder {
        BlockingHandrailBuilder::default()
    }

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

    pub fn cli() -> Result<Self> {
        Self::builder().approval_method(ApprovalMethod::Cli).build()
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn approval_method(&self) -> ApprovalMethod {
        self.approval_method
    }

    fn backend(&self, op: &'static str) -> Result<&dyn BlockingAgentBackend> {
        self.backend
            .as_deref()
            .ok_or(HandrailError::BackendRequired(op))
    }

    pub fn require_approval(
        &self,
        channel: Option<ContactChannel>,
        reject_options: Option<Vec<ResponseOption>>,
    ) -> Result<BlockingFunctionGuard<'_>> {
        if let Some(options) = &reject_options {
            ensure_unique_names(options)?;
        }
        if let Some(channel) = &channel {
            channel.validate()?;
        }
        Ok(BlockingFunctionGuard {
            engine: self,
            channel,
            reject_options,
            adapter: None,
        })
    }

    pub fn fetch_approval(&self, mut spec: FunctionCallSpec) -> Result<CompletedFunctionCall> {
        if spec.channel.is_none() {
            spec.channel = self.contact_channel.clone();
        }
        if let Some(channel) = &spec.channel {
            channel.validate()?;
        }

        let call = self.create_function_call(spec, None)?;
        let call_id = call.call_id;
        tracing::info!(call_id = %call_id, "waiting for approval");
        loop {
            std::thread::sleep(self.poll_interval);
            let call = self.get_function_call(&call_id)?;
            if approval::function_call_resolved(&call) {
                tracing::info!(call_id = %call_id, "approval resolved");
                return Ok(CompletedFunctionCall { call });
            }
            tracing::debug!(call_id = %call_id, "approval still pending");
        }
    }

    pub fn create_function_call(
        &self,
        spec: FunctionCallSpec,
        call_id: Option<String>,
    ) -> Result<FunctionCall> {
        let backend = self.backend("create_function_call")?;
        let call_id = call_id.unwrap_or_else(|| approval::genid("call"));
        let call = FunctionCall::new(self.run_id.clone(), call_id, spec);
        backend.functions().add(call)
    }

    pub fn get_function_call(&self, call_id: &str) -> Result<FunctionCall> {
        self.backend("get_function_call")?.functions().get(call_id)
    }

    pub fn respond_to_function_call(
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
    }

    pub fn escalate_email_function_call(
        &self,
        call_id: &str,
        escalation: Escalation,
    ) -> Result<FunctionCall> {
        tracing::info!(call_id = %call_id, msg = %escalation.escalation_msg, "escalating function call");
        self.backend("escalate_email_function_call")?
            .functions()
            .escalate_email(call_id, escalation)
    }

    pub fn human_as_tool(
        &self,
        channel: Option<ContactChannel>,
        response_options: Option<Vec<ResponseOption>>,
    ) -> Result<BlockingHumanTool<'_>> {
        if let Some(options) = &response_options {
            ensure_unique_names(options)?;
        }
        if let Some(channel) = &channel {
            channel.validate()?;
        }
        let channel = approval::resolve_channel(channel, None, self.contact_channel.as_ref());
        let (name, description) = approval::tool_identity(channel.as_ref());
        Ok(BlockingHumanTool {
            engine: self,
            channel,
            response_options,
            name,
            description,
        })
    }

    pub fn fetch_human_response(&self, mut spec: HumanContactSpec) -> Result<CompletedHumanContact> {
        if spec.channel.is_none() {
            spec.channel = self.contact_channel.clone();
        }
        if let Some(channel) = &spec.channel {
            channel.validate()?;
        }

        let contact = self.create_human_contact(spec, None)?;
        let call_id = contact.call_id;
        tracing::info!(call_id = %call_id, "waiting for human response");
        loop {
            std::thread::sleep(self.poll_interval);
            let contact = self.get_human_contact(&call_id)?;
            if approval::human_contact_resolved(&contact) {
                tracing::info!(call_id = %call_id, "human responded");
                return Ok(CompletedHumanContact { contact });
            }
            tracing::debug!(call_id = %call_id, "contact still pending");
        }
    }

    pub fn create_human_contact(
        &self,
        spec: HumanContactSpec,
        call_id: Option<String>,
    ) -> Result<HumanContact> {
        let backend = self.backend("create_human_contact")?;
        let call_id = call_id.unwrap_or_else(|| approval::genid("human_call"));
        let contact = HumanContact::new(self.run_id.clone(), call_id, spec);
        backend.contacts().add(contact)
    }

    pub fn get_human_contact(&self, call_id: &str) -> Result<HumanContact> {
        self.backend("get_human_contact")?.contacts().get(call_id)
    }

    pub fn respond_to_human_contact(
        &self,
        call_id: &str,
        status: HumanContactStatus,
    ) -> Result<HumanContact> {
        self.backend("respond_to_human_contact")?
            .contacts()
            .respond(call_id, status)
    }

    pub fn escalate_email_human_contact(
        &self,
        call_id: &str,
        escalation: Escalation,
    ) -> Result<HumanContact> {
        tracing::info!(call_id = %call_id, msg = %escalation.escalation_msg, "escalating human contact");
        self.backend("escalate_email_human_contact")?
            .contacts()
            .escalate_email(call_id, escalation)
    }
}

/// Blocking counterpart of the async function guard.
pub struct BlockingFunctionGuard<'hl> {
    engine: &'hl BlockingHandrail,
    channel: Option<ContactChannel>,
    reject_options: Option<Vec<ResponseOption>>,
    adapter: Option<ArgumentAdapter>,
}

impl<'hl> BlockingFunctionGuard<'hl> {
    pub fn with_argument_adapter<F>(mut self, adapter: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.adapter = Some(Arc::new(adapter));
        self
    }

    pub fn call<F, R>(&self, fn_name: &str, kwargs: Value, f: F) -> Outcome<R>
    where
        F: FnOnce() -> R,
    {
        self.call_with_channel(None, fn_name, kwargs, f)
    }

    pub fn call_with_channel<F, R>(
        &self,
        channel: Option<ContactChannel>,
        fn_name: &str,
        kwargs: Value,
        f: F,
    ) -> Outcome<R>
    where
        F: FnOnce() -> R,
    {
        let kwargs = match &self.adapter {
            Some(adapt) => adapt(kwargs),
            None => kwargs,
        };
        match self.engine.approval_method {
            ApprovalMethod::Cli => cli::approve_with_io(
                std::io::stdin().lock(),
                std::io::stdout(),
                &self.engine.run_id,
                fn_name,
                &kwargs,
                f,
            ),
            ApprovalMethod::Backend => self.call_backend(channel, fn_name, kwargs, f),
        }
    }

    fn call_backend<F, R>(
        &self,
        per_call: Option<ContactChannel>,
        fn_name: &str,
        kwargs: Value,
        f: F,
    ) -> Outcome<R>
    where
        F: FnOnce() -> R,
    {
        let channel = approval::resolve_channel(
            per_call,
            self.channel.as_ref(),
            self.engine.contact_channel.as_ref(),
        );
        let mut spec = FunctionCallSpec::new(fn_name, kwargs);
        spec.channel = channel.clone();
        spec.reject_options = self.reject_options.clone();

        match self.engine.fetch_approval(spec) {
            Ok(completed) => {
                let effective = completed.call.spec.channel.clone().or(channel);
                match completed.as_completed() {
                    Ok(ApprovalDecision::Approved { .. }) => {
                        tracing::info!(func = fn_name, "human approved");
                        Outcome::Executed(f())
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

/// Blocking counterpart of the async human tool.
pub struct BlockingHumanTool<'hl> {
    engine: &'hl BlockingHandrail,
    channel: Option<ContactChannel>,
    response_options: Option<Vec<ResponseOption>>,
    name: String,
    description: String,
}

impl BlockingHumanTool<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn ask(&self, message: &str) -> Result<String> {
        self.ask_with_subject(message, None)
    }

    pub fn ask_with_subject(&self, message: &str, subject: Option<&str>) -> Result<String> {
        match self.engine.approval_method {
            ApprovalMethod::Cli => {
                let reply = cli::prompt_contact(
                    std::io::stdin().lock(),
                    std::io::stdout(),
                    &self.engine.run_id,
                    message,
                )?;
                Ok(reply)
            }
            ApprovalMethod::Backend => {
                let mut spec = HumanContactSpec::new(message);
                spec.subject = subject.map(str::to_string);
                spec.channel = self.channel.clone();
                spec.response_options = self.response_options.clone();
                let completed = self.engine.fetch_human_response(spec)?;
                completed.as_completed()
            }
        }
    }
}
