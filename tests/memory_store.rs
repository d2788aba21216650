//! Engine lifecycle tests against an in-memory backend: create, poll,
//! resolve, and the channel/validation rules around them.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use handrail::models::{
    ContactChannel, EmailChannel, FunctionCallStatus, HumanContactStatus, ResponseOption,
    SlackChannel, SmsChannel,
};
use handrail::{
    ApprovalMethod, BlockingHandrail, Handrail, HandrailError, Outcome,
};
use serde_json::json;

use common::MemoryBackend;

fn engine(backend: Arc<MemoryBackend>) -> Handrail {
    Handrail::builder()
        .approval_method(ApprovalMethod::Backend)
        .backend(backend)
        .run_id("run-tests")
        .poll_interval(Duration::from_millis(5))
        .build()
        .unwrap()
}

#[tokio::test]
async fn approved_call_runs_the_function() {
    let backend = MemoryBackend::shared();
    backend
        .functions
        .respond_after(2, FunctionCallStatus::approved(None));

    let hl = engine(backend.clone());
    let guard = hl.require_approval(None, None).unwrap();
    let outcome = guard
        .call("multiply", json!({"x": 2, "y": 5}), || async { 2 * 5 })
        .await;

    assert_eq!(outcome.executed(), Some(10));
    // resolved on the second poll, so at least two gets happened
    assert!(backend.functions.get_count() >= 2);

    let stored = backend.functions.only_item();
    assert_eq!(stored.run_id, "run-tests");
    assert!(stored.call_id.starts_with("call-"));
    assert_eq!(stored.spec.fn_name, "multiply");
    assert_eq!(stored.spec.kwargs["y"], 5);
}

#[tokio::test]
async fn denied_call_never_runs_and_reports_channel_context() {
    let backend = MemoryBackend::shared();
    backend
        .functions
        .respond_after(1, FunctionCallStatus::rejected("too risky"));

    let hl = engine(backend.clone());
    let channel =
        ContactChannel::slack(SlackChannel::new("C123").with_context("the finance channel"));
    let guard = hl.require_approval(Some(channel), None).unwrap();

    let ran = Arc::new(AtomicBool::new(false));
    let ran_inner = ran.clone();
    let outcome = guard
        .call("multiply", json!({"x": 2, "y": 5}), move || async move {
            ran_inner.store(true, Ordering::SeqCst);
            10
        })
        .await;

    assert!(!ran.load(Ordering::SeqCst));
    match outcome {
        Outcome::Denied { reason } => {
            assert_eq!(
                reason,
                "User in the finance channel denied multiply with message: too risky"
            );
        }
        other => panic!("expected denial, got {other:?}"),
    }
}

#[tokio::test]
async fn per_call_channel_wins_over_wrapper_and_instance() {
    let backend = MemoryBackend::shared();
    backend
        .functions
        .respond_after(1, FunctionCallStatus::approved(None));

    let instance = ContactChannel::email(EmailChannel::new("instance@example.com"));
    let hl = Handrail::builder()
        .approval_method(ApprovalMethod::Backend)
        .backend(backend.clone())
        .run_id("run-tests")
        .poll_interval(Duration::from_millis(5))
        .contact_channel(instance)
        .build()
        .unwrap();

    let wrapper = ContactChannel::email(EmailChannel::new("wrapper@example.com"));
    let guard = hl.require_approval(Some(wrapper), None).unwrap();

    let per_call = ContactChannel::sms(SmsChannel {
        phone_number: "+15555550100".into(),
        context_about_user: None,
    });
    let outcome = guard
        .call_with_channel(Some(per_call), "notify", json!({}), || async {})
        .await;
    assert!(outcome.is_executed());

    let stored = backend.functions.only_item();
    let channel = stored.spec.channel.expect("channel should be recorded");
    assert!(channel.sms.is_some(), "per-call sms channel should win");
    assert!(channel.email.is_none());
}

#[tokio::test]
async fn wrapper_channel_wins_over_instance_default() {
    let backend = MemoryBackend::shared();
    backend
        .functions
        .respond_after(1, FunctionCallStatus::approved(None));

    let instance = ContactChannel::email(EmailChannel::new("instance@example.com"));
    let hl = Handrail::builder()
        .approval_method(ApprovalMethod::Backend)
        .backend(backend.clone())
        .run_id("run-tests")
        .poll_interval(Duration::from_millis(5))
        .contact_channel(instance)
        .build()
        .unwrap();

    let wrapper = ContactChannel::email(EmailChannel::new("wrapper@example.com"));
    let guard = hl.require_approval(Some(wrapper), None).unwrap();
    guard.call("notify", json!({}), || async {}).await;

    let stored = backend.functions.only_item();
    let email = stored.spec.channel.unwrap().email.unwrap();
    assert_eq!(email.address, "wrapper@example.com");
}

#[tokio::test]
async fn reject_options_travel_with_the_request() {
    let backend = MemoryBackend::shared();
    backend
        .functions
        .respond_after(1, FunctionCallStatus::approved(None));

    let hl = engine(backend.clone());
    let guard = hl
        .require_approval(
            None,
            Some(vec![
                ResponseOption::new("defer").with_title("Defer until tomorrow"),
                ResponseOption::new("wrong-args"),
            ]),
        )
        .unwrap();
    guard.call("deploy", json!({"env": "prod"}), || async {}).await;

    let stored = backend.functions.only_item();
    let options = stored.spec.reject_options.unwrap();
    assert_eq!(options.len(), 2);
    assert_eq!(options[0].name, "defer");
}

#[tokio::test]
async fn argument_adapter_reshapes_kwargs() {
    let backend = MemoryBackend::shared();
    backend
        .functions
        .respond_after(1, FunctionCallStatus::approved(None));

    let hl = engine(backend.clone());
    let guard = hl
        .require_approval(None, None)
        .unwrap()
        .with_argument_adapter(|raw| json!({ "args": raw }));
    guard.call("multiply", json!([2, 5]), || async {}).await;

    let stored = backend.functions.only_item();
    assert_eq!(stored.spec.kwargs, json!({"args": [2, 5]}));
}

#[tokio::test]
async fn denial_recorded_without_comment_surfaces_as_failure() {
    let backend = MemoryBackend::shared();
    // a malformed store response: denied but no comment
    backend.functions.respond_after(
        1,
        FunctionCallStatus {
            approved: Some(false),
            ..FunctionCallStatus::default()
        },
    );

    let hl = engine(backend);
    let guard = hl.require_approval(None, None).unwrap();
    let outcome: Outcome<()> = guard.call("multiply", json!({}), || async {}).await;

    match outcome {
        Outcome::Failed { error } => assert!(error.contains("multiply")),
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn respond_rejects_denial_without_comment() {
    let backend = MemoryBackend::shared();
    let hl = engine(backend.clone());

    let call = hl
        .create_function_call(
            handrail::models::FunctionCallSpec::new("multiply", json!({})),
            Some("call-fixed".into()),
        )
        .await
        .unwrap();
    assert_eq!(call.call_id, "call-fixed");

    let bare_denial = FunctionCallStatus {
        approved: Some(false),
        ..FunctionCallStatus::default()
    };
    let result = hl.respond_to_function_call("call-fixed", bare_denial).await;
    assert!(matches!(result, Err(HandrailError::MissingDenialComment)));

    // with a comment the write goes through
    let responded = hl
        .respond_to_function_call("call-fixed", FunctionCallStatus::rejected("use staging"))
        .await
        .unwrap();
    assert_eq!(
        responded.status.unwrap().comment.as_deref(),
        Some("use staging")
    );
}

#[tokio::test]
async fn get_is_idempotent_before_and_after_resolution() {
    let backend = MemoryBackend::shared();
    let hl = engine(backend.clone());

    hl.create_function_call(
        handrail::models::FunctionCallSpec::new("multiply", json!({"x": 2, "y": 5})),
        Some("call-idem".into()),
    )
    .await
    .unwrap();

    // pending: add -> get reports no status, however often we ask
    for _ in 0..3 {
        let call = hl.get_function_call("call-idem").await.unwrap();
        assert!(call.status.is_none());
        assert!(call.as_completed().is_err());
    }

    hl.respond_to_function_call("call-idem", FunctionCallStatus::approved(Some("go".into())))
        .await
        .unwrap();

    // resolved: every subsequent get returns the identical terminal status
    for _ in 0..3 {
        let status = hl
            .get_function_call("call-idem")
            .await
            .unwrap()
            .status
            .expect("resolved call must keep its status");
        assert_eq!(status.approved, Some(true));
        assert_eq!(status.comment.as_deref(), Some("go"));
    }
}

#[tokio::test]
async fn escalation_is_recorded_against_the_call() {
    let backend = MemoryBackend::shared();
    let hl = engine(backend.clone());

    hl.create_function_call(
        handrail::models::FunctionCallSpec::new("deploy", json!({})),
        Some("call-esc".into()),
    )
    .await
    .unwrap();

    let escalation = handrail::models::Escalation::new("still waiting on this deploy")
        .with_additional_recipients(vec![handrail::models::EmailRecipient::to(
            "oncall@example.com",
        )]);
    hl.escalate_email_function_call("call-esc", escalation)
        .await
        .unwrap();

    let escalations = backend.functions.escalations();
    assert_eq!(escalations.len(), 1);
    assert_eq!(escalations[0].0, "call-esc");
    assert_eq!(escalations[0].1.escalation_msg, "still waiting on this deploy");
}

#[tokio::test]
async fn human_tool_returns_the_verbatim_response() {
    let backend = MemoryBackend::shared();
    backend
        .contacts
        .respond_after(2, HumanContactStatus::responded("ship it"));

    let hl = engine(backend.clone());
    let tool = hl.human_as_tool(None, None).unwrap();
    let answer = tool.ask("should we ship?").await.unwrap();
    assert_eq!(answer, "ship it");

    let stored = backend.contacts.only_item();
    assert_eq!(stored.spec.msg, "should we ship?");
    assert!(stored.call_id.starts_with("human_call-"));
}

#[tokio::test]
async fn response_options_travel_with_the_contact() {
    let backend = MemoryBackend::shared();
    backend
        .contacts
        .respond_after(1, HumanContactStatus::responded("defer"));

    let hl = engine(backend.clone());
    let tool = hl
        .human_as_tool(
            None,
            Some(vec![
                ResponseOption::new("ship"),
                ResponseOption::new("defer"),
            ]),
        )
        .unwrap();
    tool.ask_with_subject("ship or defer?", Some("release decision"))
        .await
        .unwrap();

    let stored = backend.contacts.only_item();
    assert_eq!(stored.spec.subject.as_deref(), Some("release decision"));
    assert_eq!(stored.spec.response_options.unwrap().len(), 2);
}

#[test]
fn blocking_engine_approves_and_runs() {
    let backend = MemoryBackend::shared();
    backend
        .functions
        .respond_after(2, FunctionCallStatus::approved(None));

    let hl = BlockingHandrail::builder()
        .approval_method(ApprovalMethod::Backend)
        .backend(backend.clone())
        .run_id("run-blocking")
        .poll_interval(Duration::from_millis(5))
        .build()
        .unwrap();

    let guard = hl.require_approval(None, None).unwrap();
    let outcome = guard.call("multiply", json!({"x": 2, "y": 5}), || 2 * 5);
    assert_eq!(outcome.executed(), Some(10));
    assert_eq!(backend.functions.only_item().run_id, "run-blocking");
}

#[test]
fn blocking_engine_denies_with_same_message_shape() {
    let backend = MemoryBackend::shared();
    backend
        .functions
        .respond_after(1, FunctionCallStatus::rejected("not now"));

    let hl = BlockingHandrail::builder()
        .approval_method(ApprovalMethod::Backend)
        .backend(backend)
        .run_id("run-blocking")
        .poll_interval(Duration::from_millis(5))
        .build()
        .unwrap();

    let guard = hl.require_approval(None, None).unwrap();
    let outcome: Outcome<()> = guard.call("deploy", json!({}), || ());
    assert_eq!(
        outcome.denial_reason(),
        Some("User denied deploy with message: not now")
    );
}

#[test]
fn blocking_human_tool_round_trip() {
    let backend = MemoryBackend::shared();
    backend
        .contacts
        .respond_after(1, HumanContactStatus::responded("looks fine"));

    let hl = BlockingHandrail::builder()
        .approval_method(ApprovalMethod::Backend)
        .backend(backend)
        .run_id("run-blocking")
        .poll_interval(Duration::from_millis(5))
        .build()
        .unwrap();

    let tool = hl.human_as_tool(None, None).unwrap();
    assert_eq!(tool.name(), "contact_human");
    assert_eq!(tool.ask("any objections?").unwrap(), "looks fine");
}
