//! AccessEventPipeline integration tests against in-memory capabilities

mod common;

use common::*;
use concierge_door::access_pipeline::{AccessEventPipeline, AccessOutcome, TriggerOutcome};
use concierge_door::actuation_channel::DoorCommand;
use concierge_door::labeling_pipeline::{LabelAction, LabelRequest};
use concierge_door::models::CaptureEvent;
use concierge_door::object_relocator::{content_hash, Classification};
use concierge_door::object_store::Acl;
use concierge_door::Error;

fn pipeline(harness: &Harness, config: &concierge_door::AppConfig) -> AccessEventPipeline {
    AccessEventPipeline::new(config, &harness.capabilities()).unwrap()
}

#[tokio::test]
async fn test_matched_capture_opens_door_and_welcomes() {
    let harness = Harness::new(ScriptedMatcher::with_match("alice", 92.0));
    harness.store.insert("in/001.jpg", sample_jpeg(80, 60));
    let pipeline = pipeline(&harness, &base_config());

    let outcome = pipeline.handle(&CaptureEvent::new("in/001.jpg")).await.unwrap();

    let expected_key = format!("detected/alice/{}.jpg", content_hash("in/001.jpg"));
    match &outcome {
        AccessOutcome::Matched {
            identity,
            confidence,
            artifact,
        } => {
            assert_eq!(identity, "alice");
            assert_eq!(*confidence, 92.0);
            assert_eq!(artifact.key, expected_key);
            assert_eq!(artifact.small.as_deref(), Some(format!("{}_small", expected_key).as_str()));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    assert!(!harness.store.contains("in/001.jpg"));
    assert!(harness.store.contains(&expected_key));
    assert_eq!(harness.store.acl(&expected_key), Some(Acl::PublicRead));

    let published = harness.channel.published();
    assert_eq!(published.len(), 1);
    let (topic, payload, qos) = &published[0];
    assert_eq!(topic, "doorman");
    assert_eq!(payload.username, "alice");
    assert_eq!(payload.command, DoorCommand::Open);
    assert_eq!(*qos, 0);

    let sent = harness.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].title, "welcome to the office alice");
    assert!(sent[0].text.contains(&format!("{}_small", expected_key)));
}

#[tokio::test]
async fn test_unmatched_capture_sends_triage_card() {
    let harness = Harness::new(ScriptedMatcher::new());
    harness.store.insert("in/002.jpg", sample_jpeg(80, 60));
    let pipeline = pipeline(&harness, &base_config());

    let outcome = pipeline.handle(&CaptureEvent::new("in/002.jpg")).await.unwrap();

    let expected_key = Classification::Unknown.target_key("in/002.jpg");
    assert!(matches!(&outcome, AccessOutcome::Unmatched { artifact } if artifact.key == expected_key));
    assert!(!harness.store.contains("in/002.jpg"));
    assert!(harness.store.contains(&expected_key));

    // never publishes without a match
    assert!(harness.channel.published().is_empty());

    let sent = harness.notifier.sent();
    assert_eq!(sent.len(), 1);
    let actions: Vec<_> = sent[0].actions().collect();
    assert_eq!(actions.len(), 2);
    for action in &actions {
        assert_eq!(action.target, TRAIN_URL);
        let body: LabelRequest = serde_json::from_str(&action.body).unwrap();
        assert_eq!(body.key, expected_key);
    }
    let train: LabelRequest = serde_json::from_str(&actions[0].body).unwrap();
    assert_eq!(train.action, LabelAction::Train);
    let discard: LabelRequest = serde_json::from_str(&actions[1].body).unwrap();
    assert_eq!(discard.action, LabelAction::Discard);
}

#[tokio::test]
async fn test_low_confidence_is_treated_as_unknown() {
    let harness = Harness::new(ScriptedMatcher::with_match("mallory", 42.0));
    harness.store.insert("in/003.jpg", sample_jpeg(40, 40));
    let pipeline = pipeline(&harness, &base_config());

    let outcome = pipeline.handle(&CaptureEvent::new("in/003.jpg")).await.unwrap();

    assert!(matches!(outcome, AccessOutcome::Unmatched { .. }));
    assert!(harness.channel.published().is_empty());
}

#[tokio::test]
async fn test_rate_limit_suppresses_second_open() {
    let harness = Harness::new(ScriptedMatcher::with_match("alice", 95.0));
    harness.store.insert("in/a.jpg", sample_jpeg(40, 40));
    harness.store.insert("in/b.jpg", sample_jpeg(40, 40));
    let config = config_with(&[("OPEN_RATE_SECONDS", "120")]);
    let pipeline = pipeline(&harness, &config);
    assert!(pipeline.rate_limit_enabled());

    let first = pipeline.handle(&CaptureEvent::new("in/a.jpg")).await.unwrap();
    assert!(matches!(first, AccessOutcome::Matched { .. }));

    let second = pipeline.handle(&CaptureEvent::new("in/b.jpg")).await.unwrap();
    match &second {
        AccessOutcome::Suppressed { identity, artifact } => {
            assert_eq!(identity, "alice");
            // relocation happens before the claim
            assert!(harness.store.contains(&artifact.key));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    assert_eq!(harness.channel.published().len(), 1);
    assert_eq!(harness.notifier.sent().len(), 1);
    assert_eq!(harness.rate_store.claim_count().await, 1);
}

#[tokio::test]
async fn test_rate_limit_without_store_is_config_error() {
    let harness = Harness::new(ScriptedMatcher::new());
    let mut caps = harness.capabilities();
    caps.rate_limit_store = None;
    let config = config_with(&[("OPEN_RATE_SECONDS", "60")]);

    let result = AccessEventPipeline::new(&config, &caps);
    assert!(matches!(result, Err(Error::Config(_))));
}

#[tokio::test]
async fn test_second_factor_denial_keeps_door_closed() {
    let harness = Harness::new(ScriptedMatcher::with_match("alice", 99.0))
        .with_authorizer(ScriptedAuthorizer::responding(r#"{"status": "denied"}"#));
    harness.store.insert("in/mfa.jpg", sample_jpeg(40, 40));
    let config = config_with(&[
        ("MFA_ARN", "arn:aws:lambda:eu-west-1:123456789012:function:mfa"),
        ("MFA_USERS", "alice=alice.smith"),
    ]);
    let pipeline = pipeline(&harness, &config);

    let outcome = pipeline.handle(&CaptureEvent::new("in/mfa.jpg")).await.unwrap();

    assert!(matches!(outcome, AccessOutcome::Rejected { ref identity, .. } if identity == "alice"));
    assert!(harness.channel.published().is_empty());
    assert!(harness.notifier.sent().is_empty());

    let calls = harness.authorizer.as_ref().unwrap().calls();
    assert_eq!(calls.len(), 1);
    let payload: serde_json::Value = serde_json::from_str(&calls[0]).unwrap();
    assert_eq!(payload["Function"], "MFA-Auth");
    assert_eq!(payload["AuthUser"], "alice.smith");
}

#[tokio::test]
async fn test_second_factor_skipped_for_unflagged_identity() {
    let harness = Harness::new(ScriptedMatcher::with_match("bob", 99.0))
        .with_authorizer(ScriptedAuthorizer::responding("false"));
    harness.store.insert("in/bob.jpg", sample_jpeg(40, 40));
    let config = config_with(&[
        ("MFA_ARN", "arn:aws:lambda:eu-west-1:123456789012:function:mfa"),
        ("MFA_USERS", "alice"),
    ]);
    let pipeline = pipeline(&harness, &config);

    let outcome = pipeline.handle(&CaptureEvent::new("in/bob.jpg")).await.unwrap();

    assert!(matches!(outcome, AccessOutcome::Matched { .. }));
    assert!(harness.authorizer.as_ref().unwrap().calls().is_empty());
    assert_eq!(harness.channel.published().len(), 1);
}

#[tokio::test]
async fn test_thumbnail_failure_falls_back_to_full_size() {
    let harness = Harness::new(ScriptedMatcher::with_match("alice", 90.0));
    harness.store.insert("in/broken.jpg", b"not a jpeg".to_vec());
    let pipeline = pipeline(&harness, &base_config());

    let outcome = pipeline.handle(&CaptureEvent::new("in/broken.jpg")).await.unwrap();

    let AccessOutcome::Matched { artifact, .. } = outcome else {
        panic!("expected matched outcome");
    };
    assert!(artifact.small.is_none());

    let sent = harness.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].text.contains(&artifact.key));
    assert!(!sent[0].text.contains("_small"));
}

#[tokio::test]
async fn test_notification_failure_does_not_roll_back() {
    let harness = Harness::new(ScriptedMatcher::with_match("alice", 90.0))
        .with_notifier(RecordingNotifier::failing());
    harness.store.insert("in/004.jpg", sample_jpeg(40, 40));
    let pipeline = pipeline(&harness, &base_config());

    let result = pipeline.handle(&CaptureEvent::new("in/004.jpg")).await;

    assert!(matches!(result, Err(Error::Notifier(_))));
    assert_eq!(harness.channel.published().len(), 1);
    assert!(!harness.store.contains("in/004.jpg"));
    assert!(harness
        .store
        .contains(&Classification::Detected { identity: "alice".to_string() }.target_key("in/004.jpg")));
}

#[tokio::test]
async fn test_actuation_failure_skips_notification() {
    let harness = Harness::new(ScriptedMatcher::with_match("alice", 90.0))
        .with_channel(RecordingChannel::failing());
    harness.store.insert("in/005.jpg", sample_jpeg(40, 40));
    let pipeline = pipeline(&harness, &base_config());

    let result = pipeline.handle(&CaptureEvent::new("in/005.jpg")).await;

    assert!(matches!(result, Err(Error::Actuation(_))));
    assert!(harness.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_face_matcher_failure_leaves_intake_untouched() {
    let harness = Harness::new(ScriptedMatcher::failing_search());
    harness.store.insert("in/006.jpg", sample_jpeg(40, 40));
    let pipeline = pipeline(&harness, &base_config());

    let result = pipeline.handle(&CaptureEvent::new("in/006.jpg")).await;

    assert!(matches!(result, Err(Error::FaceMatcher(_))));
    assert!(harness.store.contains("in/006.jpg"));
    assert!(harness.store.ops().is_empty());
}

#[tokio::test]
async fn test_missing_intake_object_is_already_processed() {
    let harness = Harness::new(ScriptedMatcher::with_match("alice", 92.0));
    let pipeline = pipeline(&harness, &base_config());

    let outcome = pipeline.handle(&CaptureEvent::new("in/ghost.jpg")).await.unwrap();

    assert_eq!(
        outcome,
        AccessOutcome::AlreadyProcessed {
            key: "in/ghost.jpg".to_string()
        }
    );
    assert!(harness.channel.published().is_empty());
    assert!(harness.notifier.sent().is_empty());
    assert!(harness.store.ops().is_empty());
}

#[tokio::test]
async fn test_redelivered_capture_does_not_open_twice() {
    let harness = Harness::new(ScriptedMatcher::with_match("alice", 92.0));
    harness.store.insert("in/007.jpg", sample_jpeg(40, 40));
    let pipeline = pipeline(&harness, &base_config());
    let event = CaptureEvent::new("in/007.jpg");

    let first = pipeline.handle(&event).await.unwrap();
    let second = pipeline.handle(&event).await.unwrap();

    assert!(matches!(first, AccessOutcome::Matched { .. }));
    assert!(matches!(second, AccessOutcome::AlreadyProcessed { .. }));
    assert_eq!(harness.channel.published().len(), 1);
    assert_eq!(harness.notifier.sent().len(), 1);
}

#[tokio::test]
async fn test_trigger_opens_for_username() {
    let harness = Harness::new(ScriptedMatcher::new());
    let pipeline = pipeline(&harness, &base_config());

    let outcome = pipeline.trigger("concierge").await.unwrap();

    assert_eq!(
        outcome,
        TriggerOutcome::Opened {
            username: "concierge".to_string()
        }
    );
    let published = harness.channel.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].1.username, "concierge");
    assert!(harness.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_trigger_goes_through_rate_limit_and_second_factor() {
    let harness = Harness::new(ScriptedMatcher::new())
        .with_authorizer(ScriptedAuthorizer::responding(r#"{"status": "denied"}"#));
    let config = config_with(&[
        ("OPEN_RATE_SECONDS", "120"),
        ("MFA_ARN", "arn:aws:lambda:eu-west-1:123456789012:function:mfa"),
        ("MFA_USERS", "concierge"),
    ]);
    let pipeline = pipeline(&harness, &config);

    let first = pipeline.trigger("concierge").await.unwrap();
    let second = pipeline.trigger("concierge").await.unwrap();

    assert!(matches!(first, TriggerOutcome::Rejected { .. }));
    assert!(matches!(second, TriggerOutcome::Suppressed { .. }));
    assert!(harness.channel.published().is_empty());
    assert_eq!(harness.authorizer.as_ref().unwrap().calls().len(), 1);
}
