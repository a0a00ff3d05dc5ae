use apqp_core::{ApprovalEngine, DecisionCommand, InMemoryApprovalStore, ItemDetail, ItemType, LifecycleStatus, NullSink,
                Submission, TrackedFile, User, WorkflowStep};
use apqp_tracking::service::{exit_code, respond, ResponseClass};
use serde_json::json;
use tokio_test::assert_ok;

fn engine() -> ApprovalEngine<InMemoryApprovalStore, NullSink> {
    let store = InMemoryApprovalStore::new();
    assert_ok!(store.add_user(User { id: 10, department_id: 1 }));
    assert_ok!(store.add_workflow_step(WorkflowStep::active(1, 1, 10)));
    assert_ok!(store.add_item(ItemDetail { id: 1,
                                           reference_id: 7,
                                           item_type: ItemType::Ppap,
                                           department_id: 1,
                                           owner_id: Some(20),
                                           line_code: None,
                                           lifecycle_status: LifecycleStatus::InProgress,
                                           created_by: None,
                                           updated_at: None,
                                           updated_by: None }));
    ApprovalEngine::new(store, NullSink)
}

#[test]
fn handler_statuses_follow_outcomes() {
    let engine = engine();
    let file = TrackedFile::new("psw.pdf", "/u/psw.pdf");

    let ok = respond(engine.submit(&Submission::new(1, 30, file.clone())));
    assert_eq!((ok.class, ok.status), (ResponseClass::Success, 200));
    assert_eq!(ok.body["outcome"], json!("ok"));
    assert_eq!(ok.body["value"]["chain_len"], json!(1));

    let missing = respond(engine.submit(&Submission::new(99, 30, file)));
    assert_eq!((missing.class, missing.status), (ResponseClass::ClientError, 404));

    let bad = engine.decide(&DecisionCommand::new(1, "maybe", 10));
    assert_eq!(exit_code(&bad), 3);
    assert_eq!(respond(bad).status, 400);
}

#[test]
fn repeated_decision_is_still_a_success() {
    let engine = engine();
    assert_ok!(engine.submit(&Submission::new(1, 30, TrackedFile::new("a", "/a"))));
    assert_ok!(engine.decide(&DecisionCommand::new(1, "done", 10)));
    assert_ok!(engine.decide(&DecisionCommand::new(1, "done", 900)));

    let again = respond(engine.decide(&DecisionCommand::new(1, "done", 900)));
    assert_eq!(again.status, 200);
    assert_eq!(again.body["outcome"], json!("duplicate_skipped"));
}
