use std::sync::Arc;
use std::thread;

use apqp_core::{ApprovalEngine, ApprovalError, ApprovalStatus, ApprovalStore, ApprovalTier, ApprovalView,
                DecisionCommand, InMemoryApprovalStore, ItemDetail, ItemType, LifecycleStatus, Notification,
                NotificationSink, NotifyError, Outcome, ProjectControlView, RecordingSink, StatusFlag, Submission,
                TemplateKind, TrackedFile, Transition, User, WorkflowStep};
use apqp_core::model::NewApprovalRecord;
use chrono::Utc;

const DEPT: i64 = 1;
const OTHER_DEPT: i64 = 2;
const LEADER_A: i64 = 10;
const LEADER_B: i64 = 11;
const LEADER_C: i64 = 12;
const SUBMITTER: i64 = 50;
const OWNER: i64 = 100;
const PJ_USER: i64 = 900;

fn item(id: i64, reference_id: i64, item_type: ItemType, department_id: i64) -> ItemDetail {
    ItemDetail { id,
                 reference_id,
                 item_type,
                 department_id,
                 owner_id: Some(OWNER),
                 line_code: Some("L1".into()),
                 lifecycle_status: LifecycleStatus::InProgress,
                 created_by: Some(SUBMITTER),
                 updated_at: None,
                 updated_by: None }
}

fn store_with(steps: &[(i64, i32, i64)]) -> InMemoryApprovalStore {
    let store = InMemoryApprovalStore::new();
    for (id, dept) in [(LEADER_A, DEPT), (LEADER_B, DEPT), (LEADER_C, DEPT), (SUBMITTER, OTHER_DEPT), (OWNER, OTHER_DEPT)] {
        store.add_user(User { id, department_id: dept }).unwrap();
    }
    for (dept, order, approver) in steps {
        store.add_workflow_step(WorkflowStep::active(*dept, *order, *approver)).unwrap();
    }
    store.add_item(item(1, 500, ItemType::Apqp, DEPT)).unwrap();
    store.add_item(item(2, 500, ItemType::Apqp, DEPT)).unwrap();
    store.add_item(item(3, 500, ItemType::Ppap, DEPT)).unwrap();
    store.add_item(item(4, 600, ItemType::Apqp, 9)).unwrap();
    store
}

fn two_step_engine() -> ApprovalEngine<InMemoryApprovalStore, RecordingSink> {
    ApprovalEngine::new(store_with(&[(DEPT, 1, LEADER_A), (DEPT, 2, LEADER_B)]), RecordingSink::new())
}

fn submission(id: i64) -> Submission {
    Submission::new(id, SUBMITTER, TrackedFile::new("control-plan.xlsx", "/uploads/control-plan.xlsx"))
}

fn approve(id: i64, actor: i64) -> DecisionCommand {
    DecisionCommand::new(id, "done", actor)
}

fn assert_single_pointer(store: &InMemoryApprovalStore, id: i64) {
    let pointers = store.records(id).iter().filter(|r| r.is_current_action()).count();
    assert!(pointers <= 1, "item {id} has {pointers} action records");
}

#[test]
fn two_leaders_then_project_control_approval() {
    let engine = two_step_engine();

    let report = engine.submit(&submission(1)).unwrap().into_value().expect("submitted");
    assert_eq!(report.chain_len, 2);
    assert_eq!(report.first_approver, Some(LEADER_A));
    assert!(report.file_was_new);
    assert_eq!(engine.store().item(1).unwrap().lifecycle_status, LifecycleStatus::Waiting);
    let sent = engine.sink().take();
    assert_eq!(sent.len(), 1);
    assert_eq!((sent[0].recipient_id, sent[0].kind), (LEADER_A, TemplateKind::Submitted));

    let records = engine.store().records(1);
    assert!(records[0].is_current_action() && records[0].level == 1);
    assert!(!records[1].is_action && records[1].status == ApprovalStatus::Waiting);

    // A aprueba: el puntero pasa a B, sin notificación de cierre.
    let first = engine.decide(&approve(1, LEADER_A)).unwrap();
    let first = match first {
        Outcome::Ok(r) => r,
        other => panic!("unexpected {other:?}"),
    };
    assert_eq!(first.transition,
               Transition::Promoted { from_level: 1,
                                      to_level: 2,
                                      next_approver: LEADER_B });
    assert_eq!(first.rounds_bumped, 1);
    assert!(engine.sink().take().is_empty());
    assert_single_pointer(engine.store(), 1);

    // B aprueba: no quedan líderes, aparece el registro PJ.
    let second = engine.decide(&approve(1, LEADER_B)).unwrap().into_value().unwrap();
    assert!(matches!(second.transition, Transition::EscalatedToProjectControl { approver_id: LEADER_B, .. }));
    let pj: Vec<_> = engine.store()
                           .records(1)
                           .into_iter()
                           .filter(|r| r.tier == ApprovalTier::Pj)
                           .collect();
    assert_eq!(pj.len(), 1);
    assert!(pj[0].is_current_action() && pj[0].status == ApprovalStatus::Waiting);
    assert_eq!(pj[0].level, 2);
    let mut recipients: Vec<i64> = engine.sink().take().iter().map(|n| n.recipient_id).collect();
    recipients.sort();
    assert_eq!(recipients, vec![SUBMITTER, OWNER]);

    let snap = engine.snapshot(1).unwrap().into_value().unwrap();
    assert_eq!(snap.view, ApprovalView::WaitingProjectControl);
    assert_eq!(snap.view.code(), Some(6));
    assert_eq!(snap.project_view, ProjectControlView::WaitingProjectControl);

    // Control de proyecto cierra el entregable.
    let last = engine.decide(&approve(1, PJ_USER)).unwrap().into_value().unwrap();
    assert!(matches!(last.transition, Transition::Finalized { lifecycle: LifecycleStatus::Done, .. }));
    let sent = engine.sink().take();
    assert_eq!(sent.len(), 1);
    assert_eq!((sent[0].recipient_id, sent[0].kind), (OWNER, TemplateKind::Approved));

    let snap = engine.snapshot(1).unwrap().into_value().unwrap();
    assert_eq!(snap.view, ApprovalView::Approved);
    assert_eq!(snap.project_view.code(), Some(3));

    // Cadena cerrada: otra decisión no cambia nada.
    let again = engine.decide(&approve(1, PJ_USER)).unwrap();
    assert!(matches!(again, Outcome::DuplicateSkipped(ref r) if r.transition == Transition::NoChange));
    assert_single_pointer(engine.store(), 1);
}

#[test]
fn rejection_short_circuits_remaining_leaders() {
    let engine = ApprovalEngine::new(store_with(&[(DEPT, 1, LEADER_A), (DEPT, 2, LEADER_B), (DEPT, 3, LEADER_C)]),
                                     RecordingSink::new());
    engine.submit(&submission(1)).unwrap();
    engine.decide(&approve(1, LEADER_A)).unwrap();
    engine.sink().take();

    let cmd = DecisionCommand::new(1, "reject", LEADER_B).with_note("missing signature");
    let report = engine.decide(&cmd).unwrap().into_value().unwrap();
    assert_eq!(report.transition,
               Transition::Rejected { level: 2,
                                      short_circuited: 1 });
    assert_eq!(report.rounds_bumped, 0);

    let records = engine.store().records(1);
    assert!(records.iter().all(|r| r.tier == ApprovalTier::Leader), "no PJ record on reject");
    let b = records.iter().find(|r| r.approver_id == LEADER_B).unwrap();
    assert!(b.is_current_action());
    assert_eq!(b.status, ApprovalStatus::Reject);
    let c = records.iter().find(|r| r.approver_id == LEADER_C).unwrap();
    assert_eq!(c.status, ApprovalStatus::Reject);
    assert_eq!(c.note.as_deref(), Some("missing signature"));
    assert_single_pointer(engine.store(), 1);

    let sent = engine.sink().take();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient_id, OWNER);
    assert_eq!(sent[0].kind, TemplateKind::Rejected);
    assert_eq!(sent[0].note.as_deref(), Some("missing signature"));

    let snap = engine.snapshot(1).unwrap().into_value().unwrap();
    assert_eq!(snap.view.code(), Some(3));
    assert_eq!(snap.project_view, ProjectControlView::RejectedByLeader);

    // Segundo rechazo sobre una cadena cerrada: no-op.
    let again = engine.decide(&cmd).unwrap();
    assert!(matches!(again, Outcome::DuplicateSkipped(_)));
}

#[test]
fn resubmission_archives_previous_chain() {
    let engine = two_step_engine();
    engine.submit(&submission(1)).unwrap();
    engine.decide(&approve(1, LEADER_A)).unwrap();

    let report = engine.submit(&submission(1)).unwrap().into_value().unwrap();
    assert_eq!(report.archived, 2);
    assert!(!report.file_was_new);

    let records = engine.store().records(1);
    let live: Vec<_> = records.iter().filter(|r| r.is_live()).collect();
    let archived: Vec<_> = records.iter().filter(|r| !r.is_live()).collect();
    assert_eq!(live.len(), 2);
    assert_eq!(archived.len(), 2);
    assert!(archived.iter().all(|r| r.status_flag == StatusFlag::Inactive && !r.is_action));
    assert!(live.iter().all(|r| r.status == ApprovalStatus::Waiting));
    assert_eq!(live.iter().filter(|r| r.is_action).count(), 1);

    let snap = engine.snapshot(1).unwrap().into_value().unwrap();
    assert_eq!(snap.chain.len(), 2);
    assert_eq!(snap.history.len(), 2);
    assert_eq!(snap.current.as_ref().map(|r| r.approver_id), Some(LEADER_A));
}

#[test]
fn department_without_workflow_is_lenient() {
    let engine = two_step_engine();
    let report = engine.submit(&submission(4)).unwrap().into_value().unwrap();
    assert_eq!(report.chain_len, 0);
    assert_eq!(report.first_approver, None);
    assert_eq!(engine.store().item(4).unwrap().lifecycle_status, LifecycleStatus::InProgress);
    assert!(engine.sink().take().is_empty());
    assert_eq!(engine.store().tracking_file(4).unwrap().file_name, "control-plan.xlsx");

    let out = engine.decide(&approve(4, LEADER_A)).unwrap();
    assert!(out.is_success());
    assert!(matches!(out, Outcome::DuplicateSkipped(_)));

    let snap = engine.snapshot(4).unwrap().into_value().unwrap();
    assert_eq!(snap.view, ApprovalView::Uploaded);
    assert_eq!(snap.project_view.code(), Some(0));
}

#[test]
fn emptied_workflow_releases_waiting_items_on_resubmit() {
    let engine = two_step_engine();
    engine.submit(&submission(1)).unwrap();
    assert_eq!(engine.store().item(2).unwrap().lifecycle_status, LifecycleStatus::Waiting);
    engine.sink().take();

    // El ítem pasa a un departamento sin workflow activo.
    let mut moved = engine.store().item(1).unwrap();
    moved.department_id = 9;
    engine.store().add_item(moved).unwrap();

    let report = engine.submit(&submission(1)).unwrap().into_value().unwrap();
    assert_eq!(report.chain_len, 0);
    assert_eq!(report.archived, 2);
    assert_eq!(report.first_approver, None);
    for id in [1, 2] {
        assert_eq!(engine.store().item(id).unwrap().lifecycle_status, LifecycleStatus::InProgress, "item {id}");
    }
    assert!(engine.sink().take().is_empty());

    let snap = engine.snapshot(1).unwrap().into_value().unwrap();
    assert!(snap.chain.is_empty() && snap.current.is_none());
    assert!(matches!(engine.decide(&approve(1, LEADER_A)).unwrap(), Outcome::DuplicateSkipped(_)));
}

#[test]
fn only_a_newly_tracked_file_notifies_the_first_approver() {
    let engine = two_step_engine();
    engine.submit(&submission(1)).unwrap();
    let sent = engine.sink().take();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, TemplateKind::Submitted);

    let report = engine.submit(&submission(1)).unwrap().into_value().unwrap();
    assert!(!report.file_was_new);
    assert_eq!(report.first_approver, Some(LEADER_A));
    assert!(engine.sink().take().is_empty());
}

#[test]
fn submission_marks_the_whole_deliverable_waiting() {
    let engine = two_step_engine();
    engine.submit(&submission(1)).unwrap();

    assert_eq!(engine.store().item(1).unwrap().lifecycle_status, LifecycleStatus::Waiting);
    assert_eq!(engine.store().item(2).unwrap().lifecycle_status, LifecycleStatus::Waiting);
    assert!(engine.store().records(2).is_empty());
    // PPAP con la misma referencia y otra referencia quedan fuera.
    assert_eq!(engine.store().item(3).unwrap().lifecycle_status, LifecycleStatus::InProgress);
    assert_eq!(engine.store().item(4).unwrap().lifecycle_status, LifecycleStatus::InProgress);
}

#[test]
fn never_submitted_item_projects_its_lifecycle() {
    let engine = two_step_engine();
    let snap = engine.snapshot(2).unwrap().into_value().unwrap();
    assert!(!snap.has_file);
    assert_eq!(snap.view, ApprovalView::NotSubmitted(LifecycleStatus::InProgress));
    assert!(snap.chain.is_empty() && snap.current.is_none());
}

#[test]
fn unknown_item_is_not_found() {
    let engine = two_step_engine();
    assert_eq!(engine.decide(&approve(999, LEADER_A)).unwrap(), Outcome::NotFound(999));
    assert_eq!(engine.submit(&submission(999)).unwrap(), Outcome::NotFound(999));
    assert_eq!(engine.snapshot(999).unwrap(), Outcome::NotFound(999));
}

#[test]
fn invalid_input_is_rejected_before_any_write() {
    let engine = two_step_engine();
    let out = engine.decide(&DecisionCommand::new(1, "approve", LEADER_A)).unwrap();
    assert!(matches!(out, Outcome::ValidationFailed(_)));
    let out = engine.decide(&DecisionCommand::new(-3, "done", LEADER_A)).unwrap();
    assert!(matches!(out, Outcome::ValidationFailed(_)));
    let blank = Submission::new(1, SUBMITTER, TrackedFile::new("", "/tmp"));
    assert!(matches!(engine.submit(&blank).unwrap(), Outcome::ValidationFailed(_)));
    assert!(engine.store().records(1).is_empty());
    assert!(engine.store().tracking_file(1).is_none());
}

#[test]
fn non_terminal_decisions_leave_chain_untouched() {
    let engine = two_step_engine();
    engine.submit(&submission(1)).unwrap();
    let before = engine.store().records(1);
    for d in ["inprogress", "delay", "waiting"] {
        let out = engine.decide(&DecisionCommand::new(1, d, LEADER_A)).unwrap();
        assert!(matches!(out, Outcome::DuplicateSkipped(_)), "{d}");
    }
    assert_eq!(engine.store().records(1), before);
}

#[test]
fn project_control_rejection_closes_siblings() {
    let engine = two_step_engine();
    for id in [1, 2, 3] {
        engine.submit(&submission(id)).unwrap();
        engine.decide(&approve(id, LEADER_A)).unwrap();
        engine.decide(&approve(id, LEADER_B)).unwrap();
    }
    engine.sink().take();

    let cmd = DecisionCommand::new(1, "reject", PJ_USER).with_note("PPAP level 3 required");
    let report = engine.decide(&cmd).unwrap().into_value().unwrap();
    assert_eq!(report.transition,
               Transition::Finalized { lifecycle: LifecycleStatus::Reject,
                                       items: vec![1, 2] });

    for id in [1, 2] {
        assert_eq!(engine.store().item(id).unwrap().lifecycle_status, LifecycleStatus::Reject);
        let pj = engine.store()
                       .records(id)
                       .into_iter()
                       .find(|r| r.tier == ApprovalTier::Pj)
                       .unwrap();
        assert_eq!(pj.status, ApprovalStatus::Reject);
        assert!(pj.is_current_action());
    }
    // Otro tipo de entregable con la misma referencia no es hermano.
    assert_eq!(engine.store().item(3).unwrap().lifecycle_status, LifecycleStatus::Waiting);

    let sent = engine.sink().take();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, TemplateKind::Rejected);
    assert_eq!(sent[0].note.as_deref(), Some("PPAP level 3 required"));

    let snap = engine.snapshot(2).unwrap().into_value().unwrap();
    assert_eq!(snap.view, ApprovalView::RejectedByProjectControl);
}

#[test]
fn round_only_increments_for_department_members() {
    let store = store_with(&[(DEPT, 1, LEADER_A), (DEPT, 2, OWNER)]);
    let engine = ApprovalEngine::new(store, RecordingSink::new());
    engine.submit(&submission(1)).unwrap();

    // El siguiente aprobador (OWNER) es de otro departamento.
    let report = engine.decide(&approve(1, LEADER_A)).unwrap().into_value().unwrap();
    assert_eq!(report.rounds_bumped, 0);
    assert!(engine.store().records(1).iter().all(|r| r.round == 0));

    let two = two_step_engine();
    two.submit(&submission(1)).unwrap();
    two.decide(&approve(1, LEADER_A)).unwrap();
    let b = two.store()
               .records(1)
               .into_iter()
               .find(|r| r.approver_id == LEADER_B)
               .unwrap();
    assert_eq!(b.round, 1);
}

#[test]
fn missing_action_record_applies_status_in_bulk() {
    let engine = two_step_engine();
    let now = Utc::now();
    engine.store()
          .in_transaction(|tx| {
              for (approver, level) in [(LEADER_A, 1), (LEADER_B, 2)] {
                  tx.insert_record(NewApprovalRecord { item_detail_id: 2,
                                                       approver_id: approver,
                                                       level,
                                                       status: ApprovalStatus::Waiting,
                                                       is_action: false,
                                                       round: 0,
                                                       tier: ApprovalTier::Leader,
                                                       status_flag: StatusFlag::Active,
                                                       note: None,
                                                       created_at: now,
                                                       created_by: SUBMITTER,
                                                       updated_by: SUBMITTER })?;
              }
              Ok(())
          })
          .unwrap();

    let report = engine.decide(&approve(2, LEADER_A)).unwrap().into_value().unwrap();
    assert_eq!(report.transition, Transition::BulkApplied { rows: 2 });
    assert!(engine.store()
                  .records(2)
                  .iter()
                  .all(|r| r.status == ApprovalStatus::Approve));

    let again = engine.decide(&approve(2, LEADER_A)).unwrap();
    assert!(matches!(again, Outcome::DuplicateSkipped(_)));
}

#[test]
fn batch_submission_dedups_and_orders() {
    let engine = two_step_engine();
    let batch = vec![submission(2), submission(1), submission(2)];
    let report = engine.submit_batch(&batch).unwrap().into_value().unwrap();
    let ids: Vec<i64> = report.submitted.iter().map(|r| r.item_detail_id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(report.duplicates_skipped, vec![2]);
    assert_eq!(engine.sink().take().len(), 2);

    let pending = engine.pending_for(LEADER_A).unwrap();
    let ids: Vec<i64> = pending.iter().map(|p| p.item.id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(engine.pending_count(LEADER_B).unwrap(), 0);

    engine.decide(&approve(1, LEADER_A)).unwrap();
    assert_eq!(engine.pending_count(LEADER_A).unwrap(), 1);
    assert_eq!(engine.pending_count(LEADER_B).unwrap(), 1);
}

#[test]
fn batch_with_unknown_item_builds_nothing() {
    let engine = two_step_engine();
    let out = engine.submit_batch(&[submission(1), submission(777)]).unwrap();
    assert_eq!(out, Outcome::NotFound(777));
    assert!(engine.store().records(1).is_empty());
    assert!(engine.sink().take().is_empty());
}

struct FailingSink;

impl NotificationSink for FailingSink {
    fn deliver(&self, _n: &Notification) -> Result<(), NotifyError> {
        Err(NotifyError::Delivery("smtp unreachable".into()))
    }
}

#[test]
fn notification_failure_does_not_fail_the_transition() {
    let engine = ApprovalEngine::new(store_with(&[(DEPT, 1, LEADER_A)]), FailingSink);
    let out = engine.submit(&submission(1)).unwrap();
    assert!(matches!(out, Outcome::Ok(_)));
    let out = engine.decide(&approve(1, LEADER_A)).unwrap();
    assert!(matches!(out, Outcome::Ok(ref r) if r.notifications == 2));
    assert_eq!(engine.store().records(1).len(), 2);
}

#[test]
fn failed_commit_rolls_back_the_whole_transition() {
    let engine = two_step_engine();
    engine.submit(&submission(1)).unwrap();
    engine.sink().take();
    let before = engine.store().records(1);

    engine.store().fail_next_commit();
    let err = engine.decide(&approve(1, LEADER_A)).unwrap_err();
    assert!(matches!(err, ApprovalError::Storage(_)));
    assert_eq!(engine.store().records(1), before);
    assert!(engine.sink().take().is_empty(), "no notification for a rolled back transition");

    let retry = engine.decide(&approve(1, LEADER_A)).unwrap();
    assert!(matches!(retry, Outcome::Ok(_)));
}

#[test]
fn concurrent_decisions_keep_a_single_action_record() {
    let engine = Arc::new(two_step_engine());
    engine.submit(&submission(1)).unwrap();

    let handles: Vec<_> = (0..8).map(|_| {
                                    let engine = Arc::clone(&engine);
                                    thread::spawn(move || engine.decide(&approve(1, LEADER_A)).unwrap())
                                })
                                .collect();
    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    // A, B y PJ avanzan una vez cada uno; el resto llega con la cadena cerrada.
    let applied = outcomes.iter().filter(|o| matches!(o, Outcome::Ok(_))).count();
    let skipped = outcomes.iter().filter(|o| matches!(o, Outcome::DuplicateSkipped(_))).count();
    assert_eq!(applied, 3);
    assert_eq!(skipped, 5);
    assert_single_pointer(engine.store(), 1);
    assert_eq!(engine.store().item(1).unwrap().lifecycle_status, LifecycleStatus::Done);
}
