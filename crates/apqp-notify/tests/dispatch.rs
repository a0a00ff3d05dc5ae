use std::sync::{Arc, Mutex};

use apqp_core::notify::{Notification, NotificationSink, NotifyError, TemplateKind};
use apqp_core::{ApprovalEngine, DecisionCommand, InMemoryApprovalStore, ItemDetail, ItemType, LifecycleStatus,
                Submission, TrackedFile, User, WorkflowStep};
use apqp_notify::{channel, DispatchStats, Mailer};
use async_trait::async_trait;

#[derive(Default, Clone)]
struct CollectingMailer {
    sent: Arc<Mutex<Vec<Notification>>>,
}

#[async_trait]
impl Mailer for CollectingMailer {
    async fn send(&self, n: &Notification) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(n.clone());
        Ok(())
    }
}

struct BrokenMailer;

#[async_trait]
impl Mailer for BrokenMailer {
    async fn send(&self, _n: &Notification) -> Result<(), NotifyError> {
        Err(NotifyError::Delivery("smtp 550".into()))
    }
}

#[tokio::test]
async fn dispatcher_drains_until_senders_drop() {
    let (sink, queue) = channel();
    let mailer = CollectingMailer::default();
    let handle = queue.spawn(mailer.clone());
    for i in 0..3 {
        sink.deliver(&Notification::new(i, TemplateKind::Approved, 9, None)).unwrap();
    }
    drop(sink);
    let stats = handle.await.unwrap();
    assert_eq!(stats, DispatchStats { sent: 3, failed: 0 });
    let ids: Vec<i64> = mailer.sent.lock().unwrap().iter().map(|n| n.recipient_id).collect();
    assert_eq!(ids, vec![0, 1, 2]);
}

#[tokio::test]
async fn mailer_failures_are_counted_not_raised() {
    let (sink, queue) = channel();
    let handle = queue.spawn(BrokenMailer);
    sink.deliver(&Notification::new(1, TemplateKind::Rejected, 2, Some("bad".into()))).unwrap();
    drop(sink);
    assert_eq!(handle.await.unwrap(), DispatchStats { sent: 0, failed: 1 });
}

#[test]
fn engine_notifications_reach_the_mailer_after_commit() {
    let store = InMemoryApprovalStore::new();
    store.add_user(User { id: 10, department_id: 1 }).unwrap();
    store.add_workflow_step(WorkflowStep::active(1, 1, 10)).unwrap();
    store.add_item(ItemDetail { id: 1,
                                reference_id: 1,
                                item_type: ItemType::Apqp,
                                department_id: 1,
                                owner_id: Some(20),
                                line_code: None,
                                lifecycle_status: LifecycleStatus::InProgress,
                                created_by: None,
                                updated_at: None,
                                updated_by: None })
         .unwrap();

    let rt = tokio::runtime::Runtime::new().unwrap();
    let (sink, queue) = channel();
    let mailer = CollectingMailer::default();
    let handle = rt.spawn(queue.run(mailer.clone()));

    let engine = ApprovalEngine::new(store, sink);
    engine.submit(&Submission::new(1, 30, TrackedFile::new("psw.pdf", "/u/psw.pdf"))).unwrap();
    engine.decide(&DecisionCommand::new(1, "done", 10)).unwrap();
    drop(engine);

    let stats = rt.block_on(handle).unwrap();
    // submitted al líder, approved al remitente y al dueño
    assert_eq!(stats.sent, 3);
    let kinds: Vec<TemplateKind> = mailer.sent.lock().unwrap().iter().map(|n| n.kind).collect();
    assert_eq!(kinds, vec![TemplateKind::Submitted, TemplateKind::Approved, TemplateKind::Approved]);
}
