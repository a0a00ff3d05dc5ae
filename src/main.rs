//! Recorrido de demostración sobre el store en memoria: un departamento con
//! dos líderes, envío, aprobaciones, escalado a control de proyecto y cierre.
//! Imprime la foto de la cadena en JSON tras cada paso.
use apqp_core::{ApprovalEngine, ApprovalStore, DecisionCommand, InMemoryApprovalStore, ItemDetail, ItemType,
                LifecycleStatus, NotificationSink, Outcome, Submission, TrackedFile, User, WorkflowStep};
use apqp_tracking::notifications::Notifier;
use apqp_tracking::service::respond;
use apqp_tracking::{AppConfig, AppError};
use log::info;

const DEPT: i64 = 1;
const LEADER_A: i64 = 10;
const LEADER_B: i64 = 11;
const SUBMITTER: i64 = 50;
const OWNER: i64 = 100;
const PJ_USER: i64 = 900;

fn seed() -> Result<InMemoryApprovalStore, AppError> {
    let store = InMemoryApprovalStore::new();
    store.add_user(User { id: LEADER_A,
                          department_id: DEPT })?;
    store.add_user(User { id: LEADER_B,
                          department_id: DEPT })?;
    store.add_workflow_step(WorkflowStep::active(DEPT, 1, LEADER_A))?;
    store.add_workflow_step(WorkflowStep::active(DEPT, 2, LEADER_B))?;
    for id in [1, 2] {
        store.add_item(ItemDetail { id,
                                    reference_id: 500,
                                    item_type: ItemType::Apqp,
                                    department_id: DEPT,
                                    owner_id: Some(OWNER),
                                    line_code: Some("L1".into()),
                                    lifecycle_status: LifecycleStatus::InProgress,
                                    created_by: Some(SUBMITTER),
                                    updated_at: None,
                                    updated_by: None })?;
    }
    Ok(store)
}

fn print_snapshot<S, N>(engine: &ApprovalEngine<S, N>, label: &str, id: i64) -> Result<(), AppError>
    where S: ApprovalStore,
          N: NotificationSink
{
    let outcome = engine.snapshot(id)?;
    if let Outcome::Ok(snap) = &outcome {
        println!("== {label}: item {id} view={:?} code={:?} pending_leaders={}",
                 snap.view,
                 snap.view.code(),
                 snap.pending_leaders());
    }
    let resp = respond(Ok(outcome));
    println!("{}",
             serde_json::to_string_pretty(&resp.body).map_err(|e| AppError::Config(format!("json: {e}")))?);
    Ok(())
}

fn run_walkthrough<S, N>(engine: &ApprovalEngine<S, N>) -> Result<(), AppError>
    where S: ApprovalStore,
          N: NotificationSink
{
    let file = TrackedFile::new("control-plan.xlsx", "/uploads/control-plan.xlsx");
    let batch = engine.submit_batch(&[Submission::new(1, SUBMITTER, file.clone()),
                                      Submission::new(2, SUBMITTER, file)])?;
    info!("batch submit: {}", batch.label());
    print_snapshot(engine, "tras el envío", 1)?;

    for (id, actor) in [(1, LEADER_A), (2, LEADER_A), (1, LEADER_B), (2, LEADER_B)] {
        let res = engine.decide(&DecisionCommand::new(id, "done", actor))?;
        info!("decide item={id} actor={actor}: {}", res.label());
    }
    print_snapshot(engine, "esperando control de proyecto", 1)?;

    let res = engine.decide(&DecisionCommand::new(1, "done", PJ_USER).with_note("ok PPAP"))?;
    info!("project control: {}", res.label());
    print_snapshot(engine, "cerrado", 1)?;
    print_snapshot(engine, "hermano", 2)?;

    // Repetir la decisión no cambia nada.
    let again = engine.decide(&DecisionCommand::new(1, "done", PJ_USER))?;
    println!("== repetido: {}", again.label());
    Ok(())
}

fn main() -> Result<(), AppError> {
    env_logger::init();
    let cfg = AppConfig::from_env()?;
    let rt = tokio::runtime::Runtime::new()?;
    let notifier = Notifier::start(cfg.notifications, &rt);

    let engine = ApprovalEngine::new(seed()?, notifier.sink.clone());
    let res = run_walkthrough(&engine);
    drop(engine);

    let stats = notifier.finish(&rt);
    println!("== notificaciones: enviadas={} fallidas={}", stats.sent, stats.failed);
    res
}
