//! Construcción de la cadena al recibir un entregable.

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::constants::INITIAL_ROUND;
use crate::errors::ApprovalError;
use crate::model::{ApprovalStatus, ApprovalTier, ItemDetail, ItemDetailId, LifecycleStatus, NewApprovalRecord, StatusFlag,
                   TrackedFile, UserId, WorkflowStep};
use crate::notify::{Notification, TemplateKind};
use crate::store::ChainTx;

use super::outcome::SubmissionReport;

/// Evento de envío de un entregable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub item_detail_id: ItemDetailId,
    pub submitted_by: UserId,
    pub file: TrackedFile,
}

impl Submission {
    pub fn new(item_detail_id: ItemDetailId, submitted_by: UserId, file: TrackedFile) -> Self {
        Self { item_detail_id,
               submitted_by,
               file }
    }

    pub fn validate(&self) -> Result<(), ApprovalError> {
        if self.item_detail_id <= 0 {
            return Err(ApprovalError::Validation(format!("invalid item_detail_id: {}", self.item_detail_id)));
        }
        if self.submitted_by <= 0 {
            return Err(ApprovalError::Validation(format!("invalid submitted_by: {}", self.submitted_by)));
        }
        if self.file.file_name.trim().is_empty() {
            return Err(ApprovalError::Validation("file_name is required".into()));
        }
        Ok(())
    }
}

pub(crate) struct Built {
    pub report: SubmissionReport,
    pub notifications: Vec<Notification>,
}

/// Los pasos activos deben llegar ordenados, con `order` positivo y sin
/// repetidos; cualquier otra cosa es configuración corrupta.
fn ensure_total_order(steps: &[WorkflowStep]) -> Result<(), ApprovalError> {
    if let Some(bad) = steps.iter().find(|s| s.order <= 0) {
        return Err(ApprovalError::Internal(format!("workflow step order must be positive (department {}, order {})",
                                                   bad.department_id, bad.order)));
    }
    if let Some(w) = steps.windows(2).find(|w| w[0].order >= w[1].order) {
        return Err(ApprovalError::Internal(format!("workflow steps not totally ordered (department {}, order {} then {})",
                                                   w[1].department_id, w[0].order, w[1].order)));
    }
    Ok(())
}

/// Archiva la cadena vigente y construye una nueva a partir del workflow del
/// departamento del ítem. El ítem ya debe estar bloqueado por el llamador.
pub(crate) fn construct_chain(tx: &mut dyn ChainTx,
                              item: &ItemDetail,
                              submission: &Submission,
                              at: DateTime<Utc>)
                              -> Result<Built, ApprovalError> {
    let actor = submission.submitted_by;
    let file_was_new = tx.upsert_tracking_file(item.id, &submission.file, actor, at)?;
    let archived = tx.archive_active_records(item.id, actor, at)?;

    let steps = tx.active_workflow_steps(item.department_id)?;
    ensure_total_order(&steps)?;

    let mut first_approver = None;
    for (idx, step) in steps.iter().enumerate() {
        let rec = tx.insert_record(NewApprovalRecord { item_detail_id: item.id,
                                                       approver_id: step.approver_id,
                                                       level: step.order,
                                                       status: ApprovalStatus::Waiting,
                                                       is_action: idx == 0,
                                                       round: INITIAL_ROUND,
                                                       tier: ApprovalTier::Leader,
                                                       status_flag: StatusFlag::Active,
                                                       note: None,
                                                       created_at: at,
                                                       created_by: actor,
                                                       updated_by: actor })?;
        if idx == 0 {
            first_approver = Some(rec.approver_id);
        }
    }

    let mut notifications = Vec::new();
    let released = match first_approver {
        Some(approver) => {
            mark_waiting(tx, item, actor, at)?;
            // Sólo el primer archivo del ítem avisa al aprobador.
            if file_was_new {
                notifications.push(Notification::new(approver, TemplateKind::Submitted, item.id, None));
            }
            0
        }
        None => release_waiting(tx, item, actor, at)?,
    };
    debug!("chain built item={} department={} steps={} archived={} released={}",
           item.id,
           item.department_id,
           steps.len(),
           archived,
           released);

    Ok(Built { report: SubmissionReport { item_detail_id: item.id,
                                          chain_len: steps.len(),
                                          archived,
                                          first_approver,
                                          file_was_new },
               notifications })
}

/// El entregable entero (ítem y hermanos) pasa a `waiting`.
fn mark_waiting(tx: &mut dyn ChainTx, item: &ItemDetail, actor: UserId, at: DateTime<Utc>) -> Result<(), ApprovalError> {
    let mut touched_self = false;
    for sibling in tx.lock_siblings(item)? {
        touched_self |= sibling.id == item.id;
        tx.set_lifecycle_status(sibling.id, LifecycleStatus::Waiting, actor, at)?;
    }
    if !touched_self {
        tx.set_lifecycle_status(item.id, LifecycleStatus::Waiting, actor, at)?;
    }
    Ok(())
}

/// Sin cadena nueva: todo ítem del entregable que quedó en `waiting` sin
/// registros vigentes vuelve a `inprogress`.
fn release_waiting(tx: &mut dyn ChainTx,
                   item: &ItemDetail,
                   actor: UserId,
                   at: DateTime<Utc>)
                   -> Result<usize, ApprovalError> {
    let mut released = 0;
    for sibling in tx.lock_siblings(item)? {
        if sibling.lifecycle_status != LifecycleStatus::Waiting {
            continue;
        }
        if tx.records_for(sibling.id)?.iter().any(|r| r.is_live()) {
            continue;
        }
        tx.set_lifecycle_status(sibling.id, LifecycleStatus::InProgress, actor, at)?;
        released += 1;
    }
    Ok(released)
}
