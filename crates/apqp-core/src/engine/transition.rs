//! Transición de la cadena ante una decisión (aprobar / rechazar).
//!
//! Todas las funciones reciben el ítem ya bloqueado y trabajan sólo vía
//! `ChainTx`; las notificaciones se devuelven para despacharse tras el commit.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::constants::{INITIAL_ROUND, VALID_DECISIONS};
use crate::errors::ApprovalError;
use crate::model::{ApprovalRecord, ApprovalStatus, ApprovalTier, ItemDetail, ItemDetailId, LifecycleStatus,
                   NewApprovalRecord, UserId};
use crate::notify::{Notification, TemplateKind};
use crate::store::ChainTx;

/// Decisión ya validada.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    /// `done`
    Approve,
    /// `reject`
    Reject,
    /// `inprogress`, `delay` o `waiting`: válidos pero sin efecto sobre la
    /// cadena.
    Hold(LifecycleStatus),
}

impl FromStr for Decision {
    type Err = ApprovalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Coincidencia exacta: sin recorte ni cambio de mayúsculas.
        if !VALID_DECISIONS.contains(&s) {
            return Err(ApprovalError::Validation(format!("invalid decision '{s}' (expected one of {})",
                                                         VALID_DECISIONS.join(", "))));
        }
        match s {
            "done" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            other => Ok(Self::Hold(other.parse()?)),
        }
    }
}

/// Comando de decisión, dirigido al ítem (no al registro).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionCommand {
    pub item_detail_id: ItemDetailId,
    pub decision: String,
    pub actor: UserId,
    pub note: Option<String>,
}

impl DecisionCommand {
    pub fn new(item_detail_id: ItemDetailId, decision: impl Into<String>, actor: UserId) -> Self {
        Self { item_detail_id,
               decision: decision.into(),
               actor,
               note: None }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Valida el comando y devuelve la decisión interpretada.
    pub fn validate(&self) -> Result<Decision, ApprovalError> {
        if self.item_detail_id <= 0 {
            return Err(ApprovalError::Validation(format!("invalid item_detail_id: {}", self.item_detail_id)));
        }
        if self.actor <= 0 {
            return Err(ApprovalError::Validation(format!("invalid actor: {}", self.actor)));
        }
        self.decision.parse()
    }

    fn note(&self) -> Option<&str> {
        self.note.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }
}

/// Qué le pasó a la cadena.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transition {
    /// El puntero de acción pasó al siguiente líder.
    Promoted {
        from_level: i32,
        to_level: i32,
        next_approver: UserId,
    },
    /// No quedaban líderes: se insertó el registro PJ.
    EscalatedToProjectControl { pj_record_id: i64, approver_id: UserId },
    Rejected { level: i32, short_circuited: usize },
    /// Decisión PJ aplicada al ítem y sus hermanos.
    Finalized {
        lifecycle: LifecycleStatus,
        items: Vec<ItemDetailId>,
    },
    /// Sin registro de acción: se actualizaron en bloque los registros en espera.
    BulkApplied { rows: usize },
    NoChange,
}

pub(crate) struct Applied {
    pub transition: Transition,
    pub rounds_bumped: usize,
    pub notifications: Vec<Notification>,
}

impl Applied {
    fn unchanged() -> Self {
        Self { transition: Transition::NoChange,
               rounds_bumped: 0,
               notifications: Vec::new() }
    }
}

pub(crate) fn apply_decision(tx: &mut dyn ChainTx,
                             item: &ItemDetail,
                             decision: Decision,
                             cmd: &DecisionCommand,
                             at: DateTime<Utc>)
                             -> Result<Applied, ApprovalError> {
    if let Decision::Hold(_) = decision {
        return Ok(Applied::unchanged());
    }
    let records = tx.records_for(item.id)?;
    let current = records.iter().find(|r| r.is_current_action()).cloned();
    let applied = match current {
        Some(rec) if rec.status.is_terminal() => Applied::unchanged(),
        Some(rec) if rec.tier == ApprovalTier::Pj => finalize(tx, item, rec, decision, cmd, at)?,
        Some(rec) => leader_decision(tx, item, &records, rec, decision, cmd, at)?,
        None => fallback(tx, item, &records, decision, cmd, at)?,
    };
    debug!("decision applied item={} actor={} transition={:?} rounds_bumped={}",
           item.id,
           cmd.actor,
           applied.transition,
           applied.rounds_bumped);
    Ok(applied)
}

fn leader_decision(tx: &mut dyn ChainTx,
                   item: &ItemDetail,
                   records: &[ApprovalRecord],
                   current: ApprovalRecord,
                   decision: Decision,
                   cmd: &DecisionCommand,
                   at: DateTime<Utc>)
                   -> Result<Applied, ApprovalError> {
    let actor = cmd.actor;
    let submitter = current.created_by;
    let transition = match decision {
        Decision::Reject => {
            let mut short_circuited = 0;
            for other in records.iter().filter(|r| r.id != current.id && r.is_pending_leader()) {
                let mut other = other.clone();
                other.decide(ApprovalStatus::Reject, cmd.note(), actor, at);
                tx.save_record(&other)?;
                short_circuited += 1;
            }
            // El registro rechazado conserva el puntero como rastro.
            let mut rec = current;
            rec.decide(ApprovalStatus::Reject, cmd.note(), actor, at);
            tx.save_record(&rec)?;
            Transition::Rejected { level: rec.level,
                                   short_circuited }
        }
        Decision::Approve => {
            let mut rec = current;
            rec.decide(ApprovalStatus::Approve, None, actor, at);
            rec.is_action = false;
            // Se libera el puntero antes de asignarlo a otro registro.
            tx.save_record(&rec)?;

            let next = records.iter()
                              .filter(|r| r.id != rec.id && r.is_pending_leader())
                              .min_by_key(|r| (r.level, r.id))
                              .cloned();
            match next {
                Some(mut next) => {
                    next.is_action = true;
                    next.updated_by = actor;
                    next.updated_at = at;
                    tx.save_record(&next)?;
                    Transition::Promoted { from_level: rec.level,
                                           to_level: next.level,
                                           next_approver: next.approver_id }
                }
                None => {
                    let pj = tx.insert_record(NewApprovalRecord { item_detail_id: item.id,
                                                                  approver_id: rec.approver_id,
                                                                  level: rec.level,
                                                                  status: ApprovalStatus::Waiting,
                                                                  is_action: true,
                                                                  round: INITIAL_ROUND,
                                                                  tier: ApprovalTier::Pj,
                                                                  status_flag: rec.status_flag,
                                                                  note: None,
                                                                  created_at: at,
                                                                  created_by: rec.created_by,
                                                                  updated_by: actor })?;
                    Transition::EscalatedToProjectControl { pj_record_id: pj.id,
                                                            approver_id: pj.approver_id }
                }
            }
        }
        Decision::Hold(_) => return Ok(Applied::unchanged()),
    };

    let rounds_bumped = match decision {
        Decision::Approve => bump_rounds(tx, item)?,
        _ => 0,
    };
    let notifications = closing_notifications(tx, item, decision, cmd, Some(submitter))?;
    Ok(Applied { transition,
                 rounds_bumped,
                 notifications })
}

/// Decisión de control de proyecto: cierra el ítem y sus hermanos.
fn finalize(tx: &mut dyn ChainTx,
            item: &ItemDetail,
            current: ApprovalRecord,
            decision: Decision,
            cmd: &DecisionCommand,
            at: DateTime<Utc>)
            -> Result<Applied, ApprovalError> {
    let (status, lifecycle, kind) = match decision {
        Decision::Approve => (ApprovalStatus::Approve, LifecycleStatus::Done, TemplateKind::Approved),
        Decision::Reject => (ApprovalStatus::Reject, LifecycleStatus::Reject, TemplateKind::Rejected),
        Decision::Hold(_) => return Ok(Applied::unchanged()),
    };
    let actor = cmd.actor;

    let mut rec = current;
    rec.decide(status, cmd.note(), actor, at);
    tx.save_record(&rec)?;

    let mut items = Vec::new();
    for sibling in tx.lock_siblings(item)? {
        tx.set_lifecycle_status(sibling.id, lifecycle, actor, at)?;
        items.push(sibling.id);
        if sibling.id == item.id {
            continue;
        }
        let waiting_pj: Vec<ApprovalRecord> = tx.records_for(sibling.id)?
                                                .into_iter()
                                                .filter(|r| {
                                                    r.is_current_action()
                                                    && r.tier == ApprovalTier::Pj
                                                    && r.status == ApprovalStatus::Waiting
                                                })
                                                .collect();
        for mut r in waiting_pj {
            r.decide(status, cmd.note(), actor, at);
            tx.save_record(&r)?;
        }
    }
    if !items.contains(&item.id) {
        tx.set_lifecycle_status(item.id, lifecycle, actor, at)?;
        items.push(item.id);
    }

    let notifications = item.owner_id
                            .map(|owner| {
                                vec![Notification::new(owner, kind, item.id, cmd.note().map(str::to_string))]
                            })
                            .unwrap_or_default();
    Ok(Applied { transition: Transition::Finalized { lifecycle, items },
                 rounds_bumped: 0,
                 notifications })
}

/// Sin registro de acción (datos derivados): se aplica el estado a los
/// registros vigentes en espera. Cero filas no es un error.
fn fallback(tx: &mut dyn ChainTx,
            item: &ItemDetail,
            records: &[ApprovalRecord],
            decision: Decision,
            cmd: &DecisionCommand,
            at: DateTime<Utc>)
            -> Result<Applied, ApprovalError> {
    let (status, note) = match decision {
        Decision::Approve => (ApprovalStatus::Approve, None),
        Decision::Reject => (ApprovalStatus::Reject, cmd.note()),
        Decision::Hold(_) => return Ok(Applied::unchanged()),
    };
    let mut rows = 0;
    let mut submitter = None;
    for r in records.iter().filter(|r| r.is_live() && r.status == ApprovalStatus::Waiting) {
        let mut r = r.clone();
        r.decide(status, note, cmd.actor, at);
        tx.save_record(&r)?;
        submitter.get_or_insert(r.created_by);
        rows += 1;
    }
    if rows == 0 {
        return Ok(Applied::unchanged());
    }
    let rounds_bumped = match decision {
        Decision::Approve => bump_rounds(tx, item)?,
        _ => 0,
    };
    let notifications = closing_notifications(tx, item, decision, cmd, submitter)?;
    Ok(Applied { transition: Transition::BulkApplied { rows },
                 rounds_bumped,
                 notifications })
}

/// Incrementa `round` en los registros de acción vigentes cuyo aprobador
/// pertenece al departamento del ítem.
fn bump_rounds(tx: &mut dyn ChainTx, item: &ItemDetail) -> Result<usize, ApprovalError> {
    let mut bumped = 0;
    for mut r in tx.records_for(item.id)?.into_iter().filter(|r| r.is_current_action()) {
        if tx.user_department(r.approver_id)? == Some(item.department_id) {
            r.round += 1;
            tx.save_record(&r)?;
            bumped += 1;
        }
    }
    Ok(bumped)
}

/// Notificaciones de cierre; vacías mientras quede un líder con el puntero.
fn closing_notifications(tx: &mut dyn ChainTx,
                         item: &ItemDetail,
                         decision: Decision,
                         cmd: &DecisionCommand,
                         submitter: Option<UserId>)
                         -> Result<Vec<Notification>, ApprovalError> {
    let leader_pending = tx.records_for(item.id)?
                           .iter()
                           .any(|r| r.is_current_action() && r.is_pending_leader());
    if leader_pending {
        return Ok(Vec::new());
    }
    let out = match decision {
        Decision::Reject => item.owner_id
                                .map(|owner| {
                                    vec![Notification::new(owner,
                                                           TemplateKind::Rejected,
                                                           item.id,
                                                           cmd.note().map(str::to_string))]
                                })
                                .unwrap_or_default(),
        Decision::Approve => {
            let mut recipients: Vec<UserId> = Vec::new();
            for r in [submitter, item.owner_id].into_iter().flatten() {
                if !recipients.contains(&r) {
                    recipients.push(r);
                }
            }
            recipients.into_iter()
                      .map(|r| Notification::new(r, TemplateKind::Approved, item.id, None))
                      .collect()
        }
        Decision::Hold(_) => Vec::new(),
    };
    Ok(out)
}
