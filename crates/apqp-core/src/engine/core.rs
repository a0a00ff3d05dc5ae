//! `ApprovalEngine`: API pública del motor de aprobaciones.

use chrono::Utc;
use log::{debug, error, warn};

use crate::engine::construct::{construct_chain, Submission};
use crate::engine::outcome::{BatchReport, DecisionReport, Outcome};
use crate::engine::transition::{apply_decision, DecisionCommand, Transition};
use crate::errors::ApprovalError;
use crate::model::{ApprovalRecord, ItemDetail, ItemDetailId, UserId};
use crate::notify::{Notification, NotificationSink};
use crate::projection::ChainSnapshot;
use crate::store::ApprovalStore;

use super::outcome::SubmissionReport;

/// Ítem con el registro de acción que espera a un aprobador.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PendingApproval {
    pub item: ItemDetail,
    pub record: ApprovalRecord,
}

/// Motor de aprobaciones secuenciales.
///
/// Cada operación mutante corre en una única transacción del store; las
/// notificaciones producidas se entregan al sink sólo después del commit y sus
/// fallos se registran sin propagarse.
#[derive(Debug)]
pub struct ApprovalEngine<S, N>
    where S: ApprovalStore,
          N: NotificationSink
{
    store: S,
    sink: N,
}

impl<S, N> ApprovalEngine<S, N>
    where S: ApprovalStore,
          N: NotificationSink
{
    pub fn new(store: S, sink: N) -> Self {
        Self { store, sink }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn sink(&self) -> &N {
        &self.sink
    }

    /// Construye (o reconstruye) la cadena de un ítem a partir de su envío.
    pub fn submit(&self, submission: &Submission) -> Result<Outcome<SubmissionReport>, ApprovalError> {
        if let Err(e) = submission.validate() {
            return Outcome::from_error(e);
        }
        let at = Utc::now();
        let id = submission.item_detail_id;
        debug!("submit start item={} by={}", id, submission.submitted_by);
        let res = self.store.in_transaction(|tx| {
                                let item = tx.lock_item(id)?.ok_or(ApprovalError::ItemNotFound(id))?;
                                construct_chain(tx, &item, submission, at)
                            });
        match res {
            Ok(built) => {
                self.dispatch(built.notifications);
                Ok(Outcome::Ok(built.report))
            }
            Err(e) => self.fail("submit", id, e),
        }
    }

    /// Varios envíos en una sola transacción (todo o nada). Los ids se
    /// procesan en orden ascendente; los repetidos se informan y no se
    /// reprocesan.
    pub fn submit_batch(&self, submissions: &[Submission]) -> Result<Outcome<BatchReport>, ApprovalError> {
        if submissions.is_empty() {
            return Ok(Outcome::Ok(BatchReport::default()));
        }
        for s in submissions {
            if let Err(e) = s.validate() {
                return Outcome::from_error(e);
            }
        }
        let mut ordered: Vec<&Submission> = submissions.iter().collect();
        ordered.sort_by_key(|s| s.item_detail_id);
        let mut unique: Vec<&Submission> = Vec::with_capacity(ordered.len());
        let mut duplicates_skipped = Vec::new();
        for s in ordered {
            match unique.last() {
                Some(prev) if prev.item_detail_id == s.item_detail_id => duplicates_skipped.push(s.item_detail_id),
                _ => unique.push(s),
            }
        }

        let at = Utc::now();
        debug!("submit_batch start items={} duplicates={}", unique.len(), duplicates_skipped.len());
        let res = self.store.in_transaction(|tx| {
                                let mut reports = Vec::with_capacity(unique.len());
                                let mut notifications = Vec::new();
                                for s in &unique {
                                    let id = s.item_detail_id;
                                    let item = tx.lock_item(id)?.ok_or(ApprovalError::ItemNotFound(id))?;
                                    let built = construct_chain(tx, &item, s, at)?;
                                    reports.push(built.report);
                                    notifications.extend(built.notifications);
                                }
                                Ok((reports, notifications))
                            });
        match res {
            Ok((submitted, notifications)) => {
                self.dispatch(notifications);
                Ok(Outcome::Ok(BatchReport { submitted,
                                             duplicates_skipped }))
            }
            Err(e) => self.fail("submit_batch", 0, e),
        }
    }

    /// Aplica una decisión sobre el ítem indicado.
    pub fn decide(&self, cmd: &DecisionCommand) -> Result<Outcome<DecisionReport>, ApprovalError> {
        let decision = match cmd.validate() {
            Ok(d) => d,
            Err(e) => return Outcome::from_error(e),
        };
        let at = Utc::now();
        let id = cmd.item_detail_id;
        debug!("decide start item={} decision={:?} actor={}", id, decision, cmd.actor);
        let res = self.store.in_transaction(|tx| {
                                let item = tx.lock_item(id)?.ok_or(ApprovalError::ItemNotFound(id))?;
                                apply_decision(tx, &item, decision, cmd, at)
                            });
        match res {
            Ok(applied) => {
                let report = DecisionReport { item_detail_id: id,
                                              transition: applied.transition,
                                              rounds_bumped: applied.rounds_bumped,
                                              notifications: applied.notifications.len() };
                self.dispatch(applied.notifications);
                if report.transition == Transition::NoChange {
                    Ok(Outcome::DuplicateSkipped(report))
                } else {
                    Ok(Outcome::Ok(report))
                }
            }
            Err(e) => self.fail("decide", id, e),
        }
    }

    /// Proyección de sólo lectura de la cadena de un ítem.
    pub fn snapshot(&self, id: ItemDetailId) -> Result<Outcome<ChainSnapshot>, ApprovalError> {
        if id <= 0 {
            return Ok(Outcome::ValidationFailed(format!("invalid item_detail_id: {id}")));
        }
        let res = self.store.read_only(|tx| {
                                let item = tx.find_item(id)?.ok_or(ApprovalError::ItemNotFound(id))?;
                                let has_file = tx.has_tracking_file(id)?;
                                let records = tx.records_for(id)?;
                                Ok(ChainSnapshot::build(item, has_file, records))
                            });
        match res {
            Ok(snap) => Ok(Outcome::Ok(snap)),
            Err(e) => Outcome::from_error(e),
        }
    }

    /// Bandeja de pendientes de un aprobador, por id de ítem.
    pub fn pending_for(&self, approver_id: UserId) -> Result<Vec<PendingApproval>, ApprovalError> {
        self.store.read_only(|tx| {
                      let mut out = Vec::new();
                      for record in tx.pending_actions(approver_id)? {
                          match tx.find_item(record.item_detail_id)? {
                              Some(item) => out.push(PendingApproval { item, record }),
                              None => warn!("pending record {} points to missing item {}", record.id, record.item_detail_id),
                          }
                      }
                      Ok(out)
                  })
    }

    pub fn pending_count(&self, approver_id: UserId) -> Result<usize, ApprovalError> {
        Ok(self.pending_for(approver_id)?.len())
    }

    /// Entrega post-commit. Los fallos sólo se registran.
    fn dispatch(&self, notifications: Vec<Notification>) {
        for n in notifications {
            if let Err(e) = self.sink.deliver(&n) {
                warn!("notification dropped recipient={} kind={:?} item={}: {}",
                      n.recipient_id,
                      n.kind,
                      n.item_detail_id,
                      e);
            }
        }
    }

    fn fail<T>(&self, op: &str, id: ItemDetailId, err: ApprovalError) -> Result<Outcome<T>, ApprovalError> {
        if !err.is_client_error() {
            error!("{op} failed item={id}: {err}");
        }
        Outcome::from_error(err)
    }
}
