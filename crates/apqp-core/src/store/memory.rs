//! Store en memoria.
//!
//! Un único `Mutex` sobre todo el estado da la garantía de escritor único: cada
//! transacción trabaja sobre una copia y sólo la publica al confirmar, así que
//! un error en mitad del closure deja el estado intacto (rollback).
//!
//! Replica las restricciones del esquema Postgres que el engine asume:
//! puntero de acción único por ítem y registros archivados inmutables.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::{ApprovalStore, ChainTx};
use crate::errors::ApprovalError;
use crate::model::{ApprovalRecord, ApprovalStatus, ApprovalTier, DepartmentId, ItemDetail, ItemDetailId,
                   LifecycleStatus, NewApprovalRecord, StatusFlag, TrackedFile, User, UserId, WorkflowStep};

#[derive(Debug, Clone)]
struct TrackingRow {
    file: TrackedFile,
    updated_by: UserId,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: HashMap<UserId, User>,
    steps: Vec<WorkflowStep>,
    items: BTreeMap<ItemDetailId, ItemDetail>,
    files: HashMap<ItemDetailId, TrackingRow>,
    records: Vec<ApprovalRecord>,
    next_record_id: i64,
}

impl MemoryState {
    fn pointer_taken(&self, item: ItemDetailId, except: Option<i64>) -> bool {
        self.records
            .iter()
            .any(|r| r.item_detail_id == item && r.is_current_action() && Some(r.id) != except)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryApprovalStore {
    state: Mutex<MemoryState>,
    fail_next_commit: AtomicBool,
}

impl InMemoryApprovalStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, ApprovalError> {
        self.state
            .lock()
            .map_err(|_| ApprovalError::Storage("in-memory store poisoned".into()))
    }

    /// Alta de usuario (dato maestro externo al engine).
    pub fn add_user(&self, user: User) -> Result<(), ApprovalError> {
        self.lock()?.users.insert(user.id, user);
        Ok(())
    }

    /// Alta de paso de workflow. Rechaza un `order` repetido entre pasos activos
    /// del mismo departamento (mismo contrato que el índice único en Postgres).
    pub fn add_workflow_step(&self, step: WorkflowStep) -> Result<(), ApprovalError> {
        let mut state = self.lock()?;
        let duplicate = step.status == StatusFlag::Active
                        && state.steps.iter().any(|s| {
                                                  s.status == StatusFlag::Active
                                                  && s.department_id == step.department_id
                                                  && s.order == step.order
                                              });
        if duplicate {
            return Err(ApprovalError::Storage(format!("unique violation: department {} already has active order {}",
                                                      step.department_id, step.order)));
        }
        state.steps.push(step);
        Ok(())
    }

    pub fn add_item(&self, item: ItemDetail) -> Result<(), ApprovalError> {
        self.lock()?.items.insert(item.id, item);
        Ok(())
    }

    pub fn item(&self, id: ItemDetailId) -> Option<ItemDetail> {
        self.lock().ok()?.items.get(&id).cloned()
    }

    /// Registros del ítem (vigentes e históricos) en orden de inserción.
    pub fn records(&self, id: ItemDetailId) -> Vec<ApprovalRecord> {
        self.lock()
            .map(|s| s.records.iter().filter(|r| r.item_detail_id == id).cloned().collect())
            .unwrap_or_default()
    }

    pub fn tracking_file(&self, id: ItemDetailId) -> Option<TrackedFile> {
        self.lock().ok()?.files.get(&id).map(|row| row.file.clone())
    }

    /// Hace fallar el próximo commit (una sola vez). Permite verificar que una
    /// transición fallida no deja estado parcial.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }
}

impl ApprovalStore for InMemoryApprovalStore {
    fn in_transaction<T, F>(&self, mut f: F) -> Result<T, ApprovalError>
        where F: FnMut(&mut dyn ChainTx) -> Result<T, ApprovalError>
    {
        let mut guard = self.lock()?;
        let mut working = guard.clone();
        let out = f(&mut MemoryTx { state: &mut working })?;
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(ApprovalError::Storage("commit failed (injected)".into()));
        }
        *guard = working;
        Ok(out)
    }

    fn read_only<T, F>(&self, mut f: F) -> Result<T, ApprovalError>
        where F: FnMut(&mut dyn ChainTx) -> Result<T, ApprovalError>
    {
        let guard = self.lock()?;
        let mut scratch = guard.clone();
        drop(guard);
        f(&mut MemoryTx { state: &mut scratch })
    }
}

struct MemoryTx<'a> {
    state: &'a mut MemoryState,
}

impl ChainTx for MemoryTx<'_> {
    fn lock_item(&mut self, id: ItemDetailId) -> Result<Option<ItemDetail>, ApprovalError> {
        Ok(self.state.items.get(&id).cloned())
    }

    fn find_item(&mut self, id: ItemDetailId) -> Result<Option<ItemDetail>, ApprovalError> {
        Ok(self.state.items.get(&id).cloned())
    }

    fn lock_siblings(&mut self, item: &ItemDetail) -> Result<Vec<ItemDetail>, ApprovalError> {
        Ok(self.state
               .items
               .values()
               .filter(|i| i.is_sibling_of(item))
               .cloned()
               .collect())
    }

    fn set_lifecycle_status(&mut self,
                            id: ItemDetailId,
                            status: LifecycleStatus,
                            actor: UserId,
                            at: DateTime<Utc>)
                            -> Result<(), ApprovalError> {
        let item = self.state
                       .items
                       .get_mut(&id)
                       .ok_or_else(|| ApprovalError::Storage(format!("item detail {id} vanished inside transaction")))?;
        item.lifecycle_status = status;
        item.updated_by = Some(actor);
        item.updated_at = Some(at);
        Ok(())
    }

    fn has_tracking_file(&mut self, id: ItemDetailId) -> Result<bool, ApprovalError> {
        Ok(self.state.files.contains_key(&id))
    }

    fn upsert_tracking_file(&mut self,
                            id: ItemDetailId,
                            file: &TrackedFile,
                            actor: UserId,
                            at: DateTime<Utc>)
                            -> Result<bool, ApprovalError> {
        let is_new = !self.state.files.contains_key(&id);
        self.state.files.insert(id,
                                TrackingRow { file: file.clone(),
                                              updated_by: actor,
                                              updated_at: at });
        Ok(is_new)
    }

    fn active_workflow_steps(&mut self, department_id: DepartmentId) -> Result<Vec<WorkflowStep>, ApprovalError> {
        let mut steps: Vec<WorkflowStep> = self.state
                                               .steps
                                               .iter()
                                               .filter(|s| s.department_id == department_id && s.status == StatusFlag::Active)
                                               .cloned()
                                               .collect();
        steps.sort_by_key(|s| s.order);
        Ok(steps)
    }

    fn user_department(&mut self, user_id: UserId) -> Result<Option<DepartmentId>, ApprovalError> {
        Ok(self.state.users.get(&user_id).map(|u| u.department_id))
    }

    fn records_for(&mut self, id: ItemDetailId) -> Result<Vec<ApprovalRecord>, ApprovalError> {
        let mut out: Vec<ApprovalRecord> = self.state
                                               .records
                                               .iter()
                                               .filter(|r| r.item_detail_id == id)
                                               .cloned()
                                               .collect();
        out.sort_by_key(|r| (r.level, r.id));
        Ok(out)
    }

    fn insert_record(&mut self, record: NewApprovalRecord) -> Result<ApprovalRecord, ApprovalError> {
        if record.is_action
           && record.status_flag == StatusFlag::Active
           && self.state.pointer_taken(record.item_detail_id, None)
        {
            return Err(ApprovalError::Storage(format!("unique violation: item {} already has an action record",
                                                      record.item_detail_id)));
        }
        self.state.next_record_id += 1;
        let row = ApprovalRecord { id: self.state.next_record_id,
                                   item_detail_id: record.item_detail_id,
                                   approver_id: record.approver_id,
                                   level: record.level,
                                   status: record.status,
                                   is_action: record.is_action,
                                   round: record.round,
                                   tier: record.tier,
                                   status_flag: record.status_flag,
                                   note: record.note,
                                   created_at: record.created_at,
                                   created_by: record.created_by,
                                   updated_at: record.created_at,
                                   updated_by: record.updated_by };
        self.state.records.push(row.clone());
        Ok(row)
    }

    fn save_record(&mut self, record: &ApprovalRecord) -> Result<(), ApprovalError> {
        if record.is_current_action() && self.state.pointer_taken(record.item_detail_id, Some(record.id)) {
            return Err(ApprovalError::Storage(format!("unique violation: item {} already has an action record",
                                                      record.item_detail_id)));
        }
        let stored = self.state
                         .records
                         .iter_mut()
                         .find(|r| r.id == record.id)
                         .ok_or_else(|| ApprovalError::Storage(format!("approval record {} not found", record.id)))?;
        if !stored.is_live() {
            return Err(ApprovalError::Internal(format!("approval record {} is archived", record.id)));
        }
        stored.status = record.status;
        stored.is_action = record.is_action;
        stored.round = record.round;
        stored.status_flag = record.status_flag;
        stored.note = record.note.clone();
        stored.updated_at = record.updated_at;
        stored.updated_by = record.updated_by;
        Ok(())
    }

    fn archive_active_records(&mut self, id: ItemDetailId, actor: UserId, at: DateTime<Utc>) -> Result<usize, ApprovalError> {
        let mut count = 0;
        for r in self.state.records.iter_mut().filter(|r| r.item_detail_id == id && r.is_live()) {
            r.status_flag = StatusFlag::Inactive;
            r.is_action = false;
            r.updated_by = actor;
            r.updated_at = at;
            count += 1;
        }
        Ok(count)
    }

    fn pending_actions(&mut self, approver_id: UserId) -> Result<Vec<ApprovalRecord>, ApprovalError> {
        let mut out: Vec<ApprovalRecord> = self.state
                                               .records
                                               .iter()
                                               .filter(|r| {
                                                   r.approver_id == approver_id
                                                   && r.is_current_action()
                                                   && r.tier == ApprovalTier::Leader
                                                   && r.status == ApprovalStatus::Waiting
                                               })
                                               .cloned()
                                               .collect();
        out.sort_by_key(|r| r.item_detail_id);
        Ok(out)
    }
}
