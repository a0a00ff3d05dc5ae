//! Contrato de almacenamiento del engine.
//!
//! El engine no conoce SQL: toda la lógica de la cadena vive en el core y el
//! store sólo lee/escribe filas dentro de una unidad de trabajo atómica. Esto
//! mantiene paridad exacta entre el backend en memoria y el de Postgres.
//!
//! Contrato de `ApprovalStore::in_transaction`:
//! - Todas las lecturas/escrituras hechas vía `ChainTx` confirman o se revierten
//!   juntas.
//! - `ChainTx::lock_item` otorga exclusión mutua sobre el `ItemDetail` (y su
//!   cadena) hasta el fin de la transacción.
//! - El closure puede ejecutarse más de una vez si el backend reintenta un
//!   conflicto transitorio; por eso es `FnMut` y no debe tener efectos fuera de
//!   `ChainTx`.

mod memory;

pub use memory::InMemoryApprovalStore;

use chrono::{DateTime, Utc};

use crate::errors::ApprovalError;
use crate::model::{ApprovalRecord, DepartmentId, ItemDetail, ItemDetailId, LifecycleStatus, NewApprovalRecord,
                   TrackedFile, UserId, WorkflowStep};

/// Operaciones disponibles dentro de una transacción.
pub trait ChainTx {
    /// Lee el `ItemDetail` tomando el lock de escritura sobre su fila.
    fn lock_item(&mut self, id: ItemDetailId) -> Result<Option<ItemDetail>, ApprovalError>;
    /// Lee sin lock (proyecciones de sólo lectura).
    fn find_item(&mut self, id: ItemDetailId) -> Result<Option<ItemDetail>, ApprovalError>;
    /// Hermanos (mismo `reference_id` e `item_type`), incluido el propio, por id
    /// ascendente y bloqueados.
    fn lock_siblings(&mut self, item: &ItemDetail) -> Result<Vec<ItemDetail>, ApprovalError>;
    fn set_lifecycle_status(&mut self,
                            id: ItemDetailId,
                            status: LifecycleStatus,
                            actor: UserId,
                            at: DateTime<Utc>)
                            -> Result<(), ApprovalError>;

    fn has_tracking_file(&mut self, id: ItemDetailId) -> Result<bool, ApprovalError>;
    /// Inserta o actualiza el archivo rastreado. Devuelve `true` si la fila es
    /// nueva.
    fn upsert_tracking_file(&mut self,
                            id: ItemDetailId,
                            file: &TrackedFile,
                            actor: UserId,
                            at: DateTime<Utc>)
                            -> Result<bool, ApprovalError>;

    /// Pasos `active` del departamento, ordenados por `order` ascendente.
    fn active_workflow_steps(&mut self, department_id: DepartmentId) -> Result<Vec<WorkflowStep>, ApprovalError>;
    fn user_department(&mut self, user_id: UserId) -> Result<Option<DepartmentId>, ApprovalError>;

    /// Todos los registros del ítem (vigentes e históricos) por `level`, `id`.
    fn records_for(&mut self, id: ItemDetailId) -> Result<Vec<ApprovalRecord>, ApprovalError>;
    fn insert_record(&mut self, record: NewApprovalRecord) -> Result<ApprovalRecord, ApprovalError>;
    /// Persiste los campos mutables de un registro vigente. Falla si el registro
    /// está archivado.
    fn save_record(&mut self, record: &ApprovalRecord) -> Result<(), ApprovalError>;
    /// Archiva (`inactive`, `is_action = false`) todos los registros vigentes del
    /// ítem. Devuelve la cantidad afectada.
    fn archive_active_records(&mut self, id: ItemDetailId, actor: UserId, at: DateTime<Utc>) -> Result<usize, ApprovalError>;

    /// Registros de acción `Leader` en espera asignados al aprobador, por ítem.
    fn pending_actions(&mut self, approver_id: UserId) -> Result<Vec<ApprovalRecord>, ApprovalError>;
}

/// Backend transaccional del engine.
pub trait ApprovalStore: Send + Sync {
    /// Ejecuta `f` en una transacción de lectura/escritura.
    fn in_transaction<T, F>(&self, f: F) -> Result<T, ApprovalError>
        where F: FnMut(&mut dyn ChainTx) -> Result<T, ApprovalError>;

    /// Ejecuta `f` sin confirmar escrituras. Usado por las proyecciones.
    fn read_only<T, F>(&self, f: F) -> Result<T, ApprovalError>
        where F: FnMut(&mut dyn ChainTx) -> Result<T, ApprovalError>;
}
