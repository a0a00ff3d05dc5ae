//! Implementación Postgres (Diesel) de `ApprovalStore`.
//!
//! - Toda la lógica de la cadena vive en `apqp-core`; aquí sólo se traducen las
//!   operaciones de `ChainTx` a SQL, con paridad 1:1 respecto al store en
//!   memoria.
//! - Exclusión mutua por ítem: `lock_item` hace `SELECT ... FOR UPDATE` sobre
//!   `item_details` antes de leer la cadena.
//! - El puntero de acción único lo garantiza además el índice parcial
//!   `ux_approval_records_action`.
//! - Errores transitorios (serialización, deadlock, pool) reintentan la unidad
//!   de trabajo completa.

mod rows;

use std::time::Duration;

use apqp_core::errors::ApprovalError;
use apqp_core::model::{ApprovalRecord, ApprovalStatus, ApprovalTier, DepartmentId, ItemDetail, ItemDetailId,
                       LifecycleStatus, NewApprovalRecord, StatusFlag, TrackedFile, UserId, WorkflowStep};
use apqp_core::store::{ApprovalStore, ChainTx};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use diesel::result::Error as DieselError;
use log::{debug, warn};

pub use rows::{ItemRow, NewRecordRow, RecordRow, StepRow, TrackingRow};

use crate::error::PersistenceError;
use crate::migrations::run_pending_migrations;
use crate::schema::{approval_records, item_details, tracking_files, users, workflow_steps};

/// Alias de tipo para el pool r2d2 de conexiones Postgres.
///
/// Al construirlo se corre automáticamente el set de migraciones pendientes.
pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// Proveedor abstracto de conexiones.
///
/// Contrato: devuelve una conexión válida o `PersistenceError::TransientIo`.
pub trait ConnectionProvider: Send + Sync + 'static {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError>;
}

/// `ConnectionProvider` respaldado por un `PgPool`.
pub struct PoolProvider {
    pub pool: PgPool,
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError> {
        self.pool
            .get()
            .map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }
}

/// Determina si un error es transitorio (recomendado reintentar con backoff).
///
/// Además de las variantes tipadas, algunos mensajes de desconexión o
/// deadlock llegan como `Unknown` con texto.
fn is_retryable(e: &PersistenceError) -> bool {
    match e {
        PersistenceError::SerializationConflict => true,
        PersistenceError::TransientIo(_) => true,
        PersistenceError::Unknown(msg) => {
            let m = msg.to_lowercase();
            m.contains("deadlock detected")
            || m.contains("could not serialize access due to concurrent update")
            || m.contains("terminating connection due to administrator command")
            || m.contains("connection closed")
            || m.contains("connection refused")
            || m.contains("timeout")
        }
        _ => false,
    }
}

/// Retry simple con backoff lineal (hasta 3 reintentos: 15ms, 30ms, 45ms).
/// Emite `warn!` por intento y no altera la semántica de la unidad de trabajo.
fn with_retry<F, T>(mut f: F) -> Result<T, PersistenceError>
    where F: FnMut() -> Result<T, PersistenceError>
{
    let mut attempts = 0;
    loop {
        match f() {
            Err(e) if is_retryable(&e) && attempts < 3 => {
                let delay_ms = 15 * ((attempts + 1) as u64);
                warn!("retryable error (attempt {}): {:?} -> sleeping {}ms",
                      attempts + 1,
                      e,
                      delay_ms);
                std::thread::sleep(Duration::from_millis(delay_ms));
                attempts += 1;
            }
            r => return r,
        }
    }
}

/// Error de Diesel visto desde el engine. Lo transitorio se marca como
/// `Conflict` para que la transacción se reintente entera.
fn db_err(err: DieselError) -> ApprovalError {
    let pe = PersistenceError::from(err);
    if is_retryable(&pe) {
        ApprovalError::Conflict(pe.to_string())
    } else {
        pe.into()
    }
}

fn row_err(err: PersistenceError) -> ApprovalError {
    err.into()
}

/// Error dentro de `run`: Diesel (commit, BEGIN) o del engine (rollback).
enum TxError {
    Db(DieselError),
    Engine(ApprovalError),
}

impl From<DieselError> for TxError {
    fn from(e: DieselError) -> Self {
        TxError::Db(e)
    }
}

/// Separa los errores que deben reintentarse (salen como `PersistenceError`)
/// de los que son el resultado definitivo de la unidad de trabajo.
fn settle<T>(res: Result<T, TxError>) -> Result<Result<T, ApprovalError>, PersistenceError> {
    match res {
        Ok(v) => Ok(Ok(v)),
        Err(TxError::Db(e)) => Err(PersistenceError::from(e)),
        Err(TxError::Engine(ApprovalError::Conflict(msg))) => {
            debug!("transaction conflict, will retry: {msg}");
            Err(PersistenceError::SerializationConflict)
        }
        Err(TxError::Engine(e)) => Ok(Err(e)),
    }
}

/// Store Postgres del engine.
pub struct PgApprovalStore<P: ConnectionProvider> {
    pub provider: P,
}

impl<P: ConnectionProvider> PgApprovalStore<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl PgApprovalStore<PoolProvider> {
    pub fn from_pool(pool: PgPool) -> Self {
        Self::new(PoolProvider { pool })
    }
}

impl<P: ConnectionProvider> ApprovalStore for PgApprovalStore<P> {
    fn in_transaction<T, F>(&self, mut f: F) -> Result<T, ApprovalError>
        where F: FnMut(&mut dyn ChainTx) -> Result<T, ApprovalError>
    {
        let out = with_retry(|| {
            let mut conn = self.provider.connection()?;
            let res = conn.build_transaction().read_write().run(|tx_conn| {
                                                                let mut tx = PgChainTx { conn: tx_conn };
                                                                f(&mut tx).map_err(TxError::Engine)
                                                            });
            settle(res)
        });
        out.map_err(ApprovalError::from)?
    }

    fn read_only<T, F>(&self, mut f: F) -> Result<T, ApprovalError>
        where F: FnMut(&mut dyn ChainTx) -> Result<T, ApprovalError>
    {
        let out = with_retry(|| {
            let mut conn = self.provider.connection()?;
            let res = conn.build_transaction().read_only().run(|tx_conn| {
                                                               let mut tx = PgChainTx { conn: tx_conn };
                                                               f(&mut tx).map_err(TxError::Engine)
                                                           });
            settle(res)
        });
        out.map_err(ApprovalError::from)?
    }
}

/// `ChainTx` sobre una conexión dentro de una transacción abierta.
struct PgChainTx<'a> {
    conn: &'a mut PgConnection,
}

impl PgChainTx<'_> {
    fn load_records(&mut self, rows: Vec<RecordRow>) -> Result<Vec<ApprovalRecord>, ApprovalError> {
        rows.into_iter()
            .map(|r| ApprovalRecord::try_from(r).map_err(row_err))
            .collect()
    }

    fn load_items(&mut self, rows: Vec<ItemRow>) -> Result<Vec<ItemDetail>, ApprovalError> {
        rows.into_iter()
            .map(|r| ItemDetail::try_from(r).map_err(row_err))
            .collect()
    }
}

impl ChainTx for PgChainTx<'_> {
    fn lock_item(&mut self, id: ItemDetailId) -> Result<Option<ItemDetail>, ApprovalError> {
        let row: Option<ItemRow> = item_details::table.find(id)
                                                      .for_update()
                                                      .first(self.conn)
                                                      .optional()
                                                      .map_err(db_err)?;
        row.map(ItemDetail::try_from).transpose().map_err(row_err)
    }

    fn find_item(&mut self, id: ItemDetailId) -> Result<Option<ItemDetail>, ApprovalError> {
        let row: Option<ItemRow> = item_details::table.find(id).first(self.conn).optional().map_err(db_err)?;
        row.map(ItemDetail::try_from).transpose().map_err(row_err)
    }

    // El ítem propio ya está bloqueado por `lock_item`, así que el orden por id
    // no evita todos los interbloqueos entre hermanos; un "deadlock detected"
    // aborta la transacción y `with_retry` la repite entera.
    fn lock_siblings(&mut self, item: &ItemDetail) -> Result<Vec<ItemDetail>, ApprovalError> {
        let rows: Vec<ItemRow> = item_details::table.filter(item_details::reference_id.eq(item.reference_id))
                                                    .filter(item_details::item_type.eq(item.item_type.as_str()))
                                                    .order(item_details::id.asc())
                                                    .for_update()
                                                    .load(self.conn)
                                                    .map_err(db_err)?;
        self.load_items(rows)
    }

    fn set_lifecycle_status(&mut self,
                            id: ItemDetailId,
                            status: LifecycleStatus,
                            actor: UserId,
                            at: DateTime<Utc>)
                            -> Result<(), ApprovalError> {
        let n = diesel::update(item_details::table.find(id)).set((item_details::lifecycle_status.eq(status.as_str()),
                                                                   item_details::updated_at.eq(Some(at)),
                                                                   item_details::updated_by.eq(Some(actor))))
                                                              .execute(self.conn)
                                                              .map_err(db_err)?;
        if n == 0 {
            return Err(ApprovalError::Storage(format!("item detail {id} vanished inside transaction")));
        }
        Ok(())
    }

    fn has_tracking_file(&mut self, id: ItemDetailId) -> Result<bool, ApprovalError> {
        diesel::select(diesel::dsl::exists(tracking_files::table.find(id))).get_result(self.conn)
                                                                          .map_err(db_err)
    }

    fn upsert_tracking_file(&mut self,
                            id: ItemDetailId,
                            file: &TrackedFile,
                            actor: UserId,
                            at: DateTime<Utc>)
                            -> Result<bool, ApprovalError> {
        // El ítem está bloqueado: la lectura previa no compite con otro upsert.
        let existed = self.has_tracking_file(id)?;
        diesel::insert_into(tracking_files::table).values(&TrackingRow { item_detail_id: id,
                                                                         file_name: &file.file_name,
                                                                         file_path: &file.file_path,
                                                                         updated_at: at,
                                                                         updated_by: actor })
                                                  .on_conflict(tracking_files::item_detail_id)
                                                  .do_update()
                                                  .set((tracking_files::file_name.eq(&file.file_name),
                                                        tracking_files::file_path.eq(&file.file_path),
                                                        tracking_files::updated_at.eq(at),
                                                        tracking_files::updated_by.eq(actor)))
                                                  .execute(self.conn)
                                                  .map_err(db_err)?;
        Ok(!existed)
    }

    fn active_workflow_steps(&mut self, department_id: DepartmentId) -> Result<Vec<WorkflowStep>, ApprovalError> {
        let rows: Vec<StepRow> = workflow_steps::table.filter(workflow_steps::department_id.eq(department_id))
                                                      .filter(workflow_steps::status.eq(StatusFlag::Active.as_str()))
                                                      .order((workflow_steps::step_order.asc(), workflow_steps::id.asc()))
                                                      .load(self.conn)
                                                      .map_err(db_err)?;
        rows.into_iter()
            .map(|r| WorkflowStep::try_from(r).map_err(row_err))
            .collect()
    }

    fn user_department(&mut self, user_id: UserId) -> Result<Option<DepartmentId>, ApprovalError> {
        users::table.find(user_id)
                    .select(users::department_id)
                    .first(self.conn)
                    .optional()
                    .map_err(db_err)
    }

    fn records_for(&mut self, id: ItemDetailId) -> Result<Vec<ApprovalRecord>, ApprovalError> {
        let rows: Vec<RecordRow> = approval_records::table.filter(approval_records::item_detail_id.eq(id))
                                                          .order((approval_records::level.asc(), approval_records::id.asc()))
                                                          .load(self.conn)
                                                          .map_err(db_err)?;
        self.load_records(rows)
    }

    fn insert_record(&mut self, record: NewApprovalRecord) -> Result<ApprovalRecord, ApprovalError> {
        let row: RecordRow = diesel::insert_into(approval_records::table).values(&NewRecordRow::from(&record))
                                                                         .get_result(self.conn)
                                                                         .map_err(db_err)?;
        ApprovalRecord::try_from(row).map_err(row_err)
    }

    fn save_record(&mut self, record: &ApprovalRecord) -> Result<(), ApprovalError> {
        let target = approval_records::table.filter(approval_records::id.eq(record.id))
                                            .filter(approval_records::status_flag.eq(StatusFlag::Active.as_str()));
        let n = diesel::update(target).set((approval_records::status.eq(record.status.as_str()),
                                            approval_records::is_action.eq(record.is_action),
                                            approval_records::round.eq(record.round),
                                            approval_records::status_flag.eq(record.status_flag.as_str()),
                                            approval_records::note.eq(record.note.as_deref()),
                                            approval_records::updated_at.eq(record.updated_at),
                                            approval_records::updated_by.eq(record.updated_by)))
                                      .execute(self.conn)
                                      .map_err(db_err)?;
        if n == 0 {
            return Err(ApprovalError::Internal(format!("approval record {} is archived or missing", record.id)));
        }
        Ok(())
    }

    fn archive_active_records(&mut self, id: ItemDetailId, actor: UserId, at: DateTime<Utc>) -> Result<usize, ApprovalError> {
        let target = approval_records::table.filter(approval_records::item_detail_id.eq(id))
                                            .filter(approval_records::status_flag.eq(StatusFlag::Active.as_str()));
        diesel::update(target).set((approval_records::status_flag.eq(StatusFlag::Inactive.as_str()),
                                    approval_records::is_action.eq(false),
                                    approval_records::updated_at.eq(at),
                                    approval_records::updated_by.eq(actor)))
                              .execute(self.conn)
                              .map_err(db_err)
    }

    fn pending_actions(&mut self, approver_id: UserId) -> Result<Vec<ApprovalRecord>, ApprovalError> {
        let rows: Vec<RecordRow> = approval_records::table.filter(approval_records::approver_id.eq(approver_id))
                                                          .filter(approval_records::is_action.eq(true))
                                                          .filter(approval_records::status_flag.eq(StatusFlag::Active.as_str()))
                                                          .filter(approval_records::tier.eq(ApprovalTier::Leader.as_str()))
                                                          .filter(approval_records::status.eq(ApprovalStatus::Waiting.as_str()))
                                                          .order(approval_records::item_detail_id.asc())
                                                          .load(self.conn)
                                                          .map_err(db_err)?;
        self.load_records(rows)
    }
}

/// Construye un pool r2d2 y ejecuta las migraciones pendientes.
pub fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PersistenceError> {
    let validated_min = if min_size == 0 { 1 } else { min_size };
    let validated_max = if max_size == 0 { 1 } else { max_size };
    if validated_min > validated_max {
        warn!("min_size > max_size ({} > {}), ajustando min=max", validated_min, validated_max);
    }
    let final_min = validated_min.min(validated_max);
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder().min_idle(Some(final_min))
                                    .max_size(validated_max)
                                    .build(manager)
                                    .map_err(|e| PersistenceError::TransientIo(format!("pool build: {e}")))?;
    {
        let mut conn = pool.get()
                           .map_err(|e| PersistenceError::TransientIo(format!("pool get for migrations: {e}")))?;
        run_pending_migrations(&mut conn)?;
    }
    Ok(pool)
}
