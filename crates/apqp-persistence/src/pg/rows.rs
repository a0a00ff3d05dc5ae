//! Filas Diesel y su conversión a tipos del dominio.
//!
//! Los `Queryable` siguen el orden de columnas de `schema.rs`. Los enums viajan
//! como texto y se validan al leer: una fila con un valor fuera del CHECK es
//! `PersistenceError::InvalidRow`.

use std::str::FromStr;

use apqp_core::errors::ApprovalError;
use apqp_core::model::{ApprovalRecord, ItemDetail, NewApprovalRecord, WorkflowStep};
use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::error::PersistenceError;
use crate::schema::{approval_records, tracking_files};

fn parse<T>(column: &str, value: &str) -> Result<T, PersistenceError>
    where T: FromStr<Err = ApprovalError>
{
    value.parse()
         .map_err(|e: ApprovalError| PersistenceError::InvalidRow(format!("{column}: {e}")))
}

#[derive(Queryable, Debug)]
pub struct ItemRow {
    pub id: i64,
    pub reference_id: i64,
    pub item_type: String,
    pub department_id: i64,
    pub owner_id: Option<i64>,
    pub line_code: Option<String>,
    pub lifecycle_status: String,
    pub created_by: Option<i64>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<i64>,
}

impl TryFrom<ItemRow> for ItemDetail {
    type Error = PersistenceError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        Ok(ItemDetail { id: row.id,
                        reference_id: row.reference_id,
                        item_type: parse("item_type", &row.item_type)?,
                        department_id: row.department_id,
                        owner_id: row.owner_id,
                        line_code: row.line_code,
                        lifecycle_status: parse("lifecycle_status", &row.lifecycle_status)?,
                        created_by: row.created_by,
                        updated_at: row.updated_at,
                        updated_by: row.updated_by })
    }
}

#[derive(Queryable, Debug)]
pub struct StepRow {
    pub id: i64,
    pub department_id: i64,
    pub step_order: i32,
    pub approver_id: i64,
    pub status: String,
}

impl TryFrom<StepRow> for WorkflowStep {
    type Error = PersistenceError;

    fn try_from(row: StepRow) -> Result<Self, Self::Error> {
        Ok(WorkflowStep { department_id: row.department_id,
                          order: row.step_order,
                          approver_id: row.approver_id,
                          status: parse("status", &row.status)? })
    }
}

#[derive(Queryable, Debug)]
pub struct RecordRow {
    pub id: i64,
    pub item_detail_id: i64,
    pub approver_id: i64,
    pub level: i32,
    pub status: String,
    pub is_action: bool,
    pub round: i32,
    pub tier: String,
    pub status_flag: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: i64,
    pub updated_at: DateTime<Utc>,
    pub updated_by: i64,
}

impl TryFrom<RecordRow> for ApprovalRecord {
    type Error = PersistenceError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        Ok(ApprovalRecord { id: row.id,
                            item_detail_id: row.item_detail_id,
                            approver_id: row.approver_id,
                            level: row.level,
                            status: parse("status", &row.status)?,
                            is_action: row.is_action,
                            round: row.round,
                            tier: parse("tier", &row.tier)?,
                            status_flag: parse("status_flag", &row.status_flag)?,
                            note: row.note,
                            created_at: row.created_at,
                            created_by: row.created_by,
                            updated_at: row.updated_at,
                            updated_by: row.updated_by })
    }
}

/// Inserción en `approval_records`; `id` lo asigna BIGSERIAL.
#[derive(Insertable, Debug)]
#[diesel(table_name = approval_records)]
pub struct NewRecordRow<'a> {
    pub item_detail_id: i64,
    pub approver_id: i64,
    pub level: i32,
    pub status: &'a str,
    pub is_action: bool,
    pub round: i32,
    pub tier: &'a str,
    pub status_flag: &'a str,
    pub note: Option<&'a str>,
    pub created_at: DateTime<Utc>,
    pub created_by: i64,
    pub updated_at: DateTime<Utc>,
    pub updated_by: i64,
}

impl<'a> From<&'a NewApprovalRecord> for NewRecordRow<'a> {
    fn from(r: &'a NewApprovalRecord) -> Self {
        NewRecordRow { item_detail_id: r.item_detail_id,
                       approver_id: r.approver_id,
                       level: r.level,
                       status: r.status.as_str(),
                       is_action: r.is_action,
                       round: r.round,
                       tier: r.tier.as_str(),
                       status_flag: r.status_flag.as_str(),
                       note: r.note.as_deref(),
                       created_at: r.created_at,
                       created_by: r.created_by,
                       updated_at: r.created_at,
                       updated_by: r.updated_by }
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = tracking_files)]
pub struct TrackingRow<'a> {
    pub item_detail_id: i64,
    pub file_name: &'a str,
    pub file_path: &'a str,
    pub updated_at: DateTime<Utc>,
    pub updated_by: i64,
}
