//! `ApprovalRecord`: el turno de un aprobador dentro de la cadena de un
//! `ItemDetail`.
//!
//! Invariantes mantenidas por el engine tras cada transacción:
//! - Por `item_detail_id`, a lo sumo un registro con `status_flag = active` y
//!   `is_action = true` (el puntero de acción).
//! - Un registro `inactive` nunca vuelve a `active`.
//! - Los registros nunca se borran; sólo se archivan.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::{ApprovalStatus, ApprovalTier, StatusFlag};
use super::{ItemDetailId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub id: i64,
    pub item_detail_id: ItemDetailId,
    pub approver_id: UserId,
    /// `WorkflowStep.order` al momento de crear la cadena.
    pub level: i32,
    pub status: ApprovalStatus,
    pub is_action: bool,
    pub round: i32,
    pub tier: ApprovalTier,
    pub status_flag: StatusFlag,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: UserId,
    pub updated_at: DateTime<Utc>,
    pub updated_by: UserId,
}

impl ApprovalRecord {
    pub fn is_live(&self) -> bool {
        self.status_flag == StatusFlag::Active
    }

    /// Registro apuntado por el puntero de acción (vigente y marcado).
    pub fn is_current_action(&self) -> bool {
        self.is_live() && self.is_action
    }

    /// Líder vigente que aún no decidió.
    pub fn is_pending_leader(&self) -> bool {
        self.is_live() && self.tier == ApprovalTier::Leader && self.status == ApprovalStatus::Waiting
    }

    /// Aplica una decisión y deja rastro de quién y cuándo.
    pub fn decide(&mut self, status: ApprovalStatus, note: Option<&str>, actor: UserId, at: DateTime<Utc>) {
        self.status = status;
        if let Some(n) = note {
            self.note = Some(n.to_string());
        }
        self.updated_by = actor;
        self.updated_at = at;
    }
}

/// Fila a insertar; `id` lo asigna el store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewApprovalRecord {
    pub item_detail_id: ItemDetailId,
    pub approver_id: UserId,
    pub level: i32,
    pub status: ApprovalStatus,
    pub is_action: bool,
    pub round: i32,
    pub tier: ApprovalTier,
    pub status_flag: StatusFlag,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: UserId,
    pub updated_by: UserId,
}
