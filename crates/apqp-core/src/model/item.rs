//! `ItemDetail`: unidad rastreable de trabajo (un entregable APQP o PPAP
//! asignado a un dueño y a un departamento).
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::{ItemType, LifecycleStatus};
use super::{DepartmentId, ItemDetailId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDetail {
    pub id: ItemDetailId,
    /// Entregable dueño (ítem APQP o PPAP). Varios `ItemDetail` pueden
    /// compartirlo; se consideran hermanos si además coincide `item_type`.
    pub reference_id: i64,
    pub item_type: ItemType,
    pub department_id: DepartmentId,
    pub owner_id: Option<UserId>,
    pub line_code: Option<String>,
    pub lifecycle_status: LifecycleStatus,
    pub created_by: Option<UserId>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<UserId>,
}

impl ItemDetail {
    /// `true` si `other` comparte entregable con `self`.
    pub fn is_sibling_of(&self, other: &ItemDetail) -> bool {
        self.reference_id == other.reference_id && self.item_type == other.item_type
    }
}

/// Referencia al archivo subido para un `ItemDetail` (el almacenamiento en disco
/// es externo; aquí sólo viaja nombre y ruta).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedFile {
    pub file_name: String,
    pub file_path: String,
}

impl TrackedFile {
    pub fn new(file_name: impl Into<String>, file_path: impl Into<String>) -> Self {
        Self { file_name: file_name.into(),
               file_path: file_path.into() }
    }
}
