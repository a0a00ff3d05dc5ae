//! Datos maestros de sólo lectura para el engine: pasos de workflow por
//! departamento y usuarios (para resolver el departamento de un aprobador).
use serde::{Deserialize, Serialize};

use super::status::StatusFlag;
use super::{DepartmentId, UserId};

/// Un aprobador designado dentro del workflow de un departamento.
///
/// Invariante: entre los pasos `Active` de un departamento no se repite
/// `order`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub department_id: DepartmentId,
    pub order: i32,
    pub approver_id: UserId,
    pub status: StatusFlag,
}

impl WorkflowStep {
    pub fn active(department_id: DepartmentId, order: i32, approver_id: UserId) -> Self {
        Self { department_id,
               order,
               approver_id,
               status: StatusFlag::Active }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub department_id: DepartmentId,
}
