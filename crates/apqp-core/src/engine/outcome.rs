//! Resultado de las operaciones públicas del engine.
//!
//! `Outcome` es lo que ve el cliente; los errores de servidor viajan aparte en
//! el `Err` del `Result` que lo envuelve.

use serde::{Deserialize, Serialize};

use crate::errors::ApprovalError;
use crate::model::{ItemDetailId, UserId};

use super::transition::Transition;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "value", rename_all = "snake_case")]
pub enum Outcome<T> {
    Ok(T),
    /// Operación válida que no cambió nada (decisión repetida, cadena ya
    /// cerrada, estado no terminal).
    DuplicateSkipped(T),
    NotFound(ItemDetailId),
    ValidationFailed(String),
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ok(_) | Self::DuplicateSkipped(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Ok(v) | Self::DuplicateSkipped(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Ok(v) | Self::DuplicateSkipped(v) => Some(v),
            _ => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Self::Ok(v) => Outcome::Ok(f(v)),
            Self::DuplicateSkipped(v) => Outcome::DuplicateSkipped(f(v)),
            Self::NotFound(id) => Outcome::NotFound(id),
            Self::ValidationFailed(m) => Outcome::ValidationFailed(m),
        }
    }

    /// Traduce errores de cliente a su variante; el resto sigue siendo `Err`.
    pub fn from_error(err: ApprovalError) -> Result<Self, ApprovalError> {
        match err {
            ApprovalError::Validation(msg) => Ok(Self::ValidationFailed(msg)),
            ApprovalError::ItemNotFound(id) => Ok(Self::NotFound(id)),
            other => Err(other),
        }
    }

    /// Etiqueta estable para logs y salida de CLI.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ok(_) => "ok",
            Self::DuplicateSkipped(_) => "duplicate_skipped",
            Self::NotFound(_) => "not_found",
            Self::ValidationFailed(_) => "validation_failed",
        }
    }
}

/// Resultado de construir (o reconstruir) la cadena de un ítem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReport {
    pub item_detail_id: ItemDetailId,
    /// Registros `Leader` creados; 0 si el departamento no tiene workflow.
    pub chain_len: usize,
    /// Registros vigentes que se archivaron antes de construir.
    pub archived: usize,
    pub first_approver: Option<UserId>,
    pub file_was_new: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub submitted: Vec<SubmissionReport>,
    pub duplicates_skipped: Vec<ItemDetailId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionReport {
    pub item_detail_id: ItemDetailId,
    pub transition: Transition,
    /// Registros cuyo `round` se incrementó.
    pub rounds_bumped: usize,
    pub notifications: usize,
}
