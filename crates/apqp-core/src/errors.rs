//! Errores del motor de aprobaciones.
//!
//! Taxonomía:
//! - `Validation` / `ItemNotFound`: errores de cliente. El engine los traduce a
//!   `Outcome::ValidationFailed` / `Outcome::NotFound` y nunca llegan como `Err`
//!   a quien invoca la API pública.
//! - `Storage` / `Conflict` / `Internal`: errores de servidor. Abortan la
//!   transacción completa.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ItemDetailId;

#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum ApprovalError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("item detail not found: {0}")]
    ItemNotFound(ItemDetailId),
    #[error("storage failure: {0}")]
    Storage(String),
    /// Conflicto de serialización; la unidad de trabajo puede reintentarse.
    #[error("serialization conflict: {0}")]
    Conflict(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl ApprovalError {
    /// `true` para errores atribuibles al cliente (entrada inválida o id
    /// inexistente).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::ItemNotFound(_))
    }
}
