use apqp_core::ApprovalError;
use apqp_persistence::PersistenceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Error de configuración: {0}")]
    Config(String),
    #[error("Error del motor de aprobaciones: {0}")]
    Approval(#[from] ApprovalError),
    #[error("Error de persistencia: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("Error en IO: {0}")]
    Io(#[from] std::io::Error),
}
