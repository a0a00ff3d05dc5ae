//! Error de aplicación: agrupa los errores de cada capa para los binarios.
pub mod app_error;

pub use app_error::AppError;
