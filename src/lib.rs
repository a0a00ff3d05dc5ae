//! apqp-tracking
//!
//! Librería de aplicación sobre el motor de aprobaciones:
//! - `config`: configuración desde `.env` / entorno.
//! - `errors`: error de aplicación que agrupa las capas.
//! - `service`: traducción de resultados del engine a respuestas.
//! - `notifications`: arma el sink de notificaciones según la configuración.

pub mod config;
pub mod errors;
pub mod notifications;
pub mod service;

pub use config::{config, AppConfig, NotificationMode};
pub use errors::AppError;
