//! apqp-persistence
//!
//! Backend Postgres (Diesel + r2d2) del motor de aprobaciones.
//!
//! Módulos:
//! - `pg`: `PgApprovalStore`, pool y reintentos de errores transitorios.
//! - `migrations`: runner embebido de migraciones Diesel.
//! - `config`: carga de configuración desde .env.
//! - `schema`: tablas Diesel declaradas para compilar queries.

pub mod config;
pub mod error;
pub mod migrations;
pub mod pg;
pub mod schema;

pub use config::DbConfig;
pub use error::PersistenceError;
pub use pg::{build_pool, ConnectionProvider, PgApprovalStore, PgPool, PoolProvider};
