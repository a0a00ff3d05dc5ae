//! Carga de configuración de conexión desde variables de entorno.
//! Usa convención `DATABASE_URL` y parámetros opcionales de pool.

use std::env;

use dotenvy::dotenv;
use log::debug;
use once_cell::sync::Lazy;

use crate::error::PersistenceError;

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    // un .env ausente no es un error
    if let Err(e) = dotenv() {
        debug!(".env no cargado: {e}");
    }
});

pub const DEFAULT_MIN_CONNECTIONS: u32 = 2;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub url: String,
    pub min_connections: u32,
    pub max_connections: u32,
}

impl DbConfig {
    pub fn from_env() -> Result<Self, PersistenceError> {
        // asegura que .env se haya cargado
        Lazy::force(&DOTENV_LOADED);
        let url = env::var("DATABASE_URL").map_err(|_| PersistenceError::Config("DATABASE_URL no definido".into()))?;
        Ok(Self::from_parts(url,
                            env::var("DATABASE_MIN_CONNECTIONS").ok().as_deref(),
                            env::var("DATABASE_MAX_CONNECTIONS").ok().as_deref()))
    }

    /// Valores ilegibles caen al default.
    pub fn from_parts(url: String, min: Option<&str>, max: Option<&str>) -> Self {
        let min_connections = min.and_then(|v| v.trim().parse().ok()).unwrap_or(DEFAULT_MIN_CONNECTIONS);
        let max_connections = max.and_then(|v| v.trim().parse().ok()).unwrap_or(DEFAULT_MAX_CONNECTIONS);
        Self { url,
               min_connections,
               max_connections }
    }
}
