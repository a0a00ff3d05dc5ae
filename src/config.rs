//! Configuración central de la aplicación.
//! Carga variables de entorno (.env) una sola vez y expone una estructura
//! inmutable (`config()`).
use std::env;
use std::str::FromStr;

use apqp_persistence::DbConfig;
use log::debug;
use once_cell::sync::{Lazy, OnceCell};

use crate::errors::AppError;

static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    if let Err(e) = dotenvy::dotenv() {
        debug!(".env no cargado: {e}");
    }
});

static CONFIG: OnceCell<AppConfig> = OnceCell::new();

/// Transporte de notificaciones para los binarios (`APQP_NOTIFICATIONS`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationMode {
    /// Despachador en segundo plano que escribe cada mensaje en el log.
    Log,
    /// Se descartan.
    Off,
}

impl FromStr for NotificationMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" => Ok(Self::Log),
            "off" => Ok(Self::Off),
            other => Err(AppError::Config(format!("APQP_NOTIFICATIONS inválido: '{other}' (log|off)"))),
        }
    }
}

/// Configuración global de la aplicación.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// `None` si no hay `DATABASE_URL` (sólo modo en memoria).
    pub database: Option<DbConfig>,
    pub notifications: NotificationMode,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Lazy::force(&DOTENV_LOADED);
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Igual que `from_env` pero con una fuente de variables arbitraria.
    pub fn from_lookup<F>(get: F) -> Result<Self, AppError>
        where F: Fn(&str) -> Option<String>
    {
        let database = get("DATABASE_URL").filter(|u| !u.trim().is_empty()).map(|url| {
                                                                                 DbConfig::from_parts(url,
                                                                                                      get("DATABASE_MIN_CONNECTIONS").as_deref(),
                                                                                                      get("DATABASE_MAX_CONNECTIONS").as_deref())
                                                                             });
        let notifications = match get("APQP_NOTIFICATIONS") {
            Some(v) => v.parse()?,
            None => NotificationMode::Log,
        };
        Ok(Self { database,
                  notifications })
    }

    /// Configuración de base de datos; error si falta `DATABASE_URL`.
    pub fn database(&self) -> Result<&DbConfig, AppError> {
        self.database
            .as_ref()
            .ok_or_else(|| AppError::Config("DATABASE_URL no definido".into()))
    }
}

/// Instancia global, evaluada una sola vez.
pub fn config() -> Result<&'static AppConfig, AppError> {
    CONFIG.get_or_try_init(AppConfig::from_env)
}
