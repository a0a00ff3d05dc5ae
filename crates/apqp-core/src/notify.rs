//! Notificaciones salientes del engine.
//!
//! El engine sólo produce `Notification`s y las entrega a un `NotificationSink`
//! después del commit. La entrega real (correo, cola, etc.) vive fuera del
//! core; un fallo del sink nunca revierte una transición ya confirmada.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::model::{ItemDetailId, UserId};

/// Plantilla de mensaje.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    /// Se construyó una cadena y el primer aprobador debe actuar.
    Submitted,
    Rejected,
    Approved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: UserId,
    pub kind: TemplateKind,
    pub item_detail_id: ItemDetailId,
    pub note: Option<String>,
}

impl Notification {
    pub fn new(recipient_id: UserId, kind: TemplateKind, item_detail_id: ItemDetailId, note: Option<String>) -> Self {
        Self { id: Uuid::new_v4(),
               recipient_id,
               kind,
               item_detail_id,
               note }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("notification queue closed")]
    QueueClosed,
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Destino de las notificaciones. Se invoca fuera de la transacción.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Descarta todo.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn deliver(&self, _notification: &Notification) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Guarda lo entregado en memoria (tests y escenarios de demostración).
#[derive(Debug, Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Vacía y devuelve lo acumulado.
    pub fn take(&self) -> Vec<Notification> {
        self.delivered
            .lock()
            .map(|mut v| std::mem::take(&mut *v))
            .unwrap_or_default()
    }
}

impl NotificationSink for RecordingSink {
    fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        let mut guard = self.delivered
                            .lock()
                            .map_err(|_| NotifyError::Delivery("recording sink poisoned".into()))?;
        guard.push(notification.clone());
        Ok(())
    }
}

impl<S: NotificationSink + ?Sized> NotificationSink for std::sync::Arc<S> {
    fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        (**self).deliver(notification)
    }
}
