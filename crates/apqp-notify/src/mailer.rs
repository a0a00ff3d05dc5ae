//! Contrato del transporte de correo.

use apqp_core::notify::{Notification, NotifyError, TemplateKind};
use async_trait::async_trait;
use log::info;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Asunto del mensaje según la plantilla.
pub fn subject_for(n: &Notification) -> String {
    match n.kind {
        TemplateKind::Submitted => format!("[APQP] Approval requested for item {}", n.item_detail_id),
        TemplateKind::Rejected => format!("[APQP] Item {} was rejected", n.item_detail_id),
        TemplateKind::Approved => format!("[APQP] Item {} was approved", n.item_detail_id),
    }
}

/// Sólo escribe el mensaje en el log (`APQP_NOTIFICATIONS=log`).
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, n: &Notification) -> Result<(), NotifyError> {
        info!("mail id={} to={} subject={:?} note={:?}",
              n.id,
              n.recipient_id,
              subject_for(n),
              n.note);
        Ok(())
    }
}
