//! apqp-notify: despacho asíncrono de notificaciones post-commit.
//!
//! El engine entrega cada `Notification` a un `QueueSink` (nunca bloquea) y
//! una tarea de fondo las consume y las pasa a un `Mailer`. Los fallos del
//! mailer se registran y se descartan.

pub mod mailer;
pub mod queue;

pub use mailer::{subject_for, LogMailer, Mailer};
pub use queue::{channel, DispatchStats, NotificationQueue, QueueSink};
