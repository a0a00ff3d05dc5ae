//! Cola acotada entre el engine (síncrono) y el despachador (tarea tokio).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use apqp_core::notify::{Notification, NotificationSink, NotifyError};
use log::{debug, warn};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use crate::mailer::Mailer;

const DEFAULT_BUFFER_SIZE: usize = 256;

#[derive(Debug, Default)]
struct SinkStats {
    queued: AtomicU64,
    dropped: AtomicU64,
}

/// Extremo emisor. `deliver` usa `try_send`: nunca bloquea al engine.
#[derive(Debug, Clone)]
pub struct QueueSink {
    sender: mpsc::Sender<Notification>,
    stats: Arc<SinkStats>,
}

impl QueueSink {
    /// (encoladas, descartadas)
    pub fn stats(&self) -> (u64, u64) {
        (self.stats.queued.load(Ordering::Relaxed), self.stats.dropped.load(Ordering::Relaxed))
    }
}

impl NotificationSink for QueueSink {
    fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        match self.sender.try_send(notification.clone()) {
            Ok(()) => {
                self.stats.queued.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                Err(NotifyError::Delivery("notification queue full".into()))
            }
            Err(TrySendError::Closed(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                Err(NotifyError::QueueClosed)
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    pub sent: u64,
    pub failed: u64,
}

/// Extremo receptor; se consume con `run` o `spawn`.
#[derive(Debug)]
pub struct NotificationQueue {
    receiver: mpsc::Receiver<Notification>,
}

impl NotificationQueue {
    /// Despacha hasta que todos los `QueueSink` se hayan soltado.
    pub async fn run<M: Mailer>(mut self, mailer: M) -> DispatchStats {
        let mut stats = DispatchStats::default();
        while let Some(n) = self.receiver.recv().await {
            match mailer.send(&n).await {
                Ok(()) => {
                    debug!("notification sent id={} to={}", n.id, n.recipient_id);
                    stats.sent += 1;
                }
                Err(e) => {
                    warn!("notification failed id={} to={} kind={:?}: {}", n.id, n.recipient_id, n.kind, e);
                    stats.failed += 1;
                }
            }
        }
        stats
    }

    pub fn spawn<M: Mailer + 'static>(self, mailer: M) -> JoinHandle<DispatchStats> {
        tokio::spawn(self.run(mailer))
    }
}

pub fn channel() -> (QueueSink, NotificationQueue) {
    with_buffer_size(DEFAULT_BUFFER_SIZE)
}

pub fn with_buffer_size(size: usize) -> (QueueSink, NotificationQueue) {
    let (sender, receiver) = mpsc::channel(size.max(1));
    (QueueSink { sender,
                 stats: Arc::new(SinkStats::default()) },
     NotificationQueue { receiver })
}
