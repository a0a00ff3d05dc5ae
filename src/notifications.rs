//! Arma el sink de notificaciones de los binarios según `NotificationMode`.
use std::sync::Arc;

use apqp_core::{NotificationSink, NullSink};
use apqp_notify::{channel, DispatchStats, LogMailer};
use log::{info, warn};
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;

use crate::config::NotificationMode;

/// Sink compartido más la tarea de despacho (si la hay).
pub struct Notifier {
    pub sink: Arc<dyn NotificationSink>,
    handle: Option<JoinHandle<DispatchStats>>,
}

impl Notifier {
    /// En modo `Log` lanza el despachador sobre `rt`.
    pub fn start(mode: NotificationMode, rt: &Runtime) -> Self {
        match mode {
            NotificationMode::Log => {
                let (sink, queue) = channel();
                let handle = rt.spawn(queue.run(LogMailer));
                Self { sink: Arc::new(sink),
                       handle: Some(handle) }
            }
            NotificationMode::Off => Self { sink: Arc::new(NullSink),
                                            handle: None },
        }
    }

    /// Suelta el sink propio y espera a que la cola se vacíe. Todo clon del
    /// sink (por ejemplo el que tiene el engine) debe haberse soltado antes.
    pub fn finish(self, rt: &Runtime) -> DispatchStats {
        let Self { sink, handle } = self;
        drop(sink);
        let Some(handle) = handle else {
            return DispatchStats::default();
        };
        match rt.block_on(handle) {
            Ok(stats) => {
                info!("notifications dispatched sent={} failed={}", stats.sent, stats.failed);
                stats
            }
            Err(e) => {
                warn!("notification dispatcher aborted: {e}");
                DispatchStats::default()
            }
        }
    }
}
