//! Background workers fed by an event bus subscription.

use std::io;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::warn;

use sourcing_core::TenantId;
use sourcing_events::{Subscription, TenantScoped};

pub mod notification_worker;

pub use notification_worker::NotificationWorker;

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Spawn a named thread that feeds every message of `sub` to `handler`.
///
/// - `tenant_id`: when provided, messages for other tenants are ignored
/// - handler errors are logged and the loop continues
pub(crate) fn spawn_worker<M, H, E>(
    name: &'static str,
    sub: Subscription<M>,
    tenant_id: Option<TenantId>,
    mut handler: H,
) -> io::Result<WorkerHandle>
where
    M: TenantScoped + Send + 'static,
    H: FnMut(M) -> Result<(), E> + Send + 'static,
    E: core::fmt::Display + Send + 'static,
{
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

    let join = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || worker_loop(name, sub, shutdown_rx, tenant_id, &mut handler))?;

    Ok(WorkerHandle {
        shutdown: shutdown_tx,
        join: Some(join),
    })
}

fn worker_loop<M, H, E>(
    name: &'static str,
    sub: Subscription<M>,
    shutdown_rx: mpsc::Receiver<()>,
    tenant_id: Option<TenantId>,
    handler: &mut H,
) where
    M: TenantScoped,
    H: FnMut(M) -> Result<(), E>,
    E: core::fmt::Display,
{
    let tick = Duration::from_millis(250);

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        match sub.recv_timeout(tick) {
            Ok(msg) => {
                if let Some(t) = tenant_id {
                    if msg.tenant_id() != t {
                        continue;
                    }
                }

                if let Err(err) = handler(msg) {
                    warn!(worker = name, error = %err, "worker handler failed");
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}
