//! Background task driving [`DiskKeyManager::rotate_tick`].

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::manager::DiskKeyManager;

/// Owns the running rotation loop. Dropping the handle also ends the loop.
#[derive(Debug)]
pub struct RotationHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RotationHandle {
    /// Signal the loop to exit and wait for it.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!("Key rotation task ended abnormally: {e}");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawn the rotation loop on the current runtime.
///
/// The first evaluation happens one `interval` after start. Tick errors are
/// logged and the loop carries on; it ends on shutdown or once the manager
/// has been dropped.
pub(crate) fn spawn(manager: Weak<DiskKeyManager>, interval: Duration) -> RotationHandle {
    let (shutdown, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(?interval, "Start key rotation loop");

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                    continue;
                }
            }

            let Some(strong) = manager.upgrade() else {
                break;
            };
            match tokio::task::spawn_blocking(move || strong.tick()).await {
                Ok(Ok(outcome)) => {
                    debug!(prepared = outcome.prepared, rotated = outcome.rotated, "Rotation tick");
                }
                Ok(Err(e)) => error!("Key rotation tick failed: {e}"),
                Err(e) => error!("Key rotation tick panicked: {e}"),
            }
        }

        info!("Key rotation loop stopped");
    });

    RotationHandle { shutdown, task }
}
