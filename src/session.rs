//! One user's editing session on one image: the lock and its heartbeat.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::RemoteError;
use crate::model::{ImageId, LockAcquisition};
use crate::remote::RemoteStore;

/// Holds one image's edit lock and keeps it alive in the background.
///
/// A conflicted acquisition still yields a session so the operator can
/// keep working unlocked; no heartbeat runs in that case. Dropping the
/// session stops the heartbeat task; [`EditSession::leave`] additionally
/// releases the lock on the collaborator.
pub struct EditSession {
    remote: Arc<dyn RemoteStore>,
    project_id: String,
    image_id: ImageId,
    user_id: String,
    acquisition: LockAcquisition,
    heartbeat_task: Option<JoinHandle<()>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl EditSession {
    /// Request the lock and, when granted, start the heartbeat task.
    pub async fn begin(
        remote: Arc<dyn RemoteStore>,
        project_id: &str,
        image_id: &str,
        user_id: &str,
        heartbeat_interval: Duration,
    ) -> Result<Self, RemoteError> {
        let acquisition = remote.acquire_lock(project_id, image_id, user_id).await?;

        let mut session = Self {
            remote,
            project_id: project_id.to_string(),
            image_id: image_id.to_string(),
            user_id: user_id.to_string(),
            acquisition,
            heartbeat_task: None,
            shutdown_tx: None,
        };
        if session.acquisition.is_held() {
            session.start_heartbeat(heartbeat_interval);
        }
        Ok(session)
    }

    pub fn image_id(&self) -> &str {
        &self.image_id
    }

    pub fn acquisition(&self) -> &LockAcquisition {
        &self.acquisition
    }

    /// Whether this user holds the lock (acquired or refreshed).
    pub fn holds_lock(&self) -> bool {
        self.acquisition.is_held()
    }

    fn start_heartbeat(&mut self, interval: Duration) {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let remote = Arc::clone(&self.remote);
        let project_id = self.project_id.clone();
        let image_id = self.image_id.clone();
        let user_id = self.user_id.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }
                // Missed beats are tolerated; the collaborator only
                // reclaims the lock after the stale window expires.
                if let Err(err) = remote.heartbeat_lock(&project_id, &image_id, &user_id).await {
                    log::warn!("Lock heartbeat for {} failed: {}", image_id, err);
                }
            }
        });

        self.shutdown_tx = Some(shutdown_tx);
        self.heartbeat_task = Some(handle);
    }

    fn stop_heartbeat(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.try_send(());
        }
        if let Some(handle) = self.heartbeat_task.take() {
            handle.abort();
        }
    }

    /// Stop the heartbeat and release the lock when this user held it.
    pub async fn leave(mut self) -> Result<(), RemoteError> {
        self.stop_heartbeat();
        if self.acquisition.is_held() {
            self.remote
                .release_lock(&self.project_id, &self.image_id, &self.user_id)
                .await?;
        }
        Ok(())
    }
}

impl Drop for EditSession {
    fn drop(&mut self) {
        self.stop_heartbeat();
    }
}
