//! Audit queue and the background worker that drains it.
//!
//! Producers never wait: a full or closed queue drops the entry with a warning.

use docqr_core::models::NewAuditLog;
use docqr_db::AuditLogRepository;
use tokio::sync::mpsc::{self, error::TrySendError};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Sending half, cloned into every audited route.
#[derive(Clone)]
pub struct AuditQueue {
    sender: mpsc::Sender<NewAuditLog>,
}

impl AuditQueue {
    /// Build a queue with room for `capacity` pending entries plus its receiving end.
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<NewAuditLog>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Enqueue without waiting. Returns false when the entry was dropped.
    pub fn record(&self, entry: NewAuditLog) -> bool {
        match self.sender.try_send(entry) {
            Ok(()) => true,
            Err(TrySendError::Full(entry)) => {
                tracing::warn!(
                    action = %entry.action,
                    resource_type = %entry.resource_type,
                    "Audit queue full, dropping entry"
                );
                false
            }
            Err(TrySendError::Closed(entry)) => {
                tracing::warn!(
                    action = %entry.action,
                    resource_type = %entry.resource_type,
                    "Audit worker stopped, dropping entry"
                );
                false
            }
        }
    }
}

pub struct AuditWorker {
    receiver: mpsc::Receiver<NewAuditLog>,
    repository: AuditLogRepository,
}

impl AuditWorker {
    pub fn new(receiver: mpsc::Receiver<NewAuditLog>, repository: AuditLogRepository) -> Self {
        Self {
            receiver,
            repository,
        }
    }

    /// Run until every [`AuditQueue`] clone is dropped and the backlog is written.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        tracing::info!("Audit worker started");

        let mut written: u64 = 0;
        while let Some(entry) = self.receiver.recv().await {
            match self.repository.insert(&entry).await {
                Ok(()) => written += 1,
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        action = %entry.action,
                        resource_type = %entry.resource_type,
                        resource_id = ?entry.resource_id,
                        "Failed to write audit log entry"
                    );
                }
            }
        }

        tracing::info!(written, "Audit worker stopped");
    }
}

/// Wait for a worker whose queue handles are all dropped to finish writing its backlog.
/// Returns false when `timeout` elapses first; the remaining entries are lost.
pub async fn wait_for_drain(worker: JoinHandle<()>, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, worker).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Audit worker panicked");
            false
        }
        Err(_) => {
            tracing::warn!(?timeout, "Audit worker did not drain before the deadline");
            false
        }
    }
}
