//! Write-behind persistence for permission profiles.
//!
//! Mutations hand a snapshot of the edited profile to [`PersistenceWriter::schedule`],
//! which never blocks. A single background task drains the queue, so writes for
//! one guild are serialized. Snapshots scheduled while an earlier one for the
//! same guild is still waiting replace it, and only the latest state is written.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use super::gateway::SharedGateway;
use crate::error::{PermissionError, Result};
use crate::permissions::{GuildId, GuildPermissionProfile};

enum WriteIntent {
    Save(GuildId),
    Flush(oneshot::Sender<()>),
}

pub struct PersistenceWriter {
    tx: mpsc::UnboundedSender<WriteIntent>,
    pending: Arc<DashMap<GuildId, GuildPermissionProfile>>,
}

impl PersistenceWriter {
    /// Start the background worker. Must be called inside a tokio runtime.
    pub fn spawn(gateway: SharedGateway) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(DashMap::new());

        tokio::spawn(run_worker(gateway, rx, pending.clone()));

        Self { tx, pending }
    }

    /// Queue a snapshot for writing
    pub fn schedule(&self, profile: GuildPermissionProfile) {
        let guild_id = profile.guild_id;

        // A waiting snapshot already has an intent queued for it
        if self.pending.insert(guild_id, profile).is_some() {
            debug!("Coalesced pending write for guild {}", guild_id);
            return;
        }

        if self.tx.send(WriteIntent::Save(guild_id)).is_err() {
            self.pending.remove(&guild_id);
            warn!(
                "Persistence writer stopped, permissions for guild {} were not saved",
                guild_id
            );
        }
    }

    /// Wait until everything scheduled before this call has been written
    pub async fn flush(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(WriteIntent::Flush(done_tx))
            .map_err(|_| PermissionError::WriterStopped)?;
        done_rx.await.map_err(|_| PermissionError::WriterStopped)
    }

    /// Number of guilds with a snapshot waiting to be written
    #[cfg(test)]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

async fn run_worker(
    gateway: SharedGateway,
    mut rx: mpsc::UnboundedReceiver<WriteIntent>,
    pending: Arc<DashMap<GuildId, GuildPermissionProfile>>,
) {
    while let Some(intent) = rx.recv().await {
        match intent {
            WriteIntent::Save(guild_id) => {
                let Some((_, profile)) = pending.remove(&guild_id) else {
                    continue;
                };

                match gateway.save(&profile).await {
                    Ok(()) => debug!("Saved permissions for guild {}", guild_id),
                    Err(e) => error!("Failed to save permissions for guild {}: {}", guild_id, e),
                }
            }
            WriteIntent::Flush(done) => {
                let _ = done.send(());
            }
        }
    }

    debug!("Persistence writer shutting down");
}
