//! [`ChannelScheduler`] — hands scheduled updates to a worker over a tokio
//! channel.
//!
//! Device conditions are not evaluated here; the receiving side decides when
//! the constraints are met.

use thiserror::Error;
use tokio::sync::mpsc;
use webapk_core::{
  app::AppId,
  collab::{UpdateConstraints, UpdateScheduler},
};

/// One update waiting to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledUpdate {
  pub app_id:      AppId,
  pub constraints: UpdateConstraints,
}

#[derive(Debug, Error)]
#[error("update queue is closed")]
pub struct QueueClosed;

#[derive(Clone)]
pub struct ChannelScheduler {
  tx: mpsc::UnboundedSender<ScheduledUpdate>,
}

impl ChannelScheduler {
  pub fn new() -> (Self, mpsc::UnboundedReceiver<ScheduledUpdate>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Self { tx }, rx)
  }
}

impl UpdateScheduler for ChannelScheduler {
  type Error = QueueClosed;

  async fn schedule(
    &self,
    id: &AppId,
    constraints: UpdateConstraints,
  ) -> Result<(), QueueClosed> {
    tracing::debug!(
      app_id = %id,
      requires_network = constraints.requires_network,
      requires_charging = constraints.requires_charging,
      "scheduling update"
    );
    self
      .tx
      .send(ScheduledUpdate { app_id: id.clone(), constraints })
      .map_err(|_| QueueClosed)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn scheduled_updates_arrive_in_order() {
    let (scheduler, mut rx) = ChannelScheduler::new();
    for id in ["a", "b"] {
      scheduler
        .schedule(&AppId::new(id), UpdateConstraints::default())
        .await
        .unwrap();
    }

    assert_eq!(rx.recv().await.unwrap().app_id, AppId::new("a"));
    assert_eq!(rx.recv().await.unwrap().app_id, AppId::new("b"));
  }

  #[tokio::test]
  async fn closed_queue_errors() {
    let (scheduler, rx) = ChannelScheduler::new();
    drop(rx);
    let err = scheduler
      .schedule(&AppId::new("a"), UpdateConstraints::default())
      .await;
    assert!(err.is_err());
  }
}
