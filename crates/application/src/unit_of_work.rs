//! Unit of work: dispatch buffered events, then persist.

use std::sync::Arc;
use std::time::Instant;

use domain::{AggregateRoot, Video, VideoEvent};
use persistence::{PersistenceContext, VideoStore};
use tokio_util::sync::CancellationToken;

use crate::{ApplicationError, EventPublisher, Result};

/// Coordinates one atomic batch of persistence and notification.
///
/// Commit runs strictly in this order:
/// 1. find the tracked videos with buffered events
/// 2. collect their events, keeping each video's raise order
/// 3. publish them one at a time, stopping at the first failure
/// 4. clear every video's buffer
/// 5. save all tracked mutations in one write
///
/// If publishing fails nothing is saved and every buffer is left intact.
/// A crash between steps 4 and 5 means a retry publishes again, so
/// consumers see events at least once. The save fails with
/// [`ApplicationError::Conflict`] when another unit of work saved one of
/// the tracked videos first; events published by then stay published.
pub struct UnitOfWork<S: VideoStore> {
    context: PersistenceContext<S>,
    publisher: Arc<EventPublisher<VideoEvent>>,
    cancel: CancellationToken,
    dispatched: Vec<VideoEvent>,
}

impl<S: VideoStore> UnitOfWork<S> {
    pub fn new(
        store: S,
        publisher: Arc<EventPublisher<VideoEvent>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            context: PersistenceContext::new(store, cancel.clone()),
            publisher,
            cancel,
            dispatched: Vec::new(),
        }
    }

    /// Returns the persistence context for loading and tracking videos.
    pub fn videos(&mut self) -> &mut PersistenceContext<S> {
        &mut self.context
    }

    /// Dispatches every buffered event and then persists all tracked changes.
    #[tracing::instrument(skip(self))]
    pub async fn commit(&mut self) -> Result<()> {
        let start = Instant::now();
        let result = self.dispatch_and_save().await;

        metrics::histogram!("uow_commit_duration_seconds").record(start.elapsed().as_secs_f64());
        match &result {
            Ok(dispatched) => {
                metrics::counter!("uow_commits_total").increment(1);
                tracing::debug!(dispatched, "unit of work committed");
            }
            Err(err) => {
                metrics::counter!("uow_commit_failures_total").increment(1);
                tracing::warn!(error = %err, "unit of work commit failed");
            }
        }
        result.map(|_| ())
    }

    /// Discards every uncommitted mutation, buffered events included.
    ///
    /// Events that already went out cannot be recalled and remain in
    /// [`UnitOfWork::dispatched`].
    pub fn rollback(&mut self) {
        self.context.rollback();
    }

    /// Returns every event the broker confirmed through this unit of work,
    /// including those of a commit that failed afterwards.
    pub fn dispatched(&self) -> &[VideoEvent] {
        &self.dispatched
    }

    async fn dispatch_and_save(&mut self) -> Result<usize> {
        let events: Vec<VideoEvent> = self
            .context
            .with_pending_events()
            .flat_map(|video| video.pending_events().iter().cloned())
            .collect();

        for event in &events {
            if self.cancel.is_cancelled() {
                return Err(ApplicationError::Cancelled);
            }
            self.publisher.publish(event, &self.cancel).await?;
            self.dispatched.push(event.clone());
        }

        // Synchronous, so cancellation cannot stop it half way.
        self.context.tracked_mut().for_each(|video: &mut Video| {
            video.drain_events();
        });

        self.context.save_changes().await?;
        Ok(events.len())
    }
}
