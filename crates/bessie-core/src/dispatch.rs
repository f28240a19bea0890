//! Runs fetch tickets against an [`ImageSource`] on the tokio runtime.
//!
//! One task per ticket; results come back over an mpsc channel so the
//! owning state machine applies them one at a time on its own task.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::fetch::{Completion, FetchTicket, Payload, Request};
use crate::source::ImageSource;

pub struct FetchDispatcher<S> {
    source: Arc<S>,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
    outstanding: usize,
}

impl<S: ImageSource> FetchDispatcher<S> {
    pub fn new(source: Arc<S>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            source,
            tx,
            rx,
            outstanding: 0,
        }
    }

    /// Start `ticket` in the background.
    pub fn dispatch(&mut self, ticket: FetchTicket) {
        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        self.outstanding += 1;

        tokio::spawn(async move {
            let outcome = match ticket.request {
                Request::Images { offset, limit } => {
                    source.fetch_images(offset, limit).await.map(Payload::Page)
                }
                Request::Clustered { offset, limit } => {
                    source.fetch_clustered(offset, limit).await.map(Payload::Page)
                }
                Request::Clusters => source.fetch_clusters().await.map(Payload::Clusters),
            };
            // The receiver lives as long as the dispatcher; a send error
            // only means the owning view is gone.
            let _ = tx.send(Completion { ticket, outcome });
        });
    }

    /// Wait for the next finished fetch. `None` when nothing is outstanding.
    pub async fn next_completion(&mut self) -> Option<Completion> {
        if self.outstanding == 0 {
            return None;
        }
        let completion = self.rx.recv().await?;
        self.outstanding -= 1;
        Some(completion)
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::Liveness;
    use crate::memory::MemorySource;

    #[tokio::test]
    async fn test_dispatch_round_trip() {
        let source = Arc::new(MemorySource::numbered(10));
        let live = Liveness::new();
        let mut dispatcher = FetchDispatcher::new(source);

        assert!(dispatcher.next_completion().await.is_none());

        dispatcher.dispatch(FetchTicket::new(
            1,
            Request::Images { offset: 2, limit: 3 },
            live.token(),
        ));
        assert_eq!(dispatcher.outstanding(), 1);

        let done = dispatcher.next_completion().await.unwrap();
        assert_eq!(done.ticket.seq, 1);
        match done.outcome.unwrap() {
            Payload::Page(page) => {
                assert_eq!(page.images.len(), 3);
                assert_eq!(page.total, Some(10));
            }
            other => panic!("unexpected payload: {other:?}"),
        }
        assert_eq!(dispatcher.outstanding(), 0);
    }
}
