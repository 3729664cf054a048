use futures::{FutureExt, Stream, StreamExt};
use tracing::{debug, warn};

use crate::preview::{BuildStatus, PreviewOrchestrator, Sandbox};
use crate::replication::{LoggedCommand, apply};
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Command(LoggedCommand),
    Refresh,
}

impl From<LoggedCommand> for SessionEvent {
    fn from(command: LoggedCommand) -> Self {
        SessionEvent::Command(command)
    }
}

/// The preview side: a replica store plus the orchestrator that renders it.
///
/// Events are handled in batches. Everything already queued is applied first,
/// then at most one build runs over the resulting state.
pub struct PreviewSession<S: Sandbox> {
    store: Store,
    orchestrator: PreviewOrchestrator<S>,
    next_sequence: u64,
    rejected: usize,
}

impl<S: Sandbox> PreviewSession<S> {
    pub fn new(mut store: Store, mut orchestrator: PreviewOrchestrator<S>) -> Self {
        orchestrator.watch(&mut store);
        PreviewSession {
            store,
            orchestrator,
            next_sequence: 0,
            rejected: 0,
        }
    }

    /// Runs until `events` ends, then finishes any pending build.
    pub async fn run(mut self, mut events: impl Stream<Item = SessionEvent> + Unpin) -> Self {
        while let Some(event) = events.next().await {
            self.handle(event);
            while let Some(Some(event)) = events.next().now_or_never() {
                self.handle(event);
            }
            self.orchestrator.rebuild_if_pending(&self.store);
        }
        self.orchestrator.rebuild_if_pending(&self.store);
        debug!(
            "Preview session finished after {} commands and {} builds",
            self.next_sequence,
            self.orchestrator.build_count()
        );
        self
    }

    fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Command(logged) => {
                if logged.sequence != self.next_sequence {
                    warn!(
                        "Replica expected command #{} but received #{}",
                        self.next_sequence, logged.sequence
                    );
                }
                self.next_sequence = logged.sequence + 1;
                if let Err(error) = apply(&mut self.store, &logged.command) {
                    warn!(
                        "Replica rejected command #{} ({}): {}",
                        logged.sequence, logged.command, error
                    );
                    self.rejected += 1;
                }
            }
            SessionEvent::Refresh => self.orchestrator.request_refresh(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn status(&self) -> &BuildStatus {
        self.orchestrator.status()
    }

    pub fn orchestrator(&self) -> &PreviewOrchestrator<S> {
        &self.orchestrator
    }

    /// Commands the replica could not apply; non-zero means it has diverged.
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    pub fn into_store(self) -> Store {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::stream;
    use futures_channel::mpsc;

    use super::*;
    use crate::config::PreviewConfig;
    use crate::preview::InMemorySandbox;
    use crate::replication::{CommandPublisher, StoreCommand};
    use crate::transformer::PassthroughEngine;

    fn session() -> PreviewSession<InMemorySandbox> {
        let orchestrator = PreviewOrchestrator::new(
            Arc::new(PreviewConfig::default()),
            Box::new(PassthroughEngine),
            InMemorySandbox::new(),
        );
        PreviewSession::new(Store::new(), orchestrator)
    }

    fn create(path: &str, content: &str) -> StoreCommand {
        StoreCommand::CreateFile {
            path: path.to_string(),
            content: content.to_string(),
        }
    }

    #[compio::test]
    async fn test_queued_events_produce_one_build() {
        let mut publisher = CommandPublisher::default();
        let commands = publisher.subscribe();
        publisher
            .execute(create("/App.jsx", "import B from './B';\nexport default B;"))
            .unwrap();
        publisher.execute(create("/B.jsx", "export default 1;")).unwrap();
        publisher
            .execute(StoreCommand::UpdateFile {
                path: "/B.jsx".to_string(),
                content: "export default 2;".to_string(),
            })
            .unwrap();
        publisher.close();

        let session = session().run(commands.map(SessionEvent::from)).await;

        assert_eq!(session.orchestrator().build_count(), 1);
        assert!(session.status().is_ready());
        assert_eq!(session.rejected(), 0);
        assert!(session.store().same_tree(publisher.store()));
    }

    #[compio::test]
    async fn test_replica_snapshot_matches_source_byte_for_byte() {
        let mut publisher = CommandPublisher::default();
        let commands = publisher.subscribe();
        for command in [
            create("/App.jsx", "export default function App() { return null; }"),
            create("/components/Card.jsx", "export default () => null;"),
            StoreCommand::Rename {
                from: "/components".to_string(),
                to: "/ui".to_string(),
            },
            StoreCommand::ReplaceInFile {
                path: "/ui/Card.jsx".to_string(),
                old: "null".to_string(),
                new: "<div />".to_string(),
            },
        ] {
            publisher.execute(command).unwrap();
        }
        publisher.close();

        let session = session().run(commands.map(SessionEvent::from)).await;
        assert_eq!(
            session.store().serialize().to_bytes().unwrap(),
            publisher.store().serialize().to_bytes().unwrap()
        );
    }

    #[compio::test]
    async fn test_refresh_event_triggers_a_build() {
        let (sender, receiver) = mpsc::unbounded();
        let mut publisher = CommandPublisher::default();
        let commands = publisher.subscribe();
        publisher
            .execute(create("/App.jsx", "export default 1;"))
            .unwrap();
        publisher.close();

        sender.unbounded_send(SessionEvent::Refresh).unwrap();
        drop(sender);

        let events = stream::select(commands.map(SessionEvent::from), receiver);
        let session = session().run(events).await;
        assert!(session.status().is_ready());
        assert!(session.orchestrator().build_count() >= 1);
    }

    #[compio::test]
    async fn test_empty_stream_still_builds_once() {
        let session = session().run(stream::empty()).await;
        assert_eq!(session.orchestrator().build_count(), 1);
        assert!(session.status().is_failed());
    }
}
