use futures_channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

use crate::replication::{CommandLog, LoggedCommand, StoreCommand, apply};
use crate::store::{Store, StoreError};

/// Owns the source store and fans every successful command out to replicas.
///
/// Commands that fail on the source store are neither logged nor forwarded,
/// so every replica sees exactly the sequence that built the source.
#[derive(Debug, Default)]
pub struct CommandPublisher {
    store: Store,
    log: CommandLog,
    subscribers: Vec<UnboundedSender<LoggedCommand>>,
}

impl CommandPublisher {
    pub fn new(store: Store) -> Self {
        CommandPublisher {
            store,
            log: CommandLog::new(),
            subscribers: Vec::new(),
        }
    }

    /// Subscribes a replica. Commands already in the log are delivered first.
    pub fn subscribe(&mut self) -> UnboundedReceiver<LoggedCommand> {
        let (sender, receiver) = mpsc::unbounded();
        for logged in self.log.entries() {
            if sender.unbounded_send(logged.clone()).is_err() {
                break;
            }
        }
        self.subscribers.push(sender);
        receiver
    }

    pub fn execute(&mut self, command: StoreCommand) -> Result<LoggedCommand, StoreError> {
        if let Err(error) = apply(&mut self.store, &command) {
            warn!("Rejected command '{}': {}", command, error);
            return Err(error);
        }
        let logged = self.log.append(command);
        debug!("Publishing command #{}: {}", logged.sequence, logged.command);
        self.subscribers
            .retain(|subscriber| subscriber.unbounded_send(logged.clone()).is_ok());
        Ok(logged)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn log(&self) -> &CommandLog {
        &self.log
    }

    /// Drops every subscriber, ending their streams.
    pub fn close(&mut self) {
        self.subscribers.clear();
    }

    pub fn into_parts(self) -> (Store, CommandLog) {
        (self.store, self.log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use futures::executor::block_on;

    fn create(path: &str, content: &str) -> StoreCommand {
        StoreCommand::CreateFile {
            path: path.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_successful_commands_reach_every_subscriber() {
        let mut publisher = CommandPublisher::default();
        let first = publisher.subscribe();
        let second = publisher.subscribe();

        publisher.execute(create("/App.jsx", "a")).unwrap();
        publisher.execute(create("/B.jsx", "b")).unwrap();
        publisher.close();

        let first: Vec<_> = block_on(first.collect());
        let second: Vec<_> = block_on(second.collect());
        assert_eq!(first, second);
        assert_eq!(
            first.iter().map(|logged| logged.sequence).collect::<Vec<_>>(),
            vec![0, 1]
        );
    }

    #[test]
    fn test_rejected_commands_are_not_published() {
        let mut publisher = CommandPublisher::default();
        let receiver = publisher.subscribe();

        assert!(publisher
            .execute(StoreCommand::UpdateFile {
                path: "/missing.js".to_string(),
                content: String::new(),
            })
            .is_err());
        publisher.execute(create("/ok.js", "")).unwrap();
        publisher.close();

        let received: Vec<_> = block_on(receiver.collect());
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].sequence, 0);
        assert_eq!(publisher.log().len(), 1);
    }

    #[test]
    fn test_late_subscriber_catches_up() {
        let mut publisher = CommandPublisher::default();
        publisher.execute(create("/a.js", "")).unwrap();
        let late = publisher.subscribe();
        publisher.execute(create("/b.js", "")).unwrap();
        publisher.close();

        let received: Vec<_> = block_on(late.collect());
        assert_eq!(received.len(), 2);
    }

    #[test]
    fn test_dropped_subscriber_is_forgotten() {
        let mut publisher = CommandPublisher::default();
        drop(publisher.subscribe());
        publisher.execute(create("/a.js", "")).unwrap();
        assert!(publisher.subscribers.is_empty());
    }
}
