use crate::replication::{ReplayError, StoreCommand, replay};
use crate::store::Store;

/// A command together with its position in the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedCommand {
    pub sequence: u64,
    pub command: StoreCommand,
}

/// Append-only record of every command that succeeded on the source store.
#[derive(Debug, Clone, Default)]
pub struct CommandLog {
    entries: Vec<LoggedCommand>,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, command: StoreCommand) -> LoggedCommand {
        let logged = LoggedCommand {
            sequence: self.entries.len() as u64,
            command,
        };
        self.entries.push(logged.clone());
        logged
    }

    pub fn entries(&self) -> &[LoggedCommand] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries from `sequence` onwards.
    pub fn since(&self, sequence: u64) -> &[LoggedCommand] {
        let start = usize::try_from(sequence)
            .unwrap_or(usize::MAX)
            .min(self.entries.len());
        &self.entries[start..]
    }

    /// Builds a fresh store from the whole log.
    pub fn rebuild(&self) -> Result<Store, ReplayError> {
        let mut store = Store::new();
        replay(&mut store, self.entries.iter().map(|entry| &entry.command))?;
        Ok(store)
    }
}
