use bincode::{Decode, Encode};
use derive_more::Display;
use snafu::{ResultExt, Snafu};

use crate::store::{Store, StoreError};

/// One discrete edit to a store, as issued by the generation side.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, Display)]
pub enum StoreCommand {
    #[display("create {path}")]
    CreateFile { path: String, content: String },
    #[display("update {path}")]
    UpdateFile { path: String, content: String },
    #[display("mkdir {path}")]
    CreateDirectory { path: String },
    #[display("delete {path}")]
    DeleteFile { path: String },
    #[display("rmdir {path}")]
    DeleteDirectory { path: String },
    #[display("rename {from} -> {to}")]
    Rename { from: String, to: String },
    #[display("replace in {path}")]
    ReplaceInFile {
        path: String,
        old: String,
        new: String,
    },
    #[display("insert into {path} after line {line}")]
    InsertInFile {
        path: String,
        line: usize,
        text: String,
    },
}

/// Applies `command` to `store`. A failed command leaves the store untouched.
pub fn apply(store: &mut Store, command: &StoreCommand) -> Result<(), StoreError> {
    match command {
        StoreCommand::CreateFile { path, content } => store.create_file(path, content.as_str()),
        StoreCommand::UpdateFile { path, content } => store.update_file(path, content.as_str()),
        StoreCommand::CreateDirectory { path } => store.create_directory(path),
        StoreCommand::DeleteFile { path } => store.delete_file(path),
        StoreCommand::DeleteDirectory { path } => store.delete_directory(path),
        StoreCommand::Rename { from, to } => store.rename(from, to),
        StoreCommand::ReplaceInFile { path, old, new } => store.replace_in_file(path, old, new),
        StoreCommand::InsertInFile { path, line, text } => {
            store.insert_in_file(path, *line, text.as_str())
        }
    }
}

/// Applies `commands` in order, stopping at the first failure.
pub fn replay<'a>(
    store: &mut Store,
    commands: impl IntoIterator<Item = &'a StoreCommand>,
) -> Result<usize, ReplayError> {
    let mut applied = 0;
    for (index, command) in commands.into_iter().enumerate() {
        apply(store, command).context(ReplaySnafu {
            index,
            command: command.to_string(),
        })?;
        applied += 1;
    }
    Ok(applied)
}

#[derive(Debug, Snafu)]
#[snafu(display("Command #{} ({}) failed", index, command))]
pub struct ReplayError {
    pub index: usize,
    pub command: String,
    pub source: StoreError,
}
