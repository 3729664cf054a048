use std::borrow::Cow;
use std::path::Path;

use compio::fs;
use hashlink::LinkedHashMap;
use saphyr::{LoadableYamlNode, Scalar, Yaml};
use snafu::prelude::*;
use tracing::debug;

use crate::replication::StoreCommand;

/// One step of a scripted editing session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    Command(StoreCommand),
    /// An explicit preview refresh request.
    Refresh,
}

/// A recorded sequence of store commands, loaded from YAML:
///
/// ```yaml
/// commands:
///   - op: create
///     path: /App.jsx
///     content: |
///       export default function App() { return <h1>Hi</h1>; }
///   - op: rename
///     from: /App.jsx
///     to: /src/App.jsx
///   - op: refresh
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandScript {
    steps: Vec<ScriptStep>,
}

impl CommandScript {
    pub async fn read(path: &Path) -> Result<Self, CommandScriptError> {
        debug!("Opening command script: {}", path.display());
        let bytes = fs::read(path).await.context(ReadSnafu {
            file_path: path.display().to_string(),
        })?;
        debug!("Successfully read command script: {} bytes", bytes.len());
        let contents = String::from_utf8(bytes).context(EncodingSnafu {
            file_path: path.display().to_string(),
        })?;
        contents.as_str().try_into()
    }

    pub fn steps(&self) -> &[ScriptStep] {
        &self.steps
    }

    pub fn commands(&self) -> impl Iterator<Item = &StoreCommand> {
        self.steps.iter().filter_map(|step| match step {
            ScriptStep::Command(command) => Some(command),
            ScriptStep::Refresh => None,
        })
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    fn parse_step(index: usize, entry: &Yaml) -> Result<ScriptStep, CommandScriptError> {
        let entry = entry.as_mapping().context(InvalidEntrySnafu {
            index,
            reason: "entry should be a map",
        })?;
        let op = required_text(index, entry, "op")?;

        let command = match op.as_str() {
            "create" => StoreCommand::CreateFile {
                path: required_text(index, entry, "path")?,
                content: optional_text(index, entry, "content")?.unwrap_or_default(),
            },
            "update" => StoreCommand::UpdateFile {
                path: required_text(index, entry, "path")?,
                content: required_text(index, entry, "content")?,
            },
            "mkdir" => StoreCommand::CreateDirectory {
                path: required_text(index, entry, "path")?,
            },
            "delete" => StoreCommand::DeleteFile {
                path: required_text(index, entry, "path")?,
            },
            "rmdir" => StoreCommand::DeleteDirectory {
                path: required_text(index, entry, "path")?,
            },
            "rename" => StoreCommand::Rename {
                from: required_text(index, entry, "from")?,
                to: required_text(index, entry, "to")?,
            },
            "replace" => StoreCommand::ReplaceInFile {
                path: required_text(index, entry, "path")?,
                old: required_text(index, entry, "old")?,
                new: required_text(index, entry, "new")?,
            },
            "insert" => StoreCommand::InsertInFile {
                path: required_text(index, entry, "path")?,
                line: required_line(index, entry)?,
                text: required_text(index, entry, "text")?,
            },
            "refresh" => return Ok(ScriptStep::Refresh),
            unknown => {
                return InvalidEntrySnafu {
                    index,
                    reason: format!("unknown op '{unknown}'"),
                }
                .fail();
            }
        };
        Ok(ScriptStep::Command(command))
    }
}

impl TryFrom<&str> for CommandScript {
    type Error = CommandScriptError;

    fn try_from(contents: &str) -> Result<Self, Self::Error> {
        let documents = Yaml::load_from_str(contents).context(ParseSnafu)?;
        let document = documents.first().context(MalformedScriptSnafu)?;
        let top_level = document.as_mapping().context(TopLevelNotMapSnafu)?;

        let steps = top_level
            .get(&Yaml::Value(Scalar::String(Cow::Borrowed("commands"))))
            .context(MalformedScriptSnafu)?
            .as_sequence()
            .context(CommandsNotListSnafu)?
            .iter()
            .enumerate()
            .map(|(index, entry)| Self::parse_step(index, entry))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CommandScript { steps })
    }
}

fn field<'a, 'input>(
    entry: &'a LinkedHashMap<Yaml<'input>, Yaml<'input>>,
    name: &'static str,
) -> Option<&'a Yaml<'input>> {
    entry.get(&Yaml::Value(Scalar::String(Cow::Borrowed(name))))
}

fn optional_text(
    index: usize,
    entry: &LinkedHashMap<Yaml, Yaml>,
    name: &'static str,
) -> Result<Option<String>, CommandScriptError> {
    let Some(value) = field(entry, name) else {
        return Ok(None);
    };
    let text = match value {
        Yaml::Value(Scalar::String(text)) => text.to_string(),
        Yaml::Value(Scalar::Integer(number)) => number.to_string(),
        Yaml::Value(Scalar::FloatingPoint(number)) => number.to_string(),
        Yaml::Value(Scalar::Boolean(flag)) => flag.to_string(),
        _ => {
            return InvalidEntrySnafu {
                index,
                reason: format!("'{name}' should be text"),
            }
            .fail();
        }
    };
    Ok(Some(text))
}

fn required_text(
    index: usize,
    entry: &LinkedHashMap<Yaml, Yaml>,
    name: &'static str,
) -> Result<String, CommandScriptError> {
    optional_text(index, entry, name)?.context(InvalidEntrySnafu {
        index,
        reason: format!("missing '{name}'"),
    })
}

fn required_line(
    index: usize,
    entry: &LinkedHashMap<Yaml, Yaml>,
) -> Result<usize, CommandScriptError> {
    match field(entry, "line") {
        Some(Yaml::Value(Scalar::Integer(line))) => {
            usize::try_from(*line).ok().context(InvalidEntrySnafu {
                index,
                reason: "'line' should not be negative",
            })
        }
        Some(_) => InvalidEntrySnafu {
            index,
            reason: "'line' should be a number",
        }
        .fail(),
        None => InvalidEntrySnafu {
            index,
            reason: "missing 'line'",
        }
        .fail(),
    }
}

#[derive(Debug, Snafu)]
pub enum CommandScriptError {
    #[snafu(display("Failed to read the command script: {}", file_path))]
    ReadError {
        file_path: String,
        source: std::io::Error,
    },
    #[snafu(display("Command script {} is not valid UTF-8", file_path))]
    EncodingError {
        file_path: String,
        source: std::string::FromUtf8Error,
    },
    #[snafu(display("Failed to parse the command script"))]
    ParseError { source: saphyr::ScanError },
    #[snafu(display("Command script should contain a 'commands' list"))]
    MalformedScript,
    #[snafu(display("Top level of the command script should be a map"))]
    TopLevelNotMap,
    #[snafu(display("'commands' should be a list"))]
    CommandsNotList,
    #[snafu(display("Command #{} is invalid: {}", index, reason))]
    InvalidEntry { index: usize, reason: String },
}
