use std::path::Path;
use std::sync::Arc;

use futures::{StreamExt, stream};
use futures_channel::mpsc;
use snafu::Snafu;
use snafu::prelude::*;
use tracing::{debug, info, warn};

use crate::application::RuntimeConfig;
use crate::application::report::render_status;
use crate::config::{ConfigError, PreviewConfig};
use crate::preview::{BuildStatus, InMemorySandbox, PreviewOrchestrator, PreviewSession, SessionEvent};
use crate::replication::{CommandPublisher, CommandScript, CommandScriptError, ScriptStep};
use crate::store::{Snapshot, SnapshotError, Store};
use crate::transformer::PassthroughEngine;

/// What a session left behind.
#[derive(Debug)]
pub struct SessionOutcome {
    pub status: BuildStatus,
    pub snapshot: Snapshot,
    pub rejected_commands: usize,
}

pub struct Application;

impl Application {
    pub async fn run(app_config: impl Into<RuntimeConfig>) -> Result<SessionOutcome, ApplicationError> {
        let app_config: RuntimeConfig = app_config.into();
        let config = PreviewConfig::read(&app_config.root)
            .await
            .context(ConfigSnafu)?;
        debug!("Loaded preview config: {:?}", config);

        let script = CommandScript::read(&app_config.script)
            .await
            .context(ScriptSnafu)?;
        info!("Loaded command script with {} steps", script.len());

        let (source_store, replica_store) = Self::initial_stores(app_config.snapshot_in.as_deref()).await?;

        let mut publisher = CommandPublisher::new(source_store);
        let commands = publisher.subscribe();
        let (refresh_sender, refresh_receiver) = mpsc::unbounded();

        let orchestrator = PreviewOrchestrator::new(
            Arc::new(config),
            Box::new(PassthroughEngine),
            InMemorySandbox::new(),
        );
        let session = PreviewSession::new(replica_store, orchestrator);
        let events = stream::select(commands.map(SessionEvent::from), refresh_receiver);

        let feed = async {
            let mut rejected = 0;
            for step in script.steps() {
                match step {
                    ScriptStep::Command(command) => {
                        if publisher.execute(command.clone()).is_err() {
                            rejected += 1;
                        }
                    }
                    ScriptStep::Refresh => {
                        if refresh_sender.unbounded_send(SessionEvent::Refresh).is_err() {
                            warn!("Preview session stopped listening for refresh requests");
                        }
                    }
                }
            }
            publisher.close();
            refresh_sender.close_channel();
            rejected
        };
        let (rejected_commands, session) = futures::join!(feed, session.run(events));

        let snapshot = publisher.store().serialize();
        Self::check_replica(&snapshot, &session)?;

        if let Some(path) = &app_config.snapshot_out {
            snapshot.write(path).await.context(SnapshotSnafu)?;
            info!("Wrote snapshot to {}", path.display());
        }

        let status = session.status().clone();
        print!("{}", render_status(&status, rejected_commands));
        if app_config.print_import_map {
            let import_map = match &status {
                BuildStatus::Ready(report) => Some(&report.import_map),
                BuildStatus::Failed { partial, .. } => partial.as_ref().map(|report| &report.import_map),
                _ => None,
            };
            if let Some(import_map) = import_map {
                println!("{}", import_map.to_json().context(ImportMapSnafu)?);
            }
        }

        Ok(SessionOutcome {
            status,
            snapshot,
            rejected_commands,
        })
    }

    /// Both replicas start from their own copy of the same state.
    async fn initial_stores(snapshot_in: Option<&Path>) -> Result<(Store, Store), ApplicationError> {
        let Some(path) = snapshot_in else {
            return Ok((Store::new(), Store::new()));
        };
        let snapshot = Snapshot::read(path).await.context(SnapshotSnafu)?;
        let source = Store::deserialize(&snapshot).context(SnapshotSnafu)?;
        let replica = Store::deserialize(&snapshot).context(SnapshotSnafu)?;
        Ok((source, replica))
    }

    fn check_replica(
        source: &Snapshot,
        session: &PreviewSession<InMemorySandbox>,
    ) -> Result<(), ApplicationError> {
        let replica = session.store().serialize();
        let source_bytes = source.encode().context(SnapshotSnafu)?;
        let replica_bytes = replica.encode().context(SnapshotSnafu)?;
        ensure!(
            session.rejected() == 0 && source_bytes == replica_bytes,
            ReplicaDivergenceSnafu {
                source_entries: source.len(),
                replica_entries: replica.len(),
            }
        );
        debug!("Replica matches source ({} bytes)", source_bytes.len());
        Ok(())
    }
}

#[derive(Debug, Snafu)]
pub enum ApplicationError {
    #[snafu(display("Critical failure encountered while loading the preview config"))]
    ConfigError { source: ConfigError },
    #[snafu(display("Critical failure encountered while loading the command script"))]
    ScriptError { source: CommandScriptError },
    #[snafu(display("Critical failure encountered while handling a snapshot"))]
    SnapshotError { source: SnapshotError },
    #[snafu(display("Failed to render the import map"))]
    ImportMapError { source: serde_json::Error },
    #[snafu(display(
        "Preview replica diverged from the source store ({} vs {} entries)",
        replica_entries,
        source_entries
    ))]
    ReplicaDivergence {
        source_entries: usize,
        replica_entries: usize,
    },
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use tempfile::TempDir;

    const SCRIPT: &str = r#"
commands:
  - op: create
    path: /App.jsx
    content: |
      import React from 'react';
      import Button from '@/components/Button';
      import './App.css';
      export default function App() { return <Button />; }
  - op: create
    path: /components/Button.jsx
    content: "export default function Button() { return <button>Go</button>; }"
  - op: create
    path: /App.css
    content: "button { color: red; }"
  - op: update
    path: /missing.js
    content: "rejected"
  - op: refresh
"#;

    fn runtime_config(dir: &TempDir, snapshot_in: Option<PathBuf>) -> RuntimeConfig {
        RuntimeConfig {
            root: dir.path().to_path_buf(),
            script: dir.path().join("session.yaml"),
            snapshot_in,
            snapshot_out: Some(dir.path().join("out/project.snapshot")),
            print_import_map: true,
        }
    }

    #[compio::test]
    async fn test_replays_script_and_builds_preview() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        std::fs::write(dir.path().join("session.yaml"), SCRIPT).expect("Failed to write script");

        let outcome = Application::run(runtime_config(&dir, None)).await.unwrap();

        let BuildStatus::Ready(report) = &outcome.status else {
            panic!("expected a ready build, got {:?}", outcome.status);
        };
        assert_eq!(report.registered, 2);
        assert_eq!(report.styles, 1);
        assert_eq!(outcome.rejected_commands, 1);

        let written = Snapshot::read(&dir.path().join("out/project.snapshot"))
            .await
            .expect("Failed to read snapshot");
        assert_eq!(written, outcome.snapshot);
    }

    #[compio::test]
    async fn test_resumes_from_snapshot() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let mut store = Store::new();
        store
            .create_file("/src/App.tsx", "export default function App() { return null; }")
            .unwrap();
        let snapshot_path = dir.path().join("in.snapshot");
        store.serialize().write(&snapshot_path).await.unwrap();
        std::fs::write(
            dir.path().join("session.yaml"),
            "commands:\n  - op: mkdir\n    path: /assets\n",
        )
        .expect("Failed to write script");

        let outcome = Application::run(runtime_config(&dir, Some(snapshot_path)))
            .await
            .unwrap();

        assert!(outcome.status.is_ready());
        assert!(outcome.snapshot.entries().contains_key("/src/App.tsx"));
        assert!(outcome.snapshot.entries().contains_key("/assets"));
    }

    #[compio::test]
    async fn test_preview_config_is_honoured() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        std::fs::write(dir.path().join("preview.yaml"), "entry_points: [\"/main.jsx\"]\n")
            .expect("Failed to write config");
        std::fs::write(
            dir.path().join("session.yaml"),
            "commands:\n  - op: create\n    path: /App.jsx\n    content: \"export default 1;\"\n",
        )
        .expect("Failed to write script");

        let outcome = Application::run(runtime_config(&dir, None)).await.unwrap();
        assert!(outcome.status.is_failed());
    }

    #[compio::test]
    async fn test_missing_script_is_an_error() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let result = Application::run(runtime_config(&dir, None)).await;
        assert!(matches!(result, Err(ApplicationError::ScriptError { .. })));
    }
}
