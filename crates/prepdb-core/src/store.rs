//! Capability surface of the external persistent store, and the adapter
//! that drives the actual database tooling.

use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::config::CommandsConfig;
use crate::error::{PrepError, Result};
use crate::runner;

// ---------------------------------------------------------------------------
// SchemaStore
// ---------------------------------------------------------------------------

/// What the engine needs from the persistent store. Every method is safe to
/// call repeatedly; none of them touch the state cache.
pub trait SchemaStore {
    /// Apply schema migrations. Idempotent.
    fn migrate(&self) -> Result<()>;

    /// Ensure the auxiliary cache-backing structure exists, when the
    /// tooling needs one. Idempotent.
    fn ensure_cache_table(&self) -> Result<()>;

    /// Remove all data without altering schema. Safe on an empty store.
    fn flush(&self) -> Result<()>;

    /// Delete the store's backing artifact. A missing artifact is success;
    /// an artifact held open by another process is [`PrepError::ArtifactLocked`].
    fn delete_artifact(&self) -> Result<()>;

    /// Write the store's current data to stdout.
    fn dump(&self) -> Result<()>;
}

// ---------------------------------------------------------------------------
// CommandStore
// ---------------------------------------------------------------------------

/// Store adapter that shells out to the configured management commands.
pub struct CommandStore {
    commands: CommandsConfig,
    artifact: PathBuf,
    root: PathBuf,
    profile: Option<String>,
}

impl CommandStore {
    pub fn new(
        commands: CommandsConfig,
        artifact: PathBuf,
        root: PathBuf,
        profile: Option<String>,
    ) -> Self {
        Self {
            commands,
            artifact,
            root,
            profile,
        }
    }

    fn run(&self, argv: &[String]) -> Result<()> {
        runner::run_command(argv, self.profile.as_deref(), &self.root)
    }
}

impl SchemaStore for CommandStore {
    fn migrate(&self) -> Result<()> {
        self.run(&self.commands.migrate)
    }

    fn ensure_cache_table(&self) -> Result<()> {
        match &self.commands.create_cache_table {
            Some(argv) => self.run(argv),
            None => Ok(()),
        }
    }

    fn flush(&self) -> Result<()> {
        self.run(&self.commands.flush)
    }

    fn delete_artifact(&self) -> Result<()> {
        match std::fs::remove_file(&self.artifact) {
            Ok(()) => {
                info!(artifact = %self.artifact.display(), "deleted store artifact");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // Nothing to remove
                debug!(artifact = %self.artifact.display(), "artifact already absent");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::PermissionDenied => Err(PrepError::ArtifactLocked {
                path: self.artifact.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn dump(&self) -> Result<()> {
        match &self.commands.dump {
            Some(argv) => self.run(argv),
            None => Err(PrepError::InvalidConfig(
                "no dump command configured".into(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
