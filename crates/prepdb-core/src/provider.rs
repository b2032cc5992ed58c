//! Named data-loading operations.
//!
//! The engine only ever sees operation identifiers; resolution goes through
//! an explicit registry built at startup, and a miss is the typed error
//! [`PrepError::UnknownOperation`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{PrepError, Result};
use crate::runner;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A data-loading routine. The engine never sees its content, only its
/// identifier.
pub trait DataOperation {
    fn run(&self) -> Result<()>;
}

/// Resolves opaque operation identifiers to runnable operations.
pub trait DataProvider {
    fn resolve(&self, id: &str) -> Result<&dyn DataOperation>;
}

// ---------------------------------------------------------------------------
// CommandOperation
// ---------------------------------------------------------------------------

/// Data-loading routine that shells out to a configured argv.
pub struct CommandOperation {
    argv: Vec<String>,
    root: PathBuf,
    profile: Option<String>,
}

impl CommandOperation {
    pub fn new(argv: Vec<String>, root: PathBuf, profile: Option<String>) -> Self {
        Self {
            argv,
            root,
            profile,
        }
    }
}

impl DataOperation for CommandOperation {
    fn run(&self) -> Result<()> {
        runner::run_command(&self.argv, self.profile.as_deref(), &self.root)
    }
}

// ---------------------------------------------------------------------------
// OperationRegistry
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct OperationRegistry {
    operations: HashMap<String, Box<dyn DataOperation>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: impl Into<String>, operation: Box<dyn DataOperation>) {
        self.operations.insert(id.into(), operation);
    }

    /// Build the registry from the config's `operations` map.
    pub fn from_config(
        operations: &HashMap<String, Vec<String>>,
        root: &Path,
        profile: Option<&str>,
    ) -> Self {
        let mut registry = Self::new();
        for (id, argv) in operations {
            registry.register(
                id.clone(),
                Box::new(CommandOperation::new(
                    argv.clone(),
                    root.to_path_buf(),
                    profile.map(str::to_string),
                )),
            );
        }
        registry
    }
}

impl DataProvider for OperationRegistry {
    fn resolve(&self, id: &str) -> Result<&dyn DataOperation> {
        self.operations
            .get(id)
            .map(|op| op.as_ref())
            .ok_or_else(|| PrepError::UnknownOperation(id.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
