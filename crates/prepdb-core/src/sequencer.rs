//! The provisioning decision engine.
//!
//! Turns a [`ProvisioningRequest`] into an ordered sequence of side effects
//! against the store, the data provider, and the state cache. Directives
//! are evaluated in a fixed priority order regardless of how the caller
//! supplied them:
//!
//! 1. dump (terminates the sequence)
//! 2. delete the store artifact
//! 3. init (migrate, then the auxiliary cache table)
//! 4. skip check: a cached id equal to the requested id ends the run here
//! 5. flush
//! 6. load (cache updated only on success)
//! 7. clear-cache (when not already consumed by the skip path)
//!
//! The skip path trades a cheap cache lookup against an expensive data
//! load. It fires before flush is considered, so requesting flush together
//! with an unchanged operation id suppresses the flush; callers signal a
//! stale database with clear-cache plus a changed id.
//!
//! Each external operation is attempted at most once. Any failure aborts
//! the remaining steps and leaves the cache exactly as it was before the
//! failing step.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::cache::StateCache;
use crate::error::{PrepError, Result};
use crate::provider::DataProvider;
use crate::store::SchemaStore;

// ---------------------------------------------------------------------------
// ProvisioningRequest / Outcome
// ---------------------------------------------------------------------------

/// Per-invocation directives. Field order here is irrelevant; the sequencer
/// imposes its own priority order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisioningRequest {
    pub dump: bool,
    pub reset: bool,
    pub init: bool,
    pub flush: bool,
    pub operation: Option<String>,
    pub clear_cache: bool,
}

/// What a run actually did, for logging and `--json` output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub dumped: bool,
    pub reset: bool,
    pub initialized: bool,
    /// Operation id that was already loaded, when the skip path was taken.
    pub skipped: Option<String>,
    pub flushed: bool,
    /// Operation id that was loaded and remembered.
    pub loaded: Option<String>,
    pub cache_cleared: bool,
}

// ---------------------------------------------------------------------------
// Sequencer
// ---------------------------------------------------------------------------

/// Stateless decision/execution engine. The only durable state it
/// transitions is the injected [`StateCache`].
pub struct Sequencer<'a> {
    store: &'a dyn SchemaStore,
    provider: &'a dyn DataProvider,
    cache: &'a dyn StateCache,
    ttl: Duration,
}

impl<'a> Sequencer<'a> {
    pub fn new(
        store: &'a dyn SchemaStore,
        provider: &'a dyn DataProvider,
        cache: &'a dyn StateCache,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            provider,
            cache,
            ttl,
        }
    }

    pub fn run(&self, request: &ProvisioningRequest) -> Result<Outcome> {
        let mut outcome = Outcome::default();

        if request.dump {
            self.store.dump()?;
            outcome.dumped = true;
            return Ok(outcome);
        }

        if request.reset {
            self.store.delete_artifact()?;
            outcome.reset = true;
        }

        if request.init {
            self.store.migrate()?;
            self.store.ensure_cache_table()?;
            outcome.initialized = true;
        }

        // Exit early if the database already holds the requested data
        if let Some(id) = &request.operation {
            if self.cache.get()?.as_deref() == Some(id.as_str()) {
                debug!(operation = %id, "already loaded, skipping flush and load");
                if request.clear_cache {
                    self.cache.delete()?;
                    outcome.cache_cleared = true;
                }
                outcome.skipped = Some(id.clone());
                return Ok(outcome);
            }
        }

        if request.flush {
            self.store.flush()?;
            outcome.flushed = true;
        }

        if let Some(id) = &request.operation {
            let operation = self.provider.resolve(id)?;
            operation.run().map_err(|e| PrepError::OperationFailed {
                id: id.clone(),
                source: Box::new(e),
            })?;
            // Remember this operation only after it succeeded
            self.cache.set(id, self.ttl)?;
            info!(operation = %id, "loaded test data");
            outcome.loaded = Some(id.clone());
        }

        if request.clear_cache {
            self.cache.delete()?;
            outcome.cache_cleared = true;
        }

        Ok(outcome)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{DataOperation, OperationRegistry};
    use std::cell::RefCell;
    use std::rc::Rc;

    // Shared call log so tests can assert cross-collaborator ordering.
    type CallLog = Rc<RefCell<Vec<String>>>;

    struct RecordingStore {
        log: CallLog,
        fail_flush: bool,
        fail_migrate: bool,
        fail_reset: bool,
    }

    impl RecordingStore {
        fn new(log: CallLog) -> Self {
            Self {
                log,
                fail_flush: false,
                fail_migrate: false,
                fail_reset: false,
            }
        }

        fn fail(&self, step: &str) -> Result<()> {
            Err(PrepError::CommandFailed {
                command: step.to_string(),
                status: "exit status: 1".to_string(),
            })
        }
    }

    impl SchemaStore for RecordingStore {
        fn migrate(&self) -> Result<()> {
            self.log.borrow_mut().push("migrate".into());
            if self.fail_migrate {
                return self.fail("migrate");
            }
            Ok(())
        }

        fn ensure_cache_table(&self) -> Result<()> {
            self.log.borrow_mut().push("ensure_cache_table".into());
            Ok(())
        }

        fn flush(&self) -> Result<()> {
            self.log.borrow_mut().push("flush".into());
            if self.fail_flush {
                return self.fail("flush");
            }
            Ok(())
        }

        fn delete_artifact(&self) -> Result<()> {
            self.log.borrow_mut().push("delete_artifact".into());
            if self.fail_reset {
                return Err(PrepError::ArtifactLocked {
                    path: std::path::PathBuf::from("test.db"),
                });
            }
            Ok(())
        }

        fn dump(&self) -> Result<()> {
            self.log.borrow_mut().push("dump".into());
            Ok(())
        }
    }

    struct RecordingOperation {
        id: &'static str,
        log: CallLog,
        fail: bool,
    }

    impl DataOperation for RecordingOperation {
        fn run(&self) -> Result<()> {
            self.log.borrow_mut().push(format!("load:{}", self.id));
            if self.fail {
                return Err(PrepError::CommandFailed {
                    command: self.id.to_string(),
                    status: "exit status: 1".to_string(),
                });
            }
            Ok(())
        }
    }

    struct MemoryCache {
        value: RefCell<Option<String>>,
    }

    impl MemoryCache {
        fn empty() -> Self {
            Self {
                value: RefCell::new(None),
            }
        }

        fn holding(id: &str) -> Self {
            Self {
                value: RefCell::new(Some(id.to_string())),
            }
        }
    }

    impl StateCache for MemoryCache {
        fn get(&self) -> Result<Option<String>> {
            Ok(self.value.borrow().clone())
        }

        fn set(&self, operation_id: &str, _ttl: Duration) -> Result<()> {
            *self.value.borrow_mut() = Some(operation_id.to_string());
            Ok(())
        }

        fn delete(&self) -> Result<()> {
            *self.value.borrow_mut() = None;
            Ok(())
        }
    }

    struct Harness {
        log: CallLog,
        store: RecordingStore,
        registry: OperationRegistry,
        cache: MemoryCache,
    }

    impl Harness {
        fn new(cache: MemoryCache) -> Self {
            let log: CallLog = Rc::new(RefCell::new(Vec::new()));
            let store = RecordingStore::new(log.clone());
            let mut registry = OperationRegistry::new();
            for id in ["basic_users", "admin_users"] {
                registry.register(
                    id,
                    Box::new(RecordingOperation {
                        id,
                        log: log.clone(),
                        fail: false,
                    }),
                );
            }
            registry.register(
                "broken_op",
                Box::new(RecordingOperation {
                    id: "broken_op",
                    log: log.clone(),
                    fail: true,
                }),
            );
            Self {
                log,
                store,
                registry,
                cache,
            }
        }

        fn run(&self, request: &ProvisioningRequest) -> Result<Outcome> {
            Sequencer::new(
                &self.store,
                &self.registry,
                &self.cache,
                Duration::from_secs(60),
            )
            .run(request)
        }

        fn calls(&self) -> Vec<String> {
            self.log.borrow().clone()
        }

        fn cached(&self) -> Option<String> {
            self.cache.get().unwrap()
        }
    }

    fn load_request(id: &str) -> ProvisioningRequest {
        ProvisioningRequest {
            operation: Some(id.to_string()),
            ..Default::default()
        }
    }

    // -- Scenario A: empty cache, load executes and is remembered ----------

    #[test]
    fn load_on_empty_cache_executes_and_remembers() {
        let h = Harness::new(MemoryCache::empty());
        let outcome = h.run(&load_request("basic_users")).unwrap();

        assert_eq!(h.calls(), vec!["load:basic_users"]);
        assert_eq!(outcome.loaded.as_deref(), Some("basic_users"));
        assert_eq!(h.cached().as_deref(), Some("basic_users"));
    }

    // -- Scenario B: unchanged id takes the skip path ----------------------

    #[test]
    fn unchanged_operation_skips_everything() {
        let h = Harness::new(MemoryCache::holding("basic_users"));
        let outcome = h.run(&load_request("basic_users")).unwrap();

        assert!(h.calls().is_empty(), "no store or load calls expected");
        assert_eq!(outcome.skipped.as_deref(), Some("basic_users"));
        assert_eq!(outcome.loaded, None);
        assert_eq!(h.cached().as_deref(), Some("basic_users"));
    }

    // -- Scenario C: skip wins over a simultaneous flush -------------------

    #[test]
    fn skip_suppresses_requested_flush() {
        let h = Harness::new(MemoryCache::holding("basic_users"));
        let request = ProvisioningRequest {
            flush: true,
            ..load_request("basic_users")
        };
        let outcome = h.run(&request).unwrap();

        assert!(
            !h.calls().iter().any(|c| c == "flush"),
            "flush must not run on the skip path"
        );
        assert!(!outcome.flushed);
        assert_eq!(outcome.skipped.as_deref(), Some("basic_users"));
    }

    // -- Scenario D: unknown operation -------------------------------------

    #[test]
    fn unknown_operation_fails_and_leaves_cache_alone() {
        let h = Harness::new(MemoryCache::holding("basic_users"));
        let err = h.run(&load_request("missing_op")).unwrap_err();

        assert!(matches!(err, PrepError::UnknownOperation(_)));
        assert_eq!(h.cached().as_deref(), Some("basic_users"));
    }

    // -- Core properties ----------------------------------------------------

    #[test]
    fn changed_operation_loads_and_updates_cache() {
        let h = Harness::new(MemoryCache::holding("basic_users"));
        let outcome = h.run(&load_request("admin_users")).unwrap();

        assert_eq!(h.calls(), vec!["load:admin_users"]);
        assert_eq!(outcome.loaded.as_deref(), Some("admin_users"));
        assert_eq!(h.cached().as_deref(), Some("admin_users"));
    }

    #[test]
    fn repeated_identical_request_skips_second_time() {
        let h = Harness::new(MemoryCache::empty());
        let request = load_request("basic_users");

        let first = h.run(&request).unwrap();
        let second = h.run(&request).unwrap();

        assert_eq!(first.loaded.as_deref(), Some("basic_users"));
        assert_eq!(second.skipped.as_deref(), Some("basic_users"));
        assert_eq!(h.calls(), vec!["load:basic_users"], "one load total");
        assert_eq!(h.cached().as_deref(), Some("basic_users"));
    }

    #[test]
    fn clear_cache_on_skip_path_deletes_record() {
        let h = Harness::new(MemoryCache::holding("basic_users"));
        let request = ProvisioningRequest {
            clear_cache: true,
            ..load_request("basic_users")
        };
        let outcome = h.run(&request).unwrap();

        assert_eq!(outcome.skipped.as_deref(), Some("basic_users"));
        assert!(outcome.cache_cleared);
        assert_eq!(h.cached(), None);
    }

    #[test]
    fn clear_cache_on_full_path_deletes_record_after_load() {
        let h = Harness::new(MemoryCache::empty());
        let request = ProvisioningRequest {
            clear_cache: true,
            ..load_request("basic_users")
        };
        let outcome = h.run(&request).unwrap();

        assert_eq!(outcome.loaded.as_deref(), Some("basic_users"));
        assert!(outcome.cache_cleared);
        assert_eq!(h.cached(), None, "clear-cache applies after the load");
    }

    #[test]
    fn clear_cache_alone_deletes_record() {
        let h = Harness::new(MemoryCache::holding("basic_users"));
        let request = ProvisioningRequest {
            clear_cache: true,
            ..Default::default()
        };
        let outcome = h.run(&request).unwrap();

        assert!(outcome.cache_cleared);
        assert_eq!(h.cached(), None);
    }

    #[test]
    fn steps_run_in_priority_order() {
        let h = Harness::new(MemoryCache::empty());
        let request = ProvisioningRequest {
            reset: true,
            init: true,
            flush: true,
            operation: Some("basic_users".to_string()),
            ..Default::default()
        };
        let outcome = h.run(&request).unwrap();

        assert_eq!(
            h.calls(),
            vec![
                "delete_artifact",
                "migrate",
                "ensure_cache_table",
                "flush",
                "load:basic_users",
            ]
        );
        assert!(outcome.reset && outcome.initialized && outcome.flushed);
        assert_eq!(outcome.loaded.as_deref(), Some("basic_users"));
    }

    #[test]
    fn reset_and_init_run_even_when_skip_fires() {
        let h = Harness::new(MemoryCache::holding("basic_users"));
        let request = ProvisioningRequest {
            reset: true,
            init: true,
            ..load_request("basic_users")
        };
        let outcome = h.run(&request).unwrap();

        assert_eq!(
            h.calls(),
            vec!["delete_artifact", "migrate", "ensure_cache_table"]
        );
        assert_eq!(outcome.skipped.as_deref(), Some("basic_users"));
    }

    #[test]
    fn dump_terminates_the_sequence() {
        let h = Harness::new(MemoryCache::empty());
        let request = ProvisioningRequest {
            dump: true,
            init: true,
            flush: true,
            operation: Some("basic_users".to_string()),
            ..Default::default()
        };
        let outcome = h.run(&request).unwrap();

        assert_eq!(h.calls(), vec!["dump"]);
        assert!(outcome.dumped);
        assert_eq!(outcome.loaded, None);
    }

    // -- Failure semantics ---------------------------------------------------

    #[test]
    fn failing_load_propagates_and_leaves_cache_alone() {
        let h = Harness::new(MemoryCache::holding("basic_users"));
        let err = h.run(&load_request("broken_op")).unwrap_err();

        match err {
            PrepError::OperationFailed { id, .. } => assert_eq!(id, "broken_op"),
            other => panic!("expected OperationFailed, got {other:?}"),
        }
        assert_eq!(
            h.cached().as_deref(),
            Some("basic_users"),
            "failed load must not be remembered"
        );
    }

    #[test]
    fn failing_flush_aborts_before_load() {
        let mut h = Harness::new(MemoryCache::empty());
        h.store.fail_flush = true;
        let request = ProvisioningRequest {
            flush: true,
            ..load_request("basic_users")
        };
        let err = h.run(&request).unwrap_err();

        assert!(matches!(err, PrepError::CommandFailed { .. }));
        assert_eq!(h.calls(), vec!["flush"], "load must not run after a failed flush");
        assert_eq!(h.cached(), None);
    }

    #[test]
    fn locked_artifact_aborts_and_leaves_cache_alone() {
        let mut h = Harness::new(MemoryCache::holding("basic_users"));
        h.store.fail_reset = true;
        let request = ProvisioningRequest {
            reset: true,
            ..load_request("admin_users")
        };
        let err = h.run(&request).unwrap_err();

        assert!(matches!(err, PrepError::ArtifactLocked { .. }));
        assert_eq!(h.calls(), vec!["delete_artifact"]);
        assert_eq!(h.cached().as_deref(), Some("basic_users"));
    }

    #[test]
    fn failing_migrate_aborts_remaining_steps() {
        let mut h = Harness::new(MemoryCache::empty());
        h.store.fail_migrate = true;
        let request = ProvisioningRequest {
            init: true,
            flush: true,
            ..Default::default()
        };
        let err = h.run(&request).unwrap_err();

        assert!(matches!(err, PrepError::CommandFailed { .. }));
        assert_eq!(h.calls(), vec!["migrate"]);
    }
}
