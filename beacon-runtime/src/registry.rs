//! Named pipeline-instance registry.
//!
//! Hands out one shared [`PipelineInstance`] per module name and tears it down
//! when the last holder releases it.
//!
//! ## Locking
//!
//! - **One map lock**: every lookup and reference-count change happens under a
//!   single mutex, so acquire and release on a key are linearizable
//! - **Construction under the lock**: the factory runs while the lock is held
//!   and must not re-enter the registry; a panicking factory is reported as
//!   [`RegistryError::FactoryPanicked`] and leaves the map untouched
//! - **Teardown outside the lock**: the entry is removed under the lock, then
//!   the instance is flushed after the lock is dropped, so a slow flush does
//!   not block other keys
//!
//! A module acquired again while its previous instance is still flushing gets a
//! fresh instance; the old one is already unreachable through the registry.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use beacon_core::debug::{DebugEvent, DebugEventDispatcher, DebugEventKind};

use crate::config::LogConfiguration;
use crate::instance::{InstanceFactory, PipelineError, PipelineInstance};

/// Instance registry errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No live entry for the module (never acquired, or over-released)
    #[error("no instance registered for module `{0}`")]
    NotFound(String),
    /// Module names must be non-empty
    #[error("module name must not be empty")]
    EmptyModuleName,
    /// The factory failed to build an instance
    #[error("failed to create instance for module `{module}`")]
    CreateFailed {
        module: String,
        #[source]
        source: PipelineError,
    },
    /// The factory panicked; no entry was inserted
    #[error("instance factory panicked for module `{0}`")]
    FactoryPanicked(String),
}

/// How an acquisition was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireStatus {
    /// No entry existed; a new instance was constructed
    Created,
    /// The existing instance was returned
    Existing,
    /// The existing instance was returned, but the supplied configuration
    /// differs from the one on record and was ignored
    ConfigConflict,
}

/// Result of a successful acquisition.
#[derive(Clone)]
pub struct Acquired {
    pub instance: Arc<dyn PipelineInstance>,
    pub status: AcquireStatus,
    /// Reference count after this acquisition
    pub ref_count: usize,
}

impl core::fmt::Debug for Acquired {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Acquired")
            .field("module", &self.instance.module_name())
            .field("status", &self.status)
            .field("ref_count", &self.ref_count)
            .finish()
    }
}

/// Result of a successful release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseStatus {
    /// Other holders remain
    Released { remaining: usize },
    /// This was the last holder; the instance was torn down
    TornDown,
}

struct Entry {
    instance: Arc<dyn PipelineInstance>,
    config: LogConfiguration,
    ref_count: usize,
}

/// Registry of shared pipeline instances keyed by module name.
pub struct InstanceRegistry {
    factory: Arc<dyn InstanceFactory>,
    entries: Mutex<HashMap<String, Entry>>,
    debug_events: Option<Arc<DebugEventDispatcher>>,
}

impl core::fmt::Debug for InstanceRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InstanceRegistry")
            .field("modules", &self.module_names())
            .finish()
    }
}

impl InstanceRegistry {
    pub fn new(factory: Arc<dyn InstanceFactory>) -> Self {
        Self {
            factory,
            entries: Mutex::new(HashMap::new()),
            debug_events: None,
        }
    }

    /// Broadcast lifecycle events on `dispatcher`.
    pub fn with_debug_events(mut self, dispatcher: Arc<DebugEventDispatcher>) -> Self {
        self.debug_events = Some(dispatcher);
        self
    }

    // Every mutation is a single insert/remove/count change, so a poisoned map
    // is still consistent.
    fn guard(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, event: DebugEvent) {
        if let Some(dispatcher) = &self.debug_events {
            dispatcher.dispatch(&event);
        }
    }

    /// Acquire the instance for `config.module_name`, creating it if needed.
    pub fn acquire(&self, config: &LogConfiguration) -> Result<Acquired, RegistryError> {
        self.acquire_inner(&config.module_name, Some(config))
    }

    /// Acquire by bare module name. Never reports a configuration conflict.
    pub fn acquire_module(&self, module_name: &str) -> Result<Acquired, RegistryError> {
        self.acquire_inner(module_name, None)
    }

    fn acquire_inner(
        &self,
        module_name: &str,
        config: Option<&LogConfiguration>,
    ) -> Result<Acquired, RegistryError> {
        if module_name.is_empty() {
            return Err(RegistryError::EmptyModuleName);
        }

        let mut entries = self.guard();

        if let Some(entry) = entries.get_mut(module_name) {
            entry.ref_count += 1;
            let status = match config {
                Some(requested) if *requested != entry.config => {
                    tracing::warn!(
                        module = module_name,
                        "module already exists with a different configuration"
                    );
                    AcquireStatus::ConfigConflict
                }
                _ => AcquireStatus::Existing,
            };
            tracing::debug!(module = module_name, ref_count = entry.ref_count, "instance acquired");
            return Ok(Acquired {
                instance: entry.instance.clone(),
                status,
                ref_count: entry.ref_count,
            });
        }

        let config = config
            .cloned()
            .unwrap_or_else(|| LogConfiguration::for_module(module_name));
        let created = panic::catch_unwind(AssertUnwindSafe(|| self.factory.create(&config)))
            .map_err(|_| {
                tracing::error!(module = module_name, "instance factory panicked");
                RegistryError::FactoryPanicked(module_name.to_string())
            })?;
        let instance = created.map_err(|source| RegistryError::CreateFailed {
            module: module_name.to_string(),
            source,
        })?;

        entries.insert(
            module_name.to_string(),
            Entry {
                instance: instance.clone(),
                config,
                ref_count: 1,
            },
        );
        drop(entries);

        tracing::info!(module = module_name, "instance created");
        self.notify(DebugEvent::new(DebugEventKind::InstanceCreated, module_name).with_param(1));

        Ok(Acquired {
            instance,
            status: AcquireStatus::Created,
            ref_count: 1,
        })
    }

    /// Release one reference to the instance of `config.module_name`.
    pub fn release(&self, config: &LogConfiguration) -> Result<ReleaseStatus, RegistryError> {
        self.release_module(&config.module_name)
    }

    /// Release one reference by module name, tearing down at zero.
    pub fn release_module(&self, module_name: &str) -> Result<ReleaseStatus, RegistryError> {
        let mut entries = self.guard();

        let remaining = match entries.get_mut(module_name) {
            Some(entry) => {
                entry.ref_count = entry.ref_count.saturating_sub(1);
                entry.ref_count
            }
            None => return Err(RegistryError::NotFound(module_name.to_string())),
        };

        if remaining > 0 {
            tracing::debug!(module = module_name, remaining, "instance released");
            return Ok(ReleaseStatus::Released { remaining });
        }

        let entry = entries
            .remove(module_name)
            .ok_or_else(|| RegistryError::NotFound(module_name.to_string()))?;
        drop(entries);

        self.teardown(module_name, entry);
        Ok(ReleaseStatus::TornDown)
    }

    /// Tear down every instance regardless of reference counts.
    ///
    /// Returns the number of instances torn down.
    pub fn release_all(&self) -> usize {
        let drained: Vec<(String, Entry)> = self.guard().drain().collect();
        let count = drained.len();
        for (module_name, entry) in drained {
            self.teardown(&module_name, entry);
        }
        count
    }

    fn teardown(&self, module_name: &str, entry: Entry) {
        let budget = entry.config.teardown_budget();
        tracing::info!(module = module_name, ?budget, "tearing down instance");
        entry.instance.flush_and_teardown(budget);
        self.notify(DebugEvent::new(DebugEventKind::InstanceDestroyed, module_name));
    }

    /// Whether a live instance exists for `module_name`
    pub fn contains(&self, module_name: &str) -> bool {
        self.guard().contains_key(module_name)
    }

    /// Current reference count of a live module
    pub fn ref_count(&self, module_name: &str) -> Option<usize> {
        self.guard().get(module_name).map(|e| e.ref_count)
    }

    /// Configuration on record for a live module.
    pub fn config(&self, module_name: &str) -> Option<LogConfiguration> {
        self.guard().get(module_name).map(|e| e.config.clone())
    }

    /// Live module names, sorted
    pub fn module_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.guard().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of live instances
    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    use beacon_core::debug::RecordingListener;
    use beacon_core::properties::EventProperties;

    #[derive(Default)]
    struct Counters {
        created: AtomicUsize,
        torn_down: AtomicUsize,
        last_budget_secs: AtomicUsize,
    }

    struct CountingInstance {
        module: String,
        counters: Arc<Counters>,
    }

    impl PipelineInstance for CountingInstance {
        fn module_name(&self) -> &str {
            &self.module
        }

        fn submit(&self, _event: EventProperties) -> Result<(), PipelineError> {
            Ok(())
        }

        fn flush_and_teardown(&self, budget: Duration) {
            self.counters
                .last_budget_secs
                .store(budget.as_secs() as usize, Ordering::SeqCst);
            self.counters.torn_down.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counting_registry() -> (InstanceRegistry, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let c = counters.clone();
        let factory = move |config: &LogConfiguration| -> Result<Arc<dyn PipelineInstance>, PipelineError> {
            c.created.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(CountingInstance {
                module: config.module_name.clone(),
                counters: c.clone(),
            }))
        };
        (InstanceRegistry::new(Arc::new(factory)), counters)
    }

    #[test]
    fn acquire_twice_shares_instance() {
        let (registry, counters) = counting_registry();

        let first = registry.acquire_module("shell").unwrap();
        let second = registry.acquire_module("shell").unwrap();

        assert_eq!(first.status, AcquireStatus::Created);
        assert_eq!(second.status, AcquireStatus::Existing);
        assert_eq!(second.ref_count, 2);
        assert!(Arc::ptr_eq(&first.instance, &second.instance));
        assert_eq!(counters.created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn release_tears_down_exactly_once() {
        let (registry, counters) = counting_registry();
        registry.acquire_module("shell").unwrap();
        registry.acquire_module("shell").unwrap();

        assert_eq!(
            registry.release_module("shell"),
            Ok(ReleaseStatus::Released { remaining: 1 })
        );
        assert_eq!(counters.torn_down.load(Ordering::SeqCst), 0);
        assert_eq!(registry.release_module("shell"), Ok(ReleaseStatus::TornDown));
        assert_eq!(counters.torn_down.load(Ordering::SeqCst), 1);
        assert_eq!(
            registry.release_module("shell"),
            Err(RegistryError::NotFound("shell".to_string()))
        );
        assert_eq!(counters.torn_down.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn release_unknown_module_is_not_found() {
        let (registry, _) = counting_registry();
        assert!(matches!(
            registry.release_module("nobody"),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn differing_config_reports_conflict_and_keeps_instance() {
        let (registry, counters) = counting_registry();
        let original = LogConfiguration::builder()
            .module_name("svc")
            .version("1.0.0")
            .build();
        let different = LogConfiguration::builder()
            .module_name("svc")
            .version("2.0.0")
            .build();

        let first = registry.acquire(&original).unwrap();
        let second = registry.acquire(&different).unwrap();
        let third = registry.acquire(&original).unwrap();

        assert_eq!(second.status, AcquireStatus::ConfigConflict);
        assert_eq!(third.status, AcquireStatus::Existing);
        assert!(Arc::ptr_eq(&first.instance, &second.instance));
        assert_eq!(registry.config("svc"), Some(original));
        assert_eq!(registry.ref_count("svc"), Some(3));
        assert_eq!(counters.created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn module_acquire_never_conflicts() {
        let (registry, _) = counting_registry();
        let config = LogConfiguration::builder()
            .module_name("svc")
            .version("9.9.9")
            .build();
        registry.acquire(&config).unwrap();
        assert_eq!(
            registry.acquire_module("svc").unwrap().status,
            AcquireStatus::Existing
        );
    }

    #[test]
    fn teardown_receives_configured_budget() {
        let (registry, counters) = counting_registry();
        let config = LogConfiguration::builder()
            .module_name("svc")
            .max_teardown_time(7)
            .build();
        registry.acquire(&config).unwrap();
        registry.release(&config).unwrap();
        assert_eq!(counters.last_budget_secs.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn empty_module_name_rejected() {
        let (registry, counters) = counting_registry();
        assert!(matches!(
            registry.acquire_module(""),
            Err(RegistryError::EmptyModuleName)
        ));
        assert_eq!(counters.created.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn factory_failure_leaves_no_entry() {
        let factory = |config: &LogConfiguration| -> Result<Arc<dyn PipelineInstance>, PipelineError> {
            Err(PipelineError::InvalidConfig(config.module_name.clone()))
        };
        let registry = InstanceRegistry::new(Arc::new(factory));
        let err = registry.acquire_module("broken").unwrap_err();
        assert!(matches!(err, RegistryError::CreateFailed { ref module, .. } if module == "broken"));
        assert!(!registry.contains("broken"));
    }

    #[test]
    fn lifecycle_events_are_broadcast() {
        let (registry, _) = counting_registry();
        let dispatcher = Arc::new(DebugEventDispatcher::new());
        let listener = Arc::new(RecordingListener::new());
        dispatcher.add_listener(listener.clone());
        let registry = registry.with_debug_events(dispatcher);

        registry.acquire_module("svc").unwrap();
        registry.acquire_module("svc").unwrap();
        registry.release_module("svc").unwrap();
        registry.release_module("svc").unwrap();

        assert_eq!(listener.count(DebugEventKind::InstanceCreated), 1);
        assert_eq!(listener.count(DebugEventKind::InstanceDestroyed), 1);
    }

    #[test]
    fn release_all_tears_down_everything() {
        let (registry, counters) = counting_registry();
        registry.acquire_module("a").unwrap();
        registry.acquire_module("b").unwrap();
        registry.acquire_module("b").unwrap();

        assert_eq!(registry.release_all(), 2);
        assert_eq!(counters.torn_down.load(Ordering::SeqCst), 2);
        assert!(registry.is_empty());
    }

    #[test]
    fn keys_are_independent() {
        let (registry, _) = counting_registry();
        let a = registry.acquire_module("a").unwrap();
        let b = registry.acquire_module("b").unwrap();
        assert!(!Arc::ptr_eq(&a.instance, &b.instance));
        assert_eq!(registry.module_names(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn concurrent_acquire_release_is_balanced() {
        let (registry, counters) = counting_registry();
        let registry = Arc::new(registry);
        let threads = 8;
        let rounds = 200;
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let registry = registry.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..rounds {
                        registry.acquire_module("shared").unwrap();
                        registry.release_module("shared").unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(registry.is_empty());
        assert_eq!(
            counters.created.load(Ordering::SeqCst),
            counters.torn_down.load(Ordering::SeqCst)
        );
    }

    #[test]
    fn panicking_factory_leaves_live_modules_usable() {
        let counters = Arc::new(Counters::default());
        let c = counters.clone();
        let factory = move |config: &LogConfiguration| -> Result<Arc<dyn PipelineInstance>, PipelineError> {
            if config.module_name == "bad" {
                panic!("factory failure");
            }
            Ok(Arc::new(CountingInstance {
                module: config.module_name.clone(),
                counters: c.clone(),
            }))
        };
        let registry = Arc::new(InstanceRegistry::new(Arc::new(factory)));
        registry.acquire_module("good").unwrap();

        let r = registry.clone();
        let failed = thread::spawn(move || r.acquire_module("bad").map(|a| a.status))
            .join()
            .unwrap();

        assert_eq!(failed, Err(RegistryError::FactoryPanicked("bad".to_string())));
        assert!(registry.contains("good"));
        assert!(!registry.contains("bad"));
        assert_eq!(registry.len(), 1);
        assert!(!registry.is_empty());
        assert_eq!(registry.release_module("good"), Ok(ReleaseStatus::TornDown));
        assert_eq!(counters.torn_down.load(Ordering::SeqCst), 1);
        assert_eq!(registry.release_all(), 0);
    }
}
