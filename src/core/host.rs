//! Function host.
//!
//! Wires the domains together: scan the roots, extract and bind every
//! candidate, register the bindings and publish the resulting registry. The
//! protocol layer talks to the host only through [`FunctionHost::capabilities`]
//! and [`FunctionHost::invoke`].

use futures::StreamExt;
use serde::Serialize;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::{FunctionsConfig, OnDuplicate};
use super::error::Result;
use crate::domains::descriptors::{ExtractionError, ResourceDescriptor, ToolDescriptor, extract};
use crate::domains::discovery::{Candidate, ModuleScanner, ScanEvent, ScanOptions, ScanWarning};
use crate::domains::dispatch::{DispatchOptions, Dispatcher, InvocationRequest, InvocationResult};
use crate::domains::handlers::{BuiltinCatalog, bind};
use crate::domains::registry::{
    Binding, DuplicatePolicy, Registered, RegistrationError, Registry, RegistryStore,
};

/// Everything the server currently advertises.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Capabilities {
    pub tools: Vec<ToolDescriptor>,
    pub resources: Vec<ResourceDescriptor>,
}

/// Outcome of a scan that produced a registry.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Number of registered tools.
    pub tools: usize,

    /// Number of registered resources.
    pub resources: usize,

    /// Units or roots that were skipped.
    pub warnings: Vec<ScanWarning>,

    /// Candidates that were skipped.
    pub rejected: Vec<ExtractionError>,

    /// Duplicates dropped under the `skip` policy.
    pub duplicates: Vec<RegistrationError>,
}

impl ScanReport {
    /// Whether every unit and candidate made it into the registry.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty() && self.rejected.is_empty() && self.duplicates.is_empty()
    }

    /// Counts plus one line per problem, for operators.
    pub fn summary(&self) -> Value {
        json!({
            "tools": self.tools,
            "resources": self.resources,
            "warnings": self
                .warnings
                .iter()
                .map(|w| format!("{}: {}", w.location.display(), w.error))
                .collect::<Vec<_>>(),
            "rejected": self.rejected.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "duplicates": self.duplicates.iter().map(ToString::to_string).collect::<Vec<_>>(),
        })
    }
}

/// Owns the registry and everything needed to rebuild it.
pub struct FunctionHost {
    roots: Vec<PathBuf>,
    scanner: ModuleScanner,
    catalog: BuiltinCatalog,
    on_duplicate: OnDuplicate,
    dispatcher: Dispatcher,
    store: RegistryStore,
    reload_lock: Mutex<()>,
}

impl FunctionHost {
    /// Create a host with an empty registry. Call [`reload`](Self::reload)
    /// to populate it.
    pub fn new(config: &FunctionsConfig, catalog: BuiltinCatalog) -> Self {
        Self {
            roots: config.dirs.clone(),
            scanner: ModuleScanner::new(ScanOptions {
                load_timeout: config.load_timeout(),
            }),
            catalog,
            on_duplicate: config.on_duplicate,
            dispatcher: Dispatcher::new(DispatchOptions {
                call_timeout: config.call_timeout(),
                extra_arguments: config.extra_arguments,
            }),
            store: RegistryStore::default(),
            reload_lock: Mutex::new(()),
        }
    }

    /// Configured roots, in scan order.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Scan the roots and build a fresh registry without publishing it.
    pub async fn build_registry(&self) -> Result<(Registry, ScanReport)> {
        let policy = match self.on_duplicate {
            OnDuplicate::Replace => DuplicatePolicy::Replace,
            OnDuplicate::Fail | OnDuplicate::Skip => DuplicatePolicy::Reject,
        };
        let mut builder = Registry::builder(policy);
        let mut report = ScanReport::default();

        let mut events = pin!(self.scanner.scan(&self.roots));
        while let Some(event) = events.next().await {
            let candidate = match event {
                ScanEvent::Candidate(candidate) => candidate,
                ScanEvent::Warning(warning) => {
                    warn!(
                        location = %warning.location.display(),
                        error = %warning.error,
                        "Skipping function module"
                    );
                    report.warnings.push(warning);
                    continue;
                }
            };

            let binding = match self.binding_for(&candidate) {
                Ok(binding) => binding,
                Err(err) => {
                    warn!(location = %err.location(), error = %err, "Skipping function");
                    report.rejected.push(err);
                    continue;
                }
            };

            let name = binding.key().to_string();
            match builder.register(binding) {
                Ok(Registered::Inserted) => {
                    debug!(name = %name, location = %candidate.location, "Registered function");
                }
                Ok(Registered::Replaced) => {
                    info!(
                        name = %name,
                        location = %candidate.location,
                        "Replaced earlier registration"
                    );
                }
                Err(err) => match self.on_duplicate {
                    OnDuplicate::Fail => return Err(err.into()),
                    OnDuplicate::Skip | OnDuplicate::Replace => {
                        warn!(
                            name = %name,
                            location = %candidate.location,
                            error = %err,
                            "Skipping duplicate"
                        );
                        report.duplicates.push(err);
                    }
                },
            }
        }

        let registry = builder.build();
        report.tools = registry.tool_count();
        report.resources = registry.resource_count();
        Ok((registry, report))
    }

    fn binding_for(&self, candidate: &Candidate) -> std::result::Result<Binding, ExtractionError> {
        let descriptor = extract(candidate)?;
        let handler = bind(candidate, &self.catalog)?;
        let timeout = candidate.function.timeout_secs.map(Duration::from_secs);
        Ok(Binding::new(descriptor, handler, timeout))
    }

    /// Rebuild the registry from disk and publish it.
    ///
    /// On error the previously published registry stays in place.
    pub async fn reload(&self) -> Result<ScanReport> {
        let _guard = self.reload_lock.lock().await;

        let (registry, report) = self.build_registry().await.inspect_err(|e| {
            warn!(error = %e, "Reload rejected, keeping the current registry");
        })?;
        let generation = self.store.publish(registry);

        info!(
            generation,
            tools = report.tools,
            resources = report.resources,
            warnings = report.warnings.len(),
            rejected = report.rejected.len(),
            "Function registry published"
        );
        Ok(report)
    }

    /// Current registry snapshot.
    pub fn registry(&self) -> Arc<Registry> {
        self.store.load()
    }

    /// Number of registries published so far.
    pub fn generation(&self) -> u64 {
        self.store.generation()
    }

    /// Descriptors of every registered tool and resource.
    pub fn capabilities(&self) -> Capabilities {
        let registry = self.store.load();
        Capabilities {
            tools: registry.list_tools().cloned().collect(),
            resources: registry.list_resources().cloned().collect(),
        }
    }

    /// Run one invocation against the current snapshot.
    pub async fn invoke(
        &self,
        request: InvocationRequest,
        cancel: CancellationToken,
    ) -> InvocationResult {
        let registry = self.store.load();
        self.dispatcher.invoke(&registry, request, cancel).await
    }
}

impl std::fmt::Debug for FunctionHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionHost")
            .field("roots", &self.roots)
            .field("on_duplicate", &self.on_duplicate)
            .field("generation", &self.store.generation())
            .finish()
    }
}
