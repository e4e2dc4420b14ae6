//! Tool and resource bindings.
//!
//! A [`Registry`] is an immutable snapshot built by a [`RegistryBuilder`].
//! Both keep tools and resources in insertion order; the builder enforces
//! unique keys according to a [`DuplicatePolicy`].

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::error::RegistrationError;
use crate::domains::descriptors::{Descriptor, ResourceDescriptor, ToolDescriptor};
use crate::domains::discovery::SourceLocation;
use crate::domains::handlers::FunctionHandler;

/// A descriptor bound to its handler.
#[derive(Clone)]
pub struct HandlerBinding<D> {
    pub descriptor: D,
    pub handler: Arc<dyn FunctionHandler>,

    /// Per-call timeout overriding the server default.
    pub timeout: Option<Duration>,
}

impl<D: fmt::Debug> fmt::Debug for HandlerBinding<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerBinding")
            .field("descriptor", &self.descriptor)
            .field("handler", &self.handler.kind())
            .field("timeout", &self.timeout)
            .finish()
    }
}

pub type ToolBinding = HandlerBinding<ToolDescriptor>;
pub type ResourceBinding = HandlerBinding<ResourceDescriptor>;

/// A binding of either kind, as handed to the builder.
#[derive(Debug, Clone)]
pub enum Binding {
    Tool(ToolBinding),
    Resource(ResourceBinding),
}

impl Binding {
    /// Pair a descriptor with its handler.
    pub fn new(
        descriptor: Descriptor,
        handler: Arc<dyn FunctionHandler>,
        timeout: Option<Duration>,
    ) -> Self {
        match descriptor {
            Descriptor::Tool(descriptor) => Self::Tool(HandlerBinding {
                descriptor,
                handler,
                timeout,
            }),
            Descriptor::Resource(descriptor) => Self::Resource(HandlerBinding {
                descriptor,
                handler,
                timeout,
            }),
        }
    }

    /// Registry key: tool name or URI template.
    pub fn key(&self) -> &str {
        match self {
            Self::Tool(binding) => &binding.descriptor.name,
            Self::Resource(binding) => binding.descriptor.uri_template(),
        }
    }

    pub fn source(&self) -> &SourceLocation {
        match self {
            Self::Tool(binding) => &binding.descriptor.source,
            Self::Resource(binding) => &binding.descriptor.source,
        }
    }
}

/// What to do when a key is registered twice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Keep the first binding and report the second.
    #[default]
    Reject,

    /// Overwrite the first binding in place.
    Replace,
}

/// Result of a successful registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registered {
    Inserted,
    Replaced,
}

/// Insertion-ordered map with unique keys.
#[derive(Debug, Clone)]
struct Ordered<T> {
    entries: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> Default for Ordered<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T> Ordered<T> {
    fn get(&self, key: &str) -> Option<&T> {
        self.index.get(key).map(|&i| &self.entries[i])
    }

    fn insert(
        &mut self,
        key: &str,
        entry: T,
        policy: DuplicatePolicy,
        source: impl Fn(&T) -> &SourceLocation,
    ) -> Result<Registered, RegistrationError> {
        match self.index.get(key) {
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push(entry);
                Ok(Registered::Inserted)
            }
            Some(&i) => match policy {
                DuplicatePolicy::Reject => Err(RegistrationError::DuplicateIdentifier {
                    key: key.to_string(),
                    existing: source(&self.entries[i]).clone(),
                    incoming: source(&entry).clone(),
                }),
                DuplicatePolicy::Replace => {
                    self.entries[i] = entry;
                    Ok(Registered::Replaced)
                }
            },
        }
    }
}

/// Immutable snapshot of every registered tool and resource.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    tools: Ordered<ToolBinding>,
    resources: Ordered<ResourceBinding>,
}

impl Registry {
    /// Start building a registry.
    pub fn builder(policy: DuplicatePolicy) -> RegistryBuilder {
        RegistryBuilder {
            registry: Registry::default(),
            policy,
        }
    }

    /// Tool descriptors in insertion order.
    pub fn list_tools(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.entries.iter().map(|binding| &binding.descriptor)
    }

    /// Resource descriptors in insertion order.
    pub fn list_resources(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.resources.entries.iter().map(|binding| &binding.descriptor)
    }

    pub fn resolve_tool(&self, name: &str) -> Option<&ToolBinding> {
        self.tools.get(name)
    }

    /// Find the resource serving `uri` and the values bound to its
    /// placeholders.
    ///
    /// Templates are tried in insertion order and the first match wins.
    pub fn resolve_resource(&self, uri: &str) -> Option<(&ResourceBinding, Map<String, Value>)> {
        self.resources.entries.iter().find_map(|binding| {
            binding.descriptor.template.matches(uri).map(|bound| {
                let arguments = bound
                    .into_iter()
                    .map(|(name, value)| (name, Value::String(value)))
                    .collect();
                (binding, arguments)
            })
        })
    }

    pub fn tool_count(&self) -> usize {
        self.tools.entries.len()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tool_count() == 0 && self.resource_count() == 0
    }
}

/// Accumulates bindings into a [`Registry`].
#[derive(Debug)]
pub struct RegistryBuilder {
    registry: Registry,
    policy: DuplicatePolicy,
}

impl RegistryBuilder {
    /// Add a binding under its key.
    pub fn register(&mut self, binding: Binding) -> Result<Registered, RegistrationError> {
        match binding {
            Binding::Tool(binding) => {
                let key = binding.descriptor.name.clone();
                self.registry
                    .tools
                    .insert(&key, binding, self.policy, |b| &b.descriptor.source)
            }
            Binding::Resource(binding) => {
                let key = binding.descriptor.uri_template().to_string();
                self.registry
                    .resources
                    .insert(&key, binding, self.policy, |b| &b.descriptor.source)
            }
        }
    }

    pub fn build(self) -> Registry {
        self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::descriptors::extract;
    use crate::domains::discovery::{ModuleManifest, OutputFormat};
    use crate::domains::handlers::TextHandler;
    use std::path::Path;

    fn bindings(path: &str, source: &str) -> Vec<Binding> {
        ModuleManifest::parse(source)
            .unwrap()
            .into_candidates(Path::new(path))
            .iter()
            .map(|candidate| {
                let name = candidate.function.name.clone();
                let handler = Arc::new(TextHandler::new(name, OutputFormat::Text));
                Binding::new(extract(candidate).unwrap(), handler, None)
            })
            .collect()
    }

    const LOOKUP_A: &str = "[[function]]\nname = \"lookup\"\ntext = \"\"\ntool = {}\n";
    const LOOKUP_B: &str =
        "[[function]]\nname = \"lookup_v2\"\ntext = \"\"\ntool = { name = \"lookup\" }\n";

    #[test]
    fn test_insertion_order() {
        let mut builder = Registry::builder(DuplicatePolicy::Reject);
        for binding in bindings(
            "/m/a.toml",
            r#"
                [[function]]
                name = "zeta"
                text = ""
                tool = {}

                [[function]]
                name = "alpha"
                text = ""
                tool = {}
            "#,
        ) {
            builder.register(binding).unwrap();
        }
        let registry = builder.build();

        let names: Vec<_> = registry.list_tools().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
        assert!(registry.resolve_tool("alpha").is_some());
        assert!(registry.resolve_tool("missing").is_none());
    }

    #[test]
    fn test_duplicate_is_rejected() {
        let mut builder = Registry::builder(DuplicatePolicy::Reject);
        builder.register(bindings("/m/a.toml", LOOKUP_A).remove(0)).unwrap();
        let err = builder.register(bindings("/m/b.toml", LOOKUP_B).remove(0)).unwrap_err();

        let RegistrationError::DuplicateIdentifier { key, existing, incoming } = err;
        assert_eq!(key, "lookup");
        assert_eq!(existing.to_string(), "/m/a.toml#lookup");
        assert_eq!(incoming.to_string(), "/m/b.toml#lookup_v2");

        let registry = builder.build();
        assert_eq!(registry.tool_count(), 1);
        let binding = registry.resolve_tool("lookup").unwrap();
        assert_eq!(binding.descriptor.source.path, Path::new("/m/a.toml"));
    }

    #[test]
    fn test_duplicate_is_replaced_in_place() {
        let mut builder = Registry::builder(DuplicatePolicy::Replace);
        builder.register(bindings("/m/a.toml", LOOKUP_A).remove(0)).unwrap();
        let other = "[[function]]\nname = \"other\"\ntext = \"\"\ntool = {}\n";
        for binding in bindings("/m/c.toml", other) {
            builder.register(binding).unwrap();
        }
        let outcome = builder.register(bindings("/m/b.toml", LOOKUP_B).remove(0)).unwrap();
        assert_eq!(outcome, Registered::Replaced);

        let registry = builder.build();
        let names: Vec<_> = registry.list_tools().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["lookup", "other"]);
        let binding = registry.resolve_tool("lookup").unwrap();
        assert_eq!(binding.descriptor.source.path, Path::new("/m/b.toml"));
    }

    #[test]
    fn test_resolve_resource_binds_placeholders() {
        let mut builder = Registry::builder(DuplicatePolicy::Reject);
        for binding in bindings(
            "/m/r.toml",
            r#"
                [[function]]
                name = "record"
                params = [{ name = "id" }]
                text = ""
                resource = { uri = "file://data/{id}" }
            "#,
        ) {
            builder.register(binding).unwrap();
        }
        let registry = builder.build();

        let (binding, arguments) = registry.resolve_resource("file://data/42").unwrap();
        assert_eq!(binding.descriptor.name, "record");
        assert_eq!(arguments.get("id"), Some(&Value::String("42".to_string())));
        assert!(registry.resolve_resource("file://other/42").is_none());
    }

    #[test]
    fn test_first_registered_template_wins() {
        let mut builder = Registry::builder(DuplicatePolicy::Reject);
        for binding in bindings(
            "/m/r.toml",
            r#"
            [[function]]
            name = "by_id"
            params = [{ name = "id" }]
            text = ""
            resource = { uri = "file://data/{id}" }

            [[function]]
            name = "latest"
            text = ""
            resource = { uri = "file://data/latest" }
            "#,
        ) {
            builder.register(binding).unwrap();
        }
        let registry = builder.build();

        let (binding, _) = registry.resolve_resource("file://data/latest").unwrap();
        assert_eq!(binding.descriptor.name, "by_id");
    }
}
