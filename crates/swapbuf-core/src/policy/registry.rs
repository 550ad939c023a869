//! Named policy factories.

use super::{AlwaysDump, BarrierDump, DumpPolicy, NeverDump, ValveDump};
use crate::monitor::MemoryMonitor;
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use swapbuf_common::utils::error::{Error, Result};

/// Builds a policy, given the monitor memory-pressure policies consult.
pub type PolicyFactory = fn(&Arc<dyn MemoryMonitor>) -> Box<dyn DumpPolicy>;

/// A registered policy.
#[derive(Clone, Copy)]
pub struct PolicyDescriptor {
    /// Name used to select the policy.
    pub name: &'static str,
    /// One-line description.
    pub description: &'static str,
    factory: PolicyFactory,
}

impl fmt::Debug for PolicyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Maps policy names to factories, in registration order.
pub struct PolicyRegistry {
    policies: IndexMap<&'static str, PolicyDescriptor>,
    monitor: Arc<dyn MemoryMonitor>,
}

impl PolicyRegistry {
    /// Creates a registry with the built-in policies.
    #[must_use]
    pub fn new(monitor: Arc<dyn MemoryMonitor>) -> Self {
        let mut registry = Self {
            policies: IndexMap::new(),
            monitor,
        };
        registry.register("never", "keep every buffer in memory", |_| {
            Box::new(NeverDump::new())
        });
        registry.register("always", "dump every buffer nobody holds", |_| {
            Box::new(AlwaysDump::new())
        });
        registry.register("barrier", "cap the bytes held by loaded buffers", |_| {
            Box::new(BarrierDump::new())
        });
        registry.register("valve", "keep a floor of free system memory", |monitor| {
            Box::new(ValveDump::new(Arc::clone(monitor)))
        });
        registry
    }

    /// Registers a policy, replacing any with the same name.
    pub fn register(
        &mut self,
        name: &'static str,
        description: &'static str,
        factory: PolicyFactory,
    ) {
        self.policies.insert(
            name,
            PolicyDescriptor {
                name,
                description,
                factory,
            },
        );
    }

    /// Names of the registered policies.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.policies.keys().copied()
    }

    /// The registered policies.
    pub fn descriptors(&self) -> impl Iterator<Item = &PolicyDescriptor> + '_ {
        self.policies.values()
    }

    /// The monitor handed to factories.
    #[must_use]
    pub fn monitor(&self) -> &Arc<dyn MemoryMonitor> {
        &self.monitor
    }

    /// Creates a policy with default parameters.
    #[must_use]
    pub fn create(&self, name: &str) -> Option<Box<dyn DumpPolicy>> {
        self.policies
            .get(name)
            .map(|descriptor| (descriptor.factory)(&self.monitor))
    }

    /// Creates a policy and applies `params` to it.
    ///
    /// Parameters the policy rejects are logged and returned; the policy keeps
    /// its defaults for them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if no policy is registered as `name`.
    pub fn create_with_params(
        &self,
        name: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<(Box<dyn DumpPolicy>, Vec<String>)> {
        let mut policy = self.create(name).ok_or_else(|| {
            let known: Vec<_> = self.names().collect();
            Error::Configuration(format!(
                "unknown dump policy '{}' (known: {})",
                name,
                known.join(", ")
            ))
        })?;

        let mut rejected = Vec::new();
        for (key, value) in params {
            if !policy.set_param(key, value) {
                tracing::warn!(
                    "Policy '{}' rejected parameter {}={}",
                    name,
                    key,
                    value
                );
                rejected.push(key.clone());
            }
        }
        Ok((policy, rejected))
    }
}

impl fmt::Debug for PolicyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyRegistry")
            .field("policies", &self.policies.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::FixedMemoryMonitor;

    fn registry() -> PolicyRegistry {
        PolicyRegistry::new(Arc::new(FixedMemoryMonitor::new(1 << 30, 1 << 32)))
    }

    #[test]
    fn test_builtin_names() {
        let names: Vec<_> = registry().names().collect();
        assert_eq!(names, ["never", "always", "barrier", "valve"]);
    }

    #[test]
    fn test_create() {
        let registry = registry();
        for name in ["never", "always", "barrier", "valve"] {
            assert_eq!(registry.create(name).unwrap().name(), name);
        }
        assert!(registry.create("sometimes").is_none());
    }

    #[test]
    fn test_create_with_params() {
        let registry = registry();
        let mut params = BTreeMap::new();
        params.insert("barrier".to_string(), "100KiB".to_string());
        params.insert("ceiling".to_string(), "1B".to_string());

        let (policy, rejected) = registry.create_with_params("barrier", &params).unwrap();
        assert_eq!(policy.param("barrier").as_deref(), Some("102400"));
        assert_eq!(rejected, ["ceiling"]);
    }

    #[test]
    fn test_unknown_policy() {
        let err = registry()
            .create_with_params("sometimes", &BTreeMap::new())
            .err()
            .unwrap();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("sometimes"));
    }
}
