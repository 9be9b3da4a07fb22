//! Capability Registry
//!
//! Components declare the capabilities they provide and the capabilities they
//! require. The registry indexes both, keeps a directed compatibility graph
//! (provider → consumer) and computes latency-optimal routing paths between
//! capabilities over that graph.
//!
//! # Example
//!
//! ```rust,ignore
//! use cadence_core::registry::{CapabilityRegistry, ComponentMetadata};
//!
//! let registry = CapabilityRegistry::new();
//! registry
//!     .register(ComponentMetadata::new("fetch").with_capability("html"), fetcher)
//!     .await?;
//! registry
//!     .register(
//!         ComponentMetadata::new("extract")
//!             .with_requirement("html")
//!             .with_capability("text"),
//!         extractor,
//!     )
//!     .await?;
//!
//! let path = registry.find_optimal_path("html", "text").await;
//! ```

mod component;
mod path;

pub use component::{
    Component, ComponentInstance, ComponentMetadata, ComponentMetrics, ComponentStatus,
};
pub use path::ComponentPath;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{RegistryError, RegistryResult};

// ============================================================================
// Registry State
// ============================================================================

#[derive(Debug, Default)]
struct RegistryState {
    components: HashMap<String, ComponentInstance>,
    /// capability -> providing component ids
    capability_index: HashMap<String, BTreeSet<String>>,
    /// requirement -> requiring component ids
    requirement_index: HashMap<String, BTreeSet<String>>,
    /// provider -> consumers
    outgoing: HashMap<String, BTreeSet<String>>,
    /// consumer -> providers
    incoming: HashMap<String, BTreeSet<String>>,
    /// "<input>-><output>" -> path
    path_cache: HashMap<String, ComponentPath>,
}

impl RegistryState {
    fn insert(&mut self, instance: ComponentInstance) {
        let id = instance.metadata.id.clone();

        for capability in &instance.metadata.capabilities {
            self.capability_index
                .entry(capability.clone())
                .or_default()
                .insert(id.clone());
        }
        for requirement in &instance.metadata.requirements {
            self.requirement_index
                .entry(requirement.clone())
                .or_default()
                .insert(id.clone());
        }

        for (other_id, other) in &self.components {
            if other.metadata.feeds(&instance.metadata) {
                self.outgoing
                    .entry(other_id.clone())
                    .or_default()
                    .insert(id.clone());
                self.incoming
                    .entry(id.clone())
                    .or_default()
                    .insert(other_id.clone());
            }
            if instance.metadata.feeds(&other.metadata) {
                self.outgoing
                    .entry(id.clone())
                    .or_default()
                    .insert(other_id.clone());
                self.incoming
                    .entry(other_id.clone())
                    .or_default()
                    .insert(id.clone());
            }
        }

        self.components.insert(id, instance);
        self.path_cache.clear();
    }

    fn remove(&mut self, id: &str) -> Option<ComponentInstance> {
        let removed = self.components.remove(id)?;

        for capability in &removed.metadata.capabilities {
            remove_from_index(&mut self.capability_index, capability, id);
        }
        for requirement in &removed.metadata.requirements {
            remove_from_index(&mut self.requirement_index, requirement, id);
        }

        if let Some(consumers) = self.outgoing.remove(id) {
            for consumer in consumers {
                remove_from_index(&mut self.incoming, &consumer, id);
            }
        }
        if let Some(providers) = self.incoming.remove(id) {
            for provider in providers {
                remove_from_index(&mut self.outgoing, &provider, id);
            }
        }

        self.path_cache.clear();
        Some(removed)
    }

    fn ready_ids(&self, index: &HashMap<String, BTreeSet<String>>, key: &str) -> Vec<String> {
        index
            .get(key)
            .into_iter()
            .flatten()
            .filter(|id| {
                self.components
                    .get(*id)
                    .is_some_and(|c| c.status.is_ready())
            })
            .cloned()
            .collect()
    }
}

fn remove_from_index(index: &mut HashMap<String, BTreeSet<String>>, key: &str, id: &str) {
    if let Some(ids) = index.get_mut(key) {
        ids.remove(id);
        if ids.is_empty() {
            index.remove(key);
        }
    }
}

// ============================================================================
// CapabilityRegistry
// ============================================================================

/// Registry of capability-providing components.
///
/// All state sits behind a single `RwLock`; component initialization runs
/// outside the lock.
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    state: RwLock<RegistryState>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new component and run its initialization.
    ///
    /// Returns the status the component settled in. Registering an id that is
    /// already present fails and leaves every index untouched.
    pub async fn register(
        &self,
        metadata: ComponentMetadata,
        instance: Arc<dyn Component>,
    ) -> RegistryResult<ComponentStatus> {
        {
            let mut state = self.state.write().await;
            if state.components.contains_key(&metadata.id) {
                return Err(RegistryError::DuplicateComponent(metadata.id));
            }
            state.insert(ComponentInstance {
                metadata: metadata.clone(),
                instance: Arc::clone(&instance),
                status: ComponentStatus::Pending,
            });
        }

        info!(
            component.id = %metadata.id,
            capabilities = ?metadata.capabilities,
            requirements = ?metadata.requirements,
            "Component registered"
        );

        Ok(self.initialize(&metadata.id, instance).await)
    }

    /// Replace an existing registration (or register a new one).
    ///
    /// All index and compatibility entries of the previous registration are
    /// dropped before the new one is indexed.
    pub async fn replace(
        &self,
        metadata: ComponentMetadata,
        instance: Arc<dyn Component>,
    ) -> ComponentStatus {
        {
            let mut state = self.state.write().await;
            if state.remove(&metadata.id).is_some() {
                debug!(component.id = %metadata.id, "Replacing component registration");
            }
            state.insert(ComponentInstance {
                metadata: metadata.clone(),
                instance: Arc::clone(&instance),
                status: ComponentStatus::Pending,
            });
        }

        self.initialize(&metadata.id, instance).await
    }

    async fn initialize(&self, id: &str, instance: Arc<dyn Component>) -> ComponentStatus {
        let status = match instance.initialize().await {
            Ok(()) => ComponentStatus::Ready,
            Err(e) => {
                warn!(component.id = %id, error = %e, "Component initialization failed");
                ComponentStatus::Error(e)
            }
        };

        let mut state = self.state.write().await;
        if let Some(entry) = state.components.get_mut(id) {
            // A concurrent replace owns the entry now
            if Arc::ptr_eq(&entry.instance, &instance) {
                entry.status = status.clone();
                state.path_cache.clear();
            }
        }
        status
    }

    /// All ready components providing `capability`.
    pub async fn find_by_capability(&self, capability: &str) -> Vec<ComponentInstance> {
        let state = self.state.read().await;
        state
            .ready_ids(&state.capability_index, capability)
            .iter()
            .filter_map(|id| state.components.get(id).cloned())
            .collect()
    }

    /// All ready components requiring `requirement`.
    pub async fn find_by_requirement(&self, requirement: &str) -> Vec<ComponentInstance> {
        let state = self.state.read().await;
        state
            .ready_ids(&state.requirement_index, requirement)
            .iter()
            .filter_map(|id| state.components.get(id).cloned())
            .collect()
    }

    /// Best ready provider of `capability`: highest success rate, then lowest
    /// average latency, then id.
    pub async fn select_for_capability(&self, capability: &str) -> Option<ComponentInstance> {
        let mut candidates = self.find_by_capability(capability).await;
        candidates.sort_by(|a, b| {
            let (ma, mb) = (&a.metadata.metrics, &b.metadata.metrics);
            mb.success_rate
                .total_cmp(&ma.success_rate)
                .then_with(|| ma.average_latency.total_cmp(&mb.average_latency))
                .then_with(|| a.metadata.id.cmp(&b.metadata.id))
        });
        candidates.into_iter().next()
    }

    /// Lowest-latency route from a provider of `input` to a provider of `output`.
    ///
    /// Checks the cache, then a single component providing both, then searches
    /// the compatibility graph. Found paths are cached; `None` is not.
    pub async fn find_optimal_path(&self, input: &str, output: &str) -> Option<ComponentPath> {
        let key = ComponentPath::cache_key(input, output);
        if let Some(cached) = self.state.read().await.path_cache.get(&key) {
            debug!(path.key = %key, "Path cache hit");
            return Some(cached.clone());
        }

        let mut state = self.state.write().await;
        let sources = state.ready_ids(&state.capability_index, input);

        let direct = sources
            .iter()
            .filter_map(|id| state.components.get(id))
            .filter(|c| c.metadata.provides(output))
            .min_by(|a, b| {
                a.metadata
                    .metrics
                    .average_latency
                    .total_cmp(&b.metadata.metrics.average_latency)
                    .then_with(|| a.metadata.id.cmp(&b.metadata.id))
            })
            .map(|c| ComponentPath::from_ids(vec![c.metadata.id.clone()], &state.components));

        let path = direct.or_else(|| {
            path::lowest_latency_path(&state.components, &state.outgoing, &sources, |c| {
                c.metadata.provides(output)
            })
        });

        match &path {
            Some(found) => {
                debug!(
                    path.key = %key,
                    path.components = ?found.components,
                    path.latency = found.total_latency,
                    "Path computed"
                );
                state.path_cache.insert(key, found.clone());
            }
            None => debug!(path.key = %key, "No path between capabilities"),
        }
        path
    }

    /// Fold an observation into a component's rolling metrics and invalidate
    /// every cached path that contains it.
    pub async fn update_metrics(&self, id: &str, latency_ms: f64, success: bool) -> RegistryResult<()> {
        let mut state = self.state.write().await;
        let entry = state
            .components
            .get_mut(id)
            .ok_or_else(|| RegistryError::ComponentNotFound(id.to_string()))?;
        entry.metadata.metrics.record(latency_ms, success);

        state.path_cache.retain(|_, path| !path.contains(id));
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Option<ComponentInstance> {
        self.state.read().await.components.get(id).cloned()
    }

    pub async fn status(&self, id: &str) -> Option<ComponentStatus> {
        self.state
            .read()
            .await
            .components
            .get(id)
            .map(|c| c.status.clone())
    }

    /// Metadata of every registered component, sorted by id.
    pub async fn list(&self) -> Vec<ComponentMetadata> {
        let state = self.state.read().await;
        let mut all: Vec<_> = state
            .components
            .values()
            .map(|c| c.metadata.clone())
            .collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.components.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.components.is_empty()
    }

    /// Ids of every component sharing a compatibility edge with `id`, in
    /// either direction.
    pub async fn compatible_with(&self, id: &str) -> BTreeSet<String> {
        let state = self.state.read().await;
        state
            .outgoing
            .get(id)
            .into_iter()
            .chain(state.incoming.get(id))
            .flatten()
            .cloned()
            .collect()
    }

    /// Whether `a` provides something `b` requires or vice versa.
    pub async fn are_compatible(&self, a: &str, b: &str) -> bool {
        let state = self.state.read().await;
        let edge = |from: &str, to: &str| state.outgoing.get(from).is_some_and(|s| s.contains(to));
        edge(a, b) || edge(b, a)
    }

    /// Ids of every component indexed under `capability`, regardless of status.
    pub async fn providers_of(&self, capability: &str) -> BTreeSet<String> {
        self.state
            .read()
            .await
            .capability_index
            .get(capability)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn cached_paths(&self) -> usize {
        self.state.read().await.path_cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Noop;
    impl Component for Noop {}

    struct Failing;

    #[async_trait]
    impl Component for Failing {
        async fn initialize(&self) -> Result<(), String> {
            Err("backend unavailable".to_string())
        }
    }

    fn noop() -> Arc<dyn Component> {
        Arc::new(Noop)
    }

    async fn chain_registry() -> CapabilityRegistry {
        let registry = CapabilityRegistry::new();
        registry
            .register(
                ComponentMetadata::new("a")
                    .with_capability("x")
                    .with_average_latency(10.0),
                noop(),
            )
            .await
            .unwrap();
        registry
            .register(
                ComponentMetadata::new("b")
                    .with_requirement("x")
                    .with_capability("y")
                    .with_average_latency(25.0),
                noop(),
            )
            .await
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn test_two_hop_path_sums_latency() {
        let registry = chain_registry().await;

        let path = registry.find_optimal_path("x", "y").await.unwrap();
        assert_eq!(path.components, vec!["a", "b"]);
        assert_eq!(path.total_latency, 35.0);
        assert_eq!(path.success_probability, 1.0);
        assert!(registry.are_compatible("a", "b").await);
        assert!(registry.are_compatible("b", "a").await);
    }

    #[tokio::test]
    async fn test_direct_provider_wins() {
        let registry = chain_registry().await;
        registry
            .register(
                ComponentMetadata::new("both")
                    .with_capability("x")
                    .with_capability("y")
                    .with_average_latency(500.0),
                noop(),
            )
            .await
            .unwrap();

        let path = registry.find_optimal_path("x", "y").await.unwrap();
        assert_eq!(path.components, vec!["both"]);
    }

    #[tokio::test]
    async fn test_path_is_cached_and_invalidated_by_metrics() {
        let registry = chain_registry().await;
        registry.find_optimal_path("x", "y").await.unwrap();
        assert_eq!(registry.cached_paths().await, 1);

        registry.update_metrics("b", 5.0, true).await.unwrap();
        assert_eq!(registry.cached_paths().await, 0);

        let path = registry.find_optimal_path("x", "y").await.unwrap();
        assert_eq!(path.total_latency, 15.0);
    }

    #[tokio::test]
    async fn test_missing_path_is_none() {
        let registry = chain_registry().await;
        assert!(registry.find_optimal_path("x", "z").await.is_none());
        assert_eq!(registry.cached_paths().await, 0);
    }

    #[tokio::test]
    async fn test_compatibility_cycle_does_not_hang() {
        let registry = CapabilityRegistry::new();
        registry
            .register(
                ComponentMetadata::new("p")
                    .with_capability("x")
                    .with_requirement("y"),
                noop(),
            )
            .await
            .unwrap();
        registry
            .register(
                ComponentMetadata::new("q")
                    .with_capability("y")
                    .with_requirement("x"),
                noop(),
            )
            .await
            .unwrap();

        assert!(registry.find_optimal_path("x", "unreachable").await.is_none());
        assert_eq!(registry.compatible_with("p").await.len(), 1);
    }

    #[tokio::test]
    async fn test_update_metrics_repeated_latency() {
        let registry = chain_registry().await;
        for _ in 0..7 {
            registry.update_metrics("a", 42.0, true).await.unwrap();
        }

        let metrics = registry.get("a").await.unwrap().metadata.metrics;
        assert_eq!(metrics.usage_count, 7);
        assert!((metrics.average_latency - 42.0).abs() < 1e-9);
        assert_eq!(metrics.success_rate, 1.0);
    }

    #[tokio::test]
    async fn test_update_metrics_unknown_component() {
        let registry = CapabilityRegistry::new();
        let err = registry.update_metrics("ghost", 1.0, true).await.unwrap_err();
        assert_eq!(err, RegistryError::ComponentNotFound("ghost".to_string()));
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let registry = chain_registry().await;
        let err = registry
            .register(ComponentMetadata::new("a").with_capability("x"), noop())
            .await
            .unwrap_err();

        assert_eq!(err, RegistryError::DuplicateComponent("a".to_string()));
        assert_eq!(registry.providers_of("x").await.len(), 1);
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_replace_drops_stale_index_entries() {
        let registry = chain_registry().await;
        registry
            .replace(ComponentMetadata::new("a").with_capability("z"), noop())
            .await;

        assert!(registry.providers_of("x").await.is_empty());
        assert_eq!(registry.providers_of("z").await.len(), 1);
        assert!(!registry.are_compatible("a", "b").await);
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_failed_initialization_is_not_discoverable() {
        let registry = CapabilityRegistry::new();
        let status = registry
            .register(
                ComponentMetadata::new("broken").with_capability("x"),
                Arc::new(Failing),
            )
            .await
            .unwrap();

        assert_eq!(status, ComponentStatus::Error("backend unavailable".to_string()));
        assert!(registry.find_by_capability("x").await.is_empty());
        assert_eq!(registry.providers_of("x").await.len(), 1);
    }

    #[tokio::test]
    async fn test_find_by_requirement() {
        let registry = chain_registry().await;
        let consumers = registry.find_by_requirement("x").await;
        assert_eq!(consumers.len(), 1);
        assert_eq!(consumers[0].metadata.id, "b");
    }

    #[tokio::test]
    async fn test_select_for_capability_prefers_reliability_then_speed() {
        let registry = CapabilityRegistry::new();
        registry
            .register(
                ComponentMetadata::new("fast-flaky")
                    .with_capability("search")
                    .with_average_latency(5.0)
                    .with_success_rate(0.6),
                noop(),
            )
            .await
            .unwrap();
        registry
            .register(
                ComponentMetadata::new("slow-solid")
                    .with_capability("search")
                    .with_average_latency(80.0),
                noop(),
            )
            .await
            .unwrap();
        registry
            .register(
                ComponentMetadata::new("quick-solid")
                    .with_capability("search")
                    .with_average_latency(20.0),
                noop(),
            )
            .await
            .unwrap();

        let chosen = registry.select_for_capability("search").await.unwrap();
        assert_eq!(chosen.metadata.id, "quick-solid");
        assert!(registry.select_for_capability("translate").await.is_none());
    }

    #[tokio::test]
    async fn test_list_is_sorted() {
        let registry = chain_registry().await;
        let ids: Vec<_> = registry.list().await.into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
