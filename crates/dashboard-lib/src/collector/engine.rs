//! Collection engine
//!
//! Fans out one task per planned fetch, gathers the partial aggregates under
//! a single deadline and runs the derivations once every fetch is in.

use super::{ClusterClient, Selectors};
use crate::cache::{TtlCache, DEFAULT_SWEEP_INTERVAL, DEFAULT_TTL};
use crate::data::Data;
use crate::error::{CollectError, FetchErrors};
use crate::kind::{Derivation, KindSource, NamespaceScope, ResourceKind, SYSTEM_NAMESPACE};
use crate::models::{ObjectRecord, Resource};
use crate::observability::DashboardMetrics;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{timeout, Instant};
use tracing::{debug, warn};

/// Cache key of the resolved namespace list
const NAMESPACES_KEY: &str = "namespaces";

/// Configuration for the collector
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Deadline for a whole collection (default: 10 seconds)
    pub timeout: Duration,
    /// Lifetime of cached namespaces and resources (default: 5 minutes)
    pub cache_ttl: Duration,
    /// Interval between cache janitor sweeps (default: 30 seconds)
    pub sweep_interval: Duration,
    /// Namespace used for system-scoped kinds
    pub system_namespace: String,
    /// Whether per-kind results are cached; the namespace list always is
    pub resources_cache_enabled: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            cache_ttl: DEFAULT_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            system_namespace: SYSTEM_NAMESPACE.to_string(),
            resources_cache_enabled: true,
        }
    }
}

#[derive(Debug, Default)]
struct StatsCounters {
    collections: AtomicU64,
    failures: AtomicU64,
    namespaces_cache_hits: AtomicU64,
    namespaces_cache_misses: AtomicU64,
    resources_cache_hits: AtomicU64,
    resources_cache_misses: AtomicU64,
    last_collection_ms: AtomicU64,
}

/// Snapshot of collector activity since startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectorStats {
    pub collections: u64,
    pub failures: u64,
    pub namespaces_cache_hits: u64,
    pub namespaces_cache_misses: u64,
    pub resources_cache_enabled: bool,
    pub resources_cache_hits: u64,
    pub resources_cache_misses: u64,
    pub last_collection_ms: u64,
}

/// One unit of fan-out work: a kind listed across a namespace set
#[derive(Debug, Clone)]
struct PlannedFetch {
    kind: ResourceKind,
    namespaces: Arc<Vec<String>>,
}

/// State shared by every fetch task
#[derive(Clone)]
struct Fetcher {
    client: Arc<dyn ClusterClient>,
    resources_cache: Option<TtlCache<Vec<Resource>>>,
    metrics: DashboardMetrics,
    stats: Arc<StatsCounters>,
}

impl Fetcher {
    /// Produce a partial aggregate carrying exactly one kind's records
    async fn fetch(self, planned: PlannedFetch) -> Result<Data, CollectError> {
        let kind = planned.kind;
        let records = self.list_records(kind, &planned.namespaces).await?;

        let mut partial = Data::new();
        partial.set(kind, records)?;
        Ok(partial)
    }

    async fn list_records(
        &self,
        kind: ResourceKind,
        namespaces: &[String],
    ) -> Result<Vec<Resource>, CollectError> {
        if let Some(cache) = &self.resources_cache {
            let cached = cache.get(kind.as_str());
            self.metrics.record_cache_lookup(cache.name(), cached.is_some());
            if let Some(records) = cached {
                self.stats
                    .resources_cache_hits
                    .fetch_add(1, Ordering::Relaxed);
                debug!(kind = %kind, records = records.len(), "Serving resources from cache");
                return Ok(records.as_ref().clone());
            }
            self.stats
                .resources_cache_misses
                .fetch_add(1, Ordering::Relaxed);
        }

        let start = Instant::now();
        let selectors = Selectors::everything();
        let mut records = Vec::new();

        // Sequential per namespace: the first failure fails the whole kind
        for namespace in namespaces {
            match self.client.list(kind, namespace, &selectors).await {
                Ok(items) => records.extend(items),
                Err(e) => {
                    warn!(kind = %kind, namespace = %namespace, error = %e, "Failed to list resources");
                    return Err(CollectError::PartialFetchFailed {
                        kind,
                        errors: FetchErrors(vec![e]),
                    });
                }
            }
        }

        let elapsed = start.elapsed();
        self.metrics.observe_fetch_latency(kind.as_str(), elapsed);
        debug!(
            kind = %kind,
            namespaces = namespaces.len(),
            records = records.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Listed resources"
        );

        if let Some(cache) = &self.resources_cache {
            cache.set(kind.as_str(), records.clone());
        }
        Ok(records)
    }
}

/// Parallel multi-namespace resource collector
pub struct Collector {
    fetcher: Fetcher,
    namespaces_cache: TtlCache<Vec<String>>,
    config: CollectorConfig,
}

impl Collector {
    /// Create a collector and start its cache janitors
    ///
    /// Janitors are only started when called from within a tokio runtime.
    pub fn new(client: Arc<dyn ClusterClient>, config: CollectorConfig) -> Self {
        let namespaces_cache = TtlCache::new("namespaces", config.cache_ttl);
        namespaces_cache.spawn_janitor(config.sweep_interval);

        let resources_cache = config.resources_cache_enabled.then(|| {
            let cache = TtlCache::new("resources", config.cache_ttl);
            cache.spawn_janitor(config.sweep_interval);
            cache
        });

        Self {
            fetcher: Fetcher {
                client,
                resources_cache,
                metrics: DashboardMetrics::new(),
                stats: Arc::new(StatsCounters::default()),
            },
            namespaces_cache,
            config,
        }
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    pub fn stats(&self) -> CollectorStats {
        let s = &self.fetcher.stats;
        CollectorStats {
            collections: s.collections.load(Ordering::Relaxed),
            failures: s.failures.load(Ordering::Relaxed),
            namespaces_cache_hits: s.namespaces_cache_hits.load(Ordering::Relaxed),
            namespaces_cache_misses: s.namespaces_cache_misses.load(Ordering::Relaxed),
            resources_cache_enabled: self.fetcher.resources_cache.is_some(),
            resources_cache_hits: s.resources_cache_hits.load(Ordering::Relaxed),
            resources_cache_misses: s.resources_cache_misses.load(Ordering::Relaxed),
            last_collection_ms: s.last_collection_ms.load(Ordering::Relaxed),
        }
    }

    /// Collect the requested kinds into a fresh aggregate
    ///
    /// Duplicate kinds are ignored. Any failure is terminal: no partial
    /// aggregate is ever returned.
    pub async fn collect(&self, kinds: &[ResourceKind]) -> Result<Data, CollectError> {
        let start = Instant::now();
        let stats = &self.fetcher.stats;
        let metrics = &self.fetcher.metrics;
        stats.collections.fetch_add(1, Ordering::Relaxed);
        metrics.inc_collections();

        let result = self.run(kinds).await;

        let elapsed = start.elapsed();
        stats
            .last_collection_ms
            .store(elapsed.as_millis() as u64, Ordering::Relaxed);
        metrics.observe_collection_latency(elapsed);
        if let Err(e) = &result {
            stats.failures.fetch_add(1, Ordering::Relaxed);
            metrics.inc_collection_failures(e.reason());
        }
        result
    }

    async fn run(&self, kinds: &[ResourceKind]) -> Result<Data, CollectError> {
        let requested: BTreeSet<ResourceKind> = kinds.iter().copied().collect();
        if requested.is_empty() {
            return Err(CollectError::NoKindsRequested);
        }

        // The deadline covers namespace resolution as well as the fetches
        let outcome = timeout(self.config.timeout, self.gather(&requested)).await;
        let mut data = match outcome {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    timeout_ms = self.config.timeout.as_millis() as u64,
                    "Collection deadline expired"
                );
                return Err(CollectError::CollectionTimeout(self.config.timeout));
            }
        };

        derive(&requested, &mut data)?;
        Ok(data)
    }

    async fn gather(&self, requested: &BTreeSet<ResourceKind>) -> Result<Data, CollectError> {
        let namespaces = self.namespaces().await?;
        let plan = self.plan(requested, &namespaces);
        debug!(
            kinds = requested.len(),
            fetches = plan.len(),
            namespaces = namespaces.len(),
            "Planned collection"
        );

        self.fetch_all(plan).await
    }

    /// Resolve the user namespaces, from cache when fresh
    pub async fn namespaces(&self) -> Result<Arc<Vec<String>>, CollectError> {
        let stats = &self.fetcher.stats;
        let cached = self.namespaces_cache.get(NAMESPACES_KEY);
        self.fetcher
            .metrics
            .record_cache_lookup(self.namespaces_cache.name(), cached.is_some());
        if let Some(namespaces) = cached {
            stats.namespaces_cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(namespaces);
        }
        stats.namespaces_cache_misses.fetch_add(1, Ordering::Relaxed);

        let projects = self
            .fetcher
            .client
            .list_projects()
            .await
            .map_err(CollectError::ClusterUnreachable)?;
        let names: Vec<String> = projects.iter().map(|p| p.name().to_string()).collect();
        debug!(namespaces = names.len(), "Resolved namespaces");

        Ok(self.namespaces_cache.set(NAMESPACES_KEY, names))
    }

    fn plan(
        &self,
        requested: &BTreeSet<ResourceKind>,
        namespaces: &Arc<Vec<String>>,
    ) -> Vec<PlannedFetch> {
        let system = Arc::new(vec![self.config.system_namespace.clone()]);

        requested
            .iter()
            .filter_map(|&kind| match kind.source() {
                KindSource::Synthetic => None,
                KindSource::Fetched(NamespaceScope::System) => Some(PlannedFetch {
                    kind,
                    namespaces: Arc::clone(&system),
                }),
                KindSource::Fetched(NamespaceScope::UserNamespaces) => Some(PlannedFetch {
                    kind,
                    namespaces: Arc::clone(namespaces),
                }),
            })
            .collect()
    }

    async fn fetch_all(&self, plan: Vec<PlannedFetch>) -> Result<Data, CollectError> {
        let mut tasks = JoinSet::new();
        for planned in plan {
            tasks.spawn(self.fetcher.clone().fetch(planned));
        }

        // Tasks still running when this future is dropped are aborted with the JoinSet
        let mut data = Data::new();
        while let Some(joined) = tasks.join_next().await {
            let partial = joined.map_err(|e| CollectError::FetchAborted(e.to_string()))??;
            data.merge(partial);
        }
        Ok(data)
    }
}

/// Run the derivations triggered by the requested kinds, in their fixed order
fn derive(requested: &BTreeSet<ResourceKind>, data: &mut Data) -> Result<(), CollectError> {
    let derivations: BTreeSet<Derivation> =
        requested.iter().filter_map(|k| k.derivation()).collect();

    for derivation in derivations {
        match derivation {
            Derivation::RemoveBuilderAndDeployerPods => {
                let (builders, deployers) = data.remove_builder_and_deployer_pods();
                debug!(
                    builders = builders.len(),
                    deployers = deployers.len(),
                    "Removed builder and deployer pods"
                );
            }
            Derivation::ExtractContainers => data.extract_containers_from_pods()?,
            Derivation::ExtractApplications => data.extract_applications_from_deployment_configs(),
        }
    }
    Ok(())
}

/// Builder for creating a collector
pub struct CollectorBuilder {
    client: Option<Arc<dyn ClusterClient>>,
    config: CollectorConfig,
}

impl CollectorBuilder {
    pub fn new() -> Self {
        Self {
            client: None,
            config: CollectorConfig::default(),
        }
    }

    /// Set the cluster client
    pub fn client(mut self, client: Arc<dyn ClusterClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: CollectorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the collection deadline
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the cache entry lifetime
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache_ttl = ttl;
        self
    }

    /// Set the cache janitor interval
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    /// Set the namespace used for system-scoped kinds
    pub fn system_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.system_namespace = namespace.into();
        self
    }

    /// Enable or disable the per-kind resources cache
    pub fn resources_cache(mut self, enabled: bool) -> Self {
        self.config.resources_cache_enabled = enabled;
        self
    }

    /// Build the collector
    pub fn build(self) -> anyhow::Result<Collector> {
        let client = self
            .client
            .ok_or_else(|| anyhow::anyhow!("Cluster client is required"))?;

        Ok(Collector::new(client, self.config))
    }
}

impl Default for CollectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
