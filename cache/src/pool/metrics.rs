use prometheus_client::metrics::{counter::Counter, gauge::Gauge};
use prometheus_client::registry::Registry;

pub(crate) struct Metrics {
    pub soft_hits: Counter,
    pub soft_misses: Counter,
    pub soft_cells: Gauge,
    pub evictions: Counter,
    pub spills: Counter,
    pub restores: Counter,
    pub loads: Counter,
    pub exports: Counter,
    pub copies: Counter,
    pub skipped_exports: Counter,
    pub partition_hits: Counter,
    pub partition_reads: Counter,
}

impl Metrics {
    /// Initialize the `Metrics` struct and register the metrics in the provided registry.
    pub fn new(registry: &mut Registry) -> Self {
        let metrics = Self {
            soft_hits: Counter::default(),
            soft_misses: Counter::default(),
            soft_cells: Gauge::default(),
            evictions: Counter::default(),
            spills: Counter::default(),
            restores: Counter::default(),
            loads: Counter::default(),
            exports: Counter::default(),
            copies: Counter::default(),
            skipped_exports: Counter::default(),
            partition_hits: Counter::default(),
            partition_reads: Counter::default(),
        };
        registry.register(
            "soft_hits",
            "Number of payloads restored from the soft cache",
            metrics.soft_hits.clone(),
        );
        registry.register(
            "soft_misses",
            "Number of restores that missed the soft cache",
            metrics.soft_misses.clone(),
        );
        registry.register(
            "soft_cells",
            "Number of cells held by the soft cache",
            metrics.soft_cells.clone(),
        );
        registry.register(
            "evictions",
            "Number of payloads evicted on release",
            metrics.evictions.clone(),
        );
        registry.register(
            "spills",
            "Number of eviction files written",
            metrics.spills.clone(),
        );
        registry.register(
            "restores",
            "Number of payloads restored from eviction files",
            metrics.restores.clone(),
        );
        registry.register(
            "loads",
            "Number of payloads loaded from their source",
            metrics.loads.clone(),
        );
        registry.register(
            "exports",
            "Number of exports that serialized a payload",
            metrics.exports.clone(),
        );
        registry.register(
            "copies",
            "Number of exports satisfied by copying persisted data",
            metrics.copies.clone(),
        );
        registry.register(
            "skipped_exports",
            "Number of exports skipped because the source was current",
            metrics.skipped_exports.clone(),
        );
        registry.register(
            "partition_hits",
            "Number of partition reads served by the cached block",
            metrics.partition_hits.clone(),
        );
        registry.register(
            "partition_reads",
            "Number of partitions read from storage",
            metrics.partition_reads.clone(),
        );
        metrics
    }
}
