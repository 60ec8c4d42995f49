use crate::adapter::Kind;
use tessera_matrix::DEFAULT_BLOCK_SIZE;

/// Where and how released payloads are spilled.
#[derive(Clone, Debug)]
pub struct EvictionConfig {
    /// Storage backend that receives eviction files.
    pub backend: Kind,

    /// Directory (as a path prefix ending in `/`) holding eviction files.
    pub root: String,

    /// Prefix of every eviction file name.
    pub prefix: String,

    /// Extension of every eviction file name (including the leading `.`).
    pub extension: String,
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            backend: Kind::Local,
            root: "cache/".into(),
            prefix: "cache".into(),
            extension: ".dat".into(),
        }
    }
}

/// Configuration for a [crate::Pool].
#[derive(Clone, Debug)]
pub struct Config {
    pub eviction: EvictionConfig,

    /// Payloads with at most this many cells are never evicted on release.
    pub caching_threshold: u64,

    /// Maximum number of cells held by the soft cache. Zero disables it.
    pub soft_capacity: u64,

    /// Block size used when exporting (or spilling) in a blocked format.
    pub block_size: u32,

    /// Zstd level applied to local eviction files, if any.
    pub compression: Option<u8>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            eviction: EvictionConfig::default(),
            caching_threshold: 4_096,
            soft_capacity: 1 << 24,
            block_size: DEFAULT_BLOCK_SIZE,
            compression: None,
        }
    }
}
