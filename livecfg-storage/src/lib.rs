//! livecfg Storage - Cache and Live Resolver
//!
//! Memoization and resolution for live configuration values. A
//! `LiveResolver` composes an optional cache around an optional retry loop
//! around a raw `LiveStateSource` fetch.

pub mod cache;
pub mod resolver;

// Re-export cache types for resolver and registry users
pub use cache::{
    strategy_for, AccessOrder, Cache, CacheRegistry, CacheStats, EntryMetadata, EvictionStrategy,
    LruStrategy, MetadataMap, MruStrategy, SharedCache, TtlStrategy,
};
pub use resolver::{LiveResolver, LiveResolverBuilder};
