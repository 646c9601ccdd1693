//! Cache layer with pluggable eviction strategies.
//!
//! A [`Cache`] stores values and strategy-defined metadata side by side and
//! asks its [`EvictionStrategy`] whether an entry may be served, what to
//! record on insertion, and what to evict when a capacity is exceeded.
//!
//! # Strategies
//!
//! - [`TtlStrategy`]: entries expire a fixed duration after insertion and
//!   are purged lazily on the next read.
//! - [`LruStrategy`]: capacity-bounded, evicts the least recently used key.
//! - [`MruStrategy`]: capacity-bounded, evicts the most recently inserted key
//!   other than the one being admitted.
//!
//! # Staleness
//!
//! Recency is not guaranteed: a TTL cache serves a value until it expires,
//! even if the underlying source has already changed.
//!
//! # Example
//!
//! ```ignore
//! let mut cache = Cache::named("db", Box::new(TtlStrategy::new(Duration::from_secs(10))));
//! cache.set("host", json!("db.internal"));
//! assert_eq!(cache.get("host")?, json!("db.internal"));
//! ```

pub mod registry;
pub mod store;
pub mod traits;
pub mod ttl;
pub mod usage;

pub use registry::CacheRegistry;
pub use store::{Cache, SharedCache};
pub use traits::{strategy_for, CacheStats, EntryMetadata, EvictionStrategy, MetadataMap};
pub use ttl::TtlStrategy;
pub use usage::{AccessOrder, LruStrategy, MruStrategy};
