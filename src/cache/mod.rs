//! Cache module - in-memory caching using Moka.
//!
//! - `CacheConfig` - capacity and expiry settings
//! - `TypedCache` - cheaply clonable typed wrapper over a Moka cache
//!
//! ## Usage
//!
//! ```rust
//! let results: TypedCache<String, MediaInfo> =
//!     TypedCache::new("download_results", CacheConfig::download_results());
//!
//! results.insert(url.clone(), info);
//! let info = results.get(&url);
//! ```

mod config;
mod typed;

pub use config::CacheConfig;
pub use typed::TypedCache;
