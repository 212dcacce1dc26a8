//! HERD Core - Response Cache and Request Coalescing
//!
//! Framework-agnostic building blocks for shielding a backend from duplicate
//! GET traffic:
//!
//! - [`CacheKey`]: injection-free key over identity, path, query and the
//!   request headers that can change a response.
//! - [`SmallCache`]: concurrent TTL cache of [`CachedResponse`] values with
//!   opportunistic, non-overlapping GC sweeps and path invalidation.
//! - [`CoalescingQueue`]: read-while-writer registry that lets one leader do
//!   the work for a key while concurrent followers wait for its result.
//!
//! The HTTP policy that ties these together lives in `herd-api`.

pub mod clock;
pub mod coalesce;
pub mod config;
pub mod error;
pub mod identity;
pub mod key;
pub mod response;
pub mod small_cache;
pub mod stats;

pub use clock::{Clock, ManualClock, SystemClock};
pub use coalesce::{CoalescingQueue, Follower, LeaderGuard, Role};
pub use config::CacheConfig;
pub use error::{CoalesceError, ConfigError, HerdError, HerdResult};
pub use identity::{Identity, RoleId, TenantId};
pub use key::{CacheKey, KEY_HEADERS};
pub use response::{CachedResponse, ResponseCapture};
pub use small_cache::{Lookup, SmallCache};
pub use stats::{CacheStats, CoalesceStats};
