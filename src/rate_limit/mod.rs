//! Rate limiting module
//!
//! One purchase per client per fixed window. The last attempt timestamp for
//! each client is kept in Redis when credentials are configured, and in a
//! process-local map otherwise:
//!
//! - **Engine** ([`RateLimiter`]): admission checks, attempt recording,
//!   resets and read-only inspection
//! - **Stores** ([`AttemptStore`]): [`RedisStore`] and [`MemoryStore`], picked
//!   per call through a [`StoreConnector`]
//! - **Atomic acquire**: check-and-record in one step (Lua script on Redis,
//!   entry lock in memory) so concurrent requests cannot both be admitted
//!
//! # Example
//!
//! ```rust,no_run
//! use corn_gate::identity::{ClientIdentifier, ClientKind};
//! use corn_gate::rate_limit::{RateLimitConfig, RateLimiter};
//!
//! #[tokio::main]
//! async fn main() {
//!     let limiter = RateLimiter::local_only(RateLimitConfig::default());
//!     let client = ClientIdentifier::new("203.0.113.7", ClientKind::Address);
//!
//!     let decision = limiter.check_admission(&client).await.unwrap();
//!     if decision.allowed {
//!         limiter.record_attempt(&client).await.unwrap();
//!     }
//! }
//! ```

pub mod clock;
pub mod connector;
pub mod local;
pub mod lua_scripts;
pub mod redis;
pub mod retry;
pub mod service;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use connector::{NoStore, RedisConnector, StoreConnector};
pub use local::MemoryStore;
pub use redis::RedisStore;
pub use service::RateLimiter;
pub use store::{AcquireOutcome, AttemptStore, StoreBackend};
pub use types::{DebugInfo, RateLimitConfig, RateLimitDecision};
