#![forbid(unsafe_code)]

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod gate;
pub mod invalidation;
pub mod model;
pub mod rate_limit;
pub mod repository;
pub mod routing;
pub mod runtime;
pub mod store;
pub mod telemetry;

pub use cache::{ConsumerRateLimitCache, PolicyCache, RouteCache};
pub use config::{load_from_path, Config};
pub use error::{GatewayError, Result, StoreError, StoreErrorKind};
pub use gate::{GateDecision, RequestGate};
pub use invalidation::{ChannelState, InvalidationSubscriber};
pub use model::{ConsumerRateLimit, PolicyId, RateLimit, RateLimitPolicy, Route, RouteId, RouteStatus};
pub use rate_limit::{LimitScope, RateLimitCheckResult, RateLimitService};
pub use routing::{RouteDefinition, RouteLocator};
pub use runtime::{Backends, DataPlane};
