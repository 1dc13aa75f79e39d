//! Cache invalidation over pub/sub.
//!
//! Two independent [`InvalidationSubscriber`]s run in the background: one on
//! the route channel (any message reloads the whole route snapshot) and one on
//! the rate limit channel (each message names one policy to reload). A
//! subscription that drops is re-established after a fixed delay; nothing here
//! ever runs on a request-serving task.

mod handler;
mod source;
mod state;
mod subscriber;

pub use handler::{InvalidationHandler, RateLimitInvalidationHandler, RouteInvalidationHandler};
pub use source::{InvalidationSource, PayloadStream, RedisInvalidationSource};
pub use state::ChannelState;
pub use subscriber::InvalidationSubscriber;
