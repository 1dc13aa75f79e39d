mod consumer;
mod policy;
mod route;

pub use consumer::ConsumerRateLimitCache;
pub use policy::PolicyCache;
pub use route::RouteCache;
