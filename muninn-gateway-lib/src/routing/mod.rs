mod definition;
mod locator;

pub use definition::{path_matches, LocatorError, RouteDefinition};
pub use locator::{build_definitions, RouteLocator};
