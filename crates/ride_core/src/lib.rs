pub mod animation;
pub mod config;
pub mod draft;
pub mod error;
pub mod fleet;
pub mod geo;
pub mod location;
pub mod places;
pub mod route;
pub mod routing;
pub mod saved;
pub mod search;
pub mod session;
pub mod snapping;
pub mod store;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
