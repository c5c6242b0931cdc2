//! API route definitions.
//!
//! This module organizes all HTTP routes of the collector.

mod index;
mod ping;
mod update;
mod value;

pub use index::index_routes;
pub use ping::ping_routes;
pub use update::update_routes;
pub use value::value_routes;
