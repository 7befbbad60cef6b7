//! HTTP request handlers.

pub mod api;
mod health;
mod version;

pub use health::{livez, readyz};
pub use version::version;
