//! HTTP surface: router, long-polling transport

pub mod polling;
pub mod routes;

pub use routes::build_router;
