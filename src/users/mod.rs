//! Profile endpoints for authenticated principals and the role-gated listings.

pub mod handlers;
mod service;

pub use service::ProfileService;
