//! Database module for FanZone server
//!
//! This module defines the persistence seam (`Store`), its Postgres and
//! in-memory implementations, and the deadline-bounded `DbOperations`
//! facade the rest of the server talks to.

pub mod memory;
pub mod models;
pub mod operations;
pub mod postgres;
pub mod store;

pub use memory::MemoryStore;
pub use models::{Admin, Identity, Language, ProfileUpdate, PublicProfile, Role, Session, User};
pub use operations::{with_deadline, DbOperations};
pub use postgres::PgStore;
pub use store::Store;
