//! Configuration types for destination stores.
//!
//! These structs intentionally do NOT store passwords or credentials; the
//! connection string is handed to the driver and never kept.

mod connection;

pub use connection::ConnectionConfig;
