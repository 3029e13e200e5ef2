//! Bounded connection pool built on deadpool's managed pool.
//!
//! Connections are created lazily up to `max_size`, leased exclusively through
//! [`PoolConnection`], health-checked before reuse and retired after fatal driver errors.

pub mod connection;
pub mod types;

pub use connection::{ConnectionFactory, ManagedConnection, PoolConnection, SqlConnection};
pub use types::{ConnectionManager, PoolStatus};
