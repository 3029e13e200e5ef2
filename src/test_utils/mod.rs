//! In-memory stand-ins for the database and the host stores, for tests and local development.

pub mod memory;
pub mod test_helpers;

pub use memory::{MemoryConnection, MemoryDatabase, MemoryFactory, MemoryFault, Scripted};
pub use test_helpers::{MemoryAttemptStore, MemoryIdentityStore};
