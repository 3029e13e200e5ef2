// MSSQL module - SQL Server sessions for the pool
//
// - config: connection options and the pool-facing connection factory
// - client: raw client creation
// - params: binding typed parameters onto tiberius queries
// - query: streaming rows into result sets

pub mod client;
pub mod config;
pub mod params;
pub mod query;

pub use client::create_mssql_client;
pub use config::{MssqlClient, MssqlConnection, MssqlFactory, MssqlOptions, MssqlOptionsBuilder};
pub use params::bind_query_params;
pub use query::build_result_set;
