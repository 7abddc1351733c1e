//! Relational source extraction

pub mod driver;
pub mod jdbc;

pub use driver::{ConnectionProvider, DriverRegistry, SqlxProvider};
pub use jdbc::{DatasetConnection, JdbcExtractor};
