//! `SQLite` storage for the `EcoScan` client.
//!
//! One schema serves two roles: the device database (key/value storage
//! holding the offline queue) and the local stand-in for the hosted
//! document store.

mod db;
mod models;
mod queries_documents;
mod queries_kv;


pub use db::Database;
pub use ecoscan_core::db::DatabaseError;
pub use models::{DocumentRow, KvRow};
