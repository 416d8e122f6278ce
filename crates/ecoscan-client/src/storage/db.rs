//! `SQLite` database for the `EcoScan` client.

ecoscan_core::define_database!(Database, "Client database migrations complete");
